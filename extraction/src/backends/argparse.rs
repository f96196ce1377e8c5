//! Backend for the argparse declaration style.

use script_schema_core::{ChoiceLimit, ParamValue, ScriptSchema};

use crate::assembler::{ParserMeta, WalkedCommand, assemble};
use crate::backends::{Backend, BackendError, python_extension};
use crate::interp::value::{ActionData, ActionKind, Arity, ParserArena, ParserRef, Value};
use crate::pipeline::capture_parser;
use crate::raw::{ConcreteKind, RawDefault, RawMutex, RawParameter};
use crate::source::ScriptSource;

/// Extracts schemas from scripts that declare arguments through an
/// argument-parser object: a live parser is captured by the pipeline, then
/// its actions are walked in declaration order.
pub struct ArgparseBackend;

impl Backend for ArgparseBackend {
    fn id(&self) -> &'static str {
        "argparse"
    }

    fn heuristics(&self, source: &ScriptSource) -> Vec<bool> {
        let text = source.text();
        vec![
            python_extension(source),
            text.contains("argparse"),
            text.contains("ArgumentParser"),
            text.contains(".parse_args"),
            text.contains(".add_argument"),
        ]
    }

    fn build(&self, source: &ScriptSource) -> Result<ScriptSchema, BackendError> {
        let captured = capture_parser(source)?;
        let commands = walk(captured.interpreter.arena(), captured.parser);
        Ok(assemble(source, &commands)?)
    }
}

/// Walks the root parser and one level of sub-commands into raw parameter
/// lists, preserving declaration order.
fn walk(arena: &ParserArena, root: ParserRef) -> Vec<WalkedCommand> {
    let mut commands = vec![walk_command(arena, root, String::new())];
    for (name, child) in &arena.get(root).subcommands {
        commands.push(walk_command(arena, *child, name.clone()));
    }
    commands
}

fn walk_command(arena: &ParserArena, parser: ParserRef, name: String) -> WalkedCommand {
    let data = arena.get(parser);
    let params = data
        .actions
        .iter()
        .filter(|action| action.kind != ActionKind::SubParsers)
        .map(|action| to_raw(arena, parser, action))
        .collect();

    WalkedCommand {
        name,
        meta: ParserMeta {
            description: data.description.clone(),
            version: data.version.clone(),
        },
        params,
    }
}

fn to_raw(arena: &ParserArena, parser: ParserRef, action: &ActionData) -> RawParameter {
    let data = arena.get(parser);
    let mut raw = RawParameter::new(concrete_kind(action.kind), &action.dest);
    raw.declared_type = action.declared_type.clone();
    raw.default = raw_default(&action.default);
    raw.required = action.required;
    raw.help = action.help.clone();
    raw.flag_strings = action.option_strings.clone();
    raw.choices = action.choices.as_ref().map(|choices| {
        choices.iter().filter_map(param_value).collect()
    });
    raw.arity = action.nargs.map(choice_limit);
    raw.container = data
        .groups
        .get(action.group)
        .map(|g| g.title.clone())
        .unwrap_or_default();
    raw.mutex = action.mutex.map(|index| RawMutex {
        set_id: index,
        title: data.mutex_groups[index].title.clone(),
    });
    raw.version = action.version.clone();
    raw
}

fn concrete_kind(kind: ActionKind) -> ConcreteKind {
    match kind {
        ActionKind::Store => ConcreteKind::Store,
        ActionKind::StoreTrue => ConcreteKind::Flag,
        ActionKind::StoreFalse => ConcreteKind::NegatedFlag,
        ActionKind::StoreConst => ConcreteKind::StoreConst,
        ActionKind::Append => ConcreteKind::Append,
        ActionKind::AppendConst => ConcreteKind::AppendConst,
        ActionKind::Count => ConcreteKind::Count,
        ActionKind::Help => ConcreteKind::Help,
        ActionKind::Version => ConcreteKind::Version,
        // Filtered out before the walk reaches here.
        ActionKind::SubParsers => ConcreteKind::Store,
    }
}

fn choice_limit(arity: Arity) -> ChoiceLimit {
    match arity {
        Arity::Optional => ChoiceLimit::One,
        Arity::OneOrMore => ChoiceLimit::AtLeastOne,
        Arity::ZeroOrMore => ChoiceLimit::ZeroOrMore,
        Arity::Exactly(n) => ChoiceLimit::Exactly(n),
        Arity::Remainder => ChoiceLimit::Remainder,
    }
}

fn raw_default(value: &Value) -> RawDefault {
    match value {
        Value::None => RawDefault::None,
        Value::Suppress => RawDefault::Suppressed,
        Value::Stream(kind) => RawDefault::Stream(*kind),
        Value::Function(_)
        | Value::TypeMethod(_, _)
        | Value::Builtin(_)
        | Value::Method { .. } => RawDefault::Callable,
        other => param_value(other)
            .map(RawDefault::Value)
            .unwrap_or(RawDefault::Opaque),
    }
}

fn param_value(value: &Value) -> Option<ParamValue> {
    match value {
        Value::Bool(b) => Some(ParamValue::Bool(*b)),
        Value::Int(i) => Some(ParamValue::Int(*i)),
        Value::Float(f) => Some(ParamValue::Float(*f)),
        Value::Str(s) => Some(ParamValue::Str(s.clone())),
        Value::List(items) | Value::Tuple(items) => Some(ParamValue::List(
            items.iter().filter_map(param_value).collect(),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(text: &str) -> ScriptSource {
        ScriptSource::new("/tmp/scripts/sample.py", text)
    }

    #[test]
    fn test_heuristics_score_full_match() {
        let backend = ArgparseBackend;
        let full = source(
            "import argparse\n\
             parser = argparse.ArgumentParser()\n\
             parser.add_argument('--x')\n\
             parser.parse_args()\n",
        );
        assert_eq!(backend.score(&full), 1.0);

        let none = ScriptSource::new("/tmp/readme.txt", "nothing declarative here");
        assert_eq!(backend.score(&none), 0.0);
    }

    #[test]
    fn test_build_walks_declaration_order() {
        let backend = ArgparseBackend;
        let schema = backend
            .build(&source(
                "import argparse\n\
                 parser = argparse.ArgumentParser(description='demo')\n\
                 parser.add_argument('alpha')\n\
                 parser.add_argument('--beta', type=int, default=2)\n\
                 parser.add_argument('gamma')\n\
                 args = parser.parse_args()\n",
            ))
            .unwrap();

        assert_eq!(schema.description.as_deref(), Some("demo"));
        let root = schema.root_inputs().unwrap();
        let positionals = root.find_group("positional arguments").unwrap();
        let names: Vec<&str> = positionals.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "gamma"]);
        assert!(root.find_group("optional arguments").unwrap().find_node("beta").is_some());
    }

    #[test]
    fn test_help_action_suppressed_from_schema() {
        let backend = ArgparseBackend;
        let schema = backend
            .build(&source(
                "import argparse\n\
                 parser = argparse.ArgumentParser()\n\
                 parser.add_argument('--x')\n\
                 parser.parse_args()\n",
            ))
            .unwrap();
        let root = schema.root_inputs().unwrap();
        assert!(root.nodes().all(|n| n.name != "help"));
    }

    #[test]
    fn test_version_action_captured() {
        let backend = ArgparseBackend;
        let schema = backend
            .build(&source(
                "import argparse\n\
                 parser = argparse.ArgumentParser()\n\
                 parser.add_argument('--version', action='version', version='3.2.1')\n\
                 parser.add_argument('name')\n\
                 parser.parse_args()\n",
            ))
            .unwrap();
        assert_eq!(schema.version.as_deref(), Some("3.2.1"));
        let root = schema.root_inputs().unwrap();
        assert!(root.nodes().all(|n| n.name != "version"));
    }

    #[test]
    fn test_subcommands_become_scopes() {
        let backend = ArgparseBackend;
        let schema = backend
            .build(&source(
                "import argparse\n\
                 parser = argparse.ArgumentParser()\n\
                 parser.add_argument('--global-flag', action='store_true')\n\
                 sub = parser.add_subparsers()\n\
                 convert = sub.add_parser('convert')\n\
                 convert.add_argument('--fast', action='store_true')\n\
                 report = sub.add_parser('report')\n\
                 report.add_argument('out')\n\
                 parser.parse_args()\n",
            ))
            .unwrap();

        assert_eq!(schema.command_names(), vec!["", "convert", "report"]);
        let convert = schema.find_command("convert").unwrap();
        assert!(convert.nodes().any(|n| n.name == "fast"));
        let root = schema.root_inputs().unwrap();
        assert!(root.nodes().any(|n| n.name == "global_flag"));
    }
}
