//! Schema assembly from walked parameter lists.
//!
//! The assembler turns each backend's declaration-order walk into the
//! final [`ScriptSchema`]: suppressed parameters are dropped, version
//! constructs are captured instead of materialized, groups appear in
//! first-seen order, and mutual-exclusion sets receive sequential public
//! ids per command scope.

use std::collections::HashSet;

use tracing::warn;

use script_schema_core::{CommandInputs, InputGroup, MutexGroup, ScriptSchema};

use crate::error::TypeResolutionError;
use crate::mapping;
use crate::raw::{ConcreteKind, RawParameter};
use crate::source::ScriptSource;

/// Parser-level metadata discovered during a walk.
#[derive(Debug, Clone, Default)]
pub struct ParserMeta {
    pub description: Option<String>,
    /// Version carried on the parser declaration itself (an older style
    /// than version-printing parameters).
    pub version: Option<String>,
}

/// One command scope's walk output: the scope name (empty for the root)
/// and its parameters in declaration order.
#[derive(Debug, Clone)]
pub struct WalkedCommand {
    pub name: String,
    pub meta: ParserMeta,
    pub params: Vec<RawParameter>,
}

impl WalkedCommand {
    pub fn root(meta: ParserMeta, params: Vec<RawParameter>) -> Self {
        Self {
            name: String::new(),
            meta,
            params,
        }
    }
}

/// Assembles the normalized schema from walked command scopes.
///
/// The first entry is the root scope; its metadata seeds the schema
/// description and version. A version-printing parameter in any scope
/// supplies the version when the declaration itself carried none.
pub fn assemble(
    source: &ScriptSource,
    commands: &[WalkedCommand],
) -> Result<ScriptSchema, TypeResolutionError> {
    let mut schema = ScriptSchema::new(source.stem(), &source.path().to_string_lossy());

    if let Some(root) = commands.first() {
        schema.description = root.meta.description.clone();
        schema.version = root.meta.version.clone();
    }

    for command in commands {
        let mut inputs = CommandInputs::new(&command.name);
        // Native exclusion-set ids in first-seen order; the index is the
        // public sequential id.
        let mut mutex_sets: Vec<usize> = Vec::new();
        let mut seen_names: HashSet<String> = HashSet::new();

        for raw in &command.params {
            if raw.kind == ConcreteKind::Version {
                if schema.version.is_none() {
                    schema.version = raw.version.clone();
                }
                continue;
            }
            if raw.is_suppressed() {
                continue;
            }

            let rule = mapping::resolve(raw)?;
            let mut field = mapping::build_field(rule, raw);

            if let Some(mutex) = &raw.mutex {
                let id = match mutex_sets.iter().position(|set| *set == mutex.set_id) {
                    Some(id) => id,
                    None => {
                        mutex_sets.push(mutex.set_id);
                        mutex_sets.len() - 1
                    }
                };
                field.mutex_group = Some(MutexGroup {
                    id,
                    title: mutex.title.clone(),
                });
            }

            if !seen_names.insert(field.name.clone()) {
                // Node names are unique per scope; a repeated destination
                // replaces the stored node without a second group entry.
                warn!(name = %field.name, "duplicate destination replaces earlier node");
                for group in &mut inputs.groups {
                    if let Some(existing) = group.nodes.iter_mut().find(|n| n.name == field.name) {
                        *existing = field;
                        break;
                    }
                }
                continue;
            }

            let group_index = match inputs
                .groups
                .iter()
                .position(|g| g.group == raw.container)
            {
                Some(index) => index,
                None => {
                    inputs.groups.push(InputGroup::new(&raw.container));
                    inputs.groups.len() - 1
                }
            };
            inputs.groups[group_index].nodes.push(field);
        }

        schema.inputs.push(inputs);
    }

    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{RawDefault, RawMutex};
    use script_schema_core::ParamValue;

    fn source() -> ScriptSource {
        ScriptSource::new("/tmp/scripts/tool.py", "")
    }

    fn positional(dest: &str) -> RawParameter {
        let mut raw = RawParameter::new(ConcreteKind::Store, dest);
        raw.required = true;
        raw.container = "positional arguments".to_string();
        raw
    }

    fn flag(dest: &str, set_id: Option<usize>) -> RawParameter {
        let mut raw = RawParameter::new(ConcreteKind::Flag, dest);
        raw.default = RawDefault::Value(ParamValue::Bool(false));
        raw.flag_strings = vec![format!("--{dest}")];
        raw.container = "optional arguments".to_string();
        raw.mutex = set_id.map(|set_id| RawMutex {
            set_id,
            title: None,
        });
        raw
    }

    #[test]
    fn test_groups_preserve_declaration_order() {
        let commands = [WalkedCommand::root(
            ParserMeta::default(),
            vec![positional("first_pos"), flag("verbose", None), positional("second-pos")],
        )];
        let schema = assemble(&source(), &commands).unwrap();

        let root = schema.root_inputs().unwrap();
        assert_eq!(root.groups[0].group, "positional arguments");
        assert_eq!(root.groups[1].group, "optional arguments");
        let names: Vec<&str> = root.groups[0].nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["first_pos", "second-pos"]);
    }

    #[test]
    fn test_mutex_ids_sequential_per_set() {
        // Two exclusion sets of two flags each: ids come out {0,0,1,1}
        // regardless of the native set identifiers.
        let commands = [WalkedCommand::root(
            ParserMeta::default(),
            vec![
                flag("foo", Some(7)),
                flag("bar", Some(7)),
                flag("foo2", Some(3)),
                flag("bar2", Some(3)),
            ],
        )];
        let schema = assemble(&source(), &commands).unwrap();

        let ids: Vec<usize> = schema
            .root_inputs()
            .unwrap()
            .nodes()
            .map(|n| n.mutex_group.as_ref().unwrap().id)
            .collect();
        assert_eq!(ids, vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_suppressed_parameter_never_materializes() {
        let mut hidden = positional("secret");
        hidden.default = RawDefault::Suppressed;
        let commands = [WalkedCommand::root(
            ParserMeta::default(),
            vec![positional("visible"), hidden],
        )];
        let schema = assemble(&source(), &commands).unwrap();

        let root = schema.root_inputs().unwrap();
        assert_eq!(root.nodes().count(), 1);
        assert!(root.nodes().all(|n| n.name != "secret"));
    }

    #[test]
    fn test_version_parameter_captured_not_materialized() {
        let mut version = RawParameter::new(ConcreteKind::Version, "version");
        version.version = Some("2.1.0".to_string());
        let commands = [WalkedCommand::root(
            ParserMeta::default(),
            vec![version, positional("input")],
        )];
        let schema = assemble(&source(), &commands).unwrap();

        assert_eq!(schema.version.as_deref(), Some("2.1.0"));
        assert_eq!(schema.root_inputs().unwrap().nodes().count(), 1);
    }

    #[test]
    fn test_parser_level_version_wins() {
        let mut version = RawParameter::new(ConcreteKind::Version, "version");
        version.version = Some("9.9".to_string());
        let commands = [WalkedCommand::root(
            ParserMeta {
                description: None,
                version: Some("1.0".to_string()),
            },
            vec![version],
        )];
        let schema = assemble(&source(), &commands).unwrap();
        assert_eq!(schema.version.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_subcommand_scopes_keyed_by_name() {
        let commands = [
            WalkedCommand::root(ParserMeta::default(), vec![positional("input")]),
            WalkedCommand {
                name: "convert".to_string(),
                meta: ParserMeta::default(),
                params: vec![flag("fast", None)],
            },
        ];
        let schema = assemble(&source(), &commands).unwrap();
        assert_eq!(schema.command_names(), vec!["", "convert"]);
        assert!(schema.find_command("convert").unwrap().find_group("optional arguments").is_some());
    }

    #[test]
    fn test_duplicate_destination_replaces_in_place() {
        let mut second = positional("input");
        second.help = Some("newer".to_string());
        let commands = [WalkedCommand::root(
            ParserMeta::default(),
            vec![positional("input"), second],
        )];
        let schema = assemble(&source(), &commands).unwrap();

        let root = schema.root_inputs().unwrap();
        assert_eq!(root.nodes().count(), 1);
        assert_eq!(root.nodes().next().unwrap().help.as_deref(), Some("newer"));
    }
}
