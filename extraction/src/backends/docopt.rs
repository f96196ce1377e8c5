//! Backend for the docopt declaration style.
//!
//! Docopt-style scripts declare their interface in the module docstring.
//! The pipeline captures the docstring, and the walk parses its option
//! rows: flag forms on the left of a two-space column break, description
//! and `[default: ...]` annotation on the right. Value types are guessed
//! from the default (int, then float, then string), mirroring how these
//! declarations carry no explicit type information.

use std::sync::LazyLock;

use regex::Regex;

use script_schema_core::{ParamValue, ScriptSchema};

use crate::assembler::{ParserMeta, WalkedCommand, assemble};
use crate::backends::{Backend, BackendError, python_extension};
use crate::pipeline::capture_docstring;
use crate::raw::{ConcreteKind, DeclaredType, RawDefault, RawParameter};
use crate::source::ScriptSource;

static PATTERNS: LazyLock<DocPatterns> = LazyLock::new(DocPatterns::new);

struct DocPatterns {
    column_break: Regex,
    default_value: Regex,
    long_flag: Regex,
    short_flag: Regex,
}

impl DocPatterns {
    fn new() -> Self {
        // All regexes here are compile-time constants. An expect() failure
        // indicates a programmer error in the pattern, not a runtime
        // condition.
        Self {
            column_break: Regex::new(r"\t+| {2,}").expect("static regex must compile"),
            default_value: Regex::new(r"(?i)\[default:\s*([^\]]*)\]")
                .expect("static regex must compile"),
            long_flag: Regex::new(r"^--[a-zA-Z][-a-zA-Z0-9]*$").expect("static regex must compile"),
            short_flag: Regex::new(r"^-[a-zA-Z]$").expect("static regex must compile"),
        }
    }
}

/// Extracts schemas from scripts whose interface lives in the module
/// docstring.
pub struct DocoptBackend;

impl Backend for DocoptBackend {
    fn id(&self) -> &'static str {
        "docopt"
    }

    fn heuristics(&self, source: &ScriptSource) -> Vec<bool> {
        let text = source.text();
        vec![
            python_extension(source),
            text.contains("docopt"),
            text.contains("__doc__"),
        ]
    }

    fn build(&self, source: &ScriptSource) -> Result<ScriptSchema, BackendError> {
        let captured = capture_docstring(source)?;
        let params = walk_options(&captured.docstring);
        let commands = [WalkedCommand::root(
            ParserMeta {
                description: Some(captured.docstring.trim().to_string()),
                version: None,
            },
            params,
        )];
        Ok(assemble(source, &commands)?)
    }
}

/// One parsed option row before conversion to a raw parameter.
struct OptionRow {
    short: Option<String>,
    long: Option<String>,
    takes_value: bool,
    default: Option<String>,
    description: Option<String>,
}

/// Walks the docstring's option rows in order.
fn walk_options(docstring: &str) -> Vec<RawParameter> {
    docstring
        .lines()
        .filter_map(parse_option_row)
        .filter(|row| {
            row.long.as_deref() != Some("--help")
                && row.long.as_deref() != Some("--version")
                && row.short.as_deref() != Some("-h")
        })
        .map(to_raw)
        .collect()
}

fn parse_option_row(line: &str) -> Option<OptionRow> {
    let trimmed = line.trim_start();
    if !trimmed.starts_with('-') {
        return None;
    }

    let (definition, description) = match PATTERNS.column_break.find(trimmed) {
        Some(found) => {
            let (left, right) = trimmed.split_at(found.start());
            (left, Some(right.trim().to_string()))
        }
        None => (trimmed, None),
    };

    let mut short = None;
    let mut long = None;
    let mut takes_value = false;
    for token in definition.replace([',', '='], " ").split_whitespace() {
        if PATTERNS.long_flag.is_match(token) {
            long = Some(token.to_string());
        } else if PATTERNS.short_flag.is_match(token) {
            short = Some(token.to_string());
        } else {
            takes_value = true;
        }
    }
    if short.is_none() && long.is_none() {
        return None;
    }

    let default = if takes_value {
        description.as_ref().and_then(|desc| {
            PATTERNS
                .default_value
                .captures(desc)
                .map(|c| c[1].trim().to_string())
        })
    } else {
        None
    };

    Some(OptionRow {
        short,
        long,
        takes_value,
        default,
        description,
    })
}

fn to_raw(row: OptionRow) -> RawParameter {
    let name = row
        .long
        .as_deref()
        .or(row.short.as_deref())
        .unwrap_or_default()
        .trim_start_matches('-')
        .to_string();

    let kind = if row.takes_value {
        ConcreteKind::Store
    } else {
        ConcreteKind::Flag
    };
    let mut raw = RawParameter::new(kind, &name);
    raw.help = row.description;
    raw.container = "default".to_string();

    // The long form is the canonical way to pass the option.
    if let Some(long) = row.long {
        raw.flag_strings.push(long);
    }
    if let Some(short) = row.short {
        raw.flag_strings.push(short);
    }

    if row.takes_value {
        let (declared, default) = guess_type(row.default.as_deref());
        raw.declared_type = declared;
        raw.default = default;
    } else {
        raw.default = RawDefault::Value(ParamValue::Bool(false));
    }

    raw
}

/// Guesses a value type from a default literal: int first, then float,
/// then string. No default means no declared type at all.
fn guess_type(default: Option<&str>) -> (DeclaredType, RawDefault) {
    let Some(text) = default else {
        return (DeclaredType::NotDeclared, RawDefault::None);
    };
    if let Ok(int) = text.parse::<i64>() {
        return (DeclaredType::Int, RawDefault::Value(ParamValue::Int(int)));
    }
    if let Ok(float) = text.parse::<f64>() {
        return (
            DeclaredType::Float,
            RawDefault::Value(ParamValue::Float(float)),
        );
    }
    (
        DeclaredType::Str,
        RawDefault::Value(ParamValue::Str(text.to_string())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use script_schema_core::{FieldModel, InputKind};

    const DOC_SCRIPT: &str = "\
\"\"\"Naval Fate.

Usage:
  naval_fate.py ship shoot <x> <y> [--speed=<kn>] [--drifting]

Options:
  -s, --speed=<kn>  Speed in knots [default: 10]
  --drifting        Drifting mine.
  --moored          Moored mine.
  -h, --help        Show this screen.
  --version         Show version.
\"\"\"
import docopt

arguments = docopt.docopt(__doc__)
";

    fn source() -> ScriptSource {
        ScriptSource::new("/tmp/scripts/naval_fate.py", DOC_SCRIPT)
    }

    #[test]
    fn test_heuristics_match_docopt_scripts() {
        let backend = DocoptBackend;
        assert_eq!(backend.score(&source()), 1.0);
    }

    #[test]
    fn test_option_rows_walk_in_order() {
        let backend = DocoptBackend;
        let schema = backend.build(&source()).unwrap();

        let root = schema.root_inputs().unwrap();
        let group = root.find_group("default").unwrap();
        let names: Vec<&str> = group.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["speed", "drifting", "moored"]);
    }

    #[test]
    fn test_default_guesses_type() {
        let backend = DocoptBackend;
        let schema = backend.build(&source()).unwrap();

        let root = schema.root_inputs().unwrap();
        let speed = root.find_group("default").unwrap().find_node("speed").unwrap();
        assert_eq!(speed.model, FieldModel::IntegerField);
        assert_eq!(speed.value, Some(ParamValue::Int(10)));
        assert_eq!(speed.param, "--speed");
    }

    #[test]
    fn test_flags_without_values_are_checkboxes() {
        let backend = DocoptBackend;
        let schema = backend.build(&source()).unwrap();

        let root = schema.root_inputs().unwrap();
        let drifting = root
            .find_group("default")
            .unwrap()
            .find_node("drifting")
            .unwrap();
        assert_eq!(drifting.model, FieldModel::BooleanField);
        assert_eq!(drifting.input_type, InputKind::Checkbox);
        assert_eq!(drifting.checked, Some(false));
    }

    #[test]
    fn test_help_and_version_rows_skipped() {
        let backend = DocoptBackend;
        let schema = backend.build(&source()).unwrap();
        let root = schema.root_inputs().unwrap();
        assert!(root.nodes().all(|n| n.name != "help" && n.name != "version"));
    }

    #[test]
    fn test_docstring_becomes_description() {
        let backend = DocoptBackend;
        let schema = backend.build(&source()).unwrap();
        assert!(schema.description.unwrap().starts_with("Naval Fate."));
    }
}
