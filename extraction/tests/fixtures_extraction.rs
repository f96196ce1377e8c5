use std::fs;
use std::path::PathBuf;

use script_schema_core::{
    ChoiceLimit, FieldModel, InputKind, ParamValue, ScriptSchema, validate_schema,
};
use script_schema_extraction::{EngineError, Registry, ScriptSource, parse_script_source};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/scripts")
        .join(name)
}

fn fixture(name: &str) -> ScriptSchema {
    let path = fixture_path(name);
    let text = fs::read_to_string(&path).expect("fixture should exist");
    parse_script_source(&path, text).expect("fixture should extract")
}

#[test]
fn test_choices_script_positional_group() {
    let schema = fixture("choices.py");

    assert_eq!(schema.name, "choices");
    assert!(schema.path.ends_with("choices.py"));
    assert_eq!(schema.description.as_deref(), Some("Something"));

    let root = schema.root_inputs().expect("root scope");
    let positionals = root.find_group("positional arguments").expect("group");
    let names: Vec<&str> = positionals.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["first_pos", "second-pos"]);

    for node in &positionals.nodes {
        assert_eq!(node.model, FieldModel::CharField);
        assert_eq!(node.input_type, InputKind::Text);
        assert!(node.required);
        assert!(node.value.is_none());
        assert_eq!(node.param, "");
        assert!(node.help.is_none());
    }
}

#[test]
fn test_choices_script_choice_sets() {
    let schema = fixture("choices.py");
    let root = schema.root_inputs().unwrap();
    let optionals = root.find_group("optional arguments").unwrap();

    let one = optionals.find_node("one_choice").expect("one_choice");
    assert_eq!(
        one.choices,
        Some(vec![
            ParamValue::Str("a".into()),
            ParamValue::Str("b".into())
        ])
    );

    let multi = optionals.find_node("multi_choice").expect("multi_choice");
    assert_eq!(multi.choice_limit, Some(ChoiceLimit::AtLeastOne));

    let int_choice = optionals.find_node("int_choice").expect("int_choice");
    assert_eq!(int_choice.model, FieldModel::IntegerField);
    assert_eq!(
        int_choice.choices,
        Some(vec![
            ParamValue::Int(1),
            ParamValue::Int(2),
            ParamValue::Int(3)
        ])
    );
}

#[test]
fn test_mutually_exclusive_sets_get_sequential_ids() {
    let schema = fixture("mutually_exclusive.py");
    let root = schema.root_inputs().unwrap();

    let ids: Vec<usize> = ["foo", "bar", "foo2", "bar2"]
        .iter()
        .map(|name| {
            root.nodes()
                .find(|n| n.name == *name)
                .unwrap_or_else(|| panic!("missing node {name}"))
                .mutex_group
                .as_ref()
                .expect("mutex membership")
                .id
        })
        .collect();
    assert_eq!(ids, vec![0, 0, 1, 1]);

    // Boolean flags: checkbox nodes with checked mirroring the default.
    let foo = root.nodes().find(|n| n.name == "foo").unwrap();
    assert_eq!(foo.model, FieldModel::BooleanField);
    assert_eq!(foo.checked, Some(false));
    assert!(foo.value.is_none());
    let bar = root.nodes().find(|n| n.name == "bar").unwrap();
    assert_eq!(bar.checked, Some(true));
}

#[test]
fn test_function_argtype_falls_back_to_text() {
    let schema = fixture("function_argtype.py");
    let root = schema.root_inputs().unwrap();
    let positionals = root.find_group("positional arguments").unwrap();

    let start_date = positionals.find_node("start_date").expect("start_date");
    assert_eq!(start_date.model, FieldModel::CharField);
    assert_eq!(start_date.value, Some(ParamValue::Str("20180131".into())));

    let lowercase = positionals.find_node("lowercase").expect("lowercase");
    assert_eq!(lowercase.model, FieldModel::CharField);
    assert_eq!(lowercase.value, Some(ParamValue::Str("ABC".into())));
}

#[test]
fn test_error_script_reports_each_strategy() {
    let path = fixture_path("error_script.py");
    let text = fs::read_to_string(&path).unwrap();
    let error = parse_script_source(&path, text).unwrap_err();

    match &error {
        EngineError::Selection { backend, .. } => assert_eq!(*backend, "argparse"),
        other => panic!("expected selection error, got {other:?}"),
    }
    let rendered = error.to_string();
    assert!(rendered.contains("something_i_dont_have"));
    assert!(rendered.contains("intercepted-exec"));
    assert!(rendered.contains("module-load"));
    assert!(rendered.contains("normalized-load"));
}

#[test]
fn test_file_types_upload_direction() {
    let schema = fixture("file_types.py");
    let root = schema.root_inputs().unwrap();
    let optionals = root.find_group("optional arguments").unwrap();

    let input = optionals.find_node("input").expect("input");
    assert_eq!(input.model, FieldModel::FileField);
    assert_eq!(input.input_type, InputKind::File);
    assert_eq!(input.upload, Some(true));
    assert!(input.required);
    assert!(input.value.is_none());

    let output = optionals.find_node("output").expect("output");
    assert_eq!(output.upload, Some(false));
    // A standard-stream default makes the parameter effectively required.
    assert!(output.required);

    let log = optionals.find_node("log").expect("log");
    assert_eq!(log.upload, Some(false));
    assert!(!log.required);
}

#[test]
fn test_subcommands_map_one_scope_each() {
    let schema = fixture("subcommands.py");

    assert_eq!(schema.command_names(), vec!["", "convert", "report"]);

    let root = schema.root_inputs().unwrap();
    assert!(root.nodes().any(|n| n.name == "verbose"));

    let convert = schema.find_command("convert").unwrap();
    let source = convert
        .find_group("positional arguments")
        .unwrap()
        .find_node("source")
        .expect("source");
    assert!(source.required);
    assert!(convert.nodes().any(|n| n.name == "fast"));

    let report = schema.find_command("report").unwrap();
    let format = report.nodes().find(|n| n.name == "format").expect("format");
    assert_eq!(format.value, Some(ParamValue::Str("txt".into())));
    assert_eq!(
        format.choices,
        Some(vec![
            ParamValue::Str("txt".into()),
            ParamValue::Str("html".into())
        ])
    );
}

#[test]
fn test_suppressed_parameter_absent_from_every_group() {
    let schema = fixture("suppressed.py");
    let root = schema.root_inputs().unwrap();

    assert!(root.nodes().all(|n| n.name != "internal"));
    let visible = root.nodes().find(|n| n.name == "visible").expect("visible");
    assert_eq!(visible.value, Some(ParamValue::Str("x".into())));
}

#[test]
fn test_version_action_supplies_schema_version() {
    let schema = fixture("versioned.py");
    assert_eq!(schema.version.as_deref(), Some("%(prog)s 2.5"));
    let root = schema.root_inputs().unwrap();
    assert!(root.nodes().all(|n| n.name != "version"));
}

#[test]
fn test_unavailable_imports_recovered_by_normalization() {
    let schema = fixture("bad_imports.py");

    assert_eq!(schema.description.as_deref(), Some("Stats tool"));
    let root = schema.root_inputs().unwrap();
    assert!(root.nodes().any(|n| n.name == "data"));
    let bins = root.nodes().find(|n| n.name == "bins").expect("bins");
    assert_eq!(bins.model, FieldModel::IntegerField);
    assert_eq!(bins.value, Some(ParamValue::Int(10)));
}

#[test]
fn test_docopt_script_extracts_options() {
    let schema = fixture("docopt_script.py");

    assert!(
        schema
            .description
            .as_deref()
            .unwrap()
            .starts_with("Count lines.")
    );
    let root = schema.root_inputs().unwrap();
    let group = root.find_group("default").expect("default group");

    let max = group.find_node("max").expect("max");
    assert_eq!(max.model, FieldModel::IntegerField);
    assert_eq!(max.value, Some(ParamValue::Int(100)));

    let verbose = group.find_node("verbose").expect("verbose");
    assert_eq!(verbose.model, FieldModel::BooleanField);
    assert_eq!(verbose.input_type, InputKind::Checkbox);
}

#[test]
fn test_schema_round_trips_through_json() {
    let schema = fixture("subcommands.py");
    let json = serde_json::to_string(&schema).expect("serialize");
    let back: ScriptSchema = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, schema);
}

#[test]
fn test_extraction_is_idempotent() {
    let path = fixture_path("mutually_exclusive.py");
    let text = fs::read_to_string(&path).unwrap();
    let first = parse_script_source(&path, text.clone()).unwrap();
    let second = parse_script_source(&path, text).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_extracted_schemas_hold_structural_invariants() {
    for name in [
        "choices.py",
        "mutually_exclusive.py",
        "function_argtype.py",
        "file_types.py",
        "subcommands.py",
        "suppressed.py",
        "versioned.py",
        "bad_imports.py",
        "docopt_script.py",
    ] {
        let schema = fixture(name);
        let errors = validate_schema(&schema);
        assert!(errors.is_empty(), "{name}: {errors:?}");
    }
}

#[test]
fn test_backend_scores_rank_argparse_first() {
    let path = fixture_path("choices.py");
    let text = fs::read_to_string(&path).unwrap();
    let source = ScriptSource::new(&path, text);
    let scores = Registry::standard().scores(&source);

    assert_eq!(scores[0].0, "argparse");
    assert_eq!(scores[0].1, 1.0);
    assert!(scores[1].1 < 1.0);
}
