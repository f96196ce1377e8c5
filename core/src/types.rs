//! Schema type definitions for normalized script inputs.
//!
//! This module defines the data model produced by the extraction engine: a
//! [`ScriptSchema`] describing every input parameter a script declares,
//! normalized away from any particular parsing library. The types are
//! designed for serialization with [`serde`] and round-trip through JSON.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Value-model kind for a normalized field.
///
/// Names follow the form-model convention consumers expect (a Django-style
/// field vocabulary), but nothing here depends on any web framework.
///
/// # Examples
///
/// ```
/// use script_schema_core::FieldModel;
///
/// let model = FieldModel::default();
/// assert_eq!(model, FieldModel::CharField);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FieldModel {
    /// Free-form text value (the default).
    #[default]
    CharField,
    /// Integer value.
    IntegerField,
    /// Floating-point value.
    FloatField,
    /// Boolean value.
    BooleanField,
    /// File value (uploaded or produced).
    FileField,
}

/// Input-widget kind for a normalized field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// Plain text input (the default).
    #[default]
    Text,
    /// Checkbox input.
    Checkbox,
    /// File input.
    File,
}

/// A default or choice value carried over from the script declaration.
///
/// Serializes by shape: `true`, `3`, `2.5`, `"abc"`, `[1, 2]`. Values the
/// engine cannot represent (streams, callables) are never materialized here;
/// the owning attribute is omitted instead.
///
/// # Examples
///
/// ```
/// use script_schema_core::ParamValue;
///
/// let v = ParamValue::List(vec![ParamValue::Int(1), ParamValue::Str("x".into())]);
/// let json = serde_json::to_string(&v).unwrap();
/// assert_eq!(json, r#"[1,"x"]"#);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Returns `true` for the empty string value.
    pub fn is_empty_str(&self) -> bool {
        matches!(self, ParamValue::Str(s) if s.is_empty())
    }
}

/// Behavioral tag attached to a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamAction {
    /// Each supplied value repeats the parameter flag (append-style
    /// declarations collapse several occurrences into one field).
    SpecifyEveryParam,
}

/// How many values a multi-valued parameter accepts.
///
/// Wire format mirrors the arity markers consumers already understand:
/// `"1"`, `">=1"`, `">=0"`, `"..."`, or a bare number for an exact count.
///
/// # Examples
///
/// ```
/// use script_schema_core::ChoiceLimit;
///
/// assert_eq!(serde_json::to_string(&ChoiceLimit::AtLeastOne).unwrap(), r#"">=1""#);
/// assert_eq!(serde_json::to_string(&ChoiceLimit::Exactly(3)).unwrap(), "3");
///
/// let back: ChoiceLimit = serde_json::from_str(r#"">=0""#).unwrap();
/// assert_eq!(back, ChoiceLimit::ZeroOrMore);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceLimit {
    /// At most one value (`?`).
    One,
    /// One or more values (`+`).
    AtLeastOne,
    /// Any number of values (`*`).
    ZeroOrMore,
    /// Exactly this many values.
    Exactly(u32),
    /// Everything that remains on the command line.
    Remainder,
}

impl Serialize for ChoiceLimit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ChoiceLimit::One => serializer.serialize_str("1"),
            ChoiceLimit::AtLeastOne => serializer.serialize_str(">=1"),
            ChoiceLimit::ZeroOrMore => serializer.serialize_str(">=0"),
            ChoiceLimit::Exactly(n) => serializer.serialize_u32(*n),
            ChoiceLimit::Remainder => serializer.serialize_str("..."),
        }
    }
}

struct ChoiceLimitVisitor;

impl Visitor<'_> for ChoiceLimitVisitor {
    type Value = ChoiceLimit;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("an arity marker string or a count")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ChoiceLimit, E> {
        match v {
            "1" => Ok(ChoiceLimit::One),
            ">=1" => Ok(ChoiceLimit::AtLeastOne),
            ">=0" => Ok(ChoiceLimit::ZeroOrMore),
            "..." => Ok(ChoiceLimit::Remainder),
            other => Err(E::custom(format!("unknown arity marker: {other}"))),
        }
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ChoiceLimit, E> {
        u32::try_from(v)
            .map(ChoiceLimit::Exactly)
            .map_err(|_| E::custom("count out of range"))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ChoiceLimit, E> {
        u32::try_from(v)
            .map(ChoiceLimit::Exactly)
            .map_err(|_| E::custom("count out of range"))
    }
}

impl<'de> Deserialize<'de> for ChoiceLimit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ChoiceLimitVisitor)
    }
}

/// Mutual-exclusion group membership.
///
/// Parameters sharing an `id` within one command scope cannot be supplied
/// together. Ids are assigned sequentially from 0 in the order the
/// underlying exclusion sets first appear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutexGroup {
    pub id: usize,
    pub title: Option<String>,
}

/// A single normalized input field.
///
/// Produced once per declared parameter. Attributes the mapping rules leave
/// unset (`value`, `checked`, `upload`, `mutex_group`) are absent from the
/// serialized form rather than null.
///
/// # Examples
///
/// ```
/// use script_schema_core::{FieldModel, FieldSchema, InputKind};
///
/// let field = FieldSchema::new("verbose", FieldModel::BooleanField, InputKind::Checkbox);
/// assert_eq!(field.name, "verbose");
/// assert!(field.value.is_none());
/// let json = serde_json::to_value(&field).unwrap();
/// assert!(json.get("value").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Destination name, unique within its command scope.
    pub name: String,
    /// Value-model kind.
    pub model: FieldModel,
    /// Input-widget kind.
    #[serde(rename = "type")]
    pub input_type: InputKind,
    /// Current/default value. Omitted when the declaration carries no
    /// meaningful default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ParamValue>,
    /// Whether the parameter must be supplied.
    pub required: bool,
    /// Help text from the declaration.
    pub help: Option<String>,
    /// The flag used to pass the parameter (first declared form), or the
    /// empty string for positionals.
    pub param: String,
    /// Behavioral tags (see [`ParamAction`]).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub param_action: Vec<ParamAction>,
    /// Allowed values, when the declaration restricts them.
    pub choices: Option<Vec<ParamValue>>,
    /// Arity marker for multi-valued parameters.
    pub choice_limit: Option<ChoiceLimit>,
    /// Initial checkbox state (boolean flag kinds only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    /// Whether the file travels from the user to the script (file kinds only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<bool>,
    /// Mutual-exclusion membership, when the parameter belongs to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutex_group: Option<MutexGroup>,
}

impl FieldSchema {
    /// Creates a field with the given name, model, and widget kind. All
    /// optional attributes start unset.
    pub fn new(name: &str, model: FieldModel, input_type: InputKind) -> Self {
        Self {
            name: name.to_string(),
            model,
            input_type,
            value: None,
            required: false,
            help: None,
            param: String::new(),
            param_action: Vec::new(),
            choices: None,
            choice_limit: None,
            checked: None,
            upload: None,
            mutex_group: None,
        }
    }
}

/// An ordered group of fields sharing a declaration container.
///
/// The label is the container title from the source declaration (e.g.
/// `"positional arguments"`); node order mirrors declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputGroup {
    pub group: String,
    pub nodes: Vec<FieldSchema>,
}

impl InputGroup {
    pub fn new(group: &str) -> Self {
        Self {
            group: group.to_string(),
            nodes: Vec::new(),
        }
    }

    /// Finds a node by name.
    pub fn find_node(&self, name: &str) -> Option<&FieldSchema> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

/// The group list for one command scope.
///
/// `command` is the sub-command name, or the empty string for parameters of
/// the script itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandInputs {
    pub command: String,
    pub groups: Vec<InputGroup>,
}

impl CommandInputs {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            groups: Vec::new(),
        }
    }

    /// Returns `true` for the root (no sub-command) scope.
    pub fn is_root(&self) -> bool {
        self.command.is_empty()
    }

    /// Finds a group by label.
    pub fn find_group(&self, label: &str) -> Option<&InputGroup> {
        self.groups.iter().find(|g| g.group == label)
    }

    /// Iterates every node in every group, in order.
    pub fn nodes(&self) -> impl Iterator<Item = &FieldSchema> {
        self.groups.iter().flat_map(|g| g.nodes.iter())
    }
}

/// Complete normalized schema for one script.
///
/// This is the primary type in the crate: the extraction engine's output
/// and the input to form generators and documentation renderers.
///
/// # Examples
///
/// ```
/// use script_schema_core::*;
///
/// let mut schema = ScriptSchema::new("trim_reads", "/opt/scripts/trim_reads.py");
/// schema.description = Some("Trim sequencing reads".into());
///
/// let mut root = CommandInputs::new("");
/// let mut group = InputGroup::new("optional arguments");
/// group.nodes.push(FieldSchema::new("verbose", FieldModel::BooleanField, InputKind::Checkbox));
/// root.groups.push(group);
/// schema.inputs.push(root);
///
/// assert!(schema.root_inputs().is_some());
/// assert_eq!(schema.command_names(), vec![""]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSchema {
    /// Script name (file stem).
    pub name: String,
    /// Path the script was read from.
    pub path: String,
    /// Script description from its declaration, if any.
    pub description: Option<String>,
    /// Script version, when a version construct or declaration carries one.
    pub version: Option<String>,
    /// One entry per command scope, root first.
    pub inputs: Vec<CommandInputs>,
}

impl ScriptSchema {
    /// Creates an empty schema for the given script name and path.
    pub fn new(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            description: None,
            version: None,
            inputs: Vec::new(),
        }
    }

    /// Returns the root scope (the entry with the empty command name).
    pub fn root_inputs(&self) -> Option<&CommandInputs> {
        self.inputs.iter().find(|c| c.is_root())
    }

    /// Finds a command scope by name.
    pub fn find_command(&self, name: &str) -> Option<&CommandInputs> {
        self.inputs.iter().find(|c| c.command == name)
    }

    /// All command scope names in order.
    pub fn command_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|c| c.command.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_limit_wire_strings() {
        assert_eq!(serde_json::to_string(&ChoiceLimit::One).unwrap(), "\"1\"");
        assert_eq!(
            serde_json::to_string(&ChoiceLimit::AtLeastOne).unwrap(),
            "\">=1\""
        );
        assert_eq!(
            serde_json::to_string(&ChoiceLimit::ZeroOrMore).unwrap(),
            "\">=0\""
        );
        assert_eq!(serde_json::to_string(&ChoiceLimit::Exactly(2)).unwrap(), "2");
        assert_eq!(
            serde_json::to_string(&ChoiceLimit::Remainder).unwrap(),
            "\"...\""
        );
    }

    #[test]
    fn test_choice_limit_round_trip() {
        for limit in [
            ChoiceLimit::One,
            ChoiceLimit::AtLeastOne,
            ChoiceLimit::ZeroOrMore,
            ChoiceLimit::Exactly(4),
            ChoiceLimit::Remainder,
        ] {
            let json = serde_json::to_string(&limit).unwrap();
            let back: ChoiceLimit = serde_json::from_str(&json).unwrap();
            assert_eq!(back, limit);
        }
    }

    #[test]
    fn test_unset_attributes_are_absent() {
        let field = FieldSchema::new("input", FieldModel::CharField, InputKind::Text);
        let json = serde_json::to_value(&field).unwrap();
        let object = json.as_object().unwrap();

        assert!(!object.contains_key("value"));
        assert!(!object.contains_key("checked"));
        assert!(!object.contains_key("upload"));
        assert!(!object.contains_key("mutex_group"));
        // Always-present attributes serialize even when null.
        assert!(object.contains_key("help"));
        assert!(object.contains_key("choices"));
    }

    #[test]
    fn test_field_schema_round_trip() {
        let mut field = FieldSchema::new("count", FieldModel::IntegerField, InputKind::Text);
        field.value = Some(ParamValue::Int(3));
        field.choices = Some(vec![ParamValue::Int(1), ParamValue::Int(3)]);
        field.choice_limit = Some(ChoiceLimit::One);
        field.mutex_group = Some(MutexGroup { id: 0, title: None });

        let json = serde_json::to_string(&field).unwrap();
        let back: FieldSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, field);
    }

    #[test]
    fn test_schema_scope_lookup() {
        let mut schema = ScriptSchema::new("tool", "/tmp/tool.py");
        schema.inputs.push(CommandInputs::new(""));
        schema.inputs.push(CommandInputs::new("convert"));

        assert!(schema.root_inputs().is_some());
        assert!(schema.find_command("convert").is_some());
        assert!(schema.find_command("missing").is_none());
        assert_eq!(schema.command_names(), vec!["", "convert"]);
    }
}
