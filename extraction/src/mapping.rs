//! Table-driven mapping from declared types to normalized field rules.
//!
//! Every parameter resolves to exactly one [`FieldMappingRule`] through a
//! deterministic lookup: a kind-specific override table first (boolean
//! flag constructs map differently from general value stores), then exact
//! type-key match, the file-mode refinement, and finally the invocable
//! fallback. Resolution failure means the tables have a coverage gap and
//! surfaces as a [`TypeResolutionError`] instead of a guessed field.

use script_schema_core::{FieldModel, FieldSchema, InputKind, ParamAction, ParamValue};

use crate::error::TypeResolutionError;
use crate::raw::{ConcreteKind, DeclaredType, RawDefault, RawParameter, StreamKind};

/// Table key a declared type can match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKey {
    NotDeclared,
    Str,
    Int,
    Float,
    Bool,
    FileType,
    Callable,
}

/// How one output attribute is produced from a raw parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrRule {
    /// `value` ← default (omitted entirely when the null check fires or
    /// the default is not representable).
    Value,
    /// `required` ← declared requiredness.
    Required,
    /// `required` ← declared requiredness, or a default pointing at a
    /// standard input/output stream.
    RequiredOrStandardStream,
    /// `help` ← declared help text.
    Help,
    /// `param` ← first declared flag string.
    Param,
    /// `param_action` ← behavioral tags derived from the concrete kind.
    ParamAction,
    /// `choices` ← declared choice set.
    Choices,
    /// `choice_limit` ← declared arity marker.
    ChoiceLimit,
    /// `checked` ← the boolean default.
    Checked,
    /// `upload` ← file-mode heuristic (readable, not a standard stream).
    Upload,
}

/// One mapping table entry: the output model and widget kind, the
/// default-is-null check, and the ordered attribute rules.
pub struct FieldMappingRule {
    pub model: FieldModel,
    pub input: InputKind,
    pub null_check: fn(&RawParameter) -> bool,
    pub attrs: &'static [AttrRule],
}

fn null_when_none(raw: &RawParameter) -> bool {
    raw.default_is_none()
}

fn null_when_none_or_empty(raw: &RawParameter) -> bool {
    raw.default_is_none()
        || matches!(&raw.default, RawDefault::Value(v) if v.is_empty_str())
}

fn null_never(_raw: &RawParameter) -> bool {
    false
}

fn null_when_callable_or_none(raw: &RawParameter) -> bool {
    matches!(raw.default, RawDefault::Callable) || raw.default_is_none()
}

const GLOBAL_ATTRS: &[AttrRule] = &[
    AttrRule::Value,
    AttrRule::Required,
    AttrRule::Help,
    AttrRule::Param,
    AttrRule::ParamAction,
    AttrRule::Choices,
    AttrRule::ChoiceLimit,
];

/// File fields never carry a value; requiredness also follows stream
/// defaults, and the upload direction is derived from the open mode.
const FILE_ATTRS: &[AttrRule] = &[
    AttrRule::RequiredOrStandardStream,
    AttrRule::Help,
    AttrRule::Param,
    AttrRule::ParamAction,
    AttrRule::Choices,
    AttrRule::ChoiceLimit,
    AttrRule::Upload,
];

/// Boolean flag constructs carry a checkbox state instead of a value.
const CHECKBOX_ATTRS: &[AttrRule] = &[
    AttrRule::Required,
    AttrRule::Help,
    AttrRule::Param,
    AttrRule::ParamAction,
    AttrRule::Choices,
    AttrRule::ChoiceLimit,
    AttrRule::Checked,
];

static GENERIC_TABLE: &[(TypeKey, FieldMappingRule)] = &[
    (
        TypeKey::Bool,
        FieldMappingRule {
            model: FieldModel::BooleanField,
            input: InputKind::Checkbox,
            null_check: null_when_none,
            attrs: GLOBAL_ATTRS,
        },
    ),
    (
        TypeKey::Float,
        FieldMappingRule {
            model: FieldModel::FloatField,
            input: InputKind::Text,
            null_check: null_when_none,
            attrs: GLOBAL_ATTRS,
        },
    ),
    (
        TypeKey::Int,
        FieldMappingRule {
            model: FieldModel::IntegerField,
            input: InputKind::Text,
            null_check: null_when_none,
            attrs: GLOBAL_ATTRS,
        },
    ),
    (
        TypeKey::NotDeclared,
        FieldMappingRule {
            model: FieldModel::CharField,
            input: InputKind::Text,
            null_check: null_when_none,
            attrs: GLOBAL_ATTRS,
        },
    ),
    (
        TypeKey::Str,
        FieldMappingRule {
            model: FieldModel::CharField,
            input: InputKind::Text,
            null_check: null_when_none_or_empty,
            attrs: GLOBAL_ATTRS,
        },
    ),
    (
        TypeKey::FileType,
        FieldMappingRule {
            model: FieldModel::FileField,
            input: InputKind::File,
            null_check: null_never,
            attrs: FILE_ATTRS,
        },
    ),
    (
        TypeKey::Callable,
        FieldMappingRule {
            model: FieldModel::CharField,
            input: InputKind::Text,
            null_check: null_when_callable_or_none,
            attrs: GLOBAL_ATTRS,
        },
    ),
];

/// Override table for boolean flag kinds: an untyped flag is a checkbox,
/// not a text field. Every other row matches the generic table.
static FLAG_TABLE: &[(TypeKey, FieldMappingRule)] = &[
    (
        TypeKey::Bool,
        FieldMappingRule {
            model: FieldModel::BooleanField,
            input: InputKind::Checkbox,
            null_check: null_when_none,
            attrs: GLOBAL_ATTRS,
        },
    ),
    (
        TypeKey::Float,
        FieldMappingRule {
            model: FieldModel::FloatField,
            input: InputKind::Text,
            null_check: null_when_none,
            attrs: GLOBAL_ATTRS,
        },
    ),
    (
        TypeKey::Int,
        FieldMappingRule {
            model: FieldModel::IntegerField,
            input: InputKind::Text,
            null_check: null_when_none,
            attrs: GLOBAL_ATTRS,
        },
    ),
    (
        TypeKey::NotDeclared,
        FieldMappingRule {
            model: FieldModel::BooleanField,
            input: InputKind::Checkbox,
            null_check: null_when_none,
            attrs: CHECKBOX_ATTRS,
        },
    ),
    (
        TypeKey::Str,
        FieldMappingRule {
            model: FieldModel::CharField,
            input: InputKind::Text,
            null_check: null_when_none_or_empty,
            attrs: GLOBAL_ATTRS,
        },
    ),
    (
        TypeKey::FileType,
        FieldMappingRule {
            model: FieldModel::FileField,
            input: InputKind::File,
            null_check: null_never,
            attrs: FILE_ATTRS,
        },
    ),
    (
        TypeKey::Callable,
        FieldMappingRule {
            model: FieldModel::CharField,
            input: InputKind::Text,
            null_check: null_when_callable_or_none,
            attrs: GLOBAL_ATTRS,
        },
    ),
];

fn table_for(kind: ConcreteKind) -> &'static [(TypeKey, FieldMappingRule)] {
    match kind {
        ConcreteKind::Flag | ConcreteKind::NegatedFlag => FLAG_TABLE,
        _ => GENERIC_TABLE,
    }
}

fn exact_key(declared: &DeclaredType) -> Option<TypeKey> {
    match declared {
        DeclaredType::NotDeclared => Some(TypeKey::NotDeclared),
        DeclaredType::Str => Some(TypeKey::Str),
        DeclaredType::Int => Some(TypeKey::Int),
        DeclaredType::Float => Some(TypeKey::Float),
        DeclaredType::Bool => Some(TypeKey::Bool),
        _ => None,
    }
}

/// Resolves the single mapping rule for a parameter.
///
/// Resolution is a pure function of the concrete kind and declared type;
/// identical inputs always produce the same rule.
pub fn resolve(raw: &RawParameter) -> Result<&'static FieldMappingRule, TypeResolutionError> {
    let table = table_for(raw.kind);

    if let Some(key) = exact_key(&raw.declared_type)
        && let Some((_, rule)) = table.iter().find(|(k, _)| *k == key)
    {
        return Ok(rule);
    }

    // The declared-type tags admit one refinement: a concrete file type
    // with a mode matches the file key.
    if matches!(raw.declared_type, DeclaredType::FileType { .. })
        && let Some((_, rule)) = table.iter().find(|(k, _)| *k == TypeKey::FileType)
    {
        return Ok(rule);
    }

    // A user-supplied conversion routine falls back to plain text input.
    if matches!(raw.declared_type, DeclaredType::Callable(_))
        && let Some((_, rule)) = table.iter().find(|(k, _)| *k == TypeKey::Callable)
    {
        return Ok(rule);
    }

    Err(TypeResolutionError::Unknown {
        kind: raw.kind.label().to_string(),
        declared: raw.declared_type.label(),
        dest: raw.dest.clone(),
    })
}

/// Builds the normalized field from a resolved rule and a raw parameter.
///
/// Undeclared attributes stay absent; `value` is omitted entirely when the
/// rule's null check fires.
pub fn build_field(rule: &FieldMappingRule, raw: &RawParameter) -> FieldSchema {
    let mut field = FieldSchema::new(&raw.dest, rule.model, rule.input);
    let null = (rule.null_check)(raw);

    for attr in rule.attrs {
        match attr {
            AttrRule::Value => {
                if !null
                    && let RawDefault::Value(value) = &raw.default
                {
                    field.value = Some(value.clone());
                }
            }
            AttrRule::Required => field.required = raw.required,
            AttrRule::RequiredOrStandardStream => {
                field.required = raw.required
                    || matches!(
                        raw.default,
                        RawDefault::Stream(StreamKind::Stdout) | RawDefault::Stream(StreamKind::Stdin)
                    );
            }
            AttrRule::Help => field.help = raw.help.clone(),
            AttrRule::Param => field.param = raw.first_flag().to_string(),
            AttrRule::ParamAction => {
                field.param_action = if raw.kind == ConcreteKind::Append {
                    vec![ParamAction::SpecifyEveryParam]
                } else {
                    Vec::new()
                };
            }
            AttrRule::Choices => field.choices = raw.choices.clone(),
            AttrRule::ChoiceLimit => field.choice_limit = raw.arity,
            AttrRule::Checked => {
                field.checked = match &raw.default {
                    RawDefault::Value(ParamValue::Bool(b)) => Some(*b),
                    _ => None,
                };
            }
            AttrRule::Upload => field.upload = Some(is_upload(raw)),
        }
    }

    field
}

/// A file travels from the user when the script opens it for reading and
/// its default is not one of the output streams.
fn is_upload(raw: &RawParameter) -> bool {
    let readable = matches!(&raw.declared_type, DeclaredType::FileType { mode } if mode.contains('r'));
    readable
        && !matches!(
            raw.default,
            RawDefault::Stream(StreamKind::Stdout) | RawDefault::Stream(StreamKind::Stderr)
        )
}
