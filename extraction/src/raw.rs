//! Backend-native parameter records, pre-normalization.
//!
//! Each backend walks its captured parser and emits one [`RawParameter`]
//! per declared argument. The record is the contract between backends and
//! the mapping/assembly layers: everything downstream dispatches on the
//! explicit [`ConcreteKind`] and [`DeclaredType`] tags rather than
//! inspecting backend-native objects.

use script_schema_core::{ChoiceLimit, ParamValue};

/// The declaring construct for a parameter, as a closed tag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConcreteKind {
    /// Plain value-storing parameter.
    Store,
    /// Boolean flag that turns a value on.
    Flag,
    /// Boolean flag that turns a value off.
    NegatedFlag,
    /// Stores a fixed constant when supplied.
    StoreConst,
    /// Collects one value per occurrence.
    Append,
    /// Collects a fixed constant per occurrence.
    AppendConst,
    /// Counts occurrences.
    Count,
    /// Prints help and exits.
    Help,
    /// Prints a version string and exits.
    Version,
}

impl ConcreteKind {
    pub fn label(&self) -> &'static str {
        match self {
            ConcreteKind::Store => "store",
            ConcreteKind::Flag => "flag",
            ConcreteKind::NegatedFlag => "negated-flag",
            ConcreteKind::StoreConst => "store-const",
            ConcreteKind::Append => "append",
            ConcreteKind::AppendConst => "append-const",
            ConcreteKind::Count => "count",
            ConcreteKind::Help => "help",
            ConcreteKind::Version => "version",
        }
    }
}

/// The value type a parameter declares for its input, as a closed tag set.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclaredType {
    /// No explicit type on the declaration.
    NotDeclared,
    Str,
    Int,
    Float,
    Bool,
    /// A file-conversion type with its open mode (e.g. `"r"`, `"wb"`).
    FileType { mode: String },
    /// A user-supplied conversion routine; the name is diagnostic only.
    Callable(String),
    /// Something the backend could not classify (and could not even treat
    /// as invocable).
    Unknown,
}

impl DeclaredType {
    pub fn label(&self) -> String {
        match self {
            DeclaredType::NotDeclared => "<none>".to_string(),
            DeclaredType::Str => "str".to_string(),
            DeclaredType::Int => "int".to_string(),
            DeclaredType::Float => "float".to_string(),
            DeclaredType::Bool => "bool".to_string(),
            DeclaredType::FileType { mode } => format!("file({mode})"),
            DeclaredType::Callable(name) => format!("callable({name})"),
            DeclaredType::Unknown => "<unknown>".to_string(),
        }
    }
}

/// A standard stream a default may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
}

/// A parameter's declared default, reduced to what mapping rules inspect.
#[derive(Debug, Clone, PartialEq)]
pub enum RawDefault {
    /// No default, or an explicit null default.
    None,
    /// A representable value.
    Value(ParamValue),
    /// A standard stream.
    Stream(StreamKind),
    /// An invocable default.
    Callable,
    /// The suppressed/hidden sentinel.
    Suppressed,
    /// Present but not representable.
    Opaque,
}

/// Mutual-exclusion membership in backend-native terms: the identity of the
/// underlying exclusion set, not yet a public sequential id.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMutex {
    pub set_id: usize,
    pub title: Option<String>,
}

/// One declared parameter in backend-native form.
#[derive(Debug, Clone)]
pub struct RawParameter {
    pub kind: ConcreteKind,
    /// Destination name (becomes the node name).
    pub dest: String,
    pub declared_type: DeclaredType,
    pub default: RawDefault,
    pub required: bool,
    pub help: Option<String>,
    /// Flag strings in declaration order; empty for positionals.
    pub flag_strings: Vec<String>,
    /// Allowed values, when restricted.
    pub choices: Option<Vec<ParamValue>>,
    /// Arity marker, when multi-valued.
    pub arity: Option<ChoiceLimit>,
    /// Label of the declaration container the parameter belongs to.
    pub container: String,
    pub mutex: Option<RawMutex>,
    /// Version string carried by version-printing constructs.
    pub version: Option<String>,
}

impl RawParameter {
    /// Minimal record for the given kind and destination; everything else
    /// starts empty. Backends fill in what their walk discovers.
    pub fn new(kind: ConcreteKind, dest: &str) -> Self {
        Self {
            kind,
            dest: dest.to_string(),
            declared_type: DeclaredType::NotDeclared,
            default: RawDefault::None,
            required: false,
            help: None,
            flag_strings: Vec::new(),
            choices: None,
            arity: None,
            container: String::new(),
            mutex: None,
            version: None,
        }
    }

    /// Whether the parameter's default is the suppressed sentinel, which
    /// excludes it from the schema entirely.
    pub fn is_suppressed(&self) -> bool {
        matches!(self.default, RawDefault::Suppressed)
    }

    /// First declared flag string, or the empty string for positionals.
    pub fn first_flag(&self) -> &str {
        self.flag_strings.first().map(String::as_str).unwrap_or("")
    }

    /// Whether the default is a null-equivalent (no default at all).
    pub fn default_is_none(&self) -> bool {
        matches!(self.default, RawDefault::None)
    }
}
