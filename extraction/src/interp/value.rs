//! Runtime values and the parser-object arena.
//!
//! The evaluator builds parser objects into a [`ParserArena`] owned by one
//! evaluation run. Parser, group, and sub-parser values are indices into
//! the arena, so they stay `Clone` while mutations go through the arena.

use crate::interp::ast::FunctionDef;
use crate::raw::{DeclaredType, StreamKind};

/// Reference to a parser in the arena.
pub type ParserRef = usize;

/// Known modules the evaluator models attribute-by-attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleId {
    Argparse,
    Sys,
}

/// Built-in callables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    ArgumentParser,
    Len,
    Open,
    Print,
    Range,
    SysExit,
}

/// Scalar type objects (`int`, `str`, `float`, `bool`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Str,
    Int,
    Float,
    Bool,
}

/// A runtime value in the sandbox.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Module(ModuleId),
    /// A resolvable module the evaluator does not model internally.
    ForeignModule(String),
    Builtin(Builtin),
    Type(TypeTag),
    /// An unbound scalar-type method such as `str.lower`.
    TypeMethod(TypeTag, String),
    Function(FunctionDef),
    /// A method bound to a receiver, resolved at call time.
    Method {
        receiver: Box<Value>,
        name: String,
    },
    Parser(ParserRef),
    /// An argument group: (parser, group index).
    Group(ParserRef, usize),
    /// A mutual-exclusion group: (parser, mutex index).
    Mutex(ParserRef, usize),
    /// The sub-parsers handle of a parser.
    Subparsers(ParserRef),
    /// A file-conversion type carrying its open mode.
    FileType {
        mode: String,
    },
    Stream(StreamKind),
    /// The suppressed/hidden sentinel.
    Suppress,
    /// The consume-the-rest arity sentinel.
    Remainder,
    /// Anything the evaluator does not model.
    Opaque,
}

impl Value {
    /// Python-style truthiness; opaque values are conservatively false so
    /// unknown conditions do not execute guarded branches.
    pub fn truthy(&self) -> bool {
        match self {
            Value::None | Value::Opaque => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            _ => true,
        }
    }

    /// Structural equality for the literal variants; everything else is
    /// unequal (identity is not modeled).
    pub fn eq_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Suppress, Value::Suppress) => true,
            (Value::Stream(a), Value::Stream(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_value(y))
            }
            _ => false,
        }
    }
}

/// Parameter arity, in parser-native terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// `?` — at most one value.
    Optional,
    /// `*` — any number of values.
    ZeroOrMore,
    /// `+` — at least one value.
    OneOrMore,
    Exactly(u32),
    /// Consume everything that remains.
    Remainder,
}

/// The declaring construct of one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Store,
    StoreTrue,
    StoreFalse,
    StoreConst,
    Append,
    AppendConst,
    Count,
    Help,
    Version,
    SubParsers,
}

/// One declared argument inside a parser.
#[derive(Debug, Clone)]
pub struct ActionData {
    pub kind: ActionKind,
    pub dest: String,
    pub option_strings: Vec<String>,
    pub declared_type: DeclaredType,
    pub default: Value,
    pub required: bool,
    pub help: Option<String>,
    pub choices: Option<Vec<Value>>,
    pub nargs: Option<Arity>,
    /// Version string for version actions.
    pub version: Option<String>,
    /// Index of the containing argument group.
    pub group: usize,
    /// Index of the mutual-exclusion group, when part of one.
    pub mutex: Option<usize>,
}

/// An argument group (declaration container).
#[derive(Debug, Clone)]
pub struct GroupData {
    pub title: String,
}

/// A mutual-exclusion group.
#[derive(Debug, Clone)]
pub struct MutexData {
    pub title: Option<String>,
    /// Argument group its members land in.
    pub container: usize,
}

pub const GROUP_POSITIONAL: usize = 0;
pub const GROUP_OPTIONAL: usize = 1;

/// One parser object under construction.
#[derive(Debug, Clone)]
pub struct ParserData {
    pub prog: Option<String>,
    pub description: Option<String>,
    /// Parser-level version string (an older declaration style carried the
    /// version on the parser itself rather than a version action).
    pub version: Option<String>,
    pub groups: Vec<GroupData>,
    pub mutex_groups: Vec<MutexData>,
    pub actions: Vec<ActionData>,
    /// Sub-command parsers in declaration order.
    pub subcommands: Vec<(String, ParserRef)>,
}

impl ParserData {
    pub fn new(add_help: bool) -> Self {
        let mut parser = Self {
            prog: None,
            description: None,
            version: None,
            groups: vec![
                GroupData {
                    title: "positional arguments".to_string(),
                },
                GroupData {
                    title: "optional arguments".to_string(),
                },
            ],
            mutex_groups: Vec::new(),
            actions: Vec::new(),
            subcommands: Vec::new(),
        };
        if add_help {
            parser.actions.push(ActionData {
                kind: ActionKind::Help,
                dest: "help".to_string(),
                option_strings: vec!["-h".to_string(), "--help".to_string()],
                declared_type: DeclaredType::NotDeclared,
                default: Value::Suppress,
                required: false,
                help: Some("show this help message and exit".to_string()),
                choices: None,
                nargs: None,
                version: None,
                group: GROUP_OPTIONAL,
                mutex: None,
            });
        }
        parser
    }
}

/// Arena of every parser object built during one evaluation run.
#[derive(Debug, Default)]
pub struct ParserArena {
    parsers: Vec<ParserData>,
}

impl ParserArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, parser: ParserData) -> ParserRef {
        self.parsers.push(parser);
        self.parsers.len() - 1
    }

    pub fn get(&self, parser: ParserRef) -> &ParserData {
        &self.parsers[parser]
    }

    pub fn get_mut(&mut self, parser: ParserRef) -> &mut ParserData {
        &mut self.parsers[parser]
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

/// Converts a runtime value passed as `type=` into a declared-type tag.
///
/// Opaque values are treated as invocable: the common case is a class or
/// function imported from a module the sandbox does not model, and those
/// are callables in the source language. Literal values that could never
/// be invoked classify as [`DeclaredType::Unknown`], which the mapping
/// engine rejects loudly.
pub fn declared_type_of(value: &Value) -> DeclaredType {
    match value {
        Value::None => DeclaredType::NotDeclared,
        Value::Type(TypeTag::Str) => DeclaredType::Str,
        Value::Type(TypeTag::Int) => DeclaredType::Int,
        Value::Type(TypeTag::Float) => DeclaredType::Float,
        Value::Type(TypeTag::Bool) => DeclaredType::Bool,
        Value::FileType { mode } => DeclaredType::FileType { mode: mode.clone() },
        Value::Function(f) => DeclaredType::Callable(f.name.clone()),
        Value::TypeMethod(_, name) => DeclaredType::Callable(name.clone()),
        Value::Builtin(Builtin::Open) => DeclaredType::Callable("open".to_string()),
        Value::Builtin(_) => DeclaredType::Callable("builtin".to_string()),
        Value::Method { name, .. } => DeclaredType::Callable(name.clone()),
        Value::Opaque => DeclaredType::Callable("<unresolved>".to_string()),
        Value::Bool(_)
        | Value::Int(_)
        | Value::Float(_)
        | Value::Str(_)
        | Value::List(_)
        | Value::Tuple(_) => DeclaredType::Unknown,
        _ => DeclaredType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.truthy());
        assert!(!Value::Str(String::new()).truthy());
        assert!(!Value::Opaque.truthy());
        assert!(Value::Int(3).truthy());
        assert!(Value::List(vec![Value::None]).truthy());
    }

    #[test]
    fn test_new_parser_carries_help_action() {
        let parser = ParserData::new(true);
        assert_eq!(parser.actions.len(), 1);
        assert_eq!(parser.actions[0].kind, ActionKind::Help);
        assert!(matches!(parser.actions[0].default, Value::Suppress));

        let bare = ParserData::new(false);
        assert!(bare.actions.is_empty());
    }

    #[test]
    fn test_declared_type_classification() {
        assert_eq!(
            declared_type_of(&Value::Type(TypeTag::Int)),
            DeclaredType::Int
        );
        assert_eq!(
            declared_type_of(&Value::FileType { mode: "rb".into() }),
            DeclaredType::FileType { mode: "rb".into() }
        );
        // Literals cannot be invoked: rejected later by the mapping engine.
        assert_eq!(declared_type_of(&Value::Int(42)), DeclaredType::Unknown);
        // Unmodeled imports are assumed invocable.
        assert!(matches!(
            declared_type_of(&Value::Opaque),
            DeclaredType::Callable(_)
        ));
    }
}
