//! Sandbox interpreter for declarative parser-building scripts.
//!
//! The interpreter runs a script's module body inside a bounded sandbox,
//! modeling just enough of the source language to watch parsers being
//! declared: imports, assignments, calls, function definitions, and the
//! main-guard idiom. Parser objects accumulate in a [`ParserArena`] owned
//! by the run; the pipeline inspects the arena afterwards (or receives a
//! parser directly when the parse-entry trap fires).

pub mod ast;
pub mod eval;
pub mod modules;
pub mod value;

pub use ast::{Module, parse_module};
pub use eval::{EvalOptions, Interpreter, Namespace, Outcome};
pub use modules::ModuleResolver;
pub use value::{
    ActionData, ActionKind, Arity, GroupData, MutexData, ParserArena, ParserData, ParserRef, Value,
};
