//! Normalized input-schema extraction from declarative CLI scripts.
//!
//! This crate inspects a command-line script that declares its options
//! through a known declarative parsing style and produces a normalized
//! [`ScriptSchema`] — parameter names, types, defaults, requiredness, help
//! text, choice sets, grouping, mutual exclusion, and sub-commands —
//! without the script exposing any of that deliberately.
//!
//! # Architecture
//!
//! - [`selector::Registry`] scores every registered backend's lexical
//!   heuristics against the source and tries backends in descending score
//!   order.
//! - Each [`backends::Backend`] runs the strategy pipeline in
//!   [`pipeline`]: instrumented execution with a parse-entry trap, a
//!   static module load with a namespace scan, and a normalized-source
//!   fallback that strips unresolvable imports.
//! - The captured declarations are walked into raw parameter records,
//!   resolved through the [`mapping`] tables, and assembled by
//!   [`assembler`] into declaration-ordered groups with sequential
//!   mutual-exclusion ids.
//!
//! # Example
//!
//! ```
//! use script_schema_extraction::parse_script_source;
//!
//! let script = "\
//! import argparse
//! parser = argparse.ArgumentParser(description='Trim reads')
//! parser.add_argument('input')
//! parser.add_argument('--quality', type=int, default=20)
//! args = parser.parse_args()
//! ";
//!
//! let schema = parse_script_source("/opt/scripts/trim_reads.py", script).unwrap();
//! assert_eq!(schema.name, "trim_reads");
//! assert_eq!(schema.description.as_deref(), Some("Trim reads"));
//! let root = schema.root_inputs().unwrap();
//! assert!(root.find_group("positional arguments").is_some());
//! ```

pub mod assembler;
pub mod backends;
pub mod error;
pub mod interp;
pub mod mapping;
pub mod normalize;
pub mod pipeline;
pub mod raw;
pub mod selector;
pub mod source;

pub use error::{EngineError, ExtractionError, LoadError, Result, TypeResolutionError};
pub use selector::Registry;
pub use source::ScriptSource;

use std::path::Path;

use script_schema_core::ScriptSchema;

/// Extracts a schema from a script on disk.
///
/// Reads the file, then behaves like [`parse_script_source`].
pub fn parse_script(path: impl AsRef<Path>) -> Result<ScriptSchema> {
    let source = ScriptSource::read(path.as_ref())?;
    Registry::standard().select(&source)
}

/// Extracts a schema from an already-loaded script.
///
/// The engine's whole input contract: a path (used for the schema name and
/// sibling-module resolution) and the source text. Returns the normalized
/// schema or an [`EngineError`] naming, per failed strategy, a technique
/// label and the underlying failure.
pub fn parse_script_source(
    path: impl AsRef<Path>,
    text: impl Into<String>,
) -> Result<ScriptSchema> {
    let source = ScriptSource::new(path.as_ref(), text.into());
    Registry::standard().select(&source)
}

/// Extracts a schema and serializes it to its JSON representation.
///
/// # Examples
///
/// ```
/// use script_schema_extraction::parse_script_json;
///
/// let script = "\
/// import argparse
/// parser = argparse.ArgumentParser()
/// parser.add_argument('--jobs', type=int, default=1)
/// args = parser.parse_args()
/// ";
///
/// let json = parse_script_json("/opt/scripts/build.py", script).unwrap();
/// assert!(json.contains("\"jobs\""));
/// ```
pub fn parse_script_json(path: impl AsRef<Path>, text: impl Into<String>) -> Result<String> {
    let schema = parse_script_source(path, text)?;
    Ok(serde_json::to_string(&schema)?)
}
