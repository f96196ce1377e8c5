//! Pluggable extraction backends, one per parser-declaration style.
//!
//! A backend knows three things about its style: how likely a script is to
//! use it (lexical heuristics over the source), how to obtain the
//! declaration data (its extraction pipeline), and how to walk that data
//! into raw parameter records for assembly.

pub mod argparse;
pub mod docopt;

use script_schema_core::ScriptSchema;

use crate::error::{ExtractionError, TypeResolutionError};
use crate::source::ScriptSource;

pub use argparse::ArgparseBackend;
pub use docopt::DocoptBackend;

/// Failure modes of one backend's build attempt.
#[derive(Debug)]
pub enum BackendError {
    /// No strategy produced declaration data; the selector moves on to the
    /// next backend.
    Extraction(ExtractionError),
    /// The mapping tables cannot place a declared type. This is an engine
    /// defect and aborts selection instead of falling through.
    TypeResolution(TypeResolutionError),
}

impl From<ExtractionError> for BackendError {
    fn from(error: ExtractionError) -> Self {
        BackendError::Extraction(error)
    }
}

impl From<TypeResolutionError> for BackendError {
    fn from(error: TypeResolutionError) -> Self {
        BackendError::TypeResolution(error)
    }
}

/// One supported declaration style.
pub trait Backend {
    fn id(&self) -> &'static str;

    /// Independent lexical checks; the selector turns the satisfied count
    /// into a score in `[0, 1]`.
    fn heuristics(&self, source: &ScriptSource) -> Vec<bool>;

    /// Runs the backend's extraction pipeline and assembles the schema.
    fn build(&self, source: &ScriptSource) -> Result<ScriptSchema, BackendError>;

    /// Heuristic match ratio.
    fn score(&self, source: &ScriptSource) -> f64 {
        let checks = self.heuristics(source);
        if checks.is_empty() {
            return 0.0;
        }
        let satisfied = checks.iter().filter(|c| **c).count();
        satisfied as f64 / checks.len() as f64
    }
}

/// Shared heuristic: the script carries a Python-family extension.
pub(crate) fn python_extension(source: &ScriptSource) -> bool {
    matches!(source.extension(), Some("py") | Some("py3") | Some("py2"))
}
