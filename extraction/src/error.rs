//! Error taxonomy for the extraction engine.
//!
//! Failures fall into four layers:
//!
//! - [`LoadError`] — one extraction strategy could not load or run the
//!   script. Recorded per strategy, never fatal to the pipeline.
//! - [`ExtractionError`] — every strategy of one backend failed; carries the
//!   ordered per-strategy failure list.
//! - [`TypeResolutionError`] — a declared type could not be mapped to a
//!   field rule. This is a gap in the engine's tables, not a user error,
//!   and aborts the build loudly.
//! - [`EngineError`] — the caller-visible error: I/O, type-resolution, or
//!   selection failure (no backend validated; only the top-scoring
//!   backend's failure list is surfaced).

use std::fmt;

use thiserror::Error;

/// A single strategy's failure to load or run the script.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The script imports a module the extraction environment cannot
    /// resolve.
    #[error("unresolved import: {0}")]
    UnresolvedImport(String),

    /// The script source does not parse.
    #[error("script source failed to parse: {0}")]
    Syntax(String),

    /// The script exited while loading (e.g. an unconditional exit call).
    #[error("script exited during load: {0}")]
    Exit(String),

    /// The evaluation statement budget ran out.
    #[error("evaluation budget exhausted")]
    BudgetExhausted,

    /// User-function calls nested past the depth limit.
    #[error("call depth limit exceeded")]
    CallDepthExceeded,

    /// Any other strategy-specific failure.
    #[error("{0}")]
    Other(String),
}

/// One failed strategy attempt, labeled for diagnostics.
#[derive(Debug, Clone)]
pub struct StrategyFailure {
    pub strategy: &'static str,
    pub detail: String,
}

/// All strategies of a backend failed to produce a parser.
///
/// `Display` lists every attempted technique with its failure detail, in
/// execution order.
#[derive(Debug, Clone)]
pub struct ExtractionError {
    pub attempts: Vec<StrategyFailure>,
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "unable to obtain a parser from the script:")?;
        for attempt in &self.attempts {
            writeln!(f, "technique: {}", attempt.strategy)?;
            writeln!(f, "error: {}", attempt.detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExtractionError {}

/// A declared type could not be mapped to a field rule.
#[derive(Debug, Clone, Error)]
pub enum TypeResolutionError {
    /// No table key matched the declared type.
    #[error("no field rule for declared type {declared} on {kind} parameter {dest:?}")]
    Unknown {
        kind: String,
        declared: String,
        dest: String,
    },
}

/// Caller-visible engine error.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The script file could not be read.
    #[error("failed to read script: {0}")]
    Io(#[from] std::io::Error),

    /// No registered backend validated against the script. Carries the
    /// failure list of the highest-scoring backend only.
    #[error("no backend validated for {path} (best candidate: {backend}): {error}")]
    Selection {
        path: String,
        backend: &'static str,
        #[source]
        error: ExtractionError,
    },

    /// A parameter's declared type has no field rule.
    #[error(transparent)]
    TypeResolution(#[from] TypeResolutionError),

    /// The schema could not be serialized to its external representation.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The registry holds no backends at all.
    #[error("no backends registered")]
    EmptyRegistry,
}

/// Convenience alias for results with [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_error_lists_every_technique() {
        let error = ExtractionError {
            attempts: vec![
                StrategyFailure {
                    strategy: "intercepted-exec",
                    detail: "unresolved import: six".to_string(),
                },
                StrategyFailure {
                    strategy: "module-load",
                    detail: "unresolved import: six".to_string(),
                },
            ],
        };

        let rendered = error.to_string();
        assert!(rendered.contains("technique: intercepted-exec"));
        assert!(rendered.contains("technique: module-load"));
        assert!(rendered.contains("unresolved import: six"));
    }
}
