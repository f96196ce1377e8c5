//! Backend selection by heuristic score.
//!
//! Every registered backend scores the script with its lexical heuristics;
//! backends then run in descending score order (registration order breaks
//! ties) and the first successful build wins. When nothing validates, only
//! the top-scoring backend's failure list is surfaced — one actionable
//! error instead of a concatenation of every backend's noise.

use tracing::debug;

use script_schema_core::ScriptSchema;

use crate::backends::{ArgparseBackend, Backend, BackendError, DocoptBackend};
use crate::error::EngineError;
use crate::source::ScriptSource;

/// An ordered set of extraction backends.
pub struct Registry {
    backends: Vec<Box<dyn Backend>>,
}

impl Registry {
    /// The standard registry: argparse first, docopt second.
    pub fn standard() -> Self {
        Self {
            backends: vec![Box::new(ArgparseBackend), Box::new(DocoptBackend)],
        }
    }

    /// A registry with a custom backend set, in registration order.
    pub fn with_backends(backends: Vec<Box<dyn Backend>>) -> Self {
        Self { backends }
    }

    /// Scores every backend against the source, returning `(id, score)`
    /// pairs sorted descending; registration order breaks ties.
    pub fn scores(&self, source: &ScriptSource) -> Vec<(&'static str, f64)> {
        let mut scored: Vec<(usize, f64)> = self
            .backends
            .iter()
            .enumerate()
            .map(|(index, backend)| (index, backend.score(source)))
            .collect();
        // Stable sort keeps registration order among equal scores.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .map(|(index, score)| (self.backends[index].id(), score))
            .collect()
    }

    /// Selects a backend and builds the schema.
    ///
    /// Backends run in score order; the first success is returned. An
    /// extraction failure moves on to the next backend; a type-resolution
    /// failure aborts immediately instead of falling through. On total
    /// failure only the top-scoring backend's error is reported.
    pub fn select(&self, source: &ScriptSource) -> Result<ScriptSchema, EngineError> {
        if self.backends.is_empty() {
            return Err(EngineError::EmptyRegistry);
        }

        let mut ranked: Vec<(usize, f64)> = self
            .backends
            .iter()
            .enumerate()
            .map(|(index, backend)| (index, backend.score(source)))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut failures = Vec::new();
        for (index, score) in ranked {
            let backend = &self.backends[index];
            debug!(backend = backend.id(), score, "attempting backend");
            match backend.build(source) {
                Ok(schema) => {
                    debug!(backend = backend.id(), "backend validated");
                    return Ok(schema);
                }
                Err(BackendError::TypeResolution(error)) => {
                    return Err(EngineError::TypeResolution(error));
                }
                Err(BackendError::Extraction(error)) => {
                    debug!(backend = backend.id(), error = %error, "backend failed");
                    failures.push((backend.id(), error));
                }
            }
        }

        // Highest score attempted first, so its failure leads the list.
        match failures.into_iter().next() {
            Some((backend, error)) => Err(EngineError::Selection {
                path: source.path().to_string_lossy().to_string(),
                backend,
                error,
            }),
            None => Err(EngineError::EmptyRegistry),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}
