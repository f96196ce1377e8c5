//! Core schema types for normalized script inputs.
//!
//! This crate defines the foundational types for modeling the input
//! parameters of a command-line script:
//!
//! - [`ScriptSchema`] — top-level schema for a script (description, version,
//!   per-command input groups).
//! - [`CommandInputs`] — the ordered group list for one command scope (the
//!   empty string keys the root scope).
//! - [`InputGroup`] — a declaration container and its ordered nodes.
//! - [`FieldSchema`] — a single normalized parameter with model, widget
//!   kind, default, choices, and mutual-exclusion metadata.
//!
//! Validation ([`validate_schema`]) catches structural errors such as
//! duplicate node names within a scope and non-sequential mutex ids.
//!
//! # Example
//!
//! ```
//! use script_schema_core::*;
//!
//! let mut schema = ScriptSchema::new("align", "/opt/scripts/align.py");
//! schema.description = Some("Align sequences".into());
//!
//! let mut root = CommandInputs::new("");
//! let mut positionals = InputGroup::new("positional arguments");
//! let mut input = FieldSchema::new("input", FieldModel::CharField, InputKind::Text);
//! input.required = true;
//! positionals.nodes.push(input);
//! root.groups.push(positionals);
//! schema.inputs.push(root);
//!
//! assert!(validate_schema(&schema).is_empty());
//! assert_eq!(schema.root_inputs().unwrap().groups[0].group, "positional arguments");
//! ```

mod types;
mod validate;

pub use types::*;
pub use validate::{ValidationError, validate_schema};
