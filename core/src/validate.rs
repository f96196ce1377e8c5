//! Schema validation.
//!
//! Validates the structural invariants of a normalized script schema:
//! node names unique per command scope, group labels unique per scope, and
//! mutual-exclusion ids dense from zero in first-seen order.
//!
//! # Examples
//!
//! ```
//! use script_schema_core::*;
//!
//! let mut schema = ScriptSchema::new("tool", "/tmp/tool.py");
//! schema.inputs.push(CommandInputs::new(""));
//! assert!(validate_schema(&schema).is_empty());
//!
//! // Invalid: empty script name
//! let bad = ScriptSchema::new("", "/tmp/tool.py");
//! assert!(!validate_schema(&bad).is_empty());
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::{CommandInputs, ScriptSchema};

/// Schema validation errors.
///
/// Each variant describes a specific structural problem found during
/// validation. The `Display` impl provides a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Schema name is empty or whitespace-only.
    #[error("schema name cannot be empty")]
    EmptySchemaName,
    /// Two scope entries share a command name.
    #[error("duplicate command scope: {0:?}")]
    DuplicateScope(String),
    /// Two nodes in the same scope share a name.
    #[error("duplicate node {name:?} in scope {scope:?}")]
    DuplicateNode { scope: String, name: String },
    /// Two groups in the same scope share a label.
    #[error("duplicate group {label:?} in scope {scope:?}")]
    DuplicateGroup { scope: String, label: String },
    /// Mutex ids in a scope are not dense from zero in first-seen order.
    #[error("non-sequential mutex ids in scope {0:?}")]
    NonSequentialMutexIds(String),
}

/// Validates a script schema.
///
/// Returns every violation found; an empty vector means the schema holds
/// all structural invariants.
///
/// # Examples
///
/// ```
/// use script_schema_core::*;
///
/// let mut schema = ScriptSchema::new("tool", "/tmp/tool.py");
/// let mut root = CommandInputs::new("");
/// let mut group = InputGroup::new("optional arguments");
/// group.nodes.push(FieldSchema::new("verbose", FieldModel::BooleanField, InputKind::Checkbox));
/// group.nodes.push(FieldSchema::new("verbose", FieldModel::BooleanField, InputKind::Checkbox));
/// root.groups.push(group);
/// schema.inputs.push(root);
///
/// let errors = validate_schema(&schema);
/// assert!(errors.iter().any(|e| matches!(e, ValidationError::DuplicateNode { .. })));
/// ```
pub fn validate_schema(schema: &ScriptSchema) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if schema.name.trim().is_empty() {
        errors.push(ValidationError::EmptySchemaName);
    }

    let mut seen_scopes: HashSet<&str> = HashSet::new();
    for scope in &schema.inputs {
        if !seen_scopes.insert(scope.command.as_str()) {
            errors.push(ValidationError::DuplicateScope(scope.command.clone()));
        }
        validate_scope(scope, &mut errors);
    }

    errors
}

fn validate_scope(scope: &CommandInputs, errors: &mut Vec<ValidationError>) {
    let mut seen_groups: HashSet<&str> = HashSet::new();
    let mut seen_nodes: HashSet<&str> = HashSet::new();
    let mut seen_mutex_ids: Vec<usize> = Vec::new();

    for group in &scope.groups {
        if !seen_groups.insert(group.group.as_str()) {
            errors.push(ValidationError::DuplicateGroup {
                scope: scope.command.clone(),
                label: group.group.clone(),
            });
        }
        for node in &group.nodes {
            if !seen_nodes.insert(node.name.as_str()) {
                errors.push(ValidationError::DuplicateNode {
                    scope: scope.command.clone(),
                    name: node.name.clone(),
                });
            }
            if let Some(mutex) = &node.mutex_group
                && !seen_mutex_ids.contains(&mutex.id)
            {
                seen_mutex_ids.push(mutex.id);
            }
        }
    }

    // Ids must appear as 0, 1, 2, ... in first-seen order.
    if seen_mutex_ids.iter().enumerate().any(|(i, id)| *id != i) {
        errors.push(ValidationError::NonSequentialMutexIds(scope.command.clone()));
    }
}
