//! Core error types

use std::fmt;
use thiserror::Error;

/// A single validation failure, pointing at the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted path of the field, e.g. `network.subnet_prefix`
    pub field: String,

    /// Human-readable description of what is wrong
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Returned when a merged specification fails validation.
///
/// Carries every violation found, not just the first, so a user can fix
/// their configuration in one pass.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "invalid specification ({} problem(s)):", self.violations.len())?;
        for v in &self.violations {
            writeln!(f, "  - {}", v)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Internal graph invariant violations.
///
/// Unreachable for any specification that passed validation; hitting one
/// of these indicates a bug in the resolver or the graph builder.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("duplicate resource identifier: {0}")]
    DuplicateId(String),

    #[error("resource {id} depends on unknown resource {dependency}")]
    UnknownDependency { id: String, dependency: String },

    #[error("dependency cycle involving: {0}")]
    Cycle(String),
}
