use thiserror::Error;

use crate::ids::ComponentId;

pub type KernelResult<T> = Result<T, KernelError>;

/// Failures raised by the simulation kernel.
///
/// Every variant is raised at the point of detection. The kernel never retries
/// or recovers; the orchestrator decides whether to abort or skip.
#[derive(Error, Debug)]
pub enum KernelError {
    /// Malformed wiring: bad connection contract, wrong endpoint kind, missing keys.
    #[error("Configuration error: {what}")]
    Configuration { what: String },

    /// A signal payload or flow key is not declared in the target's schema.
    #[error("Unknown field '{field}' for {component}")]
    UnknownField { field: String, component: String },

    /// Two components of one tree share an id.
    #[error("Duplicate component id {id}")]
    DuplicateId { id: ComponentId },

    /// Lookup of an unknown id or name.
    #[error("Component not found: {what}")]
    NotFound { what: String },

    /// A node tried to integrate a flow that was not computed this tick.
    #[error("Integration error: {what}")]
    Integration { what: String },

    /// Integration produced NaN or infinity.
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: String, value: f64 },

    /// A value does not match the declared kind of a field.
    #[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A serialized type name is missing from the type registry.
    #[error("Unknown component type '{name}'")]
    UnknownType { name: String },

    /// Operation deliberately left unimplemented.
    #[error("Unsupported operation: {what}")]
    Unsupported { what: &'static str },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KernelError {
    pub fn configuration(what: impl Into<String>) -> Self {
        Self::Configuration { what: what.into() }
    }

    pub fn unknown_field(field: impl Into<String>, component: impl Into<String>) -> Self {
        Self::UnknownField {
            field: field.into(),
            component: component.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn integration(what: impl Into<String>) -> Self {
        Self::Integration { what: what.into() }
    }

    /// Attach the owning component's label to field errors raised by state code.
    pub fn within(self, label: impl core::fmt::Display) -> Self {
        match self {
            Self::UnknownField { field, component } if component.is_empty() => {
                Self::UnknownField {
                    field,
                    component: label.to_string(),
                }
            }
            other => other,
        }
    }
}
