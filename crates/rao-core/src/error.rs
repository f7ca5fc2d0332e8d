//! Error types for remedial-action optimization.
//!
//! One crate-wide error enum split along the failure taxonomy: fatal
//! data/configuration errors (malformed catalogs, non-chronological
//! timestamps), typed not-found signals raised by registry lookups that
//! should have succeeded, and solver-level failures. Expected absence
//! (lookup-before-create) is *not* represented here; those paths go through
//! `find_*` methods returning `Option`.

use thiserror::Error;

/// Result type alias using [`RaoError`].
pub type RaoResult<T> = Result<T, RaoError>;

/// Errors that can occur while assembling or solving the linear problem.
#[derive(Error, Debug)]
pub enum RaoError {
    /// Malformed static input data (unsupported range type where a specific
    /// one is required, inconsistent tap maps, unknown network element role).
    #[error("Invalid data: {0}")]
    Data(String),

    /// Non-chronological or degenerate timestamp sequence.
    #[error("Invalid timestamps: {0}")]
    Timestamps(String),

    /// A variable lookup failed where the variable was expected to exist.
    /// Reaching this from a filler indicates a sequencing bug (a consumer
    /// ran before its creator), not bad input data.
    #[error("Variable {0} has not been created in the linear problem")]
    VariableNotFound(String),

    /// A constraint lookup failed where the constraint was expected to exist.
    #[error("Constraint {0} has not been created in the linear problem")]
    ConstraintNotFound(String),

    /// A semantic key was registered twice in the same model instance.
    #[error("Duplicate entry in the linear problem: {0}")]
    DuplicateKey(String),

    /// Solver backend failure (infeasible lowering, backend error, or no
    /// backend compiled in).
    #[error("Solver error: {0}")]
    Solver(String),

    /// Configuration errors (invalid parameter values).
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RaoError {
    /// Create a data error with a formatted message.
    pub fn data(msg: impl Into<String>) -> Self {
        RaoError::Data(msg.into())
    }

    /// Create a configuration error with a formatted message.
    pub fn config(msg: impl Into<String>) -> Self {
        RaoError::Config(msg.into())
    }
}
