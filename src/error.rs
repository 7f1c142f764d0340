//! Error taxonomy for the optimizer.

use thiserror::Error;

/// Malformed input, rejected before any search starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Shift '{shift_id}': end_time must be after start_time")]
    InvalidShiftWindow { shift_id: String },

    #[error("Employee '{employee_id}': {kind} preference #{index} must end after it starts")]
    InvalidPreferenceWindow {
        employee_id: String,
        kind: &'static str,
        index: usize,
    },

    #[error("Employee '{employee_id}': {kind} preference #{index} needs either start/end or shift_id")]
    MissingPreferenceTarget {
        employee_id: String,
        kind: &'static str,
        index: usize,
    },

    #[error("Employee '{employee_id}' has a {kind} preference for unknown shift_id '{shift_id}'")]
    UnknownShift {
        employee_id: String,
        kind: &'static str,
        shift_id: String,
    },

    #[error("Duplicate employee id: '{0}'")]
    DuplicateEmployee(String),

    #[error("Duplicate shift id: '{0}'")]
    DuplicateShift(String),

    #[error("max_solutions must be between 1 and {limit}, got {value}")]
    InvalidMaxSolutions { value: i64, limit: usize },

    #[error("Invalid request body: {0}")]
    MalformedRequest(String),
}

/// Everything that can stop a solve call from producing solutions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptimizeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Infeasible: {0}")]
    Infeasible(String),

    #[error("Timeout: no feasible assignment found within {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Cancelled before a feasible assignment was found")]
    Cancelled,

    #[error("Search budget of {nodes} nodes exhausted before a feasible assignment was found")]
    BudgetExhausted { nodes: u64 },

    #[error("Optimization failed: {0}")]
    Internal(String),
}

impl OptimizeError {
    /// Returns `true` when the same input is guaranteed to fail the same way again.
    pub fn is_deterministic(&self) -> bool {
        matches!(
            self,
            OptimizeError::Validation(_)
                | OptimizeError::Infeasible(_)
                | OptimizeError::BudgetExhausted { .. }
        )
    }
}
