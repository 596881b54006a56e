//! Error types for nb-algebra

use crate::ir::query::CombineOp;
use thiserror::Error;

/// Boxed error returned by user-supplied galaxy setup procedures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Algebra error type
///
/// These use the `R` prefix (Relational) to keep them apart from the `C`
/// codes of nb-core.
#[derive(Error, Debug)]
pub enum AlgebraError {
    /// R001: A constructor or operation was handed an argument it cannot accept
    #[error("[R001] Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// R002: Relational operator name outside the closed set
    #[error("[R002] Unknown relational operator '{name}'")]
    UnknownRelationalOperator { name: String },

    /// R003: Attribute not present in the schema it is evaluated against
    #[error("[R003] Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    /// R004: Type check failed
    #[error("[R004] Type violation: expected {expected}, found {actual}")]
    TypeViolation { expected: String, actual: String },

    /// R005: Operand schemas of a combination do not fit together
    #[error("[R005] Schema mismatch in {op}: left is {left}, right is {right}")]
    SchemaMismatch {
        op: CombineOp,
        left: String,
        right: String,
    },

    /// R006: Subquery used as a value does not have exactly one column
    #[error("[R006] Subquery must have exactly one column, found {columns}")]
    NotUnary { columns: usize },

    /// R007: Ordering key needs an auxiliary join after flattening
    #[error("[R007] Ordering by '{expr}' is not supported after flattening")]
    UnsupportedOrderingExpression { expr: String },

    /// R008: Construct the flattening pass does not handle
    #[error("[R008] Not yet implemented: {feature}")]
    NotYetImplemented { feature: String },

    /// R009: Base relation name could not be resolved
    #[error("[R009] Unknown base relation '{name}'")]
    UnknownBaseRelation { name: String },

    /// R010: Operator name could not be resolved
    #[error("[R010] Unknown operator '{name}'")]
    UnknownOperator { name: String },

    /// R011: Aggregation outside a grouping projection
    #[error("[R011] Column '{column}' aggregates outside a grouping projection")]
    MisplacedAggregate { column: String },

    /// R012: Result row width does not match the logical schema
    #[error("[R012] Row has {actual} value(s), schema needs {expected}")]
    RowShapeMismatch { expected: usize, actual: usize },

    /// R013: A galaxy setup procedure failed
    #[error("[R013] Provisioning galaxy '{galaxy}' failed: {source}")]
    ProvisionFailed { galaxy: String, source: BoxError },

    /// R014: Core error propagation
    #[error("[R014] Core error: {0}")]
    Core(#[from] nb_core::CoreError),
}

impl AlgebraError {
    /// Shorthand for [`AlgebraError::InvalidArgument`]
    pub fn invalid(message: impl Into<String>) -> Self {
        AlgebraError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Shorthand for [`AlgebraError::NotYetImplemented`]
    pub fn not_yet(feature: impl Into<String>) -> Self {
        AlgebraError::NotYetImplemented {
            feature: feature.into(),
        }
    }
}

/// Result type alias for AlgebraError
pub type AlgebraResult<T> = Result<T, AlgebraError>;
