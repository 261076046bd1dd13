//! ferrox-loss error types

use crate::tensor::Size3;

/// ferrox-loss result type
pub type Result<T> = std::result::Result<T, LossError>;

/// Errors raised while configuring or encoding loss kernels.
///
/// Every variant is detected synchronously, before any work reaches the
/// execution substrate. Nothing is retried internally.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LossError {
    /// Prediction, label, weight, output or destination sizes disagree
    #[error("shape mismatch in {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        /// Which operand was being checked
        context: &'static str,
        /// Size the operand had to have (or broadcast to)
        expected: Size3,
        /// Size it actually had
        got: Size3,
    },

    /// Non-finite or out-of-domain numeric parameter
    #[error("invalid configuration '{parameter}': {reason}")]
    InvalidConfiguration {
        /// Parameter name
        parameter: &'static str,
        /// Why it's invalid
        reason: String,
    },

    /// Individually valid settings that cannot be used together
    #[error("unsupported combination: {reason}")]
    UnsupportedCombination {
        /// Description of the conflict
        reason: String,
    },

    /// Strides or buffer length cannot describe the requested size
    #[error("invalid tensor layout: {reason}")]
    InvalidLayout {
        /// Description of what went wrong
        reason: String,
    },

    /// Batch operands of different lengths
    #[error("batch length mismatch: {predictions} predictions vs {labels} label sources")]
    BatchLengthMismatch {
        /// Number of prediction tensors
        predictions: usize,
        /// Number of label sources
        labels: usize,
    },

    /// The execution substrate failed
    #[error("execution error: {reason}")]
    Execution {
        /// Description of what went wrong
        reason: String,
    },
}

impl LossError {
    pub(crate) fn shape(context: &'static str, expected: Size3, got: Size3) -> Self {
        LossError::ShapeMismatch {
            context,
            expected,
            got,
        }
    }

    pub(crate) fn config(parameter: &'static str, reason: impl Into<String>) -> Self {
        LossError::InvalidConfiguration {
            parameter,
            reason: reason.into(),
        }
    }
}
