pub mod classification;
pub mod config;
mod elementwise;
pub mod forward;
pub mod gradient;
pub mod kernel;
pub mod labels;
pub mod reduction;
pub mod regression;

pub use config::LossConfig;
pub use forward::LossForward;
pub use gradient::LossGradient;
pub use kernel::LossKernel;
pub use labels::{LossDataDescriptor, LossLabels};
pub use reduction::{Reduced, ReductionEngine};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The loss formula a kernel evaluates.
///
/// `y` is the prediction, `t` the label. Per-element formulas live in
/// [`regression`] and [`classification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LossType {
    /// `|y - t|`
    MeanAbsoluteError,
    /// `(y - t)^2`
    MeanSquaredError,
    /// `-t * logSoftmax(y)`, softmax over the channel axis
    SoftmaxCrossEntropy,
    /// `max(y, 0) - y * t + log(1 + exp(-|y|))`
    SigmoidCrossEntropy,
    /// `-t * log(y)`, `y` already a probability
    CategoricalCrossEntropy,
    /// `max(1 - t * y, 0)` with labels in {0, 1}
    Hinge,
    /// Piecewise quadratic/linear, switching at `delta`
    Huber,
    /// `1 - sum(y * t)` over the whole region; always a scalar
    CosineDistance,
    /// `-t * log(y + eps) - (1 - t) * log(1 - y + eps)`
    Log,
    /// `t * (log(t) - y)`, `y` already log-probabilities
    KullbackLeibler,
}

impl LossType {
    pub const ALL: [LossType; 10] = [
        LossType::MeanAbsoluteError,
        LossType::MeanSquaredError,
        LossType::SoftmaxCrossEntropy,
        LossType::SigmoidCrossEntropy,
        LossType::CategoricalCrossEntropy,
        LossType::Hinge,
        LossType::Huber,
        LossType::CosineDistance,
        LossType::Log,
        LossType::KullbackLeibler,
    ];

    /// Softmax and sigmoid cross entropy: the losses that honour label
    /// smoothing and whose mean excludes the channel dimension.
    pub fn is_cross_entropy(&self) -> bool {
        matches!(
            self,
            LossType::SoftmaxCrossEntropy | LossType::SigmoidCrossEntropy
        )
    }
}

impl fmt::Display for LossType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LossType::MeanAbsoluteError => "mean_absolute_error",
            LossType::MeanSquaredError => "mean_squared_error",
            LossType::SoftmaxCrossEntropy => "softmax_cross_entropy",
            LossType::SigmoidCrossEntropy => "sigmoid_cross_entropy",
            LossType::CategoricalCrossEntropy => "categorical_cross_entropy",
            LossType::Hinge => "hinge",
            LossType::Huber => "huber",
            LossType::CosineDistance => "cosine_distance",
            LossType::Log => "log",
            LossType::KullbackLeibler => "kullback_leibler",
        };
        f.write_str(name)
    }
}

/// Loss reduction strategies - determines how per-element losses are aggregated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReductionType {
    /// Return individual losses without reduction
    None,
    /// Sum all losses in the region
    Sum,
    /// Average loss across the region
    Mean,
}

impl fmt::Display for ReductionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReductionType::None => "none",
            ReductionType::Sum => "sum",
            ReductionType::Mean => "mean",
        };
        f.write_str(name)
    }
}
