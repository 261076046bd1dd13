// src/nn/losses/config.rs
// Validated parameter bundle shared by the forward, gradient and combined kernels

use crate::error::{LossError, Result};
use crate::nn::losses::classification::{smooth_sigmoid_label, smooth_softmax_label};
use crate::nn::losses::{LossType, ReductionType};
use serde::{Deserialize, Serialize};

const DEFAULT_WEIGHT: f32 = 1.0;
const DEFAULT_LABEL_SMOOTHING: f32 = 0.0;
const DEFAULT_NUMBER_OF_CLASSES: u32 = 1;
const DEFAULT_EPSILON: f32 = 1e-7;
const DEFAULT_DELTA: f32 = 1.0;

/// Loss type, reduction and numeric knobs for one loss kernel.
///
/// Built with [`LossConfig::new`] and refined with the `with_*` builders,
/// each of which validates its argument. Once built the value never changes.
///
/// `label_smoothing` and `number_of_classes` only affect
/// [`LossType::SoftmaxCrossEntropy`] and [`LossType::SigmoidCrossEntropy`];
/// other loss types ignore them so one config can be reused across types.
///
/// # Examples
///
/// ```rust
/// use ferrox_loss::nn::losses::{LossConfig, LossType, ReductionType};
///
/// let config = LossConfig::new(LossType::SoftmaxCrossEntropy, ReductionType::Mean)
///     .with_label_smoothing(0.1)
///     .and_then(|c| c.with_number_of_classes(10))
///     .unwrap();
/// assert_eq!(config.number_of_classes(), 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LossConfigRepr")]
pub struct LossConfig {
    loss_type: LossType,
    reduction_type: ReductionType,
    weight: f32,
    label_smoothing: f32,
    number_of_classes: u32,
    epsilon: f32,
    delta: f32,
}

impl LossConfig {
    /// Config with every numeric field at its default:
    /// weight 1.0, label smoothing 0.0, 1 class, epsilon 1e-7, delta 1.0.
    pub fn new(loss_type: LossType, reduction_type: ReductionType) -> Self {
        Self {
            loss_type,
            reduction_type,
            weight: DEFAULT_WEIGHT,
            label_smoothing: DEFAULT_LABEL_SMOOTHING,
            number_of_classes: DEFAULT_NUMBER_OF_CLASSES,
            epsilon: DEFAULT_EPSILON,
            delta: DEFAULT_DELTA,
        }
    }

    /// Scalar multiplier used when labels carry no per-element weights
    pub fn with_weight(mut self, weight: f32) -> Result<Self> {
        check_finite("weight", weight)?;
        self.weight = weight;
        Ok(self)
    }

    /// Label smoothing in `[0, 1]`
    pub fn with_label_smoothing(mut self, label_smoothing: f32) -> Result<Self> {
        check_finite("label_smoothing", label_smoothing)?;
        if !(0.0..=1.0).contains(&label_smoothing) {
            return Err(LossError::config(
                "label_smoothing",
                format!("{} is outside [0, 1]", label_smoothing),
            ));
        }
        self.label_smoothing = label_smoothing;
        Ok(self)
    }

    /// Class count used by softmax label smoothing; at least 1
    pub fn with_number_of_classes(mut self, number_of_classes: u32) -> Result<Self> {
        if number_of_classes == 0 {
            return Err(LossError::config("number_of_classes", "must be at least 1"));
        }
        self.number_of_classes = number_of_classes;
        Ok(self)
    }

    /// Stabilizer for the log loss; must be positive
    pub fn with_epsilon(mut self, epsilon: f32) -> Result<Self> {
        check_positive("epsilon", epsilon)?;
        self.epsilon = epsilon;
        Ok(self)
    }

    /// Huber switch point; must be positive
    pub fn with_delta(mut self, delta: f32) -> Result<Self> {
        check_positive("delta", delta)?;
        self.delta = delta;
        Ok(self)
    }

    pub fn loss_type(&self) -> LossType {
        self.loss_type
    }

    /// The reduction as configured. See [`LossConfig::effective_reduction`]
    /// for the one actually applied.
    pub fn reduction_type(&self) -> ReductionType {
        self.reduction_type
    }

    /// Scalar weight; replaced by per-element weights when labels carry them
    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn label_smoothing(&self) -> f32 {
        self.label_smoothing
    }

    /// Only read by softmax cross entropy
    pub fn number_of_classes(&self) -> u32 {
        self.number_of_classes
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Cosine distance always sums; every other loss uses its configured
    /// reduction.
    pub fn effective_reduction(&self) -> ReductionType {
        match self.loss_type {
            LossType::CosineDistance => ReductionType::Sum,
            _ => self.reduction_type,
        }
    }

    /// Label after smoothing; unchanged for losses without smoothing.
    pub fn smoothed_label(&self, t: f32) -> f32 {
        match self.loss_type {
            LossType::SoftmaxCrossEntropy => {
                smooth_softmax_label(t, self.label_smoothing, self.number_of_classes)
            }
            LossType::SigmoidCrossEntropy => smooth_sigmoid_label(t, self.label_smoothing),
            _ => t,
        }
    }

    /// Re-checks every numeric field.
    pub fn validate(&self) -> Result<()> {
        Self::new(self.loss_type, self.reduction_type)
            .with_weight(self.weight)?
            .with_label_smoothing(self.label_smoothing)?
            .with_number_of_classes(self.number_of_classes)?
            .with_epsilon(self.epsilon)?
            .with_delta(self.delta)?;
        Ok(())
    }
}

fn check_finite(parameter: &'static str, value: f32) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(LossError::config(parameter, format!("{} is not finite", value)))
    }
}

fn check_positive(parameter: &'static str, value: f32) -> Result<()> {
    check_finite(parameter, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(LossError::config(parameter, format!("{} must be > 0", value)))
    }
}

/// Wire form of [`LossConfig`]: optional fields take their defaults and the
/// result goes back through the validating builders.
#[derive(Deserialize)]
struct LossConfigRepr {
    loss_type: LossType,
    reduction_type: ReductionType,
    #[serde(default = "default_weight")]
    weight: f32,
    #[serde(default)]
    label_smoothing: f32,
    #[serde(default = "default_number_of_classes")]
    number_of_classes: u32,
    #[serde(default = "default_epsilon")]
    epsilon: f32,
    #[serde(default = "default_delta")]
    delta: f32,
}

fn default_weight() -> f32 {
    DEFAULT_WEIGHT
}

fn default_number_of_classes() -> u32 {
    DEFAULT_NUMBER_OF_CLASSES
}

fn default_epsilon() -> f32 {
    DEFAULT_EPSILON
}

fn default_delta() -> f32 {
    DEFAULT_DELTA
}

impl TryFrom<LossConfigRepr> for LossConfig {
    type Error = LossError;

    fn try_from(repr: LossConfigRepr) -> Result<Self> {
        LossConfig::new(repr.loss_type, repr.reduction_type)
            .with_weight(repr.weight)?
            .with_label_smoothing(repr.label_smoothing)?
            .with_number_of_classes(repr.number_of_classes)?
            .with_epsilon(repr.epsilon)?
            .with_delta(repr.delta)
    }
}
