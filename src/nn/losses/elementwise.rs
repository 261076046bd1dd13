// src/nn/losses/elementwise.rs
// Formula tables and the data-parallel element sweep shared by both kernels

use crate::error::{LossError, Result};
use crate::nn::losses::{LossConfig, LossType, classification, regression};
use crate::tensor::{ClipRegion, Size3, Tensor};
use ndarray::{Array3, ArrayView3, Axis, Zip};

/// Unweighted per-element loss. `lse` is the channel log-sum-exp at the
/// element's location and is only read by softmax cross entropy. For cosine
/// distance this is the element's term of `sum(y * t)`.
pub(crate) fn element_loss(config: &LossConfig, y: f32, t: f32, lse: f32) -> f32 {
    match config.loss_type() {
        LossType::MeanAbsoluteError => regression::mean_absolute_error(y, t),
        LossType::MeanSquaredError => regression::mean_squared_error(y, t),
        LossType::SoftmaxCrossEntropy => {
            classification::softmax_cross_entropy(y - lse, config.smoothed_label(t))
        }
        LossType::SigmoidCrossEntropy => {
            classification::sigmoid_cross_entropy(y, config.smoothed_label(t))
        }
        LossType::CategoricalCrossEntropy => classification::categorical_cross_entropy(y, t),
        LossType::Hinge => classification::hinge(y, t),
        LossType::Huber => regression::huber(y, t, config.delta()),
        LossType::CosineDistance => regression::cosine_similarity_term(y, t),
        LossType::Log => classification::log_loss(y, t, config.epsilon()),
        LossType::KullbackLeibler => classification::kullback_leibler(y, t),
    }
}

/// Unweighted d(loss)/dy for one element
pub(crate) fn element_gradient(config: &LossConfig, y: f32, t: f32, lse: f32) -> f32 {
    match config.loss_type() {
        LossType::MeanAbsoluteError => regression::mean_absolute_error_grad(y, t),
        LossType::MeanSquaredError => regression::mean_squared_error_grad(y, t),
        LossType::SoftmaxCrossEntropy => {
            classification::softmax_cross_entropy_grad(y - lse, config.smoothed_label(t))
        }
        LossType::SigmoidCrossEntropy => {
            classification::sigmoid_cross_entropy_grad(y, config.smoothed_label(t))
        }
        LossType::CategoricalCrossEntropy => {
            classification::categorical_cross_entropy_grad(y, t)
        }
        LossType::Hinge => classification::hinge_grad(y, t),
        LossType::Huber => regression::huber_grad(y, t, config.delta()),
        LossType::CosineDistance => regression::cosine_distance_grad(t),
        LossType::Log => classification::log_loss_grad(y, t, config.epsilon()),
        LossType::KullbackLeibler => classification::kullback_leibler_grad(y, t),
    }
}

/// Applies `formula` to every (prediction, label) pair in parallel.
pub(crate) fn map_elements<F>(
    config: &LossConfig,
    predictions: ArrayView3<'_, f32>,
    labels: ArrayView3<'_, f32>,
    formula: F,
) -> Result<Array3<f32>>
where
    F: Fn(&LossConfig, f32, f32, f32) -> f32 + Send + Sync,
{
    if config.loss_type() != LossType::SoftmaxCrossEntropy {
        return Ok(Zip::from(&predictions)
            .and(&labels)
            .par_map_collect(|&y, &t| formula(config, y, t, 0.0)));
    }

    // Softmax normalizes over the channels of each location
    let lanes = classification::channel_log_sum_exp(&predictions);
    let expanded = lanes.view().insert_axis(Axis(2));
    let (height, width, channels) = predictions.dim();
    let lse = expanded.broadcast(predictions.raw_dim()).ok_or_else(|| {
        LossError::shape(
            "log-sum-exp",
            Size3::new(width, height, channels),
            Size3::new(width, height, 1),
        )
    })?;
    Ok(Zip::from(&predictions)
        .and(&labels)
        .and(&lse)
        .par_map_collect(|&y, &t, &l| formula(config, y, t, l)))
}

/// Multiplies `values` (already clipped to `region`) by the per-element
/// weights, or by the config's scalar weight when there are none.
pub(crate) fn apply_weights(
    values: &mut Array3<f32>,
    weights: Option<&Tensor>,
    label_size: Size3,
    region: &ClipRegion,
    scalar: f32,
) -> Result<()> {
    let Some(weights) = weights else {
        values.mapv_inplace(|v| v * scalar);
        return Ok(());
    };
    let view = weights.view()?;
    let full = view
        .broadcast(label_size.hwc())
        .ok_or_else(|| LossError::shape("weights", label_size, weights.size()))?;
    let clipped = region.clip(full);
    Zip::from(values)
        .and(&clipped)
        .par_for_each(|v, &w| *v *= w);
    Ok(())
}
