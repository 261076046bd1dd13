// src/nn/losses/classification.rs
// Per-element formulas for the classification and divergence losses

use ndarray::{Array2, ArrayView1, ArrayView3, Axis};

/// Softmax label smoothing: `t * (1 - s) + s / classes`
pub fn smooth_softmax_label(t: f32, smoothing: f32, classes: u32) -> f32 {
    if smoothing > 0.0 {
        t * (1.0 - smoothing) + smoothing / classes as f32
    } else {
        t
    }
}

/// Sigmoid label smoothing: `t * (1 - s) + 0.5 * s`
pub fn smooth_sigmoid_label(t: f32, smoothing: f32) -> f32 {
    if smoothing > 0.0 {
        t * (1.0 - smoothing) + 0.5 * smoothing
    } else {
        t
    }
}

/// `log(sum(exp(v)))`, shifted by the maximum so large logits do not overflow
pub fn log_sum_exp(values: ArrayView1<'_, f32>) -> f32 {
    let max = values.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    if !max.is_finite() {
        return max;
    }
    let sum = values.fold(0.0f32, |acc, &v| acc + (v - max).exp());
    max + sum.ln()
}

/// Log-sum-exp of every channel lane of a (height, width, channels) view
pub fn channel_log_sum_exp(logits: &ArrayView3<'_, f32>) -> Array2<f32> {
    logits.map_axis(Axis(2), log_sum_exp)
}

/// Softmax cross entropy for one element, given its log-probability
/// `y - logSumExp(lane)` and a (smoothed) label.
pub fn softmax_cross_entropy(log_prob: f32, t: f32) -> f32 {
    -t * log_prob
}

/// `softmax(y) - t`
pub fn softmax_cross_entropy_grad(log_prob: f32, t: f32) -> f32 {
    log_prob.exp() - t
}

/// Logistic function, evaluated on the side that cannot overflow
pub fn sigmoid(y: f32) -> f32 {
    if y >= 0.0 {
        1.0 / (1.0 + (-y).exp())
    } else {
        let e = y.exp();
        e / (1.0 + e)
    }
}

/// `max(y, 0) - y * t + log(1 + exp(-|y|))`
pub fn sigmoid_cross_entropy(y: f32, t: f32) -> f32 {
    y.max(0.0) - y * t + (-y.abs()).exp().ln_1p()
}

pub fn sigmoid_cross_entropy_grad(y: f32, t: f32) -> f32 {
    sigmoid(y) - t
}

/// `-t * log(y)`. A zero label contributes nothing, even where `y == 0`.
pub fn categorical_cross_entropy(y: f32, t: f32) -> f32 {
    if t == 0.0 { 0.0 } else { -t * y.ln() }
}

/// `-t / y`. Zero where `t == 0`; otherwise IEEE division, so `y == 0`
/// yields an infinity rather than an error.
pub fn categorical_cross_entropy_grad(y: f32, t: f32) -> f32 {
    if t == 0.0 { 0.0 } else { -t / y }
}

/// `max(1 - t * y, 0)` with labels expected in {0, 1}
pub fn hinge(y: f32, t: f32) -> f32 {
    (1.0 - t * y).max(0.0)
}

/// `(1 + (1 - 2t) * y) > 0 ? 1 - 2t : 0`
pub fn hinge_grad(y: f32, t: f32) -> f32 {
    let sign = 1.0 - 2.0 * t;
    if 1.0 + sign * y > 0.0 { sign } else { 0.0 }
}

/// `-t * log(y + eps) - (1 - t) * log(1 - y + eps)`
pub fn log_loss(y: f32, t: f32, epsilon: f32) -> f32 {
    -t * (y + epsilon).ln() - (1.0 - t) * (1.0 - y + epsilon).ln()
}

/// `(-2 * eps * t - t + y + eps) / (y * (1 - y) + eps * (eps + 1))`
pub fn log_loss_grad(y: f32, t: f32, epsilon: f32) -> f32 {
    (-2.0 * epsilon * t - t + y + epsilon) / (y * (1.0 - y) + epsilon * (epsilon + 1.0))
}

/// `t * (log(t) - y)` with `y` in log space. `0 * log(0)` is taken as 0.
pub fn kullback_leibler(y: f32, t: f32) -> f32 {
    if t == 0.0 { 0.0 } else { t * (t.ln() - y) }
}

/// `-t / y`, with the same zero-label convention as the forward pass.
///
/// This is the published KL gradient, not d/dy of [`kullback_leibler`]
/// (which would be `-t`). Softmax cross entropy, by contrast, returns the
/// true derivative.
pub fn kullback_leibler_grad(y: f32, t: f32) -> f32 {
    if t == 0.0 { 0.0 } else { -t / y }
}
