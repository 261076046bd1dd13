// src/nn/losses/regression.rs
// Per-element formulas for the regression-style losses

/// Mean absolute error: `|y - t|`
pub fn mean_absolute_error(y: f32, t: f32) -> f32 {
    (y - t).abs()
}

/// `(y - t) / |y - t|`, taken as 0 where `y == t`
pub fn mean_absolute_error_grad(y: f32, t: f32) -> f32 {
    let diff = y - t;
    if diff == 0.0 { 0.0 } else { diff.signum() }
}

/// Mean squared error: `(y - t)^2`
pub fn mean_squared_error(y: f32, t: f32) -> f32 {
    let diff = y - t;
    diff * diff
}

pub fn mean_squared_error_grad(y: f32, t: f32) -> f32 {
    2.0 * (y - t)
}

/// Huber loss.
///
/// ```text
/// |y - t| <= delta : 0.5 * y^2
/// |y - t| >  delta : 0.5 * delta^2 + delta * (|y - t| - delta)
/// ```
///
/// The quadratic branch squares `y`, not `y - t`. This is the published
/// contract of the kernel and is reproduced as-is.
pub fn huber(y: f32, t: f32, delta: f32) -> f32 {
    let abs_diff = (y - t).abs();
    if abs_diff <= delta {
        0.5 * y * y
    } else {
        0.5 * delta * delta + delta * (abs_diff - delta)
    }
}

/// `delta` outside the quadratic zone, `y - t` inside it
pub fn huber_grad(y: f32, t: f32, delta: f32) -> f32 {
    let diff = y - t;
    if diff.abs() > delta { delta } else { diff }
}

/// One term of the cosine-distance sum. The loss over a region is
/// `1 - sum(y * t)`.
pub fn cosine_similarity_term(y: f32, t: f32) -> f32 {
    y * t
}

pub fn cosine_distance_grad(t: f32) -> f32 {
    -t
}
