//! # ferrox-loss
//!
//! Training-time loss computation for the Ferrox family: given a batch of
//! network predictions and ground-truth labels (with optional per-element
//! weights), compute the loss value and the gradient of that loss with
//! respect to the predictions, ready for the first layer of the backward pass.
//!
//! ## Features
//!
//! - Ten loss types: mean absolute error, mean squared error, softmax and
//!   sigmoid cross entropy, categorical cross entropy, hinge, Huber, cosine
//!   distance, log loss and Kullback-Leibler divergence
//! - `None` / `Sum` / `Mean` reductions, label smoothing, epsilon and delta knobs
//! - Per-element weights that broadcast over the label tensor
//! - Padded, interleaved or planar tensor layouts via `ndarray` views
//! - Clip regions restricting a kernel to a window of its source
//! - Batch-parallel execution through a command buffer on `rayon`
//! - Written 100% in safe Rust
//!
pub mod backend;
pub mod error;
pub mod nn;
pub mod tensor;

// Re-export commonly used types for convenience
pub use backend::{CommandBuffer, Completion, Device, cpu, default_device};
pub use error::{LossError, Result};
pub use nn::{LossConfig, LossForward, LossGradient, LossKernel, LossLabels, LossType, ReductionType};
pub use tensor::{ClipRegion, DataLayout, Size3, Tensor};
