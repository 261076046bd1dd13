// Neural network training module for ferrox-loss
// Loss layers: forward loss, loss gradient and the combined kernel that
// starts the backward pass of a training step.

pub mod losses;

// Re-export the main types for convenience
pub use losses::{
    LossConfig, LossDataDescriptor, LossForward, LossGradient, LossKernel, LossLabels, LossType,
    ReductionEngine, ReductionType,
};
