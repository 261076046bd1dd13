// src/nn/losses/kernel.rs
// Combined loss kernel: one pass fills the loss image and the gradient

use crate::backend::{CommandBuffer, Device};
use crate::error::{LossError, Result};
use crate::nn::losses::gradient::check_batch;
use crate::nn::losses::{LossConfig, LossForward, LossGradient, LossLabels};
use crate::tensor::{ClipRegion, Tensor};
use log::{debug, warn};

/// Training-time loss layer.
///
/// Takes the predictions of the inference pass and a [`LossLabels`]. It
/// writes the loss into the labels' loss image and the gradient into a
/// destination tensor. That gradient is the source gradient of the first
/// layer in the backward direction.
///
/// # Examples
///
/// ```rust
/// use ferrox_loss::backend::cpu;
/// use ferrox_loss::nn::losses::{LossConfig, LossKernel, LossLabels, LossType, ReductionType};
/// use ferrox_loss::tensor::{Size3, Tensor};
///
/// let size = Size3::new(1, 1, 1);
/// let config = LossConfig::new(LossType::MeanSquaredError, ReductionType::Sum);
/// let kernel = LossKernel::new(config);
///
/// let predictions = Tensor::from_vec(vec![2.0], size).unwrap();
/// let mut labels = LossLabels::from_slices(&[0.0], size, None, Size3::SCALAR).unwrap();
/// let mut gradient = cpu().zeros(size);
///
/// let mut cb = cpu().new_command_buffer();
/// kernel.encode(&mut cb, &predictions, &mut labels, &mut gradient).unwrap();
/// cb.commit().wait_until_completed().unwrap();
///
/// assert_eq!(labels.loss_image().first(), Some(4.0));
/// assert_eq!(gradient.first(), Some(4.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossKernel {
    forward: LossForward,
    gradient: LossGradient,
}

impl LossKernel {
    pub fn new(config: LossConfig) -> Self {
        Self {
            forward: LossForward::new(config),
            gradient: LossGradient::new(config),
        }
    }

    pub fn with_clip_region(self, region: ClipRegion) -> Self {
        Self {
            forward: self.forward.with_clip_region(region),
            gradient: self.gradient.with_clip_region(region),
        }
    }

    pub fn config(&self) -> &LossConfig {
        self.forward.config()
    }

    pub fn forward(&self) -> &LossForward {
        &self.forward
    }

    pub fn gradient(&self) -> &LossGradient {
        &self.gradient
    }

    /// Both kernels' preconditions, checked before anything is written.
    pub fn validate(
        &self,
        predictions: &Tensor,
        labels: &LossLabels,
        destination: &Tensor,
    ) -> Result<()> {
        self.forward.validate(predictions, labels)?;
        self.gradient.validate(predictions, labels, destination)?;
        Ok(())
    }

    /// Runs the forward and gradient passes immediately.
    pub fn compute(
        &self,
        predictions: &Tensor,
        labels: &mut LossLabels,
        destination: &mut Tensor,
    ) -> Result<()> {
        self.validate(predictions, labels, destination)?;
        self.forward.compute(predictions, labels)?;
        self.gradient.compute_into(predictions, labels, destination)
    }

    /// Runs both passes immediately and returns the gradient in a new tensor.
    pub fn compute_gradient(&self, predictions: &Tensor, labels: &mut LossLabels) -> Result<Tensor> {
        let mut destination = Tensor::zeros(predictions.size());
        self.compute(predictions, labels, &mut destination)?;
        Ok(destination)
    }

    /// Validates now and queues both passes as one unit of work on `cb`.
    pub fn encode<'a>(
        &self,
        cb: &mut CommandBuffer<'a>,
        predictions: &'a Tensor,
        labels: &'a mut LossLabels,
        destination: &'a mut Tensor,
    ) -> Result<usize> {
        self.validate(predictions, labels, destination)?;
        debug!(
            "encode {} loss over {} (reduction {})",
            self.config().loss_type(),
            predictions.size(),
            self.config().effective_reduction()
        );
        let kernel = *self;
        Ok(cb.enqueue(format!("{} loss", self.config().loss_type()), move || {
            kernel.compute(predictions, labels, destination)
        }))
    }

    /// Queues one unit of work per batch element.
    ///
    /// Pair `i` of `predictions`, `labels` and `destinations` belong
    /// together. Each pair is validated on its own: a rejected pair yields an
    /// `Err` at its index and the rest are still queued. Elements share no
    /// state and may run concurrently.
    pub fn encode_batch<'a>(
        &self,
        cb: &mut CommandBuffer<'a>,
        predictions: &'a [Tensor],
        labels: &'a mut [LossLabels],
        destinations: &'a mut [Tensor],
    ) -> Result<Vec<Result<usize>>> {
        check_batch(predictions.len(), labels.len(), destinations.len())?;
        debug!(
            "encode {} loss over a batch of {}",
            self.config().loss_type(),
            predictions.len()
        );
        let kernel = *self;
        let encoded = predictions
            .iter()
            .zip(labels.iter_mut())
            .zip(destinations.iter_mut())
            .enumerate()
            .map(|(i, ((p, l), d))| {
                kernel.validate(p, l, d).inspect_err(|e| {
                    warn!("batch element {} rejected: {}", i, e);
                })?;
                Ok(cb.enqueue(
                    format!("{} loss [{}]", kernel.config().loss_type(), i),
                    move || kernel.compute(p, l, d),
                ))
            })
            .collect();
        Ok(encoded)
    }

    /// Encodes, commits and waits for a whole batch on `device`.
    ///
    /// Each label source's loss image is filled and the gradients are
    /// returned in batch order. A failure at one index leaves every other
    /// index's loss and gradient intact.
    pub fn compute_batch(
        &self,
        device: &Device,
        predictions: &[Tensor],
        labels: &mut [LossLabels],
    ) -> Result<Vec<Result<Tensor>>> {
        if predictions.len() != labels.len() {
            return Err(LossError::BatchLengthMismatch {
                predictions: predictions.len(),
                labels: labels.len(),
            });
        }
        let mut destinations: Vec<Tensor> =
            predictions.iter().map(|p| device.zeros(p.size())).collect();

        let (encoded, completion) = {
            let mut cb = device
                .new_command_buffer()
                .with_label(format!("{} batch", self.config().loss_type()));
            let encoded = self.encode_batch(&mut cb, predictions, labels, &mut destinations)?;
            (encoded, cb.commit())
        };

        Ok(encoded
            .into_iter()
            .zip(destinations)
            .map(|(item, destination)| {
                item.and_then(|index| completion.take_result(index))
                    .map(|()| destination)
            })
            .collect())
    }
}
