// src/nn/losses/gradient.rs
// Loss gradient kernel: predictions + labels -> d(loss)/d(predictions)

use crate::backend::CommandBuffer;
use crate::error::{LossError, Result};
use crate::nn::losses::elementwise::{apply_weights, element_gradient, map_elements};
use crate::nn::losses::{LossConfig, LossLabels};
use crate::tensor::{ClipRegion, Tensor};
use log::{debug, warn};

/// Computes the weighted per-element gradient of the loss with respect to
/// the predictions.
///
/// Gradients are never reduced: the destination always has the prediction
/// size, and the configured reduction type is ignored. Inside the clip region
/// every destination element is overwritten; outside it the destination is
/// left untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossGradient {
    config: LossConfig,
    clip_region: Option<ClipRegion>,
}

impl LossGradient {
    pub fn new(config: LossConfig) -> Self {
        Self {
            config,
            clip_region: None,
        }
    }

    pub fn with_clip_region(mut self, region: ClipRegion) -> Self {
        self.clip_region = Some(region);
        self
    }

    pub fn config(&self) -> &LossConfig {
        &self.config
    }

    pub fn clip_region(&self) -> Option<ClipRegion> {
        self.clip_region
    }

    pub fn validate(
        &self,
        predictions: &Tensor,
        labels: &LossLabels,
        destination: &Tensor,
    ) -> Result<ClipRegion> {
        let size = predictions.size();
        if size != labels.label_size() {
            return Err(LossError::shape("predictions", labels.label_size(), size));
        }
        if destination.size() != size {
            return Err(LossError::shape("gradient destination", size, destination.size()));
        }
        let region = self.clip_region.unwrap_or_else(|| ClipRegion::full(size));
        region.validate_within(size)?;
        Ok(region)
    }

    /// Runs the gradient pass immediately into `destination`.
    pub fn compute_into(
        &self,
        predictions: &Tensor,
        labels: &LossLabels,
        destination: &mut Tensor,
    ) -> Result<()> {
        let region = self.validate(predictions, labels, destination)?;

        let y = region.clip(predictions.view()?);
        let t = region.clip(labels.labels().view()?);
        let mut gradient = map_elements(&self.config, y, t, element_gradient)?;
        apply_weights(
            &mut gradient,
            labels.weights(),
            labels.label_size(),
            &region,
            self.config.weight(),
        )?;

        region.clip_mut(destination.view_mut()?).assign(&gradient);
        Ok(())
    }

    /// Runs the gradient pass immediately into a new dense tensor.
    pub fn compute(&self, predictions: &Tensor, labels: &LossLabels) -> Result<Tensor> {
        let mut destination = Tensor::zeros(predictions.size());
        self.compute_into(predictions, labels, &mut destination)?;
        Ok(destination)
    }

    /// Validates now and queues the pass on `cb`. Several gradient passes may
    /// share one `LossLabels`.
    pub fn encode<'a>(
        &self,
        cb: &mut CommandBuffer<'a>,
        predictions: &'a Tensor,
        labels: &'a LossLabels,
        destination: &'a mut Tensor,
    ) -> Result<usize> {
        self.validate(predictions, labels, destination)?;
        debug!(
            "encode {} gradient over {}",
            self.config.loss_type(),
            predictions.size()
        );
        let kernel = *self;
        Ok(cb.enqueue(format!("{} gradient", self.config.loss_type()), move || {
            kernel.compute_into(predictions, labels, destination)
        }))
    }

    /// Queues one gradient pass per pair; see [`LossForward::encode_batch`]
    /// for the per-index error contract.
    ///
    /// [`LossForward::encode_batch`]: crate::nn::losses::LossForward::encode_batch
    pub fn encode_batch<'a>(
        &self,
        cb: &mut CommandBuffer<'a>,
        predictions: &'a [Tensor],
        labels: &'a [LossLabels],
        destinations: &'a mut [Tensor],
    ) -> Result<Vec<Result<usize>>> {
        check_batch(predictions.len(), labels.len(), destinations.len())?;
        let kernel = *self;
        let encoded = predictions
            .iter()
            .zip(labels.iter())
            .zip(destinations.iter_mut())
            .enumerate()
            .map(|(i, ((p, l), d))| {
                kernel.validate(p, l, d).inspect_err(|e| {
                    warn!("batch element {} rejected: {}", i, e);
                })?;
                Ok(cb.enqueue(
                    format!("{} gradient [{}]", kernel.config.loss_type(), i),
                    move || kernel.compute_into(p, l, d),
                ))
            })
            .collect();
        Ok(encoded)
    }
}

pub(crate) fn check_batch(predictions: usize, labels: usize, destinations: usize) -> Result<()> {
    if predictions != labels {
        return Err(LossError::BatchLengthMismatch {
            predictions,
            labels,
        });
    }
    if predictions != destinations {
        return Err(LossError::UnsupportedCombination {
            reason: format!(
                "{} gradient destinations for {} predictions",
                destinations, predictions
            ),
        });
    }
    Ok(())
}
