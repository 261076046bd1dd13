// src/nn/losses/forward.rs
// Forward loss kernel: predictions + labels -> loss image

use crate::backend::CommandBuffer;
use crate::error::{LossError, Result};
use crate::nn::losses::elementwise::{apply_weights, element_loss, map_elements};
use crate::nn::losses::{LossConfig, LossLabels, LossType, Reduced, ReductionEngine};
use crate::tensor::{ClipRegion, Tensor};
use log::{debug, warn};

/// Computes the weighted, reduced loss and writes it into the labels' loss
/// image. Nothing else is mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossForward {
    config: LossConfig,
    clip_region: Option<ClipRegion>,
}

impl LossForward {
    pub fn new(config: LossConfig) -> Self {
        Self {
            config,
            clip_region: None,
        }
    }

    /// Restricts the kernel to a window of the predictions
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

    /// Checks every precondition of `compute` without touching any data and
    /// returns the region the kernel will cover.
    pub fn validate(&self, predictions: &Tensor, labels: &LossLabels) -> Result<ClipRegion> {
        let size = predictions.size();
        if size != labels.label_size() {
            return Err(LossError::shape("predictions", labels.label_size(), size));
        }
        let region = self.clip_region.unwrap_or_else(|| ClipRegion::full(size));
        region.validate_within(size)?;
        ReductionEngine::for_config(&self.config)
            .check_output(region.size(size.channels), labels.loss_size())?;
        Ok(region)
    }

    /// Runs the forward pass immediately.
    pub fn compute(&self, predictions: &Tensor, labels: &mut LossLabels) -> Result<()> {
        let region = self.validate(predictions, labels)?;
        let engine = ReductionEngine::for_config(&self.config);
        let label_size = labels.label_size();
        let (targets, weights, loss) = labels.split_mut();

        let y = region.clip(predictions.view()?);
        let t = region.clip(targets.view()?);
        let mut per_element = map_elements(&self.config, y, t, element_loss)?;

        let reduced = if self.config.loss_type() == LossType::CosineDistance {
            if weights.is_some() {
                warn!("cosine distance ignores per-element weights in the forward pass");
            }
            let similarity = engine.sum(&per_element.view());
            Reduced::Scalar(self.config.weight() * (1.0 - similarity))
        } else {
            apply_weights(
                &mut per_element,
                weights,
                label_size,
                &region,
                self.config.weight(),
            )?;
            engine.reduce(per_element)
        };
        engine.write(reduced, loss, &region)
    }

    /// Validates now and queues the pass on `cb`. The loss image can be
    /// read once `cb` has been committed.
    pub fn encode<'a>(
        &self,
        cb: &mut CommandBuffer<'a>,
        predictions: &'a Tensor,
        labels: &'a mut LossLabels,
    ) -> Result<usize> {
        self.validate(predictions, labels)?;
        if self.config.loss_type() == LossType::CosineDistance
            && self.config.reduction_type() != self.config.effective_reduction()
        {
            warn!(
                "cosine distance always sums; configured reduction '{}' is ignored",
                self.config.reduction_type()
            );
        }
        debug!(
            "encode {} forward over {} (reduction {})",
            self.config.loss_type(),
            predictions.size(),
            self.config.effective_reduction()
        );
        let kernel = *self;
        Ok(cb.enqueue(format!("{} forward", self.config.loss_type()), move || {
            kernel.compute(predictions, labels)
        }))
    }

    /// Queues one forward pass per (prediction, labels) pair.
    ///
    /// Pairs are validated independently: an invalid pair gets an `Err` at its
    /// index and is not queued, while the others are. The outer `Err` is only
    /// returned when the two slices differ in length.
    pub fn encode_batch<'a>(
        &self,
        cb: &mut CommandBuffer<'a>,
        predictions: &'a [Tensor],
        labels: &'a mut [LossLabels],
    ) -> Result<Vec<Result<usize>>> {
        if predictions.len() != labels.len() {
            return Err(LossError::BatchLengthMismatch {
                predictions: predictions.len(),
                labels: labels.len(),
            });
        }
        let kernel = *self;
        let encoded = predictions
            .iter()
            .zip(labels.iter_mut())
            .enumerate()
            .map(|(i, (p, l))| {
                kernel.validate(p, l).inspect_err(|e| {
                    warn!("batch element {} rejected: {}", i, e);
                })?;
                Ok(cb.enqueue(
                    format!("{} forward [{}]", kernel.config.loss_type(), i),
                    move || kernel.compute(p, l),
                ))
            })
            .collect();
        Ok(encoded)
    }
}
