// src/nn/losses/reduction.rs
// Folds weighted per-element losses into the loss image

use crate::error::{LossError, Result};
use crate::nn::losses::{LossConfig, LossType, ReductionType};
use crate::tensor::{ClipRegion, Size3, Tensor};
use ndarray::{Array3, ArrayView3};

/// Result of a reduction
#[derive(Debug, Clone, PartialEq)]
pub enum Reduced {
    /// One value per element of the region, (height, width, channels)
    PerElement(Array3<f32>),
    /// A single value for the whole region
    Scalar(f32),
}

/// Applies a reduction policy to weighted per-element losses.
///
/// The mean divides by `W * H * C`, except for softmax and sigmoid cross
/// entropy, whose per-location loss is an aggregate over classes and which
/// therefore divide by `W * H`. Sums are folded sequentially so the same
/// input always reduces to the same bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReductionEngine {
    loss_type: LossType,
    reduction: ReductionType,
}

impl ReductionEngine {
    /// Cosine distance is forced to `Sum` whatever `reduction` says.
    pub fn new(loss_type: LossType, reduction: ReductionType) -> Self {
        let reduction = match loss_type {
            LossType::CosineDistance => ReductionType::Sum,
            _ => reduction,
        };
        Self {
            loss_type,
            reduction,
        }
    }

    pub fn for_config(config: &LossConfig) -> Self {
        Self::new(config.loss_type(), config.reduction_type())
    }

    /// Reduction actually applied
    pub fn reduction(&self) -> ReductionType {
        self.reduction
    }

    /// Element count the mean divides by for a region of `size`
    pub fn normalizer(&self, size: Size3) -> usize {
        if self.loss_type.is_cross_entropy() {
            size.width * size.height
        } else {
            size.len()
        }
    }

    pub fn sum(&self, values: &ArrayView3<'_, f32>) -> f32 {
        values.fold(0.0f32, |acc, &v| acc + v)
    }

    pub fn reduce(&self, weighted: Array3<f32>) -> Reduced {
        match self.reduction {
            ReductionType::None => Reduced::PerElement(weighted),
            ReductionType::Sum => Reduced::Scalar(self.sum(&weighted.view())),
            ReductionType::Mean => {
                let (height, width, channels) = weighted.dim();
                let n = self.normalizer(Size3::new(width, height, channels));
                Reduced::Scalar(self.sum(&weighted.view()) / n as f32)
            }
        }
    }

    /// Rejects loss images that cannot hold what this engine produces for a
    /// region of `region_size`.
    pub fn check_output(&self, region_size: Size3, output: Size3) -> Result<()> {
        if self.reduction == ReductionType::None && output.is_scalar() && !region_size.is_scalar()
        {
            return Err(LossError::UnsupportedCombination {
                reason: format!(
                    "reduction 'none' over a {} region needs a per-element loss image, got {}",
                    region_size, output
                ),
            });
        }
        Ok(())
    }

    /// Writes a reduction result into the loss image.
    ///
    /// Per-element results land at the region's coordinates; a scalar lands
    /// at the origin. Every other element of the image is zeroed.
    pub fn write(&self, reduced: Reduced, output: &mut Tensor, region: &ClipRegion) -> Result<()> {
        output.fill(0.0)?;
        let mut view = output.view_mut()?;
        match reduced {
            Reduced::Scalar(value) => view[[0, 0, 0]] = value,
            Reduced::PerElement(values) => {
                let mut target = if view.dim() == values.dim() {
                    view
                } else {
                    region.clip_mut(view)
                };
                if target.dim() != values.dim() {
                    let (h, w, c) = values.dim();
                    let (oh, ow, oc) = target.dim();
                    return Err(LossError::shape(
                        "loss image",
                        Size3::new(w, h, c),
                        Size3::new(ow, oh, oc),
                    ));
                }
                target.assign(&values);
            }
        }
        Ok(())
    }
}
