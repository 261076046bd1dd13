// src/nn/losses/labels.rs
// Label/weight storage and the loss image a forward pass fills

use crate::error::{LossError, Result};
use crate::tensor::{DataLayout, Size3, Tensor, TensorDescriptor};

/// Describes caller-owned label or weight data: values, layout, size and
/// (optionally padded) strides. The same descriptor type serves both labels
/// and weights.
#[derive(Debug, Clone, Copy)]
pub struct LossDataDescriptor<'d> {
    data: &'d [f32],
    descriptor: TensorDescriptor,
}

impl<'d> LossDataDescriptor<'d> {
    /// Strides are computed for a dense buffer. Use `with_row_stride` /
    /// `with_slice_stride` for padded data.
    pub fn new(data: &'d [f32], layout: DataLayout, size: Size3) -> Self {
        Self {
            data,
            descriptor: TensorDescriptor::dense(size, layout),
        }
    }

    pub fn with_row_stride(mut self, row_stride: usize) -> Self {
        self.descriptor = self.descriptor.with_row_stride(row_stride);
        self
    }

    pub fn with_slice_stride(mut self, slice_stride: usize) -> Self {
        self.descriptor = self.descriptor.with_slice_stride(slice_stride);
        self
    }

    pub fn data(&self) -> &'d [f32] {
        self.data
    }

    pub fn size(&self) -> Size3 {
        self.descriptor.size()
    }

    pub fn layout(&self) -> DataLayout {
        self.descriptor.layout()
    }

    pub fn row_stride(&self) -> usize {
        self.descriptor.row_stride()
    }

    pub fn slice_stride(&self) -> usize {
        self.descriptor.slice_stride()
    }

    /// Deep copy into an owned tensor that keeps this layout and padding
    fn to_tensor(&self) -> Result<Tensor> {
        self.descriptor.validate()?;
        let needed = self.descriptor.required_len();
        let data = self.data.get(..needed).ok_or_else(|| LossError::InvalidLayout {
            reason: format!(
                "descriptor for {} needs {} elements, data holds {}",
                self.size(),
                needed,
                self.data.len()
            ),
        })?;
        Tensor::from_descriptor(data.to_vec(), self.descriptor)
    }
}

/// Targets, optional per-element weights and the loss image for one input.
///
/// The label and weight data are copied on construction, so the caller's
/// buffers can be reused straight away. The loss image is either the label
/// size (per-element losses) or `{1, 1, 1}` (a scalar loss).
///
/// A forward pass overwrites the loss image. Its contents are only
/// meaningful once the command buffer that carried the pass has been
/// committed; before that the buffer still holds the labels borrowed.
#[derive(Debug, Clone)]
pub struct LossLabels {
    labels: Tensor,
    weights: Option<Tensor>,
    loss: Tensor,
}

impl LossLabels {
    /// Labels without weights and a `{1, 1, 1}` loss image
    pub fn new(labels: &LossDataDescriptor<'_>) -> Result<Self> {
        Self::create(Size3::SCALAR, labels, None)
    }

    /// Fails with `ShapeMismatch` when `weights` does not broadcast to the
    /// label size, or `loss_size` is neither `{1, 1, 1}` nor the label size.
    pub fn create(
        loss_size: Size3,
        labels: &LossDataDescriptor<'_>,
        weights: Option<&LossDataDescriptor<'_>>,
    ) -> Result<Self> {
        let label_size = labels.size();
        if !loss_size.is_scalar() && loss_size != label_size {
            return Err(LossError::shape("loss image", label_size, loss_size));
        }
        let labels = labels.to_tensor()?;
        let weights = weights
            .map(|w| check_weights(w, label_size).and_then(|()| w.to_tensor()))
            .transpose()?;

        Ok(Self {
            labels,
            weights,
            loss: Tensor::zeros(loss_size),
        })
    }

    /// Dense interleaved label (and weight) data
    pub fn from_slices(
        label_data: &[f32],
        label_size: Size3,
        weights: Option<(&[f32], Size3)>,
        loss_size: Size3,
    ) -> Result<Self> {
        let labels = LossDataDescriptor::new(label_data, DataLayout::HeightWidthChannels, label_size);
        let weights = weights.map(|(data, size)| {
            LossDataDescriptor::new(data, DataLayout::HeightWidthChannels, size)
        });
        Self::create(loss_size, &labels, weights.as_ref())
    }

    pub fn labels(&self) -> &Tensor {
        &self.labels
    }

    pub fn weights(&self) -> Option<&Tensor> {
        self.weights.as_ref()
    }

    pub fn label_size(&self) -> Size3 {
        self.labels.size()
    }

    pub fn loss_size(&self) -> Size3 {
        self.loss.size()
    }

    /// Loss values written by the most recent forward pass
    pub fn loss_image(&self) -> &Tensor {
        &self.loss
    }

    /// Replaces the labels for the next step. The size must not change.
    pub fn update_labels(&mut self, labels: &LossDataDescriptor<'_>) -> Result<()> {
        if labels.size() != self.label_size() {
            return Err(LossError::shape("labels", self.label_size(), labels.size()));
        }
        self.labels = labels.to_tensor()?;
        Ok(())
    }

    /// Replaces or removes the per-element weights.
    pub fn update_weights(&mut self, weights: Option<&LossDataDescriptor<'_>>) -> Result<()> {
        self.weights = match weights {
            Some(w) => {
                check_weights(w, self.label_size())?;
                Some(w.to_tensor()?)
            }
            None => None,
        };
        Ok(())
    }

    /// Labels and weights for reading alongside the loss image for writing
    pub(crate) fn split_mut(&mut self) -> (&Tensor, Option<&Tensor>, &mut Tensor) {
        (&self.labels, self.weights.as_ref(), &mut self.loss)
    }
}

fn check_weights(weights: &LossDataDescriptor<'_>, label_size: Size3) -> Result<()> {
    if weights.size().broadcasts_to(label_size) {
        Ok(())
    } else {
        Err(LossError::shape("weights", label_size, weights.size()))
    }
}
