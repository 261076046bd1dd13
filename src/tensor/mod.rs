// src/tensor/mod.rs
// Strided f32 storage shared by predictions, labels, weights, losses and gradients

pub mod descriptor;

pub use descriptor::{ClipRegion, DataLayout, Size3, TensorDescriptor};

use crate::error::{LossError, Result};
use ndarray::{Array3, ArrayView3, ArrayViewMut3, ShapeBuilder};

/// Owned (width, height, channels) buffer of `f32` values.
///
/// The buffer may be padded: the descriptor's row and slice strides say where
/// each element lives. Kernels read and write through ndarray views in
/// (height, width, channels) order regardless of the memory layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Vec<f32>,
    descriptor: TensorDescriptor,
}

impl Tensor {
    /// Dense zero-filled tensor
    pub fn zeros(size: Size3) -> Self {
        Self::full(size, 0.0)
    }

    pub fn full(size: Size3, value: f32) -> Self {
        Self {
            data: vec![value; size.len()],
            descriptor: TensorDescriptor::dense(size, DataLayout::HeightWidthChannels),
        }
    }

    /// Dense tensor from values in (height, width, channels) order
    pub fn from_vec(data: Vec<f32>, size: Size3) -> Result<Self> {
        if data.len() != size.len() {
            return Err(LossError::InvalidLayout {
                reason: format!(
                    "{} values cannot fill a dense tensor of size {}",
                    data.len(),
                    size
                ),
            });
        }
        Self::from_descriptor(
            data,
            TensorDescriptor::dense(size, DataLayout::HeightWidthChannels),
        )
    }

    /// Tensor over an existing (possibly padded) buffer
    pub fn from_descriptor(data: Vec<f32>, descriptor: TensorDescriptor) -> Result<Self> {
        descriptor.validate()?;
        if data.len() < descriptor.required_len() {
            return Err(LossError::InvalidLayout {
                reason: format!(
                    "buffer holds {} elements but the descriptor needs {}",
                    data.len(),
                    descriptor.required_len()
                ),
            });
        }
        Ok(Self { data, descriptor })
    }

    /// Dense tensor from an array indexed as (height, width, channels)
    pub fn from_array(array: Array3<f32>) -> Self {
        let (height, width, channels) = array.dim();
        Self {
            data: array.iter().copied().collect(),
            descriptor: TensorDescriptor::dense(
                Size3::new(width, height, channels),
                DataLayout::HeightWidthChannels,
            ),
        }
    }

    pub fn size(&self) -> Size3 {
        self.descriptor.size()
    }

    pub fn layout(&self) -> DataLayout {
        self.descriptor.layout()
    }

    pub fn descriptor(&self) -> &TensorDescriptor {
        &self.descriptor
    }

    /// Number of logical elements (padding excluded)
    pub fn len(&self) -> usize {
        self.size().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw storage, padding included
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Element at (x, y, channel)
    pub fn get(&self, x: usize, y: usize, channel: usize) -> Option<f32> {
        let size = self.size();
        if x >= size.width || y >= size.height || channel >= size.channels {
            return None;
        }
        self.data.get(self.descriptor.offset(x, y, channel)).copied()
    }

    /// Element at the origin; the whole value of a `{1, 1, 1}` loss image
    pub fn first(&self) -> Option<f32> {
        self.get(0, 0, 0)
    }

    /// Logical elements in dense (height, width, channels) order
    pub fn to_vec(&self) -> Vec<f32> {
        let size = self.size();
        let mut out = Vec::with_capacity(size.len());
        for y in 0..size.height {
            for x in 0..size.width {
                for c in 0..size.channels {
                    out.push(self.data[self.descriptor.offset(x, y, c)]);
                }
            }
        }
        out
    }

    pub fn view(&self) -> Result<ArrayView3<'_, f32>> {
        let shape = self.size().hwc().strides(self.descriptor.strides_hwc());
        ArrayView3::from_shape(shape, &self.data).map_err(|e| LossError::InvalidLayout {
            reason: format!("cannot view tensor of size {}: {}", self.size(), e),
        })
    }

    pub fn view_mut(&mut self) -> Result<ArrayViewMut3<'_, f32>> {
        let size = self.size();
        let shape = size.hwc().strides(self.descriptor.strides_hwc());
        ArrayViewMut3::from_shape(shape, &mut self.data).map_err(|e| LossError::InvalidLayout {
            reason: format!("cannot view tensor of size {}: {}", size, e),
        })
    }

    /// Fills every logical element with `value`; padding is left alone.
    pub fn fill(&mut self, value: f32) -> Result<()> {
        self.view_mut()?.fill(value);
        Ok(())
    }
}
