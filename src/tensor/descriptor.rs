// src/tensor/descriptor.rs
// Size, layout and stride bookkeeping for loss tensors

use crate::error::{LossError, Result};
use ndarray::{ArrayView3, ArrayViewMut3, s};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tensor extent: (width, height, feature channels)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size3 {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

impl Size3 {
    /// The `{1, 1, 1}` size used for scalar loss images.
    pub const SCALAR: Size3 = Size3::new(1, 1, 1);

    pub const fn new(width: usize, height: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
        }
    }

    /// Total number of logical elements, saturating at `usize::MAX`
    pub fn len(&self) -> usize {
        self.checked_len().unwrap_or(usize::MAX)
    }

    /// Total number of logical elements, or `None` if it overflows `usize`
    pub fn checked_len(&self) -> Option<usize> {
        self.width
            .checked_mul(self.height)?
            .checked_mul(self.channels)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.channels == 0
    }

    pub fn is_scalar(&self) -> bool {
        *self == Self::SCALAR
    }

    /// True if every dimension either matches `target` or is 1.
    pub fn broadcasts_to(&self, target: Size3) -> bool {
        let fits = |have: usize, want: usize| have == want || have == 1;
        fits(self.width, target.width)
            && fits(self.height, target.height)
            && fits(self.channels, target.channels)
    }

    /// ndarray shape in the crate's logical (height, width, channels) order
    pub(crate) fn hwc(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.channels)
    }
}

impl fmt::Display for Size3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}, {}}}", self.width, self.height, self.channels)
    }
}

/// Memory order of tensor elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataLayout {
    /// Channels interleaved per pixel: offset = y*row + x*channels + c.
    /// The slice stride is the footprint of one whole image.
    #[default]
    HeightWidthChannels,
    /// One plane per channel: offset = c*slice + y*row + x.
    ChannelsHeightWidth,
}

/// Size, layout and strides (in elements) of a tensor buffer.
///
/// Strides may exceed their dense values to describe padded rows or planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorDescriptor {
    size: Size3,
    layout: DataLayout,
    row_stride: usize,
    slice_stride: usize,
}

impl TensorDescriptor {
    /// Descriptor for a densely packed buffer. Strides saturate for sizes
    /// that overflow `usize`; `validate` rejects those.
    pub fn dense(size: Size3, layout: DataLayout) -> Self {
        let row_stride = match layout {
            DataLayout::HeightWidthChannels => size.width.saturating_mul(size.channels),
            DataLayout::ChannelsHeightWidth => size.width,
        };
        Self {
            size,
            layout,
            row_stride,
            slice_stride: row_stride.saturating_mul(size.height),
        }
    }

    /// Overrides the row stride. Call `validate` (or hand the descriptor to
    /// a constructor that does) before use.
    pub fn with_row_stride(mut self, row_stride: usize) -> Self {
        // Keep the slice stride dense relative to the new rows
        let min_slice = row_stride.saturating_mul(self.size.height);
        if self.slice_stride < min_slice {
            self.slice_stride = min_slice;
        }
        self.row_stride = row_stride;
        self
    }

    pub fn with_slice_stride(mut self, slice_stride: usize) -> Self {
        self.slice_stride = slice_stride;
        self
    }

    pub fn size(&self) -> Size3 {
        self.size
    }

    pub fn layout(&self) -> DataLayout {
        self.layout
    }

    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    pub fn slice_stride(&self) -> usize {
        self.slice_stride
    }

    pub fn is_dense(&self) -> bool {
        *self == Self::dense(self.size, self.layout)
    }

    /// Checks that the strides can address every element without overlap
    /// and that the whole buffer length fits in `usize`.
    pub fn validate(&self) -> Result<()> {
        if self.size.is_empty() {
            return Err(LossError::InvalidLayout {
                reason: format!("size {} has a zero dimension", self.size),
            });
        }
        let overflow = || LossError::InvalidLayout {
            reason: format!("size {} overflows the addressable range", self.size),
        };
        self.size.checked_len().ok_or_else(overflow)?;
        let min_row = match self.layout {
            DataLayout::HeightWidthChannels => self
                .size
                .width
                .checked_mul(self.size.channels)
                .ok_or_else(overflow)?,
            DataLayout::ChannelsHeightWidth => self.size.width,
        };
        if self.row_stride < min_row {
            return Err(LossError::InvalidLayout {
                reason: format!(
                    "row stride {} is smaller than a dense row of {} elements",
                    self.row_stride, min_row
                ),
            });
        }
        let min_slice = self
            .row_stride
            .checked_mul(self.size.height)
            .ok_or_else(overflow)?;
        if self.slice_stride < min_slice {
            return Err(LossError::InvalidLayout {
                reason: format!(
                    "slice stride {} is smaller than {} rows of {} elements",
                    self.slice_stride, self.size.height, self.row_stride
                ),
            });
        }
        self.checked_required_len().ok_or_else(overflow)?;
        Ok(())
    }

    /// Number of elements a buffer must hold, padding included. Saturates
    /// for descriptors that fail `validate`.
    pub fn required_len(&self) -> usize {
        self.checked_required_len().unwrap_or(usize::MAX)
    }

    fn checked_required_len(&self) -> Option<usize> {
        match self.layout {
            DataLayout::HeightWidthChannels => Some(self.slice_stride),
            DataLayout::ChannelsHeightWidth => self.slice_stride.checked_mul(self.size.channels),
        }
    }

    /// Strides for the logical (height, width, channels) axes
    pub(crate) fn strides_hwc(&self) -> (usize, usize, usize) {
        match self.layout {
            DataLayout::HeightWidthChannels => (self.row_stride, self.size.channels, 1),
            DataLayout::ChannelsHeightWidth => (self.row_stride, 1, self.slice_stride),
        }
    }

    pub(crate) fn offset(&self, x: usize, y: usize, c: usize) -> usize {
        let (sh, sw, sc) = self.strides_hwc();
        y * sh + x * sw + c * sc
    }
}

/// Window of a source tensor a kernel operates on. Covers every channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipRegion {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl ClipRegion {
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Region covering all of `size`
    pub fn full(size: Size3) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    /// Extent of the region once channels are included
    pub fn size(&self, channels: usize) -> Size3 {
        Size3::new(self.width, self.height, channels)
    }

    pub fn is_full(&self, size: Size3) -> bool {
        *self == Self::full(size)
    }

    pub fn validate_within(&self, size: Size3) -> Result<()> {
        let end_x = self.x.checked_add(self.width);
        let end_y = self.y.checked_add(self.height);
        let fits = self.width > 0
            && self.height > 0
            && end_x.is_some_and(|end| end <= size.width)
            && end_y.is_some_and(|end| end <= size.height);
        if fits {
            Ok(())
        } else {
            Err(LossError::UnsupportedCombination {
                reason: format!(
                    "clip region ({}, {}) {}x{} does not fit inside source {}",
                    self.x, self.y, self.width, self.height, size
                ),
            })
        }
    }

    pub(crate) fn clip<'a>(&self, view: ArrayView3<'a, f32>) -> ArrayView3<'a, f32> {
        view.slice_move(s![self.y..self.y + self.height, self.x..self.x + self.width, ..])
    }

    pub(crate) fn clip_mut<'a>(&self, view: ArrayViewMut3<'a, f32>) -> ArrayViewMut3<'a, f32> {
        view.slice_move(s![self.y..self.y + self.height, self.x..self.x + self.width, ..])
    }
}
