// src/backend/device.rs

use crate::backend::command::CommandBuffer;
use crate::error::{LossError, Result};
use crate::tensor::{Size3, Tensor};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;

/// Where loss work executes and where its tensors are allocated.
#[derive(Debug, Clone, Default)]
pub enum Device {
    /// CPU, sharing rayon's global pool
    #[default]
    CPU,
    /// CPU with a dedicated pool, for callers that need to bound the threads
    /// a training step may occupy
    CPUPool(Arc<ThreadPool>),
}

impl Device {
    /// CPU device with its own pool of `threads` workers
    pub fn with_threads(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(LossError::config("threads", "must be at least 1"));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("ferrox-loss-{}", i))
            .build()
            .map_err(|e| LossError::Execution {
                reason: format!("failed to build a {}-thread pool: {}", threads, e),
            })?;
        Ok(Device::CPUPool(Arc::new(pool)))
    }

    // Check if device shares the global pool
    pub fn is_shared(&self) -> bool {
        matches!(self, Device::CPU)
    }

    /// Worker count available to work submitted on this device
    pub fn num_threads(&self) -> usize {
        match self {
            Device::CPU => rayon::current_num_threads(),
            Device::CPUPool(pool) => pool.current_num_threads(),
        }
    }

    pub fn zeros(&self, size: Size3) -> Tensor {
        Tensor::zeros(size)
    }

    pub fn ones(&self, size: Size3) -> Tensor {
        Tensor::full(size, 1.0)
    }

    pub fn full(&self, size: Size3, value: f32) -> Tensor {
        Tensor::full(size, value)
    }

    /// Starts an empty command buffer whose work will run on this device.
    pub fn new_command_buffer<'a>(&self) -> CommandBuffer<'a> {
        CommandBuffer::new(self.clone())
    }

    /// Runs `op` inside this device's pool.
    pub(crate) fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        match self {
            Device::CPU => op(),
            Device::CPUPool(pool) => pool.install(op),
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::CPU => write!(f, "CPU"),
            Device::CPUPool(pool) => write!(f, "CPU[{} threads]", pool.current_num_threads()),
        }
    }
}

pub fn cpu() -> Device {
    Device::CPU
}

pub fn default_device() -> Device {
    Device::CPU
}
