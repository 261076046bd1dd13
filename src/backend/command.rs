// src/backend/command.rs
// Enqueue / commit / wait primitives every kernel encodes into

use crate::backend::device::Device;
use crate::error::{LossError, Result};
use log::{debug, trace};
use rayon::prelude::*;
use std::time::{Duration, Instant};

type Work<'a> = Box<dyn FnOnce() -> Result<()> + Send + 'a>;

struct WorkItem<'a> {
    label: String,
    work: Work<'a>,
}

/// Ordered queue of independent units of work.
///
/// Encoding a kernel only records its work here. Each work item keeps the
/// borrows it was encoded with (its predictions shared, its outputs
/// exclusive) until `commit` consumes the buffer. Reading an output tensor
/// before the matching `Completion` exists is therefore rejected at compile
/// time. Dropping a buffer without committing abandons its work.
pub struct CommandBuffer<'a> {
    device: Device,
    label: Option<String>,
    items: Vec<WorkItem<'a>>,
}

impl<'a> CommandBuffer<'a> {
    pub fn new(device: Device) -> Self {
        Self {
            device,
            label: None,
            items: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Queues one unit of work and returns its index in the eventual
    /// `Completion`.
    pub fn enqueue<F>(&mut self, label: impl Into<String>, work: F) -> usize
    where
        F: FnOnce() -> Result<()> + Send + 'a,
    {
        let label = label.into();
        trace!("enqueue #{} '{}'", self.items.len(), label);
        self.items.push(WorkItem {
            label,
            work: Box::new(work),
        });
        self.items.len() - 1
    }

    /// Executes every queued item and blocks until all have finished.
    ///
    /// Items are independent and may run concurrently in any order. A failing
    /// item does not stop the others.
    pub fn commit(self) -> Completion {
        let CommandBuffer {
            device,
            label,
            items,
        } = self;
        let count = items.len();
        debug!(
            "commit {} work item(s) on {}{}",
            count,
            device,
            label.as_deref().map(|l| format!(" ('{}')", l)).unwrap_or_default()
        );

        let start = Instant::now();
        let statuses: Vec<ItemStatus> = device.install(|| {
            items
                .into_par_iter()
                .map(|item| {
                    let result = (item.work)();
                    trace!("'{}' finished: {:?}", item.label, result);
                    ItemStatus {
                        label: item.label,
                        result,
                    }
                })
                .collect()
        });
        let elapsed = start.elapsed();

        let failed = statuses.iter().filter(|s| s.result.is_err()).count();
        debug!(
            "command buffer completed in {:?}: {} ok, {} failed",
            elapsed,
            count - failed,
            failed
        );
        Completion {
            label,
            statuses,
            elapsed,
        }
    }
}

/// Outcome of one work item
#[derive(Debug, Clone)]
pub struct ItemStatus {
    pub label: String,
    pub result: Result<()>,
}

/// Completed command buffer. Outputs its work wrote are host-readable once
/// this exists.
#[derive(Debug, Clone)]
pub struct Completion {
    label: Option<String>,
    statuses: Vec<ItemStatus>,
    elapsed: Duration,
}

impl Completion {
    /// Synchronization point: the first failure, if any item failed.
    pub fn wait_until_completed(&self) -> Result<()> {
        match self.statuses.iter().find_map(|s| s.result.as_ref().err()) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Outcome of the item `enqueue` returned `index` for
    pub fn status(&self, index: usize) -> Option<&ItemStatus> {
        self.statuses.get(index)
    }

    pub(crate) fn take_result(&self, index: usize) -> Result<()> {
        self.status(index)
            .map(|s| s.result.clone())
            .unwrap_or_else(|| {
                Err(LossError::Execution {
                    reason: format!("no work item #{} in this command buffer", index),
                })
            })
    }

    pub fn statuses(&self) -> &[ItemStatus] {
        &self.statuses
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}
