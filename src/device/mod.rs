//! Compute device abstraction.
//!
//! A [`Device`] owns one command queue and a memory ledger that accounts
//! for every live buffer. Buffers are acquired per tile through a
//! [`BufferManager`] and released when they drop, so an aborted tile never
//! leaks device memory.
//!
//! The shipped backend executes kernels on the host: work items are grouped
//! into work-groups of at most `max_work_group_size` and, with the
//! `parallel` feature, work-groups run on the rayon pool. Device discovery
//! for other backends is left to callers, which only need to describe the
//! device through a [`DeviceDescriptor`].
//!
//! ```
//! use rqa_rs::{Device, DeviceDescriptor};
//!
//! let device = Device::new(DeviceDescriptor::new("test", 1 << 20, 64));
//! assert_eq!(device.descriptor().max_alloc_bytes, 1 << 20);
//! assert_eq!(device.in_use_bytes(), 0);
//! ```

pub mod buffer;
pub mod queue;

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RqaError};

pub use buffer::{BufferManager, DeviceBuffer, DeviceCopy};
pub use queue::CommandQueue;

/// Capabilities of a compute device, queried once at setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Human-readable device name.
    pub name: String,
    /// Largest single buffer the device accepts.
    pub max_alloc_bytes: usize,
    /// Largest work-group the device schedules.
    pub max_work_group_size: usize,
    /// Total memory available to all live buffers.
    pub global_mem_bytes: usize,
}

impl DeviceDescriptor {
    /// Descriptor with global memory set to four single allocations, the
    /// usual ratio reported by OpenCL drivers.
    pub fn new(
        name: impl Into<String>,
        max_alloc_bytes: usize,
        max_work_group_size: usize,
    ) -> Self {
        Self {
            name: name.into(),
            max_alloc_bytes,
            max_work_group_size: max_work_group_size.max(1),
            global_mem_bytes: max_alloc_bytes.saturating_mul(4),
        }
    }

    pub fn with_global_mem_bytes(mut self, bytes: usize) -> Self {
        self.global_mem_bytes = bytes;
        self
    }

    /// Default host device: 256 MiB allocations, work-groups of 256.
    pub fn host() -> Self {
        Self::new("host", 256 * 1024 * 1024, 256)
    }
}

/// Tracks bytes held by live buffers against the device's global memory.
#[derive(Debug)]
pub struct MemoryLedger {
    capacity: usize,
    in_use: AtomicUsize,
    peak: AtomicUsize,
}

impl MemoryLedger {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            in_use: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub(crate) fn reserve(&self, bytes: usize) -> Result<()> {
        let reserved = self
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes)
                    .filter(|&total| total <= self.capacity)
            });
        match reserved {
            Ok(previous) => {
                self.peak.fetch_max(previous + bytes, Ordering::AcqRel);
                Ok(())
            }
            Err(used) => Err(RqaError::Allocation {
                requested: bytes,
                available: self.capacity.saturating_sub(used),
            }),
        }
    }

    pub(crate) fn release(&self, bytes: usize) {
        self.in_use.fetch_sub(bytes, Ordering::AcqRel);
    }

    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }
}

/// One compute device: its capabilities, memory ledger and command queue.
///
/// The queue is only reachable through `&mut Device`, so a single device is
/// always driven by one host thread at a time.
#[derive(Debug)]
pub struct Device {
    descriptor: DeviceDescriptor,
    ledger: MemoryLedger,
    queue: CommandQueue,
}

impl Device {
    pub fn new(descriptor: DeviceDescriptor) -> Self {
        let ledger = MemoryLedger::new(descriptor.global_mem_bytes);
        let queue = CommandQueue::new(descriptor.max_work_group_size);
        Self {
            descriptor,
            ledger,
            queue,
        }
    }

    pub fn host() -> Self {
        Self::new(DeviceDescriptor::host())
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Bytes currently held by live buffers.
    pub fn in_use_bytes(&self) -> usize {
        self.ledger.in_use()
    }

    /// High-water mark of [`Device::in_use_bytes`].
    pub fn peak_bytes(&self) -> usize {
        self.ledger.peak()
    }

    /// Commands submitted to the queue since creation.
    pub fn submitted_commands(&self) -> u64 {
        self.queue.submitted()
    }

    /// Open a scoped buffer manager for one tile.
    pub fn buffers(&mut self) -> BufferManager<'_> {
        BufferManager::new(&self.descriptor, &self.ledger, &mut self.queue)
    }
}
