use std::mem::size_of;
use std::ops::Range;

use crate::core::runtimes::Runtimes;
use crate::device::queue::CommandQueue;
use crate::device::{DeviceDescriptor, MemoryLedger};
use crate::error::{Result, RqaError};

/// Plain values that may live in device memory.
pub trait DeviceCopy: Copy + Default + Send + Sync + 'static {}

impl DeviceCopy for u8 {}
impl DeviceCopy for f32 {}

/// A buffer in device memory.
///
/// The bytes it occupies are charged to the device's ledger on allocation
/// and returned when the buffer drops.
#[derive(Debug)]
pub struct DeviceBuffer<'d, T: DeviceCopy> {
    data: Vec<T>,
    ledger: &'d MemoryLedger,
    bytes: usize,
}

impl<'d, T: DeviceCopy> DeviceBuffer<'d, T> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes
    }

    /// Contents as seen by a kernel running on the device.
    pub(crate) fn device_slice(&self) -> &[T] {
        &self.data
    }
}

impl<T: DeviceCopy> Drop for DeviceBuffer<'_, T> {
    fn drop(&mut self) {
        self.ledger.release(self.bytes);
    }
}

/// Buffer lifecycle and command submission for the tiles of one device.
///
/// Each transfer or launch is timed into the matching [`Runtimes`] phase.
#[derive(Debug)]
pub struct BufferManager<'d> {
    descriptor: &'d DeviceDescriptor,
    ledger: &'d MemoryLedger,
    queue: &'d mut CommandQueue,
    runtimes: Runtimes,
}

impl<'d> BufferManager<'d> {
    pub(crate) fn new(
        descriptor: &'d DeviceDescriptor,
        ledger: &'d MemoryLedger,
        queue: &'d mut CommandQueue,
    ) -> Self {
        Self {
            descriptor,
            ledger,
            queue,
            runtimes: Runtimes::default(),
        }
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        self.descriptor
    }

    pub fn work_group_size(&self) -> usize {
        self.queue.work_group_size()
    }

    /// Allocate a zeroed buffer of `len` elements.
    pub fn allocate<T: DeviceCopy>(&self, len: usize) -> Result<DeviceBuffer<'d, T>> {
        let bytes = len.saturating_mul(size_of::<T>());
        if bytes > self.descriptor.max_alloc_bytes {
            return Err(RqaError::Allocation {
                requested: bytes,
                available: self.descriptor.max_alloc_bytes,
            });
        }
        self.ledger.reserve(bytes)?;
        Ok(DeviceBuffer {
            data: vec![T::default(); len],
            ledger: self.ledger,
            bytes,
        })
    }

    /// Allocate a buffer and fill it from host memory.
    pub fn allocate_from<T: DeviceCopy>(&mut self, host: &[T]) -> Result<DeviceBuffer<'d, T>> {
        let mut buffer = self.allocate(host.len())?;
        self.upload(&mut buffer, host)?;
        Ok(buffer)
    }

    pub fn upload<T: DeviceCopy>(
        &mut self,
        buffer: &mut DeviceBuffer<'d, T>,
        host: &[T],
    ) -> Result<()> {
        if buffer.len() != host.len() {
            return Err(RqaError::DimensionMismatch {
                expected: buffer.len(),
                actual: host.len(),
            });
        }
        self.runtimes.transfer_to_device += self.queue.enqueue_copy(&mut buffer.data, host);
        Ok(())
    }

    /// Run `kernel` once per element of `out`.
    pub fn launch_fill<T, F>(&mut self, out: &mut DeviceBuffer<'d, T>, kernel: F)
    where
        T: DeviceCopy,
        F: Fn(usize, &mut T) + Sync,
    {
        self.runtimes.execute += self.queue.enqueue_fill(&mut out.data, &kernel);
    }

    /// Run `kernel` once per work-group over `global_size` work items and
    /// reduce the partials on the device.
    pub fn launch_reduce<R, I, F, C>(
        &mut self,
        global_size: usize,
        identity: I,
        kernel: F,
        combine: C,
    ) -> R
    where
        R: Send,
        I: Fn() -> R + Sync + Send,
        F: Fn(Range<usize>) -> R + Sync,
        C: Fn(R, R) -> R + Sync + Send,
    {
        let (result, elapsed) = self
            .queue
            .enqueue_reduce(global_size, identity, kernel, combine);
        self.runtimes.execute += elapsed;
        result
    }

    /// Copy a buffer back to host memory.
    pub fn download<T: DeviceCopy>(&mut self, buffer: &DeviceBuffer<'d, T>) -> Vec<T> {
        let mut host = vec![T::default(); buffer.len()];
        self.runtimes.transfer_from_device += self.queue.enqueue_copy(&mut host, &buffer.data);
        host
    }

    /// Charge work done on the host over downloaded data to the execute phase.
    pub(crate) fn record_host_execute(&mut self, elapsed: std::time::Duration) {
        self.runtimes.execute += elapsed;
    }

    pub fn finish(&mut self) {
        self.queue.finish();
    }

    /// Phase timings of every command submitted through this manager.
    pub fn runtimes(&self) -> Runtimes {
        self.runtimes
    }
}
