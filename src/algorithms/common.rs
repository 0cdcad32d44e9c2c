use std::ops::Range;
use std::time::Instant;

use crate::algorithms::selector::Materialization;
use crate::device::BufferManager;

/// Per-work-group result of a detection kernel.
///
/// Partials of disjoint work-groups are combined in arbitrary order, so
/// `combine` must be associative and commutative.
pub trait Partial: Default + Send {
    fn combine(self, other: Self) -> Self;
}

/// Runs detection kernels where the tile's cells live.
///
/// Device-resident tiles are scanned by a kernel with one work item per
/// line; materialized tiles were already copied back, so the same kernel
/// body runs once over all lines on the host.
pub(crate) struct KernelRunner<'b, 'd> {
    buffers: &'b mut BufferManager<'d>,
    materialization: Materialization,
}

impl<'b, 'd> KernelRunner<'b, 'd> {
    pub(crate) fn new(
        buffers: &'b mut BufferManager<'d>,
        materialization: Materialization,
    ) -> Self {
        Self {
            buffers,
            materialization,
        }
    }

    pub(crate) fn run<P, F>(&mut self, items: usize, kernel: F) -> P
    where
        P: Partial,
        F: Fn(Range<usize>) -> P + Sync,
    {
        match self.materialization {
            Materialization::Device => {
                self.buffers
                    .launch_reduce(items, P::default, kernel, P::combine)
            }
            Materialization::Host => {
                let start = Instant::now();
                let partial = kernel(0..items);
                self.buffers.record_host_execute(start.elapsed());
                partial
            }
        }
    }
}
