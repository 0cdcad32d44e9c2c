use std::ops::Range;
use std::time::{Duration, Instant};

/// In-order command queue of the host device.
///
/// Every command completes before `enqueue_*` returns and reports its own
/// elapsed time, the equivalent of a profiling event on a real device.
#[derive(Debug)]
pub struct CommandQueue {
    work_group_size: usize,
    submitted: u64,
}

impl CommandQueue {
    pub(crate) fn new(work_group_size: usize) -> Self {
        Self {
            work_group_size: work_group_size.max(1),
            submitted: 0,
        }
    }

    pub fn work_group_size(&self) -> usize {
        self.work_group_size
    }

    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Copy between host and device memory.
    pub(crate) fn enqueue_copy<T: Copy>(&mut self, dst: &mut [T], src: &[T]) -> Duration {
        self.submitted += 1;
        let start = Instant::now();
        dst.copy_from_slice(src);
        start.elapsed()
    }

    /// Launch a kernel with one work item per output element.
    ///
    /// Work item `gid` receives its global id and exclusive access to
    /// `out[gid]`.
    pub(crate) fn enqueue_fill<T, F>(&mut self, out: &mut [T], kernel: &F) -> Duration
    where
        T: Send,
        F: Fn(usize, &mut T) + Sync,
    {
        self.submitted += 1;
        let wg = self.work_group_size;
        let start = Instant::now();

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            out.par_chunks_mut(wg)
                .enumerate()
                .for_each(|(group, items)| run_group(group * wg, items, kernel));
        }
        #[cfg(not(feature = "parallel"))]
        for (group, items) in out.chunks_mut(wg).enumerate() {
            run_group(group * wg, items, kernel);
        }

        start.elapsed()
    }

    /// Launch a kernel over `global_size` work items and reduce the
    /// per-work-group partials.
    ///
    /// `kernel` receives the global id range of one work-group.
    pub(crate) fn enqueue_reduce<R, I, F, C>(
        &mut self,
        global_size: usize,
        identity: I,
        kernel: F,
        combine: C,
    ) -> (R, Duration)
    where
        R: Send,
        I: Fn() -> R + Sync + Send,
        F: Fn(Range<usize>) -> R + Sync,
        C: Fn(R, R) -> R + Sync + Send,
    {
        self.submitted += 1;
        let wg = self.work_group_size;
        let n_groups = global_size.div_ceil(wg);
        let group_range = move |g: usize| g * wg..((g + 1) * wg).min(global_size);
        let start = Instant::now();

        #[cfg(feature = "parallel")]
        let result = {
            use rayon::prelude::*;
            (0..n_groups)
                .into_par_iter()
                .map(|g| kernel(group_range(g)))
                .reduce(&identity, &combine)
        };
        #[cfg(not(feature = "parallel"))]
        let result = (0..n_groups)
            .map(|g| kernel(group_range(g)))
            .fold(identity(), &combine);

        (result, start.elapsed())
    }

    /// Block until every enqueued command has completed.
    pub fn finish(&mut self) {}
}

#[inline(always)]
fn run_group<T, F>(base: usize, items: &mut [T], kernel: &F)
where
    F: Fn(usize, &mut T),
{
    for (local, item) in items.iter_mut().enumerate() {
        kernel(base + local, item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_passes_global_ids() {
        let mut q = CommandQueue::new(3);
        let mut out = vec![0usize; 10];
        q.enqueue_fill(&mut out, &|gid, v: &mut usize| *v = gid * 2);
        assert_eq!(out, (0..10).map(|i| i * 2).collect::<Vec<_>>());
        assert_eq!(q.submitted(), 1);
    }

    #[test]
    fn test_reduce_covers_every_item_once() {
        let mut q = CommandQueue::new(4);
        let (sum, _) = q.enqueue_reduce(
            11,
            || 0usize,
            |range| range.sum::<usize>(),
            |a, b| a + b,
        );
        assert_eq!(sum, (0..11).sum::<usize>());
    }

    #[test]
    fn test_reduce_with_empty_grid() {
        let mut q = CommandQueue::new(4);
        let (count, _) = q.enqueue_reduce(0, || 0usize, |r| r.len(), |a, b| a + b);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_copy() {
        let mut q = CommandQueue::new(1);
        let mut dst = [0u8; 4];
        q.enqueue_copy(&mut dst, &[1, 2, 3, 4]);
        assert_eq!(dst, [1, 2, 3, 4]);
    }
}
