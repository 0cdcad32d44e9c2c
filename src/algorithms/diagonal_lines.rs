use crate::algorithms::common::{KernelRunner, Partial};
use crate::algorithms::runs::RunState;
use crate::algorithms::selector::OverlapPolicy;
use crate::core::histogram::LineLengthHistogram;
use crate::core::sub_matrix::{CellView, SubMatrix};

/// Open diagonal runs carried between tiles, one per diagonal offset
/// `d = x - y`.
#[derive(Debug, Clone)]
pub struct DiagonalCarry {
    runs: Vec<RunState>,
    offset: usize,
}

impl DiagonalCarry {
    pub fn new(n: usize, m: usize) -> Self {
        Self {
            runs: vec![RunState::NoRun; (n + m).saturating_sub(1)],
            offset: m.saturating_sub(1),
        }
    }

    #[inline]
    fn slot(&self, d: isize) -> usize {
        (d + self.offset as isize) as usize
    }

    pub fn is_settled(&self) -> bool {
        self.runs.iter().all(|r| !r.is_open())
    }
}

#[derive(Debug, Default)]
struct DiagonalPartial {
    histogram: LineLengthHistogram,
    runs: Vec<(usize, RunState)>,
}

impl Partial for DiagonalPartial {
    fn combine(mut self, mut other: Self) -> Self {
        self.histogram.merge(&other.histogram);
        self.runs.append(&mut other.runs);
        self
    }
}

/// Scans the diagonals of a tile for diagonal lines.
///
/// Diagonals with `|x - y| < theiler_corrector` are skipped. For symmetric
/// matrices only diagonals with `x >= y` are scanned and lines off the main
/// diagonal are counted twice, once for their mirror image. Lines that
/// reach the matrix border are always counted.
#[derive(Debug, Clone, Copy)]
pub struct DetectDiagonalLinesOperator {
    n: usize,
    m: usize,
    theiler_corrector: usize,
    symmetric: bool,
    overlap: OverlapPolicy,
}

impl DetectDiagonalLinesOperator {
    pub fn new(
        n: usize,
        m: usize,
        theiler_corrector: usize,
        symmetric: bool,
        overlap: OverlapPolicy,
    ) -> Self {
        Self {
            n,
            m,
            theiler_corrector,
            symmetric,
            overlap,
        }
    }

    pub(crate) fn detect(
        &self,
        runner: &mut KernelRunner<'_, '_>,
        view: &CellView<'_>,
        tile: &SubMatrix,
        carry: &mut DiagonalCarry,
        out: &mut LineLengthHistogram,
    ) {
        let diagonals = tile.dim_x + tile.dim_y - 1;
        let partial = {
            let carried = &*carry;
            runner.run(diagonals, |items| {
                let mut part = DiagonalPartial::default();
                for k in items {
                    self.scan_diagonal(view, tile, k, carried, &mut part);
                }
                part
            })
        };

        out.merge(&partial.histogram);
        for (slot, state) in partial.runs {
            carry.runs[slot] = state;
        }
    }

    fn scan_diagonal(
        &self,
        view: &CellView<'_>,
        tile: &SubMatrix,
        k: usize,
        carried: &DiagonalCarry,
        part: &mut DiagonalPartial,
    ) {
        let local = k as isize - (tile.dim_y as isize - 1);
        let d = tile.start_x as isize - tile.start_y as isize + local;
        if self.symmetric && d < 0 {
            return;
        }
        if d.unsigned_abs() < self.theiler_corrector {
            return;
        }

        let (lx, ly) = if local >= 0 {
            (local as usize, 0)
        } else {
            (0, local.unsigned_abs())
        };
        let len = (tile.dim_x - lx).min(tile.dim_y - ly);
        let multiplicity = if self.symmetric && d > 0 { 2 } else { 1 };
        let slot = carried.slot(d);

        let mut state = match self.overlap {
            OverlapPolicy::Recycle => carried.runs[slot],
            OverlapPolicy::None => RunState::NoRun,
        };
        for i in 0..len {
            if let Some(n) = state.advance(view.get(lx + i, ly + i)) {
                part.histogram.add_count(n, multiplicity);
            }
        }

        let last_x = tile.start_x + lx + len - 1;
        let last_y = tile.start_y + ly + len - 1;
        let continues = last_x + 1 < self.n && last_y + 1 < self.m;
        if !continues || self.overlap == OverlapPolicy::None {
            if let Some(n) = state.close() {
                part.histogram.add_count(n, multiplicity);
            }
        }
        part.runs.push((slot, state));
    }
}
