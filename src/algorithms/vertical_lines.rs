use crate::algorithms::common::{KernelRunner, Partial};
use crate::algorithms::runs::{LineState, VerticalHistograms};
use crate::algorithms::selector::OverlapPolicy;
use crate::config::EdgeRunPolicy;
use crate::core::sub_matrix::{CellView, SubMatrix};

/// Open vertical runs carried between tiles.
///
/// `columns[x]` holds the state at the bottom of the last tile visited in
/// column `x`. For symmetric matrices the lower half of column `k` is read
/// from row `k` right of the diagonal, and `rows[k]` holds that part.
#[derive(Debug, Clone)]
pub struct VerticalCarry {
    columns: Vec<LineState>,
    rows: Vec<LineState>,
}

impl VerticalCarry {
    pub fn new(n_columns: usize, symmetric: bool) -> Self {
        Self {
            columns: vec![LineState::default(); n_columns],
            rows: if symmetric {
                vec![LineState::default(); n_columns]
            } else {
                Vec::new()
            },
        }
    }

    /// No run is waiting for a later tile.
    pub fn is_settled(&self) -> bool {
        self.columns
            .iter()
            .chain(&self.rows)
            .all(|s| *s == LineState::default())
    }
}

#[derive(Debug, Default)]
struct VerticalPartial {
    histograms: VerticalHistograms,
    points: Vec<(usize, u64)>,
    columns: Vec<(usize, LineState)>,
    rows: Vec<(usize, LineState)>,
}

impl Partial for VerticalPartial {
    fn combine(mut self, mut other: Self) -> Self {
        self.histograms.merge(&other.histograms);
        self.points.append(&mut other.points);
        self.columns.append(&mut other.columns);
        self.rows.append(&mut other.rows);
        self
    }
}

/// Scans the columns of a tile for vertical and white vertical lines.
///
/// Every column of the full matrix is one line, scanned top to bottom. For
/// symmetric matrices only cells on or above the main diagonal are
/// available, so column `k` is followed down to `(k, k)` and then along row
/// `k` to the right border.
#[derive(Debug, Clone, Copy)]
pub struct DetectVerticalLinesOperator {
    n: usize,
    m: usize,
    symmetric: bool,
    overlap: OverlapPolicy,
    edge_runs: EdgeRunPolicy,
}

impl DetectVerticalLinesOperator {
    pub fn new(
        n: usize,
        m: usize,
        symmetric: bool,
        overlap: OverlapPolicy,
        edge_runs: EdgeRunPolicy,
    ) -> Self {
        Self {
            n,
            m,
            symmetric,
            overlap,
            edge_runs,
        }
    }

    /// Scan one tile, merging closed lines into `out` and recurrent cells
    /// into `points` (indexed by global column).
    pub(crate) fn detect(
        &self,
        runner: &mut KernelRunner<'_, '_>,
        view: &CellView<'_>,
        tile: &SubMatrix,
        carry: &mut VerticalCarry,
        out: &mut VerticalHistograms,
        points: &mut [u64],
    ) {
        let partial = {
            let carried = &carry.columns;
            runner.run(tile.dim_x, |items| {
                let mut part = VerticalPartial::default();
                for lx in items {
                    if self.symmetric {
                        self.scan_upper_column(view, tile, lx, carried, &mut part);
                    } else {
                        self.scan_column(view, tile, lx, carried, &mut part);
                    }
                }
                part
            })
        };
        self.apply(partial, carry, out, points);

        if self.symmetric {
            let partial = {
                let carried = &carry.rows;
                runner.run(tile.dim_y, |items| {
                    let mut part = VerticalPartial::default();
                    for ly in items {
                        self.scan_row(view, tile, ly, carried, &mut part);
                    }
                    part
                })
            };
            self.apply(partial, carry, out, points);
        }
    }

    fn apply(
        &self,
        partial: VerticalPartial,
        carry: &mut VerticalCarry,
        out: &mut VerticalHistograms,
        points: &mut [u64],
    ) {
        out.merge(&partial.histograms);
        for (x, count) in partial.points {
            points[x] += count;
        }
        for (x, state) in partial.columns {
            carry.columns[x] = state;
        }
        for (k, state) in partial.rows {
            carry.rows[k] = state;
        }
    }

    fn entry_state(&self, carried: &[LineState], index: usize) -> LineState {
        match self.overlap {
            OverlapPolicy::Recycle => carried[index],
            OverlapPolicy::None => LineState::default(),
        }
    }

    /// The line reached the matrix border.
    fn end_line(&self, mut state: LineState, part: &mut VerticalPartial) -> LineState {
        match self.edge_runs {
            EdgeRunPolicy::Emit => state.close_into(&mut part.histograms),
            EdgeRunPolicy::Discard => state.discard(),
        }
        state
    }

    /// The line continues in a later tile.
    fn leave_tile(&self, mut state: LineState, part: &mut VerticalPartial) -> LineState {
        if self.overlap == OverlapPolicy::None {
            state.close_into(&mut part.histograms);
        }
        state
    }

    fn scan_column(
        &self,
        view: &CellView<'_>,
        tile: &SubMatrix,
        lx: usize,
        carried: &[LineState],
        part: &mut VerticalPartial,
    ) {
        let x = tile.start_x + lx;
        let mut state = self.entry_state(carried, x);
        let mut recurrent = 0u64;
        for ly in 0..tile.dim_y {
            let cell = view.get(lx, ly);
            recurrent += cell as u64;
            state.advance(cell, &mut part.histograms);
        }
        part.points.push((x, recurrent));

        let state = if tile.end_y() == self.m {
            self.end_line(state, part)
        } else {
            self.leave_tile(state, part)
        };
        part.columns.push((x, state));
    }

    fn scan_upper_column(
        &self,
        view: &CellView<'_>,
        tile: &SubMatrix,
        lx: usize,
        carried: &[LineState],
        part: &mut VerticalPartial,
    ) {
        let x = tile.start_x + lx;
        if x < tile.start_y {
            return;
        }
        let last_y = x.min(tile.end_y() - 1);
        let mut state = self.entry_state(carried, x);
        let mut recurrent = 0u64;
        for ly in 0..=last_y - tile.start_y {
            let cell = view.get(lx, ly);
            recurrent += cell as u64;
            state.advance(cell, &mut part.histograms);
        }
        part.points.push((x, recurrent));

        if x < tile.end_y() {
            // (x, x) reached: the line turns into row x
            let state = if x + 1 == self.n {
                self.end_line(state, part)
            } else {
                state
            };
            part.rows.push((x, state));
            part.columns.push((x, LineState::default()));
        } else {
            let state = self.leave_tile(state, part);
            part.columns.push((x, state));
        }
    }

    fn scan_row(
        &self,
        view: &CellView<'_>,
        tile: &SubMatrix,
        ly: usize,
        carried: &[LineState],
        part: &mut VerticalPartial,
    ) {
        let k = tile.start_y + ly;
        let turns_here = (tile.start_x..tile.end_x()).contains(&k);
        let first_x = tile.start_x.max(k + 1);
        if first_x >= tile.end_x() && !turns_here {
            return;
        }

        let mut state = if turns_here {
            carried[k]
        } else {
            self.entry_state(carried, k)
        };
        let mut recurrent = 0u64;
        for x in first_x..tile.end_x() {
            let cell = view.get(x - tile.start_x, ly);
            recurrent += cell as u64;
            state.advance(cell, &mut part.histograms);
        }
        part.points.push((k, recurrent));

        let state = if tile.end_x() == self.n {
            self.end_line(state, part)
        } else {
            self.leave_tile(state, part)
        };
        part.rows.push((k, state));
    }
}
