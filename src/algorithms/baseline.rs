//! Brute-force reference implementation.
//!
//! Computes the complete recurrence matrix on the host and scans every
//! column and every diagonal of it directly, without tiles, carries or
//! symmetry shortcuts. Memory grows with N x M, so this is only meant for
//! validating the tiled engine on small inputs.

use std::time::Instant;

use crate::algorithms::runs::{LineState, RunState};
use crate::config::{EdgeRunPolicy, ExecutionOptions};
use crate::core::runtimes::Runtimes;
use crate::core::settings::Settings;
use crate::core::similarity_measure::SimilarityMeasure;
use crate::result::{RecurrencePlot, RunStatistics};

/// Full recurrence matrix of `settings`.
///
/// For joint settings a cell is set only when every component marks it.
pub fn recurrence_matrix<M: SimilarityMeasure>(settings: &Settings) -> RecurrencePlot {
    let n = settings.number_of_vectors_x();
    let m = settings.number_of_vectors_y();
    let mut plot = RecurrencePlot::new(n, m);
    for (index, component) in settings.components().iter().enumerate() {
        let dim = component.embedding_dimension();
        let condition = component.neighbourhood();
        let xs = component.x().embedded_slice(0, n);
        let ys = component.y().embedded_slice(0, m);
        for y in 0..m {
            let b = &ys[y * dim..(y + 1) * dim];
            for x in 0..n {
                if index > 0 && !plot.get(x, y) {
                    continue;
                }
                let a = &xs[x * dim..(x + 1) * dim];
                plot.set(x, y, condition.contains(M::distance(a, b)));
            }
        }
    }
    plot
}

/// Line statistics of the full matrix.
pub fn baseline<M: SimilarityMeasure>(
    settings: &Settings,
    options: &ExecutionOptions,
) -> RunStatistics {
    let start = Instant::now();
    let plot = recurrence_matrix::<M>(settings);
    let (n, m) = (plot.dim_x(), plot.dim_y());
    let mut stats = RunStatistics::new(n);

    for x in 0..n {
        let mut line = LineState::default();
        for y in 0..m {
            let cell = plot.get(x, y);
            stats.recurrence_points[x] += cell as u64;
            line.advance(cell, &mut stats.vertical);
        }
        if options.vertical_edge_runs == EdgeRunPolicy::Emit {
            line.close_into(&mut stats.vertical);
        }
    }

    let theiler = settings.theiler_corrector();
    for d in -(m as isize - 1)..n as isize {
        if d.unsigned_abs() < theiler {
            continue;
        }
        let (mut x, mut y) = if d >= 0 {
            (d as usize, 0)
        } else {
            (0, d.unsigned_abs())
        };
        let mut run = RunState::NoRun;
        while x < n && y < m {
            if let Some(len) = run.advance(plot.get(x, y)) {
                stats.diagonal.add(len);
            }
            x += 1;
            y += 1;
        }
        if let Some(len) = run.close() {
            stats.diagonal.add(len);
        }
    }

    stats.runtimes.record(Runtimes {
        execute: start.elapsed(),
        ..Runtimes::default()
    });
    stats
}
