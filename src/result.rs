//! Results of a recurrence analysis.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::algorithms::runs::VerticalHistograms;
use crate::algorithms::selector::VariantFlags;
use crate::config::{ExecutionOptions, MinLineLengths};
use crate::core::histogram::LineLengthHistogram;
use crate::core::neighbourhood::NeighbourhoodCondition;
use crate::core::runtimes::{RuntimeAccumulator, Runtimes};
use crate::core::settings::Settings;
use crate::error::Result;

/// Statistics accumulated over the tiles of a run, before trimming.
///
/// Histograms hold every line length >= 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStatistics {
    pub diagonal: LineLengthHistogram,
    pub vertical: VerticalHistograms,
    /// Recurrent cells per column.
    pub recurrence_points: Vec<u64>,
    pub runtimes: RuntimeAccumulator,
    /// Tiles processed per variant name.
    pub variant_usage: BTreeMap<String, usize>,
    /// Only the upper triangle of the matrix was computed.
    pub symmetric: bool,
}

impl RunStatistics {
    pub fn new(n_columns: usize) -> Self {
        Self {
            recurrence_points: vec![0; n_columns],
            ..Self::default()
        }
    }

    pub fn record_tile(&mut self, flags: VariantFlags, runtimes: Runtimes) {
        self.runtimes.record(runtimes);
        *self.variant_usage.entry(flags.name()).or_insert(0) += 1;
    }

    /// Merge the statistics of another partition of the same matrix.
    pub fn merge(&mut self, other: &RunStatistics) {
        self.diagonal.merge(&other.diagonal);
        self.vertical.merge(&other.vertical);
        let points = &other.recurrence_points;
        if self.recurrence_points.len() < points.len() {
            self.recurrence_points.resize(points.len(), 0);
        }
        for (mine, theirs) in self.recurrence_points.iter_mut().zip(points) {
            *mine += theirs;
        }
        self.runtimes.merge(&other.runtimes);
        for (name, tiles) in &other.variant_usage {
            *self.variant_usage.entry(name.clone()).or_insert(0) += tiles;
        }
        self.symmetric = self.symmetric && other.symmetric;
    }
}

/// Final result of a recurrence analysis.
///
/// Histograms only contain lines of at least the lengths recorded in
/// `min_line_lengths`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RqaResult {
    pub diagonal_histogram: LineLengthHistogram,
    pub vertical_histogram: LineLengthHistogram,
    pub white_vertical_histogram: LineLengthHistogram,
    /// Recurrent cells per column vector.
    pub recurrence_points: Vec<u64>,
    pub min_line_lengths: MinLineLengths,
    pub number_of_vectors_x: usize,
    pub number_of_vectors_y: usize,
    pub embedding_dimension: usize,
    pub time_delay: usize,
    pub neighbourhood: NeighbourhoodCondition,
    pub theiler_corrector: usize,
    pub similarity_measure: String,
    /// Recurrence conditions combined into the matrix; above one for joint analysis.
    pub components: usize,
    /// Whether the run used the symmetry of the matrix.
    pub symmetric: bool,
    pub variant_usage: BTreeMap<String, usize>,
    pub total_runtimes: RuntimeAccumulator,
}

impl RqaResult {
    pub(crate) fn from_statistics(
        stats: RunStatistics,
        settings: &Settings,
        options: &ExecutionOptions,
        similarity_measure: &str,
    ) -> Self {
        let min = options.min_line_lengths;
        Self {
            diagonal_histogram: stats.diagonal.trimmed(min.diagonal),
            vertical_histogram: stats.vertical.vertical.trimmed(min.vertical),
            white_vertical_histogram: stats.vertical.white_vertical.trimmed(min.white_vertical),
            recurrence_points: stats.recurrence_points,
            min_line_lengths: min,
            number_of_vectors_x: settings.number_of_vectors_x(),
            number_of_vectors_y: settings.number_of_vectors_y(),
            embedding_dimension: settings.embedding_dimension(),
            time_delay: settings.x().time_delay(),
            neighbourhood: settings.neighbourhood(),
            theiler_corrector: settings.theiler_corrector(),
            similarity_measure: similarity_measure.to_string(),
            components: settings.components().len(),
            symmetric: stats.symmetric,
            variant_usage: stats.variant_usage,
            total_runtimes: stats.runtimes,
        }
    }

    pub fn total_recurrence_points(&self) -> u64 {
        self.recurrence_points.iter().sum()
    }

    pub fn number_of_diagonal_lines(&self) -> u64 {
        self.diagonal_histogram
            .number_of_lines(self.min_line_lengths.diagonal)
    }

    pub fn number_of_vertical_lines(&self) -> u64 {
        self.vertical_histogram
            .number_of_lines(self.min_line_lengths.vertical)
    }

    pub fn number_of_white_vertical_lines(&self) -> u64 {
        self.white_vertical_histogram
            .number_of_lines(self.min_line_lengths.white_vertical)
    }

    pub fn longest_diagonal_line(&self) -> usize {
        self.diagonal_histogram.longest()
    }

    pub fn longest_vertical_line(&self) -> usize {
        self.vertical_histogram.longest()
    }

    pub fn tiles_processed(&self) -> usize {
        self.total_runtimes.tiles()
    }

    /// Histograms and point counts match; metadata and runtimes are ignored.
    pub fn same_statistics(&self, other: &RqaResult) -> bool {
        self.diagonal_histogram == other.diagonal_histogram
            && self.vertical_histogram == other.vertical_histogram
            && self.white_vertical_histogram == other.white_vertical_histogram
            && self.recurrence_points == other.recurrence_points
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Full recurrence matrix held on the host, one byte per cell.
///
/// Cell `(x, y)` is stored at `y * dim_x + x`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrencePlot {
    dim_x: usize,
    dim_y: usize,
    cells: Vec<u8>,
}

impl RecurrencePlot {
    pub fn new(dim_x: usize, dim_y: usize) -> Self {
        Self {
            dim_x,
            dim_y,
            cells: vec![0; dim_x * dim_y],
        }
    }

    pub fn dim_x(&self) -> usize {
        self.dim_x
    }

    pub fn dim_y(&self) -> usize {
        self.dim_y
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.cells[y * self.dim_x + x] != 0
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, recurrent: bool) {
        self.cells[y * self.dim_x + x] = recurrent as u8;
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn count_recurrent(&self) -> usize {
        self.cells.iter().filter(|&&c| c != 0).count()
    }
}
