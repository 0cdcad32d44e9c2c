//! Analysis configuration.
//!
//! [`AnalysisConfig`] is the serializable surface callers fill in (from a
//! file, CLI flags or code). It is validated once and split into the
//! immutable [`Settings`] of the analysed series and the
//! [`ExecutionOptions`] that steer the tile loop.

use serde::{Deserialize, Serialize};

use crate::algorithms::selector::{Materialization, OverlapPolicy, SelectorKind, VariantFlags};
use crate::core::neighbourhood::NeighbourhoodCondition;
use crate::core::settings::Settings;
use crate::core::sub_matrix::{CellRepresentation, MatrixLayout};
use crate::core::time_series::{EmbeddingParams, TimeSeriesView};
use crate::error::{Result, RqaError};

/// Minimum lengths of the lines reported in a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinLineLengths {
    pub diagonal: usize,
    pub vertical: usize,
    pub white_vertical: usize,
}

impl MinLineLengths {
    pub fn new(diagonal: usize, vertical: usize, white_vertical: usize) -> Self {
        Self {
            diagonal,
            vertical,
            white_vertical,
        }
    }

    /// Report every line, including single cells.
    pub fn all() -> Self {
        Self::new(1, 1, 1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.diagonal == 0 || self.vertical == 0 || self.white_vertical == 0 {
            return Err(RqaError::InvalidConfig(format!(
                "minimum line lengths must be >= 1, got {self:?}"
            )));
        }
        Ok(())
    }
}

impl Default for MinLineLengths {
    fn default() -> Self {
        Self::new(2, 2, 2)
    }
}

/// What happens to vertical runs still open at the bottom of the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeRunPolicy {
    /// Their true length is unknown; they are not counted.
    #[default]
    Discard,
    /// They are counted as if closed by the border.
    Emit,
}

/// Options of the tile loop that do not change the analysed matrix.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    pub variant: VariantFlags,
    pub selector: SelectorKind,
    pub min_line_lengths: MinLineLengths,
    pub vertical_edge_runs: EdgeRunPolicy,
}

impl ExecutionOptions {
    pub fn with_variant(mut self, variant: VariantFlags) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_selector(mut self, selector: SelectorKind) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_min_line_lengths(mut self, min_line_lengths: MinLineLengths) -> Self {
        self.min_line_lengths = min_line_lengths;
        self
    }

    pub fn with_vertical_edge_runs(mut self, policy: EdgeRunPolicy) -> Self {
        self.vertical_edge_runs = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.selector.validate()?;
        self.min_line_lengths.validate()
    }
}

/// Complete configuration of one analysis.
///
/// ```
/// use rqa_rs::AnalysisConfig;
///
/// let config: AnalysisConfig = serde_json::from_str(
///     r#"{"embedding": {"dimension": 2, "delay": 3},
///         "neighbourhood": {"fixed_radius": 0.25},
///         "cell_representation": "bit"}"#,
/// )
/// .unwrap();
/// config.validate().unwrap();
/// assert_eq!(config.embedding.delay, 3);
/// assert!(!config.materialize_tiles);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub embedding: EmbeddingParams,
    pub neighbourhood: NeighbourhoodCondition,
    pub theiler_corrector: usize,
    pub cell_representation: CellRepresentation,
    pub overlap_policy: OverlapPolicy,
    pub materialize_tiles: bool,
    pub layout: MatrixLayout,
    pub min_line_lengths: MinLineLengths,
    pub vertical_edge_runs: EdgeRunPolicy,
    pub selector: SelectorKind,
}

impl AnalysisConfig {
    /// Check every option before any device work starts.
    pub fn validate(&self) -> Result<()> {
        self.embedding.validate()?;
        self.neighbourhood.validate()?;
        self.execution().validate()
    }

    /// Settings for analysing `samples` against itself.
    pub fn settings(&self, samples: Vec<f32>) -> Result<Settings> {
        self.validate()?;
        let series = TimeSeriesView::from_samples(samples, self.embedding)?;
        Settings::classic(series, self.neighbourhood, self.theiler_corrector)
    }

    /// Settings for analysing `x` (columns) against `y` (rows).
    pub fn cross_settings(&self, x: Vec<f32>, y: Vec<f32>) -> Result<Settings> {
        self.validate()?;
        let x = TimeSeriesView::from_samples(x, self.embedding)?;
        let y = TimeSeriesView::from_samples(y, self.embedding)?;
        Settings::cross(x, y, self.neighbourhood, self.theiler_corrector)
    }

    pub fn variant(&self) -> VariantFlags {
        VariantFlags {
            layout: self.layout,
            overlap: self.overlap_policy,
            materialization: if self.materialize_tiles {
                Materialization::Host
            } else {
                Materialization::Device
            },
            representation: self.cell_representation,
        }
    }

    pub fn execution(&self) -> ExecutionOptions {
        ExecutionOptions {
            variant: self.variant(),
            selector: self.selector,
            min_line_lengths: self.min_line_lengths,
            vertical_edge_runs: self.vertical_edge_runs,
        }
    }
}
