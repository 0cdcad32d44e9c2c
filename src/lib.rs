pub mod algorithms;
pub mod config;
pub mod core;
pub mod device;
pub mod error;
pub mod metrics;
pub mod result;

pub use crate::algorithms::selector::{
    Materialization, OverlapPolicy, SelectorKind, VariantFlags, VariantSelector,
};
pub use crate::algorithms::tile_loop::CancellationToken;
pub use crate::config::{AnalysisConfig, EdgeRunPolicy, ExecutionOptions, MinLineLengths};
pub use crate::core::histogram::LineLengthHistogram;
pub use crate::core::neighbourhood::NeighbourhoodCondition;
pub use crate::core::runtimes::{RuntimeAccumulator, Runtimes};
pub use crate::core::settings::{Component, Settings};
pub use crate::core::similarity_measure::SimilarityMeasure;
pub use crate::core::sub_matrix::{CellRepresentation, MatrixLayout, SubMatrix};
pub use crate::core::time_series::{EmbeddingParams, TimeSeriesView};
pub use crate::device::{Device, DeviceDescriptor};
pub use crate::error::{Result, RqaError};
pub use crate::metrics::euclidean::EuclideanMetric;
pub use crate::metrics::maximum::MaximumMetric;
pub use crate::metrics::taxicab::TaxicabMetric;
pub use crate::result::{RecurrencePlot, RqaResult};

use crate::algorithms::baseline::baseline;
use crate::algorithms::tile_loop::{run_partitioned, TileLoop};

/// High-level facade for tiled recurrence quantification, generic over the
/// similarity measure.
///
/// # Examples
///
/// ```
/// use rqa_rs::{AnalysisConfig, Device, DeviceDescriptor, EuclideanEngine, NeighbourhoodCondition};
///
/// let config = AnalysisConfig {
///     neighbourhood: NeighbourhoodCondition::FixedRadius(0.5),
///     ..AnalysisConfig::default()
/// };
/// let series = vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
/// let engine = EuclideanEngine::from_config(&config, series).unwrap();
///
/// // a device small enough to force many tiles
/// let mut device = Device::new(DeviceDescriptor::new("small", 9, 4));
/// let result = engine.run(&mut device).unwrap();
/// assert_eq!(result.diagonal_histogram.get(8), 1);
/// assert!(result.tiles_processed() > 1);
/// ```
pub struct Engine<M: SimilarityMeasure> {
    settings: Settings,
    options: ExecutionOptions,
    _metric: std::marker::PhantomData<M>,
}

impl<M: SimilarityMeasure> Engine<M> {
    /// Create an engine for validated settings.
    pub fn new(settings: Settings, options: ExecutionOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            settings,
            options,
            _metric: std::marker::PhantomData,
        })
    }

    /// Analyse `samples` against itself.
    pub fn from_config(config: &AnalysisConfig, samples: Vec<f32>) -> Result<Self> {
        Self::new(config.settings(samples)?, config.execution())
    }

    /// Analyse `x` (columns) against `y` (rows).
    pub fn from_config_cross(config: &AnalysisConfig, x: Vec<f32>, y: Vec<f32>) -> Result<Self> {
        Self::new(config.cross_settings(x, y)?, config.execution())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// Run the tiled analysis on one device.
    pub fn run(&self, device: &mut Device) -> Result<RqaResult> {
        self.run_with_cancellation(device, &CancellationToken::new())
    }

    /// Run the tiled analysis, checking `cancel` before every tile.
    ///
    /// A cancelled run returns [`RqaError::Cancelled`]; statistics of the
    /// tiles already processed are dropped.
    pub fn run_with_cancellation(
        &self,
        device: &mut Device,
        cancel: &CancellationToken,
    ) -> Result<RqaResult> {
        let stats = TileLoop::<M>::new(&self.settings, &self.options).run(device, cancel)?;
        Ok(RqaResult::from_statistics(stats, &self.settings, &self.options, M::NAME))
    }

    /// Split the matrix into column bands, one per device, and run them in
    /// parallel.
    ///
    /// Diagonal lines crossing a band border are closed there, so results
    /// can differ from [`Engine::run`] in the diagonal histogram. Bands never
    /// use the symmetry of the matrix.
    pub fn run_partitioned(&self, devices: &mut [Device]) -> Result<RqaResult> {
        let stats = run_partitioned::<M>(devices, &self.settings, &self.options)?;
        Ok(RqaResult::from_statistics(stats, &self.settings, &self.options, M::NAME))
    }

    /// Assemble the full recurrence matrix on the host.
    pub fn recurrence_plot(&self, device: &mut Device) -> Result<RecurrencePlot> {
        TileLoop::<M>::new(&self.settings, &self.options)
            .recurrence_plot(device, &CancellationToken::new())
    }

    /// Compute the same result without tiling, on the host.
    pub fn baseline(&self) -> RqaResult {
        let stats = baseline::<M>(&self.settings, &self.options);
        RqaResult::from_statistics(stats, &self.settings, &self.options, M::NAME)
    }
}

/// Convenience type alias for the most common use case.
pub type EuclideanEngine = Engine<EuclideanMetric>;

/// Engine using the supremum norm.
pub type MaximumEngine = Engine<MaximumMetric>;

/// Engine using the Manhattan norm.
pub type TaxicabEngine = Engine<TaxicabMetric>;
