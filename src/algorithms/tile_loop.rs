use std::marker::PhantomData;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::algorithms::common::KernelRunner;
use crate::algorithms::create_matrix::CreateMatrixOperator;
use crate::algorithms::diagonal_lines::{DetectDiagonalLinesOperator, DiagonalCarry};
use crate::algorithms::planner::SubMatrixPlanner;
use crate::algorithms::selector::{Materialization, VariantFlags, VariantSelector};
use crate::algorithms::vertical_lines::{DetectVerticalLinesOperator, VerticalCarry};
use crate::config::ExecutionOptions;
use crate::core::runtimes::Runtimes;
use crate::core::settings::Settings;
use crate::core::similarity_measure::SimilarityMeasure;
use crate::core::sub_matrix::{CellRepresentation, CellView, SubMatrix};
use crate::device::Device;
use crate::error::{Result, RqaError};
use crate::result::{RecurrencePlot, RunStatistics};

/// Shared flag that stops a run before its next tile.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Drives the tiles of one device through matrix creation and line detection.
///
/// Tiles are processed strictly in planner order. Each tile is completed
/// (its buffers released and its partial histograms merged) before the
/// next one starts, because the carried run state of the next tile depends
/// on it.
pub struct TileLoop<'a, M: SimilarityMeasure> {
    settings: &'a Settings,
    options: &'a ExecutionOptions,
    columns: Range<usize>,
    symmetric: bool,
    _metric: PhantomData<M>,
}

impl<'a, M: SimilarityMeasure> TileLoop<'a, M> {
    pub fn new(settings: &'a Settings, options: &'a ExecutionOptions) -> Self {
        Self {
            settings,
            options,
            columns: 0..settings.number_of_vectors_x(),
            symmetric: settings.is_matrix_symmetric(),
            _metric: PhantomData,
        }
    }

    /// Restrict the loop to a band of columns. Symmetry is not used for bands.
    pub fn with_columns(mut self, columns: Range<usize>) -> Self {
        self.columns = columns;
        self.symmetric = false;
        self
    }

    pub fn run(&self, device: &mut Device, cancel: &CancellationToken) -> Result<RunStatistics> {
        let n = self.settings.number_of_vectors_x();
        let m = self.settings.number_of_vectors_y();
        let overlap = self.options.variant.overlap;
        let mut selector = VariantSelector::new(self.options.variant, self.options.selector)?;

        // plan for the widest cell any candidate variant may use
        let representation = if selector
            .candidates()
            .iter()
            .any(|v| v.representation == CellRepresentation::Byte)
        {
            CellRepresentation::Byte
        } else {
            CellRepresentation::Bit
        };
        let planner = SubMatrixPlanner::new(
            n,
            m,
            representation,
            device.descriptor(),
            self.vector_bytes(),
            self.symmetric,
        )?
        .with_columns(self.columns.clone());

        info!(
            device = device.name(),
            n,
            m,
            columns = ?self.columns,
            tile_dim_x = planner.tile_dim_x(),
            tile_dim_y = planner.tile_dim_y(),
            symmetric = self.symmetric,
            variant = %self.options.variant.name(),
            metric = M::NAME,
            "starting tiled recurrence analysis"
        );

        let diagonal = DetectDiagonalLinesOperator::new(
            self.columns.end,
            m,
            self.settings.theiler_corrector(),
            self.symmetric,
            overlap,
        );
        let vertical = DetectVerticalLinesOperator::new(
            n,
            m,
            self.symmetric,
            overlap,
            self.options.vertical_edge_runs,
        );
        let mut diagonal_carry = DiagonalCarry::new(n, m);
        let mut vertical_carry = VerticalCarry::new(n, self.symmetric);
        let mut stats = RunStatistics::new(n);
        stats.symmetric = self.symmetric;

        for tile in planner.tiles() {
            if cancel.is_cancelled() {
                warn!(
                    device = device.name(),
                    tiles_completed = stats.runtimes.tiles(),
                    "recurrence analysis cancelled"
                );
                return Err(RqaError::Cancelled {
                    tiles_completed: stats.runtimes.tiles(),
                });
            }

            let flags = selector.select();
            let runtimes = self
                .process_tile(
                    device,
                    &tile,
                    flags,
                    &diagonal,
                    &vertical,
                    &mut diagonal_carry,
                    &mut vertical_carry,
                    &mut stats,
                )
                .map_err(|e| {
                    warn!(
                        start_x = tile.start_x,
                        start_y = tile.start_y,
                        error = %e,
                        "tile failed"
                    );
                    not_processed(&tile, e)
                })?;

            selector.report(flags, &runtimes, tile.cells());
            stats.record_tile(flags, runtimes);
            debug!(
                start_x = tile.start_x,
                start_y = tile.start_y,
                dim_x = tile.dim_x,
                dim_y = tile.dim_y,
                variant = %flags.name(),
                execute_us = runtimes.execute.as_micros() as u64,
                "tile processed"
            );
        }

        info!(
            device = device.name(),
            tiles = stats.runtimes.tiles(),
            total_ms = stats.runtimes.total().total().as_millis() as u64,
            peak_bytes = device.peak_bytes(),
            "recurrence analysis finished"
        );
        Ok(stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn process_tile(
        &self,
        device: &mut Device,
        tile: &SubMatrix,
        flags: VariantFlags,
        diagonal: &DetectDiagonalLinesOperator,
        vertical: &DetectVerticalLinesOperator,
        diagonal_carry: &mut DiagonalCarry,
        vertical_carry: &mut VerticalCarry,
        stats: &mut RunStatistics,
    ) -> Result<Runtimes> {
        let mut buffers = device.buffers();
        let matrix =
            CreateMatrixOperator::<M>::new(self.settings, flags.layout, flags.representation)
                .create(&mut buffers, tile)?;

        let host;
        let cells: &[u8] = match flags.materialization {
            Materialization::Host => {
                host = buffers.download(&matrix);
                &host
            }
            Materialization::Device => matrix.device_slice(),
        };
        let view = CellView::new(
            cells,
            tile.dim_x,
            tile.dim_y,
            flags.layout,
            flags.representation,
        );

        let mut runner = KernelRunner::new(&mut buffers, flags.materialization);
        diagonal.detect(
            &mut runner,
            &view,
            tile,
            diagonal_carry,
            &mut stats.diagonal,
        );
        vertical.detect(
            &mut runner,
            &view,
            tile,
            vertical_carry,
            &mut stats.vertical,
            &mut stats.recurrence_points,
        );

        buffers.finish();
        Ok(buffers.runtimes())
    }

    fn vector_bytes(&self) -> usize {
        self.settings.max_embedding_dimension() * std::mem::size_of::<f32>()
    }

    /// Assemble the full recurrence matrix from materialized tiles.
    pub fn recurrence_plot(
        &self,
        device: &mut Device,
        cancel: &CancellationToken,
    ) -> Result<RecurrencePlot> {
        let n = self.settings.number_of_vectors_x();
        let m = self.settings.number_of_vectors_y();
        let flags = self.options.variant;
        let planner = SubMatrixPlanner::new(
            n,
            m,
            flags.representation,
            device.descriptor(),
            self.vector_bytes(),
            false,
        )?;

        let mut plot = RecurrencePlot::new(n, m);
        for (done, tile) in planner.tiles().enumerate() {
            if cancel.is_cancelled() {
                return Err(RqaError::Cancelled {
                    tiles_completed: done,
                });
            }
            let mut buffers = device.buffers();
            let matrix =
                CreateMatrixOperator::<M>::new(self.settings, flags.layout, flags.representation)
                    .create(&mut buffers, &tile)
                    .map_err(|e| not_processed(&tile, e))?;
            let host = buffers.download(&matrix);
            let view = CellView::new(
                &host,
                tile.dim_x,
                tile.dim_y,
                flags.layout,
                flags.representation,
            );
            for ly in 0..tile.dim_y {
                for lx in 0..tile.dim_x {
                    plot.set(tile.start_x + lx, tile.start_y + ly, view.get(lx, ly));
                }
            }
        }
        debug!(
            n,
            m,
            recurrent = plot.count_recurrent(),
            "recurrence plot assembled"
        );
        Ok(plot)
    }
}

/// Run column bands of the matrix on several devices at once.
///
/// Each device gets one contiguous band of columns and runs its own tile
/// loop; with the `parallel` feature the bands run on the rayon pool,
/// otherwise one after another. Vertical lines never cross a band; diagonal
/// lines are closed at band borders. If one band fails the others are
/// cancelled and the first real failure is returned.
pub fn run_partitioned<M: SimilarityMeasure>(
    devices: &mut [Device],
    settings: &Settings,
    options: &ExecutionOptions,
) -> Result<RunStatistics> {
    if devices.is_empty() {
        return Err(RqaError::InvalidConfig("at least one device is required".into()));
    }
    let n = settings.number_of_vectors_x();
    let band = n.div_ceil(devices.len()).max(1);
    let cancel = CancellationToken::new();
    let started = Instant::now();

    let run_band = |(i, device): (usize, &mut Device)| -> Option<Result<RunStatistics>> {
        let columns = (i * band).min(n)..((i + 1) * band).min(n);
        if columns.is_empty() {
            return None;
        }
        let outcome = TileLoop::<M>::new(settings, options)
            .with_columns(columns)
            .run(device, &cancel);
        if outcome.is_err() {
            cancel.cancel();
        }
        Some(outcome)
    };

    #[cfg(feature = "parallel")]
    let outcomes: Vec<Result<RunStatistics>> = {
        use rayon::prelude::*;
        devices
            .par_iter_mut()
            .enumerate()
            .filter_map(run_band)
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<Result<RunStatistics>> = devices
        .iter_mut()
        .enumerate()
        .filter_map(run_band)
        .collect();

    let mut merged = RunStatistics::new(n);
    let mut cancelled = None;
    for outcome in outcomes {
        match outcome {
            Ok(stats) => merged.merge(&stats),
            Err(e @ RqaError::Cancelled { .. }) => cancelled = cancelled.or(Some(e)),
            Err(e) => return Err(e),
        }
    }
    if let Some(e) = cancelled {
        return Err(e);
    }

    info!(
        devices = devices.len(),
        tiles = merged.runtimes.tiles(),
        wall_ms = started.elapsed().as_millis() as u64,
        "partitioned recurrence analysis finished"
    );
    Ok(merged)
}

fn not_processed(tile: &SubMatrix, cause: RqaError) -> RqaError {
    RqaError::SubMatrixNotProcessed {
        start_x: tile.start_x,
        start_y: tile.start_y,
        dim_x: tile.dim_x,
        dim_y: tile.dim_y,
        reason: cause.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::neighbourhood::NeighbourhoodCondition;
    use crate::core::time_series::{EmbeddingParams, TimeSeriesView};
    use crate::device::DeviceDescriptor;
    use crate::metrics::euclidean::EuclideanMetric;

    fn settings(n: usize) -> Settings {
        let samples: Vec<f32> = (0..n).map(|i| (i as f32 * 0.7).sin()).collect();
        let ts = TimeSeriesView::from_samples(samples, EmbeddingParams::new(2, 1)).unwrap();
        Settings::classic(ts, NeighbourhoodCondition::FixedRadius(0.3), 0).unwrap()
    }

    #[test]
    fn test_cancelled_before_first_tile() {
        let s = settings(20);
        let options = ExecutionOptions::default();
        let token = CancellationToken::new();
        token.cancel();
        let mut device = Device::new(DeviceDescriptor::new("t", 64, 4));
        let err = TileLoop::<EuclideanMetric>::new(&s, &options)
            .run(&mut device, &token)
            .unwrap_err();
        assert!(matches!(err, RqaError::Cancelled { tiles_completed: 0 }));
        assert_eq!(device.in_use_bytes(), 0);
    }

    #[test]
    fn test_allocation_failure_aborts_run() {
        let s = settings(40);
        let options = ExecutionOptions::default();
        // tiles fit max_alloc but the global memory cannot hold vectors and matrix together
        let descriptor = DeviceDescriptor::new("t", 256, 4).with_global_mem_bytes(256);
        let mut device = Device::new(descriptor);
        let err = TileLoop::<EuclideanMetric>::new(&s, &options)
            .run(&mut device, &CancellationToken::new())
            .unwrap_err();
        let RqaError::SubMatrixNotProcessed {
            start_x,
            start_y,
            ..
        } = err
        else {
            panic!("expected the first tile to fail");
        };
        assert_eq!((start_x, start_y), (0, 0));
        assert_eq!(device.in_use_bytes(), 0);
    }

    #[test]
    fn test_every_tile_is_recorded() {
        let s = settings(30);
        let options = ExecutionOptions::default();
        let mut device = Device::new(DeviceDescriptor::new("t", 100, 4));
        let stats = TileLoop::<EuclideanMetric>::new(&s, &options)
            .run(&mut device, &CancellationToken::new())
            .unwrap();
        let planned = SubMatrixPlanner::new(
            29,
            29,
            CellRepresentation::Byte,
            device.descriptor(),
            8,
            true,
        )
        .unwrap()
        .tiles()
        .count();
        assert_eq!(stats.runtimes.tiles(), planned);
        assert_eq!(stats.variant_usage.values().sum::<usize>(), planned);
        assert_eq!(device.in_use_bytes(), 0);
    }

    #[test]
    fn test_partitioned_requires_devices() {
        let s = settings(10);
        let err = run_partitioned::<EuclideanMetric>(&mut [], &s, &ExecutionOptions::default());
        assert!(matches!(err, Err(RqaError::InvalidConfig(_))));
    }

    #[test]
    fn test_recurrence_plot_is_symmetric() {
        let s = settings(17);
        let options = ExecutionOptions::default();
        let mut device = Device::new(DeviceDescriptor::new("t", 32, 4));
        let plot = TileLoop::<EuclideanMetric>::new(&s, &options)
            .recurrence_plot(&mut device, &CancellationToken::new())
            .unwrap();
        assert_eq!((plot.dim_x(), plot.dim_y()), (16, 16));
        for y in 0..16 {
            assert!(plot.get(y, y));
            for x in 0..16 {
                assert_eq!(plot.get(x, y), plot.get(y, x));
            }
        }
    }
}
