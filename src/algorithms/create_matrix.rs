use std::marker::PhantomData;

use crate::core::settings::Settings;
use crate::core::similarity_measure::SimilarityMeasure;
use crate::core::sub_matrix::{CellRepresentation, MatrixLayout, SubMatrix};
use crate::device::{BufferManager, DeviceBuffer};
use crate::error::Result;

/// Computes the recurrence cells of one tile into a device buffer.
///
/// The embedded vectors of the tile's columns and rows are staged on the
/// host and uploaded; one work item produces one output byte, which holds a
/// single cell in byte representation or eight consecutive cells in bit
/// representation. The vector buffers are released before returning.
#[derive(Debug)]
pub struct CreateMatrixOperator<'s, M: SimilarityMeasure> {
    settings: &'s Settings,
    layout: MatrixLayout,
    representation: CellRepresentation,
    _metric: PhantomData<M>,
}

impl<'s, M: SimilarityMeasure> CreateMatrixOperator<'s, M> {
    pub fn new(
        settings: &'s Settings,
        layout: MatrixLayout,
        representation: CellRepresentation,
    ) -> Self {
        Self {
            settings,
            layout,
            representation,
            _metric: PhantomData,
        }
    }

    pub fn create<'d>(
        &self,
        buffers: &mut BufferManager<'d>,
        tile: &SubMatrix,
    ) -> Result<DeviceBuffer<'d, u8>> {
        let max_dim = self.settings.max_embedding_dimension();
        let mut staging = Vec::with_capacity(tile.dim_x.max(tile.dim_y) * max_dim);
        let mut vectors = Vec::with_capacity(self.settings.components().len());
        for component in self.settings.components() {
            let (x, y) = (component.x(), component.y());
            staging.clear();
            x.write_vectors(tile.start_x, tile.dim_x, &mut staging);
            let columns = buffers.allocate_from(&staging)?;
            staging.clear();
            y.write_vectors(tile.start_y, tile.dim_y, &mut staging);
            let rows = buffers.allocate_from(&staging)?;
            vectors.push((columns, rows));
        }

        let mut matrix = buffers.allocate::<u8>(tile.size_bytes(self.representation))?;

        let conditions: Vec<_> = self
            .settings
            .components()
            .iter()
            .zip(&vectors)
            .map(|(component, (columns, rows))| {
                let dim = component.embedding_dimension();
                (
                    columns.device_slice(),
                    rows.device_slice(),
                    dim,
                    component.neighbourhood(),
                )
            })
            .collect();
        let (dim_x, dim_y, layout) = (tile.dim_x, tile.dim_y, self.layout);
        let cell = move |i: usize| -> bool {
            let (x, y) = layout.coordinates(i, dim_x, dim_y);
            conditions.iter().all(|&(xs, ys, dim, condition)| {
                let a = &xs[x * dim..(x + 1) * dim];
                let b = &ys[y * dim..(y + 1) * dim];
                condition.contains(M::distance(a, b))
            })
        };

        match self.representation {
            CellRepresentation::Byte => {
                buffers.launch_fill(&mut matrix, |gid, out| *out = cell(gid) as u8);
            }
            CellRepresentation::Bit => {
                let cells = tile.cells();
                buffers.launch_fill(&mut matrix, |gid, out| {
                    let base = gid * 8;
                    let mut byte = 0u8;
                    for bit in 0..(cells - base).min(8) {
                        if cell(base + bit) {
                            byte |= 1 << bit;
                        }
                    }
                    *out = byte;
                });
            }
        }

        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::neighbourhood::NeighbourhoodCondition;
    use crate::core::sub_matrix::{pack_bits, CellView};
    use crate::core::time_series::{EmbeddingParams, TimeSeriesView};
    use crate::device::{Device, DeviceDescriptor};
    use crate::metrics::euclidean::EuclideanMetric;
    use crate::metrics::maximum::MaximumMetric;

    fn settings(samples: &[f32], condition: NeighbourhoodCondition) -> Settings {
        let ts = TimeSeriesView::from_samples(samples.to_vec(), EmbeddingParams::new(1, 1))
            .unwrap();
        Settings::classic(ts, condition, 0).unwrap()
    }

    fn tile_cells<M: SimilarityMeasure>(
        s: &Settings,
        tile: SubMatrix,
        layout: MatrixLayout,
        repr: CellRepresentation,
    ) -> Vec<u8> {
        let mut device = Device::new(DeviceDescriptor::new("t", 1 << 16, 4));
        let mut buffers = device.buffers();
        let matrix = CreateMatrixOperator::<M>::new(s, layout, repr)
            .create(&mut buffers, &tile)
            .unwrap();
        let host = buffers.download(&matrix);
        CellView::new(&host, tile.dim_x, tile.dim_y, layout, repr).to_bytes()
    }

    #[test]
    fn test_checkerboard_tile() {
        let s = settings(
            &[0.0, 1.0, 0.0, 1.0, 0.0],
            NeighbourhoodCondition::FixedRadius(0.5),
        );
        let tile = SubMatrix::new(1, 0, 3, 2);
        let cells =
            tile_cells::<EuclideanMetric>(&s, tile, MatrixLayout::Row, CellRepresentation::Byte);
        // row y=0 (value 0) against x=1..4 (values 1,0,1), row y=1 (value 1)
        assert_eq!(cells, vec![0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_layouts_and_representations_agree() {
        let samples: Vec<f32> = (0..13).map(|i| ((i * 7) % 5) as f32 * 0.3).collect();
        let s = settings(&samples, NeighbourhoodCondition::FixedRadius(0.4));
        let tile = SubMatrix::new(2, 3, 7, 5);
        let reference =
            tile_cells::<MaximumMetric>(&s, tile, MatrixLayout::Column, CellRepresentation::Byte);
        for layout in [MatrixLayout::Column, MatrixLayout::Row] {
            for repr in [CellRepresentation::Byte, CellRepresentation::Bit] {
                let cells = tile_cells::<MaximumMetric>(&s, tile, layout, repr);
                for x in 0..tile.dim_x {
                    for y in 0..tile.dim_y {
                        let a = reference[MatrixLayout::Column.index(x, y, 7, 5)];
                        let b = cells[layout.index(x, y, 7, 5)];
                        assert_eq!(a, b, "{layout:?}/{repr:?} cell ({x},{y})");
                    }
                }
            }
        }
    }

    #[test]
    fn test_bit_buffer_is_packed_byte_buffer() {
        let samples: Vec<f32> = (0..11).map(|i| (i as f32 * 0.9).sin()).collect();
        let s = settings(
            &samples,
            NeighbourhoodCondition::RadiusCorridor { min: 0.1, max: 0.8 },
        );
        let tile = SubMatrix::new(0, 0, 11, 11);
        let mut device = Device::new(DeviceDescriptor::new("t", 1 << 16, 4));
        let mut buffers = device.buffers();
        let op =
            |repr| CreateMatrixOperator::<EuclideanMetric>::new(&s, MatrixLayout::Column, repr);
        let bytes = op(CellRepresentation::Byte)
            .create(&mut buffers, &tile)
            .unwrap();
        let bits = op(CellRepresentation::Bit)
            .create(&mut buffers, &tile)
            .unwrap();
        assert_eq!(bits.len(), 16);
        assert_eq!(
            pack_bits(&buffers.download(&bytes)),
            buffers.download(&bits)
        );
    }

    #[test]
    fn test_joint_tile_is_conjunction_of_components() {
        let a = settings(
            &[0.0, 1.0, 0.0, 1.0, 0.0, 1.0],
            NeighbourhoodCondition::FixedRadius(0.5),
        );
        let b = settings(
            &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            NeighbourhoodCondition::FixedRadius(0.5),
        );
        let joint = Settings::joint(a.clone(), b.clone());
        let tile = SubMatrix::new(1, 2, 4, 3);
        let (layout, repr) = (MatrixLayout::Row, CellRepresentation::Bit);
        let cells_a = tile_cells::<EuclideanMetric>(&a, tile, layout, repr);
        let cells_b = tile_cells::<EuclideanMetric>(&b, tile, layout, repr);
        let expected: Vec<u8> = cells_a.iter().zip(&cells_b).map(|(p, q)| p & q).collect();
        let cells = tile_cells::<EuclideanMetric>(&joint, tile, layout, repr);
        assert_eq!(cells, expected);
        // x=2, y=2 is recurrent under both components
        assert_eq!(cells[layout.index(1, 0, 4, 3)], 1);
        assert_ne!(cells, cells_a);
    }

    #[test]
    fn test_vector_buffers_released() {
        let s = settings(
            &[0.0, 1.0, 2.0, 3.0],
            NeighbourhoodCondition::FixedRadius(1.0),
        );
        let mut device = Device::new(DeviceDescriptor::new("t", 1 << 10, 4));
        {
            let mut buffers = device.buffers();
            let tile = SubMatrix::new(0, 0, 4, 4);
            let matrix = CreateMatrixOperator::<EuclideanMetric>::new(
                &s,
                MatrixLayout::Row,
                CellRepresentation::Byte,
            )
            .create(&mut buffers, &tile)
            .unwrap();
            assert_eq!(matrix.size_bytes(), 16);
        }
        assert_eq!(device.in_use_bytes(), 0);
        // 2 vector buffers of 16 bytes plus the 16 byte matrix
        assert_eq!(device.peak_bytes(), 48);
    }
}
