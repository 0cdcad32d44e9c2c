use std::cmp::Ordering;
use std::ops::Range;

use crate::core::sub_matrix::{CellRepresentation, SubMatrix};
use crate::device::DeviceDescriptor;
use crate::error::{Result, RqaError};

/// Partitions the N x M recurrence matrix into tiles that fit the device.
///
/// Tile dimensions start at the full matrix and the larger side is halved
/// until the tile buffer fits into `max_alloc_bytes`; equal sides are halved
/// together. Square matrices therefore get square tiles, so the tile borders
/// of a symmetric plan mirror onto tile borders. Tiles are emitted in
/// row-major order (`start_y`, then `start_x`); cross-tile recycling of
/// vertical and diagonal runs depends on this order.
///
/// With `symmetric`, tiles that lie strictly below the main diagonal are
/// skipped.
///
/// ```
/// use rqa_rs::algorithms::planner::SubMatrixPlanner;
///
/// let planner = SubMatrixPlanner::with_tile_dims(5, 4, 2, 3, false);
/// let tiles: Vec<_> = planner.tiles().collect();
/// assert_eq!(tiles.len(), 6);
/// assert_eq!((tiles[3].start_x, tiles[3].start_y), (0, 3));
/// ```
#[derive(Debug, Clone)]
pub struct SubMatrixPlanner {
    n: usize,
    m: usize,
    columns: Range<usize>,
    tile_dim_x: usize,
    tile_dim_y: usize,
    symmetric: bool,
}

impl SubMatrixPlanner {
    /// Plan tiles whose buffers fit into `descriptor.max_alloc_bytes`.
    ///
    /// `vector_bytes` is the size of one embedded vector on the device; it
    /// caps the tile sides so the per-tile vector buffers fit as well.
    pub fn new(
        n: usize,
        m: usize,
        representation: CellRepresentation,
        descriptor: &DeviceDescriptor,
        vector_bytes: usize,
        symmetric: bool,
    ) -> Result<Self> {
        let max_alloc = descriptor.max_alloc_bytes;
        let max_side = if vector_bytes == 0 {
            usize::MAX
        } else {
            max_alloc / vector_bytes
        };
        if max_side == 0 || representation.size_bytes(1) > max_alloc {
            return Err(RqaError::SubMatrixTooLarge {
                dim_x: 1,
                dim_y: 1,
                size_bytes: representation.size_bytes(1).max(vector_bytes),
                max_alloc_bytes: max_alloc,
            });
        }

        let mut dim_x = n.clamp(1, max_side);
        let mut dim_y = m.clamp(1, max_side);
        while representation.size_bytes(dim_x * dim_y) > max_alloc {
            match dim_x.cmp(&dim_y) {
                Ordering::Greater => dim_x = dim_x.div_ceil(2),
                Ordering::Less => dim_y = dim_y.div_ceil(2),
                Ordering::Equal => {
                    dim_x = dim_x.div_ceil(2);
                    dim_y = dim_x;
                }
            }
        }

        Ok(Self::with_tile_dims(n, m, dim_x, dim_y, symmetric))
    }

    /// Plan with explicit tile dimensions.
    pub fn with_tile_dims(
        n: usize,
        m: usize,
        tile_dim_x: usize,
        tile_dim_y: usize,
        symmetric: bool,
    ) -> Self {
        Self {
            n,
            m,
            columns: 0..n,
            tile_dim_x: tile_dim_x.max(1),
            tile_dim_y: tile_dim_y.max(1),
            symmetric,
        }
    }

    /// Restrict the plan to a band of columns.
    pub fn with_columns(mut self, columns: Range<usize>) -> Self {
        self.columns = columns.start.min(self.n)..columns.end.min(self.n);
        self
    }

    pub fn tile_dim_x(&self) -> usize {
        self.tile_dim_x
    }

    pub fn tile_dim_y(&self) -> usize {
        self.tile_dim_y
    }

    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    /// Lazily emit the tiles of the plan. Calling this again restarts the plan.
    pub fn tiles(&self) -> SubMatrixIter {
        SubMatrixIter {
            planner: self.clone(),
            next_x: self.columns.start,
            next_y: 0,
        }
    }
}

/// Iterator over the tiles of a [`SubMatrixPlanner`].
#[derive(Debug, Clone)]
pub struct SubMatrixIter {
    planner: SubMatrixPlanner,
    next_x: usize,
    next_y: usize,
}

impl Iterator for SubMatrixIter {
    type Item = SubMatrix;

    fn next(&mut self) -> Option<SubMatrix> {
        let p = &self.planner;
        if p.columns.is_empty() {
            return None;
        }
        while self.next_y < p.m {
            let start_x = self.next_x;
            let start_y = self.next_y;
            let tile = SubMatrix::new(
                start_x,
                start_y,
                p.tile_dim_x.min(p.columns.end - start_x),
                p.tile_dim_y.min(p.m - start_y),
            );

            self.next_x = tile.end_x();
            if self.next_x >= p.columns.end {
                self.next_x = p.columns.start;
                self.next_y = tile.end_y();
            }

            if p.symmetric && tile.is_below_diagonal() {
                continue;
            }
            return Some(tile);
        }
        None
    }
}
