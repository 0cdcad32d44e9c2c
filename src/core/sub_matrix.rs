use serde::{Deserialize, Serialize};

/// How recurrence cells are stored in a tile buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellRepresentation {
    /// One byte per cell (0 or 1).
    #[default]
    Byte,
    /// One bit per cell, LSB first, in linear cell order.
    Bit,
}

impl CellRepresentation {
    /// Bytes needed to store `cells` cells.
    #[inline]
    pub fn size_bytes(self, cells: usize) -> usize {
        match self {
            CellRepresentation::Byte => cells,
            CellRepresentation::Bit => cells.div_ceil(8),
        }
    }

    /// Cells produced by one kernel work item (one output byte).
    #[inline]
    pub fn cells_per_byte(self) -> usize {
        match self {
            CellRepresentation::Byte => 1,
            CellRepresentation::Bit => 8,
        }
    }
}

/// Linear order of cells inside a tile buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixLayout {
    /// Column store: cells of one column are contiguous.
    #[default]
    Column,
    /// Row store: cells of one row are contiguous.
    Row,
}

impl MatrixLayout {
    #[inline(always)]
    pub fn index(self, x: usize, y: usize, dim_x: usize, dim_y: usize) -> usize {
        match self {
            MatrixLayout::Column => x * dim_y + y,
            MatrixLayout::Row => y * dim_x + x,
        }
    }

    /// Inverse of [`MatrixLayout::index`].
    #[inline(always)]
    pub fn coordinates(self, index: usize, dim_x: usize, dim_y: usize) -> (usize, usize) {
        match self {
            MatrixLayout::Column => (index / dim_y, index % dim_y),
            MatrixLayout::Row => (index % dim_x, index / dim_x),
        }
    }
}

/// A rectangular tile of the conceptual N x M recurrence matrix.
///
/// `x` indexes columns (vectors of the first series), `y` indexes rows
/// (vectors of the second series).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubMatrix {
    pub start_x: usize,
    pub start_y: usize,
    pub dim_x: usize,
    pub dim_y: usize,
}

impl SubMatrix {
    pub fn new(start_x: usize, start_y: usize, dim_x: usize, dim_y: usize) -> Self {
        Self {
            start_x,
            start_y,
            dim_x,
            dim_y,
        }
    }

    pub fn cells(&self) -> usize {
        self.dim_x * self.dim_y
    }

    pub fn size_bytes(&self, representation: CellRepresentation) -> usize {
        representation.size_bytes(self.cells())
    }

    pub fn end_x(&self) -> usize {
        self.start_x + self.dim_x
    }

    pub fn end_y(&self) -> usize {
        self.start_y + self.dim_y
    }

    /// Every cell lies strictly below the main diagonal (`x < y`).
    pub fn is_below_diagonal(&self) -> bool {
        self.end_x() <= self.start_y
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        (self.start_x..self.end_x()).contains(&x) && (self.start_y..self.end_y()).contains(&y)
    }
}

/// Read access to the cells of a tile buffer in either representation.
#[derive(Debug, Clone, Copy)]
pub struct CellView<'a> {
    data: &'a [u8],
    dim_x: usize,
    dim_y: usize,
    layout: MatrixLayout,
    representation: CellRepresentation,
}

impl<'a> CellView<'a> {
    pub fn new(
        data: &'a [u8],
        dim_x: usize,
        dim_y: usize,
        layout: MatrixLayout,
        representation: CellRepresentation,
    ) -> Self {
        debug_assert!(data.len() >= representation.size_bytes(dim_x * dim_y));
        Self {
            data,
            dim_x,
            dim_y,
            layout,
            representation,
        }
    }

    pub fn dim_x(&self) -> usize {
        self.dim_x
    }

    pub fn dim_y(&self) -> usize {
        self.dim_y
    }

    /// Cell at tile-local coordinates.
    #[inline(always)]
    pub fn get(&self, x: usize, y: usize) -> bool {
        let i = self.layout.index(x, y, self.dim_x, self.dim_y);
        match self.representation {
            CellRepresentation::Byte => self.data[i] != 0,
            CellRepresentation::Bit => (self.data[i >> 3] >> (i & 7)) & 1 == 1,
        }
    }

    /// Number of recurrent cells in the tile.
    pub fn count_recurrent(&self) -> usize {
        let cells = self.dim_x * self.dim_y;
        match self.representation {
            CellRepresentation::Byte => self.data[..cells].iter().filter(|&&b| b != 0).count(),
            CellRepresentation::Bit => {
                let full = cells / 8;
                let mut n: usize = self.data[..full]
                    .iter()
                    .map(|b| b.count_ones() as usize)
                    .sum();
                let rem = cells % 8;
                if rem > 0 {
                    n += (self.data[full] & ((1u8 << rem) - 1)).count_ones() as usize;
                }
                n
            }
        }
    }

    /// Copy as one byte per cell in the same layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let cells = self.dim_x * self.dim_y;
        match self.representation {
            CellRepresentation::Byte => self.data[..cells].to_vec(),
            CellRepresentation::Bit => unpack_bits(self.data, cells),
        }
    }
}

/// Pack one-byte-per-cell values into bits, LSB first.
pub fn pack_bits(cells: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; cells.len().div_ceil(8)];
    for (i, &c) in cells.iter().enumerate() {
        if c != 0 {
            out[i >> 3] |= 1 << (i & 7);
        }
    }
    out
}

/// Expand the first `cells` bits of `bits` into one byte per cell.
pub fn unpack_bits(bits: &[u8], cells: usize) -> Vec<u8> {
    (0..cells).map(|i| (bits[i >> 3] >> (i & 7)) & 1).collect()
}
