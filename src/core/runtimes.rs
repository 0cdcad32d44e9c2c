use std::ops::{Add, AddAssign};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Elapsed time per device phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runtimes {
    pub transfer_to_device: Duration,
    pub execute: Duration,
    pub transfer_from_device: Duration,
}

impl Runtimes {
    pub fn total(&self) -> Duration {
        self.transfer_to_device + self.execute + self.transfer_from_device
    }
}

impl Add for Runtimes {
    type Output = Runtimes;

    fn add(self, rhs: Runtimes) -> Runtimes {
        Runtimes {
            transfer_to_device: self.transfer_to_device + rhs.transfer_to_device,
            execute: self.execute + rhs.execute,
            transfer_from_device: self.transfer_from_device + rhs.transfer_from_device,
        }
    }
}

impl AddAssign for Runtimes {
    fn add_assign(&mut self, rhs: Runtimes) {
        *self = *self + rhs;
    }
}

/// Sums per-tile runtimes over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeAccumulator {
    total: Runtimes,
    tiles: usize,
    slowest_tile: Duration,
}

impl RuntimeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tile: Runtimes) {
        self.total += tile;
        self.tiles += 1;
        self.slowest_tile = self.slowest_tile.max(tile.total());
    }

    /// Merge the accumulator of another partition.
    pub fn merge(&mut self, other: &RuntimeAccumulator) {
        self.total += other.total;
        self.tiles += other.tiles;
        self.slowest_tile = self.slowest_tile.max(other.slowest_tile);
    }

    pub fn total(&self) -> Runtimes {
        self.total
    }

    pub fn tiles(&self) -> usize {
        self.tiles
    }

    pub fn slowest_tile(&self) -> Duration {
        self.slowest_tile
    }

    pub fn mean_per_tile(&self) -> Duration {
        if self.tiles == 0 {
            Duration::ZERO
        } else {
            self.total.total() / self.tiles as u32
        }
    }
}
