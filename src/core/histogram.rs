use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Occurrence count per line length.
///
/// Partial histograms from individual tiles are merged into a global one;
/// lengths are always >= 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineLengthHistogram {
    counts: BTreeMap<usize, u64>,
}

impl LineLengthHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one line of `length`.
    #[inline]
    pub fn add(&mut self, length: usize) {
        self.add_count(length, 1);
    }

    /// Record `count` lines of `length`. Zero lengths and counts are ignored.
    pub fn add_count(&mut self, length: usize, count: u64) {
        if length == 0 || count == 0 {
            return;
        }
        *self.counts.entry(length).or_insert(0) += count;
    }

    /// Merge another histogram into this one.
    pub fn merge(&mut self, other: &LineLengthHistogram) {
        for (&length, &count) in &other.counts {
            self.add_count(length, count);
        }
    }

    pub fn get(&self, length: usize) -> u64 {
        self.counts.get(&length).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// `(length, count)` pairs in increasing length order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.counts.iter().map(|(&l, &c)| (l, c))
    }

    /// Number of lines with length >= `min_length`.
    pub fn number_of_lines(&self, min_length: usize) -> u64 {
        self.counts
            .range(min_length.max(1)..)
            .map(|(_, &c)| c)
            .sum()
    }

    /// Number of cells covered by lines with length >= `min_length`.
    pub fn number_of_points(&self, min_length: usize) -> u64 {
        self.counts
            .range(min_length.max(1)..)
            .map(|(&l, &c)| l as u64 * c)
            .sum()
    }

    /// Longest recorded line, 0 when empty.
    pub fn longest(&self) -> usize {
        self.counts.keys().next_back().copied().unwrap_or(0)
    }

    /// Copy keeping only lengths >= `min_length`.
    pub fn trimmed(&self, min_length: usize) -> LineLengthHistogram {
        LineLengthHistogram {
            counts: self
                .counts
                .range(min_length.max(1)..)
                .map(|(&l, &c)| (l, c))
                .collect(),
        }
    }

    /// Dense frequency distribution where index `i` holds the count of length `i + 1`.
    pub fn to_frequency_distribution(&self) -> Vec<u64> {
        let mut dist = vec![0; self.longest()];
        for (&l, &c) in &self.counts {
            dist[l - 1] = c;
        }
        dist
    }
}

impl FromIterator<usize> for LineLengthHistogram {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut hist = LineLengthHistogram::new();
        for length in iter {
            hist.add(length);
        }
        hist
    }
}
