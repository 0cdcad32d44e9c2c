//! Variant flags and per-tile variant selection.
//!
//! A variant is one point of the four configuration axes: matrix layout,
//! overlap policy, materialization and cell representation. The tile loop
//! is shared by all sixteen variants and only consults the flags.

use std::time::Duration;

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::runtimes::Runtimes;
use crate::core::sub_matrix::{CellRepresentation, MatrixLayout};
use crate::error::{Result, RqaError};

/// Whether run state crosses tile boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Runs are closed at every tile boundary; tiles are independent.
    None,
    /// Open runs are carried into the next tile along the line.
    #[default]
    Recycle,
}

/// Where line detection reads the tile's cells from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Materialization {
    /// The whole tile is copied back and scanned on the host.
    Host,
    /// Detection kernels run on the device; only partial histograms are read back.
    #[default]
    Device,
}

/// One combination of the four variant axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantFlags {
    pub layout: MatrixLayout,
    pub overlap: OverlapPolicy,
    pub materialization: Materialization,
    pub representation: CellRepresentation,
}

impl VariantFlags {
    pub const COUNT: usize = 16;

    /// Variant with table index `index` (bit 0 layout, bit 1 overlap,
    /// bit 2 materialization, bit 3 representation).
    pub fn from_index(index: usize) -> Self {
        let bit = |b: usize| index & (1 << b) != 0;
        Self {
            layout: if bit(0) {
                MatrixLayout::Row
            } else {
                MatrixLayout::Column
            },
            overlap: if bit(1) {
                OverlapPolicy::Recycle
            } else {
                OverlapPolicy::None
            },
            materialization: if bit(2) {
                Materialization::Device
            } else {
                Materialization::Host
            },
            representation: if bit(3) {
                CellRepresentation::Bit
            } else {
                CellRepresentation::Byte
            },
        }
    }

    pub fn index(&self) -> usize {
        (self.layout == MatrixLayout::Row) as usize
            | ((self.overlap == OverlapPolicy::Recycle) as usize) << 1
            | ((self.materialization == Materialization::Device) as usize) << 2
            | ((self.representation == CellRepresentation::Bit) as usize) << 3
    }

    /// Every variant, in table order.
    pub fn all() -> impl Iterator<Item = VariantFlags> {
        (0..Self::COUNT).map(Self::from_index)
    }

    /// Variants that produce identical statistics to `self`.
    pub fn equivalents(&self) -> impl Iterator<Item = VariantFlags> {
        let overlap = self.overlap;
        Self::all().filter(move |v| v.overlap == overlap)
    }

    /// Stable name, e.g. `column_recycle_device_bit`.
    pub fn name(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            match self.layout {
                MatrixLayout::Column => "column",
                MatrixLayout::Row => "row",
            },
            match self.overlap {
                OverlapPolicy::None => "no_overlap",
                OverlapPolicy::Recycle => "recycle",
            },
            match self.materialization {
                Materialization::Host => "host",
                Materialization::Device => "device",
            },
            match self.representation {
                CellRepresentation::Byte => "byte",
                CellRepresentation::Bit => "bit",
            },
        )
    }
}

/// How the variant for each tile is chosen.
///
/// Every adaptive selector first runs each equivalent variant once, then
/// ranks the variants by measured runtime per cell. The seed makes the
/// sequence of choices reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    /// Always use the configured variant.
    #[default]
    Fixed,
    /// Explore a random variant with probability `epsilon`, otherwise exploit
    /// the fastest.
    EpsilonGreedy { epsilon: f64, seed: u64 },
    /// Like epsilon-greedy, but the exploration probability of round `t`
    /// is `epsilon / (1 + delta * t)`.
    EpsilonDecreasing { epsilon: f64, delta: f64, seed: u64 },
    /// Explore uniformly for `explore` tiles, then always exploit.
    EpsilonFirst { explore: u32, seed: u64 },
    /// Draw every tile's variant with weight `(fastest / runtime) ^ factor`.
    VwGreedy { factor: f64, seed: u64 },
}

impl SelectorKind {
    pub fn validate(&self) -> Result<()> {
        match *self {
            SelectorKind::EpsilonGreedy { epsilon, .. } => check_epsilon(epsilon),
            SelectorKind::EpsilonDecreasing { epsilon, delta, .. } => {
                check_epsilon(epsilon)?;
                check_non_negative("delta", delta)
            }
            SelectorKind::VwGreedy { factor, .. } => check_non_negative("factor", factor),
            SelectorKind::Fixed | SelectorKind::EpsilonFirst { .. } => Ok(()),
        }
    }
}

fn check_epsilon(epsilon: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&epsilon) {
        return Err(RqaError::InvalidConfig(format!(
            "epsilon must lie in [0, 1], got {epsilon}"
        )));
    }
    Ok(())
}

fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(RqaError::InvalidConfig(format!(
            "{name} must be finite and non-negative, got {value}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
struct VariantStats {
    tiles: u32,
    cells: u64,
    elapsed: Duration,
}

impl VariantStats {
    fn nanos_per_cell(&self) -> f64 {
        if self.cells == 0 {
            f64::INFINITY
        } else {
            self.elapsed.as_nanos() as f64 / self.cells as f64
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Rule {
    EpsilonGreedy { epsilon: f64 },
    EpsilonDecreasing { epsilon: f64, delta: f64 },
    EpsilonFirst { explore: u32 },
    VwGreedy { factor: f64 },
}

#[derive(Debug)]
enum Strategy {
    Fixed,
    Adaptive {
        rule: Rule,
        rng: ChaCha8Rng,
        stats: Vec<VariantStats>,
        /// Choices made after every candidate was tried once.
        rounds: u64,
    },
}

/// Chooses the variant for every tile of a run.
#[derive(Debug)]
pub struct VariantSelector {
    candidates: Vec<VariantFlags>,
    strategy: Strategy,
}

impl VariantSelector {
    pub fn new(flags: VariantFlags, kind: SelectorKind) -> Result<Self> {
        kind.validate()?;
        let (rule, seed) = match kind {
            SelectorKind::Fixed => {
                return Ok(Self {
                    candidates: vec![flags],
                    strategy: Strategy::Fixed,
                });
            }
            SelectorKind::EpsilonGreedy { epsilon, seed } => {
                (Rule::EpsilonGreedy { epsilon }, seed)
            }
            SelectorKind::EpsilonDecreasing {
                epsilon,
                delta,
                seed,
            } => (Rule::EpsilonDecreasing { epsilon, delta }, seed),
            SelectorKind::EpsilonFirst { explore, seed } => (Rule::EpsilonFirst { explore }, seed),
            SelectorKind::VwGreedy { factor, seed } => (Rule::VwGreedy { factor }, seed),
        };

        let mut candidates: Vec<_> = flags.equivalents().collect();
        // the configured variant is tried first
        candidates.retain(|v| *v != flags);
        candidates.insert(0, flags);
        let stats = vec![VariantStats::default(); candidates.len()];
        Ok(Self {
            candidates,
            strategy: Strategy::Adaptive {
                rule,
                rng: ChaCha8Rng::seed_from_u64(seed),
                stats,
                rounds: 0,
            },
        })
    }

    pub fn candidates(&self) -> &[VariantFlags] {
        &self.candidates
    }

    pub fn select(&mut self) -> VariantFlags {
        match &mut self.strategy {
            Strategy::Fixed => self.candidates[0],
            Strategy::Adaptive {
                rule,
                rng,
                stats,
                rounds,
            } => {
                if let Some(untried) = stats.iter().position(|s| s.tiles == 0) {
                    return self.candidates[untried];
                }
                let round = *rounds;
                *rounds += 1;
                let pick = match *rule {
                    Rule::EpsilonGreedy { epsilon } => explore_or_exploit(rng, epsilon, stats),
                    Rule::EpsilonDecreasing { epsilon, delta } => {
                        let epsilon = epsilon / (1.0 + delta * round as f64);
                        explore_or_exploit(rng, epsilon, stats)
                    }
                    Rule::EpsilonFirst { explore } => {
                        if round < u64::from(explore) {
                            rng.gen_range(0..stats.len())
                        } else {
                            fastest(stats)
                        }
                    }
                    Rule::VwGreedy { factor } => value_weighted(rng, factor, stats),
                };
                self.candidates[pick]
            }
        }
    }

    /// Feed back the measured runtimes of a tile of `cells` cells.
    pub fn report(&mut self, flags: VariantFlags, runtimes: &Runtimes, cells: usize) {
        if let Strategy::Adaptive { stats, .. } = &mut self.strategy {
            if let Some(i) = self.candidates.iter().position(|c| *c == flags) {
                let s = &mut stats[i];
                s.tiles += 1;
                s.cells += cells as u64;
                s.elapsed += runtimes.total();
            }
        }
    }
}

fn fastest(stats: &[VariantStats]) -> usize {
    stats
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.nanos_per_cell().total_cmp(&b.1.nanos_per_cell()))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn explore_or_exploit(rng: &mut ChaCha8Rng, epsilon: f64, stats: &[VariantStats]) -> usize {
    if rng.gen_bool(epsilon) {
        rng.gen_range(0..stats.len())
    } else {
        fastest(stats)
    }
}

/// Sample a variant with weight `(fastest / runtime) ^ factor`, runtimes
/// smoothed by one nanosecond per cell.
fn value_weighted(rng: &mut ChaCha8Rng, factor: f64, stats: &[VariantStats]) -> usize {
    let best = stats[fastest(stats)].nanos_per_cell() + 1.0;
    let weights: Vec<f64> = stats
        .iter()
        .map(|s| (best / (s.nanos_per_cell() + 1.0)).powf(factor))
        .collect();
    match WeightedIndex::new(&weights) {
        Ok(index) => index.sample(rng),
        Err(_) => fastest(stats),
    }
}
