use crate::core::similarity_measure::SimilarityMeasure;

/// Taxicab (L1) norm: sum of absolute component differences.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaxicabMetric;

impl SimilarityMeasure for TaxicabMetric {
    const NAME: &'static str = "taxicab";

    #[inline(always)]
    fn distance(a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
    }
}
