use crate::core::similarity_measure::SimilarityMeasure;

/// Supremum (L-infinity) norm: largest absolute component difference.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaximumMetric;

impl SimilarityMeasure for MaximumMetric {
    const NAME: &'static str = "maximum";

    #[inline(always)]
    fn distance(a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        a.iter()
            .zip(b)
            .fold(0.0_f32, |acc, (x, y)| acc.max((x - y).abs()))
    }
}
