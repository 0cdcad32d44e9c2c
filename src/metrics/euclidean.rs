use crate::core::similarity_measure::SimilarityMeasure;

/// Euclidean (L2) norm over the embedding dimension.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanMetric;

impl SimilarityMeasure for EuclideanMetric {
    const NAME: &'static str = "euclidean";

    #[inline(always)]
    fn distance(a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        a.iter()
            .zip(b)
            .map(|(x, y)| {
                let d = x - y;
                d * d
            })
            .sum::<f32>()
            .sqrt()
    }
}
