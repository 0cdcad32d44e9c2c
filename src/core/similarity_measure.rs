/// Trait for the norms used to compare embedded vectors.
///
/// Designed for static polymorphism: kernels are generic over
/// `M: SimilarityMeasure`, so the per-cell distance is monomorphized and
/// inlined into the tile loop.
pub trait SimilarityMeasure: Clone + Send + Sync + 'static {
    /// Short identifier used in logs and result metadata.
    const NAME: &'static str;

    /// Distance between two embedded vectors of equal length.
    fn distance(a: &[f32], b: &[f32]) -> f32;
}
