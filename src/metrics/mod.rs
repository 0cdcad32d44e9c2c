pub mod euclidean;
pub mod maximum;
pub mod taxicab;
