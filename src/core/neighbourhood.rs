use serde::{Deserialize, Serialize};

use crate::error::{Result, RqaError};

/// Condition under which two embedded vectors count as neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighbourhoodCondition {
    /// Recurrent when `distance <= radius`.
    FixedRadius(f32),
    /// Recurrent when `min <= distance < max`.
    RadiusCorridor { min: f32, max: f32 },
}

impl NeighbourhoodCondition {
    pub fn validate(&self) -> Result<()> {
        match *self {
            NeighbourhoodCondition::FixedRadius(r) => {
                if !r.is_finite() || r < 0.0 {
                    return Err(RqaError::InvalidNeighbourhoodCondition(format!(
                        "fixed radius must be finite and non-negative, got {r}"
                    )));
                }
            }
            NeighbourhoodCondition::RadiusCorridor { min, max } => {
                if !min.is_finite() || !max.is_finite() || min < 0.0 {
                    return Err(RqaError::InvalidNeighbourhoodCondition(format!(
                        "radius corridor bounds must be finite and non-negative, got [{min}, {max})"
                    )));
                }
                if min >= max {
                    return Err(RqaError::InvalidNeighbourhoodCondition(format!(
                        "radius corridor requires min < max, got [{min}, {max})"
                    )));
                }
            }
        }
        Ok(())
    }

    #[inline(always)]
    pub fn contains(&self, distance: f32) -> bool {
        match *self {
            NeighbourhoodCondition::FixedRadius(r) => distance <= r,
            NeighbourhoodCondition::RadiusCorridor { min, max } => {
                distance >= min && distance < max
            }
        }
    }
}

impl Default for NeighbourhoodCondition {
    fn default() -> Self {
        NeighbourhoodCondition::FixedRadius(1.0)
    }
}
