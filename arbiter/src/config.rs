use std::time::Duration;

use nalgebra::Vector2;

use crate::error::ArbiterError;

/// Configuration surface of the arbitration service.
#[derive(Debug, Clone)]
pub struct ArbiterConfig {
    /// Radius in pixels invalidated around a selected picking point.
    pub invalidation_radius: i64,
    /// Known dead zone cleared on every request regardless of where picks
    /// happen (e.g. the edge of the picking box).
    pub fixed_invalidation_point: Vector2<i64>,
    /// Minimum success probability a candidate must reach to be selected.
    pub confidence_threshold: f64,
    /// Bound on the confidence-gated wait before `SelectionTimeout`.
    pub selection_timeout: Duration,
    /// Interval between polls of the store during the confidence-gated wait.
    pub poll_interval: Duration,
    /// Pause between replenishment-loop iterations.
    pub sample_interval: Duration,
}

impl Default for ArbiterConfig {
    fn default() -> ArbiterConfig {
        ArbiterConfig {
            invalidation_radius: 300,
            fixed_invalidation_point: Vector2::new(230, 230),
            confidence_threshold: 0.7,
            selection_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(10),
            sample_interval: Duration::from_millis(10),
        }
    }
}

impl ArbiterConfig {
    pub fn validate(&self) -> Result<(), ArbiterError> {
        if self.invalidation_radius <= 0 {
            return Err(ArbiterError::InvalidConfig(format!(
                "invalidation_radius must be positive, got {}",
                self.invalidation_radius
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ArbiterError::InvalidConfig(format!(
                "confidence_threshold must be in [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.selection_timeout.is_zero() || self.poll_interval.is_zero() {
            return Err(ArbiterError::InvalidConfig(
                "selection_timeout and poll_interval must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}
