//! Measured acquisition-rate capability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default confidence used when deriving a guaranteed rate.
pub const DEFAULT_CONFIDENCE_SIGMA: f64 = 3.0;

/// Measurements older than this should be redone.
pub const MAX_MEASUREMENT_AGE_SECONDS: f64 = 300.0;

/// Measured acquisition-rate capability of the bench
///
/// This is a measurement result, not a configuration: fly scans are planned
/// against what the hardware was observed to do, never against a wish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionRateCapability {
    /// Mean acquisition rate observed (Hz).
    pub measured_rate_hz: f64,
    /// Standard deviation of the observed rate (Hz).
    pub measured_std_dev_hz: f64,
    /// When the measurement was taken.
    pub measured_at: DateTime<Utc>,
    /// How long the measurement ran (seconds).
    pub measurement_duration_s: f64,
    /// Number of samples the statistics are based on.
    pub sample_count: usize,
}

impl AcquisitionRateCapability {
    /// Create a capability measurement, rejecting degenerate statistics
    pub fn new(
        measured_rate_hz: f64,
        measured_std_dev_hz: f64,
        measured_at: DateTime<Utc>,
        measurement_duration_s: f64,
        sample_count: usize,
    ) -> Result<Self, ValidationError> {
        let mut errors = Vec::new();
        if measured_rate_hz <= 0.0 {
            errors.push(format!("measured rate must be positive, got {measured_rate_hz}"));
        }
        if measured_std_dev_hz < 0.0 {
            errors.push(format!(
                "standard deviation must be non-negative, got {measured_std_dev_hz}"
            ));
        }
        if measurement_duration_s <= 0.0 {
            errors.push(format!(
                "measurement duration must be positive, got {measurement_duration_s}"
            ));
        }
        if sample_count < 10 {
            errors.push(format!(
                "rate measurement requires at least 10 samples, got {sample_count}"
            ));
        }
        if !errors.is_empty() {
            return Err(ValidationError::new(errors));
        }
        Ok(Self {
            measured_rate_hz,
            measured_std_dev_hz,
            measured_at,
            measurement_duration_s,
            sample_count,
        })
    }

    /// Coefficient of variation of the rate, as a percentage
    pub fn coefficient_of_variation(&self) -> f64 {
        (self.measured_std_dev_hz / self.measured_rate_hz) * 100.0
    }

    /// Whether the rate is stable enough for position prediction
    pub fn is_stable(&self, max_cv_percent: f64) -> bool {
        self.coefficient_of_variation() <= max_cv_percent
    }

    /// Conservative rate: mean minus `sigma` standard deviations, floored at 0
    pub fn minimum_guaranteed_rate_hz(&self, sigma: f64) -> f64 {
        (self.measured_rate_hz - sigma * self.measured_std_dev_hz).max(0.0)
    }

    /// Worst-case spacing between samples at a given motion speed (mm)
    ///
    /// Infinite when no rate can be guaranteed at the given confidence.
    pub fn max_spacing_for_speed(&self, speed_mm_s: f64, sigma: f64) -> f64 {
        let min_rate = self.minimum_guaranteed_rate_hz(sigma);
        if min_rate <= 0.0 {
            return f64::INFINITY;
        }
        speed_mm_s / min_rate
    }

    /// Whether the measurement is fresh enough to plan against
    pub fn is_recent(&self, max_age_seconds: f64) -> bool {
        let age = (Utc::now() - self.measured_at).num_milliseconds() as f64 / 1000.0;
        age <= max_age_seconds
    }
}

impl std::fmt::Display for AcquisitionRateCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.1}±{:.1} Hz (CV={:.2}%, {} samples over {:.1}s)",
            self.measured_rate_hz,
            self.measured_std_dev_hz,
            self.coefficient_of_variation(),
            self.sample_count,
            self.measurement_duration_s
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capability(rate: f64, std_dev: f64) -> AcquisitionRateCapability {
        AcquisitionRateCapability::new(rate, std_dev, Utc::now(), 10.0, 500).unwrap()
    }

    #[test]
    fn rejects_degenerate_measurements() {
        assert!(AcquisitionRateCapability::new(0.0, 1.0, Utc::now(), 10.0, 500).is_err());
        assert!(AcquisitionRateCapability::new(50.0, -1.0, Utc::now(), 10.0, 500).is_err());
        assert!(AcquisitionRateCapability::new(50.0, 1.0, Utc::now(), 10.0, 5).is_err());
    }

    #[test]
    fn guaranteed_rate_floors_at_zero() {
        let c = capability(10.0, 5.0);
        assert_eq!(c.minimum_guaranteed_rate_hz(3.0), 0.0);
        let c = capability(50.0, 1.0);
        assert!((c.minimum_guaranteed_rate_hz(3.0) - 47.0).abs() < 1e-9);
    }

    #[test]
    fn spacing_is_infinite_without_guarantee() {
        let c = capability(10.0, 5.0);
        assert!(c.max_spacing_for_speed(10.0, 3.0).is_infinite());
        let c = capability(50.0, 1.0);
        assert!((c.max_spacing_for_speed(9.4, 3.0) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn stability_threshold() {
        assert!(capability(50.0, 1.0).is_stable(5.0));
        assert!(!capability(50.0, 5.0).is_stable(5.0));
    }
}
