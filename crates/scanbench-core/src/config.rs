//! Scan configuration value objects.
//!
//! Configurations are validated before a scan is created; a configuration
//! that fails validation never reaches an executor.

use serde::{Deserialize, Serialize};

use crate::capability::{AcquisitionRateCapability, DEFAULT_CONFIDENCE_SIGMA, MAX_MEASUREMENT_AGE_SECONDS};
use crate::error::ValidationError;
use crate::motion::MotionProfile;
use crate::units::Position;

/// Rectangular scan area in bench coordinates (mm)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanZone {
    /// Lower X bound.
    pub x_min: f64,
    /// Upper X bound.
    pub x_max: f64,
    /// Lower Y bound.
    pub y_min: f64,
    /// Upper Y bound.
    pub y_max: f64,
}

impl ScanZone {
    /// Create a zone, rejecting inverted or non-finite bounds
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Result<Self, ValidationError> {
        let zone = Self {
            x_min,
            x_max,
            y_min,
            y_max,
        };
        zone.validate()?;
        Ok(zone)
    }

    /// Check the zone's bounds
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();
        if ![self.x_min, self.x_max, self.y_min, self.y_max]
            .iter()
            .all(|v| v.is_finite())
        {
            errors.push("zone bounds must be finite".to_string());
        }
        if self.x_min > self.x_max {
            errors.push(format!(
                "invalid X range: x_min ({}) > x_max ({})",
                self.x_min, self.x_max
            ));
        }
        if self.y_min > self.y_max {
            errors.push(format!(
                "invalid Y range: y_min ({}) > y_max ({})",
                self.y_min, self.y_max
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(errors))
        }
    }

    /// Zone width in mm
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Zone height in mm
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Corner where every trajectory starts
    pub fn origin(&self) -> Position {
        Position::new(self.x_min, self.y_min)
    }

    /// Whether a position lies inside the zone (boundary included)
    pub fn contains(&self, p: &Position) -> bool {
        p.x >= self.x_min && p.x <= self.x_max && p.y >= self.y_min && p.y <= self.y_max
    }
}

/// Order in which grid points are visited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanPattern {
    /// Row by row, odd rows reversed. Minimizes travel.
    Serpentine,
    /// Row by row, every row left to right.
    Raster,
    /// Column by column, every column bottom to top.
    Comb,
}

impl std::fmt::Display for ScanPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanPattern::Serpentine => write!(f, "Serpentine"),
            ScanPattern::Raster => write!(f, "Raster"),
            ScanPattern::Comb => write!(f, "Comb"),
        }
    }
}

/// Configuration for a step scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepScanConfig {
    /// Area to cover.
    pub zone: ScanZone,
    /// Grid points along X.
    pub x_nb_points: usize,
    /// Grid points along Y.
    pub y_nb_points: usize,
    /// Visiting order.
    pub pattern: ScanPattern,
    /// Settle time after each move, before acquiring.
    pub stabilization_delay_ms: u64,
    /// Samples averaged into each point result.
    pub averaging_per_position: usize,
}

impl StepScanConfig {
    /// Check every constraint, collecting all violations
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();
        if let Err(e) = self.zone.validate() {
            errors.extend(e.errors);
        }
        if self.x_nb_points < 1 {
            errors.push(format!("x_nb_points must be >= 1, got {}", self.x_nb_points));
        }
        if self.y_nb_points < 1 {
            errors.push(format!("y_nb_points must be >= 1, got {}", self.y_nb_points));
        }
        if self.averaging_per_position < 1 {
            errors.push(format!(
                "averaging_per_position must be >= 1, got {}",
                self.averaging_per_position
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(errors))
        }
    }

    /// Number of grid points the scan will visit
    pub fn total_points(&self) -> usize {
        self.x_nb_points * self.y_nb_points
    }

    /// Rough duration estimate ignoring travel time (seconds)
    pub fn estimated_duration_seconds(&self) -> f64 {
        let per_point =
            self.stabilization_delay_ms as f64 / 1000.0 + self.averaging_per_position as f64 * 0.1;
        self.total_points() as f64 * per_point
    }
}

/// Configuration for a fly scan
///
/// The desired acquisition rate is a wish; it must be validated against a
/// measured [`AcquisitionRateCapability`] before the scan runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlyScanConfig {
    /// Area to cover.
    pub zone: ScanZone,
    /// Grid points along X (defines row endpoints).
    pub x_nb_points: usize,
    /// Grid rows along Y.
    pub y_nb_points: usize,
    /// Visiting order.
    pub pattern: ScanPattern,
    /// Velocity profile for every trajectory segment.
    pub motion_profile: MotionProfile,
    /// Requested sampling rate (Hz).
    pub desired_rate_hz: f64,
    /// Largest acceptable distance between consecutive samples (mm).
    pub max_spatial_gap_mm: f64,
}

impl FlyScanConfig {
    /// Check the hardware-independent constraints
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();
        if let Err(e) = self.zone.validate() {
            errors.extend(e.errors);
        }
        if self.x_nb_points < 2 {
            errors.push(format!("x_nb_points must be >= 2, got {}", self.x_nb_points));
        }
        if self.y_nb_points < 1 {
            errors.push(format!("y_nb_points must be >= 1, got {}", self.y_nb_points));
        }
        if self.desired_rate_hz <= 0.0 {
            errors.push(format!(
                "desired acquisition rate must be positive, got {}",
                self.desired_rate_hz
            ));
        }
        if self.max_spatial_gap_mm <= 0.0 {
            errors.push(format!(
                "max_spatial_gap_mm must be positive, got {}",
                self.max_spatial_gap_mm
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(errors))
        }
    }

    /// Minimum sampling rate that keeps the spatial gap within bounds
    ///
    /// Hard constraint: gap = speed / rate at cruise speed, so the rate must
    /// be at least cruise speed over the acceptable gap.
    pub fn required_minimum_rate_hz(&self) -> f64 {
        self.motion_profile.target_speed / self.max_spatial_gap_mm
    }

    /// Validate this configuration against a measured capability
    ///
    /// Soft findings (stale or unstable measurement, predicted gap above the
    /// target) are logged as warnings; only hard infeasibility is an error.
    pub fn validate_with_capability(
        &self,
        capability: &AcquisitionRateCapability,
    ) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        if !capability.is_recent(MAX_MEASUREMENT_AGE_SECONDS) {
            tracing::warn!(
                capability = %capability,
                "Acquisition capability measurement is stale, consider re-measuring"
            );
        }

        if !capability.is_stable(5.0) {
            tracing::warn!(
                cv_percent = capability.coefficient_of_variation(),
                "Acquisition rate is unstable, fly scan position accuracy may be degraded"
            );
        }

        let required = self.required_minimum_rate_hz();
        let guaranteed = capability.minimum_guaranteed_rate_hz(DEFAULT_CONFIDENCE_SIGMA);
        if guaranteed < required {
            errors.push(format!(
                "hardware cannot sustain required acquisition rate: required {:.1} Hz \
                 (gap {}mm at {}mm/s), guaranteed {:.1} Hz; reduce motion speed or \
                 increase max_spatial_gap_mm",
                required, self.max_spatial_gap_mm, self.motion_profile.target_speed, guaranteed
            ));
        }

        if self.desired_rate_hz > capability.measured_rate_hz {
            errors.push(format!(
                "desired acquisition rate ({:.1} Hz) exceeds measured capability ({:.1} Hz)",
                self.desired_rate_hz, capability.measured_rate_hz
            ));
        }

        let worst_spacing = capability
            .max_spacing_for_speed(self.motion_profile.target_speed, DEFAULT_CONFIDENCE_SIGMA);
        if worst_spacing > self.max_spatial_gap_mm {
            tracing::warn!(
                worst_spacing_mm = worst_spacing,
                max_spatial_gap_mm = self.max_spatial_gap_mm,
                "Worst-case sample spacing may exceed the configured gap"
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(errors))
        }
    }

    /// Number of discrete grid points (row endpoints, not samples)
    pub fn total_grid_points(&self) -> usize {
        self.x_nb_points * self.y_nb_points
    }

    /// Expected number of samples at the measured rate
    ///
    /// Uses the measured capability, never the desired rate: travel the
    /// serpentine path length at the profile's average speed and count sample
    /// periods.
    pub fn estimate_total_points(&self, capability: &AcquisitionRateCapability) -> usize {
        let rows = self.y_nb_points as f64;
        let total_distance = self.zone.width() * rows + self.zone.height() * (rows - 1.0).max(0.0);
        let avg_speed = (self.motion_profile.min_speed + self.motion_profile.target_speed) / 2.0;
        if avg_speed <= 0.0 {
            return 0;
        }
        let duration = total_distance / avg_speed;
        (duration * capability.measured_rate_hz) as usize
    }
}
