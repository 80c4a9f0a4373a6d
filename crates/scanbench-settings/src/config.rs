//! Bench configuration sections.
//!
//! Settings are organized into logical sections:
//! - Motion (velocity profiles and the segment-length threshold)
//! - Acquisition (channel count, stabilization, averaging defaults)
//! - Scan defaults (zone and grid a front end starts from)

use serde::{Deserialize, Serialize};

use scanbench_core::{MotionProfile, ProfileSelector, ScanPattern};

use crate::error::{SettingsError, SettingsResult};

/// Motion stage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionSettings {
    /// Profile for short hops between adjacent grid points.
    pub fine_profile: MotionProfile,
    /// Profile for long repositioning moves.
    pub coarse_profile: MotionProfile,
    /// Segment length above which the coarse profile is used (mm).
    pub coarse_threshold_mm: f64,
}

impl Default for MotionSettings {
    fn default() -> Self {
        let selector = ProfileSelector::default();
        Self {
            fine_profile: selector.fine,
            coarse_profile: selector.coarse,
            coarse_threshold_mm: selector.threshold_mm,
        }
    }
}

impl MotionSettings {
    /// The selector the trajectory builder consumes
    pub fn selector(&self) -> ProfileSelector {
        ProfileSelector {
            fine: self.fine_profile,
            coarse: self.coarse_profile,
            threshold_mm: self.coarse_threshold_mm,
        }
    }
}

/// Acquisition chain settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionSettings {
    /// Number of channels the chain delivers.
    pub channel_count: usize,
    /// Default settle time after each step move (ms).
    pub stabilization_delay_ms: u64,
    /// Default samples averaged per step point.
    pub averaging_per_position: usize,
    /// Default desired fly scan rate (Hz).
    pub desired_rate_hz: f64,
    /// Default acceptable spatial gap between fly samples (mm).
    pub max_spatial_gap_mm: f64,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            channel_count: 3,
            stabilization_delay_ms: 100,
            averaging_per_position: 4,
            desired_rate_hz: 40.0,
            max_spatial_gap_mm: 0.5,
        }
    }
}

/// Scan grid defaults a front end starts from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanDefaults {
    /// Lower X bound of the default zone (mm).
    pub x_min: f64,
    /// Upper X bound of the default zone (mm).
    pub x_max: f64,
    /// Lower Y bound of the default zone (mm).
    pub y_min: f64,
    /// Upper Y bound of the default zone (mm).
    pub y_max: f64,
    /// Default grid points along X.
    pub x_nb_points: usize,
    /// Default grid points along Y.
    pub y_nb_points: usize,
    /// Default visiting order.
    pub pattern: ScanPattern,
}

impl Default for ScanDefaults {
    fn default() -> Self {
        Self {
            x_min: 0.0,
            x_max: 100.0,
            y_min: 0.0,
            y_max: 100.0,
            x_nb_points: 11,
            y_nb_points: 11,
            pattern: ScanPattern::Serpentine,
        }
    }
}

/// Complete bench configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchSettings {
    /// Motion stage settings.
    pub motion: MotionSettings,
    /// Acquisition chain settings.
    pub acquisition: AcquisitionSettings,
    /// Scan grid defaults.
    pub scan: ScanDefaults,
}

impl BenchSettings {
    /// Check every section for out-of-range values
    pub fn validate(&self) -> SettingsResult<()> {
        if self.motion.coarse_threshold_mm < 0.0 {
            return Err(SettingsError::InvalidSetting {
                key: "motion.coarse_threshold_mm".to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
        if self.acquisition.channel_count == 0 {
            return Err(SettingsError::InvalidSetting {
                key: "acquisition.channel_count".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.acquisition.averaging_per_position == 0 {
            return Err(SettingsError::InvalidSetting {
                key: "acquisition.averaging_per_position".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.acquisition.desired_rate_hz <= 0.0 {
            return Err(SettingsError::InvalidSetting {
                key: "acquisition.desired_rate_hz".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.acquisition.max_spatial_gap_mm <= 0.0 {
            return Err(SettingsError::InvalidSetting {
                key: "acquisition.max_spatial_gap_mm".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.scan.x_min > self.scan.x_max || self.scan.y_min > self.scan.y_max {
            return Err(SettingsError::InvalidSetting {
                key: "scan".to_string(),
                reason: "zone bounds are inverted".to_string(),
            });
        }
        if self.scan.x_nb_points == 0 || self.scan.y_nb_points == 0 {
            return Err(SettingsError::InvalidSetting {
                key: "scan".to_string(),
                reason: "grid needs at least one point per axis".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(BenchSettings::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_channels() {
        let mut settings = BenchSettings::default();
        settings.acquisition.channel_count = 0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidSetting { key, .. }) if key.contains("channel_count")
        ));
    }

    #[test]
    fn rejects_inverted_default_zone() {
        let mut settings = BenchSettings::default();
        settings.scan.x_min = 200.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn selector_round_trips_profiles() {
        let settings = MotionSettings::default();
        let selector = settings.selector();
        assert_eq!(selector.fine, settings.fine_profile);
        assert_eq!(selector.threshold_mm, settings.coarse_threshold_mm);
    }
}
