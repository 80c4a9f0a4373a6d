//! Request and status DTOs for the service layer.

use serde::{Deserialize, Serialize};

use scanbench_core::{
    ScanId, ScanKind, ScanPattern, ScanStatus, ScanZone, StepScanConfig, ValidationError,
};

/// Flat step scan request, as a front end would submit it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Lower X bound of the scan zone (mm).
    pub x_min: f64,
    /// Upper X bound of the scan zone (mm).
    pub x_max: f64,
    /// Lower Y bound of the scan zone (mm).
    pub y_min: f64,
    /// Upper Y bound of the scan zone (mm).
    pub y_max: f64,
    /// Grid points along X.
    pub x_nb_points: usize,
    /// Grid points along Y.
    pub y_nb_points: usize,
    /// Visiting order.
    pub pattern: ScanPattern,
    /// Settle time after each move (ms).
    pub stabilization_delay_ms: u64,
    /// Samples averaged into each point.
    pub averaging_per_position: usize,
}

impl TryFrom<ScanRequest> for StepScanConfig {
    type Error = ValidationError;

    fn try_from(request: ScanRequest) -> Result<Self, Self::Error> {
        let config = StepScanConfig {
            zone: ScanZone::new(request.x_min, request.x_max, request.y_min, request.y_max)?,
            x_nb_points: request.x_nb_points,
            y_nb_points: request.y_nb_points,
            pattern: request.pattern,
            stabilization_delay_ms: request.stabilization_delay_ms,
            averaging_per_position: request.averaging_per_position,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Point-in-time view of a scan, projected from observed events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanStatusReport {
    /// The scan being reported on.
    pub scan_id: ScanId,
    /// Step or fly.
    pub kind: ScanKind,
    /// Current lifecycle status.
    pub status: ScanStatus,
    /// Points acquired so far.
    pub points_acquired: usize,
    /// Points the scan is expected to acquire.
    pub expected_points: usize,
}

impl ScanStatusReport {
    /// Completion as a percentage, clamped to \[0, 100\]
    pub fn progress_percent(&self) -> f64 {
        if self.expected_points == 0 {
            return 0.0;
        }
        (self.points_acquired as f64 / self.expected_points as f64 * 100.0).min(100.0)
    }

    pub fn is_running(&self) -> bool {
        self.status == ScanStatus::Running
    }

    pub fn is_paused(&self) -> bool {
        self.status == ScanStatus::Paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ScanRequest {
        ScanRequest {
            x_min: 0.0,
            x_max: 10.0,
            y_min: 0.0,
            y_max: 10.0,
            x_nb_points: 3,
            y_nb_points: 3,
            pattern: ScanPattern::Serpentine,
            stabilization_delay_ms: 50,
            averaging_per_position: 2,
        }
    }

    #[test]
    fn request_converts_to_config() {
        let config = StepScanConfig::try_from(request()).unwrap();
        assert_eq!(config.total_points(), 9);
        assert_eq!(config.zone.width(), 10.0);
    }

    #[test]
    fn inverted_zone_rejected() {
        let mut bad = request();
        bad.x_min = 20.0;
        assert!(StepScanConfig::try_from(bad).is_err());
    }

    #[test]
    fn progress_clamps_and_handles_unknown_expected() {
        let mut report = ScanStatusReport {
            scan_id: ScanId::new(),
            kind: ScanKind::Fly,
            status: ScanStatus::Running,
            points_acquired: 150,
            expected_points: 0,
        };
        assert_eq!(report.progress_percent(), 0.0);
        report.expected_points = 100;
        assert_eq!(report.progress_percent(), 100.0);
        report.points_acquired = 25;
        assert_eq!(report.progress_percent(), 25.0);
    }
}
