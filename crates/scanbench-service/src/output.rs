//! Output boundary: how scan lifecycle notifications leave the service.
//!
//! Front ends implement [`ScanOutputBoundary`]; the service forwards bus
//! events to it through a per-scan subscription. Notifications are
//! kind-tagged so one boundary serves both scan variants.

use serde::{Deserialize, Serialize};

use scanbench_core::{Position, ScanId, ScanKind};

/// A scan began acquiring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartedNotice {
    pub scan_id: ScanId,
    pub kind: ScanKind,
    /// Expected point count (0 when not yet known).
    pub expected_points: usize,
}

/// One point landed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressNotice {
    pub scan_id: ScanId,
    pub kind: ScanKind,
    /// Zero-based index of the point.
    pub point_index: usize,
    /// Stage position at acquisition.
    pub position: Position,
    /// Averaged channel values.
    pub channels: Vec<f64>,
    /// Expected point count (0 when not yet known).
    pub expected_points: usize,
}

/// Acquisition suspended or resumed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseNotice {
    pub scan_id: ScanId,
    pub kind: ScanKind,
    /// Points acquired at that moment.
    pub points_acquired: usize,
}

/// A scan reached a terminal state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeNotice {
    pub scan_id: ScanId,
    pub kind: ScanKind,
    /// Points acquired over the scan's lifetime.
    pub points_acquired: usize,
    /// Failure reason, for failed scans only.
    pub reason: Option<String>,
}

/// Presentation seam for scan lifecycle notifications
///
/// Called on the thread that published the underlying event, so
/// implementations should hand off quickly.
pub trait ScanOutputBoundary: Send + Sync {
    fn scan_started(&self, notice: StartedNotice);
    fn scan_progress(&self, notice: ProgressNotice);
    fn scan_paused(&self, notice: PauseNotice);
    fn scan_resumed(&self, notice: PauseNotice);
    fn scan_completed(&self, notice: OutcomeNotice);
    fn scan_cancelled(&self, notice: OutcomeNotice);
    fn scan_failed(&self, notice: OutcomeNotice);
}

/// Boundary that narrates scan progress through `tracing`
///
/// Used by the demo binary; real front ends supply their own.
#[derive(Debug, Default)]
pub struct LoggingOutputBoundary;

impl ScanOutputBoundary for LoggingOutputBoundary {
    fn scan_started(&self, notice: StartedNotice) {
        tracing::info!(
            scan_id = %notice.scan_id,
            kind = %notice.kind,
            expected_points = notice.expected_points,
            "Scan started"
        );
    }

    fn scan_progress(&self, notice: ProgressNotice) {
        tracing::info!(
            scan_id = %notice.scan_id,
            point = notice.point_index,
            position = %notice.position,
            expected = notice.expected_points,
            "Point acquired"
        );
    }

    fn scan_paused(&self, notice: PauseNotice) {
        tracing::info!(
            scan_id = %notice.scan_id,
            points = notice.points_acquired,
            "Scan paused"
        );
    }

    fn scan_resumed(&self, notice: PauseNotice) {
        tracing::info!(
            scan_id = %notice.scan_id,
            points = notice.points_acquired,
            "Scan resumed"
        );
    }

    fn scan_completed(&self, notice: OutcomeNotice) {
        tracing::info!(
            scan_id = %notice.scan_id,
            kind = %notice.kind,
            points = notice.points_acquired,
            "Scan completed"
        );
    }

    fn scan_cancelled(&self, notice: OutcomeNotice) {
        tracing::info!(
            scan_id = %notice.scan_id,
            points = notice.points_acquired,
            "Scan cancelled"
        );
    }

    fn scan_failed(&self, notice: OutcomeNotice) {
        tracing::error!(
            scan_id = %notice.scan_id,
            points = notice.points_acquired,
            reason = notice.reason.as_deref().unwrap_or("unknown"),
            "Scan failed"
        );
    }
}
