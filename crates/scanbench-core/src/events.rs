//! Domain event definitions for the scan engine.
//!
//! Events are recorded by the aggregate and published by whoever drained
//! them. They are cloneable and serializable for logging/replay.

use serde::{Deserialize, Serialize};

use crate::scan::{ScanConfig, ScanId};
use crate::units::{Measurement, Position};

/// Domain events emitted over a scan's lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// A scan transitioned from Pending to Running
    ScanStarted {
        /// The scan that started.
        scan_id: ScanId,
        /// The configuration it runs with.
        config: ScanConfig,
    },
    /// A point result was accepted by the aggregate
    ScanPointAcquired {
        /// The scan the point belongs to.
        scan_id: ScanId,
        /// Zero-based point index.
        index: usize,
        /// Stage position at acquisition.
        position: Position,
        /// The averaged sample.
        measurement: Measurement,
    },
    /// Acquisition was suspended
    ScanPaused {
        /// The paused scan.
        scan_id: ScanId,
        /// Number of points acquired so far.
        index: usize,
    },
    /// Acquisition resumed after a pause
    ScanResumed {
        /// The resumed scan.
        scan_id: ScanId,
        /// Number of points acquired so far.
        index: usize,
    },
    /// The scan was stopped on request
    ScanCancelled {
        /// The cancelled scan.
        scan_id: ScanId,
    },
    /// The scan acquired every expected point
    ScanCompleted {
        /// The completed scan.
        scan_id: ScanId,
        /// Total points acquired.
        total_points: usize,
    },
    /// The scan aborted on a fault
    ScanFailed {
        /// The failed scan.
        scan_id: ScanId,
        /// What went wrong.
        reason: String,
    },
}

impl ScanEvent {
    /// The kind used for subscription filtering
    pub fn kind(&self) -> ScanEventKind {
        match self {
            ScanEvent::ScanStarted { .. } => ScanEventKind::Started,
            ScanEvent::ScanPointAcquired { .. } => ScanEventKind::PointAcquired,
            ScanEvent::ScanPaused { .. } => ScanEventKind::Paused,
            ScanEvent::ScanResumed { .. } => ScanEventKind::Resumed,
            ScanEvent::ScanCancelled { .. } => ScanEventKind::Cancelled,
            ScanEvent::ScanCompleted { .. } => ScanEventKind::Completed,
            ScanEvent::ScanFailed { .. } => ScanEventKind::Failed,
        }
    }

    /// The scan this event belongs to
    pub fn scan_id(&self) -> ScanId {
        match self {
            ScanEvent::ScanStarted { scan_id, .. }
            | ScanEvent::ScanPointAcquired { scan_id, .. }
            | ScanEvent::ScanPaused { scan_id, .. }
            | ScanEvent::ScanResumed { scan_id, .. }
            | ScanEvent::ScanCancelled { scan_id }
            | ScanEvent::ScanCompleted { scan_id, .. }
            | ScanEvent::ScanFailed { scan_id, .. } => *scan_id,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            ScanEvent::ScanStarted { scan_id, .. } => format!("Scan {scan_id} started"),
            ScanEvent::ScanPointAcquired {
                scan_id,
                index,
                position,
                ..
            } => format!("Scan {scan_id} point {index} at {position}"),
            ScanEvent::ScanPaused { scan_id, index } => {
                format!("Scan {scan_id} paused after {index} points")
            }
            ScanEvent::ScanResumed { scan_id, index } => {
                format!("Scan {scan_id} resumed at {index} points")
            }
            ScanEvent::ScanCancelled { scan_id } => format!("Scan {scan_id} cancelled"),
            ScanEvent::ScanCompleted {
                scan_id,
                total_points,
            } => format!("Scan {scan_id} completed with {total_points} points"),
            ScanEvent::ScanFailed { scan_id, reason } => {
                format!("Scan {scan_id} failed: {reason}")
            }
        }
    }
}

/// Event kind for subscription filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanEventKind {
    /// Scan started.
    Started,
    /// Point acquired.
    PointAcquired,
    /// Scan paused.
    Paused,
    /// Scan resumed.
    Resumed,
    /// Scan cancelled.
    Cancelled,
    /// Scan completed.
    Completed,
    /// Scan failed.
    Failed,
}

impl ScanEventKind {
    /// Every kind, in lifecycle order
    pub fn all() -> [ScanEventKind; 7] {
        [
            ScanEventKind::Started,
            ScanEventKind::PointAcquired,
            ScanEventKind::Paused,
            ScanEventKind::Resumed,
            ScanEventKind::Cancelled,
            ScanEventKind::Completed,
            ScanEventKind::Failed,
        ]
    }

    /// Kinds that end a scan's lifecycle
    pub fn terminal() -> [ScanEventKind; 3] {
        [
            ScanEventKind::Cancelled,
            ScanEventKind::Completed,
            ScanEventKind::Failed,
        ]
    }
}

impl std::fmt::Display for ScanEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanEventKind::Started => write!(f, "Started"),
            ScanEventKind::PointAcquired => write!(f, "PointAcquired"),
            ScanEventKind::Paused => write!(f, "Paused"),
            ScanEventKind::Resumed => write!(f, "Resumed"),
            ScanEventKind::Cancelled => write!(f, "Cancelled"),
            ScanEventKind::Completed => write!(f, "Completed"),
            ScanEventKind::Failed => write!(f, "Failed"),
        }
    }
}
