//! The scan aggregate.
//!
//! A `Scan` owns the lifecycle state machine, the acquired points and the
//! pending domain events. All cross-thread access goes through a single
//! mutex ([`SharedScan`]); the aggregate itself is a plain state machine
//! with no locking of its own.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{FlyScanConfig, StepScanConfig};
use crate::error::ScanError;
use crate::events::ScanEvent;
use crate::motion::AtomicMotion;
use crate::status::ScanStatus;
use crate::units::ScanPointResult;

/// Stable identity of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanId(Uuid);

impl ScanId {
    /// Create a new unique scan ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Scan({})", &self.0.to_string()[..8])
    }
}

/// The two acquisition strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanKind {
    /// Move, settle, acquire at each grid point.
    Step,
    /// Acquire continuously while the stage moves.
    Fly,
}

impl std::fmt::Display for ScanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanKind::Step => write!(f, "Step"),
            ScanKind::Fly => write!(f, "Fly"),
        }
    }
}

/// Configuration carried by the aggregate, one variant per kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScanConfig {
    /// Step scan parameters.
    Step(StepScanConfig),
    /// Fly scan parameters.
    Fly(FlyScanConfig),
}

impl ScanConfig {
    /// The kind this configuration belongs to
    pub fn kind(&self) -> ScanKind {
        match self {
            ScanConfig::Step(_) => ScanKind::Step,
            ScanConfig::Fly(_) => ScanKind::Fly,
        }
    }
}

/// Outcome of appending a point result
///
/// The completion race (a worker appending after a concurrent cancel) is an
/// expected outcome, not an error: the caller inspects the value and stops
/// quietly on `RejectedTerminal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointAppend {
    /// The point was recorded.
    Accepted,
    /// The scan had already reached a terminal state; the point was dropped.
    RejectedTerminal,
}

/// A scan aggregate
///
/// Terminal states are immutable: once a scan is Cancelled, Completed or
/// Failed, every further mutation is rejected (or, for point appends,
/// reported as `RejectedTerminal`).
#[derive(Debug)]
pub struct Scan {
    id: ScanId,
    kind: ScanKind,
    config: ScanConfig,
    status: ScanStatus,
    motions: Vec<AtomicMotion>,
    points: Vec<ScanPointResult>,
    expected_points: usize,
    measured_rate_hz: Option<f64>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    pending_events: VecDeque<ScanEvent>,
}

/// A scan behind the single mutex that serializes all cross-thread access
pub type SharedScan = Arc<Mutex<Scan>>;

impl Scan {
    /// Create a pending step scan
    pub fn step(config: StepScanConfig) -> Self {
        Self::new(ScanKind::Step, ScanConfig::Step(config), None)
    }

    /// Create a pending fly scan planned against a measured rate
    pub fn fly(config: FlyScanConfig, measured_rate_hz: f64) -> Self {
        Self::new(
            ScanKind::Fly,
            ScanConfig::Fly(config),
            Some(measured_rate_hz),
        )
    }

    fn new(kind: ScanKind, config: ScanConfig, measured_rate_hz: Option<f64>) -> Self {
        Self {
            id: ScanId::new(),
            kind,
            config,
            status: ScanStatus::Pending,
            motions: Vec::new(),
            points: Vec::new(),
            expected_points: 0,
            measured_rate_hz,
            started_at: None,
            ended_at: None,
            pending_events: VecDeque::new(),
        }
    }

    /// Wrap this scan for cross-thread sharing
    pub fn into_shared(self) -> SharedScan {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> ScanId {
        self.id
    }

    pub fn kind(&self) -> ScanKind {
        self.kind
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn status(&self) -> ScanStatus {
        self.status
    }

    pub fn motions(&self) -> &[AtomicMotion] {
        &self.motions
    }

    pub fn points(&self) -> &[ScanPointResult] {
        &self.points
    }

    /// Number of points acquired so far
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Number of points the scan is expected to acquire (0 if not yet known)
    pub fn expected_points(&self) -> usize {
        self.expected_points
    }

    /// The measured acquisition rate a fly scan was planned against
    pub fn measured_rate_hz(&self) -> Option<f64> {
        self.measured_rate_hz
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    fn queue(&mut self, event: ScanEvent) {
        self.pending_events.push_back(event);
    }

    /// Drain pending domain events in the order they were recorded
    ///
    /// Callers publish the drained events before releasing the scan mutex,
    /// so the order on the bus matches the order the aggregate recorded and
    /// no point event can trail a terminal event published by another
    /// thread.
    pub fn take_events(&mut self) -> Vec<ScanEvent> {
        self.pending_events.drain(..).collect()
    }

    /// Transition Pending → Running
    ///
    /// Step scans derive their expected point count from the grid; fly scans
    /// wait for [`Scan::set_expected_points`].
    pub fn start(&mut self) -> Result<(), ScanError> {
        if self.status != ScanStatus::Pending {
            return Err(ScanError::InvalidStateTransition {
                current: self.status,
                attempted: "start",
            });
        }
        if let ScanConfig::Step(config) = &self.config {
            self.expected_points = config.total_points();
        }
        self.status = ScanStatus::Running;
        self.started_at = Some(Utc::now());
        self.queue(ScanEvent::ScanStarted {
            scan_id: self.id,
            config: self.config.clone(),
        });
        Ok(())
    }

    /// Attach the trajectory motions, pre-run only
    pub fn add_motions(&mut self, motions: Vec<AtomicMotion>) -> Result<(), ScanError> {
        if self.status != ScanStatus::Pending {
            return Err(ScanError::InvalidStateTransition {
                current: self.status,
                attempted: "add motions",
            });
        }
        self.motions.extend(motions);
        Ok(())
    }

    /// Fix the expected point count of a fly scan
    ///
    /// Must happen exactly once, before the first point arrives; step scans
    /// derive theirs at start and reject this call.
    pub fn set_expected_points(&mut self, expected: usize) -> Result<(), ScanError> {
        if self.kind != ScanKind::Fly {
            return Err(ScanError::KindMismatch {
                attempted: "set expected points",
            });
        }
        if self.expected_points != 0 {
            return Err(ScanError::ExpectedPointsAlreadySet {
                current: self.expected_points,
            });
        }
        if !self.points.is_empty() || self.status.is_terminal() {
            return Err(ScanError::InvalidStateTransition {
                current: self.status,
                attempted: "set expected points",
            });
        }
        self.expected_points = expected;
        Ok(())
    }

    /// Append a point result
    ///
    /// Enforces the strictly increasing point index. Appends against a
    /// terminal scan report `RejectedTerminal` instead of failing: a worker
    /// racing a cancel is expected, not a bug. Reaching the expected count
    /// completes the scan atomically with the append.
    pub fn add_point_result(
        &mut self,
        point: ScanPointResult,
    ) -> Result<PointAppend, ScanError> {
        if self.status.is_terminal() {
            return Ok(PointAppend::RejectedTerminal);
        }
        if self.status != ScanStatus::Running {
            return Err(ScanError::InvalidStateTransition {
                current: self.status,
                attempted: "add point result",
            });
        }
        let expected_index = self.points.len();
        if point.point_index != expected_index {
            return Err(ScanError::OutOfOrderPoint {
                expected: expected_index,
                got: point.point_index,
            });
        }

        self.queue(ScanEvent::ScanPointAcquired {
            scan_id: self.id,
            index: point.point_index,
            position: point.position,
            measurement: point.measurement.clone(),
        });
        self.points.push(point);

        if self.expected_points > 0 && self.points.len() >= self.expected_points {
            self.finish(ScanStatus::Completed);
            self.queue(ScanEvent::ScanCompleted {
                scan_id: self.id,
                total_points: self.points.len(),
            });
        }
        Ok(PointAppend::Accepted)
    }

    /// Suspend acquisition (Running → Paused)
    pub fn pause(&mut self) -> Result<(), ScanError> {
        if self.status != ScanStatus::Running {
            return Err(ScanError::InvalidStateTransition {
                current: self.status,
                attempted: "pause",
            });
        }
        self.status = ScanStatus::Paused;
        self.queue(ScanEvent::ScanPaused {
            scan_id: self.id,
            index: self.points.len(),
        });
        Ok(())
    }

    /// Resume acquisition (Paused → Running)
    pub fn resume(&mut self) -> Result<(), ScanError> {
        if self.status != ScanStatus::Paused {
            return Err(ScanError::InvalidStateTransition {
                current: self.status,
                attempted: "resume",
            });
        }
        self.status = ScanStatus::Running;
        self.queue(ScanEvent::ScanResumed {
            scan_id: self.id,
            index: self.points.len(),
        });
        Ok(())
    }

    /// Stop a running or paused scan on request (terminal)
    pub fn cancel(&mut self) -> Result<(), ScanError> {
        if !self.status.is_active() {
            return Err(ScanError::InvalidStateTransition {
                current: self.status,
                attempted: "cancel",
            });
        }
        self.finish(ScanStatus::Cancelled);
        self.queue(ScanEvent::ScanCancelled { scan_id: self.id });
        Ok(())
    }

    /// Mark the scan completed (terminal)
    ///
    /// Used by executors that exhaust their trajectory before the expected
    /// count is reached (or when no expected count was set).
    pub fn complete(&mut self) -> Result<(), ScanError> {
        if self.status != ScanStatus::Running {
            return Err(ScanError::InvalidStateTransition {
                current: self.status,
                attempted: "complete",
            });
        }
        self.finish(ScanStatus::Completed);
        self.queue(ScanEvent::ScanCompleted {
            scan_id: self.id,
            total_points: self.points.len(),
        });
        Ok(())
    }

    /// Abort a running or paused scan on a fault (terminal)
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), ScanError> {
        if !self.status.is_active() {
            return Err(ScanError::InvalidStateTransition {
                current: self.status,
                attempted: "fail",
            });
        }
        self.finish(ScanStatus::Failed);
        self.queue(ScanEvent::ScanFailed {
            scan_id: self.id,
            reason: reason.into(),
        });
        Ok(())
    }

    fn finish(&mut self, status: ScanStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }
}
