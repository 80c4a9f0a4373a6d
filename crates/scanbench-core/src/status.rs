//! Scan and motion lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a scan aggregate
///
/// `Cancelled`, `Completed` and `Failed` are terminal: no transition ever
/// leaves them, and any mutation attempted on a terminal aggregate is
/// rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanStatus {
    /// Created, not yet started.
    Pending,
    /// Acquisition in progress.
    Running,
    /// Suspended between acquisitions, resumable.
    Paused,
    /// Stopped on request (terminal).
    Cancelled,
    /// Reached its expected point count or exhausted its trajectory (terminal).
    Completed,
    /// Aborted on a hardware or internal fault (terminal).
    Failed,
}

impl ScanStatus {
    /// Whether this status is terminal (no transition leaves it)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanStatus::Cancelled | ScanStatus::Completed | ScanStatus::Failed
        )
    }

    /// Whether the scan is still live (running or paused)
    pub fn is_active(&self) -> bool {
        matches!(self, ScanStatus::Running | ScanStatus::Paused)
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Pending => write!(f, "Pending"),
            ScanStatus::Running => write!(f, "Running"),
            ScanStatus::Paused => write!(f, "Paused"),
            ScanStatus::Cancelled => write!(f, "Cancelled"),
            ScanStatus::Completed => write!(f, "Completed"),
            ScanStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Execution sub-state of a single atomic motion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionState {
    /// Not yet issued to the motion port.
    Pending,
    /// Currently being driven by the motion port.
    Executing,
    /// Finished successfully.
    Completed,
}

impl std::fmt::Display for MotionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MotionState::Pending => write!(f, "Pending"),
            MotionState::Executing => write!(f, "Executing"),
            MotionState::Completed => write!(f, "Completed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(ScanStatus::Cancelled.is_terminal());
        assert!(ScanStatus::Completed.is_terminal());
        assert!(ScanStatus::Failed.is_terminal());
        assert!(!ScanStatus::Pending.is_terminal());
        assert!(!ScanStatus::Running.is_terminal());
        assert!(!ScanStatus::Paused.is_terminal());
    }

    #[test]
    fn active_states() {
        assert!(ScanStatus::Running.is_active());
        assert!(ScanStatus::Paused.is_active());
        assert!(!ScanStatus::Pending.is_active());
        assert!(!ScanStatus::Completed.is_active());
    }
}
