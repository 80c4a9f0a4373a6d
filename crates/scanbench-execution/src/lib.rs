//! # ScanBench Execution
//!
//! Scan executors: worker-thread execution of step and fly scans against
//! the motion and acquisition port traits, plus simulated ports for tests
//! and demos.

use std::time::Duration;

pub mod fly;
pub mod ports;
pub mod sim;
pub mod step;

pub use fly::FlyScanExecutor;
pub use ports::{AcquisitionPort, MotionPort};
pub use sim::{SimAcquisitionPort, SimMotionPort};
pub use step::StepScanExecutor;

/// Poll interval for pause waits and bounded stop waits.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(25);
