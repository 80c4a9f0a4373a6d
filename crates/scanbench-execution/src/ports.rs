//! Hardware port traits.
//!
//! Executors drive the bench through these two seams. Implementations are
//! blocking; an executor calls them from its own worker thread, never from
//! the caller's.

use scanbench_core::{AtomicMotion, HardwareError, Measurement};

/// Driver seam for the motion stage
///
/// `execute_motion` blocks until the stage has physically finished the
/// displacement (or the driver reports a fault).
pub trait MotionPort: Send + Sync {
    /// Drive one atomic motion to completion
    fn execute_motion(&self, motion: &AtomicMotion) -> Result<(), HardwareError>;
}

/// Driver seam for the acquisition chain
///
/// `acquire_sample` blocks until one multi-channel sample is available.
pub trait AcquisitionPort: Send + Sync {
    /// Acquire one sample from every channel
    fn acquire_sample(&self) -> Result<Measurement, HardwareError>;
}
