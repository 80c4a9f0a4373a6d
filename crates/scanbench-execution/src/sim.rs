//! Simulated hardware ports.
//!
//! Stand-ins for the real stage and acquisition chain, used by the demo
//! binary and the executor tests. Delays and injected faults are
//! configurable so timing-sensitive paths can be exercised.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use scanbench_core::{AtomicMotion, HardwareError, Measurement};

use crate::ports::{AcquisitionPort, MotionPort};

/// Simulated motion stage
///
/// Sleeps for a fixed duration per motion and can be told to fail from the
/// n-th motion onward.
#[derive(Debug)]
pub struct SimMotionPort {
    motion_delay: Duration,
    fail_from: Option<usize>,
    executed: AtomicUsize,
}

impl SimMotionPort {
    /// A stage that completes every motion after `motion_delay`
    pub fn new(motion_delay: Duration) -> Self {
        Self {
            motion_delay,
            fail_from: None,
            executed: AtomicUsize::new(0),
        }
    }

    /// Fail every motion starting with the n-th (zero-based)
    pub fn failing_from(mut self, n: usize) -> Self {
        self.fail_from = Some(n);
        self
    }

    /// Number of motions driven so far
    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }
}

impl MotionPort for SimMotionPort {
    fn execute_motion(&self, motion: &AtomicMotion) -> Result<(), HardwareError> {
        let n = self.executed.fetch_add(1, Ordering::SeqCst);
        if self.fail_from.is_some_and(|from| n >= from) {
            return Err(HardwareError::Motion {
                reason: format!("simulated stage fault on motion {}", motion.id),
            });
        }
        std::thread::sleep(self.motion_delay);
        Ok(())
    }
}

/// Simulated acquisition chain
///
/// Produces a deterministic ramp on each channel so tests can assert on
/// averaged values, sleeping for a fixed duration per sample.
#[derive(Debug)]
pub struct SimAcquisitionPort {
    acquisition_delay: Duration,
    channels: usize,
    fail_from: Option<usize>,
    acquired: AtomicUsize,
}

impl SimAcquisitionPort {
    /// A chain producing `channels`-wide samples after `acquisition_delay`
    pub fn new(channels: usize, acquisition_delay: Duration) -> Self {
        Self {
            acquisition_delay,
            channels,
            fail_from: None,
            acquired: AtomicUsize::new(0),
        }
    }

    /// Fail every acquisition starting with the n-th (zero-based)
    pub fn failing_from(mut self, n: usize) -> Self {
        self.fail_from = Some(n);
        self
    }

    /// Number of samples delivered so far
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }
}

impl AcquisitionPort for SimAcquisitionPort {
    fn acquire_sample(&self) -> Result<Measurement, HardwareError> {
        let n = self.acquired.fetch_add(1, Ordering::SeqCst);
        if self.fail_from.is_some_and(|from| n >= from) {
            return Err(HardwareError::Acquisition {
                reason: format!("simulated acquisition fault on sample {n}"),
            });
        }
        std::thread::sleep(self.acquisition_delay);
        let base = n as f64;
        Ok(Measurement::new(
            (0..self.channels).map(|c| base + c as f64 * 0.1).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanbench_core::MotionProfile;

    #[test]
    fn motion_port_fails_from_index() {
        let port = SimMotionPort::new(Duration::ZERO).failing_from(1);
        let motion = AtomicMotion::new(1.0, 0.0, MotionProfile::default()).unwrap();
        assert!(port.execute_motion(&motion).is_ok());
        assert!(port.execute_motion(&motion).is_err());
        assert_eq!(port.executed(), 2);
    }

    #[test]
    fn acquisition_port_produces_ramp() {
        let port = SimAcquisitionPort::new(2, Duration::ZERO);
        let first = port.acquire_sample().unwrap();
        let second = port.acquire_sample().unwrap();
        assert_eq!(first.channels, vec![0.0, 0.1]);
        assert_eq!(second.channels, vec![1.0, 1.1]);
    }
}
