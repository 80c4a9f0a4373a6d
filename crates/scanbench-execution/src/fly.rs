//! Fly scan executor.
//!
//! Runs a fly scan on a dedicated worker thread: drive the trajectory
//! motions while predicting where samples land, then stream acquisitions at
//! those predicted positions. Fly scans cannot pause (the stage never
//! holds a position); cancellation is observed at a checkpoint per motion
//! and per sample.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use scanbench_core::{
    AtomicMotion, EventBus, ExecutorError, FlyScanConfig, PointAppend, Position, ScanConfig,
    ScanPointResult, SharedScan,
};

use crate::ports::{AcquisitionPort, MotionPort};
use crate::step::{cancel_scan, drive_motion, fail_scan};
use crate::POLL_INTERVAL;

/// Default bounded wait for the worker to exit on stop.
const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Executes fly scans on a dedicated worker thread
///
/// At most one worker is active per executor instance. There is no pause:
/// a fly scan either runs to completion or is cancelled.
pub struct FlyScanExecutor {
    bus: Arc<EventBus>,
    stop_flag: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stop_timeout: Duration,
}

impl FlyScanExecutor {
    /// Create an executor publishing on the given bus
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            stop_flag: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Override the bounded wait used by [`FlyScanExecutor::stop`]
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Whether a worker is currently running
    pub fn is_busy(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start executing a fly scan
    ///
    /// Returns false without side effects when a worker is already active,
    /// the scan carries no motions, or the scan is not a fly scan. The scan
    /// must already be Running with its motions and expected point count
    /// attached.
    pub fn execute(
        &self,
        scan: SharedScan,
        motion_port: Arc<dyn MotionPort>,
        acquisition_port: Arc<dyn AcquisitionPort>,
    ) -> bool {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            warn!("Fly executor busy, rejecting execution request");
            return false;
        }
        if let Some(handle) = worker.take() {
            let _ = handle.join();
        }

        let (scan_id, config, motions, rate_hz) = {
            let guard = scan.lock();
            let config = match guard.config() {
                ScanConfig::Fly(config) => config.clone(),
                ScanConfig::Step(_) => {
                    error!("Fly executor handed a step scan, rejecting");
                    return false;
                }
            };
            let rate_hz = guard.measured_rate_hz().unwrap_or(config.desired_rate_hz);
            (guard.id(), config, guard.motions().to_vec(), rate_hz)
        };
        if motions.is_empty() {
            warn!(scan_id = %scan_id, "Fly scan has no motions, rejecting");
            return false;
        }

        self.stop_flag.store(false, Ordering::SeqCst);
        let stop_flag = self.stop_flag.clone();
        let bus = self.bus.clone();

        info!(scan_id = %scan_id, rate_hz, "Starting fly scan worker");
        let handle = std::thread::Builder::new()
            .name(format!("fly-scan-{scan_id}"))
            .spawn(move || {
                run_fly_scan(scan, motions, config, rate_hz, motion_port, acquisition_port, stop_flag, bus);
            });
        match handle {
            Ok(handle) => {
                *worker = Some(handle);
                true
            }
            Err(e) => {
                error!(scan_id = %scan_id, "Failed to spawn fly scan worker: {e}");
                false
            }
        }
    }

    /// Request the worker to stop and wait for it within a bounded timeout
    pub fn stop(&self) -> Result<(), ExecutorError> {
        self.stop_flag.store(true, Ordering::SeqCst);
        let handle = self.worker.lock().take();
        let Some(handle) = handle else {
            return Ok(());
        };

        let deadline = Instant::now() + self.stop_timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                let timeout_ms = self.stop_timeout.as_millis() as u64;
                warn!(timeout_ms, "Fly scan worker did not exit in time");
                *self.worker.lock() = Some(handle);
                return Err(ExecutorError::StopTimeout { timeout_ms });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
        if handle.join().is_err() {
            error!("Fly scan worker panicked");
        }
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn run_fly_scan(
    scan: SharedScan,
    mut motions: Vec<AtomicMotion>,
    config: FlyScanConfig,
    rate_hz: f64,
    motion_port: Arc<dyn MotionPort>,
    acquisition_port: Arc<dyn AcquisitionPort>,
    stop_flag: Arc<AtomicBool>,
    bus: Arc<EventBus>,
) {
    // Phase 1: drive the trajectory, predicting sample positions per segment.
    let mut position = config.zone.origin();
    let mut predicted: Vec<Position> = Vec::new();

    for motion in &mut motions {
        if stop_flag.load(Ordering::SeqCst) {
            cancel_scan(&scan, &bus);
            return;
        }

        let segment = motion.acquisition_positions(position, rate_hz);
        // The first predicted position of a segment coincides with the last
        // of the previous one; keep only one copy.
        let skip = usize::from(!predicted.is_empty());
        predicted.extend(segment.into_iter().skip(skip));

        if let Err(e) = drive_motion(motion, motion_port.as_ref()) {
            fail_scan(&scan, &bus, e.to_string());
            return;
        }
        position = motion.end_position(position);
    }
    debug!(samples = predicted.len(), "Fly trajectory done, streaming acquisitions");

    // Phase 2: stream one sample per predicted position.
    for (index, sample_position) in predicted.into_iter().enumerate() {
        if stop_flag.load(Ordering::SeqCst) {
            cancel_scan(&scan, &bus);
            return;
        }
        if !scan.lock().status().is_active() {
            return;
        }

        let measurement = match acquisition_port.acquire_sample() {
            Ok(measurement) => measurement,
            Err(e) => {
                fail_scan(&scan, &bus, e.to_string());
                return;
            }
        };

        let point = ScanPointResult::new(index, sample_position, measurement);
        let mut guard = scan.lock();
        match guard.add_point_result(point) {
            Ok(PointAppend::Accepted) => {
                // Publish before releasing the lock: a concurrent cancel
                // publishes under the same lock, so the point event can
                // never land after the terminal one.
                for event in guard.take_events() {
                    bus.publish(event);
                }
            }
            Ok(PointAppend::RejectedTerminal) => {
                // Expected count reached (or a cancel won); stop streaming.
                return;
            }
            Err(e) => {
                error!("Point append rejected: {e}");
                drop(guard);
                fail_scan(&scan, &bus, e.to_string());
                return;
            }
        }
    }

    // Fewer predicted samples than expected: close the scan with what we got.
    let mut guard = scan.lock();
    if guard.status().is_active() {
        if let Err(e) = guard.complete() {
            warn!("Could not complete fly scan: {e}");
        }
    }
    for event in guard.take_events() {
        bus.publish(event);
    }
}
