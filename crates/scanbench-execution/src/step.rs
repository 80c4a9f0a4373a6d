//! Step scan executor.
//!
//! Runs a step scan on a dedicated worker thread: move to the next grid
//! point, wait for the stage to settle, average a burst of samples, append
//! the point to the aggregate and publish its events. Pause blocks the
//! worker between points; cancellation is observed at two checkpoints per
//! iteration through a shared stop flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use scanbench_core::{
    AtomicMotion, EventBus, ExecutorError, HardwareError, Measurement, PointAppend, ScanConfig,
    ScanError, ScanPointResult, ScanStatus, SharedScan, StepScanConfig,
};

use crate::ports::{AcquisitionPort, MotionPort};
use crate::POLL_INTERVAL;

/// Default bounded wait for the worker to exit on stop.
const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Control-flow outcome of a worker step
enum Flow {
    Continue,
    Exit,
}

/// Executes step scans on a dedicated worker thread
///
/// At most one worker is active per executor instance. The caller's thread
/// never blocks on hardware; `execute` returns as soon as the worker is
/// spawned.
pub struct StepScanExecutor {
    bus: Arc<EventBus>,
    stop_flag: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stop_timeout: Duration,
}

impl StepScanExecutor {
    /// Create an executor publishing on the given bus
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            stop_flag: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Override the bounded wait used by [`StepScanExecutor::stop`]
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

    /// Start executing a step scan
    ///
    /// Returns false without side effects when a worker is already active,
    /// the scan carries no motions, or the scan is not a step scan. The
    /// scan must already be Running with its motions attached.
    pub fn execute(
        &self,
        scan: SharedScan,
        motion_port: Arc<dyn MotionPort>,
        acquisition_port: Arc<dyn AcquisitionPort>,
    ) -> bool {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            warn!("Step executor busy, rejecting execution request");
            return false;
        }
        // Reap a finished previous worker.
        if let Some(handle) = worker.take() {
            let _ = handle.join();
        }

        let (scan_id, config, motions) = {
            let guard = scan.lock();
            let config = match guard.config() {
                ScanConfig::Step(config) => config.clone(),
                ScanConfig::Fly(_) => {
                    error!("Step executor handed a fly scan, rejecting");
                    return false;
                }
            };
            (guard.id(), config, guard.motions().to_vec())
        };
        if motions.is_empty() {
            warn!(scan_id = %scan_id, "Step scan has no motions, rejecting");
            return false;
        }

        self.stop_flag.store(false, Ordering::SeqCst);
        let stop_flag = self.stop_flag.clone();
        let bus = self.bus.clone();

        info!(scan_id = %scan_id, points = motions.len() + 1, "Starting step scan worker");
        let handle = std::thread::Builder::new()
            .name(format!("step-scan-{scan_id}"))
            .spawn(move || {
                run_step_scan(scan, motions, config, motion_port, acquisition_port, stop_flag, bus);
            });
        match handle {
            Ok(handle) => {
                *worker = Some(handle);
                true
            }
            Err(e) => {
                error!(scan_id = %scan_id, "Failed to spawn step scan worker: {e}");
                false
            }
        }
    }

    /// Suspend acquisition between points
    ///
    /// The worker blocks before its next acquisition until resumed or
    /// stopped; an acquisition already in flight still lands.
    pub fn pause(&self, scan: &SharedScan) -> Result<(), ScanError> {
        let mut guard = scan.lock();
        guard.pause()?;
        for event in guard.take_events() {
            self.bus.publish(event);
        }
        Ok(())
    }

    /// Resume a paused scan
    pub fn resume(&self, scan: &SharedScan) -> Result<(), ScanError> {
        let mut guard = scan.lock();
        guard.resume()?;
        for event in guard.take_events() {
            self.bus.publish(event);
        }
        Ok(())
    }

    /// Request the worker to stop and wait for it within a bounded timeout
    ///
    /// The worker observes the flag at its next checkpoint, so a stop issued
    /// mid-acquisition waits for that acquisition to finish. Returns
    /// `StopTimeout` when the worker outlives the wait; the handle is kept
    /// so a later stop can try again.
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
                warn!(timeout_ms, "Step scan worker did not exit in time");
                *self.worker.lock() = Some(handle);
                return Err(ExecutorError::StopTimeout { timeout_ms });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
        if handle.join().is_err() {
            error!("Step scan worker panicked");
        }
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn run_step_scan(
    scan: SharedScan,
    mut motions: Vec<AtomicMotion>,
    config: StepScanConfig,
    motion_port: Arc<dyn MotionPort>,
    acquisition_port: Arc<dyn AcquisitionPort>,
    stop_flag: Arc<AtomicBool>,
    bus: Arc<EventBus>,
) {
    let mut position = config.zone.origin();
    let total_points = motions.len() + 1;
    let stabilization = Duration::from_millis(config.stabilization_delay_ms);

    for index in 0..total_points {
        // Checkpoint before moving.
        if stop_flag.load(Ordering::SeqCst) {
            cancel_scan(&scan, &bus);
            return;
        }

        if index > 0 {
            let motion = &mut motions[index - 1];
            if let Err(e) = drive_motion(motion, motion_port.as_ref()) {
                fail_scan(&scan, &bus, e.to_string());
                return;
            }
            position = motion.end_position(position);
        }

        if let Flow::Exit = wait_while_paused(&scan, &stop_flag, &bus) {
            return;
        }

        if !stabilization.is_zero() {
            std::thread::sleep(stabilization);
        }

        // Checkpoint before acquiring.
        if stop_flag.load(Ordering::SeqCst) {
            cancel_scan(&scan, &bus);
            return;
        }
        if !scan.lock().status().is_active() {
            // Someone else finished the scan; nothing left to do.
            return;
        }

        let measurement =
            match acquire_averaged(acquisition_port.as_ref(), config.averaging_per_position) {
                Ok(measurement) => measurement,
                Err(e) => {
                    fail_scan(&scan, &bus, e.to_string());
                    return;
                }
            };

        let point = ScanPointResult::new(index, position, measurement);
        if let Flow::Exit = append_point(&scan, &stop_flag, &bus, point) {
            return;
        }
        debug!(index, %position, "Step scan point acquired");
    }

    // The last append auto-completes when the expected count matches; close
    // the scan here if it did not.
    let mut guard = scan.lock();
    if guard.status().is_active() {
        if let Err(e) = guard.complete() {
            warn!("Could not complete step scan: {e}");
        }
    }
    for event in guard.take_events() {
        bus.publish(event);
    }
}

/// Drive one motion through the port, tracking its sub-state
pub(crate) fn drive_motion(
    motion: &mut AtomicMotion,
    port: &dyn MotionPort,
) -> scanbench_core::Result<()> {
    motion.begin()?;
    port.execute_motion(motion)?;
    motion.complete()?;
    Ok(())
}

/// Average a burst of samples into one measurement
fn acquire_averaged(
    port: &dyn AcquisitionPort,
    count: usize,
) -> Result<Measurement, HardwareError> {
    let mut samples = Vec::with_capacity(count);
    for _ in 0..count.max(1) {
        samples.push(port.acquire_sample()?);
    }
    Ok(Measurement::average(&samples))
}

/// Block while the scan is paused, still honoring stop requests
fn wait_while_paused(scan: &SharedScan, stop_flag: &AtomicBool, bus: &Arc<EventBus>) -> Flow {
    loop {
        if stop_flag.load(Ordering::SeqCst) {
            cancel_scan(scan, bus);
            return Flow::Exit;
        }
        let status = scan.lock().status();
        match status {
            ScanStatus::Paused => std::thread::sleep(POLL_INTERVAL),
            ScanStatus::Running => return Flow::Continue,
            _ => return Flow::Exit,
        }
    }
}

/// Append a point, re-entering the pause wait if a pause slipped in
fn append_point(
    scan: &SharedScan,
    stop_flag: &AtomicBool,
    bus: &Arc<EventBus>,
    point: ScanPointResult,
) -> Flow {
    loop {
        {
            let mut guard = scan.lock();
            match guard.add_point_result(point.clone()) {
                Ok(PointAppend::Accepted) => {
                    // Publish before releasing the lock: a concurrent cancel
                    // publishes under the same lock, so the point event can
                    // never land after the terminal one.
                    for event in guard.take_events() {
                        bus.publish(event);
                    }
                    return Flow::Continue;
                }
                Ok(PointAppend::RejectedTerminal) => {
                    // Lost the race against a cancel; whoever won publishes.
                    return Flow::Exit;
                }
                Err(ScanError::InvalidStateTransition {
                    current: ScanStatus::Paused,
                    ..
                }) => {}
                Err(e) => {
                    error!("Point append rejected: {e}");
                    drop(guard);
                    fail_scan(scan, bus, e.to_string());
                    return Flow::Exit;
                }
            }
        }
        if let Flow::Exit = wait_while_paused(scan, stop_flag, bus) {
            return Flow::Exit;
        }
    }
}

/// Cancel the scan if still live and publish its events
pub(crate) fn cancel_scan(scan: &SharedScan, bus: &Arc<EventBus>) {
    let mut guard = scan.lock();
    if guard.status().is_active() {
        if let Err(e) = guard.cancel() {
            warn!("Could not cancel scan: {e}");
        }
    }
    for event in guard.take_events() {
        bus.publish(event);
    }
}

/// Fail the scan if still live and publish its events
pub(crate) fn fail_scan(scan: &SharedScan, bus: &Arc<EventBus>, reason: String) {
    error!("Scan failed: {reason}");
    let mut guard = scan.lock();
    if guard.status().is_active() {
        if let Err(e) = guard.fail(reason) {
            warn!("Could not fail scan: {e}");
        }
    }
    for event in guard.take_events() {
        bus.publish(event);
    }
}
