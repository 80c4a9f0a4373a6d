//! Scan orchestration service.
//!
//! Validates requests, builds trajectories, hands scans to the executors
//! and projects their status from observed bus events. Callers interact
//! through explicit [`ScanHandle`]s; the service enforces the
//! one-active-scan invariant because both ports drive the same physical
//! bench.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{info, warn};

use scanbench_core::{
    build_motions, generate_positions, AcquisitionRateCapability, EventBus, EventFilter,
    ExecutorError, FlyScanConfig, ProfileSelector, Scan, ScanError, ScanEvent, ScanEventKind,
    ScanId, ScanKind, ScanStatus, ScopedSubscription, SharedScan, StepScanConfig,
    ValidationError,
};
use scanbench_execution::{
    AcquisitionPort, FlyScanExecutor, MotionPort, StepScanExecutor,
};

use crate::dto::{ScanRequest, ScanStatusReport};
use crate::output::{
    OutcomeNotice, PauseNotice, ProgressNotice, ScanOutputBoundary, StartedNotice,
};

/// Service layer error type
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The configuration failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The scan aggregate rejected an operation
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The executor rejected an operation
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// The bench is busy with another scan
    #[error("A scan is already in progress: {current}")]
    ScanInProgress {
        /// The scan currently holding the bench.
        current: ScanId,
    },

    /// The handle does not name the current scan
    #[error("Unknown or stale scan handle: {handle}")]
    UnknownScan {
        /// The handle that was presented.
        handle: ScanId,
    },

    /// Pause was requested for a scan kind that cannot hold position
    #[error("Pause is not supported for {kind} scans")]
    PauseUnsupported {
        /// The offending kind.
        kind: ScanKind,
    },
}

/// Result type for service operations
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Caller-facing reference to a scan started through the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanHandle {
    id: ScanId,
}

impl ScanHandle {
    fn new(id: ScanId) -> Self {
        Self { id }
    }

    /// The underlying scan identity
    pub fn id(&self) -> ScanId {
        self.id
    }
}

impl std::fmt::Display for ScanHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// The scan currently holding the bench
struct ActiveScan {
    handle: ScanHandle,
    kind: ScanKind,
    scan: SharedScan,
    /// Per-scan output forwarding; dropped (and unsubscribed) on any
    /// terminal event.
    _forwarding: ScopedSubscription,
}

type Projections = Arc<RwLock<HashMap<ScanId, ScanStatusReport>>>;
type ActiveSlot = Arc<Mutex<Option<ActiveScan>>>;

/// Orchestrates scan execution over shared bench hardware
///
/// Lock order: drained scan events are published while still holding the
/// scan mutex (that serializes per-scan bus order across threads), and
/// service methods never publish while holding the active slot, because
/// the status projection handler takes that lock on terminal events.
pub struct ScanService {
    bus: Arc<EventBus>,
    step_executor: StepScanExecutor,
    fly_executor: FlyScanExecutor,
    motion_port: Arc<dyn MotionPort>,
    acquisition_port: Arc<dyn AcquisitionPort>,
    output: Arc<dyn ScanOutputBoundary>,
    selector: ProfileSelector,
    active: ActiveSlot,
    projections: Projections,
    _status_subscription: ScopedSubscription,
}

impl ScanService {
    /// Create a service wired to the given bus, ports and output boundary
    pub fn new(
        bus: Arc<EventBus>,
        motion_port: Arc<dyn MotionPort>,
        acquisition_port: Arc<dyn AcquisitionPort>,
        output: Arc<dyn ScanOutputBoundary>,
    ) -> Self {
        let active: ActiveSlot = Arc::new(Mutex::new(None));
        let projections: Projections = Arc::new(RwLock::new(HashMap::new()));

        let mut status_subscription = ScopedSubscription::new(bus.clone());
        let projection_map = projections.clone();
        let active_slot = active.clone();
        status_subscription.subscribe(EventFilter::All, move |event| {
            project_event(&projection_map, &event);
            if ScanEventKind::terminal().contains(&event.kind()) {
                let mut slot = active_slot.lock();
                if slot
                    .as_ref()
                    .is_some_and(|a| a.handle.id() == event.scan_id())
                {
                    // Dropping the slot releases the forwarding subscription.
                    *slot = None;
                }
            }
        });

        Self {
            step_executor: StepScanExecutor::new(bus.clone()),
            fly_executor: FlyScanExecutor::new(bus.clone()),
            bus,
            motion_port,
            acquisition_port,
            output,
            selector: ProfileSelector::default(),
            active,
            projections,
            _status_subscription: status_subscription,
        }
    }

    /// Override the profile selector used for step trajectories
    pub fn with_profile_selector(mut self, selector: ProfileSelector) -> Self {
        self.selector = selector;
        self
    }

    /// The handle of the scan currently holding the bench, if any
    pub fn current_scan(&self) -> Option<ScanHandle> {
        self.active.lock().as_ref().map(|a| a.handle)
    }

    /// Validate, build and start a step scan
    ///
    /// Returns as soon as the worker is spawned; progress flows through the
    /// output boundary and [`ScanService::status`].
    pub fn execute_scan(&self, request: ScanRequest) -> ServiceResult<ScanHandle> {
        let config = StepScanConfig::try_from(request)?;
        let positions = generate_positions(
            &config.zone,
            config.x_nb_points,
            config.y_nb_points,
            config.pattern,
        );
        let motions = build_motions(&positions, &self.selector)?;
        if motions.is_empty() {
            return Err(ExecutorError::NoMotions.into());
        }

        let mut scan = Scan::step(config);
        scan.add_motions(motions)?;
        scan.start()?;
        self.launch(scan, ScanKind::Step)
    }

    /// Validate a fly scan against measured capability, plan and start it
    ///
    /// The expected point count is estimated from the capability and fixed
    /// on the aggregate before the executor starts, so the completion race
    /// has a stable target.
    pub fn execute_fly_scan(
        &self,
        config: FlyScanConfig,
        capability: &AcquisitionRateCapability,
    ) -> ServiceResult<ScanHandle> {
        config.validate()?;
        config.validate_with_capability(capability)?;

        let positions = generate_positions(
            &config.zone,
            config.x_nb_points,
            config.y_nb_points,
            config.pattern,
        );
        let motions =
            build_motions(&positions, &ProfileSelector::uniform(config.motion_profile))?;
        if motions.is_empty() {
            return Err(ExecutorError::NoMotions.into());
        }

        let expected = config.estimate_total_points(capability);
        let mut scan = Scan::fly(config, capability.measured_rate_hz);
        scan.add_motions(motions)?;
        scan.start()?;
        scan.set_expected_points(expected)?;
        self.launch(scan, ScanKind::Fly)
    }

    /// Register a started scan, publish its start events and spawn its worker
    fn launch(&self, mut scan: Scan, kind: ScanKind) -> ServiceResult<ScanHandle> {
        let scan_id = scan.id();
        let handle = ScanHandle::new(scan_id);
        let expected = scan.expected_points();
        let start_events = scan.take_events();
        let shared = scan.into_shared();

        {
            let mut slot = self.active.lock();
            if let Some(current) = slot.as_ref() {
                return Err(ServiceError::ScanInProgress {
                    current: current.handle.id(),
                });
            }
            self.projections.write().insert(
                scan_id,
                ScanStatusReport {
                    scan_id,
                    kind,
                    status: ScanStatus::Running,
                    points_acquired: 0,
                    expected_points: expected,
                },
            );
            *slot = Some(ActiveScan {
                handle,
                kind,
                scan: shared.clone(),
                _forwarding: self.forwarding_subscription(scan_id, kind),
            });
        }

        // Started must be observable before any point event: publish after
        // registration, before the worker exists.
        for event in start_events {
            self.bus.publish(event);
        }

        let spawned = match kind {
            ScanKind::Step => self.step_executor.execute(
                shared.clone(),
                self.motion_port.clone(),
                self.acquisition_port.clone(),
            ),
            ScanKind::Fly => self.fly_executor.execute(
                shared.clone(),
                self.motion_port.clone(),
                self.acquisition_port.clone(),
            ),
        };
        if !spawned {
            warn!(scan_id = %scan_id, "Executor rejected the scan");
            self.abort_unlaunched(&shared, scan_id);
            return Err(ExecutorError::Busy.into());
        }

        info!(scan_id = %scan_id, %kind, "Scan launched");
        Ok(handle)
    }

    /// Roll back a scan whose worker never spawned
    fn abort_unlaunched(&self, scan: &SharedScan, scan_id: ScanId) {
        {
            let mut slot = self.active.lock();
            if slot
                .as_ref()
                .is_some_and(|a| a.handle.id() == scan_id)
            {
                *slot = None;
            }
        }
        let mut guard = scan.lock();
        if guard.status().is_active() {
            if let Err(e) = guard.fail("executor rejected the scan") {
                warn!("Could not fail unlaunched scan: {e}");
            }
        }
        for event in guard.take_events() {
            self.bus.publish(event);
        }
    }

    /// Suspend the current step scan
    pub fn pause_scan(&self, handle: &ScanHandle) -> ServiceResult<()> {
        let scan = {
            let slot = self.active.lock();
            match slot.as_ref() {
                Some(active) if active.handle == *handle => {
                    if active.kind != ScanKind::Step {
                        return Err(ServiceError::PauseUnsupported { kind: active.kind });
                    }
                    active.scan.clone()
                }
                _ => return Err(ServiceError::UnknownScan { handle: handle.id() }),
            }
        };
        self.step_executor.pause(&scan)?;
        Ok(())
    }

    /// Resume the current paused step scan
    pub fn resume_scan(&self, handle: &ScanHandle) -> ServiceResult<()> {
        let scan = {
            let slot = self.active.lock();
            match slot.as_ref() {
                Some(active) if active.handle == *handle => {
                    if active.kind != ScanKind::Step {
                        return Err(ServiceError::PauseUnsupported { kind: active.kind });
                    }
                    active.scan.clone()
                }
                _ => return Err(ServiceError::UnknownScan { handle: handle.id() }),
            }
        };
        self.step_executor.resume(&scan)?;
        Ok(())
    }

    /// Cancel the current scan and reap its worker
    pub fn cancel_scan(&self, handle: &ScanHandle) -> ServiceResult<()> {
        let (scan, kind) = {
            let slot = self.active.lock();
            match slot.as_ref() {
                Some(active) if active.handle == *handle => {
                    (active.scan.clone(), active.kind)
                }
                _ => return Err(ServiceError::UnknownScan { handle: handle.id() }),
            }
        };

        // Mark terminal first so the worker stops appending, then wait for
        // the worker within the executor's bounded stop. Publishing happens
        // under the scan lock so a point the worker is appending either
        // lands on the bus before the cancel event or not at all.
        {
            let mut guard = scan.lock();
            if guard.status().is_active() {
                guard.cancel()?;
            }
            for event in guard.take_events() {
                self.bus.publish(event);
            }
        }

        match kind {
            ScanKind::Step => self.step_executor.stop()?,
            ScanKind::Fly => self.fly_executor.stop()?,
        }
        Ok(())
    }

    /// Current status of a scan, from the event-driven projection
    ///
    /// Works for finished scans too; only a handle the service has never
    /// seen is unknown.
    pub fn status(&self, handle: &ScanHandle) -> ServiceResult<ScanStatusReport> {
        self.projections
            .read()
            .get(&handle.id())
            .cloned()
            .ok_or(ServiceError::UnknownScan { handle: handle.id() })
    }

    /// Build the per-scan output forwarding subscription
    fn forwarding_subscription(&self, scan_id: ScanId, kind: ScanKind) -> ScopedSubscription {
        let mut guard = ScopedSubscription::new(self.bus.clone());
        let output = self.output.clone();
        let projections = self.projections.clone();

        guard.subscribe(EventFilter::All, move |event| {
            if event.scan_id() != scan_id {
                return;
            }
            // The status projection handler is subscribed first, so the
            // report already reflects this event.
            let (points, expected) = projections
                .read()
                .get(&scan_id)
                .map(|r| (r.points_acquired, r.expected_points))
                .unwrap_or((0, 0));

            match event {
                ScanEvent::ScanStarted { .. } => output.scan_started(StartedNotice {
                    scan_id,
                    kind,
                    expected_points: expected,
                }),
                ScanEvent::ScanPointAcquired {
                    index,
                    position,
                    measurement,
                    ..
                } => output.scan_progress(ProgressNotice {
                    scan_id,
                    kind,
                    point_index: index,
                    position,
                    channels: measurement.channels,
                    expected_points: expected,
                }),
                ScanEvent::ScanPaused { .. } => output.scan_paused(PauseNotice {
                    scan_id,
                    kind,
                    points_acquired: points,
                }),
                ScanEvent::ScanResumed { .. } => output.scan_resumed(PauseNotice {
                    scan_id,
                    kind,
                    points_acquired: points,
                }),
                ScanEvent::ScanCompleted { total_points, .. } => {
                    output.scan_completed(OutcomeNotice {
                        scan_id,
                        kind,
                        points_acquired: total_points,
                        reason: None,
                    })
                }
                ScanEvent::ScanCancelled { .. } => output.scan_cancelled(OutcomeNotice {
                    scan_id,
                    kind,
                    points_acquired: points,
                    reason: None,
                }),
                ScanEvent::ScanFailed { reason, .. } => output.scan_failed(OutcomeNotice {
                    scan_id,
                    kind,
                    points_acquired: points,
                    reason: Some(reason),
                }),
            }
        });
        guard
    }
}

/// Apply one event to the projection map
fn project_event(projections: &Projections, event: &ScanEvent) {
    let mut map = projections.write();
    let Some(report) = map.get_mut(&event.scan_id()) else {
        return;
    };
    match event {
        ScanEvent::ScanStarted { .. } => report.status = ScanStatus::Running,
        ScanEvent::ScanPointAcquired { index, .. } => {
            report.points_acquired = index + 1;
        }
        ScanEvent::ScanPaused { .. } => report.status = ScanStatus::Paused,
        ScanEvent::ScanResumed { .. } => report.status = ScanStatus::Running,
        ScanEvent::ScanCancelled { .. } => report.status = ScanStatus::Cancelled,
        ScanEvent::ScanCompleted { total_points, .. } => {
            report.status = ScanStatus::Completed;
            report.points_acquired = *total_points;
        }
        ScanEvent::ScanFailed { .. } => report.status = ScanStatus::Failed,
    }
}
