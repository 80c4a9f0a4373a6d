//! End-to-end step scan execution against simulated hardware.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use scanbench_core::{
    build_motions, generate_positions, EventBus, EventFilter, ExecutorError, MotionProfile,
    ProfileSelector, Scan, ScanEvent, ScanEventKind, ScanPattern, ScanStatus, ScanZone,
    SharedScan, StepScanConfig,
};
use scanbench_execution::{SimAcquisitionPort, SimMotionPort, StepScanExecutor};

fn step_config(x_nb_points: usize, y_nb_points: usize, stabilization_delay_ms: u64) -> StepScanConfig {
    StepScanConfig {
        zone: ScanZone::new(0.0, 10.0, 0.0, 10.0).unwrap(),
        x_nb_points,
        y_nb_points,
        pattern: ScanPattern::Serpentine,
        stabilization_delay_ms,
        averaging_per_position: 2,
    }
}

fn running_scan(config: StepScanConfig) -> SharedScan {
    let positions = generate_positions(
        &config.zone,
        config.x_nb_points,
        config.y_nb_points,
        config.pattern,
    );
    let motions =
        build_motions(&positions, &ProfileSelector::uniform(MotionProfile::default())).unwrap();
    let mut scan = Scan::step(config);
    scan.add_motions(motions).unwrap();
    scan.start().unwrap();
    scan.into_shared()
}

fn wait_for_terminal(scan: &SharedScan, timeout: Duration) -> ScanStatus {
    let deadline = Instant::now() + timeout;
    loop {
        let status = scan.lock().status();
        if status.is_terminal() {
            return status;
        }
        assert!(Instant::now() < deadline, "scan stuck in {status}");
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn record_events(bus: &EventBus) -> Arc<Mutex<Vec<ScanEvent>>> {
    let log: Arc<Mutex<Vec<ScanEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    bus.subscribe(EventFilter::All, move |event| {
        sink.lock().push(event);
    });
    log
}

#[test]
fn full_scan_acquires_every_grid_point() {
    let bus = Arc::new(EventBus::new());
    let log = record_events(&bus);
    let executor = StepScanExecutor::new(bus);
    let scan = running_scan(step_config(3, 2, 0));

    let motion = Arc::new(SimMotionPort::new(Duration::from_millis(1)));
    let acquisition = Arc::new(SimAcquisitionPort::new(2, Duration::ZERO));
    assert!(executor.execute(scan.clone(), motion, acquisition.clone()));

    assert_eq!(wait_for_terminal(&scan, Duration::from_secs(5)), ScanStatus::Completed);

    let guard = scan.lock();
    assert_eq!(guard.point_count(), 6);
    for (i, point) in guard.points().iter().enumerate() {
        assert_eq!(point.point_index, i);
        assert_eq!(point.measurement.channel_count(), 2);
    }
    // Serpentine: second row is traversed right to left.
    assert_eq!(guard.points()[3].position.x, 10.0);
    assert_eq!(guard.points()[3].position.y, 10.0);
    // Each point averages two samples.
    assert_eq!(acquisition.acquired(), 12);

    let events = log.lock();
    let acquired: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::ScanPointAcquired { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(acquired, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(events.last().map(|e| e.kind()), Some(ScanEventKind::Completed));
}

#[test]
fn pause_blocks_worker_and_resume_preserves_count() {
    let bus = Arc::new(EventBus::new());
    let executor = StepScanExecutor::new(bus.clone());
    let scan = running_scan(step_config(4, 2, 20));

    let motion = Arc::new(SimMotionPort::new(Duration::from_millis(5)));
    let acquisition = Arc::new(SimAcquisitionPort::new(1, Duration::ZERO));
    assert!(executor.execute(scan.clone(), motion, acquisition));

    std::thread::sleep(Duration::from_millis(40));
    {
        let mut guard = scan.lock();
        if guard.status() == ScanStatus::Running {
            guard.pause().unwrap();
        }
    }

    // While paused the point count may advance by at most the one append
    // already in flight, then must hold.
    std::thread::sleep(Duration::from_millis(80));
    let frozen = scan.lock().point_count();
    std::thread::sleep(Duration::from_millis(80));
    assert_eq!(scan.lock().point_count(), frozen);
    assert!(!scan.lock().status().is_terminal());

    {
        let mut guard = scan.lock();
        guard.resume().unwrap();
    }
    assert_eq!(wait_for_terminal(&scan, Duration::from_secs(5)), ScanStatus::Completed);
    assert_eq!(scan.lock().point_count(), 8);
}

#[test]
fn stop_cancels_between_points() {
    let bus = Arc::new(EventBus::new());
    let log = record_events(&bus);
    let executor = StepScanExecutor::new(bus);
    let scan = running_scan(step_config(5, 1, 200));

    let motion = Arc::new(SimMotionPort::new(Duration::from_millis(1)));
    let acquisition = Arc::new(SimAcquisitionPort::new(1, Duration::ZERO));
    assert!(executor.execute(scan.clone(), motion, acquisition));

    std::thread::sleep(Duration::from_millis(50));
    executor.stop().unwrap();

    let status = wait_for_terminal(&scan, Duration::from_secs(2));
    assert_eq!(status, ScanStatus::Cancelled);
    assert!(scan.lock().point_count() < 5);
    assert!(log
        .lock()
        .iter()
        .any(|e| e.kind() == ScanEventKind::Cancelled));
}

#[test]
fn busy_executor_rejects_second_scan() {
    let bus = Arc::new(EventBus::new());
    let executor = StepScanExecutor::new(bus);
    let first = running_scan(step_config(3, 1, 100));
    let second = running_scan(step_config(3, 1, 0));

    let motion = Arc::new(SimMotionPort::new(Duration::from_millis(1)));
    let acquisition = Arc::new(SimAcquisitionPort::new(1, Duration::ZERO));
    assert!(executor.execute(first.clone(), motion.clone(), acquisition.clone()));
    assert!(executor.is_busy());
    assert!(!executor.execute(second.clone(), motion, acquisition));

    // The rejected scan was left untouched.
    assert_eq!(second.lock().status(), ScanStatus::Running);
    assert_eq!(second.lock().point_count(), 0);

    executor.stop().unwrap();
}

#[test]
fn scan_without_motions_is_rejected() {
    let bus = Arc::new(EventBus::new());
    let executor = StepScanExecutor::new(bus);
    let mut scan = Scan::step(step_config(3, 1, 0));
    scan.start().unwrap();
    let scan = scan.into_shared();

    let motion = Arc::new(SimMotionPort::new(Duration::ZERO));
    let acquisition = Arc::new(SimAcquisitionPort::new(1, Duration::ZERO));
    assert!(!executor.execute(scan.clone(), motion, acquisition));
    assert_eq!(scan.lock().status(), ScanStatus::Running);
}

#[test]
fn acquisition_fault_fails_the_scan() {
    let bus = Arc::new(EventBus::new());
    let log = record_events(&bus);
    let executor = StepScanExecutor::new(bus);
    let scan = running_scan(step_config(3, 1, 0));

    let motion = Arc::new(SimMotionPort::new(Duration::ZERO));
    let acquisition = Arc::new(SimAcquisitionPort::new(1, Duration::ZERO).failing_from(3));
    assert!(executor.execute(scan.clone(), motion, acquisition));

    assert_eq!(wait_for_terminal(&scan, Duration::from_secs(2)), ScanStatus::Failed);
    // The first point (two averaged samples) landed before the fault.
    assert_eq!(scan.lock().point_count(), 1);
    assert!(log.lock().iter().any(|e| matches!(
        e,
        ScanEvent::ScanFailed { reason, .. } if reason.contains("acquisition")
    )));
}

#[test]
fn motion_fault_fails_the_scan() {
    let bus = Arc::new(EventBus::new());
    let executor = StepScanExecutor::new(bus);
    let scan = running_scan(step_config(3, 1, 0));

    let motion = Arc::new(SimMotionPort::new(Duration::ZERO).failing_from(1));
    let acquisition = Arc::new(SimAcquisitionPort::new(1, Duration::ZERO));
    assert!(executor.execute(scan.clone(), motion, acquisition));

    assert_eq!(wait_for_terminal(&scan, Duration::from_secs(2)), ScanStatus::Failed);
    assert_eq!(scan.lock().point_count(), 2);
}

#[test]
fn stop_times_out_on_blocked_acquisition() {
    let bus = Arc::new(EventBus::new());
    let executor =
        StepScanExecutor::new(bus).with_stop_timeout(Duration::from_millis(50));
    let scan = running_scan(step_config(2, 1, 0));

    let motion = Arc::new(SimMotionPort::new(Duration::ZERO));
    let acquisition = Arc::new(SimAcquisitionPort::new(1, Duration::from_millis(500)));
    assert!(executor.execute(scan.clone(), motion, acquisition));

    // Let the worker sink into the long acquisition.
    std::thread::sleep(Duration::from_millis(100));
    match executor.stop() {
        Err(ExecutorError::StopTimeout { timeout_ms }) => assert_eq!(timeout_ms, 50),
        other => panic!("expected StopTimeout, got {other:?}"),
    }

    // The flag stays set; the worker cancels at its next checkpoint.
    assert_eq!(wait_for_terminal(&scan, Duration::from_secs(5)), ScanStatus::Cancelled);
}
