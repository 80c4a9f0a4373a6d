use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use scanbench::{
    init_logging, AcquisitionRateCapability, EventBus, EventFilter, FlyScanConfig,
    LoggingOutputBoundary, MotionProfile, ScanEventKind, ScanHandle, ScanPattern, ScanRequest,
    ScanService, ScanZone, SimAcquisitionPort, SimMotionPort, BUILD_DATE, VERSION,
};

fn main() -> anyhow::Result<()> {
    init_logging()?;
    info!("Scanbench v{} (built {})", VERSION, BUILD_DATE);

    let bus = Arc::new(EventBus::new());
    bus.subscribe(
        EventFilter::Kinds(ScanEventKind::all().to_vec()),
        |event| info!(kind = %event.kind(), "Bus event"),
    );
    let motion = Arc::new(SimMotionPort::new(Duration::from_millis(5)));
    let acquisition = Arc::new(SimAcquisitionPort::new(3, Duration::from_millis(2)));
    let output = Arc::new(LoggingOutputBoundary);
    let service = ScanService::new(bus, motion, acquisition, output);

    // Step scan over a 4x3 grid.
    let request = ScanRequest {
        x_min: 0.0,
        x_max: 30.0,
        y_min: 0.0,
        y_max: 20.0,
        x_nb_points: 4,
        y_nb_points: 3,
        pattern: ScanPattern::Serpentine,
        stabilization_delay_ms: 10,
        averaging_per_position: 2,
    };
    let handle = service.execute_scan(request)?;
    wait_for_terminal(&service, &handle);

    // Fly scan along a single 50 mm row, against a measured 48 Hz bench.
    let capability = AcquisitionRateCapability::new(48.0, 0.5, Utc::now(), 10.0, 480)?;
    let config = FlyScanConfig {
        zone: ScanZone::new(0.0, 50.0, 0.0, 0.0)?,
        x_nb_points: 2,
        y_nb_points: 1,
        pattern: ScanPattern::Serpentine,
        motion_profile: MotionProfile::default(),
        desired_rate_hz: 40.0,
        max_spatial_gap_mm: 0.5,
    };
    let handle = service.execute_fly_scan(config, &capability)?;
    wait_for_terminal(&service, &handle);

    Ok(())
}

fn wait_for_terminal(service: &ScanService, handle: &ScanHandle) {
    loop {
        if let Ok(report) = service.status(handle) {
            if report.status.is_terminal() {
                info!(
                    "{} finished: {} ({} points)",
                    handle, report.status, report.points_acquired
                );
                return;
            }
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}
