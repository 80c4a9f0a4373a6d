//! # ScanBench Service
//!
//! Orchestration layer: scan requests in, scan handles out. Owns the
//! executors, enforces the one-active-scan invariant, projects status from
//! bus events and forwards lifecycle notifications to an output boundary.

pub mod dto;
pub mod output;
pub mod service;

pub use dto::{ScanRequest, ScanStatusReport};
pub use output::{
    LoggingOutputBoundary, OutcomeNotice, PauseNotice, ProgressNotice, ScanOutputBoundary,
    StartedNotice,
};
pub use service::{ScanHandle, ScanService, ServiceError, ServiceResult};
