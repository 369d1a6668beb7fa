//! Unit tests for log.rs
//!
//! Tests Logger trait, LogEntry, LogSeverity, DefaultLogger and the
//! process-wide logger slot used by the gfx_* macros.

use crate::error::Error;
use crate::log::{self, DefaultLogger, LogEntry, LogSeverity, Logger};
use serial_test::serial;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

// ============================================================================
// HELPERS
// ============================================================================

/// Logger that stores every entry it receives
///
/// Other test modules log concurrently through the same slot, so only
/// entries from `test::*` sources are reported.
#[derive(Clone, Default)]
struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl CaptureLogger {
    fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.source.starts_with("test::"))
            .cloned()
            .collect()
    }
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn make_entry(severity: LogSeverity, file: Option<&'static str>, line: Option<u32>) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "gfx::context".to_string(),
        message: "Swapchain recreated".to_string(),
        file,
        line,
    }
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_debug() {
    assert_eq!(format!("{:?}", LogSeverity::Trace), "Trace");
    assert_eq!(format!("{:?}", LogSeverity::Warn), "Warn");
    assert_eq!(format!("{:?}", LogSeverity::Error), "Error");
}

// ============================================================================
// LOG ENTRY TESTS
// ============================================================================

#[test]
fn test_log_entry_without_file_line() {
    let entry = make_entry(LogSeverity::Info, None, None);
    assert_eq!(entry.severity, LogSeverity::Info);
    assert_eq!(entry.source, "gfx::context");
    assert!(entry.file.is_none());
    assert!(entry.line.is_none());
}

#[test]
fn test_log_entry_clone_keeps_location() {
    let entry = make_entry(LogSeverity::Error, Some("explicit_context.rs"), Some(42));
    let copy = entry.clone();
    assert_eq!(copy.file, Some("explicit_context.rs"));
    assert_eq!(copy.line, Some(42));
    assert_eq!(copy.message, entry.message);
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_default_logger_all_severities() {
    let logger = DefaultLogger;
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        logger.log(&make_entry(severity, None, None));
        logger.log(&make_entry(severity, Some("log_tests.rs"), Some(1)));
    }
}

#[test]
fn test_logger_trait_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<DefaultLogger>();
    assert_send_sync::<CaptureLogger>();
}

// ============================================================================
// LOGGER SLOT + MACROS
// ============================================================================

#[test]
#[serial]
fn test_set_logger_routes_macros() {
    let capture = CaptureLogger::default();
    log::set_logger(capture.clone());

    crate::gfx_info!("test::context", "frame {}", 7);
    crate::gfx_warn!("test::vulkan", "device lost");

    log::reset_logger();

    let entries = capture.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].severity, LogSeverity::Info);
    assert_eq!(entries[0].message, "frame 7");
    assert_eq!(entries[1].source, "test::vulkan");
    assert!(entries[1].file.is_none());
}

#[test]
#[serial]
fn test_gfx_error_carries_file_and_line() {
    let capture = CaptureLogger::default();
    log::set_logger(capture.clone());

    crate::gfx_error!("test::context", "boom");

    log::reset_logger();

    let entries = capture.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, LogSeverity::Error);
    assert!(entries[0].file.unwrap().ends_with("log_tests.rs"));
    assert!(entries[0].line.is_some());
}

#[test]
#[serial]
fn test_gfx_err_logs_and_builds_backend_error() {
    let capture = CaptureLogger::default();
    log::set_logger(capture.clone());

    let err = crate::gfx_err!("test::vulkan", "vkCreateFence failed: {}", -1);

    log::reset_logger();

    match err {
        Error::BackendError(msg) => assert_eq!(msg, "vkCreateFence failed: -1"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(capture.entries().len(), 1);
}

#[test]
#[serial]
fn test_gfx_bail_returns_early() {
    fn fails() -> crate::error::Result<u32> {
        crate::gfx_bail!("test::context", "no surface");
    }

    let capture = CaptureLogger::default();
    log::set_logger(capture.clone());
    let result = fails();
    log::reset_logger();

    assert!(matches!(result, Err(Error::BackendError(_))));
    assert_eq!(capture.entries()[0].message, "no surface");
}

#[test]
#[serial]
fn test_reset_logger_detaches_custom_logger() {
    let capture = CaptureLogger::default();
    log::set_logger(capture.clone());
    log::reset_logger();

    crate::gfx_debug!("test::context", "not captured");
    assert!(capture.entries().is_empty());
}
