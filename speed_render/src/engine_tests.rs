//! Unit tests for engine.rs
//!
//! Tests the global logger facade: custom loggers, severity filtering and reset.
//! All tests are marked with #[serial] because the logger is process-wide.
//! Captured entries are filtered by source since other tests log concurrently.

use crate::speed::Engine;
use crate::speed::log::{Logger, LogEntry, LogSeverity};
use serial_test::serial;
use std::sync::{Arc, Mutex};

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Test logger that captures log entries for verification
struct TestLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn install_capture() -> Arc<Mutex<Vec<LogEntry>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(TestLogger { entries: Arc::clone(&entries) });
    entries
}

fn captured(entries: &Arc<Mutex<Vec<LogEntry>>>, source: &str) -> Vec<LogEntry> {
    entries
        .lock()
        .unwrap()
        .iter()
        .filter(|entry| entry.source == source)
        .cloned()
        .collect()
}

// ============================================================================
// LOGGER TESTS
// ============================================================================

#[test]
#[serial]
fn test_custom_logger_receives_entries() {
    let entries = install_capture();

    crate::engine_info!("speed::engine_tests::custom", "hello {}", 1);
    crate::engine_warn!("speed::engine_tests::custom", "careful");

    let logged = captured(&entries, "speed::engine_tests::custom");
    assert_eq!(logged.len(), 2);
    assert_eq!(logged[0].severity, LogSeverity::Info);
    assert_eq!(logged[0].message, "hello 1");
    assert_eq!(logged[1].severity, LogSeverity::Warn);
    assert!(logged[1].file.is_none());

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_error_macro_records_file_and_line() {
    let entries = install_capture();

    crate::engine_error!("speed::engine_tests::detailed", "device lost");

    let logged = captured(&entries, "speed::engine_tests::detailed");
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].severity, LogSeverity::Error);
    assert!(logged[0].file.unwrap().ends_with("engine_tests.rs"));
    assert!(logged[0].line.is_some());

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_min_severity_filters_entries() {
    let entries = install_capture();
    Engine::set_min_severity(LogSeverity::Warn);

    crate::engine_trace!("speed::engine_tests::filter", "dropped");
    crate::engine_info!("speed::engine_tests::filter", "dropped");
    crate::engine_warn!("speed::engine_tests::filter", "kept");
    crate::engine_error!("speed::engine_tests::filter", "kept");

    let logged = captured(&entries, "speed::engine_tests::filter");
    assert_eq!(logged.len(), 2);
    assert!(logged.iter().all(|entry| entry.severity >= LogSeverity::Warn));

    Engine::reset_logger();
    assert_eq!(Engine::min_severity(), LogSeverity::Trace);
}

#[test]
#[serial]
fn test_engine_err_logs_once() {
    let entries = install_capture();

    let _ = crate::engine_err!("speed::engine_tests::err", "failure {}", 9);

    let logged = captured(&entries, "speed::engine_tests::err");
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].message, "failure 9");

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_reset_logger_detaches_custom_logger() {
    let entries = install_capture();
    Engine::reset_logger();

    crate::engine_info!("speed::engine_tests::reset", "goes to DefaultLogger");

    assert!(captured(&entries, "speed::engine_tests::reset").is_empty());
}
