//! Tests for `src/logging.rs`.

use backchannel::logging::{LoggingGuard, DEFAULT_FILTER, LOG_FILE_PREFIX};

#[test]
fn logging_guard_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<LoggingGuard>();
}

#[test]
fn defaults_name_the_relay() {
    assert!(LOG_FILE_PREFIX.starts_with("backchannel"));
    assert!(DEFAULT_FILTER.starts_with("info"));
}

#[test]
fn init_production_creates_logs_dir() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let logs_dir = tmp.path().join("logs");
    assert!(!logs_dir.exists());

    // Only one global subscriber per process; the directory is created
    // before installation is attempted, so it exists either way.
    let _result = backchannel::logging::init_production(&logs_dir);
    assert!(logs_dir.exists(), "logs directory should be created");

    let second = backchannel::logging::init_cli();
    assert!(second.is_err(), "a second global subscriber is refused");
}
