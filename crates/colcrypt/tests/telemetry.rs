use colcrypt::telemetry;

#[test]
fn init_installs_subscriber_once() {
    assert!(telemetry::init("debug").is_ok());
    // The global subscriber cannot be replaced.
    assert!(telemetry::init("info").is_err());
    tracing::info!(rows = 3, "subscriber active");
}
