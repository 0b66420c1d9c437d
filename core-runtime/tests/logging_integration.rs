//! Integration tests for logging system

use bridge_traits::LogLevel;
use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_path, LogFormat, LoggingConfig,
};
use core_runtime::Error;

#[test]
fn test_logging_initializes_once_per_process() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_spans(false);

    init_logging(config.clone()).unwrap();
    tracing::debug!(target: "core_catalog", asset_id = "a1", "Logging ready");

    // A second global subscriber is refused
    assert!(matches!(init_logging(config), Err(Error::Config(_))));
}

#[test]
fn test_credentials_never_pass_through() {
    for field in [
        "access_token",
        "refresh_token",
        "code",
        "code_verifier",
        "Authorization",
        "client_secret",
    ] {
        assert_eq!(redact_if_sensitive(field, "value"), "[REDACTED]", "{}", field);
    }
}

#[test]
fn test_pii_redaction_emails() {
    let redacted = redact_if_sensitive("contact", "user@example.com");

    assert!(redacted.starts_with('u'));
    assert!(redacted.contains("[REDACTED]"));
    assert!(!redacted.contains("example.com"));
}

#[test]
fn test_normal_values_pass_through() {
    assert_eq!(redact_if_sensitive("asset_id", "12345"), "12345");
    assert_eq!(redact_if_sensitive("name", "Heart Monitor"), "Heart Monitor");
    assert_eq!(
        redact_if_sensitive("api_base_url", "https://api.example.com"),
        "https://api.example.com"
    );
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/home/user/.cache/medicbot-client/audio/audio-7.mp3"), "audio-7.mp3");
    assert_eq!(strip_path("C:\\Users\\John\\AppData\\audio-7.ogg"), "audio-7.ogg");
    assert_eq!(strip_path("audio-7.wav"), "audio-7.wav");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Warn)
        .with_filter("core_auth=debug,core_catalog=trace")
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Warn);
    assert_eq!(
        config.filter.as_deref(),
        Some("core_auth=debug,core_catalog=trace")
    );
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}
