//! Integration tests for logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{init_logging, redact_field, redact_url, LogFormat, LoggingConfig};

#[test]
fn test_logging_config_defaults() {
    let config = LoggingConfig::default();

    assert_eq!(config.level, LogLevel::Info);
    assert!(config.redact_urls);
    assert!(config.logger_sink.is_none());
    assert!(config.filter.is_none());
}

#[test]
fn test_signed_media_urls_are_redacted() {
    let signed = "https://media.example.net/reels/7/clip.mp4?Expires=1700000000&Signature=abc";
    assert_eq!(redact_url(signed), "https://media.example.net/reels/7/clip.mp4");
    assert_eq!(
        redact_field("url", signed),
        "https://media.example.net/reels/7/clip.mp4"
    );
}

#[test]
fn test_credentials_are_blanked() {
    assert_eq!(redact_field("authorization", "Bearer abc"), "[REDACTED]");
    assert_eq!(redact_field("api_key", "k-123"), "[REDACTED]");
}

#[test]
fn test_plain_values_pass_through() {
    assert_eq!(redact_field("tier", "durable"), "durable");
    assert_eq!(redact_field("freed_bytes", "1048576"), "1048576");
}

#[test]
fn test_init_logging_once() {
    // Only one global subscriber per process; a second init must fail cleanly.
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn);

    let first = init_logging(config.clone());
    assert!(first.is_ok());

    let second = init_logging(config);
    assert!(second.is_err());
}

#[test]
fn test_invalid_filter_is_rejected() {
    let config = LoggingConfig::default().with_filter("core_cache=not_a_level[");
    assert!(init_logging(config).is_err());
}
