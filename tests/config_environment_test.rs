// ABOUTME: Unit tests for config environment functionality
// ABOUTME: Validates environment variable parsing, fallbacks, and rejection of bad values
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use serial_test::serial;
use squat_coach::config::{DetectorConfig, Environment, GenerationConfig, UploadConfig};
use squat_coach::logging::{LogFormat, LoggingConfig};
use squat_coach::models::Mode;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DETECTOR_VARS: [&str; 11] = [
    "SQUAT_COACH_WS_URL",
    "NEXT_PUBLIC_WS_URL",
    "SQUAT_COACH_MODE",
    "SQUAT_COACH_JPEG_QUALITY",
    "SQUAT_COACH_RECONNECT_DELAY_MS",
    "SQUAT_COACH_HEARTBEAT_SECS",
    "SQUAT_COACH_MIN_FRAME_INTERVAL_MS",
    "SQUAT_COACH_STORE_PATH",
    "SQUAT_COACH_SOUNDS_DIR",
    "SQUAT_COACH_ENV",
    "RUST_LOG",
];

fn clear_env() {
    for var in DETECTOR_VARS {
        env::remove_var(var);
    }
    for var in [
        "SQUAT_COACH_GENERATE_URL",
        "GEMINI_API_KEY",
        "GEMINI_MODEL",
        "LOG_FORMAT",
        "SQUAT_COACH_API_URL",
        "SQUAT_COACH_UPLOAD_MAX_WAIT_SECS",
        "SQUAT_COACH_UPLOAD_POLL_MS",
    ] {
        env::remove_var(var);
    }
}

#[test]
fn test_zero_stats_interval_is_rejected() {
    let config = DetectorConfig {
        stats_interval: Duration::ZERO,
        ..DetectorConfig::default()
    };
    let error = config.validate().unwrap_err();
    assert!(error.to_string().contains("greater than zero"));

    let heartbeat = DetectorConfig {
        heartbeat_interval: Duration::ZERO,
        ..DetectorConfig::default()
    };
    assert!(heartbeat.validate().is_err());
}

#[test]
fn test_environment_parsing() {
    assert_eq!(
        Environment::from_str_or_default("production"),
        Environment::Production
    );
    assert_eq!(
        Environment::from_str_or_default("dev"),
        Environment::Development
    );
    assert!(Environment::Production.is_production());
    assert!(!Environment::Testing.is_production());
    assert_eq!(Environment::Testing.to_string(), "testing");
}

#[test]
#[serial]
fn test_defaults_without_environment() {
    clear_env();
    let config = DetectorConfig::from_env().unwrap();

    assert_eq!(config.ws_url, "ws://localhost:8000/ws");
    assert_eq!(config.mode, Mode::Beginner);
    assert_eq!(config.jpeg_quality, 50);
    assert_eq!(config.reconnect_delay, Duration::from_secs(3));
    assert_eq!(config.connect_timeout, Duration::from_secs(10));
    assert_eq!(config.capture_poll_interval, Duration::from_millis(16));
    assert_eq!(config.min_session, Duration::from_secs(5));
    assert_eq!(config.constraints.ideal_width, 640);
    assert_eq!(config.constraints.max_frame_rate, 10);
    assert_eq!(config.sounds_dir, PathBuf::from("sounds"));
    assert_eq!(
        config.store_path.extension().and_then(|ext| ext.to_str()),
        Some("json")
    );
}

#[test]
#[serial]
fn test_environment_overrides() {
    clear_env();
    env::set_var("NEXT_PUBLIC_WS_URL", "ws://fallback.test/ws");
    env::set_var("SQUAT_COACH_WS_URL", " wss://coach.example.com/ws ");
    env::set_var("SQUAT_COACH_MODE", "PRO");
    env::set_var("SQUAT_COACH_JPEG_QUALITY", "80");
    env::set_var("SQUAT_COACH_RECONNECT_DELAY_MS", "1500");
    env::set_var("SQUAT_COACH_HEARTBEAT_SECS", "10");
    env::set_var("SQUAT_COACH_MIN_FRAME_INTERVAL_MS", "250");
    env::set_var("SQUAT_COACH_STORE_PATH", "/tmp/squat-coach-test/store.json");
    env::set_var("SQUAT_COACH_SOUNDS_DIR", "/opt/sounds");
    env::set_var("SQUAT_COACH_ENV", "production");

    let config = DetectorConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.ws_url, "wss://coach.example.com/ws");
    assert_eq!(config.mode, Mode::Pro);
    assert_eq!(config.jpeg_quality, 80);
    assert_eq!(config.reconnect_delay, Duration::from_millis(1500));
    assert_eq!(config.heartbeat_interval, Duration::from_secs(10));
    assert_eq!(config.min_frame_interval, Duration::from_millis(250));
    assert_eq!(
        config.store_path,
        PathBuf::from("/tmp/squat-coach-test/store.json")
    );
    assert_eq!(config.sounds_dir, PathBuf::from("/opt/sounds"));
    assert_eq!(config.environment, Environment::Production);

    let summary = config.summary();
    assert!(summary.contains("wss://coach.example.com/ws"));
    assert!(summary.contains("Mode: pro"));
}

#[test]
#[serial]
fn test_legacy_url_variable_is_honoured() {
    clear_env();
    env::set_var("NEXT_PUBLIC_WS_URL", "ws://legacy.test:9000/ws");
    let config = DetectorConfig::from_env().unwrap();
    clear_env();
    assert_eq!(config.ws_url, "ws://legacy.test:9000/ws");
}

#[test]
#[serial]
fn test_invalid_values_are_rejected() {
    let cases = [
        ("SQUAT_COACH_WS_URL", "http://localhost:8000/ws"),
        ("SQUAT_COACH_WS_URL", "localhost:8000"),
        ("SQUAT_COACH_JPEG_QUALITY", "0"),
        ("SQUAT_COACH_JPEG_QUALITY", "high"),
        ("SQUAT_COACH_RECONNECT_DELAY_MS", "0"),
        ("SQUAT_COACH_HEARTBEAT_SECS", "-5"),
    ];
    for (var, value) in cases {
        clear_env();
        env::set_var(var, value);
        assert!(
            DetectorConfig::from_env().is_err(),
            "{var}={value} should be rejected"
        );
    }
    clear_env();
}

#[test]
#[serial]
fn test_generation_config() {
    clear_env();
    let defaults = GenerationConfig::from_env().unwrap();
    assert_eq!(
        defaults.endpoint,
        "http://localhost:3000/api/generate-ai-content"
    );
    assert!(defaults.gemini_api_key.is_none());

    env::set_var("SQUAT_COACH_GENERATE_URL", "https://coach.example.com/api/generate");
    env::set_var("GEMINI_API_KEY", "  ");
    env::set_var("GEMINI_MODEL", "gemini-2.5-flash");
    let config = GenerationConfig::from_env().unwrap();
    assert_eq!(config.endpoint, "https://coach.example.com/api/generate");
    assert!(config.gemini_api_key.is_none(), "blank keys are ignored");
    assert_eq!(config.gemini_model, "gemini-2.5-flash");

    env::set_var("SQUAT_COACH_GENERATE_URL", "ftp://coach.example.com");
    assert!(GenerationConfig::from_env().is_err());
    clear_env();
}

#[test]
#[serial]
fn test_upload_config() {
    clear_env();
    let defaults = UploadConfig::from_env().unwrap();
    assert_eq!(defaults.base_url, "http://localhost:8000");
    assert_eq!(defaults.poll_interval, Duration::from_secs(3));
    assert!(defaults.max_wait.is_none());

    env::set_var("SQUAT_COACH_API_URL", "https://coach.example.com/");
    env::set_var("SQUAT_COACH_UPLOAD_MAX_WAIT_SECS", "600");
    env::set_var("SQUAT_COACH_UPLOAD_POLL_MS", "250");
    let config = UploadConfig::from_env().unwrap();
    assert_eq!(config.base_url, "https://coach.example.com");
    assert_eq!(config.max_wait, Some(Duration::from_secs(600)));
    assert_eq!(config.poll_interval, Duration::from_millis(250));

    env::set_var("SQUAT_COACH_UPLOAD_POLL_MS", "0");
    assert!(UploadConfig::from_env().is_err());
    env::remove_var("SQUAT_COACH_UPLOAD_POLL_MS");

    env::set_var("SQUAT_COACH_API_URL", "ws://coach.example.com");
    assert!(UploadConfig::from_env().is_err());
    clear_env();
}

#[test]
#[serial]
fn test_logging_config_from_env() {
    clear_env();
    env::set_var("LOG_FORMAT", "json");
    env::set_var("SQUAT_COACH_ENV", "production");
    let config = LoggingConfig::from_env();
    clear_env();

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.environment, "production");
    assert!(config.include_location);
    assert_eq!(config.service_name, "squat-coach");
}
