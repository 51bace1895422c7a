//! Tests for components/config.rs

use std::time::Duration;

use serde_json::json;
use tauri_plugin_fcm::{FcmConfig, PermissionFlow};

#[test]
fn test_defaults() {
    let config = FcmConfig::default();
    assert_eq!(config.command_timeout(), Duration::from_secs(30));
    assert_eq!(config.store_file_name, "fcm_prefs.json");
    assert_eq!(config.channel_id, "fcm_default_channel");
    assert_eq!(config.channel_name, "FCM Channel");
    assert_eq!(config.permission_flow, PermissionFlow::Provider);
    assert!(config.fetch_token_on_start);
}

#[test]
fn test_host_config_is_merged_over_defaults() {
    let config: FcmConfig = serde_json::from_value(json!({
        "commandTimeoutMs": 1500,
        "permissionFlow": "host",
        "channelName": "Alerts"
    }))
    .unwrap();

    assert_eq!(config.command_timeout(), Duration::from_millis(1500));
    assert_eq!(config.permission_flow, PermissionFlow::Host);
    assert_eq!(config.channel_name, "Alerts");
    assert_eq!(config.channel_id, "fcm_default_channel");
}

#[test]
fn test_builder_methods() {
    let config = FcmConfig::default()
        .with_channel("orders", "Orders")
        .with_app_name("Shop")
        .with_store_file_name("push.json")
        .with_fetch_token_on_start(false)
        .with_command_timeout(Duration::from_millis(250));

    assert_eq!(config.channel_id, "orders");
    assert_eq!(config.app_name, "Shop");
    assert_eq!(config.store_file_name, "push.json");
    assert!(!config.fetch_token_on_start);
    assert_eq!(config.command_timeout_ms, 250);
}
