const COMMANDS: &[&str] = &[
    "get_token",
    "subscribe_to_topic",
    "unsubscribe_from_topic",
    "are_notifications_enabled",
    "request_notification_permission",
    "delete_token",
    "get_last_message",
    "check_permissions",
    "request_permissions",
];

fn main() {
    #[cfg(feature = "tauri")]
    tauri_plugin::Builder::new(COMMANDS)
        .android_path("android")
        .ios_path("ios")
        .build();

    #[cfg(not(feature = "tauri"))]
    let _ = COMMANDS;
}
