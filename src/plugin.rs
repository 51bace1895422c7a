// Tauri packaging: `plugin:fcm|<command>` handlers, `fcm://<event>` events,
// and window focus driving foreground/background classification

use tauri::plugin::{Builder, TauriPlugin};
use tauri::{AppHandle, Emitter, Manager, RunEvent, Runtime, State, WindowEvent};

use crate::backends::image_utils;
use crate::components::{
    EventKind, FcmConfig, FcmError, FcmMessage, FcmResult, PermissionStatus, SuccessResult,
    TopicResult,
};
use crate::{FcmService, FcmServiceBuilder};

pub const PLUGIN_NAME: &str = "fcm";

/// Access the managed service from any Tauri manager
pub trait FcmExt<R: Runtime> {
    fn fcm(&self) -> State<'_, FcmService>;
}

impl<R: Runtime, T: Manager<R>> FcmExt<R> for T {
    fn fcm(&self) -> State<'_, FcmService> {
        self.state::<FcmService>()
    }
}

/// Plugin configured from `plugins.fcm` in the host configuration
pub fn init<R: Runtime>() -> TauriPlugin<R, Option<FcmConfig>> {
    build(None)
}

/// Plugin with a config built in code; `plugins.fcm` is ignored
pub fn init_with_config<R: Runtime>(config: FcmConfig) -> TauriPlugin<R, Option<FcmConfig>> {
    build(Some(config))
}

fn build<R: Runtime>(fixed: Option<FcmConfig>) -> TauriPlugin<R, Option<FcmConfig>> {
    Builder::<R, Option<FcmConfig>>::new(PLUGIN_NAME)
        .invoke_handler(tauri::generate_handler![
            get_token,
            subscribe_to_topic,
            unsubscribe_from_topic,
            are_notifications_enabled,
            request_notification_permission,
            delete_token,
            get_last_message,
            check_permissions,
            request_permissions,
        ])
        .setup(move |app, api| {
            let config = fixed
                .or_else(|| api.config().clone())
                .unwrap_or_default();
            let store_path = app.path().app_data_dir()?.join(&config.store_file_name);

            let builder = FcmService::builder().config(config).store_path(store_path);

            #[cfg(any(target_os = "android", target_os = "ios"))]
            let (builder, handle) = {
                use crate::backends::mobile::{self, MobileNotifier, MobileProvider};
                let handle = mobile::register(&api)?;
                let builder = builder
                    .provider(std::sync::Arc::new(MobileProvider::new(handle.clone())))
                    .notifier(Some(std::sync::Arc::new(MobileNotifier::new(handle.clone()))));
                (builder, handle)
            };

            let service = build_service(builder)?;

            #[cfg(any(target_os = "android", target_os = "ios"))]
            crate::backends::mobile::forward_native_events(
                &handle,
                std::sync::Arc::clone(service.dispatcher()),
                std::sync::Arc::clone(service.receiver()),
            )?;

            forward_events(app, &service);
            app.manage(service);
            tracing::info!(plugin = PLUGIN_NAME, "plugin set up");
            Ok(())
        })
        .on_event(|app, event| match event {
            RunEvent::Ready => {
                let service = app.fcm().inner().clone();
                service.visibility().set_foreground(true);
                tauri::async_runtime::spawn(async move { service.initialize().await });
            },
            RunEvent::WindowEvent {
                event: WindowEvent::Focused(focused),
                ..
            } => app.fcm().visibility().set_foreground(*focused),
            RunEvent::Exit => image_utils::cleanup_cached_icons(),
            _ => {},
        })
        .build()
}

fn build_service(builder: FcmServiceBuilder) -> FcmResult<FcmService> {
    tauri::async_runtime::block_on(builder.build())
}

/// Mirror every emitter event to the webview as `fcm://<kind>`
fn forward_events<R: Runtime>(app: &AppHandle<R>, service: &FcmService) {
    for kind in EventKind::ALL {
        let app = app.clone();
        let channel = format!("{}://{}", PLUGIN_NAME, kind);
        service
            .emitter()
            .subscribe(kind, move |event| {
                let emitted = event
                    .payload()
                    .and_then(|payload| {
                        app.emit(&channel, payload)
                            .map_err(|e| FcmError::bridge(e.to_string()))
                    });
                if let Err(error) = emitted {
                    tracing::warn!(event = %channel, error = %error, "failed to emit to webview");
                }
            })
            .detach();
    }
}

#[tauri::command]
async fn get_token(fcm: State<'_, FcmService>) -> FcmResult<String> {
    fcm.dispatcher().get_token().await
}

#[tauri::command]
async fn subscribe_to_topic(
    fcm: State<'_, FcmService>,
    topic: Option<String>,
) -> FcmResult<TopicResult> {
    let topic = required_topic(topic)?;
    fcm.dispatcher().subscribe_to_topic(&topic).await
}

#[tauri::command]
async fn unsubscribe_from_topic(
    fcm: State<'_, FcmService>,
    topic: Option<String>,
) -> FcmResult<TopicResult> {
    let topic = required_topic(topic)?;
    fcm.dispatcher().unsubscribe_from_topic(&topic).await
}

#[tauri::command]
async fn are_notifications_enabled(fcm: State<'_, FcmService>) -> FcmResult<bool> {
    Ok(fcm.dispatcher().are_notifications_enabled().await)
}

#[tauri::command]
async fn request_notification_permission(fcm: State<'_, FcmService>) -> FcmResult<bool> {
    Ok(fcm.dispatcher().request_notification_permission().await)
}

#[tauri::command]
async fn delete_token(fcm: State<'_, FcmService>) -> FcmResult<SuccessResult> {
    fcm.dispatcher().delete_token().await
}

#[tauri::command]
async fn get_last_message(fcm: State<'_, FcmService>) -> FcmResult<Option<FcmMessage>> {
    Ok(fcm.dispatcher().get_last_message().await)
}

#[tauri::command]
async fn check_permissions(fcm: State<'_, FcmService>) -> FcmResult<PermissionStatus> {
    Ok(fcm.dispatcher().check_permissions().await)
}

#[tauri::command]
async fn request_permissions(fcm: State<'_, FcmService>) -> FcmResult<PermissionStatus> {
    Ok(fcm.dispatcher().request_permissions().await)
}

fn required_topic(topic: Option<String>) -> FcmResult<String> {
    topic.ok_or_else(|| FcmError::invalid_argument("topic", "missing required argument"))
}
