// Notification icon resolution for desktop notifiers
// Push payloads carry the icon as a string: a URL, a path, or a themed icon name

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tempfile::NamedTempFile;
use tokio::sync::OnceCell;
use url::Url;

use crate::components::{FcmError, FcmResult};

#[derive(Debug, Clone)]
struct CachedIcon {
    path: PathBuf,
    cached_at: Instant,
}

/// Cache TTL: 1 hour
const CACHE_TTL_SECS: u64 = 3600;

const MAX_CACHE_ENTRIES: usize = 100;

/// Icons are small; refuse anything bigger
const MAX_ICON_SIZE: u64 = 2 * 1024 * 1024;

static HTTP_CLIENT: OnceCell<reqwest::Client> = OnceCell::const_new();

/// Key: icon URL
static ICON_CACHE: OnceCell<Arc<DashMap<String, CachedIcon>>> = OnceCell::const_new();

async fn get_http_client() -> FcmResult<&'static reqwest::Client> {
    HTTP_CLIENT
        .get_or_try_init(|| async {
            reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .connect_timeout(Duration::from_secs(5))
                .user_agent("tauri-plugin-fcm")
                .build()
                .map_err(|e| icon_error("http-client", format!("failed to create HTTP client: {}", e)))
        })
        .await
}

async fn get_icon_cache() -> Arc<DashMap<String, CachedIcon>> {
    ICON_CACHE
        .get_or_init(|| async { Arc::new(DashMap::new()) })
        .await
        .clone()
}

fn icon_error(icon: &str, message: impl Into<String>) -> FcmError {
    FcmError::storage(format!("icon `{}`: {}", icon, message.into()))
}

/// Drop expired entries, then the oldest ones while over the size limit
fn evict_stale_entries(cache: &DashMap<String, CachedIcon>) {
    let now = Instant::now();
    let ttl = Duration::from_secs(CACHE_TTL_SECS);

    cache.retain(|_, entry| {
        let is_valid = now.duration_since(entry.cached_at) < ttl;
        if !is_valid {
            let _ = std::fs::remove_file(&entry.path);
        }
        is_valid
    });

    while cache.len() > MAX_CACHE_ENTRIES {
        let oldest = cache
            .iter()
            .min_by_key(|entry| entry.cached_at)
            .map(|entry| entry.key().clone());

        match oldest {
            Some(key) => {
                if let Some((_, entry)) = cache.remove(&key) {
                    let _ = std::fs::remove_file(&entry.path);
                }
            },
            None => break,
        }
    }
}

/// How a notifier should present an icon
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedIcon {
    /// Local image file (possibly a downloaded copy)
    File(PathBuf),
    /// Themed icon name, passed through to the notification daemon
    Named(String),
}

impl ResolvedIcon {
    /// Value for the `app_icon` argument of the freedesktop notify call
    pub fn as_app_icon(&self) -> String {
        match self {
            ResolvedIcon::File(path) => path.to_string_lossy().to_string(),
            ResolvedIcon::Named(name) => name.clone(),
        }
    }
}

/// Resolve a push payload icon. Failures are logged and yield `None` so the
/// notification still goes out without an icon.
pub async fn resolve_icon(icon: &str) -> Option<ResolvedIcon> {
    let icon = icon.trim();
    if icon.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(icon) {
        return match url.scheme() {
            "http" | "https" => match download_icon(&url).await {
                Ok(path) => Some(ResolvedIcon::File(path)),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to fetch notification icon");
                    None
                },
            },
            "file" => match url.to_file_path() {
                Ok(path) if path.exists() => Some(ResolvedIcon::File(path)),
                _ => {
                    tracing::warn!(icon, "notification icon file does not exist");
                    None
                },
            },
            scheme => {
                tracing::debug!(scheme, "unsupported icon scheme, ignoring");
                None
            },
        };
    }

    let path = PathBuf::from(icon);
    if path.is_absolute() {
        return path.exists().then_some(ResolvedIcon::File(path));
    }
    Some(ResolvedIcon::Named(icon.to_string()))
}

/// Download a remote icon into a kept temp file, reusing a cached copy
pub async fn download_icon(url: &Url) -> FcmResult<PathBuf> {
    let url_string = url.to_string();

    let cache = get_icon_cache().await;
    evict_stale_entries(&cache);

    if let Some(cached) = cache.get(&url_string) {
        if cached.path.exists() {
            return Ok(cached.path.clone());
        }
        drop(cached);
        cache.remove(&url_string);
    }

    let client = get_http_client().await?;
    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| icon_error(&url_string, format!("download failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(icon_error(
            &url_string,
            format!("HTTP {} downloading icon", response.status()),
        ));
    }

    if let Some(content_length) = response.headers().get(reqwest::header::CONTENT_LENGTH)
        && let Ok(length_str) = content_length.to_str()
        && let Ok(size) = length_str.parse::<u64>()
        && size > MAX_ICON_SIZE
    {
        return Err(icon_error(
            &url_string,
            format!("{} bytes exceeds {} byte limit", size, MAX_ICON_SIZE),
        ));
    }

    let extension = determine_extension(url, response.headers());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| icon_error(&url_string, format!("failed to read body: {}", e)))?;

    if bytes.len() < 8 || bytes.len() as u64 > MAX_ICON_SIZE {
        return Err(icon_error(&url_string, "downloaded icon has an implausible size"));
    }

    let temp_file = NamedTempFile::with_suffix(format!(".{}", extension))
        .map_err(|e| icon_error(&url_string, format!("failed to create temp file: {}", e)))?;

    let temp_path = temp_file.path().to_path_buf();
    tokio::fs::write(&temp_path, &bytes)
        .await
        .map_err(|e| icon_error(&url_string, format!("failed to write temp file: {}", e)))?;

    let persisted_path = temp_file
        .into_temp_path()
        .keep()
        .map_err(|e| icon_error(&url_string, format!("failed to keep temp file: {}", e)))?;

    cache.insert(
        url_string.clone(),
        CachedIcon {
            path: persisted_path.clone(),
            cached_at: Instant::now(),
        },
    );

    tracing::debug!(url = %url_string, path = ?persisted_path, "downloaded notification icon");
    Ok(persisted_path)
}

/// File extension from the URL path, else from Content-Type, else png
fn determine_extension(url: &Url, headers: &reqwest::header::HeaderMap) -> String {
    if let Some(mut path_segments) = url.path_segments()
        && let Some(last_segment) = path_segments.next_back()
        && let Some(dot_pos) = last_segment.rfind('.')
    {
        let ext = &last_segment[dot_pos + 1..];
        if !ext.is_empty() && ext.len() <= 4 {
            return ext.to_lowercase();
        }
    }

    if let Some(content_type) = headers.get(reqwest::header::CONTENT_TYPE)
        && let Ok(ct) = content_type.to_str()
    {
        return match ct {
            ct if ct.contains("image/png") => "png",
            ct if ct.contains("image/jpeg") || ct.contains("image/jpg") => "jpg",
            ct if ct.contains("image/gif") => "gif",
            ct if ct.contains("image/webp") => "webp",
            ct if ct.contains("image/svg") => "svg",
            ct if ct.contains("image/x-icon") || ct.contains("image/vnd.microsoft.icon") => "ico",
            _ => "png",
        }
        .to_string();
    }

    "png".to_string()
}

/// Remove every downloaded icon; called when the host exits
pub fn cleanup_cached_icons() {
    if let Some(cache) = ICON_CACHE.get() {
        for entry in cache.iter() {
            if let Err(e) = std::fs::remove_file(&entry.value().path) {
                tracing::debug!(path = ?entry.value().path, error = %e, "failed to remove cached icon");
            }
        }
        cache.clear();
    }
}
