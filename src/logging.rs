//! Trace logging setup and the content-logging gate for caption text.

use crate::config::AppConfig;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();
static LOG_CONTENT_ENABLED: AtomicBool = AtomicBool::new(false);

pub fn trace_log_path() -> PathBuf {
    env::var("STT_OVERLAY_TRACE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("stt_overlay_trace.jsonl"))
}

/// Captions are user speech; payload text only reaches logs when this is on.
#[inline]
pub fn content_logging_enabled() -> bool {
    LOG_CONTENT_ENABLED.load(Ordering::Relaxed)
}

pub fn set_content_logging(enabled: bool) {
    LOG_CONTENT_ENABLED.store(enabled, Ordering::Relaxed);
}

/// Payload text for log fields, redacted unless content logging is enabled.
pub(crate) fn loggable(text: &str) -> String {
    if content_logging_enabled() {
        text.to_string()
    } else {
        format!("<{} bytes>", text.len())
    }
}

/// Applies the content gate, then installs the trace subscriber at most once.
///
/// Returns whether a subscriber is installed for this process.
fn init_tracing_once(config: &AppConfig, once: &OnceLock<()>) -> bool {
    set_content_logging(config.content_logging_enabled());
    if !config.logging_enabled() {
        return once.get().is_some();
    }

    let _ = once.get_or_init(|| {
        let path = trace_log_path();
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => file,
            Err(_) => return,
        };
        // Provider threads and the UI thread interleave; thread names keep them apart.
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_timer(UtcTime::rfc_3339())
            .with_thread_names(true)
            .with_target(false)
            .with_writer(file)
            .with_current_span(false)
            .with_span_list(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
    once.get().is_some()
}

/// Install the JSON trace subscriber and apply the caption content gate.
pub fn init_tracing(config: &AppConfig) -> bool {
    init_tracing_once(config, &TRACING_INIT)
}
