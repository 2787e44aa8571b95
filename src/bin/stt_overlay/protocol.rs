//! Newline-delimited JSON contract between the harness and whatever drives it.

use serde::{Deserialize, Serialize};
use std::io::{self, Write};

// ============================================================================
// Events (harness → client)
// ============================================================================

/// Serialized with an `"event"` tag field for type discrimination.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub(crate) enum HarnessEvent {
    /// Lifecycle notes (startup, shutdown, overlay creation).
    #[serde(rename = "status")]
    Status { message: String },

    /// Overlay now displays this caption.
    #[serde(rename = "overlay_show")]
    OverlayShow {
        content_id: String,
        content_type: i64,
        content: String,
        content_eng: String,
        time: i64,
    },

    /// Overlay text size changed.
    #[serde(rename = "overlay_text_size")]
    OverlayTextSize { units: u32 },

    /// Overlay hidden and released.
    #[serde(rename = "overlay_hide")]
    OverlayHide,

    /// Host result reached the overlay.
    #[serde(rename = "overlay_result")]
    OverlayResult {
        request_code: i32,
        result_code: i32,
        #[serde(skip_serializing_if = "Option::is_none")]
        extra: Option<serde_json::Value>,
    },

    /// Every command sent before the matching `flush` has been applied.
    #[serde(rename = "flushed")]
    Flushed,

    #[serde(rename = "error")]
    Error {
        message: String,
        /// Whether the harness keeps running.
        recoverable: bool,
    },
}

// ============================================================================
// Commands (client → harness)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "cmd")]
pub(crate) enum HarnessCommand {
    /// Start or refresh captions; omitted fields fall back to CLI defaults.
    #[serde(rename = "enable")]
    Enable {
        #[serde(default)]
        text_size: Option<u32>,
        #[serde(default)]
        label: Option<String>,
    },

    #[serde(rename = "disable")]
    Disable,

    /// Push a payload through the loopback data channel.
    #[serde(rename = "deliver")]
    Deliver {
        #[serde(default)]
        label: Option<String>,
        /// Raw payload text, or a JSON object sent as its serialized form.
        data: serde_json::Value,
    },

    #[serde(rename = "call_state")]
    CallState { state: i32 },

    #[serde(rename = "host_result")]
    HostResult {
        request_code: i32,
        result_code: i32,
        #[serde(default)]
        extra: Option<serde_json::Value>,
    },

    #[serde(rename = "flush")]
    Flush,
}

pub(crate) fn payload_bytes(data: &serde_json::Value) -> Vec<u8> {
    match data {
        serde_json::Value::String(text) => text.clone().into_bytes(),
        other => other.to_string().into_bytes(),
    }
}

pub(crate) fn send_event(event: &HarnessEvent) {
    match serde_json::to_string(event) {
        Ok(json) => {
            let mut stdout = io::stdout().lock();
            if let Err(err) = writeln!(stdout, "{json}") {
                tracing::debug!(error = %err, "event write failed");
                return;
            }
            if let Err(err) = stdout.flush() {
                tracing::debug!(error = %err, "event flush failed");
            }
        }
        Err(err) => {
            tracing::debug!(error = %err, "event serialization failed");
        }
    }
}
