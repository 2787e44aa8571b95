//! Shared runtime configuration so the harness and embedders resolve defaults the same way.

use clap::Parser;

pub const DEFAULT_TEXT_SIZE: u32 = 16;
pub const DEFAULT_LABEL: &str = "stt";
const MAX_TEXT_SIZE: u32 = 96;

#[derive(Debug, Parser, Clone)]
#[command(about = "Caption overlay controller", author, version)]
pub struct AppConfig {
    /// Enable trace logging to the temp trace file
    #[arg(long = "logs", env = "STT_OVERLAY_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all logging (overrides --logs)
    #[arg(long = "no-logs", default_value_t = false)]
    pub no_logs: bool,

    /// Include caption payload text in log records
    #[arg(long = "log-content", default_value_t = false)]
    pub log_content: bool,

    /// Overlay text size applied when an enable command omits one
    #[arg(long = "text-size", default_value_t = DEFAULT_TEXT_SIZE)]
    pub text_size: u32,

    /// Data channel label bound when an enable command omits one
    #[arg(long = "label", default_value = DEFAULT_LABEL)]
    pub label: String,

    /// Start without a usable host surface (overlay creation will fail)
    #[arg(long = "no-host-surface", default_value_t = false)]
    pub no_host_surface: bool,
}

impl AppConfig {
    #[must_use]
    pub fn logging_enabled(&self) -> bool {
        self.logs && !self.no_logs
    }

    #[must_use]
    pub fn content_logging_enabled(&self) -> bool {
        self.logging_enabled() && self.log_content
    }

    /// Reject values that would render an unusable overlay.
    pub fn validate(&self) -> Result<(), String> {
        if self.label.trim().is_empty() {
            return Err("--label must not be empty".to_string());
        }
        if self.text_size > MAX_TEXT_SIZE {
            return Err(format!(
                "--text-size must be at most {MAX_TEXT_SIZE}, got {}",
                self.text_size
            ));
        }
        Ok(())
    }
}
