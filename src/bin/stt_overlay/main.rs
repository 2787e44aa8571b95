//! Caption overlay harness: drives a `SessionController` from JSON commands on stdin.
//!
//! The data channel is an in-process loopback and the overlay prints its
//! mutations as JSON events, so the whole control path can be exercised
//! without a call stack or a window system.

mod console;
mod protocol;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use console::ConsoleSurface;
use protocol::{payload_bytes, send_event, HarnessCommand, HarnessEvent};
use std::io::{self, BufRead};
use std::sync::Arc;
use std::time::Duration;
use stt_overlay::{logging, AppConfig, HostSurface, LoopbackProvider, SessionController, UiThread};

#[derive(Debug, Parser, Clone)]
#[command(about = "Caption overlay harness", author, version)]
struct HarnessConfig {
    #[command(flatten)]
    app: AppConfig,

    /// How long `flush` and shutdown wait for the UI thread (ms)
    #[arg(long = "flush-timeout-ms", default_value_t = 1000)]
    flush_timeout_ms: u64,
}

struct Harness {
    config: HarnessConfig,
    provider: Arc<LoopbackProvider>,
    ui: Arc<UiThread>,
    controller: SessionController,
}

impl Harness {
    fn new(config: HarnessConfig) -> Result<Self> {
        let provider = Arc::new(LoopbackProvider::new());
        let ui = Arc::new(UiThread::spawn().context("failed to start ui thread")?);
        let default_surface: Option<Arc<dyn HostSurface>> = if config.app.no_host_surface {
            None
        } else {
            Some(Arc::new(ConsoleSurface))
        };
        let controller = SessionController::new(provider.clone(), ui.clone(), default_surface);
        Ok(Self {
            config,
            provider,
            ui,
            controller,
        })
    }

    fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.config.flush_timeout_ms)
    }

    fn handle_command(&mut self, cmd: HarnessCommand) {
        match cmd {
            HarnessCommand::Enable { text_size, label } => {
                let text_size = text_size.unwrap_or(self.config.app.text_size);
                let label = label.unwrap_or_else(|| self.config.app.label.clone());
                if let Err(err) = self.controller.enable(text_size, &label) {
                    send_error(err.to_string());
                }
            }
            HarnessCommand::Disable => self.controller.disable(),
            HarnessCommand::Deliver { label, data } => {
                let label = label
                    .or_else(|| self.controller.bound_label())
                    .unwrap_or_else(|| self.config.app.label.clone());
                if self.provider.deliver(&label, &payload_bytes(&data)).is_none() {
                    send_error(format!("no data channel bound for label {label:?}"));
                }
            }
            HarnessCommand::CallState { state } => self.controller.on_call_state_changed(state),
            HarnessCommand::HostResult {
                request_code,
                result_code,
                extra,
            } => self
                .controller
                .on_host_surface_result(request_code, result_code, extra),
            HarnessCommand::Flush => {
                if self.ui.flush(self.flush_timeout()) {
                    send_event(&HarnessEvent::Flushed);
                } else {
                    send_error("ui thread did not drain in time".to_string());
                }
            }
        }
    }

    fn shutdown(&mut self) {
        self.controller.disable();
        if !self.ui.flush(self.flush_timeout()) {
            tracing::warn!("ui thread did not drain before shutdown");
        }
        self.ui.shutdown();
    }
}

fn send_error(message: String) {
    send_event(&HarnessEvent::Error {
        message,
        recoverable: true,
    });
}

fn main() -> Result<()> {
    let config = HarnessConfig::parse();
    config.app.validate().map_err(|message| anyhow!(message))?;
    logging::init_tracing(&config.app);
    tracing::debug!(label = %config.app.label, text_size = config.app.text_size, "harness starting");

    let mut harness = Harness::new(config)?;
    send_event(&HarnessEvent::Status {
        message: "ready".to_string(),
    });

    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read stdin")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<HarnessCommand>(trimmed) {
            Ok(cmd) => harness.handle_command(cmd),
            Err(err) => send_error(format!("Invalid command: {err}")),
        }
    }

    harness.shutdown();
    send_event(&HarnessEvent::Status {
        message: "exiting".to_string(),
    });
    Ok(())
}
