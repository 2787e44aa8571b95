//! Overlay window ownership: lazy creation, rendering, and teardown.
//!
//! An [`OverlayLifecycle`] lives on the UI context and is only reached through
//! [`crate::dispatch::UiDispatcher`]. Windows are created there too, so an
//! [`OverlayWindow`] implementation never has to be `Send`.

use crate::event::TranslateEvent;
use std::sync::Arc;

/// Result of a host-side request (typically the draw-over-other-apps permission prompt).
#[derive(Debug, Clone, PartialEq)]
pub struct HostResult {
    pub request_code: i32,
    pub result_code: i32,
    pub extra: Option<serde_json::Value>,
}

/// Rendering surface drawn above the host application's content.
pub trait OverlayWindow {
    fn show(&mut self, event: &TranslateEvent);
    fn hide(&mut self);
    fn update_text_size(&mut self, units: u32);
    /// Completes a permission flow the window started on its own.
    fn forward_result(&mut self, result: &HostResult);
}

/// Platform object allowed to create overlays (a foreground UI context).
pub trait HostSurface: Send + Sync {
    /// Whether this surface can legally create an overlay right now.
    fn can_host_overlay(&self) -> bool {
        true
    }

    /// Called on the UI context.
    fn open_overlay(&self) -> Box<dyn OverlayWindow>;
}

#[derive(Default)]
pub struct OverlayLifecycle {
    window: Option<Box<dyn OverlayWindow>>,
}

impl OverlayLifecycle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.window.is_some()
    }

    /// Create the overlay from `surface` unless one already exists.
    pub fn ensure(&mut self, surface: &Arc<dyn HostSurface>) {
        if self.window.is_some() {
            return;
        }
        tracing::debug!("creating overlay window");
        self.window = Some(surface.open_overlay());
    }

    /// Show `event`; a positive `text_size` is applied as its own update afterwards.
    pub fn render(&mut self, event: &TranslateEvent, text_size: u32) {
        let Some(window) = self.window.as_mut() else {
            tracing::debug!(content_id = %event.content_id, "overlay gone; render skipped");
            return;
        };
        window.show(event);
        if text_size > 0 {
            window.update_text_size(text_size);
        }
    }

    pub fn teardown(&mut self) {
        if let Some(mut window) = self.window.take() {
            tracing::debug!("hiding overlay window");
            window.hide();
        }
    }

    pub fn forward_host_result(&mut self, result: &HostResult) {
        if let Some(window) = self.window.as_mut() {
            window.forward_result(result);
        }
    }
}
