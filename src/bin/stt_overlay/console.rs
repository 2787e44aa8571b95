//! Console-backed host surface: the "overlay" reports its mutations as JSON events.

use crate::protocol::{send_event, HarnessEvent};
use stt_overlay::{HostResult, HostSurface, OverlayWindow, TranslateEvent};

pub(crate) struct ConsoleSurface;

impl HostSurface for ConsoleSurface {
    fn open_overlay(&self) -> Box<dyn OverlayWindow> {
        send_event(&HarnessEvent::Status {
            message: "overlay opened".to_string(),
        });
        Box::new(ConsoleOverlay)
    }
}

struct ConsoleOverlay;

impl OverlayWindow for ConsoleOverlay {
    fn show(&mut self, event: &TranslateEvent) {
        send_event(&HarnessEvent::OverlayShow {
            content_id: event.content_id.clone(),
            content_type: event.content_type.code(),
            content: event.content.clone(),
            content_eng: event.content_english.clone(),
            time: event.timestamp_millis,
        });
    }

    fn hide(&mut self) {
        send_event(&HarnessEvent::OverlayHide);
    }

    fn update_text_size(&mut self, units: u32) {
        send_event(&HarnessEvent::OverlayTextSize { units });
    }

    fn forward_result(&mut self, result: &HostResult) {
        send_event(&HarnessEvent::OverlayResult {
            request_code: result.request_code,
            result_code: result.result_code,
            extra: result.extra.clone(),
        });
    }
}
