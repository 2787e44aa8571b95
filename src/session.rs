//! Caption session controller: label binding, overlay state machine, and call lifecycle.
//!
//! Payloads arrive on provider threads and are decoded there. Overlay work is
//! always handed to the [`UiDispatcher`]; the controller itself never touches
//! a window.

use crate::channel::{DataChannelBinding, DataChannelProvider, PayloadSink};
use crate::dispatch::UiDispatcher;
use crate::error::SttError;
use crate::event::{self, TranslateEvent};
use crate::lock::lock_or_recover;
use crate::logging::loggable;
use crate::overlay::{HostResult, HostSurface};
use std::sync::{Arc, Mutex};

/// Whether captions are currently shown for the call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverlayState {
    #[default]
    Disabled,
    Enabled,
}

/// Call lifecycle codes delivered by the call-state signal source.
///
/// Only [`CallState::Disconnected`] changes caption behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    New,
    Dialing,
    Ringing,
    Holding,
    Active,
    Disconnected,
    Connecting,
    Disconnecting,
    Other(i32),
}

impl CallState {
    pub const DISCONNECTED_CODE: i32 = 7;

    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::New,
            1 => Self::Dialing,
            2 => Self::Ringing,
            3 => Self::Holding,
            4 => Self::Active,
            Self::DISCONNECTED_CODE => Self::Disconnected,
            9 => Self::Connecting,
            10 => Self::Disconnecting,
            other => Self::Other(other),
        }
    }
}

/// Embedder-facing caption API.
pub trait SttController {
    fn enable(&mut self, text_size: u32, label: &str) -> Result<(), SttError>;
    fn disable(&mut self);
    fn on_call_state_changed(&mut self, state: i32);
    fn on_host_surface_result(
        &mut self,
        request_code: i32,
        result_code: i32,
        extra: Option<serde_json::Value>,
    );
}

#[derive(Debug, Default)]
struct Session {
    bound_label: Option<String>,
    text_size: u32,
    last_payload: String,
    state: OverlayState,
}

/// State shared with the channel interceptor.
struct SessionShared {
    session: Mutex<Session>,
    ui: Arc<dyn UiDispatcher>,
}

impl PayloadSink for SessionShared {
    fn on_payload(&self, text: String) {
        tracing::debug!(payload = %loggable(&text), "caption payload arrived");
        let event = decode_payload(&text);
        let mut session = lock_or_recover(&self.session, "payload arrive");
        session.last_payload = text;
        let Some(event) = event else {
            return;
        };
        if session.state == OverlayState::Disabled {
            tracing::debug!(content_id = %event.content_id, "captions disabled; payload kept");
            return;
        }
        // Queued under the guard so a concurrent enable cannot slip a newer
        // size in ahead of this render.
        dispatch_render(self.ui.as_ref(), event, session.text_size);
    }
}

fn decode_payload(text: &str) -> Option<TranslateEvent> {
    match event::decode(text) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(error = %err, payload = %loggable(text), "dropping caption payload");
            None
        }
    }
}

fn dispatch_render(ui: &dyn UiDispatcher, event: TranslateEvent, text_size: u32) {
    // The overlay may be gone by the time this runs; render re-checks.
    ui.dispatch(Box::new(move |overlay| overlay.render(&event, text_size)));
}

pub struct SessionController {
    shared: Arc<SessionShared>,
    binding: DataChannelBinding,
    /// Surface supplied by the embedder; wins over the default context.
    host_surface: Option<Arc<dyn HostSurface>>,
    /// Context the controller was created with; used only if it can host overlays.
    default_surface: Option<Arc<dyn HostSurface>>,
}

impl SessionController {
    pub fn new(
        provider: Arc<dyn DataChannelProvider>,
        ui: Arc<dyn UiDispatcher>,
        default_surface: Option<Arc<dyn HostSurface>>,
    ) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                session: Mutex::new(Session::default()),
                ui,
            }),
            binding: DataChannelBinding::new(provider),
            host_surface: None,
            default_surface,
        }
    }

    pub fn set_host_surface(&mut self, surface: Option<Arc<dyn HostSurface>>) {
        self.host_surface = surface;
    }

    #[must_use]
    pub fn bound_label(&self) -> Option<String> {
        self.session().bound_label.clone()
    }

    #[must_use]
    pub fn text_size(&self) -> u32 {
        self.session().text_size
    }

    #[must_use]
    pub fn state(&self) -> OverlayState {
        self.session().state
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.state() == OverlayState::Enabled
    }

    /// Bind `label` on first use, make sure the overlay exists, and re-render
    /// the last payload at `text_size`.
    pub fn enable(&mut self, text_size: u32, label: &str) -> Result<(), SttError> {
        tracing::debug!(text_size, label, "enable captions");
        let first_bind = {
            let mut session = self.session();
            match session.bound_label.as_deref() {
                None => {
                    session.bound_label = Some(label.to_string());
                    session.text_size = text_size;
                    true
                }
                Some(bound) if bound != label => {
                    tracing::warn!(bound, requested = label, "rejecting data channel rebind");
                    return Err(SttError::LabelConflict {
                        bound: bound.to_string(),
                        requested: label.to_string(),
                    });
                }
                Some(_) => {
                    session.text_size = text_size;
                    false
                }
            }
        };
        if first_bind {
            tracing::debug!(label, "binding caption data channel");
            let sink: Arc<dyn PayloadSink> = self.shared.clone();
            self.binding.register(label, sink)?;
        }

        self.ensure_overlay()?;

        let session = self.session();
        if let Some(event) = decode_payload(&session.last_payload) {
            dispatch_render(self.shared.ui.as_ref(), event, session.text_size);
        }
        Ok(())
    }

    /// Hide and release the overlay. The channel binding stays in place.
    pub fn disable(&mut self) {
        let previous = std::mem::take(&mut self.session().state);
        tracing::debug!(?previous, "disable captions");
        self.shared.ui.dispatch(Box::new(|overlay| overlay.teardown()));
    }

    pub fn on_call_state_changed(&mut self, state: i32) {
        tracing::debug!(state, "call state changed");
        if !self.is_enabled() {
            return;
        }
        if CallState::from_code(state) == CallState::Disconnected {
            self.disable();
        }
    }

    pub fn on_host_surface_result(
        &mut self,
        request_code: i32,
        result_code: i32,
        extra: Option<serde_json::Value>,
    ) {
        tracing::debug!(request_code, result_code, "host surface result");
        if !self.is_enabled() {
            return;
        }
        let result = HostResult {
            request_code,
            result_code,
            extra,
        };
        self.shared
            .ui
            .dispatch(Box::new(move |overlay| overlay.forward_host_result(&result)));
    }

    fn ensure_overlay(&mut self) -> Result<(), SttError> {
        if self.is_enabled() {
            return Ok(());
        }
        let Some(surface) = self.resolve_surface() else {
            tracing::warn!("no host surface for caption overlay");
            return Err(SttError::NoHostSurface);
        };
        tracing::debug!("creating caption overlay");
        self.shared
            .ui
            .dispatch(Box::new(move |overlay| overlay.ensure(&surface)));
        // Flip state only after the ensure is queued so renders observed as
        // enabled always land behind it.
        self.session().state = OverlayState::Enabled;
        Ok(())
    }

    fn resolve_surface(&self) -> Option<Arc<dyn HostSurface>> {
        if let Some(surface) = &self.host_surface {
            return Some(Arc::clone(surface));
        }
        self.default_surface
            .as_ref()
            .filter(|surface| surface.can_host_overlay())
            .map(Arc::clone)
    }

    fn session(&self) -> std::sync::MutexGuard<'_, Session> {
        lock_or_recover(&self.shared.session, "session controller")
    }
}

impl SttController for SessionController {
    fn enable(&mut self, text_size: u32, label: &str) -> Result<(), SttError> {
        SessionController::enable(self, text_size, label)
    }

    fn disable(&mut self) {
        SessionController::disable(self);
    }

    fn on_call_state_changed(&mut self, state: i32) {
        SessionController::on_call_state_changed(self, state);
    }

    fn on_host_surface_result(
        &mut self,
        request_code: i32,
        result_code: i32,
        extra: Option<serde_json::Value>,
    ) {
        SessionController::on_host_surface_result(self, request_code, result_code, extra);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LoopbackProvider;
    use crate::dispatch::UiThread;
    use crate::overlay::test_support::{RecordingSurface, WindowCall};
    use proptest::prelude::*;
    use rstest::rstest;
    use std::thread;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);
    const SAMPLE: &str = r#"{"contentId":"1","contentType":2,"content":"你好","contentEng":"Hello","time":1676448103104}"#;

    struct Harness {
        controller: SessionController,
        provider: Arc<LoopbackProvider>,
        ui: Arc<UiThread>,
        surface: Arc<RecordingSurface>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_default_surface(true)
        }

        fn with_default_surface(usable: bool) -> Self {
            let provider = Arc::new(LoopbackProvider::new());
            let ui = Arc::new(UiThread::spawn().expect("spawn ui thread"));
            let surface = RecordingSurface::with_usable(usable);
            let default_surface: Arc<dyn HostSurface> = surface.clone();
            let controller =
                SessionController::new(provider.clone(), ui.clone(), Some(default_surface));
            Self {
                controller,
                provider,
                ui,
                surface,
            }
        }

        fn settle(&self) {
            assert!(self.ui.flush(WAIT), "ui thread should drain");
        }

        fn calls(&self) -> Vec<WindowCall> {
            self.settle();
            self.surface.recorder.calls()
        }
    }

    fn show(content: &str, english: &str) -> WindowCall {
        WindowCall::Show {
            content: content.to_string(),
            english: english.to_string(),
        }
    }

    #[test]
    fn enable_then_payload_shows_caption_at_requested_size() {
        let mut h = Harness::new();
        h.controller.enable(14, "dc1").expect("enable");
        assert_eq!(h.provider.deliver("dc1", SAMPLE.as_bytes()), Some(true));

        assert_eq!(
            h.calls(),
            vec![show("你好", "Hello"), WindowCall::TextSize(14)]
        );
        assert_eq!(h.surface.recorder.opened(), 1);
        assert!(h.controller.is_enabled());
    }

    #[test]
    fn enable_with_same_label_updates_size_and_rerenders_last_payload() {
        let mut h = Harness::new();
        h.controller.enable(14, "dc1").expect("enable");
        h.provider.deliver("dc1", SAMPLE.as_bytes());
        h.controller.enable(20, "dc1").expect("re-enable");

        assert_eq!(
            h.calls(),
            vec![
                show("你好", "Hello"),
                WindowCall::TextSize(14),
                show("你好", "Hello"),
                WindowCall::TextSize(20),
            ]
        );
        assert_eq!(h.controller.text_size(), 20);
        assert_eq!(h.surface.recorder.opened(), 1);
        assert_eq!(h.provider.labels(), vec!["dc1".to_string()]);
    }

    #[test]
    fn repeated_enable_renders_the_same_state() {
        let mut once = Harness::new();
        once.controller.enable(14, "dc1").expect("enable");
        assert_eq!(once.provider.deliver("dc1", SAMPLE.as_bytes()), Some(true));

        let mut twice = Harness::new();
        twice.controller.enable(14, "dc1").expect("enable");
        assert_eq!(twice.provider.deliver("dc1", SAMPLE.as_bytes()), Some(true));
        twice.controller.enable(14, "dc1").expect("enable again");

        let last_two = |calls: Vec<WindowCall>| calls[calls.len() - 2..].to_vec();
        assert_eq!(last_two(once.calls()), last_two(twice.calls()));
        assert_eq!(twice.surface.recorder.opened(), 1);
        assert_eq!(once.controller.state(), twice.controller.state());
    }

    #[test]
    fn zero_text_size_skips_size_update() {
        let mut h = Harness::new();
        h.controller.enable(0, "dc1").expect("enable");
        h.provider.deliver("dc1", SAMPLE.as_bytes());
        assert_eq!(h.calls(), vec![show("你好", "Hello")]);
    }

    #[test]
    fn disable_is_idempotent_and_safe_before_enable() {
        let mut h = Harness::new();
        h.controller.disable();
        h.controller.disable();
        assert_eq!(h.controller.state(), OverlayState::Disabled);
        assert!(h.calls().is_empty());

        h.controller.enable(14, "dc1").expect("enable");
        h.controller.disable();
        h.controller.disable();
        assert_eq!(h.calls(), vec![WindowCall::Hide]);
        assert_eq!(h.controller.bound_label().as_deref(), Some("dc1"));
        assert_eq!(h.provider.labels(), vec!["dc1".to_string()]);
    }

    #[test]
    fn malformed_payload_is_handled_and_not_rendered() {
        let mut h = Harness::new();
        h.controller.enable(14, "dc1").expect("enable");

        assert_eq!(h.provider.deliver("dc1", b"{\"contentId\":"), Some(true));
        assert_eq!(h.provider.deliver("dc1", b"not json"), Some(true));
        assert_eq!(h.provider.deliver("dc1", b"   "), Some(true));
        assert_eq!(h.provider.deliver("dc1", &[0xc3, 0x28]), Some(true));

        assert!(h.calls().is_empty());
        assert!(h.controller.is_enabled());
    }

    #[test]
    fn disconnect_hides_overlay_and_later_payloads_do_not_reshow() {
        let mut h = Harness::new();
        h.controller.enable(14, "dc1").expect("enable");
        h.controller.on_call_state_changed(CallState::DISCONNECTED_CODE);
        assert_eq!(h.controller.state(), OverlayState::Disabled);

        assert_eq!(h.provider.deliver("dc1", SAMPLE.as_bytes()), Some(true));
        assert_eq!(h.calls(), vec![WindowCall::Hide]);
    }

    #[test]
    fn call_state_changes_are_ignored_while_disabled_or_not_disconnected() {
        let mut h = Harness::new();
        h.controller.on_call_state_changed(CallState::DISCONNECTED_CODE);
        assert!(h.calls().is_empty());

        h.controller.enable(14, "dc1").expect("enable");
        h.controller.on_call_state_changed(4);
        h.controller.on_call_state_changed(3);
        assert!(h.controller.is_enabled());
        assert!(h.calls().is_empty());
    }

    #[test]
    fn host_result_is_forwarded_only_while_enabled() {
        let mut h = Harness::new();
        h.controller.on_host_surface_result(1, 0, None);

        h.controller.enable(14, "dc1").expect("enable");
        let extra = serde_json::json!({"overlay_permission": true});
        h.controller.on_host_surface_result(1001, -1, Some(extra.clone()));

        h.controller.disable();
        h.controller.on_host_surface_result(1002, -1, None);

        assert_eq!(
            h.calls(),
            vec![
                WindowCall::Result(HostResult {
                    request_code: 1001,
                    result_code: -1,
                    extra: Some(extra),
                }),
                WindowCall::Hide,
            ]
        );
    }

    #[test]
    fn missing_host_surface_fails_lazily_after_binding() {
        let provider = Arc::new(LoopbackProvider::new());
        let ui = Arc::new(UiThread::spawn().expect("spawn ui thread"));
        let mut controller = SessionController::new(provider.clone(), ui.clone(), None);

        assert_eq!(controller.enable(14, "dc1"), Err(SttError::NoHostSurface));
        assert_eq!(controller.state(), OverlayState::Disabled);
        assert_eq!(controller.bound_label().as_deref(), Some("dc1"));
        assert_eq!(provider.labels(), vec!["dc1".to_string()]);

        provider.deliver("dc1", SAMPLE.as_bytes());
        let recording = RecordingSurface::new();
        controller.set_host_surface(Some(recording.clone()));
        controller.enable(14, "dc1").expect("enable with surface");

        assert!(ui.flush(WAIT));
        assert_eq!(
            recording.recorder.calls(),
            vec![show("你好", "Hello"), WindowCall::TextSize(14)]
        );
    }

    #[test]
    fn default_context_that_cannot_host_overlays_is_not_used() {
        let mut h = Harness::with_default_surface(false);
        assert_eq!(h.controller.enable(14, "dc1"), Err(SttError::NoHostSurface));
        assert_eq!(h.surface.recorder.opened(), 0);

        let explicit = RecordingSurface::new();
        h.controller.set_host_surface(Some(explicit.clone()));
        h.controller.enable(14, "dc1").expect("explicit surface wins");
        h.settle();
        assert_eq!(explicit.recorder.opened(), 1);
        assert_eq!(h.surface.recorder.opened(), 0);
    }

    /// Holds the next dispatch on the calling thread for a while before forwarding it.
    struct StallingDispatcher {
        inner: Arc<UiThread>,
        stall_next: Mutex<Option<crossbeam_channel::Sender<()>>>,
    }

    impl UiDispatcher for StallingDispatcher {
        fn dispatch(&self, action: crate::dispatch::OverlayAction) {
            let stall = self.stall_next.lock().expect("stall lock").take();
            if let Some(entered) = stall {
                let _ = entered.send(());
                thread::sleep(Duration::from_millis(150));
            }
            self.inner.dispatch(action);
        }
    }

    #[test]
    fn size_change_during_payload_render_keeps_newest_size() {
        let provider = Arc::new(LoopbackProvider::new());
        let ui = Arc::new(UiThread::spawn().expect("spawn ui thread"));
        let stalling = Arc::new(StallingDispatcher {
            inner: Arc::clone(&ui),
            stall_next: Mutex::new(None),
        });
        let recording = RecordingSurface::new();
        let mut controller =
            SessionController::new(provider.clone(), stalling.clone(), Some(recording.clone()));
        controller.enable(14, "dc1").expect("enable");

        let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
        *stalling.stall_next.lock().expect("stall lock") = Some(entered_tx);
        let delivering = Arc::clone(&provider);
        let sender = thread::spawn(move || delivering.deliver("dc1", SAMPLE.as_bytes()));
        entered_rx
            .recv_timeout(WAIT)
            .expect("payload render should reach the dispatcher");

        controller.enable(20, "dc1").expect("resize");
        assert_eq!(sender.join().expect("sender thread"), Some(true));
        assert!(ui.flush(WAIT));

        let calls = recording.recorder.calls();
        assert_eq!(controller.text_size(), 20);
        assert_eq!(calls.last(), Some(&WindowCall::TextSize(20)));
    }

    #[test]
    fn payload_racing_disable_ends_hidden() {
        let mut h = Harness::new();
        h.controller.enable(14, "dc1").expect("enable");

        let provider = Arc::clone(&h.provider);
        let sender = thread::spawn(move || {
            for _ in 0..200 {
                assert_eq!(provider.deliver("dc1", SAMPLE.as_bytes()), Some(true));
            }
        });
        h.controller.disable();
        sender.join().expect("sender thread");

        let calls = h.calls();
        assert_eq!(calls.last(), Some(&WindowCall::Hide));
        assert_eq!(
            calls.iter().filter(|call| **call == WindowCall::Hide).count(),
            1
        );
        assert!(!h.controller.is_enabled());
    }

    #[rstest]
    #[case(0, CallState::New)]
    #[case(4, CallState::Active)]
    #[case(7, CallState::Disconnected)]
    #[case(10, CallState::Disconnecting)]
    #[case(42, CallState::Other(42))]
    fn call_state_codes(#[case] code: i32, #[case] expected: CallState) {
        assert_eq!(CallState::from_code(code), expected);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn rebinding_to_a_different_label_is_rejected(
            first in "[a-z0-9]{1,8}",
            second in "[a-z0-9]{1,8}",
            size in 0u32..64,
        ) {
            prop_assume!(first != second);
            let mut h = Harness::new();
            h.controller.enable(size, &first).expect("first enable");

            let err = h.controller.enable(size + 1, &second);
            prop_assert_eq!(
                err,
                Err(SttError::LabelConflict { bound: first.clone(), requested: second.clone() })
            );
            prop_assert_eq!(h.controller.bound_label(), Some(first.clone()));
            prop_assert_eq!(h.controller.text_size(), size);
            prop_assert!(h.controller.is_enabled());
            prop_assert_eq!(h.provider.labels(), vec![first.clone()]);
            prop_assert_eq!(h.provider.deliver(&second, SAMPLE.as_bytes()), None);
        }
    }
}
