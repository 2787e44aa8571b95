//! UI-affine dispatch: every overlay mutation runs on one thread that owns the overlay.

use crate::lock::lock_or_recover;
use crate::overlay::OverlayLifecycle;
use crossbeam_channel::{Receiver, Sender};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// Overlay mutation executed on the UI context.
pub type OverlayAction = Box<dyn FnOnce(&mut OverlayLifecycle) + Send + 'static>;

/// Marshals overlay actions onto the UI-affine context.
///
/// Actions submitted from one thread run in submission order. Dispatch is
/// fire-and-forget; there is no cancellation.
pub trait UiDispatcher: Send + Sync {
    fn dispatch(&self, action: OverlayAction);
}

enum UiMessage {
    Run(OverlayAction),
    Flush(Sender<()>),
    Shutdown,
}

/// Dedicated UI thread that owns the [`OverlayLifecycle`].
pub struct UiThread {
    tx: Sender<UiMessage>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl UiThread {
    pub fn spawn() -> io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = thread::Builder::new()
            .name("stt-overlay-ui".to_string())
            .spawn(move || run_ui_loop(rx))?;
        Ok(Self {
            tx,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Wait until every action queued before this call has run.
    ///
    /// Must not be called from inside an action; it would wait out `timeout`.
    pub fn flush(&self, timeout: Duration) -> bool {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if self.tx.send(UiMessage::Flush(ack_tx)).is_err() {
            return false;
        }
        ack_rx.recv_timeout(timeout).is_ok()
    }

    /// Drain queued actions, tear the overlay down, and join the thread.
    pub fn shutdown(&self) {
        let handle = lock_or_recover(&self.handle, "ui thread shutdown").take();
        let Some(handle) = handle else {
            return;
        };
        let _ = self.tx.send(UiMessage::Shutdown);
        if handle.join().is_err() {
            tracing::error!("ui thread exited with a panic");
        }
    }
}

impl UiDispatcher for UiThread {
    fn dispatch(&self, action: OverlayAction) {
        if self.tx.send(UiMessage::Run(action)).is_err() {
            tracing::debug!("ui thread stopped; overlay action dropped");
        }
    }
}

impl Drop for UiThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_ui_loop(rx: Receiver<UiMessage>) {
    let mut overlay = OverlayLifecycle::new();
    for message in rx.iter() {
        match message {
            UiMessage::Run(action) => {
                // A panicking window implementation must not take the UI thread down.
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| action(&mut overlay)));
                if outcome.is_err() {
                    tracing::error!("overlay action panicked; continuing");
                }
            }
            UiMessage::Flush(ack) => {
                let _ = ack.send(());
            }
            UiMessage::Shutdown => break,
        }
    }
    overlay.teardown();
    tracing::debug!("ui thread exiting");
}
