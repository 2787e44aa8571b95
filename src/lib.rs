//! Caption/translation overlay control for an active call.
//!
//! A [`SessionController`] binds one data channel label, decodes the caption
//! events arriving on it, and keeps a single overlay window in step with the
//! event stream and the call lifecycle. Transport, windowing, and host
//! context are supplied by the embedder through the traits re-exported here.

pub mod channel;
pub mod config;
pub mod dispatch;
mod error;
pub mod event;
mod lock;
pub mod logging;
pub mod overlay;
pub mod session;

pub use channel::{DataChannelProvider, DataInterceptor, LoopbackProvider};
pub use config::AppConfig;
pub use dispatch::{OverlayAction, UiDispatcher, UiThread};
pub use error::SttError;
pub use event::{ContentType, DecodeError, TranslateEvent};
pub use overlay::{HostResult, HostSurface, OverlayLifecycle, OverlayWindow};
pub use session::{CallState, OverlayState, SessionController, SttController};
