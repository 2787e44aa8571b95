//! Data channel binding: one labeled interceptor registration per controller.

use crate::error::SttError;
use crate::lock::lock_or_recover;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Handler the provider calls for every payload arriving on its label.
pub trait DataInterceptor: Send + Sync {
    fn label(&self) -> &str;

    /// Returns whether the payload was handled; may run on any thread.
    fn on_data_arrive(&self, data: &[u8]) -> bool;
}

/// Transport that delivers raw bytes over named data channels.
pub trait DataChannelProvider: Send + Sync {
    fn register_interceptor(&self, interceptor: Arc<dyn DataInterceptor>);
}

/// Receives payload text decoded from channel bytes.
pub(crate) trait PayloadSink: Send + Sync {
    fn on_payload(&self, text: String);
}

struct PayloadInterceptor {
    label: String,
    sink: Arc<dyn PayloadSink>,
}

impl DataInterceptor for PayloadInterceptor {
    fn label(&self) -> &str {
        &self.label
    }

    fn on_data_arrive(&self, data: &[u8]) -> bool {
        let text = String::from_utf8_lossy(data).into_owned();
        self.sink.on_payload(text);
        // Malformed payloads are dropped downstream; the channel always counts them handled.
        true
    }
}

pub(crate) struct DataChannelBinding {
    provider: Arc<dyn DataChannelProvider>,
    registered: Option<String>,
}

impl DataChannelBinding {
    pub(crate) fn new(provider: Arc<dyn DataChannelProvider>) -> Self {
        Self {
            provider,
            registered: None,
        }
    }

    pub(crate) fn register(
        &mut self,
        label: &str,
        sink: Arc<dyn PayloadSink>,
    ) -> Result<(), SttError> {
        if let Some(existing) = &self.registered {
            tracing::error!(existing = %existing, requested = label, "interceptor registered twice");
            return Err(SttError::AlreadyRegistered {
                label: existing.clone(),
            });
        }
        self.provider.register_interceptor(Arc::new(PayloadInterceptor {
            label: label.to_string(),
            sink,
        }));
        self.registered = Some(label.to_string());
        tracing::debug!(label, "data channel interceptor registered");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn label(&self) -> Option<&str> {
        self.registered.as_deref()
    }
}

/// In-process provider that routes payloads to interceptors by label.
#[derive(Default)]
pub struct LoopbackProvider {
    interceptors: Mutex<HashMap<String, Arc<dyn DataInterceptor>>>,
}

impl LoopbackProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `data` on `label`; `None` when nothing listens on that label.
    pub fn deliver(&self, label: &str, data: &[u8]) -> Option<bool> {
        let interceptor = lock_or_recover(&self.interceptors, "loopback deliver")
            .get(label)
            .cloned()?;
        Some(interceptor.on_data_arrive(data))
    }

    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = lock_or_recover(&self.interceptors, "loopback labels")
            .keys()
            .cloned()
            .collect();
        labels.sort();
        labels
    }
}

impl DataChannelProvider for LoopbackProvider {
    fn register_interceptor(&self, interceptor: Arc<dyn DataInterceptor>) {
        let label = interceptor.label().to_string();
        let previous = lock_or_recover(&self.interceptors, "loopback register")
            .insert(label.clone(), interceptor);
        if previous.is_some() {
            tracing::warn!(label = %label, "loopback interceptor replaced");
        }
    }
}
