//! Control-path errors returned to the embedder.

/// Failures surfaced by [`crate::SessionController`] operations.
///
/// Decode failures never appear here; they stay on the delivery path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SttError {
    /// The controller is already bound to a different data channel label.
    LabelConflict { bound: String, requested: String },
    /// The overlay had to be created but no usable host surface was available.
    NoHostSurface,
    /// A second interceptor registration was attempted on one binding.
    AlreadyRegistered { label: String },
}

impl std::fmt::Display for SttError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LabelConflict { bound, requested } => write!(
                f,
                "data channel label {requested:?} differs from bound label {bound:?}"
            ),
            Self::NoHostSurface => write!(f, "no host surface available for the overlay"),
            Self::AlreadyRegistered { label } => {
                write!(f, "data channel interceptor already registered for {label:?}")
            }
        }
    }
}

impl std::error::Error for SttError {}
