/// Convenience result type used across pulsereel.
pub type PulseResult<T> = Result<T, PulseError>;

/// Top-level error taxonomy.
///
/// Per-job variants (`AudioNotFound`, `ProbeFailed`, `EncoderSpawn`, `EncoderExitNonZero`) abort a
/// single render. `VisualizationUnavailable` and `CompositorLayer` are recoverable inside the frame
/// loop and only surface when a caller asks for them directly.
#[derive(thiserror::Error, Debug)]
pub enum PulseError {
    /// Invalid user-provided configuration or timeline data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Input audio path does not resolve to a file.
    #[error("audio not found: {0}")]
    AudioNotFound(String),

    /// The external inspector could not determine the audio duration.
    #[error("probe failed: {0}")]
    ProbeFailed(String),

    /// The spectral analyzer could not produce a sample.
    #[error("visualization unavailable: {0}")]
    VisualizationUnavailable(String),

    /// A single compositor layer could not be drawn.
    #[error("compositor layer '{layer}' failed: {message}")]
    CompositorLayer {
        /// Layer name.
        layer: &'static str,
        /// Failure detail.
        message: String,
    },

    /// The encoder process could not be started.
    #[error("encoder spawn error: {0}")]
    EncoderSpawn(String),

    /// The encoder exited unsuccessfully.
    #[error("encoder exited with code {code:?}: {stderr_tail}")]
    EncoderExitNonZero {
        /// Process exit code, `None` when terminated by a signal.
        code: Option<i32>,
        /// Last characters of the encoder's stderr.
        stderr_tail: String,
    },

    /// The render was cancelled by the caller.
    #[error("render cancelled")]
    Cancelled,

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PulseError {
    /// Build a [`PulseError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`PulseError::AudioNotFound`] value.
    pub fn audio_not_found(msg: impl Into<String>) -> Self {
        Self::AudioNotFound(msg.into())
    }

    /// Build a [`PulseError::ProbeFailed`] value.
    pub fn probe_failed(msg: impl Into<String>) -> Self {
        Self::ProbeFailed(msg.into())
    }

    /// Build a [`PulseError::VisualizationUnavailable`] value.
    pub fn visualization(msg: impl Into<String>) -> Self {
        Self::VisualizationUnavailable(msg.into())
    }

    /// Build a [`PulseError::CompositorLayer`] value.
    pub fn layer(layer: &'static str, msg: impl Into<String>) -> Self {
        Self::CompositorLayer {
            layer,
            message: msg.into(),
        }
    }

    /// Build a [`PulseError::EncoderSpawn`] value.
    pub fn encoder_spawn(msg: impl Into<String>) -> Self {
        Self::EncoderSpawn(msg.into())
    }

    /// Build a [`PulseError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Whether this failure ends the job (as opposed to degrading one frame or layer).
    pub fn is_fatal_for_job(&self) -> bool {
        !matches!(
            self,
            Self::VisualizationUnavailable(_) | Self::CompositorLayer { .. }
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
