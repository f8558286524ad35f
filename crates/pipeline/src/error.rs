use slidecast_core::ffmpeg::FfmpegError;

/// Failure of one collaborator call or of a whole stage.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// The collaborator has nothing to offer for this input.
    #[error("not available: {0}")]
    NotAvailable(String),

    /// The collaborator does not handle this kind of input at all. Fallback
    /// chains skip such providers without reporting them.
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("{provider} failed: {message}")]
    Provider { provider: String, message: String },

    /// Every provider of a fallback chain failed.
    #[error("all providers failed ({0})")]
    Exhausted(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ffmpeg error: {0}")]
    Ffmpeg(#[from] FfmpegError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid output: {0}")]
    InvalidOutput(String),

    #[error("collaborator panicked: {0}")]
    Panicked(String),

    #[error("cancelled")]
    Cancelled,
}

impl StageError {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}
