use thiserror::Error;

/// Failure taxonomy for one upload-and-personalize operation.
///
/// `Display` renders the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("Please select a photo first")]
    NoFileSelected,
    #[error("A photo is already being processed")]
    SubmissionInProgress,
    #[error(
        "Request timed out. The image processing is taking longer than expected. Please try again."
    )]
    Timeout,
    #[error("{message}")]
    HttpError { status: u16, message: String },
    /// `excerpt` is for diagnostics only and never part of the message.
    #[error("Invalid response format from server: expected JSON")]
    InvalidResponseFormat { excerpt: String },
    #[error("Invalid response from server: missing image data")]
    MissingImageData,
    #[error("Could not reach the personalization service: {0}")]
    Transport(String),
    #[error("No personalized image is available to download")]
    NoResultAvailable,
    #[error("Failed to save image: {0}")]
    Download(String),
}

impl ErrorKind {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::HttpError {
            status,
            message: message.into(),
        }
    }

    /// Whether the user can reasonably try the same action again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::Transport(_)
                | Self::InvalidResponseFormat { .. }
                | Self::SubmissionInProgress
        ) || matches!(self, Self::HttpError { status, .. } if *status >= 500)
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}
