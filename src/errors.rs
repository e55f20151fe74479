use thiserror::Error;

pub const MISSING_IMAGE_MESSAGE: &str = "No image data provided.";
pub const UNKNOWN_GENERATION_MESSAGE: &str = "An unknown error occurred during content generation.";

/// Failures surfaced by the flows and the aggregator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("{}", MISSING_IMAGE_MESSAGE)]
    MissingInput,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Generation(String),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Message handed back to the caller. Generation failures without any
    /// text fall back to a generic message.
    pub fn user_message(&self) -> String {
        let msg = self.to_string();
        if msg.trim().is_empty() {
            UNKNOWN_GENERATION_MESSAGE.to_string()
        } else {
            msg
        }
    }
}

/// Errors raised behind the generation client boundary.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Gemini API error (status {status}): {body}")]
    Status { status: u16, body: String },
    #[error("Model refused the request: {0}")]
    Refused(String),
    #[error("Model returned no content")]
    Empty,
    #[error("Could not parse model output: {0}")]
    Parse(String),
    #[error("{0}")]
    Other(String),
}

impl From<GenerationError> for CoreError {
    fn from(err: GenerationError) -> Self {
        CoreError::Generation(err.to_string())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
