use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{message}")]
    Transport { message: String, raw_response: String },
    #[error("{0}")] Precondition(String),
    #[error("config error: {0}")] Config(String),
    #[error("io error: {0}")] Io(#[from] std::io::Error),
}

impl GatewayError {
    pub fn transport(message: impl Into<String>) -> Self {
        GatewayError::Transport { message: message.into(), raw_response: String::new() }
    }

    /// The completion body arrived but was not a chat completion.
    pub fn unparsable_body(raw: impl Into<String>) -> Self {
        GatewayError::Transport {
            message: "Error parsing response.".into(),
            raw_response: raw.into(),
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        GatewayError::Precondition(message.into())
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, GatewayError::Precondition(_))
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
