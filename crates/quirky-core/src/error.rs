use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuirkyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid config value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, QuirkyError>;
