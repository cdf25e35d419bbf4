use thiserror::Error;
use serde::Serialize;

#[derive(Error, Debug, Serialize)]
pub enum AppError {
    #[error("I/O Error: {0}")]
    Io(String),

    #[error("Network Error: {0}")]
    Network(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Calculation Error: {0}")]
    Calculation(String),

    #[error("Validation Error: {0}")]
    Validation(String),
}

// Implement conversion from standard errors
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("Serialization error: {}", err))
    }
}

impl From<keyring::Error> for AppError {
    fn from(err: keyring::Error) -> Self {
        AppError::Config(format!("Keyring error: {}", err))
    }
}

impl From<crate::core::features::unit_converter::ConversionError> for AppError {
    fn from(err: crate::core::features::unit_converter::ConversionError) -> Self {
        use crate::core::features::unit_converter::ConversionError;
        match err {
            ConversionError::InvalidInput => AppError::Calculation(err.to_string()),
            ConversionError::UnknownUnit { .. } => AppError::Validation(err.to_string()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
