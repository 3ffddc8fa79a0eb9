//! Application error type.
//!
//! Every fallible path in the crate returns `Result<T, AppError>`. Each variant
//! maps to a process exit code so `lr` can be scripted:
//!
//! | code | meaning |
//! |------|---------|
//! | 2 | bad configuration, CLI input or file I/O |
//! | 3 | not enough history to classify the regime |
//! | 4 | provider / data errors |

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Io(String),

    #[error("Insufficient history: {0}")]
    InsufficientHistory(String),

    #[error("{0}")]
    Data(String),
}

impl AppError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    pub fn insufficient_history(message: impl Into<String>) -> Self {
        Self::InsufficientHistory(message.into())
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::Data(message.into())
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) | AppError::Io(_) => 2,
            AppError::InsufficientHistory(_) => 3,
            AppError::Data(_) => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        assert_eq!(AppError::config("x").exit_code(), 2);
        assert_eq!(AppError::io("x").exit_code(), 2);
        assert_eq!(AppError::insufficient_history("x").exit_code(), 3);
        assert_eq!(AppError::data("x").exit_code(), 4);
    }

    #[test]
    fn insufficient_history_message_is_prefixed() {
        let err = AppError::insufficient_history("need 12 weeks of balance sheet data");
        assert_eq!(err.to_string(), "Insufficient history: need 12 weeks of balance sheet data");
    }
}
