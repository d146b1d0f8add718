use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure aborts the current run; nothing is retried.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or contradictory settings, detected before any provider call
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Any failure reported by the identity provider
    #[error("{operation} failed: {message}")]
    Provider {
        operation: &'static str,
        message: String,
    },

    /// Operator input or credential store / export file access
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn provider(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Provider {
            operation,
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::Interrupted)
    }
}
