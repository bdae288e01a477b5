//! Common error types for FlowLB components.

use std::fmt;

/// A specialized Result type for FlowLB operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for FlowLB operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Packet error: {0}")]
    Packet(String),

    #[error("OpenFlow error: {0}")]
    OpenFlow(String),

    #[error("Switch channel error: {0}")]
    Switch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new packet error.
    pub fn packet(msg: impl fmt::Display) -> Self {
        Error::Packet(msg.to_string())
    }

    /// Create a new OpenFlow protocol error.
    pub fn openflow(msg: impl fmt::Display) -> Self {
        Error::OpenFlow(msg.to_string())
    }

    /// Create a new switch channel error.
    pub fn switch(msg: impl fmt::Display) -> Self {
        Error::Switch(msg.to_string())
    }

    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new other error.
    pub fn other(msg: impl fmt::Display) -> Self {
        Error::Other(msg.to_string())
    }
}
