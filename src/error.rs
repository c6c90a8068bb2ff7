//! Error types for khel-io

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// khel-io error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Server refused the connection and retrying was not requested
    #[error("Connection refused by {addr} (server is down)")]
    ConnectionRefused {
        /// Address we tried to reach
        addr: String,
    },

    /// Socket was closed or reset by the simulation server
    #[error("Socket was closed by the simulation server")]
    ConnectionLost,

    /// Frame header announced more bytes than we accept
    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Announced body size
        size: usize,
        /// Accepted maximum
        max: usize,
    },

    /// Startup handshake did not deliver required identity information
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Monitor command issued without a monitor link
    #[error("Monitor link not available")]
    MonitorUnavailable,

    /// Configuration file could not be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration parsed but is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Teammate broadcast could not be decoded
    #[error("Radio decode failed: {0}")]
    RadioDecode(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Transport and handshake failures end the agent; there is no
    /// reconnect path once a match is running.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::ConnectionRefused { .. }
                | Error::ConnectionLost
                | Error::FrameTooLarge { .. }
                | Error::Handshake(_)
        )
    }

    /// Map an I/O error raised on the agent socket into the transport taxonomy.
    ///
    /// Short reads, resets and broken pipes all mean the server is gone.
    pub(crate) fn from_socket(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => Error::ConnectionLost,
            _ => Error::Io(err),
        }
    }
}
