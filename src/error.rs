//! Error types for zero-mysql-cursor.

use thiserror::Error;

/// Result type for zero-mysql-cursor operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error reported by the server in an ERR packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerError {
    /// MySQL error number (e.g. 1064 for a syntax error)
    pub code: u16,
    /// SQLSTATE (5 characters)
    pub sql_state: String,
    /// Human-readable message
    pub message: String,
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}) [{}] {}", self.code, self.sql_state, self.message)
    }
}

/// Error type for zero-mysql-cursor.
#[derive(Debug, Error)]
pub enum Error {
    /// The operation is invalid in the current state
    /// (execute on a closed cursor, execute without a prepared statement, ...).
    #[error("Programming error: {0}")]
    Programming(String),

    /// An argument has the wrong shape (non-textual statement, mapping where a
    /// sequence is required, ...).
    #[error("Type error: {0}")]
    Type(String),

    /// The connection's packet stream is out of step with the server.
    #[error("Interface error: {0}")]
    Interface(String),

    /// Server error response
    #[error("MySQL error: {0}")]
    Server(ServerError),

    /// Protocol error (malformed packet, unexpected response, etc.)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A value could not be decoded into the requested Rust type
    #[error("Decode error: {0}")]
    Decode(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection is broken and cannot be reused
    #[error("Connection is broken")]
    ConnectionBroken,

    /// Invalid usage (e.g., nested transactions)
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    /// Operation not supported by this cursor or server response
    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl Error {
    /// Returns true if the error indicates the connection is broken and cannot be reused.
    pub fn is_connection_broken(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::ConnectionBroken | Error::Protocol(_) | Error::Interface(_)
        )
    }

    /// Get the MySQL error number if this is a server error.
    pub fn server_code(&self) -> Option<u16> {
        match self {
            Error::Server(err) => Some(err.code),
            _ => None,
        }
    }

    /// Get the SQLSTATE if this is a server error.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Error::Server(err) => Some(err.sql_state.as_str()),
            _ => None,
        }
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

impl<Src: std::fmt::Debug, Dst: std::fmt::Debug + ?Sized>
    From<zerocopy::error::CastError<Src, Dst>> for Error
{
    fn from(err: zerocopy::error::CastError<Src, Dst>) -> Self {
        Error::Protocol(format!("zerocopy cast error: {err:?}"))
    }
}
