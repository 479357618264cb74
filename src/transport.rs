//! The connection capability the cursor engine runs on.
//!
//! A transport is a byte stream that has already completed the MySQL
//! handshake. It sends command payloads and returns response payloads one
//! packet at a time. Framing implementations live in
//! [`sync::PacketStream`](crate::sync::PacketStream) and
//! [`tokio::PacketStream`](crate::tokio::PacketStream).

use crate::error::Result;
use crate::protocol::types::ServerStatus;

/// Session facts negotiated during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionInfo {
    /// CLIENT_DEPRECATE_EOF was negotiated: result sets end with an OK
    /// packet instead of EOF.
    pub deprecate_eof: bool,
    /// Server status flags from the handshake.
    pub status: ServerStatus,
    /// Server thread id.
    pub connection_id: u32,
}

impl Default for SessionInfo {
    fn default() -> Self {
        Self {
            deprecate_eof: true,
            status: ServerStatus::AUTOCOMMIT,
            connection_id: 0,
        }
    }
}

/// Blocking transport.
pub trait Transport {
    /// Send one command. `payload` starts with the command byte; the packet
    /// sequence id restarts at zero.
    fn send_command(&mut self, payload: &[u8]) -> Result<()>;

    /// Read the next packet payload into `buf`, replacing its contents.
    /// Multi-packet payloads are reassembled.
    fn read_packet(&mut self, buf: &mut Vec<u8>) -> Result<()>;

    /// Session facts from the handshake.
    fn session(&self) -> SessionInfo;
}

/// Async transport for tokio.
#[cfg(feature = "tokio")]
pub trait AsyncTransport: Send {
    /// Send one command. See [`Transport::send_command`].
    fn send_command(
        &mut self,
        payload: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Read the next packet payload. See [`Transport::read_packet`].
    fn read_packet(
        &mut self,
        buf: &mut Vec<u8>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Session facts from the handshake.
    fn session(&self) -> SessionInfo;
}
