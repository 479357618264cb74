//! MySQL client/server protocol payloads.
//!
//! Everything here works on packet payloads; the 4-byte packet header is
//! handled by the transport.

pub mod codec;
pub mod command;
pub mod packet;
pub mod response;
pub mod row;
pub mod types;
