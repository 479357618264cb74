//! Asynchronous MySQL client using Tokio.

mod conn;
mod cursor;
mod prepared;
mod stream;
mod transaction;

pub use conn::Conn;
pub use cursor::Cursor;
pub use prepared::PreparedCursor;
pub use stream::{PacketStream, Stream};
pub use transaction::Transaction;
