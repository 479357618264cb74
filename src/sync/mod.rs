//! Synchronous MySQL client.

mod conn;
mod cursor;
mod prepared;
mod stream;
mod transaction;

pub use conn::Conn;
pub use cursor::{Cursor, Rows};
pub use prepared::PreparedCursor;
pub use stream::{PacketStream, Stream};
pub use transaction::Transaction;
