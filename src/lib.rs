//! Cursor execution and result streaming for the MySQL wire protocol.
//!
//! # Features
//!
//! - **Buffered and unbuffered cursors**: read a result set at once, or
//!   stream it row by row while the connection holds it open
//! - **Drain on abandonment**: a result left on the wire is always read off
//!   before the next command, so the packet stream never desynchronizes
//! - **Batched inserts**: `executemany` rewrites `INSERT ... VALUES` into
//!   multi-row statements
//! - **Prepared statement cursors**: prepare, bind, execute, reset
//! - **Sans-I/O state machines**: protocol logic is separated from I/O
//! - **Sync and async APIs**: choose between blocking and tokio-based async
//!
//! The engine runs on a [`Transport`]: a byte stream that already completed
//! the MySQL handshake. [`sync::PacketStream`] and [`tokio::PacketStream`]
//! frame any such stream.
//!
//! # Example
//!
//! ```no_run
//! use zero_mysql_cursor::sync::{Conn, PacketStream, Stream};
//! use zero_mysql_cursor::{CursorKind, Opts, SessionInfo};
//!
//! fn main() -> zero_mysql_cursor::Result<()> {
//!     let opts = Opts::try_from("mysql://app@localhost/shop")?;
//!     let stream = Stream::connect(&opts)?;
//!     // ... authenticate `stream` ...
//!     let mut conn = Conn::new(PacketStream::new(stream, SessionInfo::default()), opts)?;
//!
//!     let mut cursor = conn.cursor_with(CursorKind::Unbuffered);
//!     cursor.execute("SELECT id, name FROM users WHERE id > %s", (10,))?;
//!     while let Some(row) = cursor.fetchone()? {
//!         let (id, name): (i64, String) = row.decode()?;
//!         println!("{id}: {name}");
//!     }
//!     cursor.close()?;
//!     Ok(())
//! }
//! ```

mod buffer_set;
mod conversion;
pub mod cursor;
pub mod error;
pub mod format;
pub mod handler;
pub mod opts;
pub mod params;
pub mod prepared;
pub mod protocol;
pub mod rewrite;
pub mod row;
pub mod state;
pub mod transport;
pub mod value;

#[cfg(feature = "sync")]
pub mod sync;

#[cfg(feature = "tokio")]
pub mod tokio;

pub use buffer_set::BufferSet;
pub use cursor::{CursorKind, CursorState, ScrollMode};
pub use error::{Error, Result, ServerError};
pub use handler::{CollectHandler, DropHandler, FirstRowHandler, ResultHandler};
pub use opts::Opts;
pub use params::{IntoParams, Params};
pub use prepared::{PreparedState, PreparedStatement};
pub use protocol::types::{ColumnFlags, ColumnType, ServerStatus};
pub use row::{ColumnMeta, FromRow, Row};
pub use transport::SessionInfo;
#[cfg(feature = "tokio")]
pub use transport::AsyncTransport;
pub use transport::Transport;
pub use value::{FromValue, Value};
