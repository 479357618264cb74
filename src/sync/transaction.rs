//! Transaction support for synchronous MySQL connections.

use super::Conn;
use crate::error::{Error, Result};
use crate::transport::Transport;

/// A MySQL transaction for the synchronous connection.
///
/// Handed out by [`Conn::run_transaction`]. The connection is passed to
/// `commit` and `rollback` to execute the transaction commands.
pub struct Transaction {
    connection_id: u32,
}

impl Transaction {
    pub(crate) fn new(connection_id: u32) -> Self {
        Self { connection_id }
    }

    fn check<T: Transport>(&self, conn: &Conn<T>) -> Result<()> {
        let actual = conn.connection_id();
        if self.connection_id != actual {
            return Err(Error::InvalidUsage(format!(
                "connection mismatch: expected {}, got {}",
                self.connection_id, actual
            )));
        }
        Ok(())
    }

    /// Commit the transaction.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUsage` if the connection is not the same
    /// as the one that started the transaction.
    pub fn commit<T: Transport>(self, conn: &mut Conn<T>) -> Result<()> {
        self.check(conn)?;
        conn.commit()
    }

    /// Rollback the transaction.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUsage` if the connection is not the same
    /// as the one that started the transaction.
    pub fn rollback<T: Transport>(self, conn: &mut Conn<T>) -> Result<()> {
        self.check(conn)?;
        conn.rollback()
    }
}
