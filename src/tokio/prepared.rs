//! Async cursor over server-side prepared statements.

use std::ops::{Deref, DerefMut};

use crate::error::Result;
use crate::params::IntoParams;
use crate::prepared::{PreparedSession, PreparedState, translate};
use crate::transport::AsyncTransport;
use crate::value::Value;

use super::cursor::Cursor;

/// A cursor with an explicit prepare, bind, execute lifecycle.
///
/// See [`crate::sync::PreparedCursor`]. Dropping it queues the statement
/// to be closed before the connection's next command.
pub struct PreparedCursor<'c, T: AsyncTransport> {
    cursor: Cursor<'c, T>,
    session: PreparedSession,
}

impl<'c, T: AsyncTransport> PreparedCursor<'c, T> {
    pub(crate) fn new(cursor: Cursor<'c, T>) -> Self {
        Self {
            cursor,
            session: PreparedSession::new(),
        }
    }

    /// Lifecycle state of the prepared session.
    pub fn prepared_state(&self) -> PreparedState {
        self.session.state()
    }

    /// Text of the prepared statement.
    pub fn statement(&self) -> Option<&str> {
        self.session.statement().map(|s| s.sql())
    }

    /// Currently bound parameters.
    pub fn params(&self) -> &[Value] {
        self.session.params()
    }

    /// Prepare `sql` on the server, replacing (and closing) the previous
    /// statement and clearing bound parameters.
    pub async fn prepared_statement(&mut self, sql: impl AsRef<[u8]>) -> Result<()> {
        self.cursor.core.ensure_open()?;
        let (sql, server_sql) = translate(sql.as_ref())?;
        if let Some(previous) = self.session.take() {
            self.cursor.conn.close_statement(&previous).await?;
        }
        let statement = self
            .cursor
            .conn
            .prepare_translated(sql, &server_sql)
            .await?;
        self.session.install(statement);
        Ok(())
    }

    /// Append parameter values. Only a positional sequence is accepted.
    pub fn add_parameters<P: IntoParams>(&mut self, values: P) -> Result<()> {
        self.session.add_parameters(values.into_params())
    }

    /// Clear the bound parameters.
    pub fn reset_parameters(&mut self) {
        self.session.reset_parameters();
    }

    /// Execute the prepared statement with the bound parameters.
    pub async fn prepared_execute(&mut self) -> Result<u64> {
        self.cursor.core.ensure_open()?;
        let statement = self.session.executable(self.cursor.conn.epoch())?;
        let id = statement.id();
        self.cursor.core.begin(statement.sql().as_bytes().to_vec());
        if let Err(e) = self
            .cursor
            .conn
            .start_binary(id, self.session.params())
            .await
        {
            self.cursor.core.abort();
            return Err(e);
        }
        let affected = self.cursor.read_result().await?;
        self.session.mark_executed();
        Ok(affected)
    }

    /// Close the server-side statement.
    pub async fn deallocate(&mut self) -> Result<()> {
        match self.session.take() {
            Some(statement) => self.cursor.conn.close_statement(&statement).await,
            None => Ok(()),
        }
    }
}

impl<'c, T: AsyncTransport> Deref for PreparedCursor<'c, T> {
    type Target = Cursor<'c, T>;

    fn deref(&self) -> &Self::Target {
        &self.cursor
    }
}

impl<T: AsyncTransport> DerefMut for PreparedCursor<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.cursor
    }
}

impl<T: AsyncTransport> Drop for PreparedCursor<'_, T> {
    fn drop(&mut self) {
        if let Some(statement) = self.session.take() {
            self.cursor.conn.defer_close(&statement);
        }
    }
}
