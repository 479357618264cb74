//! Cursor over server-side prepared statements.

use std::ops::{Deref, DerefMut};

use crate::error::Result;
use crate::params::IntoParams;
use crate::prepared::{PreparedSession, PreparedState, translate};
use crate::transport::Transport;
use crate::value::Value;

use super::cursor::Cursor;

/// A cursor with an explicit prepare, bind, execute lifecycle.
///
/// Created by [`Conn::prepared_cursor()`](super::Conn::prepared_cursor).
/// Statements use `%s` placeholders and run with COM_STMT_EXECUTE; the
/// rows are read through the fetch methods of [`Cursor`], which this type
/// dereferences to.
///
/// # Example
///
/// ```ignore
/// let mut cursor = conn.prepared_cursor();
/// cursor.prepared_statement("insert into test (column1) values (%s)")?;
/// for i in 0..5 {
///     cursor.add_parameters([i.to_string()])?;
///     cursor.prepared_execute()?;
///     cursor.reset_parameters();
/// }
/// ```
pub struct PreparedCursor<'c, T: Transport> {
    cursor: Cursor<'c, T>,
    session: PreparedSession,
}

impl<'c, T: Transport> PreparedCursor<'c, T> {
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
    ///
    /// # Errors
    ///
    /// - `Error::Type` if `sql` is not valid UTF-8
    /// - `Error::Programming` if `sql` uses named placeholders
    pub fn prepared_statement(&mut self, sql: impl AsRef<[u8]>) -> Result<()> {
        self.cursor.core.ensure_open()?;
        let (sql, server_sql) = translate(sql.as_ref())?;
        if let Some(previous) = self.session.take() {
            self.cursor.conn.close_statement(&previous)?;
        }
        let statement = self.cursor.conn.prepare_translated(sql, &server_sql)?;
        self.session.install(statement);
        Ok(())
    }

    /// Append parameter values.
    ///
    /// # Errors
    ///
    /// `Error::Type` unless `values` is a positional sequence.
    pub fn add_parameters<P: IntoParams>(&mut self, values: P) -> Result<()> {
        self.session.add_parameters(values.into_params())
    }

    /// Clear the bound parameters.
    pub fn reset_parameters(&mut self) {
        self.session.reset_parameters();
    }

    /// Execute the prepared statement with the bound parameters.
    ///
    /// Returns the affected rows, or the number of rows of a buffered
    /// result set.
    ///
    /// # Errors
    ///
    /// `Error::Programming` without a prepared statement, after a session
    /// reset, or when the number of bound parameters does not match.
    pub fn prepared_execute(&mut self) -> Result<u64> {
        self.cursor.core.ensure_open()?;
        let statement = self.session.executable(self.cursor.conn.epoch())?;
        let id = statement.id();
        self.cursor.core.begin(statement.sql().as_bytes().to_vec());
        if let Err(e) = self.cursor.conn.start_binary(id, self.session.params()) {
            self.cursor.core.abort();
            return Err(e);
        }
        let affected = self.cursor.read_result()?;
        self.session.mark_executed();
        Ok(affected)
    }

    /// Close the server-side statement.
    pub fn deallocate(&mut self) -> Result<()> {
        match self.session.take() {
            Some(statement) => self.cursor.conn.close_statement(&statement),
            None => Ok(()),
        }
    }
}

impl<'c, T: Transport> Deref for PreparedCursor<'c, T> {
    type Target = Cursor<'c, T>;

    fn deref(&self) -> &Self::Target {
        &self.cursor
    }
}

impl<T: Transport> DerefMut for PreparedCursor<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.cursor
    }
}

impl<T: Transport> Drop for PreparedCursor<'_, T> {
    fn drop(&mut self) {
        if let Some(statement) = self.session.take()
            && !self.cursor.conn.is_broken()
            && let Err(e) = self.cursor.conn.close_statement(&statement)
        {
            tracing::warn!(error = %e, "failed to close prepared statement on drop");
        }
    }
}
