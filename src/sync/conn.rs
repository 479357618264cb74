//! Synchronous MySQL connection.

use crate::buffer_set::BufferSet;
use crate::cursor::CursorKind;
use crate::error::{Error, Result};
use crate::handler::{CollectHandler, DropHandler, FirstRowHandler, ResultHandler};
use crate::opts::Opts;
use crate::params::IntoParams;
use crate::prepared::{PreparedStatement, check_bind, translate};
use crate::protocol::command::{
    write_ping, write_query, write_quit, write_reset_connection, write_stmt_close,
    write_stmt_execute, write_stmt_prepare,
};
use crate::protocol::row::RowFormat;
use crate::protocol::types::ServerStatus;
use crate::row::FromRow;
use crate::state::action::Action;
use crate::state::{PrepareStateMachine, QueryStateMachine};
use crate::transport::Transport;
use crate::value::Value;

use super::cursor::Cursor;
use super::prepared::PreparedCursor;
use super::transaction::Transaction;

/// Where [`Conn::pump`] stops reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stop {
    /// After the column definitions of a result set
    Columns,
    /// After one row
    Row,
    /// At the end of the current result set
    End,
}

/// Why [`Conn::pump`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pumped {
    Columns,
    Row,
    End { more_results: bool },
}

/// Synchronous MySQL connection.
///
/// The connection owns the transport and a single pending-result slot. A
/// result left on the wire by a streaming cursor occupies the slot until it
/// is exhausted or drained; every command drains the slot before it is sent.
pub struct Conn<T: Transport> {
    transport: T,
    buffer_set: BufferSet,
    opts: Opts,
    deprecate_eof: bool,
    connection_id: u32,
    status: ServerStatus,
    pending: Option<QueryStateMachine>,
    is_broken: bool,
    epoch: u64,
}

impl<T: Transport> Conn<T> {
    /// Create a connection on a transport that completed the handshake.
    ///
    /// Applies `opts.autocommit` when it differs from the server's mode.
    pub fn new<O: TryInto<Opts>>(transport: T, opts: O) -> Result<Self>
    where
        Error: From<O::Error>,
    {
        let opts = opts.try_into()?;
        let session = transport.session();
        let mut conn = Self {
            transport,
            buffer_set: BufferSet::new(),
            deprecate_eof: session.deprecate_eof,
            connection_id: session.connection_id,
            status: session.status,
            pending: None,
            is_broken: false,
            epoch: 0,
            opts,
        };
        if let Some(autocommit) = conn.opts.autocommit
            && autocommit != conn.autocommit()
        {
            conn.set_autocommit(autocommit)?;
        }
        Ok(conn)
    }

    /// Connection options.
    pub fn opts(&self) -> &Opts {
        &self.opts
    }

    /// Server thread id.
    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    /// Server status flags from the last OK/EOF packet.
    pub fn status(&self) -> ServerStatus {
        self.status
    }

    /// Check if autocommit mode is on.
    pub fn autocommit(&self) -> bool {
        self.status.autocommit()
    }

    /// Check if currently in a transaction.
    pub fn in_transaction(&self) -> bool {
        self.status.in_transaction()
    }

    /// String literals escape quotes by doubling instead of backslashes.
    pub fn no_backslash_escapes(&self) -> bool {
        self.status.contains(ServerStatus::NO_BACKSLASH_ESCAPES)
    }

    /// Check if the connection is broken.
    pub fn is_broken(&self) -> bool {
        self.is_broken
    }

    /// Check if a result is still on the wire.
    pub fn has_pending_result(&self) -> bool {
        self.pending.is_some()
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn mark_broken(&mut self) {
        self.is_broken = true;
        self.pending = None;
    }

    /// Get the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    // === Cursors ===

    /// Create a cursor of the kind configured in [`Opts::cursor`].
    pub fn cursor(&mut self) -> Cursor<'_, T> {
        let kind = self.opts.cursor;
        self.cursor_with(kind)
    }

    /// Create a cursor of the given kind.
    pub fn cursor_with(&mut self, kind: CursorKind) -> Cursor<'_, T> {
        Cursor::new(self, kind)
    }

    /// Create a prepared statement cursor.
    pub fn prepared_cursor(&mut self) -> PreparedCursor<'_, T> {
        let kind = self.opts.cursor;
        PreparedCursor::new(Cursor::new(self, kind))
    }

    // === Text protocol ===

    /// Execute a query with a handler. Every result set of a
    /// multi-statement query is passed to the handler.
    pub fn query<H: ResultHandler>(&mut self, sql: &str, handler: &mut H) -> Result<()> {
        tracing::debug!(sql, "query");
        self.start_result_command(RowFormat::Text, |out| {
            write_query(out, sql.as_bytes());
            Ok(())
        })?;
        self.read_all(handler)
    }

    /// Execute a query and discard results. Returns the affected rows.
    pub fn query_drop(&mut self, sql: &str) -> Result<u64> {
        let mut handler = DropHandler::new();
        self.query(sql, &mut handler)?;
        Ok(handler.affected_rows())
    }

    /// Execute a query and collect typed rows.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let rows: Vec<(i64, String)> = conn.query_collect("SELECT id, name FROM users")?;
    /// ```
    pub fn query_collect<R: FromRow>(&mut self, sql: &str) -> Result<Vec<R>> {
        let mut handler = CollectHandler::<R>::new();
        self.query(sql, &mut handler)?;
        Ok(handler.into_rows())
    }

    /// Execute a query and return the first typed row.
    pub fn query_first<R: FromRow>(&mut self, sql: &str) -> Result<Option<R>> {
        let mut handler = FirstRowHandler::<R>::new();
        self.query(sql, &mut handler)?;
        Ok(handler.into_row())
    }

    /// Render a value as a SQL literal for this session's escaping mode.
    pub fn literal(&self, value: impl Into<Value>) -> Result<Vec<u8>> {
        value.into().to_literal(self.no_backslash_escapes())
    }

    /// Check that the server is alive (COM_PING).
    pub fn ping(&mut self) -> Result<()> {
        self.start_result_command(RowFormat::Text, |out| {
            write_ping(out);
            Ok(())
        })?;
        self.read_all(&mut DropHandler::new())
    }

    /// Reset the session state (COM_RESET_CONNECTION).
    ///
    /// The server drops every prepared statement of the session, so
    /// statements prepared before the reset can no longer be executed.
    pub fn reset_session(&mut self) -> Result<()> {
        self.start_result_command(RowFormat::Text, |out| {
            write_reset_connection(out);
            Ok(())
        })?;
        self.read_all(&mut DropHandler::new())?;
        self.epoch += 1;
        Ok(())
    }

    /// Turn autocommit on or off.
    pub fn set_autocommit(&mut self, on: bool) -> Result<()> {
        self.query_drop(if on {
            "SET autocommit=1"
        } else {
            "SET autocommit=0"
        })?;
        Ok(())
    }

    /// Start a transaction.
    pub fn begin(&mut self) -> Result<()> {
        self.query_drop("BEGIN").map(drop)
    }

    /// Commit the current transaction.
    pub fn commit(&mut self) -> Result<()> {
        self.query_drop("COMMIT").map(drop)
    }

    /// Roll back the current transaction.
    pub fn rollback(&mut self) -> Result<()> {
        self.query_drop("ROLLBACK").map(drop)
    }

    /// Execute a closure within a transaction.
    ///
    /// If the closure returns `Ok`, the transaction is committed.
    /// If the closure returns `Err` or the transaction is not explicitly
    /// committed or rolled back, the transaction is rolled back.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUsage` if called while already in a transaction.
    pub fn run_transaction<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Conn<T>, Transaction) -> Result<R>,
    {
        if self.in_transaction() {
            return Err(Error::InvalidUsage(
                "nested transactions are not supported".into(),
            ));
        }

        self.begin()?;

        let tx = Transaction::new(self.connection_id());
        let result = f(self, tx);

        // If still in a transaction (not committed or rolled back), roll it back
        if self.in_transaction() {
            let rollback_result = self.rollback();

            // Return the first error (either from closure or rollback)
            if let Err(e) = result {
                return Err(e);
            }
            rollback_result?;
        }

        result
    }

    // === Prepared statements ===

    /// Prepare a statement written with `%s` placeholders.
    pub fn prepare(&mut self, sql: &str) -> Result<PreparedStatement> {
        let (sql, server_sql) = translate(sql.as_bytes())?;
        self.prepare_translated(sql, &server_sql)
    }

    pub(crate) fn prepare_translated(
        &mut self,
        sql: String,
        server_sql: &str,
    ) -> Result<PreparedStatement> {
        tracing::debug!(sql = server_sql, "prepare");
        self.send(|out| {
            write_stmt_prepare(out, server_sql);
            Ok(())
        })?;

        let mut state_machine = PrepareStateMachine::new(self.deprecate_eof);
        loop {
            self.read_packet()?;
            match state_machine.step(&self.buffer_set) {
                Ok(Action::Finished) => break,
                Ok(_) => {}
                Err(e) => return Err(self.track(e)),
            }
        }

        let info = state_machine
            .take_statement()
            .ok_or_else(|| Error::Protocol("No prepared statement".into()))?;
        Ok(PreparedStatement::new(sql, info, self.epoch))
    }

    /// Close a prepared statement (COM_STMT_CLOSE).
    ///
    /// Statements invalidated by [`reset_session`](Self::reset_session) are
    /// already gone on the server and are skipped.
    pub fn close_statement(&mut self, statement: &PreparedStatement) -> Result<()> {
        if statement.epoch() != self.epoch {
            return Ok(());
        }
        let id = statement.id();
        self.send(|out| {
            write_stmt_close(out, id);
            Ok(())
        })
    }

    /// Execute a prepared statement with a handler.
    pub fn exec<P: IntoParams, H: ResultHandler>(
        &mut self,
        statement: &PreparedStatement,
        params: P,
        handler: &mut H,
    ) -> Result<()> {
        let params = params.into_params().into_positional()?;
        check_bind(statement, self.epoch, params.len())?;
        self.start_binary(statement.id(), &params)?;
        self.read_all(handler)
    }

    /// Execute a prepared statement and discard results.
    pub fn exec_drop<P: IntoParams>(
        &mut self,
        statement: &PreparedStatement,
        params: P,
    ) -> Result<u64> {
        let mut handler = DropHandler::new();
        self.exec(statement, params, &mut handler)?;
        Ok(handler.affected_rows())
    }

    /// Execute a prepared statement and collect typed rows.
    pub fn exec_collect<R: FromRow, P: IntoParams>(
        &mut self,
        statement: &PreparedStatement,
        params: P,
    ) -> Result<Vec<R>> {
        let mut handler = CollectHandler::<R>::new();
        self.exec(statement, params, &mut handler)?;
        Ok(handler.into_rows())
    }

    pub(crate) fn start_binary(&mut self, statement_id: u32, params: &[Value]) -> Result<()> {
        tracing::debug!(statement_id, params = params.len(), "execute");
        self.start_result_command(RowFormat::Binary, |out| {
            write_stmt_execute(out, statement_id, params)
        })
    }

    /// Close the connection gracefully (COM_QUIT).
    pub fn close(mut self) -> Result<()> {
        self.pending = None;
        self.is_broken = true;
        let out = self.buffer_set.new_command();
        write_quit(out);
        self.transport.send_command(&self.buffer_set.write_buffer)
    }

    // === Pending result slot ===

    fn ensure_usable(&self) -> Result<()> {
        if self.is_broken {
            return Err(Error::ConnectionBroken);
        }
        Ok(())
    }

    /// Mark the connection broken if `error` desynchronized it.
    fn track(&mut self, error: Error) -> Error {
        if error.is_connection_broken() {
            self.mark_broken();
        }
        error
    }

    fn read_packet(&mut self) -> Result<()> {
        match self.transport.read_packet(&mut self.buffer_set.read_buffer) {
            Ok(()) => {
                tracing::trace!(len = self.buffer_set.read_buffer.len(), "packet");
                Ok(())
            }
            Err(e) => Err(self.track(e)),
        }
    }

    /// Drain the pending result, then send one command.
    pub(crate) fn send(
        &mut self,
        write: impl FnOnce(&mut Vec<u8>) -> Result<()>,
    ) -> Result<()> {
        self.ensure_usable()?;
        self.drain_pending()?;
        write(self.buffer_set.new_command())?;
        match self.transport.send_command(&self.buffer_set.write_buffer) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.track(e)),
        }
    }

    /// Send a command whose response is read through the pending slot.
    pub(crate) fn start_result_command(
        &mut self,
        format: RowFormat,
        write: impl FnOnce(&mut Vec<u8>) -> Result<()>,
    ) -> Result<()> {
        self.send(write)?;
        self.pending = Some(QueryStateMachine::new(format, self.deprecate_eof));
        Ok(())
    }

    /// Read the pending response until `stop`.
    ///
    /// The slot is cleared once the response is finished. A handler error
    /// drains the rest of the response before it is returned; if that drain
    /// fails the connection is broken.
    pub(crate) fn pump<H: ResultHandler>(&mut self, handler: &mut H, stop: Stop) -> Result<Pumped> {
        loop {
            if self.pending.is_none() {
                self.ensure_usable()?;
                return Ok(Pumped::End {
                    more_results: false,
                });
            }
            self.read_packet()?;
            let Some(state_machine) = self.pending.as_mut() else {
                return Err(Error::ConnectionBroken);
            };

            let in_rows = state_machine.in_rows();
            let result = state_machine.step(&self.buffer_set, handler);
            if let Some(status) = state_machine.status() {
                self.status = status;
            }
            let finished = state_machine.is_finished();

            match result {
                Ok(Action::Finished) => {
                    self.pending = None;
                    return Ok(Pumped::End {
                        more_results: false,
                    });
                }
                Ok(Action::ResultSetEnd) => {
                    return Ok(Pumped::End { more_results: true });
                }
                Ok(Action::NeedPacket) => {
                    let reached = match stop {
                        Stop::Columns => !in_rows && state_machine.in_rows(),
                        Stop::Row => in_rows,
                        Stop::End => false,
                    };
                    if reached {
                        return Ok(match stop {
                            Stop::Columns => Pumped::Columns,
                            _ => Pumped::Row,
                        });
                    }
                }
                Err(e) if e.is_connection_broken() => return Err(self.track(e)),
                Err(e) if finished => {
                    self.pending = None;
                    return Err(e);
                }
                Err(e) => {
                    if let Err(drain) = self.drain_pending() {
                        tracing::warn!(error = %drain, "failed to drain after handler error");
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Read every remaining result set into `handler`.
    fn read_all<H: ResultHandler>(&mut self, handler: &mut H) -> Result<()> {
        loop {
            match self.pump(handler, Stop::End)? {
                Pumped::End {
                    more_results: true,
                } => {}
                _ => return Ok(()),
            }
        }
    }

    /// Read and discard whatever is left of the pending response.
    ///
    /// A server error inside the discarded response ends it cleanly and is
    /// not reported. A transport or framing failure breaks the connection
    /// and surfaces as `Error::Interface` (or `Error::Io`).
    pub(crate) fn drain_pending(&mut self) -> Result<()> {
        if self.pending.is_none() {
            return Ok(());
        }
        tracing::debug!("draining pending result");
        let mut handler = DropHandler::new();
        while self.pending.is_some() {
            self.read_packet().map_err(desync)?;
            let Some(state_machine) = self.pending.as_mut() else {
                break;
            };
            let result = state_machine.step(&self.buffer_set, &mut handler);
            if let Some(status) = state_machine.status() {
                self.status = status;
            }
            let finished = state_machine.is_finished();
            match result {
                Ok(_) => {}
                Err(Error::Server(e)) => {
                    tracing::debug!(error = %e, "server error in drained result");
                }
                Err(e) => {
                    self.mark_broken();
                    return Err(desync(e));
                }
            }
            if finished {
                self.pending = None;
            }
        }
        tracing::debug!(rows = handler.rows_discarded(), "drained");
        Ok(())
    }
}

/// Report a framing failure found while draining as a desync.
fn desync(error: Error) -> Error {
    match error {
        Error::Protocol(message) => {
            Error::Interface(format!("connection out of sync while draining: {message}"))
        }
        e => e,
    }
}

impl<T: Transport> Drop for Conn<T> {
    fn drop(&mut self) {
        if self.is_broken {
            return;
        }
        // Try to send COM_QUIT, ignore errors
        let out = self.buffer_set.new_command();
        write_quit(out);
        let _ = self.transport.send_command(&self.buffer_set.write_buffer);
    }
}
