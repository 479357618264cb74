//! Asynchronous cursor.

use std::sync::Arc;

use crate::cursor::{CursorCore, CursorKind, CursorState, ScrollMode};
use crate::error::{Error, Result};
use crate::format::format_query;
use crate::handler::{DropHandler, ResultSink};
use crate::params::{IntoParams, Params, ensure_uniform};
use crate::protocol::command::write_query;
use crate::protocol::row::RowFormat;
use crate::rewrite::InsertValues;
use crate::row::{ColumnMeta, Row};
use crate::transport::AsyncTransport;

use super::conn::{Conn, Pumped, Stop};

/// A cursor executing statements on a borrowed async connection.
///
/// Same contract as [`crate::sync::Cursor`], except that dropping a cursor
/// cannot drain a result left on the wire. The connection drains it before
/// its next command; call [`close`](Self::close) to drain right away.
pub struct Cursor<'c, T: AsyncTransport> {
    pub(crate) conn: &'c mut Conn<T>,
    pub(crate) core: CursorCore,
    max_statement_length: usize,
}

impl<'c, T: AsyncTransport> Cursor<'c, T> {
    pub(crate) fn new(conn: &'c mut Conn<T>, kind: CursorKind) -> Self {
        let named_rows = conn.opts().named_rows;
        let max_statement_length = conn.opts().max_statement_length;
        Self {
            conn,
            core: CursorCore::new(kind, named_rows),
            max_statement_length,
        }
    }

    /// Kind of this cursor.
    pub fn kind(&self) -> CursorKind {
        self.core.kind
    }

    /// Current state.
    pub fn state(&self) -> CursorState {
        self.core.state()
    }

    /// Exact bytes of the last statement sent, including batch rewrites.
    pub fn executed(&self) -> Option<&[u8]> {
        self.core.executed()
    }

    /// Column metadata of the current result set.
    pub fn description(&self) -> Option<&Arc<[ColumnMeta]>> {
        self.core.description()
    }

    /// Affected rows, or rows in the result set.
    pub fn rowcount(&self) -> Option<u64> {
        self.core.rowcount()
    }

    /// AUTO_INCREMENT id of the last inserted row.
    pub fn lastrowid(&self) -> Option<u64> {
        self.core.lastrowid()
    }

    /// Index of the next row to fetch.
    pub fn rownumber(&self) -> usize {
        self.core.rownumber()
    }

    /// Warnings reported for the current result.
    pub fn warning_count(&self) -> u16 {
        self.core.warning_count()
    }

    /// Set the row batch size bound used by [`executemany`](Self::executemany).
    pub fn set_max_statement_length(&mut self, max: usize) {
        self.max_statement_length = max.max(1);
    }

    /// Return the exact statement `execute` would send.
    pub fn mogrify<P: IntoParams>(&self, sql: &str, params: P) -> Result<Vec<u8>> {
        format_query(sql, &params.into_params(), self.conn.no_backslash_escapes())
    }

    /// Execute a statement. See [`crate::sync::Cursor::execute`].
    pub async fn execute<P: IntoParams>(&mut self, sql: &str, params: P) -> Result<u64> {
        self.core.ensure_open()?;
        let query = self.mogrify(sql, params)?;
        self.run_text(query).await
    }

    /// Execute a statement once per parameter set.
    /// See [`crate::sync::Cursor::executemany`].
    pub async fn executemany<I>(&mut self, sql: &str, param_sets: I) -> Result<u64>
    where
        I: IntoIterator,
        I::Item: IntoParams,
    {
        self.core.ensure_open()?;
        let sets: Vec<Params> = param_sets.into_iter().map(IntoParams::into_params).collect();
        if sets.is_empty() {
            return Ok(0);
        }
        ensure_uniform(&sets)?;

        let mut total = 0;
        if let Some(insert) = InsertValues::parse(sql) {
            let statements = insert.render(
                &sets,
                self.max_statement_length,
                self.conn.no_backslash_escapes(),
            )?;
            tracing::debug!(rows = sets.len(), statements = statements.len(), "batched insert");
            for statement in statements {
                total += self.run_text(statement).await?;
            }
        } else {
            for params in &sets {
                total += self.execute(sql, params).await?;
            }
        }
        self.core.set_rowcount(total);
        Ok(total)
    }

    /// Fetch the next row. Returns `None` when the result set is exhausted.
    pub async fn fetchone(&mut self) -> Result<Option<Row>> {
        self.core.ensure_executed()?;
        if self.core.is_streaming() {
            return self.next_streamed().await;
        }
        Ok(self.core.fetch_buffered_one())
    }

    /// Fetch up to `size` rows.
    pub async fn fetchmany(&mut self, size: usize) -> Result<Vec<Row>> {
        self.core.ensure_executed()?;
        if !self.core.is_streaming() {
            return Ok(self.core.fetch_buffered_many(size));
        }
        let mut rows = Vec::with_capacity(size.min(1024));
        while rows.len() < size {
            match self.next_streamed().await? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    /// Fetch all remaining rows.
    pub async fn fetchall(&mut self) -> Result<Vec<Row>> {
        self.core.ensure_executed()?;
        if !self.core.is_streaming() {
            return Ok(self.core.fetch_buffered_all());
        }
        let mut rows = Vec::new();
        while let Some(row) = self.next_streamed().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Skip to the next result set. Returns `false` when none remains.
    pub async fn nextset(&mut self) -> Result<bool> {
        self.core.ensure_executed()?;
        if self.core.is_streaming() {
            let mut handler = DropHandler::new();
            match self.conn.pump(&mut handler, Stop::End).await {
                Ok(Pumped::End { more_results }) => {
                    self.core.finish_streaming(None, more_results);
                }
                Ok(_) => return Err(Error::Protocol("unexpected stop in nextset".into())),
                Err(e) => {
                    self.core.discard_remaining();
                    return Err(e);
                }
            }
        }
        if !self.core.more_results() {
            return Ok(false);
        }
        self.core.begin_next_result();
        self.read_result().await?;
        Ok(true)
    }

    /// Move the fetch position. See [`crate::sync::Cursor::scroll`].
    pub async fn scroll(&mut self, value: i64, mode: ScrollMode) -> Result<()> {
        self.core.ensure_executed()?;
        if !self.core.is_streaming() {
            return self.core.scroll_buffered(value, mode);
        }
        let skip = self.core.streaming_skip(value, mode)?;
        for _ in 0..skip {
            if self.next_streamed().await?.is_none() {
                break;
            }
        }
        Ok(())
    }

    /// Close the cursor, draining any result left on the wire.
    ///
    /// Closing twice is a no-op. A failed drain is returned and leaves the
    /// connection broken.
    pub async fn close(&mut self) -> Result<()> {
        if self.core.is_closed() {
            return Ok(());
        }
        let result = self.conn.drain_pending().await;
        self.core.close();
        result
    }

    async fn run_text(&mut self, query: Vec<u8>) -> Result<u64> {
        self.core.begin(query);
        let query = self.core.executed().unwrap_or_default();
        tracing::debug!(sql = %String::from_utf8_lossy(query), "execute");
        let sent = self
            .conn
            .start_result_command(RowFormat::Text, |out| {
                write_query(out, query);
                Ok(())
            })
            .await;
        if let Err(e) = sent {
            self.core.abort();
            return Err(e);
        }
        self.read_result().await
    }

    pub(crate) async fn read_result(&mut self) -> Result<u64> {
        let result = self.read_result_inner().await;
        if result.is_err() {
            self.core.abort();
        }
        result
    }

    async fn read_result_inner(&mut self) -> Result<u64> {
        let mut sink = ResultSink::new(self.core.named_rows);
        match self.conn.pump(&mut sink, Stop::Columns).await? {
            Pumped::End { more_results } => {
                let ok = sink
                    .ok
                    .ok_or_else(|| Error::Protocol("response without OK packet".into()))?;
                self.core.finish_ok(&ok, more_results);
                Ok(ok.affected_rows)
            }
            Pumped::Columns => {
                let columns = sink
                    .columns
                    .take()
                    .ok_or_else(|| Error::Protocol("result set without columns".into()))?;
                match self.core.kind {
                    CursorKind::Buffered => match self.conn.pump(&mut sink, Stop::End).await? {
                        Pumped::End { more_results } => {
                            let rows = std::mem::take(&mut sink.rows);
                            let count = rows.len() as u64;
                            self.core
                                .finish_buffered(columns, rows, sink.ok.as_ref(), more_results);
                            Ok(count)
                        }
                        _ => Err(Error::Protocol("result set did not end".into())),
                    },
                    CursorKind::Unbuffered => {
                        self.core.start_streaming(columns);
                        Ok(0)
                    }
                }
            }
            Pumped::Row => Err(Error::Protocol("row before column definitions".into())),
        }
    }

    async fn next_streamed(&mut self) -> Result<Option<Row>> {
        let mut sink = ResultSink::new(self.core.named_rows);
        match self.conn.pump(&mut sink, Stop::Row).await {
            Ok(Pumped::Row) => {
                self.core.streamed_row();
                Ok(sink.rows.pop())
            }
            Ok(Pumped::End { more_results }) => {
                self.core.finish_streaming(sink.ok.as_ref(), more_results);
                Ok(None)
            }
            Ok(Pumped::Columns) => {
                self.core.discard_remaining();
                Err(Error::Protocol("unexpected column definitions".into()))
            }
            Err(e) => {
                self.core.discard_remaining();
                Err(e)
            }
        }
    }
}

impl<T: AsyncTransport> Drop for Cursor<'_, T> {
    fn drop(&mut self) {
        if !self.core.is_closed() && self.conn.has_pending_result() {
            tracing::debug!("cursor dropped with a pending result; draining before next command");
        }
    }
}
