//! Runtime-independent cursor bookkeeping.
//!
//! The sync and tokio cursors drive I/O; this module owns what they share:
//! the state machine of a cursor, the buffered rows, the fetch position and
//! the diagnostics of the last execution.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::protocol::response::OkPacket;
use crate::row::{ColumnMeta, Row};

/// How a cursor consumes result sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorKind {
    /// Read the whole result set during `execute`. The connection is free
    /// again as soon as `execute` returns.
    #[default]
    Buffered,
    /// Leave the result on the wire and read rows on demand. The
    /// connection stays occupied until the rows are exhausted or the
    /// cursor is closed.
    Unbuffered,
}

/// Cursor lifecycle.
///
/// `Idle → Executing → {Buffered | Streaming} → Idle`, and any state to the
/// terminal `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Nothing pending: not executed yet, or the last statement returned no
    /// rows or its rows were streamed to the end.
    Idle,
    /// A command was sent and its response is being classified.
    Executing,
    /// The result set is held in memory.
    Buffered,
    /// The result set is still on the wire.
    Streaming,
    /// Closed; every further `execute` fails.
    Closed,
}

/// Reference point for [`scroll`](crate::sync::Cursor::scroll).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollMode {
    /// Relative to the current position
    #[default]
    Relative,
    /// Absolute row index
    Absolute,
}

/// Shared state of one cursor.
#[derive(Debug)]
pub(crate) struct CursorCore {
    pub kind: CursorKind,
    pub named_rows: bool,
    state: CursorState,
    executed: Option<Vec<u8>>,
    description: Option<Arc<[ColumnMeta]>>,
    buffer: Option<Vec<Row>>,
    position: usize,
    rowcount: Option<u64>,
    lastrowid: Option<u64>,
    warnings: u16,
    more_results: bool,
}

impl CursorCore {
    pub fn new(kind: CursorKind, named_rows: bool) -> Self {
        Self {
            kind,
            named_rows,
            state: CursorState::Idle,
            executed: None,
            description: None,
            buffer: None,
            position: 0,
            rowcount: None,
            lastrowid: None,
            warnings: 0,
            more_results: false,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == CursorState::Closed
    }

    pub fn is_streaming(&self) -> bool {
        self.state == CursorState::Streaming
    }

    pub fn more_results(&self) -> bool {
        self.more_results
    }

    pub fn executed(&self) -> Option<&[u8]> {
        self.executed.as_deref()
    }

    pub fn description(&self) -> Option<&Arc<[ColumnMeta]>> {
        self.description.as_ref()
    }

    pub fn rowcount(&self) -> Option<u64> {
        self.rowcount
    }

    pub fn lastrowid(&self) -> Option<u64> {
        self.lastrowid
    }

    pub fn rownumber(&self) -> usize {
        self.position
    }

    pub fn warning_count(&self) -> u16 {
        self.warnings
    }

    pub fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Programming("cursor closed".into()));
        }
        Ok(())
    }

    /// Fetching requires an open cursor that has executed something.
    pub fn ensure_executed(&self) -> Result<()> {
        self.ensure_open()?;
        if self.executed.is_none() {
            return Err(Error::Programming("execute() first".into()));
        }
        Ok(())
    }

    /// A new statement is about to be sent.
    pub fn begin(&mut self, executed: Vec<u8>) {
        self.executed = Some(executed);
        self.begin_next_result();
    }

    /// The next result set of the same response is about to be read.
    pub fn begin_next_result(&mut self) {
        self.state = CursorState::Executing;
        self.description = None;
        self.buffer = None;
        self.position = 0;
        self.rowcount = None;
        self.lastrowid = None;
        self.warnings = 0;
        self.more_results = false;
    }

    /// The response to the last command failed before a result was classified.
    pub fn abort(&mut self) {
        if self.state == CursorState::Executing {
            self.state = CursorState::Idle;
        }
    }

    /// The statement produced no result set.
    pub fn finish_ok(&mut self, ok: &OkPacket, more_results: bool) {
        self.rowcount = Some(ok.affected_rows);
        self.lastrowid = Some(ok.last_insert_id);
        self.warnings = ok.warnings;
        self.more_results = more_results;
        self.state = CursorState::Idle;
    }

    /// The whole result set was read into memory.
    pub fn finish_buffered(
        &mut self,
        columns: Arc<[ColumnMeta]>,
        rows: Vec<Row>,
        ok: Option<&OkPacket>,
        more_results: bool,
    ) {
        self.rowcount = Some(rows.len() as u64);
        self.description = Some(columns);
        self.buffer = Some(rows);
        self.warnings = ok.map_or(0, |ok| ok.warnings);
        self.more_results = more_results;
        self.state = CursorState::Buffered;
    }

    /// Total affected rows of a statement sent in several commands.
    pub fn set_rowcount(&mut self, rowcount: u64) {
        self.rowcount = Some(rowcount);
    }

    /// Column definitions were read and the rows stay on the wire.
    pub fn start_streaming(&mut self, columns: Arc<[ColumnMeta]>) {
        self.description = Some(columns);
        self.state = CursorState::Streaming;
    }

    /// A streamed row was handed out.
    pub fn streamed_row(&mut self) {
        self.position += 1;
    }

    /// The streamed result set reached its end.
    pub fn finish_streaming(&mut self, ok: Option<&OkPacket>, more_results: bool) {
        self.rowcount = Some(self.position as u64);
        if let Some(ok) = ok {
            self.warnings = ok.warnings;
        }
        self.more_results = more_results;
        self.state = CursorState::Idle;
    }

    /// The rest of the response was discarded.
    pub fn discard_remaining(&mut self) {
        self.more_results = false;
        if self.state == CursorState::Streaming || self.state == CursorState::Executing {
            self.state = CursorState::Idle;
        }
    }

    pub fn close(&mut self) {
        self.buffer = None;
        self.more_results = false;
        self.state = CursorState::Closed;
    }

    pub fn fetch_buffered_one(&mut self) -> Option<Row> {
        let row = self.buffer.as_ref()?.get(self.position)?.clone();
        self.position += 1;
        Some(row)
    }

    pub fn fetch_buffered_many(&mut self, size: usize) -> Vec<Row> {
        let Some(buffer) = self.buffer.as_ref() else {
            return Vec::new();
        };
        let end = self.position.saturating_add(size).min(buffer.len());
        let rows = buffer
            .get(self.position..end)
            .map(<[Row]>::to_vec)
            .unwrap_or_default();
        self.position += rows.len();
        rows
    }

    pub fn fetch_buffered_all(&mut self) -> Vec<Row> {
        self.fetch_buffered_many(usize::MAX)
    }

    /// Move within the buffer. Out-of-range targets leave the position
    /// unchanged.
    pub fn scroll_buffered(&mut self, value: i64, mode: ScrollMode) -> Result<()> {
        let len = self.buffer.as_ref().map_or(0, Vec::len);
        let target = match mode {
            ScrollMode::Relative => (self.position as i64).checked_add(value),
            ScrollMode::Absolute => Some(value),
        };
        match target.and_then(|t| usize::try_from(t).ok()) {
            Some(target) if target <= len => {
                self.position = target;
                Ok(())
            }
            _ => Err(Error::Programming("out of range".into())),
        }
    }

    /// Number of rows a streaming cursor must skip to honour a scroll.
    pub fn streaming_skip(&self, value: i64, mode: ScrollMode) -> Result<u64> {
        match mode {
            ScrollMode::Relative => u64::try_from(value).map_err(|_| {
                Error::NotSupported("backwards scrolling not supported by this cursor".into())
            }),
            ScrollMode::Absolute => {
                let target = u64::try_from(value).unwrap_or(0);
                let current = self.position as u64;
                if value < 0 || target < current {
                    return Err(Error::NotSupported(
                        "backwards scrolling not supported by this cursor".into(),
                    ));
                }
                Ok(target - current)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn buffered(rows: usize) -> CursorCore {
        let mut core = CursorCore::new(CursorKind::Buffered, false);
        core.begin(b"select".to_vec());
        let rows = (0..rows)
            .map(|i| Row::new(vec![Value::Int(i as i64)]))
            .collect();
        core.finish_buffered(Arc::from(vec![ColumnMeta::named("a")]), rows, None, false);
        core
    }

    #[test]
    fn fetch_requires_execute() {
        let core = CursorCore::new(CursorKind::Buffered, false);
        assert!(matches!(core.ensure_executed(), Err(Error::Programming(_))));
    }

    #[test]
    fn buffered_fetch_family() {
        let mut core = buffered(5);
        assert_eq!(core.rowcount(), Some(5));
        assert_eq!(core.fetch_buffered_one().unwrap()[0], Value::Int(0));
        assert_eq!(core.fetch_buffered_many(2).len(), 2);
        assert_eq!(core.rownumber(), 3);
        assert_eq!(core.fetch_buffered_all().len(), 2);
        assert!(core.fetch_buffered_one().is_none());
        assert!(core.fetch_buffered_many(3).is_empty());
        assert!(core.fetch_buffered_all().is_empty());
    }

    #[test]
    fn buffered_scroll() {
        let mut core = buffered(5);
        core.scroll_buffered(4, ScrollMode::Absolute).unwrap();
        assert_eq!(core.fetch_buffered_one().unwrap()[0], Value::Int(4));
        core.scroll_buffered(-2, ScrollMode::Relative).unwrap();
        assert_eq!(core.rownumber(), 3);
        assert!(core.scroll_buffered(3, ScrollMode::Relative).is_err());
        assert!(core.scroll_buffered(-1, ScrollMode::Absolute).is_err());
        assert_eq!(core.rownumber(), 3);
    }

    #[test]
    fn streaming_scroll_is_forward_only() {
        let mut core = CursorCore::new(CursorKind::Unbuffered, false);
        core.begin(b"select".to_vec());
        core.start_streaming(Arc::from(vec![ColumnMeta::named("a")]));
        core.streamed_row();
        core.streamed_row();
        assert_eq!(core.streaming_skip(3, ScrollMode::Relative).unwrap(), 3);
        assert_eq!(core.streaming_skip(5, ScrollMode::Absolute).unwrap(), 3);
        assert!(matches!(
            core.streaming_skip(-1, ScrollMode::Relative),
            Err(Error::NotSupported(_))
        ));
        assert!(matches!(
            core.streaming_skip(1, ScrollMode::Absolute),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn closed_cursor_rejects_execute() {
        let mut core = buffered(1);
        core.close();
        assert_eq!(core.state(), CursorState::Closed);
        assert!(matches!(core.ensure_open(), Err(Error::Programming(_))));
    }
}
