//! Result handlers.
//!
//! A handler receives the callbacks of one command's response as the
//! connection reads it packet by packet.

use std::sync::Arc;

use crate::error::Result;
use crate::protocol::response::OkPacket;
use crate::protocol::row::RawRow;
use crate::row::{ColumnMeta, FromRow, Row};

/// Callbacks for a command's results.
///
/// Callback patterns by statement type:
/// - SELECT with rows: `result_start` → `row*` → `result_end`
/// - SELECT with 0 rows: `result_start` → `result_end`
/// - INSERT/UPDATE/DELETE: `no_result_set` only (with affected row count)
///
/// For multi-statement queries like `"SELECT 1; UPDATE foo SET x=1"`:
/// ```text
/// result_start → row* → result_end   // SELECT 1
/// no_result_set                       // UPDATE
/// ```
pub trait ResultHandler {
    /// Called for a response without a result set.
    fn no_result_set(&mut self, ok: &OkPacket) -> Result<()> {
        let _ = ok;
        Ok(())
    }

    /// Called once all column definitions of a result set are read.
    fn result_start(&mut self, cols: &Arc<[ColumnMeta]>) -> Result<()> {
        let _ = cols;
        Ok(())
    }

    /// Called for each row.
    fn row(&mut self, cols: &Arc<[ColumnMeta]>, row: RawRow<'_>) -> Result<()>;

    /// Called when a result set ends.
    fn result_end(&mut self, eof: &OkPacket) -> Result<()> {
        let _ = eof;
        Ok(())
    }
}

/// A handler that discards all results.
///
/// Rows are never decoded, which makes this the handler used to drain an
/// abandoned result off the wire.
#[derive(Debug, Default)]
pub struct DropHandler {
    affected_rows: u64,
    rows: u64,
}

impl DropHandler {
    /// Create a new drop handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of affected rows over all statements.
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    /// Number of rows discarded.
    pub fn rows_discarded(&self) -> u64 {
        self.rows
    }
}

impl ResultHandler for DropHandler {
    fn no_result_set(&mut self, ok: &OkPacket) -> Result<()> {
        self.affected_rows += ok.affected_rows;
        Ok(())
    }

    fn row(&mut self, _cols: &Arc<[ColumnMeta]>, _row: RawRow<'_>) -> Result<()> {
        self.rows += 1;
        Ok(())
    }
}

/// Handler that collects typed rows.
///
/// # Example
///
/// ```ignore
/// let mut handler: CollectHandler<(i64, String)> = CollectHandler::new();
/// conn.query("SELECT id, name FROM users", &mut handler)?;
/// for (id, name) in handler.into_rows() {
///     println!("{}: {}", id, name);
/// }
/// ```
pub struct CollectHandler<T> {
    rows: Vec<T>,
}

impl<T> Default for CollectHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CollectHandler<T> {
    /// Create a new collect handler.
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Get collected rows.
    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    /// Take collected rows.
    pub fn into_rows(self) -> Vec<T> {
        self.rows
    }

    /// Get the number of collected rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if no rows were collected.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<T: FromRow> ResultHandler for CollectHandler<T> {
    fn row(&mut self, cols: &Arc<[ColumnMeta]>, row: RawRow<'_>) -> Result<()> {
        let values = row.decode(cols)?;
        self.rows.push(T::from_row(Row::with_columns(values, Arc::clone(cols)))?);
        Ok(())
    }
}

/// Handler that collects only the first row.
pub struct FirstRowHandler<T> {
    row: Option<T>,
}

impl<T> Default for FirstRowHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FirstRowHandler<T> {
    /// Create a new first row handler.
    pub fn new() -> Self {
        Self { row: None }
    }

    /// Get the first row if present.
    pub fn get(&self) -> Option<&T> {
        self.row.as_ref()
    }

    /// Take the first row.
    pub fn into_row(self) -> Option<T> {
        self.row
    }
}

impl<T: FromRow> ResultHandler for FirstRowHandler<T> {
    fn row(&mut self, cols: &Arc<[ColumnMeta]>, row: RawRow<'_>) -> Result<()> {
        if self.row.is_none() {
            let values = row.decode(cols)?;
            self.row = Some(T::from_row(Row::with_columns(values, Arc::clone(cols)))?);
        }
        Ok(())
    }
}

/// Cursor-side sink for one result set.
///
/// Buffered cursors let it accumulate every row; streaming cursors take the
/// single row out after each step.
#[derive(Debug, Default)]
pub(crate) struct ResultSink {
    pub named_rows: bool,
    pub columns: Option<Arc<[ColumnMeta]>>,
    pub rows: Vec<Row>,
    pub ok: Option<OkPacket>,
}

impl ResultSink {
    pub fn new(named_rows: bool) -> Self {
        Self {
            named_rows,
            ..Self::default()
        }
    }
}

impl ResultHandler for ResultSink {
    fn no_result_set(&mut self, ok: &OkPacket) -> Result<()> {
        self.ok = Some(ok.clone());
        Ok(())
    }

    fn result_start(&mut self, cols: &Arc<[ColumnMeta]>) -> Result<()> {
        self.columns = Some(Arc::clone(cols));
        Ok(())
    }

    fn row(&mut self, cols: &Arc<[ColumnMeta]>, row: RawRow<'_>) -> Result<()> {
        let values = row.decode(cols)?;
        let row = if self.named_rows {
            Row::with_columns(values, Arc::clone(cols))
        } else {
            Row::new(values)
        };
        self.rows.push(row);
        Ok(())
    }

    fn result_end(&mut self, eof: &OkPacket) -> Result<()> {
        self.ok = Some(eof.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::write_lenenc_bytes;
    use crate::protocol::row::RowFormat;
    use crate::value::Value;

    fn cols() -> Arc<[ColumnMeta]> {
        Arc::from(vec![ColumnMeta::named("a")])
    }

    fn text_row(value: &[u8]) -> Vec<u8> {
        let mut payload = Vec::new();
        write_lenenc_bytes(&mut payload, value);
        payload
    }

    #[test]
    fn collect_handler_decodes_rows() {
        let cols = cols();
        let mut handler = CollectHandler::<(String,)>::new();
        for v in [b"x".as_slice(), b"y"] {
            let payload = text_row(v);
            handler.row(&cols, RawRow::new(&payload, RowFormat::Text)).unwrap();
        }
        assert_eq!(handler.into_rows(), [("x".to_string(),), ("y".to_string(),)]);
    }

    #[test]
    fn first_row_handler_keeps_first() {
        let cols = cols();
        let mut handler = FirstRowHandler::<Row>::new();
        for v in [b"1".as_slice(), b"2"] {
            let payload = text_row(v);
            handler.row(&cols, RawRow::new(&payload, RowFormat::Text)).unwrap();
        }
        let row = handler.into_row().unwrap();
        assert_eq!(row.get_by_name("a"), Some(&Value::from("1")));
    }

    #[test]
    fn sink_respects_named_rows() {
        let cols = cols();
        let payload = text_row(b"v");
        let mut positional = ResultSink::new(false);
        positional.row(&cols, RawRow::new(&payload, RowFormat::Text)).unwrap();
        assert!(positional.rows[0].names().is_none());

        let mut named = ResultSink::new(true);
        named.row(&cols, RawRow::new(&payload, RowFormat::Text)).unwrap();
        assert_eq!(named.rows[0].get_by_name("a"), Some(&Value::from("v")));
    }
}
