//! Result-set reader state machine.
//!
//! Drives the response to COM_QUERY (text rows) and COM_STMT_EXECUTE
//! (binary rows). One packet is consumed per `step()`, so a caller can stop
//! between any two packets and resume later; that is what lets a streaming
//! cursor hold a half-read result open on the connection.

use std::sync::Arc;

use crate::buffer_set::BufferSet;
use crate::error::{Error, Result};
use crate::handler::ResultHandler;
use crate::protocol::codec::read_lenenc_int;
use crate::protocol::response::{
    ColumnDefinition, EofPacket, OkPacket, is_result_terminator, parse_err,
};
use crate::protocol::row::{RawRow, RowFormat};
use crate::protocol::types::{ServerStatus, header};
use crate::row::ColumnMeta;

use super::action::Action;

/// Query state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitingHeader,
    ReadingColumns { remaining: u64 },
    WaitingColumnsEof,
    ReadingRows,
    Finished,
}

/// Result-set reader for one command's response.
#[derive(Debug)]
pub struct QueryStateMachine {
    state: State,
    format: RowFormat,
    deprecate_eof: bool,
    pending_columns: Vec<ColumnMeta>,
    columns: Option<Arc<[ColumnMeta]>>,
    status: Option<ServerStatus>,
}

impl QueryStateMachine {
    /// Create a state machine for a response whose first packet has not
    /// been read yet.
    pub fn new(format: RowFormat, deprecate_eof: bool) -> Self {
        Self {
            state: State::WaitingHeader,
            format,
            deprecate_eof,
            pending_columns: Vec::new(),
            columns: None,
            status: None,
        }
    }

    /// Row encoding of this response.
    pub fn format(&self) -> RowFormat {
        self.format
    }

    /// Server status from the last OK/EOF packet, if one was read.
    pub fn status(&self) -> Option<ServerStatus> {
        self.status
    }

    /// Returns true once no packet of the response remains on the wire.
    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    /// Returns true while positioned inside a result set's rows.
    pub fn in_rows(&self) -> bool {
        self.state == State::ReadingRows
    }

    /// Columns of the current (or last) result set.
    pub fn columns(&self) -> Option<&Arc<[ColumnMeta]>> {
        self.columns.as_ref()
    }

    /// Process the packet in `buffer_set.read_buffer`.
    ///
    /// The state advances before the handler is called, so a handler error
    /// leaves the machine consistent with the wire and the rest of the
    /// response can still be drained.
    pub fn step<H: ResultHandler>(
        &mut self,
        buffer_set: &BufferSet,
        handler: &mut H,
    ) -> Result<Action> {
        let payload = buffer_set.read_buffer.as_slice();

        // Column definitions start with the lenenc catalog "def", rows never
        // start with 0xff, so this is an ERR packet in every state.
        if payload.first() == Some(&header::ERR) && self.state != State::Finished {
            self.state = State::Finished;
            return Err(Error::Server(parse_err(payload)?));
        }

        match self.state {
            State::WaitingHeader => self.handle_header(payload, handler),
            State::ReadingColumns { remaining } => {
                let def = ColumnDefinition::parse(payload)?;
                self.pending_columns.push(ColumnMeta::from(def));
                let remaining = remaining - 1;
                if remaining > 0 {
                    self.state = State::ReadingColumns { remaining };
                    Ok(Action::NeedPacket)
                } else if self.deprecate_eof {
                    self.start_rows(handler)
                } else {
                    self.state = State::WaitingColumnsEof;
                    Ok(Action::NeedPacket)
                }
            }
            State::WaitingColumnsEof => {
                let eof = EofPacket::parse(payload)?;
                self.status = Some(eof.status);
                self.start_rows(handler)
            }
            State::ReadingRows => self.handle_row(payload, handler),
            State::Finished => Err(Error::Protocol(
                "query response already finished".into(),
            )),
        }
    }

    fn handle_header<H: ResultHandler>(&mut self, payload: &[u8], handler: &mut H) -> Result<Action> {
        match payload.first() {
            Some(&header::OK) => {
                let ok = OkPacket::parse(payload)?;
                let action = self.end_result(ok.status);
                self.columns = None;
                handler.no_result_set(&ok)?;
                Ok(action)
            }
            Some(&header::LOCAL_INFILE) => {
                self.state = State::Finished;
                Err(Error::Protocol(
                    "LOCAL INFILE requests are not supported".into(),
                ))
            }
            Some(_) => {
                let (count, _) = read_lenenc_int(payload)?;
                if count == 0 {
                    return Err(Error::Protocol("result set with zero columns".into()));
                }
                self.pending_columns.clear();
                self.pending_columns
                    .reserve(usize::try_from(count.min(4096)).unwrap_or_default());
                self.state = State::ReadingColumns { remaining: count };
                Ok(Action::NeedPacket)
            }
            None => Err(Error::Protocol("empty response packet".into())),
        }
    }

    fn start_rows<H: ResultHandler>(&mut self, handler: &mut H) -> Result<Action> {
        let cols: Arc<[ColumnMeta]> = Arc::from(std::mem::take(&mut self.pending_columns));
        self.state = State::ReadingRows;
        self.columns = Some(Arc::clone(&cols));
        handler.result_start(&cols)?;
        Ok(Action::NeedPacket)
    }

    fn handle_row<H: ResultHandler>(&mut self, payload: &[u8], handler: &mut H) -> Result<Action> {
        if is_result_terminator(payload, self.deprecate_eof) {
            let ok = if self.deprecate_eof {
                OkPacket::parse(payload)?
            } else {
                OkPacket::from_eof(EofPacket::parse(payload)?)
            };
            let action = self.end_result(ok.status);
            handler.result_end(&ok)?;
            return Ok(action);
        }

        let cols = self
            .columns
            .as_ref()
            .ok_or_else(|| Error::Protocol("row before column definitions".into()))?;
        handler.row(cols, RawRow::new(payload, self.format))?;
        Ok(Action::NeedPacket)
    }

    fn end_result(&mut self, status: ServerStatus) -> Action {
        self.status = Some(status);
        if status.more_results() {
            self.state = State::WaitingHeader;
            Action::ResultSetEnd
        } else {
            self.state = State::Finished;
            Action::Finished
        }
    }
}
