//! COM_STMT_PREPARE response state machine.

use std::sync::Arc;

use crate::buffer_set::BufferSet;
use crate::error::{Error, Result};
use crate::protocol::response::{ColumnDefinition, EofPacket, PrepareOk, parse_err};
use crate::protocol::types::header;
use crate::row::ColumnMeta;

use super::action::Action;

/// Server-side statement as reported by COM_STMT_PREPARE_OK.
#[derive(Debug, Clone)]
pub struct StatementInfo {
    /// Server-side statement id
    pub statement_id: u32,
    /// Number of `?` parameters
    pub param_count: u16,
    /// Result columns (empty for statements without a result set)
    pub columns: Arc<[ColumnMeta]>,
    /// Warning count
    pub warnings: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitingOk,
    ReadingParams { remaining: u16 },
    WaitingParamsEof,
    ReadingColumns { remaining: u16 },
    WaitingColumnsEof,
    Finished,
    Failed,
}

/// Reads PrepareOk, then the parameter definitions and the column
/// definitions (each followed by EOF unless EOF is deprecated).
#[derive(Debug)]
pub struct PrepareStateMachine {
    state: State,
    deprecate_eof: bool,
    statement_id: u32,
    param_count: u16,
    num_columns: u16,
    warnings: u16,
    columns: Vec<ColumnMeta>,
}

impl PrepareStateMachine {
    /// Create a new prepare state machine.
    pub fn new(deprecate_eof: bool) -> Self {
        Self {
            state: State::WaitingOk,
            deprecate_eof,
            statement_id: 0,
            param_count: 0,
            num_columns: 0,
            warnings: 0,
            columns: Vec::new(),
        }
    }

    /// Take the prepared statement once the machine has finished.
    pub fn take_statement(&mut self) -> Option<StatementInfo> {
        if self.state != State::Finished {
            return None;
        }
        Some(StatementInfo {
            statement_id: self.statement_id,
            param_count: self.param_count,
            columns: Arc::from(std::mem::take(&mut self.columns)),
            warnings: self.warnings,
        })
    }

    /// Process the packet in `buffer_set.read_buffer`.
    pub fn step(&mut self, buffer_set: &BufferSet) -> Result<Action> {
        let payload = buffer_set.read_buffer.as_slice();
        match self.state {
            State::WaitingOk => {
                if payload.first() == Some(&header::ERR) {
                    self.state = State::Failed;
                    return Err(Error::Server(parse_err(payload)?));
                }
                let ok = PrepareOk::parse(payload)?;
                self.statement_id = ok.statement_id.get();
                self.param_count = ok.num_params.get();
                self.warnings = ok.warnings.get();
                self.num_columns = ok.num_columns.get();
                self.columns.reserve(usize::from(self.num_columns));
                self.state = if self.param_count > 0 {
                    State::ReadingParams {
                        remaining: self.param_count,
                    }
                } else {
                    self.after_params()
                };
                Ok(self.action())
            }
            State::ReadingParams { remaining } => {
                // Parameter definitions carry nothing the binary encoder
                // needs; parameter types are sent with every execute.
                ColumnDefinition::parse(payload)?;
                let remaining = remaining - 1;
                self.state = if remaining > 0 {
                    State::ReadingParams { remaining }
                } else if self.deprecate_eof {
                    self.after_params()
                } else {
                    State::WaitingParamsEof
                };
                Ok(self.action())
            }
            State::WaitingParamsEof => {
                EofPacket::parse(payload)?;
                self.state = self.after_params();
                Ok(self.action())
            }
            State::ReadingColumns { remaining } => {
                let def = ColumnDefinition::parse(payload)?;
                self.columns.push(ColumnMeta::from(def));
                let remaining = remaining - 1;
                self.state = if remaining > 0 {
                    State::ReadingColumns { remaining }
                } else if self.deprecate_eof {
                    State::Finished
                } else {
                    State::WaitingColumnsEof
                };
                Ok(self.action())
            }
            State::WaitingColumnsEof => {
                EofPacket::parse(payload)?;
                self.state = State::Finished;
                Ok(Action::Finished)
            }
            State::Finished | State::Failed => Err(Error::Protocol(
                "prepare response already finished".into(),
            )),
        }
    }

    fn after_params(&self) -> State {
        if self.num_columns > 0 {
            State::ReadingColumns {
                remaining: self.num_columns,
            }
        } else {
            State::Finished
        }
    }

    fn action(&self) -> Action {
        if self.state == State::Finished {
            Action::Finished
        } else {
            Action::NeedPacket
        }
    }
}
