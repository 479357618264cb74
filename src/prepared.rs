//! Runtime-independent prepared statement session.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::format::to_server_placeholders;
use crate::params::Params;
use crate::row::ColumnMeta;
use crate::state::StatementInfo;
use crate::value::Value;

/// Prepared session lifecycle.
///
/// `Unprepared → Prepared → Bound → Executed → (Bound | Unprepared)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreparedState {
    /// No server-side statement
    Unprepared,
    /// Statement prepared, no parameters bound
    Prepared,
    /// Parameters bound
    Bound,
    /// Executed at least once since the last bind
    Executed,
}

/// A server-side prepared statement.
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    sql: String,
    info: StatementInfo,
    epoch: u64,
}

impl PreparedStatement {
    pub(crate) fn new(sql: String, info: StatementInfo, epoch: u64) -> Self {
        Self { sql, info, epoch }
    }

    /// Statement text as given to `prepared_statement`.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Server-side statement id.
    pub fn id(&self) -> u32 {
        self.info.statement_id
    }

    /// Number of parameters the server expects.
    pub fn param_count(&self) -> usize {
        usize::from(self.info.param_count)
    }

    /// Result columns reported at prepare time.
    pub fn columns(&self) -> &Arc<[ColumnMeta]> {
        &self.info.columns
    }

    /// Session epoch the statement was prepared in.
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Validate statement text and translate it for COM_STMT_PREPARE.
///
/// Returns the original text and the server form with `?` placeholders.
pub(crate) fn translate(sql: &[u8]) -> Result<(String, String)> {
    let text = simdutf8::basic::from_utf8(sql)
        .map_err(|_| Error::Type("prepared statement must be text".into()))?;
    let (server_sql, _) = to_server_placeholders(text)?;
    Ok((text.to_string(), server_sql))
}

/// Check that `statement` is still valid in session `epoch` and takes
/// `bound` parameters.
pub(crate) fn check_bind(statement: &PreparedStatement, epoch: u64, bound: usize) -> Result<()> {
    if statement.epoch() != epoch {
        return Err(Error::Programming(
            "prepared statement was invalidated by a session reset".into(),
        ));
    }
    if bound != statement.param_count() {
        return Err(Error::Programming(format!(
            "statement expects {} parameters, {} bound",
            statement.param_count(),
            bound
        )));
    }
    Ok(())
}

/// Statement handle and bound parameters of one prepared cursor.
#[derive(Debug)]
pub(crate) struct PreparedSession {
    state: PreparedState,
    statement: Option<PreparedStatement>,
    params: Vec<Value>,
}

impl PreparedSession {
    pub fn new() -> Self {
        Self {
            state: PreparedState::Unprepared,
            statement: None,
            params: Vec::new(),
        }
    }

    pub fn state(&self) -> PreparedState {
        self.state
    }

    pub fn statement(&self) -> Option<&PreparedStatement> {
        self.statement.as_ref()
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Install a freshly prepared statement, returning the one it replaces.
    pub fn install(&mut self, statement: PreparedStatement) -> Option<PreparedStatement> {
        self.params.clear();
        self.state = PreparedState::Prepared;
        self.statement.replace(statement)
    }

    /// Forget the statement, returning it so the caller can close it.
    pub fn take(&mut self) -> Option<PreparedStatement> {
        self.params.clear();
        self.state = PreparedState::Unprepared;
        self.statement.take()
    }

    /// Append parameter values. Only a positional sequence is accepted.
    ///
    /// Values bound before any statement is prepared are kept, but the
    /// session stays `Unprepared`.
    pub fn add_parameters(&mut self, params: Params) -> Result<()> {
        match params {
            Params::Positional(values) => {
                self.params.extend(values);
                if self.state != PreparedState::Unprepared {
                    self.state = PreparedState::Bound;
                }
                Ok(())
            }
            Params::Named(_) => Err(Error::Type(
                "add_parameters expects a positional sequence, got a mapping".into(),
            )),
            Params::None => Err(Error::Type(
                "add_parameters expects a positional sequence".into(),
            )),
        }
    }

    /// Clear bound parameters without touching the prepared status.
    pub fn reset_parameters(&mut self) {
        self.params.clear();
        if self.state != PreparedState::Unprepared {
            self.state = PreparedState::Prepared;
        }
    }

    /// The statement to execute, after validating state, epoch and arity.
    pub fn executable(&self, epoch: u64) -> Result<&PreparedStatement> {
        let statement = match (&self.statement, self.state) {
            (Some(statement), state) if state != PreparedState::Unprepared => statement,
            _ => {
                return Err(Error::Programming(
                    "no prepared statement: call prepared_statement() first".into(),
                ));
            }
        };
        check_bind(statement, epoch, self.params.len())?;
        Ok(statement)
    }

    pub fn mark_executed(&mut self) {
        self.state = PreparedState::Executed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::IntoParams;

    fn statement(param_count: u16, epoch: u64) -> PreparedStatement {
        PreparedStatement::new(
            "insert into t (a) values (%s)".into(),
            StatementInfo {
                statement_id: 1,
                param_count,
                columns: Arc::from(Vec::new()),
                warnings: 0,
            },
            epoch,
        )
    }

    #[test]
    fn translate_checks_text() {
        let (sql, server) = translate(b"insert into t (a) values (%s)").unwrap();
        assert_eq!(sql, "insert into t (a) values (%s)");
        assert_eq!(server, "insert into t (a) values (?)");
        assert!(matches!(translate(b"\xff\xfe"), Err(Error::Type(_))));
        assert!(matches!(translate(b"select %(a)s"), Err(Error::Programming(_))));
    }

    #[test]
    fn lifecycle() {
        let mut session = PreparedSession::new();
        assert!(matches!(session.executable(0), Err(Error::Programming(_))));

        assert!(session.install(statement(1, 0)).is_none());
        assert_eq!(session.state(), PreparedState::Prepared);

        session.add_parameters(("0",).into_params()).unwrap();
        assert_eq!(session.state(), PreparedState::Bound);
        assert_eq!(session.params(), [Value::from("0")]);
        session.executable(0).unwrap();
        session.mark_executed();

        session.reset_parameters();
        assert!(session.params().is_empty());
        assert_eq!(session.state(), PreparedState::Prepared);
    }

    #[test]
    fn reset_keeps_unprepared() {
        let mut session = PreparedSession::new();
        session.add_parameters((1,).into_params()).unwrap();
        assert_eq!(session.state(), PreparedState::Unprepared);
        session.reset_parameters();
        assert_eq!(session.state(), PreparedState::Unprepared);
        assert!(session.params().is_empty());
    }

    #[test]
    fn parameter_shape_errors() {
        let mut session = PreparedSession::new();
        session.install(statement(1, 0));
        assert!(matches!(
            session.add_parameters(Params::named([("a", 1)])),
            Err(Error::Type(_))
        ));
        assert!(matches!(session.add_parameters(().into_params()), Err(Error::Type(_))));
        // nothing was bound
        assert!(matches!(session.executable(0), Err(Error::Programming(_))));
    }

    #[test]
    fn stale_epoch() {
        let mut session = PreparedSession::new();
        session.install(statement(0, 1));
        assert!(session.executable(1).is_ok());
        assert!(matches!(session.executable(2), Err(Error::Programming(_))));
    }
}
