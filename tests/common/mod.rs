//! Scripted in-memory MySQL server for integration tests.
//!
//! `FakeServer` implements both transport traits. Every command is answered
//! by queueing its complete response; reads pop packets off that queue. A
//! client that leaves a response unread gets its stale packets back on the
//! next read, exactly like a socket would.
//!
//! The SQL dialect is tiny: `CREATE TABLE`, `DROP TABLE`, `DELETE FROM`,
//! multi-row `INSERT`/`REPLACE`, `SELECT` of literals, `SELECT cols|*|count(*)
//! FROM t1[, t2] [WHERE col = literal]` (rows come back in insertion order),
//! transaction statements and `SET autocommit`. Statements are split on `;`.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use zero_mysql_cursor::protocol::types::command;
use zero_mysql_cursor::{AsyncTransport, Error, Result, ServerStatus, SessionInfo, Transport};

const TYPE_LONGLONG: u8 = 0x08;
const TYPE_DOUBLE: u8 = 0x05;
const TYPE_FLOAT: u8 = 0x04;
const TYPE_NULL: u8 = 0x06;
const TYPE_VAR_STRING: u8 = 0xfd;

/// One stored value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Text(String),
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Default)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone)]
struct Statement {
    sql: String,
    param_count: usize,
}

#[derive(Debug)]
struct SqlError {
    code: u16,
    state: &'static str,
    message: String,
}

impl SqlError {
    fn syntax(near: &str) -> Self {
        Self {
            code: 1064,
            state: "42000",
            message: format!("You have an error in your SQL syntax near '{near}'"),
        }
    }

    fn no_table(name: &str) -> Self {
        Self {
            code: 1146,
            state: "42S02",
            message: format!("Table '{name}' doesn't exist"),
        }
    }

    fn unknown_column(name: &str) -> Self {
        Self {
            code: 1054,
            state: "42S22",
            message: format!("Unknown column '{name}' in 'field list'"),
        }
    }
}

enum Reply {
    Ok { affected: u64, insert_id: u64 },
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Cell>>,
    },
}

impl Reply {
    fn ok() -> Self {
        Reply::Ok {
            affected: 0,
            insert_id: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Text,
    Binary,
}

struct State {
    session: SessionInfo,
    status: ServerStatus,
    replies: VecDeque<Vec<u8>>,
    commands: Vec<Vec<u8>>,
    tables: BTreeMap<String, Table>,
    statements: HashMap<u32, Statement>,
    next_statement_id: u32,
    closed_statements: Vec<u32>,
    link_budget: Option<usize>,
    quit: bool,
}

/// Handle to the shared server state. Clones talk to the same server, so a
/// test keeps one clone to inspect what the connection did.
#[derive(Clone)]
pub struct FakeServer {
    state: Arc<Mutex<State>>,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeServer {
    /// Server that negotiated CLIENT_DEPRECATE_EOF.
    pub fn new() -> Self {
        Self::with_session(SessionInfo {
            deprecate_eof: true,
            status: ServerStatus::AUTOCOMMIT,
            connection_id: 7,
        })
    }

    /// Server that terminates column lists and row streams with EOF packets.
    pub fn classic_eof() -> Self {
        Self::with_session(SessionInfo {
            deprecate_eof: false,
            status: ServerStatus::AUTOCOMMIT,
            connection_id: 8,
        })
    }

    pub fn with_session(session: SessionInfo) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                session,
                status: session.status,
                replies: VecDeque::new(),
                commands: Vec::new(),
                tables: BTreeMap::new(),
                statements: HashMap::new(),
                next_statement_id: 1,
                closed_statements: Vec::new(),
                link_budget: None,
                quit: false,
            })),
        }
    }

    /// Seed a table.
    pub fn table(self, name: &str, columns: &[&str], rows: Vec<Vec<Cell>>) -> Self {
        self.lock().tables.insert(
            name.to_string(),
            Table {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows,
            },
        );
        self
    }

    /// Seed a table with one integer column `n` holding `1..=count`.
    pub fn numbers(self, name: &str, count: i64) -> Self {
        let rows = (1..=count).map(|n| vec![Cell::Int(n)]).collect();
        self.table(name, &["n"], rows)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Text of every COM_QUERY received, in order.
    pub fn queries(&self) -> Vec<String> {
        self.lock()
            .commands
            .iter()
            .filter(|c| c.first() == Some(&command::QUERY))
            .map(|c| String::from_utf8_lossy(&c[1..]).into_owned())
            .collect()
    }

    /// Command byte of every command received, in order.
    pub fn command_bytes(&self) -> Vec<u8> {
        self.lock()
            .commands
            .iter()
            .filter_map(|c| c.first().copied())
            .collect()
    }

    /// Rows currently stored in `table`.
    pub fn rows(&self, table: &str) -> Vec<Vec<Cell>> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Statement ids received in COM_STMT_CLOSE.
    pub fn closed_statements(&self) -> Vec<u32> {
        self.lock().closed_statements.clone()
    }

    /// Number of statements prepared and not yet closed.
    pub fn open_statements(&self) -> usize {
        self.lock().statements.len()
    }

    /// Packets queued but not yet read by the client.
    pub fn unread_packets(&self) -> usize {
        self.lock().replies.len()
    }

    /// Deliver `packets` more packets, then fail every read.
    pub fn drop_link_after(&self, packets: usize) {
        self.lock().link_budget = Some(packets);
    }

    /// Whether COM_QUIT was received.
    pub fn quit_received(&self) -> bool {
        self.lock().quit
    }
}

impl Transport for FakeServer {
    fn send_command(&mut self, payload: &[u8]) -> Result<()> {
        self.lock().handle(payload);
        Ok(())
    }

    fn read_packet(&mut self, buf: &mut Vec<u8>) -> Result<()> {
        self.lock().next_packet(buf)
    }

    fn session(&self) -> SessionInfo {
        self.lock().session
    }
}

impl AsyncTransport for FakeServer {
    async fn send_command(&mut self, payload: &[u8]) -> Result<()> {
        Transport::send_command(self, payload)
    }

    async fn read_packet(&mut self, buf: &mut Vec<u8>) -> Result<()> {
        Transport::read_packet(self, buf)
    }

    fn session(&self) -> SessionInfo {
        Transport::session(self)
    }
}

impl State {
    fn next_packet(&mut self, buf: &mut Vec<u8>) -> Result<()> {
        if let Some(budget) = self.link_budget.as_mut() {
            if *budget == 0 {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "link dropped",
                )));
            }
            *budget -= 1;
        }
        let packet = self.replies.pop_front().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read with no response queued",
            ))
        })?;
        buf.clear();
        buf.extend_from_slice(&packet);
        Ok(())
    }

    fn handle(&mut self, payload: &[u8]) {
        self.commands.push(payload.to_vec());
        let Some((&cmd, body)) = payload.split_first() else {
            return self.send_err(SqlError::syntax(""));
        };
        match cmd {
            command::QUIT => self.quit = true,
            command::QUERY => {
                let sql = String::from_utf8_lossy(body).into_owned();
                self.query(&sql);
            }
            command::PING => self.send_reply(Reply::ok(), false, Format::Text),
            command::RESET_CONNECTION => {
                self.statements.clear();
                self.status = ServerStatus::AUTOCOMMIT;
                self.send_reply(Reply::ok(), false, Format::Text);
            }
            command::STMT_PREPARE => {
                let sql = String::from_utf8_lossy(body).into_owned();
                self.prepare(&sql);
            }
            command::STMT_EXECUTE => self.execute(body),
            command::STMT_CLOSE => {
                let id = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
                self.statements.remove(&id);
                self.closed_statements.push(id);
            }
            other => self.send_err(SqlError {
                code: 1047,
                state: "08S01",
                message: format!("Unknown command 0x{other:02x}"),
            }),
        }
    }

    fn query(&mut self, sql: &str) {
        let statements = split_statements(sql);
        if statements.is_empty() {
            return self.send_err(SqlError {
                code: 1065,
                state: "42000",
                message: "Query was empty".into(),
            });
        }
        let last = statements.len() - 1;
        for (i, statement) in statements.iter().enumerate() {
            match self.run(statement) {
                Ok(reply) => self.send_reply(reply, i < last, Format::Text),
                Err(err) => return self.send_err(err),
            }
        }
    }

    fn prepare(&mut self, sql: &str) {
        let param_count = placeholder_count(sql);
        let lower = sql.trim_start().to_ascii_lowercase();
        let columns = if lower.starts_with("select") {
            let probe = bind(sql, &vec!["NULL".to_string(); param_count]);
            match self.run(&probe) {
                Ok(Reply::Rows { columns, .. }) => columns,
                Ok(Reply::Ok { .. }) => Vec::new(),
                Err(err) => return self.send_err(err),
            }
        } else if lower.trim().is_empty() {
            return self.send_err(SqlError {
                code: 1065,
                state: "42000",
                message: "Query was empty".into(),
            });
        } else {
            Vec::new()
        };

        let id = self.next_statement_id;
        self.next_statement_id += 1;
        self.statements.insert(
            id,
            Statement {
                sql: sql.to_string(),
                param_count,
            },
        );

        let mut ok = vec![0x00];
        ok.extend_from_slice(&id.to_le_bytes());
        ok.extend_from_slice(&(columns.len() as u16).to_le_bytes());
        ok.extend_from_slice(&(param_count as u16).to_le_bytes());
        ok.extend_from_slice(&[0, 0, 0]);
        self.replies.push_back(ok);
        for _ in 0..param_count {
            self.replies.push_back(column_def("?", TYPE_VAR_STRING));
        }
        let eof = self.eof(false);
        if param_count > 0 && !self.session.deprecate_eof {
            self.replies.push_back(eof.clone());
        }
        for name in &columns {
            self.replies.push_back(column_def(name, TYPE_VAR_STRING));
        }
        if !columns.is_empty() && !self.session.deprecate_eof {
            self.replies.push_back(eof);
        }
    }

    fn execute(&mut self, body: &[u8]) {
        let id = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
        let Some(statement) = self.statements.get(&id).cloned() else {
            return self.send_err(SqlError {
                code: 1243,
                state: "HY000",
                message: format!("Unknown prepared statement handler ({id}) given to mysqld_stmt_execute"),
            });
        };
        // statement id, cursor flags, iteration count
        let rest = &body[9..];
        let literals = match decode_params(rest, statement.param_count) {
            Ok(literals) => literals,
            Err(err) => return self.send_err(err),
        };
        let sql = bind(&statement.sql, &literals);
        match self.run(&sql) {
            Ok(reply) => self.send_reply(reply, false, Format::Binary),
            Err(err) => self.send_err(err),
        }
    }

    fn run(&mut self, sql: &str) -> std::result::Result<Reply, SqlError> {
        let sql = sql.trim();
        let lower = sql.to_ascii_lowercase();
        let words: Vec<&str> = lower.split_whitespace().collect();
        match words.as_slice() {
            ["begin"] | ["start", "transaction"] => {
                self.status.insert(ServerStatus::IN_TRANS);
                Ok(Reply::ok())
            }
            ["commit"] | ["rollback"] => {
                self.status.remove(ServerStatus::IN_TRANS);
                Ok(Reply::ok())
            }
            _ if lower.starts_with("set autocommit") => {
                let on = lower.ends_with('1');
                self.status.set(ServerStatus::AUTOCOMMIT, on);
                Ok(Reply::ok())
            }
            ["create", "table", ..] => self.create_table(sql),
            ["drop", "table", "if", "exists", name] => {
                self.tables.remove(unquote(name));
                Ok(Reply::ok())
            }
            ["drop", "table", name] => match self.tables.remove(unquote(name)) {
                Some(_) => Ok(Reply::ok()),
                None => Err(SqlError::no_table(name)),
            },
            ["delete", "from", name] => {
                let table = self
                    .tables
                    .get_mut(unquote(name))
                    .ok_or_else(|| SqlError::no_table(name))?;
                let affected = table.rows.len() as u64;
                table.rows.clear();
                Ok(Reply::Ok {
                    affected,
                    insert_id: 0,
                })
            }
            ["insert", ..] | ["replace", ..] => self.insert(sql, &lower),
            ["select", ..] => self.select(sql, &lower),
            _ => Err(SqlError::syntax(sql)),
        }
    }

    fn create_table(&mut self, sql: &str) -> std::result::Result<Reply, SqlError> {
        let open = sql.find('(').ok_or_else(|| SqlError::syntax(sql))?;
        let close = sql.rfind(')').ok_or_else(|| SqlError::syntax(sql))?;
        let head: Vec<&str> = sql[..open].split_whitespace().collect();
        let name = head
            .last()
            .map(|n| unquote(n).to_string())
            .ok_or_else(|| SqlError::syntax(sql))?;
        if self.tables.contains_key(&name) {
            return Err(SqlError {
                code: 1050,
                state: "42S01",
                message: format!("Table '{name}' already exists"),
            });
        }
        let columns = split_top_level(&sql[open + 1..close])
            .into_iter()
            .filter_map(|def| def.split_whitespace().next())
            .filter(|first| {
                !matches!(
                    first.to_ascii_lowercase().as_str(),
                    "primary" | "unique" | "key" | "index"
                )
            })
            .map(|first| unquote(first).to_string())
            .collect();
        self.tables.insert(
            name,
            Table {
                columns,
                rows: Vec::new(),
            },
        );
        Ok(Reply::ok())
    }

    fn insert(&mut self, sql: &str, lower: &str) -> std::result::Result<Reply, SqlError> {
        let into = lower.find(" into ").ok_or_else(|| SqlError::syntax(sql))? + 6;
        let after_into = sql[into..].trim_start();
        let name_len = after_into
            .find(|c: char| c.is_whitespace() || c == '(')
            .ok_or_else(|| SqlError::syntax(sql))?;
        let name = unquote(&after_into[..name_len]).to_string();

        let cols_start = sql.len() - after_into.len() + name_len;
        let open = cols_start + sql[cols_start..].find('(').ok_or_else(|| SqlError::syntax(sql))?;
        let close = open + sql[open..].find(')').ok_or_else(|| SqlError::syntax(sql))?;
        let columns: Vec<String> = split_top_level(&sql[open + 1..close])
            .into_iter()
            .map(|c| unquote(c.trim()).to_string())
            .collect();

        let values_at = lower[close..]
            .find("value")
            .map(|i| close + i)
            .ok_or_else(|| SqlError::syntax(sql))?;
        let mut lexer = Lexer::new(sql, values_at + "value".len());
        lexer.eat_char('s');

        let mut tuples = vec![lexer.tuple()?];
        while lexer.eat(',') {
            tuples.push(lexer.tuple()?);
        }

        let table = self
            .tables
            .get_mut(&name)
            .ok_or_else(|| SqlError::no_table(&name))?;
        let indices = columns
            .iter()
            .map(|c| {
                table
                    .columns
                    .iter()
                    .position(|t| t == c)
                    .ok_or_else(|| SqlError::unknown_column(c))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (row_number, tuple) in tuples.iter().enumerate() {
            if tuple.len() != indices.len() {
                return Err(SqlError {
                    code: 1136,
                    state: "21S01",
                    message: format!(
                        "Column count doesn't match value count at row {}",
                        row_number + 1
                    ),
                });
            }
        }
        let affected = tuples.len() as u64;
        for tuple in tuples {
            let mut row = vec![Cell::Null; table.columns.len()];
            for (index, cell) in indices.iter().zip(tuple) {
                row[*index] = cell;
            }
            table.rows.push(row);
        }
        Ok(Reply::Ok {
            affected,
            insert_id: table.rows.len() as u64,
        })
    }

    fn select(&mut self, sql: &str, lower: &str) -> std::result::Result<Reply, SqlError> {
        let projection_start = "select".len();
        let Some(from) = lower.find(" from ") else {
            let mut lexer = Lexer::new(sql, projection_start);
            let mut columns = Vec::new();
            let mut row = Vec::new();
            loop {
                lexer.skip_whitespace();
                let start = lexer.pos;
                row.push(lexer.literal()?);
                columns.push(sql[start..lexer.pos].to_string());
                if !lexer.eat(',') {
                    break;
                }
            }
            lexer.skip_whitespace();
            if !lexer.rest().is_empty() {
                return Err(SqlError::syntax(lexer.rest()));
            }
            return Ok(Reply::Rows {
                columns,
                rows: vec![row],
            });
        };

        let projection = sql[projection_start..from].trim();
        let tail_start = from + " from ".len();
        let tail_end = lower[tail_start..]
            .find(" where ")
            .or_else(|| lower[tail_start..].find(" order by "))
            .map_or(sql.len(), |i| tail_start + i);

        let mut columns: Vec<String> = Vec::new();
        let mut rows: Vec<Vec<Cell>> = vec![Vec::new()];
        for name in sql[tail_start..tail_end].split(',') {
            let name = unquote(name.trim());
            let table = self
                .tables
                .get(name)
                .ok_or_else(|| SqlError::no_table(name))?;
            columns.extend(table.columns.iter().cloned());
            rows = rows
                .iter()
                .flat_map(|left| {
                    table.rows.iter().map(move |right| {
                        let mut row = left.clone();
                        row.extend(right.iter().cloned());
                        row
                    })
                })
                .collect();
        }

        if let Some(i) = lower[tail_end..].find(" where ") {
            let condition = tail_end + i + " where ".len();
            let eq = condition
                + sql[condition..]
                    .find('=')
                    .ok_or_else(|| SqlError::syntax(&sql[condition..]))?;
            let column = unquote(sql[condition..eq].trim());
            let index = columns
                .iter()
                .position(|c| c == column)
                .ok_or_else(|| SqlError::unknown_column(column))?;
            let mut lexer = Lexer::new(sql, eq + 1);
            let wanted = lexer.literal()?;
            rows.retain(|row| row[index] != Cell::Null && row[index] == wanted);
        }

        if projection.eq_ignore_ascii_case("count(*)") {
            return Ok(Reply::Rows {
                columns: vec!["count(*)".into()],
                rows: vec![vec![Cell::Int(rows.len() as i64)]],
            });
        }
        if projection == "*" {
            return Ok(Reply::Rows { columns, rows });
        }
        let picked = split_top_level(projection)
            .into_iter()
            .map(|c| {
                let c = unquote(c.trim());
                columns
                    .iter()
                    .position(|name| name == c)
                    .ok_or_else(|| SqlError::unknown_column(c))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Reply::Rows {
            columns: picked.iter().map(|&i| columns[i].clone()).collect(),
            rows: rows
                .into_iter()
                .map(|row| picked.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    // === Encoding ===

    fn status_bytes(&self, more: bool) -> [u8; 2] {
        let mut status = self.status;
        status.set(ServerStatus::MORE_RESULTS_EXISTS, more);
        status.bits().to_le_bytes()
    }

    fn ok_packet(&self, head: u8, affected: u64, insert_id: u64, more: bool) -> Vec<u8> {
        let mut out = vec![head];
        lenenc_int(&mut out, affected);
        lenenc_int(&mut out, insert_id);
        out.extend_from_slice(&self.status_bytes(more));
        out.extend_from_slice(&[0, 0]);
        out
    }

    fn eof(&self, more: bool) -> Vec<u8> {
        let mut out = vec![0xfe, 0, 0];
        out.extend_from_slice(&self.status_bytes(more));
        out
    }

    fn send_err(&mut self, err: SqlError) {
        let mut out = vec![0xff];
        out.extend_from_slice(&err.code.to_le_bytes());
        out.push(b'#');
        out.extend_from_slice(err.state.as_bytes());
        out.extend_from_slice(err.message.as_bytes());
        self.replies.push_back(out);
    }

    fn send_reply(&mut self, reply: Reply, more: bool, format: Format) {
        match reply {
            Reply::Ok { affected, insert_id } => {
                let ok = self.ok_packet(0x00, affected, insert_id, more);
                self.replies.push_back(ok);
            }
            Reply::Rows { columns, rows } => {
                let types: Vec<u8> = (0..columns.len())
                    .map(|i| {
                        let ints = rows.iter().all(|r| matches!(r[i], Cell::Int(_) | Cell::Null));
                        let any = rows.iter().any(|r| r[i] != Cell::Null);
                        if ints && any { TYPE_LONGLONG } else { TYPE_VAR_STRING }
                    })
                    .collect();

                let mut count = Vec::new();
                lenenc_int(&mut count, columns.len() as u64);
                self.replies.push_back(count);
                for (name, ty) in columns.iter().zip(&types) {
                    self.replies.push_back(column_def(name, *ty));
                }
                if !self.session.deprecate_eof {
                    let eof = self.eof(false);
                    self.replies.push_back(eof);
                }
                for row in &rows {
                    let packet = match format {
                        Format::Text => text_row(row),
                        Format::Binary => binary_row(row, &types),
                    };
                    self.replies.push_back(packet);
                }
                let end = if self.session.deprecate_eof {
                    self.ok_packet(0xfe, 0, 0, more)
                } else {
                    self.eof(more)
                };
                self.replies.push_back(end);
            }
        }
    }
}

/// Raw wire bytes of a one-column text result set with integer rows, as a
/// CLIENT_DEPRECATE_EOF server sends them after a command. Packets are
/// numbered from sequence 1; no terminator is written so a test can append
/// its own packets. Returns the bytes and the next sequence id.
pub fn wire_int_rows(column: &str, rows: &[i64]) -> (Vec<u8>, u8) {
    let mut out = Vec::new();
    let mut sequence_id = 1u8;
    wire_packet(&mut out, sequence_id, &[1]);
    sequence_id += 1;
    wire_packet(&mut out, sequence_id, &column_def(column, TYPE_LONGLONG));
    sequence_id += 1;
    for row in rows {
        let mut payload = Vec::new();
        lenenc_str(&mut payload, row.to_string().as_bytes());
        wire_packet(&mut out, sequence_id, &payload);
        sequence_id = sequence_id.wrapping_add(1);
    }
    (out, sequence_id)
}

/// Append one framed packet: 3-byte length, sequence id, payload.
pub fn wire_packet(out: &mut Vec<u8>, sequence_id: u8, payload: &[u8]) {
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes()[..3]);
    out.push(sequence_id);
    out.extend_from_slice(payload);
}

/// In-memory byte stream: reads come from a fixed script, writes are kept.
pub struct Duplex {
    input: io::Cursor<Vec<u8>>,
    pub output: Vec<u8>,
}

impl Duplex {
    pub fn new(input: Vec<u8>) -> Self {
        Self {
            input: io::Cursor::new(input),
            output: Vec::new(),
        }
    }
}

impl io::Read for Duplex {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut self.input, buf)
    }
}

impl io::Write for Duplex {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn lenenc_int(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=250 => out.push(value as u8),
        251..=0xffff => {
            out.push(0xfc);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xff_ffff => {
            out.push(0xfd);
            out.extend_from_slice(&(value as u32).to_le_bytes()[..3]);
        }
        _ => {
            out.push(0xfe);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

fn lenenc_str(out: &mut Vec<u8>, value: &[u8]) {
    lenenc_int(out, value.len() as u64);
    out.extend_from_slice(value);
}

fn column_def(name: &str, ty: u8) -> Vec<u8> {
    let mut out = Vec::new();
    for part in ["def", "test", "", "", name, name] {
        lenenc_str(&mut out, part.as_bytes());
    }
    let charset: u16 = if ty == TYPE_VAR_STRING { 33 } else { 63 };
    out.push(0x0c);
    out.extend_from_slice(&charset.to_le_bytes());
    out.extend_from_slice(&255u32.to_le_bytes());
    out.push(ty);
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&[0, 0, 0]);
    out
}

fn cell_text(cell: &Cell) -> String {
    match cell {
        Cell::Null => String::new(),
        Cell::Int(v) => v.to_string(),
        Cell::Text(s) => s.clone(),
    }
}

fn text_row(row: &[Cell]) -> Vec<u8> {
    let mut out = Vec::new();
    for cell in row {
        match cell {
            Cell::Null => out.push(0xfb),
            other => lenenc_str(&mut out, cell_text(other).as_bytes()),
        }
    }
    out
}

fn binary_row(row: &[Cell], types: &[u8]) -> Vec<u8> {
    let mut out = vec![0x00];
    let bitmap_start = out.len();
    out.resize(bitmap_start + (row.len() + 2).div_ceil(8), 0);
    for (i, cell) in row.iter().enumerate() {
        if *cell == Cell::Null {
            let bit = i + 2;
            out[bitmap_start + bit / 8] |= 1 << (bit % 8);
        }
    }
    for (cell, ty) in row.iter().zip(types) {
        match (cell, *ty) {
            (Cell::Null, _) => {}
            (Cell::Int(v), TYPE_LONGLONG) => out.extend_from_slice(&v.to_le_bytes()),
            (other, _) => lenenc_str(&mut out, cell_text(other).as_bytes()),
        }
    }
    out
}

// === SQL helpers ===

fn unquote(name: &str) -> &str {
    name.trim_matches('`')
}

/// Split on `;` outside string literals, dropping empty statements.
fn split_statements(sql: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quote = None;
    let mut escaped = false;
    for c in sql.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None if c == ';' => out.push(std::mem::take(&mut current)),
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                }
                current.push(c);
            }
        }
    }
    out.push(current);
    out.into_iter().filter(|s| !s.trim().is_empty()).collect()
}

/// Split on `,` outside parentheses.
fn split_top_level(list: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                out.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&list[start..]);
    out.into_iter().filter(|s| !s.trim().is_empty()).collect()
}

fn placeholder_count(sql: &str) -> usize {
    let mut count = 0;
    let mut quote = None;
    for c in sql.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '?' => count += 1,
            None => {}
        }
    }
    count
}

/// Substitute `?` placeholders outside string literals.
fn bind(sql: &str, literals: &[String]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut literals = literals.iter();
    let mut quote = None;
    for c in sql.chars() {
        match quote {
            Some(q) if c == q => {
                quote = None;
                out.push(c);
            }
            Some(_) => out.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                out.push(c);
            }
            None if c == '?' => match literals.next() {
                Some(literal) => out.push_str(literal),
                None => out.push_str("NULL"),
            },
            None => out.push(c),
        }
    }
    out
}

fn quote_text(text: &[u8]) -> String {
    let text = String::from_utf8_lossy(text);
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Decode COM_STMT_EXECUTE parameters into SQL literals.
fn decode_params(data: &[u8], count: usize) -> std::result::Result<Vec<String>, SqlError> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let malformed = || SqlError {
        code: 1210,
        state: "HY000",
        message: "Incorrect arguments to mysqld_stmt_execute".into(),
    };
    let bitmap_len = count.div_ceil(8);
    let bitmap = data.get(..bitmap_len).ok_or_else(malformed)?;
    let types_start = bitmap_len + 1;
    if data.get(bitmap_len) != Some(&1) {
        return Err(malformed());
    }
    let types = data
        .get(types_start..types_start + count * 2)
        .ok_or_else(malformed)?;
    let mut rest = &data[types_start + count * 2..];

    let mut literals = Vec::with_capacity(count);
    for i in 0..count {
        if bitmap[i / 8] & (1 << (i % 8)) != 0 {
            literals.push("NULL".to_string());
            continue;
        }
        let unsigned = types[i * 2 + 1] & 0x80 != 0;
        let literal = match types[i * 2] {
            TYPE_NULL => "NULL".to_string(),
            TYPE_LONGLONG => {
                let bytes: [u8; 8] = rest.get(..8).ok_or_else(malformed)?.try_into().unwrap();
                rest = &rest[8..];
                if unsigned {
                    u64::from_le_bytes(bytes).to_string()
                } else {
                    i64::from_le_bytes(bytes).to_string()
                }
            }
            TYPE_DOUBLE => {
                let bytes: [u8; 8] = rest.get(..8).ok_or_else(malformed)?.try_into().unwrap();
                rest = &rest[8..];
                format!("{:?}", f64::from_le_bytes(bytes))
            }
            TYPE_FLOAT => {
                let bytes: [u8; 4] = rest.get(..4).ok_or_else(malformed)?.try_into().unwrap();
                rest = &rest[4..];
                format!("{:?}", f32::from_le_bytes(bytes))
            }
            TYPE_VAR_STRING => {
                let (&len, tail) = rest.split_first().ok_or_else(malformed)?;
                // test payloads stay under 251 bytes
                let len = usize::from(len);
                let text = tail.get(..len).ok_or_else(malformed)?;
                rest = &tail[len..];
                quote_text(text)
            }
            _ => return Err(malformed()),
        };
        literals.push(literal);
    }
    Ok(literals)
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str, pos: usize) -> Self {
        Self { src, pos }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat_char(&mut self, c: char) -> bool {
        if self.rest().starts_with(c) || self.rest().starts_with(c.to_ascii_uppercase()) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_whitespace();
        self.eat_char(c)
    }

    fn tuple(&mut self) -> std::result::Result<Vec<Cell>, SqlError> {
        if !self.eat('(') {
            return Err(SqlError::syntax(self.rest()));
        }
        let mut cells = vec![self.literal()?];
        while self.eat(',') {
            cells.push(self.literal()?);
        }
        if !self.eat(')') {
            return Err(SqlError::syntax(self.rest()));
        }
        Ok(cells)
    }

    fn literal(&mut self) -> std::result::Result<Cell, SqlError> {
        self.skip_whitespace();
        let rest = self.rest();
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, quote @ ('\'' | '"'))) => {
                let mut text = String::new();
                let mut escaped = false;
                let mut skip = false;
                for (i, c) in chars {
                    if skip {
                        skip = false;
                    } else if escaped {
                        text.push(match c {
                            'n' => '\n',
                            'r' => '\r',
                            't' => '\t',
                            '0' => '\0',
                            'Z' => '\x1a',
                            other => other,
                        });
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == quote {
                        if rest[i + 1..].starts_with(quote) {
                            text.push(quote);
                            skip = true;
                            continue;
                        }
                        self.pos += i + 1;
                        return Ok(Cell::Text(text));
                    } else {
                        text.push(c);
                    }
                }
                Err(SqlError::syntax(rest))
            }
            Some((_, c)) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                let len = rest
                    .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.')))
                    .unwrap_or(rest.len());
                let token = &rest[..len];
                self.pos += len;
                Ok(match token.parse::<i64>() {
                    Ok(v) => Cell::Int(v),
                    Err(_) => Cell::Text(token.to_string()),
                })
            }
            _ if rest.get(..4).is_some_and(|w| w.eq_ignore_ascii_case("null")) => {
                self.pos += 4;
                Ok(Cell::Null)
            }
            _ => Err(SqlError::syntax(rest)),
        }
    }
}
