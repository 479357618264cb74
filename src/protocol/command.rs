//! Command packet payloads.
//!
//! Writers append the command byte and its arguments to `out`. Packet
//! framing (length + sequence id) is the transport's job.

use crate::error::{Error, Result};
use crate::protocol::codec::{
    write_bytes, write_lenenc_bytes, write_u8, write_u16, write_u32, write_u64,
};
use crate::protocol::types::{ColumnType, command};
use crate::value::Value;

/// COM_QUERY
pub fn write_query(out: &mut Vec<u8>, sql: &[u8]) {
    write_u8(out, command::QUERY);
    write_bytes(out, sql);
}

/// COM_PING
pub fn write_ping(out: &mut Vec<u8>) {
    write_u8(out, command::PING);
}

/// COM_RESET_CONNECTION
pub fn write_reset_connection(out: &mut Vec<u8>) {
    write_u8(out, command::RESET_CONNECTION);
}

/// COM_QUIT
pub fn write_quit(out: &mut Vec<u8>) {
    write_u8(out, command::QUIT);
}

/// COM_STMT_PREPARE
pub fn write_stmt_prepare(out: &mut Vec<u8>, sql: &str) {
    write_u8(out, command::STMT_PREPARE);
    write_bytes(out, sql.as_bytes());
}

/// COM_STMT_CLOSE. The server sends no response.
pub fn write_stmt_close(out: &mut Vec<u8>, statement_id: u32) {
    write_u8(out, command::STMT_CLOSE);
    write_u32(out, statement_id);
}

const CURSOR_TYPE_NO_CURSOR: u8 = 0x00;
const UNSIGNED_FLAG: u8 = 0x80;

/// COM_STMT_EXECUTE with binary-encoded parameters.
pub fn write_stmt_execute(out: &mut Vec<u8>, statement_id: u32, params: &[Value]) -> Result<()> {
    write_u8(out, command::STMT_EXECUTE);
    write_u32(out, statement_id);
    write_u8(out, CURSOR_TYPE_NO_CURSOR);
    // iteration count
    write_u32(out, 1);

    if params.is_empty() {
        return Ok(());
    }

    let bitmap_start = out.len();
    out.resize(bitmap_start + params.len().div_ceil(8), 0);
    for (i, param) in params.iter().enumerate() {
        if param.is_null() {
            out[bitmap_start + i / 8] |= 1 << (i % 8);
        }
    }

    // new-params-bound flag, followed by the type of each parameter
    write_u8(out, 1);
    for param in params {
        let (ty, unsigned) = binary_type(param);
        write_u8(out, ty as u8);
        write_u8(out, if unsigned { UNSIGNED_FLAG } else { 0 });
    }

    for param in params {
        write_binary_value(out, param)?;
    }
    Ok(())
}

fn binary_type(value: &Value) -> (ColumnType, bool) {
    match value {
        Value::Null => (ColumnType::Null, false),
        Value::Int(_) => (ColumnType::LongLong, false),
        Value::UInt(_) => (ColumnType::LongLong, true),
        Value::Float(_) => (ColumnType::Float, false),
        Value::Double(_) => (ColumnType::Double, false),
        Value::Bytes(_) => (ColumnType::VarString, false),
        Value::Date(..) => (ColumnType::DateTime, false),
        Value::Time(..) => (ColumnType::Time, false),
    }
}

fn write_binary_value(out: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Null => {}
        Value::Int(v) => write_u64(out, *v as u64),
        Value::UInt(v) => write_u64(out, *v),
        Value::Float(v) => write_u32(out, v.to_bits()),
        Value::Double(v) => write_u64(out, v.to_bits()),
        Value::Bytes(bytes) => write_lenenc_bytes(out, bytes),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            write_u8(out, 11);
            write_u16(out, *year);
            out.extend_from_slice(&[*month, *day, *hour, *minute, *second]);
            write_u32(out, *micros);
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            if *hours >= 24 || *minutes >= 60 || *seconds >= 60 {
                return Err(Error::Programming(format!(
                    "invalid TIME component {hours}:{minutes}:{seconds}"
                )));
            }
            write_u8(out, 12);
            write_u8(out, u8::from(*negative));
            write_u32(out, *days);
            out.extend_from_slice(&[*hours, *minutes, *seconds]);
            write_u32(out, *micros);
        }
    }
    Ok(())
}
