//! Server response packets.

use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::error::{Error, Result, ServerError};
use crate::protocol::codec::{read_lenenc_bytes, read_lenenc_int, read_lenenc_str, read_u8, read_u16};
use crate::protocol::types::{ColumnFlags, ColumnType, ServerStatus, header};

/// OK packet, also used to describe the end of a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OkPacket {
    /// Rows affected by the statement
    pub affected_rows: u64,
    /// AUTO_INCREMENT id generated by the statement
    pub last_insert_id: u64,
    /// Server status flags
    pub status: ServerStatus,
    /// Warning count
    pub warnings: u16,
    /// Human readable info string (may be empty)
    pub info: String,
}

impl OkPacket {
    /// Parse an OK packet. Accepts both the `0x00` header and the `0xfe`
    /// header used to terminate result sets when EOF is deprecated.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (head, rest) = read_u8(payload)?;
        if head != header::OK && head != header::EOF {
            return Err(Error::Protocol(format!(
                "OK packet: unexpected header 0x{head:02x}"
            )));
        }
        let (affected_rows, rest) = read_lenenc_int(rest)?;
        let (last_insert_id, rest) = read_lenenc_int(rest)?;
        let (status, rest) = read_u16(rest)?;
        let (warnings, rest) = read_u16(rest)?;
        // The info string is either lenenc (session tracking) or the rest of
        // the packet; neither carries anything this crate interprets.
        let info = match read_lenenc_str(rest) {
            Ok((info, _)) => info.to_string(),
            Err(_) => String::from_utf8_lossy(rest).into_owned(),
        };
        Ok(Self {
            affected_rows,
            last_insert_id,
            status: ServerStatus::from_bits_truncate(status),
            warnings,
            info,
        })
    }

    /// Build the end-of-result description from a classic EOF packet.
    pub fn from_eof(eof: EofPacket) -> Self {
        Self {
            warnings: eof.warnings,
            status: eof.status,
            ..Self::default()
        }
    }
}

/// Classic EOF packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EofPacket {
    /// Warning count
    pub warnings: u16,
    /// Server status flags
    pub status: ServerStatus,
}

impl EofPacket {
    /// Parse an EOF packet.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if !is_eof(payload) {
            return Err(Error::Protocol("expected EOF packet".into()));
        }
        let rest = &payload[1..];
        // Pre-4.1 servers send a bare 0xfe.
        if rest.len() < 4 {
            return Ok(Self {
                warnings: 0,
                status: ServerStatus::empty(),
            });
        }
        let (warnings, rest) = read_u16(rest)?;
        let (status, _) = read_u16(rest)?;
        Ok(Self {
            warnings,
            status: ServerStatus::from_bits_truncate(status),
        })
    }
}

/// Returns true for a classic EOF packet.
pub fn is_eof(payload: &[u8]) -> bool {
    payload.first() == Some(&header::EOF) && payload.len() < 9
}

/// Returns true for the packet that terminates a row stream.
///
/// With CLIENT_DEPRECATE_EOF the terminator is an OK packet carrying the
/// `0xfe` header; a row cannot start with `0xfe` unless it is at least
/// 16M long.
pub fn is_result_terminator(payload: &[u8], deprecate_eof: bool) -> bool {
    if deprecate_eof {
        payload.first() == Some(&header::EOF) && payload.len() < 0xff_ffff
    } else {
        is_eof(payload)
    }
}

/// Parse an ERR packet.
pub fn parse_err(payload: &[u8]) -> Result<ServerError> {
    let (head, rest) = read_u8(payload)?;
    if head != header::ERR {
        return Err(Error::Protocol(format!(
            "ERR packet: unexpected header 0x{head:02x}"
        )));
    }
    let (code, rest) = read_u16(rest)?;
    let (sql_state, message) = match rest.split_first() {
        Some((b'#', tail)) if tail.len() >= 5 => (
            String::from_utf8_lossy(&tail[..5]).into_owned(),
            &tail[5..],
        ),
        _ => ("HY000".to_string(), rest),
    };
    Ok(ServerError {
        code,
        sql_state,
        message: String::from_utf8_lossy(message).into_owned(),
    })
}

/// Fixed-size tail of a column definition (13 bytes).
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct ColumnDefinitionTail {
    /// Length of the fixed fields, always 0x0c
    pub fixed_len: u8,
    /// Character set number
    pub charset: U16LE,
    /// Maximum column length
    pub length: U32LE,
    /// Column type byte
    pub column_type: u8,
    /// Column flags
    pub flags: U16LE,
    /// Decimal digits
    pub decimals: u8,
    /// Filler
    pub reserved: [u8; 2],
}

/// Column definition packet, borrowing from the read buffer.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDefinition<'a> {
    /// Schema name
    pub schema: &'a str,
    /// Table alias
    pub table: &'a str,
    /// Physical table name
    pub org_table: &'a str,
    /// Column alias
    pub name: &'a str,
    /// Physical column name
    pub org_name: &'a str,
    /// Fixed-size metadata
    pub tail: &'a ColumnDefinitionTail,
}

impl<'a> ColumnDefinition<'a> {
    /// Parse a column definition (protocol 4.1).
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (_catalog, rest) = read_lenenc_bytes(payload)?;
        let (schema, rest) = read_lenenc_str(rest)?;
        let (table, rest) = read_lenenc_str(rest)?;
        let (org_table, rest) = read_lenenc_str(rest)?;
        let (name, rest) = read_lenenc_str(rest)?;
        let (org_name, rest) = read_lenenc_str(rest)?;
        let (tail, _) = ColumnDefinitionTail::ref_from_prefix(rest)
            .map_err(|e| Error::Protocol(format!("column definition tail: {e:?}")))?;
        Ok(Self {
            schema,
            table,
            org_table,
            name,
            org_name,
            tail,
        })
    }

    /// Column type, `None` for type bytes this crate does not know.
    pub fn column_type(&self) -> Option<ColumnType> {
        ColumnType::from_u8(self.tail.column_type)
    }

    /// Column flags
    pub fn flags(&self) -> ColumnFlags {
        ColumnFlags::from_bits_truncate(self.tail.flags.get())
    }
}

/// COM_STMT_PREPARE_OK payload (12 bytes).
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct PrepareOk {
    /// Always 0x00
    pub status: u8,
    /// Server-side statement id
    pub statement_id: U32LE,
    /// Number of result columns
    pub num_columns: U16LE,
    /// Number of `?` parameters
    pub num_params: U16LE,
    /// Filler
    pub reserved: u8,
    /// Warning count
    pub warnings: U16LE,
}

impl PrepareOk {
    /// Parse a COM_STMT_PREPARE_OK payload.
    pub fn parse(payload: &[u8]) -> Result<&Self> {
        let (ok, _) = Self::ref_from_prefix(payload)
            .map_err(|e| Error::Protocol(format!("COM_STMT_PREPARE_OK: {e:?}")))?;
        if ok.status != header::OK {
            return Err(Error::Protocol(format!(
                "COM_STMT_PREPARE_OK: unexpected status 0x{:02x}",
                ok.status
            )));
        }
        Ok(ok)
    }
}
