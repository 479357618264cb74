//! Common MySQL wire protocol types.

use bitflags::bitflags;

/// Command bytes (first byte of every command packet).
pub mod command {
    /// COM_QUIT
    pub const QUIT: u8 = 0x01;
    /// COM_INIT_DB
    pub const INIT_DB: u8 = 0x02;
    /// COM_QUERY
    pub const QUERY: u8 = 0x03;
    /// COM_PING
    pub const PING: u8 = 0x0e;
    /// COM_STMT_PREPARE
    pub const STMT_PREPARE: u8 = 0x16;
    /// COM_STMT_EXECUTE
    pub const STMT_EXECUTE: u8 = 0x17;
    /// COM_STMT_CLOSE
    pub const STMT_CLOSE: u8 = 0x19;
    /// COM_RESET_CONNECTION
    pub const RESET_CONNECTION: u8 = 0x1f;
}

/// Response header bytes (first byte of a response packet).
pub mod header {
    /// OK packet
    pub const OK: u8 = 0x00;
    /// NULL marker inside a text row
    pub const NULL: u8 = 0xfb;
    /// LOCAL INFILE request
    pub const LOCAL_INFILE: u8 = 0xfb;
    /// EOF packet (or OK packet terminating a result set with CLIENT_DEPRECATE_EOF)
    pub const EOF: u8 = 0xfe;
    /// ERR packet
    pub const ERR: u8 = 0xff;
}

/// Column type byte from a column definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ColumnType {
    Decimal = 0x00,
    Tiny = 0x01,
    Short = 0x02,
    Long = 0x03,
    Float = 0x04,
    Double = 0x05,
    Null = 0x06,
    Timestamp = 0x07,
    LongLong = 0x08,
    Int24 = 0x09,
    Date = 0x0a,
    Time = 0x0b,
    DateTime = 0x0c,
    Year = 0x0d,
    VarChar = 0x0f,
    Bit = 0x10,
    Json = 0xf5,
    NewDecimal = 0xf6,
    Enum = 0xf7,
    Set = 0xf8,
    TinyBlob = 0xf9,
    MediumBlob = 0xfa,
    LongBlob = 0xfb,
    Blob = 0xfc,
    VarString = 0xfd,
    String = 0xfe,
    Geometry = 0xff,
}

impl ColumnType {
    /// Create a ColumnType from the raw type byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        let ty = match value {
            0x00 => ColumnType::Decimal,
            0x01 => ColumnType::Tiny,
            0x02 => ColumnType::Short,
            0x03 => ColumnType::Long,
            0x04 => ColumnType::Float,
            0x05 => ColumnType::Double,
            0x06 => ColumnType::Null,
            0x07 => ColumnType::Timestamp,
            0x08 => ColumnType::LongLong,
            0x09 => ColumnType::Int24,
            0x0a => ColumnType::Date,
            0x0b => ColumnType::Time,
            0x0c => ColumnType::DateTime,
            0x0d => ColumnType::Year,
            0x0f => ColumnType::VarChar,
            0x10 => ColumnType::Bit,
            0xf5 => ColumnType::Json,
            0xf6 => ColumnType::NewDecimal,
            0xf7 => ColumnType::Enum,
            0xf8 => ColumnType::Set,
            0xf9 => ColumnType::TinyBlob,
            0xfa => ColumnType::MediumBlob,
            0xfb => ColumnType::LongBlob,
            0xfc => ColumnType::Blob,
            0xfd => ColumnType::VarString,
            0xfe => ColumnType::String,
            0xff => ColumnType::Geometry,
            _ => return None,
        };
        Some(ty)
    }

    /// Integer types, decoded as `Value::Int`/`Value::UInt`.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ColumnType::Tiny
                | ColumnType::Short
                | ColumnType::Long
                | ColumnType::LongLong
                | ColumnType::Int24
                | ColumnType::Year
        )
    }

    /// Floating point types.
    pub fn is_float(self) -> bool {
        matches!(self, ColumnType::Float | ColumnType::Double)
    }
}

bitflags! {
    /// Column definition flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ColumnFlags: u16 {
        const NOT_NULL = 0x0001;
        const PRIMARY_KEY = 0x0002;
        const UNIQUE_KEY = 0x0004;
        const MULTIPLE_KEY = 0x0008;
        const BLOB = 0x0010;
        const UNSIGNED = 0x0020;
        const ZEROFILL = 0x0040;
        const BINARY = 0x0080;
        const ENUM = 0x0100;
        const AUTO_INCREMENT = 0x0200;
        const TIMESTAMP = 0x0400;
        const SET = 0x0800;
    }
}

bitflags! {
    /// Server status flags carried by OK and EOF packets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ServerStatus: u16 {
        /// A multi-statement transaction is open.
        const IN_TRANS = 0x0001;
        /// Autocommit mode is enabled.
        const AUTOCOMMIT = 0x0002;
        /// Another result set follows this one.
        const MORE_RESULTS_EXISTS = 0x0008;
        const NO_GOOD_INDEX_USED = 0x0010;
        const NO_INDEX_USED = 0x0020;
        const CURSOR_EXISTS = 0x0040;
        const LAST_ROW_SENT = 0x0080;
        const DB_DROPPED = 0x0100;
        /// String literals must escape quotes by doubling, not with backslashes.
        const NO_BACKSLASH_ESCAPES = 0x0200;
        const METADATA_CHANGED = 0x0400;
        const QUERY_WAS_SLOW = 0x0800;
        const PS_OUT_PARAMS = 0x1000;
        const IN_TRANS_READONLY = 0x2000;
        const SESSION_STATE_CHANGED = 0x4000;
    }
}

impl ServerStatus {
    /// Returns true if currently in a transaction.
    pub fn in_transaction(self) -> bool {
        self.contains(ServerStatus::IN_TRANS)
    }

    /// Returns true if autocommit is enabled.
    pub fn autocommit(self) -> bool {
        self.contains(ServerStatus::AUTOCOMMIT)
    }

    /// Returns true if another result set follows.
    pub fn more_results(self) -> bool {
        self.contains(ServerStatus::MORE_RESULTS_EXISTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_type_round_trip_known_bytes() {
        assert_eq!(ColumnType::from_u8(0x08), Some(ColumnType::LongLong));
        assert_eq!(ColumnType::from_u8(0xfd), Some(ColumnType::VarString));
        assert_eq!(ColumnType::from_u8(0x20), None);
        assert!(ColumnType::Year.is_integer());
        assert!(!ColumnType::NewDecimal.is_integer());
    }

    #[test]
    fn status_flags() {
        let status = ServerStatus::from_bits_truncate(0x000a);
        assert!(status.autocommit());
        assert!(status.more_results());
        assert!(!status.in_transaction());
    }
}
