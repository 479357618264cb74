//! Result row payloads (text and binary protocol).

use crate::error::{Error, Result};
use crate::protocol::codec::{
    read_bytes, read_lenenc_bytes, read_u8, read_u16, read_u32, read_u64,
};
use crate::protocol::types::{ColumnFlags, ColumnType, header};
use crate::row::ColumnMeta;
use crate::value::Value;

/// Encoding of a row payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFormat {
    /// COM_QUERY result rows
    Text,
    /// COM_STMT_EXECUTE result rows
    Binary,
}

/// One undecoded row, borrowing the read buffer.
#[derive(Debug, Clone, Copy)]
pub struct RawRow<'a> {
    payload: &'a [u8],
    format: RowFormat,
}

impl<'a> RawRow<'a> {
    /// Wrap a row payload.
    pub fn new(payload: &'a [u8], format: RowFormat) -> Self {
        Self { payload, format }
    }

    /// Raw payload bytes
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Row encoding
    pub fn format(&self) -> RowFormat {
        self.format
    }

    /// Decode every column into an owned [`Value`].
    pub fn decode(&self, cols: &[ColumnMeta]) -> Result<Vec<Value>> {
        match self.format {
            RowFormat::Text => decode_text(self.payload, cols),
            RowFormat::Binary => decode_binary(self.payload, cols),
        }
    }
}

fn decode_text(mut data: &[u8], cols: &[ColumnMeta]) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(cols.len());
    for col in cols {
        if data.first() == Some(&header::NULL) {
            values.push(Value::Null);
            data = &data[1..];
            continue;
        }
        let (bytes, rest) = read_lenenc_bytes(data)?;
        values.push(text_value(col, bytes));
        data = rest;
    }
    if !data.is_empty() {
        return Err(Error::Protocol(format!(
            "text row: {} trailing bytes after {} columns",
            data.len(),
            cols.len()
        )));
    }
    Ok(values)
}

/// Numeric columns become numbers; anything unparsable stays as bytes.
fn text_value(col: &ColumnMeta, bytes: &[u8]) -> Value {
    let parsed = simdutf8::basic::from_utf8(bytes).ok().and_then(|s| {
        match col.column_type {
            Some(ty) if ty.is_integer() => {
                if col.flags.contains(ColumnFlags::UNSIGNED) {
                    s.parse().ok().map(Value::UInt)
                } else {
                    s.parse().ok().map(Value::Int)
                }
            }
            Some(ColumnType::Float) => s.parse().ok().map(Value::Float),
            Some(ColumnType::Double) => s.parse().ok().map(Value::Double),
            _ => None,
        }
    });
    parsed.unwrap_or_else(|| Value::Bytes(bytes.to_vec()))
}

fn decode_binary(data: &[u8], cols: &[ColumnMeta]) -> Result<Vec<Value>> {
    let (head, rest) = read_u8(data)?;
    if head != header::OK {
        return Err(Error::Protocol(format!(
            "binary row: unexpected header 0x{head:02x}"
        )));
    }
    // The null bitmap is offset by two bits in result rows.
    let (bitmap, mut data) = read_bytes(rest, (cols.len() + 2).div_ceil(8))?;
    let mut values = Vec::with_capacity(cols.len());
    for (i, col) in cols.iter().enumerate() {
        let bit = i + 2;
        if bitmap[bit / 8] & (1 << (bit % 8)) != 0 {
            values.push(Value::Null);
            continue;
        }
        let (value, rest) = binary_value(col, data)?;
        values.push(value);
        data = rest;
    }
    Ok(values)
}

fn binary_value<'a>(col: &ColumnMeta, data: &'a [u8]) -> Result<(Value, &'a [u8])> {
    let unsigned = col.flags.contains(ColumnFlags::UNSIGNED);
    let int = |v: i64, u: u64| if unsigned { Value::UInt(u) } else { Value::Int(v) };
    match col.column_type {
        Some(ColumnType::Tiny) => {
            let (v, rest) = read_u8(data)?;
            Ok((int(i64::from(v as i8), u64::from(v)), rest))
        }
        Some(ColumnType::Short | ColumnType::Year) => {
            let (v, rest) = read_u16(data)?;
            Ok((int(i64::from(v as i16), u64::from(v)), rest))
        }
        Some(ColumnType::Long | ColumnType::Int24) => {
            let (v, rest) = read_u32(data)?;
            Ok((int(i64::from(v as i32), u64::from(v)), rest))
        }
        Some(ColumnType::LongLong) => {
            let (v, rest) = read_u64(data)?;
            Ok((int(v as i64, v), rest))
        }
        Some(ColumnType::Float) => {
            let (v, rest) = read_u32(data)?;
            Ok((Value::Float(f32::from_bits(v)), rest))
        }
        Some(ColumnType::Double) => {
            let (v, rest) = read_u64(data)?;
            Ok((Value::Double(f64::from_bits(v)), rest))
        }
        Some(ColumnType::Null) => Ok((Value::Null, data)),
        Some(ColumnType::Date | ColumnType::DateTime | ColumnType::Timestamp) => {
            let (len, rest) = read_u8(data)?;
            let (bytes, rest) = read_bytes(rest, usize::from(len))?;
            Ok((binary_datetime(bytes)?, rest))
        }
        Some(ColumnType::Time) => {
            let (len, rest) = read_u8(data)?;
            let (bytes, rest) = read_bytes(rest, usize::from(len))?;
            Ok((binary_time(bytes)?, rest))
        }
        _ => {
            let (bytes, rest) = read_lenenc_bytes(data)?;
            Ok((Value::Bytes(bytes.to_vec()), rest))
        }
    }
}

fn binary_datetime(bytes: &[u8]) -> Result<Value> {
    match bytes.len() {
        0 => Ok(Value::Date(0, 0, 0, 0, 0, 0, 0)),
        4 | 7 | 11 => {
            let (year, rest) = read_u16(bytes)?;
            let (month, day) = (rest[0], rest[1]);
            let (hour, minute, second) = if bytes.len() >= 7 {
                (rest[2], rest[3], rest[4])
            } else {
                (0, 0, 0)
            };
            let micros = if bytes.len() == 11 {
                read_u32(&rest[5..])?.0
            } else {
                0
            };
            Ok(Value::Date(year, month, day, hour, minute, second, micros))
        }
        len => Err(Error::Protocol(format!("binary DATETIME: invalid length {len}"))),
    }
}

fn binary_time(bytes: &[u8]) -> Result<Value> {
    match bytes.len() {
        0 => Ok(Value::Time(false, 0, 0, 0, 0, 0)),
        8 | 12 => {
            let negative = bytes[0] == 1;
            let (days, rest) = read_u32(&bytes[1..])?;
            let micros = if bytes.len() == 12 {
                read_u32(&rest[3..])?.0
            } else {
                0
            };
            Ok(Value::Time(negative, days, rest[0], rest[1], rest[2], micros))
        }
        len => Err(Error::Protocol(format!("binary TIME: invalid length {len}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::write_lenenc_bytes;

    fn col(ty: ColumnType, flags: ColumnFlags) -> ColumnMeta {
        ColumnMeta {
            column_type: Some(ty),
            flags,
            ..ColumnMeta::named("c")
        }
    }

    #[test]
    fn text_row_with_null() {
        let cols = [
            col(ColumnType::LongLong, ColumnFlags::empty()),
            col(ColumnType::VarString, ColumnFlags::empty()),
            col(ColumnType::Long, ColumnFlags::UNSIGNED),
        ];
        let mut payload = Vec::new();
        write_lenenc_bytes(&mut payload, b"-7");
        payload.push(0xfb);
        write_lenenc_bytes(&mut payload, b"9");
        let values = RawRow::new(&payload, RowFormat::Text).decode(&cols).unwrap();
        assert_eq!(values, [Value::Int(-7), Value::Null, Value::UInt(9)]);
    }

    #[test]
    fn text_decimal_stays_bytes() {
        let cols = [col(ColumnType::NewDecimal, ColumnFlags::empty())];
        let mut payload = Vec::new();
        write_lenenc_bytes(&mut payload, b"1.50");
        let values = RawRow::new(&payload, RowFormat::Text).decode(&cols).unwrap();
        assert_eq!(values, [Value::Bytes(b"1.50".to_vec())]);
    }

    #[test]
    fn binary_row() {
        let cols = [
            col(ColumnType::LongLong, ColumnFlags::empty()),
            col(ColumnType::VarString, ColumnFlags::empty()),
            col(ColumnType::Date, ColumnFlags::empty()),
        ];
        // header, bitmap (column 1 is NULL -> bit 3)
        let mut payload = vec![0x00, 0b0000_1000];
        payload.extend_from_slice(&5i64.to_le_bytes());
        payload.extend_from_slice(&[4, 0xe8, 0x07, 2, 29]);
        let values = RawRow::new(&payload, RowFormat::Binary).decode(&cols).unwrap();
        assert_eq!(
            values,
            [Value::Int(5), Value::Null, Value::Date(2024, 2, 29, 0, 0, 0, 0)]
        );
    }

    #[test]
    fn binary_time() {
        let cols = [col(ColumnType::Time, ColumnFlags::empty())];
        let mut payload = vec![0x00, 0x00, 8, 1];
        payload.extend_from_slice(&1u32.to_le_bytes());
        payload.extend_from_slice(&[2, 3, 4]);
        let values = RawRow::new(&payload, RowFormat::Binary).decode(&cols).unwrap();
        assert_eq!(values, [Value::Time(true, 1, 2, 3, 4, 0)]);
    }
}
