//! Dynamically typed values, SQL literal encoding, and typed decoding.

use std::fmt::Write as _;

use crate::error::{Error, Result};

/// A single column or parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// String or binary data (text protocol values arrive here)
    Bytes(Vec<u8>),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// 4-byte float
    Float(f32),
    /// 8-byte float
    Double(f64),
    /// DATE / DATETIME / TIMESTAMP: year, month, day, hour, minute, second, microsecond
    Date(u16, u8, u8, u8, u8, u8, u32),
    /// TIME: is_negative, days, hours, minutes, seconds, microseconds
    Time(bool, u32, u8, u8, u8, u32),
}

impl Value {
    /// Returns true for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the value as bytes, if it is `Bytes`.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Borrow the value as UTF-8 text, if it is `Bytes` holding valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes()
            .and_then(|bytes| simdutf8::basic::from_utf8(bytes).ok())
    }

    /// Append this value as a SQL literal.
    ///
    /// With `no_backslash_escapes` (server status `NO_BACKSLASH_ESCAPES`) quotes
    /// are doubled instead of backslash-escaped.
    pub fn write_literal(&self, out: &mut Vec<u8>, no_backslash_escapes: bool) -> Result<()> {
        match self {
            Value::Null => out.extend_from_slice(b"NULL"),
            Value::Int(v) => write_display(out, v),
            Value::UInt(v) => write_display(out, v),
            Value::Float(v) => write_float(out, format!("{v:?}"), v.is_finite())?,
            Value::Double(v) => write_float(out, format!("{v:?}"), v.is_finite())?,
            Value::Bytes(bytes) => {
                out.push(b'\'');
                if no_backslash_escapes {
                    escape_quotes(out, bytes);
                } else {
                    escape_backslash(out, bytes);
                }
                out.push(b'\'');
            }
            Value::Date(year, month, day, hour, minute, second, micro) => {
                let mut s = format!(
                    "'{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
                );
                if *micro > 0 {
                    let _ = write!(s, ".{micro:06}");
                }
                s.push('\'');
                out.extend_from_slice(s.as_bytes());
            }
            Value::Time(negative, days, hours, minutes, seconds, micros) => {
                let total_hours = u64::from(*days) * 24 + u64::from(*hours);
                let sign = if *negative { "-" } else { "" };
                let mut s = format!("'{sign}{total_hours:02}:{minutes:02}:{seconds:02}");
                if *micros > 0 {
                    let _ = write!(s, ".{micros:06}");
                }
                s.push('\'');
                out.extend_from_slice(s.as_bytes());
            }
        }
        Ok(())
    }

    /// Render this value as a SQL literal.
    pub fn to_literal(&self, no_backslash_escapes: bool) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_literal(&mut out, no_backslash_escapes)?;
        Ok(out)
    }
}

fn write_display<T: std::fmt::Display>(out: &mut Vec<u8>, value: T) {
    out.extend_from_slice(value.to_string().as_bytes());
}

// Floats always carry an exponent so the server parses them as DOUBLE, not DECIMAL.
fn write_float(out: &mut Vec<u8>, mut s: String, finite: bool) -> Result<()> {
    if !finite {
        return Err(Error::Programming(format!("{s} can not be used with MySQL")));
    }
    if !s.contains('e') {
        s.push_str("e0");
    }
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

fn escape_backslash(out: &mut Vec<u8>, bytes: &[u8]) {
    out.reserve(bytes.len());
    for &b in bytes {
        match b {
            0 => out.extend_from_slice(b"\\0"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            0x1a => out.extend_from_slice(b"\\Z"),
            b'"' => out.extend_from_slice(b"\\\""),
            b'\'' => out.extend_from_slice(b"\\'"),
            _ => out.push(b),
        }
    }
}

fn escape_quotes(out: &mut Vec<u8>, bytes: &[u8]) {
    let mut rest = bytes;
    while let Some(pos) = memchr::memchr(b'\'', rest) {
        out.extend_from_slice(&rest[..=pos]);
        out.push(b'\'');
        rest = &rest[pos + 1..];
    }
    out.extend_from_slice(rest);
}

// === Conversions into Value ===

macro_rules! impl_from_signed {
    ($($t:ty),+) => {
        $(impl From<$t> for Value {
            fn from(value: $t) -> Self {
                Value::Int(i64::from(value))
            }
        })+
    };
}

macro_rules! impl_from_unsigned {
    ($($t:ty),+) => {
        $(impl From<$t> for Value {
            fn from(value: $t) -> Self {
                Value::UInt(u64::from(value))
            }
        })+
    };
}

impl_from_signed!(i8, i16, i32, i64);
impl_from_unsigned!(u8, u16, u32, u64);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Bytes(value.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Bytes(value.into_bytes())
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Bytes(value.as_bytes().to_vec())
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

// === Decoding out of Value ===

/// Trait for decoding a [`Value`] into a Rust type.
pub trait FromValue: Sized {
    /// Decode from NULL.
    ///
    /// Default implementation returns an error. Override for types that can
    /// represent NULL (like `Option<T>`).
    fn from_null() -> Result<Self> {
        Err(Error::Decode("unexpected NULL value".into()))
    }

    /// Decode from a non-NULL value.
    fn from_value(value: Value) -> Result<Self>;

    /// Decode from any value, dispatching NULL to [`FromValue::from_null`].
    fn decode(value: Value) -> Result<Self> {
        match value {
            Value::Null => Self::from_null(),
            other => Self::from_value(other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_null() -> Result<Self> {
        Ok(None)
    }

    fn from_value(value: Value) -> Result<Self> {
        T::from_value(value).map(Some)
    }
}

impl FromValue for Value {
    fn from_null() -> Result<Self> {
        Ok(Value::Null)
    }

    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

fn text_of(bytes: &[u8]) -> Result<&str> {
    simdutf8::basic::from_utf8(bytes).map_err(|_| Error::Decode("invalid UTF-8".into()))
}

macro_rules! impl_from_value_int {
    ($($t:ty),+) => {
        $(impl FromValue for $t {
            fn from_value(value: Value) -> Result<Self> {
                let out_of_range = || Error::Decode(format!(
                    "{value:?} out of range for {}", stringify!($t)
                ));
                match &value {
                    Value::Int(v) => <$t>::try_from(*v).map_err(|_| out_of_range()),
                    Value::UInt(v) => <$t>::try_from(*v).map_err(|_| out_of_range()),
                    Value::Bytes(bytes) => text_of(bytes)?.trim().parse::<$t>().map_err(|e| {
                        Error::Decode(format!("invalid {}: {e}", stringify!($t)))
                    }),
                    _ => Err(Error::Decode(format!(
                        "cannot decode {value:?} as {}", stringify!($t)
                    ))),
                }
            }
        })+
    };
}

impl_from_value_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Double(v) => Ok(v),
            Value::Float(v) => Ok(f64::from(v)),
            Value::Int(v) => Ok(v as f64),
            Value::UInt(v) => Ok(v as f64),
            Value::Bytes(bytes) => text_of(&bytes)?
                .trim()
                .parse()
                .map_err(|e| Error::Decode(format!("invalid f64: {e}"))),
            other => Err(Error::Decode(format!("cannot decode {other:?} as f64"))),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Bytes(bytes) => text_of(&bytes)?
                .trim()
                .parse()
                .map_err(|e| Error::Decode(format!("invalid f32: {e}"))),
            other => Err(Error::Decode(format!("cannot decode {other:?} as f32"))),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        Ok(i64::from_value(value)? != 0)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bytes(bytes) => String::from_utf8(bytes)
                .map_err(|_| Error::Decode("invalid UTF-8".into())),
            Value::Int(v) => Ok(v.to_string()),
            Value::UInt(v) => Ok(v.to_string()),
            other => Err(Error::Decode(format!("cannot decode {other:?} as String"))),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bytes(bytes) => Ok(bytes),
            other => Err(Error::Decode(format!("cannot decode {other:?} as bytes"))),
        }
    }
}
