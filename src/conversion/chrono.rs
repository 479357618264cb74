//! Chrono crate type implementations (NaiveDate, NaiveTime, NaiveDateTime).
//!
//! Binary rows carry `Value::Date`/`Value::Time`; text rows carry the
//! server's string form, which is parsed here.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::error::{Error, Result};
use crate::value::{FromValue, Value};

fn text(bytes: &[u8]) -> Result<&str> {
    simdutf8::basic::from_utf8(bytes).map_err(|_| Error::Decode("invalid UTF-8".into()))
}

fn zero_date() -> Error {
    Error::Decode("zero date cannot be represented".into())
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Date(
            u16::try_from(value.year()).unwrap_or(0),
            value.month() as u8,
            value.day() as u8,
            value.hour() as u8,
            value.minute() as u8,
            value.second() as u8,
            value.nanosecond() / 1_000,
        )
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(
            u16::try_from(value.year()).unwrap_or(0),
            value.month() as u8,
            value.day() as u8,
            0,
            0,
            0,
            0,
        )
    }
}

impl From<NaiveTime> for Value {
    fn from(value: NaiveTime) -> Self {
        Value::Time(
            false,
            0,
            value.hour() as u8,
            value.minute() as u8,
            value.second() as u8,
            value.nanosecond() / 1_000,
        )
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Date(y, mo, d, h, mi, s, us) => {
                NaiveDate::from_ymd_opt(y.into(), mo.into(), d.into())
                    .and_then(|date| date.and_hms_micro_opt(h.into(), mi.into(), s.into(), us))
                    .ok_or_else(zero_date)
            }
            Value::Bytes(bytes) => {
                let s = text(&bytes)?;
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                    .or_else(|_| {
                        NaiveDate::parse_from_str(s, "%Y-%m-%d")
                            .map(|date| date.and_time(NaiveTime::MIN))
                    })
                    .map_err(|e| Error::Decode(format!("invalid datetime {s:?}: {e}")))
            }
            other => Err(Error::Decode(format!("cannot decode {other:?} as NaiveDateTime"))),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Date(y, mo, d, ..) => {
                NaiveDate::from_ymd_opt(y.into(), mo.into(), d.into()).ok_or_else(zero_date)
            }
            Value::Bytes(bytes) => {
                let s = text(&bytes)?;
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map_err(|e| Error::Decode(format!("invalid date {s:?}: {e}")))
            }
            other => Err(Error::Decode(format!("cannot decode {other:?} as NaiveDate"))),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Time(false, 0, h, m, s, us) => {
                NaiveTime::from_hms_micro_opt(h.into(), m.into(), s.into(), us)
                    .ok_or_else(|| Error::Decode("invalid time".into()))
            }
            Value::Time(..) => Err(Error::Decode(
                "TIME outside 00:00:00..24:00:00 cannot be a NaiveTime".into(),
            )),
            Value::Bytes(bytes) => {
                let s = text(&bytes)?;
                NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                    .map_err(|e| Error::Decode(format!("invalid time {s:?}: {e}")))
            }
            other => Err(Error::Decode(format!("cannot decode {other:?} as NaiveTime"))),
        }
    }
}
