//! Conversions between [`Value`](crate::value::Value) and third-party types.

#[cfg(feature = "with-chrono")]
mod chrono;
