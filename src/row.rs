//! Result rows and column metadata.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::protocol::response::ColumnDefinition;
use crate::protocol::types::{ColumnFlags, ColumnType};
use crate::value::{FromValue, Value};

/// Owned column metadata (one entry of a cursor's description).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Schema name
    pub schema: String,
    /// Table alias
    pub table: String,
    /// Physical table name
    pub org_table: String,
    /// Column alias, the name rows are keyed by
    pub name: String,
    /// Physical column name
    pub org_name: String,
    /// Character set number
    pub charset: u16,
    /// Maximum display length
    pub length: u32,
    /// Column type; `None` if the server sent an unknown type byte
    pub column_type: Option<ColumnType>,
    /// Column flags
    pub flags: ColumnFlags,
    /// Decimal digits
    pub decimals: u8,
}

impl ColumnMeta {
    /// Metadata for a computed column with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            schema: String::new(),
            table: String::new(),
            org_table: String::new(),
            name: name.into(),
            org_name: String::new(),
            charset: 63,
            length: 0,
            column_type: Some(ColumnType::VarString),
            flags: ColumnFlags::empty(),
            decimals: 0,
        }
    }

    /// Whether the column allows NULL.
    pub fn nullable(&self) -> bool {
        !self.flags.contains(ColumnFlags::NOT_NULL)
    }
}

impl From<ColumnDefinition<'_>> for ColumnMeta {
    fn from(def: ColumnDefinition<'_>) -> Self {
        Self {
            schema: def.schema.to_string(),
            table: def.table.to_string(),
            org_table: def.org_table.to_string(),
            name: def.name.to_string(),
            org_name: def.org_name.to_string(),
            charset: def.tail.charset.get(),
            length: def.tail.length.get(),
            column_type: def.column_type(),
            flags: def.flags(),
            decimals: def.tail.decimals,
        }
    }
}

/// One decoded result row. Immutable once produced.
///
/// Rows produced by a cursor with `named_rows` enabled also carry the
/// column metadata, so values can be looked up by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
    columns: Option<Arc<[ColumnMeta]>>,
}

impl Row {
    /// Positional row.
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            columns: None,
        }
    }

    /// Row that also carries its column names.
    pub fn with_columns(values: Vec<Value>, columns: Arc<[ColumnMeta]>) -> Self {
        Self {
            values,
            columns: Some(columns),
        }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value for the column named `name`. Always `None` for positional rows.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        let columns = self.columns.as_ref()?;
        let index = columns.iter().position(|col| col.name == name)?;
        self.values.get(index)
    }

    /// Column names, if this row carries them.
    pub fn names(&self) -> Option<impl Iterator<Item = &str>> {
        self.columns
            .as_ref()
            .map(|columns| columns.iter().map(|col| col.name.as_str()))
    }

    /// `(name, value)` pairs, if this row carries names.
    pub fn pairs(&self) -> Option<impl Iterator<Item = (&str, &Value)>> {
        self.names().map(|names| names.zip(self.values.iter()))
    }

    /// All values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consume the row, returning its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Decode column `index` into `T`.
    pub fn try_get<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self
            .values
            .get(index)
            .ok_or_else(|| Error::Decode(format!("column index {index} out of range")))?;
        T::decode(value.clone())
    }

    /// Decode the whole row.
    pub fn decode<T: FromRow>(self) -> Result<T> {
        T::from_row(self)
    }
}

impl std::ops::Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

/// Conversion from a [`Row`].
pub trait FromRow: Sized {
    /// Decode a row.
    fn from_row(row: Row) -> Result<Self>;
}

impl FromRow for Row {
    fn from_row(row: Row) -> Result<Self> {
        Ok(row)
    }
}

impl FromRow for Vec<Value> {
    fn from_row(row: Row) -> Result<Self> {
        Ok(row.into_values())
    }
}

macro_rules! impl_from_row_tuple {
    ($len:literal; $($T:ident),+) => {
        impl<$($T: FromValue),+> FromRow for ($($T,)+) {
            fn from_row(row: Row) -> Result<Self> {
                if row.len() != $len {
                    return Err(Error::Decode(format!(
                        "expected {} columns, row has {}",
                        $len,
                        row.len()
                    )));
                }
                let mut values = row.into_values().into_iter();
                Ok(($($T::decode(values.next().unwrap_or(Value::Null))?,)+))
            }
        }
    };
}

impl_from_row_tuple!(1; T0);
impl_from_row_tuple!(2; T0, T1);
impl_from_row_tuple!(3; T0, T1, T2);
impl_from_row_tuple!(4; T0, T1, T2, T3);
impl_from_row_tuple!(5; T0, T1, T2, T3, T4);
impl_from_row_tuple!(6; T0, T1, T2, T3, T4, T5);
impl_from_row_tuple!(7; T0, T1, T2, T3, T4, T5, T6);
impl_from_row_tuple!(8; T0, T1, T2, T3, T4, T5, T6, T7);

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Arc<[ColumnMeta]> {
        Arc::from(vec![ColumnMeta::named("id"), ColumnMeta::named("name")])
    }

    #[test]
    fn named_lookup() {
        let row = Row::with_columns(vec![Value::Int(1), Value::from("x")], columns());
        assert_eq!(row.get_by_name("name"), Some(&Value::from("x")));
        assert_eq!(row.get_by_name("nope"), None);
        let pairs: Vec<_> = row.pairs().unwrap().collect();
        assert_eq!(pairs, [("id", &Value::Int(1)), ("name", &Value::from("x"))]);
    }

    #[test]
    fn positional_rows_have_no_names() {
        let row = Row::new(vec![Value::Int(1)]);
        assert!(row.get_by_name("id").is_none());
        assert!(row.names().is_none());
        assert_eq!(row[0], Value::Int(1));
    }

    #[test]
    fn tuple_decoding() {
        let row = Row::new(vec![Value::Int(7), Value::from("abc"), Value::Null]);
        let (id, name, missing): (i64, String, Option<i32>) = row.decode().unwrap();
        assert_eq!(id, 7);
        assert_eq!(name, "abc");
        assert_eq!(missing, None);
    }

    #[test]
    fn tuple_arity_mismatch() {
        let row = Row::new(vec![Value::Int(7)]);
        assert!(matches!(row.decode::<(i64, i64)>(), Err(Error::Decode(_))));
    }
}
