//! Statement parameters.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::value::Value;

/// Parameters for one statement execution.
///
/// Positional parameters fill `%s` placeholders in order; named parameters
/// fill `%(name)s` placeholders. `None` leaves the statement text untouched,
/// including any `%%` sequences.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    /// No parameters: the statement is sent verbatim.
    #[default]
    None,
    /// Positional sequence
    Positional(Vec<Value>),
    /// Name to value mapping
    Named(Vec<(String, Value)>),
}

impl Params {
    /// Build named parameters from `(name, value)` pairs.
    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Params::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build positional parameters.
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }

    /// Returns true for `Params::None`.
    pub fn is_none(&self) -> bool {
        matches!(self, Params::None)
    }

    /// Number of values carried.
    pub fn len(&self) -> usize {
        match self {
            Params::None => 0,
            Params::Positional(values) => values.len(),
            Params::Named(pairs) => pairs.len(),
        }
    }

    /// Returns true if no values are carried.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a named parameter.
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        match self {
            Params::Named(pairs) => pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Take the values of a positional set. `Params::None` is an empty
    /// sequence; a mapping is a `Type` error.
    pub fn into_positional(self) -> Result<Vec<Value>> {
        match self {
            Params::None => Ok(Vec::new()),
            Params::Positional(values) => Ok(values),
            Params::Named(_) => Err(Error::Type(
                "expected a positional sequence, got a mapping".into(),
            )),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Params::None => "no parameters",
            Params::Positional(_) => "a positional sequence",
            Params::Named(_) => "a mapping",
        }
    }
}

/// Check that every parameter set in a batch has the same shape.
///
/// Positional and named sets cannot be mixed within one `executemany` call.
pub fn ensure_uniform(sets: &[Params]) -> Result<()> {
    let Some(first) = sets.first() else {
        return Ok(());
    };
    let expected = std::mem::discriminant(first);
    if let Some(odd) = sets
        .iter()
        .find(|set| std::mem::discriminant(*set) != expected)
    {
        return Err(Error::Programming(format!(
            "parameter sets mix {} and {}",
            first.kind_name(),
            odd.kind_name()
        )));
    }
    Ok(())
}

/// Conversion into [`Params`].
pub trait IntoParams {
    /// Convert into statement parameters.
    fn into_params(self) -> Params;
}

impl IntoParams for () {
    fn into_params(self) -> Params {
        Params::None
    }
}

impl IntoParams for Params {
    fn into_params(self) -> Params {
        self
    }
}

impl IntoParams for &Params {
    fn into_params(self) -> Params {
        self.clone()
    }
}

impl<T: Into<Value>> IntoParams for Vec<T> {
    fn into_params(self) -> Params {
        Params::positional(self)
    }
}

impl<T: Into<Value> + Clone> IntoParams for &[T] {
    fn into_params(self) -> Params {
        Params::positional(self.iter().cloned())
    }
}

impl<T: Into<Value>, const N: usize> IntoParams for [T; N] {
    fn into_params(self) -> Params {
        Params::positional(self)
    }
}

impl<K: Into<String>, V: Into<Value>, S> IntoParams for HashMap<K, V, S> {
    fn into_params(self) -> Params {
        Params::named(self)
    }
}

impl<K: Into<String>, V: Into<Value>> IntoParams for BTreeMap<K, V> {
    fn into_params(self) -> Params {
        Params::named(self)
    }
}

macro_rules! impl_into_params {
    ($($idx:tt: $T:ident),+) => {
        impl<$($T: Into<Value>),+> IntoParams for ($($T,)+) {
            fn into_params(self) -> Params {
                Params::Positional(vec![$(self.$idx.into()),+])
            }
        }
    };
}

impl_into_params!(0: T0);
impl_into_params!(0: T0, 1: T1);
impl_into_params!(0: T0, 1: T1, 2: T2);
impl_into_params!(0: T0, 1: T1, 2: T2, 3: T3);
impl_into_params!(0: T0, 1: T1, 2: T2, 3: T3, 4: T4);
impl_into_params!(0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5);
impl_into_params!(0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5, 6: T6);
impl_into_params!(0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5, 6: T6, 7: T7);
impl_into_params!(0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5, 6: T6, 7: T7, 8: T8);
impl_into_params!(0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5, 6: T6, 7: T7, 8: T8, 9: T9);
impl_into_params!(0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5, 6: T6, 7: T7, 8: T8, 9: T9, 10: T10);
impl_into_params!(0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5, 6: T6, 7: T7, 8: T8, 9: T9, 10: T10, 11: T11);
