//! REST parameter sets
//!
//! `RestParamsBuilder` collects key/value pairs; `build` freezes them into an
//! immutable, cheaply cloneable `RestParams`. Rendering is deterministic so
//! the query string can be signed by HMAC-style venue auth schemes.

use indexmap::IndexMap;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, LazyLock};
use thiserror::Error;

static EMPTY: LazyLock<RestParams> = LazyLock::new(|| RestParams {
    values: Arc::new(IndexMap::new()),
});

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("parameter {key} is not a finite number: {value}")]
    NonFinite { key: String, value: f64 },
    #[error("parameter {key} is outside the decimal range: {value}")]
    OutOfRange { key: String, value: f64 },
}

/// A single parameter value
///
/// `Null` keeps the key in the set without a value and renders as `key=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Int(i64),
    UInt(u64),
    Bool(bool),
    Text(String),
    /// Always stored normalized (no trailing fractional zeros)
    Decimal(Decimal),
    Null,
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::UInt(v) => write!(f, "{}", v),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Text(v) => f.write_str(v),
            ParamValue::Decimal(v) => write!(f, "{}", v),
            ParamValue::Null => Ok(()),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        ParamValue::UInt(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::UInt(value.into())
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<Decimal> for ParamValue {
    fn from(value: Decimal) -> Self {
        ParamValue::Decimal(value.normalize())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ParamValue::Null, Into::into)
    }
}

/// Value escaping applied while rendering a query string
pub trait Escaper {
    fn escape<'a>(&self, value: &'a str) -> Cow<'a, str>;
}

/// Leaves values untouched (the default)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEscaper;

impl Escaper for NoEscaper {
    fn escape<'a>(&self, value: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(value)
    }
}

/// `application/x-www-form-urlencoded` escaping
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlEscaper;

impl Escaper for UrlEscaper {
    fn escape<'a>(&self, value: &'a str) -> Cow<'a, str> {
        let escaped: String = url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
        if escaped == value {
            Cow::Borrowed(value)
        } else {
            Cow::Owned(escaped)
        }
    }
}

impl<F> Escaper for F
where
    F: Fn(&str) -> String,
{
    fn escape<'a>(&self, value: &'a str) -> Cow<'a, str> {
        Cow::Owned(self(value))
    }
}

/// Immutable, ordered parameter set
///
/// Cloning shares the underlying map. Use [`RestParams::to_builder`] to derive
/// a modified copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestParams {
    values: Arc<IndexMap<String, ParamValue>>,
}

impl RestParams {
    pub fn builder() -> RestParamsBuilder {
        RestParamsBuilder::default()
    }

    /// The canonical empty parameter set
    pub fn empty() -> RestParams {
        EMPTY.clone()
    }

    /// Start a new builder seeded with a deep copy of these values
    pub fn to_builder(&self) -> RestParamsBuilder {
        RestParamsBuilder {
            values: IndexMap::clone(&self.values),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// True when both handles share the same storage
    pub fn ptr_eq(a: &RestParams, b: &RestParams) -> bool {
        Arc::ptr_eq(&a.values, &b.values)
    }

    /// Render `k1=v1&k2=v2` without escaping
    pub fn query_string(&self) -> String {
        self.query_string_with(&NoEscaper)
    }

    /// Render `k1=v1&k2=v2`, passing every value through `escaper`
    pub fn query_string_with<E: Escaper + ?Sized>(&self, escaper: &E) -> String {
        let mut out = String::new();
        for (i, (key, value)) in self.values.iter().enumerate() {
            if i > 0 {
                out.push('&');
            }
            out.push_str(key);
            out.push('=');
            if !matches!(value, ParamValue::Null) {
                out.push_str(&escaper.escape(&value.to_string()));
            }
        }
        out
    }
}

impl Default for RestParams {
    fn default() -> Self {
        Self::empty()
    }
}

/// Builder for [`RestParams`]
///
/// Keys are unique: adding an existing key replaces its value but keeps the
/// position of the first insertion.
#[derive(Debug, Clone, Default)]
pub struct RestParamsBuilder {
    values: IndexMap<String, ParamValue>,
}

impl RestParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn add_null(self, key: impl Into<String>) -> Self {
        self.add(key, ParamValue::Null)
    }

    /// Add a float through its shortest decimal representation
    pub fn try_add_f64(self, key: impl Into<String>, value: f64) -> Result<Self, ParamError> {
        let key = key.into();
        if !value.is_finite() {
            return Err(ParamError::NonFinite { key, value });
        }
        match Decimal::from_f64(value) {
            Some(decimal) => Ok(self.add(key, decimal)),
            None => Err(ParamError::OutOfRange { key, value }),
        }
    }

    pub fn add_all(mut self, params: &RestParams) -> Self {
        for (key, value) in params.values.iter() {
            self.values.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Freeze in insertion order
    pub fn build(self) -> RestParams {
        if self.values.is_empty() {
            return RestParams::empty();
        }
        RestParams {
            values: Arc::new(self.values),
        }
    }

    /// Freeze ordered lexicographically by key (for deterministic signing)
    pub fn build_sorted(mut self) -> RestParams {
        self.values.sort_keys();
        self.build()
    }
}
