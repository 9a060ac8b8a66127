//! Typed statement parameters

use chrono::NaiveDateTime;
use sqlx::any::{Any, AnyArguments};
use sqlx::query::Query;

/// Text form used when a timestamp is bound or rendered.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL `NULL`
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Floating point
    Float(f64),
    /// Text
    Text(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Date and time without zone
    Timestamp(NaiveDateTime),
    /// UUID
    Uuid(uuid::Uuid),
    /// JSON document
    Json(serde_json::Value),
    /// Nullable value
    Optional(Option<Box<Value>>),
}

impl Value {
    /// Bind onto a query. Types without a portable wire encoding (timestamps,
    /// UUIDs, JSON, `u64` beyond `i64::MAX`) are sent as text.
    pub(crate) fn bind<'q>(
        &self,
        query: Query<'q, Any, AnyArguments<'q>>,
    ) -> Query<'q, Any, AnyArguments<'q>> {
        match self {
            Self::Null | Self::Optional(None) => query.bind(None::<String>),
            Self::Bool(b) => query.bind(*b),
            Self::Int(i) => query.bind(*i),
            Self::UInt(u) => match i64::try_from(*u) {
                Ok(i) => query.bind(i),
                Err(_) => query.bind(u.to_string()),
            },
            Self::Float(f) => query.bind(*f),
            Self::Text(s) => query.bind(s.clone()),
            Self::Bytes(b) => query.bind(b.clone()),
            Self::Timestamp(ts) => query.bind(ts.format(TIMESTAMP_FORMAT).to_string()),
            Self::Uuid(u) => query.bind(u.to_string()),
            Self::Json(j) => query.bind(j.to_string()),
            Self::Optional(Some(inner)) => inner.bind(query),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::UInt(u64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(v)
    }
}

impl From<uuid::Uuid> for Value {
    fn from(v: uuid::Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        Self::Optional(v.map(|inner| Box::new(inner.into())))
    }
}
