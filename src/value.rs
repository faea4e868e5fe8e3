use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Values exchanged with the database driver.
///
/// The same enum is used for parameter values and for raw column values read
/// from a row reader, so handlers and conversion helpers never need to branch
/// on driver types:
/// ```rust
/// use sql_mapper::prelude::*;
///
/// let params = vec![
///     SqlValue::Int(1),
///     SqlValue::Text("alice".into()),
///     SqlValue::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value (the driver's null sentinel)
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Binary data
    Blob(Vec<u8>),
    /// GUID value
    Uuid(Uuid),
    /// Fixed-precision decimal value
    Decimal(Decimal),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// Calendar-date-only value
    Date(NaiveDate),
    /// Time-of-day-only value
    Time(NaiveTime),
    /// JSON value
    Json(JsonValue),
    /// Array value, used with set-membership predicates on drivers that
    /// support array parameters
    Array(Vec<SqlValue>),
}

impl Default for SqlValue {
    fn default() -> Self {
        SqlValue::Null
    }
}

impl SqlValue {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the value's kind, used in conversion error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
            Self::Uuid(_) => "uuid",
            Self::Decimal(_) => "decimal",
            Self::Timestamp(_) => "timestamp",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::Json(_) => "json",
            Self::Array(_) => "array",
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let SqlValue::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let SqlValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let SqlValue::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let SqlValue::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            // Try "YYYY-MM-DD HH:MM:SS"
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            // Try "YYYY-MM-DD HH:MM:SS.SSS"
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S.%3f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            SqlValue::Date(value) => Some(*value),
            SqlValue::Timestamp(value) => Some(value.date()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            SqlValue::Time(value) => Some(*value),
            SqlValue::Timestamp(value) => Some(value.time()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let SqlValue::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let SqlValue::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_uuid(&self) -> Option<Uuid> {
        if let SqlValue::Uuid(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            SqlValue::Decimal(value) => Some(*value),
            SqlValue::Int(value) => Some(Decimal::from(*value)),
            _ => None,
        }
    }
}

/// Database type hint a handler or binder may attach to a driver parameter.
///
/// Drivers that infer parameter types from values can ignore hints; drivers
/// that require explicit typing (named enum types in particular) read them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbTypeHint {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Text,
    Bytes,
    Uuid,
    Numeric,
    Timestamp,
    Date,
    Time,
    Json,
    /// A named database type, e.g. a user-defined enum type.
    Named(String),
}
