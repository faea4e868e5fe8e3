//! Built-in conversions from driver values to field and scalar types.

use std::any::{Any, TypeId};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::entity::{FieldValue, SqlType, TypeInfo, TypeShape};
use crate::error::{DriverError, SqlMapperError};
use crate::handler::HandlerRegistry;
use crate::value::SqlValue;

/// Conversion from a decoded [`FieldValue`] into a concrete field type.
///
/// `Null` converts to the type's default (`None` for `Option`, zero/false/
/// empty for value types); `Custom` downcasts a handler-produced value and
/// reports `HandlerContract` on a type mismatch; `Sql` applies the standard
/// conversion for the raw driver value.
pub trait FromFieldValue: Sized {
    /// `context` names the field or column being converted, for diagnostics.
    fn from_field(value: FieldValue, context: &'static str) -> Result<Self, SqlMapperError>;
}

pub(crate) fn coercion_error(
    context: &'static str,
    value: &SqlValue,
    target: &'static str,
) -> SqlMapperError {
    DriverError::new(format!(
        "cannot coerce {} to {target} for `{context}`",
        value.kind()
    ))
    .into()
}

fn downcast_custom<T: Any>(
    value: Box<dyn Any + Send>,
    target: &'static str,
    context: &'static str,
) -> Result<T, SqlMapperError> {
    value.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
        SqlMapperError::HandlerContract(format!(
            "handler produced a value of the wrong type for {target} `{context}`"
        ))
    })
}

impl<T: FromFieldValue + Any> FromFieldValue for Option<T> {
    fn from_field(value: FieldValue, context: &'static str) -> Result<Self, SqlMapperError> {
        match value {
            FieldValue::Null => Ok(None),
            other => T::from_field(other, context).map(Some),
        }
    }
}

macro_rules! from_field_value {
    ($($t:ty => |$v:ident, $ctx:ident| $body:expr),+ $(,)?) => {$(
        impl FromFieldValue for $t {
            fn from_field(value: FieldValue, context: &'static str) -> Result<Self, SqlMapperError> {
                match value {
                    FieldValue::Null => Ok(<$t>::default()),
                    FieldValue::Custom(boxed) => {
                        downcast_custom::<$t>(boxed, stringify!($t), context)
                    }
                    FieldValue::Sql($v) => {
                        let $ctx = context;
                        $body
                    }
                }
            }
        }
    )+};
}

from_field_value! {
    bool => |v, ctx| v.as_bool().copied().ok_or_else(|| coercion_error(ctx, &v, "bool")),
    i16 => |v, ctx| int_from(&v, ctx, "i16")?.try_into().map_err(|_| coercion_error(ctx, &v, "i16")),
    i32 => |v, ctx| int_from(&v, ctx, "i32")?.try_into().map_err(|_| coercion_error(ctx, &v, "i32")),
    i64 => |v, ctx| int_from(&v, ctx, "i64"),
    f32 => |v, ctx| float_from(&v, ctx, "f32").map(|f| f as f32),
    f64 => |v, ctx| float_from(&v, ctx, "f64"),
    String => |v, ctx| match v {
        SqlValue::Text(s) => Ok(s),
        other => Err(coercion_error(ctx, &other, "String")),
    },
    Vec<u8> => |v, ctx| match v {
        SqlValue::Blob(bytes) => Ok(bytes),
        other => Err(coercion_error(ctx, &other, "Vec<u8>")),
    },
    Uuid => |v, ctx| match &v {
        SqlValue::Uuid(u) => Ok(*u),
        SqlValue::Text(s) => Uuid::parse_str(s).map_err(|_| coercion_error(ctx, &v, "Uuid")),
        _ => Err(coercion_error(ctx, &v, "Uuid")),
    },
    Decimal => |v, ctx| match &v {
        SqlValue::Decimal(d) => Ok(*d),
        SqlValue::Int(i) => Ok(Decimal::from(*i)),
        SqlValue::Float(f) => Decimal::try_from(*f).map_err(|_| coercion_error(ctx, &v, "Decimal")),
        SqlValue::Text(s) => s.trim().parse().map_err(|_| coercion_error(ctx, &v, "Decimal")),
        _ => Err(coercion_error(ctx, &v, "Decimal")),
    },
    NaiveDateTime => |v, ctx| match &v {
        SqlValue::Date(d) => Ok(d.and_time(NaiveTime::default())),
        _ => v.as_timestamp().ok_or_else(|| coercion_error(ctx, &v, "NaiveDateTime")),
    },
    NaiveDate => |v, ctx| match &v {
        SqlValue::Text(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| coercion_error(ctx, &v, "NaiveDate")),
        _ => v.as_date().ok_or_else(|| coercion_error(ctx, &v, "NaiveDate")),
    },
    NaiveTime => |v, ctx| match &v {
        SqlValue::Text(s) => NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S%.f"))
            .map_err(|_| coercion_error(ctx, &v, "NaiveTime")),
        _ => v.as_time().ok_or_else(|| coercion_error(ctx, &v, "NaiveTime")),
    },
    JsonValue => |v, ctx| match v {
        SqlValue::Json(j) => Ok(j),
        SqlValue::Text(s) => serde_json::from_str(&s)
            .map_err(|_| coercion_error(ctx, &SqlValue::Text(s.clone()), "Json")),
        other => Err(coercion_error(ctx, &other, "Json")),
    },
}

fn int_from(value: &SqlValue, context: &'static str, target: &'static str) -> Result<i64, SqlMapperError> {
    match value {
        SqlValue::Int(i) => Ok(*i),
        SqlValue::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| coercion_error(context, value, target)),
        _ => Err(coercion_error(context, value, target)),
    }
}

fn float_from(value: &SqlValue, context: &'static str, target: &'static str) -> Result<f64, SqlMapperError> {
    match value {
        SqlValue::Float(f) => Ok(*f),
        SqlValue::Int(i) => Ok(*i as f64),
        SqlValue::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| coercion_error(context, value, target)),
        _ => Err(coercion_error(context, value, target)),
    }
}

macro_rules! impl_sql_type {
    ($($t:ty => $shape:ident),+ $(,)?) => {$(
        impl SqlType for $t {
            fn type_info() -> TypeInfo {
                TypeInfo {
                    id: TypeId::of::<$t>(),
                    name: stringify!($t),
                    optional: false,
                    shape: TypeShape::$shape,
                }
            }
        }
    )+};
}

impl_sql_type! {
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    f32 => Float,
    f64 => Float,
    String => Text,
    Vec<u8> => Bytes,
    Uuid => Uuid,
    Decimal => Decimal,
    NaiveDateTime => Timestamp,
    NaiveDate => Date,
    NaiveTime => Time,
    JsonValue => Json,
}

impl<T: SqlType> SqlType for Option<T> {
    fn type_info() -> TypeInfo {
        TypeInfo {
            optional: true,
            ..T::type_info()
        }
    }
}

/// Handler-first scalar conversion, shared by the scalar short-circuit and
/// `execute_scalar`.
pub(crate) fn convert_scalar<T: SqlType + FromFieldValue>(
    raw: SqlValue,
    registry: &HandlerRegistry,
) -> Result<T, SqlMapperError> {
    let info = T::type_info();
    if let Some(handler) = registry.try_get(info.id) {
        let parsed = handler.parse(raw)?;
        return T::from_field(FieldValue::Custom(parsed), info.name);
    }
    T::from_field(FieldValue::Sql(raw), info.name)
}
