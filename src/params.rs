//! Parameter carriers and the parameter binder.
//!
//! A parameter carrier is either nothing (`()`), an ordered [`Parameters`]
//! bag, or any user type implementing [`ParameterSet`]. The binder walks the
//! carrier in enumeration order, creates one driver parameter per entry, and
//! consults the handler registry on the value's runtime type before any
//! built-in assignment.

use std::any::{Any, TypeId};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::driver::Command;
use crate::error::SqlMapperError;
use crate::handler::HandlerRegistry;
use crate::value::SqlValue;

/// A value bound to a named parameter.
///
/// `Custom` carries a typed value resolved against the handler registry on
/// its runtime type at bind time, falling back to the built-in rendering when
/// no handler is registered; every typed `From` conversion produces this
/// variant, so a handler registered for a type is never bypassed. `Sql`
/// carries a raw driver value and skips handler resolution.
pub enum ParamValue {
    Sql(SqlValue),
    Custom(CustomParam),
}

impl std::fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sql(v) => write!(f, "Sql({v:?})"),
            Self::Custom(c) => write!(f, "Custom({})", c.type_name),
        }
    }
}

/// A handler-resolved parameter value.
pub struct CustomParam {
    value: Box<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
    /// Built-in rendering used when no handler is registered for the type.
    fallback: Option<fn(&(dyn Any + Send + Sync)) -> Option<SqlValue>>,
}

impl CustomParam {
    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn as_any(&self) -> &dyn Any {
        &*self.value
    }

    pub(crate) fn fallback_value(&self) -> Option<SqlValue> {
        self.fallback.and_then(|render| render(self.value.as_ref()))
    }
}

impl ParamValue {
    /// Wrap a value whose conversion is owned by a registered type handler.
    pub fn custom<T: Any + Send + Sync>(value: T) -> Self {
        Self::Custom(CustomParam {
            value: Box::new(value),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            fallback: None,
        })
    }

    /// Wrap a handler-resolved value with a built-in rendering used when no
    /// handler is registered. Generated by [`crate::sql_enum!`].
    #[doc(hidden)]
    pub fn custom_with_fallback<T: Any + Send + Sync>(
        value: T,
        fallback: fn(&(dyn Any + Send + Sync)) -> Option<SqlValue>,
    ) -> Self {
        Self::Custom(CustomParam {
            value: Box::new(value),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            fallback: Some(fallback),
        })
    }
}

macro_rules! from_scalar_param {
    ($($t:ty => $value:expr),+ $(,)?) => {$(
        impl From<$t> for SqlValue {
            fn from(v: $t) -> Self {
                ($value)(v)
            }
        }

        // Typed values bind handler-first on their runtime type; without a
        // handler the built-in rendering applies.
        impl From<$t> for ParamValue {
            fn from(v: $t) -> Self {
                ParamValue::custom_with_fallback(v, |any| {
                    any.downcast_ref::<$t>().map(|v| SqlValue::from(v.clone()))
                })
            }
        }
    )+};
}

from_scalar_param! {
    bool => SqlValue::Bool,
    i16 => |v| SqlValue::Int(i64::from(v)),
    i32 => |v| SqlValue::Int(i64::from(v)),
    i64 => SqlValue::Int,
    f32 => |v| SqlValue::Float(f64::from(v)),
    f64 => SqlValue::Float,
    String => SqlValue::Text,
    Vec<u8> => SqlValue::Blob,
    Uuid => SqlValue::Uuid,
    Decimal => SqlValue::Decimal,
    NaiveDateTime => SqlValue::Timestamp,
    NaiveDate => SqlValue::Date,
    NaiveTime => SqlValue::Time,
    JsonValue => SqlValue::Json,
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::from(v.to_string())
    }
}

impl From<&[u8]> for SqlValue {
    fn from(v: &[u8]) -> Self {
        SqlValue::Blob(v.to_vec())
    }
}

impl From<&[u8]> for ParamValue {
    fn from(v: &[u8]) -> Self {
        ParamValue::from(v.to_vec())
    }
}

impl From<SqlValue> for ParamValue {
    fn from(v: SqlValue) -> Self {
        ParamValue::Sql(v)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => ParamValue::Sql(SqlValue::Null),
        }
    }
}

macro_rules! from_array_param {
    ($($t:ty),+ $(,)?) => {$(
        impl From<Vec<$t>> for ParamValue {
            fn from(values: Vec<$t>) -> Self {
                ParamValue::custom_with_fallback(values, |any| {
                    any.downcast_ref::<Vec<$t>>().map(|values| {
                        SqlValue::Array(values.iter().cloned().map(SqlValue::from).collect())
                    })
                })
            }
        }
    )+};
}

from_array_param! {
    bool, i16, i32, i64, f64, String, Uuid, Decimal, NaiveDateTime, NaiveDate, NaiveTime,
}

impl From<Vec<&str>> for ParamValue {
    fn from(values: Vec<&str>) -> Self {
        ParamValue::from(values.into_iter().map(String::from).collect::<Vec<String>>())
    }
}

/// Ordered dynamic parameter bag: an append-only list of `(name, value)`
/// pairs for late-bound parameter sets such as variable-size batch inserts.
///
/// ```rust
/// use sql_mapper::prelude::*;
///
/// let mut params = Parameters::new();
/// params.add("name", "alice").add("age", 30_i64).add_null("deleted_at");
/// assert_eq!(params.len(), 3);
/// ```
#[derive(Debug, Default)]
pub struct Parameters {
    entries: Vec<(String, ParamValue)>,
}

impl Parameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named parameter. The name is bound verbatim, with no case
    /// conversion.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> &mut Self {
        self.entries.push((name.into(), value.into()));
        self
    }

    /// Append a named parameter bound to the driver's null sentinel.
    pub fn add_null(&mut self, name: impl Into<String>) -> &mut Self {
        self.entries.push((name.into(), ParamValue::Sql(SqlValue::Null)));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

/// A carrier of named parameters, enumerated in a stable order.
///
/// Implemented by `()` (no parameters) and [`Parameters`]; records with a
/// fixed parameter schema can implement it directly.
pub trait ParameterSet {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every `(name, value)` entry in enumeration order.
    fn visit(
        &self,
        visitor: &mut dyn FnMut(&str, &ParamValue) -> Result<(), SqlMapperError>,
    ) -> Result<(), SqlMapperError>;
}

impl ParameterSet for () {
    fn len(&self) -> usize {
        0
    }

    fn visit(
        &self,
        _visitor: &mut dyn FnMut(&str, &ParamValue) -> Result<(), SqlMapperError>,
    ) -> Result<(), SqlMapperError> {
        Ok(())
    }
}

impl ParameterSet for Parameters {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn visit(
        &self,
        visitor: &mut dyn FnMut(&str, &ParamValue) -> Result<(), SqlMapperError>,
    ) -> Result<(), SqlMapperError> {
        for (name, value) in &self.entries {
            visitor(name, value)?;
        }
        Ok(())
    }
}

impl<P: ParameterSet + ?Sized> ParameterSet for &P {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn visit(
        &self,
        visitor: &mut dyn FnMut(&str, &ParamValue) -> Result<(), SqlMapperError>,
    ) -> Result<(), SqlMapperError> {
        (**self).visit(visitor)
    }
}

/// Translate a parameter carrier into driver parameters attached to the
/// command, one per entry, in enumeration order.
pub(crate) fn bind_parameters(
    command: &mut dyn Command,
    params: &dyn ParameterSet,
    registry: &HandlerRegistry,
) -> Result<(), SqlMapperError> {
    params.visit(&mut |name, value| {
        let mut parameter = command.create_parameter();
        parameter.set_name(name);
        match value {
            ParamValue::Sql(SqlValue::Null) => parameter.set_value(SqlValue::Null),
            ParamValue::Custom(custom) => {
                if let Some(handler) = registry.try_get(custom.type_id()) {
                    handler.set_parameter(parameter.as_mut(), custom.as_any())?;
                } else if let Some(rendered) = custom.fallback_value() {
                    parameter.set_value(rendered);
                } else {
                    return Err(SqlMapperError::HandlerContract(format!(
                        "no handler registered for parameter `{name}` of type {}",
                        custom.type_name()
                    )));
                }
            }
            // Arrays and plain values are assigned as-is; the driver applies
            // its standard conversion.
            ParamValue::Sql(value) => parameter.set_value(value.clone()),
        }
        command.add_parameter(parameter);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_values_bind_as_null() {
        let none: Option<i64> = None;
        assert!(matches!(
            ParamValue::from(none),
            ParamValue::Sql(SqlValue::Null)
        ));
        let ParamValue::Custom(custom) = ParamValue::from(Some(7_i64)) else {
            panic!("expected a typed parameter");
        };
        assert_eq!(custom.fallback_value(), Some(SqlValue::Int(7)));
    }

    #[test]
    fn vectors_render_as_arrays() {
        let ParamValue::Custom(custom) = ParamValue::from(vec!["a", "c"]) else {
            panic!("expected a typed parameter");
        };
        assert_eq!(
            custom.fallback_value(),
            Some(SqlValue::Array(vec![
                SqlValue::Text("a".into()),
                SqlValue::Text("c".into()),
            ]))
        );
    }

    #[test]
    fn byte_vectors_stay_blobs() {
        let ParamValue::Custom(custom) = ParamValue::from(vec![1_u8, 2, 3]) else {
            panic!("expected a typed parameter");
        };
        assert_eq!(custom.fallback_value(), Some(SqlValue::Blob(vec![1, 2, 3])));
    }

    #[test]
    fn bag_preserves_insertion_order() {
        let mut params = Parameters::new();
        params.add("b", 1_i64).add("a", 2_i64).add_null("c");
        let names: Vec<_> = params.names().collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }
}
