//! Row-to-value decoding: the `FromRow` trait and the cardinality helpers
//! shared by the query facade and the grid reader.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::convert::{FromFieldValue, convert_scalar};
use crate::driver::RowReader;
use crate::entity::{FieldValue, SqlType};
use crate::error::{DriverError, SqlMapperError};
use crate::handler::HandlerRegistry;

/// Types decodable from a result row.
///
/// Entity types decode through a cached [`crate::plan::DecodePlan`]; simple
/// types (primitives, strings, decimals, timestamps, dates, times, GUIDs, and
/// enumerated types) short-circuit plan construction and decode the first
/// column through the handler-first scalar path. Implementations are
/// generated by [`crate::entity!`] and [`crate::sql_enum!`].
pub trait FromRow: Sized + Send + 'static {
    /// Per-result-shape decoder state; `()` for scalar targets.
    type Decoder: Send + Sync;

    /// Target type name, used in cardinality error messages.
    fn target_name() -> &'static str;

    fn make_decoder(reader: &dyn RowReader) -> Result<Self::Decoder, SqlMapperError>;

    fn decode(reader: &dyn RowReader, decoder: &Self::Decoder) -> Result<Self, SqlMapperError>;
}

/// Decode the first column of the current row as a simple value.
///
/// A null column yields the type's default; otherwise the raw value goes
/// through the handler-first scalar conversion.
///
/// # Errors
///
/// Surfaces driver read failures and conversion errors.
pub fn decode_scalar_row<T: SqlType + FromFieldValue>(
    reader: &dyn RowReader,
) -> Result<T, SqlMapperError> {
    if reader.field_count() == 0 {
        return Err(DriverError::new("result set has no columns").into());
    }
    let info = T::type_info();
    if reader.is_null(0) {
        return T::from_field(FieldValue::Null, info.name);
    }
    convert_scalar::<T>(reader.value(0)?, HandlerRegistry::global())
}

macro_rules! scalar_from_row {
    ($($t:ty),+ $(,)?) => {$(
        impl FromRow for $t {
            type Decoder = ();

            fn target_name() -> &'static str {
                stringify!($t)
            }

            fn make_decoder(_reader: &dyn RowReader) -> Result<(), SqlMapperError> {
                Ok(())
            }

            fn decode(reader: &dyn RowReader, _decoder: &()) -> Result<Self, SqlMapperError> {
                decode_scalar_row::<$t>(reader)
            }
        }
    )+};
}

scalar_from_row! {
    bool, i16, i32, i64, f32, f64, String, NaiveDateTime, NaiveDate, NaiveTime, Uuid, Decimal,
}

/// Drain the current result set into a list, building the decoder lazily on
/// the first row. Checks the cancellation token between rows.
pub(crate) async fn read_all<T: FromRow>(
    reader: &mut dyn RowReader,
    cancel: &CancellationToken,
) -> Result<Vec<T>, SqlMapperError> {
    let mut items = Vec::new();
    let mut decoder: Option<T::Decoder> = None;
    loop {
        if cancel.is_cancelled() {
            return Err(SqlMapperError::Cancelled);
        }
        if !reader.advance(cancel).await? {
            break;
        }
        if decoder.is_none() {
            decoder = Some(T::make_decoder(reader)?);
        }
        if let Some(decoder) = decoder.as_ref() {
            items.push(T::decode(reader, decoder)?);
        }
    }
    Ok(items)
}

/// Read the first row of the current result set, if any.
///
/// With `enforce_single`, a second row is detected by attempting a further
/// advance and reported as `SequenceMultiple`.
pub(crate) async fn read_at_most_one<T: FromRow>(
    reader: &mut dyn RowReader,
    cancel: &CancellationToken,
    enforce_single: bool,
) -> Result<Option<T>, SqlMapperError> {
    if cancel.is_cancelled() {
        return Err(SqlMapperError::Cancelled);
    }
    if !reader.advance(cancel).await? {
        return Ok(None);
    }
    let decoder = T::make_decoder(reader)?;
    let item = T::decode(reader, &decoder)?;
    if enforce_single && reader.advance(cancel).await? {
        return Err(SqlMapperError::SequenceMultiple(T::target_name()));
    }
    Ok(Some(item))
}
