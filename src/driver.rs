//! ADO-style driver abstraction consumed by the mapper.
//!
//! The mapper never talks to a concrete database; it drives these traits and
//! leaves the wire protocol, placeholder syntax, and connection pooling to the
//! driver crate implementing them. Every I/O method is async and accepts a
//! cancellation token that the driver is expected to honour.

use std::any::Any;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tokio_util::sync::CancellationToken;

use crate::error::DriverError;
use crate::value::{DbTypeHint, SqlValue};

/// Opaque transaction token accepted by a command.
///
/// The mapper never opens, commits, or aborts a transaction itself; it only
/// forwards the token to the command so a query can participate in a
/// caller-owned transaction. Drivers downcast through [`Transaction::as_any`].
pub trait Transaction: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// A single driver parameter attached to a command.
pub trait Parameter: Send {
    fn name(&self) -> &str;
    fn set_name(&mut self, name: &str);
    fn value(&self) -> &SqlValue;
    /// Assign the parameter value. `SqlValue::Null` is the null sentinel.
    fn set_value(&mut self, value: SqlValue);
    fn type_hint(&self) -> Option<&DbTypeHint>;
    fn set_type_hint(&mut self, hint: DbTypeHint);
}

/// An executable command bound to a connection.
#[async_trait]
pub trait Command: Send {
    fn sql(&self) -> &str;
    fn set_sql(&mut self, sql: &str);

    /// Enlist the command in a caller-owned transaction.
    fn set_transaction(&mut self, tx: &dyn Transaction) -> Result<(), DriverError>;

    fn create_parameter(&self) -> Box<dyn Parameter>;
    fn add_parameter(&mut self, parameter: Box<dyn Parameter>);

    /// Names of the parameters currently attached, in bind order.
    fn parameter_names(&self) -> Vec<String>;

    async fn execute_non_query(&mut self, cancel: &CancellationToken) -> Result<u64, DriverError>;

    /// Execute and return the first column of the first row, if any.
    async fn execute_scalar(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<SqlValue>, DriverError>;

    async fn execute_reader(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn RowReader>, DriverError>;
}

/// An open database connection.
#[async_trait]
pub trait Connection: Send {
    fn is_open(&self) -> bool;
    async fn open(&mut self) -> Result<(), DriverError>;
    fn create_command(&self) -> Box<dyn Command>;
}

/// A forward-only reader over one or more result sets.
///
/// `value` is the generic accessor; `enum_value`, `date_value`, and
/// `time_value` are the strongly-typed accessors required for enumerated,
/// date-only, and time-of-day columns, where some drivers return an incorrect
/// runtime type from the generic path.
#[async_trait]
pub trait RowReader: Send {
    fn has_rows(&self) -> bool;
    fn field_count(&self) -> usize;
    fn column_name(&self, ordinal: usize) -> &str;
    fn is_null(&self, ordinal: usize) -> bool;

    fn value(&self, ordinal: usize) -> Result<SqlValue, DriverError>;

    /// Strongly-typed accessor for enumerated columns.
    ///
    /// The driver must return the column's enum representation with its
    /// correct runtime type: `Text` for string-backed enum columns, `Int`
    /// for integral ones, even where `value` would report something else.
    fn enum_value(&self, ordinal: usize) -> Result<SqlValue, DriverError>;

    fn date_value(&self, ordinal: usize) -> Result<NaiveDate, DriverError>;
    fn time_value(&self, ordinal: usize) -> Result<NaiveTime, DriverError>;

    /// Advance to the next row of the current result set.
    async fn advance(&mut self, cancel: &CancellationToken) -> Result<bool, DriverError>;

    /// Advance to the next result set.
    async fn next_result(&mut self, cancel: &CancellationToken) -> Result<bool, DriverError>;
}
