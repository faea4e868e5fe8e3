/*!
 * SQL Mapper - lightweight SQL-to-object mapping
 *
 * This crate maps SQL query results onto user-defined entity structures over
 * an ADO-style driver abstraction (opaque connection, command, parameter, and
 * forward-only reader objects). The driver itself - wire protocol, pooling,
 * placeholder syntax - stays out of scope; any crate implementing the
 * `driver` traits plugs in.
 *
 * # Features
 *
 * - Asynchronous execution with cancellation forwarded to the driver
 * - Cached decode plans keyed on the result's column names, invalidated by
 *   handler registry changes
 * - User-registered type handlers consulted before any built-in conversion
 * - Entities with settable fields, a parameterised constructor, or both
 * - Snake-case to PascalCase column matching fallback
 * - Ordered dynamic parameter bag with array (set-membership) parameters
 *
 * # Example
 *
 * ```rust,no_run
 * use sql_mapper::prelude::*;
 *
 * sql_mapper::entity! {
 *     #[derive(Debug, Clone)]
 *     pub struct User {
 *         name: String,
 *         is_active: bool,
 *     }
 * }
 *
 * async fn example(conn: &mut impl Connection) -> Result<(), SqlMapperError> {
 *     let mut params = Parameters::new();
 *     params.add("names", vec!["alice", "bob"]);
 *
 *     // Decode rows into entities
 *     let users: Vec<User> = conn
 *         .sql("SELECT name, is_active FROM users WHERE name = ANY(@names)")
 *         .params(&params)
 *         .query()
 *         .await?;
 *
 *     // Scalar reads short-circuit the row decoder
 *     let count: Option<i64> = conn
 *         .sql("SELECT count(*) FROM users")
 *         .execute_scalar()
 *         .await?;
 *
 *     let _ = (users, count);
 *     Ok(())
 * }
 * ```
 */

#![forbid(unsafe_code)]

// Test utilities module - only compiled with test-utils feature
#[cfg(feature = "test-utils")]
pub mod test_utils;

// Re-export everything that should be part of the public API
pub mod prelude {
    //! Convenient imports for common functionality.
    //!
    //! This module re-exports the most commonly used types and traits to make
    //! it easier to get started with the library.

    pub use crate::convert::FromFieldValue;
    pub use crate::decode::FromRow;
    pub use crate::driver::{Command, Connection, Parameter, RowReader, Transaction};
    pub use crate::entity::{Entity, FieldValue, SqlEnum, SqlType};
    pub use crate::error::{DriverError, SqlMapperError};
    pub use crate::grid::GridReader;
    pub use crate::handler::{EnumNameHandler, HandlerRegistry, TypeHandler};
    pub use crate::params::{ParamValue, ParameterSet, Parameters};
    pub use crate::query::{QueryBuilder, SqlConnectionExt};
    pub use crate::value::{DbTypeHint, SqlValue};

    pub use tokio_util::sync::CancellationToken;
}

// Core modules
pub mod convert;
pub mod decode;
pub mod driver;
pub mod entity;
pub mod error;
pub mod grid;
pub mod handler;
mod macros;
pub mod params;
pub mod plan;
pub mod query;
pub mod value;

// Direct exports of frequently used types and functions for simplicity
pub use convert::FromFieldValue;
pub use decode::{FromRow, decode_scalar_row};
pub use driver::{Command, Connection, Parameter, RowReader, Transaction};
pub use entity::{
    Construction, CtorParam, Entity, EnumVariant, Field, FieldValue, SqlEnum, SqlType, TypeInfo,
    TypeShape,
};
pub use error::{DriverError, SqlMapperError};
pub use grid::GridReader;
pub use handler::{EnumNameHandler, HandlerRegistry, TypeHandler};
pub use params::{ParamValue, ParameterSet, Parameters};
pub use plan::{DecodePlan, decode_row, plan_for, snake_to_pascal};
pub use query::{QueryBuilder, SqlConnectionExt};
pub use value::{DbTypeHint, SqlValue};
