//! Query facade: fluent execution over a driver connection.
//!
//! Every operation opens the connection if needed, builds a command, binds
//! parameters through the handler-first binder, executes, and hands the
//! reader to the decoder. The connection is never closed here; its lifecycle
//! belongs to the caller's session.

use tokio_util::sync::CancellationToken;

use crate::convert::{FromFieldValue, convert_scalar};
use crate::decode::{self, FromRow};
use crate::driver::{Command, Connection, RowReader, Transaction};
use crate::entity::SqlType;
use crate::error::{DriverError, SqlMapperError};
use crate::grid::GridReader;
use crate::handler::HandlerRegistry;
use crate::params::{ParameterSet, bind_parameters};
use crate::value::SqlValue;

/// Entry point for query execution on any driver connection.
///
/// ```rust,no_run
/// use sql_mapper::prelude::*;
///
/// sql_mapper::entity! {
///     #[derive(Debug)]
///     pub struct User {
///         name: String,
///         is_active: bool,
///     }
/// }
///
/// async fn load_active(conn: &mut impl Connection) -> Result<Vec<User>, SqlMapperError> {
///     let mut params = Parameters::new();
///     params.add("active", true);
///     conn.sql("SELECT name, is_active FROM users WHERE is_active = @active")
///         .params(&params)
///         .query::<User>()
///         .await
/// }
/// ```
pub trait SqlConnectionExt: Connection {
    fn sql<'a>(&'a mut self, sql: &'a str) -> QueryBuilder<'a, Self> {
        QueryBuilder::new(self, sql)
    }
}

impl<C: Connection + ?Sized> SqlConnectionExt for C {}

/// Fluent builder carrying the statement, parameter carrier, optional
/// transaction, and cancellation token for one execution.
pub struct QueryBuilder<'a, C: Connection + ?Sized> {
    conn: &'a mut C,
    sql: &'a str,
    params: &'a dyn ParameterSet,
    tx: Option<&'a dyn Transaction>,
    cancel: CancellationToken,
}

impl<'a, C: Connection + ?Sized> QueryBuilder<'a, C> {
    pub(crate) fn new(conn: &'a mut C, sql: &'a str) -> Self {
        Self {
            conn,
            sql,
            params: &(),
            tx: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Provide the parameter carrier for this statement.
    #[must_use]
    pub fn params(mut self, params: &'a dyn ParameterSet) -> Self {
        self.params = params;
        self
    }

    /// Enlist the statement in a caller-owned transaction.
    #[must_use]
    pub fn tx(mut self, tx: &'a dyn Transaction) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Attach a cancellation token, forwarded to every driver call.
    #[must_use]
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Open the connection if needed, build the command, and bind parameters.
    async fn into_command(self) -> Result<PreparedCommand, SqlMapperError> {
        if self.cancel.is_cancelled() {
            return Err(SqlMapperError::Cancelled);
        }
        if !self.conn.is_open() {
            self.conn
                .open()
                .await
                .map_err(|e| SqlMapperError::execution(self.sql, Vec::new(), e))?;
        }
        let mut command = self.conn.create_command();
        command.set_sql(self.sql);
        if let Some(tx) = self.tx {
            command
                .set_transaction(tx)
                .map_err(|e| SqlMapperError::execution(self.sql, Vec::new(), e))?;
        }
        bind_parameters(command.as_mut(), self.params, HandlerRegistry::global())?;
        // Cancellation during binding aborts the command before execute.
        if self.cancel.is_cancelled() {
            return Err(SqlMapperError::Cancelled);
        }
        tracing::trace!(sql = self.sql, parameters = self.params.len(), "command prepared");
        Ok(PreparedCommand {
            command,
            cancel: self.cancel,
            sql: self.sql.to_string(),
        })
    }

    /// Execute and decode zero or more rows.
    ///
    /// # Errors
    ///
    /// Surfaces driver, decode, and cancellation errors.
    pub async fn query<T: FromRow>(self) -> Result<Vec<T>, SqlMapperError> {
        let mut prepared = self.into_command().await?;
        let mut reader = prepared.execute_reader().await?;
        decode::read_all::<T>(reader.as_mut(), &prepared.cancel).await
    }

    /// Execute and decode exactly one row.
    ///
    /// # Errors
    ///
    /// Returns `SequenceEmpty` on zero rows and `SequenceMultiple` when a
    /// second row remains.
    pub async fn query_single<T: FromRow>(self) -> Result<T, SqlMapperError> {
        let mut prepared = self.into_command().await?;
        let mut reader = prepared.execute_reader().await?;
        decode::read_at_most_one::<T>(reader.as_mut(), &prepared.cancel, true)
            .await?
            .ok_or(SqlMapperError::SequenceEmpty(T::target_name()))
    }

    /// Execute and decode zero or one row.
    ///
    /// # Errors
    ///
    /// Returns `SequenceMultiple` when a second row remains.
    pub async fn query_single_or_default<T: FromRow>(self) -> Result<Option<T>, SqlMapperError> {
        let mut prepared = self.into_command().await?;
        let mut reader = prepared.execute_reader().await?;
        decode::read_at_most_one::<T>(reader.as_mut(), &prepared.cancel, true).await
    }

    /// Execute and decode the first row, if any. Additional rows are not an
    /// error.
    ///
    /// # Errors
    ///
    /// Surfaces driver, decode, and cancellation errors.
    pub async fn query_first_or_default<T: FromRow>(self) -> Result<Option<T>, SqlMapperError> {
        let mut prepared = self.into_command().await?;
        let mut reader = prepared.execute_reader().await?;
        decode::read_at_most_one::<T>(reader.as_mut(), &prepared.cancel, false).await
    }

    /// Execute a statement and return the driver-reported affected-row count.
    ///
    /// # Errors
    ///
    /// Surfaces driver and cancellation errors.
    pub async fn execute(self) -> Result<u64, SqlMapperError> {
        let mut prepared = self.into_command().await?;
        let affected = prepared
            .command
            .execute_non_query(&prepared.cancel)
            .await
            .map_err(|e| prepared.wrap(e))?;
        Ok(affected)
    }

    /// Execute and convert the first column of the first row through the
    /// handler-first scalar path. A missing row or null column yields `None`.
    ///
    /// # Errors
    ///
    /// Surfaces driver, conversion, and cancellation errors.
    pub async fn execute_scalar<T>(self) -> Result<Option<T>, SqlMapperError>
    where
        T: SqlType + FromFieldValue,
    {
        let mut prepared = self.into_command().await?;
        let raw = prepared
            .command
            .execute_scalar(&prepared.cancel)
            .await
            .map_err(|e| prepared.wrap(e))?;
        match raw {
            None | Some(SqlValue::Null) => Ok(None),
            Some(value) => convert_scalar::<T>(value, HandlerRegistry::global()).map(Some),
        }
    }

    /// Execute a multi-result statement. Ownership of the command and reader
    /// transfers to the returned grid; the caller must let it drop to release
    /// them.
    ///
    /// # Errors
    ///
    /// Surfaces driver and cancellation errors.
    pub async fn query_multiple(self) -> Result<GridReader, SqlMapperError> {
        let mut prepared = self.into_command().await?;
        let reader = prepared.execute_reader().await?;
        Ok(GridReader::new(prepared.command, reader, prepared.cancel))
    }
}

/// A bound command ready to execute, with the context needed to wrap driver
/// failures.
struct PreparedCommand {
    command: Box<dyn Command>,
    cancel: CancellationToken,
    sql: String,
}

impl PreparedCommand {
    fn wrap(&self, source: DriverError) -> SqlMapperError {
        SqlMapperError::execution(&self.sql, self.command.parameter_names(), source)
    }

    async fn execute_reader(&mut self) -> Result<Box<dyn RowReader>, SqlMapperError> {
        let cancel = self.cancel.clone();
        match self.command.execute_reader(&cancel).await {
            Ok(reader) => Ok(reader),
            Err(e) => Err(self.wrap(e)),
        }
    }
}
