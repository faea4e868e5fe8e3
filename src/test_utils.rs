//! Scripted in-memory driver for tests.
//!
//! [`ScriptedConnection`] implements the full driver abstraction without a
//! database: each executed command pops the next scripted response, and every
//! command is recorded with its bound parameters so tests can assert on the
//! binder's output. Responses can also be computed from the executed command
//! with [`ScriptedResponse::Dynamic`], which is enough to emulate predicate
//! behaviour such as array set-membership filters.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tokio_util::sync::CancellationToken;

use crate::driver::{Command, Connection, Parameter, RowReader, Transaction};
use crate::error::DriverError;
use crate::value::{DbTypeHint, SqlValue};

/// One result set: column names plus rows of raw values.
#[derive(Debug, Clone, Default)]
pub struct ScriptedResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl ScriptedResultSet {
    #[must_use]
    pub fn new<S: Into<String>>(columns: Vec<S>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
        }
    }

    /// Wrap this result set in a standalone reader, for driving the decoder
    /// directly without a connection.
    #[must_use]
    pub fn into_reader(self) -> ScriptedReader {
        ScriptedReader::new(vec![self])
    }
}

/// A snapshot of one bound parameter.
#[derive(Debug, Clone)]
pub struct BoundParameter {
    pub name: String,
    pub value: SqlValue,
    pub type_hint: Option<DbTypeHint>,
}

/// A command as the driver saw it at execution time.
#[derive(Debug, Clone)]
pub struct ExecutedCommand {
    pub sql: String,
    pub parameters: Vec<BoundParameter>,
}

impl ExecutedCommand {
    /// The bound value for `name`, if present.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&SqlValue> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

/// What the driver should answer for one execution.
pub enum ScriptedResponse {
    /// A single result set for `execute_reader`.
    Rows(ScriptedResultSet),
    /// Multiple sequential result sets for `execute_reader`.
    MultiRows(Vec<ScriptedResultSet>),
    /// An affected-row count for `execute_non_query`.
    Affected(u64),
    /// A scalar for `execute_scalar`; `None` means no row.
    Scalar(Option<SqlValue>),
    /// A driver failure for any execution method.
    Fail(String),
    /// Compute the response from the executed command and its parameters.
    Dynamic(Box<dyn Fn(&ExecutedCommand) -> ScriptedResponse + Send + Sync>),
}

#[derive(Default)]
struct ScriptState {
    responses: VecDeque<ScriptedResponse>,
    executed: Vec<ExecutedCommand>,
}

/// Opaque transaction token understood by the scripted driver.
#[derive(Debug, Default)]
pub struct ScriptedTransaction;

impl Transaction for ScriptedTransaction {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// A scripted connection. Starts closed; the facade opens it on first use.
pub struct ScriptedConnection {
    open: bool,
    state: Arc<Mutex<ScriptState>>,
}

impl Default for ScriptedConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedConnection {
    #[must_use]
    pub fn new() -> Self {
        Self {
            open: false,
            state: Arc::new(Mutex::new(ScriptState::default())),
        }
    }

    /// Queue the response for the next executed command.
    pub fn enqueue(&self, response: ScriptedResponse) -> &Self {
        self.lock_state().responses.push_back(response);
        self
    }

    /// Every command executed so far, with its bound parameters.
    #[must_use]
    pub fn executed(&self) -> Vec<ExecutedCommand> {
        self.lock_state().executed.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, ScriptState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn open(&mut self) -> Result<(), DriverError> {
        tokio::task::yield_now().await;
        self.open = true;
        Ok(())
    }

    fn create_command(&self) -> Box<dyn Command> {
        Box::new(ScriptedCommand {
            sql: String::new(),
            parameters: Vec::new(),
            state: Arc::clone(&self.state),
        })
    }
}

struct ScriptedCommand {
    sql: String,
    parameters: Vec<Box<dyn Parameter>>,
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedCommand {
    fn record(&self) -> ExecutedCommand {
        ExecutedCommand {
            sql: self.sql.clone(),
            parameters: self
                .parameters
                .iter()
                .map(|p| BoundParameter {
                    name: p.name().to_string(),
                    value: p.value().clone(),
                    type_hint: p.type_hint().cloned(),
                })
                .collect(),
        }
    }

    fn take_response(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ScriptedResponse, DriverError> {
        if cancel.is_cancelled() {
            return Err(DriverError::new("execution cancelled by driver"));
        }
        let executed = self.record();
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.executed.push(executed.clone());
        let response = state
            .responses
            .pop_front()
            .ok_or_else(|| DriverError::new(format!("no scripted response for `{}`", self.sql)))?;
        drop(state);
        match response {
            ScriptedResponse::Dynamic(respond) => Ok(respond(&executed)),
            other => Ok(other),
        }
    }
}

#[async_trait]
impl Command for ScriptedCommand {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn set_sql(&mut self, sql: &str) {
        self.sql = sql.to_string();
    }

    fn set_transaction(&mut self, _tx: &dyn Transaction) -> Result<(), DriverError> {
        Ok(())
    }

    fn create_parameter(&self) -> Box<dyn Parameter> {
        Box::new(ScriptedParameter::default())
    }

    fn add_parameter(&mut self, parameter: Box<dyn Parameter>) {
        self.parameters.push(parameter);
    }

    fn parameter_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name().to_string()).collect()
    }

    async fn execute_non_query(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<u64, DriverError> {
        tokio::task::yield_now().await;
        match self.take_response(cancel)? {
            ScriptedResponse::Affected(count) => Ok(count),
            ScriptedResponse::Fail(message) => Err(DriverError::new(message)),
            _ => Err(DriverError::new("scripted response is not an affected count")),
        }
    }

    async fn execute_scalar(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<SqlValue>, DriverError> {
        tokio::task::yield_now().await;
        match self.take_response(cancel)? {
            ScriptedResponse::Scalar(value) => Ok(value),
            // Allow scripting a result set and reading its first cell.
            ScriptedResponse::Rows(set) => {
                Ok(set.rows.first().and_then(|row| row.first().cloned()))
            }
            ScriptedResponse::Fail(message) => Err(DriverError::new(message)),
            _ => Err(DriverError::new("scripted response is not a scalar")),
        }
    }

    async fn execute_reader(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn RowReader>, DriverError> {
        tokio::task::yield_now().await;
        match self.take_response(cancel)? {
            ScriptedResponse::Rows(set) => Ok(Box::new(ScriptedReader::new(vec![set]))),
            ScriptedResponse::MultiRows(sets) => Ok(Box::new(ScriptedReader::new(sets))),
            ScriptedResponse::Fail(message) => Err(DriverError::new(message)),
            _ => Err(DriverError::new("scripted response is not a result set")),
        }
    }
}

#[derive(Default)]
struct ScriptedParameter {
    name: String,
    value: SqlValue,
    type_hint: Option<DbTypeHint>,
}

impl Parameter for ScriptedParameter {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn value(&self) -> &SqlValue {
        &self.value
    }

    fn set_value(&mut self, value: SqlValue) {
        self.value = value;
    }

    fn type_hint(&self) -> Option<&DbTypeHint> {
        self.type_hint.as_ref()
    }

    fn set_type_hint(&mut self, hint: DbTypeHint) {
        self.type_hint = Some(hint);
    }
}

/// Forward-only reader over scripted result sets.
pub struct ScriptedReader {
    sets: Vec<ScriptedResultSet>,
    current_set: usize,
    /// Row position; `None` before the first `advance`.
    current_row: Option<usize>,
}

impl ScriptedReader {
    #[must_use]
    pub fn new(sets: Vec<ScriptedResultSet>) -> Self {
        Self {
            sets,
            current_set: 0,
            current_row: None,
        }
    }

    fn set(&self) -> &ScriptedResultSet {
        static EMPTY: ScriptedResultSet = ScriptedResultSet {
            columns: Vec::new(),
            rows: Vec::new(),
        };
        self.sets.get(self.current_set).unwrap_or(&EMPTY)
    }

    fn cell(&self, ordinal: usize) -> Result<&SqlValue, DriverError> {
        let row = self
            .current_row
            .and_then(|index| self.set().rows.get(index))
            .ok_or_else(|| DriverError::new("reader is not positioned on a row"))?;
        row.get(ordinal)
            .ok_or_else(|| DriverError::new(format!("ordinal {ordinal} out of range")))
    }

    /// Position on the current row without the async trait plumbing; used by
    /// tests that drive the decoder directly.
    pub fn advance_sync(&mut self) -> bool {
        let next = self.current_row.map_or(0, |index| index + 1);
        if next < self.set().rows.len() {
            self.current_row = Some(next);
            true
        } else {
            self.current_row = Some(self.set().rows.len());
            false
        }
    }
}

#[async_trait]
impl RowReader for ScriptedReader {
    fn has_rows(&self) -> bool {
        !self.set().rows.is_empty()
    }

    fn field_count(&self) -> usize {
        self.set().columns.len()
    }

    fn column_name(&self, ordinal: usize) -> &str {
        self.set()
            .columns
            .get(ordinal)
            .map_or("", String::as_str)
    }

    fn is_null(&self, ordinal: usize) -> bool {
        self.cell(ordinal).is_ok_and(SqlValue::is_null)
    }

    fn value(&self, ordinal: usize) -> Result<SqlValue, DriverError> {
        self.cell(ordinal).cloned()
    }

    fn enum_value(&self, ordinal: usize) -> Result<SqlValue, DriverError> {
        let value = self.cell(ordinal)?;
        match value {
            SqlValue::Text(_) | SqlValue::Int(_) => Ok(value.clone()),
            _ => Err(DriverError::new(format!(
                "column {ordinal} is not an enum representation"
            ))),
        }
    }

    fn date_value(&self, ordinal: usize) -> Result<NaiveDate, DriverError> {
        let value = self.cell(ordinal)?;
        value
            .as_date()
            .ok_or_else(|| DriverError::new(format!("column {ordinal} is not a date")))
    }

    fn time_value(&self, ordinal: usize) -> Result<NaiveTime, DriverError> {
        let value = self.cell(ordinal)?;
        value
            .as_time()
            .ok_or_else(|| DriverError::new(format!("column {ordinal} is not a time")))
    }

    async fn advance(&mut self, cancel: &CancellationToken) -> Result<bool, DriverError> {
        tokio::task::yield_now().await;
        if cancel.is_cancelled() {
            return Err(DriverError::new("row advance cancelled by driver"));
        }
        Ok(self.advance_sync())
    }

    async fn next_result(&mut self, cancel: &CancellationToken) -> Result<bool, DriverError> {
        tokio::task::yield_now().await;
        if cancel.is_cancelled() {
            return Err(DriverError::new("next-result cancelled by driver"));
        }
        if self.current_set + 1 < self.sets.len() {
            self.current_set += 1;
            self.current_row = None;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
