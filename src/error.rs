use thiserror::Error;

/// An error surfaced by the underlying database driver.
///
/// The driver abstraction is opaque to this crate, so driver failures carry a
/// rendered message rather than a backend-specific error enum. Driver
/// implementations are expected to format their native errors into this type.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DriverError {
    message: String,
}

impl DriverError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Error)]
pub enum SqlMapperError {
    /// Commit or rollback was requested on a session with no transaction.
    #[error("no active transaction on this session")]
    NoActiveTransaction,

    /// A single-row contract yielded zero rows.
    #[error("query for {0} returned no rows but exactly one was required")]
    SequenceEmpty(&'static str),

    /// A single-row contract yielded more than one row.
    #[error("query for {0} returned more than one row")]
    SequenceMultiple(&'static str),

    /// The entity type cannot be constructed or violates a handler contract.
    #[error("invalid entity {entity}: {reason}")]
    InvalidEntity {
        entity: &'static str,
        reason: String,
    },

    /// A registered type handler returned an inconsistent value.
    #[error("type handler contract violation: {0}")]
    HandlerContract(String),

    /// Any error surfaced by the driver (connection, SQL, type coercion).
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// A driver failure wrapped with the SQL and parameter names that
    /// triggered it.
    #[error("driver failure executing `{sql}` (parameters: [{}]): {source}", parameters.join(", "))]
    Execution {
        sql: String,
        parameters: Vec<String>,
        #[source]
        source: DriverError,
    },

    /// A cancellation signal was observed.
    #[error("operation cancelled")]
    Cancelled,
}

impl SqlMapperError {
    /// Wrap a driver failure with the statement context that produced it.
    #[must_use]
    pub fn execution(sql: impl Into<String>, parameters: Vec<String>, source: DriverError) -> Self {
        Self::Execution {
            sql: sql.into(),
            parameters,
            source,
        }
    }

    pub(crate) fn invalid_entity(entity: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidEntity {
            entity,
            reason: reason.into(),
        }
    }
}
