//! Grid reader: sequential access to multiple result sets from a single
//! execution.

use tokio_util::sync::CancellationToken;

use crate::decode::{self, FromRow};
use crate::driver::{Command, RowReader};
use crate::error::{DriverError, SqlMapperError};

/// Scoped wrapper over a multi-result-set reader.
///
/// Ownership of the command and reader transfers to the grid; dropping it
/// releases the underlying driver resources. Result sets are consumed
/// strictly in the order they appear in the SQL.
pub struct GridReader {
    command: Box<dyn Command>,
    reader: Box<dyn RowReader>,
    cancel: CancellationToken,
    consumed_first: bool,
}

impl GridReader {
    pub(crate) fn new(
        command: Box<dyn Command>,
        reader: Box<dyn RowReader>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            command,
            reader,
            cancel,
            consumed_first: false,
        }
    }

    /// The SQL text this grid was produced from.
    #[must_use]
    pub fn sql(&self) -> &str {
        self.command.sql()
    }

    async fn advance_result(&mut self) -> Result<(), SqlMapperError> {
        if self.cancel.is_cancelled() {
            return Err(SqlMapperError::Cancelled);
        }
        if self.consumed_first {
            if !self.reader.next_result(&self.cancel).await? {
                return Err(DriverError::new(format!(
                    "no further result sets for `{}`",
                    self.command.sql()
                ))
                .into());
            }
        } else {
            self.consumed_first = true;
        }
        Ok(())
    }

    /// Decode the next result set as a list of `T`.
    ///
    /// # Errors
    ///
    /// Fails when no further result set remains, and surfaces driver and
    /// decode errors.
    pub async fn read<T: FromRow>(&mut self) -> Result<Vec<T>, SqlMapperError> {
        self.advance_result().await?;
        decode::read_all::<T>(self.reader.as_mut(), &self.cancel).await
    }

    /// Decode the next result set as exactly one `T`.
    ///
    /// # Errors
    ///
    /// Returns `SequenceEmpty` on zero rows and `SequenceMultiple` when a
    /// second row remains.
    pub async fn read_single<T: FromRow>(&mut self) -> Result<T, SqlMapperError> {
        self.advance_result().await?;
        decode::read_at_most_one::<T>(self.reader.as_mut(), &self.cancel, true)
            .await?
            .ok_or(SqlMapperError::SequenceEmpty(T::target_name()))
    }
}
