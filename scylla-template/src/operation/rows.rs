use itertools::Itertools;
use scylla::deserialize::row::DeserializeRow;
use scylla::response::query_result::QueryResult;

use crate::errors::{IncorrectRowCount, OperationError};

use super::{ProcessingOperation, QueryOperation};

/// Row extraction for operations producing a driver [`QueryResult`].
///
/// Each method chains a [transform](QueryOperation::transform), so failures to
/// deserialize the rows surface as [`OperationError::Processing`] and reach the failure handler.
///
/// ```no_run
/// # use scylla_template::client::template::CqlTemplate;
/// # use scylla_template::operation::{QueryOperation, QueryResultOperation};
/// # use scylla_template::statement::CqlStatement;
/// # async fn example(template: CqlTemplate) -> Result<(), Box<dyn std::error::Error>> {
/// let names: Vec<(String,)> = template
///     .execute_operation(CqlStatement::from("SELECT name FROM ks.users"))
///     .map_rows::<(String,)>()
///     .execute()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub trait QueryResultOperation: QueryOperation<Output = QueryResult> {
    /// Deserializes all rows.
    fn map_rows<R>(self) -> ProcessingOperation<Self, Vec<R>>
    where
        R: for<'frame> DeserializeRow<'frame, 'frame> + Send + 'static,
    {
        self.transform(collect_rows::<R>)
    }

    /// Deserializes the first row, if there is one.
    fn first_row<R>(self) -> ProcessingOperation<Self, Option<R>>
    where
        R: for<'frame> DeserializeRow<'frame, 'frame> + Send + 'static,
    {
        self.transform(|result: QueryResult| {
            result
                .into_rows_result()
                .map_err(OperationError::processing)?
                .maybe_first_row::<R>()
                .map_err(OperationError::processing)
        })
    }

    /// Deserializes the only row.
    ///
    /// Fails with [`IncorrectRowCount`] unless there is exactly one.
    fn single_row<R>(self) -> ProcessingOperation<Self, R>
    where
        R: for<'frame> DeserializeRow<'frame, 'frame> + Send + 'static,
    {
        self.transform(take_single_row::<R>)
    }

    /// Returns whether any row was returned.
    fn exists(self) -> ProcessingOperation<Self, bool> {
        self.transform(any_rows::<QueryResult>)
    }

    /// Number of rows returned, zero for statements which return no rows.
    fn rows_num(self) -> ProcessingOperation<Self, usize> {
        self.transform(count_rows::<QueryResult>)
    }
}

impl<O: QueryOperation<Output = QueryResult>> QueryResultOperation for O {}

fn collect_rows<R>(result: QueryResult) -> Result<Vec<R>, OperationError>
where
    R: for<'frame> DeserializeRow<'frame, 'frame>,
{
    let rows = result
        .into_rows_result()
        .map_err(OperationError::processing)?;
    rows.rows::<R>()
        .map_err(OperationError::processing)?
        .collect::<Result<Vec<R>, _>>()
        .map_err(OperationError::processing)
}

pub(crate) fn take_single_row<R>(result: QueryResult) -> Result<R, OperationError>
where
    R: for<'frame> DeserializeRow<'frame, 'frame>,
{
    exactly_one(collect_rows(result)?)
}

fn exactly_one<R>(rows: Vec<R>) -> Result<R, OperationError> {
    let actual = rows.len();
    rows.into_iter()
        .exactly_one()
        .map_err(|_| OperationError::processing(IncorrectRowCount { expected: 1, actual }))
}

// Responses which may or may not carry rows.
trait RowCount {
    fn is_rows(&self) -> bool;
    fn count(self) -> Result<usize, OperationError>;
}

impl RowCount for QueryResult {
    fn is_rows(&self) -> bool {
        QueryResult::is_rows(self)
    }

    fn count(self) -> Result<usize, OperationError> {
        let rows = self
            .into_rows_result()
            .map_err(OperationError::processing)?;
        Ok(rows.rows_num())
    }
}

fn count_rows<C: RowCount>(result: C) -> Result<usize, OperationError> {
    if !result.is_rows() {
        return Ok(0);
    }
    result.count()
}

fn any_rows<C: RowCount>(result: C) -> Result<bool, OperationError> {
    Ok(count_rows(result)? > 0)
}
