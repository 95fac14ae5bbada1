use scylla::statement::batch::{Batch, BatchType};

use crate::errors::UsageError;

use super::CqlStatement;

/// Folds regular statements into a single server-side batch of the given type.
///
/// The batch is as atomic as the database makes batches of `batch_type`.
/// Only [unprepared](CqlStatement::Unprepared) statements can be folded, anything else
/// fails with [`UsageError::NotFoldable`] naming the first offending position.
/// Folding nothing fails with [`UsageError::EmptyBatch`].
pub fn fold(
    statements: impl IntoIterator<Item = CqlStatement>,
    batch_type: BatchType,
) -> Result<CqlStatement, UsageError> {
    let mut batch = Batch::new(batch_type);
    let mut values = Vec::new();

    for (position, statement) in statements.into_iter().enumerate() {
        match statement {
            CqlStatement::Unprepared {
                statement,
                values: bound,
            } => {
                batch.append_statement(statement);
                values.push(bound);
            }
            other => {
                return Err(UsageError::NotFoldable {
                    position,
                    kind: other.kind(),
                })
            }
        }
    }

    if values.is_empty() {
        return Err(UsageError::EmptyBatch);
    }

    Ok(CqlStatement::Batch { batch, values })
}
