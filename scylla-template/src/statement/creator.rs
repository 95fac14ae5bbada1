use crate::errors::StatementCreationError;

use super::CqlStatement;

/// Builds the statement of an operation, each time the operation is executed.
///
/// Statements are never cached by operations: executing an operation twice calls
/// [`create_statement`](StatementCreator::create_statement) twice, so a creator reading
/// external state sees the state as of each execution.
///
/// Implemented for closures returning a statement, and for [`CqlStatement`] itself
/// (which hands out a fresh clone on every call).
///
/// ```
/// # use std::sync::atomic::{AtomicI32, Ordering};
/// # use std::sync::Arc;
/// # use scylla_template::errors::StatementCreationError;
/// # use scylla_template::statement::{CqlStatement, StatementCreator};
/// let limit = Arc::new(AtomicI32::new(10));
/// let creator = {
///     let limit = Arc::clone(&limit);
///     move || -> Result<CqlStatement, StatementCreationError> {
///         let cql = format!("SELECT * FROM ks.t LIMIT {}", limit.load(Ordering::Relaxed));
///         Ok(CqlStatement::from(cql))
///     }
/// };
///
/// limit.store(5, Ordering::Relaxed);
/// let statement = creator.create_statement().unwrap();
/// assert_eq!(statement.contents(), Some("SELECT * FROM ks.t LIMIT 5"));
/// ```
pub trait StatementCreator: Send + Sync {
    /// Creates the statement. An error aborts the execution before anything is sent.
    fn create_statement(&self) -> Result<CqlStatement, StatementCreationError>;
}

impl<F> StatementCreator for F
where
    F: Fn() -> Result<CqlStatement, StatementCreationError> + Send + Sync,
{
    fn create_statement(&self) -> Result<CqlStatement, StatementCreationError> {
        self()
    }
}

impl StatementCreator for CqlStatement {
    fn create_statement(&self) -> Result<CqlStatement, StatementCreationError> {
        Ok(self.clone())
    }
}
