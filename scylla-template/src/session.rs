//! The backend operations submit their statements to.

use async_trait::async_trait;
use scylla::client::session::Session;
use scylla::errors::ExecutionError;
use scylla::response::query_result::QueryResult;

use crate::statement::CqlStatement;

/// Executes statements on behalf of a [`CqlTemplate`](crate::client::template::CqlTemplate).
///
/// Implementations must support many concurrent in-flight requests. The template never
/// pools or synchronizes access to the session, it only calls this method.
///
/// The driver's [`Session`] is the implementation used in production. Other implementations
/// exist mostly for tests.
#[async_trait]
pub trait CqlSession: Send + Sync + 'static {
    /// What a successful request produces.
    type Output: Send + 'static;

    /// Sends the statement, with its bound values, and waits for the response.
    async fn execute_statement(
        &self,
        statement: CqlStatement,
    ) -> Result<Self::Output, ExecutionError>;
}

#[async_trait]
impl CqlSession for Session {
    type Output = QueryResult;

    async fn execute_statement(
        &self,
        statement: CqlStatement,
    ) -> Result<QueryResult, ExecutionError> {
        match statement {
            CqlStatement::Unprepared { statement, values } => {
                self.query_unpaged(statement, values).await
            }
            CqlStatement::Prepared { statement, values } => {
                self.execute_unpaged(&statement, values).await
            }
            CqlStatement::Batch { batch, values } => self.batch(&batch, values).await,
        }
    }
}
