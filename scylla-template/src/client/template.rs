//! [`CqlTemplate`] is the entry point: it creates operations over a session.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use futures::future::{BoxFuture, FutureExt};
use scylla::client::session::Session;
use scylla::errors::ExecutionError;
use scylla::response::query_result::QueryResult;
use scylla::statement::prepared::PreparedStatement;
use scylla::statement::unprepared::Statement;
use scylla::value::CqlValue;
use tokio::runtime::Handle;
use tracing::{debug, trace, trace_span, Instrument};

use crate::errors::{OperationError, StatementCreationError};
use crate::operation::{
    take_single_row, BatchOperation, ExecuteOperation, OperationContext, ProcessingOperation,
    QueryOperation,
};
use crate::options::StatementOptions;
use crate::session::CqlSession;
use crate::statement::{CqlStatement, StatementCreator};
use crate::translator::{self, ExceptionTranslator};

use super::template_builder::CqlTemplateBuilder;

/// Creates and runs operations over a [`CqlSession`].
///
/// The template is cheap to clone, clones share the session, the translator and the
/// default options. Operations snapshot the default options when they are created.
///
/// Requests are spawned on the tokio runtime given to the builder (by default the runtime
/// the template was built in). The template never spawns threads of its own.
///
/// ```no_run
/// # use scylla::client::session::Session;
/// # use scylla::statement::Consistency;
/// # use scylla_template::client::template::CqlTemplate;
/// # use scylla_template::operation::QueryOperation;
/// # use scylla_template::statement::CqlStatement;
/// # async fn example(session: Session) -> Result<(), Box<dyn std::error::Error>> {
/// let template = CqlTemplate::builder(session).build()?;
///
/// template
///     .execute_operation(CqlStatement::from("INSERT INTO ks.t (a) VALUES (1)"))
///     .with_consistency(Consistency::Quorum)
///     .execute()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct CqlTemplate<S: CqlSession = Session> {
    session: Arc<S>,
    translator: Arc<dyn ExceptionTranslator>,
    runtime: Handle,
    default_options: Arc<ArcSwap<StatementOptions>>,
}

impl<S: CqlSession> Clone for CqlTemplate<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            translator: Arc::clone(&self.translator),
            runtime: self.runtime.clone(),
            default_options: Arc::clone(&self.default_options),
        }
    }
}

impl<S: CqlSession> fmt::Debug for CqlTemplate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CqlTemplate")
            .field("translator", &self.translator)
            .field("default_options", &self.default_options.load_full())
            .finish_non_exhaustive()
    }
}

impl<S: CqlSession> CqlTemplate<S> {
    /// Creates a template with default settings, spawning requests on the current runtime.
    ///
    /// # Panics
    /// Panics when called outside of a tokio runtime. Use [`CqlTemplate::builder`] to
    /// pass a runtime explicitly.
    pub fn new(session: S) -> Self {
        Self::from_parts(
            Arc::new(session),
            Arc::new(translator::DefaultExceptionTranslator::new()),
            Handle::current(),
            StatementOptions::default(),
        )
    }

    /// Creates a builder for a template over `session`.
    pub fn builder(session: S) -> CqlTemplateBuilder<S> {
        CqlTemplateBuilder::new(session)
    }

    pub(crate) fn from_parts(
        session: Arc<S>,
        translator: Arc<dyn ExceptionTranslator>,
        runtime: Handle,
        default_options: StatementOptions,
    ) -> Self {
        Self {
            session,
            translator,
            runtime,
            default_options: Arc::new(ArcSwap::from_pointee(default_options)),
        }
    }

    /// The underlying session.
    pub fn session(&self) -> &Arc<S> {
        &self.session
    }

    /// The translator applied to backend errors.
    pub fn translator(&self) -> &Arc<dyn ExceptionTranslator> {
        &self.translator
    }

    /// The runtime requests are spawned on.
    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Options every new operation starts from.
    pub fn default_options(&self) -> Arc<StatementOptions> {
        self.default_options.load_full()
    }

    /// Replaces the default options, for this template and all its clones.
    ///
    /// Operations created earlier keep the options they were created with.
    pub fn set_default_options(&self, options: StatementOptions) {
        self.default_options.store(Arc::new(options));
    }

    /// Translates `err`. Already translated errors are returned as they are.
    pub fn translate(&self, err: OperationError) -> OperationError {
        translator::translate(&*self.translator, err)
    }

    /// Creates an operation executing the statement made by `creator`.
    pub fn execute_operation(
        &self,
        creator: impl StatementCreator + 'static,
    ) -> ExecuteOperation<S> {
        ExecuteOperation::new(self.clone(), Arc::new(creator))
    }

    /// Executes `statement` with the default options.
    pub async fn execute(
        &self,
        statement: impl Into<CqlStatement>,
    ) -> Result<S::Output, OperationError> {
        self.execute_operation(statement.into()).execute().await
    }

    /// Creates an operation executing the statements made by `creators` concurrently.
    pub fn batch_operation<C>(&self, creators: impl IntoIterator<Item = C>) -> BatchOperation<S>
    where
        C: StatementCreator + 'static,
    {
        let creators = creators
            .into_iter()
            .map(|creator| Arc::new(creator) as Arc<dyn StatementCreator>)
            .collect();
        BatchOperation::new(self.clone(), creators)
    }

    /// Creates an operation executing `statements` as one logged server-side batch.
    ///
    /// Fails if any of them is not an unprepared statement, or if there are none.
    pub fn execute_in_batch_operation(
        &self,
        statements: impl IntoIterator<Item = CqlStatement>,
    ) -> Result<ExecuteOperation<S>, OperationError> {
        self.batch_operation(statements).folded()
    }

    /// Creates an operation executing `statement` once per row of values, concurrently.
    ///
    /// `statement` is normally a [`PreparedStatement`]. Each row replaces the values bound to it.
    /// Results come back in the order of the rows. Folding the operation into a server-side
    /// batch only works for unprepared statements, see [`BatchOperation::folded`].
    pub fn ingest_operation(
        &self,
        statement: impl Into<CqlStatement>,
        rows: impl IntoIterator<Item = Vec<CqlValue>>,
    ) -> BatchOperation<S> {
        let statement = Arc::new(statement.into());
        self.batch_operation(rows.into_iter().map(|values| {
            let statement = Arc::clone(&statement);
            move || {
                statement.rebind(values.clone()).ok_or_else(|| {
                    StatementCreationError::msg("a batch cannot be bound to a row of values")
                })
            }
        }))
    }

    /// Creates an operation removing all data from `table`.
    pub fn truncate_operation(&self, table: &str) -> ExecuteOperation<S> {
        self.execute_operation(CqlStatement::from(format!("TRUNCATE {table}")))
    }

    pub(crate) fn operation_context(&self) -> OperationContext {
        OperationContext::new((**self.default_options.load()).clone(), self.runtime.clone())
    }

    /// Sends one statement and translates its failure.
    pub(crate) fn submit(
        &self,
        statement: CqlStatement,
    ) -> BoxFuture<'static, Result<S::Output, OperationError>> {
        let session = Arc::clone(&self.session);
        let translator = Arc::clone(&self.translator);
        let span = trace_span!(
            "cql_template.submit",
            kind = statement.kind(),
            statement = statement.contents().unwrap_or("<batch>")
        );

        async move {
            trace!("Submitting statement");
            session
                .execute_statement(statement)
                .await
                .map_err(|err| {
                    let err = translator::translate_backend(&*translator, err);
                    debug!("Statement failed: {}", err);
                    err
                })
        }
        .instrument(span)
        .boxed()
    }
}

impl<S: CqlSession<Output = QueryResult>> CqlTemplate<S> {
    /// Creates an operation counting the rows of `table`.
    pub fn count_all_operation(&self, table: &str) -> ProcessingOperation<ExecuteOperation<S>, i64> {
        self.execute_operation(CqlStatement::from(format!("SELECT COUNT(*) FROM {table}")))
            .transform(|result: QueryResult| {
                let (count,) = take_single_row::<(i64,)>(result)?;
                Ok(count)
            })
    }

    /// Counts the rows of `table`.
    pub async fn count_all(&self, table: &str) -> Result<i64, OperationError> {
        self.count_all_operation(table).execute().await
    }
}

impl CqlTemplate<Session> {
    /// Prepares `statement` on the session.
    pub async fn prepare(
        &self,
        statement: impl Into<Statement>,
    ) -> Result<PreparedStatement, OperationError> {
        self.session
            .prepare(statement)
            .await
            .map_err(|err| translator::translate_backend(&*self.translator, ExecutionError::from(err)))
    }
}
