use std::sync::Arc;

use futures::future::{join_all, FutureExt};
use itertools::Itertools;
use scylla::statement::batch::BatchType;
use tracing::{debug, trace};

use crate::client::template::CqlTemplate;
use crate::errors::{OperationError, StatementCreationError};
use crate::future::interrupted;
use crate::session::CqlSession;
use crate::statement::{self, CqlStatement, StatementCreator};

use super::execute::ExecuteOperation;
use super::{FailureNotifier, OperationContext, QueryOperation, Submission};

/// Outcome of one statement of a [`BatchOperation`].
#[derive(Debug)]
pub enum SlotResult<T> {
    /// The statement succeeded.
    Ok(T),
    /// The statement failed.
    Failed(OperationError),
    /// The statement produced nothing, because its task was cancelled before completing.
    Absent,
}

impl<T> SlotResult<T> {
    /// Returns true if the statement succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, SlotResult::Ok(_))
    }

    /// Returns true if the statement failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, SlotResult::Failed(_))
    }

    /// The value, if the statement succeeded.
    pub fn ok(self) -> Option<T> {
        match self {
            SlotResult::Ok(value) => Some(value),
            _ => None,
        }
    }

    /// The error, if the statement failed.
    pub fn err(&self) -> Option<&OperationError> {
        match self {
            SlotResult::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Results of a [`BatchOperation`], one slot per statement, in the order the
/// statements were given (not the order in which they completed).
#[derive(Debug)]
pub struct BatchResult<T> {
    slots: Vec<SlotResult<T>>,
}

impl<T> BatchResult<T> {
    /// Number of slots, equal to the number of statements.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the batch had no statements.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot of the statement at `position`.
    pub fn get(&self, position: usize) -> Option<&SlotResult<T>> {
        self.slots.get(position)
    }

    /// Iterates over the slots, in order.
    pub fn iter(&self) -> std::slice::Iter<'_, SlotResult<T>> {
        self.slots.iter()
    }

    /// Returns true if every statement succeeded.
    pub fn is_all_ok(&self) -> bool {
        self.slots.iter().all(SlotResult::is_ok)
    }

    /// The failure of the first failed statement.
    pub fn first_failure(&self) -> Option<&OperationError> {
        self.slots.iter().find_map(SlotResult::err)
    }

    /// Positions and errors of all failed statements.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &OperationError)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(position, slot)| slot.err().map(|err| (position, err)))
    }

    /// Positions of the failed statements.
    pub fn failed_positions(&self) -> Vec<usize> {
        self.slots.iter().positions(SlotResult::is_failed).collect()
    }

    /// The values, with `None` wherever a statement produced none.
    pub fn into_values(self) -> Vec<Option<T>> {
        self.slots.into_iter().map(SlotResult::ok).collect()
    }

    /// All values, or the first failure.
    pub fn into_result(self) -> Result<Vec<T>, OperationError> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(position, slot)| match slot {
                SlotResult::Ok(value) => Ok(value),
                SlotResult::Failed(err) => Err(err),
                SlotResult::Absent => Err(OperationError::Interrupted(format!(
                    "statement at position {position} produced no result"
                ))),
            })
            .collect()
    }
}

impl<T> IntoIterator for BatchResult<T> {
    type Item = SlotResult<T>;
    type IntoIter = std::vec::IntoIter<SlotResult<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.into_iter()
    }
}

/// Executes many statements concurrently.
///
/// All statements are submitted at once, without waiting for one another, and the
/// execution completes when all of them have completed. A failed statement does not fail
/// the execution: its slot in the [`BatchResult`] holds the error, and the failure handler
/// of the options is called once with the first failure. Use [`BatchResult::into_result`]
/// for all-or-nothing semantics.
///
/// With no statements, an empty result is produced and nothing is submitted.
///
/// Statements can instead be folded into one server-side batch with
/// [`to_statement`](QueryOperation::to_statement) or [`folded`](BatchOperation::folded),
/// provided they are all unprepared statements.
pub struct BatchOperation<S: CqlSession> {
    template: CqlTemplate<S>,
    creators: Vec<Arc<dyn StatementCreator>>,
    batch_type: BatchType,
    context: OperationContext,
}

impl<S: CqlSession> BatchOperation<S> {
    pub(crate) fn new(template: CqlTemplate<S>, creators: Vec<Arc<dyn StatementCreator>>) -> Self {
        let context = template.operation_context();
        Self {
            template,
            creators,
            batch_type: BatchType::Logged,
            context,
        }
    }

    /// Sets the type of the server-side batch built when folding. Logged by default.
    pub fn with_batch_type(mut self, batch_type: BatchType) -> Self {
        self.batch_type = batch_type;
        self
    }

    /// Number of statements.
    pub fn len(&self) -> usize {
        self.creators.len()
    }

    /// Returns true if there are no statements.
    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
    }

    /// Folds the statements into one server-side batch and returns the operation executing it.
    ///
    /// The statements are created once, now, and the options of this operation carry over.
    pub fn folded(self) -> Result<ExecuteOperation<S>, OperationError> {
        let batch = self.to_statement()?;
        Ok(ExecuteOperation::new(self.template, Arc::new(batch)).with_context(self.context))
    }

    fn create_statements(&self) -> Result<Vec<CqlStatement>, StatementCreationError> {
        self.creators
            .iter()
            .map(|creator| {
                let mut statement = creator.create_statement()?;
                statement.apply_options(&self.context.options);
                Ok(statement)
            })
            .collect()
    }
}

impl<S: CqlSession> QueryOperation for BatchOperation<S> {
    type Output = BatchResult<S::Output>;

    fn context(&self) -> &OperationContext {
        &self.context
    }

    fn context_mut(&mut self) -> &mut OperationContext {
        &mut self.context
    }

    fn submit(
        &self,
        notifier: &FailureNotifier,
    ) -> Result<Submission<Self::Output>, OperationError> {
        let statements = self.create_statements()?;
        if statements.is_empty() {
            trace!("Batch has no statements, nothing to submit");
            return Ok(Submission::Ready(Ok(BatchResult { slots: Vec::new() })));
        }

        trace!("Submitting {} statements", statements.len());
        let handles = statements
            .into_iter()
            .map(|statement| self.context.runtime.spawn(self.template.submit(statement)))
            .collect::<Vec<_>>();

        let notifier = notifier.clone();
        Ok(Submission::Pending(
            async move {
                let slots = join_all(handles)
                    .await
                    .into_iter()
                    .map(|joined| match joined {
                        Ok(Ok(output)) => SlotResult::Ok(output),
                        Ok(Err(err)) => SlotResult::Failed(err),
                        Err(join_err) if join_err.is_cancelled() => SlotResult::Absent,
                        Err(join_err) => SlotResult::Failed(interrupted(join_err)),
                    })
                    .collect();
                let result = BatchResult { slots };

                if let Some(err) = result.first_failure() {
                    debug!(
                        "{} of {} statements failed, first failure: {}",
                        result.failures().count(),
                        result.len(),
                        err
                    );
                    notifier.notify(err);
                }
                Ok(result)
            }
            .boxed(),
        ))
    }

    fn to_statement(&self) -> Result<CqlStatement, OperationError> {
        let statements = self.create_statements()?;
        let mut batch = statement::fold(statements, self.batch_type)?;
        batch.apply_options(&self.context.options);
        Ok(batch)
    }
}
