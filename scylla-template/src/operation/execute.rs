use std::sync::Arc;

use crate::client::template::CqlTemplate;
use crate::errors::OperationError;
use crate::session::CqlSession;
use crate::statement::{CqlStatement, StatementCreator};

use super::{FailureNotifier, OperationContext, QueryOperation, Submission};

/// Executes a single statement.
///
/// The statement is created anew by the [`StatementCreator`] on each execution.
pub struct ExecuteOperation<S: CqlSession> {
    template: CqlTemplate<S>,
    creator: Arc<dyn StatementCreator>,
    context: OperationContext,
}

impl<S: CqlSession> ExecuteOperation<S> {
    pub(crate) fn new(template: CqlTemplate<S>, creator: Arc<dyn StatementCreator>) -> Self {
        let context = template.operation_context();
        Self {
            template,
            creator,
            context,
        }
    }

    pub(crate) fn with_context(mut self, context: OperationContext) -> Self {
        self.context = context;
        self
    }
}

impl<S: CqlSession> QueryOperation for ExecuteOperation<S> {
    type Output = S::Output;

    fn context(&self) -> &OperationContext {
        &self.context
    }

    fn context_mut(&mut self) -> &mut OperationContext {
        &mut self.context
    }

    fn submit(
        &self,
        _notifier: &FailureNotifier,
    ) -> Result<Submission<S::Output>, OperationError> {
        let statement = self.to_statement()?;
        Ok(Submission::Pending(self.template.submit(statement)))
    }

    fn to_statement(&self) -> Result<CqlStatement, OperationError> {
        let mut statement = self.creator.create_statement()?;
        statement.apply_options(&self.context.options);
        Ok(statement)
    }
}
