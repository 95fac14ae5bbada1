use std::sync::Arc;

use futures::future::FutureExt;

use crate::errors::OperationError;
use crate::executor::run_on;
use crate::statement::CqlStatement;

use super::{FailureNotifier, OperationContext, QueryOperation, Submission};

type Processor<I, T> = dyn Fn(I) -> Result<T, OperationError> + Send + Sync;

/// An operation whose result is processed further after a successful execution.
///
/// Created by [`QueryOperation::transform`]. Options are shared with the wrapped operation.
///
/// A failure the wrapped operation reports to the failure handler is held back until the
/// processor has run. If the processor fails, the handler gets the processor's error
/// instead, so the handler always sees the error the caller gets.
pub struct ProcessingOperation<O: QueryOperation, T> {
    delegate: O,
    processor: Arc<Processor<O::Output, T>>,
}

impl<O: QueryOperation, T: Send + 'static> ProcessingOperation<O, T> {
    pub(crate) fn new<F>(delegate: O, processor: F) -> Self
    where
        F: Fn(O::Output) -> Result<T, OperationError> + Send + Sync + 'static,
    {
        Self {
            delegate,
            processor: Arc::new(processor),
        }
    }

    /// The wrapped operation.
    pub fn delegate(&self) -> &O {
        &self.delegate
    }
}

impl<O: QueryOperation, T: Send + 'static> QueryOperation for ProcessingOperation<O, T> {
    type Output = T;

    fn context(&self) -> &OperationContext {
        self.delegate.context()
    }

    fn context_mut(&mut self) -> &mut OperationContext {
        self.delegate.context_mut()
    }

    fn submit(&self, notifier: &FailureNotifier) -> Result<Submission<T>, OperationError> {
        let held = notifier.hold();
        let delegate = self.delegate.submit(&held)?.into_future();
        let processor = Arc::clone(&self.processor);
        let executor = self.options().executor();
        let notifier = notifier.clone();

        Ok(Submission::Pending(
            async move {
                let output = match delegate.await {
                    Ok(output) => output,
                    Err(err) => {
                        held.release_to(&notifier);
                        return Err(err);
                    }
                };
                let processed = run_on(&*executor, move || processor(output))
                    .await
                    .and_then(|result| result);
                match &processed {
                    Err(err) => notifier.notify(err),
                    Ok(_) => held.release_to(&notifier),
                }
                processed
            }
            .boxed(),
        ))
    }

    fn to_statement(&self) -> Result<CqlStatement, OperationError> {
        self.delegate.to_statement()
    }
}
