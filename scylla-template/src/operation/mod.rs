//! Operations: configurable, re-executable units of work created by a
//! [`CqlTemplate`](crate::client::template::CqlTemplate).
//!
//! Every operation implements [`QueryOperation`], which offers the same ways of running it:
//!
//! | method | waits | failures |
//! |--------|-------|----------|
//! | [`execute`](QueryOperation::execute) | until done | returned |
//! | [`execute_async`](QueryOperation::execute_async) | no | through the [`PendingResult`] |
//! | [`execute_with_callback`](QueryOperation::execute_with_callback) | no | to the failure handler |
//! | [`execute_nonstop`](QueryOperation::execute_nonstop) | at most the timeout | returned |
//!
//! Errors in statement creation and usage errors are always returned by the method
//! that was called, before anything is submitted.
//!
//! # Failure handler
//! The [`FailureHandler`] set in the options is called at most once per execution:
//! - when a statement of a [`BatchOperation`] fails, with the first failure, since failed
//!   statements leave a gap in the result instead of failing it,
//! - when a [transform](QueryOperation::transform) step fails,
//! - with any failure on the [`execute_with_callback`](QueryOperation::execute_with_callback) path.
//!
//! When a transform wraps a [`BatchOperation`], failed statements are reported only once the
//! transform has run: a failing transform is reported instead of them.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{self, BoxFuture, FutureExt};
use scylla::statement::{Consistency, SerialConsistency};
use tokio::runtime::Handle;
use tracing::debug;

use crate::errors::OperationError;
use crate::executor::CallbackExecutor;
use crate::future::PendingResult;
use crate::options::{FailureHandler, RetryPolicyKind, StatementOptions};
use crate::statement::CqlStatement;

mod batch;
mod execute;
mod processing;
mod rows;

pub use batch::{BatchOperation, BatchResult, SlotResult};
pub use execute::ExecuteOperation;
pub use processing::ProcessingOperation;
pub use rows::QueryResultOperation;

pub(crate) use rows::take_single_row;

/// What every operation carries: its options and the runtime it submits to.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub(crate) options: StatementOptions,
    pub(crate) runtime: Handle,
}

impl OperationContext {
    pub(crate) fn new(options: StatementOptions, runtime: Handle) -> Self {
        Self { options, runtime }
    }

    /// Options of the operation.
    pub fn options(&self) -> &StatementOptions {
        &self.options
    }

    /// Runtime the operation submits its requests to.
    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }
}

/// Calls the failure handler of an execution, at most once.
#[derive(Debug, Clone)]
pub struct FailureNotifier {
    handler: Option<FailureHandler>,
    executor: Arc<dyn CallbackExecutor>,
    fired: Arc<AtomicBool>,
    held: Option<Arc<OnceLock<OperationError>>>,
}

impl FailureNotifier {
    pub(crate) fn new(options: &StatementOptions) -> Self {
        Self {
            handler: options.failure_handler().cloned(),
            executor: options.executor(),
            fired: Arc::new(AtomicBool::new(false)),
            held: None,
        }
    }

    /// Hands `err` to the handler through the executor of the options,
    /// unless the handler was already called for this execution.
    pub fn notify(&self, err: &OperationError) {
        if let Some(held) = &self.held {
            // First failure wins.
            let _ = held.set(err.clone());
            return;
        }
        if self.fired.swap(true, Ordering::AcqRel) {
            return;
        }
        match &self.handler {
            Some(handler) => {
                let handler = handler.clone();
                let err = err.clone();
                self.executor
                    .execute(Box::new(move || handler.on_failure(&err)));
            }
            None => debug!("No failure handler registered, dropping error: {}", err),
        }
    }

    /// A notifier which keeps the first failure instead of reporting it.
    ///
    /// Used by wrapping operations, which decide what reaches the handler once their own
    /// step is done. See [`FailureNotifier::release_to`].
    pub(crate) fn hold(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            executor: Arc::clone(&self.executor),
            fired: Arc::new(AtomicBool::new(false)),
            held: Some(Arc::new(OnceLock::new())),
        }
    }

    /// Reports the failure kept by this holding notifier, if any, to `target`.
    pub(crate) fn release_to(&self, target: &FailureNotifier) {
        if let Some(err) = self.held.as_ref().and_then(|held| held.get()) {
            target.notify(err);
        }
    }
}

/// What [`QueryOperation::submit`] hands back: a result known at once, or a future producing it.
pub enum Submission<T> {
    /// Resolved without sending anything.
    Ready(Result<T, OperationError>),
    /// Resolves once the submitted requests complete.
    Pending(BoxFuture<'static, Result<T, OperationError>>),
}

impl<T: Send + 'static> Submission<T> {
    /// Converts into a future, resolving at once for [`Submission::Ready`].
    pub fn into_future(self) -> BoxFuture<'static, Result<T, OperationError>> {
        match self {
            Submission::Ready(result) => future::ready(result).boxed(),
            Submission::Pending(fut) => fut,
        }
    }

    pub(crate) fn into_pending_result(self, runtime: &Handle) -> PendingResult<T> {
        match self {
            Submission::Ready(result) => PendingResult::ready(runtime, result),
            Submission::Pending(fut) => PendingResult::spawn(runtime, fut),
        }
    }
}

impl<T> fmt::Debug for Submission<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Submission::Ready(Ok(_)) => f.write_str("Ready(Ok(..))"),
            Submission::Ready(Err(err)) => f.debug_tuple("Ready").field(err).finish(),
            Submission::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// Common interface of all operations. See the [module docs](self).
#[async_trait]
pub trait QueryOperation: Send + Sync + Sized {
    /// Result of a successful execution.
    type Output: Send + 'static;

    /// Options and runtime of the operation.
    fn context(&self) -> &OperationContext;

    /// Mutable access to the options and runtime of the operation.
    fn context_mut(&mut self) -> &mut OperationContext;

    /// Creates the statements with the options applied and submits them.
    ///
    /// Statement creation and usage checks happen here, synchronously.
    fn submit(
        &self,
        notifier: &FailureNotifier,
    ) -> Result<Submission<Self::Output>, OperationError>;

    /// Returns the single statement this operation would submit, with the options applied.
    fn to_statement(&self) -> Result<CqlStatement, OperationError>;

    /// Options of the operation.
    fn options(&self) -> &StatementOptions {
        &self.context().options
    }

    /// Replaces all options.
    fn with_options(mut self, options: StatementOptions) -> Self {
        self.context_mut().options = options;
        self
    }

    /// Sets the consistency.
    fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.context_mut().options.consistency = Some(consistency);
        self
    }

    /// Sets the serial consistency.
    fn with_serial_consistency(mut self, serial_consistency: Option<SerialConsistency>) -> Self {
        self.context_mut().options.serial_consistency = Some(serial_consistency);
        self
    }

    /// Sets the retry policy.
    fn with_retry_policy(mut self, retry_policy: RetryPolicyKind) -> Self {
        self.context_mut().options.retry_policy = Some(retry_policy);
        self
    }

    /// Enables or disables CQL tracing.
    fn with_tracing(mut self, tracing: bool) -> Self {
        self.context_mut().options.tracing = Some(tracing);
        self
    }

    /// Marks the statements as idempotent, or not.
    fn with_idempotence(mut self, is_idempotent: bool) -> Self {
        self.context_mut().options.is_idempotent = Some(is_idempotent);
        self
    }

    /// Sets the default timestamp, in microseconds.
    fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.context_mut().options.timestamp = Some(timestamp);
        self
    }

    /// Sets the executor for callbacks and transforms.
    fn with_executor(mut self, executor: Arc<dyn CallbackExecutor>) -> Self {
        self.context_mut().options.executor = Some(executor);
        self
    }

    /// Sets the failure handler.
    fn with_failure_handler(mut self, handler: FailureHandler) -> Self {
        self.context_mut().options.failure_handler = Some(handler);
        self
    }

    /// Executes the operation and waits for its result, without a time bound.
    async fn execute(&self) -> Result<Self::Output, OperationError> {
        let notifier = FailureNotifier::new(self.options());
        self.submit(&notifier)?.into_future().await
    }

    /// Submits the operation and returns a handle to its result.
    fn execute_async(&self) -> Result<PendingResult<Self::Output>, OperationError> {
        let notifier = FailureNotifier::new(self.options());
        let submission = self.submit(&notifier)?;
        Ok(submission.into_pending_result(&self.context().runtime))
    }

    /// Submits the operation and returns at once.
    ///
    /// `on_complete` receives the result, a failure goes to the failure handler. Both are
    /// dispatched through the executor of the options. Without a failure handler, failures
    /// are only logged.
    fn execute_with_callback<F>(&self, on_complete: F) -> Result<(), OperationError>
    where
        F: FnOnce(Self::Output) + Send + 'static,
    {
        let notifier = FailureNotifier::new(self.options());
        let fut = self.submit(&notifier)?.into_future();
        let executor = self.options().executor();
        self.context().runtime.spawn(async move {
            match fut.await {
                Ok(output) => executor.execute(Box::new(move || on_complete(output))),
                Err(err) => notifier.notify(&err),
            }
        });
        Ok(())
    }

    /// Executes the operation, waiting at most `timeout` for the result.
    ///
    /// On expiry [`OperationError::WaitTimeout`] is returned, but the request is **not**
    /// cancelled and may still complete.
    async fn execute_nonstop(&self, timeout: Duration) -> Result<Self::Output, OperationError> {
        self.execute_async()?.get_timeout(timeout).await
    }

    /// Chains a step processing the result of a successful execution.
    ///
    /// The processor runs on the executor of the options. If it fails, the failure handler
    /// is called before the error is returned.
    fn transform<T, F>(self, processor: F) -> ProcessingOperation<Self, T>
    where
        T: Send + 'static,
        F: Fn(Self::Output) -> Result<T, OperationError> + Send + Sync + 'static,
    {
        ProcessingOperation::new(self, processor)
    }
}
