//! [`PendingResult`] is the handle to the result of a submitted operation.
//!
//! A `PendingResult` is created when an operation is submitted. The request itself runs
//! as a task on the template's runtime, so it makes progress whether or not the handle
//! is polled. The result can be consumed in one of these ways:
//! - awaiting the handle, which waits without a bound,
//! - [`PendingResult::get_timeout`], which waits at most the given time,
//! - [`PendingResult::on_complete`], which registers callbacks and returns at once,
//! - [`PendingResult::wait`] and [`PendingResult::wait_timeout`] from synchronous code.
//!
//! Errors surfacing through any of these are already translated.
//!
//! # Timeouts do not cancel
//! When a bounded wait expires, the caller gets [`OperationError::WaitTimeout`] and the request
//! keeps running. Nothing is sent to the database to abandon it, and the same handle can be
//! awaited again to observe its eventual outcome. Dropping the handle does not cancel the
//! request either.

use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};
use tracing::trace;

use crate::errors::{OperationError, UsageError};
use crate::executor::CallbackExecutor;

/// The result of an operation which may not be known yet.
///
/// See the [module docs](self).
pub struct PendingResult<T> {
    state: State<T>,
    runtime: Handle,
}

enum State<T> {
    Ready(Result<T, OperationError>),
    InFlight(JoinHandle<Result<T, OperationError>>),
    Consumed,
}

// The value is moved out of the state and never pinned.
impl<T> Unpin for PendingResult<T> {}

impl<T: Send + 'static> PendingResult<T> {
    /// Spawns `fut` on `runtime` and returns the handle to its result.
    pub(crate) fn spawn<F>(runtime: &Handle, fut: F) -> Self
    where
        F: Future<Output = Result<T, OperationError>> + Send + 'static,
    {
        Self {
            state: State::InFlight(runtime.spawn(fut)),
            runtime: runtime.clone(),
        }
    }

    /// A handle resolved from the start.
    pub(crate) fn ready(runtime: &Handle, result: Result<T, OperationError>) -> Self {
        Self {
            state: State::Ready(result),
            runtime: runtime.clone(),
        }
    }

    /// Returns true once the result is known.
    pub fn is_finished(&self) -> bool {
        match &self.state {
            State::Ready(_) | State::Consumed => true,
            State::InFlight(handle) => handle.is_finished(),
        }
    }

    /// Waits at most `timeout` for the result.
    ///
    /// On expiry [`OperationError::WaitTimeout`] is returned. The request is **not** cancelled,
    /// the handle stays valid and can be waited on again.
    pub async fn get_timeout(&mut self, timeout: Duration) -> Result<T, OperationError> {
        match tokio::time::timeout(timeout, &mut *self).await {
            Ok(result) => result,
            Err(_elapsed) => {
                trace!("Gave up waiting for a result after {:?}", timeout);
                Err(OperationError::WaitTimeout(timeout))
            }
        }
    }

    /// Hands the outcome to `on_success` or `on_failure`, dispatched through `executor`.
    ///
    /// Returns immediately. Exactly one of the callbacks is called, once.
    pub fn on_complete<S, F>(self, executor: Arc<dyn CallbackExecutor>, on_success: S, on_failure: F)
    where
        S: FnOnce(T) + Send + 'static,
        F: FnOnce(OperationError) + Send + 'static,
    {
        let runtime = self.runtime.clone();
        runtime.spawn(async move {
            let result = self.await;
            executor.execute(Box::new(move || match result {
                Ok(value) => on_success(value),
                Err(err) => on_failure(err),
            }));
        });
    }

    /// Blocks the current thread until the result is known.
    ///
    /// Must not be called from asynchronous code: blocking a runtime thread may prevent
    /// the request from ever completing.
    pub fn wait(self) -> Result<T, OperationError> {
        futures::executor::block_on(self)
    }

    /// Blocks the current thread for at most `timeout`.
    ///
    /// Behaves like [`get_timeout`](Self::get_timeout): on expiry the request keeps running
    /// and the handle can be waited on again. The timer is driven by the template's runtime,
    /// which therefore has to run on threads of its own (a multi-threaded runtime).
    /// Must not be called from asynchronous code.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Result<T, OperationError> {
        let runtime = self.runtime.clone();
        let _guard = runtime.enter();
        futures::executor::block_on(self.get_timeout(timeout))
    }
}

impl<T: Send + 'static> Future for PendingResult<T> {
    type Output = Result<T, OperationError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match mem::replace(&mut this.state, State::Consumed) {
            State::Ready(result) => Poll::Ready(result),
            State::Consumed => Poll::Ready(Err(UsageError::ResultAlreadyTaken.into())),
            State::InFlight(mut handle) => match Pin::new(&mut handle).poll(cx) {
                Poll::Ready(joined) => Poll::Ready(joined.unwrap_or_else(|err| Err(interrupted(err)))),
                Poll::Pending => {
                    this.state = State::InFlight(handle);
                    Poll::Pending
                }
            },
        }
    }
}

impl<T> fmt::Debug for PendingResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Ready(_) => "Ready",
            State::InFlight(_) => "InFlight",
            State::Consumed => "Consumed",
        };
        f.debug_struct("PendingResult")
            .field("state", &state)
            .finish()
    }
}

pub(crate) fn interrupted(err: JoinError) -> OperationError {
    if err.is_cancelled() {
        OperationError::Interrupted("the task was cancelled".to_owned())
    } else {
        OperationError::Interrupted(format!("the task panicked: {err}"))
    }
}
