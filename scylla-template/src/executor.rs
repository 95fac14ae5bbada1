//! Execution contexts used to dispatch completion callbacks and success transforms.
//!
//! Operations never spawn threads of their own. Callbacks run wherever the chosen
//! [`CallbackExecutor`] puts them. The default is [`InlineExecutor`]: the callback runs on
//! the task which observed the completion of the request, so a slow callback delays
//! that task. Pass a [`BlockingPoolExecutor`] (or your own executor) to move callbacks elsewhere.

use std::fmt::Debug;

use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::errors::OperationError;

/// A unit of work handed to an executor.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs callbacks on behalf of operations.
pub trait CallbackExecutor: Send + Sync + Debug {
    /// Runs `task`, now or later, on a thread of the executor's choosing.
    fn execute(&self, task: Task);
}

/// Runs every task immediately, on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl CallbackExecutor for InlineExecutor {
    fn execute(&self, task: Task) {
        task()
    }
}

/// Runs tasks on the blocking thread pool of a tokio runtime.
#[derive(Debug, Clone)]
pub struct BlockingPoolExecutor {
    runtime: Handle,
}

impl BlockingPoolExecutor {
    /// Creates an executor dispatching onto the blocking pool of the given runtime.
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }
}

impl CallbackExecutor for BlockingPoolExecutor {
    fn execute(&self, task: Task) {
        // The JoinHandle is dropped, the task keeps running detached.
        self.runtime.spawn_blocking(task);
    }
}

/// Runs `f` on `executor` and waits for its result.
pub(crate) async fn run_on<R>(
    executor: &dyn CallbackExecutor,
    f: impl FnOnce() -> R + Send + 'static,
) -> Result<R, OperationError>
where
    R: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    executor.execute(Box::new(move || {
        // The receiver is gone only if the waiting side was dropped.
        let _ = tx.send(f());
    }));
    rx.await.map_err(|_| {
        OperationError::Interrupted("executor dropped the task before running it".to_owned())
    })
}
