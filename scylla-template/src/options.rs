//! `StatementOptions` is a sparse set of per-operation overrides.
//!
//! Every option is optional. Options which are not set are not applied, so the
//! statement keeps whatever the driver would otherwise use (the execution profile
//! of the statement or of the session).
//!
//! Options are an immutable value. A [`StatementOptionsBuilder`] produces a new value,
//! and operations expose by-value `with_*` methods which overwrite a single option
//! (last write wins, nothing is merged).
//!
//! ### Example
//! ```
//! # use scylla_template::options::{RetryPolicyKind, StatementOptions};
//! # use scylla::statement::Consistency;
//! let options = StatementOptions::builder()
//!     .consistency(Consistency::LocalQuorum)
//!     .retry_policy(RetryPolicyKind::Fallthrough)
//!     .tracing(true)
//!     .build();
//!
//! let relaxed = options.to_builder().consistency(Consistency::One).build();
//! assert_eq!(relaxed.consistency(), Some(Consistency::One));
//! assert_eq!(options.consistency(), Some(Consistency::LocalQuorum));
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use scylla::policies::retry::{
    DefaultRetryPolicy, DowngradingConsistencyRetryPolicy, FallthroughRetryPolicy, RetryPolicy,
};
use scylla::statement::{Consistency, SerialConsistency};

use crate::errors::{OperationError, UnknownRetryPolicy};
use crate::executor::{CallbackExecutor, InlineExecutor};

/// Retry policies which can be selected per operation.
///
/// Retries themselves are carried out by the driver, this only picks the policy.
#[derive(Clone, Debug)]
pub enum RetryPolicyKind {
    /// [`DefaultRetryPolicy`].
    Default,
    /// [`DowngradingConsistencyRetryPolicy`].
    DowngradingConsistency,
    /// [`FallthroughRetryPolicy`], never retries.
    Fallthrough,
    /// Any other policy.
    Custom(Arc<dyn RetryPolicy>),
}

impl RetryPolicyKind {
    /// Returns the driver's policy object.
    pub fn resolve(&self) -> Arc<dyn RetryPolicy> {
        match self {
            RetryPolicyKind::Default => Arc::new(DefaultRetryPolicy::new()),
            RetryPolicyKind::DowngradingConsistency => {
                Arc::new(DowngradingConsistencyRetryPolicy::new())
            }
            RetryPolicyKind::Fallthrough => Arc::new(FallthroughRetryPolicy::new()),
            RetryPolicyKind::Custom(policy) => Arc::clone(policy),
        }
    }
}

impl FromStr for RetryPolicyKind {
    type Err = UnknownRetryPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEFAULT" => Ok(RetryPolicyKind::Default),
            "DOWNGRADING_CONSISTENCY" => Ok(RetryPolicyKind::DowngradingConsistency),
            "FALLTHROUGH" => Ok(RetryPolicyKind::Fallthrough),
            _ => Err(UnknownRetryPolicy(s.to_owned())),
        }
    }
}

/// Receives failures which are not returned to the caller directly.
///
/// See [`QueryOperation`](crate::operation::QueryOperation) for when it is called.
#[derive(Clone)]
pub struct FailureHandler(Arc<dyn Fn(&OperationError) + Send + Sync>);

impl FailureHandler {
    /// Wraps a closure.
    pub fn new(handler: impl Fn(&OperationError) + Send + Sync + 'static) -> Self {
        Self(Arc::new(handler))
    }

    pub(crate) fn on_failure(&self, err: &OperationError) {
        (self.0)(err)
    }
}

impl fmt::Debug for FailureHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FailureHandler")
    }
}

/// Per-operation overrides. See the [module docs](self).
#[derive(Clone, Debug, Default)]
pub struct StatementOptions {
    pub(crate) consistency: Option<Consistency>,
    pub(crate) serial_consistency: Option<Option<SerialConsistency>>,
    pub(crate) retry_policy: Option<RetryPolicyKind>,
    pub(crate) tracing: Option<bool>,
    pub(crate) is_idempotent: Option<bool>,
    pub(crate) timestamp: Option<i64>,
    pub(crate) executor: Option<Arc<dyn CallbackExecutor>>,
    pub(crate) failure_handler: Option<FailureHandler>,
}

impl StatementOptions {
    /// Creates a builder with no option set.
    pub fn builder() -> StatementOptionsBuilder {
        StatementOptionsBuilder {
            options: StatementOptions::default(),
        }
    }

    /// Creates a builder starting from these options.
    pub fn to_builder(&self) -> StatementOptionsBuilder {
        StatementOptionsBuilder {
            options: self.clone(),
        }
    }

    /// Consistency override.
    pub fn consistency(&self) -> Option<Consistency> {
        self.consistency
    }

    /// Serial consistency override. `Some(None)` explicitly clears the serial consistency.
    pub fn serial_consistency(&self) -> Option<Option<SerialConsistency>> {
        self.serial_consistency
    }

    /// Retry policy override.
    pub fn retry_policy(&self) -> Option<&RetryPolicyKind> {
        self.retry_policy.as_ref()
    }

    /// Tracing override.
    pub fn tracing(&self) -> Option<bool> {
        self.tracing
    }

    /// Idempotence override.
    pub fn is_idempotent(&self) -> Option<bool> {
        self.is_idempotent
    }

    /// Default timestamp override, in microseconds.
    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    /// Executor for callbacks and success transforms. [`InlineExecutor`] unless overridden.
    pub fn executor(&self) -> Arc<dyn CallbackExecutor> {
        self.executor
            .clone()
            .unwrap_or_else(|| Arc::new(InlineExecutor))
    }

    /// Handler for failures not returned to the caller.
    pub fn failure_handler(&self) -> Option<&FailureHandler> {
        self.failure_handler.as_ref()
    }
}

/// `StatementOptionsBuilder` is used to create new [`StatementOptions`].
#[derive(Clone, Debug)]
pub struct StatementOptionsBuilder {
    options: StatementOptions,
}

impl StatementOptionsBuilder {
    /// Sets the consistency.
    pub fn consistency(mut self, consistency: Consistency) -> Self {
        self.options.consistency = Some(consistency);
        self
    }

    /// Sets the serial consistency. Ignored unless the statement is an LWT.
    pub fn serial_consistency(mut self, serial_consistency: Option<SerialConsistency>) -> Self {
        self.options.serial_consistency = Some(serial_consistency);
        self
    }

    /// Sets the retry policy.
    pub fn retry_policy(mut self, retry_policy: RetryPolicyKind) -> Self {
        self.options.retry_policy = Some(retry_policy);
        self
    }

    /// Enables or disables CQL tracing.
    pub fn tracing(mut self, tracing: bool) -> Self {
        self.options.tracing = Some(tracing);
        self
    }

    /// Marks statements as idempotent, or not.
    pub fn idempotent(mut self, is_idempotent: bool) -> Self {
        self.options.is_idempotent = Some(is_idempotent);
        self
    }

    /// Sets the default timestamp, in microseconds.
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.options.timestamp = Some(timestamp);
        self
    }

    /// Sets the executor for callbacks and success transforms.
    pub fn executor(mut self, executor: Arc<dyn CallbackExecutor>) -> Self {
        self.options.executor = Some(executor);
        self
    }

    /// Sets the failure handler.
    pub fn failure_handler(mut self, handler: FailureHandler) -> Self {
        self.options.failure_handler = Some(handler);
        self
    }

    /// Builds the options.
    pub fn build(self) -> StatementOptions {
        self.options
    }
}
