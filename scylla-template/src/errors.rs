//! This module contains the errors returned by template operations.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use scylla::errors::ExecutionError;
use scylla::statement::Consistency;
use thiserror::Error;

/// Error returned by a template operation.
///
/// Errors caused by the caller ([`OperationError::StatementCreation`], [`OperationError::Usage`])
/// are always returned synchronously from the method that detected them.
/// Backend failures are either returned from an awaited operation or delivered through the
/// failure channel of a [`PendingResult`](crate::future::PendingResult) or callback, never both.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum OperationError {
    /// Building the statement failed, nothing was sent to the database.
    #[error("Failed to create statement: {0}")]
    StatementCreation(#[from] StatementCreationError),

    /// The backend reported a failure which was recognized and translated.
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),

    /// The backend reported a failure which has no translation. Passed through unchanged.
    #[error("Execution failed: {0}")]
    Backend(Arc<ExecutionError>),

    /// The caller gave up waiting for the result.
    ///
    /// This says nothing about the outcome of the request itself: it was not cancelled
    /// and may still complete (or fail) later.
    #[error("Gave up waiting for the result after {0:?}, the request may still complete")]
    WaitTimeout(Duration),

    /// The template was used incorrectly.
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// The task which was supposed to produce the result was aborted or panicked.
    #[error("Waiting for the result was interrupted: {0}")]
    Interrupted(String),

    /// Processing of a successful result failed.
    #[error("Failed to process the result: {0}")]
    Processing(Arc<dyn Error + Send + Sync>),
}

impl OperationError {
    /// Wraps an error raised while processing a result.
    pub fn processing(err: impl Error + Send + Sync + 'static) -> Self {
        OperationError::Processing(Arc::new(err))
    }

    /// Returns the untranslated backend error, if this is one.
    pub fn as_backend(&self) -> Option<&ExecutionError> {
        match self {
            OperationError::Backend(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true if this is a [`OperationError::WaitTimeout`].
    pub fn is_wait_timeout(&self) -> bool {
        matches!(self, OperationError::WaitTimeout(_))
    }
}

impl From<ExecutionError> for OperationError {
    fn from(err: ExecutionError) -> Self {
        OperationError::Backend(Arc::new(err))
    }
}

/// Error raised by a [`StatementCreator`](crate::statement::StatementCreator).
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct StatementCreationError(Arc<dyn Error + Send + Sync>);

impl StatementCreationError {
    /// Wraps an arbitrary error.
    pub fn new(err: impl Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(err))
    }

    /// Creates an error carrying only a message.
    pub fn msg(msg: impl Into<String>) -> Self {
        Self(Arc::new(MessageError(msg.into())))
    }
}

#[derive(Error, Debug)]
#[error("{0}")]
struct MessageError(String);

/// Programmer errors detected locally, before anything is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UsageError {
    /// Only unprepared statements can be folded into a server-side batch.
    #[error("Statement at position {position} is not a regular statement ({kind}) and cannot be added to a batch")]
    NotFoldable {
        /// Position of the offending statement in the input sequence.
        position: usize,
        /// Kind of the offending statement.
        kind: &'static str,
    },

    /// A server-side batch needs at least one statement.
    #[error("Batch must contain at least one statement")]
    EmptyBatch,

    /// The result was already taken out of this handle.
    #[error("Result has already been taken from this handle")]
    ResultAlreadyTaken,
}

/// Backend failures translated into data access terms.
///
/// Produced by an [`ExceptionTranslator`](crate::translator::ExceptionTranslator)
/// out of the driver's [`ExecutionError`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DataAccessError {
    /// Not enough replicas were alive to satisfy the requested consistency.
    #[error("Not enough replicas available for query at consistency {consistency} ({alive} alive, {required} required)")]
    InsufficientReplicasAvailable {
        /// Consistency of the request.
        consistency: Consistency,
        /// Number of replicas required.
        required: i32,
        /// Number of replicas alive.
        alive: i32,
    },

    /// Replicas did not answer a read in time.
    #[error("Read timed out at consistency {consistency} ({received} of {required} responses, data present: {data_present})")]
    ReadTimeout {
        /// Consistency of the request.
        consistency: Consistency,
        /// Number of responses received.
        received: i32,
        /// Number of responses required.
        required: i32,
        /// Whether the replica asked for data responded.
        data_present: bool,
    },

    /// Replicas did not acknowledge a write in time.
    #[error("Write of type {write_type} timed out at consistency {consistency} ({received} of {required} acknowledgements)")]
    WriteTimeout {
        /// Consistency of the request.
        consistency: Consistency,
        /// Number of acknowledgements received.
        received: i32,
        /// Number of acknowledgements required.
        required: i32,
        /// Type of the write, as reported by the coordinator.
        write_type: String,
    },

    /// The driver stopped waiting for the request after its configured request timeout.
    #[error("Request timed out on the client side after {0:?}")]
    RequestTimeout(Duration),

    /// A read, write or function failed on the replicas.
    #[error("Execution failed on the replicas: {0}")]
    ExecutionFailure(String),

    /// The statement contains a syntax error.
    #[error("Query syntax error: {0}")]
    QuerySyntax(String),

    /// The statement is syntactically correct but invalid.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The statement tried to apply an invalid configuration.
    #[error("Invalid configuration in query: {0}")]
    InvalidConfigurationInQuery(String),

    /// Keyspace creation failed because the keyspace exists.
    #[error("Keyspace {keyspace} already exists")]
    KeyspaceExists {
        /// Name of the keyspace.
        keyspace: String,
    },

    /// Table creation failed because the table exists.
    #[error("Table {keyspace}.{table} already exists")]
    TableExists {
        /// Keyspace of the table.
        keyspace: String,
        /// Name of the table.
        table: String,
    },

    /// The logged in user lacks permissions for the statement.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// TRUNCATE failed.
    #[error("Truncate failed: {0}")]
    Truncate(String),

    /// The coordinator was overloaded and rejected the request.
    #[error("Coordinator overloaded: {0}")]
    Overloaded(String),

    /// The coordinator is still bootstrapping.
    #[error("Coordinator is bootstrapping: {0}")]
    Bootstrapping(String),

    /// No connection could be used to send the request.
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    /// Server-side or protocol level error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DataAccessError {
    /// Returns true for failures which may go away when the request is retried later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataAccessError::InsufficientReplicasAvailable { .. }
                | DataAccessError::ReadTimeout { .. }
                | DataAccessError::WriteTimeout { .. }
                | DataAccessError::RequestTimeout(_)
                | DataAccessError::Overloaded(_)
                | DataAccessError::Bootstrapping(_)
                | DataAccessError::ConnectionFailure(_)
        )
    }
}

/// A query returned another number of rows than the caller asked for.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Expected {expected} row(s), got {actual}")]
pub struct IncorrectRowCount {
    /// Rows the caller asked for.
    pub expected: usize,
    /// Rows the query returned.
    pub actual: usize,
}

/// Error building a [`CqlTemplate`](crate::client::template::CqlTemplate).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TemplateBuildError {
    /// No runtime was configured and none is available in the current context.
    #[error("No tokio runtime configured and none available in the current context: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// Error parsing a [`RetryPolicyKind`](crate::options::RetryPolicyKind) from its name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown retry policy: {0}, expected one of DEFAULT, DOWNGRADING_CONSISTENCY, FALLTHROUGH")]
pub struct UnknownRetryPolicy(pub String);
