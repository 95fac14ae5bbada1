//! Translation of driver errors into [`DataAccessError`]s.

use std::fmt::Debug;
use std::sync::Arc;

use scylla::errors::{DbError, ExecutionError, RequestAttemptError};

use crate::errors::{DataAccessError, OperationError};

/// Rewrites errors of the driver into the data access taxonomy.
///
/// Implementations recognize a family of [`ExecutionError`]s. Errors outside of that
/// family are left alone and surface as [`OperationError::Backend`].
pub trait ExceptionTranslator: Send + Sync + Debug {
    /// Returns the translation of `err`, or `None` if it is not recognized.
    fn translate_if_possible(&self, err: &ExecutionError) -> Option<DataAccessError>;
}

/// Translates an operation error.
///
/// Only untranslated backend errors are looked at, so translating twice gives
/// the same result as translating once.
pub(crate) fn translate(translator: &dyn ExceptionTranslator, err: OperationError) -> OperationError {
    match err {
        OperationError::Backend(backend) => match translator.translate_if_possible(&backend) {
            Some(translated) => OperationError::DataAccess(translated),
            None => OperationError::Backend(backend),
        },
        other => other,
    }
}

/// Translates an error freshly returned by the backend.
pub(crate) fn translate_backend(
    translator: &dyn ExceptionTranslator,
    err: ExecutionError,
) -> OperationError {
    translator
        .translate_if_possible(&err)
        .map(OperationError::DataAccess)
        .unwrap_or_else(|| OperationError::Backend(Arc::new(err)))
}

/// Translator recognizing database errors, client-side request timeouts
/// and connection failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExceptionTranslator;

impl DefaultExceptionTranslator {
    /// Creates a new instance of [DefaultExceptionTranslator].
    pub fn new() -> Self {
        DefaultExceptionTranslator
    }

    fn translate_db_error(db_error: &DbError, msg: &str) -> Option<DataAccessError> {
        let translated = match db_error {
            DbError::Unavailable {
                consistency,
                required,
                alive,
            } => DataAccessError::InsufficientReplicasAvailable {
                consistency: *consistency,
                required: *required,
                alive: *alive,
            },
            DbError::ReadTimeout {
                consistency,
                received,
                required,
                data_present,
            } => DataAccessError::ReadTimeout {
                consistency: *consistency,
                received: *received,
                required: *required,
                data_present: *data_present,
            },
            DbError::WriteTimeout {
                consistency,
                received,
                required,
                write_type,
            } => DataAccessError::WriteTimeout {
                consistency: *consistency,
                received: *received,
                required: *required,
                write_type: write_type.to_string(),
            },
            DbError::ReadFailure { .. }
            | DbError::WriteFailure { .. }
            | DbError::FunctionFailure { .. } => {
                DataAccessError::ExecutionFailure(format!("{db_error}: {msg}"))
            }
            DbError::SyntaxError => DataAccessError::QuerySyntax(msg.to_owned()),
            DbError::Invalid => DataAccessError::InvalidQuery(msg.to_owned()),
            DbError::ConfigError => DataAccessError::InvalidConfigurationInQuery(msg.to_owned()),
            DbError::AlreadyExists { keyspace, table } if table.is_empty() => {
                DataAccessError::KeyspaceExists {
                    keyspace: keyspace.clone(),
                }
            }
            DbError::AlreadyExists { keyspace, table } => DataAccessError::TableExists {
                keyspace: keyspace.clone(),
                table: table.clone(),
            },
            DbError::Unauthorized => DataAccessError::Unauthorized(msg.to_owned()),
            DbError::AuthenticationError => DataAccessError::Authentication(msg.to_owned()),
            DbError::TruncateError => DataAccessError::Truncate(msg.to_owned()),
            DbError::Overloaded => DataAccessError::Overloaded(msg.to_owned()),
            DbError::IsBootstrapping => DataAccessError::Bootstrapping(msg.to_owned()),
            DbError::ServerError | DbError::ProtocolError => {
                DataAccessError::Internal(format!("{db_error}: {msg}"))
            }
            _ => return None,
        };
        Some(translated)
    }
}

impl ExceptionTranslator for DefaultExceptionTranslator {
    fn translate_if_possible(&self, err: &ExecutionError) -> Option<DataAccessError> {
        match err {
            ExecutionError::LastAttemptError(RequestAttemptError::DbError(db_error, msg)) => {
                Self::translate_db_error(db_error, msg)
            }
            ExecutionError::LastAttemptError(
                attempt_err @ RequestAttemptError::BrokenConnectionError(_),
            ) => Some(DataAccessError::ConnectionFailure(attempt_err.to_string())),
            ExecutionError::RequestTimeout(timeout) => {
                Some(DataAccessError::RequestTimeout(*timeout))
            }
            ExecutionError::EmptyPlan | ExecutionError::ConnectionPoolError(_) => {
                Some(DataAccessError::ConnectionFailure(err.to_string()))
            }
            _ => None,
        }
    }
}
