//! Statements submitted by template operations.

use std::fmt;

use scylla::statement::batch::Batch;
use scylla::statement::prepared::PreparedStatement;
use scylla::statement::unprepared::Statement;
use scylla::value::CqlValue;

use crate::options::StatementOptions;

pub(crate) mod batch;
mod creator;

pub use batch::fold;
pub use creator::StatementCreator;

// Statement, PreparedStatement and Batch share setter names but no trait.
macro_rules! apply_options {
    ($statement:expr, $options:expr) => {{
        let statement = $statement;
        let options = $options;
        if let Some(consistency) = options.consistency {
            statement.set_consistency(consistency);
        }
        if let Some(serial_consistency) = options.serial_consistency {
            statement.set_serial_consistency(serial_consistency);
        }
        if let Some(retry_policy) = &options.retry_policy {
            statement.set_retry_policy(Some(retry_policy.resolve()));
        }
        if let Some(tracing) = options.tracing {
            statement.set_tracing(tracing);
        }
        if let Some(is_idempotent) = options.is_idempotent {
            statement.set_is_idempotent(is_idempotent);
        }
        if let Some(timestamp) = options.timestamp {
            statement.set_timestamp(Some(timestamp));
        }
    }};
}

/// A statement together with the values bound to it, ready to be sent.
#[derive(Clone)]
pub enum CqlStatement {
    /// A regular statement, parsed by the database on each request.
    Unprepared {
        /// The statement.
        statement: Statement,
        /// Values for its bind markers.
        values: Vec<CqlValue>,
    },
    /// A statement prepared beforehand.
    Prepared {
        /// The prepared statement.
        statement: PreparedStatement,
        /// Values for its bind markers.
        values: Vec<CqlValue>,
    },
    /// A server-side batch.
    Batch {
        /// The batch.
        batch: Batch,
        /// Values for each statement of the batch, in order.
        values: Vec<Vec<CqlValue>>,
    },
}

impl CqlStatement {
    /// Creates an unprepared statement with bound values.
    pub fn with_values(statement: impl Into<Statement>, values: Vec<CqlValue>) -> Self {
        CqlStatement::Unprepared {
            statement: statement.into(),
            values,
        }
    }

    /// Binds values to a prepared statement.
    pub fn bound(statement: PreparedStatement, values: Vec<CqlValue>) -> Self {
        CqlStatement::Prepared { statement, values }
    }

    /// The same statement with `values` bound in place of its current values.
    ///
    /// `None` for batches, whose values are bound per statement.
    pub fn rebind(&self, values: Vec<CqlValue>) -> Option<CqlStatement> {
        match self {
            CqlStatement::Unprepared { statement, .. } => Some(CqlStatement::Unprepared {
                statement: statement.clone(),
                values,
            }),
            CqlStatement::Prepared { statement, .. } => Some(CqlStatement::Prepared {
                statement: statement.clone(),
                values,
            }),
            CqlStatement::Batch { .. } => None,
        }
    }

    /// Short name of the statement kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            CqlStatement::Unprepared { .. } => "unprepared",
            CqlStatement::Prepared { .. } => "prepared",
            CqlStatement::Batch { .. } => "batch",
        }
    }

    /// Returns true for statements which can be folded into a server-side batch.
    pub fn is_regular(&self) -> bool {
        matches!(self, CqlStatement::Unprepared { .. })
    }

    /// CQL text of the statement, `None` for batches.
    pub fn contents(&self) -> Option<&str> {
        match self {
            CqlStatement::Unprepared { statement, .. } => Some(&statement.contents),
            CqlStatement::Prepared { statement, .. } => Some(statement.get_statement()),
            CqlStatement::Batch { .. } => None,
        }
    }

    /// Applies the options which are set, leaving the others untouched.
    pub(crate) fn apply_options(&mut self, options: &StatementOptions) {
        match self {
            CqlStatement::Unprepared { statement, .. } => apply_options!(statement, options),
            CqlStatement::Prepared { statement, .. } => apply_options!(statement, options),
            CqlStatement::Batch { batch, .. } => apply_options!(batch, options),
        }
    }
}

// The driver's statement types are not Debug.
impl fmt::Debug for CqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("CqlStatement");
        out.field("kind", &self.kind());
        match self {
            CqlStatement::Unprepared { statement, values } => out
                .field("contents", &statement.contents)
                .field("values", values),
            CqlStatement::Prepared { statement, values } => out
                .field("contents", &statement.get_statement())
                .field("values", values),
            CqlStatement::Batch { batch, values } => out
                .field("statements", &batch.statements.len())
                .field("values", values),
        };
        out.finish()
    }
}

impl From<Statement> for CqlStatement {
    fn from(statement: Statement) -> Self {
        CqlStatement::Unprepared {
            statement,
            values: Vec::new(),
        }
    }
}

impl From<&str> for CqlStatement {
    fn from(cql: &str) -> Self {
        Statement::new(cql).into()
    }
}

impl From<String> for CqlStatement {
    fn from(cql: String) -> Self {
        Statement::new(cql).into()
    }
}

impl From<PreparedStatement> for CqlStatement {
    fn from(statement: PreparedStatement) -> Self {
        CqlStatement::Prepared {
            statement,
            values: Vec::new(),
        }
    }
}
