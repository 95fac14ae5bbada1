//! Async operation layer over the ScyllaDB/Cassandra driver.
//!
//! A [`CqlTemplate`] wraps a session and creates operations. An operation
//! builds its statement (or statements) every time it is executed, applies its
//! [options](options::StatementOptions), submits through the session and translates
//! backend failures into [`DataAccessError`](errors::DataAccessError)s.
//!
//! # Running operations
//! All operations implement [`QueryOperation`](operation::QueryOperation):
//! * [`execute`](operation::QueryOperation::execute) waits for the result,
//! * [`execute_async`](operation::QueryOperation::execute_async) returns a
//!   [`PendingResult`](future::PendingResult) at once,
//! * [`execute_with_callback`](operation::QueryOperation::execute_with_callback) hands the
//!   result to a callback,
//! * [`execute_nonstop`](operation::QueryOperation::execute_nonstop) waits at most a given time.
//!
//! Bounded waits never cancel the request, they only stop waiting for it.
//!
//! # Fan-out
//! A [`BatchOperation`](operation::BatchOperation) submits many statements at once and
//! collects their results in input order. Failed statements leave a failed slot instead of
//! failing the whole operation.
//!
//! # Example
//! ```no_run
//! # use scylla::client::session::Session;
//! # use scylla_template::CqlTemplate;
//! # use scylla_template::operation::QueryOperation;
//! # use scylla_template::statement::CqlStatement;
//! # async fn example(session: Session) -> Result<(), Box<dyn std::error::Error>> {
//! let template = CqlTemplate::builder(session).build()?;
//!
//! let results = template
//!     .batch_operation([
//!         CqlStatement::from("SELECT * FROM ks.t WHERE k = 1"),
//!         CqlStatement::from("SELECT * FROM ks.t WHERE k = 2"),
//!     ])
//!     .execute()
//!     .await?;
//! assert_eq!(results.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod errors;
pub mod executor;
pub mod future;
pub mod operation;
pub mod options;
pub mod session;
pub mod statement;
pub mod translator;

pub use client::{CqlTemplate, CqlTemplateBuilder};
pub use errors::{DataAccessError, OperationError};
pub use operation::QueryOperation;
pub use session::CqlSession;
