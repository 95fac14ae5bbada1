use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use scylla::errors::DbError;
use scylla_template::errors::DataAccessError;
use scylla_template::executor::{CallbackExecutor, InlineExecutor, Task};
use scylla_template::statement::CqlStatement;
use scylla_template::{OperationError, QueryOperation};

use crate::utils::{setup_tracing, template, RecordingHandler, StubSession};

#[derive(Debug, Default)]
struct CountingExecutor {
    tasks: AtomicUsize,
}

impl CallbackExecutor for CountingExecutor {
    fn execute(&self, task: Task) {
        self.tasks.fetch_add(1, Ordering::SeqCst);
        InlineExecutor.execute(task)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("row is missing column {0}")]
struct MissingColumn(&'static str);

#[tokio::test]
async fn transform_processes_result() {
    setup_tracing();
    let session = StubSession::new();
    let template = template(&session);
    let executor = Arc::new(CountingExecutor::default());

    let length = template
        .execute_operation(CqlStatement::from("SELECT 1"))
        .with_executor(executor.clone())
        .transform(|output: String| Ok(output.len()))
        .execute()
        .await
        .unwrap();

    assert_eq!(length, 8);
    assert_eq!(executor.tasks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_transform_notifies_once_per_execution() {
    setup_tracing();
    let session = StubSession::new();
    let template = template(&session);
    let handler = RecordingHandler::default();

    let operation = template
        .execute_operation(CqlStatement::from("SELECT v FROM ks.t"))
        .with_failure_handler(handler.handler())
        .transform(|_: String| -> Result<i32, OperationError> {
            Err(OperationError::processing(MissingColumn("v")))
        });

    let err = operation.execute().await.unwrap_err();
    assert_matches!(&err, OperationError::Processing(cause) if cause.to_string() == "row is missing column v");
    assert_eq!(handler.errors().len(), 1);

    assert_matches!(
        operation.execute_async().unwrap().await,
        Err(OperationError::Processing(_))
    );
    assert_eq!(handler.errors().len(), 2);
}

#[tokio::test]
async fn backend_failure_skips_the_transform() {
    setup_tracing();
    let session = StubSession::new();
    session.fail("SELECT 1", DbError::Unauthorized, "no SELECT permission");
    let template = template(&session);
    let transformed = Arc::new(AtomicUsize::new(0));

    let err = template
        .execute_operation(CqlStatement::from("SELECT 1"))
        .transform({
            let transformed = Arc::clone(&transformed);
            move |output: String| {
                transformed.fetch_add(1, Ordering::SeqCst);
                Ok(output)
            }
        })
        .execute()
        .await
        .unwrap_err();

    assert_matches!(err, OperationError::DataAccess(DataAccessError::Unauthorized(_)));
    assert_eq!(transformed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn batch_transform_sees_all_slots() {
    setup_tracing();
    let session = StubSession::new();
    session.fail("GET 2", DbError::Overloaded, "busy");
    let template = template(&session);
    let handler = RecordingHandler::default();

    let found = template
        .batch_operation(["GET 1", "GET 2", "GET 3"].map(CqlStatement::from))
        .with_failure_handler(handler.handler())
        .transform(|result| Ok(result.into_values().into_iter().flatten().collect::<Vec<_>>()))
        .execute()
        .await
        .unwrap();

    assert_eq!(found, vec!["GET 1", "GET 3"]);
    assert_eq!(handler.errors().len(), 1);
}

#[tokio::test]
async fn failed_batch_and_failed_transform_notify_once() {
    setup_tracing();
    let session = StubSession::new();
    session.fail("GET 2", DbError::Overloaded, "busy");
    let template = template(&session);
    let handler = RecordingHandler::default();

    let err = template
        .batch_operation(["GET 1", "GET 2"].map(CqlStatement::from))
        .with_failure_handler(handler.handler())
        .transform(|result| result.into_result())
        .execute()
        .await
        .unwrap_err();

    assert_matches!(err, OperationError::DataAccess(DataAccessError::Overloaded(_)));
    let errors = handler.errors();
    assert_eq!(errors.len(), 1);
    assert_matches!(
        &errors[0],
        OperationError::DataAccess(DataAccessError::Overloaded(msg)) if msg == "busy"
    );
}

#[tokio::test]
async fn transform_keeps_options_of_wrapped_operation() {
    setup_tracing();
    let session = StubSession::new();
    let template = template(&session);

    let operation = template
        .execute_operation(CqlStatement::from("SELECT 1"))
        .transform(|output: String| Ok(output))
        .with_timestamp(7);

    assert_eq!(operation.delegate().options().timestamp(), Some(7));
    let CqlStatement::Unprepared { statement, .. } = operation.to_statement().unwrap() else {
        panic!("expected an unprepared statement");
    };
    assert_eq!(statement.get_timestamp(), Some(7));
}

#[tokio::test]
async fn failed_transform_is_reported_over_failed_statement() {
    setup_tracing();
    let session = StubSession::new();
    session.fail("GET 2", DbError::Overloaded, "busy");
    let template = template(&session);
    let handler = RecordingHandler::default();

    let operation = template
        .batch_operation(["GET 1", "GET 2"].map(CqlStatement::from))
        .with_failure_handler(handler.handler())
        .transform(|_| -> Result<usize, OperationError> {
            Err(OperationError::processing(MissingColumn("v")))
        });

    let err = operation.execute().await.unwrap_err();
    assert_matches!(&err, OperationError::Processing(cause) if cause.to_string() == "row is missing column v");
    let errors = handler.errors();
    assert_eq!(errors.len(), 1);
    assert_matches!(
        &errors[0],
        OperationError::Processing(cause) if cause.to_string() == "row is missing column v"
    );
}

#[tokio::test]
async fn nested_transforms_report_the_innermost_failure_once() {
    setup_tracing();
    let session = StubSession::new();
    session.fail("GET 2", DbError::Overloaded, "busy");
    let template = template(&session);
    let handler = RecordingHandler::default();
    let outer_calls = Arc::new(AtomicUsize::new(0));

    let err = template
        .batch_operation(["GET 1", "GET 2"].map(CqlStatement::from))
        .with_failure_handler(handler.handler())
        .transform(|_| -> Result<usize, OperationError> {
            Err(OperationError::processing(MissingColumn("k")))
        })
        .transform({
            let outer_calls = Arc::clone(&outer_calls);
            move |count| {
                outer_calls.fetch_add(1, Ordering::SeqCst);
                Ok(count)
            }
        })
        .execute()
        .await
        .unwrap_err();

    assert_matches!(err, OperationError::Processing(_));
    assert_eq!(outer_calls.load(Ordering::SeqCst), 0);
    let errors = handler.errors();
    assert_eq!(errors.len(), 1);
    assert_matches!(
        &errors[0],
        OperationError::Processing(cause) if cause.to_string() == "row is missing column k"
    );
}

#[tokio::test]
async fn empty_batch_transform_resolves_without_submitting() {
    setup_tracing();
    let session = StubSession::new();
    let template = template(&session);

    let count = template
        .batch_operation(Vec::<CqlStatement>::new())
        .transform(|result| Ok(result.len()))
        .execute_async()
        .unwrap()
        .await
        .unwrap();

    assert_eq!(count, 0);
    assert_eq!(session.submitted(), 0);
}
