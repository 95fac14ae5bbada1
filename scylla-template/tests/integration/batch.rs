use std::time::Duration;

use assert_matches::assert_matches;
use scylla::errors::DbError;
use scylla::statement::batch::BatchType;
use scylla::statement::Consistency;
use scylla::value::CqlValue;
use scylla_template::errors::{DataAccessError, UsageError};
use scylla_template::operation::SlotResult;
use scylla_template::statement::{self, CqlStatement};
use scylla_template::{OperationError, QueryOperation};

use crate::utils::{setup_tracing, template, RecordingHandler, StubSession};

fn statements(cql: &[&str]) -> Vec<CqlStatement> {
    cql.iter().map(|&cql| CqlStatement::from(cql)).collect()
}

#[tokio::test]
async fn empty_batch_submits_nothing() {
    setup_tracing();
    let session = StubSession::new();
    let template = template(&session);
    let operation = template.batch_operation(Vec::<CqlStatement>::new());

    assert!(operation.execute().await.unwrap().is_empty());
    let mut pending = operation.execute_async().unwrap();
    assert!(pending.is_finished());
    assert!((&mut pending).await.unwrap().is_empty());
    assert_eq!(session.submitted(), 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn results_follow_input_order() {
    setup_tracing();
    let session = StubSession::new();
    session.delay("SELECT 0", Duration::from_millis(30));
    session.delay("SELECT 1", Duration::from_millis(20));
    let template = template(&session);

    let result = template
        .batch_operation(statements(&["SELECT 0", "SELECT 1", "SELECT 2"]))
        .execute()
        .await
        .unwrap();

    assert_eq!(session.completions(), vec!["SELECT 2", "SELECT 1", "SELECT 0"]);
    assert!(result.is_all_ok());
    assert_eq!(
        result.into_result().unwrap(),
        vec!["SELECT 0", "SELECT 1", "SELECT 2"]
    );
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn all_statements_are_submitted_at_once() {
    setup_tracing();
    let session = StubSession::new();
    for cql in ["SELECT 0", "SELECT 1", "SELECT 2"] {
        session.delay(cql, Duration::from_millis(10));
    }
    let template = template(&session);

    let pending = template
        .batch_operation(statements(&["SELECT 0", "SELECT 1", "SELECT 2"]))
        .execute_async()
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(session.submitted(), 3);
    assert_eq!(session.completed(), 0);

    // Dropping the handle does not cancel anything.
    drop(pending);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(session.completed(), 3);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn failed_statement_leaves_a_gap() {
    setup_tracing();
    let session = StubSession::new();
    session.delay("INSERT 2", Duration::from_millis(50));
    session.fail("INSERT 3", DbError::Overloaded, "replica overloaded");
    let template = template(&session);
    let handler = RecordingHandler::default();

    let result = template
        .batch_operation(statements(&["INSERT 1", "INSERT 2", "INSERT 3"]))
        .with_failure_handler(handler.handler())
        .execute_async()
        .unwrap()
        .await
        .unwrap();

    assert_eq!(result.len(), 3);
    assert_matches!(result.get(0), Some(SlotResult::Ok(out)) if out == "INSERT 1");
    assert_matches!(result.get(1), Some(SlotResult::Ok(out)) if out == "INSERT 2");
    assert_matches!(
        result.get(2),
        Some(SlotResult::Failed(OperationError::DataAccess(DataAccessError::Overloaded(_))))
    );
    assert_eq!(result.failed_positions(), vec![2]);

    let errors = handler.errors();
    assert_eq!(errors.len(), 1);
    assert_matches!(
        &errors[0],
        OperationError::DataAccess(DataAccessError::Overloaded(msg)) if msg == "replica overloaded"
    );

    assert_eq!(
        result.into_values(),
        vec![Some("INSERT 1".to_owned()), Some("INSERT 2".to_owned()), None]
    );
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn handler_fires_once_for_many_failures() {
    setup_tracing();
    let session = StubSession::new();
    session.fail("INSERT 1", DbError::Overloaded, "first");
    session.fail("INSERT 2", DbError::IsBootstrapping, "second");
    let template = template(&session);
    let handler = RecordingHandler::default();

    let result = template
        .batch_operation(statements(&["INSERT 1", "INSERT 2"]))
        .with_failure_handler(handler.handler())
        .execute()
        .await
        .unwrap();

    assert_eq!(result.failures().count(), 2);
    assert_matches!(
        result.into_result(),
        Err(OperationError::DataAccess(DataAccessError::Overloaded(_)))
    );
    let errors = handler.errors();
    assert_eq!(errors.len(), 1);
    assert_matches!(
        &errors[0],
        OperationError::DataAccess(DataAccessError::Overloaded(msg)) if msg == "first"
    );
}

#[tokio::test]
async fn options_apply_to_every_statement() {
    setup_tracing();
    let session = StubSession::new();
    let template = template(&session);

    template
        .batch_operation(statements(&["SELECT 0", "SELECT 1"]))
        .with_consistency(Consistency::EachQuorum)
        .with_idempotence(true)
        .execute()
        .await
        .unwrap();

    let received = session.received();
    assert_eq!(received.len(), 2);
    for statement in &received {
        let CqlStatement::Unprepared { statement, .. } = statement else {
            panic!("expected an unprepared statement");
        };
        assert_eq!(statement.get_consistency(), Some(Consistency::EachQuorum));
        assert!(statement.get_is_idempotent());
    }
}

#[tokio::test]
async fn folding_submits_one_server_side_batch() {
    setup_tracing();
    let session = StubSession::new();
    let template = template(&session);

    let operation = template
        .execute_in_batch_operation(statements(&[
            "INSERT INTO ks.t (k) VALUES (1)",
            "INSERT INTO ks.t (k) VALUES (2)",
        ]))
        .unwrap()
        .with_consistency(Consistency::All);

    assert_eq!(operation.execute().await.unwrap(), "<batch of 2>");
    assert_eq!(session.submitted(), 1);
    let received = session.received();
    let CqlStatement::Batch { batch, .. } = &received[0] else {
        panic!("expected a batch");
    };
    assert_eq!(batch.get_type(), BatchType::Logged);
    assert_eq!(batch.get_consistency(), Some(Consistency::All));
}

#[tokio::test]
async fn to_statement_folds_with_chosen_type() {
    setup_tracing();
    let session = StubSession::new();
    let template = template(&session);

    let folded = template
        .batch_operation(statements(&["UPDATE 1", "UPDATE 2", "UPDATE 3"]))
        .with_batch_type(BatchType::Unlogged)
        .to_statement()
        .unwrap();

    assert_matches!(
        &folded,
        CqlStatement::Batch { batch, values }
            if batch.get_type() == BatchType::Unlogged && values.len() == 3
    );
    assert_eq!(session.submitted(), 0);
}

#[tokio::test]
async fn folding_refuses_non_regular_statements() {
    setup_tracing();
    let session = StubSession::new();
    let template = template(&session);
    let nested = statement::fold(statements(&["UPDATE 1"]), BatchType::Logged).unwrap();

    let operation = template.batch_operation(vec![CqlStatement::from("UPDATE 0"), nested]);
    assert_matches!(
        operation.to_statement(),
        Err(OperationError::Usage(UsageError::NotFoldable { position: 1, kind: "batch" }))
    );
    assert_matches!(
        template.execute_in_batch_operation(Vec::new()).err(),
        Some(OperationError::Usage(UsageError::EmptyBatch))
    );
    assert_eq!(session.submitted(), 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn ingest_binds_each_row() {
    setup_tracing();
    let session = StubSession::new();
    let template = template(&session);
    let insert = "INSERT INTO ks.t (k, v) VALUES (?, ?)";

    let result = template
        .ingest_operation(
            CqlStatement::from(insert),
            (1..=3).map(|k| vec![CqlValue::Int(k), CqlValue::Text(format!("v{k}"))]),
        )
        .with_consistency(Consistency::LocalQuorum)
        .execute()
        .await
        .unwrap();

    assert_eq!(result.len(), 3);
    assert!(result.is_all_ok());
    let mut keys = session
        .received()
        .into_iter()
        .map(|received| {
            let CqlStatement::Unprepared { statement, values } = received else {
                panic!("expected an unprepared statement");
            };
            assert_eq!(statement.contents, insert);
            assert_eq!(statement.get_consistency(), Some(Consistency::LocalQuorum));
            let [CqlValue::Int(k), CqlValue::Text(v)] = values.as_slice() else {
                panic!("unexpected values {values:?}");
            };
            assert_eq!(*v, format!("v{k}"));
            *k
        })
        .collect::<Vec<_>>();
    keys.sort_unstable();
    assert_eq!(keys, vec![1, 2, 3]);
}

#[tokio::test]
async fn ingest_folds_unprepared_rows() {
    setup_tracing();
    let session = StubSession::new();
    let template = template(&session);

    let folded = template
        .ingest_operation(
            "INSERT INTO ks.t (k) VALUES (?)",
            [vec![CqlValue::Int(1)], vec![CqlValue::Int(2)]],
        )
        .to_statement()
        .unwrap();

    assert_matches!(
        &folded,
        CqlStatement::Batch { values, .. }
            if *values == vec![vec![CqlValue::Int(1)], vec![CqlValue::Int(2)]]
    );
    assert_eq!(session.submitted(), 0);
}

#[tokio::test]
async fn ingest_refuses_a_batch_before_sending() {
    setup_tracing();
    let session = StubSession::new();
    let template = template(&session);
    let batch = statement::fold(statements(&["UPDATE 1"]), BatchType::Logged).unwrap();

    let operation = template.ingest_operation(batch, [vec![CqlValue::Int(1)], vec![]]);

    assert_matches!(
        operation.execute().await.err(),
        Some(OperationError::StatementCreation(_))
    );
    assert_eq!(session.submitted(), 0);
}
