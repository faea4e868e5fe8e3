#![cfg(feature = "test-utils")]
use sql_mapper::prelude::*;
use sql_mapper::test_utils::{ScriptedConnection, ScriptedResponse, ScriptedResultSet};

#[tokio::test]
async fn cancellation_before_execution_aborts_the_command() {
    let mut conn = ScriptedConnection::new();
    conn.enqueue(ScriptedResponse::Affected(1));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = conn
        .sql("DELETE FROM t")
        .cancellation(cancel)
        .execute()
        .await
        .unwrap_err();
    assert!(matches!(err, SqlMapperError::Cancelled));
    // The command never reached the driver.
    assert!(conn.executed().is_empty());
}

#[tokio::test]
async fn cancellation_between_rows_propagates() {
    let mut conn = ScriptedConnection::new();
    let cancel = CancellationToken::new();
    let trip = cancel.clone();
    // The driver starts returning rows, then the token trips before the
    // first row is consumed.
    conn.enqueue(ScriptedResponse::Dynamic(Box::new(move |_| {
        trip.cancel();
        ScriptedResponse::Rows(ScriptedResultSet::new(
            vec!["name"],
            vec![
                vec![SqlValue::Text("a".into())],
                vec![SqlValue::Text("b".into())],
            ],
        ))
    })));

    let err = conn
        .sql("SELECT name FROM t")
        .cancellation(cancel)
        .query::<String>()
        .await
        .unwrap_err();
    assert!(matches!(err, SqlMapperError::Cancelled));
}

#[tokio::test]
async fn grid_reads_observe_cancellation() {
    let mut conn = ScriptedConnection::new();
    conn.enqueue(ScriptedResponse::MultiRows(vec![ScriptedResultSet::new(
        vec!["n"],
        vec![vec![SqlValue::Int(1)]],
    )]));

    let cancel = CancellationToken::new();
    let mut grid = conn
        .sql("SELECT 1")
        .cancellation(cancel.clone())
        .query_multiple()
        .await
        .unwrap();
    cancel.cancel();
    let err = grid.read::<i64>().await.unwrap_err();
    assert!(matches!(err, SqlMapperError::Cancelled));
}
