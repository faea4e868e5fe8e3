#![cfg(feature = "test-utils")]
use sql_mapper::prelude::*;
use sql_mapper::test_utils::{ScriptedConnection, ScriptedResponse, ScriptedResultSet};

sql_mapper::entity! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Widget {
        name: String,
        weight: i64,
    }
}

fn multi() -> ScriptedResponse {
    ScriptedResponse::MultiRows(vec![
        ScriptedResultSet::new(
            vec!["name", "weight"],
            vec![
                vec![SqlValue::Text("bolt".into()), SqlValue::Int(3)],
                vec![SqlValue::Text("nut".into()), SqlValue::Int(1)],
            ],
        ),
        ScriptedResultSet::new(vec!["count"], vec![vec![SqlValue::Int(2)]]),
        ScriptedResultSet::new(
            vec!["name", "weight"],
            vec![vec![SqlValue::Text("washer".into()), SqlValue::Int(1)]],
        ),
    ])
}

#[tokio::test]
async fn result_sets_are_consumed_in_order() -> Result<(), SqlMapperError> {
    let mut conn = ScriptedConnection::new();
    conn.enqueue(multi());

    let mut grid = conn
        .sql("SELECT * FROM widgets; SELECT count(*) FROM widgets; SELECT * FROM spares")
        .query_multiple()
        .await?;

    let widgets: Vec<Widget> = grid.read().await?;
    assert_eq!(widgets.len(), 2);
    assert_eq!(widgets[0].name, "bolt");

    let count: i64 = grid.read_single().await?;
    assert_eq!(count, 2);

    let spares: Vec<Widget> = grid.read().await?;
    assert_eq!(spares, vec![Widget { name: "washer".into(), weight: 1 }]);

    // The grid is exhausted; a further read has no result set to decode.
    assert!(grid.read::<Widget>().await.is_err());
    Ok(())
}

#[tokio::test]
async fn read_single_enforces_cardinality_per_result_set() -> Result<(), SqlMapperError> {
    let mut conn = ScriptedConnection::new();
    conn.enqueue(ScriptedResponse::MultiRows(vec![
        ScriptedResultSet::new(vec!["n"], vec![]),
        ScriptedResultSet::new(vec!["n"], vec![vec![SqlValue::Int(1)], vec![SqlValue::Int(2)]]),
    ]));

    let mut grid = conn.sql("SELECT ...").query_multiple().await?;
    let err = grid.read_single::<i64>().await.unwrap_err();
    assert!(matches!(err, SqlMapperError::SequenceEmpty("i64")));

    let err = grid.read_single::<i64>().await.unwrap_err();
    assert!(matches!(err, SqlMapperError::SequenceMultiple("i64")));
    Ok(())
}

#[tokio::test]
async fn grid_exposes_its_sql() -> Result<(), SqlMapperError> {
    let mut conn = ScriptedConnection::new();
    conn.enqueue(multi());
    let grid = conn.sql("SELECT 1; SELECT 2").query_multiple().await?;
    assert_eq!(grid.sql(), "SELECT 1; SELECT 2");
    Ok(())
}
