#![cfg(feature = "test-utils")]
use sql_mapper::prelude::*;
use sql_mapper::test_utils::{ScriptedConnection, ScriptedResponse, ScriptedResultSet};
use uuid::Uuid;

sql_mapper::entity! {
    #[derive(Debug, Clone)]
    pub struct Account {
        new(id: Uuid, name: String, value: Option<i64>);
    }
}

sql_mapper::entity! {
    #[derive(Debug, Clone)]
    pub struct Profile {
        new(id: Uuid, name: String);
        description: Option<String>,
        is_active: bool,
    }
}

sql_mapper::entity! {
    #[derive(Debug, Clone)]
    pub struct Counter {
        new(id: Uuid, count: i64);
    }
}

#[tokio::test]
async fn constructor_mapping_with_missing_column() -> Result<(), SqlMapperError> {
    let id = Uuid::new_v4();
    let mut conn = ScriptedConnection::new();
    conn.enqueue(ScriptedResponse::Rows(ScriptedResultSet::new(
        vec!["id", "name"],
        vec![vec![SqlValue::Uuid(id), SqlValue::Text("x".into())]],
    )));

    let account: Account = conn.sql("SELECT id, name FROM accounts").query_single().await?;
    assert_eq!(account.id, id);
    assert_eq!(account.name, "x");
    // The optional parameter has no matching column and gets its default.
    assert_eq!(account.value, None);
    Ok(())
}

#[tokio::test]
async fn hybrid_entity_sets_remaining_fields_after_construction() -> Result<(), SqlMapperError> {
    let id = Uuid::new_v4();
    let mut conn = ScriptedConnection::new();
    conn.enqueue(ScriptedResponse::Rows(ScriptedResultSet::new(
        vec!["id", "name", "description", "is_active"],
        vec![vec![
            SqlValue::Uuid(id),
            SqlValue::Text("h".into()),
            SqlValue::Text("d".into()),
            SqlValue::Bool(false),
        ]],
    )));

    let profile: Profile = conn.sql("SELECT * FROM profiles").query_single().await?;
    assert_eq!(profile.id, id);
    assert_eq!(profile.name, "h");
    assert_eq!(profile.description.as_deref(), Some("d"));
    assert!(!profile.is_active);
    Ok(())
}

#[tokio::test]
async fn null_into_required_constructor_parameter_yields_default() -> Result<(), SqlMapperError> {
    let id = Uuid::new_v4();
    let mut conn = ScriptedConnection::new();
    conn.enqueue(ScriptedResponse::Rows(ScriptedResultSet::new(
        vec!["id", "count"],
        vec![vec![SqlValue::Uuid(id), SqlValue::Null]],
    )));

    let counter: Counter = conn.sql("SELECT id, count FROM counters").query_single().await?;
    assert_eq!(counter.id, id);
    assert_eq!(counter.count, 0);
    Ok(())
}

#[tokio::test]
async fn absent_required_constructor_parameter_yields_default() -> Result<(), SqlMapperError> {
    let id = Uuid::new_v4();
    let mut conn = ScriptedConnection::new();
    conn.enqueue(ScriptedResponse::Rows(ScriptedResultSet::new(
        vec!["id"],
        vec![vec![SqlValue::Uuid(id)]],
    )));

    let counter: Counter = conn.sql("SELECT id FROM counters").query_single().await?;
    assert_eq!(counter.id, id);
    assert_eq!(counter.count, 0);
    Ok(())
}

#[test]
fn generated_constructor_defaults_trailing_fields() {
    let id = Uuid::new_v4();
    let profile = Profile::new(id, "p".to_string());
    assert_eq!(profile.id, id);
    assert_eq!(profile.description, None);
    assert!(!profile.is_active);
}
