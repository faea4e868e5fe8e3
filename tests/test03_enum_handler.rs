#![cfg(feature = "test-utils")]
use sql_mapper::prelude::*;
use sql_mapper::test_utils::{ScriptedConnection, ScriptedResponse, ScriptedResultSet};

sql_mapper::sql_enum! {
    pub enum Status as "status_kind" {
        Active = "active",
        Inactive = "inactive",
    }
}

// Never registered with the global registry in this binary.
sql_mapper::sql_enum! {
    pub enum Color { Red, Green, Blue }
}

sql_mapper::entity! {
    #[derive(Debug, Clone)]
    pub struct Job {
        name: String,
        status: Status,
    }
}

sql_mapper::entity! {
    #[derive(Debug, Clone)]
    pub struct Shirt {
        label: String,
        color: Color,
    }
}

sql_mapper::entity! {
    #[derive(Debug, Clone)]
    pub struct MaybeJob {
        name: String,
        status: Option<Status>,
    }
}

#[tokio::test]
async fn handler_round_trips_enum_database_names() -> Result<(), SqlMapperError> {
    HandlerRegistry::global().register_enum::<Status>()?;

    let mut conn = ScriptedConnection::new();
    conn.enqueue(ScriptedResponse::Affected(1));
    conn.enqueue(ScriptedResponse::Rows(ScriptedResultSet::new(
        vec!["name", "status"],
        vec![vec![
            SqlValue::Text("job-1".into()),
            SqlValue::Text("active".into()),
        ]],
    )));

    let mut params = Parameters::new();
    params.add("name", "job-1").add("status", Status::Active);
    let affected = conn
        .sql("INSERT INTO jobs(name, status) VALUES(@name, @status)")
        .params(&params)
        .execute()
        .await?;
    assert_eq!(affected, 1);

    // The handler wrote the database name and the declared type hint.
    let executed = conn.executed();
    assert_eq!(
        executed[0].parameter("status"),
        Some(&SqlValue::Text("active".into()))
    );
    let hint = executed[0]
        .parameters
        .iter()
        .find(|p| p.name == "status")
        .and_then(|p| p.type_hint.clone());
    assert_eq!(hint, Some(DbTypeHint::Named("status_kind".into())));

    let job: Job = conn.sql("SELECT name, status FROM jobs").query_single().await?;
    assert_eq!(job.status, Status::Active);
    Ok(())
}

#[tokio::test]
async fn null_enum_parameter_round_trips_to_none() -> Result<(), SqlMapperError> {
    HandlerRegistry::global().register_enum::<Status>()?;

    let mut conn = ScriptedConnection::new();
    conn.enqueue(ScriptedResponse::Affected(1));
    conn.enqueue(ScriptedResponse::Rows(ScriptedResultSet::new(
        vec!["name", "status"],
        vec![vec![SqlValue::Text("job-2".into()), SqlValue::Null]],
    )));

    let mut params = Parameters::new();
    params.add("status", Option::<Status>::None);
    conn.sql("INSERT INTO jobs(status) VALUES(@status)")
        .params(&params)
        .execute()
        .await?;
    assert_eq!(conn.executed()[0].parameter("status"), Some(&SqlValue::Null));

    let job: MaybeJob = conn.sql("SELECT name, status FROM jobs").query_single().await?;
    assert_eq!(job.status, None);
    Ok(())
}

#[tokio::test]
async fn scalar_enum_reads_use_the_handler_first_path() -> Result<(), SqlMapperError> {
    HandlerRegistry::global().register_enum::<Status>()?;

    let mut conn = ScriptedConnection::new();
    conn.enqueue(ScriptedResponse::Rows(ScriptedResultSet::new(
        vec!["status"],
        vec![vec![SqlValue::Text("inactive".into())]],
    )));
    let status: Status = conn.sql("SELECT status FROM jobs").query_single().await?;
    assert_eq!(status, Status::Inactive);

    conn.enqueue(ScriptedResponse::Scalar(Some(SqlValue::Text(
        "active".into(),
    ))));
    let status: Option<Status> = conn.sql("SELECT status FROM jobs").execute_scalar().await?;
    assert_eq!(status, Some(Status::Active));
    Ok(())
}

#[tokio::test]
async fn unhandled_enum_decodes_by_identifier_or_position() -> Result<(), SqlMapperError> {
    let mut conn = ScriptedConnection::new();
    conn.enqueue(ScriptedResponse::Rows(ScriptedResultSet::new(
        vec!["color"],
        vec![vec![SqlValue::Text("GREEN".into())]],
    )));
    let color: Color = conn.sql("SELECT color FROM t").query_single().await?;
    assert_eq!(color, Color::Green);

    conn.enqueue(ScriptedResponse::Rows(ScriptedResultSet::new(
        vec!["color"],
        vec![vec![SqlValue::Int(2)]],
    )));
    let color: Color = conn.sql("SELECT color FROM t").query_single().await?;
    assert_eq!(color, Color::Blue);
    Ok(())
}

#[tokio::test]
async fn entity_fields_with_unhandled_enums_decode_through_the_plan() -> Result<(), SqlMapperError> {
    let mut conn = ScriptedConnection::new();
    conn.enqueue(ScriptedResponse::Rows(ScriptedResultSet::new(
        vec!["label", "color"],
        vec![
            vec![SqlValue::Text("summer".into()), SqlValue::Text("red".into())],
            vec![SqlValue::Text("winter".into()), SqlValue::Int(1)],
        ],
    )));

    let shirts: Vec<Shirt> = conn.sql("SELECT label, color FROM shirts").query().await?;
    assert_eq!(shirts.len(), 2);
    assert_eq!(shirts[0].color, Color::Red);
    assert_eq!(shirts[1].color, Color::Green);

    // A non-enum representation from the column is a driver error.
    conn.enqueue(ScriptedResponse::Rows(ScriptedResultSet::new(
        vec!["label", "color"],
        vec![vec![SqlValue::Text("spring".into()), SqlValue::Float(1.0)]],
    )));
    let err = conn
        .sql("SELECT label, color FROM shirts")
        .query::<Shirt>()
        .await
        .unwrap_err();
    assert!(matches!(err, SqlMapperError::Driver(_)));
    Ok(())
}

#[tokio::test]
async fn unhandled_enum_binds_as_variant_position() -> Result<(), SqlMapperError> {
    let mut conn = ScriptedConnection::new();
    conn.enqueue(ScriptedResponse::Affected(1));
    let mut params = Parameters::new();
    params.add("color", Color::Blue);
    conn.sql("INSERT INTO t(color) VALUES(@color)")
        .params(&params)
        .execute()
        .await?;
    assert_eq!(conn.executed()[0].parameter("color"), Some(&SqlValue::Int(2)));
    Ok(())
}

#[test]
fn enum_without_database_names_cannot_build_a_name_handler() {
    let err = EnumNameHandler::<Color>::new().unwrap_err();
    assert!(matches!(err, SqlMapperError::InvalidEntity { .. }));
}

#[test]
fn unknown_database_name_is_a_handler_contract_error() {
    let handler = EnumNameHandler::<Status>::new().unwrap();
    let err = handler.parse(SqlValue::Text("paused".into())).unwrap_err();
    assert!(matches!(err, SqlMapperError::HandlerContract(_)));
}
