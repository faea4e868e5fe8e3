#![cfg(feature = "test-utils")]
use sql_mapper::prelude::*;
use sql_mapper::test_utils::{
    ScriptedConnection, ScriptedResponse, ScriptedResultSet,
};

#[tokio::test]
async fn array_parameter_filters_by_set_membership() -> Result<(), SqlMapperError> {
    let mut conn = ScriptedConnection::new();
    // The scripted table holds three names; the responder applies the
    // membership predicate against the bound array.
    conn.enqueue(ScriptedResponse::Dynamic(Box::new(|cmd| {
        let Some(SqlValue::Array(names)) = cmd.parameter("names") else {
            return ScriptedResponse::Fail("expected an array parameter".into());
        };
        let rows = ["a", "b", "c"]
            .iter()
            .filter(|name| names.contains(&SqlValue::Text((**name).into())))
            .map(|name| vec![SqlValue::Text((*name).into())])
            .collect();
        ScriptedResponse::Rows(ScriptedResultSet::new(vec!["name"], rows))
    })));

    let mut params = Parameters::new();
    params.add("names", vec!["a", "c"]);
    let mut names: Vec<String> = conn
        .sql("SELECT name FROM people WHERE name = ANY(@names)")
        .params(&params)
        .query()
        .await?;
    names.sort();
    assert_eq!(names, vec!["a".to_string(), "c".to_string()]);
    Ok(())
}

#[tokio::test]
async fn byte_arrays_are_not_treated_as_set_parameters() -> Result<(), SqlMapperError> {
    let mut conn = ScriptedConnection::new();
    conn.enqueue(ScriptedResponse::Affected(1));
    let mut params = Parameters::new();
    params.add("payload", vec![1_u8, 2, 3]);
    conn.sql("INSERT INTO blobs(payload) VALUES(@payload)")
        .params(&params)
        .execute()
        .await?;
    assert_eq!(
        conn.executed()[0].parameter("payload"),
        Some(&SqlValue::Blob(vec![1, 2, 3]))
    );
    Ok(())
}

#[tokio::test]
async fn binding_is_total_and_preserves_enumeration_order() -> Result<(), SqlMapperError> {
    let mut conn = ScriptedConnection::new();
    conn.enqueue(ScriptedResponse::Affected(0));

    let mut params = Parameters::new();
    params
        .add("Zeta", 1_i64)
        .add("alpha", "x")
        .add_null("MiXeD")
        .add("last", 2.5_f64);
    conn.sql("UPDATE t SET a = @alpha").params(&params).execute().await?;

    let executed = conn.executed();
    let names: Vec<_> = executed[0].parameters.iter().map(|p| p.name.as_str()).collect();
    // Names bind verbatim, one driver parameter per entry, in order.
    assert_eq!(names, vec!["Zeta", "alpha", "MiXeD", "last"]);
    assert_eq!(executed[0].parameter("MiXeD"), Some(&SqlValue::Null));
    Ok(())
}

#[tokio::test]
async fn custom_value_without_handler_or_fallback_fails() {
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Opaque;

    let mut conn = ScriptedConnection::new();
    conn.enqueue(ScriptedResponse::Affected(0));
    let mut params = Parameters::new();
    params.add("opaque", ParamValue::custom(Opaque));
    let err = conn
        .sql("INSERT INTO t(o) VALUES(@opaque)")
        .params(&params)
        .execute()
        .await
        .unwrap_err();
    assert!(matches!(err, SqlMapperError::HandlerContract(_)));
}

#[tokio::test]
async fn driver_failures_carry_sql_and_parameter_context() {
    let mut conn = ScriptedConnection::new();
    conn.enqueue(ScriptedResponse::Fail("relation does not exist".into()));
    let mut params = Parameters::new();
    params.add("id", 7_i64);
    let err = conn
        .sql("SELECT * FROM missing WHERE id = @id")
        .params(&params)
        .query::<String>()
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("SELECT * FROM missing"));
    assert!(message.contains("id"));
}
