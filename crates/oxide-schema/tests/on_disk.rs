//! A rebuilt SQLite table survives a reconnect.

use oxide_schema::prelude::*;
use tempfile::TempDir;

fn database_url(dir: &TempDir) -> String {
    format!("sqlite:{}?mode=rwc", dir.path().join("app.sqlite3").display())
}

#[tokio::test]
async fn test_rebuild_is_persisted() {
    let dir = TempDir::new().unwrap();
    let url = database_url(&dir);

    let connection = DatabaseConnection::connect(&url).await.unwrap();
    let mut schema = SchemaBuilder::new(connection);
    schema
        .with_new_table("users", |table| {
            table.increments("id");
            table.string("email").unique();
            table.integer("votes").default(0);
            Ok(())
        })
        .await
        .unwrap();
    schema
        .connection_mut()
        .execute("INSERT INTO users (email, votes) VALUES ('a@foo.com', 3), ('b@foo.com', 5)")
        .await
        .unwrap();
    schema
        .with_table("users", |table| {
            table.big_integer("score").nullable().renamed_from("votes").change();
            Ok(())
        })
        .await
        .unwrap();
    schema.into_inner().close().await.unwrap();

    let connection = DatabaseConnection::connect(&url).await.unwrap();
    let mut schema = SchemaBuilder::new(connection);

    assert_eq!(
        schema.get_column_listing("users").await.unwrap(),
        vec!["id", "email", "score"]
    );
    let score = schema.get_column("users", "score").await.unwrap().unwrap();
    assert_eq!(score.data_type, "BIGINT");
    assert!(score.nullable);
    assert_eq!(score.default_literal().as_deref(), Some("0"));

    let rows = schema
        .connection_mut()
        .fetch("SELECT email, CAST(score AS TEXT) AS score FROM users ORDER BY id")
        .await
        .unwrap();
    let values: Vec<(Option<&str>, Option<&str>)> = rows
        .iter()
        .map(|row| (row.get("email"), row.get("score")))
        .collect();
    assert_eq!(
        values,
        vec![
            (Some("a@foo.com"), Some("3")),
            (Some("b@foo.com"), Some("5")),
        ]
    );
}
