//! Cross-dialect compilation of a small blogging schema.
//!
//! `users`, `friends`, `posts` and `photos` are declared once and compiled
//! for every dialect, then altered against hand-built snapshots of the live
//! tables.

use oxide_schema_core::introspect::{ForeignKeyMeta, IndexMeta};
use oxide_schema_core::{
    Blueprint, ColumnMeta, Dialect, IndexKind, IntrospectedTable, SchemaError, Step,
};

const DIALECTS: [Dialect; 4] = [
    Dialect::MySql,
    Dialect::Postgres,
    Dialect::Sqlite,
    Dialect::SqlServer,
];

// =============================================================================
// Declarations
// =============================================================================

fn users() -> Blueprint {
    let mut table = Blueprint::create("users");
    table.increments("id");
    table.string("email").unique();
    table.integer("votes").default(0);
    table.timestamps(true);
    table
}

fn friends() -> Blueprint {
    let mut table = Blueprint::create("friends");
    table.unsigned_integer("user_id");
    table.unsigned_integer("friend_id");
    table.foreign("user_id").references("id").on("users");
    table.foreign("friend_id").references("id").on("users");
    table
}

fn posts() -> Blueprint {
    let mut table = Blueprint::create("posts");
    table.increments("id");
    table.unsigned_integer("user_id");
    table.string("name").unique();
    table.timestamps(true);
    table.foreign("user_id").references("id").on("users");
    table
}

fn photos() -> Blueprint {
    let mut table = Blueprint::create("photos");
    table.increments("id");
    table.morphs("imageable");
    table.string("name");
    table.timestamps(true);
    table
}

// =============================================================================
// Live snapshots
// =============================================================================

fn column(name: &str, data_type: &str, nullable: bool, default: Option<&str>) -> ColumnMeta {
    ColumnMeta {
        name: name.into(),
        data_type: data_type.into(),
        nullable,
        default: default.map(ToString::to_string),
        primary_key: 0,
        autoincrement: false,
        unsigned: false,
    }
}

fn key(name: &str) -> ColumnMeta {
    let mut id = column(name, "INTEGER", false, None);
    id.primary_key = 1;
    id.autoincrement = true;
    id
}

fn index(name: &str, columns: &[&str], kind: IndexKind) -> IndexMeta {
    IndexMeta {
        name: name.into(),
        columns: columns.iter().map(ToString::to_string).collect(),
        kind,
    }
}

fn live_users() -> IntrospectedTable {
    IntrospectedTable {
        name: "users".into(),
        columns: vec![
            key("id"),
            column("email", "VARCHAR", false, None),
            column("votes", "INTEGER", false, Some("'0'")),
            column("created_at", "DATETIME", false, Some("CURRENT_TIMESTAMP")),
            column("updated_at", "DATETIME", false, Some("CURRENT_TIMESTAMP")),
        ],
        indexes: vec![
            index("primary", &["id"], IndexKind::Primary),
            index("users_email_unique", &["email"], IndexKind::Unique),
        ],
        foreign_keys: Vec::new(),
    }
}

fn live_posts() -> IntrospectedTable {
    IntrospectedTable {
        name: "posts".into(),
        columns: vec![
            key("id"),
            column("user_id", "INTEGER", false, None),
            column("name", "VARCHAR", false, None),
            column("created_at", "DATETIME", false, Some("CURRENT_TIMESTAMP")),
            column("updated_at", "DATETIME", false, Some("CURRENT_TIMESTAMP")),
        ],
        indexes: vec![
            index("primary", &["id"], IndexKind::Primary),
            index("posts_name_unique", &["name"], IndexKind::Unique),
        ],
        foreign_keys: vec![ForeignKeyMeta {
            name: "posts_user_id_foreign".into(),
            columns: vec!["user_id".into()],
            referenced_table: "users".into(),
            referenced_columns: vec!["id".into()],
            on_delete: None,
            on_update: None,
        }],
    }
}

fn compile(dialect: Dialect, blueprint: &Blueprint, live: Option<&IntrospectedTable>) -> Vec<String> {
    dialect
        .grammar()
        .compile(blueprint, live)
        .unwrap_or_else(|e| panic!("{dialect}: {e}"))
        .statements()
}

// =============================================================================
// Creating tables
// =============================================================================

#[test]
fn test_every_dialect_creates_the_schema() {
    for dialect in DIALECTS {
        let grammar = dialect.grammar();
        for blueprint in [users(), friends(), posts(), photos()] {
            let statements = compile(dialect, &blueprint, None);
            let create = format!("CREATE TABLE {}", grammar.wrap(blueprint.table()));
            assert!(
                statements[0].starts_with(&create),
                "{dialect}: {}",
                statements[0]
            );
        }
    }
}

#[test]
fn test_foreign_keys_follow_the_create() {
    for dialect in DIALECTS {
        let statements = compile(dialect, &friends(), None).join(";\n");
        for name in ["friends_user_id_foreign", "friends_friend_id_foreign"] {
            assert!(statements.contains(name), "{dialect}: {statements}");
        }
        assert_eq!(statements.matches("FOREIGN KEY").count(), 2, "{dialect}");
    }
}

#[test]
fn test_sqlite_declares_foreign_keys_in_the_create() {
    let statements = compile(Dialect::Sqlite, &posts(), None);
    assert!(statements[0].contains(
        "CONSTRAINT \"posts_user_id_foreign\" FOREIGN KEY (\"user_id\") REFERENCES \"users\" (\"id\")"
    ));
    assert_eq!(
        statements[1..],
        ["CREATE UNIQUE INDEX \"posts_name_unique\" ON \"posts\" (\"name\")"]
    );
}

#[test]
fn test_morph_index_is_created_for_every_dialect() {
    for dialect in DIALECTS {
        let statements = compile(dialect, &photos(), None).join(";\n");
        assert!(
            statements.contains("photos_imageable_id_imageable_type_index"),
            "{dialect}: {statements}"
        );
    }
}

// =============================================================================
// Altering tables
// =============================================================================

#[test]
fn test_add_columns_to_posts() {
    let mut table = Blueprint::new("posts");
    table.text("content").nullable();
    table.integer("votes").default(0);

    assert_eq!(
        compile(Dialect::Postgres, &table, Some(&live_posts())),
        vec![
            "ALTER TABLE \"posts\" ADD COLUMN \"content\" TEXT NULL",
            "ALTER TABLE \"posts\" ADD COLUMN \"votes\" INTEGER NOT NULL DEFAULT 0",
        ]
    );
    assert_eq!(
        compile(Dialect::MySql, &table, Some(&live_posts())),
        vec!["ALTER TABLE `posts` ADD `content` TEXT NULL, ADD `votes` INT NOT NULL DEFAULT 0"]
    );
    assert_eq!(
        compile(Dialect::Sqlite, &table, Some(&live_posts())),
        vec![
            "ALTER TABLE \"posts\" ADD COLUMN \"content\" TEXT",
            "ALTER TABLE \"posts\" ADD COLUMN \"votes\" INTEGER NOT NULL DEFAULT 0",
        ]
    );
}

#[test]
fn test_change_votes_to_big_integer() {
    let mut table = Blueprint::new("users");
    table.big_integer("votes").change();

    for dialect in [Dialect::MySql, Dialect::Postgres, Dialect::SqlServer] {
        let statements = compile(dialect, &table, Some(&live_users())).join(";\n");
        assert!(statements.contains("BIGINT"), "{dialect}: {statements}");
        assert!(!statements.contains("CREATE TABLE"), "{dialect}: {statements}");
    }

    let compiled = Dialect::Sqlite
        .grammar()
        .compile(&table, Some(&live_users()))
        .unwrap();
    assert_eq!(compiled.steps.len(), 1);
    let Step::Atomic { statements, .. } = &compiled.steps[0] else {
        panic!("expected a rebuild");
    };
    assert!(statements[0].contains("\"votes\" BIGINT NOT NULL DEFAULT 0"));
    assert_eq!(statements[3], "ALTER TABLE \"__temp__users\" RENAME TO \"users\"");
}

#[test]
fn test_string_votes_back_to_big_integer() {
    let mut live = live_users();
    live.columns[2] = column(
        "votes",
        "character varying(255)",
        false,
        Some("'0'::character varying"),
    );
    let mut table = Blueprint::new("users");
    table.big_integer("votes").change();

    let statements = compile(Dialect::Postgres, &table, Some(&live));
    assert_eq!(
        statements.last().map(String::as_str),
        Some("ALTER TABLE \"users\" ALTER COLUMN \"votes\" SET DEFAULT 0")
    );
    assert!(statements.iter().all(|sql| !sql.contains("::character varying")));
}

#[test]
fn test_foreign_key_added_by_rebuild_is_checked() {
    let mut table = Blueprint::new("posts");
    table.drop_foreign("posts_user_id_foreign");
    table.foreign("user_id").references("id").on("users").name("posts_author_foreign");

    let compiled = Dialect::Sqlite
        .grammar()
        .compile(&table, Some(&live_posts()))
        .unwrap();
    let Step::Atomic { checks, .. } = &compiled.steps[0] else {
        panic!("expected a rebuild");
    };
    assert_eq!(checks, &vec!["PRAGMA foreign_key_check(\"posts\")".to_string()]);
}

#[test]
fn test_rename_column_held_by_foreign_key() {
    let mut table = Blueprint::new("posts");
    table.drop_foreign("posts_user_id_foreign");
    table.rename_column("user_id", "my_user_id");
    table.foreign("my_user_id").references("id").on("users");

    for dialect in [Dialect::MySql, Dialect::Postgres, Dialect::SqlServer] {
        let statements = compile(dialect, &table, Some(&live_posts()));
        assert!(
            statements[0].contains("posts_user_id_foreign"),
            "{dialect}: {statements:?}"
        );
        assert!(
            statements
                .last()
                .is_some_and(|sql| sql.contains("posts_my_user_id_foreign")),
            "{dialect}: {statements:?}"
        );
    }

    let statements = compile(Dialect::Sqlite, &table, Some(&live_posts()));
    assert_eq!(statements[0], "PRAGMA foreign_keys = OFF");
    assert!(statements[1].contains(
        "CONSTRAINT \"posts_my_user_id_foreign\" FOREIGN KEY (\"my_user_id\")"
    ));
    assert!(!statements[1].contains("posts_user_id_foreign"));
    assert!(statements[2].contains("SELECT \"id\", \"user_id\", \"name\""));
}

#[test]
fn test_rename_column_with_index_keeps_the_index() {
    let mut table = Blueprint::new("users");
    table.rename_column("email", "email_address");

    let statements = compile(Dialect::Sqlite, &table, Some(&live_users()));
    assert_eq!(
        statements,
        vec!["ALTER TABLE \"users\" RENAME COLUMN \"email\" TO \"email_address\""]
    );
}

// =============================================================================
// Rejections
// =============================================================================

#[test]
fn test_every_dialect_rejects_the_same_mistakes() {
    for dialect in DIALECTS {
        let grammar = dialect.grammar();

        let mut table = Blueprint::new("posts");
        table.drop_column("missing");
        assert_eq!(
            grammar.compile(&table, Some(&live_posts())),
            Err(SchemaError::ColumnNotFound {
                table: "posts".into(),
                column: "missing".into()
            }),
            "{dialect}"
        );

        let mut table = Blueprint::new("posts");
        table.string("name");
        assert!(
            matches!(
                grammar.compile(&table, Some(&live_posts())),
                Err(SchemaError::ColumnExists { .. })
            ),
            "{dialect}"
        );

        let mut table = Blueprint::new("posts");
        table.drop_column("user_id");
        assert_eq!(
            grammar.compile(&table, Some(&live_posts())),
            Err(SchemaError::ForeignKeyDependency {
                table: "posts".into(),
                column: "user_id".into(),
                constraint: "posts_user_id_foreign".into()
            }),
            "{dialect}"
        );

        let mut table = Blueprint::new("posts");
        table.index(&["name"]).name("posts_name_unique");
        assert!(
            matches!(
                grammar.compile(&table, Some(&live_posts())),
                Err(SchemaError::NameCollision { .. })
            ),
            "{dialect}"
        );
    }
}
