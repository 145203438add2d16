mod common;

use common::{columns, count, create_test_pool, exec, index_sql, is_not_null, table_exists};
use futures::lock::Mutex;
use sqlshift_migrate::prelude::*;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Connection, Row, SqliteConnection, SqlitePool};

const AUTHOR_AND_BOOKS: [&str; 6] = [
    "CREATE TABLE author (id INTEGER PRIMARY KEY, name TEXT NOT NULL, bio TEXT)",
    "CREATE TABLE book (id INTEGER PRIMARY KEY, \
     author_id INTEGER REFERENCES author (id) ON DELETE CASCADE, title TEXT)",
    "CREATE TABLE review (id INTEGER PRIMARY KEY, author_id INTEGER REFERENCES author (id))",
    "INSERT INTO author (id, name, bio) VALUES (1, 'Ursula', 'Earthsea'), (2, 'Iain', NULL)",
    "INSERT INTO book (id, author_id, title) VALUES (1, 1, 'A Wizard'), (2, 1, 'The Tombs'), \
     (3, 2, 'Excession')",
    "INSERT INTO review (id, author_id) VALUES (1, 2)",
];

async fn foreign_keys_enabled(pool: &SqlitePool) -> bool {
    sqlx::query("PRAGMA foreign_keys")
        .fetch_one(pool)
        .await
        .unwrap()
        .get::<i64, _>(0)
        == 1
}

async fn story_pool() -> SqlitePool {
    let pool = create_test_pool().await;
    exec(
        &pool,
        "CREATE TABLE story (\n    id INTEGER NOT NULL PRIMARY KEY,\n    \
         title VARCHAR(255) NOT NULL,\n    pub_date DATETIME,\n    price DECIMAL(10, 2)\n)",
    )
    .await;
    exec(&pool, "CREATE INDEX story_pub_date ON story (pub_date)").await;
    exec(&pool, "CREATE UNIQUE INDEX story_title ON story (title)").await;
    exec(
        &pool,
        "INSERT INTO story (id, title, pub_date, price) VALUES \
         (1, 'First', '2024-01-01 09:00:00', 9.5), \
         (2, 'Second', NULL, 12.25), \
         (3, 'Third', '2024-03-01 18:30:00', NULL)",
    )
    .await;
    pool
}

#[tokio::test]
async fn test_rename_column_keeps_rows_and_index() {
    let pool = story_pool().await;
    let migrator = Migrator::from_database(pool.clone());

    migrator
        .migrate([migrator.rename_column("story", "pub_date", "publish_date")])
        .await
        .unwrap();

    assert_eq!(
        columns(&pool, "story").await,
        ["id", "title", "publish_date", "price"]
    );
    assert_eq!(count(&pool, "story").await, 3);
    assert!(!table_exists(&pool, "story__tmp__").await);

    let row = sqlx::query("SELECT publish_date, price FROM story WHERE id = 1")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>("publish_date"), "2024-01-01 09:00:00");
    assert!((row.get::<f64, _>("price") - 9.5).abs() < f64::EPSILON);

    let index = index_sql(&pool, "story_pub_date").await.unwrap();
    assert!(index.contains("publish_date"), "{index}");
    assert!(index_sql(&pool, "story_title").await.is_some());
}

#[tokio::test]
async fn test_drop_indexed_column_drops_index() {
    let pool = story_pool().await;
    let migrator = Migrator::from_database(pool.clone());

    migrator.drop_column("story", "pub_date").run().await.unwrap();

    assert_eq!(columns(&pool, "story").await, ["id", "title", "price"]);
    assert_eq!(count(&pool, "story").await, 3);
    assert!(index_sql(&pool, "story_pub_date").await.is_none());
    assert!(index_sql(&pool, "story_title").await.is_some());
}

#[tokio::test]
async fn test_add_not_null_fails_on_existing_nulls() {
    let pool = story_pool().await;
    let migrator = Migrator::from_database(pool.clone());

    let err = migrator
        .add_not_null("story", "pub_date")
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::Database(_)), "{err}");

    // The copy failed before the original was dropped.
    assert_eq!(count(&pool, "story").await, 3);
    assert!(!is_not_null(&pool, "story", "pub_date").await);

    // A leftover copy does not block the next attempt.
    exec(&pool, "UPDATE story SET pub_date = '2024-02-01 00:00:00' WHERE pub_date IS NULL").await;
    migrator
        .add_not_null("story", "pub_date")
        .run()
        .await
        .unwrap();
    assert!(is_not_null(&pool, "story", "pub_date").await);
    assert!(!table_exists(&pool, "story__tmp__").await);
}

#[tokio::test]
async fn test_add_not_null_column_backfills_default() {
    let pool = story_pool().await;
    let migrator = Migrator::from_database(pool.clone());

    migrator
        .add_column(
            "story",
            "status",
            Field::new(FieldType::Varchar(16)).not_null().default("open"),
        )
        .run()
        .await
        .unwrap();

    assert!(is_not_null(&pool, "story", "status").await);
    let statuses: Vec<String> = sqlx::query("SELECT status FROM story ORDER BY id")
        .fetch_all(&pool)
        .await
        .unwrap()
        .iter()
        .map(|row| row.get("status"))
        .collect();
    assert_eq!(statuses, ["open", "open", "open"]);
    assert!(index_sql(&pool, "story_pub_date").await.is_some());
}

#[tokio::test]
async fn test_default_producer_is_resolved_once() {
    let pool = story_pool().await;
    let migrator = Migrator::from_database(pool.clone());

    let field = Field::new(FieldType::Date)
        .not_null()
        .default_with(|| chrono::NaiveDate::from_ymd_opt(2024, 6, 1));
    migrator
        .add_column("story", "reviewed_on", field)
        .run()
        .await
        .unwrap();

    let distinct: i64 = sqlx::query("SELECT COUNT(DISTINCT reviewed_on) FROM story")
        .fetch_one(&pool)
        .await
        .unwrap()
        .get(0);
    assert_eq!(distinct, 1);
    let value: String = sqlx::query("SELECT reviewed_on FROM story WHERE id = 2")
        .fetch_one(&pool)
        .await
        .unwrap()
        .get(0);
    assert_eq!(value, "2024-06-01");
}

#[tokio::test]
async fn test_add_then_drop_restores_columns() {
    let pool = story_pool().await;
    let migrator = Migrator::from_database(pool.clone());

    migrator
        .migrate([
            migrator.add_column("story", "subtitle", Field::new(FieldType::Text)),
            migrator.drop_column("story", "subtitle"),
        ])
        .await
        .unwrap();

    assert_eq!(
        columns(&pool, "story").await,
        ["id", "title", "pub_date", "price"]
    );
    assert_eq!(count(&pool, "story").await, 3);
}

#[tokio::test]
async fn test_drop_not_null_allows_nulls() {
    let pool = story_pool().await;
    let migrator = Migrator::from_database(pool.clone());

    migrator.drop_not_null("story", "title").run().await.unwrap();

    assert!(!is_not_null(&pool, "story", "title").await);
    assert!(is_not_null(&pool, "story", "id").await);
    exec(&pool, "INSERT INTO story (id, title) VALUES (4, NULL)").await;
    assert_eq!(count(&pool, "story").await, 4);
}

#[tokio::test]
async fn test_rebuild_keeps_table_constraints() {
    let pool = create_test_pool().await;
    exec(
        &pool,
        "CREATE TABLE membership (\n  group_id INTEGER NOT NULL,\n  user_id INTEGER NOT NULL,\n  \
         role TEXT DEFAULT 'member, by default',\n  weight DECIMAL(10, 2),\n  \
         PRIMARY KEY (group_id, user_id)\n)",
    )
    .await;
    exec(
        &pool,
        "INSERT INTO membership (group_id, user_id, role, weight) VALUES (1, 1, 'owner', 1.0), (1, 2, NULL, 0.5)",
    )
    .await;
    let migrator = Migrator::from_database(pool.clone());

    migrator
        .rename_column("membership", "role", "kind")
        .run()
        .await
        .unwrap();

    assert_eq!(
        columns(&pool, "membership").await,
        ["group_id", "user_id", "kind", "weight"]
    );
    assert_eq!(count(&pool, "membership").await, 2);

    // Composite key survives the rebuild.
    let duplicate = sqlx::query("INSERT INTO membership (group_id, user_id) VALUES (1, 1)")
        .execute(&pool)
        .await;
    assert!(duplicate.is_err());

    // So does the column default.
    exec(&pool, "INSERT INTO membership (group_id, user_id) VALUES (2, 1)").await;
    let kind: String = sqlx::query("SELECT kind FROM membership WHERE group_id = 2")
        .fetch_one(&pool)
        .await
        .unwrap()
        .get(0);
    assert_eq!(kind, "member, by default");
}

#[tokio::test]
async fn test_missing_column_and_table() {
    let pool = story_pool().await;
    let migrator = Migrator::from_database(pool.clone());

    let err = migrator
        .drop_column("story", "subtitle")
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::ColumnNotFound { .. }), "{err}");

    let err = migrator
        .rename_column("chapter", "title", "heading")
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::TableNotFound { .. }), "{err}");

    // Nothing was touched.
    assert!(!table_exists(&pool, "story__tmp__").await);
    assert_eq!(count(&pool, "story").await, 3);
}

#[tokio::test]
async fn test_indexes_and_table_rename() {
    let pool = story_pool().await;
    let migrator = Migrator::from_database(pool.clone());

    migrator
        .migrate([
            migrator.add_index("story", &["price"], false),
            migrator.drop_index("story", "story_pub_date"),
            migrator.rename_table("story", "stories"),
        ])
        .await
        .unwrap();

    assert!(index_sql(&pool, "story_price").await.is_some());
    assert!(index_sql(&pool, "story_pub_date").await.is_none());
    assert!(table_exists(&pool, "stories").await);
    assert!(!table_exists(&pool, "story").await);
    assert_eq!(count(&pool, "stories").await, 3);
}

#[tokio::test]
async fn test_generate_does_not_execute() {
    let pool = story_pool().await;
    let migrator = Migrator::from_database(pool.clone());

    let steps = migrator
        .rename_column("story", "pub_date", "publish_date")
        .generate()
        .await
        .unwrap();

    // Foreign keys off, copy table, create, populate, drop, rename, two
    // indexes, foreign keys back on.
    assert_eq!(steps.len(), 9);
    assert!(matches!(
        &steps[5],
        Step::Command(Command::RenameTable { old_name, new_name })
            if old_name == "story__tmp__" && new_name == "story"
    ));
    assert_eq!(
        columns(&pool, "story").await,
        ["id", "title", "pub_date", "price"]
    );
}

#[tokio::test]
async fn test_rebuilding_parent_keeps_child_rows() {
    let pool = create_test_pool().await;
    for sql in AUTHOR_AND_BOOKS {
        exec(&pool, sql).await;
    }
    assert!(foreign_keys_enabled(&pool).await);
    let migrator = Migrator::from_database(pool.clone());

    migrator
        .migrate([
            migrator.drop_column("author", "bio"),
            migrator.rename_column("author", "name", "full_name"),
        ])
        .await
        .unwrap();

    assert_eq!(columns(&pool, "author").await, ["id", "full_name"]);
    assert_eq!(count(&pool, "author").await, 2);
    assert_eq!(count(&pool, "book").await, 3);
    assert_eq!(count(&pool, "review").await, 1);

    // Enforcement is back on and the children still point at the new table.
    assert!(foreign_keys_enabled(&pool).await);
    let orphan = sqlx::query("INSERT INTO book (id, author_id) VALUES (4, 99)")
        .execute(&pool)
        .await;
    assert!(orphan.is_err());
    exec(&pool, "DELETE FROM author WHERE id = 1").await;
    assert_eq!(count(&pool, "book").await, 1);
}

#[tokio::test]
async fn test_rebuild_on_locked_connection() {
    let mut conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();
    for sql in AUTHOR_AND_BOOKS {
        sqlx::query(sql).execute(&mut conn).await.unwrap();
    }
    let migrator = Migrator::from_database(Mutex::new(conn));

    migrator.drop_not_null("author", "name").run().await.unwrap();

    let mut conn = migrator.database().lock().await;
    let books: i64 = sqlx::query("SELECT COUNT(*) FROM book")
        .fetch_one(&mut *conn)
        .await
        .unwrap()
        .get(0);
    assert_eq!(books, 3);
    let enforced: i64 = sqlx::query("PRAGMA foreign_keys")
        .fetch_one(&mut *conn)
        .await
        .unwrap()
        .get(0);
    assert_eq!(enforced, 1);
}

#[tokio::test]
async fn test_rebuild_refuses_shared_pool() {
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let migrator = Migrator::from_database(pool);

    let err = migrator
        .drop_column("author", "bio")
        .run()
        .await
        .unwrap_err();
    assert!(
        matches!(&err, MigrateError::RebuildNeedsSingleConnection { table } if table == "author"),
        "{err}"
    );
}

#[tokio::test]
async fn test_expression_index_follows_rename() {
    let pool = story_pool().await;
    exec(&pool, "CREATE INDEX story_lower_title ON story (lower(title))").await;
    let migrator = Migrator::from_database(pool.clone());

    migrator
        .rename_column("story", "title", "heading")
        .run()
        .await
        .unwrap();

    assert_eq!(
        columns(&pool, "story").await,
        ["id", "heading", "pub_date", "price"]
    );
    let index = index_sql(&pool, "story_lower_title").await.unwrap();
    assert!(index.contains("lower(heading)"), "{index}");
    let unique = index_sql(&pool, "story_title").await.unwrap();
    assert!(unique.contains("(heading)"), "{unique}");
}

#[tokio::test]
async fn test_partial_index_dropped_with_its_column() {
    let pool = story_pool().await;
    exec(
        &pool,
        "CREATE INDEX story_dated_price ON story (price) WHERE pub_date IS NOT NULL",
    )
    .await;
    let migrator = Migrator::from_database(pool.clone());

    migrator.drop_column("story", "pub_date").run().await.unwrap();

    assert_eq!(columns(&pool, "story").await, ["id", "title", "price"]);
    assert!(index_sql(&pool, "story_dated_price").await.is_none());
    assert!(index_sql(&pool, "story_title").await.is_some());
}

#[tokio::test]
async fn test_not_null_toggles_leave_check_constraints_alone() {
    let pool = create_test_pool().await;
    exec(
        &pool,
        "CREATE TABLE note (id INTEGER PRIMARY KEY, \
         x TEXT NOT NULL CHECK (x IS NOT NULL OR id > 0), \
         y TEXT CHECK (y IS NOT NULL OR id > 0))",
    )
    .await;
    exec(&pool, "INSERT INTO note (id, x, y) VALUES (1, 'a', 'b')").await;
    let migrator = Migrator::from_database(pool.clone());

    migrator
        .migrate([
            migrator.drop_not_null("note", "x"),
            migrator.add_not_null("note", "y"),
        ])
        .await
        .unwrap();

    assert!(!is_not_null(&pool, "note", "x").await);
    assert!(is_not_null(&pool, "note", "y").await);
    assert_eq!(count(&pool, "note").await, 1);

    // The CHECK constraints survived both rebuilds.
    let rejected = sqlx::query("INSERT INTO note (id, x, y) VALUES (-1, NULL, 'c')")
        .execute(&pool)
        .await;
    assert!(rejected.is_err());
}
