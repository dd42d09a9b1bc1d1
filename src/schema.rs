//! Connection setup and table definitions.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, instrument};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS authors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT
    )",
    "CREATE TABLE IF NOT EXISTS books (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        isbn TEXT,
        published_date TEXT,
        author_id INTEGER NOT NULL REFERENCES authors (id) ON DELETE CASCADE
    )",
    "CREATE INDEX IF NOT EXISTS idx_books_author_id ON books (author_id)",
];

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Open a pool with foreign keys enforced on every connection.
///
/// An in-memory database lives only as long as its connection, so for
/// in-memory URLs the pool is pinned to a single connection that is never
/// recycled.
#[instrument(skip(database_url))]
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .foreign_keys(true)
        .create_if_missing(true);

    let pool_options = if is_in_memory(database_url) {
        debug!("in-memory database, using a single connection");
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(max_connections.max(1))
    };

    pool_options.connect_with(options).await
}

/// Create the `authors` and `books` tables if they do not exist yet.
pub async fn create_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(*statement).execute(pool).await?;
    }
    info!("schema ready");
    Ok(())
}

/// [`connect`] followed by [`create_schema`].
pub async fn open(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let pool = connect(database_url, max_connections).await?;
    create_schema(&pool).await?;
    Ok(pool)
}
