// Shared SQLite pool setup. Every sqlite-backed store takes a clone of the
// same pool and creates its own tables in `migrate()`.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let conn_str = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite://{}?mode=rwc", database_url)
    };

    // The driver creates the file with mode=rwc, but not its directory
    let path = conn_str
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);
    if !path.is_empty() && !path.contains(":memory:") {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&conn_str)
        .await?;
    tracing::info!(database = %conn_str, "Connected to SQLite");
    Ok(pool)
}

#[cfg(test)]
pub(crate) async fn temp_pool() -> (tempfile::TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
    let pool = connect(&url).await.unwrap();
    (dir, pool)
}
