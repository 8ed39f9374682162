// Schema migrations for the staging database

use crate::staging_repository::map_sqlx_error;
use serpwatch_core::error::Result;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

/// Ordered (version, label, sql); a version is applied once and recorded in
/// `schema_version` within the same transaction
const MIGRATIONS: &[(i64, &str, &str)] = &[(
    1,
    "staging results",
    include_str!("../migrations/001_staging_results.sql"),
)];

const VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(VERSION_TABLE)
        .execute(pool)
        .await
        .map_err(map_sqlx_error)?;

    let current: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
        .fetch_one(pool)
        .await
        .map_err(map_sqlx_error)?;

    let pending: Vec<_> = MIGRATIONS
        .iter()
        .filter(|(version, _, _)| *version > current)
        .collect();
    if pending.is_empty() {
        info!(version = %current, "Staging schema up to date");
        return Ok(());
    }

    for (version, label, sql) in pending {
        info!(version = %version, migration = %label, "Applying migration");
        let mut tx = pool.begin().await.map_err(map_sqlx_error)?;
        for statement in statements(sql) {
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }
        record_version(&mut tx, *version).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
    }
    Ok(())
}

async fn record_version(tx: &mut Transaction<'_, Sqlite>, version: i64) -> Result<()> {
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;
    Ok(())
}

/// Split a script on ';', dropping `--` comment lines and empty statements
fn statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(|chunk| {
            chunk
                .lines()
                .filter(|line| !line.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .filter(|statement| !statement.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_pool;

    #[test]
    fn test_statements_skip_comments() {
        let parsed = statements("-- header\nCREATE TABLE a (x INT);\n\n-- tail\n;");
        assert_eq!(parsed, vec!["CREATE TABLE a (x INT)".to_string()]);
    }

    #[tokio::test]
    async fn test_run_migrations_is_repeatable() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM staging_serp_results")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 0);

        let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_version")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(versions, vec![1]);
    }
}
