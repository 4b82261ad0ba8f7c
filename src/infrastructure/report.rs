// ============================================================
// PROFILE REPORT
// ============================================================
// Static HTML summary of a materialized table, generated once and cached
// on disk next to the database. The table itself is only ever read.

use sqlx::Row;
use tracing::warn;

use super::db::store::{quote_ident, TableStore};
use crate::domain::error::{AppError, Result};
use crate::domain::query::TableSchema;

struct ColumnProfile {
    name: String,
    type_name: &'static str,
    null_count: i64,
    distinct_count: i64,
}

/// Serve the cached report when present, otherwise generate and cache it.
/// A failed cache write is logged and ignored; the report still renders.
pub async fn cached_profile(
    store: &TableStore,
    identity: &str,
    schema: &TableSchema,
) -> Result<String> {
    let path = store.profile_path(identity);
    if let Ok(html) = std::fs::read_to_string(&path) {
        return Ok(html);
    }

    let html = generate(store, identity, schema).await?;
    if let Err(err) = std::fs::write(&path, &html) {
        warn!(identity, error = %err, "Failed to cache profile report");
    }
    Ok(html)
}

async fn generate(store: &TableStore, identity: &str, schema: &TableSchema) -> Result<String> {
    let pool = store.open_read_only(identity).await?;

    let row_count: i64 = sqlx::query("SELECT COUNT(*) FROM data")
        .fetch_one(&pool)
        .await
        .and_then(|row| row.try_get(0))
        .map_err(|e| AppError::DatabaseError(format!("Failed to count rows: {}", e)))?;

    let mut profiles = Vec::with_capacity(schema.columns.len());
    for (name, tag) in &schema.columns {
        let sql = format!(
            "SELECT COUNT({col}), COUNT(DISTINCT {col}) FROM data",
            col = quote_ident(name)
        );
        let row = sqlx::query(&sql)
            .fetch_one(&pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to profile column: {}", e)))?;
        let non_null: i64 = row
            .try_get(0)
            .map_err(|e| AppError::DatabaseError(format!("Failed to profile column: {}", e)))?;
        let distinct: i64 = row
            .try_get(1)
            .map_err(|e| AppError::DatabaseError(format!("Failed to profile column: {}", e)))?;
        profiles.push(ColumnProfile {
            name: name.clone(),
            type_name: tag.as_str(),
            null_count: row_count - non_null,
            distinct_count: distinct,
        });
    }

    pool.close().await;
    Ok(render(identity, row_count, &profiles))
}

fn render(identity: &str, row_count: i64, profiles: &[ColumnProfile]) -> String {
    let mut rows = String::new();
    for profile in profiles {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&profile.name),
            profile.type_name,
            profile.null_count,
            profile.distinct_count
        ));
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Profile {id}</title></head>\n\
         <body>\n<h1>Table profile</h1>\n\
         <p>{rows_n} rows, {cols_n} columns</p>\n\
         <table border=\"1\">\n\
         <tr><th>column</th><th>type</th><th>nulls</th><th>distinct</th></tr>\n\
         {rows}\
         </table>\n</body>\n</html>\n",
        id = escape(identity),
        rows_n = row_count,
        cols_n = profiles.len(),
        rows = rows
    )
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
