// ============================================================
// TABLE STORE
// ============================================================
// One SQLite database file per ingested identity. Replacement is
// copy-on-write at the file level: the new table is written to a temp
// file and renamed over the old one, so readers observe either the
// fully-old or fully-new table, never a torn mix.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::domain::error::{AppError, Result};
use crate::domain::query::TableSchema;
use crate::domain::table::{Cell, Table, TypeTag};

/// Name of the relational table inside every per-identity database.
const DATA_TABLE: &str = "data";

/// Schema side table: enough to reconstruct every column's inferred type
/// without re-running inference.
const COLUMNS_TABLE: &str = "data_columns";

pub struct TableStore {
    root: PathBuf,
}

impl TableStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn db_path(&self, identity: &str) -> PathBuf {
        self.root.join(format!("{}.db", identity))
    }

    /// Cached profile report artifact for this identity.
    pub fn profile_path(&self, identity: &str) -> PathBuf {
        self.root.join(format!("{}.html", identity))
    }

    fn tmp_path(&self, identity: &str) -> PathBuf {
        self.root.join(format!("{}.db.tmp", identity))
    }

    pub fn exists(&self, identity: &str) -> bool {
        self.db_path(identity).exists()
    }

    /// Persist a table under an identity, atomically replacing any prior
    /// version. On failure the temp file is removed and the previously
    /// visible table stays untouched.
    pub async fn materialize(&self, table: &Table, identity: &str) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            AppError::MaterializationError(format!(
                "Failed to create db root {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let tmp = self.tmp_path(identity);
        if tmp.exists() {
            // Stale leftover from an aborted materialization
            std::fs::remove_file(&tmp).map_err(|e| {
                AppError::MaterializationError(format!("Failed to clear stale temp db: {}", e))
            })?;
        }

        if let Err(err) = self.write_table(table, &tmp).await {
            let _ = std::fs::remove_file(&tmp);
            return Err(AppError::MaterializationError(err.to_string()));
        }

        std::fs::rename(&tmp, self.db_path(identity)).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            AppError::MaterializationError(format!("Failed to swap in new table: {}", e))
        })?;

        info!(identity, rows = table.row_count, "Materialized table");
        Ok(())
    }

    async fn write_table(&self, table: &Table, path: &Path) -> Result<()> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to open {}: {}", path.display(), e)))?;

        let column_defs = table
            .columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), affinity(c.inferred_type)))
            .collect::<Vec<_>>()
            .join(", ");

        sqlx::query(&format!("CREATE TABLE {} ({})", DATA_TABLE, column_defs))
            .execute(&pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create table: {}", e)))?;

        sqlx::query(&format!(
            "CREATE TABLE {} (position INTEGER NOT NULL, name TEXT NOT NULL, type TEXT NOT NULL)",
            COLUMNS_TABLE
        ))
        .execute(&pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create schema table: {}", e)))?;

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;

        for (position, column) in table.columns.iter().enumerate() {
            sqlx::query(&format!(
                "INSERT INTO {} (position, name, type) VALUES (?, ?, ?)",
                COLUMNS_TABLE
            ))
            .bind(position as i64)
            .bind(&column.name)
            .bind(column.inferred_type.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to insert schema row: {}", e)))?;
        }

        let column_list = table
            .columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; table.columns.len()].join(", ");
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            DATA_TABLE, column_list, placeholders
        );

        // Source row order; SQLite assigns rowids 1..n in insert order.
        for row_idx in 0..table.row_count {
            let mut query = sqlx::query(&insert_sql);
            for column in &table.columns {
                query = match &column.values[row_idx] {
                    Cell::Null => query.bind(None::<String>),
                    Cell::Bool(b) => query.bind(*b as i64),
                    Cell::Int(i) => query.bind(*i),
                    Cell::Float(f) => query.bind(*f),
                    Cell::Text(s) => query.bind(s.clone()),
                };
            }
            query
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to insert row: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit: {}", e)))?;

        pool.close().await;
        Ok(())
    }

    /// Open the database for an identity, read-only and immutable, the way
    /// every query connection runs.
    pub async fn open_read_only(&self, identity: &str) -> Result<SqlitePool> {
        let path = self.db_path(identity);
        if !path.exists() {
            return Err(AppError::NotFound(format!(
                "no table for identity {}",
                identity
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .read_only(true)
            .immutable(true);

        SqlitePool::connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to open {}: {}", path.display(), e)))
    }

    /// Reconstruct the ordered column-name → type schema without
    /// re-running inference.
    pub async fn load_schema(&self, identity: &str) -> Result<TableSchema> {
        let pool = self.open_read_only(identity).await?;
        let schema = load_schema_from(&pool).await;
        pool.close().await;
        schema
    }
}

pub(crate) async fn load_schema_from(pool: &SqlitePool) -> Result<TableSchema> {
    use sqlx::Row;

    let rows = sqlx::query(&format!(
        "SELECT name, type FROM {} ORDER BY position",
        COLUMNS_TABLE
    ))
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::DatabaseError(format!("Failed to read schema: {}", e)))?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row
            .try_get("name")
            .map_err(|e| AppError::DatabaseError(format!("Failed to read schema row: {}", e)))?;
        let type_name: String = row
            .try_get("type")
            .map_err(|e| AppError::DatabaseError(format!("Failed to read schema row: {}", e)))?;
        let tag = TypeTag::parse(&type_name).ok_or_else(|| {
            AppError::DatabaseError(format!("Unknown stored column type '{}'", type_name))
        })?;
        columns.push((name, tag));
    }

    Ok(TableSchema { columns })
}

/// SQLite type affinity for a column tag. Temporal columns stay TEXT so
/// their values round-trip verbatim.
fn affinity(tag: TypeTag) -> &'static str {
    match tag {
        TypeTag::Boolean | TypeTag::Integer => "INTEGER",
        TypeTag::Decimal => "REAL",
        TypeTag::Date | TypeTag::Time | TypeTag::DateTime | TypeTag::Text => "TEXT",
    }
}

/// Quote an identifier that originated in user content (column headers).
/// Values never go through this path; they are always bound.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::Column;
    use tempfile::TempDir;

    fn sample_table() -> Table {
        Table::new(vec![
            Column {
                name: "id".into(),
                inferred_type: TypeTag::Text,
                values: vec![Cell::Text("a".into()), Cell::Text("b".into())],
            },
            Column {
                name: "hour".into(),
                inferred_type: TypeTag::Time,
                values: vec![Cell::Text("12:30".into()), Cell::Text("9:15".into())],
            },
            Column {
                name: "value".into(),
                inferred_type: TypeTag::Integer,
                values: vec![Cell::Int(1), Cell::Null],
            },
        ])
    }

    #[tokio::test]
    async fn test_materialize_and_load_schema() {
        let dir = TempDir::new().unwrap();
        let store = TableStore::new(dir.path());

        store.materialize(&sample_table(), "abc123").await.unwrap();
        assert!(store.exists("abc123"));

        let schema = store.load_schema("abc123").await.unwrap();
        assert_eq!(
            schema.columns,
            vec![
                ("id".to_string(), TypeTag::Text),
                ("hour".to_string(), TypeTag::Time),
                ("value".to_string(), TypeTag::Integer),
            ]
        );
    }

    #[tokio::test]
    async fn test_rematerialize_replaces_prior_table() {
        let dir = TempDir::new().unwrap();
        let store = TableStore::new(dir.path());

        store.materialize(&sample_table(), "abc123").await.unwrap();

        let replacement = Table::new(vec![Column {
            name: "only".into(),
            inferred_type: TypeTag::Integer,
            values: vec![Cell::Int(7)],
        }]);
        store.materialize(&replacement, "abc123").await.unwrap();

        let schema = store.load_schema("abc123").await.unwrap();
        assert_eq!(schema.columns, vec![("only".to_string(), TypeTag::Integer)]);
        assert!(!store.tmp_path("abc123").exists());
    }

    #[tokio::test]
    async fn test_load_schema_unknown_identity() {
        let dir = TempDir::new().unwrap();
        let store = TableStore::new(dir.path());
        assert!(matches!(
            store.load_schema("missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("col a"), "\"col a\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
