use std::sync::Arc;

use crate::domain::error::Result;
use crate::domain::query::{QueryResult, QuerySpec};
use crate::infrastructure::db::{query as engine, store::TableStore};

/// Answer one read request against a materialized table: existence check,
/// whole-spec validation against the stored schema, then execution.
pub struct QueryUseCase {
    store: Arc<TableStore>,
    default_page_size: u32,
    max_page_size: u32,
    max_offset: u32,
}

impl QueryUseCase {
    pub fn new(
        store: Arc<TableStore>,
        default_page_size: u32,
        max_page_size: u32,
        max_offset: u32,
    ) -> Self {
        Self {
            store,
            default_page_size,
            max_page_size,
            max_offset,
        }
    }

    pub async fn execute(&self, identity: &str, spec: &QuerySpec) -> Result<QueryResult> {
        let schema = self.store.load_schema(identity).await?;
        spec.validate(&schema, self.max_page_size, self.max_offset)?;
        engine::execute(&self.store, identity, &schema, spec, self.default_page_size).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::AppError;
    use crate::domain::query::{FilterClause, FilterOp};
    use crate::domain::table::{Cell, Column, Table, TypeTag};
    use tempfile::TempDir;

    async fn setup() -> (TempDir, QueryUseCase) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(TableStore::new(dir.path()));
        let table = Table::new(vec![Column {
            name: "id".into(),
            inferred_type: TypeTag::Text,
            values: vec![Cell::Text("a".into()), Cell::Text("b".into())],
        }]);
        store.materialize(&table, "known").await.unwrap();
        let use_case = QueryUseCase::new(store, 100, 500, 100_000);
        (dir, use_case)
    }

    #[tokio::test]
    async fn test_unknown_identity_is_not_found() {
        let (_dir, query) = setup().await;
        assert!(matches!(
            query.execute("missing", &QuerySpec::default()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_filter_column_is_invalid_query() {
        let (_dir, query) = setup().await;
        let spec = QuerySpec {
            filters: vec![FilterClause {
                column: "nope".into(),
                op: FilterOp::Exact,
                operand: "x".into(),
            }],
            ..Default::default()
        };
        assert!(matches!(
            query.execute("known", &spec).await,
            Err(AppError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn test_valid_query_executes() {
        let (_dir, query) = setup().await;
        let result = query.execute("known", &QuerySpec::default()).await.unwrap();
        assert_eq!(result.total, Some(2));
    }
}
