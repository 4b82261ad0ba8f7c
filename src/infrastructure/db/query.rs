// ============================================================
// QUERY ENGINE
// ============================================================
// Translate a validated QuerySpec into parameterized SQL against one
// stored table and render typed JSON rows. User values are always bound,
// never interpolated; identifiers are schema-validated and quoted.

use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::query::Query;
use sqlx::{Row, Sqlite, SqlitePool};

use super::store::{quote_ident, TableStore};
use crate::domain::error::{AppError, Result};
use crate::domain::query::{
    coerce_operand, FilterClause, FilterOp, Operand, QueryResult, QuerySpec, Shape, SortDirection,
    TableSchema,
};
use crate::domain::table::TypeTag;

pub async fn execute(
    store: &TableStore,
    identity: &str,
    schema: &TableSchema,
    spec: &QuerySpec,
    default_limit: u32,
) -> Result<QueryResult> {
    let pool = store.open_read_only(identity).await?;
    let result = run(&pool, schema, spec, default_limit).await;
    pool.close().await;
    result
}

async fn run(
    pool: &SqlitePool,
    schema: &TableSchema,
    spec: &QuerySpec,
    default_limit: u32,
) -> Result<QueryResult> {
    let (where_sql, binds) = build_where(schema, &spec.filters);

    let select_list = schema
        .columns
        .iter()
        .map(|(name, _)| quote_ident(name))
        .collect::<Vec<_>>()
        .join(", ");

    // Ties always break on ascending rowid so the order is stable.
    let order_sql = match &spec.sort {
        Some(sort) => {
            let direction = match sort.direction {
                SortDirection::Ascending => "ASC",
                SortDirection::Descending => "DESC",
            };
            format!("ORDER BY {} {}, rowid ASC", quote_ident(&sort.column), direction)
        }
        None => "ORDER BY rowid ASC".to_string(),
    };

    let sql = format!(
        "SELECT rowid, {} FROM data {} {} LIMIT ? OFFSET ?",
        select_list, where_sql, order_sql
    );

    let mut query = sqlx::query(&sql);
    for operand in &binds {
        query = bind_operand(query, operand);
    }
    query = query
        .bind(spec.limit.unwrap_or(default_limit) as i64)
        .bind(spec.offset.unwrap_or(0) as i64);

    let db_rows = query
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Query failed: {}", e)))?;

    let rows = render_rows(&db_rows, schema, spec)?;

    // Count of rows matching the filters, independent of pagination.
    let total = if spec.show_total {
        let count_sql = format!("SELECT COUNT(*) FROM data {}", where_sql);
        let mut count_query = sqlx::query(&count_sql);
        for operand in &binds {
            count_query = bind_operand(count_query, operand);
        }
        let row = count_query
            .fetch_one(pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Count failed: {}", e)))?;
        let n: i64 = row
            .try_get(0)
            .map_err(|e| AppError::DatabaseError(format!("Count failed: {}", e)))?;
        Some(n)
    } else {
        None
    };

    let mut columns = Vec::with_capacity(schema.columns.len() + 1);
    if spec.show_row_id {
        columns.push("rowid".to_string());
    }
    columns.extend(schema.names());

    Ok(QueryResult {
        ok: true,
        columns,
        rows,
        total,
    })
}

/// Build the ANDed WHERE fragment plus its ordered bind list.
///
/// A failed numeric coercion compiles to a constant-false predicate: the
/// clause matches nothing instead of erroring.
fn build_where(schema: &TableSchema, filters: &[FilterClause]) -> (String, Vec<Operand>) {
    let mut predicates: Vec<String> = Vec::new();
    let mut binds: Vec<Operand> = Vec::new();

    for clause in filters {
        let tag = schema.type_of(&clause.column).unwrap_or(TypeTag::Text);
        let operand = coerce_operand(&clause.operand, tag);

        match (clause.op, operand) {
            (_, Operand::NoMatch) => predicates.push("0".to_string()),
            (FilterOp::Contains, Operand::Text(text)) => {
                // instr is case-sensitive, unlike SQLite's ASCII-folding LIKE
                predicates.push(format!("instr({}, ?) > 0", quote_ident(&clause.column)));
                binds.push(Operand::Text(text));
            }
            // contains on a numeric column degrades to equality; substring
            // semantics do not apply to numbers
            (_, operand) => {
                predicates.push(format!("{} = ?", quote_ident(&clause.column)));
                binds.push(operand);
            }
        }
    }

    let where_sql = if predicates.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", predicates.join(" AND "))
    };

    (where_sql, binds)
}

fn bind_operand<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    operand: &'q Operand,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match operand {
        Operand::Int(i) => query.bind(*i),
        Operand::Float(f) => query.bind(*f),
        Operand::Text(s) => query.bind(s.as_str()),
        Operand::NoMatch => query,
    }
}

fn render_rows(db_rows: &[SqliteRow], schema: &TableSchema, spec: &QuerySpec) -> Result<Value> {
    let mut rendered = Vec::with_capacity(db_rows.len());

    for row in db_rows {
        let rowid: i64 = row
            .try_get(0)
            .map_err(|e| AppError::DatabaseError(format!("Failed to read rowid: {}", e)))?;

        match spec.shape {
            Shape::Arrays => {
                let mut values = Vec::with_capacity(schema.columns.len() + 1);
                if spec.show_row_id {
                    values.push(Value::from(rowid));
                }
                for (idx, (_, tag)) in schema.columns.iter().enumerate() {
                    values.push(render_value(row, idx + 1, *tag)?);
                }
                rendered.push(Value::Array(values));
            }
            Shape::Objects => {
                let mut object = Map::new();
                if spec.show_row_id {
                    object.insert("rowid".to_string(), Value::from(rowid));
                }
                for (idx, (name, tag)) in schema.columns.iter().enumerate() {
                    object.insert(name.clone(), render_value(row, idx + 1, *tag)?);
                }
                rendered.push(Value::Object(object));
            }
        }
    }

    Ok(Value::Array(rendered))
}

/// Decode one cell with its stored semantic type: numbers come back as
/// numbers, booleans as booleans, temporal columns as their original
/// verbatim strings.
fn render_value(row: &SqliteRow, idx: usize, tag: TypeTag) -> Result<Value> {
    let value = match tag {
        TypeTag::Integer => row
            .try_get::<Option<i64>, _>(idx)
            .map(|v| v.map(Value::from).unwrap_or(Value::Null)),
        TypeTag::Decimal => row
            .try_get::<Option<f64>, _>(idx)
            .map(|v| v.map(Value::from).unwrap_or(Value::Null)),
        TypeTag::Boolean => row
            .try_get::<Option<i64>, _>(idx)
            .map(|v| v.map(|b| Value::Bool(b != 0)).unwrap_or(Value::Null)),
        TypeTag::Date | TypeTag::Time | TypeTag::DateTime | TypeTag::Text => row
            .try_get::<Option<String>, _>(idx)
            .map(|v| v.map(Value::from).unwrap_or(Value::Null)),
    };
    value.map_err(|e| AppError::DatabaseError(format!("Failed to read column {}: {}", idx, e)))
}
