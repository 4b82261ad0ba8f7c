// ============================================================
// QUERY SPECIFICATION
// ============================================================
// Validated filter/sort/pagination/shape request against a stored table.
// The storage adapter receives a typed intermediate representation and is
// the only place allowed to turn it into SQL.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{AppError, Result};
use super::table::TypeTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    Exact,
    Contains,
}

/// One `column op operand` clause. Clauses are ANDed in request order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterClause {
    pub column: String,
    pub op: FilterOp,
    pub operand: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sort {
    pub column: String,
    pub direction: SortDirection,
}

/// Output row representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shape {
    /// Positional `[rowid?, col1, col2, …]` sequences
    Arrays,
    /// Field-named objects; the rowid key is omitted entirely when hidden
    Objects,
}

impl Shape {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "arrays" => Some(Shape::Arrays),
            "objects" => Some(Shape::Objects),
            _ => None,
        }
    }
}

/// A whole request, built once and rejected as a whole when any part is
/// invalid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySpec {
    pub filters: Vec<FilterClause>,
    pub sort: Option<Sort>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub shape: Shape,
    pub show_row_id: bool,
    pub show_total: bool,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: None,
            limit: None,
            offset: None,
            shape: Shape::Arrays,
            show_row_id: true,
            show_total: true,
        }
    }
}

/// Ordered column-name → type mapping read back from a stored table.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub columns: Vec<(String, TypeTag)>,
}

impl TableSchema {
    pub fn type_of(&self, column: &str) -> Option<TypeTag> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, tag)| *tag)
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|(name, _)| name.clone()).collect()
    }
}

impl QuerySpec {
    /// Validate the whole spec against a stored schema and the configured
    /// pagination ceilings. Any failure rejects the spec as a whole.
    pub fn validate(&self, schema: &TableSchema, max_limit: u32, max_offset: u32) -> Result<()> {
        for clause in &self.filters {
            if schema.type_of(&clause.column).is_none() {
                return Err(AppError::InvalidQuery(format!(
                    "unknown filter column '{}'",
                    clause.column
                )));
            }
        }
        if let Some(sort) = &self.sort {
            if schema.type_of(&sort.column).is_none() {
                return Err(AppError::InvalidQuery(format!(
                    "unknown sort column '{}'",
                    sort.column
                )));
            }
        }
        if let Some(limit) = self.limit {
            if limit > max_limit {
                return Err(AppError::InvalidQuery(format!(
                    "_size must be at most {}",
                    max_limit
                )));
            }
        }
        if let Some(offset) = self.offset {
            if offset > max_offset {
                return Err(AppError::InvalidQuery(format!(
                    "_offset must be at most {}",
                    max_offset
                )));
            }
        }
        Ok(())
    }
}

/// Filter operand after coercion to the column's stored type.
///
/// `NoMatch` marks a failed numeric coercion: the clause matches nothing
/// rather than erroring.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Int(i64),
    Float(f64),
    Text(String),
    NoMatch,
}

/// Coerce a raw operand to the stored column type.
///
/// Integer columns also accept a fractional-free decimal form ("1.0" means
/// 1); anything genuinely fractional can never equal an integer cell.
pub fn coerce_operand(raw: &str, tag: TypeTag) -> Operand {
    match tag {
        TypeTag::Integer => {
            if let Ok(i) = raw.parse::<i64>() {
                return Operand::Int(i);
            }
            match raw.parse::<f64>() {
                Ok(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                    Operand::Int(f as i64)
                }
                _ => Operand::NoMatch,
            }
        }
        TypeTag::Decimal => match raw.parse::<f64>() {
            Ok(f) => Operand::Float(f),
            Err(_) => Operand::NoMatch,
        },
        TypeTag::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "1" => Operand::Int(1),
            "false" | "f" | "no" | "0" => Operand::Int(0),
            _ => Operand::NoMatch,
        },
        _ => Operand::Text(raw.to_string()),
    }
}

/// Rendered result of one query execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub ok: bool,
    pub columns: Vec<String>,
    pub rows: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
}
