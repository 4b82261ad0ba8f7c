// ============================================================
// TABLE TYPES
// ============================================================
// In-memory representation of a parsed tabular source
// No I/O, no async

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Semantic type of a column, used both for filter coercion and for
/// output serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeTag {
    Boolean,
    Integer,
    Decimal,
    Date,
    Time,
    DateTime,
    Text,
}

impl TypeTag {
    /// Stable name used in the stored schema table.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Boolean => "boolean",
            TypeTag::Integer => "integer",
            TypeTag::Decimal => "decimal",
            TypeTag::Date => "date",
            TypeTag::Time => "time",
            TypeTag::DateTime => "datetime",
            TypeTag::Text => "text",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "boolean" => Some(TypeTag::Boolean),
            "integer" => Some(TypeTag::Integer),
            "decimal" => Some(TypeTag::Decimal),
            "date" => Some(TypeTag::Date),
            "time" => Some(TypeTag::Time),
            "datetime" => Some(TypeTag::DateTime),
            "text" => Some(TypeTag::Text),
            _ => None,
        }
    }

    /// Whether filter operands against this column are coerced to numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeTag::Integer | TypeTag::Decimal)
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed value or null.
///
/// Date, Time and DateTime columns keep their original string form in
/// `Cell::Text`; the column's `TypeTag` carries the semantics. A literal
/// `"9:15"` must survive to the output as `"9:15"`.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Int(i) => Value::from(*i),
            Cell::Float(f) => Value::from(*f),
            Cell::Text(s) => Value::from(s.clone()),
        }
    }
}

/// A named, typed, ordered sequence of cells.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub inferred_type: TypeTag,
    pub values: Vec<Cell>,
}

/// Ordered columns of identical length; row i across all columns forms one
/// logical record. The 1-based row identifier is synthetic and assigned at
/// materialization, never stored as data.
#[derive(Debug, Clone)]
pub struct Table {
    pub columns: Vec<Column>,
    pub row_count: usize,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        let row_count = columns.first().map(|c| c.values.len()).unwrap_or(0);
        debug_assert!(columns.iter().all(|c| c.values.len() == row_count));
        Self { columns, row_count }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}
