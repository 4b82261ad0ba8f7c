// ============================================================
// PARSER
// ============================================================
// Turn raw bytes plus a detected format into an in-memory Table.
// Each container format is an interchangeable strategy picked at
// dispatch time from the detected class.

mod delimited;
mod spreadsheet;

use crate::domain::error::{AppError, Result};
use crate::domain::format::{DetectedFormat, MimeClass};
use crate::domain::inference::{infer_column, to_cell};
use crate::domain::table::{Column, Table};

/// Parse a raw source with the strategy matching its detected class.
///
/// A declared encoding, when present, overrides the detected one for
/// delimited text; spreadsheet containers ignore both.
pub fn parse(
    bytes: &[u8],
    detected: &DetectedFormat,
    declared_encoding: Option<&str>,
) -> Result<Table> {
    match detected.mime_class {
        MimeClass::DelimitedText => {
            delimited::parse(bytes, detected.encoding.as_deref(), declared_encoding)
        }
        MimeClass::LegacySpreadsheet => spreadsheet::parse_xls(bytes),
        MimeClass::ModernSpreadsheet => spreadsheet::parse_xlsx(bytes),
        MimeClass::Unsupported => Err(AppError::UnsupportedFormat(
            "no parser can handle this content".to_string(),
        )),
    }
}

/// Assemble header + raw rows into a typed Table.
///
/// Rows shorter than the header are padded with nulls; excess trailing
/// fields are dropped. Inference runs once per fully assembled column.
pub(crate) fn build_table(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Table> {
    if headers.is_empty() {
        return Err(AppError::MalformedInput("input has no header row".to_string()));
    }

    let names = unique_column_names(&headers);

    let mut columns = Vec::with_capacity(names.len());
    for (idx, name) in names.into_iter().enumerate() {
        let raw: Vec<String> = rows
            .iter()
            .map(|row| row.get(idx).cloned().unwrap_or_default())
            .collect();
        let inferred_type = infer_column(&raw);
        let values = raw.iter().map(|v| to_cell(v, inferred_type)).collect();
        columns.push(Column {
            name,
            inferred_type,
            values,
        });
    }

    Ok(Table::new(columns))
}

/// Column names must be unique and non-empty: blank headers get positional
/// names, duplicates get a numeric suffix.
fn unique_column_names(headers: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(headers.len());
    for (idx, header) in headers.iter().enumerate() {
        let base = if header.trim().is_empty() {
            format!("column_{}", idx + 1)
        } else {
            header.trim().to_string()
        };
        let mut name = base.clone();
        let mut suffix = 2;
        while seen.contains(&name) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        seen.push(name);
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::{Cell, TypeTag};

    #[test]
    fn test_unsupported_format_is_fatal() {
        let detected = DetectedFormat::unsupported();
        assert!(matches!(
            parse(b"\x00\x01", &detected, None),
            Err(AppError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_build_table_pads_short_rows() {
        let table = build_table(
            vec!["a".into(), "b".into()],
            vec![vec!["1".into(), "2".into()], vec!["3".into()]],
        )
        .unwrap();
        assert_eq!(table.row_count, 2);
        assert_eq!(table.columns[1].values[1], Cell::Null);
    }

    #[test]
    fn test_build_table_drops_excess_fields() {
        let table = build_table(
            vec!["a".into(), "b".into()],
            vec![vec!["1".into(), "2".into(), "3".into()]],
        )
        .unwrap();
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.columns[0].inferred_type, TypeTag::Integer);
    }

    #[test]
    fn test_unique_column_names() {
        let names = unique_column_names(&[
            "a".to_string(),
            "".to_string(),
            "a".to_string(),
            "a".to_string(),
        ]);
        assert_eq!(names, vec!["a", "column_2", "a_2", "a_3"]);
    }
}
