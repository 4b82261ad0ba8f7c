// ============================================================
// SPREADSHEET PARSER
// ============================================================
// Structural grid readers for workbook containers. No delimiter or
// encoding fallback applies here; the container carries both.

use calamine::{Data, DataType, Range, Reader, Xls, Xlsx};
use std::io::Cursor;

use crate::domain::error::{AppError, Result};
use crate::domain::table::Table;

pub fn parse_xls(bytes: &[u8]) -> Result<Table> {
    let workbook = Xls::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| AppError::MalformedInput(format!("Failed to open workbook: {}", e)))?;
    grid_to_table(first_sheet(workbook)?)
}

pub fn parse_xlsx(bytes: &[u8]) -> Result<Table> {
    let workbook = Xlsx::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| AppError::MalformedInput(format!("Failed to open workbook: {}", e)))?;
    grid_to_table(first_sheet(workbook)?)
}

fn first_sheet<R>(mut workbook: R) -> Result<Range<Data>>
where
    R: Reader<Cursor<Vec<u8>>>,
    R::Error: std::fmt::Display,
{
    workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::MalformedInput("workbook has no worksheet".to_string()))?
        .map_err(|e| AppError::MalformedInput(format!("Failed to read worksheet: {}", e)))
}

/// First grid row is the header, the rest are data. Cells degrade to their
/// display form when they are not already strings.
fn grid_to_table(range: Range<Data>) -> Result<Table> {
    let mut grid = range.rows().map(|row| {
        row.iter()
            .map(|cell| {
                cell.as_string()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("{}", cell))
            })
            .collect::<Vec<String>>()
    });

    let headers = grid
        .next()
        .ok_or_else(|| AppError::MalformedInput("worksheet is empty".to_string()))?;
    let rows: Vec<Vec<String>> = grid.collect();

    super::build_table(headers, rows)
}
