// ============================================================
// DELIMITED TEXT PARSER
// ============================================================
// Decode with the detected or declared encoding, then attempt a bounded
// ladder of delimiter strategies: sniffed, default comma, forced
// semicolon. First success wins; exhaustion is MalformedInput.

use csv::{ReaderBuilder, Trim};
use tracing::debug;

use crate::domain::error::{AppError, Result};
use crate::domain::table::Table;

/// Bytes of content examined when sniffing the delimiter.
const SNIFF_LIMIT: usize = 4096;

const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

pub fn parse(
    bytes: &[u8],
    detected_encoding: Option<&str>,
    declared_encoding: Option<&str>,
) -> Result<Table> {
    let content = decode(bytes, declared_encoding.or(detected_encoding));
    let sniffed = sniff_delimiter(sniff_window(&content, SNIFF_LIMIT));

    let mut last_error = None;
    for (attempt, delimiter) in [sniffed, b',', b';'].into_iter().enumerate() {
        match read_records(&content, delimiter) {
            Ok((headers, rows)) => {
                debug!(
                    attempt,
                    delimiter = %(delimiter as char),
                    rows = rows.len(),
                    "Parsed delimited content"
                );
                return super::build_table(headers, rows);
            }
            Err(err) => last_error = Some(err),
        }
    }

    Err(AppError::MalformedInput(format!(
        "all parse strategies failed: {}",
        last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no content".to_string())
    )))
}

/// Decode bytes to text. An unknown or absent encoding label falls back to
/// UTF-8 with replacement, never to a hard failure.
fn decode(bytes: &[u8], label: Option<&str>) -> String {
    let encoding = label
        .and_then(|l| encoding_rs::Encoding::for_label(l.as_bytes()))
        .unwrap_or(encoding_rs::UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// Bounded prefix of the content, cut on a char boundary.
fn sniff_window(content: &str, limit: usize) -> &str {
    match content.char_indices().find(|(i, _)| *i >= limit) {
        Some((i, _)) => &content[..i],
        None => content,
    }
}

/// Score each candidate delimiter by per-line frequency and consistency
/// over the first lines of the sniff window; the steadiest frequent
/// candidate wins.
fn sniff_delimiter(sample: &str) -> u8 {
    let sample_lines: Vec<&str> = sample.lines().take(10).collect();

    let mut best_delimiter = b',';
    let mut best_score = 0.0f32;

    for &delimiter in &DELIMITER_CANDIDATES {
        if sample_lines.is_empty() {
            continue;
        }

        let field_counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| line.bytes().filter(|&b| b == delimiter).count())
            .collect();

        let avg = field_counts.iter().sum::<usize>() as f32 / field_counts.len() as f32;
        let variance = field_counts
            .iter()
            .map(|&x| (x as f32 - avg).powi(2))
            .sum::<f32>()
            / field_counts.len() as f32;

        let score = avg / (1.0 + variance.sqrt());

        if score > best_score {
            best_score = score;
            best_delimiter = delimiter;
        }
    }

    best_delimiter
}

/// Read header + data rows with one fixed delimiter. Uneven row lengths are
/// tolerated here (`flexible`); padding and truncation happen during table
/// assembly. Structural errors bubble up so the caller can try the next
/// strategy.
fn read_records(content: &str, delimiter: u8) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::MalformedInput(format!("Failed to read headers: {}", e)))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(AppError::MalformedInput("input has no header row".to_string()));
    }

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| {
            AppError::MalformedInput(format!("Failed to parse row {}: {}", rows.len() + 1, e))
        })?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }

    Ok((headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::{Cell, TypeTag};

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("a,b,c\nd,e,f"), b',');
        assert_eq!(sniff_delimiter("a;b;c\nd;e;f"), b';');
        assert_eq!(sniff_delimiter("a\tb\tc\nd\te\tf"), b'\t');
        assert_eq!(sniff_delimiter("a|b|c\nd|e|f"), b'|');
    }

    #[test]
    fn test_parse_each_separator() {
        for sep in [",", ";", "\t"] {
            let content = format!(
                "col a{s}col b{s}col c\ndata a1{s}data b1{s}z\ndata a2{s}data b2{s}a\n",
                s = sep
            );
            let table = parse(content.as_bytes(), Some("UTF-8"), None).unwrap();
            assert_eq!(table.row_count, 2, "separator {:?}", sep);
            assert_eq!(
                table.column_names(),
                vec!["col a", "col b", "col c"],
                "separator {:?}",
                sep
            );
        }
    }

    #[test]
    fn test_parse_latin1_content() {
        // "données à1" in ISO-8859-1
        let bytes = b"col a;col b\ndonn\xe9es \xe01;x\n";
        let table = parse(bytes, Some("windows-1252"), None).unwrap();
        assert_eq!(
            table.columns[0].values[0],
            Cell::Text("données à1".to_string())
        );
    }

    #[test]
    fn test_declared_encoding_wins() {
        let bytes = b"col\ndonn\xe9es\n";
        let table = parse(bytes, Some("UTF-8"), Some("iso-8859-1")).unwrap();
        assert_eq!(table.columns[0].values[0], Cell::Text("données".to_string()));
    }

    #[test]
    fn test_row_with_extra_field_still_parses() {
        let content = "col a;col b\ndata a1;data b1;2\ndata a2;data b2;4;\n";
        let table = parse(content.as_bytes(), Some("UTF-8"), None).unwrap();
        assert_eq!(table.row_count, 2);
        assert_eq!(table.columns.len(), 2);
    }

    #[test]
    fn test_row_with_missing_field_padded_with_null() {
        let content = "a,b,c\n1,2,3\n4,5\n";
        let table = parse(content.as_bytes(), Some("UTF-8"), None).unwrap();
        assert_eq!(table.row_count, 2);
        assert_eq!(table.columns[2].values[1], Cell::Null);
    }

    #[test]
    fn test_quoted_fields() {
        let content = "a,b\n\"x, y\",\"say \"\"hi\"\"\"\n";
        let table = parse(content.as_bytes(), Some("UTF-8"), None).unwrap();
        assert_eq!(table.columns[0].values[0], Cell::Text("x, y".to_string()));
        assert_eq!(
            table.columns[1].values[0],
            Cell::Text("say \"hi\"".to_string())
        );
    }

    #[test]
    fn test_types_inferred_per_column() {
        let content = "id,hour,value\nfirst,12:30,1\nsecond,9:15,2\nthird,09:45,3\n";
        let table = parse(content.as_bytes(), Some("UTF-8"), None).unwrap();
        assert_eq!(table.columns[0].inferred_type, TypeTag::Text);
        assert_eq!(table.columns[1].inferred_type, TypeTag::Time);
        assert_eq!(table.columns[2].inferred_type, TypeTag::Integer);
        assert_eq!(table.columns[1].values[1], Cell::Text("9:15".to_string()));
    }

    #[test]
    fn test_empty_input_is_malformed() {
        assert!(matches!(
            parse(b"", Some("UTF-8"), None),
            Err(AppError::MalformedInput(_))
        ));
    }
}
