// ============================================================
// DETECTED FORMAT
// ============================================================
// Determines which parser strategy handles a raw source

use serde::{Deserialize, Serialize};

/// Container format detected from file content, never from the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MimeClass {
    /// Delimited text (CSV and friends), any delimiter, any encoding
    DelimitedText,

    /// OLE compound file (classic .xls workbooks)
    LegacySpreadsheet,

    /// ZIP-based OOXML workbook (.xlsx)
    ModernSpreadsheet,

    /// Nothing we know how to parse
    Unsupported,
}

impl std::fmt::Display for MimeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MimeClass::DelimitedText => write!(f, "delimited text"),
            MimeClass::LegacySpreadsheet => write!(f, "legacy spreadsheet"),
            MimeClass::ModernSpreadsheet => write!(f, "modern spreadsheet"),
            MimeClass::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Outcome of content detection for one raw source.
///
/// `encoding` is only meaningful for delimited text; spreadsheet containers
/// carry their own encoding internally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedFormat {
    pub mime_class: MimeClass,
    pub encoding: Option<String>,
}

impl DetectedFormat {
    pub fn unsupported() -> Self {
        Self {
            mime_class: MimeClass::Unsupported,
            encoding: None,
        }
    }
}
