// ============================================================
// FORMAT & ENCODING DETECTION
// ============================================================
// Content sniffing only; the file name and any declared extension are
// never consulted.

use chardetng::EncodingDetector;

use crate::domain::format::{DetectedFormat, MimeClass};

/// OLE compound file header (classic .xls workbooks)
const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// ZIP local file header (OOXML workbooks)
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Bounded prefix examined for the textual probe and the encoding guess.
const SNIFF_WINDOW: usize = 64 * 1024;

/// Classify raw content and, for delimited text, guess its encoding with a
/// statistical detector. Pure function of the bytes; unsupported content is
/// a result, not an error.
pub fn detect(bytes: &[u8]) -> DetectedFormat {
    if bytes.starts_with(&OLE_MAGIC) {
        return DetectedFormat {
            mime_class: MimeClass::LegacySpreadsheet,
            encoding: None,
        };
    }
    if bytes.starts_with(&ZIP_MAGIC) {
        return DetectedFormat {
            mime_class: MimeClass::ModernSpreadsheet,
            encoding: None,
        };
    }

    let window = &bytes[..bytes.len().min(SNIFF_WINDOW)];
    if window.is_empty() || window.contains(&0) {
        return DetectedFormat::unsupported();
    }

    let mut detector = EncodingDetector::new();
    detector.feed(window, bytes.len() <= SNIFF_WINDOW);
    let encoding = detector.guess(None, true);

    DetectedFormat {
        mime_class: MimeClass::DelimitedText,
        encoding: Some(encoding.name().to_string()),
    }
}
