//! Parsing of Tesseract's TSV output
//!
//! Columns: level, page_num, block_num, par_num, line_num, word_num, left,
//! top, width, height, conf, text. Structural rows (page/block/line) carry a
//! confidence of -1 and no text.

use crate::engine::OcrToken;

const CONF_COLUMN: usize = 10;
const TEXT_COLUMN: usize = 11;

/// Convert TSV text into one token per data row.
/// The header row and rows without a numeric confidence are skipped.
pub fn parse_tokens(tsv: &str) -> Vec<OcrToken> {
    tsv.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let columns: Vec<&str> = line.split('\t').collect();
            let confidence = columns.get(CONF_COLUMN)?.trim().parse::<f32>().ok()?;
            let text = columns.get(TEXT_COLUMN).copied().unwrap_or("");
            Some(OcrToken::new(text.trim(), confidence))
        })
        .collect()
}
