//! Fixed-window overlapping text chunker.
//!
//! Splits normalized document text into [`Chunk`]s by sliding a fixed
//! character window across the text. Consecutive windows overlap so that
//! sentences straddling a window boundary stay retrievable.
//!
//! Each window is sanitized before emission: runs of control characters
//! (which show up when binary artifacts survive lossy decoding) collapse to
//! a single space and surrounding whitespace is trimmed. A window that
//! sanitizes to nothing is dropped, but the cursor still advances by the
//! full step — skipped regions are never re-probed at finer granularity, so
//! sparse control-heavy text can be slightly under-covered.

use chrono::Utc;
use tracing::debug;

use crate::models::Chunk;

/// Splits `text` into overlapping chunks of at most `window` characters.
///
/// Pure in its emitted text: the same input always yields the same chunk
/// sequence. Emitted `index` values number the kept chunks contiguously
/// from 0 regardless of how many windows were dropped.
pub fn chunk_text(source: &str, text: &str, window: usize, overlap: usize) -> Vec<Chunk> {
    let step = window - overlap;
    let chars: Vec<char> = text.chars().collect();
    let now = Utc::now();

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let end = (start + window).min(chars.len());
        let sanitized = sanitize_window(&chars[start..end]);

        if sanitized.is_empty() {
            start += step;
            continue;
        }

        debug!(
            chunk = chunks.len(),
            window_start = start,
            chars = sanitized.chars().count(),
            preview = %sanitized.chars().take(80).collect::<String>(),
            "chunk emitted"
        );

        chunks.push(Chunk {
            text: sanitized,
            source: source.to_string(),
            index: chunks.len() as i64,
            timestamp: now,
        });

        start += step;
    }

    debug!(source, total = chunks.len(), "chunking complete");
    chunks
}

/// True for the control-character class stripped from chunk text:
/// C0 controls except tab/newline/carriage-return, plus DEL.
fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}')
}

/// Collapses each run of stripped control characters to a single space,
/// then trims surrounding whitespace.
fn sanitize_window(window: &[char]) -> String {
    let mut out = String::with_capacity(window.len());
    let mut in_control_run = false;

    for &c in window {
        if is_stripped_control(c) {
            if !in_control_run {
                out.push(' ');
                in_control_run = true;
            }
        } else {
            out.push(c);
            in_control_run = false;
        }
    }

    out.trim().to_string()
}
