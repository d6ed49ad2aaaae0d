//! Text chunking for embedding context budgets.
//!
//! Splits oversized text into overlapping windows so that local embedding
//! models with small context windows can still index long segments. The
//! overlap preserves semantics across window boundaries.

/// Fraction of the window carried over into the next chunk
const OVERLAP_RATIO: f64 = 0.1;

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Returns the text unchanged as a single chunk when it already fits.
/// Otherwise slides a window of `max_chars` with a 10% overlap; when the
/// window would cut mid-word, the break moves back to the last space as long
/// as that space falls within the final 20% of the window.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 {
        return vec![text.to_string()];
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return vec![text.to_string()];
    }

    let overlap = (max_chars as f64 * OVERLAP_RATIO) as usize;
    let break_floor = (max_chars as f64 * 0.8) as usize;

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + max_chars).min(chars.len());

        // Avoid mid-word cuts, but only when the space is late enough in the
        // window that we don't throw away too much of the budget
        if end < chars.len() {
            if let Some(pos) = chars[start..end].iter().rposition(|c| *c == ' ') {
                if pos > break_floor {
                    end = start + pos;
                }
            }
        }

        chunks.push(chars[start..end].iter().collect());

        if end >= chars.len() {
            break;
        }

        // end > start + break_floor and overlap < break_floor, so the window
        // strictly advances on every iteration
        start = end - overlap;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = chunk_text("short text", 100);
        assert_eq!(chunks, vec!["short text".to_string()]);
    }

    #[test]
    fn test_exact_fit_is_single_chunk() {
        let text = "a".repeat(100);
        let chunks = chunk_text(&text, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], text);
    }

    #[test]
    fn test_chunks_respect_budget() {
        let text = "word ".repeat(500);
        for chunk in chunk_text(&text, 120) {
            assert!(chunk.chars().count() <= 120);
        }
    }

    #[test]
    fn test_overlap_reconstructs_original() {
        let text: String = "abcdefghij".repeat(50);
        let max_chars = 100;
        let overlap = max_chars / 10;

        let chunks = chunk_text(&text, max_chars);
        assert!(chunks.len() > 1);

        // Each chunk after the first starts with the previous chunk's tail,
        // so dropping the overlap prefix reassembles the input
        let mut rebuilt = chunks[0].clone();
        for chunk in &chunks[1..] {
            let rest: String = chunk.chars().skip(overlap).collect();
            rebuilt.push_str(&rest);
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_breaks_at_late_space() {
        // A space at position 90 of a 100-char window is past the 80% floor
        let mut text = "x".repeat(90);
        text.push(' ');
        text.push_str(&"y".repeat(60));

        let chunks = chunk_text(&text, 100);
        assert_eq!(chunks[0].chars().count(), 90);
        assert!(chunks[0].chars().all(|c| c == 'x'));
    }

    #[test]
    fn test_early_space_does_not_shrink_window() {
        // A single space at position 10 is ignored; the window cuts at budget
        let mut text = "x".repeat(10);
        text.push(' ');
        text.push_str(&"y".repeat(200));

        let chunks = chunk_text(&text, 100);
        assert_eq!(chunks[0].chars().count(), 100);
    }

    #[test]
    fn test_multibyte_text_chunks_on_char_boundaries() {
        let text = "日本語のテキスト ".repeat(100);
        for chunk in chunk_text(&text, 50) {
            assert!(chunk.chars().count() <= 50);
        }
    }
}
