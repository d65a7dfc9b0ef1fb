//! Content chunking.
//!
//! Splits cleaned document content into bounded, overlapping chunks that
//! are each independently embedded and indexed. Break points prefer
//! paragraph and sentence boundaries near the target size.

/// Split `text` into chunks of at most `chunk_size` bytes with `overlap`
/// bytes carried between consecutive chunks.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    if text.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let hard_end = floor_char_boundary(text, (start + chunk_size).min(text.len()));
        let end = if hard_end < text.len() {
            find_break_point(text, start, hard_end)
        } else {
            hard_end
        };

        let chunk = &text[start..end];
        if !chunk.trim().is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= text.len() {
            break;
        }

        // Carry the overlap into the next chunk
        let next = if end > start + overlap { end - overlap } else { end };
        let next = floor_char_boundary(text, next);
        // `end` is always a char boundary past `start`, so this cannot stall
        start = if next > start { next } else { end };
    }

    chunks
}

/// Find a natural break near `target`, searching a window around it.
fn find_break_point(text: &str, start: usize, target: usize) -> usize {
    let window_start = floor_char_boundary(text, target.saturating_sub(100).max(start));
    let window = &text[window_start..target];

    // Paragraph break first
    if let Some(pos) = window.rfind("\n\n") {
        let candidate = window_start + pos + 2;
        if candidate > start {
            return candidate;
        }
    }

    // Then sentence end
    for pattern in [". ", "! ", "? "] {
        if let Some(pos) = window.rfind(pattern) {
            let candidate = window_start + pos + pattern.len();
            if candidate > start {
                return candidate;
            }
        }
    }

    // Then line break
    if let Some(pos) = window.rfind('\n') {
        let candidate = window_start + pos + 1;
        if candidate > start {
            return candidate;
        }
    }

    target
}

/// Largest char boundary at or below `index`.
fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_text("short", 512, 20), vec!["short"]);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(split_text("", 512, 20).is_empty());
        assert!(split_text("   \n ", 512, 20).is_empty());
    }

    #[test]
    fn long_text_is_bounded() {
        let text = "This is a sentence. ".repeat(100);
        let chunks = split_text(&text, 512, 20);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 512, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = "word ".repeat(300);
        let chunks = split_text(&text, 200, 20);

        for window in chunks.windows(2) {
            let tail: String = window[0].chars().rev().take(10).collect();
            let tail: String = tail.chars().rev().collect();
            assert!(
                window[1].starts_with(&tail) || window[1].contains(tail.trim()),
                "no overlap between consecutive chunks"
            );
        }
    }

    #[test]
    fn chunks_cover_the_whole_text() {
        let text = "One sentence here. ".repeat(60);
        let chunks = split_text(&text, 256, 20);

        let last_words = "sentence here.";
        assert!(chunks.last().unwrap().contains(last_words));
    }

    #[test]
    fn prefers_sentence_boundaries() {
        let text = format!("{}{}", "A short sentence. ".repeat(30), "tail");
        let chunks = split_text(&text, 256, 20);

        // Every chunk except possibly the last ends at a sentence break
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.ends_with(". "), "chunk ends mid-sentence: {chunk:?}");
        }
    }

    #[test]
    fn does_not_split_inside_multibyte_characters() {
        let text = "é".repeat(400);
        let chunks = split_text(&text, 101, 10);
        for chunk in chunks {
            assert!(chunk.chars().all(|c| c == 'é'));
        }
    }
}
