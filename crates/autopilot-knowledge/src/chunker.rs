//! Paragraph-based text chunking with trailing overlap.

/// Target characters per chunk.
pub const CHUNK_SIZE: usize = 600;
/// Characters carried over from the end of one chunk into the next.
pub const CHUNK_OVERLAP: usize = 100;

/// Split text into overlapping chunks on paragraph boundaries.
///
/// Paragraphs (separated by blank lines) are accumulated until adding the
/// next one would exceed `chunk_size`; the current chunk is then closed and
/// the next one is seeded with the last `overlap` characters of it. A single
/// paragraph larger than `chunk_size` becomes its own chunk rather than
/// being split mid-paragraph.
///
/// Never returns zero chunks for non-empty input: if no paragraph survives
/// the accumulation, the whole trimmed document is returned as one chunk.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let trimmed = text.trim();
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for para in split_paragraphs(trimmed) {
        if current.chars().count() + para.chars().count() + 2 > chunk_size && !current.is_empty() {
            let closed = current.trim().to_string();
            let tail = trailing_chars(&closed, overlap);
            chunks.push(closed);
            if overlap > 0 && !tail.is_empty() {
                current = format!("{}\n\n{}", tail, para);
            } else {
                current = para.to_string();
            }
        } else if current.is_empty() {
            current = para.to_string();
        } else {
            current.push_str("\n\n");
            current.push_str(para);
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    if chunks.is_empty() {
        vec![trimmed.to_string()]
    } else {
        chunks
    }
}

/// Split on runs of blank lines, dropping empty paragraphs.
fn split_paragraphs(text: &str) -> Vec<&str> {
    let mut paragraphs = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\n' {
            let mut j = i + 1;
            let mut newlines = 1;
            while j < bytes.len() && (bytes[j] == b'\n' || bytes[j] == b'\r') {
                if bytes[j] == b'\n' {
                    newlines += 1;
                }
                j += 1;
            }
            if newlines >= 2 {
                paragraphs.push(text[start..i].trim());
                start = j;
                i = j;
                continue;
            }
        }
        i += 1;
    }
    paragraphs.push(text[start..].trim());
    paragraphs.retain(|p| !p.is_empty());
    paragraphs
}

/// Last `n` characters of a string, on char boundaries.
fn trailing_chars(s: &str, n: usize) -> String {
    let count = s.chars().count();
    if count <= n {
        // Matching paragraphs shorter than the overlap are not re-seeded;
        // the whole chunk would just repeat.
        return String::new();
    }
    s.chars().skip(count - n).collect()
}
