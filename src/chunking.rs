//! Recursive separator-priority chunking.
//!
//! [`create_chunks`] turns document text into bounded, overlapping chunks and
//! stamps each one with provenance metadata (`chunk_id`, `chunk_total`,
//! `location`, and a derived `chunk_title`). Splitting works through a fixed
//! ladder of separators from coarsest to finest: paragraph breaks, line
//! breaks, sentence boundaries, spaces, and finally single characters.

use std::collections::VecDeque;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::document::{Chunk, ChunkLocation, Metadata};

/// Separator ladder, coarsest first. Character-level splitting is the
/// implicit final fallback.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Maximum length of a derived chunk title, in characters.
pub const DEFAULT_TITLE_MAX_LENGTH: usize = 100;

static MD_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+(.+)$").expect("heading pattern compiles"));
static HTML_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<[hH][1-6][^>]*>([^<]+)</[hH][1-6]>").expect("heading pattern compiles")
});

/// Split a document into chunks, copying the document metadata into each
/// chunk and adding the chunk-derived fields.
///
/// Every chunk's metadata contains all keys of `metadata` plus:
///
/// - `chunk_id` — 0-based index within the document
/// - `chunk_total` — number of chunks produced from the document
/// - `location` — `beginning`, `middle`, or `end` (`beginning` wins for a
///   single-chunk document)
/// - `chunk_title` — derived title, omitted when empty
///
/// Empty or whitespace-only text yields zero chunks. `chunk_size` is a
/// target, not a hard cap: an atomic unit that cannot be split further is
/// emitted oversized.
pub fn create_chunks(
    text: &str,
    metadata: &Metadata,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<Chunk> {
    let texts = split_text(text, chunk_size, chunk_overlap);
    let total = texts.len();

    texts
        .into_iter()
        .enumerate()
        .map(|(i, chunk_text)| {
            let mut chunk_metadata = metadata.clone();
            chunk_metadata.insert("chunk_id".to_string(), Value::from(i as u64));
            chunk_metadata.insert("chunk_total".to_string(), Value::from(total as u64));

            let location = if i == 0 {
                ChunkLocation::Beginning
            } else if i == total - 1 {
                ChunkLocation::End
            } else {
                ChunkLocation::Middle
            };
            chunk_metadata.insert("location".to_string(), Value::from(location.as_str()));

            let title = extract_chunk_title(&chunk_text, DEFAULT_TITLE_MAX_LENGTH);
            if !title.is_empty() {
                chunk_metadata.insert("chunk_title".to_string(), Value::from(title));
            }

            Chunk { text: chunk_text, metadata: chunk_metadata }
        })
        .collect()
}

/// Split raw text into chunk texts without attaching metadata.
///
/// Chunks are trimmed and empty ones dropped, so every returned string is
/// non-empty.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    split_recursive(text, chunk_size, chunk_overlap, &SEPARATORS)
        .into_iter()
        .filter_map(|chunk| {
            let trimmed = chunk.trim();
            if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
        })
        .collect()
}

/// Recurse through the separator ladder: split on the coarsest separator
/// present, pack fitting pieces greedily, and descend into oversized pieces
/// with the finer separators.
fn split_recursive(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    let Some((idx, separator)) =
        separators.iter().enumerate().find(|(_, sep)| text.contains(**sep))
    else {
        return split_chars(text, chunk_size, chunk_overlap);
    };

    let finer = &separators[idx + 1..];
    let mut chunks = Vec::new();
    let mut fitting: Vec<&str> = Vec::new();

    for piece in split_keeping_separator(text, separator) {
        if char_len(piece) <= chunk_size {
            fitting.push(piece);
        } else {
            if !fitting.is_empty() {
                chunks.extend(pack_pieces(&fitting, chunk_size, chunk_overlap));
                fitting.clear();
            }
            chunks.extend(split_recursive(piece, chunk_size, chunk_overlap, finer));
        }
    }
    if !fitting.is_empty() {
        chunks.extend(pack_pieces(&fitting, chunk_size, chunk_overlap));
    }

    chunks
}

/// Greedily pack pieces (each already within `chunk_size`) into chunks,
/// carrying up to `chunk_overlap` characters of trailing pieces into the
/// start of the next chunk.
fn pack_pieces(pieces: &[&str], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut window_len = 0usize;

    for &piece in pieces {
        let piece_len = char_len(piece);
        if window_len + piece_len > chunk_size && !window.is_empty() {
            chunks.push(window.iter().copied().collect::<String>());

            // Shrink the window down to the overlap budget before starting
            // the next chunk.
            while window_len > chunk_overlap
                || (window_len + piece_len > chunk_size && window_len > 0)
            {
                let Some(removed) = window.pop_front() else { break };
                window_len -= char_len(removed);
            }
        }
        window.push_back(piece);
        window_len += piece_len;
    }

    // The window always contains at least one piece not yet emitted.
    if !window.is_empty() {
        chunks.push(window.iter().copied().collect::<String>());
    }

    chunks
}

/// Split text at a separator, keeping the separator attached to the
/// preceding segment so chunk concatenation is lossless.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Character-level fallback splitting with overlap.
fn split_chars(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Derive a title for a chunk of text.
///
/// Tries, in order: a markdown `#` heading, an HTML `<h1>`–`<h6>` tag, the
/// first sentence, and finally the raw leading text. Titles longer than
/// `max_length` characters are truncated; sentence and raw-text titles get a
/// `...` suffix so the result is exactly `max_length` characters. The result
/// never exceeds `max_length`, even when it is too small for the suffix.
/// Empty input yields an empty title.
pub fn extract_chunk_title(text: &str, max_length: usize) -> String {
    for pattern in [&MD_HEADING, &HTML_HEADING] {
        if let Some(m) = pattern.captures(text).and_then(|caps| caps.get(1)) {
            return truncate_chars(m.as_str().trim(), max_length);
        }
    }

    let trimmed = text.trim();
    if let Some(sentence) = first_sentence(trimmed) {
        let sentence = sentence.trim();
        if !sentence.is_empty() {
            return truncate_with_ellipsis(sentence, max_length);
        }
    }

    truncate_with_ellipsis(trimmed, max_length)
}

/// The leading text up to and including the first `.`, `!`, or `?` that is
/// followed by whitespace.
fn first_sentence(text: &str) -> Option<&str> {
    let mut iter = text.char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some((_, next)) = iter.peek() {
                if next.is_whitespace() {
                    return Some(&text[..i + c.len_utf8()]);
                }
            }
        }
    }
    None
}

fn truncate_chars(text: &str, max: usize) -> String {
    if char_len(text) <= max { text.to_string() } else { text.chars().take(max).collect() }
}

fn truncate_with_ellipsis(text: &str, max: usize) -> String {
    if char_len(text) <= max {
        text.to_string()
    } else if max < 3 {
        // No room for the ellipsis; return the bare prefix.
        text.chars().take(max).collect()
    } else {
        let mut truncated: String = text.chars().take(max - 3).collect();
        truncated.push_str("...");
        truncated
    }
}
