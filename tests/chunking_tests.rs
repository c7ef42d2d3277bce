//! Chunking and title-extraction behavior.

use std::collections::HashMap;

use hermes_ingest::chunking::{DEFAULT_TITLE_MAX_LENGTH, create_chunks, extract_chunk_title};
use hermes_ingest::document::Metadata;
use proptest::prelude::*;
use serde_json::Value;

fn sample_metadata() -> Metadata {
    let mut metadata = HashMap::new();
    metadata.insert("source".to_string(), Value::from("/tmp/sample.md"));
    metadata.insert("filename".to_string(), Value::from("sample.md"));
    metadata.insert("file_type".to_string(), Value::from("markdown"));
    metadata.insert("title".to_string(), Value::from("Sample Document"));
    metadata
}

#[test]
fn empty_text_yields_no_chunks() {
    assert!(create_chunks("", &sample_metadata(), 1000, 200).is_empty());
    assert!(create_chunks("   \n\n  ", &sample_metadata(), 1000, 200).is_empty());
}

#[test]
fn single_chunk_is_tagged_beginning() {
    let chunks = create_chunks("A short document.", &sample_metadata(), 1000, 200);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].metadata["location"], Value::from("beginning"));
    assert_eq!(chunks[0].metadata["chunk_id"], Value::from(0u64));
    assert_eq!(chunks[0].metadata["chunk_total"], Value::from(1u64));
}

#[test]
fn uniform_text_produces_located_chunks() {
    let text = "x".repeat(5000);
    let chunks = create_chunks(&text, &sample_metadata(), 1000, 200);

    assert!(chunks.len() >= 3, "expected at least 3 chunks, got {}", chunks.len());
    assert_eq!(chunks[0].metadata["location"], Value::from("beginning"));
    assert_eq!(chunks[chunks.len() - 1].metadata["location"], Value::from("end"));
    for chunk in &chunks[1..chunks.len() - 1] {
        assert_eq!(chunk.metadata["location"], Value::from("middle"));
    }
}

#[test]
fn chunk_ids_are_contiguous_and_metadata_propagates() {
    let text = (0..400).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
    let metadata = sample_metadata();
    let chunks = create_chunks(&text, &metadata, 200, 40);

    assert!(chunks.len() > 1);
    for (i, chunk) in chunks.iter().enumerate() {
        assert!(!chunk.text.is_empty());
        assert_eq!(chunk.metadata["chunk_id"], Value::from(i as u64));
        assert_eq!(chunk.metadata["chunk_total"], Value::from(chunks.len() as u64));
        for (key, value) in &metadata {
            assert_eq!(chunk.metadata.get(key), Some(value), "metadata key {key} lost");
        }
    }
}

#[test]
fn consecutive_chunks_share_overlap() {
    let text = (0..200).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
    let chunks = create_chunks(&text, &sample_metadata(), 100, 30);

    assert!(chunks.len() > 1);
    for window in chunks.windows(2) {
        let first_word = window[1].text.split_whitespace().next().unwrap();
        assert!(
            window[0].text.contains(first_word),
            "no overlap between '{}' and '{}'",
            window[0].text,
            window[1].text
        );
    }
}

#[test]
fn oversized_atomic_unit_is_emitted() {
    // A single 500-char word cannot be split on any separator short of
    // characters; character-level splitting still bounds it.
    let word = "y".repeat(500);
    let text = format!("short intro. {word}");
    let chunks = create_chunks(&text, &sample_metadata(), 100, 20);
    assert!(!chunks.is_empty());
    let recombined: String = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("");
    assert!(recombined.contains(&word[..100]));
}

#[test]
fn title_from_markdown_header() {
    let title = extract_chunk_title("# Sample Header\n\nSome content.", DEFAULT_TITLE_MAX_LENGTH);
    assert_eq!(title, "Sample Header");
}

#[test]
fn title_from_html_header() {
    let title =
        extract_chunk_title("<h1>Sample Header</h1>\n\nSome content.", DEFAULT_TITLE_MAX_LENGTH);
    assert_eq!(title, "Sample Header");
}

#[test]
fn title_from_first_sentence() {
    let title = extract_chunk_title(
        "This is a first sentence. This is a second sentence.",
        DEFAULT_TITLE_MAX_LENGTH,
    );
    assert_eq!(title, "This is a first sentence.");
}

#[test]
fn long_title_is_truncated_with_ellipsis() {
    let text = "a".repeat(150);
    let title = extract_chunk_title(&text, DEFAULT_TITLE_MAX_LENGTH);
    assert_eq!(title.chars().count(), DEFAULT_TITLE_MAX_LENGTH);
    assert!(title.ends_with("..."));
}

#[test]
fn tiny_title_limits_never_overflow() {
    assert_eq!(extract_chunk_title("abcdef", 3), "...");
    assert_eq!(extract_chunk_title("abcdef", 2), "ab");
    assert_eq!(extract_chunk_title("abcdef", 0), "");
}

#[test]
fn empty_text_yields_empty_title() {
    assert_eq!(extract_chunk_title("", DEFAULT_TITLE_MAX_LENGTH), "");
}

#[test]
fn chunk_title_is_added_when_derivable() {
    let chunks = create_chunks("# Intro\n\nBody text here.", &sample_metadata(), 1000, 200);
    assert_eq!(chunks[0].metadata["chunk_title"], Value::from("Intro"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn chunk_invariants_hold(text in "[ -~]{0,1500}(\n\n[ -~]{0,300}){0,3}") {
        let metadata = sample_metadata();
        let chunks = create_chunks(&text, &metadata, 100, 20);

        prop_assert_eq!(chunks.is_empty(), text.trim().is_empty());

        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert!(!chunk.text.trim().is_empty());
            prop_assert_eq!(chunk.metadata.get("chunk_id"), Some(&Value::from(i as u64)));
            prop_assert_eq!(
                chunk.metadata.get("chunk_total"),
                Some(&Value::from(chunks.len() as u64))
            );

            let expected_location = if i == 0 {
                "beginning"
            } else if i == chunks.len() - 1 {
                "end"
            } else {
                "middle"
            };
            prop_assert_eq!(chunk.metadata.get("location"), Some(&Value::from(expected_location)));

            for (key, value) in &metadata {
                prop_assert_eq!(chunk.metadata.get(key), Some(value));
            }
        }
    }
}
