//! Format-specific text and metadata extraction.
//!
//! Formats are a closed set of [`DocumentFormat`] variants selected by file
//! extension; supporting a new format means adding a variant, not a new
//! type. Every extractor produces a [`Document`] whose metadata contains at
//! least `source`, `filename`, and `file_type`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use crate::document::{Document, Metadata};
use crate::error::{IngestError, Result};

static FRONT_MATTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A---\s*\n(.*?)\n---\s*\n").expect("front matter pattern compiles")
});

/// The document formats this crate can extract natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Plain text (`txt`, `text`).
    Text,
    /// Markdown (`md`, `markdown`); YAML-style front matter becomes metadata.
    Markdown,
    /// HTML (`html`, `htm`); script and style content is stripped.
    Html,
}

impl DocumentFormat {
    /// Look up the format for a file extension (without dot, case-insensitive).
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "txt" | "text" => Some(DocumentFormat::Text),
            "md" | "markdown" => Some(DocumentFormat::Markdown),
            "html" | "htm" => Some(DocumentFormat::Html),
            _ => None,
        }
    }

    /// The `file_type` metadata value for this format.
    pub fn file_type(&self) -> &'static str {
        match self {
            DocumentFormat::Text => "text",
            DocumentFormat::Markdown => "markdown",
            DocumentFormat::Html => "html",
        }
    }
}

/// Extracts text and metadata from one document file.
#[derive(Debug, Clone)]
pub struct Extractor {
    path: PathBuf,
    format: DocumentFormat,
}

impl Extractor {
    /// Resolve the extractor for a file path from its extension.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::UnsupportedFormat`] when no format matches the
    /// extension, or [`IngestError::Extraction`] when the file does not exist.
    pub fn for_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let extension = file_extension(&path);
        let format = DocumentFormat::from_extension(&extension)
            .ok_or(IngestError::UnsupportedFormat { extension })?;

        if !path.exists() {
            return Err(IngestError::Extraction {
                source_name: path.display().to_string(),
                message: "file not found".to_string(),
            });
        }

        Ok(Self { path, format })
    }

    /// The resolved format of this file.
    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// Extract text and metadata as a [`Document`].
    pub fn extract(&self) -> Result<Document> {
        let text = self.extract_text()?;
        let metadata = self.extract_metadata()?;
        debug!(
            path = %self.path.display(),
            file_type = self.format.file_type(),
            text_len = text.len(),
            "extracted document"
        );
        Ok(Document { text, metadata })
    }

    /// Extract the text content of the document.
    pub fn extract_text(&self) -> Result<String> {
        let content = self.read()?;
        Ok(match self.format {
            DocumentFormat::Text | DocumentFormat::Markdown => content,
            DocumentFormat::Html => html_text(&Html::parse_document(&content)),
        })
    }

    /// Extract document metadata.
    ///
    /// Always contains `source`, `filename`, and `file_type`; other keys are
    /// format-specific (word counts, front matter, HTML title and meta tags).
    pub fn extract_metadata(&self) -> Result<Metadata> {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), Value::from(self.path.display().to_string()));
        metadata.insert("filename".to_string(), Value::from(file_name(&self.path)));
        metadata.insert("file_type".to_string(), Value::from(self.format.file_type()));

        let content = self.read()?;
        match self.format {
            DocumentFormat::Text => {
                if let Ok(file_meta) = fs::metadata(&self.path) {
                    let size_kb = (file_meta.len() as f64 / 1024.0 * 100.0).round() / 100.0;
                    metadata.insert("size_kb".to_string(), Value::from(size_kb));
                }
                metadata
                    .insert("word_count".to_string(), Value::from(word_count(&content) as u64));
                metadata.insert(
                    "line_count".to_string(),
                    Value::from(content.lines().count() as u64),
                );
            }
            DocumentFormat::Markdown => {
                if let Some(caps) = FRONT_MATTER.captures(&content) {
                    for line in caps[1].lines() {
                        if let Some((key, value)) = line.split_once(':') {
                            let key = key.trim().to_ascii_lowercase();
                            if !key.is_empty() {
                                metadata.insert(key, Value::from(value.trim()));
                            }
                        }
                    }
                }
                metadata
                    .insert("word_count".to_string(), Value::from(word_count(&content) as u64));
            }
            DocumentFormat::Html => {
                let html = Html::parse_document(&content);
                html_metadata(&html, &mut metadata);
                let text = html_text(&html);
                metadata.insert("word_count".to_string(), Value::from(word_count(&text) as u64));
            }
        }

        Ok(metadata)
    }

    fn read(&self) -> Result<String> {
        fs::read_to_string(&self.path).map_err(|e| IngestError::Extraction {
            source_name: self.path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// The lowercase file extension (without dot), empty when absent.
pub fn file_extension(path: &Path) -> String {
    path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_ascii_lowercase()
}

/// The file name component of a path, falling back to the full path string.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Collect visible text from an HTML document, skipping script and style
/// content.
fn html_text(html: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in html.tree.nodes() {
        let Some(text) = node.value().as_text() else { continue };
        let in_skipped = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| matches!(e.name(), "script" | "style")))
            .unwrap_or(false);
        if in_skipped {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }
    parts.join(" ")
}

/// Pull the `<title>` (falling back to the first `<h1>`) and `<meta>` tag
/// values out of an HTML document.
fn html_metadata(html: &Html, metadata: &mut Metadata) {
    if let Ok(selector) = Selector::parse("title") {
        if let Some(title) = html.select(&selector).next() {
            let title = title.text().collect::<String>().trim().to_string();
            if !title.is_empty() {
                metadata.insert("title".to_string(), Value::from(title));
            }
        }
    }

    if let Ok(selector) = Selector::parse("meta") {
        for meta in html.select(&selector) {
            let Some(content) = meta.value().attr("content") else { continue };
            if content.is_empty() {
                continue;
            }
            if let Some(name) = meta.value().attr("name") {
                let name = name.to_ascii_lowercase();
                if !name.is_empty() {
                    metadata.insert(name, Value::from(content));
                }
            }
            if let Some(property) = meta.value().attr("property") {
                let property = property.to_ascii_lowercase();
                if property.starts_with("og:") {
                    metadata.insert(property, Value::from(content));
                }
            }
        }
    }

    if !metadata.contains_key("title") {
        if let Ok(selector) = Selector::parse("h1") {
            if let Some(h1) = html.select(&selector).next() {
                let title = h1.text().collect::<String>().trim().to_string();
                if !title.is_empty() {
                    metadata.insert("title".to_string(), Value::from(title));
                }
            }
        }
    }
}
