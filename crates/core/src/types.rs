//! Domain types for extracted presentation content and document templates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything extracted from one presentation package.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationContent {
    /// Slides in archive order.
    pub slides: Vec<Slide>,

    pub total_slides: usize,

    /// Package-level document properties.
    pub metadata: Metadata,
}

impl PresentationContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a slide to the presentation.
    pub fn add_slide(&mut self, slide: Slide) {
        self.slides.push(slide);
        self.total_slides = self.slides.len();
    }
}

/// A single extracted slide.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    /// 1-based position in the archive's sorted slide entries.
    pub slide_number: usize,

    /// One entry per non-empty paragraph, trimmed, in document order.
    pub texts: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Images as `data:` URIs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,

    /// Untrimmed paragraph texts, empty ones included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_texts: Option<Vec<String>>,
}

impl Slide {
    /// Create a new slide with the given number.
    pub fn new(slide_number: usize) -> Self {
        Self {
            slide_number,
            ..Self::default()
        }
    }

    /// Add a paragraph's text to this slide.
    pub fn add_text(&mut self, text: impl Into<String>) {
        self.texts.push(text.into());
    }
}

/// Core document properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.author.is_none() && self.subject.is_none()
    }
}

/// A stored word-processing template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDescriptor {
    /// Millisecond timestamp of the upload, as a string.
    pub id: String,

    /// Sanitized file name.
    pub name: String,

    pub created_at: DateTime<Utc>,

    /// Field names in first-seen order.
    pub placeholders: Vec<String>,

    /// Where the store keeps the template bytes. Owned by the store.
    #[serde(default)]
    pub location: String,
}

impl TemplateDescriptor {
    /// File name for a document generated from this template at `at`.
    pub fn output_file_name(&self, at: DateTime<Utc>) -> String {
        let stem = self.name.strip_suffix(".docx").unwrap_or(&self.name);
        format!("{}_{}.docx", stem, at.timestamp_millis())
    }
}

/// Field name to replacement text, for one render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping(BTreeMap<String, String>);

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Build a mapping from a JSON object.
    ///
    /// Strings are taken verbatim, numbers and booleans are stringified, arrays
    /// are joined with newlines and nested objects are kept as JSON text.
    /// `null` values are left out, so their placeholders stay untouched.
    /// Returns `None` when `value` is not an object.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        let mut mapping = Self::new();
        for (field, value) in object {
            if let Some(text) = json_to_text(value) {
                mapping.insert(field.clone(), text);
            }
        }
        Some(mapping)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn json_to_text(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(json_to_text)
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}

/// The kind of OOXML package a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    /// PresentationML (.pptx).
    Presentation,
    /// WordprocessingML (.docx).
    WordDocument,
}

impl DocumentKind {
    /// Detect kind from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pptx" => Some(Self::Presentation),
            "docx" => Some(Self::WordDocument),
            _ => None,
        }
    }

    /// Detect kind from a file name's extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        name.rsplit_once('.')
            .and_then(|(_, ext)| Self::from_extension(ext))
    }

    /// Whether the bytes start with the zip local-file signature (PK\x03\x04).
    pub fn is_zip(bytes: &[u8]) -> bool {
        bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04])
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Presentation => "pptx",
            Self::WordDocument => "docx",
        }
    }
}
