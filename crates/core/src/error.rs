//! Error types for OOXML extraction and template rendering.

use std::fmt;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading, extracting or rendering packages.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte buffer is not a readable zip container.
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    /// A package part could not be parsed as XML.
    #[error("Malformed XML in {part}: {detail}")]
    MalformedXml { part: String, detail: String },

    /// A part whose absence is fatal was not found in the package.
    #[error("Missing part: {0}")]
    MissingPart(String),

    /// Placeholder substitution failed; carries every individual failure.
    #[error("Template render failed: {0}")]
    TemplateRender(RenderFailures),

    /// No stored template has the requested identifier.
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// The template store could not complete an operation.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The file format is not supported or could not be detected.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),
}

impl Error {
    /// Build a [`Error::MalformedXml`] for the named part.
    pub fn malformed(part: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self::MalformedXml {
            part: part.into(),
            detail: detail.to_string(),
        }
    }

    /// Stable, machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::CorruptArchive(_) => "corrupt_archive",
            Self::MalformedXml { .. } => "malformed_xml",
            Self::MissingPart(_) => "missing_part",
            Self::TemplateRender(_) => "template_render",
            Self::TemplateNotFound(_) => "template_not_found",
            Self::Storage(_) => "storage",
            Self::UnsupportedFormat(_) => "unsupported_format",
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Self::Io(e),
            other => Self::CorruptArchive(other.to_string()),
        }
    }
}

/// What went wrong with a single placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFailureKind {
    /// A `{` with no closing `}` in the same paragraph.
    UnclosedTag,
    /// A `}` with no opening `{` before it in the same paragraph.
    UnopenedTag,
    /// A second `{` before the first one was closed.
    DuplicateOpenTag,
}

impl fmt::Display for RenderFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UnclosedTag => "unclosed tag",
            Self::UnopenedTag => "unopened tag",
            Self::DuplicateOpenTag => "duplicate open tag",
        };
        f.write_str(text)
    }
}

/// A single substitution failure found while rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFailure {
    pub kind: RenderFailureKind,
    /// Zero-based index of the paragraph, in document order.
    pub paragraph: usize,
    /// The offending text fragment, as it appears in the paragraph.
    pub fragment: String,
    /// Field name, when the fragment looks like one.
    pub field: Option<String>,
}

impl fmt::Display for RenderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in paragraph {}: {:?}", self.kind, self.paragraph + 1, self.fragment)?;
        if let Some(field) = &self.field {
            write!(f, " (field '{}')", field)?;
        }
        Ok(())
    }
}

/// Every failure from one render call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderFailures(pub Vec<RenderFailure>);

impl RenderFailures {
    pub fn iter(&self) -> impl Iterator<Item = &RenderFailure> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RenderFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        f.write_str(&messages.join("; "))
    }
}
