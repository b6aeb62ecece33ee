//! PPTX package extraction.

use crate::{images, metadata, notes, slide};
use regex::Regex;
use slidefill_core::rels::{self, rel_type};
use slidefill_core::{xml, EntryInfo, Node, Package, PresentationContent, Result, Slide};
use std::sync::LazyLock;

/// Slide parts, e.g. `ppt/slides/slide12.xml`.
static SLIDE_ENTRY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ppt/slides/slide\d+\.xml$").unwrap());

/// Extractor for PPTX (Office Open XML) presentations.
#[derive(Debug, Clone)]
pub struct PptxExtractor {
    include_images: bool,
    include_notes: bool,
    include_raw_texts: bool,
}

impl PptxExtractor {
    /// Create an extractor with images and notes enabled.
    pub fn new() -> Self {
        Self {
            include_images: true,
            include_notes: true,
            include_raw_texts: false,
        }
    }

    /// Set whether slide images are fetched and encoded.
    pub fn with_images(mut self, include: bool) -> Self {
        self.include_images = include;
        self
    }

    /// Set whether speaker notes are extracted.
    pub fn with_notes(mut self, include: bool) -> Self {
        self.include_notes = include;
        self
    }

    /// Set whether untrimmed paragraph texts are kept on each slide.
    pub fn with_raw_texts(mut self, include: bool) -> Self {
        self.include_raw_texts = include;
        self
    }

    /// Extract content from the raw bytes of a .pptx file.
    pub fn extract(&self, bytes: &[u8]) -> Result<PresentationContent> {
        let mut package = Package::open(bytes)?;
        self.extract_package(&mut package)
    }

    /// Extract content from an opened package.
    ///
    /// A slide that cannot be read yields a record with no text; the
    /// remaining slides are still extracted.
    pub fn extract_package(&self, package: &mut Package) -> Result<PresentationContent> {
        let entries = package.list_entries(&SLIDE_ENTRY_REGEX)?;
        log::debug!("Found {} slide parts", entries.len());

        let mut content = PresentationContent::new();
        for (idx, entry) in entries.iter().enumerate() {
            let slide = self.parse_slide(package, entry, idx + 1);
            content.add_slide(slide);
        }

        content.metadata = metadata::extract(package);
        Ok(content)
    }

    /// Parse a single slide from the package.
    fn parse_slide(&self, package: &mut Package, entry: &EntryInfo, slide_number: usize) -> Slide {
        let root = match read_slide(package, &entry.name) {
            Ok(root) => root,
            Err(e) => {
                log::warn!("Skipping content of slide {} ({}): {}", slide_number, entry.name, e);
                return Slide::new(slide_number);
            }
        };

        let texts = slide::collect_texts(&root);
        let mut slide = Slide::new(slide_number);
        slide.texts = texts.texts;
        if self.include_raw_texts {
            slide.raw_texts = Some(texts.raw);
        }

        if self.include_images {
            let images = self.slide_images(package, &entry.name, &root);
            if !images.is_empty() {
                slide.images = Some(images);
            }
        }

        if self.include_notes {
            slide.notes = self.slide_notes(package, entry);
        }

        log::debug!(
            "Slide {}: {} paragraphs, {} images",
            slide_number,
            slide.texts.len(),
            slide.images.as_ref().map_or(0, Vec::len)
        );
        slide
    }

    fn slide_images(&self, package: &mut Package, slide_path: &str, root: &Node) -> Vec<String> {
        match rels::resolve(package, slide_path, rel_type::IMAGE) {
            Ok(map) => images::extract(package, root, &map),
            Err(e) => {
                log::warn!("Ignoring images of '{}': {}", slide_path, e);
                Vec::new()
            }
        }
    }

    fn slide_notes(&self, package: &mut Package, entry: &EntryInfo) -> Option<String> {
        let path = notes_part_for(package, entry)?;
        let bytes = match package.read_entry(&path) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Failed to read notes '{}': {}", path, e);
                return None;
            }
        };

        notes::extract(&bytes, &path).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable notes '{}': {}", path, e);
            None
        })
    }
}

impl Default for PptxExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn read_slide(package: &mut Package, path: &str) -> Result<Node> {
    let bytes = package.require_entry(path)?;
    xml::parse(&bytes, path)
}

/// The notes part of a slide: its `notesSlide` relationship when declared,
/// otherwise `ppt/notesSlides/notesSlide{N}.xml` for the slide's entry number.
fn notes_part_for(package: &mut Package, entry: &EntryInfo) -> Option<String> {
    match rels::resolve(package, &entry.name, rel_type::NOTES_SLIDE) {
        Ok(map) => {
            if let Some(target) = map.first_target() {
                return Some(target.to_string());
            }
        }
        Err(e) => log::warn!("Failed to read relationships of '{}': {}", entry.name, e),
    }

    entry
        .number
        .map(|n| format!("ppt/notesSlides/notesSlide{}.xml", n))
}
