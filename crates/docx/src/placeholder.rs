//! Placeholder scanning for `{field}` templates.
//!
//! Markup is stripped from the main document part and the remaining text is
//! scanned for single-brace tokens. A placeholder whose braces were split
//! across runs is still found here, because stripping joins the runs; one
//! split across paragraphs is found too but will fail to render.

use quick_xml::escape::unescape;
use regex::Regex;
use slidefill_core::rels::{self, rel_type};
use slidefill_core::{Package, Result};
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Conventional location of the main document part.
pub const MAIN_DOCUMENT_PART: &str = "word/document.xml";

/// Any markup tag.
static MARKUP_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// A single-brace token: `{name}`.
static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").unwrap());

/// Field names found in raw document XML, in first-seen order.
pub fn scan(document_xml: &[u8]) -> Vec<String> {
    let xml = String::from_utf8_lossy(document_xml);
    let stripped = MARKUP_REGEX.replace_all(&xml, "");
    let text = unescape(&stripped).unwrap_or_else(|e| {
        log::debug!("Scanning escaped text as-is: {}", e);
        Cow::Borrowed(stripped.as_ref())
    });

    let mut seen = HashSet::new();
    let mut fields = Vec::new();
    for caps in PLACEHOLDER_REGEX.captures_iter(&text) {
        let name = caps[1].trim();
        if !is_field_name(name) {
            continue;
        }
        if seen.insert(name.to_string()) {
            fields.push(name.to_string());
        }
    }

    log::debug!("Found {} placeholders", fields.len());
    fields
}

/// Field names of a template package's main document part.
pub fn scan_package(package: &mut Package) -> Result<Vec<String>> {
    let part = main_document_part(package)?;
    let xml = package.require_entry(&part)?;
    Ok(scan(&xml))
}

/// Path of the main document part, from the package relationships when
/// declared.
pub fn main_document_part(package: &mut Package) -> Result<String> {
    rels::package_part(package, rel_type::OFFICE_DOCUMENT, MAIN_DOCUMENT_PART)
}

/// Empty names and leftovers of partially stripped markup are rejected.
pub fn is_field_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(|c: char| c == '<' || c == '>')
}
