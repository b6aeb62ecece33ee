//! Core document properties (`docProps/core.xml`).

use slidefill_core::rels::{self, rel_type};
use slidefill_core::{xml, Metadata, Node, Package};

/// Conventional location of the core-properties part.
pub const CORE_PROPERTIES_PART: &str = "docProps/core.xml";

/// Read title, author and subject from the package's core properties.
///
/// A missing or unreadable part yields empty metadata, never an error.
pub fn extract(package: &mut Package) -> Metadata {
    let part = match rels::package_part(package, rel_type::CORE_PROPERTIES, CORE_PROPERTIES_PART) {
        Ok(part) => part,
        Err(e) => {
            log::warn!("Failed to read package relationships: {}", e);
            CORE_PROPERTIES_PART.to_string()
        }
    };

    let bytes = match package.read_entry(&part) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            log::debug!("No core properties part at '{}'", part);
            return Metadata::default();
        }
        Err(e) => {
            log::warn!("Failed to read '{}': {}", part, e);
            return Metadata::default();
        }
    };

    match xml::parse(&bytes, &part) {
        Ok(root) => from_core_properties(&root),
        Err(e) => {
            log::warn!("Ignoring unreadable core properties: {}", e);
            Metadata::default()
        }
    }
}

fn from_core_properties(root: &Node) -> Metadata {
    Metadata {
        title: property(root, "title"),
        author: property(root, "creator"),
        subject: property(root, "subject"),
    }
}

fn property(root: &Node, name: &str) -> Option<String> {
    let text = root.find_child(name)?.text();
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
