//! Slide image extraction.
//!
//! Image references (`a:blip r:embed`) may sit anywhere in a slide: picture
//! frames, group shapes, shape fills, the background. They are collected by a
//! depth-first walk, resolved through the slide's relationships and encoded
//! as `data:` URIs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use slidefill_core::{Node, Package, RelationshipMap};
use std::collections::HashSet;

/// Embed ids referenced by the slide, first-seen order, duplicates removed.
pub fn embed_ids(slide: &Node) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    slide.walk(&mut |node| {
        if !node.is("blip") {
            return;
        }
        if let Some(id) = node.attr("embed") {
            if !id.is_empty() && seen.insert(id) {
                ids.push(id.to_string());
            }
        }
    });
    ids
}

/// Fetch and encode every image the slide references.
///
/// Ids missing from `rels` and parts missing from the package are skipped.
pub fn extract(package: &mut Package, slide: &Node, rels: &RelationshipMap) -> Vec<String> {
    let mut images = Vec::new();

    for id in embed_ids(slide) {
        let Some(path) = rels.get(&id) else {
            log::debug!("No image relationship for '{}'", id);
            continue;
        };

        let bytes = match package.read_entry(path) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                log::warn!("Image part '{}' ({}) not found in package", path, id);
                continue;
            }
            Err(e) => {
                log::warn!("Failed to read image part '{}': {}", path, e);
                continue;
            }
        };

        images.push(data_uri(media_type_for(path), &bytes));
    }

    images
}

/// Media type inferred from a part's file extension; PNG when unknown.
pub fn media_type_for(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => "image/png",
    }
}

/// Encode bytes as a base64 `data:` URI.
pub fn data_uri(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}
