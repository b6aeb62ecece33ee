//! Relationship side-file (`.rels`) resolution.

use crate::archive::{normalize_path, Package};
use crate::error::Result;
use crate::xml;
use std::collections::HashMap;

/// Relationship type names, matched against the last segment of a `Type` URI.
pub mod rel_type {
    pub const IMAGE: &str = "image";
    pub const NOTES_SLIDE: &str = "notesSlide";
    pub const OFFICE_DOCUMENT: &str = "officeDocument";
    pub const CORE_PROPERTIES: &str = "core-properties";
}

/// Relationship id to absolute in-archive target path, for one part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipMap {
    targets: HashMap<String, String>,
}

impl RelationshipMap {
    pub fn get(&self, id: &str) -> Option<&str> {
        self.targets.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.targets.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Target with the lowest id; used for singleton relationships.
    pub fn first_target(&self) -> Option<&str> {
        let mut ids: Vec<&String> = self.targets.keys().collect();
        ids.sort();
        ids.first().and_then(|id| self.get(id))
    }

    pub fn insert(&mut self, id: impl Into<String>, target: impl Into<String>) {
        self.targets.insert(id.into(), target.into());
    }
}

/// Path of the `.rels` side-file for a part.
///
/// `ppt/slides/slide1.xml` maps to `ppt/slides/_rels/slide1.xml.rels`;
/// the package root (empty path) maps to `_rels/.rels`.
pub fn rels_path_for(part_path: &str) -> String {
    let part_path = normalize_path(part_path);
    match part_path.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part_path),
    }
}

/// Resolve the relationships of `part_path` whose type matches `type_filter`.
///
/// A part without a `.rels` file has no relationships; that is not an error.
/// External targets are skipped.
pub fn resolve(package: &mut Package, part_path: &str, type_filter: &str) -> Result<RelationshipMap> {
    let rels_path = rels_path_for(part_path);
    let mut map = RelationshipMap::default();

    let Some(bytes) = package.read_entry(&rels_path)? else {
        log::debug!("No relationships for '{}'", part_path);
        return Ok(map);
    };

    let root = xml::parse(&bytes, &rels_path)?;
    let base_dir = parent_dir(normalize_path(part_path));

    for rel in root.find_all("Relationship") {
        let (Some(id), Some(target), Some(kind)) = (rel.attr("Id"), rel.attr("Target"), rel.attr("Type"))
        else {
            continue;
        };
        if id.is_empty() || target.is_empty() || !type_matches(kind, type_filter) {
            continue;
        }
        if rel.attr("TargetMode") == Some("External") {
            continue;
        }
        map.insert(id, resolve_target(base_dir, target));
    }

    log::debug!(
        "Resolved {} '{}' relationships for '{}'",
        map.len(),
        type_filter,
        part_path
    );
    Ok(map)
}

/// Locate a package-level part through `_rels/.rels`, falling back to a
/// conventional path when the package does not declare one.
pub fn package_part(package: &mut Package, type_filter: &str, fallback: &str) -> Result<String> {
    let map = resolve(package, "", type_filter)?;
    Ok(map
        .first_target()
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string()))
}

fn type_matches(kind: &str, filter: &str) -> bool {
    kind.rsplit('/').next() == Some(filter)
}

fn parent_dir(part_path: &str) -> &str {
    part_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Resolve a relationship target against the owning part's directory.
///
/// `../media/image1.png` from `ppt/slides` becomes `ppt/media/image1.png`;
/// a target starting with `/` is already package-absolute.
pub fn resolve_target(base_dir: &str, target: &str) -> String {
    let mut segments: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else {
        base_dir.split('/').filter(|s| !s.is_empty()).collect()
    };

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}
