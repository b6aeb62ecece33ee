//! In-memory access to OOXML zip packages.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Description of one entry in a package.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryInfo {
    /// Normalized path inside the archive (no leading `/`).
    pub name: String,
    /// Number embedded at the end of the file stem, e.g. 10 for `slide10.xml`.
    pub number: Option<usize>,
    pub compression: CompressionMethod,
}

/// An opened zip package. Entries are decompressed only when read.
pub struct Package {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl Package {
    /// Open a package from its raw bytes.
    pub fn open(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(bytes.into()))
            .map_err(|e| Error::CorruptArchive(format!("Failed to open ZIP: {}", e)))?;
        log::debug!("Opened package with {} entries", archive.len());
        Ok(Self { archive })
    }

    /// Number of entries in the package.
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// List entries whose names match `pattern`, sorted by embedded number.
    ///
    /// Entries without a number sort after numbered ones, by name.
    pub fn list_entries(&mut self, pattern: &Regex) -> Result<Vec<EntryInfo>> {
        let mut entries = Vec::new();
        for index in 0..self.archive.len() {
            let file = self.archive.by_index_raw(index)?;
            let name = normalize_path(file.name()).to_string();
            if !pattern.is_match(&name) {
                continue;
            }
            entries.push(EntryInfo {
                number: extract_entry_number(&name),
                compression: file.compression(),
                name,
            });
        }

        entries.sort_by(|a, b| match (a.number, b.number) {
            (Some(na), Some(nb)) => na.cmp(&nb).then_with(|| a.name.cmp(&b.name)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.name.cmp(&b.name),
        });

        Ok(entries)
    }

    /// Read an entry's bytes. A missing entry is `Ok(None)`.
    pub fn read_entry(&mut self, path: &str) -> Result<Option<Vec<u8>>> {
        let path = normalize_path(path);
        let mut file = match self.archive.by_name(path) {
            Ok(file) => file,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => {
                return Err(Error::CorruptArchive(format!(
                    "Failed to open '{}': {}",
                    path, e
                )))
            }
        };

        let mut content = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut content)
            .map_err(|e| Error::CorruptArchive(format!("Failed to read '{}': {}", path, e)))?;

        Ok(Some(content))
    }

    /// Read an entry that must exist.
    pub fn require_entry(&mut self, path: &str) -> Result<Vec<u8>> {
        self.read_entry(path)?
            .ok_or_else(|| Error::MissingPart(normalize_path(path).to_string()))
    }

    /// Write a new archive in which the entries named in `replacements` carry
    /// new content and every other entry is copied through byte-for-byte.
    ///
    /// Replaced entries keep their original compression method and position.
    pub fn rewrite(&mut self, replacements: &HashMap<String, Vec<u8>>) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for index in 0..self.archive.len() {
            let file = self.archive.by_index_raw(index)?;
            let name = normalize_path(file.name()).to_string();

            match replacements.get(&name) {
                Some(content) => {
                    let options = FileOptions::default()
                        .compression_method(writable_method(file.compression()))
                        .last_modified_time(file.last_modified());
                    let options = match file.unix_mode() {
                        Some(mode) => options.unix_permissions(mode),
                        None => options,
                    };
                    drop(file);
                    log::debug!("Writing rewritten entry '{}'", name);
                    writer.start_file(name, options)?;
                    writer.write_all(content)?;
                }
                None => writer.raw_copy_file(file)?,
            }
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }
}

/// Only stored and deflated entries are re-encoded; anything else is deflated.
fn writable_method(method: CompressionMethod) -> CompressionMethod {
    match method {
        CompressionMethod::Stored => CompressionMethod::Stored,
        _ => CompressionMethod::Deflated,
    }
}

/// Strip a leading `/` so that part names and entry names compare equal.
pub fn normalize_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Extract the number at the end of an entry's file stem,
/// e.g. 3 for `ppt/slides/slide3.xml` or `slide3.xml.rels`.
pub fn extract_entry_number(name: &str) -> Option<usize> {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    let stem = file_name.trim_end_matches(".rels").trim_end_matches(".xml");

    let digits: String = stem.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}
