//! Filesystem template store.
//!
//! Each template is kept as two files in one directory: `<id>_<name>` with
//! the raw bytes and `<id>_info.json` with its descriptor.

use crate::library::TemplateStore;
use slidefill_core::{Error, Result, TemplateDescriptor};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

const INFO_SUFFIX: &str = "_info.json";

/// Stores templates under a local directory, created on first save.
#[derive(Debug, Clone)]
pub struct FsTemplateStore {
    dir: PathBuf,
}

impl FsTemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn info_path(&self, id: &str) -> Result<PathBuf> {
        validate_id(id)?;
        Ok(self.dir.join(format!("{}{}", id, INFO_SUFFIX)))
    }

    /// Path of a template file, which must be a plain file name directly in
    /// the store directory.
    fn template_path(&self, id: &str, location: &str) -> Result<PathBuf> {
        let mut components = Path::new(location).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Ok(self.dir.join(name)),
            _ => Err(Error::Storage(format!(
                "invalid location '{}' for template {}",
                location, id
            ))),
        }
    }

    fn read_info(&self, path: &Path) -> Result<TemplateDescriptor> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| Error::Storage(format!("{}: {}", path.display(), e)))
    }
}

impl TemplateStore for FsTemplateStore {
    fn save(&self, mut descriptor: TemplateDescriptor, bytes: &[u8]) -> Result<TemplateDescriptor> {
        let info_path = self.info_path(&descriptor.id)?;
        let file_name = format!("{}_{}", descriptor.id, descriptor.name);
        let template_path = self.template_path(&descriptor.id, &file_name)?;

        fs::create_dir_all(&self.dir)?;
        fs::write(template_path, bytes)?;
        descriptor.location = file_name;

        let json = serde_json::to_string_pretty(&descriptor)
            .map_err(|e| Error::Storage(e.to_string()))?;
        fs::write(&info_path, json)?;

        log::debug!("Wrote template {} to {}", descriptor.id, self.dir.display());
        Ok(descriptor)
    }

    fn descriptor(&self, id: &str) -> Result<Option<TemplateDescriptor>> {
        let path = self.info_path(id)?;
        match self.read_info(&path) {
            Ok(descriptor) => Ok(Some(descriptor)),
            Err(Error::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn load(&self, descriptor: &TemplateDescriptor) -> Result<Vec<u8>> {
        Ok(fs::read(self.template_path(&descriptor.id, &descriptor.location)?)?)
    }

    fn list(&self) -> Result<Vec<TemplateDescriptor>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut templates = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_info = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(INFO_SUFFIX));
            if !is_info {
                continue;
            }

            match self.read_info(&path) {
                Ok(descriptor) => templates.push(descriptor),
                Err(e) => log::warn!("Skipping unreadable template info {}: {}", path.display(), e),
            }
        }
        Ok(templates)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let Some(descriptor) = self.descriptor(id)? else {
            return Ok(false);
        };

        match fs::remove_file(self.template_path(id, &descriptor.location)?) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::warn!("Template file for {} was already gone", id)
            }
            Err(e) => return Err(e.into()),
        }
        fs::remove_file(self.info_path(id)?)?;
        Ok(true)
    }
}

/// Ids are used in file names; only alphanumerics are accepted.
fn validate_id(id: &str) -> Result<()> {
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(Error::Storage(format!("invalid template id '{}'", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::TemplateLibrary;
    use chrono::{TimeZone, Utc};
    use std::io::{Cursor, Write};
    use tempfile::tempdir;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn descriptor(id: &str, name: &str) -> TemplateDescriptor {
        TemplateDescriptor {
            id: id.to_string(),
            name: name.to_string(),
            created_at: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
            placeholders: vec!["name".to_string()],
            location: String::new(),
        }
    }

    #[test]
    fn test_save_writes_bytes_and_info() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("templates");
        let store = FsTemplateStore::new(&dir);
        assert_eq!(store.dir(), dir.as_path());

        let saved = store.save(descriptor("1700000000000", "a.docx"), b"bytes").unwrap();
        assert_eq!(saved.location, "1700000000000_a.docx");
        assert_eq!(fs::read(dir.join("1700000000000_a.docx")).unwrap(), b"bytes");
        assert!(dir.join("1700000000000_info.json").exists());

        assert_eq!(store.descriptor("1700000000000").unwrap(), Some(saved.clone()));
        assert_eq!(store.load(&saved).unwrap(), b"bytes");
    }

    #[test]
    fn test_missing_directory_lists_nothing() {
        let tmp = tempdir().unwrap();
        let store = FsTemplateStore::new(tmp.path().join("missing"));
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.descriptor("1").unwrap(), None);
        assert!(!store.delete("1").unwrap());
    }

    #[test]
    fn test_list_skips_unreadable_info() {
        let tmp = tempdir().unwrap();
        let store = FsTemplateStore::new(tmp.path());
        store.save(descriptor("1", "one.docx"), b"1").unwrap();
        store.save(descriptor("2", "two.docx"), b"2").unwrap();
        fs::write(tmp.path().join("3_info.json"), "{ not json").unwrap();

        let mut names: Vec<String> = store.list().unwrap().into_iter().map(|d| d.name).collect();
        names.sort();
        assert_eq!(names, vec!["one.docx", "two.docx"]);
    }

    #[test]
    fn test_delete_removes_both_files() {
        let tmp = tempdir().unwrap();
        let store = FsTemplateStore::new(tmp.path());
        store.save(descriptor("7", "x.docx"), b"x").unwrap();

        assert!(store.delete("7").unwrap());
        assert!(!tmp.path().join("7_x.docx").exists());
        assert!(!tmp.path().join("7_info.json").exists());
        assert!(!store.delete("7").unwrap());
    }

    #[test]
    fn test_ids_cannot_escape_directory() {
        let tmp = tempdir().unwrap();
        let store = FsTemplateStore::new(tmp.path().join("store"));
        assert_eq!(store.descriptor("../1").unwrap_err().kind(), "storage");

        let err = store.save(descriptor("1", "../x.docx"), b"x").unwrap_err();
        assert_eq!(err.kind(), "storage");
    }

    #[test]
    fn test_locations_must_be_plain_file_names() {
        let tmp = tempdir().unwrap();
        let store = FsTemplateStore::new(tmp.path());

        for location in ["", "..", ".", "/", "../x.docx", "/etc/passwd", "sub/x.docx"] {
            let mut outside = descriptor("1", "x.docx");
            outside.location = location.to_string();
            let err = store.load(&outside).unwrap_err();
            assert_eq!(err.kind(), "storage", "location {:?}", location);
        }
    }

    #[test]
    fn test_library_round_trip_on_disk() {
        let tmp = tempdir().unwrap();
        let library = TemplateLibrary::new(FsTemplateStore::new(tmp.path()));

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("word/document.xml", FileOptions::default()).unwrap();
        writer
            .write_all(br#"<w:document xmlns:w="w"><w:body><w:p><w:r><w:t>{client}</w:t></w:r></w:p></w:body></w:document>"#)
            .unwrap();
        let template = writer.finish().unwrap().into_inner();

        let uploaded = library.upload(&template, "quote (final).docx").unwrap();
        assert_eq!(uploaded.name, "quote__final_.docx");
        assert_eq!(library.list().unwrap(), vec![uploaded.clone()]);

        let mapping: slidefill_core::FieldMapping = [("client", "ACME")].into_iter().collect();
        let generated = library.fill(&uploaded.id, &mapping).unwrap();
        assert!(generated.file_name.starts_with("quote__final__"));

        library.delete(&uploaded.id).unwrap();
        assert!(library.list().unwrap().is_empty());
    }
}
