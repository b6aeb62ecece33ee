//! Template library: upload, list, fetch, delete and fill stored templates.

use crate::placeholder;
use crate::render::TemplateRenderer;
use chrono::{DateTime, Utc};
use regex::Regex;
use slidefill_core::{DocumentKind, Error, FieldMapping, Package, Result, TemplateDescriptor};
use std::sync::LazyLock;

/// Characters not allowed in a stored template name.
static UNSAFE_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9\x{4e00}-\x{9fa5}._-]").unwrap());

/// Persistence for template bytes and their descriptors.
pub trait TemplateStore {
    /// Persist a new template. Returns the descriptor with its location set.
    fn save(&self, descriptor: TemplateDescriptor, bytes: &[u8]) -> Result<TemplateDescriptor>;

    /// Look up a descriptor by id.
    fn descriptor(&self, id: &str) -> Result<Option<TemplateDescriptor>>;

    /// Read the template bytes a descriptor points at.
    fn load(&self, descriptor: &TemplateDescriptor) -> Result<Vec<u8>>;

    /// Every stored descriptor, in no particular order.
    fn list(&self) -> Result<Vec<TemplateDescriptor>>;

    /// Remove a template. Returns `false` if it did not exist.
    fn delete(&self, id: &str) -> Result<bool>;
}

/// A document generated from a template.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Template workflow over a [`TemplateStore`].
#[derive(Debug)]
pub struct TemplateLibrary<S> {
    store: S,
    renderer: TemplateRenderer,
}

impl<S: TemplateStore> TemplateLibrary<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            renderer: TemplateRenderer::new(),
        }
    }

    /// Use a differently configured renderer for `fill`.
    pub fn with_renderer(mut self, renderer: TemplateRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Scan and store a .docx template.
    pub fn upload(&self, bytes: &[u8], file_name: &str) -> Result<TemplateDescriptor> {
        if DocumentKind::from_file_name(file_name) != Some(DocumentKind::WordDocument) {
            return Err(Error::UnsupportedFormat(format!(
                "'{}' is not a .docx file",
                file_name
            )));
        }

        let mut package = Package::open(bytes)?;
        let placeholders = placeholder::scan_package(&mut package)?;

        let created_at = Utc::now();
        let descriptor = TemplateDescriptor {
            id: self.next_id(created_at)?,
            name: sanitize_file_name(file_name),
            created_at,
            placeholders,
            location: String::new(),
        };

        let descriptor = self.store.save(descriptor, bytes)?;
        log::debug!(
            "Stored template '{}' as {} with {} placeholders",
            descriptor.name,
            descriptor.id,
            descriptor.placeholders.len()
        );
        Ok(descriptor)
    }

    /// Stored templates, newest first.
    pub fn list(&self) -> Result<Vec<TemplateDescriptor>> {
        let mut templates = self.store.list()?;
        templates.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(templates)
    }

    pub fn get(&self, id: &str) -> Result<TemplateDescriptor> {
        self.store
            .descriptor(id)?
            .ok_or_else(|| Error::TemplateNotFound(id.to_string()))
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        if self.store.delete(id)? {
            log::debug!("Deleted template {}", id);
            Ok(())
        } else {
            Err(Error::TemplateNotFound(id.to_string()))
        }
    }

    /// Render a stored template with `mapping`. The stored bytes are not
    /// modified.
    pub fn fill(&self, id: &str, mapping: &FieldMapping) -> Result<GeneratedDocument> {
        let descriptor = self.get(id)?;
        let template = self.store.load(&descriptor)?;
        let bytes = self.renderer.render(&template, mapping)?;

        Ok(GeneratedDocument {
            file_name: descriptor.output_file_name(Utc::now()),
            bytes,
        })
    }

    /// Millisecond timestamp, bumped past any id already in use.
    fn next_id(&self, at: DateTime<Utc>) -> Result<String> {
        let mut millis = at.timestamp_millis();
        while self.store.descriptor(&millis.to_string())?.is_some() {
            millis += 1;
        }
        Ok(millis.to_string())
    }
}

/// Replace every character outside the allowed set with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    UNSAFE_NAME_CHARS.replace_all(name, "_").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::{Cursor, Write};
    use std::sync::Mutex;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    #[derive(Default)]
    struct MemoryStore {
        templates: Mutex<BTreeMap<String, (TemplateDescriptor, Vec<u8>)>>,
    }

    impl TemplateStore for MemoryStore {
        fn save(&self, mut descriptor: TemplateDescriptor, bytes: &[u8]) -> Result<TemplateDescriptor> {
            descriptor.location = format!("memory:{}", descriptor.id);
            self.templates
                .lock()
                .unwrap()
                .insert(descriptor.id.clone(), (descriptor.clone(), bytes.to_vec()));
            Ok(descriptor)
        }

        fn descriptor(&self, id: &str) -> Result<Option<TemplateDescriptor>> {
            Ok(self.templates.lock().unwrap().get(id).map(|(d, _)| d.clone()))
        }

        fn load(&self, descriptor: &TemplateDescriptor) -> Result<Vec<u8>> {
            self.templates
                .lock()
                .unwrap()
                .get(&descriptor.id)
                .map(|(_, bytes)| bytes.clone())
                .ok_or_else(|| Error::Storage(descriptor.location.clone()))
        }

        fn list(&self) -> Result<Vec<TemplateDescriptor>> {
            Ok(self
                .templates
                .lock()
                .unwrap()
                .values()
                .map(|(d, _)| d.clone())
                .collect())
        }

        fn delete(&self, id: &str) -> Result<bool> {
            Ok(self.templates.lock().unwrap().remove(id).is_some())
        }
    }

    fn build_docx(text: &str) -> Vec<u8> {
        let xml = format!(
            r#"<w:document xmlns:w="w"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>"#,
            text
        );
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("word/document.xml", FileOptions::default()).unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("offer letter (v2).docx"), "offer_letter__v2_.docx");
        assert_eq!(sanitize_file_name("合同模板-2024.docx"), "合同模板-2024.docx");
        assert_eq!(sanitize_file_name("../etc/passwd.docx"), ".._etc_passwd.docx");
    }

    #[test]
    fn test_upload_scans_and_stores() {
        let library = TemplateLibrary::new(MemoryStore::default());
        let descriptor = library
            .upload(&build_docx("Dear {name}, on {date}"), "letter.docx")
            .unwrap();

        assert_eq!(descriptor.name, "letter.docx");
        assert_eq!(descriptor.placeholders, vec!["name", "date"]);
        assert_eq!(descriptor.location, format!("memory:{}", descriptor.id));
        assert!(descriptor.id.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(library.get(&descriptor.id).unwrap(), descriptor);
    }

    #[test]
    fn test_upload_rejects_non_docx() {
        let library = TemplateLibrary::new(MemoryStore::default());
        let err = library.upload(&build_docx("{x}"), "deck.pptx").unwrap_err();
        assert_eq!(err.kind(), "unsupported_format");

        let err = library.upload(b"not a zip", "broken.docx").unwrap_err();
        assert_eq!(err.kind(), "corrupt_archive");
        assert!(library.list().unwrap().is_empty());
    }

    #[test]
    fn test_ids_are_unique_and_list_is_newest_first() {
        let library = TemplateLibrary::new(MemoryStore::default());
        let first = library.upload(&build_docx("{a}"), "a.docx").unwrap();
        let second = library.upload(&build_docx("{b}"), "b.docx").unwrap();
        assert_ne!(first.id, second.id);

        let listed: Vec<String> = library.list().unwrap().into_iter().map(|d| d.name).collect();
        assert_eq!(listed, vec!["b.docx", "a.docx"]);
    }

    #[test]
    fn test_fill_renders_without_touching_stored_bytes() {
        let library = TemplateLibrary::new(MemoryStore::default());
        let template = build_docx("Hello {name}");
        let descriptor = library.upload(&template, "greeting.docx").unwrap();

        let mapping: FieldMapping = [("name", "Alice")].into_iter().collect();
        let generated = library.fill(&descriptor.id, &mapping).unwrap();

        assert!(generated.file_name.starts_with("greeting_"));
        assert!(generated.file_name.ends_with(".docx"));
        let mut package = Package::open(generated.bytes).unwrap();
        let xml = package.require_entry("word/document.xml").unwrap();
        assert!(String::from_utf8(xml).unwrap().contains("Hello Alice"));

        assert_eq!(library.store().load(&descriptor).unwrap(), template);
    }

    #[test]
    fn test_unknown_ids_are_not_found() {
        let library = TemplateLibrary::new(MemoryStore::default());
        assert_eq!(library.get("42").unwrap_err().kind(), "template_not_found");
        assert_eq!(library.delete("42").unwrap_err().kind(), "template_not_found");
        assert_eq!(
            library.fill("42", &FieldMapping::new()).unwrap_err().kind(),
            "template_not_found"
        );
    }

    #[test]
    fn test_delete_removes_template() {
        let library = TemplateLibrary::new(MemoryStore::default());
        let descriptor = library.upload(&build_docx("{x}"), "x.docx").unwrap();
        library.delete(&descriptor.id).unwrap();
        assert!(library.list().unwrap().is_empty());
    }
}
