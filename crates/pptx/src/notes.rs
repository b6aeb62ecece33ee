//! Speaker notes extraction.

use slidefill_core::{xml, Result};
use std::collections::HashSet;

/// Collect every text leaf of a notes part, trimmed and de-duplicated, joined
/// with single spaces. Returns `None` when the part holds no text.
pub fn extract(xml_bytes: &[u8], part: &str) -> Result<Option<String>> {
    let root = xml::parse(xml_bytes, part)?;

    let mut seen = HashSet::new();
    let mut texts: Vec<&str> = Vec::new();
    root.walk_text(&mut |text| {
        let text = text.trim();
        if !text.is_empty() && seen.insert(text) {
            texts.push(text);
        }
    });

    if texts.is_empty() {
        Ok(None)
    } else {
        Ok(Some(texts.join(" ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notes_join_trimmed_unique_texts() {
        let xml = br#"<p:notes xmlns:a="a" xmlns:p="p">
  <p:cSld><p:spTree>
    <p:sp><p:txBody><a:p><a:r><a:t> Remember the demo </a:t></a:r></a:p></p:txBody></p:sp>
    <p:sp><p:txBody>
      <a:p><a:r><a:t>Thank the team</a:t></a:r></a:p>
      <a:p><a:r><a:t>Remember the demo</a:t></a:r></a:p>
    </p:txBody></p:sp>
  </p:spTree></p:cSld>
</p:notes>"#;
        let notes = extract(xml, "notesSlide1.xml").unwrap();
        assert_eq!(notes.as_deref(), Some("Remember the demo Thank the team"));
    }

    #[test]
    fn test_notes_ignore_attribute_values() {
        let xml = br#"<p:notes><a:rPr lang="en-US"/><a:t>Only this</a:t></p:notes>"#;
        assert_eq!(extract(xml, "n.xml").unwrap().as_deref(), Some("Only this"));
    }

    #[test]
    fn test_notes_without_text_are_none() {
        let xml = b"<p:notes><p:cSld><p:spTree/></p:cSld></p:notes>";
        assert_eq!(extract(xml, "n.xml").unwrap(), None);
    }

    #[test]
    fn test_malformed_notes_error() {
        assert!(extract(b"<p:notes>", "n.xml").is_err());
    }
}
