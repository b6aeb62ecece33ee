//! Template rendering.
//!
//! Placeholders are matched per paragraph over the concatenated text of its
//! `t` elements, so a `{field}` split across runs is still substituted. The
//! value goes into the text element holding the opening brace; the rest of
//! the token is removed from the following elements. Everything outside text
//! elements is written back unchanged.

use crate::placeholder::main_document_part;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use slidefill_core::{
    Error, FieldMapping, Package, RenderFailure, RenderFailureKind, RenderFailures, Result,
};
use std::collections::{BTreeMap, HashMap};

/// Renders `{field}` templates into new packages.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    linebreaks: bool,
}

impl TemplateRenderer {
    /// Create a renderer that turns newlines in values into line breaks.
    pub fn new() -> Self {
        Self { linebreaks: true }
    }

    /// Set whether `\n` in a value becomes a `w:br` line break.
    pub fn with_linebreaks(mut self, linebreaks: bool) -> Self {
        self.linebreaks = linebreaks;
        self
    }

    /// Render template bytes into a new package.
    pub fn render(&self, template: &[u8], mapping: &FieldMapping) -> Result<Vec<u8>> {
        let mut package = Package::open(template)?;
        self.render_package(&mut package, mapping)
    }

    /// Render an opened template. The package itself is not modified.
    pub fn render_package(&self, package: &mut Package, mapping: &FieldMapping) -> Result<Vec<u8>> {
        let part = main_document_part(package)?;
        let xml = package.require_entry(&part)?;

        let mut replacements = HashMap::new();
        if let Some(rendered) = self.render_document(&xml, &part, mapping)? {
            replacements.insert(part, rendered);
        }
        package.rewrite(&replacements)
    }

    /// Substitute placeholders in one XML part.
    ///
    /// Returns `Ok(None)` when nothing was substituted.
    pub fn render_document(
        &self,
        xml: &[u8],
        part: &str,
        mapping: &FieldMapping,
    ) -> Result<Option<Vec<u8>>> {
        let segments = collect_segments(xml, part)?;
        let plan = plan_substitutions(&segments, mapping);

        if !plan.failures.is_empty() {
            log::warn!("{} placeholder errors in '{}'", plan.failures.len(), part);
            return Err(Error::TemplateRender(RenderFailures(plan.failures)));
        }
        if plan.rewritten.is_empty() {
            log::debug!("No placeholders substituted in '{}'", part);
            return Ok(None);
        }

        log::debug!(
            "Substituted {} placeholders across {} text elements in '{}'",
            plan.substitutions,
            plan.rewritten.len(),
            part
        );
        self.write_document(xml, part, &plan.rewritten).map(Some)
    }

    /// Stream the part back out, replacing the text of rewritten elements.
    fn write_document(
        &self,
        xml: &[u8],
        part: &str,
        rewritten: &HashMap<usize, String>,
    ) -> Result<Vec<u8>> {
        let mut reader = Reader::from_reader(xml);
        reader.trim_text(false);
        let mut writer = Writer::new(Vec::with_capacity(xml.len()));

        let mut segment = 0usize;
        let mut replacing = false;

        loop {
            let event = reader.read_event().map_err(|e| Error::malformed(part, e))?;
            let written = match event {
                Event::Start(e) if e.local_name().as_ref() == b"t" => {
                    let index = segment;
                    segment += 1;
                    match rewritten.get(&index) {
                        Some(text) => {
                            replacing = true;
                            self.write_text_element(&mut writer, &e, text)
                        }
                        None => writer.write_event(Event::Start(e)),
                    }
                }
                Event::End(e) if replacing && e.local_name().as_ref() == b"t" => {
                    replacing = false;
                    writer.write_event(Event::End(e))
                }
                Event::Text(_) | Event::CData(_) if replacing => Ok(()),
                Event::Eof => break,
                other => writer.write_event(other),
            };
            written.map_err(|e| Error::malformed(part, e))?;
        }

        Ok(writer.into_inner())
    }

    /// Open a text element and write `text` into it, leaving it open.
    fn write_text_element(
        &self,
        writer: &mut Writer<Vec<u8>>,
        start: &BytesStart<'_>,
        text: &str,
    ) -> std::result::Result<(), quick_xml::Error> {
        let mut start = start.to_owned();
        let preserved = start
            .attributes()
            .flatten()
            .any(|attr| attr.key.as_ref() == b"xml:space");
        if !preserved {
            start.push_attribute(("xml:space", "preserve"));
        }

        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let line_break = if self.linebreaks { line_break_for(&name) } else { None };

        let pieces: Vec<&str> = match line_break {
            Some(_) => text.split('\n').collect(),
            None => vec![text],
        };

        for (i, piece) in pieces.iter().enumerate() {
            if let (true, Some(br)) = (i > 0, line_break) {
                writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
                writer.write_event(Event::Empty(BytesStart::new(br)))?;
            }
            writer.write_event(Event::Start(start.clone()))?;
            writer.write_event(Event::Text(BytesText::new(piece)))?;
        }
        Ok(())
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Only WordprocessingML runs take a line break between text elements.
fn line_break_for(text_element: &str) -> Option<&'static str> {
    match text_element {
        "w:t" => Some("w:br"),
        _ => None,
    }
}

/// The text of one `t` element and the paragraph it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    paragraph: usize,
    text: String,
}

/// Collect every `t` element's text in document order.
fn collect_segments(xml: &[u8], part: &str) -> Result<Vec<Segment>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);

    let mut segments: Vec<Segment> = Vec::new();
    let mut open_paragraphs: Vec<usize> = Vec::new();
    let mut next_paragraph = 0usize;
    let mut current: Option<usize> = None;

    loop {
        match reader.read_event().map_err(|e| Error::malformed(part, e))? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"p" => {
                    open_paragraphs.push(next_paragraph);
                    next_paragraph += 1;
                }
                b"t" => {
                    // A text element outside any paragraph stands alone.
                    let paragraph = match open_paragraphs.last() {
                        Some(&p) => p,
                        None => {
                            next_paragraph += 1;
                            next_paragraph - 1
                        }
                    };
                    segments.push(Segment {
                        paragraph,
                        text: String::new(),
                    });
                    current = Some(segments.len() - 1);
                }
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"p" => {
                    open_paragraphs.pop();
                }
                b"t" => current = None,
                _ => {}
            },
            Event::Text(e) => {
                if let Some(index) = current {
                    let text = e.unescape().map_err(|err| Error::malformed(part, err))?;
                    segments[index].text.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some(index) = current {
                    let data = e.into_inner();
                    segments[index].text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(segments)
}

#[derive(Debug, Default)]
struct Plan {
    /// New text per segment index, only for segments that change.
    rewritten: HashMap<usize, String>,
    failures: Vec<RenderFailure>,
    substitutions: usize,
}

/// A recognized placeholder: char range in the paragraph and its value.
struct Substitution<'a> {
    start: usize,
    end: usize,
    value: &'a str,
}

fn plan_substitutions(segments: &[Segment], mapping: &FieldMapping) -> Plan {
    let mut paragraphs: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (index, segment) in segments.iter().enumerate() {
        paragraphs.entry(segment.paragraph).or_default().push(index);
    }

    let mut plan = Plan::default();
    for (paragraph, members) in paragraphs {
        // Each char tagged with the segment it came from.
        let chars: Vec<(char, usize)> = members
            .iter()
            .flat_map(|&index| segments[index].text.chars().map(move |c| (c, index)))
            .collect();

        let substitutions = find_placeholders(&chars, paragraph, mapping, &mut plan.failures);
        if substitutions.is_empty() {
            continue;
        }
        plan.substitutions += substitutions.len();

        let mut texts: HashMap<usize, String> =
            members.iter().map(|&index| (index, String::new())).collect();
        let mut pending = substitutions.iter().peekable();
        let mut pos = 0;
        while pos < chars.len() {
            let (c, index) = chars[pos];
            if let Some(sub) = pending.next_if(|sub| sub.start == pos) {
                if let Some(text) = texts.get_mut(&index) {
                    text.push_str(sub.value);
                }
                pos = sub.end;
                continue;
            }
            if let Some(text) = texts.get_mut(&index) {
                text.push(c);
            }
            pos += 1;
        }

        for (index, text) in texts {
            if text != segments[index].text {
                plan.rewritten.insert(index, text);
            }
        }
    }

    plan
}

/// Scan one paragraph for `{field}` tokens.
///
/// Tokens whose trimmed name is in `mapping` become substitutions; any other
/// well-formed token is left exactly as written. Unbalanced braces are
/// reported as failures.
fn find_placeholders<'a>(
    chars: &[(char, usize)],
    paragraph: usize,
    mapping: &'a FieldMapping,
    failures: &mut Vec<RenderFailure>,
) -> Vec<Substitution<'a>> {
    let text_of = |range: std::ops::Range<usize>| -> String {
        chars[range].iter().map(|&(c, _)| c).collect()
    };
    let field_of = |text: &str| -> Option<String> {
        let name = text.trim_matches(|c: char| c == '{' || c == '}').trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    };

    let mut found = Vec::new();
    let mut open: Option<usize> = None;
    let mut last_close = 0usize;

    for (pos, &(c, _)) in chars.iter().enumerate() {
        match c {
            '{' => {
                if let Some(start) = open {
                    let fragment = text_of(start..pos + 1);
                    failures.push(RenderFailure {
                        kind: RenderFailureKind::DuplicateOpenTag,
                        paragraph,
                        field: field_of(&fragment),
                        fragment,
                    });
                }
                open = Some(pos);
            }
            '}' => {
                match open.take() {
                    Some(start) => {
                        let inner = text_of(start + 1..pos);
                        if let Some(value) = mapping.get(inner.trim()) {
                            found.push(Substitution {
                                start,
                                end: pos + 1,
                                value,
                            });
                        }
                    }
                    None => failures.push(RenderFailure {
                        kind: RenderFailureKind::UnopenedTag,
                        paragraph,
                        fragment: text_of(last_close..pos + 1),
                        field: None,
                    }),
                }
                last_close = pos + 1;
            }
            _ => {}
        }
    }

    if let Some(start) = open {
        let fragment = text_of(start..chars.len());
        failures.push(RenderFailure {
            kind: RenderFailureKind::UnclosedTag,
            paragraph,
            field: field_of(&fragment),
            fragment,
        });
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeholder;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn document(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr/></w:body></w:document>"#,
            body
        )
    }

    fn paragraph(runs: &[&str]) -> String {
        let runs: String = runs
            .iter()
            .map(|t| format!("<w:r><w:t>{}</w:t></w:r>", t))
            .collect();
        format!("<w:p>{}</w:p>", runs)
    }

    fn build_docx(document_xml: &str) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
        writer.start_file("[Content_Types].xml", deflated).unwrap();
        writer.write_all(b"<Types/>").unwrap();
        writer.start_file("word/document.xml", deflated).unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.start_file("word/media/image1.png", stored).unwrap();
        writer.write_all(b"binary-image").unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn read_document(bytes: Vec<u8>) -> String {
        let mut package = Package::open(bytes).unwrap();
        String::from_utf8(package.require_entry("word/document.xml").unwrap()).unwrap()
    }

    fn mapping(pairs: &[(&str, &str)]) -> FieldMapping {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_render_substitutes_known_and_keeps_unknown() {
        let xml = document(&paragraph(&["Dear {name}, today is {date}."]));
        let out = TemplateRenderer::new()
            .render(&build_docx(&xml), &mapping(&[("name", "Alice")]))
            .unwrap();

        let rendered = read_document(out);
        assert!(rendered.contains("Dear Alice, today is {date}."));
        assert_eq!(placeholder::scan(rendered.as_bytes()), vec!["date"]);
    }

    #[test]
    fn test_render_with_empty_mapping_is_byte_identical() {
        let xml = document(&paragraph(&["{name} and {date}"]));
        let out = TemplateRenderer::new()
            .render(&build_docx(&xml), &FieldMapping::new())
            .unwrap();
        assert_eq!(read_document(out), xml);
    }

    #[test]
    fn test_render_merges_placeholder_split_across_runs() {
        let xml = document(&paragraph(&["Hello {", "na", "me}!"]));
        let out = TemplateRenderer::new()
            .render(&build_docx(&xml), &mapping(&[("name", "Bob")]))
            .unwrap();

        let rendered = read_document(out);
        let root = slidefill_core::xml::parse(rendered.as_bytes(), "document.xml").unwrap();
        let mut texts = Vec::new();
        root.walk(&mut |node| {
            if node.is("t") {
                texts.push(node.text());
            }
        });
        assert_eq!(texts, vec!["Hello Bob", "", "!"]);
    }

    #[test]
    fn test_render_escapes_values_and_matches_trimmed_names() {
        let xml = document(&paragraph(&["{ company }"]));
        let out = TemplateRenderer::new()
            .render(&build_docx(&xml), &mapping(&[("company", "R&D <Labs>")]))
            .unwrap();
        let rendered = read_document(out);
        assert!(rendered.contains("R&amp;D &lt;Labs&gt;"));
        assert!(rendered.contains(r#"<w:t xml:space="preserve">"#));
    }

    #[test]
    fn test_render_turns_newlines_into_breaks() {
        let xml = document(&paragraph(&["{address}"]));
        let values = mapping(&[("address", "1 Main St\nSpringfield")]);

        let rendered = read_document(
            TemplateRenderer::new()
                .render(&build_docx(&xml), &values)
                .unwrap(),
        );
        assert!(rendered.contains(
            r#"<w:t xml:space="preserve">1 Main St</w:t><w:br/><w:t xml:space="preserve">Springfield</w:t>"#
        ));

        let rendered = read_document(
            TemplateRenderer::new()
                .with_linebreaks(false)
                .render(&build_docx(&xml), &values)
                .unwrap(),
        );
        assert!(rendered.contains("1 Main St\nSpringfield"));
        assert!(!rendered.contains("<w:br/>"));
    }

    #[test]
    fn test_render_keeps_other_entries_and_compression() {
        let xml = document(&paragraph(&["{name}"]));
        let out = TemplateRenderer::new()
            .render(&build_docx(&xml), &mapping(&[("name", "Alice")]))
            .unwrap();

        let mut package = Package::open(out).unwrap();
        assert_eq!(package.len(), 3);
        assert_eq!(
            package.read_entry("word/media/image1.png").unwrap(),
            Some(b"binary-image".to_vec())
        );
        let media = package
            .list_entries(&regex::Regex::new("^word/media/").unwrap())
            .unwrap();
        assert_eq!(media[0].compression, CompressionMethod::Stored);
    }

    #[test]
    fn test_render_reports_every_structural_failure() {
        let xml = document(&format!(
            "{}{}{}",
            paragraph(&["{unclosed"]),
            paragraph(&["fine {name}"]),
            paragraph(&["stray } brace and {a{b}"])
        ));
        let err = TemplateRenderer::new()
            .render(&build_docx(&xml), &mapping(&[("name", "Alice")]))
            .unwrap_err();

        let failures = match err {
            Error::TemplateRender(failures) => failures,
            other => panic!("expected a render error, got {:?}", other),
        };
        let kinds: Vec<(RenderFailureKind, usize)> =
            failures.iter().map(|f| (f.kind, f.paragraph)).collect();
        assert_eq!(
            kinds,
            vec![
                (RenderFailureKind::UnclosedTag, 0),
                (RenderFailureKind::UnopenedTag, 2),
                (RenderFailureKind::DuplicateOpenTag, 2),
            ]
        );
        assert_eq!(failures.0[0].field.as_deref(), Some("unclosed"));
    }

    #[test]
    fn test_render_requires_main_document() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("other.xml", FileOptions::default()).unwrap();
        writer.write_all(b"<x/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = TemplateRenderer::new()
            .render(&bytes, &FieldMapping::new())
            .unwrap_err();
        assert_eq!(err.kind(), "missing_part");
    }

    #[test]
    fn test_rendered_output_has_no_mapped_placeholders_left() {
        let xml = document(&format!(
            "{}{}",
            paragraph(&["{title}: {subtitle}"]),
            paragraph(&["By {", "author}"])
        ));
        let template = build_docx(&xml);
        let mut package = Package::open(template.clone()).unwrap();
        let fields = placeholder::scan_package(&mut package).unwrap();
        let values: FieldMapping = fields.iter().map(|f| (f.clone(), format!("<{}>", f))).collect();

        let out = TemplateRenderer::new().render(&template, &values).unwrap();
        let remaining = placeholder::scan(read_document(out).as_bytes());
        assert!(remaining.iter().all(|f| !values.contains(f)));
    }
}
