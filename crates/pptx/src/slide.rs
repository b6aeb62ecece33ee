//! Slide text extraction.
//!
//! Walks `cSld/spTree` in document order. Every shape with a text body
//! contributes its paragraphs; each paragraph is the verbatim concatenation
//! of its run texts.

use slidefill_core::{xml, Node, Result, Slide};

/// Paragraph texts collected from one slide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlideTexts {
    /// Trimmed, non-empty paragraphs in shape order then paragraph order.
    pub texts: Vec<String>,
    /// Every paragraph's untrimmed concatenation, empty ones included.
    pub raw: Vec<String>,
}

/// Extract the text of one slide part.
pub fn extract(xml_bytes: &[u8], part: &str, slide_number: usize) -> Result<Slide> {
    let root = xml::parse(xml_bytes, part)?;
    let mut slide = Slide::new(slide_number);
    slide.texts = collect_texts(&root).texts;
    Ok(slide)
}

/// Collect paragraph texts from a parsed slide.
pub fn collect_texts(root: &Node) -> SlideTexts {
    let mut texts = SlideTexts::default();
    if let Some(tree) = root.find_path(&["cSld", "spTree"]) {
        collect_from_group(tree, &mut texts);
    }
    texts
}

/// Shapes are visited in document order; group shapes are entered in place.
fn collect_from_group(group: &Node, texts: &mut SlideTexts) {
    for shape in group.elements() {
        match shape.local_name() {
            "sp" => collect_from_shape(shape, texts),
            "grpSp" => collect_from_group(shape, texts),
            // Pictures, graphic frames and connectors carry no text body.
            _ => {}
        }
    }
}

fn collect_from_shape(shape: &Node, texts: &mut SlideTexts) {
    let Some(body) = shape.find_child("txBody") else {
        return;
    };

    for paragraph in body.find_all("p") {
        let text = paragraph_text(paragraph);
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            texts.texts.push(trimmed.to_string());
        }
        texts.raw.push(text);
    }
}

/// Concatenate the run texts of a paragraph, with no separators.
fn paragraph_text(paragraph: &Node) -> String {
    paragraph
        .find_all("r")
        .filter_map(|run| run.find_child("t"))
        .map(|t| t.text())
        .collect()
}
