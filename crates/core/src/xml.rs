//! Generic ordered XML tree.
//!
//! Office parts are parsed into [`Node`]s that keep every child in document
//! order. Repeated siblings (runs, paragraphs) stay a sequence, so reading
//! order survives the parse.

use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// A child of an element: either another element or a text leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    Element(Node),
    Text(String),
}

/// An XML element with its attributes and ordered children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    /// Qualified tag name as written, e.g. `p:sp`.
    pub tag: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Child>,
}

impl Node {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Tag name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        local_name(&self.tag)
    }

    /// True when the tag's local name equals `name`.
    pub fn is(&self, name: &str) -> bool {
        self.local_name() == name
    }

    /// Look up an attribute by qualified name (`r:embed`) or local name (`embed`).
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .or_else(|| self.attributes.iter().find(|(key, _)| local_name(key) == name))
            .map(|(_, value)| value.as_str())
    }

    /// Child elements, in order.
    pub fn elements(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().filter_map(|child| match child {
            Child::Element(node) => Some(node),
            Child::Text(_) => None,
        })
    }

    /// First child element with the given local name.
    pub fn find_child(&self, name: &str) -> Option<&Node> {
        self.elements().find(|node| node.is(name))
    }

    /// Every child element with the given local name, in order.
    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.elements().filter(move |node| node.is(name))
    }

    /// Follow a path of local names through first matching children.
    pub fn find_path(&self, path: &[&str]) -> Option<&Node> {
        path.iter().try_fold(self, |node, name| node.find_child(name))
    }

    /// Concatenation of this element's direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                Child::Text(text) => Some(text.as_str()),
                Child::Element(_) => None,
            })
            .collect()
    }

    /// Depth-first, pre-order walk over this element and every descendant element.
    pub fn walk<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(&'a Node),
    {
        visit(self);
        for node in self.elements() {
            node.walk(visit);
        }
    }

    /// Depth-first walk over every text leaf beneath this element.
    pub fn walk_text<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(&'a str),
    {
        for child in &self.children {
            match child {
                Child::Text(text) => visit(text),
                Child::Element(node) => node.walk_text(visit),
            }
        }
    }
}

/// Parse XML bytes into a tree rooted at the document element.
///
/// `part` names the source for error messages.
pub fn parse(bytes: &[u8], part: &str) -> Result<Node> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(false);

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::malformed(part, format!("{} at byte {}", e, reader.buffer_position())))?;

        match event {
            Event::Start(ref e) => {
                stack.push(element_from(e, part)?);
            }
            Event::Empty(ref e) => {
                let node = element_from(e, part)?;
                attach(&mut stack, &mut root, node, part)?;
            }
            Event::End(_) => {
                // quick-xml checks that end names match their start tags.
                let node = stack
                    .pop()
                    .ok_or_else(|| Error::malformed(part, "unexpected closing tag"))?;
                attach(&mut stack, &mut root, node, part)?;
            }
            Event::Text(ref e) => {
                let text = e.unescape().map_err(|err| Error::malformed(part, err))?;
                push_text(&mut stack, &text, part)?;
            }
            Event::CData(e) => {
                let data = e.into_inner();
                push_text(&mut stack, &String::from_utf8_lossy(&data), part)?;
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctypes.
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::malformed(part, format!("unclosed element <{}>", open.tag)));
    }
    root.ok_or_else(|| Error::malformed(part, "no root element"))
}

fn element_from(e: &BytesStart<'_>, part: &str) -> Result<Node> {
    let mut node = Node::new(String::from_utf8_lossy(e.name().as_ref()));
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::malformed(part, err))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| Error::malformed(part, err))?
            .to_string();
        node.attributes.push((key, value));
    }
    Ok(node)
}

fn attach(stack: &mut [Node], root: &mut Option<Node>, node: Node, part: &str) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Child::Element(node));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(node);
            Ok(())
        }
        None => Err(Error::malformed(part, "more than one root element")),
    }
}

fn push_text(stack: &mut [Node], text: &str, part: &str) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            // quick-xml may deliver one text run as several events.
            if let Some(Child::Text(previous)) = parent.children.last_mut() {
                previous.push_str(text);
            } else {
                parent.children.push(Child::Text(text.to_string()));
            }
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(Error::malformed(part, "text outside the root element")),
    }
}

/// Extract the local name from a potentially namespaced XML name.
pub fn local_name(name: &str) -> &str {
    match name.rfind(':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}
