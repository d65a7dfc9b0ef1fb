//! Minimal element tree over quick-xml events.
//!
//! TEI extraction needs ordered recursive text: an element's own leading
//! text, then for each child the child's fully recursed text followed by
//! the child's trailing (tail) text. Event streams make that awkward, so we
//! materialize the document first. Namespace prefixes are stripped; TEI
//! documents are matched by local name.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::{Result, TeiError};

/// One XML element with ElementTree-style text/tail split.
#[derive(Debug, Clone, Default)]
pub struct XmlNode {
    /// Local element name (namespace prefix stripped)
    pub name: String,

    /// Attributes in document order, keys with prefixes stripped
    pub attrs: Vec<(String, String)>,

    /// Child elements in document order
    pub children: Vec<XmlNode>,

    /// Text between this element's start tag and its first child
    pub text: String,

    /// Text between this element's end tag and the next sibling
    pub tail: String,
}

impl XmlNode {
    /// Parse a document into its root element.
    pub fn parse(input: &str) -> Result<Self> {
        // Text is kept untrimmed so whitespace between inline elements
        // survives into the text/tail fields.
        let mut reader = Reader::from_str(input);

        // Stack of open elements; the finished root pops out at Eof.
        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => {
                    stack.push(node_from_start(&start)?);
                }
                Ok(Event::Empty(start)) => {
                    let node = node_from_start(&start)?;
                    attach(&mut stack, &mut root, node)?;
                }
                Ok(Event::End(_)) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| TeiError::XmlError("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, node)?;
                }
                Ok(Event::Text(text)) => {
                    let unescaped = text
                        .unescape()
                        .map_err(|e| TeiError::XmlError(e.to_string()))?;
                    push_text(&mut stack, &unescaped);
                }
                Ok(Event::CData(cdata)) => {
                    let raw = String::from_utf8_lossy(cdata.as_ref()).into_owned();
                    push_text(&mut stack, &raw);
                }
                Ok(Event::Eof) => break,
                // Declarations, comments, processing instructions
                Ok(_) => {}
                Err(e) => return Err(TeiError::XmlError(e.to_string())),
            }
        }

        if !stack.is_empty() {
            return Err(TeiError::XmlError("unclosed element".to_string()));
        }

        root.ok_or_else(|| TeiError::XmlError("document has no root element".to_string()))
    }

    /// Attribute value by local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First descendant with the given local name, in document order.
    pub fn find(&self, name: &str) -> Option<&XmlNode> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants with the given local name, in document order.
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a XmlNode> {
        let mut out = Vec::new();
        self.collect_named(name, &mut out);
        out
    }

    fn collect_named<'a>(&'a self, name: &str, out: &mut Vec<&'a XmlNode>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.collect_named(name, out);
        }
    }

    /// Direct children with the given local name.
    pub fn children_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a XmlNode> {
        let name = name.to_string();
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Recursively concatenated text in document order: own leading text,
    /// then each child's recursed text followed by that child's tail.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.append_text(&mut out);
        out
    }

    fn append_text(&self, out: &mut String) {
        out.push_str(&self.text);
        for child in &self.children {
            child.append_text(out);
            out.push_str(&child.tail);
        }
    }
}

fn local_name(raw: &[u8]) -> String {
    let raw = match raw.iter().rposition(|&b| b == b':') {
        Some(pos) => &raw[pos + 1..],
        None => raw,
    };
    String::from_utf8_lossy(raw).into_owned()
}

fn node_from_start(start: &BytesStart<'_>) -> Result<XmlNode> {
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| TeiError::XmlError(e.to_string()))?;
        let key = local_name(attr.key.as_ref());
        let value = attr
            .unescape_value()
            .map_err(|e| TeiError::XmlError(e.to_string()))?
            .into_owned();
        attrs.push((key, value));
    }

    Ok(XmlNode {
        name: local_name(start.name().as_ref()),
        attrs,
        ..Default::default()
    })
}

fn attach(stack: &mut Vec<XmlNode>, root: &mut Option<XmlNode>, node: XmlNode) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if root.is_some() {
                return Err(TeiError::XmlError(
                    "multiple root elements".to_string(),
                ));
            }
            *root = Some(node);
        }
    }
    Ok(())
}

fn push_text(stack: &mut [XmlNode], text: &str) {
    if let Some(current) = stack.last_mut() {
        match current.children.last_mut() {
            Some(last_child) => last_child.tail.push_str(text),
            None => current.text.push_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements() {
        let root = XmlNode::parse("<a><b x=\"1\"><c/></b><b/></a>").unwrap();
        assert_eq!(root.name, "a");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].attr("x"), Some("1"));
        assert_eq!(root.children[0].children[0].name, "c");
    }

    #[test]
    fn strips_namespace_prefixes() {
        let root = XmlNode::parse(
            "<TEI xmlns=\"http://www.tei-c.org/ns/1.0\"><tei:teiHeader xmlns:tei=\"x\"/></TEI>",
        )
        .unwrap();
        assert_eq!(root.name, "TEI");
        assert_eq!(root.children[0].name, "teiHeader");
    }

    #[test]
    fn text_and_tail_preserve_document_order() {
        let root = XmlNode::parse("<p>alpha <hi>beta</hi> gamma <hi>delta</hi> omega</p>").unwrap();
        assert_eq!(root.text, "alpha ");
        assert_eq!(root.children[0].tail, " gamma ");
        assert_eq!(root.text_content(), "alpha beta gamma delta omega");
    }

    #[test]
    fn text_content_recurses_through_nesting() {
        let root = XmlNode::parse("<p>one <a>two <b>three</b> four</a> five</p>").unwrap();
        assert_eq!(root.text_content(), "one two three four five");
    }

    #[test]
    fn find_returns_first_in_document_order() {
        let root = XmlNode::parse("<a><b><t>first</t></b><t>second</t></a>").unwrap();
        assert_eq!(root.find("t").unwrap().text, "first");
        assert_eq!(root.find_all("t").len(), 2);
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(XmlNode::parse("<a><b></a>").is_err());
        assert!(XmlNode::parse("no markup at all").is_err());
    }

    #[test]
    fn entities_are_unescaped() {
        let root = XmlNode::parse("<p>a &amp; b</p>").unwrap();
        assert_eq!(root.text_content(), "a & b");
    }
}
