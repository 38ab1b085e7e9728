//! Owned-tree XML document model.
//!
//! The panel protocol exchanges small XML documents on stdin/stdout and inside
//! RPC responses. This is a deliberately minimal tree: named elements with
//! ordered attributes, text and CDATA content, and `a/b/c` child paths. It is
//! not a general XML library; namespaces, comments and processing
//! instructions are ignored on read and never produced on write.

use crate::error::{Error, Result};
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::{BufRead, Cursor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Node(Node),
    Text(String),
    CData(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Content>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set or replace an attribute, returning `self` for chaining.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.attrs.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.attrs.push((name, value));
        }
        self
    }

    pub fn append_child(&mut self, name: impl Into<String>) -> &mut Node {
        self.children.push(Content::Node(Node::new(name)));
        match self.children.last_mut() {
            Some(Content::Node(node)) => node,
            _ => unreachable!(),
        }
    }

    pub fn append_node(&mut self, node: Node) -> &mut Node {
        self.children.push(Content::Node(node));
        match self.children.last_mut() {
            Some(Content::Node(node)) => node,
            _ => unreachable!(),
        }
    }

    pub fn append_text_child(&mut self, name: impl Into<String>, text: impl Into<String>) -> &mut Node {
        let child = self.append_child(name);
        child.set_text(text);
        child
    }

    pub fn append_cdata(&mut self, text: impl Into<String>) -> &mut Self {
        self.children.push(Content::CData(text.into()));
        self
    }

    /// Replace the direct text content, keeping element children.
    pub fn set_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.children
            .retain(|c| !matches!(c, Content::Text(_) | Content::CData(_)));
        self.children.push(Content::Text(text.into()));
        self
    }

    /// Concatenated direct text and CDATA content.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                Content::Text(t) | Content::CData(t) => out.push_str(t),
                Content::Node(_) => {}
            }
        }
        out
    }

    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().filter_map(|c| match c {
            Content::Node(n) => Some(n),
            _ => None,
        })
    }

    pub fn remove_children(&mut self, name: &str) {
        self.children
            .retain(|c| !matches!(c, Content::Node(n) if n.name == name));
    }

    /// First descendant matching a `a/b/c` path of child names.
    pub fn find(&self, path: &str) -> Option<&Node> {
        let mut current = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current.children().find(|n| n.name == segment)?;
        }
        Some(current)
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut Node> {
        let mut current = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current.children.iter_mut().find_map(|c| match c {
                Content::Node(n) if n.name == segment => Some(n),
                _ => None,
            })?;
        }
        Some(current)
    }

    /// All nodes matching the path; only the final segment may repeat.
    pub fn find_all(&self, path: &str) -> Vec<&Node> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((last, prefix)) = segments.split_last() else {
            return Vec::new();
        };
        let mut parent = self;
        for segment in prefix {
            match parent.children().find(|n| n.name == *segment) {
                Some(n) => parent = n,
                None => return Vec::new(),
            }
        }
        parent.children().filter(|n| n.name == *last).collect()
    }

    fn write_into<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new(&self.name);
        for (key, value) in &self.attrs {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        if self.children.is_empty() {
            writer
                .write_event(Event::Empty(start))
                .map_err(write_error)?;
            return Ok(());
        }
        writer
            .write_event(Event::Start(start))
            .map_err(write_error)?;
        for child in &self.children {
            match child {
                Content::Node(node) => node.write_into(writer)?,
                Content::Text(text) => writer
                    .write_event(Event::Text(BytesText::new(text)))
                    .map_err(write_error)?,
                Content::CData(text) => writer
                    .write_event(Event::CData(BytesCData::new(text.as_str())))
                    .map_err(write_error)?,
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new(&self.name)))
            .map_err(write_error)?;
        Ok(())
    }
}

/// An XML document with a single root element, `<doc/>` by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Node,
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Document {
            root: Node::new("doc"),
        }
    }

    pub fn with_root(name: impl Into<String>) -> Self {
        Document {
            root: Node::new(name),
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        Self::read_from(input.as_bytes())
    }

    pub fn read_from<R: BufRead>(input: R) -> Result<Self> {
        let mut reader = Reader::from_reader(input);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        // Stack of open elements; the completed root pops out at the end.
        let mut stack: Vec<Node> = Vec::new();
        let mut root: Option<Node> = None;

        loop {
            match reader.read_event_into(&mut buf).map_err(read_error)? {
                Event::Start(e) => {
                    stack.push(node_from_start(&e));
                }
                Event::Empty(e) => {
                    let node = node_from_start(&e);
                    match stack.last_mut() {
                        Some(parent) => {
                            parent.children.push(Content::Node(node));
                        }
                        None if root.is_none() => root = Some(node),
                        None => return Err(parse_failed("trailing root element")),
                    }
                }
                Event::Text(e) => {
                    let text = e
                        .unescape()
                        .map_err(read_error)?
                        .to_string();
                    if let Some(parent) = stack.last_mut() {
                        if !text.trim().is_empty() {
                            parent.children.push(Content::Text(text));
                        }
                    }
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Content::CData(text));
                    }
                }
                Event::End(_) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| parse_failed("unbalanced end tag"))?;
                    match stack.last_mut() {
                        Some(parent) => {
                            parent.children.push(Content::Node(node));
                        }
                        None if root.is_none() => root = Some(node),
                        None => return Err(parse_failed("trailing root element")),
                    }
                }
                Event::Eof => break,
                // Declarations, comments and processing instructions are skipped.
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(parse_failed("unclosed element"));
        }
        match root {
            Some(root) => Ok(Document { root }),
            None => Err(parse_failed("no root element")),
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    /// Find below the root: `find("error/param")` addresses
    /// `<doc><error><param/></error></doc>`.
    pub fn find(&self, path: &str) -> Option<&Node> {
        self.root.find(path)
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut Node> {
        self.root.find_mut(path)
    }

    pub fn find_all(&self, path: &str) -> Vec<&Node> {
        self.root.find_all(path)
    }

    /// Text of the node at `path`, empty when the node is absent.
    pub fn text_of(&self, path: &str) -> String {
        self.find(path).map(|n| n.text()).unwrap_or_default()
    }

    pub fn to_string_pretty(&self) -> String {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        self.root
            .write_into(&mut writer)
            .expect("in-memory xml serialization");
        String::from_utf8_lossy(&writer.into_inner().into_inner()).into_owned()
    }
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        // Serialization of an in-memory tree cannot fail on a Vec sink.
        self.root
            .write_into(&mut writer)
            .expect("in-memory xml serialization");
        f.write_str(&String::from_utf8_lossy(&writer.into_inner().into_inner()))
    }
}

fn node_from_start(start: &BytesStart<'_>) -> Node {
    let mut node = Node::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes().flatten() {
        node.attrs.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            String::from_utf8_lossy(&attr.value).into_owned(),
        ));
    }
    node
}

fn parse_failed(detail: &str) -> Error {
    Error::with_value("xml_parse", "input", detail)
}

fn read_error(err: impl std::fmt::Display) -> Error {
    Error::with_value("xml_parse", "input", err.to_string())
}

fn write_error(err: std::io::Error) -> Error {
    Error::with_object("xml_write", err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_serializes_self_closed() {
        assert_eq!(Document::new().to_string(), "<doc/>");
    }

    #[test]
    fn build_and_find() {
        let mut doc = Document::new();
        {
            let modules = doc.root_mut().append_child("modules");
            modules.append_child("module").set_attr("id", "3");
            modules.append_child("module").set_attr("id", "5");
        }
        assert_eq!(doc.find_all("modules/module").len(), 2);
        assert_eq!(
            doc.find("modules/module").unwrap().attr("id"),
            Some("3")
        );
        assert!(doc.find("modules/missing").is_none());
    }

    #[test]
    fn parse_item_descriptor() {
        let doc = Document::parse(
            "<doc><item><pricelist>12</pricelist></item><skip_modules>3,7</skip_modules></doc>",
        )
        .unwrap();
        assert_eq!(doc.text_of("item/pricelist"), "12");
        assert_eq!(doc.text_of("skip_modules"), "3,7");
        assert_eq!(doc.text_of("absent"), "");
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(Document::parse("<doc><unclosed></doc>").is_err());
        assert!(Document::parse("not xml at all").is_err());
        assert!(Document::parse("").is_err());
    }

    #[test]
    fn round_trip_preserves_attributes_and_text() {
        let input = r#"<doc><error type="client" object="open">refused</error></doc>"#;
        let doc = Document::parse(input).unwrap();
        let error = doc.find("error").unwrap();
        assert_eq!(error.attr("type"), Some("client"));
        assert_eq!(error.text(), "refused");
        assert_eq!(doc.to_string(), input);
    }

    #[test]
    fn cdata_survives_round_trip() {
        let mut doc = Document::new();
        doc.root_mut()
            .append_child("log")
            .append_cdata("line with <angle> brackets\n");
        let rendered = doc.to_string();
        assert!(rendered.contains("<![CDATA[line with <angle> brackets\n]]>"));
        let parsed = Document::parse(&rendered).unwrap();
        assert_eq!(parsed.text_of("log"), "line with <angle> brackets\n");
    }

    #[test]
    fn set_text_replaces_existing_content() {
        let mut doc = Document::parse("<doc><name>old</name></doc>").unwrap();
        doc.find_mut("name").unwrap().set_text("new");
        assert_eq!(doc.text_of("name"), "new");
    }

    #[test]
    fn session_params_rewrite_shape() {
        let mut doc = Document::parse(
            r#"<doc><session_params><param name="elid" value="4"/></session_params></doc>"#,
        )
        .unwrap();
        doc.root_mut().remove_children("session_params");
        assert!(doc.find("session_params").is_none());
        let params = doc.root_mut().append_child("session_params");
        params
            .append_child("param")
            .set_attr("name", "elid")
            .set_attr("value", "5");
        assert_eq!(
            doc.find("session_params/param").unwrap().attr("value"),
            Some("5")
        );
    }
}
