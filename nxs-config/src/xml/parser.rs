//! XML parser that builds documents.
//!
//! This parser uses quick-xml's streaming API. Text between two markup events
//! is accumulated into one text node; runs made only of whitespace are
//! dropped, everything else is kept verbatim.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use indexmap::IndexMap;
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::{Error, Result};
use crate::node::{Document, Element, NodeId, NodeKind};

/// XML parser that builds [`Document`]s.
#[derive(Debug, Default)]
pub struct XmlParser {
    document: Document,
}

impl XmlParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses XML from a string.
    pub fn parse_str(self, xml: &str) -> Result<Document> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;
        self.parse_reader(&mut reader)
    }

    /// Parses XML from a file.
    pub fn parse_file<P: AsRef<Path>>(self, path: P) -> Result<Document> {
        let path = path.as_ref();
        debug!(path = %path.display(), "parsing file");
        let file = File::open(path)?;
        let mut reader = Reader::from_reader(BufReader::new(file));
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;
        self.parse_reader(&mut reader)
    }

    fn parse_reader<R: BufRead>(mut self, reader: &mut Reader<R>) -> Result<Document> {
        let mut stack: Vec<NodeId> = vec![self.document.root()];
        let mut text = String::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    self.flush_text(&mut text, &stack)?;
                    let node = self.add_element(e, reader, &stack)?;
                    stack.push(node);
                }
                Ok(Event::End(_)) => {
                    self.flush_text(&mut text, &stack)?;
                    if stack.len() > 1 {
                        stack.pop();
                    }
                }
                Ok(Event::Empty(ref e)) => {
                    self.flush_text(&mut text, &stack)?;
                    self.add_element(e, reader, &stack)?;
                }
                Ok(Event::Text(e)) => {
                    let raw =
                        std::str::from_utf8(e.as_ref()).map_err(|e| Error::Parse(e.to_string()))?;
                    let unescaped = unescape(raw).map_err(|e| Error::Parse(e.to_string()))?;
                    text.push_str(&unescaped);
                }
                Ok(Event::CData(ref e)) => {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
                Ok(Event::GeneralRef(ref e)) => {
                    text.push_str(&Self::resolve_reference(e)?);
                }
                Ok(Event::Eof) => break,
                Ok(Event::Comment(_))
                | Ok(Event::Decl(_))
                | Ok(Event::PI(_))
                | Ok(Event::DocType(_)) => {}
                Err(e) => return Err(Error::Parse(format!("XML parse error: {}", e))),
            }
            buf.clear();
        }

        if stack.len() > 1 {
            return Err(Error::Parse("unexpected end of input".to_string()));
        }
        self.flush_text(&mut text, &stack)?;
        Ok(self.document)
    }

    /// Attaches the pending text to the innermost open element.
    fn flush_text(&mut self, text: &mut String, stack: &[NodeId]) -> Result<()> {
        if text.trim().is_empty() {
            text.clear();
            return Ok(());
        }
        let Some(&parent) = stack.last() else {
            return Ok(());
        };
        // Text outside the top element has nowhere to go.
        if parent == self.document.root() {
            text.clear();
            return Ok(());
        }
        let node = self.document.create_text(std::mem::take(text));
        self.document.append(parent, node)
    }

    fn add_element<R: BufRead>(
        &mut self,
        e: &BytesStart,
        reader: &Reader<R>,
        stack: &[NodeId],
    ) -> Result<NodeId> {
        let element = Self::parse_element(e, reader)?;
        let parent = stack
            .last()
            .copied()
            .unwrap_or_else(|| self.document.root());
        if parent == self.document.root() && self.document.document_element().is_some() {
            return Err(Error::Parse(format!(
                "second top-level element <{}>",
                element.tag()
            )));
        }
        let node = self.document.create_node(NodeKind::Element(element));
        self.document.append(parent, node)?;
        Ok(node)
    }

    /// Parses an element's tag and attributes, keeping document order.
    fn parse_element<R: BufRead>(e: &BytesStart, reader: &Reader<R>) -> Result<Element> {
        let tag = reader
            .decoder()
            .decode(e.name().as_ref())
            .map_err(|e| Error::Parse(e.to_string()))?
            .to_string();

        let mut attributes = IndexMap::new();
        for attr_result in e.attributes() {
            let attr = attr_result.map_err(|e| Error::Parse(format!("Attribute error: {}", e)))?;
            let key = reader
                .decoder()
                .decode(attr.key.as_ref())
                .map_err(|e| Error::Parse(e.to_string()))?
                .to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| Error::Parse(e.to_string()))?
                .to_string();
            attributes.insert(key, value);
        }

        Ok(Element::with_attributes(tag, attributes))
    }

    /// Resolves `&name;` and `&#N;` references appearing in text.
    fn resolve_reference(e: &BytesRef) -> Result<String> {
        if let Some(c) = e
            .resolve_char_ref()
            .map_err(|e| Error::Parse(e.to_string()))?
        {
            return Ok(c.to_string());
        }
        let name = e.decode().map_err(|e| Error::Parse(e.to_string()))?;
        resolve_predefined_entity(&name)
            .map(str::to_string)
            .ok_or_else(|| Error::Parse(format!("unknown entity &{};", name)))
    }
}

/// Parses XML from a file.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Document> {
    XmlParser::new().parse_file(path)
}

/// Parses XML from a string.
pub fn parse_str(xml: &str) -> Result<Document> {
    XmlParser::new().parse_str(xml)
}
