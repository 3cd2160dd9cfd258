//! XML printer that writes documents.
//!
//! Attributes are written in insertion order. In compact mode every tag
//! starts on a new line unless it directly follows text, so text content is
//! written back exactly as it was read. Pretty mode indents element-only
//! content and writes any element with text children in compact form.

use std::io::Write;

use indexmap::IndexMap;

use crate::node::{Document, NodeId, NodeKind};

/// Options for XML printing.
#[derive(Debug, Clone, Default)]
pub struct XmlPrinterOptions {
    /// Whether to pretty-print with indentation.
    pub pretty_print: bool,
}

/// XML printer that writes documents.
pub struct XmlPrinter<W: Write> {
    writer: W,
    options: XmlPrinterOptions,
    indent: usize,
    state: PrintState,
    /// Stack of "has content" flags for each element level
    content_stack: Vec<bool>,
    /// Whether the innermost open tag has been closed with `>`
    has_content: bool,
    /// Number of open elements with text children
    inline_depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PrintState {
    Initial,
    AfterTag,
    AfterChars,
}

impl<W: Write> XmlPrinter<W> {
    /// Creates a new XML printer.
    pub fn new(writer: W) -> Self {
        Self::with_options(writer, XmlPrinterOptions::default())
    }

    /// Creates a new XML printer with the given options.
    pub fn with_options(writer: W, options: XmlPrinterOptions) -> Self {
        XmlPrinter {
            writer,
            options,
            indent: 0,
            state: PrintState::Initial,
            content_stack: Vec::new(),
            has_content: true,
            inline_depth: 0,
        }
    }

    /// Prints a whole document, including the XML declaration.
    pub fn print(&mut self, document: &Document) -> std::io::Result<()> {
        self.start_document()?;
        self.print_node(document, document.root())?;
        self.end_document()
    }

    /// Prints the subtree rooted at `node` without an XML declaration.
    pub fn print_fragment(&mut self, document: &Document, node: NodeId) -> std::io::Result<()> {
        self.print_node(document, node)?;
        self.writer.flush()
    }

    fn print_node(&mut self, document: &Document, node: NodeId) -> std::io::Result<()> {
        match document.kind(node) {
            Some(NodeKind::Text(text)) => self.characters(text),
            Some(NodeKind::Element(element)) => {
                let inline = self.options.pretty_print
                    && document.children(node).any(|c| document.text(c).is_some());
                self.start_element(element.tag(), element.attributes())?;
                if inline {
                    self.inline_depth += 1;
                }
                for child in document.children(node) {
                    self.print_node(document, child)?;
                }
                self.end_element(element.tag())?;
                if inline {
                    self.inline_depth -= 1;
                    if self.pretty() {
                        writeln!(self.writer)?;
                    }
                }
                Ok(())
            }
            Some(NodeKind::Document) => {
                for child in document.children(node) {
                    self.print_node(document, child)?;
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn start_document(&mut self) -> std::io::Result<()> {
        self.has_content = true;
        write!(self.writer, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
        if self.options.pretty_print {
            writeln!(self.writer)?;
        }
        self.state = PrintState::AfterTag;
        Ok(())
    }

    fn end_document(&mut self) -> std::io::Result<()> {
        if !self.options.pretty_print {
            writeln!(self.writer)?;
        }
        self.writer.flush()
    }

    fn start_element(&mut self, tag: &str, attrs: &IndexMap<String, String>) -> std::io::Result<()> {
        // Close previous unclosed tag if needed
        if !self.has_content {
            self.print_with_nl(">")?;
            self.has_content = true;
        }

        if self.state == PrintState::AfterTag && !self.pretty() {
            writeln!(self.writer)?;
        }

        let mut open = String::new();
        open.push('<');
        open.push_str(tag);
        for (name, value) in attrs {
            open.push(' ');
            open.push_str(name);
            open.push_str("=\"");
            open.push_str(&to_entities(value));
            open.push('"');
        }

        if self.pretty() {
            write!(self.writer, "{}", &Self::indent_str(self.indent))?;
        }
        write!(self.writer, "{}", open)?;

        self.content_stack.push(self.has_content);
        self.has_content = false;
        self.indent += 1;
        self.state = PrintState::AfterTag;

        Ok(())
    }

    fn end_element(&mut self, tag: &str) -> std::io::Result<()> {
        self.indent = self.indent.saturating_sub(1);

        if !self.has_content {
            self.print_with_nl(" />")?;
        } else {
            if self.state == PrintState::AfterTag && !self.pretty() {
                writeln!(self.writer)?;
            }

            if self.pretty() {
                write!(self.writer, "{}", &Self::indent_str(self.indent))?;
            }
            self.print_with_nl(&format!("</{}>", tag))?;
        }

        self.has_content = self.content_stack.pop().unwrap_or(true);
        self.state = PrintState::AfterTag;

        Ok(())
    }

    fn characters(&mut self, text: &str) -> std::io::Result<()> {
        self.state = PrintState::AfterChars;

        if !self.has_content {
            self.print_with_nl(">")?;
        }
        self.has_content = true;

        if text.is_empty() {
            return Ok(());
        }

        let encoded = to_entities(text);
        self.print_with_nl(&encoded)
    }

    fn print_with_nl(&mut self, s: &str) -> std::io::Result<()> {
        if self.pretty() {
            writeln!(self.writer, "{}", s)
        } else {
            write!(self.writer, "{}", s)
        }
    }

    /// True while indenting, i.e. pretty mode outside text-bearing elements.
    fn pretty(&self) -> bool {
        self.options.pretty_print && self.inline_depth == 0
    }

    fn indent_str(level: usize) -> String {
        "  ".repeat(level)
    }
}

/// Converts special characters to XML entities.
fn to_entities(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '\'' => result.push_str("&apos;"),
            '"' => result.push_str("&quot;"),
            _ => result.push(c),
        }
    }
    result
}

/// Prints a document to a string.
pub fn print_to_string(document: &Document) -> std::io::Result<String> {
    let mut output = Vec::new();
    XmlPrinter::new(&mut output).print(document)?;
    Ok(String::from_utf8_lossy(&output).into_owned())
}

/// Prints a document to a string with pretty printing.
pub fn print_to_string_pretty(document: &Document) -> std::io::Result<String> {
    let mut output = Vec::new();
    let options = XmlPrinterOptions { pretty_print: true };
    XmlPrinter::with_options(&mut output, options).print(document)?;
    Ok(String::from_utf8_lossy(&output).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_str;

    #[test]
    fn test_print_simple() {
        let doc = parse_str(r#"<root>text</root>"#).unwrap();
        let output = print_to_string(&doc).unwrap();

        assert_eq!(
            output,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root>text</root>\n"
        );
    }

    #[test]
    fn test_attributes_in_insertion_order() {
        let doc = parse_str(r#"<field name="x" type="NX_FLOAT" units="mm"/>"#).unwrap();
        let output = print_to_string(&doc).unwrap();

        assert!(output.contains(r#"<field name="x" type="NX_FLOAT" units="mm" />"#));
    }

    #[test]
    fn test_print_empty_element() {
        let doc = parse_str(r#"<root><empty /></root>"#).unwrap();
        let output = print_to_string(&doc).unwrap();

        assert!(output.contains("<root>\n<empty />\n</root>"));
    }

    #[test]
    fn test_entity_encoding() {
        let doc = parse_str(r#"<root attr="&amp;&lt;&gt;">&amp;&lt;&gt;</root>"#).unwrap();
        let output = print_to_string(&doc).unwrap();

        assert!(output.contains(r#"attr="&amp;&lt;&gt;""#));
        assert!(output.contains(">&amp;&lt;&gt;</root>"));
    }

    #[test]
    fn test_pretty_print() {
        let doc = parse_str(r#"<root><child>text</child></root>"#).unwrap();
        let output = print_to_string_pretty(&doc).unwrap();

        assert!(output.contains("\n  <child>text</child>\n"));
        assert!(output.ends_with("</root>\n"));
    }

    #[test]
    fn test_pretty_print_keeps_text() {
        let xml = "<definition><group name=\"entry\"><field name=\"x\">1.2</field>\
                   <field name=\"y\">a<b/>c</field></group></definition>";
        let doc = parse_str(xml).unwrap();
        let output = print_to_string_pretty(&doc).unwrap();

        assert!(output.contains("\n    <field name=\"x\">1.2</field>\n"), "{}", output);
        let reparsed = parse_str(&output).unwrap();
        let group = reparsed.child(reparsed.document_element().unwrap(), 0).unwrap();
        let x = reparsed.child(group, 0).unwrap();
        let y = reparsed.child(group, 1).unwrap();
        assert_eq!(reparsed.direct_text(x), "1.2");
        assert_eq!(reparsed.child_count(y), 3);
        assert_eq!(reparsed.direct_text(y), "ac");
        assert_eq!(print_to_string(&reparsed).unwrap(), print_to_string(&doc).unwrap());
    }

    #[test]
    fn test_print_fragment() {
        let doc = parse_str(r#"<a><b name="x">t</b></a>"#).unwrap();
        let a = doc.document_element().unwrap();
        let b = doc.child(a, 0).unwrap();
        let mut output = Vec::new();
        XmlPrinter::new(&mut output).print_fragment(&doc, b).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), r#"<b name="x">t</b>"#);
    }

    #[test]
    fn test_edited_document() {
        let mut doc = Document::new();
        let definition = doc.create_element("definition");
        doc.append(doc.root(), definition).unwrap();
        let field = doc.create_element("field");
        doc.set_attribute(field, "name", "x").unwrap();
        doc.append(definition, field).unwrap();
        let text = doc.create_text("1 < 2");
        doc.append(field, text).unwrap();

        let output = print_to_string(&doc).unwrap();
        assert!(output.contains(r#"<field name="x">1 &lt; 2</field>"#));
    }

    #[test]
    fn test_reparse_preserves_text() {
        let xml = "<root>text1<child name=\"c\">\n  inner\n</child>text2<e/></root>";
        let doc = parse_str(xml).unwrap();
        let output = print_to_string(&doc).unwrap();
        let reparsed = parse_str(&output).unwrap();

        assert_eq!(print_to_string(&reparsed).unwrap(), output);
        let root = reparsed.document_element().unwrap();
        assert_eq!(reparsed.child_count(root), 4);
        let child = reparsed.child(root, 1).unwrap();
        assert_eq!(reparsed.direct_text(child), "\n  inner\n");
    }
}
