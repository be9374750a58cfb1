//! Event-based XML input and element-emitting XML output.
//!
//! The reader wraps `quick-xml` into the small event vocabulary the part
//! codecs need: start/end elements addressed by namespace-stripped local
//! name, character runs, and end-of-document. The writer builds a UTF-8
//! document string with strict element pairing; the part codecs drive it
//! element by element instead of pasting XML fragments together.

use crate::error::{Error, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// A start tag with its attributes, namespace prefixes stripped.
#[derive(Debug, Clone)]
pub struct StartTag {
    /// Local element name
    pub name: String,
    /// Attributes as (local name, unescaped value) pairs
    pub attributes: Vec<(String, String)>,
}

impl StartTag {
    /// Look up an attribute value by local name, ignoring any namespace
    /// prefix it carried in the document.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Events produced by [`XmlReader`].
#[derive(Debug, Clone)]
pub enum XmlEvent {
    StartElement(StartTag),
    EndElement(String),
    Characters(String),
    EndDocument,
}

/// Pull reader over an in-memory XML document.
pub struct XmlReader<'a> {
    reader: Reader<&'a [u8]>,
    buf: Vec<u8>,
    /// End event synthesized after an empty element (`<a/>`)
    pending_end: Option<String>,
}

impl<'a> XmlReader<'a> {
    /// Create a reader over a UTF-8 XML document.
    pub fn new(xml: &'a str) -> Self {
        let reader = Reader::from_str(xml);
        Self {
            reader,
            buf: Vec::with_capacity(256),
            pending_end: None,
        }
    }

    /// Pull the next event.
    ///
    /// Whitespace-only character runs are suppressed; empty elements are
    /// reported as a start event immediately followed by its end event.
    /// After [`XmlEvent::EndDocument`] every further call returns
    /// `EndDocument` again.
    pub fn next(&mut self) -> Result<XmlEvent> {
        if let Some(name) = self.pending_end.take() {
            return Ok(XmlEvent::EndElement(name));
        }

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(start)) => return Ok(XmlEvent::StartElement(parse_tag(&start)?)),
                Ok(Event::Empty(start)) => {
                    let tag = parse_tag(&start)?;
                    self.pending_end = Some(tag.name.clone());
                    return Ok(XmlEvent::StartElement(tag));
                },
                Ok(Event::End(end)) => {
                    let name = String::from_utf8_lossy(end.local_name().as_ref()).into_owned();
                    return Ok(XmlEvent::EndElement(name));
                },
                Ok(Event::Text(text)) => {
                    let text = text
                        .unescape()
                        .map_err(|e| Error::Xml(format!("bad character data: {e}")))?;
                    if text.chars().all(char::is_whitespace) {
                        continue;
                    }
                    return Ok(XmlEvent::Characters(text.into_owned()));
                },
                Ok(Event::CData(data)) => {
                    let text = String::from_utf8_lossy(&data).into_owned();
                    if text.chars().all(char::is_whitespace) {
                        continue;
                    }
                    return Ok(XmlEvent::Characters(text));
                },
                Ok(Event::Eof) => return Ok(XmlEvent::EndDocument),
                // declarations, comments, processing instructions
                Ok(_) => continue,
                Err(e) => return Err(Error::Xml(format!("malformed XML: {e}"))),
            }
        }
    }

    /// Collect the concatenated character data up to the end of the element
    /// whose start event was just consumed. Nested markup is skipped, its
    /// text included.
    pub fn read_text_until_end(&mut self) -> Result<String> {
        let mut text = String::new();
        let mut depth = 0u32;

        loop {
            match self.next()? {
                XmlEvent::StartElement(_) => depth += 1,
                XmlEvent::EndElement(_) => {
                    if depth == 0 {
                        return Ok(text);
                    }
                    depth -= 1;
                },
                XmlEvent::Characters(chunk) => text.push_str(&chunk),
                XmlEvent::EndDocument => {
                    return Err(Error::Xml("unexpected end of document".to_string()));
                },
            }
        }
    }

    /// Skip the remainder of the element whose start event was just consumed.
    pub fn skip_element(&mut self) -> Result<()> {
        let mut depth = 0u32;
        loop {
            match self.next()? {
                XmlEvent::StartElement(_) => depth += 1,
                XmlEvent::EndElement(_) => {
                    if depth == 0 {
                        return Ok(());
                    }
                    depth -= 1;
                },
                XmlEvent::Characters(_) => {},
                XmlEvent::EndDocument => {
                    return Err(Error::Xml("unexpected end of document".to_string()));
                },
            }
        }
    }
}

fn parse_tag(start: &BytesStart<'_>) -> Result<StartTag> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut attributes = Vec::new();

    for attr in start.attributes().with_checks(false) {
        let attr = attr.map_err(|e| Error::Xml(format!("bad attribute: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Xml(format!("bad attribute value: {e}")))?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(StartTag { name, attributes })
}

/// Escape XML special characters for element text and attribute values.
pub fn escape_xml(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Streaming XML writer building a UTF-8 document in memory.
///
/// Elements must be strictly paired: every `start_element` needs a matching
/// `end_element` before `end_document`.
pub struct XmlWriter {
    out: String,
    /// Open element names, innermost last
    stack: Vec<String>,
    /// The most recent start tag has not had its `>` written yet
    tag_open: bool,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self {
            out: String::with_capacity(4096),
            stack: Vec::new(),
            tag_open: false,
        }
    }

    /// Write the XML declaration. Must come first.
    pub fn start_document(&mut self) {
        self.out
            .push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    }

    fn close_open_tag(&mut self) {
        if self.tag_open {
            self.out.push('>');
            self.tag_open = false;
        }
    }

    /// Open an element. Attributes may be added until the next content is
    /// written.
    pub fn start_element(&mut self, name: &str) {
        self.close_open_tag();
        self.out.push('<');
        self.out.push_str(name);
        self.stack.push(name.to_string());
        self.tag_open = true;
    }

    /// Add an attribute to the currently open start tag.
    pub fn attribute(&mut self, name: &str, value: &str) {
        debug_assert!(self.tag_open, "attribute() outside of a start tag");
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("=\"");
        self.out.push_str(&escape_xml(value));
        self.out.push('"');
    }

    /// Write escaped character data inside the current element.
    pub fn text(&mut self, value: &str) {
        self.close_open_tag();
        self.out.push_str(&escape_xml(value));
    }

    /// Write `<name/>` with no attributes or content.
    pub fn empty_element(&mut self, name: &str) {
        self.close_open_tag();
        self.out.push('<');
        self.out.push_str(name);
        self.out.push_str("/>");
    }

    /// Close the innermost open element.
    pub fn end_element(&mut self) -> Result<()> {
        let name = self
            .stack
            .pop()
            .ok_or_else(|| Error::Xml("end_element without matching start".to_string()))?;
        if self.tag_open {
            self.out.push_str("/>");
            self.tag_open = false;
        } else {
            self.out.push_str("</");
            self.out.push_str(&name);
            self.out.push('>');
        }
        Ok(())
    }

    /// Finish the document and return it.
    pub fn end_document(mut self) -> Result<String> {
        while !self.stack.is_empty() {
            self.end_element()?;
        }
        Ok(self.out)
    }
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_events() {
        let xml = r#"<?xml version="1.0"?><root a="1"><child x:b="two">text</child><leaf/></root>"#;
        let mut reader = XmlReader::new(xml);

        match reader.next().unwrap() {
            XmlEvent::StartElement(tag) => {
                assert_eq!(tag.name, "root");
                assert_eq!(tag.attr("a"), Some("1"));
            },
            other => panic!("unexpected event: {other:?}"),
        }
        match reader.next().unwrap() {
            XmlEvent::StartElement(tag) => {
                assert_eq!(tag.name, "child");
                // prefix stripped
                assert_eq!(tag.attr("b"), Some("two"));
            },
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(reader.next().unwrap(), XmlEvent::Characters(t) if t == "text"));
        assert!(matches!(reader.next().unwrap(), XmlEvent::EndElement(n) if n == "child"));
        assert!(matches!(reader.next().unwrap(), XmlEvent::StartElement(t) if t.name == "leaf"));
        assert!(matches!(reader.next().unwrap(), XmlEvent::EndElement(n) if n == "leaf"));
        assert!(matches!(reader.next().unwrap(), XmlEvent::EndElement(n) if n == "root"));
        assert!(matches!(reader.next().unwrap(), XmlEvent::EndDocument));
    }

    #[test]
    fn test_reader_suppresses_whitespace_runs() {
        let xml = "<a>\n  <b>kept  text</b>\n</a>";
        let mut reader = XmlReader::new(xml);
        assert!(matches!(reader.next().unwrap(), XmlEvent::StartElement(_)));
        assert!(matches!(reader.next().unwrap(), XmlEvent::StartElement(_)));
        assert!(matches!(reader.next().unwrap(), XmlEvent::Characters(t) if t == "kept  text"));
    }

    #[test]
    fn test_reader_preserves_edge_whitespace() {
        let xml = r#"<t xml:space="preserve">  padded  </t>"#;
        let mut reader = XmlReader::new(xml);
        assert!(matches!(reader.next().unwrap(), XmlEvent::StartElement(_)));
        assert!(matches!(reader.next().unwrap(), XmlEvent::Characters(t) if t == "  padded  "));
    }

    #[test]
    fn test_read_text_until_end() {
        let xml = "<is><t>Hello </t><t>world</t></is>";
        let mut reader = XmlReader::new(xml);
        reader.next().unwrap();
        assert_eq!(reader.read_text_until_end().unwrap(), "Hello world");
    }

    #[test]
    fn test_reader_rejects_malformed() {
        let mut reader = XmlReader::new("<a>&bad");
        let mut saw_error = false;
        for _ in 0..8 {
            match reader.next() {
                Err(_) => {
                    saw_error = true;
                    break;
                },
                Ok(XmlEvent::EndDocument) => break,
                Ok(_) => {},
            }
        }
        assert!(saw_error);
    }

    #[test]
    fn test_writer_basic() {
        let mut writer = XmlWriter::new();
        writer.start_document();
        writer.start_element("worksheet");
        writer.attribute("xmlns", "ns");
        writer.start_element("row");
        writer.attribute("r", "1");
        writer.text("a<b");
        writer.end_element().unwrap();
        writer.empty_element("cols");
        writer.end_element().unwrap();
        let out = writer.end_document().unwrap();
        assert_eq!(
            out,
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="ns"><row r="1">a&lt;b</row><cols/></worksheet>"#
        );
    }

    #[test]
    fn test_writer_self_closes_empty_pair() {
        let mut writer = XmlWriter::new();
        writer.start_element("mergeCell");
        writer.attribute("ref", "A1:B2");
        writer.end_element().unwrap();
        assert_eq!(writer.end_document().unwrap(), r#"<mergeCell ref="A1:B2"/>"#);
    }

    #[test]
    fn test_writer_unbalanced_end() {
        let mut writer = XmlWriter::new();
        assert!(writer.end_element().is_err());
    }
}
