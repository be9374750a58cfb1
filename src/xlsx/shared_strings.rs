//! Reader for the optional `xl/sharedStrings.xml` part.
//!
//! The writer side of this crate emits inline strings only, but files
//! produced by other tools usually store cell text as indices into this
//! part, so the reader must resolve it. Rich-text runs are flattened to
//! their concatenated plain text.

use crate::error::Result;
use crate::xml::{XmlEvent, XmlReader};

/// Parse the shared-strings part into its ordered list of strings.
pub fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut strings = Vec::new();
    let mut reader = XmlReader::new(xml);

    loop {
        match reader.next()? {
            XmlEvent::StartElement(tag) if tag.name == "si" => {
                strings.push(parse_string_item(&mut reader)?);
            },
            XmlEvent::EndDocument => break,
            _ => {},
        }
    }

    Ok(strings)
}

/// Collect the text of one `<si>`: either a single `<t>` or the `<r>/<t>`
/// runs of rich text, concatenated.
fn parse_string_item(reader: &mut XmlReader<'_>) -> Result<String> {
    let mut text = String::new();

    loop {
        match reader.next()? {
            XmlEvent::StartElement(tag) if tag.name == "t" => {
                text.push_str(&reader.read_text_until_end()?);
            },
            XmlEvent::StartElement(_) => {},
            XmlEvent::EndElement(name) if name == "si" => break,
            XmlEvent::EndDocument => break,
            _ => {},
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_strings() {
        let xml = r#"<?xml version="1.0"?><sst count="2" uniqueCount="2"><si><t>Name</t></si><si><t>Age</t></si></sst>"#;
        assert_eq!(parse_shared_strings(xml).unwrap(), vec!["Name", "Age"]);
    }

    #[test]
    fn test_rich_text_runs_flattened() {
        let xml = r#"<sst><si><r><rPr><b/></rPr><t>Hello </t></r><r><t>world</t></r></si></sst>"#;
        assert_eq!(parse_shared_strings(xml).unwrap(), vec!["Hello world"]);
    }

    #[test]
    fn test_preserved_whitespace() {
        let xml = r#"<sst><si><t xml:space="preserve">  padded  </t></si></sst>"#;
        assert_eq!(parse_shared_strings(xml).unwrap(), vec!["  padded  "]);
    }

    #[test]
    fn test_empty_part() {
        assert!(parse_shared_strings("<sst/>").unwrap().is_empty());
    }
}
