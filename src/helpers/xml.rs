//! XML reading utilities for SpreadsheetML parts.

use crate::error::RustyRecordError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

/// Errors specific to XML parsing operations
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Parse entity '{0}' failed")]
    ParseEntityError(String),

    #[error("Parse attribute '{0}' value '{1}' failed")]
    ParseAttributeValueError(String, String),
}

/// Event reader with the configuration spreadsheet parts need:
/// empty elements expanded, text kept verbatim.
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    pub(crate) fn new(buf_reader: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = true;
        config.trim_text(false);
        XmlReader {
            reader,
            buffer: Vec::with_capacity(1024),
        }
    }

    /// Reads the next event, None at end of document.
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, RustyRecordError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer)? {
            Event::Eof => Ok(None),
            event => Ok(Some(event)),
        }
    }
}

/// Attribute access on start tags.
pub(crate) trait XmlNodeHelper<'a> {
    /// Unescaped attribute value, matched by local name.
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, RustyRecordError>;

    fn parse_attribute_value<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, RustyRecordError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, RustyRecordError> {
        for attribute in self.attributes() {
            let attribute = attribute?;
            if attribute.key.local_name().as_ref() == name.as_bytes() {
                return Ok(Some(attribute.unescape_value()?));
            }
        }
        Ok(None)
    }

    fn parse_attribute_value<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, RustyRecordError> {
        match self.get_attribute_value(name)? {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| XmlError::ParseAttributeValueError(name.to_owned(), value.to_string()).into()),
            None => Ok(None),
        }
    }
}

/// Appends the text of an entity or character reference.
pub(crate) fn push_reference(text: &mut String, reference: &BytesRef) -> Result<(), RustyRecordError> {
    let raw = reference.xml_content()?;
    if let Some(number) = raw.strip_prefix('#') {
        let code = match number.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16)?,
            None => number.parse::<u32>()?,
        };
        if let Some(character) = char::from_u32(code) {
            text.push(character);
        }
    } else if let Some(entity) = resolve_xml_entity(&raw) {
        text.push_str(entity);
    } else {
        Err(XmlError::ParseEntityError(raw.to_string()))?;
    }
    Ok(())
}

#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(event) = $reader.next()? {
            match event {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_xml_events;
    use quick_xml::name::QName;

    #[test]
    fn read_attributes_and_references() -> Result<(), RustyRecordError> {
        let xml = r#"<root><c r="B2" s="3" x:t="s"/><t>a&amp;b&#65;&#x42;</t></root>"#;
        let mut reader = XmlReader::new(xml.as_bytes());
        let mut reference = None;
        let mut style = None;
        let mut kind = None;
        let mut text = String::new();
        let mut in_text = false;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == QName(b"c") => {
                reference = event.get_attribute_value("r").unwrap().map(|value| value.to_string());
                style = event.parse_attribute_value::<usize>("s").unwrap();
                kind = event.get_attribute_value("t").unwrap().map(|value| value.to_string());
            }
            Event::Start(event) if event.name() == QName(b"t") => in_text = true,
            Event::End(event) if event.name() == QName(b"t") => in_text = false,
            Event::Text(event) if in_text => text.push_str(&event.xml_content().unwrap()),
            Event::GeneralRef(event) if in_text => push_reference(&mut text, &event).unwrap(),
        });

        assert_eq!(reference.as_deref(), Some("B2"));
        assert_eq!(style, Some(3));
        assert_eq!(kind.as_deref(), Some("s"));
        assert_eq!(text, "a&bAB");
        Ok(())
    }

    #[test]
    fn reject_bad_attribute_value() -> Result<(), RustyRecordError> {
        let xml = r#"<c s="x"/>"#;
        let mut reader = XmlReader::new(xml.as_bytes());
        let mut failed = false;
        match_xml_events!(reader => {
            Event::Start(event) => failed = event.parse_attribute_value::<usize>("s").is_err(),
        });
        assert!(failed);
        Ok(())
    }
}
