//! XML event stream: pulls SAX-style events from an input byte stream,
//! lazily and in a single pass, independent of any particular element
//! grammar. The schema validator in [`crate::validator`] is the only
//! consumer that knows what the OSM element names mean.
use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::BufRead;

/// An unordered key -> value mapping of an element's attributes.
pub type Attributes = HashMap<String, String>;

/// One event of the XML pull stream.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlEvent {
    StartDocument,
    EndDocument,
    StartElement { name: String, attrs: Attributes },
    EndElement { name: String },
    Characters(String),
}

/// A lazy, finite, single-pass iterator of [`XmlEvent`]s over a
/// `BufRead`. Attribute values are unescaped eagerly so the validator
/// never has to deal with XML entity syntax.
pub struct XmlEventStream<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    line: u64,
    pending: Vec<XmlEvent>,
    started: bool,
    done: bool,
}

impl<R: BufRead> XmlEventStream<R> {
    pub fn new(inner: R) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.trim_text(true);
        XmlEventStream {
            reader,
            buf: Vec::new(),
            line: 1,
            pending: Vec::new(),
            started: false,
            done: false,
        }
    }

    /// Best-effort current line number, used to annotate errors. Exact
    /// only insofar as the underlying reader's buffer boundaries align
    /// with line boundaries; good enough for diagnostics.
    pub fn line(&self) -> u64 {
        self.line
    }

    fn count_lines(&mut self) {
        self.line += self.buf.iter().filter(|b| **b == b'\n').count() as u64;
    }

    fn attrs_of(&self, start: &BytesStart) -> Result<Attributes> {
        let mut map = HashMap::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| Error::MalformedXml {
                message: e.to_string(),
                line: Some(self.line),
            })?;
            let value = attr.unescaped_value().map_err(|e| Error::MalformedXml {
                message: e.to_string(),
                line: Some(self.line),
            })?;
            map.insert(
                String::from_utf8_lossy(attr.key).into_owned(),
                String::from_utf8_lossy(value.as_ref()).into_owned(),
            );
        }
        Ok(map)
    }

    fn name_of(start: &BytesStart) -> String {
        String::from_utf8_lossy(start.name()).into_owned()
    }

    fn pull(&mut self) -> Result<Option<XmlEvent>> {
        if !self.started {
            self.started = true;
            return Ok(Some(XmlEvent::StartDocument));
        }
        if self.done {
            return Ok(None);
        }

        self.buf.clear();
        let event = self
            .reader
            .read_event(&mut self.buf)
            .map_err(|e| Error::MalformedXml {
                message: e.to_string(),
                line: Some(self.line),
            })?;

        let result = match event {
            Event::Start(ref start) => {
                let name = Self::name_of(start);
                let attrs = self.attrs_of(start)?;
                Some(XmlEvent::StartElement { name, attrs })
            }
            Event::Empty(ref start) => {
                let name = Self::name_of(start);
                let attrs = self.attrs_of(start)?;
                self.pending.push(XmlEvent::EndElement { name: name.clone() });
                Some(XmlEvent::StartElement { name, attrs })
            }
            Event::End(ref end) => {
                let name = String::from_utf8_lossy(end.name()).into_owned();
                Some(XmlEvent::EndElement { name })
            }
            Event::Text(ref text) | Event::CData(ref text) => {
                let unescaped = text.unescaped().map_err(|e| Error::MalformedXml {
                    message: e.to_string(),
                    line: Some(self.line),
                })?;
                let content = String::from_utf8_lossy(unescaped.as_ref()).into_owned();
                if content.is_empty() {
                    None
                } else {
                    Some(XmlEvent::Characters(content))
                }
            }
            Event::Eof => {
                self.done = true;
                Some(XmlEvent::EndDocument)
            }
            _ => None,
        };

        self.count_lines();

        match result {
            Some(event) => Ok(Some(event)),
            None => self.pull(),
        }
    }
}

impl<R: BufRead> Iterator for XmlEventStream<R> {
    type Item = Result<XmlEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(event) = self.pending.pop() {
            return Some(Ok(event));
        }
        match self.pull() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(xml: &str) -> Vec<XmlEvent> {
        XmlEventStream::new(xml.as_bytes())
            .map(|e| e.unwrap())
            .collect()
    }

    #[test]
    fn empty_element_yields_start_and_end() {
        let events = events(r#"<node id="1"/>"#);
        assert_eq!(events[0], XmlEvent::StartDocument);
        match &events[1] {
            XmlEvent::StartElement { name, attrs } => {
                assert_eq!(name, "node");
                assert_eq!(attrs.get("id"), Some(&"1".to_string()));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(
            events[2],
            XmlEvent::EndElement {
                name: "node".to_string()
            }
        );
        assert_eq!(events[3], XmlEvent::EndDocument);
    }

    #[test]
    fn nested_elements_and_text_are_reported() {
        let events = events("<osm><tag k=\"a\" v=\"b\"/></osm>");
        let names: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                XmlEvent::StartElement { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["osm".to_string(), "tag".to_string()]);
    }

    #[test]
    fn malformed_xml_is_reported() {
        let mut stream = XmlEventStream::new("<osm><node".as_bytes());
        let result: Result<Vec<_>> = stream.by_ref().collect();
        assert!(result.is_err());
    }
}
