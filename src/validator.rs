//! Schema validator & typed-element builder.
//!
//! Consumes the XML event stream, enforces the fixed OSM nesting grammar,
//! coerces attribute strings into typed fields, and emits a lazy sequence
//! of top-level typed records. Two surface shapes are offered over the
//! same internal state machine: a [`Validator`] iterator, and an
//! [`ElementSink`] callback interface for push consumers — both produce
//! identical records in identical order.
use crate::element::{Bounds, Member, MemberType, Metadata, Node, OsmHeader, Record, Relation, Tag, Way};
use crate::error::{Error, Result};
use crate::xml_stream::{Attributes, XmlEvent, XmlEventStream};
use chrono::{DateTime, TimeZone, Utc};
use std::io::BufRead;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

fn attr<'a>(attrs: &'a Attributes, name: &str) -> Option<&'a str> {
    attrs.get(name).map(String::as_str)
}

fn required<'a>(element: &str, attrs: &'a Attributes, name: &str) -> Result<&'a str> {
    attr(attrs, name).ok_or_else(|| Error::BadAttribute {
        name: format!("{}@{}", element, name),
        value: String::new(),
    })
}

fn parse_i64(element: &str, attrs: &Attributes, name: &str) -> Result<i64> {
    let raw = required(element, attrs, name)?;
    raw.parse().map_err(|_| Error::BadAttribute {
        name: name.to_string(),
        value: raw.to_string(),
    })
}

fn parse_u32(element: &str, attrs: &Attributes, name: &str) -> Result<u32> {
    let raw = required(element, attrs, name)?;
    raw.parse().map_err(|_| Error::BadAttribute {
        name: name.to_string(),
        value: raw.to_string(),
    })
}

fn parse_f64(element: &str, attrs: &Attributes, name: &str) -> Result<f64> {
    let raw = required(element, attrs, name)?;
    raw.parse().map_err(|_| Error::BadAttribute {
        name: name.to_string(),
        value: raw.to_string(),
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    chrono::NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| Error::BadAttribute {
            name: "timestamp".to_string(),
            value: raw.to_string(),
        })
}

fn check_known_attrs(element: &str, attrs: &Attributes, known: &[&str]) -> Result<()> {
    for key in attrs.keys() {
        if !known.contains(&key.as_str()) {
            return Err(Error::UnknownAttribute {
                element: element.to_string(),
                name: key.clone(),
            });
        }
    }
    Ok(())
}

fn check_visible(element: &'static str, id: i64, attrs: &Attributes) -> Result<bool> {
    match attr(attrs, "visible") {
        None => Ok(true),
        Some("true") => Ok(true),
        Some(_) => Err(Error::NonVisibleElement { element, id }),
    }
}

fn build_metadata(attrs: &Attributes) -> Result<Option<Metadata>> {
    if attr(attrs, "version").is_none() {
        return Ok(None);
    }
    let version = parse_u32("element", attrs, "version")?;
    let changeset = if attr(attrs, "changeset").is_some() {
        parse_i64("element", attrs, "changeset")?
    } else {
        0
    };
    let uid = if attr(attrs, "uid").is_some() {
        parse_i64("element", attrs, "uid")?
    } else {
        0
    };
    let timestamp = match attr(attrs, "timestamp") {
        Some(raw) => Some(parse_timestamp(raw)?),
        None => None,
    };
    let user = attr(attrs, "user").map(str::to_owned);
    Ok(Some(Metadata {
        version,
        changeset,
        timestamp,
        uid,
        user,
    }))
}

fn allowed_children(parent: &str) -> Option<&'static [&'static str]> {
    match parent {
        "osm" => Some(&["bounds", "node", "way", "relation"]),
        "node" => Some(&["tag"]),
        "way" => Some(&["nd", "tag"]),
        "relation" => Some(&["member", "tag"]),
        _ => None,
    }
}

enum Pending {
    Node(Node, bool),
    Way(Way, bool),
    Relation(Relation, bool),
}

/// Internal state machine shared by [`Validator`] and [`drive`].
struct Core {
    stack: Vec<String>,
    pending: Option<Pending>,
    filter_invisible: bool,
}

impl Core {
    fn new(filter_invisible: bool) -> Self {
        Core {
            stack: Vec::new(),
            pending: None,
            filter_invisible,
        }
    }

    fn line(&self, stream_line: u64) -> Option<u64> {
        Some(stream_line)
    }

    fn feed(&mut self, event: XmlEvent, stream_line: u64) -> Result<Option<Record>> {
        match event {
            XmlEvent::StartDocument | XmlEvent::EndDocument => Ok(None),
            XmlEvent::Characters(text) => {
                let parent = self.stack.last().cloned().unwrap_or_default();
                Err(Error::UnexpectedText {
                    parent,
                    line: self.line(stream_line),
                })
            }
            XmlEvent::StartElement { name, attrs } => self.start(name, attrs, stream_line),
            XmlEvent::EndElement { name } => self.end(name, stream_line),
        }
    }

    fn start(&mut self, name: String, attrs: Attributes, stream_line: u64) -> Result<Option<Record>> {
        if self.stack.is_empty() {
            if name != "osm" {
                return Err(Error::TopLevelExpected {
                    found: name,
                    line: self.line(stream_line),
                });
            }
            check_known_attrs("osm", &attrs, &["version", "generator", "timestamp"])?;
            let header = OsmHeader {
                version: required("osm", &attrs, "version")?.to_owned(),
                generator: required("osm", &attrs, "generator")?.to_owned(),
                timestamp: attr(&attrs, "timestamp").map(str::to_owned),
            };
            self.stack.push(name);
            return Ok(Some(Record::Osm(header)));
        }

        let parent = self.stack.last().cloned().unwrap_or_default();
        let allowed = allowed_children(&parent).unwrap_or(&[]);
        if !allowed.contains(&name.as_str()) {
            return Err(Error::UnexpectedChild {
                parent,
                child: name,
                line: self.line(stream_line),
            });
        }
        self.stack.push(name.clone());

        match name.as_str() {
            "bounds" => {
                check_known_attrs("bounds", &attrs, &["minlat", "minlon", "maxlat", "maxlon"])?;
                let bounds = Bounds::new(
                    (
                        parse_f64("bounds", &attrs, "minlat")?,
                        parse_f64("bounds", &attrs, "minlon")?,
                    ),
                    (
                        parse_f64("bounds", &attrs, "maxlat")?,
                        parse_f64("bounds", &attrs, "maxlon")?,
                    ),
                );
                Ok(Some(Record::Bounds(bounds)))
            }
            "node" => {
                check_known_attrs(
                    "node",
                    &attrs,
                    &[
                        "id", "lat", "lon", "version", "changeset", "timestamp", "uid", "user",
                        "visible",
                    ],
                )?;
                let id = parse_i64("node", &attrs, "id")?;
                let visible = check_visible("node", id, &attrs).map(|_| true);
                let skip = if self.filter_invisible {
                    visible.is_err()
                } else {
                    visible?;
                    false
                };
                let node = Node {
                    id,
                    coordinate: (
                        parse_f64("node", &attrs, "lat")?,
                        parse_f64("node", &attrs, "lon")?,
                    )
                        .into(),
                    tags: Vec::new(),
                    meta: build_metadata(&attrs)?,
                };
                self.pending = Some(Pending::Node(node, skip));
                Ok(None)
            }
            "way" => {
                check_known_attrs(
                    "way",
                    &attrs,
                    &["id", "version", "changeset", "timestamp", "uid", "user", "visible"],
                )?;
                let id = parse_i64("way", &attrs, "id")?;
                let visible = check_visible("way", id, &attrs).map(|_| true);
                let skip = if self.filter_invisible {
                    visible.is_err()
                } else {
                    visible?;
                    false
                };
                let way = Way {
                    id,
                    nodes: Vec::new(),
                    tags: Vec::new(),
                    meta: build_metadata(&attrs)?,
                };
                self.pending = Some(Pending::Way(way, skip));
                Ok(None)
            }
            "relation" => {
                check_known_attrs(
                    "relation",
                    &attrs,
                    &["id", "version", "changeset", "timestamp", "uid", "user", "visible"],
                )?;
                let id = parse_i64("relation", &attrs, "id")?;
                let visible = check_visible("relation", id, &attrs).map(|_| true);
                let skip = if self.filter_invisible {
                    visible.is_err()
                } else {
                    visible?;
                    false
                };
                let relation = Relation {
                    id,
                    members: Vec::new(),
                    tags: Vec::new(),
                    meta: build_metadata(&attrs)?,
                };
                self.pending = Some(Pending::Relation(relation, skip));
                Ok(None)
            }
            "tag" => {
                check_known_attrs("tag", &attrs, &["k", "v"])?;
                let tag: Tag = (
                    required("tag", &attrs, "k")?.to_owned(),
                    required("tag", &attrs, "v")?.to_owned(),
                )
                    .into();
                match &mut self.pending {
                    Some(Pending::Node(n, _)) => n.tags.push(tag),
                    Some(Pending::Way(w, _)) => w.tags.push(tag),
                    Some(Pending::Relation(r, _)) => r.tags.push(tag),
                    None => {}
                }
                Ok(None)
            }
            "nd" => {
                check_known_attrs("nd", &attrs, &["ref"])?;
                let node_ref = parse_i64("nd", &attrs, "ref")?;
                if let Some(Pending::Way(w, _)) = &mut self.pending {
                    w.nodes.push(node_ref);
                }
                Ok(None)
            }
            "member" => {
                check_known_attrs("member", &attrs, &["type", "ref", "role"])?;
                let member_ref = parse_i64("member", &attrs, "ref")?;
                let type_str = required("member", &attrs, "type")?;
                let member_type = match type_str {
                    "node" => MemberType::Node,
                    "way" => MemberType::Way,
                    "relation" => MemberType::Relation,
                    other => {
                        return Err(Error::BadAttribute {
                            name: "type".to_string(),
                            value: other.to_string(),
                        })
                    }
                };
                let role = attr(&attrs, "role").unwrap_or("").to_owned();
                if let Some(Pending::Relation(r, _)) = &mut self.pending {
                    r.members.push(Member {
                        member_type,
                        member_ref,
                        role,
                    });
                }
                Ok(None)
            }
            other => Err(Error::UnexpectedChild {
                parent,
                child: other.to_string(),
                line: self.line(stream_line),
            }),
        }
    }

    fn end(&mut self, name: String, stream_line: u64) -> Result<Option<Record>> {
        match self.stack.last() {
            Some(open) if open == &name => {
                self.stack.pop();
            }
            Some(open) => {
                return Err(Error::MalformedXml {
                    message: format!("expected </{}> but found </{}>", open, name),
                    line: self.line(stream_line),
                })
            }
            None => {
                return Err(Error::MalformedXml {
                    message: format!("unbalanced </{}>", name),
                    line: self.line(stream_line),
                })
            }
        }

        match name.as_str() {
            "node" => match self.pending.take() {
                Some(Pending::Node(n, skip)) => Ok(if skip { None } else { Some(Record::Node(n)) }),
                _ => Ok(None),
            },
            "way" => match self.pending.take() {
                Some(Pending::Way(w, skip)) => Ok(if skip { None } else { Some(Record::Way(w)) }),
                _ => Ok(None),
            },
            "relation" => match self.pending.take() {
                Some(Pending::Relation(r, skip)) => {
                    Ok(if skip { None } else { Some(Record::Relation(r)) })
                }
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }
}

/// Lazy, finite sequence of typed [`Record`]s.
pub struct Validator<R: BufRead> {
    stream: XmlEventStream<R>,
    core: Core,
}

impl<R: BufRead> Validator<R> {
    /// Strict validator: a non-visible primitive raises
    /// [`Error::NonVisibleElement`].
    pub fn new(reader: R) -> Self {
        Validator {
            stream: XmlEventStream::new(reader),
            core: Core::new(false),
        }
    }

    /// Lenient validator: non-visible primitives are silently dropped,
    /// which is what the persistence path wants instead of an error.
    pub fn lenient(reader: R) -> Self {
        Validator {
            stream: XmlEventStream::new(reader),
            core: Core::new(true),
        }
    }
}

impl<R: BufRead> Iterator for Validator<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let event = match self.stream.next() {
                Some(Ok(event)) => event,
                Some(Err(e)) => return Some(Err(e)),
                None => return None,
            };
            let line = self.stream.line();
            match self.core.feed(event, line) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Push-style counterpart to [`Validator`]; one method per record kind.
/// The contract matches the iterator surface one-for-one.
pub trait ElementSink {
    fn start(&mut self, osm: OsmHeader);
    fn bounds(&mut self, bounds: Bounds);
    fn node(&mut self, node: Node);
    fn way(&mut self, way: Way);
    fn relation(&mut self, relation: Relation);
    fn end(&mut self);
}

/// Drive `sink` from `reader`, using the same grammar/coercion rules as
/// [`Validator`].
pub fn drive<R: BufRead, S: ElementSink>(reader: R, strict: bool, sink: &mut S) -> Result<()> {
    let validator = if strict {
        Validator::new(reader)
    } else {
        Validator::lenient(reader)
    };
    for record in validator {
        match record? {
            Record::Osm(header) => sink.start(header),
            Record::Bounds(bounds) => sink.bounds(bounds),
            Record::Node(node) => sink.node(node),
            Record::Way(way) => sink.way(way),
            Record::Relation(relation) => sink.relation(relation),
        }
    }
    sink.end();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::MemberType;

    fn records(xml: &str) -> Result<Vec<Record>> {
        Validator::new(xml.as_bytes()).collect()
    }

    #[test]
    fn scenario_a_single_node() {
        let xml = r#"<osm version="0.6" generator="t">
          <bounds minlat="0" minlon="0" maxlat="1" maxlon="1"/>
          <node id="1" lat="54.0901746" lon="12.2482632"
                version="1" changeset="1" timestamp="2008-09-21T21:37:45Z">
            <tag k="name" v="bob"/>
          </node>
        </osm>"#;
        let recs = records(xml).unwrap();
        assert_eq!(recs.len(), 3);
        match &recs[2] {
            Record::Node(n) => {
                assert_eq!(n.id, 1);
                assert_eq!(n.coordinate.lat(), 54.0901746);
                assert_eq!(n.coordinate.lon(), 12.2482632);
                assert_eq!(n.tags, vec![("name", "bob").into()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn scenario_b_way_with_three_nodes() {
        let xml = r#"<osm version="0.6" generator="t"><way id="26659127" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z">
            <nd ref="292403538"/><nd ref="298884289"/><nd ref="261728686"/>
            <tag k="highway" v="unclassified"/>
            <tag k="name" v="Pastower Straße"/>
            </way></osm>"#;
        let recs = records(xml).unwrap();
        match &recs[1] {
            Record::Way(w) => {
                assert_eq!(w.nodes, vec![292403538, 298884289, 261728686]);
                assert_eq!(w.tags[0], ("highway", "unclassified").into());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn scenario_c_relation_with_mixed_members() {
        let xml = r#"<osm version="0.6" generator="t"><relation id="56688" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z">
            <member type="node" ref="294942404" role=""/>
            <member type="way" ref="4579143" role=""/>
            <tag k="route" v="bus"/>
            </relation></osm>"#;
        let recs = records(xml).unwrap();
        match &recs[1] {
            Record::Relation(r) => {
                assert_eq!(r.members.len(), 2);
                assert_eq!(r.members[0].member_type, MemberType::Node);
                assert_eq!(r.members[1].member_type, MemberType::Way);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unexpected_top_level_element() {
        let err = records(r#"<way id="1" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z"></way>"#)
            .unwrap_err();
        assert!(matches!(err, Error::TopLevelExpected { .. }));
    }

    #[test]
    fn unexpected_child() {
        let xml = r#"<osm version="0.6" generator="t"><node id="1" lat="1" lon="1" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z"><member type="node" ref="1" role=""/></node></osm>"#;
        let err = records(xml).unwrap_err();
        assert!(matches!(err, Error::UnexpectedChild { .. }));
    }

    #[test]
    fn non_visible_element_rejected_in_strict_mode() {
        let xml = r#"<osm version="0.6" generator="t"><node id="1" lat="1" lon="1" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z" visible="false"/></osm>"#;
        let err = records(xml).unwrap_err();
        assert!(matches!(err, Error::NonVisibleElement { .. }));
    }

    #[test]
    fn non_visible_element_filtered_in_lenient_mode() {
        let xml = r#"<osm version="0.6" generator="t"><node id="1" lat="1" lon="1" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z" visible="false"/></osm>"#;
        let recs: Vec<Record> = Validator::lenient(xml.as_bytes())
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(recs.len(), 1);
        assert!(matches!(recs[0], Record::Osm(_)));
    }

    #[test]
    fn unknown_attribute_rejected() {
        let xml = r#"<osm version="0.6" generator="t" bogus="x"></osm>"#;
        let err = records(xml).unwrap_err();
        assert!(matches!(err, Error::UnknownAttribute { .. }));
    }

    #[test]
    fn duplicate_node_refs_preserved() {
        let xml = r#"<osm version="0.6" generator="t"><way id="1" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z">
            <nd ref="1"/><nd ref="2"/><nd ref="1"/>
            </way></osm>"#;
        let recs = records(xml).unwrap();
        match &recs[1] {
            Record::Way(w) => assert_eq!(w.nodes, vec![1, 2, 1]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        records: Vec<Record>,
        ended: bool,
    }

    impl ElementSink for RecordingSink {
        fn start(&mut self, osm: OsmHeader) {
            self.records.push(Record::Osm(osm));
        }
        fn bounds(&mut self, bounds: Bounds) {
            self.records.push(Record::Bounds(bounds));
        }
        fn node(&mut self, node: Node) {
            self.records.push(Record::Node(node));
        }
        fn way(&mut self, way: Way) {
            self.records.push(Record::Way(way));
        }
        fn relation(&mut self, relation: Relation) {
            self.records.push(Record::Relation(relation));
        }
        fn end(&mut self) {
            self.ended = true;
        }
    }

    #[test]
    fn drive_and_iterator_produce_identical_records() {
        let xml = r#"<osm version="0.6" generator="t">
          <bounds minlat="0" minlon="0" maxlat="1" maxlon="1"/>
          <node id="1" lat="1.0" lon="1.0" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z">
            <tag k="name" v="bob"/>
          </node>
          <way id="2" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z">
            <nd ref="1"/>
          </way>
          <relation id="3" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z">
            <member type="node" ref="1" role="stop"/>
          </relation>
        </osm>"#;

        let from_iterator = records(xml).unwrap();

        let mut sink = RecordingSink::default();
        drive(xml.as_bytes(), true, &mut sink).unwrap();

        assert!(sink.ended);
        assert_eq!(sink.records, from_iterator);
    }
}
