//! OSM primitive records.
//!
//! This models the element hierarchy as a tagged sum over `{Node, Way,
//! Relation, Bounds, Osm}` rather than through inheritance: each primitive
//! owns a `Tag` vector directly, and the validating-parse-only metadata
//! (`version`, `changeset`, `timestamp`, `uid`, `user`) is composed in via
//! [`Metadata`] rather than inherited from a common base class.
//!
//! See: https://wiki.openstreetmap.org/wiki/Elements

use crate::geo::Coordinate;
use chrono::{DateTime, Utc};

/// Key value pair. See OSM docs for [`Tags`].
///
/// [`Tags`]: https://wiki.openstreetmap.org/wiki/Tags
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl From<(&str, &str)> for Tag {
    fn from((key, value): (&str, &str)) -> Self {
        Tag {
            key: key.to_owned(),
            value: value.to_owned(),
        }
    }
}

impl From<(String, String)> for Tag {
    fn from((key, value): (String, String)) -> Self {
        Tag { key, value }
    }
}

/// Metadata captured by the validating parse only. Discarded before
/// persistence in the relational store (see `store::convert`).
#[derive(Debug, PartialEq, Clone)]
pub struct Metadata {
    pub version: u32,
    pub changeset: i64,
    pub timestamp: Option<DateTime<Utc>>,
    pub uid: i64,
    pub user: Option<String>,
}

/// A coordinate with tags. See OSM docs for [`Node`].
///
/// [`Node`]: https://wiki.openstreetmap.org/wiki/Node
#[derive(Debug, PartialEq, Clone)]
pub struct Node {
    pub id: i64,
    pub coordinate: Coordinate,
    pub tags: Vec<Tag>,
    pub meta: Option<Metadata>,
}

/// An ordered list of node references, with tags. See OSM docs for
/// [`Way`].
///
/// [`Way`]: https://wiki.openstreetmap.org/wiki/Way
#[derive(Debug, PartialEq, Clone)]
pub struct Way {
    pub id: i64,
    pub nodes: Vec<i64>,
    pub tags: Vec<Tag>,
    pub meta: Option<Metadata>,
}

/// The kind of primitive a relation [`Member`] refers to.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash)]
pub enum MemberType {
    Node,
    Way,
    Relation,
}

impl MemberType {
    pub fn as_str(self) -> &'static str {
        match self {
            MemberType::Node => "node",
            MemberType::Way => "way",
            MemberType::Relation => "relation",
        }
    }
}

/// A single member of a [`Relation`]: the kind and id of the referenced
/// primitive, plus a (possibly empty) role string.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct Member {
    pub member_type: MemberType,
    pub member_ref: i64,
    pub role: String,
}

/// A labelled grouping of nodes, ways and other relations. See OSM docs
/// for [`Relation`].
///
/// [`Relation`]: https://wiki.openstreetmap.org/wiki/Relation
#[derive(Debug, PartialEq, Clone)]
pub struct Relation {
    pub id: i64,
    pub members: Vec<Member>,
    pub tags: Vec<Tag>,
    pub meta: Option<Metadata>,
}

/// The `<osm>` file header: format version, generator, and an optional
/// generation timestamp, kept as the raw ISO-8601 string it was parsed
/// from so that the sentinel `"None"` round-trips through the store
/// exactly (see `store::schema`).
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct OsmHeader {
    pub version: String,
    pub generator: String,
    pub timestamp: Option<String>,
}

/// A bounding box covering every node's coordinates in the file.
pub type Bounds = crate::geo::Boundary;

/// One top-level record as emitted by the validator: the `osm` header,
/// the optional `bounds`, or a `node`/`way`/`relation` primitive.
#[derive(Debug, PartialEq, Clone)]
pub enum Record {
    Osm(OsmHeader),
    Bounds(Bounds),
    Node(Node),
    Way(Way),
    Relation(Relation),
}

impl Record {
    pub fn name(&self) -> &'static str {
        match self {
            Record::Osm(_) => "osm",
            Record::Bounds(_) => "bounds",
            Record::Node(_) => "node",
            Record::Way(_) => "way",
            Record::Relation(_) => "relation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_from_str_pair() {
        let tag: Tag = ("highway", "unclassified").into();
        assert_eq!(tag.key, "highway");
        assert_eq!(tag.value, "unclassified");
    }

    #[test]
    fn record_name() {
        let node = Record::Node(Node {
            id: 1,
            coordinate: (0.0, 0.0).into(),
            tags: vec![],
            meta: None,
        });
        assert_eq!(node.name(), "node");
    }
}
