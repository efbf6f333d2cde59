//! In-memory aggregate indexes: compact accelerators built by a second,
//! lighter scan over the validated record stream, independent of the
//! relational store.
//!
//! A sorted-array packed node index plus per-kind inverted tag maps,
//! serialized with a magic number and a version byte so an
//! incompatible future layout fails loudly on read instead of silently
//! misinterpreting bytes. This blob is a crate-private cache, never an
//! interchange format.
use crate::element::Record;
use crate::error::{Error, Result};
use crate::geo::Coordinate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const MAGIC: [u8; 4] = *b"OSMX";
const FORMAT_VERSION: u8 = 1;

/// Sorted-parallel-array coordinate index: O(log n) lookup by id at
/// roughly 16 bytes per node.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PackedNodeIndex {
    ids: Vec<i64>,
    lat: Vec<i32>,
    lon: Vec<i32>,
}

impl PackedNodeIndex {
    /// Build from `(id, coordinate)` pairs in arbitrary order; sorts by
    /// id once.
    pub fn build(mut entries: Vec<(i64, Coordinate)>) -> PackedNodeIndex {
        entries.sort_unstable_by_key(|(id, _)| *id);
        let mut ids = Vec::with_capacity(entries.len());
        let mut lat = Vec::with_capacity(entries.len());
        let mut lon = Vec::with_capacity(entries.len());
        for (id, coordinate) in entries {
            ids.push(id);
            lat.push(coordinate.lat);
            lon.push(coordinate.lon);
        }
        PackedNodeIndex { ids, lat, lon }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<Coordinate> {
        let i = self.ids.binary_search(&id).ok()?;
        Some(Coordinate {
            lat: self.lat[i],
            lon: self.lon[i],
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, Coordinate)> + '_ {
        self.ids.iter().zip(self.lat.iter()).zip(self.lon.iter()).map(|((&id, &lat), &lon)| {
            (id, Coordinate { lat, lon })
        })
    }
}

/// Inverted `(key, value) -> [id]` map, one per primitive kind.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TagIndex {
    from_nodes: HashMap<(String, String), Vec<i64>>,
    from_ways: HashMap<(String, String), Vec<i64>>,
    from_relations: HashMap<(String, String), Vec<i64>>,
}

impl TagIndex {
    pub fn nodes(&self, key: &str, value: &str) -> &[i64] {
        self.from_nodes
            .get(&(key.to_owned(), value.to_owned()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn ways(&self, key: &str, value: &str) -> &[i64] {
        self.from_ways
            .get(&(key.to_owned(), value.to_owned()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn relations(&self, key: &str, value: &str) -> &[i64] {
        self.from_relations
            .get(&(key.to_owned(), value.to_owned()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn insert(map: &mut HashMap<(String, String), Vec<i64>>, key: &str, value: &str, id: i64) {
        map.entry((key.to_owned(), value.to_owned())).or_default().push(id);
    }
}

/// Derived by-id lookup: "tags of primitive x" in one hop.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TagsById {
    nodes: HashMap<i64, HashMap<String, String>>,
    ways: HashMap<i64, HashMap<String, String>>,
    relations: HashMap<i64, HashMap<String, String>>,
}

impl TagsById {
    pub fn node(&self, id: i64) -> HashMap<String, String> {
        self.nodes.get(&id).cloned().unwrap_or_default()
    }

    pub fn way(&self, id: i64) -> HashMap<String, String> {
        self.ways.get(&id).cloned().unwrap_or_default()
    }

    pub fn relation(&self, id: i64) -> HashMap<String, String> {
        self.relations.get(&id).cloned().unwrap_or_default()
    }

    fn from_tag_index(tags: &TagIndex) -> TagsById {
        let mut by_id = TagsById::default();
        Self::populate(&tags.from_nodes, &mut by_id.nodes);
        Self::populate(&tags.from_ways, &mut by_id.ways);
        Self::populate(&tags.from_relations, &mut by_id.relations);
        by_id
    }

    fn populate(input: &HashMap<(String, String), Vec<i64>>, output: &mut HashMap<i64, HashMap<String, String>>) {
        for ((key, value), ids) in input {
            for &id in ids {
                output.entry(id).or_default().insert(key.clone(), value.clone());
            }
        }
    }
}

/// The three independent artifacts built by one pass over a record
/// stream, bundled together for convenience.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Indexes {
    pub nodes: PackedNodeIndex,
    pub tags: TagIndex,
    pub tags_by_id: TagsById,
}

impl Indexes {
    /// Build all three indexes from a single pass over `records`.
    pub fn build(records: impl Iterator<Item = Result<Record>>) -> Result<Indexes> {
        let mut node_entries = Vec::new();
        let mut tags = TagIndex::default();

        for record in records {
            match record? {
                Record::Node(node) => {
                    node_entries.push((node.id, node.coordinate));
                    for tag in &node.tags {
                        TagIndex::insert(&mut tags.from_nodes, &tag.key, &tag.value, node.id);
                    }
                }
                Record::Way(way) => {
                    for tag in &way.tags {
                        TagIndex::insert(&mut tags.from_ways, &tag.key, &tag.value, way.id);
                    }
                }
                Record::Relation(relation) => {
                    for tag in &relation.tags {
                        TagIndex::insert(&mut tags.from_relations, &tag.key, &tag.value, relation.id);
                    }
                }
                Record::Osm(_) | Record::Bounds(_) => {}
            }
        }

        let tags_by_id = TagsById::from_tag_index(&tags);
        Ok(Indexes {
            nodes: PackedNodeIndex::build(node_entries),
            tags,
            tags_by_id,
        })
    }

    /// Serialize to the crate-private binary blob format: a 4-byte
    /// magic number, a format version byte, then the `bincode` encoding
    /// of the indexes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        buf.push(FORMAT_VERSION);
        let body = bincode::serialize(self).map_err(|e| Error::CorruptIndex(e.to_string()))?;
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    /// Reverse of [`to_bytes`]. Rejects a missing/wrong magic number and
    /// an unsupported format version before attempting to decode the
    /// body, so a future incompatible layout change fails loudly rather
    /// than silently misinterpreting bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Indexes> {
        if bytes.len() < MAGIC.len() + 1 {
            return Err(Error::CorruptIndex("blob is too short to contain a header".to_string()));
        }
        if bytes[..MAGIC.len()] != MAGIC {
            return Err(Error::CorruptIndex("missing magic number".to_string()));
        }
        let found_version = bytes[MAGIC.len()];
        if found_version != FORMAT_VERSION {
            return Err(Error::UnsupportedIndexVersion {
                found: found_version,
                expected: FORMAT_VERSION,
            });
        }
        bincode::deserialize(&bytes[MAGIC.len() + 1..]).map_err(|e| Error::CorruptIndex(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::Validator;

    const FIXTURE: &str = r#"<osm version="0.6" generator="test">
      <node id="1" lat="1.0" lon="2.0" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z">
        <tag k="amenity" v="cafe"/>
      </node>
      <node id="2" lat="3.0" lon="4.0" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z"/>
      <way id="10" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z">
        <tag k="highway" v="path"/>
      </way>
    </osm>"#;

    #[test]
    fn packed_node_index_bisects() {
        let index = PackedNodeIndex::build(vec![
            (5, (1.0, 1.0).into()),
            (1, (0.0, 0.0).into()),
            (3, (2.0, 2.0).into()),
        ]);
        assert_eq!(index.get(3), Some((2.0, 2.0).into()));
        assert_eq!(index.get(99), None);
    }

    #[test]
    fn build_from_record_stream() {
        let indexes = Indexes::build(Validator::new(FIXTURE.as_bytes())).unwrap();
        assert_eq!(indexes.nodes.len(), 2);
        assert_eq!(indexes.tags.nodes("amenity", "cafe"), &[1]);
        assert_eq!(indexes.tags.ways("highway", "path"), &[10]);
        assert_eq!(indexes.tags_by_id.node(1).get("amenity").map(String::as_str), Some("cafe"));
    }

    #[test]
    fn blob_round_trips() {
        let indexes = Indexes::build(Validator::new(FIXTURE.as_bytes())).unwrap();
        let bytes = indexes.to_bytes().unwrap();
        let restored = Indexes::from_bytes(&bytes).unwrap();
        assert_eq!(indexes, restored);
    }

    #[test]
    fn blob_rejects_bad_magic() {
        let err = Indexes::from_bytes(b"xxxx\x01").unwrap_err();
        assert!(matches!(err, Error::CorruptIndex(_)));
    }

    #[test]
    fn blob_rejects_future_version() {
        let mut bytes = Indexes::default().to_bytes().unwrap();
        bytes[MAGIC.len()] = FORMAT_VERSION + 1;
        let err = Indexes::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedIndexVersion { found, expected } if found == FORMAT_VERSION + 1 && expected == FORMAT_VERSION
        ));
    }
}
