//! Sub-region extractor: given a source [`Store`] and a bounding box,
//! computes a transitive closure of the primitives that box requires
//! and writes a fresh, self-consistent store.
//!
//! The closure is a five-step set computation rather than a graph
//! traversal, built on the relational schema in [`crate::store`] and
//! its chunked `IN (...)` query helpers.
use crate::element::{Bounds, OsmHeader, Record};
use crate::store::{self, ConvertOptions, ConvertReport, Store};
use std::collections::HashSet;
use std::path::Path;

/// Extract every primitive needed to make `boundary` self-consistent:
/// every node inside it, every way touching one of those nodes (plus
/// the nodes *that* way references, even outside the box), and every
/// relation whose node- or way-typed member falls in that set.
///
/// Writes the result into a fresh store at `dest`, through the same
/// transactional write path [`crate::store::convert`] uses.
pub fn extract(
    store: &Store,
    boundary: &Bounds,
    dest: impl AsRef<Path>,
    options: &ConvertOptions,
) -> crate::error::Result<ConvertReport> {
    let dest = dest.as_ref();
    log::debug!("extracting sub-region into {}", dest.display());

    let seed_nodes = store.nodes_in_box(boundary)?;
    let seed_ids: Vec<i64> = seed_nodes.iter().map(|n| n.id).collect();

    let way_ids = store.way_ids_touching_nodes(&seed_ids, options.chunk_size)?;
    let referenced_node_ids = store.node_ids_referenced_by_ways(&way_ids, options.chunk_size)?;

    let mut node_ids: HashSet<i64> = seed_ids.into_iter().collect();
    node_ids.extend(referenced_node_ids);
    let mut node_ids: Vec<i64> = node_ids.into_iter().collect();
    node_ids.sort_unstable();

    let relation_ids = store.relation_ids_touching(&node_ids, &way_ids, options.chunk_size)?;

    let source_header = store.osm()?;
    let header = OsmHeader {
        version: source_header.version,
        generator: format!("{} / extract", source_header.generator),
        timestamp: source_header.timestamp,
    };

    let mut records = Vec::with_capacity(2 + node_ids.len() + way_ids.len() + relation_ids.len());
    records.push(Record::Osm(header));
    records.push(Record::Bounds(*boundary));
    for id in &node_ids {
        records.push(Record::Node(store.node(*id)?));
    }
    for id in &way_ids {
        records.push(Record::Way(store.way(*id)?));
    }
    for id in &relation_ids {
        records.push(Record::Relation(store.relation(*id)?));
    }

    log::debug!(
        "extract closure: {} nodes, {} ways, {} relations",
        node_ids.len(),
        way_ids.len(),
        relation_ids.len()
    );

    store::write_into(dest, records.into_iter())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Boundary;
    use crate::store::convert;
    use tempfile::tempdir;

    const FIXTURE: &str = r#"<osm version="0.6" generator="test">
      <node id="1" lat="0.0" lon="0.0" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z"/>
      <node id="2" lat="1.0" lon="0.0" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z"/>
      <node id="3" lat="50.0" lon="50.0" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z"/>
      <way id="10" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z">
        <nd ref="1"/><nd ref="2"/>
        <tag k="highway" v="path"/>
      </way>
      <relation id="100" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z">
        <member type="way" ref="10" role=""/>
      </relation>
      <relation id="200" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z">
        <member type="node" ref="3" role=""/>
      </relation>
    </osm>"#;

    #[test]
    fn extract_closes_over_way_nodes_and_relations() {
        let dir = tempdir().unwrap();
        let source_path = dir.path().join("source.sqlite");
        convert(FIXTURE.as_bytes(), &source_path, ConvertOptions::default()).unwrap();
        let source = Store::open(&source_path).unwrap();

        // Box covers node 1 only; the way should pull in node 2 as well.
        let boundary = Boundary::new((-0.1, -0.1), (0.1, 0.1));
        let dest_path = dir.path().join("extract.sqlite");
        extract(&source, &boundary, &dest_path, &ConvertOptions::default()).unwrap();

        let extracted = Store::open(&dest_path).unwrap();
        let node_ids: Vec<i64> = extracted.nodes().unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(node_ids, vec![1, 2]);

        let way_ids: Vec<i64> = extracted.ways().unwrap().into_iter().map(|w| w.id).collect();
        assert_eq!(way_ids, vec![10]);

        let relation_ids: Vec<i64> = extracted.relations().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(relation_ids, vec![100]);

        let osm = extracted.osm().unwrap();
        assert!(osm.generator.ends_with(" / extract"));
        assert_eq!(extracted.bounds().unwrap(), boundary);
    }

    #[test]
    fn extract_refuses_existing_destination() {
        let dir = tempdir().unwrap();
        let source_path = dir.path().join("source.sqlite");
        convert(FIXTURE.as_bytes(), &source_path, ConvertOptions::default()).unwrap();
        let source = Store::open(&source_path).unwrap();

        let dest_path = dir.path().join("extract.sqlite");
        let boundary = Boundary::default();
        extract(&source, &boundary, &dest_path, &ConvertOptions::default()).unwrap();
        let err = extract(&source, &boundary, &dest_path, &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, crate::error::Error::DestinationExists(_)));
    }
}
