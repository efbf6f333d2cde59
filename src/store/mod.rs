//! Relational persistence layer: a normalized, `rusqlite`-backed schema
//! that a validated XML stream is converted into once, and a read-only
//! query API over the result (point lookup, ordered iteration,
//! bounding-box scan, conjunctive tag search).
//!
//! One `osm` row, one `bounds` row, one row per primitive plus a side
//! table of `(osm_id, key, value)` tags, built inside a single
//! transaction with periodic progress reports.
mod schema;

use crate::element::{Bounds, Member, MemberType, Node, OsmHeader, Record, Relation, Tag, Way};
use crate::error::{Error, Result};
use crate::geo::{Boundary, Coordinate};
use crate::validator::Validator;
use rusqlite::{params, Connection, OpenFlags};
use std::collections::HashSet;
use std::io::BufRead;
use std::path::Path;

/// Tunables for [`convert`]/[`convert_iter`].
#[derive(Debug, Clone, Copy)]
pub struct ConvertOptions {
    /// Emit a progress report every this many primitives.
    pub progress_interval: u64,
    /// Maximum number of ids per generated `IN (...)` clause.
    pub chunk_size: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            progress_interval: 100_000,
            chunk_size: 10_240,
        }
    }
}

/// Monotonically increasing counters reported during [`convert_iter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertReport {
    pub primitives_processed: u64,
    pub tags_processed: u64,
}

/// Converts `source` into a fresh SQLite file at `dest`, one transaction
/// for the whole operation. Errors (rather than overwriting) if `dest`
/// already exists.
///
/// Non-visible primitives are filtered rather than rejected: that's the
/// right behavior for a persistence path, as opposed to the strict
/// validator used for debugging.
pub fn convert<R: BufRead>(
    source: R,
    dest: impl AsRef<Path>,
    options: ConvertOptions,
) -> Result<ConvertReport> {
    let mut last = ConvertReport::default();
    for report in convert_iter(source, dest, options)? {
        last = report?;
    }
    Ok(last)
}

/// Like [`convert`], but returns an iterator that performs the
/// conversion lazily, yielding a [`ConvertReport`] at each progress
/// checkpoint and a final one when the input is exhausted.
pub fn convert_iter<R: BufRead>(
    source: R,
    dest: impl AsRef<Path>,
    options: ConvertOptions,
) -> Result<ConvertProgress<R>> {
    let dest = dest.as_ref();
    if dest.exists() {
        return Err(Error::DestinationExists(dest.to_path_buf()));
    }
    log::debug!("starting conversion into {}", dest.display());
    let conn = Connection::open(dest)?;
    schema::create(&conn)?;
    let validator = Validator::lenient(source);
    ConvertProgress::new(validator, conn, options)
}

/// Write a pre-built sequence of records directly into a fresh store,
/// bypassing the XML validator entirely. Used by [`crate::extract`] to
/// re-use the exact same schema and transactional write path for a
/// sub-region extract, whose records are already typed and in hand
/// rather than arriving as XML.
pub(crate) fn write_into(dest: &Path, records: impl Iterator<Item = Record>) -> Result<ConvertReport> {
    if dest.exists() {
        return Err(Error::DestinationExists(dest.to_path_buf()));
    }
    let conn = Connection::open(dest)?;
    schema::create(&conn)?;
    conn.execute_batch("BEGIN")?;
    let mut report = ConvertReport::default();
    let mut committed = false;
    let result = (|| {
        for record in records {
            write_record(&conn, &record, &mut report)?;
        }
        Ok(())
    })();
    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT")?;
            committed = true;
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(e);
        }
    }
    debug_assert!(committed);
    Ok(report)
}

/// Lazy driver behind [`convert_iter`]. Holds the single transaction for
/// the whole run; rolls it back on drop unless it reached `COMMIT`.
pub struct ConvertProgress<R: BufRead> {
    validator: Validator<R>,
    conn: Connection,
    options: ConvertOptions,
    report: ConvertReport,
    committed: bool,
    done: bool,
}

impl<R: BufRead> ConvertProgress<R> {
    fn new(validator: Validator<R>, conn: Connection, options: ConvertOptions) -> Result<Self> {
        conn.execute_batch("BEGIN")?;
        Ok(ConvertProgress {
            validator,
            conn,
            options,
            report: ConvertReport::default(),
            committed: false,
            done: false,
        })
    }
}

impl<R: BufRead> Iterator for ConvertProgress<R> {
    type Item = Result<ConvertReport>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.validator.next() {
                None => {
                    if let Err(e) = self.conn.execute_batch("COMMIT") {
                        self.done = true;
                        return Some(Err(e.into()));
                    }
                    self.committed = true;
                    self.done = true;
                    log::debug!(
                        "conversion finished: {} primitives, {} tags",
                        self.report.primitives_processed,
                        self.report.tags_processed
                    );
                    return Some(Ok(self.report));
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(record)) => {
                    let is_primitive = matches!(record, Record::Node(_) | Record::Way(_) | Record::Relation(_));
                    if let Err(e) = write_record(&self.conn, &record, &mut self.report) {
                        self.done = true;
                        return Some(Err(e));
                    }
                    if is_primitive {
                        self.report.primitives_processed += 1;
                        if self.report.primitives_processed % self.options.progress_interval == 0 {
                            log::trace!(
                                "progress: {} primitives, {} tags",
                                self.report.primitives_processed,
                                self.report.tags_processed
                            );
                            return Some(Ok(self.report));
                        }
                    }
                }
            }
        }
    }
}

impl<R: BufRead> Drop for ConvertProgress<R> {
    fn drop(&mut self) {
        if !self.committed {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}

fn write_record(conn: &Connection, record: &Record, report: &mut ConvertReport) -> Result<()> {
    match record {
        Record::Osm(header) => {
            conn.execute(
                "INSERT INTO osm (version, generator, gentime) VALUES (?1, ?2, ?3)",
                params![
                    header.version,
                    header.generator,
                    schema::gentime_to_storage(header.timestamp.as_deref())
                ],
            )?;
        }
        Record::Bounds(bounds) => {
            conn.execute(
                "INSERT INTO bounds (minlat, minlon, maxlat, maxlon) VALUES (?1, ?2, ?3, ?4)",
                params![bounds.min.lat, bounds.min.lon, bounds.max.lat, bounds.max.lon],
            )?;
        }
        Record::Node(node) => {
            conn.execute(
                "INSERT INTO nodes (osm_id, latitude, longitude) VALUES (?1, ?2, ?3)",
                params![node.id, node.coordinate.lat, node.coordinate.lon],
            )?;
            for tag in &node.tags {
                conn.execute(
                    "INSERT INTO node_tags (osm_id, key, value) VALUES (?1, ?2, ?3)",
                    params![node.id, tag.key, tag.value],
                )?;
                report.tags_processed += 1;
            }
        }
        Record::Way(way) => {
            conn.execute("INSERT INTO ways (osm_id) VALUES (?1)", params![way.id])?;
            for (position, node_id) in way.nodes.iter().enumerate() {
                conn.execute(
                    "INSERT INTO way_nodes (osm_id, position, node_id) VALUES (?1, ?2, ?3)",
                    params![way.id, position as i64, node_id],
                )?;
            }
            for tag in &way.tags {
                conn.execute(
                    "INSERT INTO way_tags (osm_id, key, value) VALUES (?1, ?2, ?3)",
                    params![way.id, tag.key, tag.value],
                )?;
                report.tags_processed += 1;
            }
        }
        Record::Relation(relation) => {
            conn.execute("INSERT INTO relations (osm_id) VALUES (?1)", params![relation.id])?;
            for (position, member) in relation.members.iter().enumerate() {
                conn.execute(
                    "INSERT INTO relation_members (osm_id, position, member_type, member_ref, role)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        relation.id,
                        position as i64,
                        member.member_type.as_str(),
                        member.member_ref,
                        member.role
                    ],
                )?;
            }
            for tag in &relation.tags {
                conn.execute(
                    "INSERT INTO relation_tags (osm_id, key, value) VALUES (?1, ?2, ?3)",
                    params![relation.id, tag.key, tag.value],
                )?;
                report.tags_processed += 1;
            }
        }
    }
    Ok(())
}

/// Read-only handle onto a converted store.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open an existing store for querying. The connection is read-only;
    /// use [`convert`] to build a store in the first place.
    pub fn open(path: impl AsRef<Path>) -> Result<Store> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Store { conn })
    }

    pub fn osm(&self) -> Result<OsmHeader> {
        let (version, generator, gentime) = self.conn.query_row(
            "SELECT version, generator, gentime FROM osm",
            [],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            },
        )?;
        Ok(OsmHeader {
            version,
            generator,
            timestamp: schema::gentime_from_storage(gentime),
        })
    }

    pub fn bounds(&self) -> Result<Bounds> {
        self.conn
            .query_row("SELECT minlat, minlon, maxlat, maxlon FROM bounds", [], |row| {
                Ok(Boundary {
                    min: Coordinate {
                        lat: row.get(0)?,
                        lon: row.get(1)?,
                    },
                    max: Coordinate {
                        lat: row.get(2)?,
                        lon: row.get(3)?,
                    },
                })
            })
            .map_err(Error::from)
    }

    pub fn node(&self, id: i64) -> Result<Node> {
        let coordinate = self
            .conn
            .query_row(
                "SELECT latitude, longitude FROM nodes WHERE osm_id = ?1",
                params![id],
                |row| {
                    Ok(Coordinate {
                        lat: row.get(0)?,
                        lon: row.get(1)?,
                    })
                },
            )
            .map_err(|e| not_found_or(e, "node", id))?;
        Ok(Node {
            id,
            coordinate,
            tags: self.tags("node_tags", id)?,
            meta: None,
        })
    }

    pub fn way(&self, id: i64) -> Result<Way> {
        self.conn
            .query_row("SELECT 1 FROM ways WHERE osm_id = ?1", params![id], |_| Ok(()))
            .map_err(|e| not_found_or(e, "way", id))?;
        let mut stmt = self
            .conn
            .prepare("SELECT node_id FROM way_nodes WHERE osm_id = ?1 ORDER BY position")?;
        let nodes = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(Way {
            id,
            nodes,
            tags: self.tags("way_tags", id)?,
            meta: None,
        })
    }

    pub fn relation(&self, id: i64) -> Result<Relation> {
        self.conn
            .query_row("SELECT 1 FROM relations WHERE osm_id = ?1", params![id], |_| Ok(()))
            .map_err(|e| not_found_or(e, "relation", id))?;
        let mut stmt = self.conn.prepare(
            "SELECT member_type, member_ref, role FROM relation_members
             WHERE osm_id = ?1 ORDER BY position",
        )?;
        let members = stmt
            .query_map(params![id], |row| {
                let member_type: String = row.get(0)?;
                Ok(Member {
                    member_type: match member_type.as_str() {
                        "node" => MemberType::Node,
                        "way" => MemberType::Way,
                        _ => MemberType::Relation,
                    },
                    member_ref: row.get(1)?,
                    role: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<Member>, _>>()?;
        Ok(Relation {
            id,
            members,
            tags: self.tags("relation_tags", id)?,
            meta: None,
        })
    }

    fn tags(&self, table: &str, id: i64) -> Result<Vec<Tag>> {
        let sql = format!("SELECT key, value FROM {} WHERE osm_id = ?1", table);
        let mut stmt = self.conn.prepare(&sql)?;
        let tags = stmt
            .query_map(params![id], |row| {
                Ok(Tag {
                    key: row.get(0)?,
                    value: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<Tag>, _>>()?;
        Ok(tags)
    }

    /// All nodes, ordered by ascending id. Materializes the full result
    /// set; unlike ingestion, the read-side query API does not promise
    /// sub-linear memory use.
    pub fn nodes(&self) -> Result<Vec<Node>> {
        let mut stmt = self
            .conn
            .prepare("SELECT osm_id, latitude, longitude FROM nodes ORDER BY osm_id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i32>(1)?, row.get::<_, i32>(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, lat, lon)| {
                Ok(Node {
                    id,
                    coordinate: Coordinate { lat, lon },
                    tags: self.tags("node_tags", id)?,
                    meta: None,
                })
            })
            .collect()
    }

    /// All ways, ordered by ascending id.
    pub fn ways(&self) -> Result<Vec<Way>> {
        let mut stmt = self.conn.prepare("SELECT osm_id FROM ways ORDER BY osm_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        ids.into_iter().map(|id| self.way(id)).collect()
    }

    /// All relations, ordered by ascending id.
    pub fn relations(&self) -> Result<Vec<Relation>> {
        let mut stmt = self.conn.prepare("SELECT osm_id FROM relations ORDER BY osm_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        ids.into_iter().map(|id| self.relation(id)).collect()
    }

    /// Every node whose coordinate lies within `boundary`, inclusive of
    /// the edges.
    pub fn nodes_in_box(&self, boundary: &Boundary) -> Result<Vec<Node>> {
        let mut stmt = self.conn.prepare(
            "SELECT osm_id, latitude, longitude FROM nodes
             WHERE latitude BETWEEN ?1 AND ?2 AND longitude BETWEEN ?3 AND ?4
             ORDER BY osm_id",
        )?;
        let rows = stmt
            .query_map(
                params![boundary.min.lat, boundary.max.lat, boundary.min.lon, boundary.max.lon],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i32>(1)?, row.get::<_, i32>(2)?)),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, lat, lon)| {
                Ok(Node {
                    id,
                    coordinate: Coordinate { lat, lon },
                    tags: self.tags("node_tags", id)?,
                    meta: None,
                })
            })
            .collect()
    }

    pub fn search_node_tags(&self, predicate: &[(String, String)]) -> Result<Vec<i64>> {
        self.search_tags("node_tags", predicate)
    }

    pub fn search_way_tags(&self, predicate: &[(String, String)]) -> Result<Vec<i64>> {
        self.search_tags("way_tags", predicate)
    }

    pub fn search_relation_tags(&self, predicate: &[(String, String)]) -> Result<Vec<i64>> {
        self.search_tags("relation_tags", predicate)
    }

    pub fn search_node_tag_keys(&self, keys: &[String]) -> Result<Vec<i64>> {
        self.search_tag_key("node_tags", keys)
    }

    pub fn search_way_tag_keys(&self, keys: &[String]) -> Result<Vec<i64>> {
        self.search_tag_key("way_tags", keys)
    }

    pub fn search_relation_tag_keys(&self, keys: &[String]) -> Result<Vec<i64>> {
        self.search_tag_key("relation_tags", keys)
    }

    /// Conjunctive `(key, value)` search: every returned id matches all
    /// pairs in `predicate`. Seeds the candidate set from the
    /// least-selective pair (the one with the fewest matches) so the
    /// remaining intersections touch the smallest sets possible.
    fn search_tags(&self, table: &str, predicate: &[(String, String)]) -> Result<Vec<i64>> {
        if predicate.is_empty() {
            return Err(Error::EmptyPredicate);
        }

        let mut counts = Vec::with_capacity(predicate.len());
        for (key, value) in predicate {
            let count: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE key = ?1 AND value = ?2", table),
                params![key, value],
                |row| row.get(0),
            )?;
            counts.push(count);
        }
        let seed_index = counts
            .iter()
            .enumerate()
            .min_by_key(|(_, count)| **count)
            .map(|(i, _)| i)
            .expect("predicate is non-empty");

        let ids_for = |key: &str, value: &str| -> Result<HashSet<i64>> {
            let mut stmt = self
                .conn
                .prepare(&format!("SELECT osm_id FROM {} WHERE key = ?1 AND value = ?2", table))?;
            let ids = stmt
                .query_map(params![key, value], |row| row.get(0))?
                .collect::<std::result::Result<HashSet<i64>, _>>()?;
            Ok(ids)
        };

        let (seed_key, seed_value) = &predicate[seed_index];
        let mut candidates = ids_for(seed_key, seed_value)?;

        for (i, (key, value)) in predicate.iter().enumerate() {
            if i == seed_index || candidates.is_empty() {
                continue;
            }
            let matching = ids_for(key, value)?;
            candidates.retain(|id| matching.contains(id));
        }

        let mut result: Vec<i64> = candidates.into_iter().collect();
        result.sort_unstable();
        Ok(result)
    }

    /// Conjunctive key-only search: every returned id has at least one
    /// tag for every key in `keys`. Seeds from the least-selective key,
    /// same strategy as [`Store::search_tags`].
    fn search_tag_key(&self, table: &str, keys: &[String]) -> Result<Vec<i64>> {
        if keys.is_empty() {
            return Err(Error::EmptyPredicate);
        }

        let mut counts = Vec::with_capacity(keys.len());
        for key in keys {
            let count: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE key = ?1", table),
                params![key],
                |row| row.get(0),
            )?;
            counts.push(count);
        }
        let seed_index = counts
            .iter()
            .enumerate()
            .min_by_key(|(_, count)| **count)
            .map(|(i, _)| i)
            .expect("keys is non-empty");

        let ids_for = |key: &str| -> Result<HashSet<i64>> {
            let mut stmt = self
                .conn
                .prepare(&format!("SELECT DISTINCT osm_id FROM {} WHERE key = ?1", table))?;
            let ids = stmt
                .query_map(params![key], |row| row.get(0))?
                .collect::<std::result::Result<HashSet<i64>, _>>()?;
            Ok(ids)
        };

        let mut candidates = ids_for(&keys[seed_index])?;

        for (i, key) in keys.iter().enumerate() {
            if i == seed_index || candidates.is_empty() {
                continue;
            }
            let matching = ids_for(key)?;
            candidates.retain(|id| matching.contains(id));
        }

        let mut result: Vec<i64> = candidates.into_iter().collect();
        result.sort_unstable();
        Ok(result)
    }

    /// Distinct ids of ways with at least one entry in `way_nodes` whose
    /// `node_id` is in `node_ids`. Used by [`crate::extract`]'s closure
    /// step 2.
    pub(crate) fn way_ids_touching_nodes(&self, node_ids: &[i64], chunk_size: usize) -> Result<Vec<i64>> {
        let mut found = HashSet::new();
        for chunk in node_ids.chunks(chunk_size.max(1)) {
            let sql = format!(
                "SELECT DISTINCT osm_id FROM way_nodes WHERE node_id IN ({})",
                in_placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let params = to_sql_params(chunk);
            let ids = stmt
                .query_map(params.as_slice(), |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            found.extend(ids);
        }
        Ok(sorted(found))
    }

    /// Distinct node ids referenced by any way in `way_ids`. Used by
    /// [`crate::extract`]'s closure step 3.
    pub(crate) fn node_ids_referenced_by_ways(&self, way_ids: &[i64], chunk_size: usize) -> Result<Vec<i64>> {
        let mut found = HashSet::new();
        for chunk in way_ids.chunks(chunk_size.max(1)) {
            let sql = format!(
                "SELECT DISTINCT node_id FROM way_nodes WHERE osm_id IN ({})",
                in_placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let params = to_sql_params(chunk);
            let ids = stmt
                .query_map(params.as_slice(), |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            found.extend(ids);
        }
        Ok(sorted(found))
    }

    /// Distinct ids of relations with a node- or way-typed member
    /// referencing `node_ids` or `way_ids` respectively. Used by
    /// [`crate::extract`]'s closure step 5.
    pub(crate) fn relation_ids_touching(
        &self,
        node_ids: &[i64],
        way_ids: &[i64],
        chunk_size: usize,
    ) -> Result<Vec<i64>> {
        let mut found = HashSet::new();
        for chunk in node_ids.chunks(chunk_size.max(1)) {
            let sql = format!(
                "SELECT DISTINCT osm_id FROM relation_members
                 WHERE member_type = 'node' AND member_ref IN ({})",
                in_placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let params = to_sql_params(chunk);
            let ids = stmt
                .query_map(params.as_slice(), |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            found.extend(ids);
        }
        for chunk in way_ids.chunks(chunk_size.max(1)) {
            let sql = format!(
                "SELECT DISTINCT osm_id FROM relation_members
                 WHERE member_type = 'way' AND member_ref IN ({})",
                in_placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let params = to_sql_params(chunk);
            let ids = stmt
                .query_map(params.as_slice(), |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            found.extend(ids);
        }
        Ok(sorted(found))
    }
}

fn in_placeholders(count: usize) -> String {
    std::iter::repeat("?").take(count).collect::<Vec<_>>().join(",")
}

fn to_sql_params(ids: &[i64]) -> Vec<&dyn rusqlite::ToSql> {
    ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect()
}

fn sorted(ids: HashSet<i64>) -> Vec<i64> {
    let mut v: Vec<i64> = ids.into_iter().collect();
    v.sort_unstable();
    v
}

fn not_found_or(e: rusqlite::Error, kind: &'static str, id: i64) -> Error {
    match e {
        rusqlite::Error::QueryReturnedNoRows => Error::NotFound { kind, id },
        other => Error::from(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const FIXTURE: &str = r#"<osm version="0.6" generator="test">
      <bounds minlat="54.0" minlon="12.0" maxlat="54.2" maxlon="12.3"/>
      <node id="1" lat="54.09" lon="12.24" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z">
        <tag k="name" v="alpha"/>
        <tag k="amenity" v="cafe"/>
      </node>
      <node id="2" lat="54.10" lon="12.25" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z">
        <tag k="amenity" v="cafe"/>
      </node>
      <way id="10" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z">
        <nd ref="1"/>
        <nd ref="2"/>
        <tag k="highway" v="residential"/>
      </way>
      <relation id="100" version="1" changeset="1" timestamp="2008-09-21T21:37:45Z">
        <member type="node" ref="1" role="stop"/>
        <member type="way" ref="10" role=""/>
        <tag k="route" v="bus"/>
      </relation>
    </osm>"#;

    fn build_store() -> (tempfile::TempDir, Store) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.sqlite");
        convert(FIXTURE.as_bytes(), &path, ConvertOptions::default()).unwrap();
        let store = Store::open(&path).unwrap();
        (dir, store)
    }

    #[test]
    fn convert_then_query_round_trip() {
        let (_dir, store) = build_store();
        let osm = store.osm().unwrap();
        assert_eq!(osm.version, "0.6");
        assert_eq!(osm.timestamp.as_deref(), Some("2008-09-21T21:37:45Z"));

        let node = store.node(1).unwrap();
        assert_eq!(node.tags.len(), 2);

        let way = store.way(10).unwrap();
        assert_eq!(way.nodes, vec![1, 2]);

        let relation = store.relation(100).unwrap();
        assert_eq!(relation.members.len(), 2);
    }

    #[test]
    fn missing_node_is_not_found() {
        let (_dir, store) = build_store();
        let err = store.node(999).unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "node", id: 999 }));
    }

    #[test]
    fn convert_refuses_existing_destination() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.sqlite");
        convert(FIXTURE.as_bytes(), &path, ConvertOptions::default()).unwrap();
        let err = convert(FIXTURE.as_bytes(), &path, ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, Error::DestinationExists(_)));
    }

    #[test]
    fn nodes_in_box_scan() {
        let (_dir, store) = build_store();
        let found = store
            .nodes_in_box(&Boundary::new((54.0, 12.0), (54.095, 12.3)))
            .unwrap();
        assert_eq!(found.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn conjunctive_tag_search() {
        let (_dir, store) = build_store();
        let ids = store
            .search_node_tags(&[("amenity".to_string(), "cafe".to_string())])
            .unwrap();
        assert_eq!(ids, vec![1, 2]);

        let ids = store
            .search_node_tags(&[
                ("amenity".to_string(), "cafe".to_string()),
                ("name".to_string(), "alpha".to_string()),
            ])
            .unwrap();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn empty_predicate_rejected() {
        let (_dir, store) = build_store();
        let err = store.search_node_tags(&[]).unwrap_err();
        assert!(matches!(err, Error::EmptyPredicate));
    }

    #[test]
    fn conjunctive_tag_key_search() {
        let (_dir, store) = build_store();
        // both nodes carry "amenity"; only node 1 also carries "name".
        let ids = store.search_node_tag_keys(&["amenity".to_string()]).unwrap();
        assert_eq!(ids, vec![1, 2]);

        let ids = store
            .search_node_tag_keys(&["amenity".to_string(), "name".to_string()])
            .unwrap();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn empty_tag_key_set_rejected() {
        let (_dir, store) = build_store();
        let err = store.search_node_tag_keys(&[]).unwrap_err();
        assert!(matches!(err, Error::EmptyPredicate));
    }

    #[test]
    fn ordered_iteration() {
        let (_dir, store) = build_store();
        let ids: Vec<i64> = store.nodes().unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
