//! Table definitions and the `osm.gentime` round-trip.
use crate::error::Result;
use rusqlite::Connection;

pub const DDL: &str = "
    CREATE TABLE osm (version TEXT NOT NULL, generator TEXT NOT NULL, gentime TEXT);
    CREATE TABLE bounds (minlat INTEGER, minlon INTEGER, maxlat INTEGER, maxlon INTEGER);
    CREATE TABLE nodes (osm_id INTEGER PRIMARY KEY, latitude INTEGER NOT NULL, longitude INTEGER NOT NULL);
    CREATE TABLE node_tags (osm_id INTEGER NOT NULL, key TEXT NOT NULL, value TEXT NOT NULL);
    CREATE INDEX node_tags_osm_id_idx ON node_tags(osm_id);
    CREATE INDEX node_tags_key_value_idx ON node_tags(key, value);
    CREATE TABLE ways (osm_id INTEGER PRIMARY KEY);
    CREATE TABLE way_nodes (osm_id INTEGER NOT NULL, position INTEGER NOT NULL, node_id INTEGER NOT NULL);
    CREATE INDEX way_nodes_osm_id_idx ON way_nodes(osm_id);
    CREATE TABLE way_tags (osm_id INTEGER NOT NULL, key TEXT NOT NULL, value TEXT NOT NULL);
    CREATE INDEX way_tags_osm_id_idx ON way_tags(osm_id);
    CREATE INDEX way_tags_key_value_idx ON way_tags(key, value);
    CREATE TABLE relations (osm_id INTEGER PRIMARY KEY);
    CREATE TABLE relation_members (osm_id INTEGER NOT NULL, position INTEGER NOT NULL,
        member_type TEXT NOT NULL, member_ref INTEGER NOT NULL, role TEXT NOT NULL);
    CREATE INDEX relation_members_osm_id_idx ON relation_members(osm_id);
    CREATE TABLE relation_tags (osm_id INTEGER NOT NULL, key TEXT NOT NULL, value TEXT NOT NULL);
    CREATE INDEX relation_tags_osm_id_idx ON relation_tags(osm_id);
    CREATE INDEX relation_tags_key_value_idx ON relation_tags(key, value);
";

pub fn create(conn: &Connection) -> Result<()> {
    conn.execute_batch(DDL)?;
    Ok(())
}

/// `2008-09-21T21:37:45Z` -> `2008-09-21 21:37:45`, a space-separated
/// storage format.
pub fn gentime_to_storage(timestamp: Option<&str>) -> String {
    match timestamp {
        None => "None".to_string(),
        Some(raw) => raw.replacen('T', " ", 1).trim_end_matches('Z').to_string(),
    }
}

/// Reverse of [`gentime_to_storage`]. The literal string `"None"` (and a
/// SQL NULL) both mean "no timestamp was recorded".
pub fn gentime_from_storage(stored: Option<String>) -> Option<String> {
    match stored {
        None => None,
        Some(ref s) if s == "None" => None,
        Some(s) => {
            let mut parts = s.splitn(2, ' ');
            let date = parts.next()?;
            let time = parts.next()?;
            Some(format!("{}T{}Z", date, time))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gentime_round_trips() {
        let stored = gentime_to_storage(Some("2008-09-21T21:37:45Z"));
        assert_eq!(stored, "2008-09-21 21:37:45");
        assert_eq!(
            gentime_from_storage(Some(stored)),
            Some("2008-09-21T21:37:45Z".to_string())
        );
    }

    #[test]
    fn gentime_none_sentinel_round_trips() {
        let stored = gentime_to_storage(None);
        assert_eq!(stored, "None");
        assert_eq!(gentime_from_storage(Some(stored)), None);
    }
}
