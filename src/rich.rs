//! Rich-object resolution: inlining a [`Way`]'s or [`Relation`]'s
//! references into fully populated member objects, recursively for
//! relations, with explicit cycle detection.
//!
//! A relation containing itself, directly or transitively, is rejected
//! rather than silently recursed into: the active-id set threads through
//! the recursion instead of living as shared mutable state.
use crate::element::{MemberType, Node, Relation, Tag, Way};
use crate::error::{Error, Result};
use crate::geo::Coordinate;
use crate::store::Store;
use std::collections::HashSet;

/// A [`Way`] with every referenced node resolved in order.
#[derive(Debug, Clone, PartialEq)]
pub struct RichWay {
    pub id: i64,
    pub nodes: Vec<Node>,
    pub tags: Vec<Tag>,
}

impl RichWay {
    pub fn resolve(store: &Store, way: &Way) -> Result<RichWay> {
        let nodes = way
            .nodes
            .iter()
            .map(|&id| store.node(id))
            .collect::<Result<Vec<Node>>>()?;
        validate_way_ids(way, &nodes)?;
        Ok(RichWay {
            id: way.id,
            nodes,
            tags: way.tags.clone(),
        })
    }

    pub fn centroid(&self) -> Result<Coordinate> {
        centroid(self.nodes.iter().map(|n| n.coordinate))
    }
}

fn validate_way_ids(way: &Way, nodes: &[Node]) -> Result<()> {
    if way.nodes.len() != nodes.len() {
        return Err(Error::InconsistentReference {
            message: format!(
                "way {} references {} nodes but {} were resolved",
                way.id,
                way.nodes.len(),
                nodes.len()
            ),
        });
    }
    for (expected, node) in way.nodes.iter().zip(nodes) {
        if *expected != node.id {
            return Err(Error::InconsistentReference {
                message: format!("way {}: expected node {} but resolved {}", way.id, expected, node.id),
            });
        }
    }
    Ok(())
}

/// One resolved member of a [`RichRelation`]: the same three kinds a
/// plain [`crate::element::Member`] can reference, but fully populated.
#[derive(Debug, Clone, PartialEq)]
pub enum RichMember {
    Node(Node),
    Way(RichWay),
    Relation(Box<RichRelation>),
}

impl RichMember {
    pub fn centroid(&self) -> Result<Coordinate> {
        match self {
            RichMember::Node(n) => Ok(n.coordinate),
            RichMember::Way(w) => w.centroid(),
            RichMember::Relation(r) => r.centroid(),
        }
    }
}

/// A [`Relation`] with every member resolved, recursively for nested
/// relations.
#[derive(Debug, Clone, PartialEq)]
pub struct RichRelation {
    pub id: i64,
    pub members: Vec<RichMember>,
    pub tags: Vec<Tag>,
}

impl RichRelation {
    pub fn resolve(store: &Store, relation: &Relation) -> Result<RichRelation> {
        let mut active = HashSet::new();
        resolve_relation(store, relation, &mut active)
    }

    pub fn centroid(&self) -> Result<Coordinate> {
        if self.members.is_empty() {
            return Err(Error::UndefinedCentroid);
        }
        let points = self
            .members
            .iter()
            .map(RichMember::centroid)
            .collect::<Result<Vec<Coordinate>>>()?;
        centroid(points.into_iter())
    }
}

fn resolve_relation(store: &Store, relation: &Relation, active: &mut HashSet<i64>) -> Result<RichRelation> {
    if !active.insert(relation.id) {
        return Err(Error::CyclicRelation(relation.id));
    }

    let mut members = Vec::with_capacity(relation.members.len());
    for member in &relation.members {
        let resolved = match member.member_type {
            MemberType::Node => RichMember::Node(store.node(member.member_ref)?),
            MemberType::Way => RichMember::Way(RichWay::resolve(store, &store.way(member.member_ref)?)?),
            MemberType::Relation => {
                let nested = store.relation(member.member_ref)?;
                RichMember::Relation(Box::new(resolve_relation(store, &nested, active)?))
            }
        };
        members.push(resolved);
    }

    active.remove(&relation.id);

    Ok(RichRelation {
        id: relation.id,
        members,
        tags: relation.tags.clone(),
    })
}

fn centroid(points: impl Iterator<Item = Coordinate>) -> Result<Coordinate> {
    let mut lat_sum: i64 = 0;
    let mut lon_sum: i64 = 0;
    let mut n: i64 = 0;
    for point in points {
        lat_sum += point.lat as i64;
        lon_sum += point.lon as i64;
        n += 1;
    }
    if n == 0 {
        return Err(Error::UndefinedCentroid);
    }
    Ok(Coordinate {
        lat: (lat_sum / n) as i32,
        lon: (lon_sum / n) as i32,
    })
}
