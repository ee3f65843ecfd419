//! Road graph type and ingest/normalize/filter pipeline.
//!
//! Modeled on `RoadNetwork` (petgraph `DiGraph` keyed by
//! coordinate, haversine edge lengths) generalized from a single OSM loader
//! into the ingest-then-route pipeline it calls for.

use std::collections::HashSet;

use geo::Coord;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Walking,
    Driving,
}

/// Node attributes: `(x = lng, y = lat)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadNode {
    pub x: f64,
    pub y: f64,
}

impl RoadNode {
    pub fn coord(&self) -> Coord<f64> {
        Coord { x: self.x, y: self.y }
    }
}

/// Edge attributes as delivered by the map provider, before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawEdgeAttrs {
    pub length: Option<f64>,
    pub highway: Option<String>,
    pub name: Option<String>,
    pub geometry: Option<Vec<Coord<f64>>>,
}

/// A raw road network as returned by a [`crate::provider::MapProvider`],
/// prior to ingest.
#[derive(Debug, Default)]
pub struct RawGraph {
    pub nodes: Vec<RoadNode>,
    /// `(from, to, attrs)` triples; parallel edges are allowed.
    pub edges: Vec<(usize, usize, RawEdgeAttrs)>,
}

/// Edge attributes after ingest: `length`/`highway`/`name` are guaranteed
/// present, and `estimated_addresses` is populated by the density estimator.
#[derive(Debug, Clone)]
pub struct RoadEdge {
    pub length: f64,
    pub highway: String,
    pub name: String,
    pub geometry: Option<Vec<Coord<f64>>>,
    pub estimated_addresses: u64,
}

/// Highway classes kept as "residential-class" roads.
const RESIDENTIAL_CLASSES: &[&str] = &[
    "residential",
    "living_street",
    "service",
    "unclassified",
    "tertiary",
    "secondary",
    "tertiary_link",
    "secondary_link",
];

/// Highway classes always preserved regardless of travel mode.
const PEDESTRIAN_CLASSES: &[&str] = &["footway", "path", "pedestrian"];

/// A road network: directed multigraph of road segments.
#[derive(Debug, Clone, Default)]
pub struct RoadGraph {
    pub graph: DiGraph<RoadNode, RoadEdge>,
}

impl RoadGraph {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn edge_indices(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edge_indices()
    }

    /// Ingests a raw provider graph: ensures lengths/tags, filters to
    /// residential-class roads, drops isolated nodes. Fails with
    /// [`Error::NoRoads`] if no edges remain.
    pub fn ingest(raw: RawGraph, _mode: TravelMode) -> Result<Self, Error> {
        let mut graph: DiGraph<RoadNode, RoadEdge> = DiGraph::new();
        let node_indices: Vec<NodeIndex> = raw.nodes.iter().map(|n| graph.add_node(*n)).collect();

        for (from, to, attrs) in raw.edges {
            let (Some(&from_idx), Some(&to_idx)) = (node_indices.get(from), node_indices.get(to)) else {
                continue;
            };
            let from_node = graph[from_idx];
            let to_node = graph[to_idx];

            let length = attrs.length.unwrap_or_else(|| {
                haversine_distance(from_node.y, from_node.x, to_node.y, to_node.x)
            });
            let highway = attrs.highway.unwrap_or_else(|| "unclassified".to_string());
            let name = attrs.name.unwrap_or_else(|| "Unnamed Road".to_string());

            if !is_kept_class(&highway) {
                continue;
            }

            graph.add_edge(
                from_idx,
                to_idx,
                RoadEdge {
                    length,
                    highway,
                    name,
                    geometry: attrs.geometry,
                    estimated_addresses: 0,
                },
            );
        }

        remove_isolated_nodes(&mut graph);

        if graph.edge_count() == 0 {
            return Err(Error::NoRoads);
        }

        Ok(Self { graph })
    }
}

fn is_kept_class(highway: &str) -> bool {
    RESIDENTIAL_CLASSES.contains(&highway) || PEDESTRIAN_CLASSES.contains(&highway)
}

fn remove_isolated_nodes(graph: &mut DiGraph<RoadNode, RoadEdge>) {
    let incident: HashSet<NodeIndex> = graph
        .edge_references()
        .flat_map(|e| [e.source(), e.target()])
        .collect();
    let isolated: Vec<NodeIndex> = graph
        .node_indices()
        .filter(|n| !incident.contains(n))
        .collect();
    // Remove in descending index order so earlier removals don't invalidate
    // later indices (petgraph swap-removes on node removal).
    for n in isolated.into_iter().rev() {
        graph.remove_node(n);
    }
}

/// Haversine distance between two (lat, lng) points in meters.
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const R: f64 = 6_371_000.0;
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    R * c
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_raw() -> RawGraph {
        RawGraph {
            nodes: vec![
                RoadNode { x: -75.0, y: 40.0 },
                RoadNode { x: -75.001, y: 40.0 },
                RoadNode { x: -75.002, y: 40.0 },
            ],
            edges: vec![
                (0, 1, RawEdgeAttrs { highway: Some("residential".into()), ..Default::default() }),
                (1, 2, RawEdgeAttrs { highway: Some("motorway".into()), ..Default::default() }),
            ],
        }
    }

    #[test]
    fn edge_length_invariant_after_ingest() {
        let g = RoadGraph::ingest(sample_raw(), TravelMode::Walking).unwrap();
        for e in g.graph.edge_references() {
            let edge = e.weight();
            assert!(edge.length >= 0.0);
            assert!(!edge.highway.is_empty());
            assert!(!edge.name.is_empty());
        }
    }

    #[test]
    fn filters_non_residential_and_drops_isolated_nodes() {
        let g = RoadGraph::ingest(sample_raw(), TravelMode::Walking).unwrap();
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.node_count(), 2);
    }

    #[test]
    fn empty_graph_fails_with_no_roads() {
        let raw = RawGraph { nodes: vec![], edges: vec![] };
        assert!(matches!(RoadGraph::ingest(raw, TravelMode::Walking), Err(Error::NoRoads)));
    }
}
