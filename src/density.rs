//! Density estimator: buildings -> per-edge dwelling-unit estimates.

use geo::{Coord, EuclideanDistance, Line, LineString, Point, Polygon};
use petgraph::visit::EdgeRef;

use crate::graph::RoadGraph;

/// A building footprint as returned by the map provider's buildings query.
#[derive(Debug, Clone)]
pub struct Building {
    pub footprint: Option<Polygon<f64>>,
    pub building_type: String,
    pub levels: u32,
    pub centroid: Coord<f64>,
}

/// Dwelling-unit heuristic per building.
pub fn dwelling_units(building: &Building) -> u64 {
    let levels = building.levels.max(1);
    match building.building_type.as_str() {
        "apartments" => (4 * levels).max(4) as u64,
        _ => 1,
    }
}

/// Per-highway-class fallback density (addresses per 100m).
fn fallback_density_per_100m(highway: &str) -> f64 {
    match highway {
        "residential" => 20.0,
        "living_street" => 30.0,
        "service" => 5.0,
        "unclassified" => 15.0,
        "tertiary" => 10.0,
        "secondary" => 5.0,
        _ => 10.0,
    }
}

/// Degrees-per-meter conversion used for the acceptance-radius threshold.
/// This conflates planar degrees with meters and is increasingly
/// inaccurate away from the equator; kept as-is for numeric parity.
fn meters_to_degrees(max_distance_m: f64) -> f64 {
    max_distance_m / 111_320.0
}

/// Assigns each building to its nearest road edge (snapping within
/// `max_distance_m`, expressed in degrees) and accumulates
/// `estimated_addresses`. Falls back to the road-length heuristic if
/// `buildings` is empty or the total assigned is zero.
pub fn assign_buildings_to_edges(graph: &mut RoadGraph, buildings: &[Building], max_distance_m: f64) {
    for edge in graph.graph.edge_weights_mut() {
        edge.estimated_addresses = 0;
    }

    if buildings.is_empty() {
        estimate_from_road_length(graph);
        return;
    }

    let threshold = meters_to_degrees(max_distance_m);

    // Snapshot edge geometry once; (edge_index, line_string).
    let edge_lines: Vec<(petgraph::graph::EdgeIndex, LineString<f64>)> = graph
        .graph
        .edge_references()
        .map(|e| {
            let edge = e.weight();
            let line = match &edge.geometry {
                Some(pts) if pts.len() >= 2 => LineString::new(pts.clone()),
                _ => {
                    let from = graph.graph[e.source()].coord();
                    let to = graph.graph[e.target()].coord();
                    LineString::new(vec![from, to])
                }
            };
            (e.id(), line)
        })
        .collect();

    for building in buildings {
        let units = dwelling_units(building);
        let centroid = Point::from(building.centroid);

        let mut best: Option<(petgraph::graph::EdgeIndex, f64)> = None;
        for (idx, line) in &edge_lines {
            let dist = centroid.euclidean_distance(line);
            if best.map(|(_, d)| dist < d).unwrap_or(true) {
                best = Some((*idx, dist));
            }
        }

        if let Some((idx, dist)) = best {
            if dist < threshold {
                if let Some(edge) = graph.graph.edge_weight_mut(idx) {
                    edge.estimated_addresses += units;
                }
            }
        }
    }

    if total_estimated_addresses(graph) == 0 {
        estimate_from_road_length(graph);
    }
}

/// Fallback: `estimated_addresses = floor((length_m / 100) * density(highway))`.
pub fn estimate_from_road_length(graph: &mut RoadGraph) {
    for edge in graph.graph.edge_weights_mut() {
        let density = fallback_density_per_100m(&edge.highway);
        let estimated = ((edge.length / 100.0) * density).floor().max(0.0);
        edge.estimated_addresses = estimated as u64;
    }
}

pub fn total_estimated_addresses(graph: &RoadGraph) -> u64 {
    graph.graph.edge_weights().map(|e| e.estimated_addresses).sum()
}

/// Distance from a point to a single two-point line segment; exposed for
/// tests and for callers that already have raw endpoint coordinates.
pub fn point_to_segment_distance(point: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    Point::from(point).euclidean_distance(&Line::new(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RawEdgeAttrs, RawGraph, RoadNode, TravelMode};

    fn sample_graph() -> RoadGraph {
        let raw = RawGraph {
            nodes: vec![
                RoadNode { x: -75.0, y: 40.0 },
                RoadNode { x: -75.001, y: 40.0 },
            ],
            edges: vec![(
                0,
                1,
                RawEdgeAttrs {
                    highway: Some("residential".into()),
                    length: Some(100.0),
                    ..Default::default()
                },
            )],
        };
        RoadGraph::ingest(raw, TravelMode::Walking).unwrap()
    }

    #[test]
    fn dwelling_units_apartments_vs_house() {
        let apt = Building {
            footprint: None,
            building_type: "apartments".into(),
            levels: 3,
            centroid: Coord { x: 0.0, y: 0.0 },
        };
        assert_eq!(dwelling_units(&apt), 12);

        let house = Building {
            footprint: None,
            building_type: "house".into(),
            levels: 1,
            centroid: Coord { x: 0.0, y: 0.0 },
        };
        assert_eq!(dwelling_units(&house), 1);
    }

    #[test]
    fn fallback_kicks_in_with_no_buildings() {
        let mut g = sample_graph();
        assign_buildings_to_edges(&mut g, &[], 50.0);
        assert!(total_estimated_addresses(&g) > 0);
    }

    #[test]
    fn density_conservation_within_acceptance_radius() {
        let mut g = sample_graph();
        let buildings = vec![Building {
            footprint: None,
            building_type: "house".into(),
            levels: 1,
            centroid: Coord { x: -75.0005, y: 40.00001 },
        }];
        assign_buildings_to_edges(&mut g, &buildings, 50.0);
        assert_eq!(total_estimated_addresses(&g), 1);
    }

    #[test]
    fn buildings_outside_acceptance_radius_are_dropped() {
        let mut g = sample_graph();
        let buildings = vec![Building {
            footprint: None,
            building_type: "house".into(),
            levels: 1,
            centroid: Coord { x: -70.0, y: 30.0 },
        }];
        assign_buildings_to_edges(&mut g, &buildings, 1.0);
        // No building within radius and none assigned -> fallback applies.
        assert!(total_estimated_addresses(&g) > 0);
    }
}
