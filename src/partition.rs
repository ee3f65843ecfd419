//! Weighted spatial partitioner: splits edges into `K` contiguous,
//! density-balanced zones.
//!
//! Uses direct weighted-centroid Lloyd's k-means rather than a replication
//! proxy: weights feed straight into the centroid update as per-point mass,
//! so no majority-vote back-projection is needed.

use std::collections::{HashMap, HashSet};

use geo::{Coord, LineInterpolatePoint, LineString};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::graph::{RoadEdge, RoadGraph, RoadNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalancePriority {
    Density,
    Area,
}

/// A connected subgraph of `G` assigned to one route.
#[derive(Debug, Clone)]
pub struct Zone {
    pub zone_id: usize,
    pub graph: RoadGraph,
}

struct EdgeFeature {
    midpoint: Coord<f64>,
    weight: f64,
}

fn edge_midpoint(edge: &RoadEdge, from: Coord<f64>, to: Coord<f64>) -> Coord<f64> {
    match &edge.geometry {
        Some(pts) if pts.len() >= 2 => {
            let line = LineString::new(pts.clone());
            line.line_interpolate_point(0.5)
                .map(|p| p.into())
                .unwrap_or_else(|| midpoint_of(from, to))
        }
        _ => midpoint_of(from, to),
    }
}

fn midpoint_of(a: Coord<f64>, b: Coord<f64>) -> Coord<f64> {
    Coord {
        x: (a.x + b.x) / 2.0,
        y: (a.y + b.y) / 2.0,
    }
}

fn featurize(graph: &RoadGraph, priority: BalancePriority) -> Vec<(petgraph::graph::EdgeIndex, EdgeFeature)> {
    graph
        .graph
        .edge_references()
        .map(|e| {
            let from = graph.graph[e.source()].coord();
            let to = graph.graph[e.target()].coord();
            let edge = e.weight();
            let midpoint = edge_midpoint(edge, from, to);
            let raw_weight = match priority {
                BalancePriority::Density => edge.estimated_addresses as f64,
                BalancePriority::Area => edge.length,
            };
            (
                e.id(),
                EdgeFeature {
                    midpoint,
                    weight: raw_weight.max(1.0),
                },
            )
        })
        .collect()
}

/// Weighted Lloyd's k-means: returns (labels parallel to `points`, inertia).
fn weighted_kmeans(points: &[Coord<f64>], weights: &[f64], k: usize, seed: u64) -> (Vec<usize>, f64) {
    let n = points.len();
    let mut rng = StdRng::seed_from_u64(seed);

    // k-means++-ish seeding: pick k distinct points as initial centroids.
    let mut centroid_idxs: Vec<usize> = Vec::with_capacity(k);
    while centroid_idxs.len() < k.min(n) {
        let idx = rng.gen_range(0..n);
        if !centroid_idxs.contains(&idx) {
            centroid_idxs.push(idx);
        }
    }
    let mut centroids: Vec<Coord<f64>> = centroid_idxs.iter().map(|&i| points[i]).collect();
    while centroids.len() < k {
        centroids.push(points[rng.gen_range(0..n)]);
    }

    let mut labels = vec![0usize; n];
    for _ in 0..100 {
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let mut best = 0usize;
            let mut best_dist = f64::MAX;
            for (c, centroid) in centroids.iter().enumerate() {
                let d = (p.x - centroid.x).powi(2) + (p.y - centroid.y).powi(2);
                if d < best_dist {
                    best_dist = d;
                    best = c;
                }
            }
            if labels[i] != best {
                changed = true;
            }
            labels[i] = best;
        }

        let mut sum_x = vec![0.0; k];
        let mut sum_y = vec![0.0; k];
        let mut sum_w = vec![0.0; k];
        for (i, p) in points.iter().enumerate() {
            let c = labels[i];
            sum_x[c] += p.x * weights[i];
            sum_y[c] += p.y * weights[i];
            sum_w[c] += weights[i];
        }
        for c in 0..k {
            if sum_w[c] > 0.0 {
                centroids[c] = Coord {
                    x: sum_x[c] / sum_w[c],
                    y: sum_y[c] / sum_w[c],
                };
            }
        }

        if !changed {
            break;
        }
    }

    let inertia: f64 = points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let c = centroids[labels[i]];
            weights[i] * ((p.x - c.x).powi(2) + (p.y - c.y).powi(2))
        })
        .sum();

    (labels, inertia)
}

/// Splits `graph` into `k` contiguous, weight-balanced zones.
pub fn partition(graph: &RoadGraph, k: usize, priority: BalancePriority) -> Vec<Zone> {
    if k <= 1 {
        return vec![Zone {
            zone_id: 0,
            graph: graph.clone(),
        }];
    }

    let features = featurize(graph, priority);
    if features.is_empty() {
        return vec![];
    }

    let points: Vec<Coord<f64>> = features.iter().map(|(_, f)| f.midpoint).collect();
    let weights: Vec<f64> = features.iter().map(|(_, f)| f.weight).collect();
    let k = k.min(points.len()).max(1);

    const SEED: u64 = 42;
    const RESTARTS: usize = 10;
    let mut best_labels = vec![0usize; points.len()];
    let mut best_inertia = f64::MAX;
    for restart in 0..RESTARTS {
        let (labels, inertia) = weighted_kmeans(&points, &weights, k, SEED.wrapping_add(restart as u64));
        if inertia < best_inertia {
            best_inertia = inertia;
            best_labels = labels;
        }
    }

    let mut by_label: HashMap<usize, Vec<petgraph::graph::EdgeIndex>> = HashMap::new();
    for ((edge_idx, _), &label) in features.iter().zip(best_labels.iter()) {
        by_label.entry(label).or_default().push(*edge_idx);
    }

    let mut labels: Vec<usize> = by_label.keys().copied().collect();
    labels.sort_unstable();

    let mut zones = Vec::new();
    for label in labels {
        let edge_idxs = &by_label[&label];
        if let Some(subgraph) = materialize_largest_component(graph, edge_idxs) {
            zones.push(Zone {
                zone_id: zones.len(),
                graph: subgraph,
            });
        }
    }
    zones
}

/// Builds the edge-induced subgraph from the given edges and retains only
/// its largest weakly connected component (by node count).
fn materialize_largest_component(graph: &RoadGraph, edge_idxs: &[petgraph::graph::EdgeIndex]) -> Option<RoadGraph> {
    if edge_idxs.is_empty() {
        return None;
    }

    let mut sub: DiGraph<RoadNode, RoadEdge> = DiGraph::new();
    let mut node_map: HashMap<NodeIndex, NodeIndex> = HashMap::new();

    let get_or_add = |sub: &mut DiGraph<RoadNode, RoadEdge>, map: &mut HashMap<NodeIndex, NodeIndex>, n: NodeIndex| -> NodeIndex {
        *map.entry(n).or_insert_with(|| sub.add_node(graph.graph[n]))
    };

    for &e in edge_idxs {
        let (src, tgt) = graph.graph.edge_endpoints(e).expect("edge index from this graph");
        let s = get_or_add(&mut sub, &mut node_map, src);
        let t = get_or_add(&mut sub, &mut node_map, tgt);
        sub.add_edge(s, t, graph.graph[e].clone());
    }

    let component = largest_weakly_connected_component(&sub);
    if component.is_empty() {
        return None;
    }

    let keep: HashSet<NodeIndex> = component.into_iter().collect();
    let to_remove: Vec<NodeIndex> = sub.node_indices().filter(|n| !keep.contains(n)).collect();
    for n in to_remove.into_iter().rev() {
        sub.remove_node(n);
    }

    if sub.edge_count() == 0 {
        None
    } else {
        Some(RoadGraph { graph: sub })
    }
}

fn largest_weakly_connected_component(graph: &DiGraph<RoadNode, RoadEdge>) -> Vec<NodeIndex> {
    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut best: Vec<NodeIndex> = Vec::new();

    for start in graph.node_indices() {
        if visited.contains(&start) {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![start];
        visited.insert(start);
        while let Some(n) = stack.pop() {
            component.push(n);
            for neighbor in graph.neighbors_undirected(n) {
                if visited.insert(neighbor) {
                    stack.push(neighbor);
                }
            }
        }
        if component.len() > best.len() {
            best = component;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RawEdgeAttrs, RawGraph, RoadNode as Node, TravelMode};

    fn line_graph(n: usize) -> RoadGraph {
        let nodes = (0..n).map(|i| Node { x: -75.0 + i as f64 * 0.001, y: 40.0 }).collect();
        let edges = (0..n - 1)
            .map(|i| (i, i + 1, RawEdgeAttrs { highway: Some("residential".into()), length: Some(100.0), ..Default::default() }))
            .collect();
        RoadGraph::ingest(RawGraph { nodes, edges }, TravelMode::Walking).unwrap()
    }

    #[test]
    fn k_equals_one_returns_full_graph() {
        let g = line_graph(5);
        let zones = partition(&g, 1, BalancePriority::Density);
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].graph.edge_count(), g.edge_count());
    }

    #[test]
    fn partition_covers_edges_without_overlap() {
        let g = line_graph(20);
        let zones = partition(&g, 4, BalancePriority::Area);
        let total: usize = zones.iter().map(|z| z.graph.edge_count()).sum();
        assert!(total > 0);
        assert!(total <= g.edge_count());
        assert!(zones.len() <= 4);
    }

    #[test]
    fn zones_are_weakly_connected() {
        let g = line_graph(20);
        for zone in partition(&g, 4, BalancePriority::Density) {
            let component = largest_weakly_connected_component(&zone.graph.graph);
            assert_eq!(component.len(), zone.graph.node_count());
        }
    }
}
