//! Router: per-zone edge-cover walk with bridging reconnection, turn-by-turn
//! directions and duration estimate.
//!
//! Modeled on `RoadNetwork::route` (petgraph + Dijkstra over
//! `length`), generalized from point-to-point routing into an edge-covering
//! walk of an entire zone subgraph.

use std::collections::{HashMap, HashSet};

use petgraph::graph::NodeIndex;
use petgraph::Direction;

use crate::geometry::LatLng;
use crate::graph::TravelMode;
use crate::partition::Zone;

#[derive(Debug, Clone, serde::Serialize)]
pub struct TurnStep {
    pub step: usize,
    pub instruction: String,
    pub distance_m: f64,
    pub street_name: String,
}

#[derive(Debug, Clone)]
pub struct RouteResult {
    pub waypoints: Vec<LatLng>,
    /// LineString in (lng, lat) order.
    pub geometry: Vec<(f64, f64)>,
    pub total_distance_m: f64,
    pub turn_by_turn: Vec<TurnStep>,
    pub estimated_duration_min: u64,
}

/// Finds the node nearest to `point` by squared planar distance.
fn nearest_node(zone: &Zone, point: LatLng) -> Option<NodeIndex> {
    zone.graph
        .graph
        .node_indices()
        .min_by(|&a, &b| {
            let da = sq_dist(zone.graph.graph[a].y, zone.graph.graph[a].x, point.lat, point.lng);
            let db = sq_dist(zone.graph.graph[b].y, zone.graph.graph[b].x, point.lat, point.lng);
            da.partial_cmp(&db).unwrap()
        })
}

fn sq_dist(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    (lat1 - lat2).powi(2) + (lng1 - lng2).powi(2)
}

fn start_node(zone: &Zone, start_point: Option<LatLng>) -> Option<NodeIndex> {
    if let Some(p) = start_point {
        return nearest_node(zone, p);
    }
    let nodes: Vec<NodeIndex> = zone.graph.graph.node_indices().collect();
    if nodes.is_empty() {
        return None;
    }
    let (sum_lat, sum_lng) = nodes.iter().fold((0.0, 0.0), |(sa, so), &n| {
        let node = zone.graph.graph[n];
        (sa + node.y, so + node.x)
    });
    let mean = LatLng::new(sum_lat / nodes.len() as f64, sum_lng / nodes.len() as f64);
    nearest_node(zone, mean)
}

fn edge_key(a: NodeIndex, b: NodeIndex) -> (NodeIndex, NodeIndex) {
    if a.index() <= b.index() {
        (a, b)
    } else {
        (b, a)
    }
}

/// Incident neighbors of `node` under the travel mode's orientation policy:
/// both directions for walking, outgoing only for driving.
fn incident(zone: &Zone, node: NodeIndex, mode: TravelMode) -> Vec<NodeIndex> {
    let mut neighbors: Vec<NodeIndex> = zone.graph.graph.neighbors_directed(node, Direction::Outgoing).collect();
    if mode == TravelMode::Walking {
        neighbors.extend(zone.graph.graph.neighbors_directed(node, Direction::Incoming));
    }
    neighbors.sort_by_key(|n| n.index());
    neighbors.dedup();
    neighbors
}

fn edge_length_between(zone: &Zone, u: NodeIndex, v: NodeIndex) -> Option<f64> {
    zone.graph
        .graph
        .edges_connecting(u, v)
        .next()
        .map(|e| e.weight().length)
        .or_else(|| zone.graph.graph.edges_connecting(v, u).next().map(|e| e.weight().length))
}

fn street_name_between(zone: &Zone, u: NodeIndex, v: NodeIndex) -> Option<String> {
    zone.graph
        .graph
        .edges_connecting(u, v)
        .next()
        .or_else(|| zone.graph.graph.edges_connecting(v, u).next())
        .map(|e| e.weight().name.clone())
}

/// Manual Dijkstra weighted by `length`, restricted to the mode's
/// orientation policy. Returns predecessor links for path reconstruction.
fn dijkstra_predecessors(zone: &Zone, source: NodeIndex, mode: TravelMode) -> HashMap<NodeIndex, NodeIndex> {
    use std::cmp::Ordering;
    use std::collections::BinaryHeap;

    #[derive(PartialEq)]
    struct HeapEntry(f64, NodeIndex);
    impl Eq for HeapEntry {}
    impl Ord for HeapEntry {
        fn cmp(&self, other: &Self) -> Ordering {
            other.0.partial_cmp(&self.0).unwrap_or(Ordering::Equal)
        }
    }
    impl PartialOrd for HeapEntry {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }

    let mut dist: HashMap<NodeIndex, f64> = HashMap::new();
    let mut prev: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut heap = BinaryHeap::new();

    dist.insert(source, 0.0);
    heap.push(HeapEntry(0.0, source));

    while let Some(HeapEntry(d, u)) = heap.pop() {
        if d > *dist.get(&u).unwrap_or(&f64::MAX) {
            continue;
        }
        for v in incident(zone, u, mode) {
            let w = edge_length_between(zone, u, v).unwrap_or(0.0);
            let nd = d + w;
            if nd < *dist.get(&v).unwrap_or(&f64::MAX) {
                dist.insert(v, nd);
                prev.insert(v, u);
                heap.push(HeapEntry(nd, v));
            }
        }
    }

    prev
}

fn reconstruct_path(prev: &HashMap<NodeIndex, NodeIndex>, source: NodeIndex, target: NodeIndex) -> Option<Vec<NodeIndex>> {
    if source == target {
        return Some(vec![source]);
    }
    let mut path = vec![target];
    let mut cur = target;
    while cur != source {
        let p = *prev.get(&cur)?;
        path.push(p);
        cur = p;
    }
    path.reverse();
    Some(path)
}

/// Edge-cover walk: visits every edge at least once, bridging via shortest
/// paths when the current node has no unvisited incident edge.
fn edge_cover_walk(zone: &Zone, start: NodeIndex, mode: TravelMode) -> Vec<NodeIndex> {
    let total_edges = zone.graph.edge_count();
    let cap = 3 * total_edges + 100;

    let mut visited: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();
    let mut route = vec![start];
    let mut current = start;
    let mut iterations = 0;

    while visited.len() < total_edges && iterations < cap {
        iterations += 1;

        let next = incident(zone, current, mode)
            .into_iter()
            .find(|&n| !visited.contains(&edge_key(current, n)));

        if let Some(next_node) = next {
            visited.insert(edge_key(current, next_node));
            route.push(next_node);
            current = next_node;
            continue;
        }

        let mut nodes_with_unvisited: HashSet<NodeIndex> = HashSet::new();
        for n in zone.graph.graph.node_indices() {
            for neighbor in incident(zone, n, mode) {
                if !visited.contains(&edge_key(n, neighbor)) {
                    nodes_with_unvisited.insert(n);
                    nodes_with_unvisited.insert(neighbor);
                }
            }
        }
        if nodes_with_unvisited.is_empty() {
            break;
        }

        let prev = dijkstra_predecessors(zone, current, mode);
        let mut targets: Vec<NodeIndex> = nodes_with_unvisited.into_iter().collect();
        targets.sort_by_key(|n| n.index());

        let mut best_path: Option<Vec<NodeIndex>> = None;
        for target in targets {
            if let Some(path) = reconstruct_path(&prev, current, target) {
                if path.len() > 1 && best_path.as_ref().map(|b| path.len() < b.len()).unwrap_or(true) {
                    best_path = Some(path);
                }
            }
        }

        match best_path {
            Some(path) => {
                current = *path.last().unwrap();
                route.extend(path.into_iter().skip(1));
            }
            None => break,
        }
    }

    route
}

fn total_distance(zone: &Zone, route: &[NodeIndex]) -> f64 {
    route
        .windows(2)
        .map(|w| edge_length_between(zone, w[0], w[1]).unwrap_or(0.0))
        .sum()
}

fn build_turn_by_turn(zone: &Zone, route: &[NodeIndex]) -> Vec<TurnStep> {
    let mut raw: Vec<(String, f64)> = Vec::new();
    for w in route.windows(2) {
        let name = street_name_between(zone, w[0], w[1]).unwrap_or_else(|| "Unnamed Road".to_string());
        let dist = edge_length_between(zone, w[0], w[1]).unwrap_or(0.0);
        raw.push((name, dist));
    }

    let mut merged: Vec<(String, f64)> = Vec::new();
    for (name, dist) in raw {
        if let Some(last) = merged.last_mut() {
            if last.0 == name {
                last.1 += dist;
                continue;
            }
        }
        merged.push((name, dist));
    }

    merged
        .into_iter()
        .enumerate()
        .map(|(i, (name, dist))| TurnStep {
            step: i + 1,
            instruction: if i == 0 {
                format!("Start on {}", name)
            } else {
                format!("Turn onto {}", name)
            },
            distance_m: dist,
            street_name: name,
        })
        .collect()
}

fn speed_kmh(mode: TravelMode, walking_speed_kmh: f64, driving_speed_kmh: f64) -> f64 {
    match mode {
        TravelMode::Walking => walking_speed_kmh,
        TravelMode::Driving => driving_speed_kmh,
    }
}

/// Generates a route through `zone`: edge-cover walk, optional closing back
/// to the start, distance, turn-by-turn, and duration.
pub fn generate_route(
    zone: &Zone,
    start_point: Option<LatLng>,
    return_to_start: bool,
    mode: TravelMode,
    walking_speed_kmh: f64,
    driving_speed_kmh: f64,
) -> RouteResult {
    if zone.graph.edge_count() == 0 {
        return RouteResult {
            waypoints: vec![],
            geometry: vec![],
            total_distance_m: 0.0,
            turn_by_turn: vec![],
            estimated_duration_min: 1,
        };
    }

    let Some(start) = start_node(zone, start_point) else {
        return RouteResult {
            waypoints: vec![],
            geometry: vec![],
            total_distance_m: 0.0,
            turn_by_turn: vec![],
            estimated_duration_min: 1,
        };
    };

    let mut route = edge_cover_walk(zone, start, mode);

    if return_to_start && route.last() != Some(&start) {
        let prev = dijkstra_predecessors(zone, *route.last().unwrap(), mode);
        if let Some(path) = reconstruct_path(&prev, *route.last().unwrap(), start) {
            route.extend(path.into_iter().skip(1));
        }
    }

    let waypoints: Vec<LatLng> = route
        .iter()
        .map(|&n| {
            let node = zone.graph.graph[n];
            LatLng::new(node.y, node.x)
        })
        .collect();
    let geometry: Vec<(f64, f64)> = waypoints.iter().map(|p| (p.lng, p.lat)).collect();

    let total_distance_m = total_distance(zone, &route);
    let turn_by_turn = build_turn_by_turn(zone, &route);

    let speed = speed_kmh(mode, walking_speed_kmh, driving_speed_kmh);
    let duration_min = (total_distance_m / 1000.0 / speed) * 60.0;
    let estimated_duration_min = (duration_min.floor() as i64).max(1) as u64;

    RouteResult {
        waypoints,
        geometry,
        total_distance_m,
        turn_by_turn,
        estimated_duration_min,
    }
}
