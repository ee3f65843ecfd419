//! Map data provider: road network + buildings, Overpass-API-backed.
//!
//! Modeled on `RoadNetwork::load_or_fetch`/`from_bbox`: same
//! three-tier cache (in-memory `RwLock<HashMap>`, file cache, Overpass
//! download), same Overpass query shape and node/edge assembly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use geo::{BoundingRect, Coord, Polygon};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::density::Building;
use crate::error::Error;
use crate::graph::{RawEdgeAttrs, RawGraph, RoadNode, TravelMode};

const OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
const CACHE_VERSION: u32 = 1;

/// Highway classes queried from Overpass: a superset of the residential-class
/// filter applied after ingest.
const QUERIED_HIGHWAYS: &str = "motorway|trunk|primary|secondary|tertiary|residential|unclassified|service|living_street|footway|path|pedestrian";

#[async_trait::async_trait]
pub trait MapProvider: Send + Sync {
    async fn road_network(&self, polygon: &Polygon<f64>, mode: TravelMode) -> Result<RawGraph, Error>;
    async fn buildings(&self, polygon: &Polygon<f64>) -> Result<Vec<Building>, Error>;
}

fn bbox_cache_key(polygon: &Polygon<f64>) -> Option<String> {
    let rect = polygon.bounding_rect()?;
    Some(format!(
        "{:.4}_{:.4}_{:.4}_{:.4}",
        rect.min().y,
        rect.min().x,
        rect.max().y,
        rect.max().x
    ))
}

type RawGraphCache = RwLock<HashMap<String, Arc<RawGraph>>>;

/// Overpass API backed provider with three-tier caching: in-memory, then
/// file cache, then a live download.
pub struct OverpassProvider {
    cache_dir: PathBuf,
    timeout: Duration,
    client: reqwest::Client,
    memory: OnceLock<RawGraphCache>,
}

impl OverpassProvider {
    pub fn new(cache_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent("flyer-router/0.1.0")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            cache_dir: cache_dir.into(),
            timeout,
            client,
            memory: OnceLock::new(),
        }
    }

    fn memory_cache(&self) -> &RawGraphCache {
        self.memory.get_or_init(|| RwLock::new(HashMap::new()))
    }

    async fn load_or_fetch_roads(&self, polygon: &Polygon<f64>, mode: TravelMode) -> Result<Arc<RawGraph>, Error> {
        let Some(key) = bbox_cache_key(polygon) else {
            return Err(Error::InvalidArea("polygon has no bounding box".into()));
        };

        {
            let cache = self.memory_cache().read().await;
            if let Some(graph) = cache.get(&key) {
                info!("using in-memory cached road network for {}", key);
                return Ok(Arc::clone(graph));
            }
        }

        let mut cache = self.memory_cache().write().await;
        if let Some(graph) = cache.get(&key) {
            return Ok(Arc::clone(graph));
        }

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let cache_path = self.cache_dir.join(format!("{}.json", key));

        let graph = if tokio::fs::try_exists(&cache_path).await.unwrap_or(false) {
            match load_from_cache(&cache_path).await {
                Ok(g) => g,
                Err(e) => {
                    info!("road network cache invalid ({}), downloading fresh", e);
                    let g = self.fetch_roads(polygon, mode).await?;
                    save_to_cache(&cache_path, &g).await?;
                    g
                }
            }
        } else {
            let g = self.fetch_roads(polygon, mode).await?;
            save_to_cache(&cache_path, &g).await?;
            g
        };

        let graph = Arc::new(graph);
        cache.insert(key, Arc::clone(&graph));
        Ok(graph)
    }

    async fn fetch_roads(&self, polygon: &Polygon<f64>, _mode: TravelMode) -> Result<RawGraph, Error> {
        let rect = polygon
            .bounding_rect()
            .ok_or_else(|| Error::InvalidArea("polygon has no bounding box".into()))?;

        let query = format!(
            r#"[out:json][timeout:120];
(
  way["highway"~"^({})$"]
    ({},{},{},{});
);
(._;>;);
out body;"#,
            QUERIED_HIGHWAYS,
            rect.min().y,
            rect.min().x,
            rect.max().y,
            rect.max().x
        );
        debug!("overpass road query:\n{}", query);

        let body = self.run_overpass_query(&query).await?;
        build_road_graph_from_osm(&body)
    }

    async fn run_overpass_query(&self, query: &str) -> Result<OverpassResponse, Error> {
        let fut = self
            .client
            .post(OVERPASS_URL)
            .body(query.to_string())
            .header("Content-Type", "text/plain")
            .send();

        let response = tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| Error::ProviderTimeout)??;

        if !response.status().is_success() {
            return Err(Error::ProviderFailure(format!(
                "overpass API returned status {}",
                response.status()
            )));
        }

        let parse_fut = response.json::<OverpassResponse>();
        tokio::time::timeout(self.timeout, parse_fut)
            .await
            .map_err(|_| Error::ProviderTimeout)?
            .map_err(Error::from)
    }
}

#[async_trait::async_trait]
impl MapProvider for OverpassProvider {
    async fn road_network(&self, polygon: &Polygon<f64>, mode: TravelMode) -> Result<RawGraph, Error> {
        let graph = self.load_or_fetch_roads(polygon, mode).await?;
        Ok(clone_raw_graph(&graph))
    }

    async fn buildings(&self, polygon: &Polygon<f64>) -> Result<Vec<Building>, Error> {
        let rect = polygon
            .bounding_rect()
            .ok_or_else(|| Error::InvalidArea("polygon has no bounding box".into()))?;

        let query = format!(
            r#"[out:json][timeout:120];
(
  way["building"]
    ({},{},{},{});
  relation["building"]
    ({},{},{},{});
);
out center;"#,
            rect.min().y,
            rect.min().x,
            rect.max().y,
            rect.max().x,
            rect.min().y,
            rect.min().x,
            rect.max().y,
            rect.max().x
        );
        debug!("overpass building query:\n{}", query);

        match self.run_overpass_query(&query).await {
            Ok(body) => Ok(parse_buildings_from_osm(&body)),
            Err(e) => {
                warn!("buildings provider call failed ({e}); falling back to road-length density");
                Ok(vec![])
            }
        }
    }
}

fn clone_raw_graph(graph: &RawGraph) -> RawGraph {
    RawGraph {
        nodes: graph.nodes.clone(),
        edges: graph
            .edges
            .iter()
            .map(|(a, b, attrs)| {
                (
                    *a,
                    *b,
                    RawEdgeAttrs {
                        length: attrs.length,
                        highway: attrs.highway.clone(),
                        name: attrs.name.clone(),
                        geometry: attrs.geometry.clone(),
                    },
                )
            })
            .collect(),
    }
}

fn build_road_graph_from_osm(osm: &OverpassResponse) -> Result<RawGraph, Error> {
    let mut node_coords: HashMap<i64, (f64, f64)> = HashMap::new();
    for elem in &osm.elements {
        if elem.elem_type == "node" {
            if let (Some(lat), Some(lon)) = (elem.lat, elem.lon) {
                node_coords.insert(elem.id, (lat, lon));
            }
        }
    }

    let mut index_of: HashMap<i64, usize> = HashMap::new();
    let mut nodes: Vec<RoadNode> = Vec::new();
    let mut edges: Vec<(usize, usize, RawEdgeAttrs)> = Vec::new();

    let get_or_add = |id: i64, coords: &HashMap<i64, (f64, f64)>, index_of: &mut HashMap<i64, usize>, nodes: &mut Vec<RoadNode>| -> Option<usize> {
        if let Some(&idx) = index_of.get(&id) {
            return Some(idx);
        }
        let &(lat, lng) = coords.get(&id)?;
        let idx = nodes.len();
        nodes.push(RoadNode { x: lng, y: lat });
        index_of.insert(id, idx);
        Some(idx)
    };

    for elem in &osm.elements {
        if elem.elem_type != "way" {
            continue;
        }
        let Some(ref node_ids) = elem.nodes else { continue };
        let highway = elem.tags.as_ref().and_then(|t| t.highway.clone());
        let name = elem.tags.as_ref().and_then(|t| t.name.clone());
        let oneway = elem.tags.as_ref().and_then(|t| t.oneway.clone());
        let is_oneway = matches!(oneway.as_deref(), Some("yes") | Some("1"));

        for window in node_ids.windows(2) {
            let (Some(i1), Some(i2)) = (
                get_or_add(window[0], &node_coords, &mut index_of, &mut nodes),
                get_or_add(window[1], &node_coords, &mut index_of, &mut nodes),
            ) else {
                continue;
            };

            edges.push((
                i1,
                i2,
                RawEdgeAttrs {
                    length: None,
                    highway: highway.clone(),
                    name: name.clone(),
                    geometry: None,
                },
            ));
            if !is_oneway {
                edges.push((
                    i2,
                    i1,
                    RawEdgeAttrs {
                        length: None,
                        highway: highway.clone(),
                        name: name.clone(),
                        geometry: None,
                    },
                ));
            }
        }
    }

    info!("built raw graph with {} nodes, {} edge records", nodes.len(), edges.len());
    Ok(RawGraph { nodes, edges })
}

fn parse_buildings_from_osm(osm: &OverpassResponse) -> Vec<Building> {
    let mut buildings = Vec::new();
    for elem in &osm.elements {
        if elem.elem_type != "way" && elem.elem_type != "relation" {
            continue;
        }
        let Some(ref tags) = elem.tags else { continue };
        let Some(ref building_type) = tags.building else { continue };

        let (lat, lon) = match &elem.center {
            Some(c) => (c.lat, c.lon),
            None => match (elem.lat, elem.lon) {
                (Some(lat), Some(lon)) => (lat, lon),
                _ => continue,
            },
        };

        let levels = tags
            .building_levels
            .as_ref()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(1);

        buildings.push(Building {
            footprint: None,
            building_type: building_type.clone(),
            levels,
            centroid: Coord { x: lon, y: lat },
        });
    }
    buildings
}

async fn load_from_cache(path: &Path) -> Result<RawGraph, Error> {
    let data = tokio::fs::read_to_string(path).await?;
    let cached: CachedGraph = match serde_json::from_str(&data) {
        Ok(c) => c,
        Err(e) => {
            let _ = tokio::fs::remove_file(path).await;
            return Err(Error::ProviderFailure(format!("cache parse error: {e}")));
        }
    };

    if cached.version != CACHE_VERSION {
        let _ = tokio::fs::remove_file(path).await;
        return Err(Error::ProviderFailure("cache version mismatch".into()));
    }

    let nodes = cached.nodes.iter().map(|n| RoadNode { x: n.lng, y: n.lat }).collect();
    let edges = cached
        .edges
        .into_iter()
        .map(|e| {
            (
                e.from,
                e.to,
                RawEdgeAttrs {
                    length: Some(e.length),
                    highway: Some(e.highway),
                    name: Some(e.name),
                    geometry: None,
                },
            )
        })
        .collect();

    Ok(RawGraph { nodes, edges })
}

async fn save_to_cache(path: &Path, graph: &RawGraph) -> Result<(), Error> {
    let nodes: Vec<CachedNode> = graph.nodes.iter().map(|n| CachedNode { lat: n.y, lng: n.x }).collect();
    let edges: Vec<CachedEdge> = graph
        .edges
        .iter()
        .map(|(from, to, attrs)| CachedEdge {
            from: *from,
            to: *to,
            length: attrs.length.unwrap_or(0.0),
            highway: attrs.highway.clone().unwrap_or_else(|| "unclassified".into()),
            name: attrs.name.clone().unwrap_or_else(|| "Unnamed Road".into()),
        })
        .collect();

    let cached = CachedGraph {
        version: CACHE_VERSION,
        nodes,
        edges,
    };
    let data = serde_json::to_string(&cached)?;
    tokio::fs::write(path, data).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    elements: Vec<OsmElement>,
}

#[derive(Debug, Deserialize)]
struct OsmElement {
    #[serde(rename = "type")]
    elem_type: String,
    id: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(rename = "center")]
    center: Option<OsmCenter>,
    nodes: Option<Vec<i64>>,
    tags: Option<OsmTags>,
}

#[derive(Debug, Deserialize)]
struct OsmCenter {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OsmTags {
    highway: Option<String>,
    name: Option<String>,
    oneway: Option<String>,
    building: Option<String>,
    #[serde(rename = "building:levels")]
    building_levels: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedGraph {
    version: u32,
    nodes: Vec<CachedNode>,
    edges: Vec<CachedEdge>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedNode {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedEdge {
    from: usize,
    to: usize,
    length: f64,
    highway: String,
    name: String,
}

/// Fixed-data test double implementing [`MapProvider`] without any network
/// access.
pub struct StaticProvider {
    pub graph: RawGraph,
    pub buildings: Vec<Building>,
}

#[async_trait::async_trait]
impl MapProvider for StaticProvider {
    async fn road_network(&self, _polygon: &Polygon<f64>, _mode: TravelMode) -> Result<RawGraph, Error> {
        Ok(clone_raw_graph(&self.graph))
    }

    async fn buildings(&self, _polygon: &Polygon<f64>) -> Result<Vec<Building>, Error> {
        Ok(self.buildings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::circle_polygon;

    fn sample_graph() -> RawGraph {
        RawGraph {
            nodes: vec![RoadNode { x: -75.0, y: 40.0 }, RoadNode { x: -75.001, y: 40.0 }],
            edges: vec![(
                0,
                1,
                RawEdgeAttrs {
                    highway: Some("residential".into()),
                    length: Some(100.0),
                    name: Some("Test St".into()),
                    geometry: None,
                },
            )],
        }
    }

    #[tokio::test]
    async fn static_provider_returns_fixed_data() {
        let polygon = circle_polygon(40.0, -75.0, 500.0, 16).unwrap();
        let provider = StaticProvider {
            graph: sample_graph(),
            buildings: vec![],
        };
        let graph = provider.road_network(&polygon, TravelMode::Walking).await.unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
    }

    #[test]
    fn bbox_cache_key_is_stable_for_same_polygon() {
        let polygon = circle_polygon(40.0, -75.0, 500.0, 16).unwrap();
        let k1 = bbox_cache_key(&polygon).unwrap();
        let k2 = bbox_cache_key(&polygon).unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn building_parsing_reads_levels_and_center() {
        let osm = OverpassResponse {
            elements: vec![OsmElement {
                elem_type: "way".into(),
                id: 1,
                lat: None,
                lon: None,
                center: Some(OsmCenter { lat: 40.1, lon: -75.1 }),
                nodes: None,
                tags: Some(OsmTags {
                    highway: None,
                    name: None,
                    oneway: None,
                    building: Some("apartments".into()),
                    building_levels: Some("4".into()),
                }),
            }],
        };
        let buildings = parse_buildings_from_osm(&osm);
        assert_eq!(buildings.len(), 1);
        assert_eq!(buildings[0].levels, 4);
        assert_eq!(buildings[0].building_type, "apartments");
    }
}
