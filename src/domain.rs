//! Request/response schema and the `Route`/`Job` data model.

use serde::{Deserialize, Serialize};

use crate::geometry::LatLng;
use crate::graph::TravelMode;
use crate::partition::BalancePriority;
use crate::router::TurnStep;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AreaSpec {
    Circle { center: LatLng, radius_m: f64 },
    Polygon { points: Vec<LatLng> },
}

fn default_num_routes() -> usize {
    4
}

fn default_total_flyers() -> u64 {
    1000
}

fn default_travel_mode() -> TravelMode {
    TravelMode::Walking
}

fn default_balance_priority() -> BalancePriority {
    BalancePriority::Density
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    pub area: AreaSpec,
    #[serde(default = "default_num_routes")]
    pub num_routes: usize,
    #[serde(default = "default_total_flyers")]
    pub total_flyers: u64,
    #[serde(default = "default_travel_mode")]
    pub travel_mode: TravelMode,
    #[serde(default)]
    pub start_point: Option<LatLng>,
    #[serde(default)]
    pub return_to_start: bool,
    #[serde(default = "default_balance_priority")]
    pub balance_priority: BalancePriority,
}

/// One completed delivery route, owned by its [`Job`] record.
#[derive(Debug, Clone, Serialize)]
pub struct Route {
    pub route_id: usize,
    pub zone_id: usize,
    pub color: String,
    pub assigned_flyers: u64,
    pub estimated_addresses: u64,
    pub total_distance_m: f64,
    pub estimated_duration_min: u64,
    pub waypoints: Vec<LatLng>,
    /// LineString in (lng, lat) order.
    pub geometry: Vec<(f64, f64)>,
    pub turn_by_turn: Vec<TurnStep>,
    /// Built from this route's own waypoints and the request's travel mode.
    pub google_maps_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total_addresses_estimated: u64,
    pub total_distance_m: f64,
    pub total_estimated_duration_min: u64,
}

/// `{ job_id, routes[], summary }`.
#[derive(Debug, Clone, Serialize)]
pub struct RoutePlanResult {
    pub job_id: String,
    pub routes: Vec<Route>,
    pub summary: Summary,
}

impl RoutePlanResult {
    /// `total_addresses_estimated` is the full-graph total computed right
    /// after density estimation, before partitioning drops any disconnected
    /// edges or components — the per-route `estimated_addresses` fields
    /// alone would under-report once a zone is reduced to its largest
    /// connected component.
    pub fn new(job_id: String, routes: Vec<Route>, total_addresses_estimated: u64) -> Self {
        let total_distance_m = routes.iter().map(|r| r.total_distance_m).sum();
        let total_estimated_duration_min = routes.iter().map(|r| r.estimated_duration_min).sum();
        Self {
            job_id,
            routes,
            summary: Summary {
                total_addresses_estimated,
                total_distance_m,
                total_estimated_duration_min,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_sums_route_fields() {
        let routes = vec![
            Route {
                route_id: 0,
                zone_id: 0,
                color: "#FF0000".into(),
                assigned_flyers: 400,
                estimated_addresses: 40,
                total_distance_m: 1000.0,
                estimated_duration_min: 15,
                waypoints: vec![],
                geometry: vec![],
                turn_by_turn: vec![],
                google_maps_url: String::new(),
            },
            Route {
                route_id: 1,
                zone_id: 1,
                color: "#00FF00".into(),
                assigned_flyers: 600,
                estimated_addresses: 60,
                total_distance_m: 2000.0,
                estimated_duration_min: 30,
                waypoints: vec![],
                geometry: vec![],
                turn_by_turn: vec![],
                google_maps_url: String::new(),
            },
        ];
        // 120, not 100: the full-graph total includes addresses on edges a
        // zone's largest-connected-component reduction dropped.
        let result = RoutePlanResult::new("job-1".into(), routes, 120);
        assert_eq!(result.summary.total_addresses_estimated, 120);
        assert_eq!(result.summary.total_distance_m, 3000.0);
        assert_eq!(result.summary.total_estimated_duration_min, 45);
    }

    #[test]
    fn area_spec_deserializes_circle_and_polygon() {
        let circle: AreaSpec = serde_json::from_str(
            r#"{"type":"circle","center":{"lat":40.0,"lng":-75.0},"radius_m":500.0}"#,
        )
        .unwrap();
        assert!(matches!(circle, AreaSpec::Circle { .. }));

        let polygon: AreaSpec = serde_json::from_str(
            r#"{"type":"polygon","points":[{"lat":0.0,"lng":0.0},{"lat":1.0,"lng":0.0},{"lat":1.0,"lng":1.0}]}"#,
        )
        .unwrap();
        assert!(matches!(polygon, AreaSpec::Polygon { .. }));
    }
}
