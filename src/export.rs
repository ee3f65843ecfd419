//! GPX / KML / GeoJSON / Google Maps URL encoders for a completed job's
//! routes.

use geo_types::Point;

use crate::domain::Route;
use crate::graph::TravelMode;

/// One GPX track per route, built with the `gpx` crate.
pub fn generate_gpx(routes: &[Route]) -> String {
    let mut gpx = gpx::Gpx {
        version: gpx::GpxVersion::Gpx11,
        creator: Some("flyer-router".to_string()),
        ..Default::default()
    };

    for route in routes {
        let points = route
            .waypoints
            .iter()
            .map(|wp| gpx::Waypoint::new(Point::new(wp.lng, wp.lat)))
            .collect();

        let track = gpx::Track {
            name: Some(format!("Route {}", route.route_id)),
            description: Some(format!(
                "{} flyers, {:.2} km",
                route.assigned_flyers,
                route.total_distance_m / 1000.0
            )),
            segments: vec![gpx::TrackSegment { points }],
            ..Default::default()
        };
        gpx.tracks.push(track);
    }

    let mut buf = Vec::new();
    gpx::write(&gpx, &mut buf).expect("in-memory GPX write is infallible");
    String::from_utf8(buf).expect("gpx writer emits valid UTF-8")
}

/// One folder per route with a colored `LineString`, hand-built XML since
/// no KML-writing crate is in the dependency set this repo draws from.
pub fn generate_kml(routes: &[Route]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n<Document>\n");

    for route in routes {
        out.push_str(&format!("  <Folder>\n    <name>Route {}</name>\n", route.route_id));
        out.push_str("    <Placemark>\n");
        out.push_str(&format!("      <name>Route {} Path</name>\n", route.route_id));
        out.push_str(&format!(
            "      <description>Flyers: {}&lt;br&gt;Distance: {:.2} km&lt;br&gt;Est. Time: {} minutes</description>\n",
            route.assigned_flyers,
            route.total_distance_m / 1000.0,
            route.estimated_duration_min
        ));
        out.push_str("      <Style>\n        <LineStyle>\n");
        out.push_str(&format!("          <color>{}</color>\n", kml_color(&route.color)));
        out.push_str("          <width>4</width>\n        </LineStyle>\n      </Style>\n");
        out.push_str("      <LineString>\n        <coordinates>\n");
        for wp in &route.waypoints {
            out.push_str(&format!("          {},{}\n", wp.lng, wp.lat));
        }
        out.push_str("        </coordinates>\n      </LineString>\n    </Placemark>\n  </Folder>\n");
    }

    out.push_str("</Document>\n</kml>\n");
    out
}

/// KML colors are `aabbggrr`; fully opaque, channels reversed from `#rrggbb`.
fn kml_color(hex: &str) -> String {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return "ff000000".to_string();
    }
    let r = &hex[0..2];
    let g = &hex[2..4];
    let b = &hex[4..6];
    format!("ff{}{}{}", b, g, r).to_lowercase()
}

/// `FeatureCollection` via the `geojson` crate's `geo-types` feature, one
/// `Feature` per route (LineString geometry, route metadata in
/// `properties`).
pub fn generate_geojson(routes: &[Route]) -> String {
    use geo_types::{Geometry, LineString};
    use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};

    let features = routes
        .iter()
        .map(|route| {
            let line = LineString::from(route.geometry.clone());
            let geometry = geojson::Geometry::from(&Geometry::LineString(line));

            let mut properties = JsonObject::new();
            properties.insert("route_id".to_string(), JsonValue::from(route.route_id));
            properties.insert("flyers".to_string(), JsonValue::from(route.assigned_flyers));
            properties.insert("distance_m".to_string(), JsonValue::from(route.total_distance_m));
            properties.insert("duration_min".to_string(), JsonValue::from(route.estimated_duration_min));
            properties.insert("color".to_string(), JsonValue::from(route.color.clone()));

            Feature {
                bbox: None,
                geometry: Some(geometry),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    collection.to_string()
}

/// Stride-subsamples waypoints to ≤ 23 points (origin + ≤ 21 waypoints +
/// destination), exactly as the original `generate_google_maps_url`.
pub fn generate_google_maps_url(waypoints: &[crate::geometry::LatLng], mode: TravelMode) -> String {
    const MAX_WAYPOINTS: usize = 23;

    if waypoints.len() < 2 {
        return String::new();
    }

    let sampled: Vec<&crate::geometry::LatLng> = if waypoints.len() > MAX_WAYPOINTS + 2 {
        let step = waypoints.len() / MAX_WAYPOINTS;
        waypoints.iter().step_by(step.max(1)).take(MAX_WAYPOINTS).collect()
    } else {
        waypoints.iter().collect()
    };

    let origin = format!("{},{}", sampled[0].lat, sampled[0].lng);
    let destination = format!("{},{}", sampled[sampled.len() - 1].lat, sampled[sampled.len() - 1].lng);
    let travelmode = match mode {
        TravelMode::Walking => "walking",
        TravelMode::Driving => "driving",
    };

    if sampled.len() > 2 {
        let waypoints_str = sampled[1..sampled.len() - 1]
            .iter()
            .map(|wp| format!("{},{}", wp.lat, wp.lng))
            .collect::<Vec<_>>()
            .join("|");
        format!(
            "https://www.google.com/maps/dir/?api=1&origin={origin}&destination={destination}&waypoints={waypoints_str}&travelmode={travelmode}"
        )
    } else {
        format!("https://www.google.com/maps/dir/?api=1&origin={origin}&destination={destination}&travelmode={travelmode}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::LatLng;

    fn sample_route() -> Route {
        Route {
            route_id: 1,
            zone_id: 1,
            color: "#e74c3c".to_string(),
            assigned_flyers: 250,
            estimated_addresses: 25,
            total_distance_m: 1500.0,
            estimated_duration_min: 22,
            waypoints: vec![LatLng::new(40.71, -74.01), LatLng::new(40.72, -74.00)],
            geometry: vec![(-74.01, 40.71), (-74.00, 40.72)],
            turn_by_turn: vec![],
            google_maps_url: String::new(),
        }
    }

    #[test]
    fn gpx_contains_one_track_per_route() {
        let routes = vec![sample_route(), sample_route()];
        let xml = generate_gpx(&routes);
        assert_eq!(xml.matches("<trk>").count(), 2);
    }

    #[test]
    fn geojson_feature_count_matches_route_count() {
        let routes = vec![sample_route(), sample_route(), sample_route()];
        let json = generate_geojson(&routes);
        let parsed: geojson::GeoJson = json.parse().unwrap();
        match parsed {
            geojson::GeoJson::FeatureCollection(fc) => assert_eq!(fc.features.len(), 3),
            _ => panic!("expected a FeatureCollection"),
        }
    }

    #[test]
    fn kml_color_reverses_channels() {
        assert_eq!(kml_color("#e74c3c"), "ff3c4ce7");
    }

    #[test]
    fn google_maps_url_caps_at_23_points() {
        let waypoints: Vec<LatLng> = (0..100).map(|i| LatLng::new(i as f64 * 0.001, 0.0)).collect();
        let url = generate_google_maps_url(&waypoints, TravelMode::Walking);
        let encoded_points = url.matches('|').count() + 2;
        assert!(encoded_points <= 23);
    }

    #[test]
    fn google_maps_url_empty_for_too_few_waypoints() {
        assert_eq!(generate_google_maps_url(&[LatLng::new(0.0, 0.0)], TravelMode::Driving), "");
    }
}
