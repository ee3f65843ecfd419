//! Geometry utilities: building the area polygon and reading basic facts off it.
//!
//! Internal geometry uses `geo`/`geo-types` with the library's native
//! `(x = lng, y = lat)` coordinate order; all public-facing types elsewhere
//! in the crate use `(lat, lng)` and convert at the boundary.

use geo::{BoundingRect, Centroid};
use geo::{Coord, LineString, Polygon, Rect};

use crate::error::Error;

/// A (lat, lng) pair as seen by callers of the crate.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn to_coord(self) -> Coord<f64> {
        Coord {
            x: self.lng,
            y: self.lat,
        }
    }

    pub fn from_coord(c: Coord<f64>) -> Self {
        Self {
            lat: c.y,
            lng: c.x,
        }
    }
}

/// Meters of latitude per degree, used by the equirectangular circle
/// approximation.
const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Builds an n-gon approximating a circle of the given radius, centered at
/// `(center_lat, center_lng)`.
///
/// Vertex `i` sits at angle `theta_i = 2*pi*i/n`, placed by the
/// equirectangular approximation below.
pub fn circle_polygon(center_lat: f64, center_lng: f64, radius_m: f64, n: usize) -> Result<Polygon<f64>, Error> {
    if radius_m <= 0.0 {
        return Err(Error::InvalidArea("radius_m must be positive".into()));
    }
    if center_lat.abs() > 90.0 {
        return Err(Error::InvalidArea("center latitude out of range".into()));
    }
    if n < 3 {
        return Err(Error::InvalidArea("circle approximation needs at least 3 points".into()));
    }

    let lat_deg_per_m = 1.0 / METERS_PER_DEGREE_LAT;
    let lng_deg_per_m = 1.0 / (METERS_PER_DEGREE_LAT * center_lat.to_radians().cos());

    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(n + 1);
    for i in 0..n {
        let theta = 2.0 * std::f64::consts::PI * (i as f64) / (n as f64);
        let lat = center_lat + radius_m * theta.sin() * lat_deg_per_m;
        let lng = center_lng + radius_m * theta.cos() * lng_deg_per_m;
        coords.push(Coord { x: lng, y: lat });
    }
    coords.push(coords[0]);

    Ok(Polygon::new(LineString::new(coords), vec![]))
}

/// Default vertex count for [`circle_polygon`].
pub const DEFAULT_CIRCLE_POINTS: usize = 64;

/// Builds a polygon from an ordered list of (lat, lng) vertices.
///
/// Rejects inputs with fewer than 3 vertices.
pub fn polygon_from_points(points: &[LatLng]) -> Result<Polygon<f64>, Error> {
    if points.len() < 3 {
        return Err(Error::InvalidArea("polygon must have at least 3 vertices".into()));
    }
    let mut coords: Vec<Coord<f64>> = points.iter().map(|p| p.to_coord()).collect();
    if coords.first() != coords.last() {
        coords.push(coords[0]);
    }
    Ok(Polygon::new(LineString::new(coords), vec![]))
}

/// Centroid of a polygon, as (lat, lng).
pub fn centroid(polygon: &Polygon<f64>) -> Option<LatLng> {
    polygon.centroid().map(|p| LatLng::new(p.y(), p.x()))
}

/// Axis-aligned bounding box of a polygon.
pub fn bounding_box(polygon: &Polygon<f64>) -> Option<Rect<f64>> {
    polygon.bounding_rect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circle_roundness() {
        let center_lat = 40.7128;
        let center_lng = -74.0060;
        let radius = 1000.0;
        let poly = circle_polygon(center_lat, center_lng, radius, DEFAULT_CIRCLE_POINTS).unwrap();

        let c = centroid(&poly).unwrap();
        assert!((c.lat - center_lat).abs() < 0.001);
        assert!((c.lng - center_lng).abs() < 0.001);

        let lat_deg_per_m = 1.0 / METERS_PER_DEGREE_LAT;
        let lng_deg_per_m = 1.0 / (METERS_PER_DEGREE_LAT * center_lat.to_radians().cos());
        for coord in poly.exterior().coords() {
            let dlat = (coord.y - center_lat) / lat_deg_per_m;
            let dlng = (coord.x - center_lng) / lng_deg_per_m;
            let r = (dlat * dlat + dlng * dlng).sqrt();
            assert!((r - radius).abs() / radius < 0.05);
        }
    }

    #[test]
    fn polygon_identity_preserves_vertex_count() {
        let points = vec![
            LatLng::new(40.71, -74.01),
            LatLng::new(40.72, -74.01),
            LatLng::new(40.715, -74.00),
        ];
        let poly = polygon_from_points(&points).unwrap();
        // Closed ring: input vertices + 1 repeated closing point.
        assert_eq!(poly.exterior().coords().count(), points.len() + 1);
    }

    #[test]
    fn rejects_too_few_points() {
        let points = vec![LatLng::new(0.0, 0.0), LatLng::new(1.0, 1.0)];
        assert!(polygon_from_points(&points).is_err());
    }

    #[test]
    fn rejects_bad_circle_params() {
        assert!(circle_polygon(40.0, -74.0, -1.0, 64).is_err());
        assert!(circle_polygon(91.0, -74.0, 100.0, 64).is_err());
    }
}
