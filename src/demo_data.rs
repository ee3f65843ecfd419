//! Fixed demo area generator for the `/demo-data` endpoint and tests.

use crate::domain::{AreaSpec, RouteRequest};
use crate::geometry::LatLng;
use crate::graph::TravelMode;
use crate::partition::BalancePriority;

/// A sample request centered on Philadelphia's Rittenhouse Square, sized to
/// produce a handful of walkable routes without hitting a live provider.
pub fn generate_demo_request() -> RouteRequest {
    RouteRequest {
        area: AreaSpec::Circle {
            center: LatLng::new(39.9496, -75.1719),
            radius_m: 800.0,
        },
        num_routes: 4,
        total_flyers: 1000,
        travel_mode: TravelMode::Walking,
        start_point: None,
        return_to_start: false,
        balance_priority: BalancePriority::Density,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_request_passes_validation_shape() {
        let request = generate_demo_request();
        assert!(request.num_routes >= 1 && request.num_routes <= 20);
        match request.area {
            AreaSpec::Circle { radius_m, .. } => assert!(radius_m > 0.0),
            AreaSpec::Polygon { .. } => panic!("expected a circle demo area"),
        }
    }
}
