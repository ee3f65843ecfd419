//! Runtime configuration, env-var driven with typed defaults.
//!
//! Mirrors inline `SocketAddr`-from-env style in `main.rs`
//! rather than pulling in a config-file crate; the original Python
//! `Config` class is the source of the default values.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub osm_cache_dir: String,
    pub provider_timeout: Duration,
    pub building_max_distance_m: f64,
    pub walking_speed_kmh: f64,
    pub driving_speed_kmh: f64,
    pub default_num_routes: usize,
    pub max_num_routes: usize,
    pub default_total_flyers: u64,
}

impl Config {
    pub fn from_env() -> Self {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8000);
        let bind_addr = format!("{}:{}", host, port)
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8000)));

        let timeout_secs: u64 = env::var("OSM_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300);

        Self {
            bind_addr,
            osm_cache_dir: env::var("OSM_CACHE_DIR").unwrap_or_else(|_| "./cache/osm".to_string()),
            provider_timeout: Duration::from_secs(timeout_secs),
            building_max_distance_m: 50.0,
            walking_speed_kmh: 4.0,
            driving_speed_kmh: 30.0,
            default_num_routes: 4,
            max_num_routes: 20,
            default_total_flyers: 1000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
