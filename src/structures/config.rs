use std::collections::HashMap;
use std::fs;

use serde::Deserialize;

/// Engine configuration, loaded from a YAML file. Every field has a
/// default so a partial file works; the crowd thresholds and delay factor
/// tables are deliberately configuration rather than constants.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub crowd: CrowdConfig,
    #[serde(default)]
    pub delay: DelayConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_stations_file")]
    pub stations_file: String,
    #[serde(default = "default_segments_file")]
    pub segments_file: String,
    #[serde(default = "default_schedules_dir")]
    pub schedules_dir: String,
    #[serde(default = "default_route_mappings_file")]
    pub route_mappings_file: String,
    /// Snapshot age, in seconds, past which a non-forced refresh reloads.
    #[serde(default = "default_cache_seconds")]
    pub cache_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrowdConfig {
    /// Age past which a confirmation stops counting.
    #[serde(default = "default_crowd_ttl_seconds")]
    pub ttl_seconds: i64,
    /// Active count at which the level becomes Medium.
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: usize,
    /// Active count at which the level becomes High.
    #[serde(default = "default_high_threshold")]
    pub high_threshold: usize,
    /// `None` leaves the per-train confirmation buffer uncapped.
    #[serde(default = "default_max_per_train")]
    pub max_per_train: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DelayConfig {
    #[serde(default = "default_base_probability")]
    pub base_probability: f64,
    #[serde(default = "default_base_delay_min")]
    pub base_delay_min: u32,
    #[serde(default = "default_base_delay_max")]
    pub base_delay_max: u32,
    #[serde(default = "default_max_delay_minutes")]
    pub max_delay_minutes: u32,
    #[serde(default = "default_weather_factors")]
    pub weather_factors: HashMap<String, f64>,
    #[serde(default = "default_rush_hour_factor")]
    pub rush_hour_factor: f64,
    #[serde(default = "default_night_factor")]
    pub night_factor: f64,
    /// Per-station multipliers, matched by substring against the station
    /// name. Unlisted stations are neutral.
    #[serde(default = "default_station_factors")]
    pub station_factors: HashMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, String> {
        let content =
            fs::read_to_string(path).map_err(|e| format!("Failed to read config: {e}"))?;
        serde_yml::from_str(&content).map_err(|e| format!("Failed to parse config: {e}"))
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            stations_file: default_stations_file(),
            segments_file: default_segments_file(),
            schedules_dir: default_schedules_dir(),
            route_mappings_file: default_route_mappings_file(),
            cache_seconds: default_cache_seconds(),
        }
    }
}

impl Default for CrowdConfig {
    fn default() -> Self {
        CrowdConfig {
            ttl_seconds: default_crowd_ttl_seconds(),
            medium_threshold: default_medium_threshold(),
            high_threshold: default_high_threshold(),
            max_per_train: default_max_per_train(),
        }
    }
}

impl Default for DelayConfig {
    fn default() -> Self {
        DelayConfig {
            base_probability: default_base_probability(),
            base_delay_min: default_base_delay_min(),
            base_delay_max: default_base_delay_max(),
            max_delay_minutes: default_max_delay_minutes(),
            weather_factors: default_weather_factors(),
            rush_hour_factor: default_rush_hour_factor(),
            night_factor: default_night_factor(),
            station_factors: default_station_factors(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: default_bind(),
        }
    }
}

fn default_stations_file() -> String {
    "data/stations.json".to_string()
}

fn default_segments_file() -> String {
    "data/segments_500m.json".to_string()
}

fn default_schedules_dir() -> String {
    "data/schedules".to_string()
}

fn default_route_mappings_file() -> String {
    "data/train_route_mapping.json".to_string()
}

fn default_cache_seconds() -> u64 {
    300
}

fn default_crowd_ttl_seconds() -> i64 {
    7200
}

fn default_medium_threshold() -> usize {
    3
}

fn default_high_threshold() -> usize {
    6
}

fn default_max_per_train() -> Option<usize> {
    Some(1000)
}

fn default_base_probability() -> f64 {
    0.3
}

fn default_base_delay_min() -> u32 {
    5
}

fn default_base_delay_max() -> u32 {
    25
}

fn default_max_delay_minutes() -> u32 {
    90
}

fn default_weather_factors() -> HashMap<String, f64> {
    HashMap::from([
        ("clear".to_string(), 1.0),
        ("cloudy".to_string(), 1.2),
        ("rainy".to_string(), 1.5),
        ("foggy".to_string(), 1.7),
        ("stormy".to_string(), 2.0),
    ])
}

fn default_rush_hour_factor() -> f64 {
    1.6
}

fn default_night_factor() -> f64 {
    0.9
}

fn default_station_factors() -> HashMap<String, f64> {
    HashMap::from([
        ("Dhaka".to_string(), 1.5),
        ("Chattogram".to_string(), 1.5),
        ("Rajshahi".to_string(), 1.5),
        ("Khulna".to_string(), 1.5),
        ("Sylhet".to_string(), 1.5),
    ])
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}
