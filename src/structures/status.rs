use async_graphql::{Enum, SimpleObject};
use chrono::NaiveDateTime;

use crate::structures::LatLng;

/// Where a station sits relative to the train right now. Closed set; every
/// consumer matches it exhaustively so the timeline ordering invariant
/// stays mechanically checkable.
#[derive(Debug, Enum, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StationStatus {
    Completed,
    Current,
    Next,
    Upcoming,
}

#[derive(Debug, Enum, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CrowdLevel {
    None,
    Low,
    Medium,
    High,
}

#[derive(Debug, SimpleObject, Clone)]
pub struct StationStatusInfo {
    pub station_name: String,
    pub status: StationStatus,
    pub scheduled_arrival: Option<NaiveDateTime>,
    pub scheduled_departure: Option<NaiveDateTime>,
    pub actual_arrival: Option<NaiveDateTime>,
    pub actual_departure: Option<NaiveDateTime>,
    pub delay_minutes: u32,
    pub halt_minutes: u32,
    pub distance_from_start_km: f64,
    pub crowd_level: CrowdLevel,
}

/// Full derived status for one train at one instant. Never persisted;
/// recomputed per request.
#[derive(Debug, SimpleObject, Clone)]
pub struct TrainStatus {
    pub train_number: String,
    pub train_name: String,
    /// Whether the schedule operates on the run's departure day.
    pub runs_today: bool,
    pub stations: Vec<StationStatusInfo>,
    pub current_station: Option<String>,
    pub next_station: Option<String>,
    pub current_speed_kmh: f64,
    /// Estimated map coordinates, absent when the stations around the
    /// train are unknown.
    pub position: Option<LatLng>,
    pub distance_covered_km: f64,
    pub distance_to_next_km: f64,
    pub delay_minutes: u32,
    pub estimated_arrival: Option<NaiveDateTime>,
    pub eta_minutes: Option<i64>,
    pub progress_percent: f64,
    pub crowd_level: CrowdLevel,
    pub weather_condition: String,
    /// Set when a position or delay estimate had to fall back to neutral
    /// defaults (missing geometry, unknown factor key).
    pub degraded: bool,
    pub last_updated: NaiveDateTime,
}
