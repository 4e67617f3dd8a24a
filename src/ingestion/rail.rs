use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::{NaiveTime, Weekday};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::EngineError;
use crate::structures::{
    DataConfig, LatLng, RouteSegment, Snapshot, Station, StopTimes, TrainSchedule,
};

// Raw file shapes

/// stations.json maps station name to [longitude, latitude].
type RawStations = HashMap<String, [f64; 2]>;

#[derive(Debug, Deserialize)]
struct RawSegment {
    from: String,
    to: String,
    points: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct RawScheduleFile {
    data: RawScheduleData,
}

#[derive(Debug, Deserialize)]
struct RawScheduleData {
    train_name: Option<String>,
    #[serde(default)]
    days: Vec<String>,
    #[serde(default)]
    routes: Vec<RawStop>,
}

#[derive(Debug, Deserialize)]
struct RawStop {
    city: String,
    arrival_time: Option<String>,
    departure_time: Option<String>,
    halt: Option<String>,
}

/// Builds a complete snapshot from the configured data files. Any failure
/// on the required sources (stations, schedules) aborts the whole load so
/// the caller can keep its previous snapshot; optional sources (segments,
/// route mappings) degrade to empty with a warning.
pub fn load_snapshot(config: &DataConfig) -> Result<Snapshot, EngineError> {
    let stations = load_stations(&config.stations_file)?;
    let segments = load_segments(&config.segments_file)?;
    let schedules = load_schedules(&config.schedules_dir)?;
    let route_mappings = load_route_mappings(&config.route_mappings_file)?;

    let snapshot = Snapshot {
        stations,
        segments,
        schedules,
        route_mappings,
    };
    info!(
        stations = snapshot.stations.len(),
        segments = snapshot.segments.len(),
        schedules = snapshot.schedules.len(),
        route_mappings = snapshot.route_mappings.len(),
        "snapshot loaded"
    );
    Ok(snapshot)
}

fn load_stations(path: &str) -> Result<HashMap<String, Station>, EngineError> {
    let content = fs::read_to_string(path)
        .map_err(|e| EngineError::Load(format!("failed to read {path}: {e}")))?;
    let raw: RawStations = serde_json::from_str(&content)
        .map_err(|e| EngineError::Load(format!("failed to parse {path}: {e}")))?;

    let mut stations = HashMap::with_capacity(raw.len());
    let mut skipped = 0;
    for (name, lon_lat) in raw {
        let [longitude, latitude] = lon_lat;
        if !latitude.is_finite() || !longitude.is_finite() {
            skipped += 1;
            continue;
        }
        stations.insert(
            name.clone(),
            Station {
                name,
                lat_lng: LatLng::new(latitude, longitude),
            },
        );
    }
    if skipped > 0 {
        warn!(skipped, "stations with unusable coordinates skipped");
    }
    Ok(stations)
}

fn load_segments(path: &str) -> Result<HashMap<String, RouteSegment>, EngineError> {
    if !Path::new(path).exists() {
        warn!(path, "segments file not found, position estimates will fall back to station distances");
        return Ok(HashMap::new());
    }
    let content = fs::read_to_string(path)
        .map_err(|e| EngineError::Load(format!("failed to read {path}: {e}")))?;
    let raw: HashMap<String, RawSegment> = serde_json::from_str(&content)
        .map_err(|e| EngineError::Load(format!("failed to parse {path}: {e}")))?;

    let mut segments = HashMap::with_capacity(raw.len());
    for (id, seg) in raw {
        let points = seg
            .points
            .iter()
            .map(|[lon, lat]| LatLng::new(*lat, *lon))
            .collect();
        segments.insert(id, RouteSegment::new(seg.from, seg.to, points));
    }
    Ok(segments)
}

fn load_schedules(dir: &str) -> Result<HashMap<String, TrainSchedule>, EngineError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| EngineError::Load(format!("failed to read schedules dir {dir}: {e}")))?;

    let mut schedules = HashMap::new();
    let mut skipped = 0;
    for entry in entries {
        let entry =
            entry.map_err(|e| EngineError::Load(format!("failed to list {dir}: {e}")))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        // Train number comes from the file name, as in the source data set.
        let number = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_string(),
            None => continue,
        };

        let content = fs::read_to_string(&path).map_err(|e| {
            EngineError::Load(format!("failed to read {}: {e}", path.display()))
        })?;
        let raw: RawScheduleFile = serde_json::from_str(&content).map_err(|e| {
            EngineError::Load(format!("failed to parse {}: {e}", path.display()))
        })?;

        match schedule_from_raw(number.clone(), raw.data) {
            Ok(schedule) => {
                schedules.insert(number, schedule);
            }
            Err(reason) => {
                warn!(number = %number, reason = %reason, "schedule skipped");
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        warn!(skipped, "schedules skipped");
    }
    Ok(schedules)
}

fn load_route_mappings(path: &str) -> Result<HashMap<String, Vec<String>>, EngineError> {
    if !Path::new(path).exists() {
        warn!(path, "route mapping file not found");
        return Ok(HashMap::new());
    }
    let content = fs::read_to_string(path)
        .map_err(|e| EngineError::Load(format!("failed to read {path}: {e}")))?;
    serde_json::from_str(&content)
        .map_err(|e| EngineError::Load(format!("failed to parse {path}: {e}")))
}

fn schedule_from_raw(number: String, raw: RawScheduleData) -> Result<TrainSchedule, String> {
    let name = raw.train_name.unwrap_or_else(|| number.clone());
    let operating_days = parse_days(&raw.days);

    let mut stops = Vec::with_capacity(raw.routes.len());
    for stop in raw.routes {
        let arrival = stop.arrival_time.as_deref().and_then(parse_clock);
        let departure = stop.departure_time.as_deref().and_then(parse_clock);
        if arrival.is_none() && departure.is_none() {
            // Stops without any usable time carry no tracking information.
            continue;
        }
        stops.push(StopTimes {
            station: stop.city,
            arrival,
            departure,
            halt_minutes: stop.halt.as_deref().and_then(parse_halt),
        });
    }

    TrainSchedule::new(number, name, operating_days, stops)
}

/// Parses clock strings of the source data set, e.g. "11:30 am BST".
/// Placeholder values ("---", empty) map to None.
pub fn parse_clock(raw: &str) -> Option<NaiveTime> {
    let trimmed = raw.trim().trim_end_matches(" BST").trim();
    if trimmed.is_empty() || trimmed == "---" {
        return None;
    }
    NaiveTime::parse_from_str(&trimmed.to_uppercase(), "%I:%M %p").ok()
}

fn parse_halt(raw: &str) -> Option<u32> {
    let digits: String = raw.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn parse_days(days: &[String]) -> Vec<Weekday> {
    let mut parsed = Vec::with_capacity(days.len());
    for day in days {
        match day.parse::<Weekday>() {
            Ok(weekday) => parsed.push(weekday),
            Err(_) => warn!(day = %day, "unrecognized operating day ignored"),
        }
    }
    parsed
}
