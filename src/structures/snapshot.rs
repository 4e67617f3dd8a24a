use std::collections::HashMap;

use async_graphql::SimpleObject;

use crate::structures::{RouteSegment, Station, TrainSchedule};

/// Immutable, consistent copy of all static reference data as of the last
/// successful load. Readers hold an `Arc<Snapshot>` for the whole request;
/// a refresh swaps the pointer and never mutates in place.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub stations: HashMap<String, Station>,
    pub segments: HashMap<String, RouteSegment>,
    pub schedules: HashMap<String, TrainSchedule>,
    /// Train number to the ordered segment ids covering its route.
    pub route_mappings: HashMap<String, Vec<String>>,
}

#[derive(Debug, SimpleObject, Clone, Copy, PartialEq, Eq)]
pub struct DataCounts {
    pub stations: u64,
    pub segments: u64,
    pub schedules: u64,
    pub route_mappings: u64,
}

impl Snapshot {
    pub fn counts(&self) -> DataCounts {
        DataCounts {
            stations: self.stations.len() as u64,
            segments: self.segments.len() as u64,
            schedules: self.schedules.len() as u64,
            route_mappings: self.route_mappings.len() as u64,
        }
    }

    pub fn schedule(&self, train_number: &str) -> Option<&TrainSchedule> {
        self.schedules.get(train_number)
    }

    pub fn station(&self, name: &str) -> Option<&Station> {
        self.stations.get(name)
    }

    /// Track geometry for the leg between two consecutive stations of a
    /// train's route, if the train is mapped to a segment covering it.
    pub fn leg_geometry(&self, train_number: &str, from: &str, to: &str) -> Option<&RouteSegment> {
        let mapped = self.route_mappings.get(train_number)?;
        mapped
            .iter()
            .filter_map(|id| self.segments.get(id))
            .find(|seg| seg.from_station == from && seg.to_station == to)
    }

    /// Leg length in kilometers. Prefers polyline geometry; falls back to
    /// the straight-line station distance, and to zero when a station is
    /// unknown. The flag reports whether a fallback was taken.
    pub fn leg_distance_km(&self, train_number: &str, from: &str, to: &str) -> (f64, bool) {
        if let Some(seg) = self.leg_geometry(train_number, from, to) {
            if seg.length_km > 0.0 {
                return (seg.length_km, false);
            }
        }

        match (self.station(from), self.station(to)) {
            (Some(a), Some(b)) => (a.lat_lng.dist_km(b.lat_lng), true),
            _ => (0.0, true),
        }
    }

    /// Trains whose number or display name contains the query,
    /// case-insensitively.
    pub fn search_by_number(&self, query: &str) -> Vec<&TrainSchedule> {
        let needle = query.to_lowercase();
        let mut found: Vec<&TrainSchedule> = self
            .schedules
            .values()
            .filter(|s| {
                s.number.to_lowercase().contains(&needle)
                    || s.name.to_lowercase().contains(&needle)
            })
            .collect();
        found.sort_by(|a, b| a.number.cmp(&b.number));
        found
    }

    /// Trains calling at a station, anywhere on their route.
    pub fn search_by_station(&self, station: &str) -> Vec<&TrainSchedule> {
        let mut found: Vec<&TrainSchedule> = self
            .schedules
            .values()
            .filter(|s| s.stops.iter().any(|stop| stop.station == station))
            .collect();
        found.sort_by(|a, b| a.number.cmp(&b.number));
        found
    }

    /// Trains calling at both stations, `from` before `to`.
    pub fn search_by_stations(&self, from: &str, to: &str) -> Vec<&TrainSchedule> {
        let mut found: Vec<&TrainSchedule> = self
            .schedules
            .values()
            .filter(|s| {
                let from_idx = s.stops.iter().position(|stop| stop.station == from);
                let to_idx = s.stops.iter().position(|stop| stop.station == to);
                matches!((from_idx, to_idx), (Some(f), Some(t)) if f < t)
            })
            .collect();
        found.sort_by(|a, b| a.number.cmp(&b.number));
        found
    }
}
