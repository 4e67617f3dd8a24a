use std::sync::Arc;

use async_graphql::SimpleObject;
use chrono::{Datelike, Duration, NaiveDateTime};
use tracing::warn;

use crate::error::EngineError;
use crate::services::{CrowdData, CrowdStore, DataStore};
use crate::structures::{Snapshot, StationStatus, StationStatusInfo, TrainStatus};
use crate::tracking::delay::DelaySimulator;
use crate::tracking::position::{self, SpeedSample};

/// Static description of a train, independent of the current instant.
#[derive(Debug, SimpleObject, Clone)]
pub struct TrainSummary {
    pub train_number: String,
    pub train_name: String,
    pub operating_days: Vec<String>,
    pub total_stations: u64,
    pub origin: String,
    pub destination: String,
    pub total_distance_km: f64,
    pub departure_time: Option<String>,
    pub arrival_time: Option<String>,
    pub crowd: CrowdData,
}

/// Orchestrates the data store, delay simulator, position calculator and
/// crowd store into one status timeline per request. Owns no state of its
/// own; everything is recomputed from a single snapshot per call.
pub struct TimelineGenerator {
    data: Arc<DataStore>,
    crowd: Arc<CrowdStore>,
    delays: Arc<DelaySimulator>,
}

impl TimelineGenerator {
    pub fn new(
        data: Arc<DataStore>,
        crowd: Arc<CrowdStore>,
        delays: Arc<DelaySimulator>,
    ) -> TimelineGenerator {
        TimelineGenerator {
            data,
            crowd,
            delays,
        }
    }

    pub fn build_status(
        &self,
        train_number: &str,
        now: NaiveDateTime,
    ) -> Result<TrainStatus, EngineError> {
        let snapshot = self.data.snapshot()?;
        build_timeline(&snapshot, &self.crowd, &self.delays, train_number, now, None)
    }

    pub fn train_summary(
        &self,
        train_number: &str,
        now: NaiveDateTime,
    ) -> Result<TrainSummary, EngineError> {
        let snapshot = self.data.snapshot()?;
        summarize(&snapshot, &self.crowd, train_number, now)
    }
}

/// Assembles the full status timeline for one train against one snapshot.
pub fn build_timeline(
    snapshot: &Snapshot,
    crowd: &CrowdStore,
    delays: &DelaySimulator,
    train_number: &str,
    now: NaiveDateTime,
    previous: Option<&SpeedSample>,
) -> Result<TrainStatus, EngineError> {
    let schedule = snapshot
        .schedule(train_number)
        .ok_or_else(|| EngineError::NotFound(train_number.to_string()))?;

    let anchor = schedule.run_anchor(now);
    let minutes_now = now.signed_duration_since(anchor).num_seconds() as f64 / 60.0;

    let (cumulative, mut degraded) = position::cumulative_distances(snapshot, schedule);
    let total_km = *cumulative.last().unwrap_or(&0.0);

    // Per-stop delay estimates and adjusted times.
    let mut delay_minutes = Vec::with_capacity(schedule.stops.len());
    for stop in &schedule.stops {
        let scheduled = anchor + Duration::minutes(stop.reference_offset());
        let estimate = delays.estimate(train_number, &stop.station, scheduled);
        degraded |= estimate.degraded;
        delay_minutes.push(estimate.minutes);
    }

    // The run is over once the terminus's delay-adjusted arrival has been
    // reached; at exact equality the timeline counts as fully completed.
    let terminus_idx = schedule.stops.len() - 1;
    let terminus_done_at = schedule.stops[terminus_idx].reference_offset() as f64
        + delay_minutes[terminus_idx] as f64;
    let all_completed = minutes_now >= terminus_done_at;

    // First stop whose delay-adjusted departure (arrival, for the
    // terminus) has not strictly passed is Current; strictness makes the
    // earlier-in-route stop win exact ties.
    let current_idx = if all_completed {
        None
    } else {
        schedule.stops.iter().enumerate().position(|(i, stop)| {
            stop.reference_offset() as f64 + delay_minutes[i] as f64 >= minutes_now
        })
    };

    let crowd_level = crowd.crowd_level(train_number, now);
    let mut stations = Vec::with_capacity(schedule.stops.len());
    for (i, stop) in schedule.stops.iter().enumerate() {
        let status = match current_idx {
            None => StationStatus::Completed,
            Some(current) if i < current => StationStatus::Completed,
            Some(current) if i == current => StationStatus::Current,
            Some(current) if i == current + 1 => StationStatus::Next,
            Some(_) => StationStatus::Upcoming,
        };

        let scheduled_arrival = stop.arrival_offset.map(|o| anchor + Duration::minutes(o));
        let scheduled_departure = stop.departure_offset.map(|o| anchor + Duration::minutes(o));
        let delay = Duration::minutes(delay_minutes[i] as i64);

        stations.push(StationStatusInfo {
            station_name: stop.station.clone(),
            status,
            scheduled_arrival,
            scheduled_departure,
            actual_arrival: scheduled_arrival.map(|t| t + delay),
            actual_departure: scheduled_departure.map(|t| t + delay),
            delay_minutes: delay_minutes[i],
            halt_minutes: stop.halt_minutes,
            distance_from_start_km: cumulative[i],
            crowd_level,
        });
    }

    let pos = position::train_position(snapshot, schedule, now, previous);
    degraded |= pos.degraded;

    let next_idx = current_idx.map(|c| c + 1).filter(|&n| n < stations.len());
    let (estimated_arrival, eta_minutes) = match next_idx {
        Some(n) => {
            let arrival = stations[n]
                .actual_arrival
                .or(stations[n].actual_departure);
            let eta = arrival
                .map(|a| a.signed_duration_since(now).num_minutes().max(0));
            (arrival, eta)
        }
        None => (None, None),
    };

    let progress_percent = if all_completed {
        100.0
    } else if total_km > 0.0 {
        (pos.distance_covered_km / total_km * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    if degraded {
        warn!(train_number, "status computed with degraded estimates");
    }

    Ok(TrainStatus {
        train_number: train_number.to_string(),
        train_name: schedule.name.clone(),
        // The run's day is the departure day, not necessarily `now`'s.
        runs_today: schedule.runs_on(anchor.date().weekday()),
        current_station: current_idx.map(|i| schedule.stops[i].station.clone()),
        next_station: next_idx.map(|i| schedule.stops[i].station.clone()),
        current_speed_kmh: pos.speed_kmh,
        position: pos.location,
        distance_covered_km: if all_completed {
            total_km
        } else {
            pos.distance_covered_km
        },
        distance_to_next_km: if all_completed {
            0.0
        } else {
            pos.distance_to_next_km
        },
        delay_minutes: delay_minutes.iter().copied().max().unwrap_or(0),
        estimated_arrival,
        eta_minutes,
        progress_percent,
        crowd_level,
        weather_condition: delays.weather_condition(now),
        degraded,
        stations,
        last_updated: now,
    })
}

pub fn summarize(
    snapshot: &Snapshot,
    crowd: &CrowdStore,
    train_number: &str,
    now: NaiveDateTime,
) -> Result<TrainSummary, EngineError> {
    let schedule = snapshot
        .schedule(train_number)
        .ok_or_else(|| EngineError::NotFound(train_number.to_string()))?;
    let (cumulative, _) = position::cumulative_distances(snapshot, schedule);

    Ok(TrainSummary {
        train_number: schedule.number.clone(),
        train_name: schedule.name.clone(),
        operating_days: schedule
            .operating_days
            .iter()
            .map(|d| d.to_string())
            .collect(),
        total_stations: schedule.stops.len() as u64,
        origin: schedule.origin().station.clone(),
        destination: schedule.terminus().station.clone(),
        total_distance_km: *cumulative.last().unwrap_or(&0.0),
        departure_time: schedule
            .origin()
            .departure
            .map(|t| t.format("%H:%M").to_string()),
        arrival_time: schedule
            .terminus()
            .arrival
            .map(|t| t.format("%H:%M").to_string()),
        crowd: crowd.crowd_data(train_number, now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::{CrowdConfig, DelayConfig, LatLng, Station, StopTimes, TrainSchedule};
    use chrono::{NaiveDate, NaiveTime};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn snapshot() -> Snapshot {
        let mut snapshot = Snapshot::default();
        for (name, lat, lng) in [
            ("Dhaka", 23.8103, 90.4125),
            ("Tangail", 24.2513, 89.9167),
            ("Tarakandi", 24.7471, 89.8060),
        ] {
            snapshot.stations.insert(
                name.to_string(),
                Station {
                    name: name.to_string(),
                    lat_lng: LatLng::new(lat, lng),
                },
            );
        }
        let schedule = TrainSchedule::new(
            "735".to_string(),
            "Agnibina Express".to_string(),
            vec![],
            vec![
                StopTimes {
                    station: "Dhaka".to_string(),
                    arrival: None,
                    departure: Some(t(11, 30)),
                    halt_minutes: None,
                },
                StopTimes {
                    station: "Tangail".to_string(),
                    arrival: Some(t(13, 0)),
                    departure: Some(t(13, 5)),
                    halt_minutes: None,
                },
                StopTimes {
                    station: "Tarakandi".to_string(),
                    arrival: Some(t(17, 0)),
                    departure: None,
                    halt_minutes: None,
                },
            ],
        )
        .unwrap();
        snapshot.schedules.insert("735".to_string(), schedule);
        snapshot
    }

    fn crowd() -> CrowdStore {
        CrowdStore::new(CrowdConfig::default())
    }

    fn seeded_delays() -> DelaySimulator {
        DelaySimulator::with_seed(DelayConfig::default(), 42)
    }

    fn no_delays() -> DelaySimulator {
        DelaySimulator::with_seed(
            DelayConfig {
                base_probability: 0.0,
                ..DelayConfig::default()
            },
            42,
        )
    }

    fn assert_status_partition(status: &TrainStatus) {
        let order = |s: StationStatus| match s {
            StationStatus::Completed => 0,
            StationStatus::Current => 1,
            StationStatus::Next => 2,
            StationStatus::Upcoming => 3,
        };
        for pair in status.stations.windows(2) {
            assert!(
                order(pair[0].status) <= order(pair[1].status),
                "statuses out of order: {:?} then {:?}",
                pair[0].status,
                pair[1].status
            );
        }
        let currents = status
            .stations
            .iter()
            .filter(|s| s.status == StationStatus::Current)
            .count();
        let nexts = status
            .stations
            .iter()
            .filter(|s| s.status == StationStatus::Next)
            .count();
        let all_completed = status
            .stations
            .iter()
            .all(|s| s.status == StationStatus::Completed);
        assert!(nexts <= 1);
        assert!(currents == 1 || all_completed);
    }

    #[test]
    fn unknown_train_is_not_found() {
        let snap = snapshot();
        let result = build_timeline(&snap, &crowd(), &seeded_delays(), "999", at(13, 0), None);
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[test]
    fn midway_classification_matches_the_scenario() {
        // 13:02: departed Dhaka, halted at Tangail, Tarakandi ahead. The
        // 90-minute delay cap cannot push Dhaka's 11:30 departure past
        // 13:02, so this classification holds for any seed.
        let snap = snapshot();
        let status =
            build_timeline(&snap, &crowd(), &seeded_delays(), "735", at(13, 2), None).unwrap();

        assert_eq!(status.stations[0].status, StationStatus::Completed);
        assert_eq!(status.stations[1].status, StationStatus::Current);
        assert_eq!(status.stations[2].status, StationStatus::Next);
        assert_eq!(status.current_station.as_deref(), Some("Tangail"));
        assert_eq!(status.next_station.as_deref(), Some("Tarakandi"));
        assert_status_partition(&status);

        // Halted at the platform.
        assert_eq!(status.current_speed_kmh, 0.0);

        // ETA tracks Tarakandi's delay-adjusted arrival: 3 h 58 m from
        // now, plus whatever delay the seed produced there.
        let tarakandi_delay = status.stations[2].delay_minutes as i64;
        assert_eq!(status.eta_minutes, Some(238 + tarakandi_delay));
    }

    #[test]
    fn now_at_terminus_arrival_completes_the_run() {
        let snap = snapshot();
        let status =
            build_timeline(&snap, &crowd(), &no_delays(), "735", at(17, 0), None).unwrap();
        assert!(status
            .stations
            .iter()
            .all(|s| s.status == StationStatus::Completed));
        assert_eq!(status.progress_percent, 100.0);
        assert_eq!(status.eta_minutes, None);
        assert_eq!(status.distance_to_next_km, 0.0);
        assert_status_partition(&status);
    }

    #[test]
    fn before_departure_origin_is_current() {
        let snap = snapshot();
        let status =
            build_timeline(&snap, &crowd(), &no_delays(), "735", at(10, 0), None).unwrap();
        assert_eq!(status.stations[0].status, StationStatus::Current);
        assert_eq!(status.stations[1].status, StationStatus::Next);
        assert_eq!(status.stations[2].status, StationStatus::Upcoming);
        assert_eq!(status.progress_percent, 0.0);
        assert_status_partition(&status);
    }

    #[test]
    fn statuses_stay_monotonic_across_the_whole_day() {
        let snap = snapshot();
        let delays = seeded_delays();
        let crowd = crowd();
        for hour in 0..24 {
            for minute in [0, 17, 31, 48] {
                let status =
                    build_timeline(&snap, &crowd, &delays, "735", at(hour, minute), None)
                        .unwrap();
                assert_status_partition(&status);
                assert!(status.progress_percent >= 0.0 && status.progress_percent <= 100.0);
            }
        }
    }

    #[test]
    fn exact_tie_keeps_the_earlier_stop_current() {
        // With zero delays, 13:05 equals Tangail's adjusted departure
        // exactly; the strict comparison keeps Tangail current.
        let snap = snapshot();
        let status =
            build_timeline(&snap, &crowd(), &no_delays(), "735", at(13, 5), None).unwrap();
        assert_eq!(status.stations[1].status, StationStatus::Current);
        assert_eq!(status.stations[2].status, StationStatus::Next);
    }

    #[test]
    fn overnight_run_classifies_after_midnight() {
        let mut snap = Snapshot::default();
        for (name, lat, lng) in [
            ("Dhaka", 23.8103, 90.4125),
            ("Tangail", 24.2513, 89.9167),
            ("Tarakandi", 24.7471, 89.8060),
        ] {
            snap.stations.insert(
                name.to_string(),
                Station {
                    name: name.to_string(),
                    lat_lng: LatLng::new(lat, lng),
                },
            );
        }
        let schedule = TrainSchedule::new(
            "66".to_string(),
            "Night Mail".to_string(),
            vec![],
            vec![
                StopTimes {
                    station: "Dhaka".to_string(),
                    arrival: None,
                    departure: Some(t(23, 0)),
                    halt_minutes: None,
                },
                StopTimes {
                    station: "Tangail".to_string(),
                    arrival: Some(t(23, 50)),
                    departure: Some(t(23, 55)),
                    halt_minutes: None,
                },
                StopTimes {
                    station: "Tarakandi".to_string(),
                    arrival: Some(t(1, 30)),
                    departure: None,
                    halt_minutes: None,
                },
            ],
        )
        .unwrap();
        snap.schedules.insert("66".to_string(), schedule);

        let after_midnight = NaiveDate::from_ymd_opt(2025, 6, 11)
            .unwrap()
            .and_hms_opt(0, 30, 0)
            .unwrap();
        let status =
            build_timeline(&snap, &crowd(), &no_delays(), "66", after_midnight, None).unwrap();

        assert_eq!(status.stations[0].status, StationStatus::Completed);
        assert_eq!(status.stations[1].status, StationStatus::Completed);
        assert_eq!(status.stations[2].status, StationStatus::Current);
        assert!(status.progress_percent > 0.0 && status.progress_percent < 100.0);
        assert!(status.distance_covered_km > 0.0);
        assert_status_partition(&status);
    }

    #[test]
    fn operating_days_are_reported_not_enforced() {
        use chrono::Weekday;

        let mut snap = snapshot();
        let weekender = TrainSchedule::new(
            "21".to_string(),
            "Weekender".to_string(),
            vec![Weekday::Sat, Weekday::Sun],
            vec![
                StopTimes {
                    station: "Dhaka".to_string(),
                    arrival: None,
                    departure: Some(t(11, 30)),
                    halt_minutes: None,
                },
                StopTimes {
                    station: "Tangail".to_string(),
                    arrival: Some(t(13, 0)),
                    departure: None,
                    halt_minutes: None,
                },
            ],
        )
        .unwrap();
        snap.schedules.insert("21".to_string(), weekender);

        // 2025-06-10 is a Tuesday.
        let off_day = build_timeline(&snap, &crowd(), &no_delays(), "21", at(12, 0), None).unwrap();
        assert!(!off_day.runs_today);
        assert_eq!(off_day.stations[1].status, StationStatus::Current);

        let daily = build_timeline(&snap, &crowd(), &no_delays(), "735", at(12, 0), None).unwrap();
        assert!(daily.runs_today);
    }

    #[test]
    fn crowd_level_is_reported_but_does_not_reclassify() {
        let snap = snapshot();
        let crowd = crowd();
        let delays = seeded_delays();
        let before = build_timeline(&snap, &crowd, &delays, "735", at(13, 2), None).unwrap();

        for user in ["u1", "u2", "u3", "u4", "u5", "u6"] {
            crowd
                .confirm("735", user, "Tangail", LatLng::new(24.25, 89.92), at(13, 0))
                .unwrap();
        }
        let after = build_timeline(&snap, &crowd, &delays, "735", at(13, 2), None).unwrap();

        assert_ne!(before.crowd_level, after.crowd_level);
        let statuses =
            |s: &TrainStatus| s.stations.iter().map(|x| x.status).collect::<Vec<_>>();
        assert_eq!(statuses(&before), statuses(&after));
        assert_eq!(before.eta_minutes, after.eta_minutes);
    }

    #[test]
    fn delays_are_bounded_and_reported_per_station() {
        let snap = snapshot();
        let status =
            build_timeline(&snap, &crowd(), &seeded_delays(), "735", at(13, 2), None).unwrap();
        for info in &status.stations {
            assert!(info.delay_minutes <= 90);
            if let (Some(scheduled), Some(actual)) =
                (info.scheduled_arrival, info.actual_arrival)
            {
                assert_eq!(
                    actual,
                    scheduled + Duration::minutes(info.delay_minutes as i64)
                );
            }
        }
        assert_eq!(
            status.delay_minutes,
            status
                .stations
                .iter()
                .map(|s| s.delay_minutes)
                .max()
                .unwrap()
        );
    }

    #[test]
    fn summary_describes_the_route() {
        let snap = snapshot();
        let summary = summarize(&snap, &crowd(), "735", at(13, 0)).unwrap();
        assert_eq!(summary.origin, "Dhaka");
        assert_eq!(summary.destination, "Tarakandi");
        assert_eq!(summary.total_stations, 3);
        assert!(summary.total_distance_km > 100.0);
        assert_eq!(summary.departure_time.as_deref(), Some("11:30"));
        assert_eq!(summary.arrival_time.as_deref(), Some("17:00"));
    }
}
