use chrono::NaiveDateTime;

use crate::structures::{LatLng, Snapshot, TrainSchedule};

/// Point-in-time location estimate along a train's route.
#[derive(Debug, Clone, Copy)]
pub struct PositionInfo {
    pub distance_covered_km: f64,
    pub distance_to_next_km: f64,
    pub speed_kmh: f64,
    /// Index of the leg (segment between consecutive stops) the train is
    /// currently on.
    pub segment_index: usize,
    /// Map coordinates, when the involved stations are known.
    pub location: Option<LatLng>,
    pub degraded: bool,
}

/// Result of an earlier evaluation, used to derive speed from the change
/// in distance covered. Without one, speed falls back to the leg's average
/// scheduled speed.
#[derive(Debug, Clone, Copy)]
pub struct SpeedSample {
    pub at: NaiveDateTime,
    pub distance_covered_km: f64,
}

/// Per-stop distances from the route origin, plus whether any leg length
/// had to fall back from polyline geometry.
pub fn cumulative_distances(snapshot: &Snapshot, schedule: &TrainSchedule) -> (Vec<f64>, bool) {
    let mut cumulative = Vec::with_capacity(schedule.stops.len());
    let mut degraded = false;
    let mut total = 0.0;

    cumulative.push(0.0);
    for pair in schedule.stops.windows(2) {
        let (km, leg_degraded) =
            snapshot.leg_distance_km(&schedule.number, &pair[0].station, &pair[1].station);
        total += km;
        degraded |= leg_degraded;
        cumulative.push(total);
    }
    (cumulative, degraded)
}

/// Locates the train's progress along its route at `now`.
///
/// The elapsed fraction of the current leg is measured between the
/// previous stop's departure and the next stop's arrival, so halts
/// contribute zero progress, and is projected onto the leg's length.
/// Pure computation over the snapshot; never blocks.
pub fn train_position(
    snapshot: &Snapshot,
    schedule: &TrainSchedule,
    now: NaiveDateTime,
    previous: Option<&SpeedSample>,
) -> PositionInfo {
    let (cumulative, degraded) = cumulative_distances(snapshot, schedule);
    let legs = schedule.stops.len() - 1;
    let total_km = cumulative[legs];

    let anchor = schedule.run_anchor(now);
    let minutes_now = now.signed_duration_since(anchor).num_seconds() as f64 / 60.0;

    // Not yet departed.
    if minutes_now <= 0.0 {
        return PositionInfo {
            distance_covered_km: 0.0,
            distance_to_next_km: cumulative[1],
            speed_kmh: 0.0,
            segment_index: 0,
            location: station_location(snapshot, &schedule.origin().station),
            degraded,
        };
    }

    // Run is over.
    if minutes_now >= schedule.total_duration_minutes() as f64 {
        return PositionInfo {
            distance_covered_km: total_km,
            distance_to_next_km: 0.0,
            speed_kmh: 0.0,
            segment_index: legs.saturating_sub(1),
            location: station_location(snapshot, &schedule.terminus().station),
            degraded,
        };
    }

    for i in 0..legs {
        let departed = schedule.stops[i].reference_offset() as f64;
        let next = &schedule.stops[i + 1];
        let arrives = next.arrival_offset.or(next.departure_offset).unwrap_or(0) as f64;

        if minutes_now < departed {
            // Dwelling at stop i; progress holds at the platform.
            return PositionInfo {
                distance_covered_km: cumulative[i],
                distance_to_next_km: cumulative[i + 1] - cumulative[i],
                speed_kmh: 0.0,
                segment_index: i,
                location: station_location(snapshot, &schedule.stops[i].station),
                degraded,
            };
        }

        if minutes_now < arrives {
            let leg_km = cumulative[i + 1] - cumulative[i];
            let leg_minutes = arrives - departed;
            let fraction = if leg_minutes > 0.0 {
                (minutes_now - departed) / leg_minutes
            } else {
                0.0
            };
            let covered = cumulative[i] + leg_km * fraction;

            let speed_kmh = match previous {
                Some(sample) if now > sample.at => {
                    let hours =
                        now.signed_duration_since(sample.at).num_seconds() as f64 / 3600.0;
                    ((covered - sample.distance_covered_km) / hours).max(0.0)
                }
                _ if leg_minutes > 0.0 => leg_km / (leg_minutes / 60.0),
                _ => 0.0,
            };

            let location = snapshot
                .leg_geometry(&schedule.number, &schedule.stops[i].station, &next.station)
                .and_then(|seg| seg.point_at_fraction(fraction))
                .or_else(|| {
                    let a = station_location(snapshot, &schedule.stops[i].station)?;
                    let b = station_location(snapshot, &next.station)?;
                    Some(LatLng::new(
                        a.latitude + (b.latitude - a.latitude) * fraction,
                        a.longitude + (b.longitude - a.longitude) * fraction,
                    ))
                });

            return PositionInfo {
                distance_covered_km: covered,
                distance_to_next_km: leg_km * (1.0 - fraction),
                speed_kmh,
                segment_index: i,
                location,
                degraded,
            };
        }
    }

    PositionInfo {
        distance_covered_km: total_km,
        distance_to_next_km: 0.0,
        speed_kmh: 0.0,
        segment_index: legs.saturating_sub(1),
        location: station_location(snapshot, &schedule.terminus().station),
        degraded,
    }
}

fn station_location(snapshot: &Snapshot, name: &str) -> Option<LatLng> {
    snapshot.station(name).map(|s| s.lat_lng)
}
