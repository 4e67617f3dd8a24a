use chrono::{Duration, NaiveDateTime, NaiveTime, Weekday};

/// One scheduled call on a train's route. Offsets are minutes since the
/// origin departure and are what the engine orders and classifies by;
/// clock times are kept for display only. Overnight runs get a +24 h wrap
/// applied during construction, so offsets are strictly increasing.
#[derive(Debug, Clone)]
pub struct ScheduledStop {
    pub station: String,
    pub arrival: Option<NaiveTime>,
    pub departure: Option<NaiveTime>,
    pub halt_minutes: u32,
    pub arrival_offset: Option<i64>,
    pub departure_offset: Option<i64>,
}

impl ScheduledStop {
    /// Offset that decides whether this stop is behind the train: the
    /// departure, or the arrival for the terminus.
    pub fn reference_offset(&self) -> i64 {
        self.departure_offset
            .or(self.arrival_offset)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct TrainSchedule {
    pub number: String,
    pub name: String,
    pub operating_days: Vec<Weekday>,
    pub stops: Vec<ScheduledStop>,
}

/// Raw per-stop input before offsets are computed.
#[derive(Debug, Clone)]
pub struct StopTimes {
    pub station: String,
    pub arrival: Option<NaiveTime>,
    pub departure: Option<NaiveTime>,
    pub halt_minutes: Option<u32>,
}

impl TrainSchedule {
    pub fn new(
        number: String,
        name: String,
        operating_days: Vec<Weekday>,
        stops: Vec<StopTimes>,
    ) -> Result<TrainSchedule, String> {
        if stops.len() < 2 {
            return Err(format!(
                "schedule {number} needs at least two stops, got {}",
                stops.len()
            ));
        }

        let origin_departure = match stops[0].departure {
            Some(t) => t,
            None => return Err(format!("schedule {number} origin has no departure time")),
        };

        let last = stops.len() - 1;
        let origin_abs = minutes_of_day(origin_departure);
        let mut prev_abs = origin_abs;
        let mut day_offset: i64 = 0;
        let mut built = Vec::with_capacity(stops.len());

        for (i, stop) in stops.into_iter().enumerate() {
            // Origin keeps no arrival, terminus keeps no departure.
            let arrival = if i == 0 { None } else { stop.arrival };
            let departure = if i == last { None } else { stop.departure };

            if arrival.is_none() && departure.is_none() {
                return Err(format!(
                    "schedule {number} stop {} has no usable times",
                    stop.station
                ));
            }

            let arrival_offset = arrival.map(|t| {
                let abs = wrap_forward(minutes_of_day(t), &mut prev_abs, &mut day_offset);
                abs - origin_abs
            });
            let departure_offset = departure.map(|t| {
                let abs = wrap_forward(minutes_of_day(t), &mut prev_abs, &mut day_offset);
                abs - origin_abs
            });

            let halt_minutes = match (arrival_offset, departure_offset) {
                (Some(a), Some(d)) => (d - a).max(0) as u32,
                _ => stop.halt_minutes.unwrap_or(0),
            };

            built.push(ScheduledStop {
                station: stop.station,
                arrival,
                departure,
                halt_minutes,
                arrival_offset,
                departure_offset,
            });
        }

        for pair in built.windows(2) {
            let next_start = pair[1].arrival_offset.or(pair[1].departure_offset).unwrap_or(0);
            if next_start <= pair[0].reference_offset() {
                return Err(format!(
                    "schedule {number} stops are not in increasing time order at {}",
                    pair[1].station
                ));
            }
        }

        Ok(TrainSchedule {
            number,
            name,
            operating_days,
            stops: built,
        })
    }

    pub fn origin(&self) -> &ScheduledStop {
        &self.stops[0]
    }

    pub fn terminus(&self) -> &ScheduledStop {
        &self.stops[self.stops.len() - 1]
    }

    /// Scheduled end-to-end duration in minutes.
    pub fn total_duration_minutes(&self) -> i64 {
        self.terminus().arrival_offset.unwrap_or(0)
    }

    /// An empty operating-day list means the train runs every day.
    pub fn runs_on(&self, day: Weekday) -> bool {
        self.operating_days.is_empty() || self.operating_days.contains(&day)
    }

    /// Departure instant of the run that `now` belongs to. Normally
    /// today's origin departure; when `now` sits before it but inside the
    /// run window of a departure on the previous day (an overnight run
    /// queried after midnight), yesterday's.
    pub fn run_anchor(&self, now: NaiveDateTime) -> NaiveDateTime {
        let departure = self.origin().departure.unwrap_or(NaiveTime::MIN);
        let today = now.date().and_time(departure);
        let minutes = now.signed_duration_since(today).num_seconds() as f64 / 60.0;
        if minutes < 0.0 && minutes + 1440.0 <= self.total_duration_minutes() as f64 {
            today - Duration::days(1)
        } else {
            today
        }
    }
}

fn minutes_of_day(t: NaiveTime) -> i64 {
    use chrono::Timelike;
    (t.hour() as i64) * 60 + t.minute() as i64
}

fn wrap_forward(mod_minutes: i64, prev_abs: &mut i64, day_offset: &mut i64) -> i64 {
    let mut abs = *day_offset * 1440 + mod_minutes;
    if abs < *prev_abs {
        *day_offset += 1;
        abs += 1440;
    }
    *prev_abs = abs;
    abs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn stop(
        station: &str,
        arrival: Option<NaiveTime>,
        departure: Option<NaiveTime>,
    ) -> StopTimes {
        StopTimes {
            station: station.to_string(),
            arrival,
            departure,
            halt_minutes: None,
        }
    }

    fn sample() -> TrainSchedule {
        TrainSchedule::new(
            "735".to_string(),
            "Agnibina Express".to_string(),
            vec![],
            vec![
                stop("Dhaka", None, Some(t(11, 30))),
                stop("Tangail", Some(t(13, 0)), Some(t(13, 5))),
                stop("Tarakandi", Some(t(17, 0)), None),
            ],
        )
        .unwrap()
    }

    #[test]
    fn offsets_are_relative_to_origin_departure() {
        let s = sample();
        assert_eq!(s.stops[0].departure_offset, Some(0));
        assert_eq!(s.stops[1].arrival_offset, Some(90));
        assert_eq!(s.stops[1].departure_offset, Some(95));
        assert_eq!(s.stops[2].arrival_offset, Some(330));
        assert_eq!(s.total_duration_minutes(), 330);
    }

    #[test]
    fn halt_is_derived_from_arrival_and_departure() {
        let s = sample();
        assert_eq!(s.stops[1].halt_minutes, 5);
    }

    #[test]
    fn origin_and_terminus_are_normalized() {
        let s = TrainSchedule::new(
            "1".to_string(),
            "Test".to_string(),
            vec![],
            vec![
                stop("A", Some(t(9, 0)), Some(t(9, 30))),
                stop("B", Some(t(11, 0)), Some(t(11, 10))),
            ],
        )
        .unwrap();
        assert!(s.origin().arrival.is_none());
        assert!(s.terminus().departure.is_none());
    }

    #[test]
    fn overnight_run_wraps_past_midnight() {
        let s = TrainSchedule::new(
            "66".to_string(),
            "Night Mail".to_string(),
            vec![],
            vec![
                stop("A", None, Some(t(23, 0))),
                stop("B", Some(t(23, 50)), Some(t(23, 55))),
                stop("C", Some(t(1, 30)), None),
            ],
        )
        .unwrap();
        assert_eq!(s.stops[2].arrival_offset, Some(150));
    }

    #[test]
    fn run_anchor_reaches_back_across_midnight() {
        let s = TrainSchedule::new(
            "66".to_string(),
            "Night Mail".to_string(),
            vec![],
            vec![
                stop("A", None, Some(t(23, 0))),
                stop("B", Some(t(1, 30)), None),
            ],
        )
        .unwrap();
        let date = |d: u32, h: u32, m: u32| {
            chrono::NaiveDate::from_ymd_opt(2025, 6, d)
                .unwrap()
                .and_hms_opt(h, m, 0)
                .unwrap()
        };

        // 00:30 belongs to the run that left at 23:00 the day before.
        assert_eq!(s.run_anchor(date(11, 0, 30)), date(10, 23, 0));
        // 22:00 is before today's departure, not part of any earlier run.
        assert_eq!(s.run_anchor(date(11, 22, 0)), date(11, 23, 0));
    }

    #[test]
    fn run_anchor_stays_on_today_for_daytime_runs() {
        let s = sample();
        let date = |d: u32, h: u32, m: u32| {
            chrono::NaiveDate::from_ymd_opt(2025, 6, d)
                .unwrap()
                .and_hms_opt(h, m, 0)
                .unwrap()
        };
        assert_eq!(s.run_anchor(date(10, 10, 0)), date(10, 11, 30));
        assert_eq!(s.run_anchor(date(10, 16, 0)), date(10, 11, 30));
    }

    #[test]
    fn out_of_order_stops_are_rejected() {
        let result = TrainSchedule::new(
            "9".to_string(),
            "Broken".to_string(),
            vec![],
            vec![
                stop("A", None, Some(t(10, 0))),
                stop("B", Some(t(10, 0)), Some(t(10, 0))),
                stop("C", Some(t(12, 0)), None),
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn single_stop_schedule_is_rejected() {
        let result = TrainSchedule::new(
            "9".to_string(),
            "Broken".to_string(),
            vec![],
            vec![stop("A", None, Some(t(10, 0)))],
        );
        assert!(result.is_err());
    }

    #[test]
    fn empty_operating_days_means_daily() {
        let s = sample();
        assert!(s.runs_on(Weekday::Mon));
        let weekend_only = TrainSchedule::new(
            "7".to_string(),
            "Weekender".to_string(),
            vec![Weekday::Sat, Weekday::Sun],
            vec![
                stop("A", None, Some(t(8, 0))),
                stop("B", Some(t(9, 0)), None),
            ],
        )
        .unwrap();
        assert!(weekend_only.runs_on(Weekday::Sun));
        assert!(!weekend_only.runs_on(Weekday::Wed));
    }
}
