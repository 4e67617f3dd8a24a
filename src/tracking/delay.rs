use std::hash::{DefaultHasher, Hash, Hasher};

use chrono::{NaiveDateTime, Timelike};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::structures::DelayConfig;

/// Simulated delay for one train at one station. Minutes are always
/// within [0, max_delay_minutes].
#[derive(Debug, Clone)]
pub struct DelayEstimate {
    pub minutes: u32,
    pub weather: String,
    pub degraded: bool,
}

/// Multi-factor stochastic delay model, used when no live position signal
/// exists. Stateless apart from its optional seed: every call builds its
/// own RNG, keyed by (train, station, seed), so a seeded simulator is
/// fully reproducible and concurrent callers never share RNG state.
pub struct DelaySimulator {
    config: DelayConfig,
    seed: Option<u64>,
}

impl DelaySimulator {
    pub fn new(config: DelayConfig) -> DelaySimulator {
        DelaySimulator { config, seed: None }
    }

    pub fn with_seed(config: DelayConfig, seed: u64) -> DelaySimulator {
        DelaySimulator {
            config,
            seed: Some(seed),
        }
    }

    pub fn estimate(&self, train_number: &str, station: &str, at: NaiveDateTime) -> DelayEstimate {
        let mut rng = self.rng(train_number, station);
        let mut degraded = false;

        let baseline = if rng.random::<f64>() < self.config.base_probability {
            rng.random_range(self.config.base_delay_min..=self.config.base_delay_max)
        } else {
            0
        };

        let weather = pick_weather(&mut rng, at.hour());
        let weather_factor = match self.config.weather_factors.get(weather) {
            Some(factor) => *factor,
            None => {
                warn!(weather, "no factor configured for weather condition");
                degraded = true;
                1.0
            }
        };

        let time_factor = self.time_factor(at.hour());
        let station_factor = self.station_factor(station);

        let raw = baseline as f64 * weather_factor * time_factor * station_factor;
        let minutes = (raw.floor().max(0.0) as u32).min(self.config.max_delay_minutes);

        DelayEstimate {
            minutes,
            weather: weather.to_string(),
            degraded,
        }
    }

    /// Ambient weather condition attributed to a whole status request.
    pub fn weather_condition(&self, at: NaiveDateTime) -> String {
        let mut rng = self.rng("weather", "");
        pick_weather(&mut rng, at.hour()).to_string()
    }

    fn time_factor(&self, hour: u32) -> f64 {
        if (8..10).contains(&hour) || (17..20).contains(&hour) {
            self.config.rush_hour_factor
        } else if hour >= 22 || hour < 5 {
            self.config.night_factor
        } else {
            1.0
        }
    }

    fn station_factor(&self, station: &str) -> f64 {
        let station_lower = station.to_lowercase();
        self.config
            .station_factors
            .iter()
            .find(|(name, _)| station_lower.contains(&name.to_lowercase()))
            .map(|(_, factor)| *factor)
            .unwrap_or(1.0)
    }

    fn rng(&self, train_number: &str, station: &str) -> SmallRng {
        match self.seed {
            Some(seed) => {
                let mut hasher = DefaultHasher::new();
                train_number.hash(&mut hasher);
                station.hash(&mut hasher);
                SmallRng::seed_from_u64(hasher.finish() ^ seed)
            }
            None => SmallRng::from_os_rng(),
        }
    }
}

/// Weighted draw matching observed frequency: mostly clear, sometimes
/// cloudy, occasionally rainy by day and foggy by night.
fn pick_weather(rng: &mut SmallRng, hour: u32) -> &'static str {
    let daytime = (6..=18).contains(&hour);
    let (conditions, weights): (&[&str], &[f64]) = if daytime {
        (&["clear", "cloudy", "rainy"], &[0.6, 0.3, 0.1])
    } else {
        (&["clear", "cloudy", "foggy"], &[0.7, 0.2, 0.1])
    };

    let roll = rng.random::<f64>();
    let mut cumulative = 0.0;
    for (condition, weight) in conditions.iter().zip(weights) {
        cumulative += weight;
        if roll < cumulative {
            return condition;
        }
    }
    conditions[conditions.len() - 1]
}
