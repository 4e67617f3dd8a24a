use async_graphql::SimpleObject;
use chrono::{Duration, NaiveDateTime};
use dashmap::DashMap;
use tracing::info;

use crate::error::EngineError;
use crate::structures::{CrowdConfig, CrowdLevel, LatLng};

/// A user's presence claim for a train. At most one active confirmation is
/// counted per (train, user) pair; a newer one supersedes the older.
#[derive(Debug, Clone)]
pub struct CrowdConfirmation {
    pub train_number: String,
    pub user_id: String,
    pub station_name: String,
    pub lat_lng: LatLng,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Default)]
struct TrainValidations {
    confirmations: Vec<CrowdConfirmation>,
    total: u64,
}

#[derive(Debug, SimpleObject, Clone, Copy)]
pub struct CrowdData {
    pub total_confirmations: u64,
    pub active_confirmations: u64,
    pub crowd_level: CrowdLevel,
}

/// Concurrent per-train confirmation buckets. The map shards by train
/// number, so confirms for different trains do not contend, and the entry
/// lock serializes same-train writers, which makes overwrite-by-user
/// race-free.
pub struct CrowdStore {
    trains: DashMap<String, TrainValidations>,
    config: CrowdConfig,
}

impl CrowdStore {
    pub fn new(config: CrowdConfig) -> CrowdStore {
        CrowdStore {
            trains: DashMap::new(),
            config,
        }
    }

    pub fn confirm(
        &self,
        train_number: &str,
        user_id: &str,
        station_name: &str,
        lat_lng: LatLng,
        now: NaiveDateTime,
    ) -> Result<(), EngineError> {
        if user_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("user id is required".to_string()));
        }
        if station_name.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "station name is required".to_string(),
            ));
        }
        if !lat_lng.latitude.is_finite()
            || !lat_lng.longitude.is_finite()
            || lat_lng.latitude.abs() > 90.0
            || lat_lng.longitude.abs() > 180.0
        {
            return Err(EngineError::InvalidInput(format!(
                "malformed coordinates: {lat_lng}"
            )));
        }

        let mut bucket = self.trains.entry(train_number.to_string()).or_default();
        match bucket
            .confirmations
            .iter_mut()
            .find(|c| c.user_id == user_id)
        {
            Some(existing) => {
                existing.station_name = station_name.to_string();
                existing.lat_lng = lat_lng;
                existing.timestamp = now;
            }
            None => {
                bucket.confirmations.push(CrowdConfirmation {
                    train_number: train_number.to_string(),
                    user_id: user_id.to_string(),
                    station_name: station_name.to_string(),
                    lat_lng,
                    timestamp: now,
                });
                bucket.total += 1;

                if let Some(max) = self.config.max_per_train {
                    while bucket.confirmations.len() > max {
                        let oldest = bucket
                            .confirmations
                            .iter()
                            .enumerate()
                            .min_by_key(|(_, c)| c.timestamp)
                            .map(|(i, _)| i);
                        match oldest {
                            Some(i) => {
                                bucket.confirmations.remove(i);
                            }
                            None => break,
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Unexpired confirmations for a train, newest first, one per user.
    pub fn active_confirmations(
        &self,
        train_number: &str,
        now: NaiveDateTime,
    ) -> Vec<CrowdConfirmation> {
        let ttl = Duration::seconds(self.config.ttl_seconds);
        let mut active: Vec<CrowdConfirmation> = match self.trains.get(train_number) {
            Some(bucket) => bucket
                .confirmations
                .iter()
                .filter(|c| now.signed_duration_since(c.timestamp) < ttl)
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        active.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        active
    }

    pub fn crowd_level(&self, train_number: &str, now: NaiveDateTime) -> CrowdLevel {
        self.level_for(self.active_confirmations(train_number, now).len())
    }

    pub fn crowd_data(&self, train_number: &str, now: NaiveDateTime) -> CrowdData {
        let active = self.active_confirmations(train_number, now).len();
        let total = self
            .trains
            .get(train_number)
            .map(|bucket| bucket.total)
            .unwrap_or(0);
        CrowdData {
            total_confirmations: total,
            active_confirmations: active as u64,
            crowd_level: self.level_for(active),
        }
    }

    /// Drops expired confirmations to bound memory. Entries younger than
    /// the TTL are never removed, including ones with a timestamp ahead of
    /// `now`. Buckets survive even when fully expired: the lifetime total
    /// must keep answering after every confirmation has aged out.
    pub fn sweep(&self, now: NaiveDateTime) -> usize {
        let ttl = Duration::seconds(self.config.ttl_seconds);
        let mut removed = 0;

        for mut bucket in self.trains.iter_mut() {
            let before = bucket.confirmations.len();
            bucket
                .confirmations
                .retain(|c| now.signed_duration_since(c.timestamp) < ttl);
            removed += before - bucket.confirmations.len();
        }
        self.trains
            .retain(|_, bucket| !bucket.confirmations.is_empty() || bucket.total > 0);

        if removed > 0 {
            info!(removed, "expired crowd confirmations swept");
        }
        removed
    }

    /// Retracts a user's confirmation before it expires. The lifetime
    /// total is unaffected. Returns whether anything was removed.
    pub fn remove(&self, train_number: &str, user_id: &str) -> bool {
        match self.trains.get_mut(train_number) {
            Some(mut bucket) => {
                let before = bucket.confirmations.len();
                bucket.confirmations.retain(|c| c.user_id != user_id);
                before != bucket.confirmations.len()
            }
            None => false,
        }
    }

    fn level_for(&self, active: usize) -> CrowdLevel {
        if active == 0 {
            CrowdLevel::None
        } else if active < self.config.medium_threshold {
            CrowdLevel::Low
        } else if active < self.config.high_threshold {
            CrowdLevel::Medium
        } else {
            CrowdLevel::High
        }
    }
}
