//! Process configuration, loaded from `CONFDESK_*` environment variables.

use std::{env, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::runtime::handle::RuntimeConfig;

/// Values stored for conference fields the creator left unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceDefaults {
    /// Stored when `city` is missing or empty.
    pub city: String,
    /// Stored when `maxAttendees` is missing.
    pub max_attendees: i64,
    /// Initial seats when capacity is not positive.
    pub seats_available: i64,
    /// Stored when `topics` is empty.
    pub topics: Vec<String>,
}

impl Default for ConferenceDefaults {
    fn default() -> Self {
        Self {
            city: "Default City".to_string(),
            max_attendees: 0,
            seats_available: 0,
            topics: vec!["Default".to_string(), "Topic".to_string()],
        }
    }
}

/// Everything the binary needs to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Persistence batching and snapshot policy.
    pub runtime: RuntimeConfig,
    /// Values for unset conference fields.
    pub conference_defaults: ConferenceDefaults,
    /// Attempts per contended transaction before giving up.
    pub transaction_attempts: u32,
    /// Capacity of the featured-speaker job queue.
    pub task_queue_bound: usize,
    /// SQLite journal; `None` keeps everything in memory.
    pub database_path: Option<PathBuf>,
    /// Filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig::default(),
            conference_defaults: ConferenceDefaults::default(),
            transaction_attempts: 3,
            task_queue_bound: 128,
            database_path: None,
            log_filter: "confdesk=info".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads overrides from the environment, keeping defaults for anything
    /// unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let runtime = RuntimeConfig {
            flush_on_commit: parsed("CONFDESK_FLUSH_ON_COMMIT")
                .unwrap_or(defaults.runtime.flush_on_commit),
            batch_max_ops: parsed("CONFDESK_BATCH_MAX_OPS")
                .unwrap_or(defaults.runtime.batch_max_ops),
            batch_max_latency_ms: parsed("CONFDESK_BATCH_MAX_LATENCY_MS")
                .unwrap_or(defaults.runtime.batch_max_latency_ms),
            persist_queue_bound: parsed("CONFDESK_PERSIST_QUEUE_BOUND")
                .unwrap_or(defaults.runtime.persist_queue_bound),
            snapshot_every_ops: parsed("CONFDESK_SNAPSHOT_EVERY_OPS")
                .unwrap_or(defaults.runtime.snapshot_every_ops),
            compact_after_snapshot: parsed("CONFDESK_COMPACT_AFTER_SNAPSHOT")
                .unwrap_or(defaults.runtime.compact_after_snapshot),
        };

        Self {
            runtime,
            conference_defaults: defaults.conference_defaults,
            transaction_attempts: parsed::<u32>("CONFDESK_TRANSACTION_ATTEMPTS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.transaction_attempts),
            task_queue_bound: parsed::<usize>("CONFDESK_TASK_QUEUE_BOUND")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.task_queue_bound),
            database_path: env::var("CONFDESK_DATABASE_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            log_filter: env::var("CONFDESK_LOG").unwrap_or(defaults.log_filter),
        }
    }
}

fn parsed<T: std::str::FromStr>(var: &str) -> Option<T> {
    env::var(var).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_published_table() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.transaction_attempts, 3);
        assert_eq!(cfg.conference_defaults.city, "Default City");
        assert_eq!(cfg.conference_defaults.topics, vec!["Default", "Topic"]);
        assert!(cfg.database_path.is_none());
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = AppConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
