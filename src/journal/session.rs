use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{
    storage::{KeyValueStorage, StoredValues},
    utils::clock::Clock,
};

use super::store::{DailyLogStore, DayLog, LogCollection, Recorded, Snapshot};

/// Key holding every recorded day.
pub const LOGS_KEY: &str = "logs";
/// Legacy key holding only the current day. Written for older readers, never read back.
pub const CURRENT_LOG_KEY: &str = "currentLog";

pub const DEFAULT_SAVE_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// How many times a write is attempted before giving up. At least one attempt is made.
    pub save_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            save_attempts: DEFAULT_SAVE_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Result of [LogSession::submit].
#[derive(Debug)]
pub enum Submission {
    /// Empty text. Nothing was recorded or written.
    Rejected,
    Saved { time_key: String },
    /// The entry is in memory but every write failed. It stays unsaved until a later write
    /// succeeds.
    Unsaved {
        time_key: String,
        error: anyhow::Error,
    },
}

/// Bridges [DailyLogStore] and [KeyValueStorage]. Every accepted entry is followed by a write of
/// the full collection.
pub struct LogSession<S: KeyValueStorage> {
    store: DailyLogStore,
    storage: S,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    unsaved: bool,
    /// Stored logs that could only be read partially. Written once under its own key so the next
    /// save of `logs` doesn't lose them.
    malformed_logs: Option<(String, Value)>,
}

impl<S: KeyValueStorage> LogSession<S> {
    /// Loads persisted state and opens the store. Unreadable state is treated as if nothing was
    /// stored yet. Malformed days and entries are skipped, the rest of the stored logs is kept.
    pub async fn open(storage: S, clock: Arc<dyn Clock>, config: SessionConfig) -> Self {
        let (persisted, malformed) = load_collection(&storage).await;
        let store = DailyLogStore::initialize(persisted, clock.clone());
        info!("Opened log session for {}", store.today_key());

        let malformed_logs = malformed.map(|value| {
            let key = format!("{LOGS_KEY}.corrupt-{}", clock.time().timestamp());
            warn!("Stored logs will be kept as they were under {key}");
            (key, value)
        });

        Self {
            store,
            storage,
            clock,
            config,
            unsaved: false,
            malformed_logs,
        }
    }

    pub async fn submit(&mut self, text: &str) -> Submission {
        let time_key = match self.store.record_entry(text) {
            Recorded::Rejected => return Submission::Rejected,
            Recorded::Entry { time_key, .. } => time_key,
        };

        self.unsaved = true;
        match self.save().await {
            Ok(()) => Submission::Saved { time_key },
            Err(error) => Submission::Unsaved { time_key, error },
        }
    }

    /// Writes the full collection, retrying according to [SessionConfig]. The in-memory state is
    /// never rolled back when this fails.
    pub async fn save(&mut self) -> Result<()> {
        let attempts = self.config.save_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.write_once().await {
                Ok(()) => {
                    debug!("Saved collection on attempt {attempt}");
                    self.unsaved = false;
                    self.malformed_logs = None;
                    return Ok(());
                }
                Err(e) => {
                    warn!("Failed to save collection, attempt {attempt}/{attempts}: {e:?}");
                    last_error = Some(e);
                }
            }
            if attempt < attempts {
                self.clock.sleep(self.config.retry_delay).await;
            }
        }

        let error = last_error.unwrap_or_else(|| anyhow!("No save attempt was made"));
        error!("Collection is not saved: {error:?}");
        Err(error)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        self.store.snapshot()
    }

    async fn write_once(&self) -> Result<()> {
        let snapshot = self.store.snapshot();
        let document = PersistedLogs {
            logs: snapshot.collection,
            current_log: snapshot.current_day_log,
        };
        let mut values = serde_json::from_value::<StoredValues>(serde_json::to_value(document)?)?;
        if let Some((key, value)) = &self.malformed_logs {
            values.insert(key.clone(), value.clone());
        }
        self.storage.set(values).await
    }
}

/// Shape written on every save. `currentLog` duplicates today's entry of `logs`.
#[derive(Serialize)]
struct PersistedLogs<'a> {
    logs: &'a LogCollection,
    #[serde(rename = "currentLog")]
    current_log: &'a DayLog,
}

/// Reads the stored collection. The raw stored value is returned as well when parts of it had to
/// be skipped.
async fn load_collection(
    storage: &impl KeyValueStorage,
) -> (Option<LogCollection>, Option<Value>) {
    let mut stored = match storage.get(&[LOGS_KEY]).await {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to read stored logs, starting empty: {e:?}");
            return (None, None);
        }
    };

    match stored.remove(LOGS_KEY) {
        None | Some(Value::Null) => (None, None),
        Some(value) => match salvage_collection(&value) {
            (collection, false) => (Some(collection), None),
            (collection, true) => {
                warn!("Stored logs are malformed, kept {} readable days", collection.len());
                (Some(collection), Some(value))
            }
        },
    }
}

/// Reads every well formed day and entry of `value`. The flag is set when anything was skipped.
fn salvage_collection(value: &Value) -> (LogCollection, bool) {
    let Value::Object(days) = value else {
        warn!("Stored logs are not a map of days");
        return (LogCollection::new(), true);
    };

    let mut collection = LogCollection::new();
    let mut lossy = false;
    for (day_key, day) in days {
        let Value::Object(entries) = day else {
            warn!("Skipping malformed day {day_key}: {day}");
            lossy = true;
            continue;
        };

        let mut day_log = DayLog::new();
        for (time_key, text) in entries {
            match text {
                Value::String(text) => {
                    day_log.insert(time_key.clone(), text.clone());
                }
                other => {
                    warn!("Skipping malformed entry {day_key} {time_key}: {other}");
                    lossy = true;
                }
            }
        }
        if !day_log.is_empty() || entries.is_empty() {
            collection.insert(day_key.clone(), day_log);
        }
    }
    (collection, lossy)
}
