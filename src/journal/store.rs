use std::{collections::BTreeMap, sync::Arc};

use chrono::NaiveTime;
use tracing::debug;

use crate::utils::{
    clock::Clock,
    time::{date_to_day_key, time_to_time_key},
};

/// Entries of a single day, keyed by `HH:MM:SS`.
pub type DayLog = BTreeMap<String, String>;

/// Every recorded day, keyed by `YYYY-MM-DD`.
pub type LogCollection = BTreeMap<String, DayLog>;

/// Result of [DailyLogStore::record_entry].
#[derive(Debug, PartialEq, Eq)]
pub enum Recorded {
    Entry {
        time_key: String,
        /// Text previously stored under the same second. The later entry wins.
        replaced: Option<String>,
    },
    /// Text was empty after trimming. Nothing changed.
    Rejected,
}

/// Borrowed view of the store used for rendering and persisting.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub today_key: &'a str,
    pub collection: &'a LogCollection,
    pub current_day_log: &'a DayLog,
}

/// Owns the log of every day and knows which day the session was opened on.
///
/// The current day view is never stored separately. It is looked up in the collection under
/// `today_key` every time, so writing through it always lands in the collection.
pub struct DailyLogStore {
    collection: LogCollection,
    today_key: String,
    clock: Arc<dyn Clock>,
}

impl DailyLogStore {
    /// Builds the store from previously persisted state. The day is fixed here, entries made
    /// after midnight still go to the day the session was opened on.
    pub fn initialize(persisted: Option<LogCollection>, clock: Arc<dyn Clock>) -> Self {
        let mut collection = persisted.unwrap_or_default();
        let today_key = date_to_day_key(clock.time().date_naive());

        // Inserted before anything reads it, so the current day view always exists.
        collection.entry(today_key.clone()).or_default();

        debug!(
            "Initialized store for {today_key} with {} days",
            collection.len()
        );

        Self {
            collection,
            today_key,
            clock,
        }
    }

    pub fn today_key(&self) -> &str {
        &self.today_key
    }

    /// Records `text` under the current time of day.
    pub fn record_entry(&mut self, text: &str) -> Recorded {
        let clock = self.clock.clone();
        self.record_with(text, move || clock.time().time())
    }

    pub fn record_entry_at(&mut self, text: &str, time: NaiveTime) -> Recorded {
        self.record_with(text, || time)
    }

    /// The time is only read once the text is accepted.
    fn record_with(&mut self, text: &str, time: impl FnOnce() -> NaiveTime) -> Recorded {
        let text = text.trim();
        if text.is_empty() {
            debug!("Rejected empty entry");
            return Recorded::Rejected;
        }

        let time_key = time_to_time_key(time());
        let replaced = self
            .current_day_log_mut()
            .insert(time_key.clone(), text.to_owned());

        if let Some(previous) = &replaced {
            debug!("Entry at {time_key} replaced previous entry {previous:?}");
        }

        Recorded::Entry { time_key, replaced }
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            today_key: &self.today_key,
            collection: &self.collection,
            current_day_log: self.current_day_log(),
        }
    }

    pub fn collection(&self) -> &LogCollection {
        &self.collection
    }

    pub fn current_day_log(&self) -> &DayLog {
        self.collection
            .get(&self.today_key)
            .expect("Today's log is inserted on initialization and never removed")
    }

    fn current_day_log_mut(&mut self) -> &mut DayLog {
        self.collection.entry(self.today_key.clone()).or_default()
    }
}
