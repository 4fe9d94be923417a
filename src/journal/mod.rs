//! The log of what happened during each day.
//!
//! [store::DailyLogStore] holds the data in memory and [session::LogSession] keeps it in sync
//! with a [KeyValueStorage](crate::storage::KeyValueStorage).

pub mod session;
pub mod store;
