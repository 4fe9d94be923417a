//! Small cli for keeping a log of what you did during the day.
//! Every entry is stored under the second it was made, entries are grouped by day and kept in a
//! single file inside the application directory.
//!

pub mod cli;
pub mod journal;
pub mod storage;
pub mod utils;
