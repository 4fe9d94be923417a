use chrono::{NaiveDate, NaiveTime};

/// This is the standard way of converting a date to a day key in daylog.
pub fn date_to_day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Time of day at second resolution. Anything below a second is dropped, so two entries made
/// within the same second end up under the same key.
pub fn time_to_time_key(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}
