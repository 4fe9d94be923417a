use std::io::{self, Write};

use ansi_term::Style;
use chrono::NaiveDate;

use crate::{
    journal::store::{DayLog, LogCollection},
    utils::time::date_to_day_key,
};

/// Entries of one day, newest first. Time keys are zero padded, so comparing them as strings is
/// the same as comparing them as times.
pub fn day_entries(day: &DayLog) -> Vec<(&str, &str)> {
    day.iter()
        .rev()
        .map(|(time, text)| (time.as_str(), text.as_str()))
        .collect()
}

/// Inclusive range of days shown in the history panel.
#[derive(Debug, Default, Clone, Copy)]
pub struct DayRange {
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
}

impl DayRange {
    fn contains(&self, day_key: &str) -> bool {
        let after_start = self
            .since
            .map_or(true, |since| day_key >= date_to_day_key(since).as_str());
        let before_end = self
            .until
            .map_or(true, |until| day_key <= date_to_day_key(until).as_str());
        after_start && before_end
    }
}

/// Every day with its entries, newest day first and newest entry first within a day.
pub fn history_entries(
    collection: &LogCollection,
    range: DayRange,
) -> Vec<(&str, Vec<(&str, &str)>)> {
    collection
        .iter()
        .rev()
        .filter(|(day, _)| range.contains(day))
        .map(|(day, entries)| (day.as_str(), day_entries(entries)))
        .collect()
}

pub fn write_today(out: &mut impl Write, day_key: &str, day: &DayLog) -> io::Result<()> {
    writeln!(out, "{}", Style::new().bold().paint(day_key))?;
    let entries = day_entries(day);
    if entries.is_empty() {
        writeln!(out, "  {}", Style::new().dimmed().paint("Nothing recorded yet"))?;
    }
    for (time, text) in entries {
        writeln!(out, "  {time}\t{text}")?;
    }
    Ok(())
}

pub fn write_history(
    out: &mut impl Write,
    collection: &LogCollection,
    range: DayRange,
) -> io::Result<()> {
    let days = history_entries(collection, range);
    if days.iter().all(|(_, entries)| entries.is_empty()) {
        writeln!(out, "{}", Style::new().dimmed().paint("Nothing recorded yet"))?;
        return Ok(());
    }
    for (day, entries) in days {
        // Today is always present, possibly still empty.
        if entries.is_empty() {
            continue;
        }
        writeln!(out, "{}", Style::new().bold().paint(day))?;
        for (time, text) in entries {
            writeln!(out, "  {time}\t{text}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::journal::store::{DayLog, LogCollection};

    use super::{day_entries, history_entries, write_history, DayRange};

    fn day(entries: &[(&str, &str)]) -> DayLog {
        entries
            .iter()
            .map(|(t, e)| (t.to_string(), e.to_string()))
            .collect()
    }

    #[test]
    fn test_day_entries_newest_first() {
        let log = day(&[("09:00:00", "a"), ("14:20:00", "b"), ("08:15:00", "c")]);

        let times = day_entries(&log)
            .into_iter()
            .map(|(t, _)| t)
            .collect::<Vec<_>>();

        assert_eq!(times, vec!["14:20:00", "09:00:00", "08:15:00"]);
    }

    #[test]
    fn test_history_newest_day_first() {
        let collection: LogCollection = [
            ("2024-01-15".to_string(), day(&[("09:00:00", "a")])),
            ("2024-01-16".to_string(), day(&[("08:00:00", "b"), ("12:00:00", "c")])),
        ]
        .into();

        let history = history_entries(&collection, DayRange::default());

        assert_eq!(
            history,
            vec![
                ("2024-01-16", vec![("12:00:00", "c"), ("08:00:00", "b")]),
                ("2024-01-15", vec![("09:00:00", "a")]),
            ]
        );
    }

    #[test]
    fn test_history_range_is_inclusive() {
        let collection: LogCollection = ["2024-01-14", "2024-01-15", "2024-01-16", "2024-01-17"]
            .into_iter()
            .map(|d| (d.to_string(), day(&[("09:00:00", d)])))
            .collect();

        let range = DayRange {
            since: NaiveDate::from_ymd_opt(2024, 1, 15),
            until: NaiveDate::from_ymd_opt(2024, 1, 16),
        };
        let days = history_entries(&collection, range)
            .into_iter()
            .map(|(d, _)| d)
            .collect::<Vec<_>>();

        assert_eq!(days, vec!["2024-01-16", "2024-01-15"]);
    }

    #[test]
    fn test_write_history_skips_empty_days() {
        let collection: LogCollection = [
            ("2024-01-15".to_string(), day(&[("09:00:00", "a")])),
            ("2024-01-16".to_string(), DayLog::new()),
        ]
        .into();

        let mut out = Vec::new();
        write_history(&mut out, &collection, DayRange::default()).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("2024-01-15"));
        assert!(!out.contains("2024-01-16"));
    }
}
