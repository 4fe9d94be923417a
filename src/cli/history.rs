use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};

use super::{output::DayRange, Args};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct HistoryCommand {
    #[arg(
        long,
        short,
        help = "First day to show. Examples are \"yesterday\", \"3 days ago\", \"15/03/2025\""
    )]
    since: Option<String>,
    #[arg(
        long,
        short,
        help = "Last day to show. Examples are \"yesterday\", \"3 days ago\", \"15/03/2025\""
    )]
    until: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

impl HistoryCommand {
    /// Turns the human readable bounds into whole days relative to `now`.
    pub fn day_range(&self, now: DateTime<Local>) -> Result<DayRange> {
        Ok(DayRange {
            since: parse_day(self.since.as_deref(), now, self.date_style, "start")?,
            until: parse_day(self.until.as_deref(), now, self.date_style, "end")?,
        })
    }
}

fn parse_day(
    value: Option<&str>,
    now: DateTime<Local>,
    date_style: DateStyle,
    bound: &str,
) -> Result<Option<NaiveDate>> {
    let Some(value) = value else {
        return Ok(None);
    };
    match parse_date_string(value, now, date_style.into()) {
        Ok(v) => Ok(Some(v.date_naive())),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate {bound} date {e}"),
            )
            .into()),
    }
}
