pub mod history;
pub mod output;
pub mod panel;
pub mod shutdown;

use std::{
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use history::HistoryCommand;
use output::write_history;
use panel::{render, run_panel, stdin_lines, Panel};
use shutdown::detect_shutdown;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};

use crate::{
    journal::session::{
        LogSession, SessionConfig, Submission, DEFAULT_RETRY_DELAY, DEFAULT_SAVE_ATTEMPTS,
    },
    storage::{file_storage::FileStorage, KeyValueStorage},
    utils::{
        clock::{Clock, DefaultClock},
        dir::{create_application_default_path, ensure_dir},
        logging::{enable_logging, CLI_PREFIX, PANEL_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Daylog", version, long_about = None)]
#[command(about = "Keeps a timestamped log of what you did, grouped by day", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Show all logs in the console")]
    log: bool,
    #[arg(long = "log-filter", global = true, help = "Level of logs written to the log files")]
    log_filter: Option<LevelFilter>,
    #[command(flatten)]
    save: SaveArgs,
}

#[derive(clap::Args, Debug, Clone, Copy)]
struct SaveArgs {
    #[arg(long = "save-attempts", global = true, default_value_t = DEFAULT_SAVE_ATTEMPTS, help = "How many times a failed save is attempted")]
    save_attempts: u32,
    #[arg(long = "retry-delay-ms", global = true, default_value_t = DEFAULT_RETRY_DELAY.as_millis() as u64, help = "Pause between save attempts")]
    retry_delay_ms: u64,
}

impl From<SaveArgs> for SessionConfig {
    fn from(value: SaveArgs) -> Self {
        Self {
            save_attempts: value.save_attempts,
            retry_delay: Duration::from_millis(value.retry_delay_ms),
        }
    }
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Record an entry under the current time")]
    Add {
        #[arg(required = true, num_args = 1.., help = "Text of the entry")]
        text: Vec<String>,
    },
    #[command(about = "Show entries recorded today, newest first")]
    Today {},
    #[command(about = "Show entries of every day, newest first")]
    History {
        #[command(flatten)]
        command: HistoryCommand,
    },
    #[command(
        about = "Open an interactive panel. Every line is recorded as an entry, :today, :history, :save and :quit control the panel. Start a line with :: to record text beginning with a colon"
    )]
    Panel {},
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = args
        .dir
        .clone()
        .map_or_else(create_application_default_path, ensure_dir)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        args.log_filter
    };
    let prefix = match args.commands {
        Commands::Panel {} => PANEL_PREFIX,
        _ => CLI_PREFIX,
    };
    enable_logging(prefix, &app_dir, logging_level, args.log)?;

    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let storage = FileStorage::new(app_dir)?;
    info!("Using storage {:?}", storage.path());
    let mut session = LogSession::open(storage, clock.clone(), args.save.into()).await;
    let mut stdout = io::stdout().lock();

    match args.commands {
        Commands::Add { text } => add_entry(&mut session, &text.join(" "), &mut stdout).await,
        Commands::Today {} => {
            render(&session, Panel::Today, &mut stdout)?;
            Ok(())
        }
        Commands::History { command } => {
            let range = command.day_range(clock.time())?;
            write_history(&mut stdout, session.snapshot().collection, range)?;
            Ok(())
        }
        Commands::Panel {} => {
            let shutdown = CancellationToken::new();
            tokio::spawn(detect_shutdown(shutdown.clone()));

            let result =
                run_panel(&mut session, stdin_lines(), &mut stdout, shutdown.clone()).await;
            shutdown.cancel();
            result
        }
    }
}

async fn add_entry<S: KeyValueStorage>(
    session: &mut LogSession<S>,
    text: &str,
    out: &mut impl Write,
) -> Result<()> {
    match session.submit(text).await {
        Submission::Rejected => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                "Entry can't be empty",
            )
            .into()),
        Submission::Saved { time_key } => {
            writeln!(out, "Recorded at {time_key}")?;
            Ok(())
        }
        Submission::Unsaved { error, .. } => Err(error.context("Entry was recorded but not saved")),
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use anyhow::{anyhow, Result};
    use chrono::{Local, TimeZone};
    use tempfile::tempdir;

    use crate::{
        journal::session::{LogSession, SessionConfig},
        storage::{file_storage::FileStorage, KeyValueStorage, StoredValues},
        utils::clock::{Clock, MockClock},
    };

    use super::add_entry;

    /// Storage that can be read but never written.
    struct ReadOnlyStorage;

    impl KeyValueStorage for ReadOnlyStorage {
        async fn get(&self, _keys: &[&str]) -> Result<StoredValues> {
            Ok(StoredValues::new())
        }

        async fn set(&self, _values: StoredValues) -> Result<()> {
            Err(anyhow!("disk is full"))
        }
    }

    fn test_clock() -> Arc<dyn Clock> {
        let mut clock = MockClock::new();
        clock
            .expect_time()
            .return_const(Local.with_ymd_and_hms(2024, 1, 16, 10, 0, 0).unwrap());
        clock.expect_sleep().returning(|_| ());
        Arc::new(clock)
    }

    fn single_attempt() -> SessionConfig {
        SessionConfig {
            save_attempts: 1,
            retry_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_add_prints_time_of_saved_entry() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStorage::new(dir.path().to_owned())?;
        let mut session = LogSession::open(storage, test_clock(), single_attempt()).await;
        let mut out = Vec::new();

        add_entry(&mut session, "Reviewed the release", &mut out).await?;

        assert_eq!(String::from_utf8(out)?, "Recorded at 10:00:00\n");
        assert_eq!(
            session.snapshot().current_day_log["10:00:00"],
            "Reviewed the release"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_add_rejects_blank_text() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStorage::new(dir.path().to_owned())?;
        let mut session = LogSession::open(storage, test_clock(), single_attempt()).await;
        let mut out = Vec::new();

        let error = add_entry(&mut session, "   ", &mut out)
            .await
            .expect_err("blank text should be rejected");

        let error = error
            .downcast_ref::<clap::Error>()
            .expect("rejection should be a clap error");
        assert_eq!(error.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(out.is_empty());
        assert!(session.snapshot().current_day_log.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_add_reports_unsaved_entry() -> Result<()> {
        let mut session = LogSession::open(ReadOnlyStorage, test_clock(), single_attempt()).await;
        let mut out = Vec::new();

        let error = add_entry(&mut session, "Lost on exit", &mut out)
            .await
            .expect_err("failed save should be reported");

        assert!(error.to_string().contains("not saved"));
        assert!(format!("{error:#}").contains("disk is full"));
        assert!(out.is_empty());
        assert!(session.has_unsaved_changes());
        Ok(())
    }
}
