use std::{
    io::{self, BufRead, BufReader, Read, Write},
    ops::ControlFlow,
};

use ansi_term::Colour;
use anyhow::Result;
use futures::{Stream, StreamExt};
use tokio::{select, sync::mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    journal::session::{LogSession, Submission},
    storage::KeyValueStorage,
};

use super::output::{write_history, write_today, DayRange};

const INPUT_BUFFER: usize = 16;

/// The two mutually exclusive views. Switching only changes what is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Today,
    History,
}

#[derive(Debug, PartialEq, Eq)]
enum PanelCommand {
    Submit(String),
    Show(Panel),
    Save,
    Quit,
    Unknown(String),
}

fn parse_line(line: String) -> PanelCommand {
    let trimmed = line.trim_start();
    if let Some(text) = trimmed.strip_prefix("::") {
        return PanelCommand::Submit(text.to_owned());
    }
    if !trimmed.starts_with(':') {
        return PanelCommand::Submit(line);
    }
    match line.trim() {
        ":today" => PanelCommand::Show(Panel::Today),
        ":history" => PanelCommand::Show(Panel::History),
        ":save" => PanelCommand::Save,
        ":quit" | ":q" => PanelCommand::Quit,
        command => PanelCommand::Unknown(command.to_owned()),
    }
}

/// Lines of stdin as a stream.
pub fn stdin_lines() -> ReceiverStream<io::Result<String>> {
    spawn_line_reader(io::stdin())
}

/// Reads lines on a plain thread. A blocking read can't be interrupted, so it must not live on the
/// runtime, otherwise shutting the runtime down waits for the next line.
fn spawn_line_reader(reader: impl Read + Send + 'static) -> ReceiverStream<io::Result<String>> {
    let (sender, receiver) = mpsc::channel(INPUT_BUFFER);
    std::thread::spawn(move || {
        for line in BufReader::new(reader).lines() {
            // The bytes of an invalid line are already consumed, reading can go on.
            let fatal = matches!(&line, Err(e) if e.kind() != io::ErrorKind::InvalidData);
            if sender.blocking_send(line).is_err() || fatal {
                break;
            }
        }
    });
    ReceiverStream::new(receiver)
}

/// Runs an interactive session. Every line of `input` is submitted as an entry unless it is one of
/// the `:` commands. The active panel is redrawn after each change.
///
/// Whatever ends the session, unsaved entries get one more save attempt.
pub async fn run_panel<S: KeyValueStorage>(
    session: &mut LogSession<S>,
    mut input: impl Stream<Item = io::Result<String>> + Unpin,
    out: &mut impl Write,
    shutdown: CancellationToken,
) -> Result<()> {
    let result: Result<()> = async {
        let mut panel = Panel::Today;
        render(session, panel, out)?;

        loop {
            let line = select! {
                _ = shutdown.cancelled() => {
                    info!("Panel received shutdown");
                    break;
                },
                line = input.next() => line,
            };
            let line = match line {
                None => {
                    debug!("Input ended");
                    break;
                }
                Some(Ok(line)) => line,
                Some(Err(e)) if e.kind() == io::ErrorKind::InvalidData => {
                    warn!("Skipping unreadable input line: {e}");
                    writeln!(
                        out,
                        "{}",
                        Colour::Yellow.paint("Skipped a line that is not valid UTF-8")
                    )?;
                    continue;
                }
                Some(Err(e)) => return Err(e.into()),
            };

            if let ControlFlow::Break(()) =
                process_command(session, &mut panel, parse_line(line), out).await?
            {
                break;
            }
        }
        Ok(())
    }
    .await;

    if session.has_unsaved_changes() {
        warn!("Closing panel with unsaved changes, trying to save once more");
        if let Err(error) = session.save().await {
            write_unsaved_warning(out, &error)?;
        }
    }
    result
}

async fn process_command<S: KeyValueStorage>(
    session: &mut LogSession<S>,
    panel: &mut Panel,
    command: PanelCommand,
    out: &mut impl Write,
) -> Result<ControlFlow<()>> {
    match command {
        PanelCommand::Submit(text) => match session.submit(&text).await {
            Submission::Rejected => {}
            Submission::Saved { .. } => render(session, *panel, out)?,
            Submission::Unsaved { error, .. } => {
                render(session, *panel, out)?;
                write_unsaved_warning(out, &error)?;
            }
        },
        PanelCommand::Show(next) => {
            *panel = next;
            render(session, *panel, out)?;
        }
        PanelCommand::Save => match session.save().await {
            Ok(()) => writeln!(out, "Saved")?,
            Err(error) => write_unsaved_warning(out, &error)?,
        },
        PanelCommand::Quit => return Ok(ControlFlow::Break(())),
        PanelCommand::Unknown(command) => {
            writeln!(
                out,
                "Unknown command {command}. Use :today, :history, :save or :quit, start a line with :: to record text beginning with a colon"
            )?;
        }
    }
    Ok(ControlFlow::Continue(()))
}

pub fn render<S: KeyValueStorage>(
    session: &LogSession<S>,
    panel: Panel,
    out: &mut impl Write,
) -> io::Result<()> {
    let snapshot = session.snapshot();
    match panel {
        Panel::Today => write_today(out, snapshot.today_key, snapshot.current_day_log)?,
        Panel::History => write_history(out, snapshot.collection, DayRange::default())?,
    }
    out.flush()
}

fn write_unsaved_warning(out: &mut impl Write, error: &anyhow::Error) -> io::Result<()> {
    writeln!(
        out,
        "{}",
        Colour::Yellow.paint(format!(
            "Entries are kept in memory but are not saved yet ({error}). Use :save to try again"
        ))
    )
}
