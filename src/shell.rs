//! Line-oriented front end for the tracker.
//!
//! Reads one command per line, runs it, then presents any pending event and
//! acknowledges it so it is never shown twice.

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{quality::SleepQualityRecorder, tracker::SleepTrackerController};

const ENABLE_LOGS: bool = true;

use crate::log_error;

const HELP: &str = "Commands:
  start       start tracking tonight
  stop        stop tracking and rate the night
  rate <0-5>  rate the night that was just stopped
  history     show the sleep history
  clear       delete the whole history
  help        show this help
  quit        exit
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Stop,
    Rate(i32),
    History,
    Clear,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let Some(name) = parts.next() else {
        return Err("empty command".into());
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "start" => Command::Start,
        "stop" => Command::Stop,
        "rate" => {
            let value = parts.next().ok_or("usage: rate <0-5>")?;
            let rating = value
                .parse::<i32>()
                .map_err(|_| format!("not a rating: {value}"))?;
            Command::Rate(rating)
        }
        "history" => Command::History,
        "clear" => Command::Clear,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command: {other}")),
    };

    if parts.next().is_some() {
        return Err(format!("too many arguments for {name}"));
    }
    Ok(command)
}

pub struct Shell<R, W> {
    tracker: SleepTrackerController,
    recorder: SleepQualityRecorder,
    input: R,
    output: W,
    /// Night handed over by the tracker and waiting for a rating.
    rating_for: Option<i64>,
}

impl<R, W> Shell<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        tracker: SleepTrackerController,
        recorder: SleepQualityRecorder,
        input: R,
        output: W,
    ) -> Self {
        Self {
            tracker,
            recorder,
            input,
            output,
            rating_for: None,
        }
    }

    /// Runs until `quit` or end of input, then closes both components.
    pub async fn run(mut self) -> Result<W> {
        self.print_history().await?;
        self.write(HELP).await?;

        let mut line = String::new();
        loop {
            self.write("> ").await?;
            line.clear();
            if self.input.read_line(&mut line).await? == 0 {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }

            let command = match parse_command(&line) {
                Ok(command) => command,
                Err(message) => {
                    self.write(&format!("{message}\n")).await?;
                    continue;
                }
            };
            if command == Command::Quit {
                break;
            }

            if let Err(err) = self.dispatch(command).await {
                log_error!("{:?} failed: {}", command, err);
                self.write(&format!("error: {err}\n")).await?;
            }
            self.present_events().await?;
        }

        self.tracker.close();
        self.recorder.close();
        self.output.flush().await?;
        Ok(self.output)
    }

    async fn dispatch(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Start => {
                let night = self.tracker.start_tracking().await?;
                self.write(&format!("Tracking night #{}\n", night.night_id))
                    .await?;
            }
            Command::Stop => {
                if self.tracker.stop_tracking().await?.is_none() {
                    self.write("Nothing is being tracked\n").await?;
                }
            }
            Command::Rate(rating) => match self.rating_for {
                Some(night_id) => {
                    if self
                        .recorder
                        .record_quality(night_id, rating)
                        .await?
                        .is_none()
                    {
                        self.rating_for = None;
                        self.write("That night no longer exists\n").await?;
                    }
                }
                None => self.write("Nothing to rate; stop tracking first\n").await?,
            },
            Command::History => self.print_history().await?,
            Command::Clear => self.tracker.clear_history().await?,
            Command::Help => self.write(HELP).await?,
            Command::Quit => {}
        }
        Ok(())
    }

    async fn present_events(&mut self) -> Result<()> {
        if let Some(night_id) = self.tracker.pending_navigation() {
            self.rating_for = Some(night_id);
            self.write(&format!(
                "Night #{night_id} stopped. How did you sleep? rate <0-5>\n"
            ))
            .await?;
            self.tracker.on_navigation_handled();
        }

        if self.tracker.pending_notification() {
            self.write("All your sleep data has been cleared\n").await?;
            self.tracker.on_notification_handled();
        }

        if self.recorder.pending_navigation() {
            self.rating_for = None;
            self.recorder.on_navigation_handled();
            self.print_history().await?;
        }

        Ok(())
    }

    async fn print_history(&mut self) -> Result<()> {
        let snapshot = self.tracker.snapshot().await;
        self.write(&snapshot.nights_text).await
    }

    async fn write(&mut self, text: &str) -> Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        Ok(())
    }
}
