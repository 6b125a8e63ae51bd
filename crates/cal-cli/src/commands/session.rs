//! Interactive logging session over line-oriented input.
//!
//! Each input line is one command. Collaborator results (search responses,
//! camera grants, lookups) are applied between lines as they arrive, and any
//! resulting notices or state changes are printed straight away.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use cal_core::{
    Barcode, Collaborators, FoodRecord, LogError, NutritionSearch, ProductLookup, ScanPhase,
    Session, SessionConfig,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::devices::{LineDecoder, SimulatedCamera};
use crate::render;

const DEFAULT_WAIT: Duration = Duration::from_secs(1);

const HELP: &str = "\
Commands:
  type <text>           set the search text (empty clears results)
  results               show current search results
  select <n>            log search result n
  servings <n> <value>  set servings for log item n
  delete <n>            remove log item n
  scan                  start the barcode scanner
  detect <barcode>      show a barcode to the scanner
  capture               freeze a frame and stop the scanner
  stop                  stop the scanner
  log                   show logged items
  totals                show totals and macro percentages
  wait [ms]             let pending work finish (default 1000)
  help                  show this list
  quit                  end the session
";

/// One parsed input line. Item numbers are zero-based here.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Type(String),
    Results,
    Select(usize),
    Servings(usize, f64),
    Delete(usize),
    Scan,
    Detect(String),
    Capture,
    Stop,
    Log,
    Totals,
    Wait(Duration),
    Help,
    Quit,
}

impl SessionCommand {
    /// Parses a line. Blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(word, rest)| (word, rest.trim()));

        let command = match word {
            "type" => Self::Type(rest.to_string()),
            "results" => Self::Results,
            "select" => Self::Select(item_number(rest)?),
            "servings" => {
                let (item, value) = rest
                    .split_once(char::is_whitespace)
                    .context("usage: servings <n> <value>")?;
                let value = value.trim();
                let servings: f64 = value
                    .parse()
                    .with_context(|| format!("invalid servings value {value:?}"))?;
                Self::Servings(item_number(item)?, servings)
            }
            "delete" => Self::Delete(item_number(rest)?),
            "scan" => Self::Scan,
            "detect" => {
                if rest.is_empty() {
                    bail!("usage: detect <barcode>");
                }
                Self::Detect(rest.to_string())
            }
            "capture" => Self::Capture,
            "stop" => Self::Stop,
            "log" => Self::Log,
            "totals" => Self::Totals,
            "wait" => {
                if rest.is_empty() {
                    Self::Wait(DEFAULT_WAIT)
                } else {
                    let ms: u64 = rest
                        .parse()
                        .with_context(|| format!("invalid wait duration {rest:?}"))?;
                    Self::Wait(Duration::from_millis(ms))
                }
            }
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => bail!("unknown command {other:?}, type `help` for a list"),
        };
        Ok(Some(command))
    }
}

fn item_number(text: &str) -> Result<usize> {
    let text = text.trim();
    let number: usize = text
        .parse()
        .with_context(|| format!("expected an item number, got {text:?}"))?;
    number.checked_sub(1).context("items are numbered from 1")
}

fn describe_log_error(err: &LogError) -> String {
    match err {
        LogError::IndexOutOfRange { index, len } => {
            format!("no item {} (there are {len})", index + 1)
        }
        LogError::InvalidInput { .. } => err.to_string(),
    }
}

/// Drives a [`Session`] from typed commands.
pub struct Repl<S: NutritionSearch, L: ProductLookup, W: Write> {
    session: Session<S, L, SimulatedCamera, LineDecoder>,
    decoder: LineDecoder,
    writer: W,
    shown_results: Vec<FoodRecord>,
    shown_phase: ScanPhase,
}

impl<S: NutritionSearch, L: ProductLookup, W: Write> Repl<S, L, W> {
    pub fn new(
        config: &SessionConfig,
        search: S,
        lookup: L,
        camera: SimulatedCamera,
        writer: W,
    ) -> Self {
        let decoder = LineDecoder::new();
        let session = Session::new(
            config,
            Collaborators {
                search,
                lookup,
                camera,
                decoder: decoder.clone(),
            },
        );
        Self {
            session,
            decoder,
            writer,
            shown_results: Vec::new(),
            shown_phase: ScanPhase::Idle,
        }
    }

    /// Runs until `quit` or end of input, then stops any active scan.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, input: R) -> Result<()> {
        let mut lines = input.lines();
        writeln!(self.writer, "Calorie logger session. Type `help` for commands.")?;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line.context("failed to read input")? else {
                        break;
                    };
                    if !self.execute(&line).await? {
                        break;
                    }
                }
                () = self.session.step() => {}
            }
            self.report()?;
        }

        self.session.stop_scan();
        self.report()?;
        Ok(())
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Executes one line. Returns false when the session should end.
    async fn execute(&mut self, line: &str) -> Result<bool> {
        let command = match SessionCommand::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(true),
            Err(err) => {
                writeln!(self.writer, "error: {err:#}")?;
                return Ok(true);
            }
        };
        tracing::debug!(?command, "session command");

        match command {
            SessionCommand::Type(text) => self.session.on_search_input(&text),
            SessionCommand::Results => {
                render::write_search_results(
                    &mut self.writer,
                    self.session.controller().search_results(),
                )?;
            }
            SessionCommand::Select(index) => match self.session.select_search_result(index) {
                Ok(entry) => writeln!(self.writer, "Added {}", entry.name())?,
                Err(err) => writeln!(self.writer, "error: {}", describe_log_error(&err))?,
            },
            SessionCommand::Servings(index, servings) => {
                match self.session.update_servings(index, servings) {
                    Ok(()) => render::write_log(&mut self.writer, self.session.controller().log())?,
                    Err(err) => writeln!(self.writer, "error: {}", describe_log_error(&err))?,
                }
            }
            SessionCommand::Delete(index) => match self.session.delete_entry(index) {
                Ok(entry) => writeln!(self.writer, "Deleted {}", entry.name())?,
                Err(err) => writeln!(self.writer, "error: {}", describe_log_error(&err))?,
            },
            SessionCommand::Scan => {
                if let Err(err) = self.session.start_scan() {
                    writeln!(self.writer, "error: {err}")?;
                }
            }
            SessionCommand::Detect(value) => self.detect(&value)?,
            SessionCommand::Capture => {
                if let Err(err) = self.session.capture_frame() {
                    writeln!(self.writer, "error: {err}")?;
                }
            }
            SessionCommand::Stop => self.session.stop_scan(),
            SessionCommand::Log => {
                render::write_log(&mut self.writer, self.session.controller().log())?;
            }
            SessionCommand::Totals => {
                let controller = self.session.controller();
                render::write_totals(
                    &mut self.writer,
                    &controller.totals(),
                    &controller.macro_percentages(),
                )?;
            }
            SessionCommand::Wait(duration) => self.wait(duration).await?,
            SessionCommand::Help => self.writer.write_all(HELP.as_bytes())?,
            SessionCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    fn detect(&mut self, value: &str) -> Result<()> {
        if let Err(err) = Barcode::new(value) {
            writeln!(self.writer, "error: {err}")?;
            return Ok(());
        }
        if !self.decoder.feed(value) {
            writeln!(self.writer, "The scanner is not running, type `scan` first")?;
        }
        Ok(())
    }

    /// Applies collaborator results for `duration`.
    async fn wait(&mut self, duration: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + duration;
        while tokio::time::timeout_at(deadline, self.session.step())
            .await
            .is_ok()
        {
            self.report()?;
        }
        Ok(())
    }

    /// Prints notices, new search results and scan phase changes.
    fn report(&mut self) -> Result<()> {
        for notice in self.session.take_notices() {
            writeln!(self.writer, "{notice}")?;
        }

        let controller = self.session.controller();
        let results = controller.search_results();
        if results != self.shown_results.as_slice() {
            if !results.is_empty() {
                writeln!(self.writer, "Results for {:?}:", controller.search_query())?;
                render::write_search_results(&mut self.writer, results)?;
            }
            self.shown_results = results.to_vec();
        }

        let phase = controller.scan_phase();
        if phase != self.shown_phase {
            writeln!(self.writer, "{}", render::describe_phase(phase))?;
            self.shown_phase = phase;
        }

        self.writer.flush()?;
        Ok(())
    }
}
