//! The food log session controller.
//!
//! Reconciles search results, barcode detections and serving edits into one
//! [`FoodLog`]. User operations are methods; results from collaborators arrive
//! as [`Input`]s. Both return the [`Action`]s the runtime must carry out, so
//! every transition here is synchronous and deterministic.
//!
//! ```text
//! User op / Input → SessionController → state changes → Actions → collaborators
//!        ↑                                                          │
//!        └──────────────────────── Inputs ──────────────────────────┘
//! ```

use std::fmt;
use std::time::Duration;

use crate::collaborator::{CameraError, LookupError, StillFrame};
use crate::debounce::{DEFAULT_DEBOUNCE_WINDOW, DebounceDecision, SearchDebouncer, SearchRequest};
use crate::log::{FoodEntry, FoodLog, LogError, MacroPercentages, Totals};
use crate::nutrition::FoodRecord;
use crate::scan::{ScanEffect, ScanError, ScanPhase, Scanner};
use crate::types::{Barcode, ScanId, SearchTicket, StreamHandle};

/// Controller settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Quiet period before a typed query is searched.
    pub debounce_window: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
        }
    }
}

/// Results pushed back by collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    SearchTimerElapsed {
        ticket: SearchTicket,
    },
    SearchCompleted {
        ticket: SearchTicket,
        result: Result<Vec<FoodRecord>, LookupError>,
    },
    CameraOpened {
        scan: ScanId,
        result: Result<StreamHandle, CameraError>,
    },
    DecoderReady {
        scan: ScanId,
    },
    DecoderFailed {
        scan: ScanId,
        message: String,
    },
    BarcodeDetected {
        scan: ScanId,
        value: String,
    },
    FrameCaptured {
        scan: ScanId,
        result: Result<StillFrame, CameraError>,
    },
    LookupCompleted {
        scan: ScanId,
        barcode: Barcode,
        result: Result<FoodRecord, LookupError>,
    },
}

/// Work for the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Restart the debounce timer; report `ticket` when `delay` elapses.
    ScheduleSearch { ticket: SearchTicket, delay: Duration },
    /// Drop any running debounce timer.
    CancelSearchTimer,
    /// Send a search request.
    Search(SearchRequest),
    /// Perform a scan session effect.
    Scan(ScanEffect),
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    ProductAdded { name: String },
    ProductNotFound { barcode: Barcode },
    LookupFailed { barcode: Barcode, message: String },
    CameraUnavailable { message: String },
    FrameCaptured { width: u32, height: u32 },
}

/// Guidance shown alongside camera errors.
pub const CAMERA_HINT: &str = "Make sure camera permission is granted. Most browsers and \
    devices show a camera icon or privacy setting where access can be allowed.";

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProductAdded { name } => write!(f, "Added {name}"),
            Self::ProductNotFound { barcode } => {
                write!(f, "Product not found for barcode {barcode}")
            }
            Self::LookupFailed { barcode, message } => {
                write!(f, "Could not look up barcode {barcode}: {message}. Try scanning again.")
            }
            Self::CameraUnavailable { message } => {
                write!(f, "Unable to access the camera: {message}. {CAMERA_HINT}")
            }
            Self::FrameCaptured { width, height } => {
                write!(f, "Captured a {width}x{height} frame")
            }
        }
    }
}

/// Authoritative state for one food logging session.
#[derive(Debug, Clone, Default)]
pub struct SessionController {
    log: FoodLog,
    query: String,
    results: Vec<FoodRecord>,
    debouncer: SearchDebouncer,
    scanner: Scanner,
    notices: Vec<Notice>,
}

impl SessionController {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            debouncer: SearchDebouncer::new(config.debounce_window),
            ..Self::default()
        }
    }

    pub const fn log(&self) -> &FoodLog {
        &self.log
    }

    pub fn totals(&self) -> Totals {
        self.log.totals()
    }

    pub fn macro_percentages(&self) -> MacroPercentages {
        self.log.macro_percentages()
    }

    /// The text currently in the search box.
    pub fn search_query(&self) -> &str {
        &self.query
    }

    /// Results of the newest completed search.
    pub fn search_results(&self) -> &[FoodRecord] {
        &self.results
    }

    pub const fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn scan_phase(&self) -> ScanPhase {
        self.scanner.phase()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Removes and returns all pending notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// A keystroke in the search box.
    pub fn on_search_input(&mut self, query: &str) -> Vec<Action> {
        query.clone_into(&mut self.query);
        match self.debouncer.on_input(query) {
            DebounceDecision::Clear => {
                self.results.clear();
                vec![Action::CancelSearchTimer]
            }
            DebounceDecision::Schedule { ticket, delay } => {
                vec![Action::ScheduleSearch { ticket, delay }]
            }
        }
    }

    /// Logs the search result at `index`, then clears the search box.
    pub fn select_search_result(
        &mut self,
        index: usize,
    ) -> Result<(FoodEntry, Vec<Action>), LogError> {
        let record = self.results.get(index).ok_or(LogError::IndexOutOfRange {
            index,
            len: self.results.len(),
        })?;
        let nutrition = record.nutrition();
        let entry = self.log.add(record.description.clone(), nutrition);
        self.clear_search();
        Ok((entry, vec![Action::CancelSearchTimer]))
    }

    pub fn update_servings(&mut self, index: usize, servings: f64) -> Result<(), LogError> {
        self.log.update_servings(index, servings)
    }

    pub fn delete_entry(&mut self, index: usize) -> Result<FoodEntry, LogError> {
        self.log.delete(index)
    }

    /// Starts a scan session. Refused while another one is in progress.
    pub fn start_scan(&mut self) -> Result<(ScanId, Vec<Action>), ScanError> {
        let (scan, effects) = self.scanner.start()?;
        Ok((scan, scan_actions(effects)))
    }

    /// Stops the current scan session, releasing the camera.
    pub fn stop_scan(&mut self) -> Vec<Action> {
        scan_actions(self.scanner.stop())
    }

    /// Freezes a still frame and ends the scan session.
    pub fn capture_frame(&mut self) -> Result<Vec<Action>, ScanError> {
        self.scanner.capture().map(scan_actions)
    }

    /// Applies a collaborator result.
    pub fn handle(&mut self, input: Input) -> Vec<Action> {
        match input {
            Input::SearchTimerElapsed { ticket } => self
                .debouncer
                .timer_elapsed(ticket)
                .map(Action::Search)
                .into_iter()
                .collect(),
            Input::SearchCompleted { ticket, result } => {
                self.search_completed(ticket, result);
                Vec::new()
            }
            Input::CameraOpened { scan, result } => {
                let current =
                    self.scanner.current_scan() == Some(scan) && self.scan_phase().is_active();
                if let (Err(err), true) = (&result, current) {
                    self.notices.push(Notice::CameraUnavailable {
                        message: err.message().to_string(),
                    });
                }
                scan_actions(self.scanner.camera_opened(scan, result))
            }
            Input::DecoderReady { scan } => {
                self.scanner.decoder_ready(scan);
                Vec::new()
            }
            Input::DecoderFailed { scan, message } => {
                let was_active =
                    self.scanner.current_scan() == Some(scan) && self.scan_phase().is_active();
                let effects = self.scanner.decoder_failed(scan, message.clone());
                if was_active {
                    self.notices.push(Notice::CameraUnavailable { message });
                }
                scan_actions(effects)
            }
            Input::BarcodeDetected { scan, value } => match Barcode::new(value) {
                Ok(barcode) => scan_actions(self.scanner.detected(scan, barcode)),
                Err(err) => {
                    tracing::debug!(%scan, error = %err, "ignoring unreadable barcode");
                    Vec::new()
                }
            },
            Input::FrameCaptured { scan, result } => {
                match result {
                    Ok(frame) => self.notices.push(Notice::FrameCaptured {
                        width: frame.width,
                        height: frame.height,
                    }),
                    Err(err) => {
                        tracing::warn!(%scan, error = %err, "still frame capture failed");
                        self.notices.push(Notice::CameraUnavailable {
                            message: err.message().to_string(),
                        });
                    }
                }
                Vec::new()
            }
            Input::LookupCompleted {
                scan,
                barcode,
                result,
            } => {
                self.lookup_completed(scan, barcode, result);
                Vec::new()
            }
        }
    }

    fn clear_search(&mut self) {
        self.query.clear();
        self.results.clear();
        self.debouncer.reset();
    }

    fn search_completed(
        &mut self,
        ticket: SearchTicket,
        result: Result<Vec<FoodRecord>, LookupError>,
    ) {
        if !self.debouncer.is_current(ticket) {
            tracing::debug!(%ticket, "discarding results for a superseded query");
            return;
        }
        match result {
            Ok(records) => {
                tracing::debug!(%ticket, count = records.len(), "search results updated");
                self.results = records;
            }
            Err(err) => {
                tracing::warn!(%ticket, error = %err, "food search failed");
            }
        }
    }

    fn lookup_completed(
        &mut self,
        scan: ScanId,
        barcode: Barcode,
        result: Result<FoodRecord, LookupError>,
    ) {
        if !self.scanner.lookup_finished(scan, &barcode) {
            return;
        }
        match result {
            Ok(record) => {
                let nutrition = record.nutrition();
                let entry = self.log.add(record.description, nutrition);
                self.notices.push(Notice::ProductAdded {
                    name: entry.name().to_string(),
                });
            }
            Err(LookupError::NotFound { .. }) => {
                tracing::debug!(%barcode, "product not found");
                self.notices.push(Notice::ProductNotFound { barcode });
            }
            Err(LookupError::Failed { message }) => {
                tracing::warn!(%barcode, %message, "barcode lookup failed");
                self.notices.push(Notice::LookupFailed { barcode, message });
            }
        }
    }
}

fn scan_actions(effects: Vec<ScanEffect>) -> Vec<Action> {
    effects.into_iter().map(Action::Scan).collect()
}
