//! Scan session state machine.
//!
//! Owns the camera stream handle and the decoder registration for one scan at
//! a time. Transitions are synchronous: each returns the [`ScanEffect`]s the
//! runtime must perform, in order. The stream handle is taken out of the
//! session exactly once, so a stream is released exactly once whichever way
//! the session ends.
//!
//! ```text
//! Idle ─start─▶ RequestingPermission ─granted─▶ Streaming ─ready─▶ Detecting
//!                     │                            │                 │
//!                   denied                  capture/stop/detect  capture/stop/detect
//!                     ▼                            ▼                 ▼
//!               PermissionError          Captured | Stopped   Captured | Stopped
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collaborator::{CameraError, FacingMode};
use crate::types::{Barcode, ScanId, StreamHandle};

/// Lifecycle phase of the current scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    #[default]
    Idle,
    RequestingPermission,
    Streaming,
    Detecting,
    Captured,
    Stopped,
    PermissionError,
}

impl ScanPhase {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::RequestingPermission => "requesting_permission",
            Self::Streaming => "streaming",
            Self::Detecting => "detecting",
            Self::Captured => "captured",
            Self::Stopped => "stopped",
            Self::PermissionError => "permission_error",
        }
    }

    /// Whether the session is over. A new scan starts a fresh session.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Captured | Self::Stopped | Self::PermissionError)
    }

    /// Whether a session is in progress.
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Idle) && !self.is_terminal()
    }
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected scan operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ScanError {
    /// Only one scan session may be in progress.
    #[error("a scan is already in progress ({phase})")]
    AlreadyActive { phase: ScanPhase },

    /// Capture needs a live stream.
    #[error("no live camera stream to capture from ({phase})")]
    NotStreaming { phase: ScanPhase },
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEffect {
    RequestCamera { scan: ScanId, facing: FacingMode },
    StartDecoder { scan: ScanId, stream: StreamHandle },
    StopDecoder { scan: ScanId },
    ReleaseStream { stream: StreamHandle },
    CaptureStill { scan: ScanId, stream: StreamHandle },
    LookupBarcode { scan: ScanId, barcode: Barcode },
}

/// State of one scan session.
#[derive(Debug, Clone)]
struct ScanSession {
    id: ScanId,
    phase: ScanPhase,
    stream: Option<StreamHandle>,
    decoder_running: bool,
    detection: Option<Barcode>,
    lookup_pending: bool,
    error: Option<CameraError>,
}

impl ScanSession {
    const fn new(id: ScanId) -> Self {
        Self {
            id,
            phase: ScanPhase::RequestingPermission,
            stream: None,
            decoder_running: false,
            detection: None,
            lookup_pending: false,
            error: None,
        }
    }

    /// Unregisters the decoder and releases the stream, if held.
    fn teardown(&mut self, effects: &mut Vec<ScanEffect>) {
        if std::mem::take(&mut self.decoder_running) {
            effects.push(ScanEffect::StopDecoder { scan: self.id });
        }
        if let Some(stream) = self.stream.take() {
            effects.push(ScanEffect::ReleaseStream { stream });
        }
    }
}

/// The scan state machine. Holds the latest session, including a finished one,
/// so its outcome stays observable until the next `start`.
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    last_id: ScanId,
    session: Option<ScanSession>,
}

impl Scanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ScanPhase {
        self.session.as_ref().map_or(ScanPhase::Idle, |s| s.phase)
    }

    /// ID of the latest session, if any was started.
    pub fn current_scan(&self) -> Option<ScanId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// The live stream handle, if the camera is held.
    pub fn stream(&self) -> Option<StreamHandle> {
        self.session.as_ref().and_then(|s| s.stream)
    }

    /// The error that ended the session in [`ScanPhase::PermissionError`].
    pub fn error(&self) -> Option<&CameraError> {
        self.session.as_ref().and_then(|s| s.error.as_ref())
    }

    /// The barcode accepted by the latest session.
    pub fn detection(&self) -> Option<&Barcode> {
        self.session.as_ref().and_then(|s| s.detection.as_ref())
    }

    /// Whether a detected barcode is waiting for its lookup result.
    pub fn is_awaiting_lookup(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.lookup_pending)
    }

    fn session_mut(&mut self, scan: ScanId) -> Option<&mut ScanSession> {
        self.session.as_mut().filter(|s| s.id == scan)
    }

    /// Begins a new session and requests the rear camera.
    pub fn start(&mut self) -> Result<(ScanId, Vec<ScanEffect>), ScanError> {
        let phase = self.phase();
        if phase.is_active() {
            return Err(ScanError::AlreadyActive { phase });
        }
        if self.is_awaiting_lookup() {
            tracing::debug!("new scan supersedes pending barcode lookup");
        }

        self.last_id = self.last_id.next();
        let scan = self.last_id;
        self.session = Some(ScanSession::new(scan));
        tracing::debug!(%scan, "scan session requesting camera");

        Ok((
            scan,
            vec![ScanEffect::RequestCamera {
                scan,
                facing: FacingMode::Environment,
            }],
        ))
    }

    /// Ends the session from any state. Idempotent.
    ///
    /// A pending barcode lookup is abandoned: its result will be discarded.
    pub fn stop(&mut self) -> Vec<ScanEffect> {
        let mut effects = Vec::new();
        let Some(session) = self.session.as_mut() else {
            return effects;
        };

        session.lookup_pending = false;
        if session.phase.is_active() {
            session.teardown(&mut effects);
            session.phase = ScanPhase::Stopped;
            tracing::debug!(scan = %session.id, "scan session stopped");
        }
        effects
    }

    /// Freezes one frame and ends the session without decoding.
    pub fn capture(&mut self) -> Result<Vec<ScanEffect>, ScanError> {
        let phase = self.phase();
        let session = self
            .session
            .as_mut()
            .filter(|s| matches!(s.phase, ScanPhase::Streaming | ScanPhase::Detecting))
            .ok_or(ScanError::NotStreaming { phase })?;
        let stream = session.stream.ok_or(ScanError::NotStreaming { phase })?;

        let mut effects = vec![ScanEffect::CaptureStill {
            scan: session.id,
            stream,
        }];
        session.teardown(&mut effects);
        session.phase = ScanPhase::Captured;
        tracing::debug!(scan = %session.id, "frame captured, scan session ended");
        Ok(effects)
    }

    /// Handles the outcome of a camera request.
    ///
    /// A stream granted to a session that has since ended is released at once.
    pub fn camera_opened(
        &mut self,
        scan: ScanId,
        result: Result<StreamHandle, CameraError>,
    ) -> Vec<ScanEffect> {
        let waiting = self
            .session_mut(scan)
            .filter(|s| s.phase == ScanPhase::RequestingPermission);

        match (waiting, result) {
            (Some(session), Ok(stream)) => {
                session.stream = Some(stream);
                session.decoder_running = true;
                session.phase = ScanPhase::Streaming;
                tracing::debug!(%scan, %stream, "camera granted, starting decoder");
                vec![ScanEffect::StartDecoder { scan, stream }]
            }
            (Some(session), Err(err)) => {
                tracing::debug!(%scan, error = %err, "camera unavailable");
                session.error = Some(err);
                session.phase = ScanPhase::PermissionError;
                Vec::new()
            }
            (None, Ok(stream)) => {
                tracing::debug!(%scan, %stream, "releasing stream granted to an ended scan");
                vec![ScanEffect::ReleaseStream { stream }]
            }
            (None, Err(err)) => {
                tracing::debug!(%scan, error = %err, "ignoring camera error for an ended scan");
                Vec::new()
            }
        }
    }

    /// The decoder initialized and is observing frames.
    pub fn decoder_ready(&mut self, scan: ScanId) {
        if let Some(session) = self
            .session_mut(scan)
            .filter(|s| s.phase == ScanPhase::Streaming)
        {
            session.phase = ScanPhase::Detecting;
            tracing::debug!(%scan, "decoder ready, detecting");
        }
    }

    /// The decoder failed; the session ends in the error state.
    pub fn decoder_failed(&mut self, scan: ScanId, message: String) -> Vec<ScanEffect> {
        let mut effects = Vec::new();
        if let Some(session) = self.session_mut(scan).filter(|s| s.phase.is_active()) {
            session.teardown(&mut effects);
            tracing::debug!(%scan, %message, "decoder failed");
            session.error = Some(CameraError::Device { message });
            session.phase = ScanPhase::PermissionError;
        }
        effects
    }

    /// Accepts the first barcode of a session and hands it to lookup.
    ///
    /// Detections for any other session, or after the first, are ignored.
    pub fn detected(&mut self, scan: ScanId, barcode: Barcode) -> Vec<ScanEffect> {
        let mut effects = Vec::new();
        let Some(session) = self
            .session_mut(scan)
            .filter(|s| matches!(s.phase, ScanPhase::Streaming | ScanPhase::Detecting))
        else {
            tracing::debug!(%scan, %barcode, "ignoring detection outside an active scan");
            return effects;
        };

        session.teardown(&mut effects);
        session.phase = ScanPhase::Stopped;
        session.lookup_pending = true;
        session.detection = Some(barcode.clone());
        tracing::debug!(%scan, %barcode, "barcode accepted, scan session stopped");
        effects.push(ScanEffect::LookupBarcode { scan, barcode });
        effects
    }

    /// Settles a lookup. Returns whether its result may be applied.
    pub fn lookup_finished(&mut self, scan: ScanId, barcode: &Barcode) -> bool {
        match self.session_mut(scan) {
            Some(session)
                if session.lookup_pending && session.detection.as_ref() == Some(barcode) =>
            {
                session.lookup_pending = false;
                true
            }
            _ => {
                tracing::debug!(%scan, %barcode, "discarding lookup for an abandoned scan");
                false
            }
        }
    }
}
