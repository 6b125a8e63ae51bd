//! Interfaces to the outside world: nutrition search, product lookup, camera
//! and barcode decoder.
//!
//! Implementations live outside this crate (HTTP clients, device drivers, test
//! fakes). Async operations return their result to the session runtime, which
//! feeds it back to the controller as an [`Input`].

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::controller::Input;
use crate::nutrition::FoodRecord;
use crate::types::{Barcode, ScanId, StreamHandle};

/// Number of results requested from the nutrition search service.
pub const SEARCH_PAGE_SIZE: usize = 5;

/// Search and product lookup failures. Both are recoverable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The barcode has no matching product.
    #[error("no product found for barcode {barcode}")]
    NotFound { barcode: String },

    /// Network, HTTP or parse failure.
    #[error("lookup failed: {message}")]
    Failed { message: String },
}

/// Camera and decoder failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// The user or platform refused camera access.
    #[error("camera permission denied: {message}")]
    PermissionDenied { message: String },

    /// The device is missing, busy or failed mid-stream.
    #[error("camera device error: {message}")]
    Device { message: String },
}

impl CameraError {
    /// The human-readable message reported by the device.
    pub fn message(&self) -> &str {
        match self {
            Self::PermissionDenied { message } | Self::Device { message } => message,
        }
    }
}

/// Which camera to prefer when several are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Rear-facing, pointed away from the user. Preferred for scanning.
    #[default]
    Environment,
    /// Front-facing.
    User,
}

/// A frozen still frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StillFrame {
    pub stream: StreamHandle,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
}

/// Free-text nutrition database search.
pub trait NutritionSearch: Send + Sync + 'static {
    /// Returns at most [`SEARCH_PAGE_SIZE`] matching records.
    fn search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<FoodRecord>, LookupError>> + Send;
}

/// Packaged product lookup by barcode.
pub trait ProductLookup: Send + Sync + 'static {
    /// Returns [`LookupError::NotFound`] when the barcode is unknown.
    fn lookup(
        &self,
        barcode: &Barcode,
    ) -> impl Future<Output = Result<FoodRecord, LookupError>> + Send;
}

/// Camera device access.
pub trait Camera: Send + Sync + 'static {
    /// Requests access and opens a live stream.
    fn open(
        &self,
        facing: FacingMode,
    ) -> impl Future<Output = Result<StreamHandle, CameraError>> + Send;

    /// Stops every track of the stream. Releasing twice is a no-op.
    fn release(&self, stream: StreamHandle);

    /// Freezes the current frame of a live stream.
    fn capture_still(&self, stream: StreamHandle) -> Result<StillFrame, CameraError>;
}

/// Barcode decoding engine observing a live stream.
///
/// `start` registers the sink for one scan session; `stop` must drop it so no
/// subscription outlives its session.
pub trait BarcodeDecoder: Send + Sync + 'static {
    fn start(&self, stream: StreamHandle, sink: DetectionSink) -> Result<(), CameraError>;

    fn stop(&self, scan: ScanId);
}

/// Callback handle given to a [`BarcodeDecoder`] for one scan session.
///
/// Every method returns `false` once the session runtime has shut down.
#[derive(Debug, Clone)]
pub struct DetectionSink {
    scan: ScanId,
    tx: mpsc::UnboundedSender<Input>,
}

impl DetectionSink {
    pub const fn new(scan: ScanId, tx: mpsc::UnboundedSender<Input>) -> Self {
        Self { scan, tx }
    }

    /// The scan session this sink reports to.
    pub const fn scan(&self) -> ScanId {
        self.scan
    }

    /// The engine initialized and is observing frames.
    pub fn ready(&self) -> bool {
        self.tx.send(Input::DecoderReady { scan: self.scan }).is_ok()
    }

    /// A frame decoded to `value`.
    pub fn detected(&self, value: impl Into<String>) -> bool {
        self.tx
            .send(Input::BarcodeDetected {
                scan: self.scan,
                value: value.into(),
            })
            .is_ok()
    }

    /// The engine stopped on an error.
    pub fn failed(&self, message: impl Into<String>) -> bool {
        self.tx
            .send(Input::DecoderFailed {
                scan: self.scan,
                message: message.into(),
            })
            .is_ok()
    }
}
