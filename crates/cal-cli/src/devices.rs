//! Terminal stand-ins for the camera and barcode decoder.
//!
//! A terminal has no camera, so `cal session` uses a simulated one whose
//! availability and permission latency come from config. Barcodes are typed
//! by the user and fed to the [`LineDecoder`], which forwards them to whichever
//! scan session currently has it registered.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cal_core::{
    BarcodeDecoder, Camera, CameraError, DetectionSink, FacingMode, ScanId, StillFrame,
    StreamHandle,
};
use chrono::Utc;

use crate::config::CameraConfig;

const FRAME_WIDTH: u32 = 1280;
const FRAME_HEIGHT: u32 = 720;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A camera that grants or denies access after a fixed delay.
#[derive(Debug, Clone)]
pub struct SimulatedCamera {
    available: bool,
    grant_delay: Duration,
    next_stream: Arc<AtomicU64>,
    open: Arc<Mutex<HashSet<StreamHandle>>>,
}

impl SimulatedCamera {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            available: config.available,
            grant_delay: Duration::from_millis(config.grant_delay_ms),
            next_stream: Arc::new(AtomicU64::new(0)),
            open: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Number of streams currently held open.
    pub fn open_streams(&self) -> usize {
        lock(&self.open).len()
    }
}

impl Camera for SimulatedCamera {
    async fn open(&self, facing: FacingMode) -> Result<StreamHandle, CameraError> {
        tokio::time::sleep(self.grant_delay).await;
        if !self.available {
            return Err(CameraError::PermissionDenied {
                message: "Permission denied: no camera available".to_string(),
            });
        }
        let stream = StreamHandle::new(self.next_stream.fetch_add(1, Ordering::Relaxed) + 1);
        lock(&self.open).insert(stream);
        tracing::debug!(%stream, ?facing, "simulated camera opened");
        Ok(stream)
    }

    fn release(&self, stream: StreamHandle) {
        if lock(&self.open).remove(&stream) {
            tracing::debug!(%stream, "simulated camera released");
        }
    }

    fn capture_still(&self, stream: StreamHandle) -> Result<StillFrame, CameraError> {
        if !lock(&self.open).contains(&stream) {
            return Err(CameraError::Device {
                message: format!("{stream} is not open"),
            });
        }
        Ok(StillFrame {
            stream,
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            captured_at: Utc::now(),
        })
    }
}

#[derive(Debug)]
struct Registration {
    stream: StreamHandle,
    sink: DetectionSink,
}

/// A decoder fed by typed lines instead of camera frames.
///
/// Clones share the registration, so the REPL can keep one handle while the
/// session owns another.
#[derive(Debug, Clone, Default)]
pub struct LineDecoder {
    registration: Arc<Mutex<Option<Registration>>>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `value` as a detection. Returns false when no scan is listening.
    pub fn feed(&self, value: &str) -> bool {
        let registration = lock(&self.registration);
        registration.as_ref().is_some_and(|r| {
            tracing::debug!(stream = %r.stream, value, "decoder fed");
            r.sink.detected(value)
        })
    }

    pub fn is_registered(&self) -> bool {
        lock(&self.registration).is_some()
    }
}

impl BarcodeDecoder for LineDecoder {
    fn start(&self, stream: StreamHandle, sink: DetectionSink) -> Result<(), CameraError> {
        let mut registration = lock(&self.registration);
        sink.ready();
        *registration = Some(Registration { stream, sink });
        Ok(())
    }

    fn stop(&self, scan: ScanId) {
        let mut registration = lock(&self.registration);
        if registration.as_ref().is_some_and(|r| r.sink.scan() == scan) {
            *registration = None;
        }
    }
}
