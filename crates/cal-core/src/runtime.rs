//! Session runtime: runs a [`SessionController`] against real collaborators.
//!
//! All state lives in the controller and is only touched from the task that
//! owns the [`Session`]. Network calls, camera requests and debounce timers run
//! as spawned tasks that report back over a channel; [`Session::step`] applies
//! one report at a time. Synchronous effects (decoder start/stop, stream
//! release, still capture) are performed inline, in the order the controller
//! returned them.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::collaborator::{BarcodeDecoder, Camera, DetectionSink, NutritionSearch, ProductLookup};
use crate::controller::{Action, Input, Notice, SessionConfig, SessionController};
use crate::debounce::SearchRequest;
use crate::log::{FoodEntry, LogError};
use crate::scan::{ScanEffect, ScanError};
use crate::types::ScanId;

/// The external services a session talks to.
#[derive(Debug, Clone)]
pub struct Collaborators<S, L, C, D> {
    pub search: S,
    pub lookup: L,
    pub camera: C,
    pub decoder: D,
}

/// A running food logging session.
///
/// Dropping the session stops any scan in progress, so the camera is never
/// left open.
pub struct Session<S, L, C, D>
where
    S: NutritionSearch,
    L: ProductLookup,
    C: Camera,
    D: BarcodeDecoder,
{
    controller: SessionController,
    search: Arc<S>,
    lookup: Arc<L>,
    camera: Arc<C>,
    decoder: Arc<D>,
    tx: mpsc::UnboundedSender<Input>,
    rx: mpsc::UnboundedReceiver<Input>,
    search_timer: Option<JoinHandle<()>>,
}

impl<S, L, C, D> Session<S, L, C, D>
where
    S: NutritionSearch,
    L: ProductLookup,
    C: Camera,
    D: BarcodeDecoder,
{
    pub fn new(config: &SessionConfig, collaborators: Collaborators<S, L, C, D>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            controller: SessionController::new(config),
            search: Arc::new(collaborators.search),
            lookup: Arc::new(collaborators.lookup),
            camera: Arc::new(collaborators.camera),
            decoder: Arc::new(collaborators.decoder),
            tx,
            rx,
            search_timer: None,
        }
    }

    /// Read access to the log, totals, search state and scan state.
    pub const fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.controller.take_notices()
    }

    pub fn on_search_input(&mut self, query: &str) {
        let actions = self.controller.on_search_input(query);
        self.dispatch(actions);
    }

    pub fn select_search_result(&mut self, index: usize) -> Result<FoodEntry, LogError> {
        let (entry, actions) = self.controller.select_search_result(index)?;
        self.dispatch(actions);
        Ok(entry)
    }

    pub fn update_servings(&mut self, index: usize, servings: f64) -> Result<(), LogError> {
        self.controller.update_servings(index, servings)
    }

    pub fn delete_entry(&mut self, index: usize) -> Result<FoodEntry, LogError> {
        self.controller.delete_entry(index)
    }

    pub fn start_scan(&mut self) -> Result<ScanId, ScanError> {
        let (scan, actions) = self.controller.start_scan()?;
        self.dispatch(actions);
        Ok(scan)
    }

    pub fn stop_scan(&mut self) {
        let actions = self.controller.stop_scan();
        self.dispatch(actions);
    }

    pub fn capture_frame(&mut self) -> Result<(), ScanError> {
        let actions = self.controller.capture_frame()?;
        self.dispatch(actions);
        Ok(())
    }

    /// Waits for the next collaborator report and applies it.
    ///
    /// Cancel-safe: if the future is dropped before a report arrives, nothing
    /// is lost.
    pub async fn step(&mut self) {
        // The session holds a sender, so the channel never closes.
        if let Some(input) = self.rx.recv().await {
            let actions = self.controller.handle(input);
            self.dispatch(actions);
        }
    }

    fn dispatch(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::ScheduleSearch { ticket, delay } => {
                    self.cancel_search_timer();
                    let tx = self.tx.clone();
                    self.search_timer = Some(tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(Input::SearchTimerElapsed { ticket });
                    }));
                }
                Action::CancelSearchTimer => self.cancel_search_timer(),
                Action::Search(request) => self.spawn_search(request),
                Action::Scan(effect) => self.apply_scan_effect(effect),
            }
        }
    }

    fn cancel_search_timer(&mut self) {
        if let Some(timer) = self.search_timer.take() {
            timer.abort();
        }
    }

    fn spawn_search(&self, request: SearchRequest) {
        let search = Arc::clone(&self.search);
        let tx = self.tx.clone();
        tracing::debug!(ticket = %request.ticket, query = %request.query, "searching foods");
        tokio::spawn(async move {
            let result = search.search(&request.query).await;
            let _ = tx.send(Input::SearchCompleted {
                ticket: request.ticket,
                result,
            });
        });
    }

    fn apply_scan_effect(&self, effect: ScanEffect) {
        match effect {
            ScanEffect::RequestCamera { scan, facing } => {
                let camera = Arc::clone(&self.camera);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = camera.open(facing).await;
                    // The session is gone, so nothing else will release it.
                    if let Err(mpsc::error::SendError(Input::CameraOpened {
                        result: Ok(stream),
                        ..
                    })) = tx.send(Input::CameraOpened { scan, result })
                    {
                        tracing::debug!(%stream, "session closed, releasing camera stream");
                        camera.release(stream);
                    }
                });
            }
            ScanEffect::StartDecoder { scan, stream } => {
                let sink = DetectionSink::new(scan, self.tx.clone());
                if let Err(err) = self.decoder.start(stream, sink) {
                    let _ = self.tx.send(Input::DecoderFailed {
                        scan,
                        message: err.message().to_string(),
                    });
                }
            }
            ScanEffect::StopDecoder { scan } => self.decoder.stop(scan),
            ScanEffect::ReleaseStream { stream } => {
                tracing::debug!(%stream, "releasing camera stream");
                self.camera.release(stream);
            }
            ScanEffect::CaptureStill { scan, stream } => {
                let result = self.camera.capture_still(stream);
                let _ = self.tx.send(Input::FrameCaptured { scan, result });
            }
            ScanEffect::LookupBarcode { scan, barcode } => {
                let lookup = Arc::clone(&self.lookup);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = lookup.lookup(&barcode).await;
                    let _ = tx.send(Input::LookupCompleted {
                        scan,
                        barcode,
                        result,
                    });
                });
            }
        }
    }
}

impl<S, L, C, D> Drop for Session<S, L, C, D>
where
    S: NutritionSearch,
    L: ProductLookup,
    C: Camera,
    D: BarcodeDecoder,
{
    fn drop(&mut self) {
        self.cancel_search_timer();
        for action in self.controller.stop_scan() {
            match action {
                Action::Scan(ScanEffect::StopDecoder { scan }) => self.decoder.stop(scan),
                Action::Scan(ScanEffect::ReleaseStream { stream }) => self.camera.release(stream),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::collaborator::{CameraError, FacingMode, LookupError, StillFrame};
    use crate::nutrition::{FoodRecord, NutrientRecord};
    use crate::scan::ScanPhase;
    use crate::types::{Barcode, StreamHandle};

    fn bar(description: &str) -> FoodRecord {
        FoodRecord::new(
            description,
            vec![
                NutrientRecord::new("Energy", 200.0),
                NutrientRecord::new("Protein", 10.0),
                NutrientRecord::new("Carbohydrate, by difference", 20.0),
                NutrientRecord::new("Total lipid (fat)", 5.0),
            ],
        )
    }

    /// Search fake that answers after a per-query delay.
    #[derive(Clone, Default)]
    struct FakeSearch {
        calls: Arc<Mutex<Vec<String>>>,
        delays: HashMap<String, Duration>,
        fail: bool,
    }

    impl NutritionSearch for FakeSearch {
        async fn search(&self, query: &str) -> Result<Vec<FoodRecord>, LookupError> {
            self.calls.lock().unwrap().push(query.to_string());
            if let Some(delay) = self.delays.get(query) {
                tokio::time::sleep(*delay).await;
            }
            if self.fail {
                return Err(LookupError::Failed {
                    message: "service unavailable".to_string(),
                });
            }
            Ok(vec![bar(&format!("{query} result"))])
        }
    }

    #[derive(Clone, Default)]
    struct FakeLookup {
        products: HashMap<String, FoodRecord>,
        delay: Duration,
    }

    impl ProductLookup for FakeLookup {
        async fn lookup(&self, barcode: &Barcode) -> Result<FoodRecord, LookupError> {
            tokio::time::sleep(self.delay).await;
            self.products
                .get(barcode.as_str())
                .cloned()
                .ok_or_else(|| LookupError::NotFound {
                    barcode: barcode.to_string(),
                })
        }
    }

    #[derive(Default)]
    struct CameraState {
        next: u64,
        open: Vec<StreamHandle>,
        released: Vec<StreamHandle>,
        facing: Vec<FacingMode>,
    }

    /// Camera fake that grants (or denies) after a permission delay.
    #[derive(Clone, Default)]
    struct FakeCamera {
        state: Arc<Mutex<CameraState>>,
        permission_delay: Duration,
        deny: bool,
    }

    impl Camera for FakeCamera {
        async fn open(&self, facing: FacingMode) -> Result<StreamHandle, CameraError> {
            tokio::time::sleep(self.permission_delay).await;
            let mut state = self.state.lock().unwrap();
            state.facing.push(facing);
            if self.deny {
                return Err(CameraError::PermissionDenied {
                    message: "Permission denied".to_string(),
                });
            }
            state.next += 1;
            let stream = StreamHandle::new(state.next);
            state.open.push(stream);
            Ok(stream)
        }

        fn release(&self, stream: StreamHandle) {
            let mut state = self.state.lock().unwrap();
            state.open.retain(|s| *s != stream);
            state.released.push(stream);
        }

        fn capture_still(&self, stream: StreamHandle) -> Result<StillFrame, CameraError> {
            Ok(StillFrame {
                stream,
                width: 1280,
                height: 720,
                captured_at: Utc::now(),
            })
        }
    }

    /// Decoder fake: the test fires detections through the registered sink.
    #[derive(Clone, Default)]
    struct FakeDecoder {
        sink: Arc<Mutex<Option<DetectionSink>>>,
    }

    impl FakeDecoder {
        fn emit(&self, value: &str) {
            let sink = self.sink.lock().unwrap().clone().expect("decoder not started");
            sink.detected(value);
        }

        fn registered(&self) -> bool {
            self.sink.lock().unwrap().is_some()
        }
    }

    impl BarcodeDecoder for FakeDecoder {
        fn start(&self, _stream: StreamHandle, sink: DetectionSink) -> Result<(), CameraError> {
            sink.ready();
            *self.sink.lock().unwrap() = Some(sink);
            Ok(())
        }

        fn stop(&self, scan: ScanId) {
            let mut sink = self.sink.lock().unwrap();
            if sink.as_ref().is_some_and(|s| s.scan() == scan) {
                *sink = None;
            }
        }
    }

    type TestSession = Session<FakeSearch, FakeLookup, FakeCamera, FakeDecoder>;

    fn session(
        search: FakeSearch,
        lookup: FakeLookup,
        camera: FakeCamera,
        decoder: FakeDecoder,
    ) -> TestSession {
        Session::new(
            &SessionConfig::default(),
            Collaborators {
                search,
                lookup,
                camera,
                decoder,
            },
        )
    }

    /// Applies reports until nothing else happens for a long (virtual) while.
    async fn settle(session: &mut TestSession) {
        while tokio::time::timeout(Duration::from_secs(10), session.step())
            .await
            .is_ok()
        {}
    }

    #[tokio::test(start_paused = true)]
    async fn typing_burst_sends_one_search() {
        let search = FakeSearch::default();
        let calls = Arc::clone(&search.calls);
        let mut session = session(
            search,
            FakeLookup::default(),
            FakeCamera::default(),
            FakeDecoder::default(),
        );

        session.on_search_input("a");
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.on_search_input("ap");
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.on_search_input("app");
        settle(&mut session).await;

        assert_eq!(*calls.lock().unwrap(), vec!["app".to_string()]);
        assert_eq!(
            session.controller().search_results()[0].description,
            "app result"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_periods_each_send_a_search() {
        let search = FakeSearch::default();
        let calls = Arc::clone(&search.calls);
        let mut session = session(
            search,
            FakeLookup::default(),
            FakeCamera::default(),
            FakeDecoder::default(),
        );

        session.on_search_input("oat");
        settle(&mut session).await;
        session.on_search_input("oats");
        settle(&mut session).await;

        assert_eq!(*calls.lock().unwrap(), vec!["oat".to_string(), "oats".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_stale_response_does_not_overwrite_newer_results() {
        let mut search = FakeSearch::default();
        search
            .delays
            .insert("chick".to_string(), Duration::from_secs(3));
        let mut session = session(
            search,
            FakeLookup::default(),
            FakeCamera::default(),
            FakeDecoder::default(),
        );

        session.on_search_input("chick");
        // Let the debounce fire so the slow request is in flight.
        tokio::time::sleep(Duration::from_millis(350)).await;
        session.step().await;
        session.on_search_input("chicken");
        settle(&mut session).await;

        assert_eq!(
            session.controller().search_results()[0].description,
            "chicken result"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn empty_input_skips_network() {
        let search = FakeSearch::default();
        let calls = Arc::clone(&search.calls);
        let mut session = session(
            search,
            FakeLookup::default(),
            FakeCamera::default(),
            FakeDecoder::default(),
        );

        session.on_search_input("b");
        session.on_search_input("");
        settle(&mut session).await;

        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_search_is_swallowed() {
        let search = FakeSearch {
            fail: true,
            ..FakeSearch::default()
        };
        let mut session = session(
            search,
            FakeLookup::default(),
            FakeCamera::default(),
            FakeDecoder::default(),
        );

        session.on_search_input("kale");
        settle(&mut session).await;

        assert!(session.controller().search_results().is_empty());
        assert!(session.take_notices().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn selected_result_totals_end_to_end() {
        let mut session = session(
            FakeSearch::default(),
            FakeLookup::default(),
            FakeCamera::default(),
            FakeDecoder::default(),
        );

        session.on_search_input("bar");
        settle(&mut session).await;
        session.select_search_result(0).unwrap();
        session.update_servings(0, 2.0).unwrap();

        let totals = session.controller().totals();
        assert!((totals.calories - 400.0).abs() < 1e-9);
        assert!((totals.protein - 20.0).abs() < 1e-9);
        assert!((totals.carbs - 40.0).abs() < 1e-9);
        assert!((totals.fat - 10.0).abs() < 1e-9);
        assert_eq!(session.controller().search_query(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_permission_request_releases_late_stream() {
        let camera = FakeCamera {
            permission_delay: Duration::from_secs(2),
            ..FakeCamera::default()
        };
        let state = Arc::clone(&camera.state);
        let decoder = FakeDecoder::default();
        let mut session = session(
            FakeSearch::default(),
            FakeLookup::default(),
            camera,
            decoder.clone(),
        );

        session.start_scan().unwrap();
        session.stop_scan();
        assert_eq!(session.controller().scan_phase(), ScanPhase::Stopped);
        settle(&mut session).await;

        let state = state.lock().unwrap();
        assert!(state.open.is_empty(), "stream left open: {:?}", state.open);
        assert_eq!(state.released, vec![StreamHandle::new(1)]);
        assert!(!decoder.registered());
    }

    #[tokio::test(start_paused = true)]
    async fn scanned_barcode_not_found_leaves_log_unchanged() {
        let camera = FakeCamera::default();
        let state = Arc::clone(&camera.state);
        let decoder = FakeDecoder::default();
        let mut session = session(
            FakeSearch::default(),
            FakeLookup::default(),
            camera,
            decoder.clone(),
        );

        session.start_scan().unwrap();
        settle(&mut session).await;
        assert_eq!(session.controller().scan_phase(), ScanPhase::Detecting);
        assert_eq!(state.lock().unwrap().facing, vec![FacingMode::Environment]);

        decoder.emit("0123456789012");
        settle(&mut session).await;

        assert!(session.controller().log().is_empty());
        assert_eq!(session.controller().scan_phase(), ScanPhase::Stopped);
        let notices = session.take_notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].to_string().contains("not found"));
        assert!(state.lock().unwrap().open.is_empty());
        assert!(!decoder.registered());
    }

    #[tokio::test(start_paused = true)]
    async fn scanned_barcode_found_is_logged_once() {
        let mut lookup = FakeLookup::default();
        lookup
            .products
            .insert("0123456789012".to_string(), bar("Granola bar"));
        let decoder = FakeDecoder::default();
        let mut session = session(
            FakeSearch::default(),
            lookup,
            FakeCamera::default(),
            decoder.clone(),
        );

        session.start_scan().unwrap();
        settle(&mut session).await;
        let sink = decoder.sink.lock().unwrap().clone().unwrap();
        sink.detected("0123456789012");
        sink.detected("4006381333931");
        settle(&mut session).await;

        let log = session.controller().log();
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].name(), "Granola bar");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_lookup_discards_result() {
        let mut lookup = FakeLookup {
            delay: Duration::from_secs(1),
            ..FakeLookup::default()
        };
        lookup
            .products
            .insert("0123456789012".to_string(), bar("Granola bar"));
        let decoder = FakeDecoder::default();
        let mut session = session(
            FakeSearch::default(),
            lookup,
            FakeCamera::default(),
            decoder.clone(),
        );

        session.start_scan().unwrap();
        settle(&mut session).await;
        decoder.emit("0123456789012");
        session.step().await;
        assert!(session.controller().scanner().is_awaiting_lookup());

        session.stop_scan();
        settle(&mut session).await;

        assert!(session.controller().log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn denied_camera_reports_error() {
        let camera = FakeCamera {
            deny: true,
            ..FakeCamera::default()
        };
        let state = Arc::clone(&camera.state);
        let mut session = session(
            FakeSearch::default(),
            FakeLookup::default(),
            camera,
            FakeDecoder::default(),
        );

        session.start_scan().unwrap();
        settle(&mut session).await;

        assert_eq!(session.controller().scan_phase(), ScanPhase::PermissionError);
        assert!(state.lock().unwrap().released.is_empty());
        assert_eq!(session.take_notices().len(), 1);
        // Scanning can be retried after the error.
        assert!(session.start_scan().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn capture_releases_camera() {
        let camera = FakeCamera::default();
        let state = Arc::clone(&camera.state);
        let mut session = session(
            FakeSearch::default(),
            FakeLookup::default(),
            camera,
            FakeDecoder::default(),
        );

        session.start_scan().unwrap();
        settle(&mut session).await;
        session.capture_frame().unwrap();
        settle(&mut session).await;

        assert_eq!(session.controller().scan_phase(), ScanPhase::Captured);
        assert!(state.lock().unwrap().open.is_empty());
        assert!(session.take_notices()[0].to_string().contains("1280x720"));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_session_releases_camera() {
        let camera = FakeCamera::default();
        let state = Arc::clone(&camera.state);
        let mut session = session(
            FakeSearch::default(),
            FakeLookup::default(),
            camera,
            FakeDecoder::default(),
        );

        session.start_scan().unwrap();
        settle(&mut session).await;
        assert_eq!(state.lock().unwrap().open.len(), 1);

        drop(session);

        assert!(state.lock().unwrap().open.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_session_during_permission_request_releases_late_stream() {
        let camera = FakeCamera {
            permission_delay: Duration::from_secs(2),
            ..FakeCamera::default()
        };
        let state = Arc::clone(&camera.state);
        let mut session = session(
            FakeSearch::default(),
            FakeLookup::default(),
            camera,
            FakeDecoder::default(),
        );

        session.start_scan().unwrap();
        drop(session);
        tokio::time::sleep(Duration::from_secs(5)).await;

        let state = state.lock().unwrap();
        assert!(state.open.is_empty(), "stream left open: {:?}", state.open);
        assert_eq!(state.released, vec![StreamHandle::new(1)]);
    }
}
