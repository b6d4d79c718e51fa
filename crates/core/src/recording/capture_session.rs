use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::capture_loop::{CaptureLoop, RecordingSummary};
use super::clock::{Clock, SystemClock};
use super::recording_config::RecordingConfig;
use super::recording_error::RecordingError;
use super::segment_writer::SegmentWriter;
use super::session_event::SessionEvent;
use super::session_logger::{NullSessionLogger, SessionLogger};
use super::session_state::SessionState;
use crate::capture::domain::device_catalog::{DeviceCatalog, DeviceInfo};
use crate::capture::domain::frame_source::FrameSource;
use crate::overlay::domain::frame_annotator::FrameAnnotator;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriterFactory;

type WorkerResult = (
    Box<dyn SessionLogger>,
    Result<RecordingSummary, RecordingError>,
);

struct Worker {
    handle: JoinHandle<WorkerResult>,
    stop: Arc<AtomicBool>,
    output_dir: PathBuf,
}

/// Command surface of the recorder: select a camera, start and stop
/// segmented recording, observe progress through [`events`](Self::events).
///
/// The capture loop runs on its own thread while recording. The session
/// only talks to it through a stop flag and the event channel, and gets
/// the camera's release and the last segment's close back when it ends.
pub struct CaptureSession {
    catalog: Box<dyn DeviceCatalog>,
    annotator: Arc<dyn FrameAnnotator>,
    new_writer: VideoWriterFactory,
    clock: Arc<dyn Clock>,
    logger: Option<Box<dyn SessionLogger>>,
    camera: Option<Box<dyn FrameSource>>,
    worker: Option<Worker>,
    outcome: Option<Result<RecordingSummary, RecordingError>>,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
}

impl CaptureSession {
    pub fn new(
        catalog: Box<dyn DeviceCatalog>,
        annotator: Arc<dyn FrameAnnotator>,
        new_writer: VideoWriterFactory,
    ) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            catalog,
            annotator,
            new_writer,
            clock: Arc::new(SystemClock::new()),
            logger: None,
            camera: None,
            worker: None,
            outcome: None,
            events_tx,
            events_rx,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn SessionLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Status notifications. All clones share one queue, so each event is
    /// delivered to exactly one receiver.
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.events_rx.clone()
    }

    pub fn state(&self) -> SessionState {
        match &self.worker {
            Some(worker) if !worker.handle.is_finished() => SessionState::Recording,
            // The loop released the camera on its way out
            Some(_) => SessionState::Idle,
            None if self.camera.is_some() => SessionState::Connected,
            None => SessionState::Idle,
        }
    }

    pub fn list_devices(&self) -> Result<Vec<DeviceInfo>, RecordingError> {
        self.catalog.list_devices().map_err(|e| {
            RecordingError::DeviceUnavailable(format!("cannot enumerate cameras: {e}"))
        })
    }

    /// Selects the camera to record from. Any held camera is released
    /// first; a running recording is stopped first.
    pub fn connect(&mut self, device_id: u32) -> Result<(), RecordingError> {
        if self.worker.is_some() {
            log::info!("Stopping current recording to switch to camera {device_id}");
            self.stop();
        }
        self.release_camera();

        match self.catalog.open(device_id) {
            Ok(camera) => {
                log::info!("Connected to camera {device_id}");
                self.camera = Some(camera);
                self.publish(SessionEvent::StateChanged(SessionState::Connected));
                Ok(())
            }
            Err(e) => {
                let err = RecordingError::DeviceUnavailable(format!(
                    "cannot open camera {device_id}: {e}"
                ));
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Opens the first segment and starts the capture loop.
    ///
    /// Configuration problems are reported before the camera or any file is
    /// touched and leave the session connected.
    pub fn start(&mut self, config: RecordingConfig) -> Result<(), RecordingError> {
        self.reap_finished();
        if self.worker.is_some() {
            return Err(RecordingError::InvalidState {
                command: "start",
                state: SessionState::Recording,
            });
        }
        config.validate()?;

        let Some(mut camera) = self.camera.take() else {
            return Err(RecordingError::DeviceUnavailable(
                "no camera connected".into(),
            ));
        };

        if let Err(e) = camera.request_resolution(config.resolution) {
            log::warn!("Camera rejected {}: {e}", config.resolution);
        }
        let mut negotiated = camera.resolution();
        if !negotiated.is_valid() {
            log::warn!(
                "Camera did not report its resolution, assuming {}",
                config.resolution
            );
            negotiated = config.resolution;
        } else if negotiated != config.resolution {
            log::info!(
                "Camera delivers {negotiated} instead of requested {}",
                config.resolution
            );
        }
        let metadata =
            VideoMetadata::for_encoding(negotiated.width, negotiated.height, config.fps);

        let started_at = self.clock.elapsed();
        let first = match SegmentWriter::open(
            &config.output_dir,
            1,
            &self.clock.wall_time(),
            &metadata,
            (self.new_writer)(),
        ) {
            Ok(segment) => segment,
            Err(e) => {
                camera.release();
                self.fail(&e);
                return Err(e);
            }
        };
        self.publish(SessionEvent::SegmentOpened {
            sequence: first.sequence(),
            path: first.path().to_path_buf(),
        });

        let stop = Arc::new(AtomicBool::new(false));
        let logger = self
            .logger
            .take()
            .unwrap_or_else(|| Box::new(NullSessionLogger));
        let output_dir = config.output_dir.clone();
        let capture = CaptureLoop::new(
            camera,
            first,
            started_at,
            Arc::clone(&self.annotator),
            Arc::clone(&self.new_writer),
            Arc::clone(&self.clock),
            config,
            metadata,
            Arc::clone(&stop),
            self.events_tx.clone(),
            logger,
        );

        self.outcome = None;
        self.publish(SessionEvent::StateChanged(SessionState::Recording));
        let handle = thread::spawn(move || capture.run());
        self.worker = Some(Worker {
            handle,
            stop,
            output_dir,
        });
        Ok(())
    }

    /// Ends the running recording and waits until its last segment is
    /// closed and the camera released. No-op when not recording.
    pub fn stop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.stop.store(true, Ordering::Relaxed);
        }
        self.join_worker();
    }

    /// Blocks until the running recording ends by itself (device lost,
    /// write failure). Returns immediately when not recording; never
    /// returns for a healthy recording unless another thread stops it.
    pub fn wait(&mut self) {
        self.join_worker();
    }

    /// Result of the last finished recording, once.
    pub fn take_outcome(&mut self) -> Option<Result<RecordingSummary, RecordingError>> {
        self.reap_finished();
        self.outcome.take()
    }

    fn reap_finished(&mut self) {
        if self
            .worker
            .as_ref()
            .is_some_and(|w| w.handle.is_finished())
        {
            self.join_worker();
        }
    }

    fn join_worker(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        match worker.handle.join() {
            Ok((logger, outcome)) => {
                self.logger = Some(logger);
                self.outcome = Some(outcome);
            }
            Err(_) => {
                let err = RecordingError::WriteFailure {
                    path: worker.output_dir,
                    reason: "capture thread panicked".into(),
                };
                log::error!("{err}");
                self.fail(&err);
                self.outcome = Some(Err(err));
            }
        }
    }

    fn release_camera(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            camera.release();
        }
    }

    fn fail(&self, err: &RecordingError) {
        self.publish(SessionEvent::Failed {
            kind: err.kind(),
            message: err.to_string(),
        });
        self.publish(SessionEvent::StateChanged(SessionState::Idle));
    }

    fn publish(&self, event: SessionEvent) {
        let _ = self.events_tx.send(event);
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
        self.release_camera();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::domain::frame_annotator::OverlayError;
    use crate::recording::recording_error::ErrorKind;
    use crate::shared::frame::Frame;
    use crate::shared::resolution::Resolution;
    use crate::video::domain::video_writer::VideoWriter;
    use chrono::{DateTime, Local, TimeZone};
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    /// What the test can observe about one opened camera.
    #[derive(Default)]
    struct CameraProbe {
        reads: AtomicUsize,
        resolution_requests: AtomicUsize,
        released: AtomicBool,
    }

    struct StubCamera {
        probe: Arc<CameraProbe>,
        frames_before_loss: Option<usize>,
    }

    impl FrameSource for StubCamera {
        fn request_resolution(&mut self, _: Resolution) -> Result<(), Box<dyn std::error::Error>> {
            self.probe.resolution_requests.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn resolution(&self) -> Resolution {
            // Ignores the request, like a webcam without a 720p mode
            Resolution::new(8, 6)
        }

        fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
            let index = self.probe.reads.fetch_add(1, Ordering::SeqCst);
            if self.frames_before_loss.is_some_and(|n| index >= n) {
                return Ok(None);
            }
            Ok(Some(Frame::new(vec![10; 8 * 6 * 3], 8, 6, 3, index)))
        }

        fn release(&mut self) {
            self.probe.released.store(true, Ordering::SeqCst);
        }
    }

    struct StubCatalog {
        devices: Vec<DeviceInfo>,
        opened: Arc<Mutex<Vec<Arc<CameraProbe>>>>,
        frames_before_loss: Option<usize>,
    }

    impl DeviceCatalog for StubCatalog {
        fn list_devices(&self) -> Result<Vec<DeviceInfo>, Box<dyn std::error::Error>> {
            Ok(self.devices.clone())
        }

        fn open(&self, index: u32) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
            if !self.devices.iter().any(|d| d.index == index) {
                return Err(format!("no camera at index {index}").into());
            }
            let probe = Arc::new(CameraProbe::default());
            self.opened.lock().unwrap().push(Arc::clone(&probe));
            Ok(Box::new(StubCamera {
                probe,
                frames_before_loss: self.frames_before_loss,
            }))
        }
    }

    #[derive(Default)]
    struct WriterLog {
        created: usize,
        opened: Vec<(PathBuf, u32, u32)>,
        frames: usize,
        closed: usize,
    }

    struct StubWriter {
        log: Arc<Mutex<WriterLog>>,
        fail_open: bool,
    }

    impl VideoWriter for StubWriter {
        fn open(&mut self, path: &Path, meta: &VideoMetadata) -> Result<(), Box<dyn std::error::Error>> {
            if self.fail_open {
                return Err("read-only file system".into());
            }
            std::fs::write(path, b"")?;
            self.log
                .lock()
                .unwrap()
                .opened
                .push((path.to_path_buf(), meta.width, meta.height));
            Ok(())
        }

        fn write(&mut self, _: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            self.log.lock().unwrap().frames += 1;
            Ok(())
        }

        fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            self.log.lock().unwrap().closed += 1;
            Ok(())
        }
    }

    struct PassThrough;

    impl FrameAnnotator for PassThrough {
        fn annotate(&self, frame: &Frame, _: &str) -> Result<Frame, OverlayError> {
            Ok(frame.clone())
        }
    }

    /// Virtual time; every sleep completes instantly.
    struct ManualClock {
        now: Mutex<Duration>,
        base: DateTime<Local>,
    }

    impl Clock for ManualClock {
        fn elapsed(&self) -> Duration {
            *self.now.lock().unwrap()
        }

        fn wall_time(&self) -> DateTime<Local> {
            self.base + chrono::Duration::from_std(self.elapsed()).unwrap()
        }

        fn sleep(&self, duration: Duration) {
            *self.now.lock().unwrap() += duration;
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        opened: Arc<Mutex<Vec<Arc<CameraProbe>>>>,
        writers: Arc<Mutex<WriterLog>>,
        session: CaptureSession,
    }

    impl Fixture {
        fn probe(&self, n: usize) -> Arc<CameraProbe> {
            Arc::clone(&self.opened.lock().unwrap()[n])
        }

        fn config(&self) -> RecordingConfig {
            RecordingConfig::new(self.dir.path(), 50, 1, Resolution::new(1280, 720))
        }
    }

    fn fixture(frames_before_loss: Option<usize>, fail_open: bool, manual_clock: bool) -> Fixture {
        let opened = Arc::new(Mutex::new(Vec::new()));
        let catalog = StubCatalog {
            devices: vec![
                DeviceInfo {
                    index: 0,
                    name: "Integrated Camera".into(),
                },
                DeviceInfo {
                    index: 2,
                    name: "USB Camera".into(),
                },
            ],
            opened: Arc::clone(&opened),
            frames_before_loss,
        };

        let writers = Arc::new(Mutex::new(WriterLog::default()));
        let log = Arc::clone(&writers);
        let new_writer: VideoWriterFactory = Arc::new(move || -> Box<dyn VideoWriter> {
            log.lock().unwrap().created += 1;
            Box::new(StubWriter {
                log: Arc::clone(&log),
                fail_open,
            })
        });

        let mut session = CaptureSession::new(Box::new(catalog), Arc::new(PassThrough), new_writer);
        if manual_clock {
            session = session.with_clock(Arc::new(ManualClock {
                now: Mutex::new(Duration::ZERO),
                base: Local.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            }));
        }

        Fixture {
            dir: tempfile::tempdir().unwrap(),
            opened,
            writers,
            session,
        }
    }

    #[test]
    fn test_list_devices() {
        let f = fixture(None, false, false);
        let devices = f.session.list_devices().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].name, "USB Camera");
    }

    #[test]
    fn test_connect_moves_to_connected() {
        let mut f = fixture(None, false, false);
        assert_eq!(f.session.state(), SessionState::Idle);
        f.session.connect(0).unwrap();
        assert_eq!(f.session.state(), SessionState::Connected);
    }

    #[test]
    fn test_connect_to_missing_device_is_device_unavailable() {
        let mut f = fixture(None, false, false);
        let err = f.session.connect(7).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
        assert_eq!(f.session.state(), SessionState::Idle);
    }

    #[test]
    fn test_reconnect_releases_previous_camera() {
        let mut f = fixture(None, false, false);
        f.session.connect(0).unwrap();
        f.session.connect(2).unwrap();

        assert!(f.probe(0).released.load(Ordering::SeqCst));
        assert!(!f.probe(1).released.load(Ordering::SeqCst));
        assert_eq!(f.session.state(), SessionState::Connected);
    }

    #[test]
    fn test_start_without_camera_is_device_unavailable() {
        let mut f = fixture(None, false, false);
        let config = f.config();
        let err = f.session.start(config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
    }

    #[test]
    fn test_missing_directory_rejected_before_touching_camera() {
        let mut f = fixture(None, false, false);
        f.session.connect(0).unwrap();

        let mut config = f.config();
        config.output_dir = f.dir.path().join("does-not-exist");
        let err = f.session.start(config).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        assert_eq!(f.session.state(), SessionState::Connected);
        let probe = f.probe(0);
        assert_eq!(probe.reads.load(Ordering::SeqCst), 0);
        assert_eq!(probe.resolution_requests.load(Ordering::SeqCst), 0);
        assert!(!probe.released.load(Ordering::SeqCst));
        assert_eq!(f.writers.lock().unwrap().created, 0);
    }

    #[test]
    fn test_zero_fps_keeps_session_connected() {
        let mut f = fixture(None, false, false);
        f.session.connect(0).unwrap();
        let mut config = f.config();
        config.fps = 0;

        assert!(f.session.start(config).unwrap_err().is_recoverable());
        assert_eq!(f.session.state(), SessionState::Connected);
    }

    #[test]
    fn test_unwritable_output_releases_camera() {
        let mut f = fixture(None, true, false);
        f.session.connect(0).unwrap();
        let events = f.session.events();

        let config = f.config();
        let err = f.session.start(config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutputUnavailable);
        assert_eq!(f.session.state(), SessionState::Idle);
        assert!(f.probe(0).released.load(Ordering::SeqCst));

        let events: Vec<_> = events.try_iter().collect();
        assert!(events.contains(&SessionEvent::StateChanged(SessionState::Idle)));
    }

    #[test]
    fn test_start_stop_records_and_returns_to_idle() {
        let mut f = fixture(None, false, false);
        let events = f.session.events();
        f.session.connect(0).unwrap();
        let config = f.config();
        f.session.start(config).unwrap();
        assert_eq!(f.session.state(), SessionState::Recording);

        thread::sleep(Duration::from_millis(200));
        f.session.stop();

        assert_eq!(f.session.state(), SessionState::Idle);
        let summary = f.session.take_outcome().unwrap().unwrap();
        assert_eq!(summary.segments.len(), 1);
        assert!(summary.total_frames() > 0);
        assert!(f.probe(0).released.load(Ordering::SeqCst));

        let log = f.writers.lock().unwrap();
        assert_eq!(log.closed, 1);
        assert_eq!(log.frames, summary.total_frames());

        let events: Vec<_> = events.try_iter().collect();
        assert_eq!(events[0], SessionEvent::StateChanged(SessionState::Connected));
        assert!(matches!(events[1], SessionEvent::SegmentOpened { sequence: 1, .. }));
        assert_eq!(events[2], SessionEvent::StateChanged(SessionState::Recording));
        assert_eq!(
            events.last(),
            Some(&SessionEvent::StateChanged(SessionState::Idle))
        );
    }

    #[test]
    fn test_writer_uses_negotiated_resolution() {
        let mut f = fixture(None, false, false);
        f.session.connect(0).unwrap();
        let config = f.config();
        f.session.start(config).unwrap();
        f.session.stop();

        let log = f.writers.lock().unwrap();
        let (_, width, height) = &log.opened[0];
        assert_eq!((*width, *height), (8, 6));
        assert_eq!(f.probe(0).resolution_requests.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut f = fixture(None, false, false);
        f.session.stop();
        f.session.connect(0).unwrap();
        f.session.stop();
        assert_eq!(f.session.state(), SessionState::Connected);

        let config = f.config();
        f.session.start(config).unwrap();
        f.session.stop();
        f.session.stop();
        assert_eq!(f.session.state(), SessionState::Idle);
        assert_eq!(f.writers.lock().unwrap().closed, 1);
    }

    #[test]
    fn test_second_start_while_recording_is_rejected() {
        let mut f = fixture(None, false, false);
        f.session.connect(0).unwrap();
        let config = f.config();
        f.session.start(config.clone()).unwrap();

        let err = f.session.start(config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(!err.is_recoverable());
        assert_eq!(f.session.state(), SessionState::Recording);
        assert!(!f
            .session
            .events()
            .try_iter()
            .any(|e| matches!(e, SessionEvent::Failed { .. })));
        f.session.stop();
    }

    #[test]
    fn test_device_loss_returns_to_idle_with_segment_closed() {
        let mut f = fixture(Some(12), false, true);
        let events = f.session.events();
        f.session.connect(0).unwrap();
        let config = f.config();
        f.session.start(config).unwrap();
        f.session.wait();

        assert_eq!(f.session.state(), SessionState::Idle);
        let err = f.session.take_outcome().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
        assert!(f.probe(0).released.load(Ordering::SeqCst));

        let log = f.writers.lock().unwrap();
        assert_eq!(log.frames, 12);
        assert_eq!(log.closed, 1);

        let events: Vec<_> = events.try_iter().collect();
        assert!(events.iter().any(|e| matches!(
            e,
            SessionEvent::Failed {
                kind: ErrorKind::DeviceUnavailable,
                ..
            }
        )));
    }

    #[test]
    fn test_reconnect_after_device_loss() {
        let mut f = fixture(Some(3), false, true);
        f.session.connect(0).unwrap();
        let config = f.config();
        f.session.start(config).unwrap();
        f.session.wait();

        f.session.connect(2).unwrap();
        assert_eq!(f.session.state(), SessionState::Connected);
    }

    #[test]
    fn test_connect_while_recording_stops_first() {
        let mut f = fixture(None, false, false);
        f.session.connect(0).unwrap();
        let config = f.config();
        f.session.start(config).unwrap();
        thread::sleep(Duration::from_millis(50));

        f.session.connect(2).unwrap();
        assert_eq!(f.session.state(), SessionState::Connected);
        assert!(f.probe(0).released.load(Ordering::SeqCst));
        assert_eq!(f.writers.lock().unwrap().closed, 1);
        assert!(f.session.take_outcome().unwrap().is_ok());
    }

    #[test]
    fn test_logger_is_returned_after_recording() {
        let mut f = fixture(None, false, false);
        f.session.connect(0).unwrap();
        let config = f.config();
        f.session.start(config).unwrap();
        assert!(f.session.logger.is_none());
        f.session.stop();
        assert!(f.session.logger.is_some());
    }
}
