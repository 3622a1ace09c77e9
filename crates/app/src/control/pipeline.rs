//! Frame loop tying together capture, landmark estimation, volume control,
//! annotation, and publishing to the preview display.
//!
//! The loop is single-threaded. It idles until a `Start` command arrives, runs
//! one camera session until the camera fails or a command ends it, and then
//! returns to idle. `Shutdown` (or a closed control channel while idle) stops
//! it for good.

use std::time::Instant;

use crossbeam_channel::{Receiver, TryRecvError};
use gesture_core::{
    Hand, HandLandmark, LandmarkBackend, LandmarkList, LandmarkOptions, LandmarkSource,
    PinchMapping, Range, VolumeController, VolumeReading, VolumeSink, map_range, midpoint,
    pinch_distance,
};
use tracing::{debug, error, info, warn};
use video_ingest::{CameraBackend, CameraDevice, CameraSession, Frame};

use crate::control::{
    annotation::{FpsStyle, Overlay, PinchOverlay, render_overlay},
    config::ControlConfig,
    data::{
        ControlCommand, FRAME_HISTORY_CAPACITY, FrameHistory, FramePacket, LoopFault, LoopState,
        SessionSettings, SharedFrame, StatusBoard, StatusLevel,
    },
    encoding::encode_jpeg,
    fps::FpsCounter,
};

/// Receives every annotated frame. Publishing never fails.
pub(crate) trait FrameDisplay {
    fn publish(&mut self, packet: FramePacket);
}

/// Keeps the latest packet and a short history for the preview server.
pub(crate) struct PreviewDisplay {
    latest: SharedFrame,
    history: FrameHistory,
}

impl PreviewDisplay {
    pub(crate) fn new(latest: SharedFrame, history: FrameHistory) -> Self {
        Self { latest, history }
    }
}

impl FrameDisplay for PreviewDisplay {
    fn publish(&mut self, packet: FramePacket) {
        if let Ok(mut guard) = self.history.lock() {
            guard.push_back(packet.clone());
            if guard.len() > FRAME_HISTORY_CAPACITY {
                guard.pop_front();
            }
        }
        if let Ok(mut guard) = self.latest.lock() {
            *guard = Some(packet);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LoopMode {
    /// The first hand's pinch drives the system volume.
    Volume,
    /// Draw and log hands only.
    Track,
}

#[derive(Clone, Debug)]
pub(crate) struct LoopOptions {
    pub(crate) mode: LoopMode,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) landmarks: LandmarkOptions,
    pub(crate) mapping: PinchMapping,
    pub(crate) jpeg_quality: u8,
    pub(crate) draw_landmarks: bool,
    pub(crate) verbose: bool,
}

impl LoopOptions {
    pub(crate) fn from_config(config: &ControlConfig, mode: LoopMode) -> Self {
        Self {
            mode,
            width: config.width,
            height: config.height,
            landmarks: config.landmarks.clone(),
            mapping: PinchMapping::default(),
            jpeg_quality: config.jpeg_quality,
            draw_landmarks: config.draw_landmarks,
            verbose: config.verbose,
        }
    }
}

pub(crate) struct FrameLoop<B, L, V, D> {
    cameras: B,
    landmarks: L,
    volume: V,
    display: D,
    status: StatusBoard,
    options: LoopOptions,
    state: LoopState,
}

impl<B, L, V, D> FrameLoop<B, L, V, D>
where
    B: CameraBackend,
    L: LandmarkBackend,
    V: VolumeSink,
    D: FrameDisplay,
{
    pub(crate) fn new(
        cameras: B,
        landmarks: L,
        volume: V,
        display: D,
        status: StatusBoard,
        options: LoopOptions,
    ) -> Self {
        Self {
            cameras,
            landmarks,
            volume,
            display,
            status,
            options,
            state: LoopState::Idle,
        }
    }

    pub(crate) fn state(&self) -> LoopState {
        self.state
    }

    /// Process commands until `Shutdown`, returning the final state.
    pub(crate) fn run(&mut self, commands: &Receiver<ControlCommand>) -> LoopState {
        let mut next = None;
        loop {
            let command = match next.take() {
                Some(command) => command,
                None => match commands.recv() {
                    Ok(command) => command,
                    Err(_) => {
                        debug!("Control channel closed");
                        ControlCommand::Shutdown
                    }
                },
            };
            match command {
                ControlCommand::Start(settings) => next = self.run_session(settings, commands),
                ControlCommand::Stop => debug!("Stop requested while idle"),
                ControlCommand::Shutdown => break,
            }
        }

        self.state = LoopState::Stopped;
        self.status.set_state(LoopState::Stopped, None);
        info!("Frame loop stopped");
        self.state
    }

    /// Run one camera session and return the command that ended it, if any
    /// still needs handling.
    fn run_session(
        &mut self,
        settings: SessionSettings,
        commands: &Receiver<ControlCommand>,
    ) -> Option<ControlCommand> {
        let session_span = tracing::info_span!(
            "frameloop.session",
            camera = settings.camera_index,
            confidence = settings.detection_confidence,
            mode = ?self.options.mode
        );
        let _session_guard = session_span.enter();

        let outcome = self.drive_session(settings, commands);

        self.state = LoopState::Idle;
        self.status.set_state(LoopState::Idle, None);
        info!("Camera session ended");
        outcome
    }

    fn drive_session(
        &mut self,
        settings: SessionSettings,
        commands: &Receiver<ControlCommand>,
    ) -> Option<ControlCommand> {
        if let Err(err) = settings.validate() {
            warn!("Rejecting session settings: {err}");
            self.status.message(StatusLevel::Error, err.to_string());
            return None;
        }

        let mut camera = match CameraSession::open(&mut self.cameras, settings.camera_index) {
            Ok(camera) => camera,
            Err(err) => {
                let fault = LoopFault::CameraUnavailable(err.to_string());
                error!("{fault}");
                self.status.fault(StatusLevel::Error, &fault);
                return None;
            }
        };
        if let Err(err) = camera.configure(self.options.width, self.options.height) {
            warn!(
                "Camera ignored {}x{} request: {err}",
                self.options.width, self.options.height
            );
        }

        let landmark_options = self
            .options
            .landmarks
            .clone()
            .with_detection_confidence(settings.detection_confidence);
        let source = match self.landmarks.create(&landmark_options) {
            Ok(source) => source,
            Err(err) => {
                error!("Landmark estimator failed: {err}");
                self.status.message(
                    StatusLevel::Error,
                    format!("Landmark estimator unavailable: {err}"),
                );
                return None;
            }
        };

        self.state = LoopState::Running;
        self.status.set_state(LoopState::Running, Some(settings));
        self.status.message(StatusLevel::Success, "Camera started");
        info!(camera = settings.camera_index, "Camera started");

        let mapping = self.options.mapping;
        let volume = match self.options.mode {
            LoopMode::Track => SessionVolume::Off,
            LoopMode::Volume => match VolumeController::new(&mut self.volume, mapping) {
                Ok(controller) => SessionVolume::Enabled(controller),
                Err(err) => {
                    let fault = LoopFault::from(err);
                    warn!("{fault}; volume disabled for this session");
                    self.status.fault(StatusLevel::Warning, &fault);
                    SessionVolume::Disabled(mapping)
                }
            },
        };

        let mut session = Session {
            source,
            volume,
            fps: FpsCounter::default(),
            frame_number: 0,
        };

        loop {
            match commands.try_recv() {
                Ok(ControlCommand::Stop) => {
                    info!("Stop requested");
                    self.status.message(StatusLevel::Info, "Camera stopped");
                    return None;
                }
                Ok(command) => return Some(command),
                // Senders going away never interrupts a running camera.
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => {}
            }

            let frame = match camera.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    let fault = LoopFault::CameraUnavailable("end of stream".into());
                    error!("{fault}");
                    self.status.fault(StatusLevel::Error, &fault);
                    return None;
                }
                Err(err) => {
                    let fault = LoopFault::CameraUnavailable(err.to_string());
                    error!("{fault}");
                    self.status.fault(StatusLevel::Error, &fault);
                    return None;
                }
            };

            if let Err(fault) =
                session.process(frame, &mut self.display, &self.status, &self.options)
            {
                error!("{fault}");
                self.status.fault(StatusLevel::Error, &fault);
                return None;
            }
        }
    }
}

enum SessionVolume<'a, V: VolumeSink> {
    Enabled(VolumeController<&'a mut V>),
    /// The sink range could not be read. Readings still follow the pinch for
    /// the overlay, with `level` as a fraction of full scale.
    Disabled(PinchMapping),
    Off,
}

impl<V: VolumeSink> SessionVolume<'_, V> {
    fn reading_for(&self, metric: f32) -> Option<VolumeReading> {
        match self {
            SessionVolume::Enabled(controller) => Some(controller.reading_for(metric)),
            SessionVolume::Disabled(mapping) => Some(VolumeReading {
                metric,
                level: map_range(metric, mapping.input, Range::new(0.0, 1.0)),
                percent: map_range(metric, mapping.input, mapping.percent),
                bar_px: map_range(metric, mapping.input, mapping.bar_px),
            }),
            SessionVolume::Off => None,
        }
    }
}

struct Session<'a, V: VolumeSink> {
    source: Box<dyn LandmarkSource>,
    volume: SessionVolume<'a, V>,
    fps: FpsCounter,
    frame_number: u64,
}

impl<V: VolumeSink> Session<'_, V> {
    fn process<D: FrameDisplay>(
        &mut self,
        mut frame: Frame,
        display: &mut D,
        status: &StatusBoard,
        options: &LoopOptions,
    ) -> Result<(), LoopFault> {
        self.frame_number = self.frame_number.wrapping_add(1);
        let frame_number = self.frame_number;
        let frame_span = tracing::info_span!(
            "frame",
            frame = frame_number,
            width = frame.width,
            height = frame.height,
            timestamp = frame.timestamp_ms
        );
        let _frame_guard = frame_span.enter();

        frame.flip_horizontal();
        let mut canvas = frame
            .to_rgb_image()
            .map_err(|err| LoopFault::CameraUnavailable(err.to_string()))?;

        let detect_start = Instant::now();
        let hands = match self.source.detect(&canvas) {
            Ok(hands) => hands,
            Err(err) => {
                warn!("Landmark estimation failed: {err}");
                Vec::new()
            }
        };
        metrics::histogram!("gesture_stage_latency_seconds", "stage" => "detect")
            .record(detect_start.elapsed().as_secs_f64());

        let (pinch, reading) = match options.mode {
            LoopMode::Volume => self.control_volume(&hands, status, options.verbose),
            LoopMode::Track => {
                log_thumb_tips(&hands);
                (None, None)
            }
        };

        let fps = self.fps.tick(Instant::now());
        metrics::gauge!("gesture_pipeline_fps").set(fps as f64);

        let annotate_start = Instant::now();
        render_overlay(
            &mut canvas,
            &Overlay {
                hands: &hands,
                draw_landmarks: options.draw_landmarks,
                pinch,
                fps,
                fps_style: match options.mode {
                    LoopMode::Volume => FpsStyle::Labelled,
                    LoopMode::Track => FpsStyle::Bare,
                },
            },
        );
        metrics::histogram!("gesture_stage_latency_seconds", "stage" => "annotate")
            .record(annotate_start.elapsed().as_secs_f64());

        let encode_start = Instant::now();
        let jpeg = match encode_jpeg(&canvas, options.jpeg_quality) {
            Ok(jpeg) => jpeg,
            Err(err) => {
                error!("Encode stage error: {err}");
                return Ok(());
            }
        };
        metrics::histogram!("gesture_stage_latency_seconds", "stage" => "encode")
            .record(encode_start.elapsed().as_secs_f64());

        display.publish(FramePacket {
            jpeg,
            reading,
            hands: hands.len(),
            timestamp_ms: frame.timestamp_ms,
            frame_number,
            fps,
        });
        status.record_frame(frame_number, fps, reading);
        metrics::counter!("gesture_frames_total").increment(1);

        if frame_number % 30 == 0 {
            debug!(
                "Frame heartbeat: frame #{}, {:.1} fps, {} hand(s)",
                frame_number,
                fps,
                hands.len()
            );
        }
        Ok(())
    }

    /// Drive the volume from the first hand. Further hands are only drawn.
    fn control_volume(
        &mut self,
        hands: &[LandmarkList],
        status: &StatusBoard,
        verbose: bool,
    ) -> (Option<PinchOverlay>, Option<VolumeReading>) {
        let Some(first) = hands.first() else {
            return (None, None);
        };
        let hand = match Hand::try_from(first.as_slice()) {
            Ok(hand) => hand,
            Err(err) => {
                metrics::counter!("gesture_invalid_hand_total").increment(1);
                let fault = LoopFault::from(err);
                warn!("{fault}");
                status.fault(StatusLevel::Warning, &fault);
                return (None, None);
            }
        };

        let metric = pinch_distance(&hand);
        let Some(reading) = self.volume.reading_for(metric) else {
            return (None, None);
        };
        if verbose {
            debug!(
                metric,
                level = reading.level,
                percent = reading.percent,
                "pinch"
            );
        }

        if let SessionVolume::Enabled(controller) = &mut self.volume {
            if let Err(err) = controller.apply(&reading) {
                metrics::counter!("gesture_volume_errors_total").increment(1);
                let fault = LoopFault::from(err);
                warn!("{fault}");
                status.fault(StatusLevel::Warning, &fault);
            }
        }
        metrics::gauge!("gesture_volume_percent").set(reading.percent as f64);

        let pinch = PinchOverlay {
            thumb: hand.thumb_tip().position(),
            index: hand.index_tip().position(),
            center: midpoint(&hand),
            percent: reading.percent,
            bar_px: reading.bar_px,
        };
        (Some(pinch), Some(reading))
    }
}

fn log_thumb_tips(hands: &[LandmarkList]) {
    let thumb = HandLandmark::ThumbTip.index();
    for (hand, points) in hands.iter().enumerate() {
        if let Some(tip) = points.get(thumb) {
            info!(hand, id = tip.id, x = tip.x, y = tip.y, "thumb tip");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        collections::VecDeque,
        rc::Rc,
        sync::{Arc, Mutex},
    };

    use crossbeam_channel::Sender;
    use gesture_core::{DetectorError, Landmark, VolumeError, VolumeRange};
    use image::RgbImage;
    use video_ingest::{CaptureError, FrameFormat};

    use super::*;

    const WIDTH: u32 = 64;
    const HEIGHT: u32 = 48;

    fn frame(timestamp_ms: i64) -> Frame {
        Frame {
            data: vec![0; (WIDTH * HEIGHT * 3) as usize],
            width: WIDTH,
            height: HEIGHT,
            timestamp_ms,
            format: FrameFormat::Rgb8,
        }
    }

    enum Read {
        Frame,
        Fail,
    }

    #[derive(Clone, Default)]
    struct CameraProbe {
        reads: Rc<Cell<u32>>,
        releases: Rc<Cell<u32>>,
        opened: Rc<RefCell<Vec<u32>>>,
    }

    struct ScriptedCamera {
        script: VecDeque<Read>,
        probe: CameraProbe,
    }

    impl CameraDevice for ScriptedCamera {
        fn configure(&mut self, _width: u32, _height: u32) -> Result<(), CaptureError> {
            Err(CaptureError::Other(anyhow::anyhow!("fixed resolution")))
        }

        fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
            let reads = self.probe.reads.get() + 1;
            self.probe.reads.set(reads);
            match self.script.pop_front() {
                Some(Read::Frame) => Ok(Some(frame(reads as i64 * 33))),
                Some(Read::Fail) => Err(CaptureError::Other(anyhow::anyhow!("device unplugged"))),
                None => Ok(None),
            }
        }

        fn release(&mut self) {
            self.probe.releases.set(self.probe.releases.get() + 1);
        }
    }

    struct ScriptedCameras {
        frames: usize,
        fail_after: bool,
        available: Vec<u32>,
        probe: CameraProbe,
    }

    impl ScriptedCameras {
        fn new(frames: usize) -> Self {
            Self {
                frames,
                fail_after: false,
                available: vec![0],
                probe: CameraProbe::default(),
            }
        }
    }

    impl CameraBackend for ScriptedCameras {
        type Device = ScriptedCamera;

        fn open(&mut self, index: u32) -> Result<ScriptedCamera, CaptureError> {
            if !self.available.contains(&index) {
                return Err(CaptureError::Unavailable { index });
            }
            self.probe.opened.borrow_mut().push(index);
            let mut script: VecDeque<Read> = (0..self.frames).map(|_| Read::Frame).collect();
            if self.fail_after {
                script.push_back(Read::Fail);
            }
            Ok(ScriptedCamera {
                script,
                probe: self.probe.clone(),
            })
        }
    }

    struct StaticSource {
        hands: Vec<LandmarkList>,
    }

    impl LandmarkSource for StaticSource {
        fn detect(&mut self, _image: &RgbImage) -> Result<Vec<LandmarkList>, DetectorError> {
            Ok(self.hands.clone())
        }
    }

    #[derive(Default)]
    struct StaticBackend {
        hands: Vec<LandmarkList>,
        created: Rc<RefCell<Vec<LandmarkOptions>>>,
    }

    impl LandmarkBackend for StaticBackend {
        fn create(
            &self,
            options: &LandmarkOptions,
        ) -> Result<Box<dyn LandmarkSource>, DetectorError> {
            self.created.borrow_mut().push(options.clone());
            Ok(Box::new(StaticSource {
                hands: self.hands.clone(),
            }))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        levels: Rc<RefCell<Vec<f32>>>,
        fail_range: bool,
        fail_set: bool,
    }

    impl VolumeSink for RecordingSink {
        fn range(&self) -> Result<VolumeRange, VolumeError> {
            if self.fail_range {
                return Err(VolumeError::SinkUnavailable {
                    reason: "no endpoint".into(),
                });
            }
            Ok(Range::new(-65.25, 0.0))
        }

        fn set_level(&mut self, level: f32) -> Result<(), VolumeError> {
            if self.fail_set {
                return Err(VolumeError::SinkUnavailable {
                    reason: "device gone".into(),
                });
            }
            self.levels.borrow_mut().push(level);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CollectingDisplay {
        packets: Rc<RefCell<Vec<FramePacket>>>,
        stop_after: Option<(usize, Sender<ControlCommand>)>,
    }

    impl FrameDisplay for CollectingDisplay {
        fn publish(&mut self, packet: FramePacket) {
            self.packets.borrow_mut().push(packet);
            if let Some((after, sender)) = &self.stop_after {
                if self.packets.borrow().len() == *after {
                    sender.send(ControlCommand::Stop).unwrap();
                    sender.send(ControlCommand::Shutdown).unwrap();
                }
            }
        }
    }

    /// Full 21-point hand with the thumb and index tips at the given spots.
    fn hand(thumb: (i32, i32), index: (i32, i32)) -> LandmarkList {
        (0..21u8)
            .map(|id| match id {
                4 => Landmark::new(id, thumb.0, thumb.1),
                8 => Landmark::new(id, index.0, index.1),
                _ => Landmark::new(id, 20 + id as i32, 20),
            })
            .collect()
    }

    fn options(mode: LoopMode) -> LoopOptions {
        LoopOptions {
            mode,
            width: 640,
            height: 480,
            landmarks: LandmarkOptions::default(),
            mapping: PinchMapping::default(),
            jpeg_quality: 80,
            draw_landmarks: true,
            verbose: false,
        }
    }

    fn start(camera_index: u32) -> ControlCommand {
        ControlCommand::Start(SessionSettings {
            camera_index,
            detection_confidence: 0.7,
        })
    }

    struct Harness {
        probe: CameraProbe,
        created: Rc<RefCell<Vec<LandmarkOptions>>>,
        levels: Rc<RefCell<Vec<f32>>>,
        packets: Rc<RefCell<Vec<FramePacket>>>,
        status: StatusBoard,
    }

    fn run_with(
        cameras: ScriptedCameras,
        landmarks: StaticBackend,
        sink: RecordingSink,
        display: CollectingDisplay,
        mode: LoopMode,
        commands: Receiver<ControlCommand>,
    ) -> (LoopState, Harness) {
        let harness = Harness {
            probe: cameras.probe.clone(),
            created: landmarks.created.clone(),
            levels: sink.levels.clone(),
            packets: display.packets.clone(),
            status: StatusBoard::new(),
        };
        let mut frame_loop = FrameLoop::new(
            cameras,
            landmarks,
            sink,
            display,
            harness.status.clone(),
            options(mode),
        );
        assert_eq!(frame_loop.state(), LoopState::Idle);
        let state = frame_loop.run(&commands);
        (state, harness)
    }

    fn one_session(
        cameras: ScriptedCameras,
        landmarks: StaticBackend,
        sink: RecordingSink,
        mode: LoopMode,
    ) -> (LoopState, Harness) {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(start(0)).unwrap();
        drop(tx);
        run_with(
            cameras,
            landmarks,
            sink,
            CollectingDisplay::default(),
            mode,
            rx,
        )
    }

    #[test]
    fn midpoint_pinch_sets_midpoint_volume() {
        // 84-112-140 triangle: the pinch sits in the middle of [30, 250].
        let landmarks = StaticBackend {
            hands: vec![hand((10, 10), (94, 122))],
            ..Default::default()
        };
        let (state, harness) = one_session(
            ScriptedCameras::new(3),
            landmarks,
            RecordingSink::default(),
            LoopMode::Volume,
        );

        assert_eq!(state, LoopState::Stopped);
        let levels = harness.levels.borrow();
        assert_eq!(levels.len(), 3);
        assert!(levels.iter().all(|level| (level + 32.625).abs() < 1e-3));

        let packets = harness.packets.borrow();
        assert_eq!(packets.len(), 3);
        let reading = packets[0].reading.unwrap();
        assert!((reading.percent - 50.0).abs() < 1e-3);
        assert!((reading.bar_px - 250.0).abs() < 1e-3);
        assert_eq!(packets[0].fps, 0.0);
        assert_eq!(
            packets.iter().map(|p| p.frame_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(&packets[2].jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn session_confidence_reaches_estimator() {
        let landmarks = StaticBackend::default();
        let (_, harness) = one_session(
            ScriptedCameras::new(1),
            landmarks,
            RecordingSink::default(),
            LoopMode::Volume,
        );
        let created = harness.created.borrow();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].detection_confidence, 0.7);
    }

    #[test]
    fn no_hand_leaves_volume_untouched() {
        let (_, harness) = one_session(
            ScriptedCameras::new(4),
            StaticBackend::default(),
            RecordingSink::default(),
            LoopMode::Volume,
        );
        assert!(harness.levels.borrow().is_empty());
        let packets = harness.packets.borrow();
        assert_eq!(packets.len(), 4);
        assert!(packets.iter().all(|p| p.reading.is_none() && p.hands == 0));
    }

    #[test]
    fn second_hand_never_drives_volume() {
        let landmarks = StaticBackend {
            hands: vec![hand((10, 10), (94, 122)), hand((0, 0), (300, 0))],
            ..Default::default()
        };
        let (_, harness) = one_session(
            ScriptedCameras::new(2),
            landmarks,
            RecordingSink::default(),
            LoopMode::Volume,
        );
        let levels = harness.levels.borrow();
        assert_eq!(levels.len(), 2);
        assert!(levels.iter().all(|level| (level + 32.625).abs() < 1e-3));
        assert!(harness.packets.borrow().iter().all(|p| p.hands == 2));
    }

    #[test]
    fn camera_failure_returns_to_idle_and_releases_once() {
        let mut cameras = ScriptedCameras::new(1);
        cameras.fail_after = true;
        let (state, harness) = one_session(
            cameras,
            StaticBackend::default(),
            RecordingSink::default(),
            LoopMode::Volume,
        );

        assert_eq!(state, LoopState::Stopped);
        assert_eq!(harness.probe.reads.get(), 2);
        assert_eq!(harness.probe.releases.get(), 1);
        assert_eq!(harness.packets.borrow().len(), 1);
    }

    #[test]
    fn end_of_stream_reports_camera_unavailable() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(start(0)).unwrap();
        tx.send(ControlCommand::Shutdown).unwrap();
        // Shutdown is queued behind Start, so the session sees it on its
        // first iteration and never reads.
        let (_, harness) = run_with(
            ScriptedCameras::new(0),
            StaticBackend::default(),
            RecordingSink::default(),
            CollectingDisplay::default(),
            LoopMode::Volume,
            rx,
        );
        assert_eq!(harness.probe.reads.get(), 0);
        assert_eq!(harness.probe.releases.get(), 1);

        let (_, harness) = one_session(
            ScriptedCameras::new(0),
            StaticBackend::default(),
            RecordingSink::default(),
            LoopMode::Volume,
        );
        assert_eq!(harness.probe.reads.get(), 1);
        assert_eq!(harness.probe.releases.get(), 1);
        assert!(harness.status.snapshot().message.starts_with("Camera not accessible"));
    }

    #[test]
    fn missing_camera_is_reported_without_crash() {
        let (state, harness) = {
            let (tx, rx) = crossbeam_channel::unbounded();
            tx.send(start(3)).unwrap();
            drop(tx);
            run_with(
                ScriptedCameras::new(5),
                StaticBackend::default(),
                RecordingSink::default(),
                CollectingDisplay::default(),
                LoopMode::Volume,
                rx,
            )
        };
        assert_eq!(state, LoopState::Stopped);
        assert!(harness.probe.opened.borrow().is_empty());
        assert_eq!(harness.probe.releases.get(), 0);
        assert!(harness.packets.borrow().is_empty());
        assert!(harness.created.borrow().is_empty());
    }

    #[test]
    fn stop_is_honoured_at_next_iteration() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(start(0)).unwrap();
        let display = CollectingDisplay {
            stop_after: Some((2, tx)),
            ..Default::default()
        };
        let (state, harness) = run_with(
            ScriptedCameras::new(10),
            StaticBackend::default(),
            RecordingSink::default(),
            display,
            LoopMode::Volume,
            rx,
        );
        assert_eq!(state, LoopState::Stopped);
        assert_eq!(harness.packets.borrow().len(), 2);
        assert_eq!(harness.probe.reads.get(), 2);
        assert_eq!(harness.probe.releases.get(), 1);
    }

    #[test]
    fn restart_releases_previous_camera() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(start(0)).unwrap();
        tx.send(start(0)).unwrap();
        drop(tx);
        let (_, harness) = run_with(
            ScriptedCameras::new(1),
            StaticBackend::default(),
            RecordingSink::default(),
            CollectingDisplay::default(),
            LoopMode::Volume,
            rx,
        );
        assert_eq!(*harness.probe.opened.borrow(), vec![0, 0]);
        assert_eq!(harness.probe.releases.get(), 2);
    }

    #[test]
    fn volume_failure_is_not_fatal() {
        let landmarks = StaticBackend {
            hands: vec![hand((10, 10), (94, 122))],
            ..Default::default()
        };
        let sink = RecordingSink {
            fail_set: true,
            ..Default::default()
        };
        let (_, harness) = one_session(ScriptedCameras::new(3), landmarks, sink, LoopMode::Volume);
        let packets = harness.packets.borrow();
        assert_eq!(packets.len(), 3);
        assert!(packets.iter().all(|p| p.reading.is_some()));
    }

    #[test]
    fn unreadable_volume_range_disables_sink_but_keeps_overlay() {
        let landmarks = StaticBackend {
            hands: vec![hand((10, 10), (94, 122))],
            ..Default::default()
        };
        let sink = RecordingSink {
            fail_range: true,
            ..Default::default()
        };
        let (_, harness) = one_session(ScriptedCameras::new(2), landmarks, sink, LoopMode::Volume);
        assert!(harness.levels.borrow().is_empty());
        let reading = harness.packets.borrow()[0].reading.unwrap();
        assert!((reading.percent - 50.0).abs() < 1e-3);
        assert!((reading.level - 0.5).abs() < 1e-3);
    }

    #[test]
    fn malformed_hand_is_skipped() {
        let landmarks = StaticBackend {
            hands: vec![vec![Landmark::new(0, 1, 1); 5]],
            ..Default::default()
        };
        let (_, harness) = one_session(
            ScriptedCameras::new(2),
            landmarks,
            RecordingSink::default(),
            LoopMode::Volume,
        );
        assert!(harness.levels.borrow().is_empty());
        let packets = harness.packets.borrow();
        assert_eq!(packets.len(), 2);
        assert!(packets.iter().all(|p| p.reading.is_none() && p.hands == 1));
    }

    #[test]
    fn tracker_never_touches_volume() {
        let landmarks = StaticBackend {
            hands: vec![hand((10, 10), (94, 122))],
            ..Default::default()
        };
        let (_, harness) = one_session(
            ScriptedCameras::new(2),
            landmarks,
            RecordingSink::default(),
            LoopMode::Track,
        );
        assert!(harness.levels.borrow().is_empty());
        assert!(harness.packets.borrow().iter().all(|p| p.reading.is_none()));
    }

    #[test]
    fn preview_display_keeps_bounded_history() {
        let latest: SharedFrame = Arc::new(Mutex::new(None));
        let history: FrameHistory = Arc::new(Mutex::new(VecDeque::new()));
        let mut display = PreviewDisplay::new(latest.clone(), history.clone());
        for frame_number in 1..=(FRAME_HISTORY_CAPACITY as u64 + 5) {
            display.publish(FramePacket {
                jpeg: vec![0xFF, 0xD8],
                reading: None,
                hands: 0,
                timestamp_ms: 0,
                frame_number,
                fps: 0.0,
            });
        }
        let history = history.lock().unwrap();
        assert_eq!(history.len(), FRAME_HISTORY_CAPACITY);
        assert_eq!(history.front().unwrap().frame_number, 6);
        assert_eq!(
            latest.lock().unwrap().as_ref().unwrap().frame_number,
            FRAME_HISTORY_CAPACITY as u64 + 5
        );
    }
}
