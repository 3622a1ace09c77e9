//! Shared structs passed between the frame loop and the preview server.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use gesture_core::{GestureError, VolumeError, VolumeReading};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub(crate) const FRAME_HISTORY_CAPACITY: usize = 64;

#[derive(Clone)]
pub(crate) struct FramePacket {
    pub(crate) jpeg: Vec<u8>,
    pub(crate) reading: Option<VolumeReading>,
    pub(crate) hands: usize,
    pub(crate) timestamp_ms: i64,
    pub(crate) frame_number: u64,
    pub(crate) fps: f32,
}

pub(crate) type SharedFrame = Arc<Mutex<Option<FramePacket>>>;
pub(crate) type FrameHistory = Arc<Mutex<VecDeque<FramePacket>>>;

/// Settings picked in the UI (or on the command line) before a session starts.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct SessionSettings {
    pub(crate) camera_index: u32,
    pub(crate) detection_confidence: f32,
}

/// Commands accepted by the frame loop.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ControlCommand {
    Start(SessionSettings),
    Stop,
    Shutdown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum LoopState {
    Idle,
    Running,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Faults surfaced to the user. None of them ends the process.
#[derive(Debug, Error)]
pub(crate) enum LoopFault {
    #[error("Camera not accessible: {0}")]
    CameraUnavailable(String),
    #[error("Volume control unavailable: {0}")]
    VolumeSinkUnavailable(#[from] VolumeError),
    #[error("Ignoring malformed hand: {0}")]
    InvalidHandShape(#[from] GestureError),
}

impl LoopFault {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            LoopFault::CameraUnavailable(_) => "camera_unavailable",
            LoopFault::VolumeSinkUnavailable(_) => "volume_sink_unavailable",
            LoopFault::InvalidHandShape(_) => "invalid_hand_shape",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct StatusSnapshot {
    pub(crate) state: LoopState,
    pub(crate) level: StatusLevel,
    pub(crate) message: String,
    pub(crate) fault: Option<&'static str>,
    pub(crate) settings: Option<SessionSettings>,
    pub(crate) volume: Option<VolumeReading>,
    pub(crate) fps: f32,
    pub(crate) frame_number: u64,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            state: LoopState::Idle,
            level: StatusLevel::Info,
            message: "Enable 'Start Camera' to run the app".to_string(),
            fault: None,
            settings: None,
            volume: None,
            fps: 0.0,
            frame_number: 0,
        }
    }
}

/// Status line shared with the browser UI.
#[derive(Clone, Default)]
pub(crate) struct StatusBoard {
    inner: Arc<Mutex<StatusSnapshot>>,
}

impl StatusBoard {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn snapshot(&self) -> StatusSnapshot {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update(&self, f: impl FnOnce(&mut StatusSnapshot)) {
        match self.inner.lock() {
            Ok(mut guard) => f(&mut *guard),
            Err(poisoned) => {
                let mut guard = poisoned.into_inner();
                f(&mut *guard)
            }
        }
    }

    pub(crate) fn set_state(&self, state: LoopState, settings: Option<SessionSettings>) {
        self.update(|status| {
            status.state = state;
            status.settings = settings;
            if state != LoopState::Running {
                status.volume = None;
                status.fps = 0.0;
            }
        });
    }

    pub(crate) fn message(&self, level: StatusLevel, message: impl Into<String>) {
        let message = message.into();
        self.update(|status| {
            status.level = level;
            status.message = message;
            status.fault = None;
        });
    }

    pub(crate) fn fault(&self, level: StatusLevel, fault: &LoopFault) {
        let message = fault.to_string();
        let kind = fault.kind();
        self.update(|status| {
            status.level = level;
            status.message = message;
            status.fault = Some(kind);
        });
    }

    pub(crate) fn record_frame(&self, frame_number: u64, fps: f32, volume: Option<VolumeReading>) {
        self.update(|status| {
            status.frame_number = frame_number;
            status.fps = fps;
            status.volume = volume;
        });
    }
}
