//! Landmark estimator running as a child process.
//!
//! The child (typically a small MediaPipe script) is started with the session
//! options as flags and must print `READY` once its model is loaded. For each
//! frame it receives a little-endian `(width, height, channels)` `u32` header
//! followed by raw RGB bytes on stdin, and answers with one JSON line:
//!
//! ```json
//! {"hands":[{"score":0.93,"landmarks":[{"x":0.41,"y":0.52,"z":-0.01}, ...]}],"error":null}
//! ```
//!
//! Coordinates are normalized to the frame size.

use std::{
    io::{BufRead, BufReader, Write},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
};

use image::RgbImage;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{
    landmarks::Landmark,
    source::{DetectorError, LandmarkBackend, LandmarkList, LandmarkOptions, LandmarkSource},
};

#[derive(Deserialize, Debug)]
struct PointJson {
    x: f32,
    y: f32,
    #[allow(dead_code)]
    #[serde(default)]
    z: f32,
}

#[derive(Deserialize, Debug)]
struct HandJson {
    #[serde(default = "full_score")]
    score: f32,
    landmarks: Vec<PointJson>,
}

#[derive(Deserialize, Debug)]
struct DetectionJson {
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

fn full_score() -> f32 {
    1.0
}

/// Spawns [`SubprocessLandmarker`]s from a command line.
#[derive(Clone, Debug)]
pub struct SubprocessBackend {
    program: String,
    args: Vec<String>,
}

impl SubprocessBackend {
    /// Split a shell-like command (`python3 hand_landmarks.py`) on whitespace.
    pub fn from_command_line(command: &str) -> Result<Self, DetectorError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| DetectorError::Startup("empty landmarker command".into()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    fn option_args(options: &LandmarkOptions) -> Vec<String> {
        let mut args = vec![
            "--max-hands".to_string(),
            options.max_hands.to_string(),
            "--detection-confidence".to_string(),
            options.detection_confidence.to_string(),
            "--tracking-confidence".to_string(),
            options.tracking_confidence.to_string(),
        ];
        if options.static_image_mode {
            args.push("--static-image-mode".to_string());
        }
        args
    }
}

impl LandmarkBackend for SubprocessBackend {
    fn create(&self, options: &LandmarkOptions) -> Result<Box<dyn LandmarkSource>, DetectorError> {
        options.validate()?;
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .args(Self::option_args(options))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        let landmarker = SubprocessLandmarker::spawn(command, options.clone())?;
        Ok(Box::new(landmarker))
    }
}

/// Hand landmark estimator speaking the line protocol above.
pub struct SubprocessLandmarker {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    options: LandmarkOptions,
    tracking: bool,
}

impl SubprocessLandmarker {
    pub fn spawn(mut command: Command, options: LandmarkOptions) -> Result<Self, DetectorError> {
        let mut child = command
            .spawn()
            .map_err(|err| DetectorError::Startup(format!("{command:?}: {err}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DetectorError::Startup("estimator stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DetectorError::Startup("estimator stdout unavailable".into()))?;
        let mut stdout = BufReader::new(stdout);

        let mut ready = String::new();
        let handshake = match stdout.read_line(&mut ready) {
            Ok(_) if ready.trim() == "READY" => Ok(()),
            Ok(_) => Err(DetectorError::Startup(format!(
                "estimator did not signal READY, got {:?}",
                ready.trim()
            ))),
            Err(err) => Err(DetectorError::from(err)),
        };
        if let Err(err) = handshake {
            let _ = child.kill();
            let _ = child.wait();
            return Err(err);
        }
        info!("Landmark estimator ready");

        Ok(Self {
            child,
            stdin,
            stdout,
            options,
            tracking: false,
        })
    }
}

impl LandmarkSource for SubprocessLandmarker {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<LandmarkList>, DetectorError> {
        let (width, height) = image.dimensions();
        self.stdin.write_all(&width.to_le_bytes())?;
        self.stdin.write_all(&height.to_le_bytes())?;
        self.stdin.write_all(&3u32.to_le_bytes())?;
        self.stdin.write_all(image.as_raw())?;
        self.stdin.flush()?;

        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(DetectorError::Protocol(
                "estimator closed its output".into(),
            ));
        }
        let threshold = self.options.threshold(self.tracking);
        let hands = parse_response(&line, width, height, threshold, self.options.max_hands)?;
        self.tracking = !hands.is_empty();
        Ok(hands)
    }
}

impl Drop for SubprocessLandmarker {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Decode one response line into pixel-space landmark lists.
///
/// Hands below `threshold` are dropped and at most `max_hands` are kept.
/// Landmark counts are passed through untouched; shape checks happen when the
/// list is turned into a `Hand`.
pub fn parse_response(
    line: &str,
    width: u32,
    height: u32,
    threshold: f32,
    max_hands: usize,
) -> Result<Vec<LandmarkList>, DetectorError> {
    let response: DetectionJson = serde_json::from_str(line.trim())
        .map_err(|err| DetectorError::Protocol(format!("{err}: {line:?}")))?;
    if let Some(error) = response.error {
        warn!("Landmark estimator reported: {error}");
        return Ok(Vec::new());
    }

    let hands: Vec<LandmarkList> = response
        .hands
        .into_iter()
        .filter(|hand| hand.score >= threshold)
        .take(max_hands)
        .map(|hand| {
            hand.landmarks
                .iter()
                .enumerate()
                .map(|(id, point)| Landmark::from_normalized(id as u8, point.x, point.y, width, height))
                .collect()
        })
        .collect();
    debug!(hands = hands.len(), "estimator response decoded");
    Ok(hands)
}
