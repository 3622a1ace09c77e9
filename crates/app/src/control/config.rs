//! Configuration parsing for the gesture control loop.
//!
//! This module owns translation of CLI arguments into a `ControlConfig` struct
//! which the frame loop and preview server use without re-parsing flags.

use std::{net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use gesture_core::LandmarkOptions;

use crate::control::data::SessionSettings;

/// Highest camera index offered in the UI.
pub(crate) const MAX_CAMERA_INDEX: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
/// Where volume levels are sent.
pub enum VolumeBackendKind {
    /// Default PulseAudio/PipeWire sink via `pactl`.
    Pactl,
    /// Log levels without touching the system mixer.
    DryRun,
}

#[derive(Clone, Debug)]
/// Canonical configuration shared by the frame loop and the preview server.
pub struct ControlConfig {
    /// Camera opened by `--autostart` and prefilled in the UI.
    pub camera_index: u32,
    /// Requested capture width.
    pub width: u32,
    /// Requested capture height.
    pub height: u32,
    /// Landmark estimator options; `detection_confidence` is the session default.
    pub landmarks: LandmarkOptions,
    /// Command line of the subprocess landmark estimator.
    pub landmarker_command: String,
    /// TorchScript landmark model, used instead of the subprocess when set.
    pub model_path: Option<PathBuf>,
    pub volume_backend: VolumeBackendKind,
    /// Preview server listen address.
    pub bind: SocketAddr,
    pub jpeg_quality: u8,
    /// Start a session with the default settings without waiting for the UI.
    pub autostart: bool,
    /// Draw every detected hand's skeleton.
    pub draw_landmarks: bool,
    /// Emit per-hand debug logging.
    pub verbose: bool,
    pub telemetry: TelemetryOptions,
}

#[derive(Clone, Debug, Default)]
/// Optional telemetry knobs for tracing.
pub struct TelemetryOptions {
    /// Write a Chrome trace JSON file capturing frame loop spans.
    pub chrome_trace_path: Option<PathBuf>,
}

/// CLI arguments accepted by the `run` and `track` subcommands.
#[derive(Debug, Args)]
pub struct ControlCliArgs {
    /// Camera index (0-3).
    #[arg(long = "camera", value_name = "INDEX", default_value_t = 0)]
    pub camera: u32,
    /// Capture width in pixels.
    #[arg(long = "width", value_name = "PX", default_value_t = 640)]
    pub width: u32,
    /// Capture height in pixels.
    #[arg(long = "height", value_name = "PX", default_value_t = 480)]
    pub height: u32,
    /// Minimum hand detection confidence (0-1).
    #[arg(long = "detection-confidence", value_name = "P", default_value_t = 0.7)]
    pub detection_confidence: f32,
    /// Minimum tracking confidence once a hand has been found (0-1).
    #[arg(long = "tracking-confidence", value_name = "P", default_value_t = 0.5)]
    pub tracking_confidence: f32,
    /// Maximum number of hands reported per frame.
    #[arg(long = "max-hands", value_name = "N", default_value_t = 2)]
    pub max_hands: usize,
    /// Detect on every frame instead of tracking.
    #[arg(long = "static-image-mode", action = clap::ArgAction::SetTrue)]
    pub static_image_mode: bool,
    /// Subprocess landmark estimator command.
    #[arg(
        long = "landmarker",
        value_name = "CMD",
        default_value = "python3 hand_landmarks.py"
    )]
    pub landmarker: String,
    /// TorchScript landmark model (requires the `with-tch` feature).
    #[arg(long = "model", value_name = "PATH")]
    pub model: Option<PathBuf>,
    /// Volume backend.
    #[arg(long = "volume", value_enum, default_value_t = VolumeBackendKind::Pactl)]
    pub volume: VolumeBackendKind,
    /// Preview server listen address.
    #[arg(long = "bind", value_name = "ADDR", default_value = "127.0.0.1:8080")]
    pub bind: String,
    /// JPEG quality used by the encoder (1-100).
    #[arg(long = "jpeg-quality", value_name = "QUALITY", default_value_t = 85)]
    pub jpeg_quality: u8,
    /// Start capturing immediately with the flags above.
    #[arg(long = "autostart", action = clap::ArgAction::SetTrue)]
    pub autostart: bool,
    /// Skip drawing hand skeletons.
    #[arg(long = "no-landmarks", action = clap::ArgAction::SetTrue)]
    pub no_landmarks: bool,
    /// Emit Chrome trace JSON for post-mortem analysis.
    #[arg(long = "chrome-trace", value_name = "PATH")]
    pub chrome_trace: Option<PathBuf>,
    /// Enable verbose logging (per-hand coordinates).
    #[arg(long = "verbose", action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

impl TryFrom<ControlCliArgs> for ControlConfig {
    type Error = anyhow::Error;

    fn try_from(args: ControlCliArgs) -> Result<Self> {
        if args.width == 0 || args.height == 0 {
            bail!("--width and --height must be positive integers");
        }
        if !(1..=100).contains(&args.jpeg_quality) {
            bail!("--jpeg-quality must be an integer between 1 and 100");
        }
        if args.max_hands == 0 {
            bail!("--max-hands must be at least 1");
        }
        if !(0.0..=1.0).contains(&args.tracking_confidence) {
            bail!("--tracking-confidence must be between 0 and 1");
        }
        if args.landmarker.trim().is_empty() && args.model.is_none() {
            bail!("--landmarker must not be empty");
        }

        let session = SessionSettings {
            camera_index: args.camera,
            detection_confidence: args.detection_confidence,
        };
        session.validate()?;

        let bind: SocketAddr = args
            .bind
            .parse()
            .with_context(|| format!("--bind must be a socket address, got {}", args.bind))?;

        let landmarks = LandmarkOptions {
            max_hands: args.max_hands,
            detection_confidence: args.detection_confidence,
            tracking_confidence: args.tracking_confidence,
            static_image_mode: args.static_image_mode,
        };

        Ok(Self {
            camera_index: args.camera,
            width: args.width,
            height: args.height,
            landmarks,
            landmarker_command: args.landmarker,
            model_path: args.model,
            volume_backend: args.volume,
            bind,
            jpeg_quality: args.jpeg_quality,
            autostart: args.autostart,
            draw_landmarks: !args.no_landmarks,
            verbose: args.verbose,
            telemetry: TelemetryOptions {
                chrome_trace_path: args.chrome_trace,
            },
        })
    }
}

impl ControlConfig {
    /// Session settings used by `--autostart` and shown in the UI.
    pub(crate) fn default_session(&self) -> SessionSettings {
        SessionSettings {
            camera_index: self.camera_index,
            detection_confidence: self.landmarks.detection_confidence,
        }
    }
}

impl SessionSettings {
    /// Shared by the command line and `POST /control/start`.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.camera_index > MAX_CAMERA_INDEX {
            bail!(
                "--camera must be between 0 and {MAX_CAMERA_INDEX}, got {}",
                self.camera_index
            );
        }
        if !(0.0..=1.0).contains(&self.detection_confidence) {
            bail!(
                "--detection-confidence must be between 0 and 1, got {}",
                self.detection_confidence
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: ControlCliArgs,
    }

    fn parse(argv: &[&str]) -> Result<ControlConfig> {
        let argv = std::iter::once("gesture-volume").chain(argv.iter().copied());
        let cli = TestCli::try_parse_from(argv)?;
        ControlConfig::try_from(cli.args)
    }

    #[test]
    fn defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.camera_index, 0);
        assert_eq!((config.width, config.height), (640, 480));
        assert_eq!(config.landmarks.detection_confidence, 0.7);
        assert_eq!(config.landmarks.tracking_confidence, 0.5);
        assert_eq!(config.landmarks.max_hands, 2);
        assert_eq!(config.landmarker_command, "python3 hand_landmarks.py");
        assert_eq!(config.volume_backend, VolumeBackendKind::Pactl);
        assert_eq!(config.bind, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.jpeg_quality, 85);
        assert!(config.draw_landmarks);
        assert!(!config.autostart);
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--camera",
            "2",
            "--detection-confidence",
            "0.4",
            "--volume",
            "dry-run",
            "--no-landmarks",
            "--autostart",
        ])
        .unwrap();
        assert_eq!(
            config.default_session(),
            SessionSettings {
                camera_index: 2,
                detection_confidence: 0.4
            }
        );
        assert_eq!(config.volume_backend, VolumeBackendKind::DryRun);
        assert!(!config.draw_landmarks);
        assert!(config.autostart);
    }

    #[test]
    fn rejects_camera_out_of_range() {
        let err = parse(&["--camera", "4"]).unwrap_err();
        assert!(err.to_string().contains("--camera"));
    }

    #[test]
    fn rejects_bad_confidence_and_quality() {
        assert!(
            parse(&["--detection-confidence", "1.2"])
                .unwrap_err()
                .to_string()
                .contains("--detection-confidence")
        );
        assert!(parse(&["--jpeg-quality", "0"]).is_err());
        assert!(parse(&["--max-hands", "0"]).is_err());
        assert!(parse(&["--bind", "localhost"]).is_err());
    }
}
