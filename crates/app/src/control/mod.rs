//! Camera-to-volume control loop with a browser preview.
//!
//! The module is split into focused submodules:
//! - `config`: CLI configuration parsing.
//! - `pipeline`: The frame loop state machine.
//! - `annotation`: Overlay drawing primitives.
//! - `encoding`: JPEG encoding of annotated frames.
//! - `fps`: Frame rate counter.
//! - `volume`: System volume sinks.
//! - `server`: Actix Web preview and control endpoints.
//! - `telemetry`: Tracing subscriber and Prometheus recorder setup.
//! - `data`: Shared structs passed between the loop and the server.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, Once},
};

use anyhow::{Context, Result};
use gesture_core::{LandmarkBackend, VolumeSink, subprocess::SubprocessBackend};
use tracing::{info, warn};

pub use config::{ControlCliArgs, ControlConfig, VolumeBackendKind};
pub(crate) use pipeline::LoopMode;

use self::{
    data::{ControlCommand, FRAME_HISTORY_CAPACITY, FrameHistory, SharedFrame, StatusBoard},
    pipeline::{FrameLoop, LoopOptions, PreviewDisplay},
    server::{ServerState, spawn_preview_server},
    volume::{DryRunVolumeSink, PactlVolumeSink},
};

mod annotation;
mod config;
mod data;
mod encoding;
mod fps;
mod pipeline;
mod server;
mod telemetry;
mod volume;

/// Input size of the TorchScript hand landmark model.
#[cfg(feature = "with-tch")]
const TORCH_INPUT_SIZE: (u32, u32) = (224, 224);

/// Run the frame loop and preview server until Ctrl+C.
pub(crate) fn run(config: ControlConfig, mode: LoopMode) -> Result<()> {
    let _telemetry_guard = telemetry::enter_runtime(&config.telemetry, config.verbose);
    let _ = telemetry::init_metrics_recorder();

    let (control_tx, control_rx) = crossbeam_channel::unbounded::<ControlCommand>();

    static CTRL_HANDLER: Once = Once::new();
    let handler_tx = control_tx.clone();
    CTRL_HANDLER.call_once(move || {
        if let Err(err) = ctrlc::set_handler(move || {
            let _ = handler_tx.send(ControlCommand::Shutdown);
        }) {
            warn!("Failed to install Ctrl+C handler: {err}");
        }
    });

    let landmarks = landmark_backend(&config)?;
    let volume: Box<dyn VolumeSink> = match config.volume_backend {
        VolumeBackendKind::Pactl => Box::new(PactlVolumeSink::default()),
        VolumeBackendKind::DryRun => Box::new(DryRunVolumeSink::default()),
    };

    let shared: SharedFrame = Arc::new(Mutex::new(None));
    let history: FrameHistory =
        Arc::new(Mutex::new(VecDeque::with_capacity(FRAME_HISTORY_CAPACITY)));
    let status = StatusBoard::new();

    let preview_server = spawn_preview_server(
        ServerState {
            latest: shared.clone(),
            history: history.clone(),
            status: status.clone(),
            control: control_tx.clone(),
            defaults: config.default_session(),
        },
        config.bind,
    )
    .context("Failed to start preview server")?;

    if config.autostart || mode == LoopMode::Track {
        let _ = control_tx.send(ControlCommand::Start(config.default_session()));
    }
    info!(?mode, "Press Ctrl+C to stop");

    #[cfg(feature = "opencv")]
    let cameras = video_ingest::OpenCvCameraBackend;
    #[cfg(not(feature = "opencv"))]
    let cameras = video_ingest::FfmpegCameraBackend::default();

    let mut frame_loop = FrameLoop::new(
        cameras,
        landmarks,
        volume,
        PreviewDisplay::new(shared, history),
        status,
        LoopOptions::from_config(&config, mode),
    );
    frame_loop.run(&control_rx);
    info!(state = ?frame_loop.state(), "Shutting down preview server");

    preview_server.stop();
    Ok(())
}

fn landmark_backend(config: &ControlConfig) -> Result<Box<dyn LandmarkBackend>> {
    if let Some(model_path) = config.model_path.as_ref() {
        #[cfg(feature = "with-tch")]
        {
            use gesture_core::{detector::TorchBackend, tch::Device};

            let device = Device::cuda_if_available();
            info!("Loading landmark model {} on {device:?}", model_path.display());
            return Ok(Box::new(TorchBackend {
                model_path: model_path.clone(),
                device,
                input_size: TORCH_INPUT_SIZE,
            }));
        }
        #[cfg(not(feature = "with-tch"))]
        {
            anyhow::bail!(
                "--model {} requires building with the `with-tch` feature",
                model_path.display()
            );
        }
    }

    let backend = SubprocessBackend::from_command_line(&config.landmarker_command)
        .with_context(|| format!("Invalid --landmarker {:?}", config.landmarker_command))?;
    Ok(Box::new(backend))
}
