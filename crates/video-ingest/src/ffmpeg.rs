//! FFmpeg-backed camera that reads raw RGB frames from a child process.

use std::{
    io::{ErrorKind, Read},
    path::Path,
    process::{Child, ChildStdout, Command, Stdio},
};

use anyhow::anyhow;
use chrono::Utc;
use tracing::{debug, warn};

use crate::{
    device::{CameraBackend, CameraDevice},
    types::{CaptureError, Frame, FrameFormat},
};

const DEFAULT_SIZE: (u32, u32) = (640, 480);

/// Opens cameras through `ffmpeg`, one child process per open device.
#[derive(Clone, Debug)]
pub struct FfmpegCameraBackend {
    program: String,
    input_format: String,
}

impl Default for FfmpegCameraBackend {
    fn default() -> Self {
        let input_format = if cfg!(target_os = "macos") {
            "avfoundation"
        } else {
            "video4linux2"
        };
        Self {
            program: "ffmpeg".to_string(),
            input_format: input_format.to_string(),
        }
    }
}

impl FfmpegCameraBackend {
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn device_uri(&self, index: u32) -> String {
        if self.input_format == "video4linux2" {
            format!("/dev/video{index}")
        } else {
            index.to_string()
        }
    }
}

impl CameraBackend for FfmpegCameraBackend {
    type Device = FfmpegCamera;

    fn open(&mut self, index: u32) -> Result<FfmpegCamera, CaptureError> {
        let uri = self.device_uri(index);
        if self.input_format == "video4linux2" && !Path::new(&uri).exists() {
            return Err(CaptureError::Unavailable { index });
        }
        Ok(FfmpegCamera {
            program: self.program.clone(),
            input_format: self.input_format.clone(),
            uri,
            index,
            size: DEFAULT_SIZE,
            child: None,
            buffer: Vec::new(),
        })
    }
}

/// Camera handle whose ffmpeg process starts on the first read.
pub struct FfmpegCamera {
    program: String,
    input_format: String,
    uri: String,
    index: u32,
    size: (u32, u32),
    child: Option<(Child, ChildStdout)>,
    buffer: Vec<u8>,
}

impl FfmpegCamera {
    fn spawn(&mut self) -> Result<(), CaptureError> {
        let (width, height) = self.size;
        let mut cmd = Command::new(&self.program);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-f")
            .arg(&self.input_format)
            .arg("-video_size")
            .arg(format!("{width}x{height}"))
            .arg("-i")
            .arg(&self.uri)
            .arg("-vf")
            .arg(format!("scale={width}:{height}"))
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-f")
            .arg("rawvideo")
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn().map_err(|err| {
            warn!("video-ingest: failed to spawn {}: {err}", self.program);
            CaptureError::Unavailable { index: self.index }
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Other(anyhow!("failed to capture ffmpeg stdout")))?;
        debug!(uri = %self.uri, width, height, "ffmpeg capture started");
        self.buffer = vec![0u8; width as usize * height as usize * 3];
        self.child = Some((child, stdout));
        Ok(())
    }
}

impl CameraDevice for FfmpegCamera {
    fn configure(&mut self, width: u32, height: u32) -> Result<(), CaptureError> {
        if width == 0 || height == 0 {
            return Err(CaptureError::Other(anyhow!(
                "capture size must be positive, got {width}x{height}"
            )));
        }
        if self.size != (width, height) {
            self.size = (width, height);
            // Restart with the new size on the next read.
            self.release();
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if self.child.is_none() {
            self.spawn()?;
        }
        let Some((_, stdout)) = self.child.as_mut() else {
            return Ok(None);
        };

        match stdout.read_exact(&mut self.buffer) {
            Ok(()) => Ok(Some(Frame {
                data: self.buffer.clone(),
                width: self.size.0,
                height: self.size.1,
                timestamp_ms: Utc::now().timestamp_millis(),
                format: FrameFormat::Rgb8,
            })),
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(err) => Err(CaptureError::Other(err.into())),
        }
    }

    fn release(&mut self) {
        if let Some((mut child, _stdout)) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
