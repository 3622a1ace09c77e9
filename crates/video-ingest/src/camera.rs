//! OpenCV-backed camera capture.

use anyhow::Result;
use chrono::Utc;
use opencv::{
    core::MatTraitConstManual,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTrait},
};
use tracing::warn;

use crate::{
    device::{CameraBackend, CameraDevice},
    types::{CaptureError, Frame, FrameFormat},
};

/// Opens cameras through OpenCV `VideoCapture`, preferring V4L.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenCvCameraBackend;

impl CameraBackend for OpenCvCameraBackend {
    type Device = OpenCvCamera;

    fn open(&mut self, index: u32) -> Result<OpenCvCamera, CaptureError> {
        let capture = open_video_capture(index)?;
        Ok(OpenCvCamera {
            capture,
            frame: Mat::default(),
        })
    }
}

pub struct OpenCvCamera {
    capture: VideoCapture,
    frame: Mat,
}

/// Attempt to open a camera by index, trying V4L first.
fn open_video_capture(index: u32) -> Result<VideoCapture, CaptureError> {
    for backend in [videoio::CAP_V4L, videoio::CAP_ANY] {
        match VideoCapture::new(index as i32, backend) {
            Ok(cap) => {
                if cap.is_opened().map_err(|e| CaptureError::Other(e.into()))? {
                    return Ok(cap);
                }
            }
            Err(err) => {
                warn!("video-ingest: failed to open device #{index} with backend {backend}: {err}");
            }
        }
    }

    Err(CaptureError::Unavailable { index })
}

impl CameraDevice for OpenCvCamera {
    fn configure(&mut self, width: u32, height: u32) -> Result<(), CaptureError> {
        if let Ok(mjpg) = videoio::VideoWriter::fourcc('M', 'J', 'P', 'G') {
            let _ = self.capture.set(videoio::CAP_PROP_FOURCC, mjpg as f64);
        }
        self.capture
            .set(videoio::CAP_PROP_FRAME_WIDTH, width as f64)
            .map_err(|e| CaptureError::Other(e.into()))?;
        self.capture
            .set(videoio::CAP_PROP_FRAME_HEIGHT, height as f64)
            .map_err(|e| CaptureError::Other(e.into()))?;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        let grabbed = self
            .capture
            .read(&mut self.frame)
            .map_err(|e| CaptureError::Other(e.into()))?;
        let size = self.frame.size().map_err(|e| CaptureError::Other(e.into()))?;
        if !grabbed || size.width <= 0 || size.height <= 0 {
            return Ok(None);
        }

        let data = self
            .frame
            .data_bytes()
            .map_err(|e| CaptureError::Other(e.into()))?
            .to_vec();

        Ok(Some(Frame {
            data,
            width: size.width as u32,
            height: size.height as u32,
            timestamp_ms: Utc::now().timestamp_millis(),
            format: FrameFormat::Bgr8,
        }))
    }

    fn release(&mut self) {
        if let Err(err) = self.capture.release() {
            warn!("video-ingest: failed to release capture: {err}");
        }
    }
}
