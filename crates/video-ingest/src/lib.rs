//! Camera acquisition behind a small open / configure / read / release
//! contract, with an FFmpeg child-process backend and an optional OpenCV one.

mod device;
mod ffmpeg;
mod types;

#[cfg(feature = "opencv")]
mod camera;

pub use device::{CameraBackend, CameraDevice, CameraSession};
pub use ffmpeg::{FfmpegCamera, FfmpegCameraBackend};
pub use types::{CaptureError, Frame, FrameFormat};

#[cfg(feature = "opencv")]
pub use camera::{OpenCvCamera, OpenCvCameraBackend};
