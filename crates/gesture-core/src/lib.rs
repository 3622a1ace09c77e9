//! Gesture-to-volume building blocks that do not depend on any camera, UI or
//! audio backend.
//!
//! - `landmarks`: typed 21-point hands.
//! - `metric`: thumb/index pinch distance.
//! - `mapping`: clamped linear interpolation.
//! - `volume`: volume sink contract and the metric controller.
//! - `source`: landmark estimator contract.
//! - `subprocess`: estimator running as a child process.
//! - `detector`: TorchScript estimator (`with-tch`).

use thiserror::Error;

pub mod landmarks;
pub mod mapping;
pub mod metric;
pub mod source;
pub mod subprocess;
pub mod volume;

#[cfg(feature = "with-tch")]
pub mod detector;

pub use landmarks::{HAND_CONNECTIONS, Hand, HandLandmark, LANDMARK_COUNT, Landmark};
pub use mapping::{PinchMapping, Range, interpolate, map_range};
pub use metric::{midpoint, pinch_distance, pinch_distance_from_points};
pub use source::{DetectorError, LandmarkBackend, LandmarkList, LandmarkOptions, LandmarkSource};
pub use volume::{VolumeController, VolumeError, VolumeRange, VolumeReading, VolumeSink};

#[cfg(feature = "with-tch")]
pub use tch;

/// Landmark data that does not fit the 21-point hand model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GestureError {
    #[error("invalid hand shape: expected {expected} landmarks, found {found}")]
    InvalidHandShape { expected: usize, found: usize },
    #[error("invalid hand shape: slot {index} holds landmark id {id}")]
    MisplacedLandmark { index: usize, id: u8 },
}

impl GestureError {
    pub fn is_invalid_hand_shape(&self) -> bool {
        matches!(
            self,
            GestureError::InvalidHandShape { .. } | GestureError::MisplacedLandmark { .. }
        )
    }
}
