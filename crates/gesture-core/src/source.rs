//! Contract for hand landmark estimators.

use image::RgbImage;
use thiserror::Error;

use crate::landmarks::Landmark;

/// Estimator settings fixed for one capture session.
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkOptions {
    pub max_hands: usize,
    pub detection_confidence: f32,
    pub tracking_confidence: f32,
    /// Treat every frame independently instead of tracking hands across
    /// frames.
    pub static_image_mode: bool,
}

impl Default for LandmarkOptions {
    fn default() -> Self {
        Self {
            max_hands: 2,
            detection_confidence: 0.5,
            tracking_confidence: 0.5,
            static_image_mode: false,
        }
    }
}

impl LandmarkOptions {
    pub fn with_detection_confidence(mut self, confidence: f32) -> Self {
        self.detection_confidence = confidence;
        self
    }

    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.max_hands == 0 {
            return Err(DetectorError::InvalidOptions(
                "max_hands must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("detection_confidence", self.detection_confidence),
            ("tracking_confidence", self.tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DetectorError::InvalidOptions(format!(
                    "{name} must be within 0..=1, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Threshold to apply for the current frame given whether the previous
    /// frame produced any hands.
    pub fn threshold(&self, tracking: bool) -> f32 {
        if tracking && !self.static_image_mode {
            self.tracking_confidence
        } else {
            self.detection_confidence
        }
    }
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("invalid landmark options: {0}")]
    InvalidOptions(String),
    #[error("landmark estimator failed to start: {0}")]
    Startup(String),
    #[error("landmark estimator protocol error: {0}")]
    Protocol(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Landmark list for one hand, in detection order, pixel coordinates.
pub type LandmarkList = Vec<Landmark>;

/// Something that finds hands in an RGB image.
pub trait LandmarkSource {
    /// Return every detected hand, in detection order.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<LandmarkList>, DetectorError>;
}

impl<T: LandmarkSource + ?Sized> LandmarkSource for Box<T> {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<LandmarkList>, DetectorError> {
        (**self).detect(image)
    }
}

/// Creates a fresh [`LandmarkSource`] each time a session starts.
pub trait LandmarkBackend {
    fn create(&self, options: &LandmarkOptions) -> Result<Box<dyn LandmarkSource>, DetectorError>;
}

impl<T: LandmarkBackend + ?Sized> LandmarkBackend for Box<T> {
    fn create(&self, options: &LandmarkOptions) -> Result<Box<dyn LandmarkSource>, DetectorError> {
        (**self).create(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_estimator_defaults() {
        let options = LandmarkOptions::default();
        assert_eq!(options.max_hands, 2);
        assert_eq!(options.detection_confidence, 0.5);
        assert_eq!(options.tracking_confidence, 0.5);
        assert!(!options.static_image_mode);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let options = LandmarkOptions::default().with_detection_confidence(1.5);
        assert!(matches!(
            options.validate(),
            Err(DetectorError::InvalidOptions(_))
        ));
        let options = LandmarkOptions {
            max_hands: 0,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn tracking_threshold_only_outside_static_mode() {
        let options = LandmarkOptions {
            detection_confidence: 0.7,
            tracking_confidence: 0.4,
            ..Default::default()
        };
        assert_eq!(options.threshold(false), 0.7);
        assert_eq!(options.threshold(true), 0.4);
        let stills = LandmarkOptions {
            static_image_mode: true,
            ..options
        };
        assert_eq!(stills.threshold(true), 0.7);
    }
}
