//! System volume contract and the metric-to-volume controller.

use serde::Serialize;
use thiserror::Error;

use crate::mapping::{PinchMapping, Range, map_range};

/// Level domain accepted by a [`VolumeSink`], in the sink's own unit.
pub type VolumeRange = Range;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VolumeError {
    #[error("volume sink unavailable: {reason}")]
    SinkUnavailable { reason: String },
    #[error("volume level {level} outside sink range [{}, {}]", range.lo, range.hi)]
    LevelOutOfRange { level: f32, range: VolumeRange },
}

impl VolumeError {
    /// Every volume failure is reported as the sink being unavailable; the
    /// variants only refine the message.
    pub fn is_sink_unavailable(&self) -> bool {
        matches!(
            self,
            VolumeError::SinkUnavailable { .. } | VolumeError::LevelOutOfRange { .. }
        )
    }
}

/// Output device whose master level can be queried and set.
pub trait VolumeSink {
    fn range(&self) -> Result<VolumeRange, VolumeError>;
    fn set_level(&mut self, level: f32) -> Result<(), VolumeError>;
}

impl<S: VolumeSink + ?Sized> VolumeSink for &mut S {
    fn range(&self) -> Result<VolumeRange, VolumeError> {
        (**self).range()
    }

    fn set_level(&mut self, level: f32) -> Result<(), VolumeError> {
        (**self).set_level(level)
    }
}

impl<S: VolumeSink + ?Sized> VolumeSink for Box<S> {
    fn range(&self) -> Result<VolumeRange, VolumeError> {
        (**self).range()
    }

    fn set_level(&mut self, level: f32) -> Result<(), VolumeError> {
        (**self).set_level(level)
    }
}

/// Values derived from one pinch metric.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct VolumeReading {
    pub metric: f32,
    pub level: f32,
    pub percent: f32,
    pub bar_px: f32,
}

/// Maps pinch metrics to volume readings and pushes levels into a sink.
pub struct VolumeController<S> {
    sink: S,
    range: VolumeRange,
    mapping: PinchMapping,
}

impl<S: VolumeSink> VolumeController<S> {
    /// Query the sink range once; it stays fixed for the session.
    pub fn new(sink: S, mapping: PinchMapping) -> Result<Self, VolumeError> {
        let range = sink.range()?;
        tracing::debug!(lo = range.lo, hi = range.hi, "volume sink range");
        Ok(Self {
            sink,
            range,
            mapping,
        })
    }

    pub fn range(&self) -> VolumeRange {
        self.range
    }

    pub fn reading_for(&self, metric: f32) -> VolumeReading {
        VolumeReading {
            metric,
            level: map_range(metric, self.mapping.input, self.range),
            percent: map_range(metric, self.mapping.input, self.mapping.percent),
            bar_px: map_range(metric, self.mapping.input, self.mapping.bar_px),
        }
    }

    pub fn apply(&mut self, reading: &VolumeReading) -> Result<(), VolumeError> {
        self.sink.set_level(reading.level)
    }

    pub fn apply_metric(&mut self, metric: f32) -> Result<VolumeReading, VolumeError> {
        let reading = self.reading_for(metric);
        self.apply(&reading)?;
        Ok(reading)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
