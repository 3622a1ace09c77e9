//! Volume sinks selectable from the command line.

use std::process::Command;

use gesture_core::{Range, VolumeError, VolumeRange, VolumeSink};
use tracing::debug;

const DEFAULT_SINK: &str = "@DEFAULT_SINK@";

/// PulseAudio/PipeWire master volume driven through `pactl`.
///
/// Levels are fractions of full scale; `set_level(0.5)` sets 50%.
pub(crate) struct PactlVolumeSink {
    program: String,
    last_percent: Option<u32>,
}

impl Default for PactlVolumeSink {
    fn default() -> Self {
        Self {
            program: "pactl".to_string(),
            last_percent: None,
        }
    }
}

impl PactlVolumeSink {
    fn run(&self, args: &[&str]) -> Result<String, VolumeError> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|err| VolumeError::SinkUnavailable {
                reason: format!("{} {}: {err}", self.program, args.join(" ")),
            })?;
        if !output.status.success() {
            return Err(VolumeError::SinkUnavailable {
                reason: format!(
                    "{} {} exited with {}: {}",
                    self.program,
                    args.join(" "),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl VolumeSink for PactlVolumeSink {
    fn range(&self) -> Result<VolumeRange, VolumeError> {
        let current = self.run(&["get-sink-volume", DEFAULT_SINK])?;
        if let Some(percent) = parse_volume_percent(&current) {
            debug!(percent, "current sink volume");
        }
        Ok(Range::new(0.0, 1.0))
    }

    fn set_level(&mut self, level: f32) -> Result<(), VolumeError> {
        let range = Range::new(0.0, 1.0);
        if !range.contains(level) {
            return Err(VolumeError::LevelOutOfRange { level, range });
        }
        let percent = (level * 100.0).round() as u32;
        if self.last_percent == Some(percent) {
            return Ok(());
        }
        self.run(&["set-sink-volume", DEFAULT_SINK, &format!("{percent}%")])?;
        self.last_percent = Some(percent);
        Ok(())
    }
}

/// First `NN%` token in `pactl get-sink-volume` output.
pub(crate) fn parse_volume_percent(output: &str) -> Option<u32> {
    output
        .split_whitespace()
        .filter_map(|token| token.strip_suffix('%'))
        .find_map(|digits| digits.parse().ok())
}

/// Sink that only records levels. Its default range mirrors a typical
/// Windows endpoint (-65.25 dB to 0 dB).
pub(crate) struct DryRunVolumeSink {
    range: VolumeRange,
    last_level: Option<f32>,
}

impl Default for DryRunVolumeSink {
    fn default() -> Self {
        Self::new(Range::new(-65.25, 0.0))
    }
}

impl DryRunVolumeSink {
    pub(crate) fn new(range: VolumeRange) -> Self {
        Self {
            range,
            last_level: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn last_level(&self) -> Option<f32> {
        self.last_level
    }
}

impl VolumeSink for DryRunVolumeSink {
    fn range(&self) -> Result<VolumeRange, VolumeError> {
        Ok(self.range)
    }

    fn set_level(&mut self, level: f32) -> Result<(), VolumeError> {
        if !self.range.contains(level) {
            return Err(VolumeError::LevelOutOfRange {
                level,
                range: self.range,
            });
        }
        debug!(level, "dry-run volume level");
        self.last_level = Some(level);
        Ok(())
    }
}
