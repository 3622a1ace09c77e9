use anyhow::Error;
use image::RgbImage;
use thiserror::Error;

/// Raw 3-channel frame captured from a camera.
#[derive(Clone, Debug)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp_ms: i64,
    pub format: FrameFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameFormat {
    Bgr8,
    Rgb8,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera #{index} unavailable")]
    Unavailable { index: u32 },
    #[error("frame buffer holds {got} bytes, expected {expected}")]
    BufferSize { got: usize, expected: usize },
    #[error(transparent)]
    Other(#[from] Error),
}

impl Frame {
    fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Mirror the frame left-to-right in place.
    pub fn flip_horizontal(&mut self) {
        let width = self.width as usize;
        if width < 2 {
            return;
        }
        let stride = width * 3;
        for row in self.data.chunks_exact_mut(stride) {
            for x in 0..width / 2 {
                let mirrored = width - 1 - x;
                for channel in 0..3 {
                    row.swap(x * 3 + channel, mirrored * 3 + channel);
                }
            }
        }
    }

    /// Copy the frame into an RGB canvas, swapping channels for BGR input.
    pub fn to_rgb_image(&self) -> Result<RgbImage, CaptureError> {
        let expected = self.expected_len();
        if self.data.len() != expected {
            return Err(CaptureError::BufferSize {
                got: self.data.len(),
                expected,
            });
        }
        let rgb = match self.format {
            FrameFormat::Rgb8 => self.data.clone(),
            FrameFormat::Bgr8 => {
                let mut output = Vec::with_capacity(expected);
                for chunk in self.data.chunks_exact(3) {
                    output.push(chunk[2]);
                    output.push(chunk[1]);
                    output.push(chunk[0]);
                }
                output
            }
        };
        RgbImage::from_vec(self.width, self.height, rgb).ok_or(CaptureError::BufferSize {
            got: self.data.len(),
            expected,
        })
    }
}
