use std::{
    convert::TryFrom,
    path::{Path, PathBuf},
};

use anyhow::{Result, anyhow, bail};
use image::{RgbImage, imageops::FilterType};
use tch::{self, Device, IValue, Kind, Tensor};

use crate::{
    landmarks::{LANDMARK_COUNT, Landmark},
    source::{DetectorError, LandmarkBackend, LandmarkList, LandmarkOptions, LandmarkSource},
};

/// Values per landmark in the module output (x, y, z).
const LANDMARK_STRIDE: usize = 3;

/// Loads [`TorchHandLandmarker`]s from a TorchScript export.
#[derive(Clone, Debug)]
pub struct TorchBackend {
    pub model_path: PathBuf,
    pub device: Device,
    pub input_size: (u32, u32),
}

impl LandmarkBackend for TorchBackend {
    fn create(&self, options: &LandmarkOptions) -> Result<Box<dyn LandmarkSource>, DetectorError> {
        options.validate()?;
        let landmarker =
            TorchHandLandmarker::new(&self.model_path, self.device, self.input_size, options.clone())?;
        Ok(Box::new(landmarker))
    }
}

/// TorchScript hand landmark model.
///
/// The module takes a `[1, 3, H, W]` float tensor in `0..=1` and returns a
/// tuple `(landmarks [N, 21, 3], scores [N])` with coordinates normalized to
/// the input image.
pub struct TorchHandLandmarker {
    module: tch::CModule,
    device: Device,
    input_size: (u32, u32),
    options: LandmarkOptions,
    tracking: bool,
}

impl TorchHandLandmarker {
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        device: Device,
        input_size: (u32, u32),
        options: LandmarkOptions,
    ) -> Result<Self> {
        let module = tch::CModule::load_on_device(model_path, device)?;
        Ok(Self {
            module,
            device,
            input_size,
            options,
            tracking: false,
        })
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Resize an RGB frame to the model input and build a normalized NCHW tensor.
    pub fn image_to_tensor(&self, image: &RgbImage) -> Result<Tensor> {
        let (in_w, in_h) = self.input_size;
        let resized;
        let source = if image.dimensions() != (in_w, in_h) {
            resized = image::imageops::resize(image, in_w, in_h, FilterType::Triangle);
            &resized
        } else {
            image
        };

        let tensor = Tensor::from_slice(source.as_raw())
            .to_device(self.device)
            .to_kind(Kind::Float)
            .view([1, in_h as i64, in_w as i64, 3])
            .permute([0, 3, 1, 2])
            / 255.0;
        Ok(tensor)
    }

    fn infer(&self, input: &Tensor) -> Result<(Vec<f32>, Vec<f32>)> {
        let output = self.module.forward_is(&[IValue::Tensor(input.shallow_clone())])?;
        let (landmarks, scores) = match output {
            IValue::Tuple(mut values) if values.len() == 2 => {
                let scores = values.pop();
                let landmarks = values.pop();
                match (landmarks, scores) {
                    (Some(IValue::Tensor(l)), Some(IValue::Tensor(s))) => (l, s),
                    _ => bail!("landmark module must return (Tensor, Tensor)"),
                }
            }
            other => bail!("unexpected landmark module output: {other:?}"),
        };

        let shape = landmarks.size();
        if shape.len() != 3
            || shape[1] != LANDMARK_COUNT as i64
            || shape[2] != LANDMARK_STRIDE as i64
        {
            bail!("unexpected landmark tensor shape: {shape:?}");
        }

        let flat = landmarks
            .to_device(Device::Cpu)
            .to_kind(Kind::Float)
            .flatten(0, -1)
            .contiguous();
        let scores = scores
            .to_device(Device::Cpu)
            .to_kind(Kind::Float)
            .flatten(0, -1)
            .contiguous();
        let flat = Vec::<f32>::try_from(&flat)?;
        let scores = Vec::<f32>::try_from(&scores)?;
        if scores.len() * LANDMARK_COUNT * LANDMARK_STRIDE != flat.len() {
            return Err(anyhow!(
                "landmark/score count mismatch: {} values for {} scores",
                flat.len(),
                scores.len()
            ));
        }
        Ok((flat, scores))
    }
}

impl LandmarkSource for TorchHandLandmarker {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<LandmarkList>, DetectorError> {
        let (width, height) = image.dimensions();
        let input = self.image_to_tensor(image)?;
        let (flat, scores) = self.infer(&input)?;
        let threshold = self.options.threshold(self.tracking);

        let hands: Vec<LandmarkList> = flat
            .chunks_exact(LANDMARK_COUNT * LANDMARK_STRIDE)
            .zip(scores.iter())
            .filter(|(_, score)| **score >= threshold)
            .take(self.options.max_hands)
            .map(|(points, _)| {
                points
                    .chunks_exact(LANDMARK_STRIDE)
                    .enumerate()
                    .map(|(id, xyz)| Landmark::from_normalized(id as u8, xyz[0], xyz[1], width, height))
                    .collect()
            })
            .collect();
        self.tracking = !hands.is_empty();
        Ok(hands)
    }
}
