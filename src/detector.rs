use std::path::Path;

use image::{imageops, imageops::FilterType, RgbImage};
use ndarray::prelude::*;
use nshare::AsNdarray3;
use ort::value::TensorRef;
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::SessionBuilder, Session},
};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{
    errors::{MvPeopleError, Result},
    traits::PersonDetector,
};

/// COCO class index of "person".
pub const PERSON_CLASS: usize = 0;
pub const DEFAULT_CONFIDENCE: f32 = 0.5;
/// Input side used when the model declares a dynamic input shape.
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// YOLO object detector reduced to a yes/no "is there a person" answer.
pub struct YoloPersonDetector {
    pub image_size: u32,
    confidence: f32,
    input_name: String,
    output_name: String,
    session: Mutex<Session>,
}

fn model_error(operation: impl Into<String>, source: ort::Error) -> MvPeopleError {
    MvPeopleError::Model {
        operation: operation.into(),
        source: Box::new(source),
    }
}

impl YoloPersonDetector {
    pub fn new(model_path: &Path, device_id: i32, confidence: f32) -> Result<Self> {
        let mut session = SessionBuilder::new()
            .map_err(|e| model_error("session builder init", e))?
            .with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])
            .map_err(|e| model_error("register execution providers", e))?
            .with_memory_pattern(true)
            .map_err(|e| model_error("enable memory pattern", e))?
            .commit_from_file(model_path)
            .map_err(|e| model_error(format!("load model {}", model_path.display()), e))?;

        let input = session.inputs.first().ok_or_else(|| MvPeopleError::Model {
            operation: "read model inputs".to_string(),
            source: "model has no inputs".into(),
        })?;
        let image_size = match input.input_type.tensor_shape().and_then(|s| s.get(2).copied()) {
            Some(side) if side > 0 => side as u32,
            _ => DEFAULT_INPUT_SIZE,
        };
        let input_name = input.name.clone();
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| MvPeopleError::Model {
                operation: "read model outputs".to_string(),
                source: "model has no outputs".into(),
            })?;

        // initialize model
        let data = Array4::<f32>::zeros((1, 3, image_size as usize, image_size as usize));
        session
            .run(ort::inputs![input_name.as_str() => TensorRef::from_array_view(&data)
                .map_err(|e| model_error("create warm-up tensor", e))?])
            .map_err(|e| model_error("warm-up run", e))?;

        info!(
            path = %model_path.display(),
            image_size,
            input = %input_name,
            output = %output_name,
            "loaded person detection model"
        );

        Ok(Self {
            image_size,
            confidence,
            input_name,
            output_name,
            session: Mutex::new(session),
        })
    }

    /// Runs the network on a preprocessed NCHW tensor.
    pub fn predict(&self, tensor: ArrayView4<f32>) -> Result<bool> {
        let mut binding = self.session.lock();
        let outputs = binding.run(ort::inputs![
            self.input_name.as_str() => TensorRef::from_array_view(&tensor.as_standard_layout())?
        ])?;
        let detections = outputs[self.output_name.as_str()].try_extract_array::<f32>()?;
        person_in_output(detections.view(), self.confidence)
    }
}

impl PersonDetector for YoloPersonDetector {
    fn contains_person(&self, path: &Path) -> Result<bool> {
        let image = image::open(path).map_err(|e| MvPeopleError::Detection {
            path: path.to_path_buf(),
            operation: "decode image".to_string(),
            source: Box::new(e),
        })?;

        let tensor = preprocess(&image.to_rgb8(), self.image_size);
        let found = self
            .predict(tensor.view())
            .map_err(|e| MvPeopleError::Detection {
                path: path.to_path_buf(),
                operation: "inference".to_string(),
                source: Box::new(e),
            })?;

        debug!(path = %path.display(), found, "detection finished");
        Ok(found)
    }
}

/// Stretches the image to the square model input and scales it to `[0, 1]`, NCHW.
pub fn preprocess(image: &RgbImage, image_size: u32) -> Array4<f32> {
    let image = imageops::resize(image, image_size, image_size, FilterType::Triangle);
    image
        .as_ndarray3()
        .slice_move(s![NewAxis, .., .., ..])
        .mapv(|v| f32::from(v) / 255.0)
}

/// Scans raw YOLO output for a confident person.
///
/// Two layouts are accepted:
/// - `[1, 4 + C, N]` (v8 style): box then class scores per column, no objectness.
/// - `[1, N, 5 + C]` (v3/v5 style): box, objectness, class scores per row; the class
///   score is multiplied by the objectness.
///
/// A detection counts when "person" is its best class and the score exceeds `threshold`.
pub fn person_in_output(output: ArrayViewD<f32>, threshold: f32) -> Result<bool> {
    let output = output.into_dimensionality::<Ix3>()?;
    let (batch, a, b) = output.dim();
    if batch != 1 {
        return Err(MvPeopleError::Model {
            operation: "read detections".to_string(),
            source: format!("expected a batch of 1, got {batch}").into(),
        });
    }

    let detections = output.index_axis_move(Axis(0), 0);
    let (rows, class_offset, has_objectness) = if a < b {
        (detections.reversed_axes(), 4, false)
    } else {
        (detections, 5, true)
    };

    if rows.ncols() <= class_offset + PERSON_CLASS {
        return Err(MvPeopleError::Model {
            operation: "read detections".to_string(),
            source: format!("detection rows too short: {} values", rows.ncols()).into(),
        });
    }

    for row in rows.outer_iter() {
        let (best_class, best_score) = row
            .slice(s![class_offset..])
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (class, &score)| {
                if score > best.1 {
                    (class, score)
                } else {
                    best
                }
            });
        let score = if has_objectness {
            best_score * row[4]
        } else {
            best_score
        };

        if best_class == PERSON_CLASS && score > threshold {
            return Ok(true);
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_preprocess_shape_and_scale() {
        let image = RgbImage::from_pixel(30, 10, Rgb([255, 0, 51]));
        let tensor = preprocess(&image, 16);

        assert_eq!(tensor.shape(), &[1, 3, 16, 16]);
        assert!((tensor[[0, 0, 5, 5]] - 1.0).abs() < 0.01);
        assert!(tensor[[0, 1, 5, 5]].abs() < 0.01);
        assert!((tensor[[0, 2, 5, 5]] - 0.2).abs() < 0.01);
    }

    /// `[1, 4 + classes, anchors]` with the given class scores on the first anchors.
    /// Real models have far more anchors than rows; unused anchors score zero.
    fn v8_output(scores: &[[f32; 2]]) -> ArrayD<f32> {
        let mut output = Array3::<f32>::zeros((1, 6, scores.len().max(16)));
        for (anchor, pair) in scores.iter().enumerate() {
            output[[0, 4, anchor]] = pair[0];
            output[[0, 5, anchor]] = pair[1];
        }
        output.into_dyn()
    }

    #[test]
    fn test_v8_layout_person_found() -> Result<()> {
        let output = v8_output(&[[0.1, 0.2], [0.3, 0.1], [0.9, 0.05]]);
        assert!(person_in_output(output.view(), DEFAULT_CONFIDENCE)?);
        Ok(())
    }

    #[test]
    fn test_v8_layout_low_confidence_or_other_class() -> Result<()> {
        let output = v8_output(&[[0.4, 0.1], [0.6, 0.95], [0.5, 0.0]]);
        assert!(!person_in_output(output.view(), DEFAULT_CONFIDENCE)?);
        Ok(())
    }

    #[test]
    fn test_v5_layout_uses_objectness() -> Result<()> {
        // rows: [cx, cy, w, h, objectness, person, other] for 8 boxes, 7 values each
        let mut output = Array3::<f32>::zeros((1, 8, 7));
        output[[0, 0, 4]] = 0.5;
        output[[0, 0, 5]] = 0.9;
        assert!(!person_in_output(output.view().into_dyn(), DEFAULT_CONFIDENCE)?);

        output[[0, 1, 4]] = 0.9;
        output[[0, 1, 5]] = 0.8;
        assert!(person_in_output(output.view().into_dyn(), DEFAULT_CONFIDENCE)?);
        Ok(())
    }

    #[test]
    fn test_wrong_rank_is_model_error() {
        let output = Array2::<f32>::zeros((6, 3)).into_dyn();
        let result = person_in_output(output.view(), DEFAULT_CONFIDENCE);
        assert!(matches!(result, Err(MvPeopleError::Model { .. })));
    }

    #[test]
    fn test_batch_larger_than_one_is_model_error() {
        let output = Array3::<f32>::zeros((2, 6, 10)).into_dyn();
        let result = person_in_output(output.view(), DEFAULT_CONFIDENCE);
        assert!(matches!(result, Err(MvPeopleError::Model { .. })));
    }
}
