/// Pose-model landmark provider using ONNX Runtime via `ort`.
///
/// Runs a YOLO-style pose network once per frame and partitions its
/// 17-keypoint skeletons into the capability set the rich backend needs:
/// face boxes (from the facial keypoints), hand landmark sets (wrists), and
/// the body-pose landmark set.
use std::path::Path;

use crate::detection::domain::geometry::{FaceBox, Point};
use crate::detection::domain::landmark_provider::{LandmarkObservation, LandmarkProvider};
use crate::shared::frame::Frame;

use super::math::bbox_iou;

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for person detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// COCO skeleton size and layout (x, y, conf per keypoint).
const NUM_KEYPOINTS: usize = 17;
const NUM_KEYPOINT_VALUES: usize = NUM_KEYPOINTS * 3;

/// Minimum keypoint confidence to treat a landmark as visible.
const KEYPOINT_CONF_THRESH: f64 = 0.5;

/// Facial keypoints: nose, eyes, ears.
const FACIAL_KEYPOINTS: std::ops::Range<usize> = 0..5;
const LEFT_WRIST: usize = 9;
const RIGHT_WRIST: usize = 10;

/// The eye/ear span covers only the mid-face; the derived box is widened and
/// extended downward to take in chin and forehead.
const FACE_WIDTH_SCALE: f64 = 1.6;
const FACE_ASPECT: f64 = 1.25;

/// Landmark provider backed by an ONNX Runtime pose session.
pub struct OnnxLandmarkProvider {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxLandmarkProvider {
    /// Load a pose ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting
    /// NCHW). Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    // shape is [N, C, H, W] — use H (square input expected)
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session,
            confidence: DEFAULT_CONFIDENCE,
            input_size,
        })
    }
}

impl LandmarkProvider for OnnxLandmarkProvider {
    fn observe(
        &mut self,
        frame: &Frame,
    ) -> Result<LandmarkObservation, Box<dyn std::error::Error>> {
        // 1. Preprocess: letterbox + normalize → NCHW float32
        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, self.input_size);

        // 2. Inference
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("pose model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape();

        // YOLO output shape is [1, num_features, num_detections] (transposed)
        // or [1, num_detections, num_features]. Handle both.
        let (num_dets, num_feats) = if shape.len() == 3 {
            if shape[1] < shape[2] {
                (shape[2], shape[1])
            } else {
                (shape[1], shape[2])
            }
        } else {
            return Err(format!("Unexpected pose model output shape: {shape:?}").into());
        };
        let transposed = shape.len() == 3 && shape[1] < shape[2];
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        // 3. Parse + NMS
        let mut persons = parse_rows(
            data,
            num_dets,
            num_feats,
            transposed,
            self.confidence,
            scale,
            pad_x,
            pad_y,
        );
        let persons = nms(&mut persons, NMS_IOU_THRESH);

        // 4. Partition keypoints into the capability set
        Ok(build_observation(&persons, frame.width(), frame.height()))
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = (fw * scale).round() as u32;
    let new_h = (fh * scale).round() as u32;
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Build padded image (filled with 114/255 gray, YOLO convention)
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray(); // [H, W, C] u8
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // Nearest-neighbor resize + copy into padded region
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

// ---------------------------------------------------------------------------
// Output decoding
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawPerson {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
    /// `(x, y, conf)` per COCO keypoint, in original frame coordinates.
    /// Empty when the model emits boxes without keypoints.
    keypoints: Vec<(f64, f64, f64)>,
}

/// Decode raw rows `[cx, cy, w, h, conf, 17 × (x, y, conf)]` back into
/// original frame coordinates.
#[allow(clippy::too_many_arguments)]
fn parse_rows(
    data: &[f32],
    num_dets: usize,
    num_feats: usize,
    transposed: bool,
    confidence: f64,
    scale: f64,
    pad_x: u32,
    pad_y: u32,
) -> Vec<RawPerson> {
    let mut persons = Vec::new();

    for i in 0..num_dets {
        let row = if transposed {
            (0..num_feats)
                .map(|f| data[f * num_dets + i])
                .collect::<Vec<f32>>()
        } else {
            data[i * num_feats..(i + 1) * num_feats].to_vec()
        };

        if row.len() < 5 {
            continue;
        }
        let conf = row[4] as f64;
        if conf < confidence {
            continue;
        }

        let cx = row[0] as f64;
        let cy = row[1] as f64;
        let w = row[2] as f64;
        let h = row[3] as f64;

        // Convert from letterbox coords back to original frame coords
        let unmap_x = |v: f64| (v - pad_x as f64) / scale;
        let unmap_y = |v: f64| (v - pad_y as f64) / scale;
        let x1 = unmap_x(cx - w / 2.0);
        let y1 = unmap_y(cy - h / 2.0);
        let x2 = unmap_x(cx + w / 2.0);
        let y2 = unmap_y(cy + h / 2.0);

        let keypoints = if row.len() >= 5 + NUM_KEYPOINT_VALUES {
            (0..NUM_KEYPOINTS)
                .map(|k| {
                    let kx = unmap_x(row[5 + k * 3] as f64);
                    let ky = unmap_y(row[5 + k * 3 + 1] as f64);
                    let kconf = row[5 + k * 3 + 2] as f64;
                    (kx, ky, kconf)
                })
                .collect()
        } else {
            Vec::new()
        };

        persons.push(RawPerson {
            x1,
            y1,
            x2,
            y2,
            confidence: conf,
            keypoints,
        });
    }

    persons
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(persons: &mut [RawPerson], iou_thresh: f64) -> Vec<RawPerson> {
    persons.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; persons.len()];

    for i in 0..persons.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(persons[i].clone());
        for j in (i + 1)..persons.len() {
            if suppressed[j] {
                continue;
            }
            let iou = bbox_iou(
                &[persons[i].x1, persons[i].y1, persons[i].x2, persons[i].y2],
                &[persons[j].x1, persons[j].y1, persons[j].x2, persons[j].y2],
            );
            if iou > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

// ---------------------------------------------------------------------------
// Capability partitioning
// ---------------------------------------------------------------------------

/// Visible facial keypoints of a person, in frame coordinates.
fn facial_points(person: &RawPerson) -> Vec<(f64, f64)> {
    FACIAL_KEYPOINTS
        .filter_map(|k| person.keypoints.get(k).copied())
        .filter(|&(_, _, conf)| conf >= KEYPOINT_CONF_THRESH)
        .map(|(x, y, _)| (x, y))
        .collect()
}

/// Derive a face box from the facial keypoints. Needs at least two visible
/// points with horizontal spread to anchor the scale.
fn face_box_from_facial_points(points: &[(f64, f64)]) -> Option<(f64, f64, f64, f64)> {
    if points.len() < 2 {
        return None;
    }
    let min_x = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let span = max_x - min_x;
    if span <= 0.0 {
        return None;
    }

    let width = span * FACE_WIDTH_SCALE;
    let height = width * FACE_ASPECT;
    let cx = (min_x + max_x) / 2.0;
    let cy = points.iter().map(|p| p.1).sum::<f64>() / points.len() as f64;
    // Eyes and ears sit above the face's vertical center
    Some((cx - width / 2.0, cy - height * 0.45, width, height))
}

/// Partition person detections into the observation the check suite reads.
/// Persons arrive confidence-sorted; the first one anchors the pose and
/// facial landmark sets.
fn build_observation(persons: &[RawPerson], frame_w: u32, frame_h: u32) -> LandmarkObservation {
    let nx = |v: f64| v / f64::from(frame_w);
    let ny = |v: f64| v / f64::from(frame_h);

    let faces: Vec<FaceBox> = persons
        .iter()
        .filter_map(|p| face_box_from_facial_points(&facial_points(p)))
        .map(|(x, y, w, h)| FaceBox {
            x: nx(x),
            y: ny(y),
            width: nx(w),
            height: ny(h),
        })
        .collect();

    let mut hands = Vec::new();
    for person in persons {
        for wrist in [LEFT_WRIST, RIGHT_WRIST] {
            if let Some(&(x, y, conf)) = person.keypoints.get(wrist) {
                if conf >= KEYPOINT_CONF_THRESH {
                    hands.push(vec![Point::new(nx(x), ny(y))]);
                }
            }
        }
    }

    let (face_landmarks, pose) = match persons.first() {
        None => (Vec::new(), Vec::new()),
        Some(person) => {
            let face_landmarks = facial_points(person)
                .iter()
                .map(|&(x, y)| Point::new(nx(x), ny(y)))
                .collect();
            // The full skeleton regardless of per-keypoint confidence, so
            // the movement comparison always sees a stable cardinality.
            let pose = person
                .keypoints
                .iter()
                .map(|&(x, y, _)| Point::new(nx(x), ny(y)))
                .collect();
            (face_landmarks, pose)
        }
    };

    LandmarkObservation {
        faces,
        face_landmarks,
        hands,
        pose,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
