//! Cropping object parts out of images using segmentation detections.
//!
//! Detections come from an external text-prompted segmentation model and are
//! read from JSON: a list of result objects, each holding parallel `boxes`,
//! `scores`, `masks` and `labels` arrays. Masks cover the full image.

use std::fs;
use std::path::{Path, PathBuf};

use image::{imageops, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{R3dError, Result};

/// One model output for one image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionResult {
    /// `[x1, y1, x2, y2]` in pixels
    pub boxes: Vec<[f64; 4]>,
    pub scores: Vec<f64>,
    /// Per-detection masks indexed `[row][column]`
    pub masks: Vec<Vec<Vec<f32>>>,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropOptions {
    pub score_threshold: f64,
    /// Only detections whose label contains this text are kept
    pub label_filter: String,
    /// Mask values above this keep their pixel
    pub mask_threshold: f32,
    pub canny_low: f32,
    pub canny_high: f32,
}

impl Default for CropOptions {
    fn default() -> Self {
        Self {
            score_threshold: 0.0,
            label_filter: "curved".to_string(),
            mask_threshold: 0.5,
            canny_low: 200.0,
            canny_high: 400.0,
        }
    }
}

pub fn load_detections(path: &Path) -> Result<Vec<DetectionResult>> {
    let text = fs::read_to_string(path).map_err(R3dError::at(path))?;
    Ok(serde_json::from_str(&text)?)
}

/// Box corners truncated to integers and clamped to the image
fn pixel_box(b: &[f64; 4], width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let clamp = |v: f64, max: u32| (v.trunc().max(0.0) as u32).min(max);
    let (x1, y1) = (clamp(b[0], width), clamp(b[1], height));
    let (x2, y2) = (clamp(b[2], width), clamp(b[3], height));
    (x2 > x1 && y2 > y1).then_some((x1, y1, x2, y2))
}

/// Masked crops for every accepted detection, in detection order
pub fn crop_handles(image: &RgbImage, results: &[DetectionResult], options: &CropOptions) -> Vec<RgbImage> {
    let (width, height) = image.dimensions();
    let mut crops = Vec::new();

    for result in results {
        for (i, &score) in result.scores.iter().enumerate() {
            if score < options.score_threshold {
                continue;
            }
            let (Some(bbox), Some(mask), Some(label)) =
                (result.boxes.get(i), result.masks.get(i), result.labels.get(i))
            else {
                continue;
            };
            if !label.contains(&options.label_filter) {
                continue;
            }
            let Some((x1, y1, x2, y2)) = pixel_box(bbox, width, height) else {
                log::debug!("skipping empty box {bbox:?}");
                continue;
            };

            log::debug!("{label} ({score:.3}) at [{x1}, {y1}, {x2}, {y2}]");
            let mut crop = imageops::crop_imm(image, x1, y1, x2 - x1, y2 - y1).to_image();
            for (x, y, pixel) in crop.enumerate_pixels_mut() {
                let keep = mask
                    .get((y + y1) as usize)
                    .and_then(|row| row.get((x + x1) as usize))
                    .is_some_and(|&m| m > options.mask_threshold);
                if !keep {
                    pixel.0 = [0, 0, 0];
                }
            }
            crops.push(crop);
        }
    }
    crops
}

/// Canny edge map of a crop
pub fn edge_map(crop: &RgbImage, options: &CropOptions) -> GrayImage {
    let gray = imageops::grayscale(crop);
    imageproc::edges::canny(&gray, options.canny_low, options.canny_high)
}

/// Crop `image_path` with the detections in `detections_path`, writing
/// `<image> handle_<n>.png` and `<image> outline_<n>.png` next to the image.
pub fn crop_image_file(
    image_path: &Path,
    detections_path: &Path,
    options: &CropOptions,
) -> Result<Vec<PathBuf>> {
    let image = image::open(image_path)?.to_rgb8();
    let results = load_detections(detections_path)?;
    let crops = crop_handles(&image, &results, options);
    log::info!("{} crops from {} results", crops.len(), results.len());

    let mut written = Vec::new();
    for (idx, crop) in crops.iter().enumerate() {
        let handle_path = sibling(image_path, &format!(" handle_{}.png", idx + 1));
        crop.save(&handle_path)?;
        let outline_path = sibling(image_path, &format!(" outline_{}.png", idx + 1));
        edge_map(crop, options).save(&outline_path)?;
        log::info!("wrote {}", handle_path.display());
        written.push(handle_path);
        written.push(outline_path);
    }
    Ok(written)
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn full_mask(width: usize, height: usize, value: f32) -> Vec<Vec<f32>> {
        vec![vec![value; width]; height]
    }

    #[test]
    fn test_crop_applies_mask_and_filters_labels() {
        let image = RgbImage::from_pixel(8, 6, Rgb([200, 100, 50]));
        let mut mask = full_mask(8, 6, 0.0);
        mask[2][3] = 0.9;
        mask[3][4] = 0.5;

        let results = vec![DetectionResult {
            boxes: vec![[2.0, 1.0, 6.0, 5.0], [0.0, 0.0, 8.0, 6.0]],
            scores: vec![0.8, 0.9],
            masks: vec![mask, full_mask(8, 6, 1.0)],
            labels: vec!["curved handle".to_string(), "mug body".to_string()],
        }];
        let crops = crop_handles(&image, &results, &CropOptions::default());
        assert_eq!(crops.len(), 1);

        let crop = &crops[0];
        assert_eq!(crop.dimensions(), (4, 4));
        assert_eq!(crop.get_pixel(1, 1), &Rgb([200, 100, 50]));
        // At the threshold is masked out
        assert_eq!(crop.get_pixel(2, 2), &Rgb([0, 0, 0]));
        assert_eq!(crop.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_score_threshold_and_missing_masks() {
        let image = RgbImage::new(4, 4);
        let results = vec![DetectionResult {
            boxes: vec![[0.0, 0.0, 2.0, 2.0], [0.0, 0.0, 3.0, 3.0]],
            scores: vec![0.2, 0.9],
            masks: vec![full_mask(4, 4, 1.0)],
            labels: vec!["curved".to_string(), "curved".to_string()],
        }];
        let options = CropOptions {
            score_threshold: 0.5,
            ..CropOptions::default()
        };
        assert!(crop_handles(&image, &results, &options).is_empty());
        assert_eq!(crop_handles(&image, &results, &CropOptions::default()).len(), 1);
    }

    #[test]
    fn test_crop_file_writes_numbered_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("mug.png");
        RgbImage::from_pixel(8, 6, Rgb([90, 120, 30])).save(&image_path).unwrap();

        let results = vec![DetectionResult {
            boxes: vec![[0.0, 0.0, 4.0, 4.0], [2.0, 1.0, 8.0, 6.0]],
            scores: vec![0.9, 0.7],
            masks: vec![full_mask(8, 6, 1.0), full_mask(8, 6, 1.0)],
            labels: vec!["curved".to_string(), "curved".to_string()],
        }];
        let detections_path = dir.path().join("mug.json");
        std::fs::write(&detections_path, serde_json::to_string(&results).unwrap()).unwrap();

        let written = crop_image_file(&image_path, &detections_path, &CropOptions::default()).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "mug.png handle_1.png",
                "mug.png outline_1.png",
                "mug.png handle_2.png",
                "mug.png outline_2.png",
            ]
        );
        assert!(written.iter().all(|p| p.exists()));
        assert_eq!(image::open(&written[2]).unwrap().to_rgb8().dimensions(), (6, 5));
    }

    #[test]
    fn test_boxes_are_clamped() {
        assert_eq!(pixel_box(&[-3.0, 1.7, 20.0, 4.2], 10, 8), Some((0, 1, 10, 4)));
        assert_eq!(pixel_box(&[5.0, 5.0, 5.0, 9.0], 10, 8), None);
    }

    #[test]
    fn test_detections_json_defaults() {
        let results: Vec<DetectionResult> =
            serde_json::from_str(r#"[{"scores": [0.4], "labels": ["curved"]}, {}]"#).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].boxes.is_empty());
        let image = RgbImage::new(2, 2);
        assert!(crop_handles(&image, &results, &CropOptions::default()).is_empty());
    }

    #[test]
    fn test_edge_map_finds_step() {
        let crop = RgbImage::from_fn(16, 16, |x, _| if x < 8 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) });
        let edges = edge_map(&crop, &CropOptions::default());
        assert_eq!(edges.dimensions(), (16, 16));
        assert!(edges.pixels().any(|p| p.0[0] == 255));
    }
}
