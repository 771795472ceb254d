use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::board::Board;
use crate::detected_points::{FeaturePoint, FrameFeature};
use crate::error::{CalibError, Result};
use crate::visualization::log_image_as_compressed;
use calib_targets::detect::detect_charuco_best;
use glam::Vec2;
use glob::glob;
use image::{DynamicImage, ImageReader};
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;

/// A frame must have at least this many identified ChArUco corners.
pub const MIN_CORNERS: usize = 4;

fn img_filter(rp: glob::GlobResult) -> Option<PathBuf> {
    if let Ok(p) = rp {
        for ext in &[".png", ".jpg", ".jpeg"] {
            if p.as_os_str().to_string_lossy().to_lowercase().ends_with(ext) {
                return Some(p);
            }
        }
    }
    None
}

/// Images of one camera directory, sorted by file name.
pub fn list_images(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(CalibError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "camera directory not found"),
        ));
    }
    let pattern = dir.join("*");
    let img_paths = glob(&pattern.to_string_lossy()).map_err(|e| {
        CalibError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()),
        )
    })?;
    let mut sorted_path: Vec<PathBuf> = img_paths.into_iter().filter_map(img_filter).collect();
    sorted_path.sort();
    Ok(sorted_path)
}

/// Pairs the n-th base image with the n-th sub image.
pub fn get_image_pairs(
    base_dir: impl AsRef<Path>,
    sub_dir: impl AsRef<Path>,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    let base_images = list_images(base_dir)?;
    let sub_images = list_images(sub_dir)?;
    if base_images.len() != sub_images.len() {
        return Err(CalibError::ImageCountMismatch {
            base: base_images.len(),
            sub: sub_images.len(),
        });
    }
    Ok(base_images.into_iter().zip(sub_images).collect())
}

/// Runs the ChArUco detector over the board's parameter sweep and keeps
/// corners whose id exists on the board.
///
/// Returns `None` if fewer than [`MIN_CORNERS`] corners were identified.
pub fn detect_frame(board: &Board, img: &DynamicImage, frame_idx: usize) -> Option<FrameFeature> {
    let gray = img.to_luma8();
    let detection = match detect_charuco_best(&gray, &board.detector_sweep()) {
        Ok(d) => d,
        Err(e) => {
            log::debug!("frame {}: charuco detection failed: {}", frame_idx, e);
            return None;
        }
    };

    let features: HashMap<u32, FeaturePoint> = detection
        .detection
        .corners
        .iter()
        .filter_map(|c| {
            let id = c.id?;
            match board.object_point(id) {
                Some(p3d) => Some((
                    id,
                    FeaturePoint {
                        p2d: Vec2::new(c.position.x, c.position.y),
                        p3d,
                    },
                )),
                None => {
                    log::warn!(
                        "frame {}: corner id {} is out of bounds for a board with {} corners",
                        frame_idx,
                        id,
                        board.corner_count()
                    );
                    None
                }
            }
        })
        .collect();

    if features.len() < MIN_CORNERS {
        None
    } else {
        Some(FrameFeature {
            frame_idx,
            img_w_h: (img.width(), img.height()),
            features,
        })
    }
}

fn load_image(path: &Path) -> Result<DynamicImage> {
    ImageReader::open(path)
        .map_err(|e| CalibError::io(path, e))?
        .decode()
        .map_err(|source| CalibError::Image {
            path: path.to_path_buf(),
            source,
        })
}

/// Detected features of one stereo pair; `None` where detection failed.
pub struct PairFeatures {
    pub frame_idx: usize,
    pub base: Option<FrameFeature>,
    pub sub: Option<FrameFeature>,
}

/// Detects corners in every pair in parallel.
///
/// Pairs with an unreadable image are dropped with a warning.
pub fn load_pair_features(
    pairs: &[(PathBuf, PathBuf)],
    board: &Board,
    recording_option: Option<&rerun::RecordingStream>,
    topics: (&str, &str),
) -> Vec<PairFeatures> {
    let mut pair_features: Vec<PairFeatures> = pairs
        .par_iter()
        .enumerate()
        .progress_count(pairs.len() as u64)
        .filter_map(|(idx, (base_path, sub_path))| {
            let (base_img, sub_img) = match (load_image(base_path), load_image(sub_path)) {
                (Ok(b), Ok(s)) => (b, s),
                (Err(e), _) | (_, Err(e)) => {
                    log::warn!("Unable to read pair {}: {}. Skipping.", idx + 1, e);
                    return None;
                }
            };
            if let Some(recording) = recording_option {
                recording.set_time_sequence("frame", idx as i64);
                log_image_as_compressed(recording, topics.0, &base_img, image::ImageFormat::Jpeg);
                log_image_as_compressed(recording, topics.1, &sub_img, image::ImageFormat::Jpeg);
            }
            Some(PairFeatures {
                frame_idx: idx,
                base: detect_frame(board, &base_img, idx),
                sub: detect_frame(board, &sub_img, idx),
            })
        })
        .collect();
    pair_features.sort_by_key(|p| p.frame_idx);
    pair_features
}
