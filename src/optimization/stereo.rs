use std::collections::HashMap;

use camera_intrinsic_model::GenericModel;
use log::{debug, info, warn};
use nalgebra as na;
use tiny_solver::LevenbergMarquardtOptimizer;
use tiny_solver::loss_functions::{HuberLoss, Loss};
use tiny_solver::optimizer::{Optimizer, OptimizerOptions};
use tiny_solver::problem::Problem;

use super::factors::{BoardReprojectionFactor, StereoReprojectionFactor};
use super::linear::init_pose;
use crate::camera::CameraIntrinsics;
use crate::detected_points::{FeaturePoint, FrameFeature};
use crate::error::{CalibError, Result};
use crate::types::{ToRvecTvec, isometry_from_params};

const RELATIVE_KEY: &str = "base_to_sub";

#[derive(Debug, Clone)]
pub struct StereoCalibOptions {
    pub min_pairs: usize,
    pub min_common_corners: usize,
    pub max_iterations: usize,
    /// Huber scale in pixels; `None` is plain least squares.
    pub huber_px: Option<f64>,
}

impl Default for StereoCalibOptions {
    fn default() -> Self {
        Self {
            min_pairs: 5,
            min_common_corners: 4,
            max_iterations: 100,
            huber_px: None,
        }
    }
}

/// Corners seen by both cameras in one pair, ordered by corner id.
#[derive(Debug, Clone)]
pub struct StereoPair {
    pub frame_idx: usize,
    pub ids: Vec<u32>,
    pub base: Vec<FeaturePoint>,
    pub sub: Vec<FeaturePoint>,
}

impl StereoPair {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Intersects the corner ids of two detections.
///
/// Returns `None` if fewer than `min_common` corners are shared.
pub fn match_common_corners(
    base: &FrameFeature,
    sub: &FrameFeature,
    min_common: usize,
) -> Option<StereoPair> {
    let mut ids: Vec<u32> = base
        .features
        .keys()
        .filter(|id| sub.features.contains_key(id))
        .copied()
        .collect();
    if ids.len() < min_common {
        return None;
    }
    ids.sort_unstable();
    let base_pts = ids.iter().map(|id| base.features[id]).collect();
    let sub_pts = ids.iter().map(|id| sub.features[id]).collect();
    Some(StereoPair {
        frame_idx: base.frame_idx,
        ids,
        base: base_pts,
        sub: sub_pts,
    })
}

#[derive(Debug, Clone)]
pub struct StereoCalibration {
    /// Base camera frame to sub camera frame, `X_sub = R * X_base + T`.
    pub base_to_sub: na::Isometry3<f64>,
    /// Board to base camera, one per used pair.
    pub board_poses: Vec<(usize, na::Isometry3<f64>)>,
    pub rms: f64,
    pub base_rms: f64,
    pub sub_rms: f64,
    pub used_pairs: usize,
    pub point_count: usize,
}

impl StereoCalibration {
    pub fn rotation(&self) -> na::Matrix3<f64> {
        self.base_to_sub.rotation.to_rotation_matrix().into_inner()
    }

    pub fn translation(&self) -> na::Vector3<f64> {
        self.base_to_sub.translation.vector
    }

    pub fn baseline(&self) -> f64 {
        self.translation().norm()
    }
}

/// Averages rigid transforms: sign aligned quaternion mean and mean translation.
pub fn average_isometries(poses: &[na::Isometry3<f64>]) -> Option<na::Isometry3<f64>> {
    let first = poses.first()?;
    let reference = first.rotation.coords;
    let mut q_sum = na::Vector4::zeros();
    let mut t_sum = na::Vector3::zeros();
    for pose in poses {
        let q = pose.rotation.coords;
        q_sum += if q.dot(&reference) < 0.0 { -q } else { q };
        t_sum += pose.translation.vector;
    }
    let rotation = na::UnitQuaternion::from_quaternion(na::Quaternion::from(q_sum));
    let translation = t_sum / poses.len() as f64;
    Some(na::Isometry3::from_parts(
        na::Translation3::from(translation),
        rotation,
    ))
}

fn pose_key(idx: usize) -> String {
    format!("pose{}", idx)
}

fn squared_errors(
    model: &GenericModel<f64>,
    board_to_cam: &na::Isometry3<f64>,
    points: &[FeaturePoint],
) -> Vec<f64> {
    points
        .iter()
        .map(|p| {
            let p3d = board_to_cam
                * na::Point3::new(p.p3d.x as f64, p.p3d.y as f64, p.p3d.z as f64);
            let p2d = model.project_one(&p3d.coords);
            let dx = p2d.x - p.p2d.x as f64;
            let dy = p2d.y - p.p2d.y as f64;
            dx * dx + dy * dy
        })
        .collect()
}

/// Per-point reprojection errors in pixels for one pair, `(base, sub)`.
pub fn pair_reprojection_errors(
    base_cam: &CameraIntrinsics,
    sub_cam: &CameraIntrinsics,
    base_to_sub: &na::Isometry3<f64>,
    board_to_base: &na::Isometry3<f64>,
    pair: &StereoPair,
) -> (Vec<f64>, Vec<f64>) {
    let base: Vec<f64> = squared_errors(&base_cam.model(), board_to_base, &pair.base)
        .into_iter()
        .map(f64::sqrt)
        .collect();
    let sub: Vec<f64> = squared_errors(&sub_cam.model(), &(base_to_sub * board_to_base), &pair.sub)
        .into_iter()
        .map(f64::sqrt)
        .collect();
    (base, sub)
}

/// Solves the base to sub transform with both intrinsics held fixed.
///
/// Pairs whose pose cannot be initialised in either camera are skipped.
pub fn stereo_calibrate(
    base_cam: &CameraIntrinsics,
    sub_cam: &CameraIntrinsics,
    pairs: &[StereoPair],
    options: &StereoCalibOptions,
) -> Result<StereoCalibration> {
    if let Some(scale) = options.huber_px {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(CalibError::InvalidHuberScale(scale));
        }
    }
    if pairs.len() < options.min_pairs {
        return Err(CalibError::NotEnoughPairs {
            needed: options.min_pairs,
            got: pairs.len(),
        });
    }

    let mut initialised = Vec::new();
    for pair in pairs {
        let base_pose = init_pose(base_cam, &pair.base);
        let sub_pose = init_pose(sub_cam, &pair.sub);
        match (base_pose, sub_pose) {
            (Some(b), Some(s)) => {
                let b = b.to_na_isometry3();
                let relative = s.to_na_isometry3() * b.inverse();
                initialised.push((pair, b, relative));
            }
            _ => warn!(
                "pose initialisation failed for pair {}. Skipping.",
                pair.frame_idx + 1
            ),
        }
    }
    if initialised.len() < options.min_pairs {
        return Err(CalibError::NotEnoughPairs {
            needed: options.min_pairs,
            got: initialised.len(),
        });
    }

    let relatives: Vec<_> = initialised.iter().map(|(_, _, r)| *r).collect();
    let init_relative = average_isometries(&relatives)
        .ok_or_else(|| CalibError::CalibrationFailed("no initial relative pose".to_string()))?;
    debug!(
        "initial base to sub translation {:?}",
        init_relative.translation.vector.as_slice()
    );

    let base_model = base_cam.model();
    let sub_model = sub_cam.model();
    let mut problem = Problem::new();
    let mut initial_values = HashMap::<String, na::DVector<f64>>::new();
    initial_values.insert(
        RELATIVE_KEY.to_string(),
        init_relative.to_rvec_tvec().to_dvec(),
    );

    let loss = || -> Option<Box<dyn Loss + Send>> {
        options
            .huber_px
            .map(|scale| Box::new(HuberLoss::new(scale)) as Box<dyn Loss + Send>)
    };

    for (i, (pair, board_to_base, _)) in initialised.iter().enumerate() {
        let key = pose_key(i);
        initial_values.insert(key.clone(), board_to_base.to_rvec_tvec().to_dvec());
        for (base_pt, sub_pt) in pair.base.iter().zip(&pair.sub) {
            let base_factor = BoardReprojectionFactor::new(&base_model, &base_pt.p3d, &base_pt.p2d);
            problem.add_residual_block(2, &[key.as_str()], Box::new(base_factor), loss());
            let sub_factor = StereoReprojectionFactor::new(&sub_model, &sub_pt.p3d, &sub_pt.p2d);
            problem.add_residual_block(
                2,
                &[RELATIVE_KEY, key.as_str()],
                Box::new(sub_factor),
                loss(),
            );
        }
    }

    let optimizer = LevenbergMarquardtOptimizer::default();
    let optimizer_options = OptimizerOptions {
        max_iteration: options.max_iterations,
        ..OptimizerOptions::default()
    };
    info!("Starting stereo calibration on {} pairs...", initialised.len());
    let result = optimizer
        .optimize(&problem, &initial_values, Some(optimizer_options))
        .ok_or_else(|| CalibError::CalibrationFailed("optimizer did not converge".to_string()))?;

    let relative_params = result
        .get(RELATIVE_KEY)
        .ok_or_else(|| CalibError::CalibrationFailed("missing relative pose".to_string()))?;
    let base_to_sub = isometry_from_params(relative_params);

    let mut board_poses = Vec::with_capacity(initialised.len());
    let mut base_sq = 0.0;
    let mut sub_sq = 0.0;
    let mut point_count = 0;
    for (i, (pair, _, _)) in initialised.iter().enumerate() {
        let params = result
            .get(&pose_key(i))
            .ok_or_else(|| CalibError::CalibrationFailed(format!("missing pose {}", i)))?;
        let board_to_base = isometry_from_params(params);
        base_sq += squared_errors(&base_model, &board_to_base, &pair.base)
            .iter()
            .sum::<f64>();
        sub_sq += squared_errors(&sub_model, &(base_to_sub * board_to_base), &pair.sub)
            .iter()
            .sum::<f64>();
        point_count += pair.len();
        board_poses.push((pair.frame_idx, board_to_base));
    }

    let rms = ((base_sq + sub_sq) / (2 * point_count) as f64).sqrt();
    if !rms.is_finite() {
        return Err(CalibError::CalibrationFailed(
            "non finite reprojection error".to_string(),
        ));
    }

    Ok(StereoCalibration {
        base_to_sub,
        board_poses,
        rms,
        base_rms: (base_sq / point_count as f64).sqrt(),
        sub_rms: (sub_sq / point_count as f64).sqrt(),
        used_pairs: initialised.len(),
        point_count,
    })
}
