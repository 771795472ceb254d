use charuco_stereo_calibration::board::create_default_board;
use charuco_stereo_calibration::camera::{CameraIntrinsics, project_checked};
use charuco_stereo_calibration::detected_points::{FeaturePoint, FrameFeature};
use charuco_stereo_calibration::error::CalibError;
use charuco_stereo_calibration::optimization::{
    BoardReprojectionFactor, StereoCalibOptions, StereoReprojectionFactor, average_isometries,
    init_pose, match_common_corners, stereo_calibrate,
};
use charuco_stereo_calibration::types::ToRvecTvec;
use glam::{Vec2, Vec3};
use nalgebra as na;
use std::collections::HashMap;
use tiny_solver::factors::Factor;

fn base_camera() -> CameraIntrinsics {
    CameraIntrinsics::new(910.0, 908.0, 640.0, 360.0, &[0.08, -0.15, 0.0005, -0.0003, 0.05])
        .with_resolution(1280, 720)
}

fn sub_camera() -> CameraIntrinsics {
    CameraIntrinsics::new(905.0, 905.0, 632.0, 366.0, &[0.06, -0.12, -0.0004, 0.0002, 0.03])
        .with_resolution(1280, 720)
}

fn ground_truth() -> na::Isometry3<f64> {
    na::Isometry3::from_parts(
        na::Translation3::new(-0.1, 0.005, 0.01),
        na::UnitQuaternion::from_euler_angles(0.01, 0.087, -0.02),
    )
}

fn board_poses() -> Vec<na::Isometry3<f64>> {
    let center = na::Vector3::new(0.075, 0.105, 0.0);
    [
        (0.2, -0.1, 0.05, 0.5),
        (-0.25, 0.15, -0.1, 0.55),
        (0.1, 0.3, 0.15, 0.6),
        (-0.3, -0.2, 0.0, 0.45),
        (0.05, -0.3, -0.15, 0.65),
        (0.3, 0.05, 0.1, 0.5),
        (-0.1, 0.25, 0.2, 0.58),
        (0.15, 0.1, -0.05, 0.52),
    ]
    .iter()
    .map(|&(rx, ry, rz, d)| {
        let rotation = na::UnitQuaternion::from_euler_angles(rx, ry, rz);
        let t = na::Vector3::new(0.01, -0.01, d) - rotation * center;
        na::Isometry3::from_parts(na::Translation3::from(t), rotation)
    })
    .collect()
}

fn synthesize(
    camera: &CameraIntrinsics,
    board_to_cam: &na::Isometry3<f64>,
    id_to_3d: &HashMap<u32, Vec3>,
    frame_idx: usize,
) -> FrameFeature {
    let model = camera.model();
    let features = id_to_3d
        .iter()
        .filter_map(|(id, p3d)| {
            let p = board_to_cam * na::Point3::new(p3d.x as f64, p3d.y as f64, p3d.z as f64);
            let p2d = project_checked(&model, &p.coords)?;
            Some((
                *id,
                FeaturePoint {
                    p2d: Vec2::new(p2d.x as f32, p2d.y as f32),
                    p3d: *p3d,
                },
            ))
        })
        .collect();
    FrameFeature {
        frame_idx,
        img_w_h: (1280, 720),
        features,
    }
}

fn rotation_error(a: &na::Isometry3<f64>, b: &na::Isometry3<f64>) -> f64 {
    a.rotation.angle_to(&b.rotation)
}

#[test]
fn test_init_pose_recovers_board_pose() {
    let board = create_default_board().unwrap();
    let cam = base_camera();
    let pose = board_poses()[0];
    let frame = synthesize(&cam, &pose, &board.id_to_3d, 0);
    let points: Vec<_> = frame.features.values().copied().collect();

    let estimated = init_pose(&cam, &points).unwrap().to_na_isometry3();
    assert!(rotation_error(&estimated, &pose) < 2e-3);
    assert!((estimated.translation.vector - pose.translation.vector).norm() < 2e-3);

    assert!(init_pose(&cam, &points[..3]).is_none());
}

#[test]
fn test_reprojection_factors_zero_at_truth() {
    let board = create_default_board().unwrap();
    let base_cam = base_camera();
    let sub_cam = sub_camera();
    let base_to_sub = ground_truth();
    let pose = board_poses()[1];

    let p3d = board.object_point(7).unwrap();
    let p = pose * na::Point3::new(p3d.x as f64, p3d.y as f64, p3d.z as f64);
    let base_model = base_cam.model();
    let sub_model = sub_cam.model();
    let uv_base = base_model.project_one(&p.coords);
    let uv_sub = sub_model.project_one(&(base_to_sub * p).coords);

    let pose_params = pose.to_rvec_tvec().to_dvec();
    let rel_params = base_to_sub.to_rvec_tvec().to_dvec();

    let base_factor = BoardReprojectionFactor::new(
        &base_model,
        &p3d,
        &Vec2::new(uv_base.x as f32, uv_base.y as f32),
    );
    let r = base_factor.residual_func(&[pose_params.clone()]);
    assert_eq!(r.len(), 2);
    assert!(r.norm() < 1e-3);

    let sub_factor = StereoReprojectionFactor::new(
        &sub_model,
        &p3d,
        &Vec2::new(uv_sub.x as f32, uv_sub.y as f32),
    );
    let r = sub_factor.residual_func(&[rel_params.clone(), pose_params.clone()]);
    assert!(r.norm() < 1e-3);

    // a shifted relative pose moves the residual
    let mut shifted = rel_params;
    shifted[3] += 0.01;
    let r = sub_factor.residual_func(&[shifted, pose_params]);
    assert!(r.norm() > 1.0);
}

#[test]
fn test_match_common_corners() {
    let mut base = HashMap::new();
    let mut sub = HashMap::new();
    for id in 0..6u32 {
        let fp = FeaturePoint {
            p2d: Vec2::new(id as f32, 0.0),
            p3d: Vec3::new(id as f32, 0.0, 0.0),
        };
        base.insert(id, fp);
        if id % 2 == 0 || id == 5 {
            sub.insert(id, fp);
        }
    }
    let base = FrameFeature {
        frame_idx: 3,
        img_w_h: (10, 10),
        features: base,
    };
    let sub = FrameFeature {
        frame_idx: 3,
        img_w_h: (10, 10),
        features: sub,
    };

    let pair = match_common_corners(&base, &sub, 4).unwrap();
    assert_eq!(pair.ids, vec![0, 2, 4, 5]);
    assert_eq!(pair.frame_idx, 3);
    assert_eq!(pair.base.len(), 4);
    assert_eq!(pair.sub[3].p3d.x, 5.0);

    assert!(match_common_corners(&base, &sub, 5).is_none());
}

#[test]
fn test_average_isometries() {
    let a = na::Isometry3::from_parts(
        na::Translation3::new(1.0, 0.0, 0.0),
        na::UnitQuaternion::from_euler_angles(0.0, 0.1, 0.0),
    );
    let mut b = na::Isometry3::from_parts(
        na::Translation3::new(3.0, 0.0, 0.0),
        na::UnitQuaternion::from_euler_angles(0.0, 0.1, 0.0),
    );
    // same rotation, opposite quaternion sign
    b.rotation = na::UnitQuaternion::new_unchecked(-b.rotation.into_inner());

    let mean = average_isometries(&[a, b]).unwrap();
    assert!((mean.translation.vector - na::Vector3::new(2.0, 0.0, 0.0)).norm() < 1e-12);
    assert!(mean.rotation.angle_to(&a.rotation) < 1e-9);
    assert!(average_isometries(&[]).is_none());
}

#[test]
fn test_stereo_calibrate_synthetic() {
    let board = create_default_board().unwrap();
    let base_cam = base_camera();
    let sub_cam = sub_camera();
    let truth = ground_truth();

    let pairs: Vec<_> = board_poses()
        .iter()
        .enumerate()
        .filter_map(|(i, pose)| {
            let base = synthesize(&base_cam, pose, &board.id_to_3d, i);
            let sub = synthesize(&sub_cam, &(truth * pose), &board.id_to_3d, i);
            match_common_corners(&base, &sub, 4)
        })
        .collect();
    assert_eq!(pairs.len(), 8);

    let result =
        stereo_calibrate(&base_cam, &sub_cam, &pairs, &StereoCalibOptions::default()).unwrap();
    assert_eq!(result.used_pairs, 8);
    assert!(result.rms < 0.01, "rms {}", result.rms);
    assert!(rotation_error(&result.base_to_sub, &truth) < 1e-4);
    let t_err = (result.translation() - truth.translation.vector).norm();
    assert!(t_err < 1e-3, "translation error {} m", t_err);
    assert!((result.baseline() - truth.translation.vector.norm()).abs() < 1e-3);
}

#[test]
fn test_stereo_calibrate_huber() {
    let board = create_default_board().unwrap();
    let base_cam = base_camera();
    let sub_cam = sub_camera();
    let truth = ground_truth();

    let pairs: Vec<_> = board_poses()
        .iter()
        .enumerate()
        .filter_map(|(i, pose)| {
            let base = synthesize(&base_cam, pose, &board.id_to_3d, i);
            let sub = synthesize(&sub_cam, &(truth * pose), &board.id_to_3d, i);
            match_common_corners(&base, &sub, 4)
        })
        .collect();
    let options = StereoCalibOptions {
        huber_px: Some(1.0),
        ..StereoCalibOptions::default()
    };
    let result = stereo_calibrate(&base_cam, &sub_cam, &pairs, &options).unwrap();
    let t_err = (result.translation() - truth.translation.vector).norm();
    assert!(t_err < 1e-3, "translation error {} m", t_err);
}

#[test]
fn test_stereo_calibrate_not_enough_pairs() {
    let board = create_default_board().unwrap();
    let base_cam = base_camera();
    let sub_cam = sub_camera();
    let truth = ground_truth();

    let pairs: Vec<_> = board_poses()
        .iter()
        .take(4)
        .enumerate()
        .filter_map(|(i, pose)| {
            let base = synthesize(&base_cam, pose, &board.id_to_3d, i);
            let sub = synthesize(&sub_cam, &(truth * pose), &board.id_to_3d, i);
            match_common_corners(&base, &sub, 4)
        })
        .collect();
    match stereo_calibrate(&base_cam, &sub_cam, &pairs, &StereoCalibOptions::default()) {
        Err(CalibError::NotEnoughPairs { needed: 5, got: 4 }) => {}
        other => panic!("unexpected {:?}", other.map(|r| r.rms)),
    }
}

#[test]
fn test_stereo_calibrate_rejects_non_positive_huber() {
    let board = create_default_board().unwrap();
    let base_cam = base_camera();
    let sub_cam = sub_camera();
    let truth = ground_truth();

    let pairs: Vec<_> = board_poses()
        .iter()
        .enumerate()
        .filter_map(|(i, pose)| {
            let base = synthesize(&base_cam, pose, &board.id_to_3d, i);
            let sub = synthesize(&sub_cam, &(truth * pose), &board.id_to_3d, i);
            match_common_corners(&base, &sub, 4)
        })
        .collect();
    for scale in [0.0, -1.0, f64::NAN] {
        let options = StereoCalibOptions {
            huber_px: Some(scale),
            ..StereoCalibOptions::default()
        };
        match stereo_calibrate(&base_cam, &sub_cam, &pairs, &options) {
            Err(CalibError::InvalidHuberScale(_)) => {}
            other => panic!("scale {} gave {:?}", scale, other.map(|r| r.rms)),
        }
    }
}
