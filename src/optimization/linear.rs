use nalgebra as na;
use sqpnp_simple::sqpnp_solve_glam;

use crate::camera::{CameraIntrinsics, unproject_normalized};
use crate::detected_points::FeaturePoint;
use crate::types::RvecTvec;

/// Board to camera pose from undistorted correspondences.
///
/// Returns `None` when SQPnP fails or fewer than four points are given.
pub fn init_pose(camera: &CameraIntrinsics, points: &[FeaturePoint]) -> Option<RvecTvec> {
    if points.len() < 4 {
        return None;
    }
    let model = camera.model();
    let (p2ds_z, p3ds): (Vec<_>, Vec<_>) = points
        .iter()
        .map(|f| {
            let xy = unproject_normalized(&model, &na::Vector2::new(f.p2d.x as f64, f.p2d.y as f64));
            (glam::Vec2::new(xy.x as f32, xy.y as f32), f.p3d)
        })
        .unzip();

    let (r, t) = sqpnp_solve_glam(&p3ds, &p2ds_z)?;
    if !(r.0.is_finite() && r.1.is_finite() && r.2.is_finite() && t.2.is_finite()) {
        return None;
    }
    Some(RvecTvec::from_tuples(r, t))
}
