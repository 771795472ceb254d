use camera_intrinsic_model::GenericModel;
use nalgebra as na;
use tiny_solver::factors::Factor;

use crate::types::isometry_from_params;

fn reprojection_residual<T: na::RealField>(
    model: &GenericModel<f64>,
    board_to_cam: &na::Isometry3<T>,
    p3d: &[f64; 3],
    p2d: &[f64; 2],
) -> na::DVector<T> {
    let model: GenericModel<T> = model.cast();
    let p3d: na::Point3<T> = na::Point3::new(
        na::convert(p3d[0]),
        na::convert(p3d[1]),
        na::convert(p3d[2]),
    );
    let p3d_t = board_to_cam * p3d;
    let p2d_p = model.project_one(&p3d_t.coords);

    let u: T = na::convert(p2d[0]);
    let v: T = na::convert(p2d[1]);
    na::dvector![p2d_p[0].clone() - u, p2d_p[1].clone() - v]
}

/// Reprojection of a board corner into the base camera.
///
/// params `[board_pose]`, each `[rvec, tvec]`.
#[derive(Debug, Clone)]
pub struct BoardReprojectionFactor {
    pub model: GenericModel<f64>,
    pub p3d: [f64; 3],
    pub p2d: [f64; 2],
}

impl BoardReprojectionFactor {
    pub fn new(model: &GenericModel<f64>, p3d: &glam::Vec3, p2d: &glam::Vec2) -> Self {
        BoardReprojectionFactor {
            model: *model,
            p3d: [p3d.x as f64, p3d.y as f64, p3d.z as f64],
            p2d: [p2d.x as f64, p2d.y as f64],
        }
    }
}

impl<T: na::RealField> Factor<T> for BoardReprojectionFactor {
    fn residual_func(&self, params: &[na::DVector<T>]) -> na::DVector<T> {
        let board_to_base = isometry_from_params(&params[0]);
        reprojection_residual(&self.model, &board_to_base, &self.p3d, &self.p2d)
    }
}

/// Reprojection of a board corner into the sub camera through the base camera.
///
/// params `[base_to_sub, board_pose]`, each `[rvec, tvec]`.
#[derive(Debug, Clone)]
pub struct StereoReprojectionFactor {
    pub model: GenericModel<f64>,
    pub p3d: [f64; 3],
    pub p2d: [f64; 2],
}

impl StereoReprojectionFactor {
    pub fn new(model: &GenericModel<f64>, p3d: &glam::Vec3, p2d: &glam::Vec2) -> Self {
        StereoReprojectionFactor {
            model: *model,
            p3d: [p3d.x as f64, p3d.y as f64, p3d.z as f64],
            p2d: [p2d.x as f64, p2d.y as f64],
        }
    }
}

impl<T: na::RealField> Factor<T> for StereoReprojectionFactor {
    fn residual_func(&self, params: &[na::DVector<T>]) -> na::DVector<T> {
        let base_to_sub = isometry_from_params(&params[0]);
        let board_to_base = isometry_from_params(&params[1]);
        let board_to_sub = base_to_sub * board_to_base;
        reprojection_residual(&self.model, &board_to_sub, &self.p3d, &self.p2d)
    }
}
