use camera_intrinsic_model::{GenericModel, OpenCVModel5};
use nalgebra as na;
use serde::{Deserialize, Serialize};

/// Pinhole intrinsics with OpenCV `[k1, k2, p1, p2, k3]` distortion, as stored
/// in `intrinsics.yaml`.
///
/// Projection goes through [`CameraIntrinsics::model`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub camera_matrix: [[f64; 3]; 3],
    pub dist_coefficients: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<[u32; 2]>,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, dist_coefficients: &[f64]) -> CameraIntrinsics {
        CameraIntrinsics {
            camera_matrix: [[fx, 0.0, cx], [0.0, fy, cy], [0.0, 0.0, 1.0]],
            dist_coefficients: dist_coefficients.to_vec(),
            resolution: None,
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Some([width, height]);
        self
    }

    pub fn fx(&self) -> f64 {
        self.camera_matrix[0][0]
    }
    pub fn fy(&self) -> f64 {
        self.camera_matrix[1][1]
    }
    pub fn cx(&self) -> f64 {
        self.camera_matrix[0][2]
    }
    pub fn cy(&self) -> f64 {
        self.camera_matrix[1][2]
    }

    /// First five coefficients, zero padded.
    pub fn dist5(&self) -> [f64; 5] {
        let mut d = [0.0; 5];
        for (dst, src) in d.iter_mut().zip(&self.dist_coefficients) {
            *dst = *src;
        }
        d
    }

    /// `[fx, fy, cx, cy, k1, k2, p1, p2, k3]`
    pub fn params(&self) -> na::DVector<f64> {
        let [k1, k2, p1, p2, k3] = self.dist5();
        na::dvector![self.fx(), self.fy(), self.cx(), self.cy(), k1, k2, p1, p2, k3]
    }

    /// OpenCV five coefficient model. A skew term in the matrix is ignored;
    /// width and height are zero when the resolution is unknown.
    pub fn model(&self) -> GenericModel<f64> {
        let [w, h] = self.resolution.unwrap_or([0, 0]);
        GenericModel::OpenCVModel5(OpenCVModel5::new(&self.params(), w, h))
    }

    pub fn na_camera_matrix(&self) -> na::Matrix3<f64> {
        let m = &self.camera_matrix;
        na::Matrix3::new(
            m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
        )
    }
}

/// Projects a camera frame point, rejecting points behind the camera and,
/// when the model has a size, points outside the image.
pub fn project_checked(
    model: &GenericModel<f64>,
    pt: &na::Vector3<f64>,
) -> Option<na::Vector2<f64>> {
    if pt.z <= f64::EPSILON {
        return None;
    }
    let p2d = model.project_one(pt);
    let (w, h) = (model.width(), model.height());
    if w > 0.0 && h > 0.0 && (p2d.x < 0.0 || p2d.y < 0.0 || p2d.x > w || p2d.y > h) {
        return None;
    }
    Some(p2d)
}

/// Pixel to normalized, undistorted image coordinates.
pub fn unproject_normalized(model: &GenericModel<f64>, p2d: &na::Vector2<f64>) -> na::Vector2<f64> {
    let ray = model.unproject_one(p2d);
    na::Vector2::new(ray.x / ray.z, ray.y / ray.z)
}
