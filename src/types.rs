use nalgebra as na;

/// Axis-angle rotation plus translation, the parameter layout used by the solver.
#[derive(Debug, Clone)]
pub struct RvecTvec {
    rvec: na::DVector<f64>,
    tvec: na::DVector<f64>,
}

impl RvecTvec {
    pub fn new(rvec: &na::DVector<f64>, tvec: &na::DVector<f64>) -> RvecTvec {
        RvecTvec {
            rvec: rvec.clone(),
            tvec: tvec.clone(),
        }
    }

    pub fn from_tuples(r: (f64, f64, f64), t: (f64, f64, f64)) -> RvecTvec {
        RvecTvec {
            rvec: na::dvector![r.0, r.1, r.2],
            tvec: na::dvector![t.0, t.1, t.2],
        }
    }

    pub fn na_rvec(&self) -> na::Vector3<f64> {
        na::Vector3::new(self.rvec[0], self.rvec[1], self.rvec[2])
    }

    pub fn na_tvec(&self) -> na::Vector3<f64> {
        na::Vector3::new(self.tvec[0], self.tvec[1], self.tvec[2])
    }

    pub fn to_na_isometry3(&self) -> na::Isometry3<f64> {
        na::Isometry3::new(self.na_tvec(), self.na_rvec())
    }

    /// `[rx, ry, rz, tx, ty, tz]`
    pub fn to_dvec(&self) -> na::DVector<f64> {
        na::dvector![
            self.rvec[0],
            self.rvec[1],
            self.rvec[2],
            self.tvec[0],
            self.tvec[1],
            self.tvec[2]
        ]
    }

    pub fn from_dvec(v: &na::DVector<f64>) -> RvecTvec {
        RvecTvec {
            rvec: na::dvector![v[0], v[1], v[2]],
            tvec: na::dvector![v[3], v[4], v[5]],
        }
    }
}

pub trait ToRvecTvec {
    fn to_rvec_tvec(&self) -> RvecTvec;
}

impl ToRvecTvec for na::Isometry3<f64> {
    fn to_rvec_tvec(&self) -> RvecTvec {
        let rvec = self.rotation.scaled_axis();
        let tvec = self.translation.vector;
        RvecTvec {
            rvec: na::dvector![rvec.x, rvec.y, rvec.z],
            tvec: na::dvector![tvec.x, tvec.y, tvec.z],
        }
    }
}

/// Builds an isometry from a 6 element `[rvec, tvec]` slice of any scalar.
pub fn isometry_from_params<T: na::RealField>(params: &na::DVector<T>) -> na::Isometry3<T> {
    let rvec = na::Vector3::new(params[0].clone(), params[1].clone(), params[2].clone());
    let tvec = na::Vector3::new(params[3].clone(), params[4].clone(), params[5].clone());
    na::Isometry3::new(tvec, rvec)
}
