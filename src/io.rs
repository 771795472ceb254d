use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use nalgebra as na;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::board::Board;
use crate::camera::CameraIntrinsics;
use crate::error::{CalibError, Result};
use crate::task::{cam_key, extrinsics_key};

/// `cam<id>` to intrinsics, as stored in `intrinsics.yaml`.
pub type IntrinsicsFile = BTreeMap<String, CameraIntrinsics>;
/// `T_<base>_<sub>` to extrinsics, as stored in `extrinsics.yaml`.
pub type ExtrinsicsFile = BTreeMap<String, ExtrinsicRecord>;

/// Translation is written as a 3x1 column; a flat list is accepted on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Translation {
    Column([[f64; 1]; 3]),
    Flat([f64; 3]),
}

impl Translation {
    pub fn to_na(&self) -> na::Vector3<f64> {
        match self {
            Translation::Column(t) => na::Vector3::new(t[0][0], t[1][0], t[2][0]),
            Translation::Flat(t) => na::Vector3::new(t[0], t[1], t[2]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtrinsicRecord {
    #[serde(rename = "R")]
    pub rotation: [[f64; 3]; 3],
    #[serde(rename = "T")]
    pub translation: Translation,
    pub stereo_calib_error: f64,
}

impl ExtrinsicRecord {
    pub fn new(rotation: &na::Matrix3<f64>, translation: &na::Vector3<f64>, rms: f64) -> Self {
        let mut r = [[0.0; 3]; 3];
        for (row, r_row) in r.iter_mut().enumerate() {
            for (col, v) in r_row.iter_mut().enumerate() {
                *v = rotation[(row, col)];
            }
        }
        ExtrinsicRecord {
            rotation: r,
            translation: Translation::Column([
                [translation.x],
                [translation.y],
                [translation.z],
            ]),
            stereo_calib_error: rms,
        }
    }

    pub fn na_rotation(&self) -> na::Matrix3<f64> {
        let r = &self.rotation;
        na::Matrix3::new(
            r[0][0], r[0][1], r[0][2], r[1][0], r[1][1], r[1][2], r[2][0], r[2][1], r[2][2],
        )
    }

    pub fn na_translation(&self) -> na::Vector3<f64> {
        self.translation.to_na()
    }

    /// Base frame to sub frame, `X_sub = R * X_base + T`.
    pub fn to_isometry(&self) -> na::Isometry3<f64> {
        let rotation = na::UnitQuaternion::from_matrix(&self.na_rotation());
        na::Isometry3::from_parts(na::Translation3::from(self.na_translation()), rotation)
    }

    /// 4x4 homogeneous `[R T; 0 1]`.
    pub fn homogeneous(&self) -> na::Matrix4<f64> {
        let mut m = na::Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.na_rotation());
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.na_translation());
        m
    }
}

pub fn object_from_yaml<T: DeserializeOwned>(file_path: impl AsRef<Path>) -> Result<T> {
    let path = file_path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| CalibError::io(path, e))?;
    serde_yaml::from_str(&contents).map_err(|source| CalibError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

pub fn object_to_yaml<T: Serialize>(output_path: impl AsRef<Path>, object: &T) -> Result<()> {
    let path = output_path.as_ref();
    let s = serde_yaml::to_string(object).map_err(|source| CalibError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, s).map_err(|e| CalibError::io(path, e))
}

pub fn object_to_json<T: Serialize>(output_path: impl AsRef<Path>, object: &T) -> Result<()> {
    let path = output_path.as_ref();
    let j = serde_json::to_string_pretty(object)?;
    std::fs::write(path, j).map_err(|e| CalibError::io(path, e))
}

pub fn read_intrinsics(path: impl AsRef<Path>) -> Result<IntrinsicsFile> {
    object_from_yaml(path)
}

pub fn write_intrinsics(path: impl AsRef<Path>, intrinsics: &IntrinsicsFile) -> Result<()> {
    object_to_yaml(path, intrinsics)
}

pub fn camera_intrinsics(intrinsics: &IntrinsicsFile, cam_id: u32) -> Result<CameraIntrinsics> {
    let key = cam_key(cam_id);
    intrinsics
        .get(&key)
        .cloned()
        .ok_or(CalibError::MissingIntrinsics(key))
}

pub fn read_extrinsics(path: impl AsRef<Path>) -> Result<ExtrinsicsFile> {
    object_from_yaml(path)
}

pub fn write_extrinsics(path: impl AsRef<Path>, extrinsics: &ExtrinsicsFile) -> Result<()> {
    object_to_yaml(path, extrinsics)
}

/// Reads the `T_<base>_<sub>` record of an extrinsics file.
pub fn load_extrinsic(path: impl AsRef<Path>, base_id: u32, sub_id: u32) -> Result<ExtrinsicRecord> {
    let path = path.as_ref();
    let key = extrinsics_key(base_id, sub_id);
    let mut extrinsics = read_extrinsics(path)?;
    extrinsics
        .remove(&key)
        .ok_or_else(|| CalibError::MissingExtrinsics {
            key,
            path: path.to_path_buf(),
        })
}

#[derive(Debug, Serialize)]
pub struct CameraReport {
    pub id: u32,
    pub rms_error: f64,
    pub point_count: usize,
}

/// Board geometry the calibration was run with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardSummary {
    pub squares_x: u32,
    pub squares_y: u32,
    pub square_length_mm: f64,
    pub marker_length_mm: f64,
    pub aruco_dict: String,
    pub corner_count: usize,
}

impl BoardSummary {
    pub fn new(board: &Board) -> BoardSummary {
        BoardSummary {
            squares_x: board.config.squares_x,
            squares_y: board.config.squares_y,
            square_length_mm: board.config.square_length_mm,
            marker_length_mm: board.config.marker_length_mm,
            aruco_dict: board.config.aruco_dict.clone(),
            corner_count: board.corner_count(),
        }
    }
}

/// Machine readable companion of `extrinsics.yaml`.
#[derive(Debug, Serialize)]
pub struct CalibrationReport {
    pub timestamp: String,
    pub board: BoardSummary,
    pub pairs_found: usize,
    pub pairs_used: usize,
    pub pairs_skipped: usize,
    pub cameras: Vec<CameraReport>,
    pub overall_rms: f64,
    pub baseline_m: f64,
}

pub fn write_report(output_path: impl AsRef<Path>, report: &CalibrationReport) -> Result<()> {
    object_to_json(output_path, report)
}

pub fn report_timestamp() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

fn format_row<const N: usize>(row: &[f64; N]) -> String {
    let items: Vec<String> = row.iter().map(|v| format!("{:?}", v)).collect();
    format!("[{}]", items.join(", "))
}

/// Text summary of every camera of a rig.
///
/// Cameras are listed in ascending id order; only sub cameras get a transform block.
pub fn format_summary(
    base_id: u32,
    sub_ids: &[u32],
    intrinsics: &BTreeMap<u32, [[f64; 3]; 3]>,
    extrinsics: &BTreeMap<u32, na::Matrix4<f64>>,
) -> String {
    let mut all_cam_ids: Vec<u32> = std::iter::once(base_id).chain(sub_ids.iter().copied()).collect();
    all_cam_ids.sort_unstable();
    all_cam_ids.dedup();

    let mut s = String::new();
    for cam_id in all_cam_ids {
        let _ = writeln!(s, "cam{}", cam_id);
        s += "    intrinsic\n";
        match intrinsics.get(&cam_id) {
            Some(k) => {
                let rows: Vec<String> = k.iter().map(format_row).collect();
                let _ = writeln!(s, "        [{}]", rows.join(",\n        "));
            }
            None => s += "        []\n",
        }

        if cam_id != base_id {
            let key = extrinsics_key(base_id, cam_id);
            match extrinsics.get(&cam_id) {
                Some(t_full) => {
                    let _ = writeln!(s, "    {}: ", key);
                    for r in 0..4 {
                        let row = [t_full[(r, 0)], t_full[(r, 1)], t_full[(r, 2)], t_full[(r, 3)]];
                        let _ = writeln!(s, "            {},", format_row(&row));
                    }
                }
                None => {
                    let _ = writeln!(s, "    \"{}\": ", key);
                    s += "            []\n";
                }
            }
        }
        s += "\n";
    }
    s
}

pub fn export_summary(
    output_path: impl AsRef<Path>,
    base_id: u32,
    sub_ids: &[u32],
    intrinsics: &BTreeMap<u32, [[f64; 3]; 3]>,
    extrinsics: &BTreeMap<u32, na::Matrix4<f64>>,
) -> Result<()> {
    let path = output_path.as_ref();
    let s = format_summary(base_id, sub_ids, intrinsics, extrinsics);
    std::fs::write(path, s).map_err(|e| CalibError::io(path, e))
}
