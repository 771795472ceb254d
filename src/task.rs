use std::path::{Path, PathBuf};

pub const INTRINSICS_FILE: &str = "intrinsics.yaml";
pub const EXTRINSICS_FILE: &str = "extrinsics.yaml";
pub const REPORT_FILE: &str = "report.json";
pub const SUMMARY_FILE: &str = "summary.txt";

/// On-disk layout of one base/sub calibration task.
#[derive(Debug, Clone)]
pub struct TaskLayout {
    pub base_id: u32,
    pub sub_id: u32,
    pub dir: PathBuf,
}

impl TaskLayout {
    pub fn new(task_path: impl AsRef<Path>, base_id: u32, sub_id: u32) -> TaskLayout {
        TaskLayout {
            base_id,
            sub_id,
            dir: task_path.as_ref().join(task_dir_name(base_id, sub_id)),
        }
    }

    pub fn cam_dir(&self, cam_id: u32) -> PathBuf {
        self.dir.join(cam_key(cam_id))
    }

    pub fn base_dir(&self) -> PathBuf {
        self.cam_dir(self.base_id)
    }

    pub fn sub_dir(&self) -> PathBuf {
        self.cam_dir(self.sub_id)
    }

    pub fn intrinsics_path(&self) -> PathBuf {
        self.dir.join(INTRINSICS_FILE)
    }

    pub fn extrinsics_path(&self) -> PathBuf {
        self.dir.join(EXTRINSICS_FILE)
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.join(REPORT_FILE)
    }

    pub fn extrinsics_key(&self) -> String {
        extrinsics_key(self.base_id, self.sub_id)
    }
}

pub fn task_dir_name(base_id: u32, sub_id: u32) -> String {
    format!("cali_T_{}_{}", base_id, sub_id)
}

pub fn cam_key(cam_id: u32) -> String {
    format!("cam{}", cam_id)
}

pub fn extrinsics_key(base_id: u32, sub_id: u32) -> String {
    format!("T_{}_{}", base_id, sub_id)
}

pub fn summary_path(task_path: impl AsRef<Path>) -> PathBuf {
    task_path.as_ref().join(SUMMARY_FILE)
}
