use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::io::object_from_yaml;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    #[serde(rename = "bgr8")]
    Bgr8,
    #[serde(rename = "rgb8")]
    Rgb8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: PixelFormat,
    /// Frames discarded after start before intrinsics are read.
    pub warmup_frames: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            format: PixelFormat::Bgr8,
            warmup_frames: 5,
        }
    }
}

/// Camera id to device serial, plus the colour stream every camera runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub serials: BTreeMap<u32, String>,
    pub stream: StreamConfig,
}

impl Default for RigConfig {
    fn default() -> Self {
        let serials = [
            (1, "234322070242"), // wrist
            (2, "233522070688"), // front
            (3, "236522070121"), // left
            (4, "828112072646"), // right
        ]
        .into_iter()
        .map(|(id, s)| (id, s.to_string()))
        .collect();
        Self {
            serials,
            stream: StreamConfig::default(),
        }
    }
}

impl RigConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<RigConfig> {
        object_from_yaml(path)
    }

    pub fn serial(&self, cam_id: u32) -> Option<&str> {
        self.serials.get(&cam_id).map(String::as_str)
    }
}
