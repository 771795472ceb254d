use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use image::{ImageReader, RgbImage};

use super::FrameSource;
use crate::camera::CameraIntrinsics;
use crate::data_loader::list_images;
use crate::error::{CalibError, Result};

/// Plays back an image directory in file name order.
///
/// The current image is delivered on every grab until it is captured, so an
/// operator has time to decide. With [`ReplaySource::with_fps`] grabs are
/// paced like a live stream.
pub struct ReplaySource {
    dir: PathBuf,
    frames: Vec<PathBuf>,
    next: usize,
    current: Option<RgbImage>,
    frame_interval: Option<Duration>,
    last_grab: Option<Instant>,
    intrinsics: CameraIntrinsics,
}

impl ReplaySource {
    pub fn new(dir: impl AsRef<Path>, intrinsics: CameraIntrinsics) -> Result<ReplaySource> {
        let dir = dir.as_ref().to_path_buf();
        let frames = list_images(&dir)?;
        log::info!("Replaying {} frames from {}", frames.len(), dir.display());
        Ok(ReplaySource {
            dir,
            frames,
            next: 0,
            current: None,
            frame_interval: None,
            last_grab: None,
            intrinsics,
        })
    }

    /// Limits grabs to `fps` per second. Zero disables pacing.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.frame_interval = (fps > 0).then(|| Duration::from_secs_f64(1.0 / fps as f64));
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Index of the frame the next grab delivers.
    pub fn position(&self) -> usize {
        self.next
    }

    fn pace(&mut self) {
        if let (Some(interval), Some(last)) = (self.frame_interval, self.last_grab) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_grab = Some(Instant::now());
    }
}

impl FrameSource for ReplaySource {
    fn intrinsics(&self) -> Result<CameraIntrinsics> {
        Ok(self.intrinsics.clone())
    }

    fn grab(&mut self) -> Result<Option<RgbImage>> {
        self.pace();
        if self.current.is_none() {
            let Some(path) = self.frames.get(self.next) else {
                return Ok(None);
            };
            let img = ImageReader::open(path)
                .map_err(|e| CalibError::io(path, e))?
                .decode()
                .map_err(|source| CalibError::Image {
                    path: path.clone(),
                    source,
                })?;
            self.current = Some(img.to_rgb8());
        }
        Ok(self.current.clone())
    }

    fn on_captured(&mut self) {
        self.current = None;
        self.next += 1;
    }

    fn stop(&mut self) {
        self.current = None;
        self.next = self.frames.len();
    }

    fn name(&self) -> String {
        format!("replay {}", self.dir.display())
    }

    fn is_exhausted(&self) -> bool {
        self.next >= self.frames.len()
    }
}
