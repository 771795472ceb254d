//! Frame sources and the interactive capture loop of the extractor.
//!
//! A [`FrameSource`] is one colour camera. [`CaptureSession`] pulls one frame
//! from every source per tick, previews them side by side and writes the set
//! to disk when a capture command arrives.

#[cfg(feature = "realsense")]
pub mod realsense;
pub mod replay;

#[cfg(feature = "realsense")]
pub use realsense::RealSenseSource;
pub use replay::ReplaySource;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};

use image::{GenericImage, RgbImage};
use log::{info, warn};

use crate::camera::CameraIntrinsics;
use crate::error::{CalibError, Result};
use crate::visualization::log_image_as_compressed;

pub trait FrameSource {
    /// Intrinsics reported by the device, distortion truncated to five coefficients.
    fn intrinsics(&self) -> Result<CameraIntrinsics>;

    /// Next colour frame. `Ok(None)` when no frame was delivered this tick.
    fn grab(&mut self) -> Result<Option<RgbImage>>;

    /// Called after the last grabbed frame was written to disk.
    fn on_captured(&mut self) {}

    fn stop(&mut self);

    fn name(&self) -> String;

    /// A finite source that has nothing left to deliver.
    fn is_exhausted(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCommand {
    Capture,
    Quit,
}

impl CaptureCommand {
    /// `c` captures and `q` quits, case insensitive.
    pub fn parse(line: &str) -> Option<CaptureCommand> {
        match line.trim() {
            "c" | "C" => Some(CaptureCommand::Capture),
            "q" | "Q" => Some(CaptureCommand::Quit),
            _ => None,
        }
    }
}

/// Reads commands from stdin on a background thread. End of input quits.
pub fn spawn_stdin_commands() -> Receiver<CaptureCommand> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match CaptureCommand::parse(&line) {
                Some(cmd) => {
                    if tx.send(cmd).is_err() || cmd == CaptureCommand::Quit {
                        return;
                    }
                }
                None => warn!("Unknown command '{}'. Use 'c' or 'q'.", line.trim()),
            }
        }
        let _ = tx.send(CaptureCommand::Quit);
    });
    rx
}

/// Creates the camera directories. With `overwrite` existing ones are wiped first.
pub fn prepare_output_dirs(paths: &[PathBuf], overwrite: bool) -> Result<()> {
    for path in paths {
        if overwrite && path.exists() {
            std::fs::remove_dir_all(path).map_err(|e| CalibError::io(path, e))?;
        }
        std::fs::create_dir_all(path).map_err(|e| CalibError::io(path, e))?;
    }
    Ok(())
}

/// Name of the next frame in `dir`: the entry count, zero padded to 4 digits.
pub fn next_frame_name(dir: &Path) -> Result<String> {
    let count = std::fs::read_dir(dir)
        .map_err(|e| CalibError::io(dir, e))?
        .count();
    Ok(format!("{:04}.png", count))
}

/// Writes one frame into each directory and returns the last file name written.
pub fn save_frames(frames: &[RgbImage], paths: &[PathBuf]) -> Result<String> {
    if frames.len() != paths.len() {
        return Err(CalibError::Camera(format!(
            "Number of frames and paths do not match ({} vs {})",
            frames.len(),
            paths.len()
        )));
    }
    let mut name = String::new();
    for (frame, dir) in frames.iter().zip(paths) {
        name = next_frame_name(dir)?;
        let path = dir.join(&name);
        frame.save(&path).map_err(|source| CalibError::Image { path, source })?;
    }
    info!("Saved frame {}.", name.trim_end_matches(".png"));
    Ok(name)
}

/// Concatenates frames horizontally, top aligned.
pub fn side_by_side(frames: &[RgbImage]) -> RgbImage {
    let width = frames.iter().map(|f| f.width()).sum();
    let height = frames.iter().map(|f| f.height()).max().unwrap_or(0);
    let mut canvas = RgbImage::new(width, height);
    let mut x = 0;
    for frame in frames {
        // fits by construction
        let _ = canvas.copy_from(frame, x, 0);
        x += frame.width();
    }
    canvas
}

pub struct CaptureSession {
    sources: Vec<Box<dyn FrameSource>>,
    paths: Vec<PathBuf>,
    recording: Option<rerun::RecordingStream>,
}

impl CaptureSession {
    pub fn new(
        sources: Vec<Box<dyn FrameSource>>,
        paths: Vec<PathBuf>,
        recording: Option<rerun::RecordingStream>,
    ) -> Result<CaptureSession> {
        if sources.len() != paths.len() {
            return Err(CalibError::Camera(format!(
                "{} sources for {} output directories",
                sources.len(),
                paths.len()
            )));
        }
        Ok(CaptureSession {
            sources,
            paths,
            recording,
        })
    }

    /// Grabs one frame per source. `None` if any source delivered nothing.
    fn grab_all(&mut self) -> Result<Option<Vec<RgbImage>>> {
        let mut frames = Vec::with_capacity(self.sources.len());
        for source in self.sources.iter_mut() {
            match source.grab()? {
                Some(frame) => frames.push(frame),
                None => {
                    warn!("No color frame received from {}.", source.name());
                    return Ok(None);
                }
            }
        }
        Ok(Some(frames))
    }

    /// Runs until a quit command, a closed channel or an error.
    ///
    /// Returns the number of captured frame sets.
    pub fn run(&mut self, commands: &Receiver<CaptureCommand>) -> Result<usize> {
        info!("Press 'c' to capture, 'q' to quit.");
        let result = self.capture_loop(commands);
        info!("Stopping camera pipelines.");
        for source in self.sources.iter_mut() {
            source.stop();
        }
        result
    }

    fn capture_loop(&mut self, commands: &Receiver<CaptureCommand>) -> Result<usize> {
        let mut captured = 0;
        let mut tick: i64 = 0;
        loop {
            if self.sources.iter().any(|s| s.is_exhausted()) {
                info!("Frame source exhausted.");
                return Ok(captured);
            }
            let Some(frames) = self.grab_all()? else {
                match commands.try_recv() {
                    Ok(CaptureCommand::Quit) | Err(TryRecvError::Disconnected) => {
                        return Ok(captured);
                    }
                    Ok(CaptureCommand::Capture) => warn!("No frames captured."),
                    Err(TryRecvError::Empty) => {}
                }
                continue;
            };

            if let Some(recording) = &self.recording {
                recording.set_time_sequence("tick", tick);
                let preview = image::DynamicImage::ImageRgb8(side_by_side(&frames));
                log_image_as_compressed(recording, "/view", &preview, image::ImageFormat::Jpeg);
            }
            tick += 1;

            match commands.try_recv() {
                Ok(CaptureCommand::Capture) => {
                    save_frames(&frames, &self.paths)?;
                    captured += 1;
                    for source in self.sources.iter_mut() {
                        source.on_captured();
                    }
                }
                Ok(CaptureCommand::Quit) | Err(TryRecvError::Disconnected) => {
                    return Ok(captured);
                }
                Err(TryRecvError::Empty) => {}
            }
        }
    }
}
