use std::ffi::CString;
use std::time::Duration;

use image::{Rgb, RgbImage};
use log::info;
use realsense_rust::config::Config;
use realsense_rust::context::Context;
use realsense_rust::frame::{ColorFrame, PixelKind};
use realsense_rust::kind::{Rs2Format, Rs2StreamKind};
use realsense_rust::pipeline::{ActivePipeline, InactivePipeline};

use super::FrameSource;
use crate::camera::CameraIntrinsics;
use crate::error::{CalibError, Result};
use crate::rig::{PixelFormat, StreamConfig};

const FRAME_TIMEOUT: Duration = Duration::from_millis(5000);

fn camera_err(e: impl std::fmt::Display) -> CalibError {
    CalibError::Camera(e.to_string())
}

/// Colour stream of one RealSense device selected by serial number.
pub struct RealSenseSource {
    serial: String,
    pipeline: Option<ActivePipeline>,
    intrinsics: CameraIntrinsics,
}

impl RealSenseSource {
    pub fn start(context: &Context, serial: &str, stream: &StreamConfig) -> Result<RealSenseSource> {
        let inactive = InactivePipeline::try_from(context).map_err(camera_err)?;
        let serial_c = CString::new(serial).map_err(camera_err)?;
        let format = match stream.format {
            PixelFormat::Bgr8 => Rs2Format::Bgr8,
            PixelFormat::Rgb8 => Rs2Format::Rgb8,
        };

        let mut config = Config::new();
        config
            .enable_device_from_serial(&serial_c)
            .map_err(camera_err)?;
        config.disable_all_streams().map_err(camera_err)?;
        config
            .enable_stream(
                Rs2StreamKind::Color,
                None,
                stream.width as usize,
                stream.height as usize,
                format,
                stream.fps as usize,
            )
            .map_err(camera_err)?;
        let mut pipeline = inactive.start(Some(config)).map_err(|e| {
            CalibError::Camera(format!("Cannot start camera with serial {}: {}", serial, e))
        })?;

        for _ in 0..stream.warmup_frames {
            pipeline.wait(Some(FRAME_TIMEOUT)).map_err(camera_err)?;
        }

        let color = pipeline
            .profile()
            .streams()
            .iter()
            .find(|s| s.kind() == Rs2StreamKind::Color)
            .ok_or_else(|| CalibError::Camera(format!("{} has no color stream", serial)))?;
        let rs_intrinsics = color.intrinsics().map_err(camera_err)?;
        let coeffs: Vec<f64> = rs_intrinsics
            .distortion()
            .coeffs
            .iter()
            .take(5)
            .map(|c| *c as f64)
            .collect();
        let intrinsics = CameraIntrinsics::new(
            rs_intrinsics.fx() as f64,
            rs_intrinsics.fy() as f64,
            rs_intrinsics.ppx() as f64,
            rs_intrinsics.ppy() as f64,
            &coeffs,
        )
        .with_resolution(stream.width, stream.height);
        info!("Camera Matrix: {:?}", intrinsics.camera_matrix);
        info!("Distortion Coefficients: {:?}", intrinsics.dist_coefficients);

        Ok(RealSenseSource {
            serial: serial.to_string(),
            pipeline: Some(pipeline),
            intrinsics,
        })
    }
}

fn color_frame_to_rgb(frame: &ColorFrame) -> RgbImage {
    let (w, h) = (frame.width(), frame.height());
    RgbImage::from_fn(w as u32, h as u32, |x, y| {
        match frame.get(x as usize, y as usize) {
            Some(PixelKind::Bgr8 { b, g, r }) => Rgb([*r, *g, *b]),
            Some(PixelKind::Rgb8 { r, g, b }) => Rgb([*r, *g, *b]),
            _ => Rgb([0, 0, 0]),
        }
    })
}

impl FrameSource for RealSenseSource {
    fn intrinsics(&self) -> Result<CameraIntrinsics> {
        Ok(self.intrinsics.clone())
    }

    fn grab(&mut self) -> Result<Option<RgbImage>> {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return Ok(None);
        };
        let frames = pipeline.wait(Some(FRAME_TIMEOUT)).map_err(camera_err)?;
        let color_frames: Vec<ColorFrame> = frames.frames_of_type();
        Ok(color_frames.first().map(color_frame_to_rgb))
    }

    fn stop(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.stop();
        }
    }

    fn name(&self) -> String {
        format!("realsense {}", self.serial)
    }

    fn is_exhausted(&self) -> bool {
        self.pipeline.is_none()
    }
}

impl Drop for RealSenseSource {
    fn drop(&mut self) {
        self.stop();
    }
}
