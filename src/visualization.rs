use image::DynamicImage;
use nalgebra as na;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rerun::RecordingStream;
use std::io::Cursor;

use crate::detected_points::FrameFeature;

pub const BASE_CAMERA_COLOR: [u8; 3] = [255, 0, 0];
const DEFAULT_CAMERA_COLOR: [u8; 3] = [128, 128, 128];

pub fn log_image_as_compressed(
    recording: &RecordingStream,
    topic: &str,
    img: &DynamicImage,
    format: image::ImageFormat,
) {
    let mut bytes: Vec<u8> = Vec::new();

    if let Err(e) = img.to_rgb8().write_to(&mut Cursor::new(&mut bytes), format) {
        log::warn!("failed to encode image for {}: {}", topic, e);
        return;
    }

    let encoded = rerun::EncodedImage::from_file_contents(bytes);
    if let Err(e) = recording.log(format!("{}/image", topic), &encoded) {
        log::warn!("failed to log image for {}: {}", topic, e);
    }
}

pub fn id_to_color(id: usize) -> (u8, u8, u8, u8) {
    let mut rng = ChaCha8Rng::seed_from_u64(id as u64);
    let color_num = rng.random_range(0..2u32.pow(24));
    (
        ((color_num >> 16) % 256) as u8,
        ((color_num >> 8) % 256) as u8,
        (color_num % 256) as u8,
        255,
    )
}

/// Maps a reprojection error onto the turbo colormap, saturating at `max_error`.
pub fn error_to_color(error: f64, max_error: f64) -> (u8, u8, u8, u8) {
    let t = if max_error > 0.0 {
        (error / max_error).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let c = colorous::TURBO.eval_continuous(t);
    (c.r, c.g, c.b, 255)
}

/// Display color of a camera frame: base red, 1 green, 3 blue, 4 yellow, others gray.
pub fn camera_color(cam_id: u32) -> [u8; 3] {
    match cam_id {
        1 => [0, 255, 0],
        3 => [0, 0, 255],
        4 => [255, 255, 0],
        _ => DEFAULT_CAMERA_COLOR,
    }
}

/// rerun use top left corner as (0, 0)
pub fn rerun_shift(p2ds: &[(f32, f32)]) -> Vec<(f32, f32)> {
    p2ds.iter().map(|(x, y)| (*x + 0.5, *y + 0.5)).collect()
}

pub fn log_feature_frame(recording: &RecordingStream, topic: &str, frame: &FrameFeature) {
    let (pts, colors_labels): (Vec<_>, Vec<_>) = frame
        .features
        .iter()
        .map(|(id, p)| {
            let color = id_to_color(*id as usize);
            ((p.p2d.x, p.p2d.y), (color, id.to_string()))
        })
        .unzip();
    let (colors, labels): (Vec<_>, Vec<_>) = colors_labels.into_iter().unzip();
    let pts = rerun_shift(&pts);

    recording.set_time_sequence("frame", frame.frame_idx as i64);
    if let Err(e) = recording.log(
        format!("{}/pts", topic),
        &rerun::Points2D::new(pts)
            .with_colors(colors)
            .with_labels(labels)
            .with_radii([rerun::Radius::new_ui_points(5.0)]),
    ) {
        log::warn!("failed to log features for {}: {}", topic, e);
    }
}

/// Logs per-point reprojection errors of one frame, colored by magnitude.
pub fn log_reprojection_errors(
    recording: &RecordingStream,
    topic: &str,
    frame_idx: usize,
    observed: &[(f32, f32)],
    errors: &[f64],
    max_error: f64,
) {
    let colors: Vec<_> = errors.iter().map(|e| error_to_color(*e, max_error)).collect();
    let labels: Vec<_> = errors.iter().map(|e| format!("{:.3}px", e)).collect();
    recording.set_time_sequence("frame", frame_idx as i64);
    if let Err(e) = recording.log(
        format!("{}/reprojection", topic),
        &rerun::Points2D::new(rerun_shift(observed))
            .with_colors(colors)
            .with_labels(labels)
            .with_radii([rerun::Radius::new_ui_points(3.0)]),
    ) {
        log::warn!("failed to log reprojection errors for {}: {}", topic, e);
    }
}

/// Logs a camera as a coordinate frame (red x, green y, blue z) at `pose`,
/// the camera-to-world transform, plus a labelled origin in the camera color.
pub fn log_camera_frame(
    recording: &RecordingStream,
    entity_path: &str,
    pose: &na::Isometry3<f64>,
    color: [u8; 3],
    axis_length: f32,
    label: &str,
) -> Result<(), rerun::RecordingStreamError> {
    let t = pose.translation.vector;
    let q = pose.rotation.coords;
    recording.log(
        entity_path,
        &rerun::Transform3D::from_translation_rotation(
            [t.x as f32, t.y as f32, t.z as f32],
            rerun::datatypes::Quaternion::from_xyzw([q.x as f32, q.y as f32, q.z as f32, q.w as f32]),
        ),
    )?;
    recording.log(
        format!("{}/axes", entity_path),
        &rerun::Arrows3D::from_vectors([
            [axis_length, 0.0, 0.0],
            [0.0, axis_length, 0.0],
            [0.0, 0.0, axis_length],
        ])
        .with_colors([
            rerun::Color::from_rgb(255, 0, 0),
            rerun::Color::from_rgb(0, 255, 0),
            rerun::Color::from_rgb(0, 0, 255),
        ]),
    )?;
    recording.log(
        format!("{}/origin", entity_path),
        &rerun::Points3D::new([[0.0f32, 0.0, 0.0]])
            .with_colors([rerun::Color::from_rgb(color[0], color[1], color[2])])
            .with_labels([label.to_string()])
            .with_radii([rerun::Radius::new_ui_points(8.0)]),
    )?;
    Ok(())
}

/// Logs a pinhole frustum under an already transformed camera entity.
pub fn log_pinhole(
    recording: &RecordingStream,
    entity_path: &str,
    camera_matrix: &[[f64; 3]; 3],
    resolution: [u32; 2],
) -> Result<(), rerun::RecordingStreamError> {
    recording.log(
        format!("{}/image", entity_path),
        &rerun::Pinhole::from_focal_length_and_resolution(
            [camera_matrix[0][0] as f32, camera_matrix[1][1] as f32],
            [resolution[0] as f32, resolution[1] as f32],
        )
        .with_principal_point([camera_matrix[0][2] as f32, camera_matrix[1][2] as f32])
        .with_image_plane_distance(0.1),
    )
}
