use image::{GrayImage, Rgb, RgbImage};
use nalgebra as na;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::board::Board;
use crate::camera::{CameraIntrinsics, unproject_normalized};

/// Gray level of everything off the board.
pub const BACKGROUND: u8 = 160;
/// Rays per pixel along each axis.
const SUBSAMPLES: u32 = 2;
const DEFAULT_RESOLUTION: [u32; 2] = [1280, 720];

/// Board pose that puts the board center at `center_in_cam`.
pub fn centered_board_pose(
    board: &Board,
    rotation: na::UnitQuaternion<f64>,
    center_in_cam: na::Vector3<f64>,
) -> na::Isometry3<f64> {
    let sq = board.config.square_length_m();
    let center = na::Vector3::new(
        board.config.squares_x as f64 * sq / 2.0,
        board.config.squares_y as f64 * sq / 2.0,
        0.0,
    );
    let translation = center_in_cam - rotation * center;
    na::Isometry3::from_parts(na::Translation3::from(translation), rotation)
}

pub fn random_board_pose(rng: &mut ChaCha8Rng, board: &Board) -> na::Isometry3<f64> {
    let rotation = na::UnitQuaternion::from_euler_angles(
        rng.random_range(-0.35..0.35),
        rng.random_range(-0.35..0.35),
        rng.random_range(-0.2..0.2),
    );
    let center = na::Vector3::new(
        rng.random_range(-0.04..0.04),
        rng.random_range(-0.03..0.03),
        rng.random_range(0.45..0.7),
    );
    centered_board_pose(board, rotation, center)
}

/// Ray casts every pixel onto the board plane and samples the board texture.
///
/// `texture` is [`Board::render`] in gray. Each pixel averages a small grid
/// of rays with bilinear lookups, which gives the soft edges of a real lens.
/// Tangential distortion is not inverted exactly, so cameras used here
/// should be radial only.
pub fn render_view(
    camera: &CameraIntrinsics,
    board_to_cam: &na::Isometry3<f64>,
    board: &Board,
    texture: &GrayImage,
) -> RgbImage {
    let model = camera.model();
    let [width, height] = camera.resolution.unwrap_or(DEFAULT_RESOLUTION);
    let px_per_m = board.config.pixels_per_square as f64 / board.config.square_length_m();
    let margin = board.config.margin_px as f64;
    let cam_to_board = board_to_cam.inverse();
    let normal = board_to_cam.rotation * na::Vector3::z();
    let plane_d = normal.dot(&board_to_cam.translation.vector);

    let cast = |u: f64, v: f64| -> f64 {
        let xy = unproject_normalized(&model, &na::Vector2::new(u, v));
        let ray = na::Vector3::new(xy.x, xy.y, 1.0);
        let denom = normal.dot(&ray);
        if denom.abs() < 1e-12 {
            return BACKGROUND as f64;
        }
        let s = plane_d / denom;
        if s <= 0.0 {
            return BACKGROUND as f64;
        }
        let p = cam_to_board * na::Point3::from(ray * s);
        // texture pixel centers sit at +0.5
        sample_bilinear(
            texture,
            margin + p.x * px_per_m - 0.5,
            margin + p.y * px_per_m - 0.5,
        )
    };

    let n = SUBSAMPLES as f64;
    RgbImage::from_fn(width, height, |u, v| {
        let mut sum = 0.0;
        for sy in 0..SUBSAMPLES {
            for sx in 0..SUBSAMPLES {
                sum += cast(
                    u as f64 + (sx as f64 + 0.5) / n - 0.5,
                    v as f64 + (sy as f64 + 0.5) / n - 0.5,
                );
            }
        }
        let g = (sum / (n * n)).round().clamp(0.0, 255.0) as u8;
        Rgb([g, g, g])
    })
}

fn sample_bilinear(texture: &GrayImage, x: f64, y: f64) -> f64 {
    let (w, h) = (texture.width(), texture.height());
    if w == 0 || h == 0 || x < -0.5 || y < -0.5 || x > w as f64 - 0.5 || y > h as f64 - 0.5 {
        return BACKGROUND as f64;
    }
    let x = x.clamp(0.0, (w - 1) as f64);
    let y = y.clamp(0.0, (h - 1) as f64);
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
    let (fx, fy) = (x - x0 as f64, y - y0 as f64);
    let px = |x: u32, y: u32| texture.get_pixel(x, y).0[0] as f64;
    let top = px(x0, y0) * (1.0 - fx) + px(x1, y0) * fx;
    let bottom = px(x0, y1) * (1.0 - fx) + px(x1, y1) * fx;
    top * (1.0 - fy) + bottom * fy
}
