use anyhow::Context;
use charuco_stereo_calibration::board::Board;
use charuco_stereo_calibration::camera::CameraIntrinsics;
use charuco_stereo_calibration::capture::prepare_output_dirs;
use charuco_stereo_calibration::io::{
    ExtrinsicRecord, ExtrinsicsFile, IntrinsicsFile, write_extrinsics, write_intrinsics,
};
use charuco_stereo_calibration::synthetic::{random_board_pose, render_view};
use charuco_stereo_calibration::task::{TaskLayout, cam_key};
use clap::Parser;
use indicatif::ParallelProgressIterator;
use log::info;
use nalgebra as na;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

const GROUND_TRUTH_FILE: &str = "ground_truth.yaml";

#[derive(Parser)]
#[command(
    version,
    about = "Render a synthetic stereo calibration task",
    author
)]
struct GeneratorCli {
    /// output task path
    #[arg(long = "task_path")]
    task_path: String,

    #[arg(long = "basecam_id")]
    basecam_id: u32,

    #[arg(long = "subcam_id")]
    subcam_id: u32,

    /// board yaml configuration
    #[arg(long)]
    board: String,

    #[arg(long = "num_frames", default_value = "20")]
    num_frames: usize,

    /// base to sub translation along x, meters
    #[arg(long, default_value = "-0.1", allow_hyphen_values = true)]
    baseline: f64,

    /// base to sub rotation about y, degrees
    #[arg(long = "yaw_deg", default_value = "5.0", allow_hyphen_values = true)]
    yaw_deg: f64,

    #[arg(long, default_value = "0")]
    seed: u64,
}

/// Radial distortion only; ray casting cannot invert the tangential terms.
fn default_camera(fx: f64, k1: f64, k2: f64, k3: f64) -> CameraIntrinsics {
    CameraIntrinsics::new(fx, fx, 640.0, 360.0, &[k1, k2, 0.0, 0.0, k3])
        .with_resolution(1280, 720)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = GeneratorCli::parse();

    let board = Board::from_yaml(&cli.board)
        .with_context(|| format!("loading board config {}", cli.board))?;
    let texture = image::imageops::grayscale(&board.render()?);
    let layout = TaskLayout::new(&cli.task_path, cli.basecam_id, cli.subcam_id);

    let base_cam = default_camera(910.0, 0.08, -0.15, 0.05);
    let sub_cam = default_camera(905.0, 0.06, -0.12, 0.03);
    let base_to_sub = na::Isometry3::from_parts(
        na::Translation3::new(cli.baseline, 0.005, 0.01),
        na::UnitQuaternion::from_euler_angles(0.0, cli.yaw_deg.to_radians(), 0.0),
    );

    let mut rng = ChaCha8Rng::seed_from_u64(cli.seed);
    let poses: Vec<_> = (0..cli.num_frames)
        .map(|_| random_board_pose(&mut rng, &board))
        .collect();

    prepare_output_dirs(&[layout.base_dir(), layout.sub_dir()], true)?;
    let base_dir = layout.base_dir();
    let sub_dir = layout.sub_dir();
    poses
        .par_iter()
        .enumerate()
        .progress_count(poses.len() as u64)
        .try_for_each(|(idx, board_to_base)| -> anyhow::Result<()> {
            let name = format!("{:04}.png", idx);
            render_view(&base_cam, board_to_base, &board, &texture)
                .save(base_dir.join(&name))
                .with_context(|| format!("writing base frame {}", name))?;
            render_view(&sub_cam, &(base_to_sub * board_to_base), &board, &texture)
                .save(sub_dir.join(&name))
                .with_context(|| format!("writing sub frame {}", name))?;
            Ok(())
        })?;

    let mut intrinsics = IntrinsicsFile::new();
    intrinsics.insert(cam_key(cli.basecam_id), base_cam);
    intrinsics.insert(cam_key(cli.subcam_id), sub_cam);
    write_intrinsics(layout.intrinsics_path(), &intrinsics)?;

    let mut ground_truth = ExtrinsicsFile::new();
    ground_truth.insert(
        layout.extrinsics_key(),
        ExtrinsicRecord::new(
            &base_to_sub.rotation.to_rotation_matrix().into_inner(),
            &base_to_sub.translation.vector,
            0.0,
        ),
    );
    write_extrinsics(layout.dir.join(GROUND_TRUTH_FILE), &ground_truth)?;

    info!(
        "Generated {} frame pairs in {}",
        cli.num_frames,
        layout.dir.display()
    );
    Ok(())
}
