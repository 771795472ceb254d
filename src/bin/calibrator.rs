use anyhow::Context;
use charuco_stereo_calibration::board::Board;
use charuco_stereo_calibration::camera::CameraIntrinsics;
use charuco_stereo_calibration::data_loader::{get_image_pairs, load_pair_features};
use charuco_stereo_calibration::io::{
    BoardSummary, CalibrationReport, CameraReport, ExtrinsicRecord, ExtrinsicsFile,
    camera_intrinsics, read_intrinsics, report_timestamp, write_extrinsics, write_report,
};
use charuco_stereo_calibration::optimization::{
    StereoCalibOptions, StereoCalibration, StereoPair, match_common_corners,
    pair_reprojection_errors, stereo_calibrate,
};
use charuco_stereo_calibration::task::TaskLayout;
use charuco_stereo_calibration::visualization::{
    BASE_CAMERA_COLOR, camera_color, log_camera_frame, log_feature_frame, log_reprojection_errors,
};
use clap::Parser;
use log::{info, warn};
use std::time::Instant;

#[derive(Parser)]
#[command(
    version,
    about = "Calibrate the extrinsics between a base and a sub camera",
    author
)]
struct CalibratorCli {
    /// base camera id
    #[arg(long = "basecam_id")]
    basecam_id: u32,

    /// sub camera id
    #[arg(long = "subcam_id")]
    subcam_id: u32,

    /// path to the calibration task directory
    #[arg(long = "task_path")]
    task_path: String,

    /// board yaml configuration
    #[arg(long)]
    board: String,

    /// save detections and results to this rerun file
    #[arg(long)]
    rerun: Option<String>,

    /// huber loss scale in pixels
    #[arg(long, value_parser = parse_huber_scale)]
    huber: Option<f64>,

    /// maximum solver iterations
    #[arg(long = "max_iterations", default_value = "100")]
    max_iterations: usize,
}

fn parse_huber_scale(s: &str) -> Result<f64, String> {
    let scale: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if scale.is_finite() && scale > 0.0 {
        Ok(scale)
    } else {
        Err(format!("must be greater than 0, got {}", scale))
    }
}

fn log_results(
    recording: &rerun::RecordingStream,
    cams: (&CameraIntrinsics, &CameraIntrinsics),
    sub_id: u32,
    topics: (&str, &str),
    pairs: &[StereoPair],
    result: &StereoCalibration,
) -> anyhow::Result<()> {
    let (base_cam, sub_cam) = cams;
    let max_error = 2.0;
    for (frame_idx, board_to_base) in &result.board_poses {
        let Some(pair) = pairs.iter().find(|p| p.frame_idx == *frame_idx) else {
            continue;
        };
        let (base_err, sub_err) =
            pair_reprojection_errors(base_cam, sub_cam, &result.base_to_sub, board_to_base, pair);
        let base_obs: Vec<_> = pair.base.iter().map(|p| (p.p2d.x, p.p2d.y)).collect();
        let sub_obs: Vec<_> = pair.sub.iter().map(|p| (p.p2d.x, p.p2d.y)).collect();
        log_reprojection_errors(recording, topics.0, pair.frame_idx, &base_obs, &base_err, max_error);
        log_reprojection_errors(recording, topics.1, pair.frame_idx, &sub_obs, &sub_err, max_error);
    }
    log_camera_frame(
        recording,
        "/rig/base",
        &nalgebra::Isometry3::identity(),
        BASE_CAMERA_COLOR,
        0.05,
        "base",
    )?;
    log_camera_frame(
        recording,
        "/rig/sub",
        &result.base_to_sub.inverse(),
        camera_color(sub_id),
        0.05,
        "sub",
    )?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = CalibratorCli::parse();
    let layout = TaskLayout::new(&cli.task_path, cli.basecam_id, cli.subcam_id);

    let board = Board::from_yaml(&cli.board)
        .with_context(|| format!("Error loading board configuration {}", cli.board))?;
    info!("ChArUco board loaded successfully.");

    let intrinsics = read_intrinsics(layout.intrinsics_path())?;
    let base_cam = camera_intrinsics(&intrinsics, cli.basecam_id)?;
    let sub_cam = camera_intrinsics(&intrinsics, cli.subcam_id)?;
    info!("Camera intrinsics loaded successfully.");

    let image_pairs = get_image_pairs(layout.base_dir(), layout.sub_dir())?;
    info!("Found {} image pairs.", image_pairs.len());

    let recording = match &cli.rerun {
        Some(path) => Some(rerun::RecordingStreamBuilder::new("calibrator").save(path)?),
        None => None,
    };
    let base_topic = format!("/cam{}", cli.basecam_id);
    let sub_topic = format!("/cam{}", cli.subcam_id);

    let now = Instant::now();
    let pair_features = load_pair_features(
        &image_pairs,
        &board,
        recording.as_ref(),
        (&base_topic, &sub_topic),
    );
    info!(
        "detecting feature took {:.6} sec",
        now.elapsed().as_secs_f64()
    );

    let options = StereoCalibOptions {
        max_iterations: cli.max_iterations,
        huber_px: cli.huber,
        ..StereoCalibOptions::default()
    };
    let mut stereo_pairs = Vec::new();
    for pf in &pair_features {
        let (Some(base), Some(sub)) = (&pf.base, &pf.sub) else {
            warn!("ChArUco corners not detected in pair {}. Skipping.", pf.frame_idx + 1);
            continue;
        };
        if let Some(recording) = &recording {
            log_feature_frame(recording, &base_topic, base);
            log_feature_frame(recording, &sub_topic, sub);
        }
        match match_common_corners(base, sub, options.min_common_corners) {
            Some(pair) => stereo_pairs.push(pair),
            None => warn!("Not enough common corners in pair {}. Skipping.", pf.frame_idx + 1),
        }
    }

    info!("Starting stereo calibration...");
    let result = stereo_calibrate(&base_cam, &sub_cam, &stereo_pairs, &options)?;
    info!("Stereo calibration successful.");
    info!("Rotation matrix:\n{}", result.rotation());
    info!("Translation vector:\n{}", result.translation());
    info!(
        "RMS reprojection error {:.4} px (base {:.4}, sub {:.4}) over {} pairs",
        result.rms, result.base_rms, result.sub_rms, result.used_pairs
    );

    let mut extrinsics = ExtrinsicsFile::new();
    extrinsics.insert(
        layout.extrinsics_key(),
        ExtrinsicRecord::new(&result.rotation(), &result.translation(), result.rms),
    );
    write_extrinsics(layout.extrinsics_path(), &extrinsics)?;
    info!(
        "Extrinsic parameters saved to {}",
        layout.extrinsics_path().display()
    );

    let report = CalibrationReport {
        timestamp: report_timestamp(),
        board: BoardSummary::new(&board),
        pairs_found: image_pairs.len(),
        pairs_used: result.used_pairs,
        pairs_skipped: image_pairs.len().saturating_sub(result.used_pairs),
        cameras: vec![
            CameraReport {
                id: cli.basecam_id,
                rms_error: result.base_rms,
                point_count: result.point_count,
            },
            CameraReport {
                id: cli.subcam_id,
                rms_error: result.sub_rms,
                point_count: result.point_count,
            },
        ],
        overall_rms: result.rms,
        baseline_m: result.baseline(),
    };
    write_report(layout.report_path(), &report)?;

    if let Some(recording) = &recording {
        log_results(
            recording,
            (&base_cam, &sub_cam),
            cli.subcam_id,
            (&base_topic, &sub_topic),
            &stereo_pairs,
            &result,
        )?;
    }
    Ok(())
}
