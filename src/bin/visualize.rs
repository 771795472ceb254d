use anyhow::bail;
use charuco_stereo_calibration::io::{export_summary, load_extrinsic, read_intrinsics};
use charuco_stereo_calibration::task::{TaskLayout, cam_key, summary_path};
use charuco_stereo_calibration::visualization::{
    BASE_CAMERA_COLOR, camera_color, log_camera_frame, log_pinhole,
};
use clap::Parser;
use log::{info, warn};
use nalgebra as na;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Parser)]
#[command(
    version,
    about = "Visualize camera extrinsics and export a summary",
    author
)]
struct VisualizeCli {
    /// base camera id (e.g. 2)
    #[arg(long = "basecam_id")]
    basecam_id: u32,

    /// sub camera ids (e.g. 1 3 4)
    #[arg(long = "subcam_id", num_args = 1.., required = true)]
    subcam_id: Vec<u32>,

    /// path to the calibration task directory
    #[arg(long = "task_path")]
    task_path: String,

    /// save to a rerun file instead of spawning a viewer
    #[arg(long)]
    save: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = VisualizeCli::parse();

    let task_path = Path::new(&cli.task_path);
    if !task_path.is_dir() {
        bail!("Task path does not exist: {}", cli.task_path);
    }

    let recording = match &cli.save {
        Some(path) => rerun::RecordingStreamBuilder::new("camera extrinsics").save(path)?,
        None => rerun::RecordingStreamBuilder::new("camera extrinsics").spawn()?,
    };
    recording.log_static("/", &rerun::ViewCoordinates::RDF())?;
    log_camera_frame(
        &recording,
        &format!("/world/{}", cam_key(cli.basecam_id)),
        &na::Isometry3::identity(),
        BASE_CAMERA_COLOR,
        0.5,
        &cam_key(cli.basecam_id),
    )?;

    let mut summary_intrinsics = BTreeMap::new();
    let mut summary_extrinsics = BTreeMap::new();

    for &subcam_id in &cli.subcam_id {
        let layout = TaskLayout::new(task_path, cli.basecam_id, subcam_id);
        if !layout.dir.is_dir() {
            warn!("Calibration directory not found: {}", layout.dir.display());
            continue;
        }

        let record = match load_extrinsic(layout.extrinsics_path(), cli.basecam_id, subcam_id) {
            Ok(r) => r,
            Err(e) => {
                warn!("{}", e);
                warn!("Skipping camera {} due to missing extrinsics.", subcam_id);
                continue;
            }
        };

        // pose of the sub camera in the base frame
        let base_to_sub = record.to_isometry();
        let entity = format!("/world/{}", cam_key(subcam_id));
        log_camera_frame(
            &recording,
            &entity,
            &base_to_sub.inverse(),
            camera_color(subcam_id),
            0.2,
            &cam_key(subcam_id),
        )?;
        info!("Added Camera {} to visualization.", subcam_id);

        let intrinsics = match read_intrinsics(layout.intrinsics_path()) {
            Ok(i) => i,
            Err(e) => {
                warn!("{}", e);
                warn!(
                    "Skipping intrinsics collection for camera {} due to missing intrinsics.",
                    subcam_id
                );
                continue;
            }
        };
        for cam_id in [cli.basecam_id, subcam_id] {
            if let Some(cam) = intrinsics.get(&cam_key(cam_id)) {
                summary_intrinsics.insert(cam_id, cam.camera_matrix);
            }
        }
        if let Some(cam) = intrinsics.get(&cam_key(subcam_id)) {
            if let Some(resolution) = cam.resolution {
                log_pinhole(&recording, &entity, &cam.camera_matrix, resolution)?;
            }
        }
        summary_extrinsics.insert(subcam_id, record.homogeneous());
    }

    let summary = summary_path(task_path);
    export_summary(
        &summary,
        cli.basecam_id,
        &cli.subcam_id,
        &summary_intrinsics,
        &summary_extrinsics,
    )?;
    info!("Summary exported to {}", summary.display());
    Ok(())
}
