use anyhow::{Context, bail};
use charuco_stereo_calibration::capture::{
    CaptureSession, FrameSource, ReplaySource, prepare_output_dirs, spawn_stdin_commands,
};
use charuco_stereo_calibration::io::{
    IntrinsicsFile, camera_intrinsics, read_intrinsics, write_intrinsics,
};
use charuco_stereo_calibration::rig::RigConfig;
use charuco_stereo_calibration::task::{TaskLayout, cam_key};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    version,
    about = "Capture synchronized frame pairs and camera intrinsics",
    author
)]
struct ExtractorCli {
    /// base camera id (e.g. 1-4)
    #[arg(long = "basecam_id")]
    basecam_id: u32,

    /// sub camera id (e.g. 1-4)
    #[arg(long = "subcam_id")]
    subcam_id: u32,

    /// path for storing images and calibration data
    #[arg(long = "task_path")]
    task_path: String,

    /// overwrite existing image directories
    #[arg(long)]
    overwrite: bool,

    /// rig yaml with camera serials and stream settings
    #[arg(long)]
    rig: Option<String>,

    /// replay image directories instead of live cameras, base first
    #[arg(long, num_args = 2)]
    replay: Vec<String>,

    /// intrinsics yaml used with --replay
    #[arg(long, requires = "replay")]
    intrinsics: Option<String>,

    /// save the live preview to this rerun file instead of spawning a viewer
    #[arg(long)]
    save: Option<String>,
}

#[cfg(feature = "realsense")]
fn open_cameras(
    cam_ids: &[u32],
    rig: &RigConfig,
) -> anyhow::Result<Vec<(u32, Box<dyn FrameSource>)>> {
    use charuco_stereo_calibration::capture::RealSenseSource;

    let context = realsense_rust::context::Context::new()
        .map_err(|e| anyhow::anyhow!("RealSense context: {}", e))?;
    let mut sources: Vec<(u32, Box<dyn FrameSource>)> = Vec::new();
    for &cam_id in cam_ids {
        let Some(serial) = rig.serial(cam_id) else {
            warn!("No serial number found for camera ID {}. Skipping.", cam_id);
            continue;
        };
        info!("Camera ID {} with serial {} found, starting stream.", cam_id, serial);
        let source = RealSenseSource::start(&context, serial, &rig.stream)
            .with_context(|| format!("Cannot start camera ID {} with serial {}", cam_id, serial))?;
        sources.push((cam_id, Box::new(source)));
    }
    Ok(sources)
}

#[cfg(not(feature = "realsense"))]
fn open_cameras(
    _cam_ids: &[u32],
    _rig: &RigConfig,
) -> anyhow::Result<Vec<(u32, Box<dyn FrameSource>)>> {
    bail!("built without the `realsense` feature; use --replay for offline capture")
}

fn open_replay(
    cam_ids: &[u32],
    dirs: &[String],
    intrinsics_path: Option<&str>,
    rig: &RigConfig,
) -> anyhow::Result<Vec<(u32, Box<dyn FrameSource>)>> {
    let Some(intrinsics_path) = intrinsics_path else {
        bail!("--replay needs --intrinsics");
    };
    let intrinsics = read_intrinsics(intrinsics_path)?;
    let mut sources: Vec<(u32, Box<dyn FrameSource>)> = Vec::new();
    for (&cam_id, dir) in cam_ids.iter().zip(dirs) {
        let cam = camera_intrinsics(&intrinsics, cam_id)?;
        let source = ReplaySource::new(dir, cam)?.with_fps(rig.stream.fps);
        sources.push((cam_id, Box::new(source)));
    }
    Ok(sources)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = ExtractorCli::parse();

    let layout = TaskLayout::new(&cli.task_path, cli.basecam_id, cli.subcam_id);
    let cam_ids = [cli.basecam_id, cli.subcam_id];
    let rig = match &cli.rig {
        Some(path) => {
            RigConfig::from_yaml(path).with_context(|| format!("loading rig config {}", path))?
        }
        None => RigConfig::default(),
    };

    let opened = if cli.replay.is_empty() {
        open_cameras(&cam_ids, &rig)?
    } else {
        open_replay(&cam_ids, &cli.replay, cli.intrinsics.as_deref(), &rig)?
    };
    if opened.is_empty() {
        bail!("no camera could be opened");
    }

    let mut intrinsics = IntrinsicsFile::new();
    let mut paths: Vec<PathBuf> = Vec::new();
    let mut sources = Vec::new();
    for (cam_id, source) in opened {
        let cam = source.intrinsics()?;
        info!("Extracted intrinsics for cam{}:", cam_id);
        info!("Camera Matrix: {:?}", cam.camera_matrix);
        info!("Distortion Coefficients: {:?}", cam.dist_coefficients);
        intrinsics.insert(cam_key(cam_id), cam);
        paths.push(layout.cam_dir(cam_id));
        sources.push(source);
    }

    prepare_output_dirs(&paths, cli.overwrite)?;
    write_intrinsics(layout.intrinsics_path(), &intrinsics)?;
    info!(
        "Intrinsic parameters saved to {}",
        layout.intrinsics_path().display()
    );

    let recording = match &cli.save {
        Some(path) => rerun::RecordingStreamBuilder::new("extractor").save(path),
        None => rerun::RecordingStreamBuilder::new("extractor").spawn(),
    };
    let recording = match recording {
        Ok(r) => Some(r),
        Err(e) => {
            warn!("preview disabled: {}", e);
            None
        }
    };

    let commands = spawn_stdin_commands();
    let mut session = CaptureSession::new(sources, paths, recording)?;
    let captured = session.run(&commands)?;
    info!("Captured {} frame pairs.", captured);
    Ok(())
}
