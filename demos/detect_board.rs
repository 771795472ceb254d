use charuco_stereo_calibration::board::create_default_board;
use charuco_stereo_calibration::data_loader::detect_frame;
use charuco_stereo_calibration::visualization::log_feature_frame;
use image::ImageReader;

/// Detects the default 5x7 board in one image and shows the corners in rerun.
fn main() -> anyhow::Result<()> {
    env_logger::init();
    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: detect_board <image>"))?;
    let board = create_default_board()?;
    let img = ImageReader::open(&path)?.decode()?;

    let recording = rerun::RecordingStreamBuilder::new("detect_board").spawn()?;
    charuco_stereo_calibration::visualization::log_image_as_compressed(
        &recording,
        "/cam0",
        &img,
        image::ImageFormat::Jpeg,
    );
    match detect_frame(&board, &img, 0) {
        Some(frame) => {
            println!("{} corners: {:?}", frame.features.len(), frame.sorted_ids());
            log_feature_frame(&recording, "/cam0", &frame);
        }
        None => println!("board not found"),
    }
    Ok(())
}
