use charuco_stereo_calibration::board::{Board, create_default_board};
use charuco_stereo_calibration::camera::{CameraIntrinsics, project_checked};
use charuco_stereo_calibration::data_loader::{
    detect_frame, get_image_pairs, list_images, load_pair_features,
};
use charuco_stereo_calibration::error::CalibError;
use charuco_stereo_calibration::synthetic::{centered_board_pose, render_view};
use image::{DynamicImage, Rgb, RgbImage};
use nalgebra as na;
use std::path::Path;

fn write_frames(dir: &Path, names: &[&str]) {
    std::fs::create_dir_all(dir).unwrap();
    for name in names {
        RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]))
            .save(dir.join(name))
            .unwrap();
    }
}

#[test]
fn test_list_images_sorted_and_filtered() {
    let dir = tempfile::tempdir().unwrap();
    write_frames(dir.path(), &["0002.png", "0000.png", "0001.jpg"]);
    std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

    let images = list_images(dir.path()).unwrap();
    let names: Vec<_> = images
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["0000.png", "0001.jpg", "0002.png"]);
}

#[test]
fn test_image_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("cam2");
    let sub = dir.path().join("cam1");
    write_frames(&base, &["0000.png", "0001.png", "0002.png"]);
    write_frames(&sub, &["0001.png", "0000.png", "0002.png"]);

    let pairs = get_image_pairs(&base, &sub).unwrap();
    assert_eq!(pairs.len(), 3);
    for (b, s) in &pairs {
        assert_eq!(b.file_name(), s.file_name());
        assert!(b.starts_with(&base));
        assert!(s.starts_with(&sub));
    }
}

#[test]
fn test_image_pairs_count_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("cam2");
    let sub = dir.path().join("cam1");
    write_frames(&base, &["0000.png", "0001.png"]);
    write_frames(&sub, &["0000.png"]);

    match get_image_pairs(&base, &sub) {
        Err(e @ CalibError::ImageCountMismatch { base: 2, sub: 1 }) => {
            assert!(e.to_string().starts_with("Number of images in both cameras do not match"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_missing_camera_dir() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        list_images(dir.path().join("cam9")),
        Err(CalibError::Io { .. })
    ));
}

fn test_camera() -> CameraIntrinsics {
    CameraIntrinsics::new(600.0, 600.0, 320.0, 240.0, &[0.05, -0.1, 0.0, 0.0, 0.0])
        .with_resolution(640, 480)
}

/// Board 0.4 m away, turned in plane and tilted a little.
fn test_pose(board: &Board) -> na::Isometry3<f64> {
    centered_board_pose(
        board,
        na::UnitQuaternion::from_euler_angles(0.15, -0.1, 0.26),
        na::Vector3::new(0.01, -0.005, 0.4),
    )
}

fn rendered_view(board: &Board) -> DynamicImage {
    let texture = image::imageops::grayscale(&board.render().unwrap());
    DynamicImage::ImageRgb8(render_view(&test_camera(), &test_pose(board), board, &texture))
}

#[test]
fn test_detect_frame_on_rendered_board() {
    let board = create_default_board().unwrap();
    let img = rendered_view(&board);
    let model = test_camera().model();
    let pose = test_pose(&board);

    let frame = detect_frame(&board, &img, 7).expect("board not detected");
    assert_eq!(frame.frame_idx, 7);
    assert_eq!(frame.img_w_h, (640, 480));
    assert!(
        frame.features.len() >= 20,
        "only {} of {} corners",
        frame.features.len(),
        board.corner_count()
    );

    for (id, feature) in &frame.features {
        let p3d = board.object_point(*id).unwrap();
        assert_eq!(feature.p3d, p3d);
        let p_cam = pose * na::Point3::new(p3d.x as f64, p3d.y as f64, p3d.z as f64);
        let expected = project_checked(&model, &p_cam.coords).unwrap();
        let err = ((feature.p2d.x as f64 - expected.x).powi(2)
            + (feature.p2d.y as f64 - expected.y).powi(2))
        .sqrt();
        assert!(err < 1.0, "corner {} off by {:.3} px", id, err);
    }
}

#[test]
fn test_detect_frame_rejects_blank_image() {
    let board = create_default_board().unwrap();
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(320, 240, Rgb([128, 128, 128])));
    assert!(detect_frame(&board, &img, 0).is_none());
}

#[test]
fn test_load_pair_features() {
    let board = create_default_board().unwrap();
    let img = rendered_view(&board);
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("cam2");
    let sub = dir.path().join("cam1");
    for d in [&base, &sub] {
        std::fs::create_dir_all(d).unwrap();
        img.save(d.join("0000.png")).unwrap();
    }
    // an unrelated frame in which nothing is found
    RgbImage::from_pixel(64, 48, Rgb([200, 200, 200]))
        .save(base.join("0001.png"))
        .unwrap();
    RgbImage::from_pixel(64, 48, Rgb([200, 200, 200]))
        .save(sub.join("0001.png"))
        .unwrap();

    let pairs = get_image_pairs(&base, &sub).unwrap();
    let features = load_pair_features(&pairs, &board, None, ("/cam2", "/cam1"));
    assert_eq!(features.len(), 2);
    assert_eq!(features[0].frame_idx, 0);
    let (b, s) = (
        features[0].base.as_ref().unwrap(),
        features[0].sub.as_ref().unwrap(),
    );
    assert_eq!(b.sorted_ids(), s.sorted_ids());
    assert!(features[1].base.is_none());
    assert!(features[1].sub.is_none());
}
