use charuco_stereo_calibration::board::{
    Board, BoardConfig, MAX_RENDER_SIDE_PX, PRINT_BORDER_MM, create_default_board,
};
use charuco_stereo_calibration::error::CalibError;

#[test]
fn test_board_config_defaults() {
    let config = BoardConfig::from_yaml_str("").unwrap();
    assert_eq!(config, BoardConfig::default());
    assert_eq!(config.squares_x, 5);
    assert_eq!(config.squares_y, 7);
    assert_eq!(config.aruco_dict, "DICT_4X4_50");
    assert!((config.square_length_m() - 0.030).abs() < 1e-12);
    assert!((config.marker_length_m() - 0.024).abs() < 1e-12);

    let partial = BoardConfig::from_yaml_str("squares_x: 8\naruco_dict: DICT_5X5_100\n").unwrap();
    assert_eq!(partial.squares_x, 8);
    assert_eq!(partial.squares_y, 7);
    assert_eq!(partial.aruco_dict, "DICT_5X5_100");
    assert_eq!(partial.square_length_mm, 30.0);
}

#[test]
fn test_board_corner_geometry() {
    let board = create_default_board().unwrap();
    // 4 x 6 inner corners
    assert_eq!(board.corner_count(), 24);

    let p0 = board.object_point(0).unwrap();
    assert!((p0.x - 0.03).abs() < 1e-6);
    assert!((p0.y - 0.03).abs() < 1e-6);
    assert_eq!(p0.z, 0.0);

    // id = j * (squares_x - 1) + i
    let p5 = board.object_point(5).unwrap();
    assert!((p5.x - 0.06).abs() < 1e-6);
    assert!((p5.y - 0.06).abs() < 1e-6);

    let last = board.object_point(23).unwrap();
    assert!((last.x - 0.12).abs() < 1e-6);
    assert!((last.y - 0.18).abs() < 1e-6);

    assert!(board.object_point(24).is_none());
}

#[test]
fn test_board_marker_cells() {
    let board = create_default_board().unwrap();
    let cells = board.marker_cells();
    assert_eq!(cells.len(), 17);
    // top-left square is black, first marker sits right of it
    assert_eq!(cells[0], (1, 0));
    assert_eq!(cells[1], (3, 0));
    assert_eq!(cells[2], (0, 1));
}

#[test]
fn test_invalid_dictionary() {
    let config = BoardConfig {
        aruco_dict: "DICT_NOT_A_DICT".to_string(),
        ..BoardConfig::default()
    };
    match Board::from_config(&config) {
        Err(e @ CalibError::UnknownDictionary(_)) => {
            assert_eq!(e.to_string(), "Invalid ArUco dictionary: DICT_NOT_A_DICT");
        }
        Err(e) => panic!("unexpected error {}", e),
        Ok(_) => panic!("board with unknown dictionary accepted"),
    }
}

#[test]
fn test_marker_larger_than_square() {
    let config = BoardConfig {
        marker_length_mm: 40.0,
        ..BoardConfig::default()
    };
    assert!(matches!(
        Board::from_config(&config),
        Err(CalibError::InvalidBoard(_))
    ));
}

#[test]
fn test_board_render() {
    let board = create_default_board().unwrap();
    let img = board.render().unwrap();
    assert_eq!(img.width(), 5 * 100 + 2 * 5);
    assert_eq!(img.height(), 7 * 100 + 2 * 5);

    // center of the black top-left square
    assert_eq!(img.get_pixel(55, 55).0, [0, 0, 0]);
    // white margin of the marker square next to it
    assert_eq!(img.get_pixel(108, 8).0, [255, 255, 255]);
    // black border cell of marker 0
    assert_eq!(img.get_pixel(118, 18).0, [0, 0, 0]);
    // outer margin
    assert_eq!(img.get_pixel(img.width() - 1, img.height() / 2).0, [255, 255, 255]);
    // origin disc
    assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0]);
}

#[test]
fn test_board_render_marker_bits() {
    let board = create_default_board().unwrap();
    let img = board.render().unwrap();
    // 6x6 bit cells of 80 / 6 px starting 10 px into the square
    let cell = 80.0 / 6.0;
    let (x0, y0) = (5.0 + 100.0 + 10.0, 5.0 + 10.0);
    let code = board.dictionary.codes[0];
    for by in 0..4 {
        for bx in 0..4 {
            let x = (x0 + (bx as f64 + 1.5) * cell) as u32;
            let y = (y0 + (by as f64 + 1.5) * cell) as u32;
            let black = (code >> (by * 4 + bx)) & 1 == 1;
            let expected = if black { 0 } else { 255 };
            assert_eq!(img.get_pixel(x, y).0, [expected; 3], "bit ({}, {})", bx, by);
        }
    }
}

#[test]
fn test_render_size_overflow() {
    let config = BoardConfig {
        pixels_per_square: u32::MAX / 2,
        ..BoardConfig::default()
    };
    let board = Board::from_config(&config).unwrap();
    assert!(matches!(board.render_size(), Err(CalibError::InvalidBoard(_))));
    assert!(matches!(board.render(), Err(CalibError::InvalidBoard(_))));

    let margin = BoardConfig {
        margin_px: u32::MAX,
        ..BoardConfig::default()
    };
    let board = Board::from_config(&margin).unwrap();
    assert!(matches!(board.render_size(), Err(CalibError::InvalidBoard(_))));

    let too_large = BoardConfig {
        pixels_per_square: MAX_RENDER_SIDE_PX / 5 + 1,
        ..BoardConfig::default()
    };
    let board = Board::from_config(&too_large).unwrap();
    assert!(matches!(board.render_size(), Err(CalibError::InvalidBoard(_))));

    let zero = BoardConfig {
        pixels_per_square: 0,
        ..BoardConfig::default()
    };
    let board = Board::from_config(&zero).unwrap();
    assert!(matches!(board.render(), Err(CalibError::InvalidBoard(_))));
}

#[test]
fn test_printable_document_true_scale() {
    let board = create_default_board().unwrap();
    let layout = board.printable_document().resolve_layout().unwrap();
    assert!((layout.board_width_mm - 150.0).abs() < 1e-9);
    assert!((layout.board_height_mm - 210.0).abs() < 1e-9);
    assert!((layout.board_origin_mm[0] - PRINT_BORDER_MM).abs() < 1e-9);
    assert!((layout.page_width_mm - (150.0 + 2.0 * PRINT_BORDER_MM)).abs() < 1e-9);

    // printed corner ids agree with the board's object points
    assert_eq!(layout.points.len(), board.corner_count());
    for point in &layout.points {
        let p3d = board.object_point(point.id.unwrap()).unwrap();
        assert!((p3d.x as f64 * 1000.0 - point.position_mm[0]).abs() < 1e-3);
        assert!((p3d.y as f64 * 1000.0 - point.position_mm[1]).abs() < 1e-3);
    }
}

#[test]
fn test_detector_sweep_fits_small_boards() {
    let board = create_default_board().unwrap();
    // 3x5 interior squares, 7 of them white
    assert_eq!(board.interior_marker_count(), 7);
    let sweep = board.detector_sweep();
    assert!(!sweep.is_empty());
    for params in &sweep {
        assert!(params.min_marker_inliers <= board.interior_marker_count());
        assert_eq!(params.board.rows, 7);
        assert_eq!(params.board.cols, 5);
    }

    let large = Board::from_config(&BoardConfig {
        squares_x: 11,
        squares_y: 8,
        ..BoardConfig::default()
    })
    .unwrap();
    assert_eq!(large.detector_sweep()[0].min_marker_inliers, 8);
}
