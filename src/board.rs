use std::collections::HashMap;
use std::path::Path;

use calib_targets::aruco::{Dictionary, builtins};
use calib_targets::charuco::{CharucoBoard, CharucoBoardSpec, CharucoParams, MarkerLayout};
use calib_targets::generate::charuco_document;
use calib_targets::printable::{PageSize, PrintableTargetDocument, render_target_bundle};
use image::{ImageFormat, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{CalibError, Result};

const ORIGIN_RADIUS_PX: i64 = 2;
/// Largest rendered side, pixels.
pub const MAX_RENDER_SIDE_PX: u32 = 1 << 15;
/// Rasterization scale; one document millimeter per ten pixels.
const RASTER_PX_PER_MM: u32 = 10;
/// White border of the printable document, millimeters.
pub const PRINT_BORDER_MM: f64 = 10.0;
const MIN_MARKER_INLIERS: usize = 3;
const MAX_MARKER_INLIERS: usize = 8;

/// Board description as stored in the board yaml.
///
/// Lengths are in millimeters on disk and converted to meters by [`Board`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub squares_x: u32,
    pub squares_y: u32,
    pub square_length_mm: f64,
    pub marker_length_mm: f64,
    pub aruco_dict: String,
    pub pixels_per_square: u32,
    pub margin_px: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            squares_x: 5,
            squares_y: 7,
            square_length_mm: 30.0,
            marker_length_mm: 24.0,
            aruco_dict: "DICT_4X4_50".to_string(),
            pixels_per_square: 100,
            margin_px: 5,
        }
    }
}

impl BoardConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<BoardConfig> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| CalibError::io(path, e))?;
        Self::from_yaml_str(&contents).map_err(|source| CalibError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml_str(contents: &str) -> std::result::Result<BoardConfig, serde_yaml::Error> {
        // an empty file means "all defaults"
        if contents.trim().is_empty() {
            return Ok(BoardConfig::default());
        }
        serde_yaml::from_str(contents)
    }

    pub fn square_length_m(&self) -> f64 {
        self.square_length_mm / 1000.0
    }

    pub fn marker_length_m(&self) -> f64 {
        self.marker_length_mm / 1000.0
    }
}

/// A validated ChArUco board.
pub struct Board {
    pub config: BoardConfig,
    pub dictionary: Dictionary,
    pub spec: CharucoBoardSpec,
    /// ChArUco corner id to its position on the board plane, meters.
    pub id_to_3d: HashMap<u32, glam::Vec3>,
}

impl Board {
    pub fn from_config(board_config: &BoardConfig) -> Result<Board> {
        let dictionary = builtins::builtin_dictionary(&board_config.aruco_dict)
            .ok_or_else(|| CalibError::UnknownDictionary(board_config.aruco_dict.clone()))?;

        let square = board_config.square_length_m();
        let marker = board_config.marker_length_m();
        if !(square > 0.0) {
            return Err(CalibError::InvalidBoard(format!(
                "square_length_mm must be > 0, got {}",
                board_config.square_length_mm
            )));
        }
        if !(marker > 0.0) || marker > square {
            return Err(CalibError::InvalidBoard(format!(
                "marker_length_mm must be in (0, {}], got {}",
                board_config.square_length_mm, board_config.marker_length_mm
            )));
        }

        let spec = CharucoBoardSpec {
            rows: board_config.squares_y,
            cols: board_config.squares_x,
            cell_size: square as f32,
            marker_size_rel: (marker / square) as f32,
            dictionary,
            marker_layout: MarkerLayout::OpenCvCharuco,
        };
        // validates size and dictionary capacity
        CharucoBoard::new(spec).map_err(|e| CalibError::InvalidBoard(e.to_string()))?;

        Ok(Board {
            config: board_config.clone(),
            dictionary,
            spec,
            id_to_3d: init_charuco_corners(
                board_config.squares_x,
                board_config.squares_y,
                square as f32,
            ),
        })
    }

    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Board> {
        Self::from_config(&BoardConfig::from_yaml(path)?)
    }

    pub fn corner_count(&self) -> usize {
        self.id_to_3d.len()
    }

    pub fn object_point(&self, id: u32) -> Option<glam::Vec3> {
        self.id_to_3d.get(&id).copied()
    }

    /// Square cells carrying a marker, in marker id order.
    pub fn marker_cells(&self) -> Vec<(u32, u32)> {
        let mut cells = Vec::new();
        for sy in 0..self.config.squares_y {
            for sx in 0..self.config.squares_x {
                if !is_black_square(sx, sy) {
                    cells.push((sx, sy));
                }
            }
        }
        cells
    }

    /// Markers whose square is bounded by four inner corners. Only these can
    /// be decoded, since the outer board edge has no chessboard corners.
    pub fn interior_marker_count(&self) -> usize {
        let (nx, ny) = (self.config.squares_x, self.config.squares_y);
        self.marker_cells()
            .into_iter()
            .filter(|&(sx, sy)| sx > 0 && sy > 0 && sx + 1 < nx && sy + 1 < ny)
            .count()
    }

    /// ChArUco detector configurations tried on every frame.
    ///
    /// The required marker inliers scale with the board so that small boards
    /// stay detectable.
    pub fn detector_sweep(&self) -> Vec<CharucoParams> {
        let min_inliers =
            (self.interior_marker_count() / 2).clamp(MIN_MARKER_INLIERS, MAX_MARKER_INLIERS);
        CharucoParams::sweep_for_board(&self.spec)
            .into_iter()
            .map(|mut params| {
                params.min_marker_inliers = min_inliers;
                params.min_secondary_marker_inliers =
                    params.min_secondary_marker_inliers.min(min_inliers);
                params
            })
            .collect()
    }

    /// Size of [`Board::render`], `squares * pixels_per_square + 2 * margin_px`
    /// per side.
    pub fn render_size(&self) -> Result<(u32, u32)> {
        let c = &self.config;
        if c.pixels_per_square == 0 {
            return Err(CalibError::InvalidBoard("pixels_per_square must be > 0".to_string()));
        }
        let side = |squares: u32| {
            squares
                .checked_mul(c.pixels_per_square)
                .zip(c.margin_px.checked_mul(2))
                .and_then(|(board, margins)| board.checked_add(margins))
                .filter(|&px| px <= MAX_RENDER_SIDE_PX)
        };
        match (side(c.squares_x), side(c.squares_y)) {
            (Some(width), Some(height)) => Ok((width, height)),
            _ => Err(CalibError::InvalidBoard(format!(
                "rendered board exceeds {} px per side ({}x{} squares of {} px, margin {} px)",
                MAX_RENDER_SIDE_PX, c.squares_x, c.squares_y, c.pixels_per_square, c.margin_px
            ))),
        }
    }

    /// Printable document at true scale, with a white border around the board.
    pub fn printable_document(&self) -> PrintableTargetDocument {
        self.document_mm(self.config.square_length_mm, PRINT_BORDER_MM)
    }

    fn document_mm(&self, square_mm: f64, border_mm: f64) -> PrintableTargetDocument {
        let mut doc = charuco_document(
            self.config.squares_y,
            self.config.squares_x,
            square_mm,
            self.spec.marker_size_rel as f64,
            self.dictionary,
        );
        // zero margin puts the board origin at `border_mm`
        doc.page.margin_mm = 0.0;
        doc.page.size = PageSize::Custom {
            width_mm: self.config.squares_x as f64 * square_mm + 2.0 * border_mm,
            height_mm: self.config.squares_y as f64 * square_mm + 2.0 * border_mm,
        };
        doc
    }

    /// Renders the board image.
    ///
    /// The top-left square is black, markers sit on white squares and the
    /// board origin is marked at the top-left image corner.
    pub fn render(&self) -> Result<RgbImage> {
        let (width, height) = self.render_size()?;
        let px_per_mm = RASTER_PX_PER_MM as f64;
        let mut doc = self.document_mm(
            self.config.pixels_per_square as f64 / px_per_mm,
            self.config.margin_px as f64 / px_per_mm,
        );
        doc.render.png_dpi = RASTER_PX_PER_MM * 254 / 10;
        let bundle = render_target_bundle(&doc).map_err(|e| CalibError::Render(e.to_string()))?;
        let mut img = image::load_from_memory_with_format(&bundle.png_bytes, ImageFormat::Png)
            .map_err(|e| CalibError::Render(e.to_string()))?
            .to_rgb8();
        if img.dimensions() != (width, height) {
            return Err(CalibError::Render(format!(
                "expected {}x{} px, rasterized {}x{} px",
                width,
                height,
                img.width(),
                img.height()
            )));
        }
        draw_origin(&mut img);
        Ok(img)
    }
}

/// Inner corners in row-major order, `id = j * (squares_x - 1) + i`.
pub fn init_charuco_corners(squares_x: u32, squares_y: u32, square: f32) -> HashMap<u32, glam::Vec3> {
    let mut id_to_3d = HashMap::new();
    let inner_cols = squares_x.saturating_sub(1);
    let inner_rows = squares_y.saturating_sub(1);
    for j in 0..inner_rows {
        for i in 0..inner_cols {
            id_to_3d.insert(
                j * inner_cols + i,
                glam::Vec3::new((i + 1) as f32 * square, (j + 1) as f32 * square, 0.0),
            );
        }
    }
    id_to_3d
}

fn is_black_square(sx: u32, sy: u32) -> bool {
    (sx + sy) % 2 == 0
}

fn draw_origin(img: &mut RgbImage) {
    for dy in -ORIGIN_RADIUS_PX..=ORIGIN_RADIUS_PX {
        for dx in -ORIGIN_RADIUS_PX..=ORIGIN_RADIUS_PX {
            if dx * dx + dy * dy > ORIGIN_RADIUS_PX * ORIGIN_RADIUS_PX {
                continue;
            }
            if dx >= 0 && dy >= 0 && (dx as u32) < img.width() && (dy as u32) < img.height() {
                img.put_pixel(dx as u32, dy as u32, Rgb([0, 0, 0]));
            }
        }
    }
}

pub fn create_default_board() -> Result<Board> {
    Board::from_config(&BoardConfig::default())
}
