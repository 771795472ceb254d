use anyhow::Context;
use calib_targets::printable::render_target_bundle;
use charuco_stereo_calibration::board::{Board, BoardConfig};
use clap::Parser;
use log::info;
use std::path::Path;

#[derive(Parser)]
#[command(version, about = "Render a ChArUco board to an image", author)]
struct MakeBoardCli {
    /// board yaml: squares_x, squares_y, square_length_mm, marker_length_mm, aruco_dict
    #[arg(long)]
    board: String,

    /// output image
    #[arg(long, default_value = "charuco_board.png")]
    output: String,

    /// also write a true-scale svg next to the image
    #[arg(long, default_value_t = false)]
    svg: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = MakeBoardCli::parse();

    let board_config = BoardConfig::from_yaml(&cli.board)
        .with_context(|| format!("loading board config {}", cli.board))?;
    let board = Board::from_config(&board_config)?;
    let img = board.render()?;
    img.save(&cli.output)
        .with_context(|| format!("writing {}", cli.output))?;
    info!(
        "Saved {}x{} board ({}x{} px) to {}",
        board_config.squares_x,
        board_config.squares_y,
        img.width(),
        img.height(),
        cli.output
    );

    if cli.svg {
        let svg_path = Path::new(&cli.output).with_extension("svg");
        let bundle = render_target_bundle(&board.printable_document())?;
        std::fs::write(&svg_path, bundle.svg_text)
            .with_context(|| format!("writing {}", svg_path.display()))?;
        info!("Saved true-scale board to {}", svg_path.display());
    }
    Ok(())
}
