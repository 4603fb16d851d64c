//! Puyotui — Puyo-style chain-matching falling-pair puzzle game in the terminal.

mod app;
mod game;
mod input;
mod theme;
mod ui;

use anyhow::Result;
use app::App;
use clap::{Parser, ValueEnum};
use std::time::Duration;

/// Engine parameters resolved from the CLI: grid size, tick intervals, seed.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub rows: u16,
    pub cols: u16,
    pub drop_interval: Duration,
    pub soft_drop_interval: Duration,
    pub spawn_delay: Duration,
    pub clear_duration: Duration,
    pub seed: u32,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let config = GameConfig {
        rows: args.height.max(4),
        cols: args.width.max(2),
        drop_interval: Duration::from_millis(args.drop_ms),
        soft_drop_interval: Duration::from_millis(args.soft_drop_ms),
        spawn_delay: Duration::from_millis(args.spawn_delay_ms),
        clear_duration: Duration::from_millis(args.clear_ms),
        seed: args.seed.unwrap_or_else(seed_from_clock),
    };
    let mut app = App::new(&config, theme)?;
    app.run()?;
    Ok(())
}

/// Sub-second clock noise; good enough to vary the piece sequence per run.
fn seed_from_clock() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0x1234_5678)
}

/// Puyo-style chain-matching puzzle game in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "puyotui",
    version,
    about = "Puyo-style falling-pair puzzle in the terminal. Connect four or more of one colour to clear; chained clears count.",
    long_about = "Puyotui is a terminal puzzle game in the Puyo Puyo family.\n\n\
        A pair of coloured puyos falls onto the board. Groups of four or more \
        connected same-coloured puyos pop; anything left settles, and follow-up \
        pops from one drop build a chain. Filling the spawn column restarts the \
        board; the best chain of the whole run is kept.\n\n\
        CONTROLS (normal):\n  Left/Right  Move    Up         Rotate CW   Down       Soft drop\n  R           Restart P          Pause       Q / Esc    Quit\n\n\
        CONTROLS (vim / classic):\n  h/l or a/d  Move    k, w or z  Rotate CW   j or s     Soft drop\n\n\
        Hold Down (or j/s) to keep the pair dropping fast. Use --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Board width in columns.
    #[arg(long, default_value = "6", value_name = "COLS")]
    pub width: u16,

    /// Board height in rows.
    #[arg(long, default_value = "12", value_name = "ROWS")]
    pub height: u16,

    /// Normal drop interval in ms (one row per interval).
    #[arg(long, default_value = "550", value_name = "MS")]
    pub drop_ms: u64,

    /// Drop interval in ms while soft drop is held.
    #[arg(long, default_value = "70", value_name = "MS")]
    pub soft_drop_ms: u64,

    /// Pause in ms between a settled board and the next pair.
    #[arg(long, default_value = "220", value_name = "MS")]
    pub spawn_delay_ms: u64,

    /// Duration in ms of each clearing wave (matched puyos blink, then pop).
    #[arg(long, default_value = "480", value_name = "MS")]
    pub clear_ms: u64,

    /// Seed for the piece colour sequence (random per run if not set).
    #[arg(long, value_name = "N")]
    pub seed: Option<u32>,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}
