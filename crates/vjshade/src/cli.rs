use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "vjshade",
    author,
    version,
    about = "Live GLSL chunk compositor",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Scene description to load; falls back to the user config dir, then the built-in demo.
    #[arg(long, env = "VJSHADE_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size_arg)]
    pub size: Option<(u32, u32)>,

    /// Optional FPS cap (0=uncapped).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Start in borderless fullscreen.
    #[arg(long)]
    pub fullscreen: bool,

    /// Write each wrapped fragment program to this path.
    #[arg(long, value_name = "PATH")]
    pub dump_shader: Option<PathBuf>,

    /// Disable polling the scene file for changes.
    #[arg(long)]
    pub no_watch: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the composed fragment program for a scene and exit.
    Compose(ComposeArgs),
    /// Print resolved configuration paths.
    Where,
}

#[derive(Parser, Debug)]
pub struct ComposeArgs {
    /// Scene description to compose; defaults as for the renderer.
    #[arg(long, env = "VJSHADE_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = ComposeFormat::Glsl)]
    pub format: ComposeFormat,

    /// Prefix each GLSL line with its number.
    #[arg(long)]
    pub numbered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ComposeFormat {
    Glsl,
    Json,
}

pub fn parse() -> Cli {
    Cli::parse()
}

fn parse_size_arg(value: &str) -> Result<(u32, u32), String> {
    sceneconfig::parse_size(value)
}
