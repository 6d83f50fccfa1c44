mod cli;
mod compose;
mod controller;
mod paths;
mod plugins;
mod run;
mod scene;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Compose(args)) => compose::run_compose(args),
        Some(Command::Where) => run_where(),
        None => run::run(cli.run),
    }
}

fn run_where() -> Result<()> {
    let paths = paths::AppPaths::discover()?;
    println!("Configuration directories:");
    println!("  config:     {}", paths.config_dir().display());
    println!("  scene:      {}", paths.scene_file().display());
    Ok(())
}
