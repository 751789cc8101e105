mod editor;
mod macros;
mod rope;
mod util;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use clap::Parser;
use color_eyre::Report;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::editor::Editor;

/// A rope-backed modal text editor for the terminal.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// File to open.
    file: Option<PathBuf>,

    /// Where to write the debug log. Logging goes to a file because the
    /// terminal itself belongs to the editor.
    #[arg(long, default_value = "twine.log")]
    log_file: PathBuf,
}

fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let args = Args::parse();
    init_tracing(&args.log_file)?;

    let mut editor = Editor::new()?;
    if let Some(file) = &args.file {
        editor.load_file(&file.to_string_lossy())?;
    }

    editor.run()
}

fn init_tracing(path: &PathBuf) -> Result<(), Report> {
    let log = File::create(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(log))
        .with_ansi(false)
        .init();

    info!(path = %path.display(), "logging initialized");
    Ok(())
}
