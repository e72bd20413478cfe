//! epub2pdf - EPUB to PDF converter

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

#[derive(Parser)]
#[command(name = "epub2pdf")]
#[command(version, about = "EPUB to PDF converter (Chromium print engine)", long_about = None)]
#[command(after_help = "EXAMPLES:
    epub2pdf book.epub              Convert to book.pdf
    epub2pdf book.epub out.pdf      Convert to an explicit output path
    epub2pdf -i book.epub           Show book metadata")]
struct Cli {
    /// Input EPUB file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output PDF file (defaults to the input path with a .pdf extension)
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Show book metadata without converting
    #[arg(short, long)]
    info: bool,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.quiet { "error" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let result = if cli.info {
        show_info(&cli.input)
    } else {
        epub2pdf::convert(&cli.input, cli.output.as_deref()).map(|_| ())
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn show_info(path: &Path) -> epub2pdf::Result<()> {
    let info = epub2pdf::inspect(path)?;

    println!("File: {}", path.display());
    println!("Title: {}", info.title.as_deref().unwrap_or("Unknown"));
    println!("Author: {}", info.creator.as_deref().unwrap_or("Unknown"));
    println!("Chapters: {}", info.chapters);
    if let Some(cover) = &info.cover {
        println!("Cover: {cover}");
    }

    Ok(())
}
