//! Command-line converter: HTML file in, `.docx` package out.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use html2docx::{config, Report, Result};

#[derive(Parser)]
#[command(version, about = "Convert an HTML file into a Word (.docx) document.")]
struct Cli {
    /// The HTML file to convert.
    input: PathBuf,
    /// Where to write the .docx package.
    output: PathBuf,
    /// Skip <img> elements entirely.
    #[arg(long)]
    no_images: bool,
}

fn run(cli: &Cli) -> Result<Report> {
    let html = std::fs::read_to_string(&cli.input)?;
    let config = config::standard().include_images(!cli.no_images);
    let (mut document, report) = config.docx_from_string(&html)?;
    document.save(&cli.output)?;
    Ok(report)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(report) => {
            for diagnostic in report.diagnostics() {
                eprintln!("{}", diagnostic);
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
