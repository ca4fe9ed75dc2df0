mod logging;
mod markdown;
mod settings;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;
use page_engine::{PageRecord, Pipeline};
use page_logging::{page_error, page_info};

use crate::markdown::markdown_compiler;
use crate::settings::PipelineSettings;

/// Normalize content pages and print each record as one JSON line.
#[derive(Parser)]
#[command(name = "page")]
struct Cli {
    /// RON settings file.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Extract images from compiled html.
    #[arg(long)]
    images: bool,

    /// Compile bodies as markdown.
    #[arg(long)]
    markdown: bool,

    /// Base directory for relative page paths.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Log at debug level.
    #[arg(long, short)]
    verbose: bool,

    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = match &cli.settings {
        Some(path) => PipelineSettings::load(path)?,
        None => PipelineSettings::default(),
    };
    logging::initialize(
        settings.log.destination,
        settings.log.file.as_deref(),
        cli.verbose || settings.log.verbose,
    );

    let mut options = settings.to_options();
    if cli.images {
        options.images = true;
    }
    if cli.markdown {
        options.compiler = Some(markdown_compiler());
    }
    if let Some(root) = cli.root {
        options.root = Some(root);
    }
    let pipeline = Pipeline::new(options);

    let stdout = io::stdout();
    let mut failures = 0usize;
    for file in &cli.files {
        match pipeline.process_file(file).await {
            Ok(record) => {
                if let Err(err) = write_record(&mut stdout.lock(), &record) {
                    page_error!("{}: cannot write record: {}", file.display(), err);
                    failures += 1;
                }
            }
            Err(err) => {
                page_error!("{}: {}", file.display(), err);
                failures += 1;
            }
        }
    }

    page_info!("processed {} file(s), {} failed", cli.files.len(), failures);
    if failures > 0 {
        bail!("{failures} file(s) failed");
    }
    Ok(())
}

/// Writes `record` as one JSON line; nothing is written if it does not serialize.
fn write_record(out: &mut impl Write, record: &PageRecord) -> anyhow::Result<()> {
    let line = serde_json::to_string(record)?;
    writeln!(out, "{line}")?;
    Ok(())
}
