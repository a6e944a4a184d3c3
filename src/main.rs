mod api;
mod collect;
mod row;
mod settings;
mod sink;
mod utils;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{info, warn};

use api::types::OrderMode;
use api::NoteApi;
use collect::Job;
use settings::Settings;
use sink::CsvSink;

#[derive(Parser)]
#[command(
    name = "note_hashtag_export",
    about = "Export every note tagged with a hashtag to a CSV file"
)]
struct Cli {
    /// Hashtag to export, without the leading '#'
    #[arg(long)]
    hashtag: String,
    /// Listing order requested from the API
    #[arg(long, value_enum, default_value_t = OrderMode::Popular)]
    order: OrderMode,
    /// Output CSV path
    #[arg(short, long, default_value = "result.csv")]
    output: PathBuf,
    /// Directory for raw API responses
    #[arg(long, default_value = "logs")]
    logs_dir: PathBuf,
    /// Skip writing raw API responses
    #[arg(long)]
    no_dump: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;
    info!(?settings, "Loaded settings");

    let hashtag = clean_hashtag(&cli.hashtag)?;
    println!("Hashtag: {} ({})", hashtag, cli.order.as_str());

    let dump_dir = (!cli.no_dump).then(|| cli.logs_dir.clone());
    let api = NoteApi::new(&settings, dump_dir)?;
    let mut sink = CsvSink::create(&cli.output)?;

    let job = Job {
        hashtag,
        order: cli.order,
        site_base: &settings.site_base,
    };
    let stats = collect::collect(&api, &job, &mut sink).await?;
    let written = sink.rows();
    sink.finish()?;
    info!(pages = stats.pages, notes = stats.notes, "Collection finished");

    println!(
        "Done: {} notes from {} pages written to {} ({} with remarks) in {}",
        written,
        stats.pages,
        cli.output.display(),
        stats.with_remarks,
        utils::format_duration(t0.elapsed())
    );
    Ok(())
}

/// Drop a leading '#' and reject tags that are empty once it is gone.
fn clean_hashtag(raw: &str) -> Result<&str> {
    let hashtag = match raw.strip_prefix('#') {
        Some(stripped) => {
            warn!("Dropping leading '#' from {:?}", raw);
            stripped
        }
        None => raw,
    };
    if hashtag.trim().is_empty() {
        bail!("--hashtag must not be empty");
    }
    Ok(hashtag)
}
