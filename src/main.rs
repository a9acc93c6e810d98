use anyhow::{Context, Result};
use clap::Parser;
use colored::*;

use site_mirror::logging::init_logging;
use site_mirror::{normalize_url, MirrorCommand, WebsiteMirror};

#[tokio::main]
async fn main() -> Result<()> {
    let args = MirrorCommand::parse();
    init_logging(args.verbose)?;

    normalize_url(&args.url).with_context(|| format!("Invalid start URL: {}", args.url))?;

    let config = args.to_config();
    let mirror = WebsiteMirror::new(config)?;

    let report = mirror
        .mirror_website(&args.url)
        .await
        .with_context(|| format!("Mirroring {} failed", args.url))?;

    if let Some(path) = &args.report {
        report.write_json(path)?;
    }

    println!(
        "✅ Website mirroring completed: {} files saved, {} failures. Files saved in: {}",
        report.page_count(),
        report.failure_count().to_string().yellow(),
        mirror.config().output_dir.display()
    );
    Ok(())
}
