use clap::builder::RangedU64ValueParser;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::MirrorConfig;

#[derive(Parser, Debug)]
#[command(
    name = "site-mirror",
    about = "A CLI utility to recursively mirror a website",
    version,
    long_about = "Downloads a page and, recursively, the same-host pages, images, scripts and stylesheets it links to. Links in saved pages are rewritten to point at the local copies."
)]
pub struct MirrorCommand {
    /// The URL to start mirroring from
    #[arg(required = true)]
    pub url: String,

    /// Output directory for the mirrored website
    #[arg(short, long, default_value = "./mirrored_site")]
    pub output_dir: PathBuf,

    /// Link-following depth (0 = only the start page)
    #[arg(short = 'r', long = "recursive", default_value = "0")]
    pub max_depth: usize,

    /// User agent string to use for requests
    #[arg(short, long, default_value = "SiteMirror/1.0")]
    pub user_agent: String,

    /// Timeout for each request in seconds
    #[arg(short, long, default_value = "30", value_parser = RangedU64ValueParser::<u64>::new().range(1..))]
    pub timeout: u64,

    /// Maximum concurrent downloads
    #[arg(short = 'c', long, default_value = "10", value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub max_concurrent: usize,

    /// Only print warnings and the final summary
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    pub verbose: bool,

    /// Write a JSON report of the crawl to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl MirrorCommand {
    pub fn to_config(&self) -> MirrorConfig {
        MirrorConfig {
            output_dir: self.output_dir.clone(),
            max_depth: self.max_depth,
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.timeout),
            max_concurrent: self.max_concurrent,
            quiet: self.quiet,
        }
    }
}
