pub mod cli;
pub mod config;
pub mod downloader;
pub mod error;
pub mod fetcher;
pub mod file_manager;
pub mod html_parser;
pub mod logging;
pub mod report;
pub mod url_utils;
pub mod visited;

// Re-export main types for convenience
pub use cli::MirrorCommand;
pub use config::MirrorConfig;
pub use downloader::{CrawlTask, WebsiteMirror};
pub use error::MirrorError;
pub use fetcher::{Fetch, FetchError, FetchResponse, HttpFetcher};
pub use file_manager::FileManager;
pub use html_parser::{HtmlParser, LinkRecord};
pub use report::{ContentKind, CrawlFailure, CrawlReport, MirroredPage};
pub use url_utils::normalize_url;
pub use visited::VisitedSet;
