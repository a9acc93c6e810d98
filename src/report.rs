//! Progress output during a crawl and the summary returned afterwards.

use std::fs;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::error::MirrorError;
use crate::fetcher::is_html_content_type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Html,
    Other,
}

impl ContentKind {
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        if is_html_content_type(content_type) {
            ContentKind::Html
        } else {
            ContentKind::Other
        }
    }

    pub fn is_html(self) -> bool {
        self == ContentKind::Html
    }
}

/// A response that has been written into the mirror.
#[derive(Debug, Clone, Serialize)]
pub struct MirroredPage {
    pub path: PathBuf,
    pub url: String,
    pub kind: ContentKind,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlFailure {
    pub url: String,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub start_url: String,
    pub max_depth: usize,
    pub pages: Vec<MirroredPage>,
    pub failures: Vec<CrawlFailure>,
}

impl CrawlReport {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize crawl report")?;
        fs::write(path, json).with_context(|| format!("Failed to write crawl report: {:?}", path))
    }
}

/// Collects pages and failures from concurrent tasks and prints them as
/// they happen.
pub(crate) struct CrawlReporter {
    progress: ProgressBar,
    quiet: bool,
    pages: Mutex<Vec<MirroredPage>>,
    failures: Mutex<Vec<CrawlFailure>>,
}

impl CrawlReporter {
    pub(crate) fn new(quiet: bool) -> Self {
        let progress = if quiet {
            ProgressBar::hidden()
        } else {
            let progress = ProgressBar::new_spinner();
            progress.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            progress.enable_steady_tick(Duration::from_millis(120));
            progress
        };

        Self {
            progress,
            quiet,
            pages: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fetching(&self, url: &str) {
        self.progress.set_message(format!("Downloading: {}", url));
    }

    pub(crate) fn saved(&self, page: MirroredPage) {
        if !self.quiet {
            self.progress.suspend(|| {
                println!("📥 Saved: {} -> {}", page.url.blue(), page.path.display());
            });
        }
        self.pages.lock().unwrap_or_else(PoisonError::into_inner).push(page);
    }

    pub(crate) fn failed(&self, url: &str, error: &MirrorError) {
        self.progress.suspend(|| {
            eprintln!("{} {}", "⚠️ ".yellow(), error.to_string().yellow());
        });
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CrawlFailure {
                url: url.to_string(),
                kind: error.kind(),
                message: error.to_string(),
            });
    }

    /// Stop the spinner and hand over everything collected so far.
    pub(crate) fn finish(&self, start_url: &str, max_depth: usize) -> CrawlReport {
        self.progress.finish_and_clear();
        CrawlReport {
            start_url: start_url.to_string(),
            max_depth,
            pages: mem::take(&mut *self.pages.lock().unwrap_or_else(PoisonError::into_inner)),
            failures: mem::take(&mut *self.failures.lock().unwrap_or_else(PoisonError::into_inner)),
        }
    }
}
