use anyhow::Result;
use colored::*;
use futures::future::{BoxFuture, FutureExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use url::Url;

use crate::config::MirrorConfig;
use crate::error::MirrorError;
use crate::fetcher::{Fetch, HttpFetcher};
use crate::file_manager::FileManager;
use crate::html_parser::HtmlParser;
use crate::report::{ContentKind, CrawlReport, CrawlReporter, MirroredPage};
use crate::url_utils::normalize_url;
use crate::visited::VisitedSet;

/// A URL waiting to be mirrored, and how many hops it is from the start page.
#[derive(Debug, Clone)]
pub struct CrawlTask {
    pub url: String,
    pub depth: usize,
}

pub struct WebsiteMirror {
    config: MirrorConfig,
    fetcher: Arc<dyn Fetch>,
    file_manager: FileManager,
}

/// State shared by every task of one top-level crawl.
struct CrawlContext {
    fetcher: Arc<dyn Fetch>,
    file_manager: FileManager,
    visited: VisitedSet,
    semaphore: Semaphore,
    reporter: CrawlReporter,
    max_depth: usize,
}

impl WebsiteMirror {
    pub fn new(config: MirrorConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.user_agent, config.timeout)?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Mirror through a caller-supplied transport.
    pub fn with_fetcher(config: MirrorConfig, fetcher: Arc<dyn Fetch>) -> Result<Self> {
        let file_manager = FileManager::new(&config.output_dir)?;

        Ok(Self {
            config,
            fetcher,
            file_manager,
        })
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Crawl from `start_url` down to the configured depth.
    ///
    /// Only a failure of the start page itself is returned as an error.
    /// Anything that goes wrong further down is reported and recorded in
    /// the returned [`CrawlReport`].
    pub async fn mirror_website(&self, start_url: &str) -> Result<CrawlReport, MirrorError> {
        if !self.config.quiet {
            println!("🚀 Starting website mirroring for: {}", start_url.blue());
            println!("📁 Output directory: {:?}", self.file_manager.base_dir());
            println!("🔗 Max depth: {}", self.config.max_depth);
            println!("⚡ Max concurrent downloads: {}", self.config.max_concurrent);
        }

        let context = Arc::new(CrawlContext {
            fetcher: Arc::clone(&self.fetcher),
            file_manager: self.file_manager.clone(),
            visited: VisitedSet::new(),
            semaphore: Semaphore::new(self.config.max_concurrent.max(1)),
            reporter: CrawlReporter::new(self.config.quiet),
            max_depth: self.config.max_depth,
        });

        let root = CrawlTask {
            url: start_url.to_string(),
            depth: 0,
        };
        let outcome = crawl(Arc::clone(&context), root).await;
        let report = context.reporter.finish(start_url, self.config.max_depth);

        outcome.map(|_| report)
    }
}

/// Run one task to completion, including every descendant it spawns.
fn crawl(context: Arc<CrawlContext>, task: CrawlTask) -> BoxFuture<'static, Result<(), MirrorError>> {
    async move {
        let url = normalize_url(&task.url)?;
        if !context.visited.insert(&url) {
            debug!(%url, "already visited");
            return Ok(());
        }

        let page = context.fetch_and_save(&url).await?;
        let kind = page.kind;
        let path = page.path.clone();
        context.reporter.saved(page);

        if kind != ContentKind::Html {
            return Ok(());
        }

        let parser = HtmlParser::new(&url);
        if task.depth < context.max_depth {
            match parser.extract_links(&path) {
                Ok(links) => context.fan_out(links, task.depth + 1).await,
                Err(e) => context.reporter.failed(url.as_str(), &e),
            }
        }

        // Runs after the children joined so that their copies are on disk.
        if let Err(e) = parser.rewrite_links(&path, &context.file_manager) {
            context.reporter.failed(url.as_str(), &e);
        }

        Ok(())
    }
    .boxed()
}

impl CrawlContext {
    async fn fetch_and_save(&self, url: &Url) -> Result<MirroredPage, MirrorError> {
        // The semaphore is never closed.
        let _permit = self.semaphore.acquire().await.ok();
        self.reporter.fetching(url.as_str());

        let response = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|source| MirrorError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let kind = ContentKind::from_content_type(response.content_type.as_deref());
        let path = self.file_manager.local_path(url, kind.is_html());
        let bytes = self.file_manager.save_stream(&path, url, response.body).await?;

        Ok(MirroredPage {
            path,
            url: url.to_string(),
            kind,
            bytes,
        })
    }

    /// Crawl every link concurrently and wait for all of them.
    async fn fan_out(self: &Arc<Self>, links: Vec<Url>, depth: usize) {
        let mut children = JoinSet::new();
        for link in links {
            let task = CrawlTask {
                url: link.to_string(),
                depth,
            };
            let url = task.url.clone();
            let child = AssertUnwindSafe(crawl(Arc::clone(self), task))
                .catch_unwind()
                .map(move |caught| {
                    let outcome = caught.unwrap_or_else(|payload| {
                        Err(MirrorError::TaskPanicked {
                            url: url.clone(),
                            reason: panic_message(&*payload),
                        })
                    });
                    (url, outcome)
                });
            children.spawn(child);
        }

        while let Some(joined) = children.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((url, Err(e))) => self.reporter.failed(&url, &e),
                Err(e) => warn!(error = %e, "crawl task aborted"),
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
