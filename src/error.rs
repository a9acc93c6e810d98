use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::fetcher::FetchError;

/// Failures a single crawl task can run into.
///
/// Every variant carries the URL or path it concerns so a warning line is
/// enough to diagnose the problem without any surrounding context.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("failed to save {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to rewrite links in {}: {source}", .path.display())]
    Rewrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("crawl task for {url} panicked: {reason}")]
    TaskPanicked { url: String, reason: String },
}

impl MirrorError {
    pub(crate) fn invalid_url(url: &str, reason: impl ToString) -> Self {
        MirrorError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Stable label used in crawl reports.
    pub fn kind(&self) -> &'static str {
        match self {
            MirrorError::InvalidUrl { .. } => "invalid_url",
            MirrorError::Fetch { .. } => "fetch_failure",
            MirrorError::Persist { .. } => "persist_failure",
            MirrorError::Parse { .. } => "parse_failure",
            MirrorError::Rewrite { .. } => "rewrite_failure",
            MirrorError::TaskPanicked { .. } => "task_panicked",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = MirrorError::invalid_url("/about", "missing host");
        assert_eq!(err.to_string(), "invalid URL \"/about\": missing host");
        assert_eq!(err.kind(), "invalid_url");

        let err = MirrorError::Persist {
            path: PathBuf::from("out/example.com/index.html"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("out/example.com/index.html"));
        assert_eq!(err.kind(), "persist_failure");
    }
}
