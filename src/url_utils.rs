//! URL normalization shared by the crawl engine and the link rewriter.

use url::{ParseError, Url};

use crate::error::MirrorError;

/// Canonicalize a raw URL into the form used for dedup and path mapping.
///
/// A missing scheme defaults to `http`, the fragment and query are dropped
/// and a host is required. Normalizing an already normalized URL is a no-op.
pub fn normalize_url(raw: &str) -> Result<Url, MirrorError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MirrorError::invalid_url(raw, "missing host"));
    }

    let mut url = match Url::parse(trimmed) {
        Ok(url) => url,
        // Scheme-less input such as `example.com/a` or `//example.com/a`.
        // A bare path has no host to default to.
        Err(ParseError::RelativeUrlWithoutBase) if !is_bare_path(trimmed) => {
            let with_scheme = format!("http://{}", trimmed.trim_start_matches("//"));
            Url::parse(&with_scheme).map_err(|e| MirrorError::invalid_url(raw, e))?
        }
        Err(ParseError::RelativeUrlWithoutBase) => {
            return Err(MirrorError::invalid_url(raw, "missing host"));
        }
        Err(e) => return Err(MirrorError::invalid_url(raw, e)),
    };

    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(MirrorError::invalid_url(raw, "missing host")),
    }

    url.set_fragment(None);
    url.set_query(None);
    Ok(url)
}

fn is_bare_path(raw: &str) -> bool {
    raw.starts_with('/') && !raw.starts_with("//")
}

/// Host and explicit port, the unit the crawl never leaves.
pub fn same_host(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port() == b.port()
}
