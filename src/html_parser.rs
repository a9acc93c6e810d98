use std::collections::HashSet;
use std::fs;
use std::path::Path;

use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{parse_document, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use select::document::Document;
use select::predicate::Element;
use tracing::debug;
use url::Url;

use crate::error::MirrorError;
use crate::file_manager::{relative_link, FileManager};
use crate::url_utils::same_host;

/// Elements whose references are followed by the crawl.
const LINK_ELEMENTS: [&str; 4] = ["a", "img", "link", "script"];
const LINK_ATTRIBUTES: [&str; 2] = ["href", "src"];

/// Elements and attributes the rewriter points at local copies.
const REWRITE_ELEMENTS: [&str; 5] = ["a", "img", "link", "script", "form"];
const REWRITE_ATTRIBUTES: [&str; 3] = ["href", "src", "action"];

/// Pseudo-links that never name a fetchable resource.
const SKIPPED_PREFIXES: [&str; 4] = ["#", "mailto:", "tel:", "javascript:"];

/// A reference found while walking a parsed page.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRecord {
    pub element: String,
    pub attribute: &'static str,
    pub target: Url,
}

/// Link discovery and rewriting for one mirrored page.
#[derive(Debug, Clone)]
pub struct HtmlParser {
    base_url: Url,
}

impl HtmlParser {
    pub fn new(base_url: &Url) -> Self {
        Self {
            base_url: base_url.clone(),
        }
    }

    /// Resolve an attribute value against the page URL.
    ///
    /// `Ok(None)` means the reference is out of scope: a pseudo-link, a
    /// non-http scheme or another host.
    pub fn resolve_link(&self, raw: &str) -> Result<Option<Url>, url::ParseError> {
        let link = raw.trim();
        if link.is_empty() {
            return Ok(None);
        }

        let lower = link.to_ascii_lowercase();
        if SKIPPED_PREFIXES.iter().any(|prefix| lower.starts_with(prefix)) {
            return Ok(None);
        }

        let resolved = self.base_url.join(link)?;
        if !matches!(resolved.scheme(), "http" | "https") || !same_host(&resolved, &self.base_url) {
            return Ok(None);
        }

        Ok(Some(resolved))
    }

    /// Every in-scope reference in document order.
    pub fn link_records(&self, document: &Document) -> Vec<LinkRecord> {
        let mut records = Vec::new();

        for node in document.find(Element) {
            let Some(element) = node.name().filter(|name| LINK_ELEMENTS.contains(name)) else {
                continue;
            };
            for attribute in LINK_ATTRIBUTES {
                let Some(value) = node.attr(attribute) else {
                    continue;
                };
                // Malformed references are not worth failing the page over.
                if let Ok(Some(target)) = self.resolve_link(value) {
                    records.push(LinkRecord {
                        element: element.to_string(),
                        attribute,
                        target,
                    });
                }
            }
        }

        records
    }

    /// Parse a saved page and return the distinct in-scope links it
    /// references, first occurrence first.
    pub fn extract_links(&self, page_path: &Path) -> Result<Vec<Url>, MirrorError> {
        let file = fs::File::open(page_path).map_err(|source| MirrorError::Parse {
            path: page_path.to_path_buf(),
            source,
        })?;
        let document = Document::from_read(file).map_err(|source| MirrorError::Parse {
            path: page_path.to_path_buf(),
            source,
        })?;

        let mut seen = HashSet::new();
        let links = self
            .link_records(&document)
            .into_iter()
            .map(|record| record.target)
            .filter(|target| seen.insert(target.as_str().to_string()))
            .collect();

        Ok(links)
    }

    /// Point references at local copies that already exist under `files`,
    /// then write the page back in place. Returns how many attributes
    /// changed.
    pub fn rewrite_links(&self, page_path: &Path, files: &FileManager) -> Result<usize, MirrorError> {
        let rewrite_error = |source: std::io::Error| MirrorError::Rewrite {
            path: page_path.to_path_buf(),
            source,
        };

        let mut file = fs::File::open(page_path).map_err(rewrite_error)?;
        let dom = parse_document(RcDom::default(), ParseOpts::default())
            .from_utf8()
            .read_from(&mut file)
            .map_err(rewrite_error)?;
        drop(file);

        let mut rewritten = 0;
        self.rewrite_node(&dom.document, page_path, files, &mut rewritten);

        let mut output = Vec::new();
        let document: SerializableHandle = dom.document.clone().into();
        serialize(&mut output, &document, SerializeOpts::default()).map_err(rewrite_error)?;
        fs::write(page_path, output).map_err(rewrite_error)?;

        debug!(path = %page_path.display(), rewritten, "rewrote links");
        Ok(rewritten)
    }

    fn rewrite_node(&self, handle: &Handle, page_path: &Path, files: &FileManager, rewritten: &mut usize) {
        if let NodeData::Element { ref name, ref attrs, .. } = handle.data {
            if REWRITE_ELEMENTS.contains(&&*name.local) {
                for attr in attrs.borrow_mut().iter_mut() {
                    if !REWRITE_ATTRIBUTES.contains(&&*attr.name.local) {
                        continue;
                    }
                    if let Some(local) = self.local_reference(&attr.value, page_path, files) {
                        attr.value = StrTendril::from(local);
                        *rewritten += 1;
                    }
                }
            }
        }

        for child in handle.children.borrow().iter() {
            self.rewrite_node(child, page_path, files, rewritten);
        }
    }

    fn local_reference(&self, value: &str, page_path: &Path, files: &FileManager) -> Option<String> {
        let target = self.resolve_link(value).ok()??;
        let local_copy = files.existing_local_copy(&target)?;
        relative_link(page_path, &local_copy)
    }
}
