use anyhow::{Context, Result};
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::error::MirrorError;
use crate::fetcher::FetchError;

/// Owns the output root and decides where every mirrored URL lives on disk.
#[derive(Debug, Clone)]
pub struct FileManager {
    base_dir: PathBuf,
}

impl FileManager {
    pub fn new(base_dir: &Path) -> Result<Self> {
        let base_dir = base_dir.to_path_buf();
        fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create base directory: {:?}", base_dir))?;

        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Map a normalized URL to `base_dir/host/path`.
    ///
    /// Root and directory-style paths get `index.html`. HTML responses
    /// without an extension get `.html` appended so that `/about` and
    /// `/about/page` can coexist as `about.html` and `about/page.html`.
    /// `..` segments never climb above the host directory.
    pub fn local_path(&self, url: &Url, is_html: bool) -> PathBuf {
        let mut path = url.path().to_string();
        if path.is_empty() || path == "/" {
            path = "/index.html".to_string();
        } else if path.ends_with('/') {
            path.push_str("index.html");
        }

        if is_html && Path::new(&path).extension().is_none() {
            path.push_str(".html");
        }

        let mut local = self.base_dir.join(host_dir(url));
        let segments = clean_segments(&path);
        if segments.is_empty() {
            local.push("index.html");
        }
        for segment in segments {
            local.push(segment);
        }
        local
    }

    /// Where a link target would already be mirrored, if it is.
    ///
    /// The target's content type is unknown at this point, so the plain
    /// mapping is probed first and the HTML mapping second.
    pub fn existing_local_copy(&self, url: &Url) -> Option<PathBuf> {
        [false, true]
            .into_iter()
            .map(|is_html| self.local_path(url, is_html))
            .find(|candidate| candidate.is_file())
    }

    /// Stream a response body to `path`, creating parent directories.
    ///
    /// The body lands in a sibling `.part` file that is renamed onto `path`
    /// only once it is complete, so `path` is either absent or whole. On
    /// failure the `.part` file is removed and `path` is left untouched.
    pub async fn save_stream(
        &self,
        path: &Path,
        url: &Url,
        mut body: BoxStream<'static, Result<Bytes, FetchError>>,
    ) -> Result<u64, MirrorError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| persist_error(path, source))?;
        }

        let partial = partial_path(path);
        let mut file = tokio::fs::File::create(&partial)
            .await
            .map_err(|source| persist_error(path, source))?;

        let mut written = 0u64;
        let outcome = async {
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|source| MirrorError::Fetch {
                    url: url.to_string(),
                    source,
                })?;
                file.write_all(&chunk)
                    .await
                    .map_err(|source| persist_error(path, source))?;
                written += chunk.len() as u64;
            }
            file.flush().await.map_err(|source| persist_error(path, source))
        }
        .await;

        drop(file);
        let outcome = match outcome {
            Ok(()) => tokio::fs::rename(&partial, path)
                .await
                .map_err(|source| persist_error(path, source)),
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }

        Ok(written)
    }
}

/// `page.html` is written as `page.html.<n>.part` until complete. `n` keeps
/// concurrent saves of colliding URLs apart.
fn partial_path(path: &Path) -> PathBuf {
    static NEXT_SAVE: AtomicU64 = AtomicU64::new(0);

    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.part", NEXT_SAVE.fetch_add(1, Ordering::Relaxed)));
    path.with_file_name(name)
}

fn persist_error(path: &Path, source: std::io::Error) -> MirrorError {
    MirrorError::Persist {
        path: path.to_path_buf(),
        source,
    }
}

fn host_dir(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

fn clean_segments(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments
}

/// Relative link from the directory holding `from` to `to`, `/`-separated.
pub fn relative_link(from: &Path, to: &Path) -> Option<String> {
    let dir = from.parent()?;
    let relative = pathdiff::diff_paths(to, dir)?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    fn partial_files(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().map_or(false, |ext| ext == "part"))
            .collect()
    }

    #[test]
    fn test_root_maps_to_index() {
        let temp_dir = tempdir().unwrap();
        let files = FileManager::new(temp_dir.path()).unwrap();
        let root = temp_dir.path().join("example.com");

        assert_eq!(files.local_path(&url("http://example.com"), true), root.join("index.html"));
        assert_eq!(files.local_path(&url("http://example.com/"), false), root.join("index.html"));
        assert_eq!(
            files.local_path(&url("http://example.com/docs/"), true),
            root.join("docs").join("index.html")
        );
    }

    #[test]
    fn test_html_without_extension_gets_suffix() {
        let temp_dir = tempdir().unwrap();
        let files = FileManager::new(temp_dir.path()).unwrap();
        let root = temp_dir.path().join("example.com");

        assert_eq!(files.local_path(&url("http://example.com/about"), true), root.join("about.html"));
        assert_eq!(files.local_path(&url("http://example.com/about"), false), root.join("about"));
        assert_eq!(
            files.local_path(&url("http://example.com/about/page"), true),
            root.join("about").join("page.html")
        );
        assert_eq!(
            files.local_path(&url("http://example.com/static/app.js"), false),
            root.join("static").join("app.js")
        );
        assert_eq!(
            files.local_path(&url("http://example.com/page.php"), true),
            root.join("page.php")
        );
    }

    #[test]
    fn test_port_is_part_of_host_directory() {
        let temp_dir = tempdir().unwrap();
        let files = FileManager::new(temp_dir.path()).unwrap();

        assert_eq!(
            files.local_path(&url("http://127.0.0.1:8080/a.css"), false),
            temp_dir.path().join("127.0.0.1:8080").join("a.css")
        );
    }

    #[test]
    fn test_mapping_is_pure() {
        let temp_dir = tempdir().unwrap();
        let files = FileManager::new(temp_dir.path()).unwrap();

        for raw in ["http://example.com/", "http://example.com/a/b", "http://example.com/x.png"] {
            for is_html in [true, false] {
                assert_eq!(
                    files.local_path(&url(raw), is_html),
                    files.local_path(&url(raw), is_html)
                );
            }
        }
    }

    #[test]
    fn test_clean_segments_stays_inside_host() {
        assert_eq!(clean_segments("/a//b/./c"), vec!["a", "b", "c"]);
        assert_eq!(clean_segments("/a/../../b"), vec!["b"]);
        assert!(clean_segments("/../..").is_empty());
    }

    #[test]
    fn test_relative_link() {
        let root = Path::new("/out/example.com");
        assert_eq!(
            relative_link(&root.join("index.html"), &root.join("about.html")).as_deref(),
            Some("about.html")
        );
        assert_eq!(
            relative_link(&root.join("blog").join("post.html"), &root.join("img").join("a.png")).as_deref(),
            Some("../img/a.png")
        );
        assert_eq!(
            relative_link(&root.join("index.html"), &root.join("blog").join("post.html")).as_deref(),
            Some("blog/post.html")
        );
    }

    #[test]
    fn test_existing_local_copy_probes_both_mappings() {
        let temp_dir = tempdir().unwrap();
        let files = FileManager::new(temp_dir.path()).unwrap();
        let about = url("http://example.com/about");

        assert_eq!(files.existing_local_copy(&about), None);

        let html_copy = files.local_path(&about, true);
        fs::create_dir_all(html_copy.parent().unwrap()).unwrap();
        fs::write(&html_copy, "<p>about</p>").unwrap();
        assert_eq!(files.existing_local_copy(&about), Some(html_copy));
    }

    #[test]
    fn test_existing_local_copy_ignores_directories() {
        let temp_dir = tempdir().unwrap();
        let files = FileManager::new(temp_dir.path()).unwrap();

        let nested = files.local_path(&url("http://example.com/about/page"), true);
        fs::create_dir_all(nested.parent().unwrap()).unwrap();
        fs::write(&nested, "nested").unwrap();

        // `example.com/about` is now a directory, not a mirrored file.
        assert_eq!(files.existing_local_copy(&url("http://example.com/about")), None);
    }

    #[tokio::test]
    async fn test_save_stream_creates_directories() {
        let temp_dir = tempdir().unwrap();
        let files = FileManager::new(temp_dir.path()).unwrap();
        let target = url("http://example.com/assets/css/site.css");
        let path = files.local_path(&target, false);

        let body = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"body { ")),
            Ok(Bytes::from_static(b"color: red }")),
        ])
        .boxed();
        let written = files.save_stream(&path, &target, body).await.unwrap();

        assert_eq!(written, 19);
        assert_eq!(fs::read_to_string(&path).unwrap(), "body { color: red }");
    }

    #[tokio::test]
    async fn test_save_stream_removes_partial_file() {
        let temp_dir = tempdir().unwrap();
        let files = FileManager::new(temp_dir.path()).unwrap();
        let target = url("http://example.com/big.bin");
        let path = files.local_path(&target, false);

        let body = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(FetchError::Timeout(std::time::Duration::from_secs(1))),
        ])
        .boxed();
        let err = files.save_stream(&path, &target, body).await.unwrap_err();

        assert!(matches!(err, MirrorError::Fetch { .. }));
        assert!(!path.exists());
        assert!(partial_files(path.parent().unwrap()).is_empty());
    }

    #[tokio::test]
    async fn test_save_stream_hides_file_until_complete() {
        let temp_dir = tempdir().unwrap();
        let files = FileManager::new(temp_dir.path()).unwrap();
        let target = url("http://example.com/slow.bin");
        let path = files.local_path(&target, false);

        let (tx, rx) = futures::channel::mpsc::unbounded::<Result<Bytes, FetchError>>();
        tx.unbounded_send(Ok(Bytes::from_static(b"first "))).unwrap();
        let save = tokio::spawn({
            let files = files.clone();
            let path = path.clone();
            async move { files.save_stream(&path, &target, rx.boxed()).await }
        });

        let dir = temp_dir.path().join("example.com");
        for _ in 0..100 {
            if dir.is_dir() && !partial_files(&dir).is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(partial_files(&dir).len(), 1);
        assert!(!path.exists());
        assert_eq!(files.existing_local_copy(&url("http://example.com/slow.bin")), None);

        tx.unbounded_send(Ok(Bytes::from_static(b"second"))).unwrap();
        drop(tx);
        assert_eq!(save.await.unwrap().unwrap(), 12);
        assert_eq!(fs::read_to_string(&path).unwrap(), "first second");
        assert!(partial_files(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_existing_copy() {
        let temp_dir = tempdir().unwrap();
        let files = FileManager::new(temp_dir.path()).unwrap();
        let target = url("http://example.com/index.html");
        let path = files.local_path(&target, true);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "<p>complete</p>").unwrap();

        let body = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"<p>trunc")),
            Err(FetchError::Timeout(std::time::Duration::from_secs(1))),
        ])
        .boxed();
        files.save_stream(&path, &target, body).await.unwrap_err();

        assert_eq!(fs::read_to_string(&path).unwrap(), "<p>complete</p>");
    }

    #[test]
    fn test_partial_paths_are_unique_siblings() {
        let path = Path::new("/out/example.com/index.html");
        let first = partial_path(path);
        let second = partial_path(path);

        assert_ne!(first, second);
        assert_eq!(first.parent(), path.parent());
        assert!(first.to_string_lossy().ends_with(".part"));
    }
}
