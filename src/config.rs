use std::path::PathBuf;
use std::time::Duration;

/// Settings for one mirror run.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub output_dir: PathBuf,
    /// Link hops followed from the start page. 0 fetches the start page only.
    pub max_depth: usize,
    pub user_agent: String,
    /// Applies to each request including its body.
    pub timeout: Duration,
    /// Upper bound on simultaneous fetch-and-save operations.
    pub max_concurrent: usize,
    /// Suppress per-page progress lines and the spinner. Warnings still print.
    pub quiet: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./mirrored_site"),
            max_depth: 0,
            user_agent: "SiteMirror/1.0".to_string(),
            timeout: Duration::from_secs(30),
            max_concurrent: 10,
            quiet: false,
        }
    }
}
