use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use url::Url;

/// Normalized URLs claimed by one crawl.
///
/// Membership test and insertion happen under a single lock acquisition, so
/// two tasks discovering the same URL can never both claim it.
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: Mutex<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `url`. Returns `false` when another task already did.
    pub fn insert(&self, url: &Url) -> bool {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.as_str().to_string())
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url.as_str())
    }

    pub fn len(&self) -> usize {
        self.urls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_insert_claims_once() {
        let visited = VisitedSet::new();
        let url = Url::parse("http://example.com/about").unwrap();

        assert!(visited.is_empty());
        assert!(visited.insert(&url));
        assert!(!visited.insert(&url));
        assert!(visited.contains(&url));
        assert_eq!(visited.len(), 1);
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        let visited = Arc::new(VisitedSet::new());
        let winners = Arc::new(AtomicUsize::new(0));
        let url = Url::parse("http://example.com/shared").unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let visited = Arc::clone(&visited);
                let winners = Arc::clone(&winners);
                let url = url.clone();
                thread::spawn(move || {
                    if visited.insert(&url) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
