use std::sync::RwLock;

/// In-memory ordered snippet collection.
///
/// Append-only for the life of the process. Insertion order is meaningful:
/// the retriever breaks score ties by position, and the first snippet is the
/// fallback when nothing matches. Callers seed at least one snippet
/// (`StoreConfig::effective_seeds` guarantees a non-empty list).
#[derive(Debug)]
pub struct SnippetStore {
    snippets: RwLock<Vec<String>>,
}

impl SnippetStore {
    pub fn new(seeds: Vec<String>) -> Self {
        Self {
            snippets: RwLock::new(seeds),
        }
    }

    /// Appends a snippet and returns the new total count.
    pub fn append(&self, text: String) -> usize {
        let mut snippets = self
            .snippets
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        snippets.push(text);
        snippets.len()
    }

    /// Copies the current snippet list in insertion order. Scoring runs on
    /// the copy so the lock is never held across async work.
    pub fn snapshot(&self) -> Vec<String> {
        self.snippets
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.snippets
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_returns_running_count() {
        let store = SnippetStore::new(vec!["one".to_string()]);
        assert_eq!(store.append("two".to_string()), 2);
        assert_eq!(store.append("three".to_string()), 3);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_snapshot_preserves_insertion_order() {
        let store = SnippetStore::new(vec!["a".to_string(), "b".to_string()]);
        store.append("c".to_string());
        assert_eq!(store.snapshot(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_concurrent_appends_all_land() {
        let store = std::sync::Arc::new(SnippetStore::new(vec!["seed".to_string()]));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store.append(format!("snippet {i}"));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 9);
    }
}
