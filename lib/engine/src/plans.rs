use dashmap::DashMap;

/// The stateful-mode continuation store.
///
/// Implementations must be thread-safe and give resumption *exclusive
/// take* semantics: of two concurrent `take` calls for the same id, one
/// receives the token and the other a miss. The engine re-saves under the
/// same id on the next suspension, so a lineage keeps a single id for its
/// whole life and the entry disappears on completion.
pub trait SavedPlanStore: Send + Sync {
    fn save(&self, id: &str, token: String);

    /// Removes and returns the token saved under `id`.
    fn take(&self, id: &str) -> Option<String>;

    fn delete(&self, id: &str);
}

/// The default in-process store.
#[derive(Debug, Default)]
pub struct InMemoryPlanStore {
    plans: DashMap<String, String>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

impl SavedPlanStore for InMemoryPlanStore {
    fn save(&self, id: &str, token: String) {
        self.plans.insert(id.to_owned(), token);
    }

    fn take(&self, id: &str) -> Option<String> {
        self.plans.remove(id).map(|(_, token)| token)
    }

    fn delete(&self, id: &str) {
        self.plans.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_is_exclusive() {
        let store = InMemoryPlanStore::new();
        store.save("a", "plan".to_owned());
        assert_eq!(store.take("a"), Some("plan".to_owned()));
        assert_eq!(store.take("a"), None);
    }

    #[test]
    fn save_overwrites() {
        let store = InMemoryPlanStore::new();
        store.save("a", "one".to_owned());
        store.save("a", "two".to_owned());
        assert_eq!(store.take("a"), Some("two".to_owned()));
    }

    #[test]
    fn delete_removes() {
        let store = InMemoryPlanStore::new();
        store.save("a", "plan".to_owned());
        store.delete("a");
        assert!(store.is_empty());
    }
}
