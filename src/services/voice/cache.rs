use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

/// Stable key for a (description, preview) pair; whitespace runs are collapsed first.
pub fn cache_key(description: &str, preview_text: &str) -> String {
    let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
    let raw = format!("{}||{}", normalize(description), normalize(preview_text));
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Bounded least-recently-used map from cache key to voice id.
///
/// Insertion order of the map is recency order: index 0 is the oldest entry.
#[derive(Debug)]
pub struct VoiceCache {
    capacity: usize,
    entries: Mutex<IndexMap<String, String>>,
}

impl VoiceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(IndexMap::with_capacity(capacity)),
        }
    }

    /// Looks up `key` and marks it most recently used.
    pub async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        let voice_id = entries.shift_remove(key)?;
        entries.insert(key.to_string(), voice_id.clone());
        Some(voice_id)
    }

    pub async fn insert(&self, key: String, voice_id: String) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().await;
        entries.shift_remove(&key);
        entries.insert(key, voice_id);
        while entries.len() > self.capacity {
            entries.shift_remove_index(0);
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
