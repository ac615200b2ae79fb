use super::ClassifierResult;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Content-addressed store for classifier results
///
/// Always keeps an in-memory map; with a directory it also persists each
/// entry as `<key>.json`. Writes land in a unique temp file first and are
/// renamed into place, so concurrent writers of the same key never expose a
/// partial file. Every disk error degrades to a miss.
///
/// The in-memory map holds at most `capacity` entries and evicts the oldest
/// insertion first; disk entries are never evicted.
#[derive(Clone, Debug)]
pub struct ClassificationCache {
    memory: Arc<RwLock<MemoryEntries>>,
    dir: Option<PathBuf>,
}

pub const DEFAULT_MEMORY_CAPACITY: usize = 1024;

#[derive(Debug)]
struct MemoryEntries {
    capacity: usize,
    entries: HashMap<String, ClassifierResult>,
    order: VecDeque<String>,
}

impl MemoryEntries {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, key: &str) -> Option<&ClassifierResult> {
        self.entries.get(key)
    }

    fn insert(&mut self, key: &str, result: ClassifierResult) {
        if self.entries.insert(key.to_string(), result).is_some() {
            return;
        }
        self.order.push_back(key.to_string());
        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

impl Default for ClassificationCache {
    fn default() -> Self {
        Self {
            memory: Arc::new(RwLock::new(MemoryEntries::new(DEFAULT_MEMORY_CAPACITY))),
            dir: None,
        }
    }
}

impl ClassificationCache {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Bounds the in-memory map; existing entries are dropped
    pub fn with_memory_capacity(mut self, capacity: usize) -> Self {
        self.memory = Arc::new(RwLock::new(MemoryEntries::new(capacity)));
        self
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// SHA-256 over the summary, the sorted label set and the model id
    pub fn key(summary: &str, labels: &[String], model: &str) -> String {
        let mut sorted: Vec<&str> = labels.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut hasher = Sha256::new();
        hasher.update(summary.as_bytes());
        hasher.update([0u8]);
        hasher.update(sorted.join("\n").as_bytes());
        hasher.update([0u8]);
        hasher.update(model.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<ClassifierResult> {
        if let Some(hit) = self.memory.read().ok()?.get(key).cloned() {
            return Some(hit);
        }

        let path = self.entry_path(key)?;
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<ClassifierResult>(&content) {
            Ok(result) => {
                debug!("Classifier cache hit on disk: {}", path.display());
                if let Ok(mut memory) = self.memory.write() {
                    memory.insert(key, result.clone());
                }
                Some(result)
            }
            Err(e) => {
                warn!("Ignoring corrupt cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn insert(&self, key: &str, result: &ClassifierResult) {
        if let Ok(mut memory) = self.memory.write() {
            memory.insert(key, result.clone());
        }

        if let Some(path) = self.entry_path(key) {
            if let Err(e) = write_atomic(&path, result) {
                warn!("Failed to persist cache entry {}: {}", path.display(), e);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.memory.read().map(|m| m.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry_path(&self, key: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(format!("{}.json", key)))
    }
}

fn write_atomic(path: &Path, result: &ClassifierResult) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let tmp = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
    let body = serde_json::to_vec_pretty(result)?;
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&body)?;
        file.sync_all()?;
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}
