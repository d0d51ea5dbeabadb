use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::Arc,
};

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::RwLock;

const STRINGS_FILE: &str = "_strings.bin";
const SETS_FILE: &str = "_sets.bin";

#[derive(Archive, RkyvSerialize, RkyvDeserialize)]
struct KeyStorage(String);

type Strings = HashMap<String, String>;
type Sets = HashMap<String, HashSet<String>>;

fn load_from_dir<T: DeserializeOwned + Default>(dir: &Path, file_name: &str) -> T {
    let path = dir.join(file_name);
    if !path.exists() {
        return T::default();
    }

    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(error = ?err, path = %path.display(), "failed to read storage file");
            return T::default();
        }
    };
    let storage = match rkyv::from_bytes::<KeyStorage, rkyv::rancor::Error>(&bytes) {
        Ok(storage) => storage,
        Err(err) => {
            tracing::warn!(error = ?err, path = %path.display(), "failed to parse storage file");
            return T::default();
        }
    };
    match serde_json::from_str(&storage.0) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = ?err, path = %path.display(), "failed to decode storage file");
            T::default()
        }
    }
}

async fn persist_to_disk<T: Serialize>(
    dir: &Path,
    file_name: &str,
    value: &T,
) -> anyhow::Result<()> {
    if let Err(err) = tokio::fs::create_dir_all(dir).await {
        tracing::error!(error = ?err, path = %dir.display(), "failed to create storage directory");
        return Err(err.into());
    }

    let path = dir.join(file_name);
    let temp_path = dir.join(format!("{}.tmp", file_name));
    let json = serde_json::to_string(value)?;
    let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&KeyStorage(json))?;

    tokio::fs::write(&temp_path, bytes).await?;
    tokio::fs::rename(&temp_path, &path).await?;

    Ok(())
}

/// In-process string and set store with optional file persistence.
pub struct BuiltinKvStore {
    strings: Arc<RwLock<Strings>>,
    sets: Arc<RwLock<Sets>>,
    file_store_dir: Option<PathBuf>,
    dirty: Arc<RwLock<HashSet<&'static str>>>,
    handler: Option<tokio::task::JoinHandle<()>>,
}

impl BuiltinKvStore {
    pub fn new(config: Option<Value>) -> Self {
        tracing::debug!("Initializing KvStore with config: {:?}", config);
        let store_method = config
            .as_ref()
            .and_then(|cfg| cfg.get("store_method").and_then(|v| v.as_str()))
            .unwrap_or("in_memory")
            .to_string();

        let file_path = config
            .as_ref()
            .and_then(|cfg| cfg.get("file_path").and_then(|v| v.as_str()))
            .unwrap_or("tabs_data")
            .to_string();

        let interval = config
            .as_ref()
            .and_then(|cfg| cfg.get("save_interval_ms").and_then(|v| v.as_u64()))
            .unwrap_or(5000);

        let file_store_dir = match store_method.as_str() {
            "file_based" => {
                let dir = PathBuf::from(&file_path);
                if let Err(err) = std::fs::create_dir_all(&dir) {
                    tracing::error!(
                        error = ?err,
                        path = %dir.display(),
                        "failed to create storage directory"
                    );
                }
                Some(dir)
            }
            "in_memory" => None,
            other => {
                tracing::warn!(
                    store_method = %other,
                    "Unknown store_method, defaulting to in_memory"
                );
                None
            }
        };

        let (strings, sets): (Strings, Sets) = match &file_store_dir {
            Some(dir) => (load_from_dir(dir, STRINGS_FILE), load_from_dir(dir, SETS_FILE)),
            None => (HashMap::new(), HashMap::new()),
        };

        let strings = Arc::new(RwLock::new(strings));
        let sets = Arc::new(RwLock::new(sets));
        let dirty = Arc::new(RwLock::new(HashSet::new()));
        let handler = file_store_dir.clone().map(|dir| {
            let strings = Arc::clone(&strings);
            let sets = Arc::clone(&sets);
            let dirty = Arc::clone(&dirty);
            tokio::spawn(async move {
                Self::save_loop(strings, sets, dirty, interval, dir).await;
            })
        });

        Self {
            strings,
            sets,
            file_store_dir,
            dirty,
            handler,
        }
    }

    async fn save_loop(
        strings: Arc<RwLock<Strings>>,
        sets: Arc<RwLock<Sets>>,
        dirty: Arc<RwLock<HashSet<&'static str>>>,
        polling_interval: u64,
        dir: PathBuf,
    ) {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_millis(polling_interval));
        loop {
            interval.tick().await;
            let batch = {
                let mut dirty = dirty.write().await;
                if dirty.is_empty() {
                    continue;
                }
                dirty.drain().collect::<Vec<_>>()
            };

            for file_name in batch {
                let result = if file_name == STRINGS_FILE {
                    let snapshot = strings.read().await.clone();
                    persist_to_disk(&dir, file_name, &snapshot).await
                } else {
                    let snapshot = sets.read().await.clone();
                    persist_to_disk(&dir, file_name, &snapshot).await
                };

                if let Err(err) = result {
                    tracing::error!(error = ?err, file = %file_name, "failed to persist storage");
                    dirty.write().await.insert(file_name);
                }
            }
        }
    }

    async fn mark_dirty(&self, file_name: &'static str) {
        if self.file_store_dir.is_some() {
            self.dirty.write().await.insert(file_name);
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.strings.read().await.get(key).cloned()
    }

    pub async fn set(&self, key: &str, value: String) -> Option<String> {
        let old_value = self.strings.write().await.insert(key.to_string(), value);
        self.mark_dirty(STRINGS_FILE).await;
        old_value
    }

    /// Removes `key` whether it holds a string or a set. Returns whether anything was removed.
    pub async fn delete(&self, key: &str) -> bool {
        let removed_string = self.strings.write().await.remove(key).is_some();
        let removed_set = self.sets.write().await.remove(key).is_some();

        if removed_string {
            self.mark_dirty(STRINGS_FILE).await;
        }
        if removed_set {
            self.mark_dirty(SETS_FILE).await;
        }

        removed_string || removed_set
    }

    /// Adds `member` to the set at `key`. Returns `true` if it was not already present.
    pub async fn sadd(&self, key: &str, member: String) -> bool {
        let added = {
            let mut sets = self.sets.write().await;
            sets.entry(key.to_string()).or_default().insert(member)
        };
        if added {
            self.mark_dirty(SETS_FILE).await;
        }
        added
    }

    pub async fn srem(&self, key: &str, member: &str) -> bool {
        let removed = {
            let mut sets = self.sets.write().await;
            let Some(set) = sets.get_mut(key) else {
                return false;
            };
            let removed = set.remove(member);
            if set.is_empty() {
                sets.remove(key);
            }
            removed
        };
        if removed {
            self.mark_dirty(SETS_FILE).await;
        }
        removed
    }

    pub async fn sismember(&self, key: &str, member: &str) -> bool {
        let sets = self.sets.read().await;
        sets.get(key).is_some_and(|set| set.contains(member))
    }

    pub async fn smembers(&self, key: &str) -> HashSet<String> {
        let sets = self.sets.read().await;
        sets.get(key).cloned().unwrap_or_default()
    }

    /// Members of every set in `keys`, in order, read under a single lock.
    /// Absent keys yield an empty set.
    pub async fn smembers_all(&self, keys: &[String]) -> Vec<HashSet<String>> {
        let sets = self.sets.read().await;
        keys.iter()
            .map(|key| sets.get(key).cloned().unwrap_or_default())
            .collect()
    }

    pub async fn list_keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let strings = self.strings.read().await;
        let sets = self.sets.read().await;
        let mut keys: Vec<String> = strings
            .keys()
            .chain(sets.keys())
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Deletes every key starting with `prefix`. Returns the number of keys removed.
    pub async fn delete_by_prefix(&self, prefix: &str) -> usize {
        let removed_strings = {
            let mut strings = self.strings.write().await;
            let before = strings.len();
            strings.retain(|k, _| !k.starts_with(prefix));
            before - strings.len()
        };
        let removed_sets = {
            let mut sets = self.sets.write().await;
            let before = sets.len();
            sets.retain(|k, _| !k.starts_with(prefix));
            before - sets.len()
        };

        if removed_strings > 0 {
            self.mark_dirty(STRINGS_FILE).await;
        }
        if removed_sets > 0 {
            self.mark_dirty(SETS_FILE).await;
        }

        removed_strings + removed_sets
    }

    /// Stops the background save loop, if any.
    pub fn shutdown(&self) {
        if let Some(handler) = &self.handler {
            handler.abort();
        }
    }
}

impl Drop for BuiltinKvStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}
