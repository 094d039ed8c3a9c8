//! Read-through cache of city records, keyed `city_<id>`.
//!
//! Values are stored as the JSON document the geocoding service returned and
//! never expire.

use std::{
    collections::BTreeMap,
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

use crate::{
    error::{CacheError, LoadError},
    geocode::CityLookup,
    model::{City, CityId},
};

pub fn cache_key(id: CityId) -> String {
    format!("city_{id}")
}

/// String key-value storage backing the city cache.
pub trait KeyValueStore: Send + Debug {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: String) -> Result<(), CacheError>;

    fn clear(&mut self) -> Result<(), CacheError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// All entries live in one JSON object on disk, rewritten on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`. A missing or unreadable file is an empty
    /// store; the next write replaces it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents).unwrap_or_else(|e| {
                    warn!(path = %path.display(), "Discarding corrupt city cache: {e}");
                    BTreeMap::new()
                })
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), entries = entries.len(), "Opened city cache");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;

        // Write beside the target, then swap it in.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), value);
        self.persist()
    }

    fn clear(&mut self) -> Result<(), CacheError> {
        self.entries.clear();
        self.persist()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug)]
pub struct CityCache<S> {
    store: S,
}

impl<S: KeyValueStore> CityCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Cached city, if any. An unreadable entry counts as a miss.
    pub fn get(&self, id: CityId) -> Option<City> {
        let raw = self.store.get(&cache_key(id))?;
        match serde_json::from_str(&raw) {
            Ok(city) => Some(city),
            Err(e) => {
                warn!(%id, "Discarding unreadable cache entry: {e}");
                None
            }
        }
    }

    pub fn put(&mut self, city: &City) -> Result<(), CacheError> {
        let value = serde_json::to_string(city)?;
        self.store.set(&cache_key(city.id), value)
    }

    /// Serve `id` from the cache, fetching and storing it on a miss.
    pub async fn get_or_fetch(
        &mut self,
        id: CityId,
        lookup: &dyn CityLookup,
    ) -> Result<City, LoadError> {
        if let Some(city) = self.get(id) {
            debug!(%id, "City cache hit");
            return Ok(city);
        }

        debug!(%id, "City cache miss");
        let city = lookup.city_by_id(id).await?;
        self.put(&city)?;
        Ok(city)
    }

    pub fn clear(&mut self) -> Result<(), CacheError> {
        self.store.clear()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeoError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn london() -> City {
        City {
            id: CityId(1),
            name: "London".into(),
            country: "UK".into(),
            country_code: "GB".into(),
            region: "England".into(),
            latitude: 51.5072,
            longitude: -0.1275,
            population: Some(8_908_081),
        }
    }

    #[derive(Debug, Default)]
    struct CountingLookup {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CityLookup for CountingLookup {
        async fn search(&self, _query: &str) -> Result<Vec<City>, GeoError> {
            Ok(vec![london()])
        }

        async fn city_by_id(&self, id: CityId) -> Result<City, GeoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if id == CityId(1) {
                Ok(london())
            } else {
                Err(GeoError::CityUnavailable { id, status: 404 })
            }
        }
    }

    #[tokio::test]
    async fn repeat_lookup_is_served_from_cache() {
        let lookup = CountingLookup::default();
        let mut cache = CityCache::new(MemoryStore::new());

        let first = cache.get_or_fetch(CityId(1), &lookup).await.expect("first fetch");
        let second = cache.get_or_fetch(CityId(1), &lookup).await.expect("cached fetch");

        assert_eq!(first, second);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let lookup = CountingLookup::default();
        let mut cache = CityCache::new(MemoryStore::new());

        assert!(cache.get_or_fetch(CityId(2), &lookup).await.is_err());
        assert!(cache.is_empty());
        assert!(cache.get_or_fetch(CityId(2), &lookup).await.is_err());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn corrupt_entry_is_refetched_and_overwritten() {
        let lookup = CountingLookup::default();
        let mut store = MemoryStore::new();
        store.set("city_1", "{not json".into()).expect("memory store never fails");
        let mut cache = CityCache::new(store);

        let city = cache.get_or_fetch(CityId(1), &lookup).await.expect("refetch");

        assert_eq!(city.name, "London");
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(CityId(1)), Some(london()));
    }

    #[test]
    fn entries_use_prefixed_keys() {
        let mut cache = CityCache::new(MemoryStore::new());
        cache.put(&london()).expect("memory store never fails");

        let raw = cache.store().get("city_1").expect("entry stored under city_1");
        assert!(raw.contains("\"countryCode\":\"GB\""));
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("cities.json");

        {
            let mut cache = CityCache::new(FileStore::open(&path).expect("open empty store"));
            cache.put(&london()).expect("write entry");
        }

        let cache = CityCache::new(FileStore::open(&path).expect("reopen store"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(CityId(1)), Some(london()));
    }

    #[test]
    fn clear_empties_file_store() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("cities.json");

        let mut cache = CityCache::new(FileStore::open(&path).expect("open empty store"));
        cache.put(&london()).expect("write entry");
        cache.clear().expect("clear");

        let reopened = FileStore::open(&path).expect("reopen store");
        assert!(reopened.is_empty());
    }

    #[test]
    fn corrupt_cache_file_opens_empty_and_can_be_cleared() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("cities.json");
        fs::write(&path, r#"{"city_1": "{\"id\":1"#).expect("write truncated file");

        let mut cache = CityCache::new(FileStore::open(&path).expect("corrupt file still opens"));
        assert!(cache.is_empty());

        cache.clear().expect("clear");
        let reopened = FileStore::open(&path).expect("reopen store");
        assert!(reopened.is_empty());
        assert_eq!(fs::read_to_string(&path).expect("read back").trim(), "{}");
    }

    #[test]
    fn persist_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("cities.json");

        let mut cache = CityCache::new(FileStore::open(&path).expect("open empty store"));
        cache.put(&london()).expect("write entry");

        let names: Vec<_> = fs::read_dir(dir.path())
            .expect("list dir")
            .map(|e| e.expect("dir entry").file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("cities.json")]);
    }
}
