//! Bounded name → LUT cache with oldest-first eviction.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use super::info::{LutInfo, default_name};
use super::{Lut, LutFormat};
use crate::error::{GradeError, GradeResult};

/// Resolves LUT references by name. Grading operations look LUTs up
/// through this seam instead of holding them.
pub trait LutResolver: Send + Sync {
    fn resolve(&self, name: &str) -> GradeResult<Arc<Lut>>;
}

#[derive(Debug)]
struct Entry {
    lut: Arc<Lut>,
    info: LutInfo,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, Entry>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
    /// Set once an inconsistent entry is found; cleared only by `clear`.
    corrupted: Option<String>,
    /// Bumped by every change to the set of entries.
    generation: u64,
}

impl CacheState {
    fn check(&self) -> GradeResult<()> {
        match &self.corrupted {
            Some(reason) => Err(GradeError::CacheCorrupted(reason.clone())),
            None => Ok(()),
        }
    }

    fn mark_corrupted(&mut self, reason: String) -> GradeError {
        tracing::error!("LUT cache corrupted: {reason}");
        self.corrupted = Some(reason.clone());
        GradeError::CacheCorrupted(reason)
    }
}

#[derive(Debug)]
pub struct LutCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl LutCache {
    pub const DEFAULT_CAPACITY: usize = 32;

    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert or replace `name`. A replaced entry becomes the newest.
    pub fn insert(&self, name: impl Into<String>, lut: Lut) -> GradeResult<Arc<Lut>> {
        let name = name.into();
        let info = LutInfo::from_lut(name.clone(), &lut);
        self.insert_entry(name, lut, info)
    }

    fn insert_entry(&self, name: String, lut: Lut, info: LutInfo) -> GradeResult<Arc<Lut>> {
        let mut state = self.state.lock();
        state.check()?;

        let lut = Arc::new(lut);
        if state.entries.remove(&name).is_some() {
            state.order.retain(|n| n != &name);
        }
        state.entries.insert(name.clone(), Entry { lut: Arc::clone(&lut), info });
        state.order.push_back(name);
        state.generation += 1;

        while state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
                tracing::debug!("Evicted LUT '{oldest}'");
            }
        }
        if state.order.len() != state.entries.len() {
            let reason = format!(
                "{} ordered names for {} entries",
                state.order.len(),
                state.entries.len()
            );
            return Err(state.mark_corrupted(reason));
        }
        Ok(lut)
    }

    /// Load a file into the cache under `name` (the file stem by default).
    /// Returns the name used.
    pub fn load(&self, path: impl AsRef<Path>, name: Option<&str>) -> GradeResult<String> {
        let path = path.as_ref();
        self.state.lock().check()?;
        let format = LutFormat::from_path(path)?;
        let lut = super::load(path)?;
        let name = name.map(str::to_string).unwrap_or_else(|| default_name(path));
        let info = LutInfo::from_lut(name.clone(), &lut).with_source(path, format);
        self.insert_entry(name.clone(), lut, info)?;
        Ok(name)
    }

    /// Look up `name`. An entry whose data does not match its declared size
    /// poisons the cache until [`clear`](Self::clear).
    pub fn get(&self, name: &str) -> GradeResult<Option<Arc<Lut>>> {
        let mut state = self.state.lock();
        state.check()?;
        let Some(entry) = state.entries.get(name) else {
            return Ok(None);
        };
        if !entry.lut.is_consistent() {
            let reason = format!(
                "LUT '{name}' declares size {} but holds {} entries",
                entry.lut.size(),
                entry.lut.data().len()
            );
            return Err(state.mark_corrupted(reason));
        }
        tracing::debug!("LUT cache hit: '{name}'");
        Ok(Some(Arc::clone(&entry.lut)))
    }

    pub fn info(&self, name: &str) -> GradeResult<Option<LutInfo>> {
        let state = self.state.lock();
        state.check()?;
        Ok(state.entries.get(name).map(|e| e.info.clone()))
    }

    /// Returns whether `name` was present.
    pub fn unload(&self, name: &str) -> GradeResult<bool> {
        let mut state = self.state.lock();
        state.check()?;
        let removed = state.entries.remove(name).is_some();
        if removed {
            state.order.retain(|n| n != name);
            state.generation += 1;
            tracing::info!("Unloaded LUT '{name}'");
        }
        Ok(removed)
    }

    /// Names, oldest first.
    pub fn list(&self) -> GradeResult<Vec<String>> {
        let state = self.state.lock();
        state.check()?;
        Ok(state.order.iter().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Changes whenever an entry is inserted, replaced, evicted or removed.
    /// Results derived from cached LUTs are stale once this moves.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn is_corrupted(&self) -> bool {
        self.state.lock().corrupted.is_some()
    }

    /// Drop every entry and reset the corruption flag.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        *state = CacheState {
            generation: state.generation + 1,
            ..CacheState::default()
        };
        tracing::debug!("LUT cache cleared");
    }
}

impl Default for LutCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl LutResolver for LutCache {
    fn resolve(&self, name: &str) -> GradeResult<Arc<Lut>> {
        self.get(name)?
            .ok_or_else(|| GradeError::Configuration(format!("LUT '{name}' is not loaded")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lut::{Lut1D, Lut3D};

    fn identity() -> Lut {
        Lut::ThreeD(Lut3D::identity(2).unwrap())
    }

    #[test]
    fn test_oldest_is_evicted_first() {
        let cache = LutCache::new(2);
        cache.insert("a", identity()).unwrap();
        cache.insert("b", identity()).unwrap();
        cache.insert("c", identity()).unwrap();
        assert_eq!(cache.list().unwrap(), vec!["b", "c"]);
        assert!(cache.get("a").unwrap().is_none());
    }

    #[test]
    fn test_reinsert_moves_to_newest() {
        let cache = LutCache::new(2);
        cache.insert("a", identity()).unwrap();
        cache.insert("b", identity()).unwrap();
        cache.insert("a", identity()).unwrap();
        cache.insert("c", identity()).unwrap();
        assert_eq!(cache.list().unwrap(), vec!["a", "c"]);
    }

    #[test]
    fn test_unload() {
        let cache = LutCache::default();
        cache.insert("a", identity()).unwrap();
        assert!(cache.unload("a").unwrap());
        assert!(!cache.unload("a").unwrap());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_generation_moves_on_every_change() {
        let cache = LutCache::new(1);
        let start = cache.generation();
        cache.insert("a", identity()).unwrap();
        let inserted = cache.generation();
        assert!(inserted > start);

        cache.get("a").unwrap();
        cache.list().unwrap();
        assert_eq!(cache.generation(), inserted, "reads must not move the generation");

        cache.insert("b", identity()).unwrap();
        let evicted = cache.generation();
        assert!(evicted > inserted);
        assert!(!cache.unload("a").unwrap());
        assert_eq!(cache.generation(), evicted);
        assert!(cache.unload("b").unwrap());
        let unloaded = cache.generation();
        assert!(unloaded > evicted);
        cache.clear();
        assert!(cache.generation() > unloaded);
    }

    #[test]
    fn test_corruption_is_fatal_until_clear() {
        let cache = LutCache::default();
        let mut bad = Lut1D::identity(4).unwrap();
        bad.data.pop();
        cache.insert("bad", Lut::OneD(bad)).unwrap();
        cache.insert("good", identity()).unwrap();

        assert!(matches!(cache.get("bad"), Err(GradeError::CacheCorrupted(_))));
        assert!(matches!(cache.get("good"), Err(GradeError::CacheCorrupted(_))));
        assert!(matches!(cache.insert("x", identity()), Err(GradeError::CacheCorrupted(_))));

        cache.clear();
        assert!(!cache.is_corrupted());
        cache.insert("good", identity()).unwrap();
        assert!(cache.get("good").unwrap().is_some());
    }

    #[test]
    fn test_resolver_reports_missing() {
        let cache = LutCache::default();
        assert!(matches!(cache.resolve("none"), Err(GradeError::Configuration(_))));
    }

    #[test]
    fn test_load_from_file_uses_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("teal.cube");
        crate::lut::save(&identity(), &path).unwrap();
        let cache = LutCache::default();
        let name = cache.load(&path, None).unwrap();
        assert_eq!(name, "teal");
        let info = cache.info("teal").unwrap().unwrap();
        assert_eq!(info.format, Some(LutFormat::Cube));
        assert_eq!(info.path.as_deref(), Some(path.as_path()));
    }
}
