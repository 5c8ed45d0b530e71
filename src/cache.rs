//! Explicit cache for fetched lists (vehicles, geozones).
//!
//! Lists fetched from the fleet API change rarely, so callers keep them between
//! report runs. The cache is an ordinary value owned by the caller and cleared
//! with [`ListCache::invalidate`]; nothing here is global.

use std::time::{Duration, Instant};

use log::debug;

/// A cached list with the time it was loaded.
#[derive(Debug, Clone)]
pub struct ListCache<T> {
    label: &'static str,
    entry: Option<(Vec<T>, Instant)>,
}

impl<T> ListCache<T> {
    /// Create an empty cache. `label` only appears in log lines.
    pub fn new(label: &'static str) -> Self {
        Self { label, entry: None }
    }

    /// Cached items, if loaded.
    pub fn get(&self) -> Option<&[T]> {
        self.entry.as_ref().map(|(items, _)| items.as_slice())
    }

    /// Replace the cached items.
    pub fn set(&mut self, items: Vec<T>) {
        debug!("[Cache] {}: stored {} items", self.label, items.len());
        self.entry = Some((items, Instant::now()));
    }

    /// Cached items, loading them with `loader` on a miss.
    ///
    /// A failed load leaves the cache empty and returns the error.
    pub fn get_or_try_load<E>(
        &mut self,
        loader: impl FnOnce() -> Result<Vec<T>, E>,
    ) -> Result<&[T], E> {
        if self.entry.is_none() {
            self.set(loader()?);
        }
        Ok(self.get().unwrap_or(&[]))
    }

    /// Forget the cached items.
    pub fn invalidate(&mut self) {
        if self.entry.take().is_some() {
            debug!("[Cache] {}: invalidated", self.label);
        }
    }

    /// True when nothing is cached or the items are older than `max_age`.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        match &self.entry {
            Some((_, loaded_at)) => loaded_at.elapsed() > max_age,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_once() {
        let mut cache: ListCache<u32> = ListCache::new("numbers");
        let mut calls = 0;

        for _ in 0..3 {
            let items = cache
                .get_or_try_load(|| {
                    calls += 1;
                    Ok::<_, String>(vec![1, 2, 3])
                })
                .unwrap();
            assert_eq!(items, &[1, 2, 3]);
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_failed_load_leaves_cache_empty() {
        let mut cache: ListCache<u32> = ListCache::new("numbers");
        let err = cache.get_or_try_load(|| Err("offline".to_string())).unwrap_err();
        assert_eq!(err, "offline");
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let mut cache = ListCache::new("names");
        cache.set(vec!["a".to_string()]);
        assert!(!cache.is_stale(Duration::from_secs(60)));

        cache.invalidate();
        assert!(cache.get().is_none());
        assert!(cache.is_stale(Duration::from_secs(60)));

        let items = cache
            .get_or_try_load(|| Ok::<_, ()>(vec!["b".to_string()]))
            .unwrap();
        assert_eq!(items, &["b".to_string()]);
    }

    #[test]
    fn test_zero_max_age_is_stale_after_load() {
        let mut cache = ListCache::new("names");
        cache.set(vec![1]);
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.is_stale(Duration::ZERO));
    }
}
