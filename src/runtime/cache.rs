//! Byte cache with per-entry expiry

use std::collections::BTreeMap;

use crate::core::error::{CivError, Result};

#[derive(Debug, Clone)]
struct Entry {
    blob: Vec<u8>,
    inserted_at: f64,
    expires_at: f64,
}

/// TTL cache bounded by total payload bytes.
///
/// Time is whatever clock the caller passes in (the simulation uses elapsed
/// simulation seconds), so behaviour is reproducible.
#[derive(Debug, Clone)]
pub struct TtlCache {
    entries: BTreeMap<String, Entry>,
    max_size: usize,
    current_size: usize,
    default_ttl: f64,
}

impl TtlCache {
    pub fn new(max_size: usize, default_ttl: f64) -> Self {
        Self {
            entries: BTreeMap::new(),
            max_size,
            current_size: 0,
            default_ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_size(&self) -> usize {
        self.current_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn set(&mut self, key: &str, blob: &[u8], now: f64) -> Result<()> {
        self.set_with_ttl(key, blob, self.default_ttl, now)
    }

    /// Insert or replace; fails when the cache would exceed `max_size`
    pub fn set_with_ttl(&mut self, key: &str, blob: &[u8], ttl: f64, now: f64) -> Result<()> {
        if ttl <= 0.0 || !ttl.is_finite() {
            return Err(CivError::InvalidArgument(format!("cache ttl {ttl}")));
        }
        let replaced = self.entries.get(key).map_or(0, |e| e.blob.len());
        let projected = self.current_size - replaced + blob.len();
        if projected > self.max_size {
            return Err(CivError::OutOfMemory(format!(
                "cache full: {} + {} > {} bytes",
                self.current_size - replaced,
                blob.len(),
                self.max_size
            )));
        }
        self.entries.insert(
            key.to_string(),
            Entry {
                blob: blob.to_vec(),
                inserted_at: now,
                expires_at: now + ttl,
            },
        );
        self.current_size = projected;
        Ok(())
    }

    /// Live value for `key`; expired entries read as `NotFound`
    pub fn get(&self, key: &str, now: f64) -> Result<&[u8]> {
        match self.entries.get(key) {
            Some(e) if now < e.expires_at => Ok(&e.blob),
            Some(_) => Err(CivError::NotFound(format!("cache entry '{key}' expired"))),
            None => Err(CivError::NotFound(format!("cache entry '{key}'"))),
        }
    }

    /// Age of a live entry
    pub fn age(&self, key: &str, now: f64) -> Option<f64> {
        self.entries
            .get(key)
            .filter(|e| now < e.expires_at)
            .map(|e| now - e.inserted_at)
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        let e = self
            .entries
            .remove(key)
            .ok_or_else(|| CivError::NotFound(format!("cache entry '{key}'")))?;
        self.current_size -= e.blob.len();
        Ok(())
    }

    /// Drop expired entries; returns how many went
    pub fn sweep(&mut self, now: f64) -> usize {
        let before = self.entries.len();
        let mut freed = 0;
        self.entries.retain(|_, e| {
            let live = now < e.expires_at;
            if !live {
                freed += e.blob.len();
            }
            live
        });
        self.current_size -= freed;
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_size = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_until_expiry() {
        let mut c = TtlCache::new(1024, 10.0);
        c.set("k", b"value", 0.0).unwrap();
        assert_eq!(c.get("k", 9.9).unwrap(), b"value");
        assert!(matches!(c.get("k", 10.0), Err(CivError::NotFound(_))));
    }

    #[test]
    fn test_update_in_place_tracks_size() {
        let mut c = TtlCache::new(16, 5.0);
        c.set("k", &[0; 10], 0.0).unwrap();
        c.set("k", &[1; 12], 1.0).unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c.current_size(), 12);
        assert!(c.set("j", &[0; 5], 1.0).is_err());
    }

    #[test]
    fn test_sweep_frees_space() {
        let mut c = TtlCache::new(64, 1.0);
        c.set("a", &[0; 8], 0.0).unwrap();
        c.set_with_ttl("b", &[0; 8], 10.0, 0.0).unwrap();
        assert_eq!(c.sweep(2.0), 1);
        assert_eq!(c.current_size(), 8);
        assert!(c.get("b", 2.0).is_ok());
    }

    #[test]
    fn test_invalid_ttl() {
        let mut c = TtlCache::new(64, 1.0);
        assert!(c.set_with_ttl("a", b"x", 0.0, 0.0).is_err());
    }
}
