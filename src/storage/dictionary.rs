use dashmap::DashMap;
use fxhash::FxHashSet;
use parking_lot::RwLock;

use crate::data::{SeriesFilter, SeriesMask};

/// Interns series ids as dense `u32` keys so shards store 4 bytes per row
/// instead of a string.
#[derive(Debug, Default)]
pub struct SeriesDictionary {
    /// Series id to key (for encoding)
    keys: DashMap<String, u32>,
    /// Key to series id (for decoding); index is the key
    names: RwLock<Vec<String>>,
}

impl SeriesDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or assign the key for a series id
    pub fn intern(&self, series_id: &str) -> u32 {
        // Fast path: already known
        if let Some(key) = self.keys.get(series_id) {
            return *key;
        }

        // The entry lock serializes concurrent first inserts of the same id
        *self
            .keys
            .entry(series_id.to_string())
            .or_insert_with(|| {
                let mut names = self.names.write();
                let key = names.len() as u32;
                names.push(series_id.to_string());
                key
            })
            .value()
    }

    /// Key for a series id, without inserting
    pub fn lookup(&self, series_id: &str) -> Option<u32> {
        self.keys.get(series_id).map(|k| *k)
    }

    /// Series id for a key
    pub fn resolve(&self, key: u32) -> Option<String> {
        self.names.read().get(key as usize).cloned()
    }

    /// Translate a filter into the keys a scan should read. Ids never seen by
    /// the store simply contribute nothing.
    pub fn mask_for(&self, filter: &SeriesFilter) -> SeriesMask {
        if filter.is_all() {
            return SeriesMask::All;
        }

        let keys: FxHashSet<u32> = filter.ids().filter_map(|id| self.lookup(id)).collect();
        SeriesMask::Only(keys)
    }

    /// Every interned series id, sorted
    pub fn sorted_names(&self) -> Vec<String> {
        let mut names = self.names.read().clone();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern() {
        let dict = SeriesDictionary::new();

        let a = dict.intern("temp_1");
        let b = dict.intern("temp_2");
        let a_again = dict.intern("temp_1");

        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn test_resolve_and_lookup() {
        let dict = SeriesDictionary::new();

        assert_eq!(dict.lookup("missing"), None);

        let key = dict.intern("pressure");
        assert_eq!(dict.lookup("pressure"), Some(key));
        assert_eq!(dict.resolve(key), Some("pressure".to_string()));
        assert_eq!(dict.resolve(999), None);
    }

    #[test]
    fn test_mask_for_filter() {
        let dict = SeriesDictionary::new();
        let x = dict.intern("x");
        dict.intern("y");

        assert!(matches!(dict.mask_for(&SeriesFilter::all()), SeriesMask::All));

        let mask = dict.mask_for(&SeriesFilter::parse("x,unknown"));
        assert!(mask.contains(x));
        assert!(!mask.contains(dict.intern("y")));

        assert!(dict.mask_for(&SeriesFilter::parse("nope")).is_empty());
    }

    #[test]
    fn test_sorted_names() {
        let dict = SeriesDictionary::new();
        for name in ["b", "a", "c"] {
            dict.intern(name);
        }
        assert_eq!(dict.sorted_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let dict = Arc::new(SeriesDictionary::new());
        let mut handles = vec![];

        for i in 0..10 {
            let dict = Arc::clone(&dict);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    // Overlapping ids across threads
                    dict.intern(&format!("sensor_{}", (i * 50 + j) % 500));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(dict.len(), 500);
        for key in 0..500u32 {
            let name = dict.resolve(key).unwrap();
            assert_eq!(dict.lookup(&name), Some(key));
        }
    }
}
