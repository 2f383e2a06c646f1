use crate::models::CacheEntry;
use chrono::{DateTime, Utc};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = instant;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let (Ok(mut now), Ok(delta)) = (self.now.lock(), chrono::Duration::from_std(by)) {
            if let Some(next) = now.checked_add_signed(delta) {
                *now = next;
            }
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// In-process cache whose entries go stale after a fixed TTL.
///
/// Stale entries are never evicted, only ignored by `get` and replaced by the
/// next `insert` for the same key.
pub struct TtlCache<T> {
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn get(&self, key: &str) -> Option<T> {
        let now = self.clock.now();
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(key)?;

        if self.is_fresh(entry, now) {
            debug!("Cache hit for '{key}'");
            Some(entry.data.clone())
        } else {
            debug!("Cache entry for '{key}' is stale");
            None
        }
    }

    pub fn insert(&self, key: impl Into<String>, data: T) {
        let entry = CacheEntry {
            data,
            timestamp: self.clock.now(),
        };
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.into(), entry);
        }
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_fresh(&self, entry: &CacheEntry<T>, now: DateTime<Utc>) -> bool {
        // A negative age (clock moved backwards) fails to_std and counts as stale.
        now.signed_duration_since(entry.timestamp)
            .to_std()
            .map(|age| age < self.ttl)
            .unwrap_or(false)
    }
}
