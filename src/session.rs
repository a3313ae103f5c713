//! Pending-text store for interactive callers.
//!
//! A chat front-end receives text in one message and the format choice in
//! a later one. [`SessionStore`] holds the most recent text per requester in
//! between. Entries expire after a TTL and the store never holds more than
//! `capacity` entries, so abandoned sessions cannot grow it without bound.
//!
//! The store is passed by reference (typically inside an `Arc`); there is
//! no global instance.

use crate::error::Txt2DocError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

/// Requester identifier (a chat user id).
pub type RequesterId = i64;

const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);
const DEFAULT_CAPACITY: usize = 1024;

struct Entry {
    text: String,
    submitted: Instant,
}

/// Thread-safe map of requester → most recently submitted text.
pub struct SessionStore {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<RequesterId, Entry>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl SessionStore {
    /// `capacity` is clamped to at least 1.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Poisoning only means another thread panicked mid-operation; the map
    /// itself is always consistent, so keep using it.
    fn lock(&self) -> MutexGuard<'_, HashMap<RequesterId, Entry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `text` for `requester`, replacing anything pending.
    pub fn submit(&self, requester: RequesterId, text: impl Into<String>) {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.remove(&requester);

        let expired = Self::purge(&mut entries, self.ttl, now);
        if expired > 0 {
            debug!("Evicted {} expired session(s)", expired);
        }

        while entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.submitted)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    entries.remove(&id);
                    debug!("Session store full, evicted requester {}", id);
                }
                None => break,
            }
        }

        entries.insert(
            requester,
            Entry {
                text: text.into(),
                submitted: now,
            },
        );
    }

    /// The pending text for `requester`, unless absent or expired.
    pub fn get(&self, requester: RequesterId) -> Option<String> {
        let mut entries = self.lock();
        let expired = match entries.get(&requester) {
            None => return None,
            Some(e) => e.submitted.elapsed() > self.ttl,
        };
        if expired {
            entries.remove(&requester);
            debug!("Session for requester {} expired", requester);
            return None;
        }
        entries.get(&requester).map(|e| e.text.clone())
    }

    /// Like [`SessionStore::get`], but a missing entry is an error the
    /// caller can show to the user.
    pub fn require(&self, requester: RequesterId) -> Result<String, Txt2DocError> {
        self.get(requester)
            .ok_or(Txt2DocError::NothingSubmitted { requester })
    }

    /// Drop the pending text for `requester`, returning it if present.
    pub fn remove(&self, requester: RequesterId) -> Option<String> {
        self.lock().remove(&requester).map(|e| e.text)
    }

    /// Remove all expired entries. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let removed = Self::purge(&mut self.lock(), self.ttl, Instant::now());
        if removed > 0 {
            debug!("Evicted {} expired session(s)", removed);
        }
        removed
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn purge(entries: &mut HashMap<RequesterId, Entry>, ttl: Duration, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, e| now.saturating_duration_since(e.submitted) <= ttl);
        before - entries.len()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("ttl", &self.ttl)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Arc;
    use std::thread;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn submit_then_get() {
        let store = SessionStore::default();
        store.submit(7, "hello");
        assert_eq!(store.get(7).as_deref(), Some("hello"));
        assert_eq!(store.get(8), None);
    }

    #[test]
    fn resubmit_replaces() {
        let store = SessionStore::default();
        store.submit(1, "first");
        store.submit(1, "second");
        assert_eq!(store.get(1).as_deref(), Some("second"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn require_reports_nothing_submitted() {
        let store = SessionStore::default();
        let err = store.require(99).unwrap_err();
        assert!(matches!(err, Txt2DocError::NothingSubmitted { requester: 99 }));
        store.submit(99, "text");
        assert_eq!(store.require(99).unwrap(), "text");
    }

    #[test]
    fn entries_expire() {
        let store = SessionStore::new(Duration::from_millis(20), 16);
        store.submit(1, "a");
        store.submit(2, "b");
        thread::sleep(Duration::from_millis(40));
        assert_eq!(store.get(1), None);
        assert_eq!(store.len(), 1);
        assert_eq!(store.evict_expired(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn capacity_evicts_oldest() {
        let store = SessionStore::new(Duration::from_secs(60), 2);
        store.submit(1, "a");
        thread::sleep(Duration::from_millis(2));
        store.submit(2, "b");
        thread::sleep(Duration::from_millis(2));
        store.submit(3, "c");
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(1), None);
        assert_eq!(store.get(2).as_deref(), Some("b"));
        assert_eq!(store.get(3).as_deref(), Some("c"));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let store = SessionStore::new(Duration::from_secs(60), 0);
        assert_eq!(store.capacity(), 1);
        store.submit(1, "a");
        store.submit(2, "b");
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(2).as_deref(), Some("b"));
    }

    #[test]
    fn remove_returns_text() {
        let store = SessionStore::default();
        store.submit(5, "x");
        assert_eq!(store.remove(5).as_deref(), Some("x"));
        assert_eq!(store.remove(5), None);
    }

    #[test]
    fn shared_across_threads() {
        let store = Arc::new(SessionStore::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store.submit(i, format!("text {i}"));
                    store.get(i)
                })
            })
            .collect();
        for (i, h) in handles.into_iter().enumerate() {
            assert_eq!(h.join().unwrap(), Some(format!("text {i}")));
        }
        assert_eq!(store.len(), 8);
    }

    #[test]
    fn survives_poisoned_lock() {
        let store = Arc::new(SessionStore::default());
        store.submit(1, "kept");
        let poisoner = Arc::clone(&store);
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock();
            panic!("poison the lock");
        })
        .join();
        assert_eq!(store.get(1).as_deref(), Some("kept"));
    }

    #[test]
    fn expiry_is_not_a_warning() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let store = SessionStore::new(Duration::from_millis(10), 16);
            store.submit(1, "a");
            store.submit(2, "b");
            thread::sleep(Duration::from_millis(30));
            store.submit(3, "c");
            assert_eq!(store.len(), 1);
            store.submit(4, "d");
            thread::sleep(Duration::from_millis(30));
            assert_eq!(store.evict_expired(), 2);
        });

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.is_empty(), "unexpected log output: {logs}");
    }
}
