//! Shared book store
//!
//! Single writer (the feed handler thread), many readers. Every mutation of
//! one instrument happens under one write guard, so readers never see a
//! half-applied message. Change listeners run after the guard is released.

use crate::domain::{InstrumentBook, InstrumentKey, LastTrade, Side, TradeSource};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace};

/// What kind of mutation produced a change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Snapshot,
    LevelUpdate,
    LastTrade,
    TickSize,
    Seed,
}

/// Notification delivered to change listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookChange {
    pub key: InstrumentKey,
    pub kind: ChangeKind,
    /// Store version after this change
    pub version: u64,
}

/// Callback invoked after every store mutation
pub type ChangeListener = Arc<dyn Fn(&BookChange) + Send + Sync>;

/// Handle for unregistering a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct StoreInner {
    books: RwLock<HashMap<InstrumentKey, InstrumentBook>>,
    listeners: RwLock<Vec<(ListenerId, ChangeListener)>>,
    next_listener: AtomicU64,
    version: AtomicU64,
}

/// Mapping from instrument key to its book
///
/// Cheap to clone; clones share the same books.
#[derive(Clone)]
pub struct BookStore {
    inner: Arc<StoreInner>,
}

impl Default for BookStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BookStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookStore")
            .field("books", &self.len())
            .field("version", &self.version())
            .finish()
    }
}

impl BookStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                books: RwLock::new(HashMap::new()),
                listeners: RwLock::new(Vec::new()),
                next_listener: AtomicU64::new(1),
                version: AtomicU64::new(0),
            }),
        }
    }

    /// Copy of the current book
    pub fn get(&self, key: &InstrumentKey) -> Option<InstrumentBook> {
        self.inner.books.read().get(key).cloned()
    }

    /// Read a book in place without cloning it
    pub fn with_book<R>(&self, key: &InstrumentKey, f: impl FnOnce(&InstrumentBook) -> R) -> Option<R> {
        self.inner.books.read().get(key).map(f)
    }

    /// Read a book and its paired outcome under one guard
    pub fn with_pair<R>(
        &self,
        key: &InstrumentKey,
        f: impl FnOnce(Option<&InstrumentBook>, Option<&InstrumentBook>) -> R,
    ) -> R {
        let books = self.inner.books.read();
        f(books.get(key), books.get(&key.complement()))
    }

    pub fn contains(&self, key: &InstrumentKey) -> bool {
        self.inner.books.read().contains_key(key)
    }

    /// Keys of every book, sorted
    pub fn keys(&self) -> Vec<InstrumentKey> {
        let mut keys: Vec<InstrumentKey> = self.inner.books.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.inner.books.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.books.read().is_empty()
    }

    /// Monotonic mutation counter
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Mutate one book under a single write guard
    ///
    /// The book is created empty on first use. Listeners are notified after
    /// the guard is released.
    pub fn update<R>(
        &self,
        key: &InstrumentKey,
        kind: ChangeKind,
        f: impl FnOnce(&mut InstrumentBook) -> R,
    ) -> R {
        let (result, version) = {
            let mut books = self.inner.books.write();
            let book = books.entry(key.clone()).or_insert_with(|| {
                debug!("Creating book for {}", key);
                InstrumentBook::new()
            });
            let result = f(book);
            let version = self.inner.version.fetch_add(1, Ordering::AcqRel) + 1;
            (result, version)
        };

        self.notify(BookChange {
            key: key.clone(),
            kind,
            version,
        });
        result
    }

    /// Pre-populate the last trade from the REST seed
    ///
    /// A value that already came from the stream is never overwritten.
    /// Returns true if the seed was applied.
    pub fn seed_last_trade(
        &self,
        key: &InstrumentKey,
        price: Decimal,
        side: Option<Side>,
        timestamp: DateTime<Utc>,
    ) -> bool {
        let version = {
            let mut books = self.inner.books.write();
            let book = books.entry(key.clone()).or_default();

            let streamed = book
                .last_trade
                .as_ref()
                .is_some_and(|t| t.source == TradeSource::Stream);
            if streamed {
                trace!("Skipping seed for {}: stream value present", key);
                return false;
            }

            book.record_trade(LastTrade {
                price,
                side,
                timestamp,
                source: TradeSource::Rest,
            });
            self.inner.version.fetch_add(1, Ordering::AcqRel) + 1
        };

        self.notify(BookChange {
            key: key.clone(),
            kind: ChangeKind::Seed,
            version,
        });
        true
    }

    /// Register a callback invoked after every mutation
    pub fn on_change(&self, listener: impl Fn(&BookChange) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Unregister a callback; false if it was not registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    fn notify(&self, change: BookChange) {
        let listeners: Vec<ChangeListener> = self
            .inner
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        // A panicking consumer must not take down the thread applying feed updates
        for listener in listeners {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(&change))).is_err() {
                error!("Change listener panicked on {} (version {})", change.key, change.version);
            }
        }
    }
}
