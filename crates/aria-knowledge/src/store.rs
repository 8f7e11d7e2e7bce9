//! The knowledge store: append-only entries plus owner/kind/keyword indexes.

use crate::backend::{MemoryBackend, StoreBackend};
use crate::entry::{Content, KnowledgeEntry, ResolvedFilter, SearchFilter};
use aria_core::{normalize_keywords, Clock, EntryId, EntryKind, Error, Importance, Result, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// Snapshot of store contents.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoreStats {
    pub total_entries: usize,
    pub entries_per_kind: BTreeMap<String, usize>,
    pub entries_per_importance: BTreeMap<String, usize>,
    pub distinct_owners: usize,
    pub distinct_keywords: usize,
    /// True once the backing medium failed; writes continue in memory only.
    pub degraded: bool,
    pub backend: &'static str,
}

struct StoreInner {
    /// Insertion order. Position `i` holds the `i`th stored entry.
    entries: Vec<Arc<KnowledgeEntry>>,
    by_owner: HashMap<UserId, Vec<usize>>,
    by_kind: HashMap<EntryKind, Vec<usize>>,
    by_keyword: HashMap<String, Vec<usize>>,
    by_time: BTreeMap<DateTime<Utc>, Vec<usize>>,
    /// Number of leading entries reflected in the indexes. Lags `entries`
    /// only if a writer panicked between the push and the index update.
    indexed: usize,
    backend: Option<Box<dyn StoreBackend>>,
    backend_name: &'static str,
    next_id: u64,
}

impl StoreInner {
    fn new(backend: Option<Box<dyn StoreBackend>>, backend_name: &'static str) -> Self {
        Self {
            entries: Vec::new(),
            by_owner: HashMap::new(),
            by_kind: HashMap::new(),
            by_keyword: HashMap::new(),
            by_time: BTreeMap::new(),
            indexed: 0,
            backend,
            backend_name,
            next_id: 1,
        }
    }

    fn index_healthy(&self) -> bool {
        self.indexed == self.entries.len()
    }

    /// Index any entries the indexes have not caught up with.
    fn catch_up_indexes(&mut self) {
        if !self.index_healthy() {
            warn!(
                "Knowledge index behind by {} entries, reindexing",
                self.entries.len() - self.indexed
            );
        }
        while self.indexed < self.entries.len() {
            let pos = self.indexed;
            let entry = self.entries[pos].clone();
            if let Some(owner) = &entry.owner {
                self.by_owner.entry(owner.clone()).or_default().push(pos);
            }
            self.by_kind.entry(entry.kind.clone()).or_default().push(pos);
            for keyword in &entry.keywords {
                self.by_keyword.entry(keyword.clone()).or_default().push(pos);
            }
            self.by_time.entry(entry.created_at).or_default().push(pos);
            self.indexed += 1;
        }
    }

    /// Candidate positions for an index-scoped filter: the intersection of
    /// the owner, kind, and time-range postings with the union of keyword
    /// postings.
    fn candidates(&self, filter: &ResolvedFilter) -> BTreeSet<usize> {
        let mut scopes: Vec<BTreeSet<usize>> = Vec::new();
        if let Some(owner) = &filter.owner {
            scopes.push(posting(self.by_owner.get(owner)));
        }
        if let Some(kind) = &filter.kind {
            scopes.push(posting(self.by_kind.get(kind)));
        }
        if let Some(keywords) = &filter.keywords {
            let mut union = BTreeSet::new();
            for keyword in keywords {
                union.extend(self.by_keyword.get(keyword).into_iter().flatten().copied());
            }
            scopes.push(union);
        }
        if filter.since.is_some() || filter.until.is_some() {
            let lower = filter.since.map_or(Bound::Unbounded, Bound::Included);
            let upper = filter.until.map_or(Bound::Unbounded, Bound::Included);
            scopes.push(
                self.by_time
                    .range((lower, upper))
                    .flat_map(|(_, positions)| positions.iter().copied())
                    .collect(),
            );
        }

        scopes.sort_by_key(BTreeSet::len);
        let mut scopes = scopes.into_iter();
        let Some(mut result) = scopes.next() else {
            return BTreeSet::new();
        };
        for scope in scopes {
            result.retain(|pos| scope.contains(pos));
            if result.is_empty() {
                break;
            }
        }
        result
    }
}

fn posting(list: Option<&Vec<usize>>) -> BTreeSet<usize> {
    list.map(|l| l.iter().copied().collect()).unwrap_or_default()
}

/// Append-only typed fact store with indexed retrieval.
///
/// Safe for concurrent writers and readers: all state sits behind one
/// readers-writer lock, and entries are shared out as `Arc`s so readers never
/// copy payloads.
pub struct KnowledgeStore {
    inner: RwLock<StoreInner>,
    clock: Arc<dyn Clock>,
}

impl KnowledgeStore {
    /// A store with no durable medium.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::with_backend_unloaded(Box::new(MemoryBackend), clock)
    }

    /// An in-memory store already flagged as degraded, for when the
    /// configured medium could not be opened.
    pub fn degraded(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(StoreInner::new(None, "memory")),
            clock,
        }
    }

    /// Open a store over `backend`, replaying whatever it already holds. New
    /// ids continue after the highest loaded id.
    pub fn open(mut backend: Box<dyn StoreBackend>, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut loaded = backend.load()?;
        loaded.sort_by_key(|e| e.id);
        loaded.dedup_by_key(|e| e.id);

        let name = backend.name();
        let mut inner = StoreInner::new(Some(backend), name);
        inner.next_id = loaded.last().map(|e| e.id.0 + 1).unwrap_or(1);
        inner.entries = loaded.into_iter().map(Arc::new).collect();
        inner.catch_up_indexes();
        debug!(
            "Knowledge store opened on {} with {} entries",
            name,
            inner.entries.len()
        );

        Ok(Self {
            inner: RwLock::new(inner),
            clock,
        })
    }

    fn with_backend_unloaded(backend: Box<dyn StoreBackend>, clock: Arc<dyn Clock>) -> Self {
        let name = backend.name();
        Self {
            inner: RwLock::new(StoreInner::new(Some(backend), name)),
            clock,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a new entry and return its id.
    ///
    /// If the backing medium rejects the write, the entry is still kept in
    /// memory, the backend is detached for the rest of the process, and
    /// `Error::Persistence` carrying the kept id is returned. Callers should
    /// log and carry on.
    pub fn store<I, S>(
        &self,
        kind: EntryKind,
        content: Content,
        importance: Importance,
        owner: Option<UserId>,
        keywords: I,
    ) -> Result<EntryId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = normalize_keywords(keywords);
        let mut inner = self.write();
        inner.catch_up_indexes();

        let id = EntryId(inner.next_id);
        inner.next_id += 1;
        let entry = Arc::new(KnowledgeEntry {
            id,
            kind,
            content,
            importance,
            owner,
            keywords,
            created_at: self.clock.now(),
        });
        inner.entries.push(entry.clone());
        inner.catch_up_indexes();

        if let Some(backend) = inner.backend.as_mut() {
            if let Err(e) = backend.append(&entry) {
                let name = backend.name();
                inner.backend = None;
                warn!(
                    "Knowledge backend {} failed on entry {}: {}, continuing in memory only",
                    name, id, e
                );
                return Err(match e {
                    Error::Persistence { .. } => e,
                    other => Error::persistence(Some(id), other.to_string()),
                });
            }
        }

        debug!("Stored {} entry {} ({} keywords)", entry.kind, id, entry.keywords.len());
        Ok(id)
    }

    /// Entries matching `filter`, most recent first. Equal timestamps order
    /// later insertions first.
    pub fn search(&self, filter: &SearchFilter) -> Result<Vec<Arc<KnowledgeEntry>>> {
        let filter = filter.resolve()?;
        let inner = self.read();

        let mut results: Vec<Arc<KnowledgeEntry>> =
            if filter.is_index_scoped() && inner.index_healthy() {
                inner
                    .candidates(&filter)
                    .into_iter()
                    .map(|pos| inner.entries[pos].clone())
                    .filter(|e| filter.matches(e))
                    .collect()
            } else {
                if filter.is_index_scoped() {
                    debug!("Knowledge index not current, scanning all entries");
                }
                inner
                    .entries
                    .iter()
                    .filter(|e| filter.matches(e))
                    .cloned()
                    .collect()
            };
        drop(inner);

        results.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(results)
    }

    /// Point lookup by id.
    pub fn get(&self, id: EntryId) -> Option<Arc<KnowledgeEntry>> {
        let inner = self.read();
        // Ids are assigned in insertion order, so a binary search works even
        // after a replay that skipped ids.
        inner
            .entries
            .binary_search_by_key(&id, |e| e.id)
            .ok()
            .map(|pos| inner.entries[pos].clone())
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_degraded(&self) -> bool {
        self.read().backend.is_none()
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.read();
        let mut entries_per_kind = BTreeMap::new();
        let mut entries_per_importance = BTreeMap::new();
        let mut owners = BTreeSet::new();
        let mut keywords = BTreeSet::new();
        for entry in &inner.entries {
            *entries_per_kind.entry(entry.kind.to_string()).or_insert(0) += 1;
            *entries_per_importance
                .entry(entry.importance.as_str().to_string())
                .or_insert(0) += 1;
            if let Some(owner) = &entry.owner {
                owners.insert(owner);
            }
            keywords.extend(entry.keywords.iter());
        }
        StoreStats {
            total_entries: inner.entries.len(),
            entries_per_kind,
            entries_per_importance,
            distinct_owners: owners.len(),
            distinct_keywords: keywords.len(),
            degraded: inner.backend.is_none(),
            backend: inner.backend_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aria_core::ManualClock;
    use chrono::{Duration, Utc};

    fn store() -> (KnowledgeStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (KnowledgeStore::in_memory(clock.clone()), clock)
    }

    fn put(store: &KnowledgeStore, owner: Option<&str>, keywords: &[&str]) -> EntryId {
        store
            .store(
                EntryKind::Conversation,
                Content::new(),
                Importance::Medium,
                owner.map(UserId::from),
                keywords.iter().copied(),
            )
            .unwrap()
    }

    #[test]
    fn ids_are_monotonic() {
        let (store, _) = store();
        let a = put(&store, None, &[]);
        let b = put(&store, None, &[]);
        assert!(b > a);
        assert_eq!(store.get(a).unwrap().id, a);
    }

    #[test]
    fn keyword_search_is_or() {
        let (store, clock) = store();
        let a = put(&store, Some("u1"), &["audio"]);
        clock.advance(Duration::seconds(1));
        let b = put(&store, Some("u1"), &["rostro"]);
        clock.advance(Duration::seconds(1));
        put(&store, Some("u1"), &["movimiento"]);

        let hits = store
            .search(&SearchFilter::new().keywords(["audio", "rostro"]))
            .unwrap();
        let ids: Vec<_> = hits.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![b, a]);
    }

    #[test]
    fn equal_timestamps_order_later_insertion_first() {
        let (store, _) = store();
        let a = put(&store, Some("u1"), &[]);
        let b = put(&store, Some("u1"), &[]);
        let hits = store.search(&SearchFilter::new().owner("u1")).unwrap();
        assert_eq!(hits.iter().map(|e| e.id).collect::<Vec<_>>(), vec![b, a]);
    }

    #[test]
    fn lagging_index_falls_back_to_scan() {
        let (store, _) = store();
        put(&store, Some("u1"), &["audio"]);
        {
            // Simulate a writer that died between the push and the index update.
            let mut inner = store.write();
            let orphan = Arc::new(KnowledgeEntry {
                id: EntryId(inner.next_id),
                kind: EntryKind::Experience,
                content: Content::new(),
                importance: Importance::High,
                owner: Some("u1".into()),
                keywords: ["audio".to_string()].into_iter().collect(),
                created_at: Utc::now(),
            });
            inner.next_id += 1;
            inner.entries.push(orphan);
        }

        let hits = store.search(&SearchFilter::new().owner("u1")).unwrap();
        assert_eq!(hits.len(), 2);

        // Next write repairs the indexes.
        put(&store, Some("u2"), &[]);
        assert!(store.read().index_healthy());
        let hits = store.search(&SearchFilter::new().keyword("audio")).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn time_range_alone_uses_the_time_index() {
        let (store, clock) = store();
        let t0 = clock.now();
        put(&store, Some("u1"), &[]);
        clock.advance(Duration::seconds(10));
        let mid = put(&store, None, &["audio"]);
        clock.advance(Duration::seconds(10));
        put(&store, Some("u2"), &[]);

        let filter = SearchFilter::new()
            .since(t0 + Duration::seconds(5))
            .until(t0 + Duration::seconds(15));
        let resolved = filter.resolve().unwrap();
        assert!(resolved.is_index_scoped());
        let inner = store.read();
        assert_eq!(inner.candidates(&resolved).into_iter().collect::<Vec<_>>(), vec![1]);
        drop(inner);

        let hits = store.search(&filter).unwrap();
        assert_eq!(hits.iter().map(|e| e.id).collect::<Vec<_>>(), vec![mid]);

        let open_ended = store
            .search(&SearchFilter::new().since(t0 + Duration::seconds(5)))
            .unwrap();
        assert_eq!(open_ended.len(), 2);
    }

    #[test]
    fn stats_counts() {
        let (store, _) = store();
        put(&store, Some("u1"), &["a"]);
        put(&store, Some("u2"), &["a", "b"]);
        put(&store, None, &[]);
        let stats = store.stats();
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.distinct_owners, 2);
        assert_eq!(stats.distinct_keywords, 2);
        assert_eq!(stats.entries_per_kind.get("conversation"), Some(&3));
        assert_eq!(stats.entries_per_importance.get("medium"), Some(&3));
        assert!(!stats.degraded);
        assert_eq!(stats.backend, "memory");
    }
}
