//! Client-side query cache.
//!
//! Entries carry a fetch generation. Cancelling or invalidating a key bumps it,
//! so a fetch that started earlier cannot overwrite a newer optimistic value.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::social::domain::SortBy;
use crate::social::views::{NotificationView, PostPage, PostView};

/// One distinct explore search. Each gets its own cache entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ExploreSearch {
    pub query: String,
    pub filters: Vec<String>,
    pub sort_by: SortBy,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    PostDetail(i64),
    Feed,
    Bookmarks,
    Explore(ExploreSearch),
    Notifications,
}

/// A set of keys addressed together by cancel and invalidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryScope {
    Post(i64),
    Feed,
    Bookmarks,
    /// Every explore search.
    Explore,
    Notifications,
}

impl QueryScope {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match (self, key) {
            (QueryScope::Post(id), QueryKey::PostDetail(key_id)) => id == key_id,
            (QueryScope::Feed, QueryKey::Feed) => true,
            (QueryScope::Bookmarks, QueryKey::Bookmarks) => true,
            (QueryScope::Explore, QueryKey::Explore(_)) => true,
            (QueryScope::Notifications, QueryKey::Notifications) => true,
            _ => false,
        }
    }
}

/// Loaded pages of an infinite list, in fetch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfinitePosts {
    pub pages: Vec<PostPage>,
}

impl InfinitePosts {
    pub fn first(page: PostPage) -> Self {
        Self { pages: vec![page] }
    }

    pub fn next_cursor(&self) -> Option<i64> {
        self.pages.last().and_then(|page| page.next_cursor)
    }

    pub fn items(&self) -> impl Iterator<Item = &PostView> {
        self.pages.iter().flat_map(|page| page.items.iter())
    }

    pub fn find(&self, post_id: i64) -> Option<&PostView> {
        self.items().find(|post| post.id == post_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    Post(PostView),
    Pages(InfinitePosts),
    Notifications(Vec<NotificationView>),
}

impl CachedValue {
    /// The copy of `post_id` this value holds, if any.
    pub fn find_post(&self, post_id: i64) -> Option<&PostView> {
        match self {
            CachedValue::Post(post) if post.id == post_id => Some(post),
            CachedValue::Pages(pages) => pages.find(post_id),
            _ => None,
        }
    }
}

/// Cache capability used by the client. Object safe so callers can swap stores.
pub trait QueryCache: Send + Sync {
    fn get(&self, key: &QueryKey) -> Option<CachedValue>;

    /// Store `value` verbatim and mark it fresh.
    fn set(&self, key: QueryKey, value: CachedValue);

    /// Replace a cached value with `f(previous)`. Absent keys stay absent.
    fn update(&self, key: &QueryKey, f: &dyn Fn(&CachedValue) -> CachedValue);

    /// Drop in-flight fetches for matching keys.
    fn cancel(&self, scope: QueryScope);

    /// Mark matching keys stale and drop their in-flight fetches.
    fn invalidate(&self, scope: QueryScope);

    /// Keys that currently hold a value.
    fn keys(&self) -> Vec<QueryKey>;

    /// Register a fetch; returns the generation it must present on completion.
    fn begin_fetch(&self, key: &QueryKey) -> u64;

    /// Store a fetch result unless the key was cancelled since `begin_fetch`.
    fn complete_fetch(&self, key: QueryKey, generation: u64, value: CachedValue) -> bool;

    fn is_stale(&self, key: &QueryKey) -> bool;
}

#[derive(Debug, Default)]
struct Entry {
    value: Option<CachedValue>,
    generation: u64,
    stale: bool,
}

/// In-process cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<QueryKey, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        // A panic while holding the lock cannot leave an entry half-written.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl QueryCache for MemoryCache {
    fn get(&self, key: &QueryKey) -> Option<CachedValue> {
        self.lock().get(key).and_then(|entry| entry.value.clone())
    }

    fn set(&self, key: QueryKey, value: CachedValue) {
        let mut entries = self.lock();
        let entry = entries.entry(key).or_default();
        entry.value = Some(value);
        entry.stale = false;
    }

    fn update(&self, key: &QueryKey, f: &dyn Fn(&CachedValue) -> CachedValue) {
        if let Some(entry) = self.lock().get_mut(key) {
            if let Some(value) = entry.value.as_ref() {
                entry.value = Some(f(value));
            }
        }
    }

    fn cancel(&self, scope: QueryScope) {
        for (key, entry) in self.lock().iter_mut() {
            if scope.matches(key) {
                entry.generation += 1;
            }
        }
    }

    fn invalidate(&self, scope: QueryScope) {
        for (key, entry) in self.lock().iter_mut() {
            if scope.matches(key) {
                entry.generation += 1;
                entry.stale = true;
            }
        }
    }

    fn keys(&self) -> Vec<QueryKey> {
        self.lock()
            .iter()
            .filter(|(_, entry)| entry.value.is_some())
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn begin_fetch(&self, key: &QueryKey) -> u64 {
        self.lock().entry(key.clone()).or_default().generation
    }

    fn complete_fetch(&self, key: QueryKey, generation: u64, value: CachedValue) -> bool {
        let mut entries = self.lock();
        let entry = entries.entry(key).or_default();
        if entry.generation != generation {
            return false;
        }
        entry.value = Some(value);
        entry.stale = false;
        true
    }

    fn is_stale(&self, key: &QueryKey) -> bool {
        self.lock().get(key).map(|entry| entry.stale).unwrap_or(false)
    }
}
