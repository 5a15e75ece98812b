//! Client side of Blaze: a query cache kept optimistic across toggles.

pub mod api;
pub mod cache;
pub mod error;
pub mod mutations;
pub mod optimistic;
pub mod poller;

use std::sync::Arc;

use api::BlazeApi;
use cache::{CachedValue, ExploreSearch, InfinitePosts, QueryCache, QueryKey};
use error::ClientResult;
use mutations::Notifier;
use optimistic::PostAction;

use crate::social::views::{NotificationView, PostPage, PostView};

const DEFAULT_PAGE_SIZE: i32 = 10;

/// Ties an API to a cache. Reads fill the cache; toggles patch it optimistically.
pub struct QueryClient<A> {
    api: A,
    cache: Arc<dyn QueryCache>,
    notifier: Arc<dyn Notifier>,
    page_size: i32,
}

impl<A: BlazeApi> QueryClient<A> {
    pub fn new(api: A, cache: Arc<dyn QueryCache>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            cache,
            notifier,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn cache(&self) -> &Arc<dyn QueryCache> {
        &self.cache
    }

    async fn fetch_page(&self, key: &QueryKey, cursor: Option<i64>) -> ClientResult<PostPage> {
        match key {
            QueryKey::Feed => self.api.feed(self.page_size, cursor).await,
            QueryKey::Bookmarks => self.api.bookmarked_posts(self.page_size, cursor).await,
            QueryKey::Explore(search) => self.api.explore(search, self.page_size, cursor).await,
            QueryKey::PostDetail(_) | QueryKey::Notifications => {
                Err(error::ClientError::MissingData(format!("{key:?} is not paginated")))
            }
        }
    }

    /// Fetch `key` from the server and store it unless cancelled meanwhile.
    /// Lists reload as many pages as were loaded before.
    pub async fn fetch(&self, key: &QueryKey) -> ClientResult<CachedValue> {
        let generation = self.cache.begin_fetch(key);
        let value = match key {
            QueryKey::PostDetail(post_id) => CachedValue::Post(self.api.get_post(*post_id).await?),
            QueryKey::Notifications => CachedValue::Notifications(self.api.notifications(None).await?),
            QueryKey::Feed | QueryKey::Bookmarks | QueryKey::Explore(_) => {
                let loaded = match self.cache.get(key) {
                    Some(CachedValue::Pages(pages)) => pages.pages.len().max(1),
                    _ => 1,
                };
                let mut pages = InfinitePosts::default();
                let mut cursor = None;
                for _ in 0..loaded {
                    let page = self.fetch_page(key, cursor).await?;
                    cursor = page.next_cursor;
                    pages.pages.push(page);
                    if cursor.is_none() {
                        break;
                    }
                }
                CachedValue::Pages(pages)
            }
        };

        if !self.cache.complete_fetch(key.clone(), generation, value.clone()) {
            tracing::debug!("Discarded cancelled fetch for {:?}", key);
        }
        Ok(value)
    }

    /// Append the next page to a cached list. `None` when there is no next page.
    pub async fn fetch_next_page(&self, key: &QueryKey) -> ClientResult<Option<InfinitePosts>> {
        let Some(CachedValue::Pages(current)) = self.cache.get(key) else {
            return match self.fetch(key).await? {
                CachedValue::Pages(pages) => Ok(Some(pages)),
                _ => Ok(None),
            };
        };
        let Some(cursor) = current.next_cursor() else {
            return Ok(None);
        };

        let generation = self.cache.begin_fetch(key);
        let page = self.fetch_page(key, Some(cursor)).await?;
        let mut next = current;
        next.pages.push(page);

        if !self
            .cache
            .complete_fetch(key.clone(), generation, CachedValue::Pages(next.clone()))
        {
            tracing::debug!("Discarded cancelled page fetch for {:?}", key);
        }
        Ok(Some(next))
    }

    pub async fn post(&self, post_id: i64) -> ClientResult<PostView> {
        match self.fetch(&QueryKey::PostDetail(post_id)).await? {
            CachedValue::Post(post) => Ok(post),
            other => Err(error::ClientError::MissingData(format!("post {post_id}: {other:?}"))),
        }
    }

    pub async fn feed(&self) -> ClientResult<InfinitePosts> {
        self.pages(&QueryKey::Feed).await
    }

    pub async fn bookmarks(&self) -> ClientResult<InfinitePosts> {
        self.pages(&QueryKey::Bookmarks).await
    }

    pub async fn explore(&self, search: ExploreSearch) -> ClientResult<InfinitePosts> {
        self.pages(&QueryKey::Explore(search)).await
    }

    async fn pages(&self, key: &QueryKey) -> ClientResult<InfinitePosts> {
        match self.fetch(key).await? {
            CachedValue::Pages(pages) => Ok(pages),
            other => Err(error::ClientError::MissingData(format!("{key:?}: {other:?}"))),
        }
    }

    pub async fn notifications(&self) -> ClientResult<Vec<NotificationView>> {
        match self.fetch(&QueryKey::Notifications).await? {
            CachedValue::Notifications(list) => Ok(list),
            other => Err(error::ClientError::MissingData(format!("notifications: {other:?}"))),
        }
    }

    /// Refetch every stale key. Returns how many were refreshed.
    pub async fn refetch_invalidated(&self) -> ClientResult<usize> {
        let stale: Vec<QueryKey> = self
            .cache
            .keys()
            .into_iter()
            .filter(|key| self.cache.is_stale(key))
            .collect();
        for key in &stale {
            self.fetch(key).await?;
        }
        Ok(stale.len())
    }

    pub async fn toggle_like(&self, post_id: i64) -> ClientResult<bool> {
        self.toggle(post_id, PostAction::Like).await
    }

    pub async fn toggle_repost(&self, post_id: i64) -> ClientResult<bool> {
        self.toggle(post_id, PostAction::Repost).await
    }

    pub async fn toggle_bookmark(&self, post_id: i64) -> ClientResult<bool> {
        self.toggle(post_id, PostAction::Bookmark).await
    }

    async fn toggle(&self, post_id: i64, action: PostAction) -> ClientResult<bool> {
        mutations::run_toggle(
            &self.api,
            self.cache.as_ref(),
            self.notifier.as_ref(),
            post_id,
            action,
        )
        .await
    }
}
