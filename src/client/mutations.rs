//! Optimistic toggle protocol: cancel, snapshot, patch, call, settle.

use super::api::BlazeApi;
use super::cache::{CachedValue, QueryCache, QueryKey, QueryScope};
use super::error::ClientResult;
use super::optimistic::{self, PostAction};
use crate::social::views::PostView;

/// Surfaces user-visible notices, e.g. a toast.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Notices go to the log.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str) {
        tracing::warn!("{}", message);
    }
}

/// Every view a post toggle can touch.
pub fn affected_scopes(post_id: i64) -> [QueryScope; 4] {
    [
        QueryScope::Post(post_id),
        QueryScope::Feed,
        QueryScope::Bookmarks,
        QueryScope::Explore,
    ]
}

/// Values currently cached under any of `scopes`.
pub fn snapshot(cache: &dyn QueryCache, scopes: &[QueryScope]) -> Vec<(QueryKey, CachedValue)> {
    cache
        .keys()
        .into_iter()
        .filter(|key| scopes.iter().any(|scope| scope.matches(key)))
        .filter_map(|key| cache.get(&key).map(|value| (key, value)))
        .collect()
}

/// Latest known copy of the post: the detail view first, then any list.
fn known_post(snapshot: &[(QueryKey, CachedValue)], post_id: i64) -> Option<PostView> {
    snapshot
        .iter()
        .find(|(key, _)| *key == QueryKey::PostDetail(post_id))
        .and_then(|(_, value)| value.find_post(post_id))
        .or_else(|| snapshot.iter().find_map(|(_, value)| value.find_post(post_id)))
        .cloned()
}

/// Run one toggle against `api`, keeping `cache` optimistic and consistent.
///
/// On failure every snapshotted view is restored verbatim and the action's
/// notice is raised. Affected views are invalidated whatever the outcome.
pub async fn run_toggle<A: BlazeApi + ?Sized>(
    api: &A,
    cache: &dyn QueryCache,
    notifier: &dyn Notifier,
    post_id: i64,
    action: PostAction,
) -> ClientResult<bool> {
    let scopes = affected_scopes(post_id);
    for scope in scopes {
        cache.cancel(scope);
    }

    let saved = snapshot(cache, &scopes);
    let known = known_post(&saved, post_id);
    for (key, _) in &saved {
        cache.update(key, &|value| {
            optimistic::apply(key, value, post_id, action, known.as_ref())
        });
    }

    let result = match action {
        PostAction::Like => api.toggle_like(post_id).await,
        PostAction::Repost => api.toggle_repost(post_id).await,
        PostAction::Bookmark => api.toggle_bookmark(post_id).await,
    };

    if let Err(e) = &result {
        tracing::warn!("{:?} on post {} failed: {}", action, post_id, e);
        for (key, value) in saved {
            cache.set(key, value);
        }
        notifier.notify(action.failure_notice());
    }

    for scope in scopes {
        cache.invalidate(scope);
    }
    result
}
