mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use blaze::client::api::{BlazeApi, GraphqlApi, SchemaExecutor};
use blaze::client::cache::{CachedValue, ExploreSearch, MemoryCache, QueryCache, QueryKey};
use blaze::client::error::{ClientError, ClientResult};
use blaze::client::mutations::{Notifier, TracingNotifier};
use blaze::client::poller::spawn_notification_poller;
use blaze::client::QueryClient;
use blaze::extractors::CurrentUser;
use blaze::social::views::{NotificationView, PostPage, PostView};
use chrono::{DateTime, Utc};
use common::TestApp;

type InProcessApi = GraphqlApi<SchemaExecutor>;

fn api_for(app: &TestApp, user: &CurrentUser) -> InProcessApi {
    GraphqlApi::new(SchemaExecutor::new(
        app.schema.clone(),
        app.pool.clone(),
        Some(user.clone()),
    ))
}

fn client_for(app: &TestApp, user: &CurrentUser) -> QueryClient<InProcessApi> {
    QueryClient::new(api_for(app, user), Arc::new(MemoryCache::new()), Arc::new(TracingNotifier))
        .with_page_size(5)
}

#[derive(Default)]
struct RecordingNotifier(Mutex<Vec<String>>);

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

/// Reads go to the server; every toggle fails.
struct FailingToggles(InProcessApi);

#[async_trait]
impl BlazeApi for FailingToggles {
    async fn feed(&self, limit: i32, cursor: Option<i64>) -> ClientResult<PostPage> {
        self.0.feed(limit, cursor).await
    }
    async fn get_post(&self, post_id: i64) -> ClientResult<PostView> {
        self.0.get_post(post_id).await
    }
    async fn bookmarked_posts(&self, limit: i32, cursor: Option<i64>) -> ClientResult<PostPage> {
        self.0.bookmarked_posts(limit, cursor).await
    }
    async fn explore(&self, search: &ExploreSearch, limit: i32, cursor: Option<i64>) -> ClientResult<PostPage> {
        self.0.explore(search, limit, cursor).await
    }
    async fn notifications(&self, since: Option<DateTime<Utc>>) -> ClientResult<Vec<NotificationView>> {
        self.0.notifications(since).await
    }
    async fn toggle_like(&self, _: i64) -> ClientResult<bool> {
        Err(unavailable())
    }
    async fn toggle_repost(&self, _: i64) -> ClientResult<bool> {
        Err(unavailable())
    }
    async fn toggle_bookmark(&self, _: i64) -> ClientResult<bool> {
        Err(unavailable())
    }
    async fn mark_as_read(&self, ids: &[i64]) -> ClientResult<()> {
        self.0.mark_as_read(ids).await
    }
}

fn unavailable() -> ClientError {
    ClientError::Rpc {
        code: "INTERNAL_SERVER_ERROR".into(),
        message: "Internal server error".into(),
    }
}

#[tokio::test]
async fn test_optimistic_like_converges_with_server() {
    let app = TestApp::new();
    let alice = app.add_user("user-a", "alice");
    let bob = app.add_user("user-b", "bob");
    let post_id = app.create_post(&alice, "hello").await;

    let client = client_for(&app, &bob);
    client.post(post_id).await.unwrap();
    client.feed().await.unwrap();

    let active = client.toggle_like(post_id).await.unwrap();
    assert!(active);

    // The patch is visible before any refetch.
    let cached = client.cache().get(&QueryKey::PostDetail(post_id)).unwrap();
    let patched = cached.find_post(post_id).unwrap();
    assert_eq!((patched.likes, patched.has_liked), (1, true));

    let refreshed = client.refetch_invalidated().await.unwrap();
    assert_eq!(refreshed, 2);

    let server = client.api().get_post(post_id).await.unwrap();
    for key in [QueryKey::PostDetail(post_id), QueryKey::Feed] {
        let cached = client.cache().get(&key).unwrap();
        assert_eq!(cached.find_post(post_id), Some(&server), "{key:?}");
        assert!(!client.cache().is_stale(&key));
    }
}

#[tokio::test]
async fn test_failed_toggle_rolls_back_and_notifies() {
    let app = TestApp::new();
    let alice = app.add_user("user-a", "alice");
    let bob = app.add_user("user-b", "bob");
    let post_id = app.create_post(&alice, "hello").await;

    let notifier = Arc::new(RecordingNotifier::default());
    let client = QueryClient::new(
        FailingToggles(api_for(&app, &bob)),
        Arc::new(MemoryCache::new()),
        notifier.clone(),
    );
    let search = ExploreSearch {
        query: "hello".into(),
        ..Default::default()
    };
    let explore_key = QueryKey::Explore(search.clone());
    client.post(post_id).await.unwrap();
    client.feed().await.unwrap();
    assert_eq!(client.explore(search).await.unwrap().items().count(), 1);
    let detail_before = client.cache().get(&QueryKey::PostDetail(post_id)).unwrap();
    let feed_before = client.cache().get(&QueryKey::Feed).unwrap();
    let explore_before = client.cache().get(&explore_key).unwrap();

    let err = client.toggle_repost(post_id).await.unwrap_err();
    assert_eq!(err.code(), Some("INTERNAL_SERVER_ERROR"));

    assert_eq!(client.cache().get(&QueryKey::PostDetail(post_id)), Some(detail_before));
    assert_eq!(client.cache().get(&QueryKey::Feed), Some(feed_before));
    assert_eq!(client.cache().get(&explore_key), Some(explore_before));
    assert!(client.cache().is_stale(&explore_key));
    assert_eq!(*notifier.0.lock().unwrap(), vec!["Failed to repost"]);
    assert_eq!(app.count("SELECT COUNT(*) FROM reposts"), 0);
}

#[tokio::test]
async fn test_bookmark_toggles_track_bookmark_list() {
    let app = TestApp::new();
    let alice = app.add_user("user-a", "alice");
    let bob = app.add_user("user-b", "bob");
    let post_id = app.create_post(&alice, "keep me").await;

    let client = client_for(&app, &bob);
    client.post(post_id).await.unwrap();
    assert!(client.bookmarks().await.unwrap().pages[0].items.is_empty());

    assert!(client.toggle_bookmark(post_id).await.unwrap());
    let cached = client.cache().get(&QueryKey::Bookmarks).unwrap();
    assert!(cached.find_post(post_id).unwrap().is_bookmarked);

    client.refetch_invalidated().await.unwrap();
    let bookmarks = client.cache().get(&QueryKey::Bookmarks).unwrap();
    assert!(bookmarks.find_post(post_id).unwrap().is_bookmarked);

    assert!(!client.toggle_bookmark(post_id).await.unwrap());
    assert!(client.cache().get(&QueryKey::Bookmarks).unwrap().find_post(post_id).is_none());
    client.refetch_invalidated().await.unwrap();
    assert!(client.cache().get(&QueryKey::Bookmarks).unwrap().find_post(post_id).is_none());
    assert_eq!(app.count("SELECT COUNT(*) FROM bookmarks"), 0);
}

#[tokio::test]
async fn test_infinite_feed_walks_every_page() {
    let app = TestApp::new();
    let alice = app.add_user("user-a", "alice");
    for i in 0..7 {
        app.create_post(&alice, &format!("post {i}")).await;
    }

    let client = client_for(&app, &alice);
    let first = client.feed().await.unwrap();
    assert_eq!(first.items().count(), 5);
    assert!(first.next_cursor().is_some());

    let all = client.fetch_next_page(&QueryKey::Feed).await.unwrap().unwrap();
    assert_eq!(all.items().count(), 7);
    assert!(all.next_cursor().is_none());
    assert!(client.fetch_next_page(&QueryKey::Feed).await.unwrap().is_none());

    // A refetch keeps both pages.
    client.cache().invalidate(blaze::client::cache::QueryScope::Feed);
    client.refetch_invalidated().await.unwrap();
    match client.cache().get(&QueryKey::Feed).unwrap() {
        CachedValue::Pages(pages) => assert_eq!(pages.pages.len(), 2),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_poller_fills_notifications() {
    let app = TestApp::new();
    let alice = app.add_user("user-a", "alice");
    let bob = app.add_user("user-b", "bob");
    let post_id = app.create_post(&alice, "hello").await;
    app.data(
        Some(&bob),
        &format!("mutation {{ post {{ toggleLike(postId: {post_id}) {{ success }} }} }}"),
    )
    .await;

    let client = Arc::new(client_for(&app, &alice));
    let handle = spawn_notification_poller(client.clone(), Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.abort();

    match client.cache().get(&QueryKey::Notifications) {
        Some(CachedValue::Notifications(list)) => {
            assert_eq!(list.len(), 1);
            assert!(!list[0].read);
        }
        other => panic!("unexpected {other:?}"),
    }
}
