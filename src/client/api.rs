//! Typed procedure calls over GraphQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::cache::ExploreSearch;
use super::error::{ClientError, ClientResult};
use crate::config::FeedConfig;
use crate::extractors::CurrentUser;
use crate::graphql::{BlazeSchema, Viewer};
use crate::social::views::{NotificationView, PostPage, PostView};
use crate::state::DbPool;

/// The procedures the client cache needs.
#[async_trait]
pub trait BlazeApi: Send + Sync {
    async fn feed(&self, limit: i32, cursor: Option<i64>) -> ClientResult<PostPage>;

    async fn get_post(&self, post_id: i64) -> ClientResult<PostView>;

    async fn bookmarked_posts(&self, limit: i32, cursor: Option<i64>) -> ClientResult<PostPage>;

    async fn explore(
        &self,
        search: &ExploreSearch,
        limit: i32,
        cursor: Option<i64>,
    ) -> ClientResult<PostPage>;

    async fn notifications(&self, since: Option<DateTime<Utc>>) -> ClientResult<Vec<NotificationView>>;

    /// Returns whether the like exists afterwards.
    async fn toggle_like(&self, post_id: i64) -> ClientResult<bool>;

    async fn toggle_repost(&self, post_id: i64) -> ClientResult<bool>;

    async fn toggle_bookmark(&self, post_id: i64) -> ClientResult<bool>;

    async fn mark_as_read(&self, notification_ids: &[i64]) -> ClientResult<()>;
}

/// Runs one GraphQL document and returns the raw response body.
#[async_trait]
pub trait GraphqlExecutor: Send + Sync {
    async fn execute(&self, query: &str, variables: Value) -> ClientResult<Value>;
}

/// Talks to a running server.
pub struct HttpExecutor {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpExecutor {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/graphql", base_url.trim_end_matches('/')),
            token: None,
        }
    }

    /// Authenticate as the session behind `token`.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[async_trait]
impl GraphqlExecutor for HttpExecutor {
    async fn execute(&self, query: &str, variables: Value) -> ClientResult<Value> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let body = request.send().await?.error_for_status()?.json::<Value>().await?;
        Ok(body)
    }
}

/// Executes against an in-process schema, as the given caller.
pub struct SchemaExecutor {
    schema: BlazeSchema,
    pool: DbPool,
    feed: FeedConfig,
    viewer: Option<CurrentUser>,
}

impl SchemaExecutor {
    pub fn new(schema: BlazeSchema, pool: DbPool, viewer: Option<CurrentUser>) -> Self {
        Self {
            schema,
            pool,
            feed: FeedConfig::default(),
            viewer,
        }
    }

    pub fn with_feed_config(mut self, feed: FeedConfig) -> Self {
        self.feed = feed;
        self
    }
}

#[async_trait]
impl GraphqlExecutor for SchemaExecutor {
    async fn execute(&self, query: &str, variables: Value) -> ClientResult<Value> {
        let request = async_graphql::Request::new(query)
            .variables(async_graphql::Variables::from_json(variables))
            .data(self.pool.clone())
            .data(self.feed.clone())
            .data(Viewer(self.viewer.clone()));

        let response = self.schema.execute(request).await;
        Ok(serde_json::to_value(&response)?)
    }
}

/// Pull `data.<path>` out of a response body, or the first GraphQL error.
pub fn decode_response<T: DeserializeOwned>(body: Value, path: &[&str]) -> ClientResult<T> {
    if let Some(error) = body
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
    {
        let code = error
            .pointer("/extensions/code")
            .and_then(Value::as_str)
            .unwrap_or("INTERNAL_SERVER_ERROR");
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        return Err(ClientError::Rpc {
            code: code.to_string(),
            message: message.to_string(),
        });
    }

    let mut node = body.get("data");
    for segment in path {
        node = node.and_then(|value| value.get(*segment));
    }
    match node {
        Some(value) if !value.is_null() => Ok(serde_json::from_value(value.clone())?),
        _ => Err(ClientError::MissingData(path.join("."))),
    }
}

const POST_FIELDS: &str = "id content createdAt likes reposts commentsCount \
    hasLiked hasReposted isBookmarked hashtags author { id name username image }";

const NOTIFICATION_FIELDS: &str = "id type read createdAt \
    actor { id name username image } post { id content } comment { id content }";

/// [`BlazeApi`] over any GraphQL executor.
pub struct GraphqlApi<E> {
    executor: E,
}

impl<E: GraphqlExecutor> GraphqlApi<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    async fn call<T: DeserializeOwned + Send>(
        &self,
        query: &str,
        variables: Value,
        path: &[&str],
    ) -> ClientResult<T> {
        let body = self.executor.execute(query, variables).await?;
        decode_response(body, path)
    }
}

#[async_trait]
impl<E: GraphqlExecutor> BlazeApi for GraphqlApi<E> {
    async fn feed(&self, limit: i32, cursor: Option<i64>) -> ClientResult<PostPage> {
        let query = format!(
            "query($limit: Int, $cursor: Int) {{ post {{ feed(limit: $limit, cursor: $cursor) \
             {{ items {{ {POST_FIELDS} }} nextCursor }} }} }}"
        );
        self.call(&query, json!({ "limit": limit, "cursor": cursor }), &["post", "feed"])
            .await
    }

    async fn get_post(&self, post_id: i64) -> ClientResult<PostView> {
        let query = format!(
            "query($postId: Int!) {{ post {{ getByPostId(postId: $postId) {{ {POST_FIELDS} }} }} }}"
        );
        self.call(&query, json!({ "postId": post_id }), &["post", "getByPostId"])
            .await
    }

    async fn bookmarked_posts(&self, limit: i32, cursor: Option<i64>) -> ClientResult<PostPage> {
        let query = format!(
            "query($limit: Int, $cursor: Int) {{ bookmark {{ getBookmarkedPosts(limit: $limit, cursor: $cursor) \
             {{ items {{ {POST_FIELDS} }} nextCursor }} }} }}"
        );
        self.call(
            &query,
            json!({ "limit": limit, "cursor": cursor }),
            &["bookmark", "getBookmarkedPosts"],
        )
        .await
    }

    async fn explore(
        &self,
        search: &ExploreSearch,
        limit: i32,
        cursor: Option<i64>,
    ) -> ClientResult<PostPage> {
        let query = format!(
            "query($query: String!, $dateRange: DateRangeInput, $filters: [String!], $sortBy: SortBy, \
             $limit: Int, $cursor: Int) {{ search {{ explore(query: $query, dateRange: $dateRange, \
             filters: $filters, sortBy: $sortBy, limit: $limit, cursor: $cursor) \
             {{ items {{ {POST_FIELDS} }} nextCursor }} }} }}"
        );
        let date_range = if search.from.is_some() || search.to.is_some() {
            json!({ "from": search.from, "to": search.to })
        } else {
            Value::Null
        };
        let variables = json!({
            "query": search.query,
            "dateRange": date_range,
            "filters": search.filters,
            "sortBy": search.sort_by,
            "limit": limit,
            "cursor": cursor,
        });
        self.call(&query, variables, &["search", "explore"]).await
    }

    async fn notifications(&self, since: Option<DateTime<Utc>>) -> ClientResult<Vec<NotificationView>> {
        let query = format!(
            "query($since: DateTime) {{ notifications {{ getNotifications(since: $since) \
             {{ {NOTIFICATION_FIELDS} }} }} }}"
        );
        self.call(
            &query,
            json!({ "since": since }),
            &["notifications", "getNotifications"],
        )
        .await
    }

    async fn toggle_like(&self, post_id: i64) -> ClientResult<bool> {
        self.call(
            "mutation($postId: Int!) { post { toggleLike(postId: $postId) { active } } }",
            json!({ "postId": post_id }),
            &["post", "toggleLike", "active"],
        )
        .await
    }

    async fn toggle_repost(&self, post_id: i64) -> ClientResult<bool> {
        self.call(
            "mutation($postId: Int!) { post { toggleRepost(postId: $postId) { active } } }",
            json!({ "postId": post_id }),
            &["post", "toggleRepost", "active"],
        )
        .await
    }

    async fn toggle_bookmark(&self, post_id: i64) -> ClientResult<bool> {
        self.call(
            "mutation($postId: Int!) { bookmark { toggle(postId: $postId) { bookmarked } } }",
            json!({ "postId": post_id }),
            &["bookmark", "toggle", "bookmarked"],
        )
        .await
    }

    async fn mark_as_read(&self, notification_ids: &[i64]) -> ClientResult<()> {
        let _: bool = self
            .call(
                "mutation($ids: [Int!]!) { notifications { markAsRead(notificationIds: $ids) { success } } }",
                json!({ "ids": notification_ids }),
                &["notifications", "markAsRead", "success"],
            )
            .await?;
        Ok(())
    }
}
