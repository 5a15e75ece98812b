// Read models shared by the GraphQL surface and the client cache.
use async_graphql::SimpleObject;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::NotificationKind;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub image: Option<String>,
}

/// The one canonical shape of a post, relative to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: i64,
    pub content: String,
    pub author: AuthorSummary,
    pub created_at: DateTime<Utc>,
    pub likes: i64,
    pub reposts: i64,
    pub comments_count: i64,
    pub has_liked: bool,
    pub has_reposted: bool,
    pub is_bookmarked: bool,
    /// In the order they were attached to the post.
    pub hashtags: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub items: Vec<PostView>,
    pub next_cursor: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub author: AuthorSummary,
    pub parent_comment_id: Option<i64>,
    pub content: String,
    pub depth: i64,
    /// Number of direct replies.
    pub comment_counts: i64,
    pub created_at: DateTime<Utc>,
    /// Eager preview of direct replies; empty unless loaded by `getComments`.
    pub child_comments: Vec<CommentView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct HashtagView {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct TrendingHashtag {
    pub name: String,
    /// Distinct posts carrying the tag.
    pub count: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub users: Vec<AuthorSummary>,
    pub hashtags: Vec<TrendingHashtag>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub image: Option<String>,
    pub bio: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub image: Option<String>,
    pub bio: Option<String>,
    pub followers: i64,
    pub following: i64,
    pub posts: i64,
    pub is_following: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPost {
    pub id: i64,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct NotificationComment {
    pub id: i64,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: i64,
    #[graphql(name = "type")]
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub actor: AuthorSummary,
    pub post: Option<NotificationPost>,
    pub comment: Option<NotificationComment>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
pub struct UnreadCount {
    pub count: i64,
}
