use async_graphql::*;
use chrono::{DateTime, Utc};

use super::schema::{conn, feed_config, page, require_user, resolve, viewer_id};
use super::types::{BookmarkResult, DateRangeInput};
use crate::error::AppError;
use crate::social::domain::SortBy;
use crate::social::queries::{self, ExploreParams};
use crate::social::views::{
    CommentView, HashtagView, NotificationView, PostPage, PostView, SearchResults,
    TrendingHashtag, UnreadCount, UserAccount, UserProfile,
};

/// GraphQL Query root. Each field is a procedure namespace.
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn post(&self) -> PostQuery {
        PostQuery
    }

    async fn comment(&self) -> CommentQuery {
        CommentQuery
    }

    async fn bookmark(&self) -> BookmarkQuery {
        BookmarkQuery
    }

    async fn hashtag(&self) -> HashtagQuery {
        HashtagQuery
    }

    async fn search(&self) -> SearchQuery {
        SearchQuery
    }

    async fn notifications(&self) -> NotificationQuery {
        NotificationQuery
    }

    async fn user(&self) -> UserQuery {
        UserQuery
    }
}

fn latest(ctx: &Context<'_>, limit: Option<i32>, cursor: Option<i64>) -> Result<PostPage> {
    let page = page(ctx, limit, cursor)?;
    let conn = conn(ctx)?;
    resolve(queries::feed(&conn, viewer_id(ctx), &page))
}

pub struct PostQuery;

#[Object]
impl PostQuery {
    /// Newest-first global feed.
    async fn feed(
        &self,
        ctx: &Context<'_>,
        limit: Option<i32>,
        cursor: Option<i64>,
    ) -> Result<PostPage> {
        latest(ctx, limit, cursor)
    }

    /// Same as `feed`.
    async fn get_latest(
        &self,
        ctx: &Context<'_>,
        limit: Option<i32>,
        cursor: Option<i64>,
    ) -> Result<PostPage> {
        latest(ctx, limit, cursor)
    }

    async fn get_by_post_id(&self, ctx: &Context<'_>, post_id: i64) -> Result<PostView> {
        let conn = conn(ctx)?;
        resolve(queries::get_post(&conn, viewer_id(ctx), post_id))
    }

    /// Top-level comments with a preview of their first replies.
    async fn get_comments(&self, ctx: &Context<'_>, post_id: i64) -> Result<Vec<CommentView>> {
        let preview = feed_config(ctx).comment_preview as usize;
        let conn = conn(ctx)?;
        resolve(queries::comments_for_post(&conn, post_id, preview))
    }

    async fn by_author(
        &self,
        ctx: &Context<'_>,
        username: String,
        limit: Option<i32>,
        cursor: Option<i64>,
    ) -> Result<PostPage> {
        let page = page(ctx, limit, cursor)?;
        let conn = conn(ctx)?;
        resolve(queries::posts_by_author(&conn, viewer_id(ctx), &username, &page))
    }
}

pub struct CommentQuery;

#[Object]
impl CommentQuery {
    async fn get_child_comments(
        &self,
        ctx: &Context<'_>,
        parent_comment_id: i64,
    ) -> Result<Vec<CommentView>> {
        let conn = conn(ctx)?;
        resolve(queries::child_comments(&conn, parent_comment_id))
    }
}

pub struct BookmarkQuery;

#[Object]
impl BookmarkQuery {
    async fn get_bookmarked_posts(
        &self,
        ctx: &Context<'_>,
        limit: Option<i32>,
        cursor: Option<i64>,
    ) -> Result<PostPage> {
        let user = require_user(ctx)?;
        let page = page(ctx, limit, cursor)?;
        let conn = conn(ctx)?;
        resolve(queries::bookmarked_posts(&conn, &user.id, &page))
    }

    async fn get_bookmark_status(&self, ctx: &Context<'_>, post_id: i64) -> Result<BookmarkResult> {
        let user = require_user(ctx)?;
        let conn = conn(ctx)?;
        let bookmarked = resolve(queries::bookmark_status(&conn, &user.id, post_id))?;
        Ok(BookmarkResult { bookmarked })
    }
}

pub struct HashtagQuery;

#[Object]
impl HashtagQuery {
    async fn get_trending(&self, ctx: &Context<'_>, limit: Option<i32>) -> Result<Vec<TrendingHashtag>> {
        let feed = feed_config(ctx);
        let limit = limit.unwrap_or(feed.trending_limit as i32);
        if limit < 1 || limit as u32 > feed.max_limit {
            return Err(AppError::BadRequest(format!(
                "limit must be between 1 and {}",
                feed.max_limit
            ))
            .extend());
        }
        let conn = conn(ctx)?;
        resolve(queries::trending(&conn, limit as usize))
    }

    async fn get_posts_by_tag(
        &self,
        ctx: &Context<'_>,
        tag: String,
        limit: Option<i32>,
        cursor: Option<i64>,
    ) -> Result<PostPage> {
        let page = page(ctx, limit, cursor)?;
        let conn = conn(ctx)?;
        resolve(queries::posts_by_tag(&conn, viewer_id(ctx), &tag, &page))
    }

    async fn search(&self, ctx: &Context<'_>, query: String) -> Result<Vec<HashtagView>> {
        let conn = conn(ctx)?;
        resolve(queries::search_hashtags(&conn, &query))
    }
}

pub struct SearchQuery;

#[Object]
impl SearchQuery {
    async fn all(&self, ctx: &Context<'_>, query: String) -> Result<SearchResults> {
        let conn = conn(ctx)?;
        resolve(queries::search_all(&conn, &query))
    }

    /// `from:<username>` and `#<tag>` tokens filter; the rest matches content.
    async fn explore(
        &self,
        ctx: &Context<'_>,
        query: String,
        date_range: Option<DateRangeInput>,
        filters: Option<Vec<String>>,
        sort_by: Option<SortBy>,
        limit: Option<i32>,
        cursor: Option<i64>,
    ) -> Result<PostPage> {
        let page = page(ctx, limit, cursor)?;
        let range = date_range.unwrap_or_default();
        let search = ExploreParams {
            query,
            from: range.from,
            to: range.to,
            filters: filters.unwrap_or_default(),
            sort_by: sort_by.unwrap_or_default(),
        };
        let conn = conn(ctx)?;
        resolve(queries::explore(&conn, viewer_id(ctx), &search, &page))
    }
}

pub struct NotificationQuery;

#[Object]
impl NotificationQuery {
    /// The caller's notifications newer than `since`, newest first.
    async fn get_notifications(
        &self,
        ctx: &Context<'_>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<NotificationView>> {
        let user = require_user(ctx)?;
        let conn = conn(ctx)?;
        resolve(queries::notifications(&conn, &user.id, since.as_ref()))
    }

    async fn get_unread_count(&self, ctx: &Context<'_>) -> Result<UnreadCount> {
        let user = require_user(ctx)?;
        let conn = conn(ctx)?;
        let count = resolve(queries::unread_count(&conn, &user.id))?;
        Ok(UnreadCount { count })
    }
}

pub struct UserQuery;

#[Object]
impl UserQuery {
    async fn me(&self, ctx: &Context<'_>) -> Result<UserAccount> {
        let user = require_user(ctx)?;
        let conn = conn(ctx)?;
        resolve(queries::me(&conn, &user.id))
    }

    async fn profile(&self, ctx: &Context<'_>, username: String) -> Result<UserProfile> {
        let conn = conn(ctx)?;
        resolve(queries::user_profile(&conn, viewer_id(ctx), &username))
    }
}
