use async_graphql::*;

use super::schema::{conn, require_user, resolve};
use super::types::{BookmarkResult, FollowResult, SuccessResult, ToggleResult};
use crate::social::actions;
use crate::social::domain::ToggleKind;
use crate::social::queries;
use crate::social::views::{CommentView, PostView, UserAccount};

/// GraphQL Mutation root. Every mutation requires a caller.
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn post(&self) -> PostMutation {
        PostMutation
    }

    async fn comment(&self) -> CommentMutation {
        CommentMutation
    }

    async fn bookmark(&self) -> BookmarkMutation {
        BookmarkMutation
    }

    async fn user(&self) -> UserMutation {
        UserMutation
    }

    async fn notifications(&self) -> NotificationMutation {
        NotificationMutation
    }
}

fn toggle(ctx: &Context<'_>, kind: ToggleKind, post_id: i64) -> Result<bool> {
    let user = require_user(ctx)?;
    let mut conn = conn(ctx)?;
    resolve(actions::toggle(&mut conn, kind, post_id, &user.id))
}

pub struct PostMutation;

#[Object]
impl PostMutation {
    /// Create a post. Hashtags are merged with `#tags` found in the content.
    async fn create(
        &self,
        ctx: &Context<'_>,
        content: String,
        hashtags: Option<Vec<String>>,
    ) -> Result<PostView> {
        let user = require_user(ctx)?;
        let mut conn = conn(ctx)?;
        let post_id = resolve(actions::create_post(
            &mut conn,
            &user.id,
            &content,
            &hashtags.unwrap_or_default(),
        ))?;
        resolve(queries::get_post(&conn, Some(&user.id), post_id))
    }

    async fn toggle_like(&self, ctx: &Context<'_>, post_id: i64) -> Result<ToggleResult> {
        let active = toggle(ctx, ToggleKind::Like, post_id)?;
        Ok(ToggleResult {
            success: true,
            active,
        })
    }

    async fn toggle_repost(&self, ctx: &Context<'_>, post_id: i64) -> Result<ToggleResult> {
        let active = toggle(ctx, ToggleKind::Repost, post_id)?;
        Ok(ToggleResult {
            success: true,
            active,
        })
    }

    /// One-way repost. Fails with CONFLICT when already reposted.
    async fn repost(&self, ctx: &Context<'_>, post_id: i64) -> Result<SuccessResult> {
        let user = require_user(ctx)?;
        let mut conn = conn(ctx)?;
        resolve(actions::repost(&mut conn, post_id, &user.id))?;
        Ok(SuccessResult::ok())
    }

    async fn add_comment(
        &self,
        ctx: &Context<'_>,
        post_id: i64,
        content: String,
    ) -> Result<CommentView> {
        let user = require_user(ctx)?;
        let mut conn = conn(ctx)?;
        let comment_id = resolve(actions::add_comment(&mut conn, &user.id, post_id, &content))?;
        resolve(queries::comment(&conn, comment_id))
    }
}

pub struct CommentMutation;

#[Object]
impl CommentMutation {
    async fn create_child_comment(
        &self,
        ctx: &Context<'_>,
        parent_comment_id: i64,
        content: String,
    ) -> Result<CommentView> {
        let user = require_user(ctx)?;
        let mut conn = conn(ctx)?;
        let comment_id = resolve(actions::create_child_comment(
            &mut conn,
            &user.id,
            parent_comment_id,
            &content,
        ))?;
        resolve(queries::comment(&conn, comment_id))
    }
}

pub struct BookmarkMutation;

#[Object]
impl BookmarkMutation {
    async fn toggle(&self, ctx: &Context<'_>, post_id: i64) -> Result<BookmarkResult> {
        let bookmarked = toggle(ctx, ToggleKind::Bookmark, post_id)?;
        Ok(BookmarkResult { bookmarked })
    }
}

pub struct UserMutation;

#[Object]
impl UserMutation {
    async fn toggle_follow(&self, ctx: &Context<'_>, user_id: String) -> Result<FollowResult> {
        let user = require_user(ctx)?;
        let mut conn = conn(ctx)?;
        let following = resolve(actions::toggle_follow(&mut conn, &user.id, &user_id))?;
        Ok(FollowResult {
            success: true,
            following,
        })
    }

    /// Claim a username. Allowed once per account.
    async fn setup(&self, ctx: &Context<'_>, username: String) -> Result<UserAccount> {
        let user = require_user(ctx)?;
        let mut conn = conn(ctx)?;
        resolve(actions::setup_username(&mut conn, &user.id, &username))?;
        resolve(queries::me(&conn, &user.id))
    }
}

pub struct NotificationMutation;

#[Object]
impl NotificationMutation {
    async fn mark_as_read(
        &self,
        ctx: &Context<'_>,
        notification_ids: Vec<i64>,
    ) -> Result<SuccessResult> {
        let user = require_user(ctx)?;
        let conn = conn(ctx)?;
        resolve(actions::mark_as_read(&conn, &user.id, &notification_ids))?;
        Ok(SuccessResult::ok())
    }

    async fn mark_all_as_read(&self, ctx: &Context<'_>) -> Result<SuccessResult> {
        let user = require_user(ctx)?;
        let conn = conn(ctx)?;
        resolve(actions::mark_all_as_read(&conn, &user.id))?;
        Ok(SuccessResult::ok())
    }

    async fn delete_notification(
        &self,
        ctx: &Context<'_>,
        notification_id: i64,
    ) -> Result<SuccessResult> {
        let user = require_user(ctx)?;
        let conn = conn(ctx)?;
        let deleted = resolve(actions::delete_notification(&conn, &user.id, notification_id))?;
        Ok(SuccessResult { success: deleted })
    }
}
