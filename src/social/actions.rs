//! Action service: every state change a user can make.
//!
//! Each multi-row action runs in one `BEGIN IMMEDIATE` transaction, so counters,
//! join rows and notifications commit together or not at all. Join tables carry
//! UNIQUE indexes, which backstop the check-then-act toggles against double submits.

use rusqlite::{params, Connection, OptionalExtension};

use super::domain::{
    extract_hashtags, normalize_hashtags, validate_content, validate_username, NotificationKind,
    ToggleKind,
};
use super::notify::{notify, notify_mentions, Notice};
use crate::db;
use crate::error::{is_constraint_violation, AppError, AppResult};

pub(crate) fn post_author(conn: &Connection, post_id: i64) -> AppResult<String> {
    conn.query_row(
        "SELECT author_id FROM posts WHERE id = ?1",
        params![post_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound("Post not found".into()))
}

/// Create a post, linking explicit and inline hashtags. Returns the new post id.
pub fn create_post(
    conn: &mut Connection,
    author_id: &str,
    content: &str,
    hashtags: &[String],
) -> AppResult<i64> {
    let content = validate_content(content, "Post")?;
    let tags = normalize_hashtags(
        hashtags
            .iter()
            .map(String::as_str)
            .chain(extract_hashtags(&content)),
    )?;

    db::immediate(conn, |tx| {
        tx.execute(
            "INSERT INTO posts (content, author_id) VALUES (?1, ?2)",
            params![content, author_id],
        )?;
        let post_id = tx.last_insert_rowid();

        for tag in &tags {
            tx.execute(
                "INSERT INTO hashtags (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
                params![tag],
            )?;
            let hashtag_id: i64 = tx.query_row(
                "SELECT id FROM hashtags WHERE name = ?1",
                params![tag],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO post_hashtags (post_id, hashtag_id) VALUES (?1, ?2)",
                params![post_id, hashtag_id],
            )?;
        }

        notify_mentions(tx, &content, author_id, post_id, None)?;

        tracing::debug!("User {} created post {} with tags {:?}", author_id, post_id, tags);
        Ok(post_id)
    })
}

/// Flip a like, repost or bookmark. Returns whether the row exists afterwards.
pub fn toggle(
    conn: &mut Connection,
    kind: ToggleKind,
    post_id: i64,
    user_id: &str,
) -> AppResult<bool> {
    db::immediate(conn, |tx| {
        let author = post_author(tx, post_id)?;
        let table = kind.table();

        let removed = tx.execute(
            &format!("DELETE FROM {table} WHERE post_id = ?1 AND user_id = ?2"),
            params![post_id, user_id],
        )?;
        if removed > 0 {
            tracing::debug!("User {} undid {:?} on post {}", user_id, kind, post_id);
            return Ok(false);
        }

        tx.execute(
            &format!("INSERT INTO {table} (post_id, user_id) VALUES (?1, ?2)"),
            params![post_id, user_id],
        )?;

        if let Some(notification) = kind.notification() {
            notify(
                tx,
                &Notice {
                    recipient: &author,
                    actor: user_id,
                    kind: notification,
                    post_id: Some(post_id),
                    comment_id: None,
                },
            )?;
        }

        tracing::debug!("User {} did {:?} on post {}", user_id, kind, post_id);
        Ok(true)
    })
}

/// One-way repost. A second repost of the same post is a conflict.
pub fn repost(conn: &mut Connection, post_id: i64, user_id: &str) -> AppResult<()> {
    db::immediate(conn, |tx| {
        let author = post_author(tx, post_id)?;

        match tx.execute(
            "INSERT INTO reposts (post_id, user_id) VALUES (?1, ?2)",
            params![post_id, user_id],
        ) {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                return Err(AppError::Conflict("Already reposted".into()));
            }
            Err(e) => return Err(e.into()),
        }

        notify(
            tx,
            &Notice {
                recipient: &author,
                actor: user_id,
                kind: NotificationKind::Repost,
                post_id: Some(post_id),
                comment_id: None,
            },
        )?;
        Ok(())
    })
}

/// Top-level comment on a post. Returns the new comment id.
pub fn add_comment(
    conn: &mut Connection,
    author_id: &str,
    post_id: i64,
    content: &str,
) -> AppResult<i64> {
    let content = validate_content(content, "Comment")?;

    db::immediate(conn, |tx| {
        let updated = tx.execute(
            "UPDATE posts SET comment_count = comment_count + 1 WHERE id = ?1",
            params![post_id],
        )?;
        if updated == 0 {
            return Err(AppError::NotFound("Post not found".into()));
        }
        let post_owner = post_author(tx, post_id)?;

        tx.execute(
            "INSERT INTO comments (post_id, author_id, content, depth) VALUES (?1, ?2, ?3, 0)",
            params![post_id, author_id, content],
        )?;
        let comment_id = tx.last_insert_rowid();

        notify(
            tx,
            &Notice {
                recipient: &post_owner,
                actor: author_id,
                kind: NotificationKind::Comment,
                post_id: Some(post_id),
                comment_id: Some(comment_id),
            },
        )?;
        notify_mentions(tx, &content, author_id, post_id, Some(comment_id))?;

        tracing::debug!("User {} commented {} on post {}", author_id, comment_id, post_id);
        Ok(comment_id)
    })
}

/// Reply to a comment. Depth and root post come from the parent.
pub fn create_child_comment(
    conn: &mut Connection,
    author_id: &str,
    parent_comment_id: i64,
    content: &str,
) -> AppResult<i64> {
    let content = validate_content(content, "Comment")?;

    db::immediate(conn, |tx| {
        let (post_id, depth, parent_author): (i64, i64, String) = tx
            .query_row(
                "SELECT post_id, depth, author_id FROM comments WHERE id = ?1",
                params![parent_comment_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
            .ok_or_else(|| AppError::NotFound("Parent comment not found".into()))?;

        tx.execute(
            "UPDATE comments SET comment_counts = comment_counts + 1 WHERE id = ?1",
            params![parent_comment_id],
        )?;
        let updated = tx.execute(
            "UPDATE posts SET comment_count = comment_count + 1 WHERE id = ?1",
            params![post_id],
        )?;
        if updated == 0 {
            return Err(AppError::NotFound("Post not found".into()));
        }

        tx.execute(
            "INSERT INTO comments (post_id, author_id, parent_comment_id, content, depth)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![post_id, author_id, parent_comment_id, content, depth + 1],
        )?;
        let comment_id = tx.last_insert_rowid();

        notify(
            tx,
            &Notice {
                recipient: &parent_author,
                actor: author_id,
                kind: NotificationKind::Comment,
                post_id: Some(post_id),
                comment_id: Some(comment_id),
            },
        )?;
        notify_mentions(tx, &content, author_id, post_id, Some(comment_id))?;

        tracing::debug!(
            "User {} replied {} under comment {} (depth {})",
            author_id,
            comment_id,
            parent_comment_id,
            depth + 1
        );
        Ok(comment_id)
    })
}

/// Follow or unfollow. Returns whether the edge exists afterwards.
pub fn toggle_follow(conn: &mut Connection, follower_id: &str, target_id: &str) -> AppResult<bool> {
    if follower_id == target_id {
        return Err(AppError::BadRequest("You cannot follow yourself".into()));
    }

    db::immediate(conn, |tx| {
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            params![target_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(AppError::NotFound("User not found".into()));
        }

        let removed = tx.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
            params![follower_id, target_id],
        )?;
        if removed > 0 {
            tracing::debug!("User {} unfollowed {}", follower_id, target_id);
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO follows (follower_id, following_id) VALUES (?1, ?2)",
            params![follower_id, target_id],
        )?;
        notify(
            tx,
            &Notice {
                recipient: target_id,
                actor: follower_id,
                kind: NotificationKind::Follow,
                post_id: None,
                comment_id: None,
            },
        )?;

        tracing::debug!("User {} followed {}", follower_id, target_id);
        Ok(true)
    })
}

/// Claim a username. It can be set once and never changed.
pub fn setup_username(conn: &mut Connection, user_id: &str, raw: &str) -> AppResult<String> {
    let username = validate_username(raw)?;

    db::immediate(conn, |tx| {
        let current: Option<String> = tx
            .query_row(
                "SELECT username FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        if current.is_some() {
            return Err(AppError::Forbidden("Username can only be set once".into()));
        }

        let taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
            params![username],
            |row| row.get(0),
        )?;
        if taken {
            return Err(AppError::Conflict("Username already taken".into()));
        }

        match tx.execute(
            "UPDATE users SET username = ?1 WHERE id = ?2",
            params![username, user_id],
        ) {
            Ok(_) => Ok(username.clone()),
            Err(e) if is_constraint_violation(&e) => {
                Err(AppError::Conflict("Username already taken".into()))
            }
            Err(e) => Err(e.into()),
        }
    })
}

/// Mark the caller's notifications read. Ids belonging to others are ignored.
pub fn mark_as_read(conn: &Connection, user_id: &str, notification_ids: &[i64]) -> AppResult<usize> {
    let ids = serde_json::to_string(notification_ids)?;
    let updated = conn.execute(
        "UPDATE notifications SET read = 1
         WHERE user_id = ?1 AND id IN (SELECT value FROM json_each(?2))",
        params![user_id, ids],
    )?;
    Ok(updated)
}

pub fn mark_all_as_read(conn: &Connection, user_id: &str) -> AppResult<usize> {
    let updated = conn.execute(
        "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
        params![user_id],
    )?;
    Ok(updated)
}

pub fn delete_notification(conn: &Connection, user_id: &str, notification_id: i64) -> AppResult<bool> {
    let deleted = conn.execute(
        "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
        params![notification_id, user_id],
    )?;
    Ok(deleted > 0)
}
