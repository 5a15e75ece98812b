//! Read service. Every post read goes through [`project_posts`], so all lists and
//! detail views agree on counts and viewer flags.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::domain::{ExploreQuery, NotificationKind, SortBy};
use super::pagination::PageRequest;
use super::views::{
    AuthorSummary, CommentView, HashtagView, NotificationComment, NotificationPost,
    NotificationView, PostPage, PostView, SearchResults, TrendingHashtag, UserAccount, UserProfile,
};
use crate::db::models::{sql_timestamp, timestamp};
use crate::error::{AppError, AppResult};

const SEARCH_LIMIT: i64 = 5;

fn author_at(row: &Row<'_>, start: usize) -> rusqlite::Result<AuthorSummary> {
    Ok(AuthorSummary {
        id: row.get(start)?,
        name: row.get(start + 1)?,
        username: row.get(start + 2)?,
        image: row.get(start + 3)?,
    })
}

fn query_ids<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> AppResult<Vec<i64>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map(params, |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

/// Project post ids into [`PostView`]s for `viewer`, preserving the order of `ids`.
/// Ids that no longer exist are skipped.
pub fn project_posts(conn: &Connection, viewer: Option<&str>, ids: &[i64]) -> AppResult<Vec<PostView>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let ids_json = serde_json::to_string(ids)?;

    let mut stmt = conn.prepare(
        "SELECT p.id, p.content, p.created_at, p.comment_count,
                u.id, u.name, u.username, u.image,
                (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id),
                (SELECT COUNT(*) FROM reposts r WHERE r.post_id = p.id),
                EXISTS(SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = ?2),
                EXISTS(SELECT 1 FROM reposts r WHERE r.post_id = p.id AND r.user_id = ?2),
                EXISTS(SELECT 1 FROM bookmarks b WHERE b.post_id = p.id AND b.user_id = ?2)
         FROM posts p
         JOIN users u ON u.id = p.author_id
         WHERE p.id IN (SELECT value FROM json_each(?1))",
    )?;
    let mut by_id: HashMap<i64, PostView> = stmt
        .query_map(params![ids_json, viewer], |row| {
            Ok(PostView {
                id: row.get(0)?,
                content: row.get(1)?,
                created_at: timestamp(row, 2)?,
                comments_count: row.get(3)?,
                author: author_at(row, 4)?,
                likes: row.get(8)?,
                reposts: row.get(9)?,
                has_liked: row.get(10)?,
                has_reposted: row.get(11)?,
                is_bookmarked: row.get(12)?,
                hashtags: Vec::new(),
            })
        })?
        .map(|r| r.map(|post| (post.id, post)))
        .collect::<Result<_, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT ph.post_id, h.name
         FROM post_hashtags ph
         JOIN hashtags h ON h.id = ph.hashtag_id
         WHERE ph.post_id IN (SELECT value FROM json_each(?1))
         ORDER BY ph.id",
    )?;
    let tags = stmt.query_map(params![ids_json], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?;
    for tag in tags {
        let (post_id, name) = tag?;
        if let Some(post) = by_id.get_mut(&post_id) {
            post.hashtags.push(name);
        }
    }

    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

fn post_page(
    conn: &Connection,
    viewer: Option<&str>,
    page: &PageRequest,
    ids: Vec<i64>,
) -> AppResult<PostPage> {
    let (ids, next_cursor) = page.split(ids, |id| *id);
    Ok(PostPage {
        items: project_posts(conn, viewer, &ids)?,
        next_cursor,
    })
}

/// Newest-first global feed.
pub fn feed(conn: &Connection, viewer: Option<&str>, page: &PageRequest) -> AppResult<PostPage> {
    let ids = query_ids(
        conn,
        "SELECT id FROM posts WHERE (?1 IS NULL OR id <= ?1) ORDER BY id DESC LIMIT ?2",
        params![page.cursor, page.fetch_size()],
    )?;
    post_page(conn, viewer, page, ids)
}

pub fn get_post(conn: &Connection, viewer: Option<&str>, post_id: i64) -> AppResult<PostView> {
    project_posts(conn, viewer, &[post_id])?
        .pop()
        .ok_or_else(|| AppError::NotFound("Post not found".into()))
}

fn user_id_by_username(conn: &Connection, username: &str) -> AppResult<String> {
    conn.query_row(
        "SELECT id FROM users WHERE username = ?1",
        params![username.trim_start_matches('@').to_lowercase()],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub fn posts_by_author(
    conn: &Connection,
    viewer: Option<&str>,
    username: &str,
    page: &PageRequest,
) -> AppResult<PostPage> {
    let author_id = user_id_by_username(conn, username)?;
    let ids = query_ids(
        conn,
        "SELECT id FROM posts
         WHERE author_id = ?1 AND (?2 IS NULL OR id <= ?2)
         ORDER BY id DESC LIMIT ?3",
        params![author_id, page.cursor, page.fetch_size()],
    )?;
    post_page(conn, viewer, page, ids)
}

pub fn posts_by_tag(
    conn: &Connection,
    viewer: Option<&str>,
    tag: &str,
    page: &PageRequest,
) -> AppResult<PostPage> {
    let tag = tag.trim().trim_start_matches('#').to_lowercase();
    let ids = query_ids(
        conn,
        "SELECT p.id FROM posts p
         JOIN post_hashtags ph ON ph.post_id = p.id
         JOIN hashtags h ON h.id = ph.hashtag_id
         WHERE h.name = ?1 AND (?2 IS NULL OR p.id <= ?2)
         ORDER BY p.id DESC LIMIT ?3",
        params![tag, page.cursor, page.fetch_size()],
    )?;
    post_page(conn, viewer, page, ids)
}

/// The caller's bookmarks, most recently bookmarked first. The cursor is a bookmark id.
pub fn bookmarked_posts(conn: &Connection, user_id: &str, page: &PageRequest) -> AppResult<PostPage> {
    let mut stmt = conn.prepare(
        "SELECT id, post_id FROM bookmarks
         WHERE user_id = ?1 AND (?2 IS NULL OR id <= ?2)
         ORDER BY id DESC LIMIT ?3",
    )?;
    let rows = stmt
        .query_map(params![user_id, page.cursor, page.fetch_size()], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let (rows, next_cursor) = page.split(rows, |(bookmark_id, _)| *bookmark_id);
    let post_ids: Vec<i64> = rows.iter().map(|(_, post_id)| *post_id).collect();
    Ok(PostPage {
        items: project_posts(conn, Some(user_id), &post_ids)?,
        next_cursor,
    })
}

pub fn bookmark_status(conn: &Connection, user_id: &str, post_id: i64) -> AppResult<bool> {
    let bookmarked = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM bookmarks WHERE post_id = ?1 AND user_id = ?2)",
        params![post_id, user_id],
        |row| row.get(0),
    )?;
    Ok(bookmarked)
}

const COMMENT_SELECT: &str = "SELECT c.id, c.post_id, c.parent_comment_id, c.content, c.depth,
        c.comment_counts, c.created_at, u.id, u.name, u.username, u.image
    FROM comments c
    JOIN users u ON u.id = c.author_id";

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentView> {
    Ok(CommentView {
        id: row.get(0)?,
        post_id: row.get(1)?,
        parent_comment_id: row.get(2)?,
        content: row.get(3)?,
        depth: row.get(4)?,
        comment_counts: row.get(5)?,
        created_at: timestamp(row, 6)?,
        author: author_at(row, 7)?,
        child_comments: Vec::new(),
    })
}

pub fn comment(conn: &Connection, comment_id: i64) -> AppResult<CommentView> {
    conn.query_row(
        &format!("{COMMENT_SELECT} WHERE c.id = ?1"),
        params![comment_id],
        comment_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound("Comment not found".into()))
}

/// Top-level comments oldest first, each with up to `preview` of its earliest replies.
pub fn comments_for_post(conn: &Connection, post_id: i64, preview: usize) -> AppResult<Vec<CommentView>> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
        params![post_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(AppError::NotFound("Post not found".into()));
    }

    let mut stmt = conn.prepare(&format!(
        "{COMMENT_SELECT} WHERE c.post_id = ?1 AND c.parent_comment_id IS NULL ORDER BY c.id"
    ))?;
    let mut top = stmt
        .query_map(params![post_id], comment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    if preview == 0 || top.is_empty() {
        return Ok(top);
    }

    let mut stmt = conn.prepare(
        "SELECT id, post_id, parent_comment_id, content, depth, comment_counts, created_at,
                author_id, name, username, image
         FROM (
            SELECT c.id, c.post_id, c.parent_comment_id, c.content, c.depth, c.comment_counts,
                   c.created_at, u.id AS author_id, u.name, u.username, u.image,
                   ROW_NUMBER() OVER (PARTITION BY c.parent_comment_id ORDER BY c.id) AS rn
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.post_id = ?1 AND c.depth = 1
         )
         WHERE rn <= ?2
         ORDER BY id",
    )?;
    let children = stmt.query_map(params![post_id, preview as i64], comment_from_row)?;

    let mut by_parent: HashMap<i64, Vec<CommentView>> = HashMap::new();
    for child in children {
        let child = child?;
        if let Some(parent) = child.parent_comment_id {
            by_parent.entry(parent).or_default().push(child);
        }
    }
    for comment in &mut top {
        if let Some(children) = by_parent.remove(&comment.id) {
            comment.child_comments = children;
        }
    }
    Ok(top)
}

/// All direct replies of a comment, oldest first.
pub fn child_comments(conn: &Connection, parent_comment_id: i64) -> AppResult<Vec<CommentView>> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM comments WHERE id = ?1)",
        params![parent_comment_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(AppError::NotFound("Parent comment not found".into()));
    }

    let mut stmt = conn.prepare(&format!(
        "{COMMENT_SELECT} WHERE c.parent_comment_id = ?1 ORDER BY c.id"
    ))?;
    let children = stmt
        .query_map(params![parent_comment_id], comment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(children)
}

/// Tags by distinct post count, ties by name.
pub fn trending(conn: &Connection, limit: usize) -> AppResult<Vec<TrendingHashtag>> {
    let mut stmt = conn.prepare(
        "SELECT h.name, COUNT(DISTINCT ph.post_id) AS uses
         FROM hashtags h
         JOIN post_hashtags ph ON ph.hashtag_id = h.id
         GROUP BY h.id
         ORDER BY uses DESC, h.name ASC
         LIMIT ?1",
    )?;
    let tags = stmt
        .query_map(params![limit as i64], |row| {
            Ok(TrendingHashtag {
                name: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

/// Hashtags whose name contains `query`, case-insensitive.
pub fn search_hashtags(conn: &Connection, query: &str) -> AppResult<Vec<HashtagView>> {
    let needle = query.trim().trim_start_matches('#').to_lowercase();
    if needle.is_empty() {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(
        "SELECT id, name FROM hashtags WHERE instr(name, ?1) > 0 ORDER BY name LIMIT ?2",
    )?;
    let tags = stmt
        .query_map(params![needle, SEARCH_LIMIT], |row| {
            Ok(HashtagView {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}

/// Typeahead over users and hashtags.
pub fn search_all(conn: &Connection, query: &str) -> AppResult<SearchResults> {
    let needle = query.trim().trim_start_matches(['@', '#']).to_lowercase();
    if needle.is_empty() {
        return Ok(SearchResults {
            users: Vec::new(),
            hashtags: Vec::new(),
        });
    }

    let mut stmt = conn.prepare(
        "SELECT id, name, username, image FROM users
         WHERE instr(fold(coalesce(name, '')), ?1) > 0
            OR instr(coalesce(username, ''), ?1) > 0
         ORDER BY username IS NULL, username, id
         LIMIT ?2",
    )?;
    let users = stmt
        .query_map(params![needle, SEARCH_LIMIT], |row| author_at(row, 0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT h.name, COUNT(ph.post_id) AS uses
         FROM hashtags h
         LEFT JOIN post_hashtags ph ON ph.hashtag_id = h.id
         WHERE instr(h.name, ?1) > 0
         GROUP BY h.id
         ORDER BY uses DESC, h.name ASC
         LIMIT ?2",
    )?;
    let hashtags = stmt
        .query_map(params![needle, SEARCH_LIMIT], |row| {
            Ok(TrendingHashtag {
                name: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SearchResults { users, hashtags })
}

/// Explore search inputs after GraphQL decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExploreParams {
    pub query: String,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub filters: Vec<String>,
    pub sort_by: SortBy,
}

/// Filtered post search. With no text, filters or date range it returns nothing.
pub fn explore(
    conn: &Connection,
    viewer: Option<&str>,
    search: &ExploreParams,
    page: &PageRequest,
) -> AppResult<PostPage> {
    let parsed = ExploreQuery::parse(&search.query, &search.filters);
    if parsed.is_empty() && search.from.is_none() && search.to.is_none() {
        return Ok(PostPage::default());
    }

    let mut conditions: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if !parsed.text.is_empty() {
        conditions.push("instr(fold(p.content), ?) > 0");
        values.push(Value::Text(parsed.text.to_lowercase()));
    }
    if !parsed.authors.is_empty() {
        conditions.push(
            "p.author_id IN (SELECT id FROM users WHERE username IN (SELECT value FROM json_each(?)))",
        );
        values.push(Value::Text(serde_json::to_string(&parsed.authors)?));
    }
    if !parsed.tags.is_empty() {
        conditions.push(
            "EXISTS (SELECT 1 FROM post_hashtags ph JOIN hashtags h ON h.id = ph.hashtag_id
                     WHERE ph.post_id = p.id AND h.name IN (SELECT value FROM json_each(?)))",
        );
        values.push(Value::Text(serde_json::to_string(&parsed.tags)?));
    }
    if let Some(from) = &search.from {
        conditions.push("p.created_at >= ?");
        values.push(Value::Text(sql_timestamp(from)));
    }
    if let Some(to) = &search.to {
        conditions.push("p.created_at <= ?");
        values.push(Value::Text(sql_timestamp(to)));
    }

    let ascending = search.sort_by == SortBy::Oldest;
    if let Some(cursor) = page.cursor {
        conditions.push(if ascending { "p.id >= ?" } else { "p.id <= ?" });
        values.push(Value::Integer(cursor));
    }
    values.push(Value::Integer(page.fetch_size()));

    let sql = format!(
        "SELECT p.id FROM posts p WHERE {} ORDER BY p.id {} LIMIT ?",
        conditions.join(" AND "),
        if ascending { "ASC" } else { "DESC" }
    );
    tracing::debug!("explore: {} ({} params)", sql, values.len());

    let ids = query_ids(conn, &sql, params_from_iter(values))?;
    post_page(conn, viewer, page, ids)
}

/// The caller's notifications newer than `since`, newest first.
pub fn notifications(
    conn: &Connection,
    user_id: &str,
    since: Option<&DateTime<Utc>>,
) -> AppResult<Vec<NotificationView>> {
    let since = since.map(sql_timestamp);
    let mut stmt = conn.prepare(
        "SELECT n.id, n.type, n.read, n.created_at,
                a.id, a.name, a.username, a.image,
                p.id, p.content, c.id, c.content
         FROM notifications n
         JOIN users a ON a.id = n.actor_id
         LEFT JOIN posts p ON p.id = n.post_id
         LEFT JOIN comments c ON c.id = n.comment_id
         WHERE n.user_id = ?1 AND (?2 IS NULL OR n.created_at > ?2)
         ORDER BY n.created_at DESC, n.id DESC",
    )?;
    let rows = stmt
        .query_map(params![user_id, since], |row| {
            let raw_kind: String = row.get(1)?;
            let kind = NotificationKind::parse(&raw_kind).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    1,
                    Type::Text,
                    format!("unknown notification type {raw_kind}").into(),
                )
            })?;

            let post = match row.get::<_, Option<i64>>(8)? {
                Some(id) => Some(NotificationPost {
                    id,
                    content: row.get(9)?,
                }),
                None => None,
            };
            let comment = match row.get::<_, Option<i64>>(10)? {
                Some(id) => Some(NotificationComment {
                    id,
                    content: row.get(11)?,
                }),
                None => None,
            };

            Ok(NotificationView {
                id: row.get(0)?,
                kind,
                read: row.get(2)?,
                created_at: timestamp(row, 3)?,
                actor: author_at(row, 4)?,
                post,
                comment,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn unread_count(conn: &Connection, user_id: &str) -> AppResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn me(conn: &Connection, user_id: &str) -> AppResult<UserAccount> {
    conn.query_row(
        "SELECT id, name, email, username, image, bio FROM users WHERE id = ?1",
        params![user_id],
        |row| {
            Ok(UserAccount {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                username: row.get(3)?,
                image: row.get(4)?,
                bio: row.get(5)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub fn user_profile(conn: &Connection, viewer: Option<&str>, username: &str) -> AppResult<UserProfile> {
    conn.query_row(
        "SELECT u.id, u.name, u.username, u.image, u.bio,
                (SELECT COUNT(*) FROM follows f WHERE f.following_id = u.id),
                (SELECT COUNT(*) FROM follows f WHERE f.follower_id = u.id),
                (SELECT COUNT(*) FROM posts p WHERE p.author_id = u.id),
                EXISTS(SELECT 1 FROM follows f WHERE f.follower_id = ?2 AND f.following_id = u.id)
         FROM users u WHERE u.username = ?1",
        params![username.trim_start_matches('@').to_lowercase(), viewer],
        |row| {
            Ok(UserProfile {
                id: row.get(0)?,
                name: row.get(1)?,
                username: row.get(2)?,
                image: row.get(3)?,
                bio: row.get(4)?,
                followers: row.get(5)?,
                following: row.get(6)?,
                posts: row.get(7)?,
                is_following: row.get(8)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound("User not found".into()))
}
