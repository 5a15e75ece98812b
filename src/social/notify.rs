// Notification fan-out. Runs inside the caller's transaction.
use rusqlite::{params, Connection, OptionalExtension};

use super::domain::{extract_mentions, NotificationKind};
use crate::error::AppResult;

pub struct Notice<'a> {
    pub recipient: &'a str,
    pub actor: &'a str,
    pub kind: NotificationKind,
    pub post_id: Option<i64>,
    pub comment_id: Option<i64>,
}

/// Insert a notification unless the actor is acting on their own content.
pub fn notify(conn: &Connection, notice: &Notice<'_>) -> AppResult<Option<i64>> {
    if notice.recipient == notice.actor {
        return Ok(None);
    }

    conn.execute(
        "INSERT INTO notifications (user_id, actor_id, type, post_id, comment_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            notice.recipient,
            notice.actor,
            notice.kind.as_str(),
            notice.post_id,
            notice.comment_id
        ],
    )?;
    let id = conn.last_insert_rowid();

    tracing::debug!(
        "Notified {} of {} by {} (post {:?}, comment {:?})",
        notice.recipient,
        notice.kind.as_str(),
        notice.actor,
        notice.post_id,
        notice.comment_id
    );
    Ok(Some(id))
}

/// One "mention" per resolvable `@username` in `content`. Returns how many were sent.
pub fn notify_mentions(
    conn: &Connection,
    content: &str,
    actor: &str,
    post_id: i64,
    comment_id: Option<i64>,
) -> AppResult<usize> {
    let mut sent = 0;
    for username in extract_mentions(content) {
        let recipient: Option<String> = conn
            .query_row(
                "SELECT id FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;

        let Some(recipient) = recipient else {
            continue;
        };

        let notice = Notice {
            recipient: &recipient,
            actor,
            kind: NotificationKind::Mention,
            post_id: Some(post_id),
            comment_id,
        };
        if notify(conn, &notice)?.is_some() {
            sent += 1;
        }
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_pool;

    fn seed(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO users (id, username) VALUES ('a', 'alice'), ('b', 'bob');
             INSERT INTO posts (content, author_id) VALUES ('hello', 'a');",
        )
        .unwrap();
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM notifications", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn self_actions_are_skipped() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        seed(&conn);

        let notice = Notice {
            recipient: "a",
            actor: "a",
            kind: NotificationKind::Like,
            post_id: Some(1),
            comment_id: None,
        };
        assert_eq!(notify(&conn, &notice).unwrap(), None);
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn other_actor_creates_row() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        seed(&conn);

        let notice = Notice {
            recipient: "a",
            actor: "b",
            kind: NotificationKind::Like,
            post_id: Some(1),
            comment_id: None,
        };
        assert!(notify(&conn, &notice).unwrap().is_some());

        let (kind, read): (String, bool) = conn
            .query_row("SELECT type, read FROM notifications", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(kind, "like");
        assert!(!read);
    }

    #[test]
    fn mentions_resolve_known_users_only_and_skip_author() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        seed(&conn);

        let sent = notify_mentions(&conn, "@bob @alice @ghost @BOB", "a", 1, None).unwrap();
        assert_eq!(sent, 1);

        let recipient: String = conn
            .query_row("SELECT user_id FROM notifications WHERE type = 'mention'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(recipient, "b");
    }
}
