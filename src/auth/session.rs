use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::state::DbPool;

/// Create a new session for a user. Returns the session token.
pub fn create_session(pool: &DbPool, user_id: &str, hours: u64) -> AppResult<String> {
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    tracing::debug!("Created session for user {}", user_id);
    Ok(token)
}

/// Delete a session by token.
pub fn delete_session(pool: &DbPool, token: &str) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Resolve an unexpired session token to its user.
pub fn lookup_session(pool: &DbPool, token: &str) -> AppResult<Option<CurrentUser>> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            "SELECT u.id, u.name, u.username FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.token = ?1 AND s.expires_at > datetime('now')",
            params![token],
            |row| {
                Ok(CurrentUser {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    username: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_pool;

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn session_lifecycle() {
        let (pool, _tmp) = test_pool();
        pool.get()
            .unwrap()
            .execute("INSERT INTO users (id, username) VALUES ('u1', 'alice')", [])
            .unwrap();

        let token = create_session(&pool, "u1", 1).unwrap();
        let user = lookup_session(&pool, &token).unwrap().unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.username.as_deref(), Some("alice"));

        assert!(lookup_session(&pool, "bogus").unwrap().is_none());

        delete_session(&pool, &token).unwrap();
        assert!(lookup_session(&pool, &token).unwrap().is_none());
    }

    #[test]
    fn expired_session_is_ignored() {
        let (pool, _tmp) = test_pool();
        let conn = pool.get().unwrap();
        conn.execute("INSERT INTO users (id) VALUES ('u1')", []).unwrap();
        conn.execute(
            "INSERT INTO sessions (id, user_id, token, expires_at)
             VALUES ('s1', 'u1', 'old', datetime('now', '-1 hours'))",
            [],
        )
        .unwrap();
        assert!(lookup_session(&pool, "old").unwrap().is_none());
    }
}
