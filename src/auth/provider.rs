//! Account records come from an external identity provider. We only mirror
//! what it vouches for; passwords and OAuth flows live there.

use rusqlite::params;
use serde::Deserialize;

use crate::db::models::User;
use crate::error::{is_constraint_violation, AppError, AppResult};
use crate::state::DbPool;

/// Identity asserted by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUser {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

/// Insert or refresh the local user row. Username and bio are owned locally and never touched.
pub fn sync_user(pool: &DbPool, identity: &ProviderUser) -> AppResult<User> {
    if identity.id.trim().is_empty() {
        return Err(AppError::BadRequest("Provider user id is required".into()));
    }

    let conn = pool.get()?;
    match conn.execute(
        "INSERT INTO users (id, name, email, image) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            email = excluded.email,
            image = excluded.image",
        params![identity.id, identity.name, identity.email, identity.image],
    ) {
        Ok(_) => {}
        // Only the email is unique besides the id.
        Err(e) if is_constraint_violation(&e) => {
            return Err(AppError::Conflict("Email already belongs to another account".into()));
        }
        Err(e) => return Err(e.into()),
    }

    let user = conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS),
        params![identity.id],
        User::from_row,
    )?;

    tracing::debug!("Synced user {} from provider", user.id);
    Ok(user)
}
