use async_graphql::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive creation-time window for explore.
#[derive(Clone, Debug, Default, InputObject)]
pub struct DateRangeInput {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Outcome of a like or repost toggle.
#[derive(Clone, Debug, Serialize, Deserialize, SimpleObject)]
pub struct ToggleResult {
    pub success: bool,
    /// Whether the like/repost exists after the toggle.
    pub active: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, SimpleObject)]
pub struct BookmarkResult {
    pub bookmarked: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, SimpleObject)]
pub struct FollowResult {
    pub success: bool,
    pub following: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, SimpleObject)]
pub struct SuccessResult {
    pub success: bool,
}

impl SuccessResult {
    pub fn ok() -> Self {
        Self { success: true }
    }
}
