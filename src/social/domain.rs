// Pure domain rules: validation, text scanning, toggle kinds. No I/O.
use async_graphql::Enum;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const MAX_CONTENT_CHARS: usize = 256;
pub const MAX_HASHTAG_CHARS: usize = 50;

lazy_static! {
    static ref HASHTAG: Regex = Regex::new(r"(?:^|[^\w&#])#(\w+)").unwrap();
    static ref MENTION: Regex = Regex::new(r"(?:^|[^\w@])@(\w+)").unwrap();
    static ref USERNAME: Regex = Regex::new(r"^[A-Za-z0-9_]{3,30}$").unwrap();
}

/// The join-row actions a user can flip on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleKind {
    Like,
    Repost,
    Bookmark,
}

impl ToggleKind {
    pub fn table(&self) -> &'static str {
        match self {
            ToggleKind::Like => "likes",
            ToggleKind::Repost => "reposts",
            ToggleKind::Bookmark => "bookmarks",
        }
    }

    /// Bookmarks are private, so they never notify the author.
    pub fn notification(&self) -> Option<NotificationKind> {
        match self {
            ToggleKind::Like => Some(NotificationKind::Like),
            ToggleKind::Repost => Some(NotificationKind::Repost),
            ToggleKind::Bookmark => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Enum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
    Mention,
    Repost,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Like => "like",
            NotificationKind::Comment => "comment",
            NotificationKind::Follow => "follow",
            NotificationKind::Mention => "mention",
            NotificationKind::Repost => "repost",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(NotificationKind::Like),
            "comment" => Some(NotificationKind::Comment),
            "follow" => Some(NotificationKind::Follow),
            "mention" => Some(NotificationKind::Mention),
            "repost" => Some(NotificationKind::Repost),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Enum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortBy {
    #[default]
    Relevance,
    Newest,
    Oldest,
}

/// Trim and bound post/comment bodies.
pub fn validate_content(raw: &str, what: &str) -> AppResult<String> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest(format!("{what} cannot be empty")));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::BadRequest(format!(
            "{what} must be {MAX_CONTENT_CHARS} characters or less"
        )));
    }
    Ok(content.to_string())
}

/// Usernames are stored lower-case.
pub fn validate_username(raw: &str) -> AppResult<String> {
    let username = raw.trim();
    if !USERNAME.is_match(username) {
        return Err(AppError::BadRequest(
            "Username must be 3-30 characters of letters, digits or underscores".into(),
        ));
    }
    Ok(username.to_lowercase())
}

/// Lower-case, strip one leading '#', drop blanks and repeats. First occurrence wins.
pub fn normalize_hashtags<'a>(tags: impl IntoIterator<Item = &'a str>) -> AppResult<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim();
        let name = tag.strip_prefix('#').unwrap_or(tag).trim().to_lowercase();
        if name.is_empty() {
            continue;
        }
        if name.chars().count() > MAX_HASHTAG_CHARS {
            return Err(AppError::BadRequest(format!(
                "Hashtag must be {MAX_HASHTAG_CHARS} characters or less"
            )));
        }
        if !out.contains(&name) {
            out.push(name);
        }
    }
    Ok(out)
}

/// `#tag` tokens in free text, without the '#'. Tokens over the tag limit are
/// plain text, not tags.
pub fn extract_hashtags(content: &str) -> Vec<&str> {
    HASHTAG
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|tag| tag.chars().count() <= MAX_HASHTAG_CHARS)
        .collect()
}

/// `@username` tokens in free text, lower-cased and de-duplicated.
pub fn extract_mentions(content: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for cap in MENTION.captures_iter(content) {
        if let Some(m) = cap.get(1) {
            let name = m.as_str().to_lowercase();
            if !out.contains(&name) {
                out.push(name);
            }
        }
    }
    out
}

/// Explore search split into its filter mini-language parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExploreQuery {
    pub text: String,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
}

impl ExploreQuery {
    /// `from:<username>` and `#<tag>` tokens become filters, in the query string or
    /// the explicit filter list. Everything else is the content text.
    pub fn parse(query: &str, filters: &[String]) -> Self {
        let mut parsed = ExploreQuery::default();
        let mut words = Vec::new();

        let tokens = query
            .split_whitespace()
            .chain(filters.iter().flat_map(|f| f.split_whitespace()));
        for token in tokens {
            if let Some(author) = token.strip_prefix("from:") {
                let author = author.trim_start_matches('@').to_lowercase();
                if !author.is_empty() && !parsed.authors.contains(&author) {
                    parsed.authors.push(author);
                }
            } else if let Some(tag) = token.strip_prefix('#') {
                let tag = tag.to_lowercase();
                if !tag.is_empty() && !parsed.tags.contains(&tag) {
                    parsed.tags.push(tag);
                }
            } else {
                words.push(token);
            }
        }

        parsed.text = words.join(" ");
        parsed
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.authors.is_empty() && self.tags.is_empty()
    }
}
