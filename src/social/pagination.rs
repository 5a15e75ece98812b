// Cursor pagination: fetch limit + 1 rows, pop the extra, its id is the next cursor.
use crate::config::FeedConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    /// Id of the first row of the requested page (inclusive).
    pub cursor: Option<i64>,
}

impl PageRequest {
    pub fn new(limit: Option<i32>, cursor: Option<i64>, feed: &FeedConfig) -> AppResult<Self> {
        let limit = match limit {
            None => feed.default_limit as i64,
            Some(n) => n as i64,
        };
        if limit < 1 || limit > feed.max_limit as i64 {
            return Err(AppError::BadRequest(format!(
                "limit must be between 1 and {}",
                feed.max_limit
            )));
        }
        Ok(Self {
            limit: limit as usize,
            cursor,
        })
    }

    /// Rows to ask the store for.
    pub fn fetch_size(&self) -> i64 {
        self.limit as i64 + 1
    }

    pub fn split<T>(&self, rows: Vec<T>, id_of: impl Fn(&T) -> i64) -> (Vec<T>, Option<i64>) {
        split_page(rows, self.limit, id_of)
    }
}

pub fn split_page<T>(
    mut rows: Vec<T>,
    limit: usize,
    id_of: impl Fn(&T) -> i64,
) -> (Vec<T>, Option<i64>) {
    let mut next_cursor = None;
    if rows.len() > limit {
        next_cursor = rows.pop().map(|row| id_of(&row));
    }
    (rows, next_cursor)
}
