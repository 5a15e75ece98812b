use async_graphql::{Context, EmptySubscription, ErrorExtensions, Result, Schema};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;

use super::mutations::MutationRoot;
use super::queries::QueryRoot;
use crate::config::FeedConfig;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::social::pagination::PageRequest;
use crate::state::DbPool;

/// GraphQL Schema type
pub type BlazeSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Build the GraphQL schema
pub fn build_schema() -> BlazeSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription).finish()
}

/// Caller identity for one request. `None` for anonymous callers.
#[derive(Clone, Debug, Default)]
pub struct Viewer(pub Option<CurrentUser>);

pub(crate) fn conn(ctx: &Context<'_>) -> Result<PooledConnection<SqliteConnectionManager>> {
    let pool = ctx.data::<DbPool>()?;
    pool.get().map_err(|e| AppError::from(e).extend())
}

pub(crate) fn viewer_id<'a>(ctx: &Context<'a>) -> Option<&'a str> {
    ctx.data_opt::<Viewer>()
        .and_then(|viewer| viewer.0.as_ref())
        .map(|user| user.id.as_str())
}

/// Mutations and private reads need a caller.
pub(crate) fn require_user<'a>(ctx: &Context<'a>) -> Result<&'a CurrentUser> {
    ctx.data_opt::<Viewer>()
        .and_then(|viewer| viewer.0.as_ref())
        .ok_or_else(|| AppError::Unauthorized.extend())
}

pub(crate) fn feed_config(ctx: &Context<'_>) -> FeedConfig {
    ctx.data_opt::<FeedConfig>().cloned().unwrap_or_default()
}

pub(crate) fn page(ctx: &Context<'_>, limit: Option<i32>, cursor: Option<i64>) -> Result<PageRequest> {
    PageRequest::new(limit, cursor, &feed_config(ctx)).map_err(|e| e.extend())
}

pub(crate) fn resolve<T>(result: AppResult<T>) -> Result<T> {
    result.map_err(|e| e.extend())
}
