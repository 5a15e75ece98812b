#![allow(dead_code)]

use blaze::auth::provider::{sync_user, ProviderUser};
use blaze::config::FeedConfig;
use blaze::db;
use blaze::extractors::CurrentUser;
use blaze::graphql::{build_schema, BlazeSchema, Viewer};
use blaze::social::actions;
use blaze::state::DbPool;
use tempfile::TempDir;

pub struct TestApp {
    pub pool: DbPool,
    pub schema: BlazeSchema,
    _tmp: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let pool = db::create_pool(&tmp.path().join("test.db")).expect("Failed to create test database");
        db::run_migrations(&pool).expect("Failed to run migrations");
        Self {
            pool,
            schema: build_schema(),
            _tmp: tmp,
        }
    }

    /// Provider-synced user with a claimed username.
    pub fn add_user(&self, id: &str, username: &str) -> CurrentUser {
        let user = sync_user(
            &self.pool,
            &ProviderUser {
                id: id.to_string(),
                name: Some(username.to_uppercase()),
                email: Some(format!("{username}@example.com")),
                image: None,
            },
        )
        .unwrap();
        let mut conn = self.pool.get().unwrap();
        let username = actions::setup_username(&mut conn, &user.id, username).unwrap();
        CurrentUser {
            id: user.id,
            name: user.name,
            username: Some(username),
        }
    }

    pub async fn execute(&self, as_user: Option<&CurrentUser>, query: &str) -> async_graphql::Response {
        let request = async_graphql::Request::new(query)
            .data(self.pool.clone())
            .data(FeedConfig::default())
            .data(Viewer(as_user.cloned()));
        self.schema.execute(request).await
    }

    /// Run and return `data`, failing the test on any error.
    pub async fn data(&self, as_user: Option<&CurrentUser>, query: &str) -> serde_json::Value {
        let response = self.execute(as_user, query).await;
        assert!(
            response.errors.is_empty(),
            "Expected no errors for {query}, got: {:?}",
            response.errors
        );
        response.data.into_json().unwrap()
    }

    /// Run and return the `extensions.code` of the first error.
    pub async fn error_code(&self, as_user: Option<&CurrentUser>, query: &str) -> String {
        let response = self.execute(as_user, query).await;
        let error = response
            .errors
            .first()
            .unwrap_or_else(|| panic!("Expected an error for {query}"));
        match error.extensions.as_ref().and_then(|ext| ext.get("code")) {
            Some(async_graphql::Value::String(code)) => code.clone(),
            other => panic!("Missing error code: {other:?}"),
        }
    }

    pub async fn create_post(&self, author: &CurrentUser, content: &str) -> i64 {
        let data = self
            .data(
                Some(author),
                &format!(r#"mutation {{ post {{ create(content: "{content}") {{ id }} }} }}"#),
            )
            .await;
        data["post"]["create"]["id"].as_i64().unwrap()
    }

    pub fn count(&self, sql: &str) -> i64 {
        let conn = self.pool.get().unwrap();
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }
}
