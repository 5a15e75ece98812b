// Library exports for Blaze
// This allows integration tests and embedding clients to use Blaze modules

pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod graphql;
pub mod routes;
pub mod social;
pub mod state;
