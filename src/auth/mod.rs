pub mod provider;
pub mod session;
