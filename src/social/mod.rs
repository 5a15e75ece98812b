pub mod actions;
pub mod domain;
pub mod notify;
pub mod pagination;
pub mod queries;
pub mod views;
