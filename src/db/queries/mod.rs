//! Database queries

pub mod client;
pub mod route;
pub mod user;
