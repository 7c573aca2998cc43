//! Type definitions

pub mod client;
pub mod directions;
pub mod messages;
pub mod route;
pub mod user;

pub use client::*;
pub use directions::*;
pub use messages::*;
pub use route::*;
pub use user::*;
