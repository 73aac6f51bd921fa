//! Route handlers organized by resource

pub mod boards;
pub mod events;
pub mod health;
pub mod posts;
