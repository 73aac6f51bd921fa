//! Domain models with validation at construction
//!
//! Request bodies deserialize into raw structs (`BoardCreate`, `BoardPatch`,
//! `PostCreate`, ...) and are validated into typed values before any
//! repository call. Invalid input returns `ValidationError`, not panic.

pub mod board;
pub mod faction;
pub mod identity;
pub mod patch;
pub mod post;
pub mod validation;

pub use board::{Board, BoardChanges, BoardCreate, BoardKey, BoardName, BoardPatch};
pub use faction::{Faction, Membership, LEADER_RANK};
pub use identity::{ActingIdentity, Character, User};
pub use patch::FieldChanges;
pub use post::{
    NewPost, Post, PostBody, PostChanges, PostCreate, PostKey, PostPatch, PostTitle, ReplyCreate,
};
pub use validation::ValidationError;
