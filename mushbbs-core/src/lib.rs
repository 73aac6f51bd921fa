pub mod access;
pub mod config;
pub mod error;
pub mod events;
pub mod fanout;
pub mod lock;
pub mod masking;
pub mod models;
pub mod repo;
pub mod service;

#[doc(hidden)]
pub mod testing;

pub use access::{AccessConfig, AccessKind, AccessPolicy, Guarded, PermissionContext, PermissionResolver};
pub use config::BbsConfig;
pub use error::{BbsError, Result};
pub use events::{EventKind, Notification};
pub use fanout::{Audience, DeliveryError, EventSink, Fanout, FanoutReport, OnlineRoster};
pub use lock::{ExpressionEvaluator, LockEvaluator, LockExpr, Locks};
pub use masking::mask_post;
pub use repo::{BoardRepository, FactionDirectory, IdentityDirectory, MemoryRepo};
pub use service::{BoardListing, BoardService, Mutation};
