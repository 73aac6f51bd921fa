//! Acting identity: the (user, character) pair bound to every request

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// Global staff level; compared against the configured admin thresholds
    pub admin_level: i32,
}

/// In-game character owned by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
}

/// The user and the one character they are acting as for this request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActingIdentity {
    pub user: User,
    pub character: Character,
}

impl ActingIdentity {
    pub fn new(user: User, character: Character) -> Self {
        Self { user, character }
    }

    pub fn character_id(&self) -> Uuid {
        self.character.id
    }

    pub fn admin_level(&self) -> i32 {
        self.user.admin_level
    }
}
