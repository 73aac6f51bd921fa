//! Fixture builders shared by unit tests, integration tests and the server crate's tests

use std::collections::BTreeSet;

use chrono::Utc;
use uuid::Uuid;

use crate::lock::Locks;
use crate::models::{ActingIdentity, Board, Character, Faction, Membership, User};

pub fn faction(id: i64, name: &str, abbreviation: &str) -> Faction {
    let now = Utc::now();
    Faction {
        id,
        name: name.to_owned(),
        abbreviation: abbreviation.to_owned(),
        description: None,
        category: "general".to_owned(),
        private: false,
        hidden: false,
        can_leave: true,
        kick_rank: 2,
        start_rank: 5,
        title_self: false,
        member_permissions: BTreeSet::new(),
        public_permissions: BTreeSet::new(),
        locks: Locks::new(),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

pub fn membership(faction: &Faction, character_id: Uuid, rank: i32) -> Membership {
    Membership {
        faction_id: faction.id,
        character_id,
        rank,
        rank_permissions: BTreeSet::new(),
        permissions: BTreeSet::new(),
    }
}

pub fn character(name: &str) -> Character {
    Character {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        name: name.to_owned(),
    }
}

/// A fresh user with one character
pub fn acting(username: &str, character_name: &str, admin_level: i32) -> ActingIdentity {
    let character = character(character_name);
    let user = User {
        id: character.user_id,
        username: username.to_owned(),
        admin_level,
    };
    ActingIdentity::new(user, character)
}

/// Detached board value for policy tests; not stored anywhere
pub fn board(id: i64, faction: Option<&Faction>, board_order: i32) -> Board {
    let now = Utc::now();
    let abbreviation = faction.map(|f| f.abbreviation.clone());
    Board {
        id,
        board_key: format!("{}{}", abbreviation.as_deref().unwrap_or_default(), board_order),
        name: format!("Board {board_order}"),
        description: None,
        anonymous_name: None,
        faction_id: faction.map(|f| f.id),
        faction_name: faction.map(|f| f.name.clone()),
        faction_abbreviation: abbreviation,
        board_order,
        locks: Locks::new(),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}
