use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Board, FieldChanges, Post};

/// Board context shared by every notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventHeader {
    pub board_key: String,
    pub board_name: String,
    pub faction_name: Option<String>,
    pub happened_at: DateTime<Utc>,
}

impl EventHeader {
    pub fn for_board(board: &Board) -> Self {
        Self {
            board_key: board.board_key.clone(),
            board_name: board.name.clone(),
            faction_name: board.faction_name.clone(),
            happened_at: Utc::now(),
        }
    }
}

/// Post fields carried by post events, already masked for the recipient tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub post_key: String,
    pub post_title: String,
    pub post_body: String,
    pub poster_name: String,
    /// Only populated in the admin variant on anonymous boards
    pub character_id: Option<Uuid>,
    pub character_name: Option<String>,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        Self {
            post_key: post.post_key.clone(),
            post_title: post.title.clone(),
            post_body: post.body.clone(),
            poster_name: post.spoofed_name.clone(),
            character_id: post.character_id,
            character_name: post.character_name.clone(),
        }
    }
}

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    BoardCreate,
    BoardUpdate { changes: FieldChanges },
    BoardDelete,
    PostCreate { post: PostSummary },
    ReplyCreate { post: PostSummary },
    PostUpdate { post: PostSummary, changes: FieldChanges },
    PostDelete { post: PostSummary },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BoardCreate => "board_create",
            Self::BoardUpdate { .. } => "board_update",
            Self::BoardDelete => "board_delete",
            Self::PostCreate { .. } => "post_create",
            Self::ReplyCreate { .. } => "reply_create",
            Self::PostUpdate { .. } => "post_update",
            Self::PostDelete { .. } => "post_delete",
        }
    }

    pub fn post(&self) -> Option<&PostSummary> {
        match self {
            Self::PostCreate { post }
            | Self::ReplyCreate { post }
            | Self::PostUpdate { post, .. }
            | Self::PostDelete { post } => Some(post),
            _ => None,
        }
    }
}

/// One board change notification, as delivered to a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(flatten)]
    pub header: EventHeader,
    /// Display name of whoever caused the event
    pub enactor: String,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Notification {
    pub fn new(board: &Board, enactor: impl Into<String>, kind: EventKind) -> Self {
        Self {
            header: EventHeader::for_board(board),
            enactor: enactor.into(),
            kind,
        }
    }

    /// One-line text for MUSH clients
    pub fn render(&self) -> String {
        let message = match &self.kind {
            EventKind::BoardCreate => format!("Created by {}.", self.enactor),
            EventKind::BoardDelete => format!("Deleted by {}.", self.enactor),
            EventKind::BoardUpdate { changes } => {
                format!("Updated by {}. {}.", self.enactor, describe(changes))
            }
            EventKind::PostCreate { post } => {
                format!("{} posted {} '{}'.", post.poster_name, post.post_key, post.post_title)
            }
            EventKind::ReplyCreate { post } => format!(
                "{} replied with {} '{}'.",
                post.poster_name, post.post_key, post.post_title
            ),
            EventKind::PostUpdate { post, changes } => format!(
                "Post {} '{}' updated by {}. {}.",
                post.post_key,
                post.post_title,
                self.enactor,
                describe(changes)
            ),
            EventKind::PostDelete { post } => format!(
                "Post {} '{}' deleted by {}.",
                post.post_key, post.post_title, self.enactor
            ),
        };

        let prefix = match &self.header.faction_name {
            Some(faction) => format!("[Faction BBS-{faction}]"),
            None => "[BBS]".to_owned(),
        };
        format!(
            "{prefix} {} ({}): {message}",
            self.header.board_key, self.header.board_name
        )
    }
}

fn describe(changes: &FieldChanges) -> String {
    changes
        .iter()
        .map(|(field, (old, new))| {
            format!(
                "{field} changed from {} to {}",
                old.as_deref().unwrap_or("nothing"),
                new.as_deref().unwrap_or("nothing")
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{board, faction};

    fn summary() -> PostSummary {
        PostSummary {
            post_key: "3.1".into(),
            post_title: "RE: Muster".into(),
            post_body: "Aye".into(),
            poster_name: "Shadow".into(),
            character_id: None,
            character_name: None,
        }
    }

    #[test]
    fn renders_public_board_header() {
        let public = board(1, None, 12);
        let event = Notification::new(&public, "Alice", EventKind::BoardCreate);
        assert_eq!(event.render(), "[BBS] 12 (Board 12): Created by Alice.");
    }

    #[test]
    fn renders_faction_board_changes() {
        let knights = faction(1, "Knights", "K");
        let orders = board(1, Some(&knights), 3);
        let mut changes = FieldChanges::new();
        changes.insert("name".into(), (Some("Board 3".into()), Some("Orders".into())));
        changes.insert("description".into(), (Some("old".into()), None));

        let event = Notification::new(&orders, "Bob", EventKind::BoardUpdate { changes });
        assert_eq!(
            event.render(),
            "[Faction BBS-Knights] K3 (Board 3): Updated by Bob. \
             description changed from old to nothing, name changed from Board 3 to Orders."
        );
    }

    #[test]
    fn reply_uses_poster_name() {
        let event = Notification::new(
            &board(1, None, 1),
            "Shadow",
            EventKind::ReplyCreate { post: summary() },
        );
        assert!(event.render().ends_with("Shadow replied with 3.1 'RE: Muster'."));
    }

    #[test]
    fn serializes_flat_with_event_tag() {
        let event = Notification::new(
            &board(1, None, 1),
            "Shadow",
            EventKind::PostDelete { post: summary() },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "post_delete");
        assert_eq!(json["board_key"], "1");
        assert_eq!(json["post"]["poster_name"], "Shadow");
        assert!(json["post"]["character_id"].is_null());

        let back: Notification = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind.name(), "post_delete");
    }
}
