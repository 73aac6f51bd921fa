//! Boards, board keys and board patches

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::patch::{double_option, record_change, FieldChanges};
use super::validation::{name_line, ValidationError};
use crate::error::{BbsError, Result};
use crate::lock::{LockExpr, Locks};

/// Maximum length for board names and anonymous display names
const MAX_BOARD_NAME_LEN: usize = 80;

/// Maximum length for board descriptions
const MAX_DESCRIPTION_LEN: usize = 4096;

/// Optional faction abbreviation followed by the numeric board order
static BOARD_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<abbr>[A-Za-z]+)?(?P<order>\d+)$").expect("invalid board key regex")
});

/// Board record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: i64,
    pub board_key: String,
    pub name: String,
    pub description: Option<String>,
    /// When set, posts are displayed under this name instead of the author's
    pub anonymous_name: Option<String>,
    pub faction_id: Option<i64>,
    pub faction_name: Option<String>,
    pub faction_abbreviation: Option<String>,
    pub board_order: i32,
    pub locks: Locks,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Board {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous_name.is_some()
    }
}

/// Board key split into its faction abbreviation and order.
///
/// Parsing is pure; resolving the abbreviation to a faction happens in the
/// service against the faction directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardKey {
    pub abbreviation: Option<String>,
    pub order: i32,
}

impl BoardKey {
    /// Parse `F3` / `12` style keys.
    ///
    /// # Example
    /// ```
    /// use mushbbs_core::models::BoardKey;
    ///
    /// let key = BoardKey::parse("F3").unwrap();
    /// assert_eq!(key.abbreviation.as_deref(), Some("F"));
    /// assert_eq!(key.order, 3);
    /// assert!(BoardKey::parse("F").is_err());
    /// ```
    pub fn parse(key: &str) -> Result<Self> {
        let caps = BOARD_KEY_RE.captures(key).ok_or_else(|| {
            BbsError::invalid_format(
                "board key",
                key,
                "expected an optional faction abbreviation followed by a number",
            )
        })?;

        let order = caps["order"].parse::<i32>().map_err(|_| {
            BbsError::invalid_format("board key", key, "board order is too large")
        })?;

        Ok(Self {
            abbreviation: caps.name("abbr").map(|m| m.as_str().to_owned()),
            order,
        })
    }
}

/// Validated board display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardName(String);

impl BoardName {
    pub fn new(s: &str) -> std::result::Result<Self, ValidationError> {
        name_line("board name", s, MAX_BOARD_NAME_LEN).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for BoardName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Create board request body
#[derive(Debug, Clone, Deserialize)]
pub struct BoardCreate {
    pub board_key: String,
    pub name: String,
}

/// Raw board patch as received from the client
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoardPatch {
    #[serde(default, deserialize_with = "double_option")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub anonymous_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub board_order: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub locks: Option<Option<Locks>>,
}

/// Validated board patch; only `Some` fields are written
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub anonymous_name: Option<Option<String>>,
    pub board_order: Option<i32>,
    pub locks: Option<Locks>,
}

impl BoardPatch {
    /// Validate every present field. `null` clears optional columns, resets
    /// locks to empty, and is rejected for `name` and `board_order`.
    pub fn validate(self) -> std::result::Result<BoardChanges, ValidationError> {
        let name = match self.name {
            None => None,
            Some(None) => return Err(ValidationError::Empty { field: "board name" }),
            Some(Some(name)) => Some(BoardName::new(&name)?.into_string()),
        };

        let description = match self.description {
            Some(Some(text)) if text.len() > MAX_DESCRIPTION_LEN => {
                return Err(ValidationError::TooLong {
                    field: "description",
                    max: MAX_DESCRIPTION_LEN,
                })
            }
            other => other,
        };

        let anonymous_name = match self.anonymous_name {
            Some(Some(anon)) => Some(Some(name_line("anonymous name", &anon, MAX_BOARD_NAME_LEN)?)),
            other => other,
        };

        let board_order = match self.board_order {
            None => None,
            Some(None) => return Err(ValidationError::Empty { field: "board order" }),
            Some(Some(order)) if order < 0 => {
                return Err(ValidationError::OutOfRange {
                    field: "board order",
                    min: 0,
                    max: i64::from(i32::MAX),
                })
            }
            Some(Some(order)) => Some(order),
        };

        let locks = self.locks.map(Option::unwrap_or_default);
        if let Some(locks) = &locks {
            for (kind, expr) in locks.iter() {
                LockExpr::parse(expr).map_err(|e| ValidationError::InvalidLock {
                    kind: kind.to_owned(),
                    reason: e.to_string(),
                })?;
            }
        }

        Ok(BoardChanges {
            name,
            description,
            anonymous_name,
            board_order,
            locks,
        })
    }
}

impl BoardChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Diff the present fields against the board as it was before the update.
    pub fn diff(&self, before: &Board) -> FieldChanges {
        let mut changes = FieldChanges::new();

        if let Some(name) = &self.name {
            record_change(&mut changes, "name", Some(before.name.as_str()), Some(name.as_str()));
        }
        if let Some(description) = &self.description {
            record_change(
                &mut changes,
                "description",
                before.description.as_deref(),
                description.as_deref(),
            );
        }
        if let Some(anonymous_name) = &self.anonymous_name {
            record_change(
                &mut changes,
                "anonymous_name",
                before.anonymous_name.as_deref(),
                anonymous_name.as_deref(),
            );
        }
        if let Some(order) = &self.board_order {
            record_change(&mut changes, "board_order", Some(&before.board_order), Some(order));
        }
        if let Some(locks) = &self.locks {
            record_change(&mut changes, "locks", Some(&before.locks), Some(locks));
        }

        changes
    }

    /// Apply the present fields to `board` in place.
    pub fn apply(&self, board: &mut Board) {
        if let Some(name) = &self.name {
            board.name = name.clone();
        }
        if let Some(description) = &self.description {
            board.description = description.clone();
        }
        if let Some(anonymous_name) = &self.anonymous_name {
            board.anonymous_name = anonymous_name.clone();
        }
        if let Some(order) = self.board_order {
            board.board_order = order;
            board.board_key = format!(
                "{}{}",
                board.faction_abbreviation.as_deref().unwrap_or_default(),
                order
            );
        }
        if let Some(locks) = &self.locks {
            board.locks = locks.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_faction_and_public_keys() {
        assert_eq!(
            BoardKey::parse("F3").unwrap(),
            BoardKey {
                abbreviation: Some("F".into()),
                order: 3
            }
        );
        assert_eq!(
            BoardKey::parse("12").unwrap(),
            BoardKey {
                abbreviation: None,
                order: 12
            }
        );
    }

    #[test]
    fn rejects_malformed_keys() {
        for key in ["F", "", "3F", "F-3", "F 3", "99999999999"] {
            assert!(
                matches!(BoardKey::parse(key), Err(BbsError::InvalidFormat { .. })),
                "{key} should be rejected"
            );
        }
    }

    #[test]
    fn patch_null_semantics() {
        let patch: BoardPatch = serde_json::from_str(
            r#"{"description": null, "locks": null, "anonymous_name": "Shadow"}"#,
        )
        .unwrap();
        let changes = patch.validate().unwrap();
        assert_eq!(changes.name, None);
        assert_eq!(changes.description, Some(None));
        assert_eq!(changes.anonymous_name, Some(Some("Shadow".into())));
        assert_eq!(changes.locks, Some(Locks::default()));
    }

    #[test]
    fn patch_rejects_null_name_and_negative_order() {
        let patch: BoardPatch = serde_json::from_str(r#"{"name": null}"#).unwrap();
        assert!(matches!(patch.validate(), Err(ValidationError::Empty { .. })));

        let patch: BoardPatch = serde_json::from_str(r#"{"board_order": -1}"#).unwrap();
        assert!(matches!(
            patch.validate(),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn patch_rejects_unparseable_locks() {
        let patch: BoardPatch =
            serde_json::from_str(r#"{"locks": {"read": "all()", "post": "faction(K) &"}}"#)
                .unwrap();
        match patch.validate() {
            Err(ValidationError::InvalidLock { kind, .. }) => assert_eq!(kind, "post"),
            other => panic!("expected invalid lock, got {other:?}"),
        }

        let nested = format!(r#"{{"locks": {{"read": "{}all()"}}}}"#, "!".repeat(64));
        let patch: BoardPatch = serde_json::from_str(&nested).unwrap();
        assert!(matches!(
            patch.validate(),
            Err(ValidationError::InvalidLock { .. })
        ));
    }

    #[test]
    fn empty_patch_is_empty() {
        let patch: BoardPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.validate().unwrap().is_empty());
    }
}
