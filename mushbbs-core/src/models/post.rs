//! Posts, post keys and post patches

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::patch::{double_option, record_change, FieldChanges};
use super::validation::{name_line, ValidationError};
use crate::error::BbsError;

/// Maximum length for post titles
const MAX_TITLE_LEN: usize = 120;

/// Maximum length for post bodies (64KB)
const MAX_BODY_LEN: usize = 65536;

/// Prefix applied to the parent title when replying
pub const REPLY_PREFIX: &str = "RE: ";

/// Post record.
///
/// `spoofed_name`, `character_id` and `character_name` are rewritten by the
/// masking layer before a post leaves the service on an anonymous board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub board_id: i64,
    pub post_key: String,
    pub post_order: i32,
    pub sub_order: i32,
    pub title: String,
    pub body: String,
    pub user_id: Uuid,
    pub character_id: Option<Uuid>,
    pub character_name: Option<String>,
    pub spoofed_name: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn key(&self) -> PostKey {
        PostKey {
            post_order: self.post_order,
            sub_order: self.sub_order,
        }
    }

    pub fn is_reply(&self) -> bool {
        self.sub_order > 0
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// `(post_order, sub_order)`; rendered `3` for a top-level post, `3.1` for a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PostKey {
    pub post_order: i32,
    pub sub_order: i32,
}

impl PostKey {
    pub fn top_level(post_order: i32) -> Self {
        Self {
            post_order,
            sub_order: 0,
        }
    }
}

impl fmt::Display for PostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sub_order == 0 {
            write!(f, "{}", self.post_order)
        } else {
            write!(f, "{}.{}", self.post_order, self.sub_order)
        }
    }
}

impl FromStr for PostKey {
    type Err = BbsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BbsError::invalid_format("post key", s, "expected N or N.M");
        // orders start at 1 and have exactly one spelling: no sign, no leading zero
        let parse = |part: &str| -> Result<i32, BbsError> {
            match part.as_bytes() {
                [b'1'..=b'9', rest @ ..] if rest.iter().all(u8::is_ascii_digit) => {
                    part.parse::<i32>().map_err(|_| invalid())
                }
                _ => Err(invalid()),
            }
        };

        match s.split_once('.') {
            None => Ok(Self::top_level(parse(s)?)),
            Some((order, sub)) => Ok(Self {
                post_order: parse(order)?,
                sub_order: parse(sub)?,
            }),
        }
    }
}

/// Validated post title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostTitle(String);

impl PostTitle {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        name_line("title", s, MAX_TITLE_LEN).map(Self)
    }

    /// Title for a reply to `parent_title`, clipped to the title limit
    pub fn reply_to(parent_title: &str) -> Self {
        Self(
            format!("{REPLY_PREFIX}{parent_title}")
                .chars()
                .take(MAX_TITLE_LEN)
                .collect(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Validated post body (rich text stored verbatim)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostBody(String);

impl PostBody {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.trim().is_empty() {
            return Err(ValidationError::Empty { field: "body" });
        }

        if s.len() > MAX_BODY_LEN {
            return Err(ValidationError::TooLong {
                field: "body",
                max: MAX_BODY_LEN,
            });
        }

        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// New top-level post request body
#[derive(Debug, Clone, Deserialize)]
pub struct PostCreate {
    pub title: String,
    pub body: String,
}

/// Reply request body; the title is derived from the parent
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyCreate {
    pub body: String,
}

/// Validated content for a new post or reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub title: PostTitle,
    pub body: PostBody,
}

impl PostCreate {
    pub fn validate(&self) -> Result<NewPost, ValidationError> {
        Ok(NewPost {
            title: PostTitle::new(&self.title)?,
            body: PostBody::new(&self.body)?,
        })
    }
}

impl ReplyCreate {
    pub fn validate(&self, parent: &Post) -> Result<NewPost, ValidationError> {
        Ok(NewPost {
            title: PostTitle::reply_to(&parent.title),
            body: PostBody::new(&self.body)?,
        })
    }
}

/// Raw post patch as received from the client
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostPatch {
    #[serde(default, deserialize_with = "double_option")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub body: Option<Option<String>>,
}

/// Validated post patch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostChanges {
    pub title: Option<String>,
    pub body: Option<String>,
}

impl PostPatch {
    /// Title and body are required columns, so a present `null` is rejected.
    pub fn validate(self) -> Result<PostChanges, ValidationError> {
        let title = match self.title {
            None => None,
            Some(None) => return Err(ValidationError::Empty { field: "title" }),
            Some(Some(title)) => Some(PostTitle::new(&title)?.into_string()),
        };
        let body = match self.body {
            None => None,
            Some(None) => return Err(ValidationError::Empty { field: "body" }),
            Some(Some(body)) => Some(PostBody::new(&body)?.into_string()),
        };
        Ok(PostChanges { title, body })
    }
}

impl PostChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none()
    }

    pub fn diff(&self, before: &Post) -> FieldChanges {
        let mut changes = FieldChanges::new();
        if let Some(title) = &self.title {
            record_change(&mut changes, "title", Some(before.title.as_str()), Some(title.as_str()));
        }
        if let Some(body) = &self.body {
            record_change(&mut changes, "body", Some(before.body.as_str()), Some(body.as_str()));
        }
        changes
    }

    pub fn apply(&self, post: &mut Post) {
        if let Some(title) = &self.title {
            post.title = title.clone();
        }
        if let Some(body) = &self.body {
            post.body = body.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_key_round_trips_display() {
        assert_eq!(PostKey::top_level(3).to_string(), "3");
        let reply: PostKey = "3.1".parse().unwrap();
        assert_eq!(
            reply,
            PostKey {
                post_order: 3,
                sub_order: 1
            }
        );
        assert_eq!(reply.to_string(), "3.1");
    }

    #[test]
    fn post_key_rejects_garbage() {
        for key in ["", "a", "3.", ".1", "3.1.2", "-3", "+3"] {
            assert!(key.parse::<PostKey>().is_err(), "{key} should be rejected");
        }
    }

    #[test]
    fn post_key_has_one_spelling() {
        for key in ["03", "3.0", "3.01", "0", "0.1", "00"] {
            assert!(key.parse::<PostKey>().is_err(), "{key} should be rejected");
        }
        assert_eq!("10.20".parse::<PostKey>().unwrap().to_string(), "10.20");
    }

    #[test]
    fn reply_title_prefixes_parent() {
        assert_eq!(PostTitle::reply_to("Hello").as_str(), "RE: Hello");
    }

    #[test]
    fn rejects_empty_title() {
        let req = PostCreate {
            title: "  ".into(),
            body: "text".into(),
        };
        assert_eq!(
            req.validate().unwrap_err(),
            ValidationError::Empty { field: "title" }
        );
    }

    #[test]
    fn patch_rejects_null_body() {
        let patch: PostPatch = serde_json::from_str(r#"{"body": null}"#).unwrap();
        assert!(patch.validate().is_err());
    }
}
