//! Partial-update plumbing shared by board and post patches.
//!
//! A patch field is `None` when the key was absent from the request body,
//! `Some(None)` when it was present with `null`, and `Some(Some(v))` otherwise.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

/// Field name -> (old value, new value), rendered as display strings
pub type FieldChanges = BTreeMap<String, (Option<String>, Option<String>)>;

/// Deserialize a present key (including `null`) as `Some(..)`.
///
/// Pair with `#[serde(default)]` so an absent key stays `None`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Record `field` in `changes` when the patched value differs from the old one.
pub(crate) fn record_change<T>(
    changes: &mut FieldChanges,
    field: &str,
    old: Option<&T>,
    new: Option<&T>,
) where
    T: PartialEq + ToString + ?Sized,
{
    if old != new {
        changes.insert(
            field.to_owned(),
            (old.map(ToString::to_string), new.map(ToString::to_string)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "double_option")]
        value: Option<Option<String>>,
    }

    #[test]
    fn distinguishes_absent_null_and_value() {
        let absent: Holder = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.value, None);

        let null: Holder = serde_json::from_str(r#"{"value": null}"#).unwrap();
        assert_eq!(null.value, Some(None));

        let set: Holder = serde_json::from_str(r#"{"value": "x"}"#).unwrap();
        assert_eq!(set.value, Some(Some("x".to_string())));
    }

    #[test]
    fn unchanged_fields_are_not_recorded() {
        let mut changes = FieldChanges::new();
        record_change(&mut changes, "name", Some("a"), Some("a"));
        record_change(&mut changes, "description", Some("a"), None);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["description"], (Some("a".to_string()), None));
    }
}
