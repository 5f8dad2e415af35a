//! Flat content map merge

use crate::edit::ContentMapEdit;
use crate::error::Result;
use crate::types::ContentMap;

/// Apply a single edit to `current`, returning the complete next map.
///
/// On error `current` is untouched and nothing is returned.
pub fn merge(current: &ContentMap, edit: &ContentMapEdit) -> Result<ContentMap> {
    edit.validate()?;

    let mut next = current.clone();
    match edit {
        ContentMapEdit::Add { key, value } => {
            next.insert(key.clone(), value.clone());
        }
        ContentMapEdit::Edit {
            original_key,
            key,
            value,
        } => {
            if original_key != key {
                next.remove(original_key);
            }
            next.insert(key.clone(), value.clone());
        }
        ContentMapEdit::Delete { key } => {
            // absent key: no-op
            next.remove(key);
        }
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;

    fn map(pairs: &[(&str, &str)]) -> ContentMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_add_new_key() {
        let current = map(&[("A", "1")]);
        let next = merge(&current, &ContentMapEdit::add("B", "2")).unwrap();
        assert_eq!(next, map(&[("A", "1"), ("B", "2")]));
    }

    #[test]
    fn test_add_existing_key_overwrites() {
        let current = map(&[("A", "1"), ("B", "2")]);
        let next = merge(&current, &ContentMapEdit::add("A", "9")).unwrap();
        assert_eq!(next, map(&[("A", "9"), ("B", "2")]));
    }

    #[test]
    fn test_edit_same_key_touches_only_that_key() {
        let current = map(&[("A", "1"), ("B", "2"), ("C", "3")]);
        let next = merge(&current, &ContentMapEdit::edit("B", "B", "20")).unwrap();

        assert_eq!(next.len(), current.len());
        assert_eq!(
            next.keys().collect::<Vec<_>>(),
            current.keys().collect::<Vec<_>>()
        );
        assert_eq!(next["A"], "1");
        assert_eq!(next["B"], "20");
        assert_eq!(next["C"], "3");
    }

    #[test]
    fn test_edit_renames_key() {
        let current = map(&[("A", "1"), ("B", "2")]);
        let next = merge(&current, &ContentMapEdit::edit("A", "Z", "1")).unwrap();
        assert_eq!(next, map(&[("B", "2"), ("Z", "1")]));
    }

    #[test]
    fn test_delete_present_and_absent() {
        let current = map(&[("A", "1"), ("B", "2")]);
        let next = merge(&current, &ContentMapEdit::delete("A")).unwrap();
        assert_eq!(next, map(&[("B", "2")]));

        let again = merge(&next, &ContentMapEdit::delete("A")).unwrap();
        assert_eq!(again, next);
    }

    #[test]
    fn test_add_then_delete_restores_original() {
        let original = map(&[("A", "1"), ("C", "3")]);
        let added = merge(&original, &ContentMapEdit::add("B", "2")).unwrap();
        let removed = merge(&added, &ContentMapEdit::delete("B")).unwrap();
        assert_eq!(removed, original);
    }

    #[test]
    fn test_add_then_delete_drops_prior_value() {
        let original = map(&[("A", "1"), ("B", "old")]);
        let added = merge(&original, &ContentMapEdit::add("B", "new")).unwrap();
        let removed = merge(&added, &ContentMapEdit::delete("B")).unwrap();
        assert_eq!(removed, map(&[("A", "1")]));
    }

    #[test]
    fn test_invalid_edit_leaves_input_alone() {
        let current = map(&[("A", "1")]);
        let err = merge(&current, &ContentMapEdit::add("B", "")).unwrap_err();
        assert!(matches!(err, SyncError::InvalidEdit(_)));
        assert_eq!(current, map(&[("A", "1")]));

        assert!(merge(&current, &ContentMapEdit::add("", "x")).is_err());
    }
}
