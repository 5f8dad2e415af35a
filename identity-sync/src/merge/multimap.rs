//! Nested content multimap merge
//!
//! Entries are addressed by `(nested_key, label)`. A write to an existing
//! address replaces that entry where it sits; a write to a new address is
//! appended. Entries other than the addressed one are never rewritten.
//!
//! Lists are never left empty. That includes empty lists the daemon already
//! holds under other primary keys: they carry no entries, so dropping them
//! before resubmitting loses nothing.

use tracing::trace;

use crate::edit::MultiMapEdit;
use crate::error::Result;
use crate::types::{ContentMultiMap, EntryPayload, MultiMapEntry};

/// Apply a single edit to `current`, returning the complete next multimap.
///
/// Key format is checked before any structural change; on error `current`
/// is untouched.
pub fn merge(current: &ContentMultiMap, edit: &MultiMapEdit) -> Result<ContentMultiMap> {
    edit.validate()?;

    let mut next = current.clone();
    match edit {
        MultiMapEdit::Add {
            primary_key,
            nested_key,
            payload,
        }
        | MultiMapEdit::Edit {
            primary_key,
            nested_key,
            payload,
        } => upsert(&mut next, primary_key, nested_key, payload),
        MultiMapEdit::Delete {
            primary_key,
            nested_key,
            label,
        } => remove(&mut next, primary_key, nested_key, label.as_deref()),
    }
    prune_empty(&mut next);

    Ok(next)
}

fn upsert(map: &mut ContentMultiMap, primary_key: &str, nested_key: &str, payload: &EntryPayload) {
    let label = payload.label();
    let entries = map.entry(primary_key.to_string()).or_default();

    match entries.iter_mut().find(|e| e.matches(nested_key, label)) {
        Some(existing) => {
            trace!(primary_key, nested_key, ?label, "replacing multimap entry in place");
            existing.payload = payload.clone();
        }
        None => {
            trace!(primary_key, nested_key, ?label, "appending multimap entry");
            entries.push(MultiMapEntry::new(nested_key, payload.clone()));
        }
    }
}

fn remove(map: &mut ContentMultiMap, primary_key: &str, nested_key: &str, label: Option<&str>) {
    let Some(entries) = map.get_mut(primary_key) else {
        return;
    };

    if let Some(index) = entries.iter().position(|e| e.matches(nested_key, label)) {
        entries.remove(index);
    }
}

fn prune_empty(map: &mut ContentMultiMap) {
    map.retain(|primary_key, entries| {
        if entries.is_empty() {
            trace!(primary_key = primary_key.as_str(), "dropping empty multimap list");
        }
        !entries.is_empty()
    });
}
