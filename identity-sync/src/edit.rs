//! Pending edits
//!
//! A pending edit describes exactly one requested change. It lives for a
//! single synchronization cycle and is never persisted.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::types::{EntryPayload, VdxfKey};

/// Kind of change requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditKind {
    Add,
    Edit,
    Delete,
}

impl EditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

/// One change to the flat content map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentMapEdit {
    Add {
        key: String,
        value: String,
    },
    /// Replace a value, optionally moving it from `original_key` to `key`
    Edit {
        original_key: String,
        key: String,
        value: String,
    },
    Delete {
        key: String,
    },
}

impl ContentMapEdit {
    pub fn add(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Add {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn edit(
        original_key: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Edit {
            original_key: original_key.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }

    pub fn kind(&self) -> EditKind {
        match self {
            Self::Add { .. } => EditKind::Add,
            Self::Edit { .. } => EditKind::Edit,
            Self::Delete { .. } => EditKind::Delete,
        }
    }

    /// The key the edit leaves behind (or removes, for deletes)
    pub fn target_key(&self) -> &str {
        match self {
            Self::Add { key, .. } | Self::Edit { key, .. } | Self::Delete { key } => key,
        }
    }

    /// Local input checks; nothing here touches the transport
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Add { key, value } => require_key_value(key, value),
            Self::Edit {
                original_key,
                key,
                value,
            } => {
                if original_key.trim().is_empty() {
                    return Err(SyncError::InvalidEdit("original key must not be empty".into()));
                }
                require_key_value(key, value)
            }
            Self::Delete { key } => {
                if key.trim().is_empty() {
                    return Err(SyncError::InvalidEdit("key must not be empty".into()));
                }
                Ok(())
            }
        }
    }
}

fn require_key_value(key: &str, value: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(SyncError::InvalidEdit("key must not be empty".into()));
    }
    if value.trim().is_empty() {
        return Err(SyncError::InvalidEdit(format!("value for '{}' must not be empty", key)));
    }
    Ok(())
}

/// One change to the nested content multimap
///
/// Add and Edit both address the entry whose `(nested_key, label)` matches
/// the payload's label; Delete names the label explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MultiMapEdit {
    Add {
        primary_key: String,
        nested_key: String,
        payload: EntryPayload,
    },
    Edit {
        primary_key: String,
        nested_key: String,
        payload: EntryPayload,
    },
    Delete {
        primary_key: String,
        nested_key: String,
        label: Option<String>,
    },
}

impl MultiMapEdit {
    pub fn add(
        primary_key: impl Into<String>,
        nested_key: impl Into<String>,
        payload: impl Into<EntryPayload>,
    ) -> Self {
        Self::Add {
            primary_key: primary_key.into(),
            nested_key: nested_key.into(),
            payload: payload.into(),
        }
    }

    pub fn edit(
        primary_key: impl Into<String>,
        nested_key: impl Into<String>,
        payload: impl Into<EntryPayload>,
    ) -> Self {
        Self::Edit {
            primary_key: primary_key.into(),
            nested_key: nested_key.into(),
            payload: payload.into(),
        }
    }

    pub fn delete(
        primary_key: impl Into<String>,
        nested_key: impl Into<String>,
        label: Option<&str>,
    ) -> Self {
        Self::Delete {
            primary_key: primary_key.into(),
            nested_key: nested_key.into(),
            label: label.map(str::to_string),
        }
    }

    pub fn kind(&self) -> EditKind {
        match self {
            Self::Add { .. } => EditKind::Add,
            Self::Edit { .. } => EditKind::Edit,
            Self::Delete { .. } => EditKind::Delete,
        }
    }

    pub fn primary_key(&self) -> &str {
        match self {
            Self::Add { primary_key, .. }
            | Self::Edit { primary_key, .. }
            | Self::Delete { primary_key, .. } => primary_key,
        }
    }

    pub fn nested_key(&self) -> &str {
        match self {
            Self::Add { nested_key, .. }
            | Self::Edit { nested_key, .. }
            | Self::Delete { nested_key, .. } => nested_key,
        }
    }

    /// Label used to match the addressed entry
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Add { payload, .. } | Self::Edit { payload, .. } => payload.label(),
            Self::Delete { label, .. } => label.as_deref(),
        }
    }

    /// Both keys must be well-formed opaque identifiers
    pub fn validate(&self) -> Result<()> {
        VdxfKey::parse(self.primary_key())?;
        VdxfKey::parse(self.nested_key())?;
        Ok(())
    }
}
