//! Identity data model
//!
//! Field names follow the daemon's JSON (`primaryaddresses`,
//! `contentmultimap`, ...) on the wire and snake_case in Rust.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, SyncError};

/// Flat content store: opaque key → single string value
pub type ContentMap = BTreeMap<String, String>;

/// Nested content store: primary key → ordered list of single-key records
pub type ContentMultiMap = BTreeMap<String, Vec<MultiMapEntry>>;

/// Length of a rendered opaque identifier
pub const VDXF_KEY_LEN: usize = 34;

/// Leading character of every rendered opaque identifier
pub const VDXF_KEY_PREFIX: char = 'i';

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// A validated opaque identifier (a 20-byte id rendered base58check).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct VdxfKey(String);

impl VdxfKey {
    /// Validate and wrap a rendered identifier
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.len() != VDXF_KEY_LEN {
            return Err(SyncError::invalid_key(
                raw,
                format!("expected {} characters, got {}", VDXF_KEY_LEN, raw.len()),
            ));
        }
        if !raw.starts_with(VDXF_KEY_PREFIX) {
            return Err(SyncError::invalid_key(
                raw,
                format!("must start with '{}'", VDXF_KEY_PREFIX),
            ));
        }
        if let Some(bad) = raw.chars().find(|c| !BASE58_ALPHABET.contains(*c)) {
            return Err(SyncError::invalid_key(
                raw,
                format!("'{}' is not a base58 character", bad),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VdxfKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for VdxfKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        VdxfKey::parse(&raw).map_err(de::Error::custom)
    }
}

/// Transaction id returned by a successful replace request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl TransactionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structured payload of a multimap entry.
///
/// Every known field is optional so records written by newer daemons
/// round-trip untouched; anything unrecognised lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objectdata: Option<serde_json::Value>,
    /// Secondary distinguishing key within one nested key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DataDescriptor {
    /// Plain-text descriptor with the daemon's current version/flags defaults
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            version: Some(1),
            flags: Some(0),
            mimetype: Some("text/plain".to_string()),
            objectdata: Some(serde_json::json!({ "message": message.into() })),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Payload stored under a nested key
///
/// An object decodes as a [`DataDescriptor`] only when re-encoding it gives
/// back the same JSON. Anything else (explicit nulls, a known field of an
/// unexpected type, scalars) is kept verbatim as `Raw`, so resubmitting an
/// untouched entry never rewrites it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntryPayload {
    /// JSON object that maps losslessly onto a data descriptor
    Descriptor(DataDescriptor),
    /// Any other JSON value, passed through untouched
    Raw(serde_json::Value),
}

impl EntryPayload {
    /// Secondary key of the entry; read from the raw object when the
    /// payload did not decode as a descriptor.
    pub fn label(&self) -> Option<&str> {
        match self {
            EntryPayload::Descriptor(d) => d.label.as_deref(),
            EntryPayload::Raw(serde_json::Value::Object(fields)) => {
                fields.get("label").and_then(serde_json::Value::as_str)
            }
            EntryPayload::Raw(_) => None,
        }
    }

    fn from_value(value: serde_json::Value) -> Self {
        if !value.is_object() {
            return EntryPayload::Raw(value);
        }
        match DataDescriptor::deserialize(&value) {
            Ok(descriptor) if serde_json::to_value(&descriptor).ok().as_ref() == Some(&value) => {
                EntryPayload::Descriptor(descriptor)
            }
            _ => EntryPayload::Raw(value),
        }
    }
}

impl<'de> Deserialize<'de> for EntryPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(EntryPayload::from_value)
    }
}

impl From<DataDescriptor> for EntryPayload {
    fn from(d: DataDescriptor) -> Self {
        EntryPayload::Descriptor(d)
    }
}

/// One `{ nestedKey: payload }` record inside a multimap list.
///
/// Logical identity is `(nested_key, label)`.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiMapEntry {
    pub nested_key: String,
    pub payload: EntryPayload,
}

impl MultiMapEntry {
    pub fn new(nested_key: impl Into<String>, payload: impl Into<EntryPayload>) -> Self {
        Self {
            nested_key: nested_key.into(),
            payload: payload.into(),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.payload.label()
    }

    /// Whether this entry is the logical record addressed by `(nested_key, label)`
    pub fn matches(&self, nested_key: &str, label: Option<&str>) -> bool {
        self.nested_key == nested_key && self.label() == label
    }
}

impl Serialize for MultiMapEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.nested_key, &self.payload)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for MultiMapEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntryVisitor;

        impl<'de> Visitor<'de> for EntryVisitor {
            type Value = MultiMapEntry;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object with exactly one nested key")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let (nested_key, payload) = map
                    .next_entry::<String, EntryPayload>()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                if map.next_key::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::custom("multimap entry has more than one nested key"));
                }
                Ok(MultiMapEntry { nested_key, payload })
            }
        }

        deserializer.deserialize_map(EntryVisitor)
    }
}

/// Authoritative identity state as held by the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub flags: u32,
    pub name: String,
    #[serde(rename = "identityaddress")]
    pub identity_address: String,
    #[serde(default)]
    pub parent: String,
    #[serde(rename = "systemid", default)]
    pub system_id: String,
    #[serde(rename = "primaryaddresses", default)]
    pub primary_addresses: Vec<String>,
    #[serde(rename = "minimumsignatures", default = "default_minimum_signatures")]
    pub minimum_signatures: u32,
    #[serde(rename = "revocationauthority")]
    pub revocation_authority: String,
    #[serde(rename = "recoveryauthority")]
    pub recovery_authority: String,
    #[serde(rename = "privateaddress", default, skip_serializing_if = "Option::is_none")]
    pub private_address: Option<String>,
    #[serde(default)]
    pub timelock: u64,
    #[serde(rename = "contentmap", default)]
    pub content_map: ContentMap,
    #[serde(rename = "contentmultimap", default)]
    pub content_multimap: ContentMultiMap,
}

fn default_minimum_signatures() -> u32 {
    1
}

/// `getidentitycontent` response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    pub identity: IdentityRecord,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "blockheight", default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub txid: Option<String>,
}

/// One row of `listidentities`, before filtering.
///
/// Parsing never fails; unexpected shapes simply leave fields empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentitySummary {
    pub name: Option<String>,
    pub identity_address: Option<String>,
    pub parent: Option<String>,
    pub status: Option<String>,
}

impl IdentitySummary {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Build from one element of the daemon's `listidentities` array
    pub fn from_value(value: &serde_json::Value) -> Self {
        let identity = value.get("identity").unwrap_or(value);
        let field = |v: &serde_json::Value, key: &str| {
            v.get(key).and_then(|s| s.as_str()).map(str::to_string)
        };

        Self {
            name: field(identity, "name"),
            identity_address: field(identity, "identityaddress"),
            parent: field(identity, "parent"),
            status: field(value, "status"),
        }
    }
}

/// Full replace request: the only mutation the daemon accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityMutationRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent: String,
    #[serde(rename = "primaryaddresses")]
    pub primary_addresses: Vec<String>,
    #[serde(rename = "minimumsignatures")]
    pub minimum_signatures: u32,
    #[serde(rename = "revocationauthority")]
    pub revocation_authority: String,
    #[serde(rename = "recoveryauthority")]
    pub recovery_authority: String,
    #[serde(rename = "privateaddress", default, skip_serializing_if = "Option::is_none")]
    pub private_address: Option<String>,
    #[serde(rename = "contentmap", default, skip_serializing_if = "Option::is_none")]
    pub content_map: Option<ContentMap>,
    #[serde(rename = "contentmultimap", default, skip_serializing_if = "Option::is_none")]
    pub content_multimap: Option<ContentMultiMap>,
}

impl IdentityMutationRequest {
    /// Carry every invariant control field forward from a fetched record.
    ///
    /// Content members start out absent; callers set the one(s) they replace.
    pub fn carry_forward(record: &IdentityRecord) -> Self {
        Self {
            name: record.name.clone(),
            parent: record.parent.clone(),
            primary_addresses: record.primary_addresses.clone(),
            minimum_signatures: record.minimum_signatures,
            revocation_authority: record.revocation_authority.clone(),
            recovery_authority: record.recovery_authority.clone(),
            private_address: record.private_address.clone(),
            content_map: None,
            content_multimap: None,
        }
    }

    pub fn with_content_map(mut self, map: ContentMap) -> Self {
        self.content_map = Some(map);
        self
    }

    pub fn with_content_multimap(mut self, multimap: ContentMultiMap) -> Self {
        self.content_multimap = Some(multimap);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const KEY: &str = "iK7a5JNJnbeuYWVHCDRpJosj3irGJ5Qa8c";

    #[test]
    fn test_vdxf_key_accepts_well_formed() {
        let key = VdxfKey::parse(KEY).unwrap();
        assert_eq!(key.as_str(), KEY);
    }

    #[test]
    fn test_vdxf_key_rejects_bad_input() {
        assert!(matches!(
            VdxfKey::parse("iShort"),
            Err(SyncError::InvalidKeyFormat { .. })
        ));
        // right length, wrong prefix
        assert!(VdxfKey::parse("RK7a5JNJnbeuYWVHCDRpJosj3irGJ5Qa8c").is_err());
        // '0' is not base58
        assert!(VdxfKey::parse("iK7a5JNJnbeuYWVHCDRpJosj3irGJ5Qa80").is_err());
    }

    #[test]
    fn test_entry_serializes_as_single_key_object() {
        let entry = MultiMapEntry::new(KEY, DataDescriptor::text("hello").with_label("greeting"));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value,
            json!({ KEY: {
                "version": 1,
                "flags": 0,
                "mimetype": "text/plain",
                "objectdata": { "message": "hello" },
                "label": "greeting"
            }})
        );
    }

    #[test]
    fn test_entry_rejects_multiple_keys() {
        let result: std::result::Result<MultiMapEntry, _> =
            serde_json::from_value(json!({ "a": 1, "b": 2 }));
        assert!(result.is_err());
    }

    #[test]
    fn test_descriptor_preserves_unknown_fields() {
        let raw = json!({ "N": { "label": "L1", "v": 1, "future": { "x": true } } });
        let entry: MultiMapEntry = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(entry.label(), Some("L1"));
        assert_eq!(serde_json::to_value(&entry).unwrap(), raw);
    }

    #[test]
    fn test_explicit_nulls_survive_round_trip() {
        let text = format!(r#"{{"{}":{{"label":null,"objectdata":null,"version":1}}}}"#, KEY);
        let entry: MultiMapEntry = serde_json::from_str(&text).unwrap();
        assert_eq!(entry.label(), None);
        assert_eq!(serde_json::to_string(&entry).unwrap(), text);
    }

    #[test]
    fn test_drifted_descriptor_keeps_label() {
        let raw = json!({ KEY: { "version": "2", "label": "L1", "objectdata": "aa" } });
        let entry: MultiMapEntry = serde_json::from_value(raw.clone()).unwrap();
        assert!(matches!(entry.payload, EntryPayload::Raw(_)));
        assert_eq!(entry.label(), Some("L1"));
        assert_eq!(serde_json::to_value(&entry).unwrap(), raw);
    }

    #[test]
    fn test_raw_payload_has_no_label() {
        let entry: MultiMapEntry = serde_json::from_value(json!({ "N": "deadbeef" })).unwrap();
        assert_eq!(entry.payload, EntryPayload::Raw(json!("deadbeef")));
        assert_eq!(entry.label(), None);
    }

    #[test]
    fn test_snapshot_parses_daemon_envelope() {
        let snapshot: IdentitySnapshot = serde_json::from_value(json!({
            "identity": {
                "version": 3,
                "flags": 0,
                "primaryaddresses": ["RAddr1"],
                "minimumsignatures": 1,
                "name": "alice",
                "identityaddress": "iAlice",
                "parent": "iParent",
                "systemid": "iSystem",
                "contentmap": { KEY: "00ff" },
                "revocationauthority": "iRevoke",
                "recoveryauthority": "iRecover",
                "timelock": 0
            },
            "status": "active",
            "blockheight": 42,
            "txid": "abc"
        }))
        .unwrap();

        assert_eq!(snapshot.identity.name, "alice");
        assert_eq!(snapshot.identity.content_map.get(KEY).map(String::as_str), Some("00ff"));
        assert!(snapshot.identity.content_multimap.is_empty());
        assert_eq!(snapshot.block_height, Some(42));
    }

    #[test]
    fn test_mutation_request_omits_absent_content() {
        let request = IdentityMutationRequest {
            name: "alice".into(),
            parent: String::new(),
            primary_addresses: vec!["RAddr1".into()],
            minimum_signatures: 1,
            revocation_authority: "iRevoke".into(),
            recovery_authority: "iRecover".into(),
            private_address: None,
            content_map: Some(ContentMap::new()),
            content_multimap: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("contentmap").is_some());
        assert!(value.get("contentmultimap").is_none());
        assert!(value.get("parent").is_none());
        assert_eq!(value["primaryaddresses"], json!(["RAddr1"]));
    }

    #[test]
    fn test_summary_from_malformed_value() {
        let summary = IdentitySummary::from_value(&json!(17));
        assert_eq!(summary, IdentitySummary::default());

        let summary = IdentitySummary::from_value(&json!({
            "identity": { "name": "bob", "identityaddress": "iBob" },
            "status": "active"
        }));
        assert_eq!(summary.name.as_deref(), Some("bob"));
        assert_eq!(summary.status.as_deref(), Some("active"));
    }
}
