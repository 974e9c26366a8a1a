//! Revision-guarded meta patch payloads.

use crate::types::privacy::{Discoverability, Joinability};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A partial update of a flat meta schema.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaPatch {
    /// Keys to remove.
    pub delete: Vec<String>,
    /// Keys to add or replace, already encoded.
    pub update: IndexMap<String, String>,
    /// Keys to force-write regardless of the stored value.
    #[serde(rename = "override")]
    pub overridden: IndexMap<String, String>,
}

impl MetaPatch {
    #[must_use]
    pub fn new(
        update: IndexMap<String, String>,
        delete: Vec<String>,
        overridden: IndexMap<String, String>,
    ) -> Self {
        Self {
            delete,
            update,
            overridden,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.update.is_empty() && self.overridden.is_empty()
    }
}

/// Transport-level party configuration changes sent next to a meta patch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discoverability: Option<Discoverability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joinability: Option<Joinability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u8>,
}

impl ConfigPatch {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.discoverability.is_none() && self.joinability.is_none() && self.max_size.is_none()
    }

    /// Overlay the fields set in `other`.
    pub fn merge(&mut self, other: &ConfigPatch) {
        if other.discoverability.is_some() {
            self.discoverability = other.discoverability;
        }
        if other.joinability.is_some() {
            self.joinability = other.joinability;
        }
        if other.max_size.is_some() {
            self.max_size = other.max_size;
        }
    }
}

/// Body of a party meta patch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyMetaPayload {
    pub meta: MetaPatch,
    pub revision: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigPatch>,
}

/// Body of a member meta patch. The meta sets sit at the top level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberMetaPayload {
    #[serde(flatten)]
    pub meta: MetaPatch,
    pub revision: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_patch() -> MetaPatch {
        let mut update = IndexMap::new();
        update.insert("Default:AthenaSquadFill_b".to_string(), "true".to_string());
        MetaPatch::new(update, vec!["urn:epic:cfg:not-accepting-members".into()], IndexMap::new())
    }

    #[test]
    fn test_party_payload_shape() {
        let payload = PartyMetaPayload {
            meta: sample_patch(),
            revision: 4,
            config: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "meta": {
                    "delete": ["urn:epic:cfg:not-accepting-members"],
                    "update": {"Default:AthenaSquadFill_b": "true"},
                    "override": {}
                },
                "revision": 4
            })
        );
    }

    #[test]
    fn test_party_payload_with_config() {
        let payload = PartyMetaPayload {
            meta: MetaPatch::default(),
            revision: 0,
            config: Some(ConfigPatch {
                discoverability: Some(Discoverability::InvitedOnly),
                joinability: Some(Joinability::InviteAndFormer),
                max_size: None,
            }),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value["config"],
            json!({"discoverability": "INVITED_ONLY", "joinability": "INVITE_AND_FORMER"})
        );
    }

    #[test]
    fn test_member_payload_is_flat() {
        let payload = MemberMetaPayload {
            meta: sample_patch(),
            revision: 2,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["revision"], json!(2));
        assert_eq!(value["update"]["Default:AthenaSquadFill_b"], json!("true"));
        assert!(value.get("meta").is_none());
    }

    #[test]
    fn test_config_merge() {
        let mut base = ConfigPatch {
            max_size: Some(4),
            ..Default::default()
        };
        base.merge(&ConfigPatch {
            joinability: Some(Joinability::Open),
            ..Default::default()
        });
        assert_eq!(base.max_size, Some(4));
        assert_eq!(base.joinability, Some(Joinability::Open));
        assert!(!base.is_empty());
        assert!(ConfigPatch::default().is_empty());
    }
}
