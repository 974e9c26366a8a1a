//! Party and member records as returned by the service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw party configuration. Every field is optional since lookups, creates
/// and notifications each carry a different subset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPartyConfig {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub party_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joinability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discoverability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u8>,
    #[serde(default, alias = "invite_ttl_seconds", skip_serializing_if = "Option::is_none")]
    pub invite_ttl: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_confirmation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intention_ttl: Option<u32>,
}

/// One connection of a member.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawConnection {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default)]
    pub yield_leadership: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_ttl: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disconnected_at: Option<DateTime<Utc>>,
}

/// A party member as carried by lookups and join notifications.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMember {
    #[serde(alias = "accountId")]
    pub account_id: String,
    #[serde(default, alias = "displayName", alias = "account_dn")]
    pub display_name: Option<String>,
    #[serde(default, alias = "member_state_updated")]
    pub meta: Map<String, Value>,
    #[serde(default)]
    pub connections: Vec<RawConnection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<RawConnection>,
    #[serde(default)]
    pub revision: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
}

impl RawMember {
    /// The live connection: the first one that is not disconnected, else the
    /// first one listed.
    #[must_use]
    pub fn active_connection(&self) -> Option<&RawConnection> {
        if let Some(conn) = &self.connection {
            return Some(conn);
        }
        self.connections
            .iter()
            .find(|c| c.disconnected_at.is_none())
            .or_else(|| self.connections.first())
    }
}

/// A party as returned by lookup and create.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawParty {
    pub id: String,
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub config: RawPartyConfig,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default)]
    pub members: Vec<RawMember>,
    #[serde(default)]
    pub invites: Vec<Value>,
    #[serde(default)]
    pub applicants: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// The parties a user currently belongs to.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserParties {
    #[serde(default)]
    pub current: Vec<RawParty>,
    #[serde(default)]
    pub pending: Vec<Value>,
    #[serde(default)]
    pub invites: Vec<Value>,
    #[serde(default)]
    pub pings: Vec<Value>,
}

/// Render a raw meta value the way it is stored: strings verbatim, anything
/// else as its JSON text.
#[must_use]
pub fn meta_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_member_from_join_notification() {
        let body = json!({
            "type": "com.epicgames.social.party.notification.v0.MEMBER_JOINED",
            "party_id": "p1",
            "account_id": "u2",
            "account_dn": "Bob",
            "member_state_updated": {"Default:Location_s": "PreLobby"},
            "connection": {"id": "u2@prod/V2", "meta": {}, "yield_leadership": false},
            "revision": 0,
            "joined_at": "2024-01-01T00:00:00.000Z"
        });
        let member: RawMember = serde_json::from_value(body).unwrap();
        assert_eq!(member.account_id, "u2");
        assert_eq!(member.display_name.as_deref(), Some("Bob"));
        assert_eq!(member.meta["Default:Location_s"], json!("PreLobby"));
        assert_eq!(member.active_connection().unwrap().id, "u2@prod/V2");
        assert!(member.joined_at.is_some());
    }

    #[test]
    fn test_active_connection_skips_disconnected() {
        let member: RawMember = serde_json::from_value(json!({
            "account_id": "u1",
            "connections": [
                {"id": "old", "disconnected_at": "2024-01-01T00:00:00Z"},
                {"id": "live"}
            ]
        }))
        .unwrap();
        assert_eq!(member.active_connection().unwrap().id, "live");
    }

    #[test]
    fn test_party_lookup_defaults() {
        let party: RawParty = serde_json::from_value(json!({
            "id": "p1",
            "config": {"type": "DEFAULT", "joinability": "OPEN", "max_size": 16, "invite_ttl": 14400}
        }))
        .unwrap();
        assert_eq!(party.revision, 0);
        assert_eq!(party.config.max_size, Some(16));
        assert_eq!(party.config.party_type.as_deref(), Some("DEFAULT"));
        assert!(party.members.is_empty());
    }

    #[test]
    fn test_meta_value_to_string() {
        assert_eq!(meta_value_to_string(&json!("abc")), "abc");
        assert_eq!(meta_value_to_string(&json!(7)), "7");
        assert_eq!(meta_value_to_string(&json!(true)), "true");
    }
}
