//! Decoding of inbound party notifications.

use crate::error::Result;
use crate::party::PartyUpdate;
use chrono::{DateTime, Utc};
use party_http::{RawMember, RawPartyConfig};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// Namespace every party notification type starts with.
pub const NOTIFICATION_PREFIX: &str = "com.epicgames.social.party.notification.v0.";

/// The party notifications this client reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    MemberJoined,
    MemberLeft,
    MemberExpired,
    MemberKicked,
    MemberDisconnected,
    MemberNewCaptain,
    PartyUpdated,
    MemberStateUpdated,
    MemberRequireConfirmation,
    InviteDeclined,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 10] = [
        NotificationKind::MemberJoined,
        NotificationKind::MemberLeft,
        NotificationKind::MemberExpired,
        NotificationKind::MemberKicked,
        NotificationKind::MemberDisconnected,
        NotificationKind::MemberNewCaptain,
        NotificationKind::PartyUpdated,
        NotificationKind::MemberStateUpdated,
        NotificationKind::MemberRequireConfirmation,
        NotificationKind::InviteDeclined,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::MemberJoined => "MEMBER_JOINED",
            NotificationKind::MemberLeft => "MEMBER_LEFT",
            NotificationKind::MemberExpired => "MEMBER_EXPIRED",
            NotificationKind::MemberKicked => "MEMBER_KICKED",
            NotificationKind::MemberDisconnected => "MEMBER_DISCONNECTED",
            NotificationKind::MemberNewCaptain => "MEMBER_NEW_CAPTAIN",
            NotificationKind::PartyUpdated => "PARTY_UPDATED",
            NotificationKind::MemberStateUpdated => "MEMBER_STATE_UPDATED",
            NotificationKind::MemberRequireConfirmation => "MEMBER_REQUIRE_CONFIRMATION",
            NotificationKind::InviteDeclined => "INVITE_DECLINED",
        }
    }

    /// Parse a fully namespaced notification type.
    #[must_use]
    pub fn from_type(type_name: &str) -> Option<Self> {
        let name = type_name.strip_prefix(NOTIFICATION_PREFIX)?;
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// The namespaced type string.
    #[must_use]
    pub fn type_name(self) -> String {
        format!("{NOTIFICATION_PREFIX}{}", self.as_str())
    }

    /// Whether the member this notification names leaves the party.
    #[must_use]
    pub fn removes_member(self) -> bool {
        matches!(
            self,
            NotificationKind::MemberLeft
                | NotificationKind::MemberExpired
                | NotificationKind::MemberKicked
                | NotificationKind::MemberDisconnected
        )
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields shared by party notification bodies. Which ones are present
/// depends on the kind.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NotificationBody {
    #[serde(default)]
    pub party_id: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub captain_id: Option<String>,
    #[serde(default)]
    pub party_state_updated: Map<String, Value>,
    #[serde(default)]
    pub party_state_removed: Vec<String>,
    #[serde(default)]
    pub member_state_updated: Map<String, Value>,
    #[serde(default)]
    pub member_state_removed: Vec<String>,
    #[serde(default)]
    pub party_privacy_type: Option<String>,
    #[serde(default)]
    pub max_number_of_members: Option<u8>,
    #[serde(default)]
    pub party_sub_type: Option<String>,
    #[serde(default)]
    pub party_type: Option<String>,
    #[serde(default)]
    pub invite_ttl_seconds: Option<u32>,
    #[serde(default)]
    pub invitee_id: Option<String>,
    #[serde(default)]
    pub sent: Option<DateTime<Utc>>,
}

/// A decoded inbound notification.
#[derive(Clone, Debug)]
pub struct Notification {
    pub kind: NotificationKind,
    pub body: NotificationBody,
    raw: Value,
}

impl Notification {
    /// Decode a notification. Types outside the party namespace or not
    /// handled by this client yield `Ok(None)`.
    pub fn decode(raw: Value) -> Result<Option<Self>> {
        let Some(kind) = raw
            .get("type")
            .and_then(Value::as_str)
            .and_then(NotificationKind::from_type)
        else {
            return Ok(None);
        };
        let body = NotificationBody::deserialize(&raw)?;
        Ok(Some(Self { kind, body, raw }))
    }

    pub fn from_json(text: &str) -> Result<Option<Self>> {
        Self::decode(serde_json::from_str(text)?)
    }

    #[must_use]
    pub fn party_id(&self) -> Option<&str> {
        self.body.party_id.as_deref()
    }

    #[must_use]
    pub fn account_id(&self) -> Option<&str> {
        self.body.account_id.as_deref()
    }

    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// The member carried by a join notification.
    pub fn member(&self) -> Result<RawMember> {
        Ok(RawMember::deserialize(&self.raw)?)
    }

    /// The party changes carried by a `PARTY_UPDATED` body.
    #[must_use]
    pub fn party_update(&self) -> PartyUpdate {
        let body = &self.body;
        PartyUpdate {
            revision: body.revision,
            config: RawPartyConfig {
                party_type: body.party_type.clone(),
                joinability: body.party_privacy_type.clone(),
                sub_type: body.party_sub_type.clone(),
                max_size: body.max_number_of_members,
                invite_ttl: body.invite_ttl_seconds,
                ..Default::default()
            },
            updated: body.party_state_updated.clone(),
            removed: body.party_state_removed.clone(),
            captain_id: body.captain_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_round_trip() {
        for kind in NotificationKind::ALL {
            assert_eq!(NotificationKind::from_type(&kind.type_name()), Some(kind));
        }
        assert_eq!(NotificationKind::from_type("MEMBER_JOINED"), None);
        assert_eq!(
            NotificationKind::from_type("com.epicgames.social.party.notification.v0.PING"),
            None
        );
    }

    #[test]
    fn test_unknown_types_are_ignored() {
        let n = Notification::decode(json!({"type": "com.epicgames.friends.core.apiobjects.Friend"}))
            .unwrap();
        assert!(n.is_none());
        assert!(Notification::decode(json!({"no": "type"})).unwrap().is_none());
    }

    #[test]
    fn test_member_joined_body() {
        let n = Notification::decode(json!({
            "type": NotificationKind::MemberJoined.type_name(),
            "party_id": "p1",
            "account_id": "u2",
            "account_dn": "Bob",
            "revision": 0,
            "member_state_updated": {"Default:Location_s": "PreLobby"},
            "connection": {"id": "u2@prod/V2", "meta": {}}
        }))
        .unwrap()
        .unwrap();
        assert_eq!(n.kind, NotificationKind::MemberJoined);
        assert_eq!(n.party_id(), Some("p1"));
        let member = n.member().unwrap();
        assert_eq!(member.account_id, "u2");
        assert_eq!(member.display_name.as_deref(), Some("Bob"));
        assert_eq!(member.meta.len(), 1);
    }

    #[test]
    fn test_party_updated_body() {
        let n = Notification::decode(json!({
            "type": NotificationKind::PartyUpdated.type_name(),
            "party_id": "p1",
            "revision": 7,
            "captain_id": "u1",
            "party_privacy_type": "INVITE_AND_FORMER",
            "max_number_of_members": 4,
            "party_sub_type": "default",
            "party_type": "DEFAULT",
            "invite_ttl_seconds": 14400,
            "party_state_updated": {"Default:AthenaSquadFill_b": "false"},
            "party_state_removed": ["Default:Gone_s"]
        }))
        .unwrap()
        .unwrap();
        let update = n.party_update();
        assert_eq!(update.revision, 7);
        assert_eq!(update.config.joinability.as_deref(), Some("INVITE_AND_FORMER"));
        assert_eq!(update.config.max_size, Some(4));
        assert_eq!(update.removed, vec!["Default:Gone_s"]);
        assert_eq!(update.captain_id.as_deref(), Some("u1"));
    }

    #[test]
    fn test_removal_kinds() {
        assert!(NotificationKind::MemberKicked.removes_member());
        assert!(!NotificationKind::MemberJoined.removes_member());
        assert_eq!(NotificationKind::MemberExpired.to_string(), "MEMBER_EXPIRED");
    }
}
