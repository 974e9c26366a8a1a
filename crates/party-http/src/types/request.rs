//! Request bodies for the party endpoints.
//!
//! Each body carries the caller's connection details, so they are built from
//! a [`ClientIdentity`] rather than assembled by hand at every call site.

use crate::types::privacy::Joinability;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Connection type reported for game clients.
pub const CONN_TYPE: &str = "game";

/// Who is talking to the party service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub user_id: String,
    pub display_name: String,
    /// Full chat address used as the connection id.
    pub jid: String,
    /// Short platform code such as `WIN`.
    pub platform: String,
    pub build_id: String,
}

impl ClientIdentity {
    fn connection_meta(&self) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert("urn:epic:conn:platform_s".into(), json!(self.platform));
        meta.insert("urn:epic:conn:type_s".into(), json!(CONN_TYPE));
        meta
    }

    fn connection(&self, yield_leadership: bool, offline_ttl: u32) -> ConnectionInfo {
        ConnectionInfo {
            id: self.jid.clone(),
            meta: self.connection_meta(),
            yield_leadership: Some(yield_leadership),
            offline_ttl: Some(offline_ttl),
        }
    }
}

/// Connection block sent on create, join and leave.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub id: String,
    pub meta: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yield_leadership: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_ttl: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreatePartyConfig {
    pub join_confirmation: bool,
    pub joinability: Joinability,
    pub max_size: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JoinInfo {
    pub connection: ConnectionInfo,
}

/// Body of `POST parties`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreatePartyRequest {
    pub config: CreatePartyConfig,
    pub join_info: JoinInfo,
    pub meta: Map<String, Value>,
}

impl CreatePartyRequest {
    #[must_use]
    pub fn new(
        identity: &ClientIdentity,
        config: CreatePartyConfig,
        chat_enabled: bool,
        yield_leadership: bool,
        offline_ttl: u32,
    ) -> Self {
        let mut meta = Map::new();
        meta.insert("urn:epic:cfg:accepting-members_b".into(), json!(false));
        meta.insert("urn:epic:cfg:build-id_s".into(), json!(identity.build_id));
        meta.insert("urn:epic:cfg:can-join_b".into(), json!(true));
        meta.insert(
            "urn:epic:cfg:chat-enabled_b".into(),
            json!(chat_enabled.to_string()),
        );
        meta.insert("urn:epic:cfg:invite-perm_s".into(), json!("Noone"));
        meta.insert("urn:epic:cfg:join-request-action_s".into(), json!("Manual"));
        meta.insert("urn:epic:cfg:not-accepting-members-reason_i".into(), json!(0));
        meta.insert("urn:epic:cfg:party-type-id_s".into(), json!("default"));
        meta.insert("urn:epic:cfg:presence-perm_s".into(), json!("Noone"));

        Self {
            config,
            join_info: JoinInfo {
                connection: identity.connection(yield_leadership, offline_ttl),
            },
            meta,
        }
    }
}

/// Body of `POST parties/{id}/members/{user}/join`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JoinPartyRequest {
    pub connection: ConnectionInfo,
    pub meta: Map<String, Value>,
}

impl JoinPartyRequest {
    #[must_use]
    pub fn new(identity: &ClientIdentity, yield_leadership: bool, offline_ttl: u32) -> Self {
        let data = json!({"CrossplayPreference": "1", "SubGame_u": "1"}).to_string();
        let users = json!({
            "users": [{
                "id": identity.user_id,
                "dn": identity.display_name,
                "plat": identity.platform,
                "data": data,
            }]
        })
        .to_string();

        let mut meta = Map::new();
        meta.insert("urn:epic:member:dn_s".into(), json!(identity.display_name));
        meta.insert("urn:epic:member:joinrequestusers_j".into(), json!(users));

        Self {
            connection: identity.connection(yield_leadership, offline_ttl),
            meta,
        }
    }
}

/// Body of `DELETE parties/{id}/members/{self}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeavePartyRequest {
    pub connection: ConnectionInfo,
    pub meta: Map<String, Value>,
}

impl LeavePartyRequest {
    #[must_use]
    pub fn new(identity: &ClientIdentity) -> Self {
        let mut meta = Map::new();
        meta.insert("urn:epic:member:dn_s".into(), json!(identity.display_name));
        meta.insert("urn:epic:member:type_s".into(), json!(CONN_TYPE));
        meta.insert("urn:epic:member:platform_s".into(), json!(identity.platform));
        meta.insert(
            "urn:epic:member:joinrequest_j".into(),
            json!(json!({"CrossplayPreference_i": "1"}).to_string()),
        );

        Self {
            connection: ConnectionInfo {
                id: identity.jid.clone(),
                meta: identity.connection_meta(),
                yield_leadership: None,
                offline_ttl: None,
            },
            meta,
        }
    }
}

/// Body of `POST parties/{id}/invites/{user}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InviteRequest(pub Map<String, Value>);

impl InviteRequest {
    #[must_use]
    pub fn new(identity: &ClientIdentity) -> Self {
        let mut meta = Map::new();
        meta.insert("urn:epic:cfg:build-id_s".into(), json!(identity.build_id));
        meta.insert("urn:epic:conn:platform_s".into(), json!(identity.platform));
        meta.insert("urn:epic:conn:type_s".into(), json!(CONN_TYPE));
        meta.insert("urn:epic:invite:platformdata_s".into(), json!(""));
        meta.insert("urn:epic:member:dn_s".into(), json!(identity.display_name));
        Self(meta)
    }
}
