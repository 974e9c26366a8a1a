//! In-memory party service and chat room.
//!
//! Used by the integration tests and by `partyd --offline`. The service keeps
//! every party in a map, enforces member and party revisions the way the real
//! service does, and pushes the notifications the real service would send
//! onto a channel that can be fed straight into a
//! [`PartyReconciler`](crate::PartyReconciler).

use crate::error::{PartyError, Result};
use crate::notification::NotificationKind;
use crate::transport::ChatRoom;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use party_http::{
    codes, ConfigPatch, CreatePartyRequest, HttpError, InviteRequest, JoinPartyRequest,
    LeavePartyRequest, MemberMetaPayload, MetaPatch, PartyMetaPayload, PartyService, RawConnection,
    RawMember, RawParty, RawPartyConfig, ServiceError, UserParties,
};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

const NOTIFICATION_BUFFER: usize = 1024;

/// One call made against [`MemoryPartyService`].
#[derive(Clone, Debug, PartialEq)]
pub enum ServiceCall {
    Lookup(String),
    LookupUser(String),
    Create(String),
    Join { party_id: String, user_id: String },
    Leave { party_id: String, user_id: String },
    Kick { party_id: String, member_id: String },
    Promote { party_id: String, member_id: String },
    Confirm { party_id: String, applicant_id: String },
    Reject { party_id: String, applicant_id: String },
    Invite { party_id: String, user_id: String },
    UpdateMeta { party_id: String, payload: PartyMetaPayload },
    UpdateMemberMeta {
        party_id: String,
        user_id: String,
        payload: MemberMetaPayload,
    },
}

impl ServiceCall {
    /// Name of the service operation.
    #[must_use]
    pub fn op(&self) -> &'static str {
        match self {
            ServiceCall::Lookup(_) => "party_lookup",
            ServiceCall::LookupUser(_) => "party_lookup_user",
            ServiceCall::Create(_) => "party_create",
            ServiceCall::Join { .. } => "party_join_request",
            ServiceCall::Leave { .. } => "party_leave",
            ServiceCall::Kick { .. } => "party_kick_member",
            ServiceCall::Promote { .. } => "party_promote_member",
            ServiceCall::Confirm { .. } => "party_member_confirm",
            ServiceCall::Reject { .. } => "party_member_reject",
            ServiceCall::Invite { .. } => "party_send_invite",
            ServiceCall::UpdateMeta { .. } => "party_update_meta",
            ServiceCall::UpdateMemberMeta { .. } => "party_update_member_meta",
        }
    }
}

#[derive(Default)]
struct ServiceState {
    parties: HashMap<String, RawParty>,
    calls: Vec<ServiceCall>,
    failures: VecDeque<(&'static str, ServiceError)>,
    /// Joins that are accepted but never announced.
    silent_joins: HashSet<String>,
}

impl ServiceState {
    fn take_failure(&mut self, op: &str) -> party_http::Result<()> {
        match self.failures.iter().position(|(o, _)| *o == op) {
            Some(idx) => match self.failures.remove(idx) {
                Some((_, err)) => Err(HttpError::Service(err)),
                None => Ok(()),
            },
            None => Ok(()),
        }
    }

    fn party_mut(&mut self, party_id: &str) -> party_http::Result<&mut RawParty> {
        self.parties
            .get_mut(party_id)
            .ok_or_else(|| not_found(codes::PARTY_NOT_FOUND, party_id))
    }

    fn party_of(&self, user_id: &str) -> Option<&RawParty> {
        self.parties
            .values()
            .find(|p| p.members.iter().any(|m| m.account_id == user_id))
    }
}

fn not_found(code: &str, id: &str) -> HttpError {
    HttpError::service(404, code, vec![id.to_string()])
}

fn notification(kind: NotificationKind, party_id: &str, body: Value) -> Value {
    let mut out = json!({
        "type": kind.type_name(),
        "party_id": party_id,
        "sent": Utc::now(),
    });
    if let (Some(out), Value::Object(body)) = (out.as_object_mut(), body) {
        out.extend(body);
    }
    out
}

fn member_joined(party_id: &str, member: &RawMember) -> Value {
    notification(
        NotificationKind::MemberJoined,
        party_id,
        json!({
            "account_id": member.account_id,
            "account_dn": member.display_name,
            "revision": member.revision,
            "role": member.role,
            "joined_at": member.joined_at,
            "member_state_updated": member.meta,
            "connection": member.connection,
        }),
    )
}

/// Write a patch into a raw meta map. Returns the keys written.
fn apply_patch(meta: &mut Map<String, Value>, patch: &MetaPatch) -> Map<String, Value> {
    let mut written = Map::new();
    for key in &patch.delete {
        meta.remove(key);
    }
    for (key, value) in patch.update.iter().chain(patch.overridden.iter()) {
        meta.insert(key.clone(), json!(value));
        written.insert(key.clone(), json!(value));
    }
    written
}

fn apply_config(config: &mut RawPartyConfig, patch: &ConfigPatch) {
    if let Some(d) = patch.discoverability {
        config.discoverability = Some(d.as_str().to_string());
    }
    if let Some(j) = patch.joinability {
        config.joinability = Some(j.as_str().to_string());
    }
    if let Some(m) = patch.max_size {
        config.max_size = Some(m);
    }
}

fn captain_of(party: &RawParty) -> Option<String> {
    party
        .members
        .iter()
        .find(|m| m.role.as_deref() == Some("CAPTAIN"))
        .map(|m| m.account_id.clone())
}

/// A party service living in process memory.
pub struct MemoryPartyService {
    state: Mutex<ServiceState>,
    outbox: Mutex<Option<mpsc::Sender<Value>>>,
}

impl Default for MemoryPartyService {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryPartyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPartyService")
            .field("parties", &self.state.lock().parties.len())
            .finish_non_exhaustive()
    }
}

impl MemoryPartyService {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServiceState::default()),
            outbox: Mutex::new(None),
        }
    }

    /// Receive every notification sent from now on. Replaces any earlier
    /// subscriber.
    pub fn notifications(&self) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(NOTIFICATION_BUFFER);
        *self.outbox.lock() = Some(tx);
        rx
    }

    /// Push a raw notification to the subscriber.
    pub fn notify(&self, notification: Value) {
        let Some(tx) = self.outbox.lock().clone() else {
            return;
        };
        if let Err(e) = tx.try_send(notification) {
            tracing::warn!("[MemoryService] dropping notification: {}", e);
        }
    }

    fn notify_all(&self, notifications: Vec<Value>) {
        for n in notifications {
            self.notify(n);
        }
    }

    /// Every call made so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.state.lock().calls.clone()
    }

    /// Number of calls made to `op`.
    #[must_use]
    pub fn call_count(&self, op: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    /// Fail the next call to `op` with the service error `code`.
    pub fn fail_next(&self, op: &'static str, status: u16, code: &str, message_vars: Vec<String>) {
        let err = ServiceError {
            status,
            error_code: code.to_string(),
            message_vars,
            ..Default::default()
        };
        self.state.lock().failures.push_back((op, err));
    }

    /// Accept joins of `user_id` without sending the join notification.
    pub fn suppress_join_notifications(&self, user_id: &str) {
        self.state.lock().silent_joins.insert(user_id.to_string());
    }

    /// The stored party.
    #[must_use]
    pub fn party(&self, party_id: &str) -> Option<RawParty> {
        self.state.lock().parties.get(party_id).cloned()
    }

    /// Seed a party with no local involvement, led by `leader_id`.
    pub fn insert_party(&self, party_id: &str, leader_id: &str, max_size: u8) {
        let leader = RawMember {
            account_id: leader_id.to_string(),
            display_name: Some(leader_id.to_string()),
            role: Some("CAPTAIN".to_string()),
            joined_at: Some(Utc::now()),
            connection: Some(RawConnection {
                id: format!("{leader_id}@prod/V2"),
                connected_at: Some(Utc::now()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let party = RawParty {
            id: party_id.to_string(),
            config: RawPartyConfig {
                joinability: Some("OPEN".to_string()),
                discoverability: Some("ALL".to_string()),
                max_size: Some(max_size),
                ..Default::default()
            },
            members: vec![leader],
            created_at: Some(Utc::now()),
            ..Default::default()
        };
        self.state.lock().parties.insert(party_id.to_string(), party);
    }

    /// Another user joins `party_id`.
    pub fn add_member(&self, party_id: &str, user_id: &str) -> Result<()> {
        let member = RawMember {
            account_id: user_id.to_string(),
            display_name: Some(user_id.to_string()),
            role: Some("MEMBER".to_string()),
            joined_at: Some(Utc::now()),
            connection: Some(RawConnection {
                id: format!("{user_id}@prod/V2"),
                connected_at: Some(Utc::now()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let notification = {
            let mut state = self.state.lock();
            let party = state.party_mut(party_id)?;
            party.members.push(member.clone());
            member_joined(party_id, &member)
        };
        self.notify(notification);
        Ok(())
    }

    /// Another member publishes a state change.
    pub fn update_member_state(
        &self,
        party_id: &str,
        user_id: &str,
        updated: Map<String, Value>,
    ) -> Result<()> {
        let notification = {
            let mut state = self.state.lock();
            let party = state.party_mut(party_id)?;
            let member = party
                .members
                .iter_mut()
                .find(|m| m.account_id == user_id)
                .ok_or_else(|| not_found(codes::MEMBER_NOT_FOUND, user_id))?;
            member.meta.extend(updated.clone());
            member.revision += 1;
            notification(
                NotificationKind::MemberStateUpdated,
                party_id,
                json!({
                    "account_id": user_id,
                    "revision": member.revision,
                    "member_state_updated": updated,
                    "member_state_removed": [],
                }),
            )
        };
        self.notify(notification);
        Ok(())
    }

    /// Remove `user_id` from `party_id` and announce it as `kind`. Hands the
    /// captaincy on when the captain goes.
    pub fn remove_member(&self, party_id: &str, user_id: &str, kind: NotificationKind) -> Result<()> {
        let notifications = {
            let mut state = self.state.lock();
            Self::remove_locked(&mut state, party_id, user_id, kind)?
        };
        self.notify_all(notifications);
        Ok(())
    }

    fn remove_locked(
        state: &mut ServiceState,
        party_id: &str,
        user_id: &str,
        kind: NotificationKind,
    ) -> party_http::Result<Vec<Value>> {
        let party = state.party_mut(party_id)?;
        let idx = party
            .members
            .iter()
            .position(|m| m.account_id == user_id)
            .ok_or_else(|| not_found(codes::MEMBER_NOT_FOUND, user_id))?;
        let removed = party.members.remove(idx);
        let mut out = vec![notification(
            kind,
            party_id,
            json!({"account_id": user_id, "revision": party.revision}),
        )];

        if party.members.is_empty() {
            state.parties.remove(party_id);
            return Ok(out);
        }
        if removed.role.as_deref() == Some("CAPTAIN") {
            if let Some(next) = party.members.first_mut() {
                next.role = Some("CAPTAIN".to_string());
                out.push(notification(
                    NotificationKind::MemberNewCaptain,
                    party_id,
                    json!({"account_id": next.account_id, "revision": party.revision}),
                ));
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl PartyService for MemoryPartyService {
    async fn party_lookup(&self, party_id: &str) -> party_http::Result<RawParty> {
        let mut state = self.state.lock();
        state.calls.push(ServiceCall::Lookup(party_id.to_string()));
        state.take_failure("party_lookup")?;
        state
            .parties
            .get(party_id)
            .cloned()
            .ok_or_else(|| not_found(codes::PARTY_NOT_FOUND, party_id))
    }

    async fn party_lookup_user(&self, user_id: &str) -> party_http::Result<UserParties> {
        let mut state = self.state.lock();
        state.calls.push(ServiceCall::LookupUser(user_id.to_string()));
        state.take_failure("party_lookup_user")?;
        Ok(UserParties {
            current: state.party_of(user_id).cloned().into_iter().collect(),
            ..Default::default()
        })
    }

    async fn party_create(&self, request: &CreatePartyRequest) -> party_http::Result<RawParty> {
        let conn = &request.join_info.connection;
        let user_id = conn.id.split('@').next().unwrap_or_default().to_string();
        let (party, notification) = {
            let mut state = self.state.lock();
            state.calls.push(ServiceCall::Create(user_id.clone()));
            state.take_failure("party_create")?;
            if state.party_of(&user_id).is_some() {
                return Err(HttpError::service(409, codes::USER_HAS_PARTY, vec![user_id]));
            }

            let party_id = Uuid::new_v4().simple().to_string();
            let member = RawMember {
                account_id: user_id.clone(),
                display_name: Some(user_id.clone()),
                role: Some("CAPTAIN".to_string()),
                joined_at: Some(Utc::now()),
                connection: Some(RawConnection {
                    id: conn.id.clone(),
                    meta: conn.meta.clone(),
                    yield_leadership: conn.yield_leadership.unwrap_or(false),
                    offline_ttl: conn.offline_ttl,
                    connected_at: Some(Utc::now()),
                    disconnected_at: None,
                }),
                ..Default::default()
            };
            let party = RawParty {
                id: party_id.clone(),
                revision: 0,
                config: RawPartyConfig {
                    joinability: Some(request.config.joinability.as_str().to_string()),
                    discoverability: Some("ALL".to_string()),
                    max_size: Some(request.config.max_size),
                    join_confirmation: Some(request.config.join_confirmation),
                    ..Default::default()
                },
                meta: request.meta.clone(),
                members: vec![member.clone()],
                created_at: Some(Utc::now()),
                ..Default::default()
            };
            state.parties.insert(party_id.clone(), party.clone());
            let notification = (!state.silent_joins.contains(&user_id))
                .then(|| member_joined(&party_id, &member));
            (party, notification)
        };
        if let Some(n) = notification {
            self.notify(n);
        }
        Ok(party)
    }

    async fn party_join_request(
        &self,
        party_id: &str,
        user_id: &str,
        request: &JoinPartyRequest,
    ) -> party_http::Result<()> {
        let notification = {
            let mut state = self.state.lock();
            state.calls.push(ServiceCall::Join {
                party_id: party_id.to_string(),
                user_id: user_id.to_string(),
            });
            state.take_failure("party_join_request")?;
            if state.party_of(user_id).is_some_and(|p| p.id != party_id) {
                return Err(HttpError::service(409, codes::USER_HAS_PARTY, vec![user_id.to_string()]));
            }
            let silent = state.silent_joins.contains(user_id);
            let party = state.party_mut(party_id)?;
            let conn = &request.connection;
            let member = RawMember {
                account_id: user_id.to_string(),
                display_name: request
                    .meta
                    .get("urn:epic:member:dn_s")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                role: Some("MEMBER".to_string()),
                joined_at: Some(Utc::now()),
                connection: Some(RawConnection {
                    id: conn.id.clone(),
                    meta: conn.meta.clone(),
                    yield_leadership: conn.yield_leadership.unwrap_or(false),
                    offline_ttl: conn.offline_ttl,
                    connected_at: Some(Utc::now()),
                    disconnected_at: None,
                }),
                ..Default::default()
            };
            party.members.retain(|m| m.account_id != user_id);
            party.members.push(member.clone());
            (!silent).then(|| member_joined(party_id, &member))
        };
        if let Some(n) = notification {
            self.notify(n);
        }
        Ok(())
    }

    async fn party_leave(
        &self,
        party_id: &str,
        user_id: &str,
        _request: &LeavePartyRequest,
    ) -> party_http::Result<()> {
        let notifications = {
            let mut state = self.state.lock();
            state.calls.push(ServiceCall::Leave {
                party_id: party_id.to_string(),
                user_id: user_id.to_string(),
            });
            state.take_failure("party_leave")?;
            Self::remove_locked(&mut state, party_id, user_id, NotificationKind::MemberLeft)?
        };
        self.notify_all(notifications);
        Ok(())
    }

    async fn party_kick_member(&self, party_id: &str, member_id: &str) -> party_http::Result<()> {
        let notifications = {
            let mut state = self.state.lock();
            state.calls.push(ServiceCall::Kick {
                party_id: party_id.to_string(),
                member_id: member_id.to_string(),
            });
            state.take_failure("party_kick_member")?;
            Self::remove_locked(&mut state, party_id, member_id, NotificationKind::MemberKicked)?
        };
        self.notify_all(notifications);
        Ok(())
    }

    async fn party_promote_member(&self, party_id: &str, member_id: &str) -> party_http::Result<()> {
        let notification = {
            let mut state = self.state.lock();
            state.calls.push(ServiceCall::Promote {
                party_id: party_id.to_string(),
                member_id: member_id.to_string(),
            });
            state.take_failure("party_promote_member")?;
            let party = state.party_mut(party_id)?;
            if !party.members.iter().any(|m| m.account_id == member_id) {
                return Err(not_found(codes::MEMBER_NOT_FOUND, member_id));
            }
            for m in &mut party.members {
                m.role = Some(if m.account_id == member_id { "CAPTAIN" } else { "MEMBER" }.to_string());
            }
            notification(
                NotificationKind::MemberNewCaptain,
                party_id,
                json!({"account_id": member_id, "revision": party.revision}),
            )
        };
        self.notify(notification);
        Ok(())
    }

    async fn party_member_confirm(&self, party_id: &str, applicant_id: &str) -> party_http::Result<()> {
        let mut state = self.state.lock();
        state.calls.push(ServiceCall::Confirm {
            party_id: party_id.to_string(),
            applicant_id: applicant_id.to_string(),
        });
        state.take_failure("party_member_confirm")
    }

    async fn party_member_reject(&self, party_id: &str, applicant_id: &str) -> party_http::Result<()> {
        let mut state = self.state.lock();
        state.calls.push(ServiceCall::Reject {
            party_id: party_id.to_string(),
            applicant_id: applicant_id.to_string(),
        });
        state.take_failure("party_member_reject")
    }

    async fn party_send_invite(
        &self,
        party_id: &str,
        user_id: &str,
        _request: &InviteRequest,
    ) -> party_http::Result<()> {
        let mut state = self.state.lock();
        state.calls.push(ServiceCall::Invite {
            party_id: party_id.to_string(),
            user_id: user_id.to_string(),
        });
        state.take_failure("party_send_invite")?;
        state.party_mut(party_id).map(|_| ())
    }

    async fn party_update_meta(&self, party_id: &str, payload: &PartyMetaPayload) -> party_http::Result<()> {
        let notification = {
            let mut state = self.state.lock();
            state.calls.push(ServiceCall::UpdateMeta {
                party_id: party_id.to_string(),
                payload: payload.clone(),
            });
            state.take_failure("party_update_meta")?;
            let party = state.party_mut(party_id)?;
            if payload.revision != party.revision {
                return Err(HttpError::service(
                    409,
                    codes::STALE_REVISION,
                    vec![payload.revision.to_string(), party.revision.to_string()],
                ));
            }
            let written = apply_patch(&mut party.meta, &payload.meta);
            if let Some(config) = &payload.config {
                apply_config(&mut party.config, config);
            }
            party.revision += 1;
            notification(
                NotificationKind::PartyUpdated,
                party_id,
                json!({
                    "revision": party.revision,
                    "captain_id": captain_of(party),
                    "party_state_updated": written,
                    "party_state_removed": payload.meta.delete,
                    "party_privacy_type": party.config.joinability,
                    "max_number_of_members": party.config.max_size,
                }),
            )
        };
        self.notify(notification);
        Ok(())
    }

    async fn party_update_member_meta(
        &self,
        party_id: &str,
        user_id: &str,
        payload: &MemberMetaPayload,
    ) -> party_http::Result<()> {
        let notification = {
            let mut state = self.state.lock();
            state.calls.push(ServiceCall::UpdateMemberMeta {
                party_id: party_id.to_string(),
                user_id: user_id.to_string(),
                payload: payload.clone(),
            });
            state.take_failure("party_update_member_meta")?;
            let party = state.party_mut(party_id)?;
            let member = party
                .members
                .iter_mut()
                .find(|m| m.account_id == user_id)
                .ok_or_else(|| not_found(codes::MEMBER_NOT_FOUND, user_id))?;
            if payload.revision != member.revision {
                return Err(HttpError::service(
                    409,
                    codes::STALE_REVISION,
                    vec![payload.revision.to_string(), member.revision.to_string()],
                ));
            }
            let written = apply_patch(&mut member.meta, &payload.meta);
            member.revision += 1;
            notification(
                NotificationKind::MemberStateUpdated,
                party_id,
                json!({
                    "account_id": user_id,
                    "revision": member.revision,
                    "member_state_updated": written,
                    "member_state_removed": payload.meta.delete,
                }),
            )
        };
        self.notify(notification);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RoomState {
    room: Option<String>,
    occupants: HashSet<String>,
    messages: Vec<String>,
    presence: Vec<Value>,
    bans: Vec<(String, Option<String>)>,
}

/// A chat room that lives in process memory.
#[derive(Debug)]
pub struct MemoryChatRoom {
    user_id: String,
    state: Mutex<RoomState>,
    changed: watch::Sender<u64>,
}

impl MemoryChatRoom {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            user_id: user_id.into(),
            state: Mutex::new(RoomState::default()),
            changed,
        }
    }

    fn bump(&self) {
        self.changed.send_modify(|v| *v += 1);
    }

    async fn wait_until(&self, timeout: Duration, cond: impl Fn(&RoomState) -> bool) -> bool {
        let mut rx = self.changed.subscribe();
        let waited = tokio::time::timeout(timeout, rx.wait_for(|_| cond(&self.state.lock()))).await;
        matches!(waited, Ok(Ok(_)))
    }

    /// Another user enters the current room.
    pub fn add_occupant(&self, user_id: &str) {
        self.state.lock().occupants.insert(user_id.to_string());
        self.bump();
    }

    #[must_use]
    pub fn room(&self) -> Option<String> {
        self.state.lock().room.clone()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.state.lock().messages.clone()
    }

    /// Every presence status sent, oldest first.
    #[must_use]
    pub fn presences(&self) -> Vec<Value> {
        self.state.lock().presence.clone()
    }

    #[must_use]
    pub fn bans(&self) -> Vec<(String, Option<String>)> {
        self.state.lock().bans.clone()
    }
}

#[async_trait]
impl ChatRoom for MemoryChatRoom {
    async fn join_room(&self, party_id: &str) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.room = Some(party_id.to_string());
            state.occupants.clear();
            state.occupants.insert(self.user_id.clone());
        }
        self.bump();
        Ok(())
    }

    async fn leave_room(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.room = None;
            state.occupants.clear();
        }
        self.bump();
        Ok(())
    }

    async fn send_message(&self, content: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.room.is_none() {
            return Err(PartyError::Chat("not in a room".to_string()));
        }
        state.messages.push(content.to_string());
        Ok(())
    }

    async fn set_presence(&self, status: &Value) -> Result<()> {
        self.state.lock().presence.push(status.clone());
        Ok(())
    }

    async fn wait_for_room_enter(&self, timeout: Duration) -> bool {
        self.wait_until(timeout, |s| s.room.is_some()).await
    }

    async fn wait_for_member_join(&self, user_id: &str, timeout: Duration) -> bool {
        self.wait_until(timeout, |s| s.occupants.contains(user_id))
            .await
    }

    fn has_occupant(&self, user_id: &str) -> bool {
        self.state.lock().occupants.contains(user_id)
    }

    async fn ban(&self, user_id: &str, reason: Option<&str>) -> Result<()> {
        let mut state = self.state.lock();
        state.occupants.remove(user_id);
        state
            .bans
            .push((user_id.to_string(), reason.map(str::to_string)));
        Ok(())
    }
}
