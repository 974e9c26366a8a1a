use super::member::{Change, PartyMember, Role};
use crate::error::Result;
use crate::meta::{PartyMemberMeta, PartyMeta, PlaylistInfo, RAW_SQUAD_ASSIGNMENTS};
use crate::squad::{self, SquadAssignment, SquadPolicy, WireAssignment};
use crate::template::PartyTemplate;
use chrono::Utc;
use indexmap::IndexMap;
use party_http::{
    ConfigPatch, Discoverability, Joinability, PartyPrivacy, RawMember, RawParty, RawPartyConfig,
};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Seconds a locally observed role is trusted over a party update's captain.
const ROLE_SETTLE_SECS: i64 = 3;

/// Transport-level party configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct PartyConfig {
    pub privacy: PartyPrivacy,
    pub joinability: Joinability,
    pub discoverability: Discoverability,
    pub max_size: u8,
    pub invite_ttl: u32,
    pub intention_ttl: u32,
    pub sub_type: String,
    pub party_type: String,
    pub join_confirmation: bool,
    pub chat_enabled: bool,
}

impl PartyConfig {
    #[must_use]
    pub fn from_template(template: &PartyTemplate) -> Self {
        Self {
            privacy: template.privacy,
            joinability: template.joinability,
            discoverability: template.discoverability,
            max_size: template.max_size,
            invite_ttl: template.invite_ttl,
            intention_ttl: template.intention_ttl,
            sub_type: template.sub_type.clone(),
            party_type: template.party_type.clone(),
            join_confirmation: template.join_confirmation,
            chat_enabled: template.chat_enabled,
        }
    }

    /// Overlay the fields present in `raw`.
    pub fn apply_raw(&mut self, raw: &RawPartyConfig) {
        if let Some(j) = raw.joinability.as_deref().and_then(Joinability::parse) {
            self.joinability = j;
        }
        if let Some(d) = raw.discoverability.as_deref().and_then(Discoverability::parse) {
            self.discoverability = d;
        }
        if let Some(v) = raw.max_size {
            self.max_size = v;
        }
        if let Some(v) = raw.invite_ttl {
            self.invite_ttl = v;
        }
        if let Some(v) = raw.intention_ttl {
            self.intention_ttl = v;
        }
        if let Some(v) = &raw.sub_type {
            self.sub_type.clone_from(v);
        }
        if let Some(v) = &raw.party_type {
            self.party_type.clone_from(v);
        }
        if let Some(v) = raw.join_confirmation {
            self.join_confirmation = v;
        }
    }

    pub fn apply_patch(&mut self, patch: &ConfigPatch) {
        if let Some(d) = patch.discoverability {
            self.discoverability = d;
        }
        if let Some(j) = patch.joinability {
            self.joinability = j;
        }
        if let Some(m) = patch.max_size {
            self.max_size = m;
        }
    }
}

/// Slot storage for members. Indices stay stable while a member is present;
/// freed slots are reused.
#[derive(Clone, Debug, Default)]
pub struct MemberArena {
    slots: Vec<Option<PartyMember>>,
    index: HashMap<String, usize>,
    order: Vec<usize>,
}

impl MemberArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Insert or replace the member with `member.id`.
    pub fn insert(&mut self, member: PartyMember) -> usize {
        if let Some(&idx) = self.index.get(&member.id) {
            self.slots[idx] = Some(member);
            return idx;
        }
        let idx = match self.slots.iter().position(Option::is_none) {
            Some(free) => free,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        self.index.insert(member.id.clone(), idx);
        self.order.push(idx);
        self.slots[idx] = Some(member);
        idx
    }

    pub fn remove(&mut self, id: &str) -> Option<PartyMember> {
        let idx = self.index.remove(id)?;
        self.order.retain(|&i| i != idx);
        self.slots[idx].take()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&PartyMember> {
        let idx = *self.index.get(id)?;
        self.slots[idx].as_ref()
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut PartyMember> {
        let idx = *self.index.get(id)?;
        self.slots[idx].as_mut()
    }

    /// Members in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = &PartyMember> {
        self.order.iter().filter_map(|&i| self.slots[i].as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PartyMember> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.iter().map(|m| m.id.clone()).collect()
    }
}

/// The local user's own member.
///
/// Kept apart from the arena entry for the same id: the arena copy follows
/// what the service echoes back, this one is what the client patches.
#[derive(Clone, Debug)]
pub struct LocalMember {
    pub member: PartyMember,
    /// Stand-in created before the service confirmed the membership.
    /// Patches on a dummy are not sent.
    pub dummy: bool,
}

/// A party update as carried by a `PARTY_UPDATED` notification.
#[derive(Clone, Debug, Default)]
pub struct PartyUpdate {
    pub revision: u64,
    pub config: RawPartyConfig,
    pub updated: Map<String, Value>,
    pub removed: Vec<String>,
    pub captain_id: Option<String>,
}

/// Everything known about one party.
#[derive(Clone, Debug)]
pub struct PartyState {
    pub id: String,
    pub revision: u64,
    pub config: PartyConfig,
    pub meta: PartyMeta,
    pub members: MemberArena,
    /// Sorted by position.
    pub squad_assignments: Vec<(String, SquadAssignment)>,
    pub me: Option<LocalMember>,
    /// Config collected by mutators during a batched edit.
    pub config_cache: ConfigPatch,
    pub chatbanned: HashSet<String>,
    pub invites: Vec<Value>,
    pub applicants: Vec<Value>,
    pub last_raw_status: Option<Value>,
    local_user_id: String,
}

impl PartyState {
    #[must_use]
    pub fn new(raw: &RawParty, template: &PartyTemplate, local_user_id: &str) -> Self {
        let mut config = PartyConfig::from_template(template);
        config.apply_raw(&raw.config);
        let meta = PartyMeta::with_raw(config.privacy, &raw.meta);
        let mut state = Self {
            id: raw.id.clone(),
            revision: raw.revision,
            config,
            meta,
            members: MemberArena::new(),
            squad_assignments: Vec::new(),
            me: None,
            config_cache: ConfigPatch::default(),
            chatbanned: HashSet::new(),
            invites: raw.invites.clone(),
            applicants: raw.applicants.clone(),
            last_raw_status: None,
            local_user_id: local_user_id.to_string(),
        };
        state.rederive_privacy();
        state
    }

    #[inline]
    #[must_use]
    pub fn local_user_id(&self) -> &str {
        &self.local_user_id
    }

    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn get_member(&self, id: &str) -> Option<&PartyMember> {
        self.members.get(id)
    }

    #[must_use]
    pub fn leader(&self) -> Option<&PartyMember> {
        self.members.iter().find(|m| m.leader())
    }

    /// True when the local member exists and is not the leader.
    #[must_use]
    pub fn me_is_follower(&self) -> bool {
        self.me.as_ref().is_some_and(|me| !me.member.leader())
    }

    #[must_use]
    pub fn me_is_leader(&self) -> bool {
        self.me.as_ref().is_some_and(|me| me.member.leader())
    }

    #[must_use]
    pub fn assignment_of(&self, id: &str) -> Option<SquadAssignment> {
        self.squad_assignments
            .iter()
            .find(|(m, _)| m == id)
            .map(|(_, a)| *a)
    }

    /// Id of the member holding `position`.
    #[must_use]
    pub fn holder_of(&self, position: u8) -> Option<&str> {
        self.squad_assignments
            .iter()
            .find(|(_, a)| a.position == Some(position))
            .map(|(m, _)| m.as_str())
    }

    /// Add every member in `raw`, optionally dropping members not listed.
    /// Returns the ids added.
    pub fn update_members(
        &mut self,
        raw: &[RawMember],
        remove_missing: bool,
        default_platform: &str,
    ) -> Vec<String> {
        let mut added = Vec::with_capacity(raw.len());
        for m in raw {
            let member = PartyMember::from_raw(&self.id, m, default_platform);
            added.push(member.id.clone());
            self.members.insert(member);
        }
        if remove_missing {
            let stale: Vec<String> = self
                .members
                .ids()
                .into_iter()
                .filter(|id| !added.contains(id))
                .collect();
            for id in stale {
                self.members.remove(&id);
            }
        }
        added
    }

    pub fn add_member(&mut self, member: PartyMember) {
        self.members.insert(member);
    }

    pub fn remove_member(&mut self, id: &str) -> Option<PartyMember> {
        self.members.remove(id)
    }

    /// Install the local member built from `raw`.
    pub fn set_me(&mut self, raw: &RawMember, default_platform: &str, dummy: bool) {
        let member = PartyMember::from_raw(&self.id, raw, default_platform);
        self.me = Some(LocalMember { member, dummy });
    }

    /// A dummy local member used until the service confirms the real one.
    pub fn set_dummy_me(
        &mut self,
        display_name: &str,
        jid: &str,
        platform: &str,
        yield_leadership: bool,
        offline_ttl: u32,
    ) {
        let now = Utc::now();
        let member = PartyMember {
            id: self.local_user_id.clone(),
            party_id: self.id.clone(),
            display_name: Some(display_name.to_string()),
            role: Some(Role::Member),
            role_updated_at: now,
            revision: 0,
            joined_at: Some(now),
            connection: super::member::MemberConnection {
                id: jid.to_string(),
                platform: Some(platform.to_string()),
                conn_type: Some(party_http::types::CONN_TYPE.to_string()),
                yield_leadership,
                offline_ttl,
                disconnected_at: None,
            },
            meta: PartyMemberMeta::new(platform),
            assignment_version: 0,
        };
        self.me = Some(LocalMember {
            member,
            dummy: true,
        });
    }

    /// Make `leader_id` the only captain. The local member follows.
    pub fn update_roles(&mut self, leader_id: &str) {
        for m in self.members.iter_mut() {
            let role = (m.id == leader_id).then_some(Role::Captain);
            m.update_role(role);
        }
        let is_me = leader_id == self.local_user_id;
        if let Some(me) = self.me.as_mut() {
            me.member.update_role(is_me.then_some(Role::Captain));
        }
    }

    /// Re-derive the privacy preset from the stored settings.
    fn rederive_privacy(&mut self) {
        if let Some(privacy) = self.meta.privacy() {
            self.config.privacy = privacy;
        }
    }

    /// Apply a party update. Returns true when changed squad assignments
    /// were adopted from the wire, which only happens while the local user
    /// does not lead.
    pub fn apply_update(&mut self, update: &PartyUpdate) -> bool {
        self.config.apply_raw(&update.config);

        let mut assignments_changed = false;
        if let Some(raw) = update.updated.get(RAW_SQUAD_ASSIGNMENTS) {
            let raw = party_http::meta_value_to_string(raw);
            let stored = self.meta.schema().get_raw(RAW_SQUAD_ASSIGNMENTS);
            if !raw.is_empty() && stored != Some(raw.as_str()) {
                assignments_changed = true;
            }
        }
        self.meta.schema_mut().update_raw(
            update
                .updated
                .iter()
                .map(|(k, v)| (k.clone(), party_http::meta_value_to_string(v))),
        );
        self.meta.schema_mut().remove(&update.removed);
        self.rederive_privacy();

        // Roles of parties the local user is not in are not kept current by
        // captain notifications.
        if !self.members.contains(&self.local_user_id) {
            if let Some(captain) = &update.captain_id {
                let settle = self.leader().and_then(|leader| {
                    (leader.id != *captain).then(|| Utc::now() - leader.role_updated_at)
                });
                if let Some(elapsed) = settle {
                    if elapsed.num_seconds() > ROLE_SETTLE_SECS && self.members.contains(captain) {
                        let captain = captain.clone();
                        self.update_roles(&captain);
                    }
                }
            }
        }

        if update.revision > self.revision {
            self.revision = update.revision;
        }

        let leader_is_me = self.leader().is_some_and(|l| l.id == self.local_user_id);
        if assignments_changed && !leader_is_me {
            let wire = self.meta.squad_assignments();
            self.adopt_wire_assignments(&wire);
            return true;
        }
        false
    }

    #[must_use]
    pub fn snapshot(&self) -> PartySnapshot {
        PartySnapshot {
            playlist: self.meta.playlist_info(),
            squad_fill: self.meta.squad_fill(),
            privacy: self.config.privacy,
        }
    }

    /// Replace assignments with the wire list, keeping known members only.
    pub fn adopt_wire_assignments(&mut self, wire: &[WireAssignment]) {
        let members = &self.members;
        self.squad_assignments = squad::from_wire(wire, |id| members.contains(id));
    }

    /// Rebuild assignments and store them in meta. Returns the schema delta.
    pub fn rebuild_squad_assignments(
        &mut self,
        policy: SquadPolicy<'_>,
        overrides: Option<&IndexMap<String, SquadAssignment>>,
        new_positions: Option<&IndexMap<String, u8>>,
    ) -> Result<IndexMap<String, String>> {
        let ids = self.members.ids();
        let rebuilt = squad::construct(
            &self.squad_assignments,
            &ids,
            policy,
            overrides,
            new_positions,
        )?;
        self.squad_assignments = rebuilt;
        let wire = squad::to_wire(&self.squad_assignments);
        Ok(self.meta.set_squad_assignments(&wire))
    }
}

/// Party properties compared across a party update.
#[derive(Clone, Debug, PartialEq)]
pub struct PartySnapshot {
    pub playlist: PlaylistInfo,
    pub squad_fill: bool,
    pub privacy: PartyPrivacy,
}

/// A derived party property that changed.
#[derive(Clone, Debug, PartialEq)]
pub enum PartyChange {
    Playlist(Change<PlaylistInfo>),
    SquadFill(Change<bool>),
    Privacy(Change<PartyPrivacy>),
}

impl PartySnapshot {
    #[must_use]
    pub fn changes(&self, after: &PartySnapshot) -> Vec<PartyChange> {
        let mut out = Vec::new();
        if self.playlist != after.playlist {
            out.push(PartyChange::Playlist(Change {
                before: self.playlist.clone(),
                after: after.playlist.clone(),
            }));
        }
        if self.squad_fill != after.squad_fill {
            out.push(PartyChange::SquadFill(Change {
                before: self.squad_fill,
                after: after.squad_fill,
            }));
        }
        if self.privacy != after.privacy {
            out.push(PartyChange::Privacy(Change {
                before: self.privacy,
                after: after.privacy,
            }));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::squad::PositionPriorities;
    use serde_json::json;

    fn raw_party(members: &[(&str, &str)]) -> RawParty {
        let members: Vec<Value> = members
            .iter()
            .map(|(id, role)| json!({"account_id": id, "role": role, "meta": {}}))
            .collect();
        serde_json::from_value(json!({
            "id": "p1",
            "revision": 4,
            "config": {"joinability": "OPEN", "max_size": 16, "sub_type": "default"},
            "meta": {},
            "members": members,
        }))
        .unwrap()
    }

    fn state(members: &[(&str, &str)]) -> PartyState {
        let raw = raw_party(members);
        let mut s = PartyState::new(&raw, &PartyTemplate::default(), "me");
        s.update_members(&raw.members, true, "WIN");
        s
    }

    #[test]
    fn test_arena_reuses_slots_and_keeps_order() {
        let mut s = state(&[("me", "CAPTAIN"), ("a", "MEMBER"), ("b", "MEMBER")]);
        s.remove_member("a");
        assert_eq!(s.members.ids(), vec!["me", "b"]);
        let raw: RawMember = serde_json::from_value(json!({"account_id": "c"})).unwrap();
        s.add_member(PartyMember::from_raw("p1", &raw, "WIN"));
        assert_eq!(s.members.ids(), vec!["me", "b", "c"]);
        assert_eq!(s.member_count(), 3);
    }

    #[test]
    fn test_update_roles_single_captain() {
        let mut s = state(&[("me", "CAPTAIN"), ("a", "MEMBER")]);
        let me_raw: RawMember = serde_json::from_value(json!({"account_id": "me", "role": "CAPTAIN"})).unwrap();
        s.set_me(&me_raw, "WIN", false);
        s.update_roles("a");
        assert_eq!(s.leader().map(|m| m.id.as_str()), Some("a"));
        assert_eq!(s.members.iter().filter(|m| m.leader()).count(), 1);
        assert!(s.me_is_follower());
    }

    #[test]
    fn test_apply_update_adopts_assignments_for_follower() {
        let mut s = state(&[("me", "MEMBER"), ("a", "CAPTAIN")]);
        let wire = json!({"RawSquadAssignments": [
            {"memberId": "a", "absoluteMemberIdx": 0},
            {"memberId": "me", "absoluteMemberIdx": 1},
            {"memberId": "ghost", "absoluteMemberIdx": 2}
        ]})
        .to_string();
        let mut updated = Map::new();
        updated.insert(RAW_SQUAD_ASSIGNMENTS.into(), json!(wire));
        assert!(s.apply_update(&PartyUpdate {
            revision: 9,
            updated,
            ..Default::default()
        }));
        assert_eq!(s.revision, 9);
        assert_eq!(s.squad_assignments.len(), 2);
        assert_eq!(s.holder_of(1), Some("me"));

        // The same list again is not a change.
        let mut again = Map::new();
        again.insert(RAW_SQUAD_ASSIGNMENTS.into(), json!(wire));
        assert!(!s.apply_update(&PartyUpdate {
            revision: 3,
            updated: again,
            ..Default::default()
        }));
        assert_eq!(s.revision, 9);
    }

    #[test]
    fn test_apply_update_leader_keeps_own_assignments() {
        let mut s = state(&[("me", "CAPTAIN"), ("a", "MEMBER")]);
        let mut updated = Map::new();
        updated.insert(
            RAW_SQUAD_ASSIGNMENTS.into(),
            json!(json!({"RawSquadAssignments": [{"memberId": "a", "absoluteMemberIdx": 0}]}).to_string()),
        );
        assert!(!s.apply_update(&PartyUpdate {
            updated,
            ..Default::default()
        }));
        assert!(s.squad_assignments.is_empty());
    }

    #[test]
    fn test_apply_update_rederives_privacy() {
        let mut s = state(&[("me", "CAPTAIN")]);
        let mut other = PartyMeta::new(PartyPrivacy::Public);
        let delta = other.set_privacy(PartyPrivacy::Private);
        let updated: Map<String, Value> = delta
            .updated
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        let before = s.snapshot();
        s.apply_update(&PartyUpdate {
            updated,
            ..Default::default()
        });
        assert_eq!(s.config.privacy, PartyPrivacy::Private);
        let changes = before.changes(&s.snapshot());
        assert_eq!(
            changes,
            vec![PartyChange::Privacy(Change {
                before: PartyPrivacy::Public,
                after: PartyPrivacy::Private,
            })]
        );
    }

    #[test]
    fn test_rebuild_writes_wire_list() {
        let mut s = state(&[("me", "CAPTAIN"), ("a", "MEMBER")]);
        let priorities = PositionPriorities::default();
        let policy = SquadPolicy {
            priorities: &priorities,
            default_assignment: SquadAssignment::default(),
            reassign_on_size_change: true,
        };
        let delta = s.rebuild_squad_assignments(policy, None, None).unwrap();
        assert!(delta.contains_key(RAW_SQUAD_ASSIGNMENTS));
        assert_eq!(s.meta.squad_assignments().len(), 2);
        assert_eq!(s.assignment_of("a"), Some(SquadAssignment::at(1)));
    }
}
