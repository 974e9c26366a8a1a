use super::local::ClientPartyMember;
use super::member::PartyMember;
use super::state::{PartyState, PartyUpdate};
use crate::context::PartyContext;
use crate::error::{PartyError, Result};
use crate::meta::{PlaylistInfo, SchemaDelta};
use crate::patch::{dedup_commands, PatchGate, PatchRequest, Patchable, MAX_PATCH_KEYS};
use crate::schema::{self, SchemaDiff};
use crate::squad::SquadAssignment;
use crate::template::PartyCommand;
use async_trait::async_trait;
use futures::future::join_all;
use indexmap::IndexMap;
use parking_lot::Mutex;
use party_http::{
    ConfigPatch, InviteRequest, LeavePartyRequest, MetaPatch, PartyMetaPayload, PartyPrivacy,
    RawParty,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;

const PARTY_TYPE_ID: i64 = 286_331_153;
const PARTY_FLAGS: i64 = -2_024_557_306;

const NOT_LEADER: &str = "You have to be leader for this action to work.";
const NOT_LEADER_MEMBER_ACTION: &str = "You must be the party leader to perform this action";

struct PartyInner {
    ctx: Arc<PartyContext>,
    id: String,
    state: Mutex<PartyState>,
    gate: PatchGate,
    /// Gate of the local member. Not ready until the member template has
    /// been applied.
    me_gate: PatchGate,
    emote_task: Mutex<Option<JoinHandle<()>>>,
}

/// The party the local user is in.
///
/// Cheap to clone. All clones share the same state.
#[derive(Clone)]
pub struct ClientParty {
    inner: Arc<PartyInner>,
}

impl std::fmt::Debug for ClientParty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientParty")
            .field("id", &self.inner.id)
            .field("member_count", &self.member_count())
            .finish()
    }
}

impl ClientParty {
    /// Build the party from a lookup or create response. When the local user
    /// is not listed yet a dummy local member stands in.
    pub(crate) fn new(ctx: Arc<PartyContext>, raw: &RawParty) -> Self {
        let template = ctx.party_template();
        let member_template = ctx.member_template();
        let identity = ctx.identity().clone();

        let mut state = PartyState::new(raw, &template, &identity.user_id);
        state.update_members(&raw.members, true, &identity.platform);
        match raw.members.iter().find(|m| m.account_id == identity.user_id) {
            Some(me) => state.set_me(me, &identity.platform, false),
            None => state.set_dummy_me(
                &identity.display_name,
                &identity.jid,
                &identity.platform,
                member_template.yield_leadership,
                member_template.offline_ttl,
            ),
        }
        let wire = state.meta.squad_assignments();
        state.adopt_wire_assignments(&wire);

        Self {
            inner: Arc::new(PartyInner {
                ctx,
                id: raw.id.clone(),
                state: Mutex::new(state),
                gate: PatchGate::new(true),
                me_gate: PatchGate::new(false),
                emote_task: Mutex::new(None),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    #[inline]
    pub(crate) fn ctx(&self) -> &Arc<PartyContext> {
        &self.inner.ctx
    }

    #[inline]
    pub(crate) fn me_gate(&self) -> &PatchGate {
        &self.inner.me_gate
    }

    /// Read the party state.
    pub fn with_state<R>(&self, f: impl FnOnce(&PartyState) -> R) -> R {
        f(&self.inner.state.lock())
    }

    pub(crate) fn with_state_mut<R>(&self, f: impl FnOnce(&mut PartyState) -> R) -> R {
        f(&mut self.inner.state.lock())
    }

    /// The local member.
    #[must_use]
    pub fn me(&self) -> ClientPartyMember {
        ClientPartyMember::new(self.clone())
    }

    #[must_use]
    pub fn member_count(&self) -> usize {
        self.with_state(PartyState::member_count)
    }

    #[must_use]
    pub fn max_size(&self) -> u8 {
        self.with_state(|s| s.config.max_size)
    }

    #[must_use]
    pub fn privacy(&self) -> PartyPrivacy {
        self.with_state(|s| s.config.privacy)
    }

    #[must_use]
    pub fn playlist_info(&self) -> PlaylistInfo {
        self.with_state(|s| s.meta.playlist_info())
    }

    #[must_use]
    pub fn squad_fill(&self) -> bool {
        self.with_state(|s| s.meta.squad_fill())
    }

    #[must_use]
    pub fn custom_key(&self) -> String {
        self.with_state(|s| s.meta.custom_key().to_string())
    }

    #[must_use]
    pub fn leader(&self) -> Option<PartyMember> {
        self.with_state(|s| s.leader().cloned())
    }

    #[must_use]
    pub fn get_member(&self, id: &str) -> Option<PartyMember> {
        self.with_state(|s| s.get_member(id).cloned())
    }

    #[must_use]
    pub fn members(&self) -> Vec<PartyMember> {
        self.with_state(|s| s.members.iter().cloned().collect())
    }

    #[must_use]
    pub fn squad_assignments(&self) -> Vec<(String, SquadAssignment)> {
        self.with_state(|s| s.squad_assignments.clone())
    }

    #[must_use]
    pub fn chatbanned_members(&self) -> Vec<String> {
        self.with_state(|s| s.chatbanned.iter().cloned().collect())
    }

    #[must_use]
    pub fn last_raw_status(&self) -> Option<Value> {
        self.with_state(|s| s.last_raw_status.clone())
    }

    fn ensure_leader(&self) -> Result<()> {
        if self.with_state(PartyState::me_is_follower) {
            return Err(PartyError::forbidden(NOT_LEADER));
        }
        Ok(())
    }

    async fn commit(&self, delta: SchemaDelta) -> Result<()> {
        if self.inner.gate.is_editing() {
            return Ok(());
        }
        self.patch(PatchRequest::updated(delta)).await
    }

    pub async fn set_privacy(&self, privacy: PartyPrivacy) -> Result<()> {
        self.ensure_leader()?;
        let delta = self.with_state_mut(|s| {
            let delta = s.meta.set_privacy(privacy);
            s.config.privacy = privacy;
            if self.inner.gate.is_editing() {
                s.config_cache.merge(&delta.config);
            }
            delta
        });
        if self.inner.gate.is_editing() {
            return Ok(());
        }
        self.patch(
            PatchRequest::updated(delta.updated)
                .with_deleted(delta.deleted)
                .with_config(delta.config),
        )
        .await
    }

    pub async fn set_playlist(
        &self,
        playlist: Option<&str>,
        tournament: Option<&str>,
        event_window: Option<&str>,
        region: Option<&str>,
    ) -> Result<()> {
        self.ensure_leader()?;
        let delta = self
            .with_state_mut(|s| s.meta.set_playlist(playlist, tournament, event_window, region));
        self.commit(delta).await
    }

    pub async fn set_custom_key(&self, key: &str) -> Result<()> {
        self.ensure_leader()?;
        let delta = self.with_state_mut(|s| s.meta.set_custom_key(key));
        self.commit(delta).await
    }

    pub async fn set_fill(&self, value: bool) -> Result<()> {
        self.ensure_leader()?;
        let delta = self.with_state_mut(|s| s.meta.set_fill(value));
        self.commit(delta).await
    }

    /// Change the member limit. Sent as transport config, not meta.
    pub async fn set_max_size(&self, size: u8) -> Result<()> {
        self.ensure_leader()?;
        if usize::from(size) < self.member_count() {
            return Err(PartyError::party(
                "New size is lower than current member count.",
            ));
        }
        if !(1..=16).contains(&size) {
            return Err(PartyError::party("The new party size must be 1 <= size <= 16."));
        }
        let config = ConfigPatch {
            max_size: Some(size),
            ..Default::default()
        };
        if self.inner.gate.is_editing() {
            self.with_state_mut(|s| s.config_cache.merge(&config));
            return Ok(());
        }
        self.patch(PatchRequest::default().with_config(config)).await
    }

    /// Pin members to positions or hide them. Other members keep or receive
    /// positions by priority.
    pub async fn set_squad_assignments(
        &self,
        assignments: IndexMap<String, SquadAssignment>,
    ) -> Result<()> {
        self.ensure_leader()?;
        self.refresh_squad_assignments(Some(&assignments), None, true)
            .await
    }

    /// Rebuild squad assignments and publish them. With `could_be_edit` the
    /// patch is left to an edit in progress.
    pub async fn refresh_squad_assignments(
        &self,
        overrides: Option<&IndexMap<String, SquadAssignment>>,
        new_positions: Option<&IndexMap<String, u8>>,
        could_be_edit: bool,
    ) -> Result<()> {
        let template = self.ctx().party_template();
        let delta = self.with_state_mut(|s| {
            s.rebuild_squad_assignments(template.squad_policy(), overrides, new_positions)
        })?;
        if could_be_edit && self.inner.gate.is_editing() {
            return Ok(());
        }
        self.patch(PatchRequest::updated(delta)).await
    }

    pub async fn kick(&self, member_id: &str) -> Result<()> {
        let ctx = self.ctx();
        if ctx.is_creating_party() {
            return Ok(());
        }
        if !self.with_state(PartyState::me_is_leader) {
            return Err(PartyError::forbidden(NOT_LEADER_MEMBER_ACTION));
        }
        if member_id == ctx.user_id() {
            return Err(PartyError::party("You can't kick yourself"));
        }
        match ctx.service().party_kick_member(self.id(), member_id).await {
            Err(e) if e.is_party_change_forbidden() => Err(PartyError::forbidden(
                "You dont have permission to kick this member.",
            )),
            other => Ok(other?),
        }
    }

    pub async fn promote(&self, member_id: &str) -> Result<()> {
        let ctx = self.ctx();
        if ctx.is_creating_party() {
            return Ok(());
        }
        if !self.with_state(PartyState::me_is_leader) {
            return Err(PartyError::forbidden(NOT_LEADER_MEMBER_ACTION));
        }
        if member_id == ctx.user_id() {
            return Err(PartyError::party("You are already the leader"));
        }
        ctx.service()
            .party_promote_member(self.id(), member_id)
            .await?;
        Ok(())
    }

    /// Ask to trade squad positions with `member_id`.
    pub async fn swap_position(&self, member_id: &str) -> Result<()> {
        let delta = self.with_state_mut(|s| {
            if !s.members.contains(member_id) {
                return Err(PartyError::NotFound(
                    "This member is not a part of the party.".to_string(),
                ));
            }
            let my_id = s.local_user_id().to_string();
            let current = position_idx(s.assignment_of(&my_id));
            let target = position_idx(s.assignment_of(member_id));
            let echoed = s.members.get(&my_id).map_or(0, |m| m.assignment_version);
            let me = s
                .me
                .as_mut()
                .ok_or_else(|| PartyError::NotFound("local member".to_string()))?;
            let version = echoed.max(me.member.assignment_version) + 1;
            me.member.assignment_version = version;
            Ok(me.member.meta.set_member_squad_assignment_request(
                current,
                target,
                version,
                Some(member_id),
            ))
        })?;
        if self.inner.me_gate.is_editing() {
            return Ok(());
        }
        self.me().patch(PatchRequest::updated(delta)).await
    }

    /// Ban a member from the party chat room.
    pub async fn chatban_member(&self, user_id: &str, reason: Option<&str>) -> Result<()> {
        if !self.with_state(PartyState::me_is_leader) {
            return Err(PartyError::forbidden(
                "Only leaders can ban members from the chat.",
            ));
        }
        if self.with_state(|s| s.chatbanned.contains(user_id)) {
            return Err(PartyError::party("This member is already banned"));
        }
        let chat = self.ctx().chat();
        if !chat.has_occupant(user_id) {
            return Err(PartyError::NotFound(
                "This member is not a part of the party.".to_string(),
            ));
        }
        self.with_state_mut(|s| s.chatbanned.insert(user_id.to_string()));
        chat.ban(user_id, reason).await
    }

    pub async fn invite(&self, user_id: &str) -> Result<()> {
        let ctx = self.ctx();
        if ctx.is_creating_party() {
            return Ok(());
        }
        let (present, full) = self.with_state(|s| {
            (
                s.members.contains(user_id),
                s.member_count() >= usize::from(s.config.max_size),
            )
        });
        if present {
            return Err(PartyError::party("User is already in you party."));
        }
        if full {
            return Err(PartyError::party("Party is full"));
        }
        ctx.service()
            .party_send_invite(self.id(), user_id, &InviteRequest::new(ctx.identity()))
            .await?;
        tracing::debug!("[Party] invited {} to {}", user_id, self.id());
        Ok(())
    }

    /// Send a message to the party chat room.
    pub async fn send(&self, content: &str) -> Result<()> {
        self.ctx().chat().send_message(content).await
    }

    /// Presence status advertising this party. `text` overrides the
    /// configured status template.
    #[must_use]
    pub fn construct_presence(&self, text: Option<&str>) -> Value {
        let ctx = self.ctx();
        let identity = ctx.identity();
        let template = text
            .map(str::to_string)
            .or_else(|| ctx.config().status.clone())
            .unwrap_or_default();

        self.with_state(|s| {
            let perm = s.config.privacy.settings().presence_permission;
            let join_data = if perm == "Noone" || (perm == "Leader" && s.me_is_follower()) {
                json!({"bInPrivate": true})
            } else {
                json!({
                    "sourceId": identity.user_id,
                    "sourceDisplayName": identity.display_name,
                    "sourcePlatform": identity.platform,
                    "partyId": s.id,
                    "partyTypeId": PARTY_TYPE_ID,
                    "key": "k",
                    "appId": "Fortnite",
                    "buildId": identity.build_id,
                    "partyFlags": PARTY_FLAGS,
                    "notAcceptingReason": 0,
                    "pc": s.member_count(),
                })
            };
            let status = template
                .replace("{party_size}", &s.member_count().to_string())
                .replace("{party_max_size}", &s.config.max_size.to_string());

            json!({
                "Status": status,
                "bIsPlaying": true,
                "bIsJoinable": false,
                "bHasVoiceSupport": false,
                "SessionId": "",
                "ProductName": "Fortnite",
                "Properties": {
                    "party.joininfodata.286331153_j": join_data,
                    "FortBasicInfo_j": {"homeBaseRating": 1},
                    "FortLFG_I": "0",
                    "FortPartySize_i": 1,
                    "FortSubGame_i": 1,
                    "InUnjoinableMatch_b": false,
                    "FortGameplayStats_j": {
                        "state": "",
                        "playlist": "None",
                        "numKills": 0,
                        "bFellToDeath": false,
                    },
                    "GamePlaylistName_s": s.meta.playlist_info().playlist,
                    "Event_PlayersAlive_s": "0",
                    "Event_PartySize_s": s.member_count().to_string(),
                    "Event_PartyMaxSize_s": s.config.max_size.to_string(),
                },
            })
        })
    }

    /// Broadcast the party presence. Does nothing when no status is
    /// configured.
    pub async fn update_presence(&self, text: Option<&str>) -> Result<()> {
        if self.ctx().config().status.is_none() && text.is_none() {
            return Ok(());
        }
        let status = self.construct_presence(text);
        self.with_state_mut(|s| s.last_raw_status = Some(status.clone()));
        self.ctx().chat().set_presence(&status).await
    }

    /// Apply one party command.
    pub async fn execute(&self, command: PartyCommand) -> Result<()> {
        match command {
            PartyCommand::SetPrivacy { privacy } => self.set_privacy(privacy).await,
            PartyCommand::SetPlaylist {
                playlist,
                tournament,
                event_window,
                region,
            } => {
                self.set_playlist(
                    playlist.as_deref(),
                    tournament.as_deref(),
                    event_window.as_deref(),
                    region.as_deref(),
                )
                .await
            }
            PartyCommand::SetCustomKey { key } => self.set_custom_key(&key).await,
            PartyCommand::SetFill { value } => self.set_fill(value).await,
            PartyCommand::SetMaxSize { size } => self.set_max_size(size).await,
            PartyCommand::SetSquadAssignments { assignments } => {
                self.set_squad_assignments(assignments).await
            }
        }
    }

    /// Run `commands` against the local meta under the edit lock and return
    /// what changed plus the config they collected.
    async fn run_edit(&self, commands: Vec<PartyCommand>) -> Result<(SchemaDiff, ConfigPatch)> {
        let commands = dedup_commands(commands);
        let before = self.with_state(|s| s.meta.schema().snapshot());
        let results = {
            let _guard = self.inner.gate.edit_lock().acquire().await;
            join_all(commands.into_iter().map(|c| self.execute(c))).await
        };
        let (after, config) = self.with_state_mut(|s| {
            (s.meta.schema().snapshot(), std::mem::take(&mut s.config_cache))
        });
        results.into_iter().collect::<Result<Vec<()>>>()?;
        Ok((schema::diff(&before, &after), config))
    }

    /// Apply several commands and publish them as a single patch.
    pub async fn edit(&self, commands: Vec<PartyCommand>) -> Result<()> {
        let (diff, config) = self.run_edit(commands).await?;
        self.patch(edit_request(diff, config)).await
    }

    /// Like [`ClientParty::edit`], and also store the commands in the
    /// session's party template so future parties start with them.
    pub async fn edit_and_keep(&self, commands: Vec<PartyCommand>) -> Result<()> {
        self.ctx().keep_party_commands(commands.clone());
        self.edit(commands).await
    }

    /// Apply a `PARTY_UPDATED` body. Returns true when the squad assignments
    /// were replaced from the wire.
    pub(crate) fn apply_update(&self, update: &PartyUpdate) -> bool {
        self.with_state_mut(|s| s.apply_update(update))
    }

    pub(crate) fn cancel_emote_timer(&self) {
        if let Some(task) = self.inner.emote_task.lock().take() {
            task.abort();
        }
    }

    pub(crate) fn set_emote_timer(&self, task: JoinHandle<()>) {
        if let Some(old) = self.inner.emote_task.lock().replace(task) {
            old.abort();
        }
    }

    /// Forget the running emote timer without aborting it.
    pub(crate) fn detach_emote_timer(&self) {
        self.inner.emote_task.lock().take();
    }

    /// Leave the chat room and the party. A party that is already gone
    /// counts as left.
    pub(crate) async fn leave_internal(&self) -> Result<()> {
        self.cancel_emote_timer();
        let ctx = self.ctx();
        if let Err(e) = ctx.chat().leave_room().await {
            tracing::warn!("[Party] leaving chat room of {} failed: {}", self.id(), e);
        }
        let request = LeavePartyRequest::new(ctx.identity());
        match ctx
            .service()
            .party_leave(self.id(), ctx.user_id(), &request)
            .await
        {
            Err(e) if e.is_party_not_found() => Ok(()),
            other => Ok(other?),
        }
    }

    /// Republish the local member's schema after someone joined.
    pub(crate) fn do_on_member_join_patch(&self) {
        let me = self.me();
        tokio::spawn(async move {
            let request = PatchRequest::default().with_max(MAX_PATCH_KEYS);
            if let Err(e) = me.patch(request).await {
                if !e.is_party_not_found() {
                    tracing::error!("[Party] member join patch failed: {}", e);
                }
            }
        });
    }
}

fn position_idx(assignment: Option<SquadAssignment>) -> i64 {
    assignment
        .and_then(|a| a.position)
        .map_or(-1, i64::from)
}

pub(crate) fn edit_request(diff: SchemaDiff, config: ConfigPatch) -> PatchRequest {
    let request = PatchRequest::updated(diff.updated).with_deleted(diff.deleted);
    if config.is_empty() {
        request
    } else {
        request.with_config(config)
    }
}

#[async_trait]
impl Patchable for ClientParty {
    fn gate(&self) -> &PatchGate {
        &self.inner.gate
    }

    fn revision(&self) -> u64 {
        self.with_state(|s| s.revision)
    }

    fn set_revision(&self, revision: u64) {
        self.with_state_mut(|s| s.revision = revision);
    }

    fn schema_head(&self, max: usize) -> IndexMap<String, String> {
        self.with_state(|s| s.meta.schema().get_schema(Some(max)))
    }

    fn clear_config_cache(&self) {
        self.with_state_mut(|s| s.config_cache = ConfigPatch::default());
    }

    async fn do_patch(
        &self,
        patch: &MetaPatch,
        config: Option<&ConfigPatch>,
        revision: u64,
    ) -> party_http::Result<()> {
        let payload = PartyMetaPayload {
            meta: patch.clone(),
            revision,
            config: config.cloned(),
        };
        self.ctx()
            .service()
            .party_update_meta(self.id(), &payload)
            .await?;
        if let Some(config) = config {
            self.with_state_mut(|s| s.config.apply_patch(config));
        }
        Ok(())
    }
}
