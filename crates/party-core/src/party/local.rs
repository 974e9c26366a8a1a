use super::client::{edit_request, ClientParty};
use super::member::PartyMember;
use crate::error::{PartyError, Result};
use crate::meta::{
    assets, CosmeticLoadoutUpdate, LobbyStateUpdate, MatchStateUpdate, PartyMemberMeta,
    ReadyState, SchemaDelta,
};
use crate::patch::{dedup_commands, PatchGate, PatchRequest, Patchable};
use crate::schema;
use crate::template::{AssetOptions, CosmeticOptions, EmoteOptions, InMatchOptions, MemberCommand};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::future::join_all;
use indexmap::IndexMap;
use party_http::{ConfigPatch, MemberMetaPayload, MetaPatch};
use serde_json::{json, Value};
use std::time::Duration;

/// Loadout slots a cosmetic setter writes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Character,
    Backpack,
    Pet,
    Pickaxe,
    Contrail,
}

impl Slot {
    fn template(self) -> &'static str {
        match self {
            Slot::Character => assets::CHARACTER,
            Slot::Backpack => assets::BACKPACK,
            Slot::Pet => assets::PET,
            Slot::Pickaxe => assets::PICKAXE,
            Slot::Contrail => assets::CONTRAIL,
        }
    }

    /// Key of the slot in the loadout variants map. Pets ride in the
    /// backpack slot.
    fn variant_key(self) -> &'static str {
        match self {
            Slot::Character => "AthenaCharacter",
            Slot::Backpack | Slot::Pet => "AthenaBackpack",
            Slot::Pickaxe => "AthenaPickaxe",
            Slot::Contrail => "AthenaContrail",
        }
    }

    fn loadout(
        self,
        asset: Option<String>,
        key: Option<String>,
        scratchpad: Option<Vec<Value>>,
    ) -> CosmeticLoadoutUpdate {
        let mut update = CosmeticLoadoutUpdate {
            scratchpad,
            ..Default::default()
        };
        match self {
            Slot::Character => {
                update.character = asset;
                update.character_ekey = key;
            }
            Slot::Backpack | Slot::Pet => {
                update.backpack = asset;
                update.backpack_ekey = key;
            }
            Slot::Pickaxe => {
                update.pickaxe = asset;
                update.pickaxe_ekey = key;
            }
            Slot::Contrail => {
                update.contrail = asset;
                update.contrail_ekey = key;
            }
        }
        update
    }
}

fn enlightenment_pad(values: Option<&[i64]>) -> Result<Option<Vec<Value>>> {
    match values {
        None => Ok(None),
        Some([t, v]) => Ok(Some(vec![json!({"t": t, "v": v})])),
        Some(_) => Err(PartyError::validation(
            "enlightenment has to be a list with exactly two values.",
        )),
    }
}

/// Write `variants` to `slot`, or drop the slot's entry when `None`.
fn put_slot_variants(
    meta: &mut PartyMemberMeta,
    slot: Slot,
    variants: Option<Vec<Value>>,
) -> SchemaDelta {
    let mut current = meta.variants();
    match variants {
        Some(items) => {
            current.insert(slot.variant_key().to_string(), json!({"i": items}));
        }
        None => {
            current.remove(slot.variant_key());
        }
    }
    meta.set_variants(current)
}

/// The local user's member in a [`ClientParty`].
#[derive(Clone, Debug)]
pub struct ClientPartyMember {
    party: ClientParty,
}

impl ClientPartyMember {
    pub(crate) fn new(party: ClientParty) -> Self {
        Self { party }
    }

    #[inline]
    #[must_use]
    pub fn party(&self) -> &ClientParty {
        &self.party
    }

    #[must_use]
    pub fn id(&self) -> &str {
        self.party.ctx().user_id()
    }

    /// Current view of the local member.
    #[must_use]
    pub fn member(&self) -> Option<PartyMember> {
        self.party
            .with_state(|s| s.me.as_ref().map(|me| me.member.clone()))
    }

    /// True while the service has not confirmed the membership yet.
    #[must_use]
    pub fn is_dummy(&self) -> bool {
        self.party
            .with_state(|s| s.me.as_ref().map_or(true, |me| me.dummy))
    }

    #[must_use]
    pub fn leader(&self) -> bool {
        self.party.with_state(|s| s.me_is_leader())
    }

    #[must_use]
    pub fn position(&self) -> Option<u8> {
        let id = self.id().to_string();
        self.party
            .with_state(|s| s.assignment_of(&id).and_then(|a| a.position))
    }

    fn with_meta<R>(&self, f: impl FnOnce(&mut PartyMemberMeta) -> R) -> Result<R> {
        self.party.with_state_mut(|s| {
            s.me.as_mut()
                .map(|me| f(&mut me.member.meta))
                .ok_or_else(|| PartyError::NotFound("local member".to_string()))
        })
    }

    async fn commit(&self, delta: SchemaDelta) -> Result<()> {
        if self.gate().is_editing() {
            return Ok(());
        }
        self.patch(PatchRequest::updated(delta)).await
    }

    pub async fn set_ready(&self, state: ReadyState) -> Result<()> {
        let delta = self.with_meta(|m| {
            m.set_lobby_state(LobbyStateUpdate {
                game_readiness: Some(state.as_str().to_string()),
                ..Default::default()
            })
        })?;
        self.commit(delta).await
    }

    /// Outfit and backpack share enlightenment and corruption handling.
    async fn set_cosmetic(&self, slot: Slot, opts: CosmeticOptions) -> Result<()> {
        let asset = opts.asset.as_deref().map(|a| assets::expand(slot.template(), a));
        let scratchpad = enlightenment_pad(opts.enlightenment.as_deref())?;
        let (variants, store) = match opts.corruption {
            Some(level) => {
                let mut variants = vec![json!({"c": "Corruption", "v": "FloatSlider", "dE": 1})];
                variants.extend(opts.variants.unwrap_or_default());
                (Some(variants), Some(vec![json!(format!("{level:.4}"))]))
            }
            None => (opts.variants, None),
        };
        let delta = self.with_meta(|m| {
            let mut delta = m.set_cosmetic_loadout(slot.loadout(asset, opts.key, scratchpad));
            delta.extend(put_slot_variants(m, slot, variants));
            let store = store.unwrap_or_else(|| m.custom_data_store());
            delta.extend(m.set_custom_data_store(store));
            delta
        })?;
        self.commit(delta).await
    }

    async fn set_asset(&self, slot: Slot, opts: AssetOptions) -> Result<()> {
        let asset = opts.asset.as_deref().map(|a| assets::expand(slot.template(), a));
        let delta = self.with_meta(|m| {
            let mut delta = m.set_cosmetic_loadout(slot.loadout(asset, opts.key, None));
            delta.extend(put_slot_variants(m, slot, opts.variants));
            delta
        })?;
        self.commit(delta).await
    }

    pub async fn set_outfit(&self, opts: CosmeticOptions) -> Result<()> {
        self.set_cosmetic(Slot::Character, opts).await
    }

    pub async fn set_backpack(&self, opts: CosmeticOptions) -> Result<()> {
        self.set_cosmetic(Slot::Backpack, opts).await
    }

    pub async fn clear_backpack(&self) -> Result<()> {
        self.set_backpack(CosmeticOptions::asset("")).await
    }

    pub async fn set_pet(&self, opts: AssetOptions) -> Result<()> {
        self.set_asset(Slot::Pet, opts).await
    }

    /// Pets live in the backpack slot, so this clears the backpack too.
    pub async fn clear_pet(&self) -> Result<()> {
        self.clear_backpack().await
    }

    pub async fn set_pickaxe(&self, opts: AssetOptions) -> Result<()> {
        self.set_asset(Slot::Pickaxe, opts).await
    }

    pub async fn set_contrail(&self, opts: AssetOptions) -> Result<()> {
        self.set_asset(Slot::Contrail, opts).await
    }

    pub async fn clear_contrail(&self) -> Result<()> {
        self.set_contrail(AssetOptions::asset("")).await
    }

    async fn play_emote(&self, template: &str, opts: EmoteOptions) -> Result<()> {
        let asset = assets::expand(template, &opts.asset);
        let delta =
            self.with_meta(|m| m.set_emote(Some(&asset), opts.key.as_deref(), opts.section))?;
        self.party.cancel_emote_timer();
        if let Some(after) = opts.run_for {
            self.schedule_clear_emote(after);
        }
        self.commit(delta).await
    }

    pub async fn set_emote(&self, opts: EmoteOptions) -> Result<()> {
        self.play_emote(assets::DANCE, opts).await
    }

    /// Like [`ClientPartyMember::set_emote`] with an emoji asset.
    /// [`EmoteOptions::emoji`] clears it after two seconds.
    pub async fn set_emoji(&self, opts: EmoteOptions) -> Result<()> {
        self.play_emote(assets::EMOJI, opts).await
    }

    pub async fn clear_emote(&self) -> Result<()> {
        let delta = self.with_meta(|m| m.set_emote(Some("None"), Some(""), Some(-1)))?;
        self.party.cancel_emote_timer();
        self.commit(delta).await
    }

    fn schedule_clear_emote(&self, after: Duration) {
        let me = self.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            me.party.detach_emote_timer();
            match me.clear_emote().await {
                Err(e) if e.is_member_not_found() => {}
                Err(e) => tracing::error!("[Party] clearing emote failed: {}", e),
                Ok(()) => {}
            }
        });
        self.party.set_emote_timer(task);
    }

    pub async fn set_banner(
        &self,
        icon: Option<&str>,
        color: Option<&str>,
        season_level: Option<i64>,
    ) -> Result<()> {
        let delta = self.with_meta(|m| m.set_banner(icon, color, season_level))?;
        self.commit(delta).await
    }

    pub async fn set_battlepass_info(
        &self,
        has_purchased: Option<bool>,
        level: Option<i64>,
        self_boost_xp: Option<i64>,
        friend_boost_xp: Option<i64>,
    ) -> Result<()> {
        let delta = self.with_meta(|m| {
            m.set_battlepass_info(has_purchased, level, self_boost_xp, friend_boost_xp)
        })?;
        self.commit(delta).await
    }

    pub async fn set_assisted_challenge(
        &self,
        quest: Option<&str>,
        completed: Option<i64>,
    ) -> Result<()> {
        let quest = quest.map(|q| assets::expand(assets::QUEST, q));
        let delta = self.with_meta(|m| m.set_assisted_challenge(quest.as_deref(), completed))?;
        self.commit(delta).await
    }

    pub async fn clear_assisted_challenge(&self) -> Result<()> {
        self.set_assisted_challenge(Some(""), None).await
    }

    /// Ask for squad position `position`, swapping with whoever holds it.
    pub async fn set_position(&self, position: u8) -> Result<()> {
        if position > 15 {
            return Err(PartyError::validation("The passed position is out of bounds."));
        }
        let my_id = self.id().to_string();
        let delta = self.party.with_state_mut(|s| {
            let holder = s.holder_of(position).map(str::to_string);
            if holder.as_deref() == Some(my_id.as_str()) {
                return Ok::<_, PartyError>(None);
            }
            let current = s
                .assignment_of(&my_id)
                .and_then(|a| a.position)
                .map_or(-1, i64::from);
            let echoed = s.members.get(&my_id).map_or(0, |m| m.assignment_version);
            let me = s
                .me
                .as_mut()
                .ok_or_else(|| PartyError::NotFound("local member".to_string()))?;
            let version = echoed.max(me.member.assignment_version) + 1;
            me.member.assignment_version = version;
            Ok(Some(me.member.meta.set_member_squad_assignment_request(
                current,
                i64::from(position),
                version,
                holder.as_deref(),
            )))
        })?;
        match delta {
            Some(delta) => self.commit(delta).await,
            None => Ok(()),
        }
    }

    pub async fn set_in_match(&self, opts: InMatchOptions) -> Result<()> {
        if opts.players_left > 255 {
            return Err(PartyError::validation(
                "players_left must be an integer between 0 and 255",
            ));
        }
        let delta = self.with_meta(|m| {
            m.set_match_state(MatchStateUpdate {
                location: Some("InGame".to_string()),
                has_preloaded: Some(true),
                spectate_party_member_available: Some(true),
                players_left: Some(u64::from(opts.players_left)),
                started_at: Some(opts.started_at.unwrap_or_else(Utc::now)),
            })
        })?;
        self.commit(delta).await
    }

    pub async fn clear_in_match(&self) -> Result<()> {
        let epoch = Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).single();
        let delta = self.with_meta(|m| {
            m.set_match_state(MatchStateUpdate {
                location: Some("PreLobby".to_string()),
                has_preloaded: Some(false),
                spectate_party_member_available: Some(false),
                players_left: Some(0),
                started_at: epoch,
            })
        })?;
        self.commit(delta).await
    }

    pub async fn set_lobby_map_marker(&self, x: f64, y: f64) -> Result<()> {
        let delta = self.with_meta(|m| m.set_frontend_marker(Some(x), Some(y), Some(true)))?;
        self.commit(delta).await
    }

    pub async fn clear_lobby_map_marker(&self) -> Result<()> {
        let delta = self.with_meta(|m| m.set_frontend_marker(Some(0.0), Some(0.0), Some(false)))?;
        self.commit(delta).await
    }

    /// Apply one member command.
    pub async fn execute(&self, command: MemberCommand) -> Result<()> {
        match command {
            MemberCommand::SetReady { state } => self.set_ready(state).await,
            MemberCommand::SetOutfit(opts) => self.set_outfit(opts).await,
            MemberCommand::SetBackpack(opts) => self.set_backpack(opts).await,
            MemberCommand::ClearBackpack => self.clear_backpack().await,
            MemberCommand::SetPet(opts) => self.set_pet(opts).await,
            MemberCommand::ClearPet => self.clear_pet().await,
            MemberCommand::SetPickaxe(opts) => self.set_pickaxe(opts).await,
            MemberCommand::SetContrail(opts) => self.set_contrail(opts).await,
            MemberCommand::ClearContrail => self.clear_contrail().await,
            MemberCommand::SetEmote(opts) => self.set_emote(opts).await,
            MemberCommand::SetEmoji(opts) => self.set_emoji(opts).await,
            MemberCommand::ClearEmote => self.clear_emote().await,
            MemberCommand::SetBanner {
                icon,
                color,
                season_level,
            } => {
                self.set_banner(icon.as_deref(), color.as_deref(), season_level)
                    .await
            }
            MemberCommand::SetBattlepassInfo {
                has_purchased,
                level,
                self_boost_xp,
                friend_boost_xp,
            } => {
                self.set_battlepass_info(has_purchased, level, self_boost_xp, friend_boost_xp)
                    .await
            }
            MemberCommand::SetAssistedChallenge { quest, completed } => {
                self.set_assisted_challenge(quest.as_deref(), completed)
                    .await
            }
            MemberCommand::ClearAssistedChallenge => self.clear_assisted_challenge().await,
            MemberCommand::SetPosition { position } => self.set_position(position).await,
            MemberCommand::SetInMatch(opts) => self.set_in_match(opts).await,
            MemberCommand::ClearInMatch => self.clear_in_match().await,
            MemberCommand::SetLobbyMapMarker { x, y } => self.set_lobby_map_marker(x, y).await,
            MemberCommand::ClearLobbyMapMarker => self.clear_lobby_map_marker().await,
        }
    }

    async fn run_edit(&self, commands: Vec<MemberCommand>) -> Result<schema::SchemaDiff> {
        let commands = dedup_commands(commands);
        let before = self.with_meta(|m| m.schema().snapshot())?;
        let results = {
            let _guard = self.gate().edit_lock().acquire().await;
            join_all(commands.into_iter().map(|c| self.execute(c))).await
        };
        let after = self.with_meta(|m| m.schema().snapshot())?;
        results.into_iter().collect::<Result<Vec<()>>>()?;
        Ok(schema::diff(&before, &after))
    }

    /// Apply several commands and publish them as a single patch.
    pub async fn edit(&self, commands: Vec<MemberCommand>) -> Result<()> {
        let diff = self.run_edit(commands).await?;
        self.patch(edit_request(diff, ConfigPatch::default())).await
    }

    /// Like [`ClientPartyMember::edit`], and also store the commands in the
    /// session's member template.
    pub async fn edit_and_keep(&self, commands: Vec<MemberCommand>) -> Result<()> {
        self.party.ctx().keep_member_commands(commands.clone());
        self.edit(commands).await
    }

    /// Apply the member template locally without patching, then open the
    /// gate for patches.
    pub(crate) async fn apply_template(&self) {
        let commands = self.party.ctx().member_template().commands;
        if !commands.is_empty() {
            if let Err(e) = self.run_edit(commands).await {
                tracing::warn!("[Party] applying member template failed: {}", e);
            }
        }
        self.gate().set_ready(true);
    }
}

#[async_trait]
impl Patchable for ClientPartyMember {
    fn gate(&self) -> &PatchGate {
        self.party.me_gate()
    }

    fn revision(&self) -> u64 {
        self.party
            .with_state(|s| s.me.as_ref().map_or(0, |me| me.member.revision))
    }

    fn set_revision(&self, revision: u64) {
        self.party.with_state_mut(|s| {
            if let Some(me) = s.me.as_mut() {
                me.member.revision = revision;
            }
        });
    }

    fn schema_head(&self, max: usize) -> IndexMap<String, String> {
        self.party.with_state(|s| {
            s.me.as_ref()
                .map(|me| me.member.meta.schema().get_schema(Some(max)))
                .unwrap_or_default()
        })
    }

    fn clear_config_cache(&self) {}

    async fn do_patch(
        &self,
        patch: &MetaPatch,
        _config: Option<&ConfigPatch>,
        revision: u64,
    ) -> party_http::Result<()> {
        if self.is_dummy() {
            return Ok(());
        }
        let payload = MemberMetaPayload {
            meta: patch.clone(),
            revision,
        };
        let ctx = self.party.ctx();
        ctx.service()
            .party_update_member_meta(self.party.id(), ctx.user_id(), &payload)
            .await
    }
}
