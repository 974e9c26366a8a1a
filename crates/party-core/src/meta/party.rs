use super::{json_root, put_root, put_value, str_field, SchemaDelta};
use crate::schema::Schema;
use crate::squad::WireAssignment;
use party_http::{ConfigPatch, PartyPrivacy};
use serde_json::{json, Map, Value};

pub(crate) const PLAYLIST_DATA: &str = "Default:PlaylistData_j";
pub(crate) const SQUAD_FILL: &str = "Default:AthenaSquadFill_b";
pub(crate) const PRIVACY_SETTINGS: &str = "Default:PrivacySettings_j";
pub(crate) const RAW_SQUAD_ASSIGNMENTS: &str = "Default:RawSquadAssignments_j";
pub(crate) const CUSTOM_MATCH_KEY: &str = "Default:CustomMatchKey_s";
const PRESENCE_PERM: &str = "urn:epic:cfg:presence-perm_s";
const ACCEPTING_MEMBERS: &str = "urn:epic:cfg:accepting-members_b";
const INVITE_PERM: &str = "urn:epic:cfg:invite-perm_s";
const NOT_ACCEPTING: &str = "urn:epic:cfg:not-accepting-members";
const NOT_ACCEPTING_REASON: &str = "urn:epic:cfg:not-accepting-members-reason_i";
const VOICECHAT_IMPL: &str = "VoiceChat:implementation_s";

/// Playlist selection as stored in `PlaylistData`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaylistInfo {
    pub playlist: String,
    pub tournament: String,
    pub event_window: String,
    pub region: String,
}

/// Result of applying a privacy preset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrivacyDelta {
    pub updated: SchemaDelta,
    pub deleted: Vec<String>,
    pub config: ConfigPatch,
}

/// The party-level schema.
#[derive(Clone, Debug, PartialEq)]
pub struct PartyMeta {
    schema: Schema,
}

impl PartyMeta {
    /// Default schema for a party starting in `privacy`.
    #[must_use]
    pub fn new(privacy: PartyPrivacy) -> Self {
        let p = privacy.settings();
        let mut schema = Schema::new();
        schema.set("Default:PrimaryGameSessionId_s", "");
        schema.set("Default:PartyState_s", "BattleRoyaleView");
        schema.set(
            "Default:CampaignInfo_j",
            json!({"CampaignInfo": {
                "lobbyConnectionStarted": false,
                "matchmakingResult": "NoResults",
                "matchmakingState": "NotMatchmaking",
                "sessionIsCriticalMission": false,
                "zoneTileIndex": -1,
                "theaterId": ""
            }}),
        );
        schema.set("Default:ZoneInstanceId_s", "");
        schema.set("Default:SpectateAPartyMemberAvailable_b", false);
        schema.set("Default:TileStates_j", json!({"TileStates": []}));
        schema.set("Default:MatchmakingInfoString_s", "");
        schema.set(CUSTOM_MATCH_KEY, "");
        schema.set(
            PLAYLIST_DATA,
            json!({"PlaylistData": {
                "playlistName": "Playlist_DefaultDuo",
                "tournamentId": "",
                "eventWindowId": "",
                "regionId": "EU",
                "linkId": {"mnemonic": "playlist_defaultduo"}
            }}),
        );
        schema.set(SQUAD_FILL, true);
        schema.set("Default:AllowJoinInProgress_b", false);
        schema.set("Default:LFGTime_s", "0001-01-01T00:00:00.000Z");
        schema.set("Default:PartyIsJoinedInProgress_b", false);
        schema.set("Default:GameSessionKey_s", "");
        schema.set(RAW_SQUAD_ASSIGNMENTS, json!({"RawSquadAssignments": []}));
        schema.set(
            PRIVACY_SETTINGS,
            json!({"PrivacySettings": {
                "partyType": p.party_type,
                "partyInviteRestriction": p.invite_restriction,
                "bOnlyLeaderFriendsCanJoin": p.only_leader_friends_can_join
            }}),
        );
        schema.set("Default:PlatformSessions_j", json!({"PlatformSessions": []}));
        schema.set(
            "Default:PartyMatchmakingInfo_j",
            json!({"PartyMatchmakingInfo": {
                "buildId": -1,
                "hotfixVersion": -1,
                "regionId": "",
                "playlistName": "None",
                "tournamentId": "",
                "eventWindowId": "",
                "linkCode": ""
            }}),
        );
        Self { schema }
    }

    /// Defaults overlaid with the raw meta a lookup or create returned.
    #[must_use]
    pub fn with_raw(privacy: PartyPrivacy, raw: &Map<String, Value>) -> Self {
        let mut meta = Self::new(privacy);
        meta.schema.update_raw(
            raw.iter()
                .map(|(k, v)| (k.clone(), party_http::meta_value_to_string(v))),
        );
        meta
    }

    #[inline]
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[inline]
    pub fn schema_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }

    #[must_use]
    pub fn playlist_info(&self) -> PlaylistInfo {
        let data = json_root(&self.schema, PLAYLIST_DATA, "PlaylistData");
        PlaylistInfo {
            playlist: str_field(&data, "playlistName", ""),
            tournament: str_field(&data, "tournamentId", ""),
            event_window: str_field(&data, "eventWindowId", ""),
            region: str_field(&data, "regionId", ""),
        }
    }

    #[must_use]
    pub fn squad_fill(&self) -> bool {
        self.schema.get_bool(SQUAD_FILL)
    }

    #[must_use]
    pub fn custom_key(&self) -> &str {
        self.schema.get_str(CUSTOM_MATCH_KEY)
    }

    /// The preset matching the stored privacy settings. Fields missing from
    /// the stored object are not compared.
    #[must_use]
    pub fn privacy(&self) -> Option<PartyPrivacy> {
        let data = json_root(&self.schema, PRIVACY_SETTINGS, "PrivacySettings");
        let party_type = data.get("partyType")?.as_str()?;
        PartyPrivacy::from_settings(
            party_type,
            data.get("partyInviteRestriction").and_then(Value::as_str),
            data.get("bOnlyLeaderFriendsCanJoin").and_then(Value::as_bool),
        )
    }

    /// The stored squad assignment wire list.
    #[must_use]
    pub fn squad_assignments(&self) -> Vec<WireAssignment> {
        let raw = super::json_root_list(&self.schema, RAW_SQUAD_ASSIGNMENTS, "RawSquadAssignments");
        raw.into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect()
    }

    pub fn set_squad_assignments(&mut self, wire: &[WireAssignment]) -> SchemaDelta {
        let value = serde_json::to_value(wire).unwrap_or_else(|_| json!([]));
        put_root(&mut self.schema, RAW_SQUAD_ASSIGNMENTS, "RawSquadAssignments", value)
    }

    pub fn set_playlist(
        &mut self,
        playlist: Option<&str>,
        tournament: Option<&str>,
        event_window: Option<&str>,
        region: Option<&str>,
    ) -> SchemaDelta {
        let mut data = json_root(&self.schema, PLAYLIST_DATA, "PlaylistData");
        if let Some(v) = playlist {
            data.insert("playlistName".into(), json!(v));
        }
        if let Some(v) = tournament {
            data.insert("tournamentId".into(), json!(v));
        }
        if let Some(v) = event_window {
            data.insert("eventWindowId".into(), json!(v));
        }
        if let Some(v) = region {
            data.insert("regionId".into(), json!(v));
        }
        put_root(&mut self.schema, PLAYLIST_DATA, "PlaylistData", Value::Object(data))
    }

    pub fn set_custom_key(&mut self, key: &str) -> SchemaDelta {
        put_value(&mut self.schema, CUSTOM_MATCH_KEY, key)
    }

    pub fn set_fill(&mut self, value: bool) -> SchemaDelta {
        put_value(&mut self.schema, SQUAD_FILL, value)
    }

    /// Write the preset's schema fields and work out the transport config
    /// it requires.
    pub fn set_privacy(&mut self, privacy: PartyPrivacy) -> PrivacyDelta {
        let p = privacy.settings();
        let mut updated = SchemaDelta::new();
        let mut deleted = Vec::new();

        let mut settings = json_root(&self.schema, PRIVACY_SETTINGS, "PrivacySettings");
        settings.insert("partyType".into(), json!(p.party_type));
        settings.insert(
            "bOnlyLeaderFriendsCanJoin".into(),
            json!(p.only_leader_friends_can_join),
        );
        settings.insert("partyInviteRestriction".into(), json!(p.invite_restriction));
        updated.extend(put_root(
            &mut self.schema,
            PRIVACY_SETTINGS,
            "PrivacySettings",
            Value::Object(settings),
        ));

        updated.extend(put_value(&mut self.schema, PRESENCE_PERM, p.presence_permission));
        updated.extend(put_value(&mut self.schema, ACCEPTING_MEMBERS, p.accepting_members));
        updated.extend(put_value(&mut self.schema, INVITE_PERM, p.invite_permission));

        if !matches!(p.party_type, "Public" | "FriendsOnly") {
            deleted.push(self.schema.delete(NOT_ACCEPTING));
        }

        let (discoverability, joinability) = privacy.access();
        if privacy.is_private() {
            updated.extend(put_value(&mut self.schema, NOT_ACCEPTING_REASON, "7"));
        } else {
            deleted.push(self.schema.delete(NOT_ACCEPTING_REASON));
        }

        PrivacyDelta {
            updated,
            deleted,
            config: ConfigPatch {
                discoverability: Some(discoverability),
                joinability: Some(joinability),
                max_size: None,
            },
        }
    }

    pub fn set_voicechat_implementation(&mut self, value: &str) -> SchemaDelta {
        put_value(&mut self.schema, VOICECHAT_IMPL, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use party_http::{Discoverability, Joinability};

    #[test]
    fn test_default_schema() {
        let meta = PartyMeta::new(PartyPrivacy::Public);
        assert_eq!(meta.schema().len(), 18);
        assert_eq!(
            meta.schema().iter().next().map(|(k, _)| k.as_str()),
            Some("Default:PrimaryGameSessionId_s")
        );
        assert!(meta.squad_fill());
        assert_eq!(meta.privacy(), Some(PartyPrivacy::Public));
        assert_eq!(meta.playlist_info().playlist, "Playlist_DefaultDuo");
        assert_eq!(meta.playlist_info().region, "EU");
        assert!(meta.squad_assignments().is_empty());
    }

    #[test]
    fn test_set_private() {
        let mut meta = PartyMeta::new(PartyPrivacy::Public);
        let delta = meta.set_privacy(PartyPrivacy::Private);

        let settings: Value = serde_json::from_str(&delta.updated[PRIVACY_SETTINGS]).unwrap();
        assert_eq!(settings["PrivacySettings"]["partyType"], "Private");
        assert_eq!(settings["PrivacySettings"]["bOnlyLeaderFriendsCanJoin"], true);
        assert_eq!(delta.updated[PRESENCE_PERM], "Noone");
        assert_eq!(delta.updated[ACCEPTING_MEMBERS], "false");
        assert_eq!(delta.updated[INVITE_PERM], "Leader");
        assert_eq!(delta.updated[NOT_ACCEPTING_REASON], "7");
        assert_eq!(delta.deleted, vec![NOT_ACCEPTING.to_string()]);
        assert_eq!(delta.config.discoverability, Some(Discoverability::InvitedOnly));
        assert_eq!(delta.config.joinability, Some(Joinability::InviteAndFormer));
        assert_eq!(meta.privacy(), Some(PartyPrivacy::Private));
    }

    #[test]
    fn test_set_public_clears_reason() {
        let mut meta = PartyMeta::new(PartyPrivacy::Private);
        meta.set_privacy(PartyPrivacy::Private);
        let delta = meta.set_privacy(PartyPrivacy::Public);
        assert_eq!(delta.deleted, vec![NOT_ACCEPTING_REASON.to_string()]);
        assert!(!meta.schema().contains_key(NOT_ACCEPTING_REASON));
        assert_eq!(delta.config.joinability, Some(Joinability::Open));
        assert_eq!(delta.updated[ACCEPTING_MEMBERS], "true");
    }

    #[test]
    fn test_privacy_with_partial_settings() {
        let mut meta = PartyMeta::new(PartyPrivacy::Public);
        meta.schema_mut().set(
            PRIVACY_SETTINGS,
            json!({"PrivacySettings": {"partyType": "FriendsOnly"}}),
        );
        assert_eq!(meta.privacy(), Some(PartyPrivacy::FriendsAllowFriendsOfFriends));
    }

    #[test]
    fn test_playlist_is_read_modify_write() {
        let mut meta = PartyMeta::new(PartyPrivacy::Public);
        let delta = meta.set_playlist(Some("Playlist_DefaultSolo"), None, None, Some("NAE"));
        assert_eq!(delta.len(), 1);
        let info = meta.playlist_info();
        assert_eq!(info.playlist, "Playlist_DefaultSolo");
        assert_eq!(info.region, "NAE");
        let raw: Value = serde_json::from_str(meta.schema().get_str(PLAYLIST_DATA)).unwrap();
        assert_eq!(raw["PlaylistData"]["linkId"]["mnemonic"], "playlist_defaultduo");
    }

    #[test]
    fn test_fill_and_custom_key() {
        let mut meta = PartyMeta::new(PartyPrivacy::Public);
        assert_eq!(meta.set_fill(false)[SQUAD_FILL], "false");
        assert!(!meta.squad_fill());
        meta.set_custom_key("abc");
        assert_eq!(meta.custom_key(), "abc");
    }

    #[test]
    fn test_raw_overlay() {
        let mut raw = Map::new();
        raw.insert(SQUAD_FILL.into(), json!("false"));
        raw.insert("Extra_s".into(), json!("x"));
        let meta = PartyMeta::with_raw(PartyPrivacy::Public, &raw);
        assert!(!meta.squad_fill());
        assert_eq!(meta.schema().get_str("Extra_s"), "x");
    }
}
