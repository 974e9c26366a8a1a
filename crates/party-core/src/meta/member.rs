use super::{assets, json_root, json_root_list, or_none, put_root, put_value, str_field, SchemaDelta};
use crate::schema::Schema;
use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub(crate) const LOCATION: &str = "Default:Location_s";
pub(crate) const LOBBY_STATE: &str = "Default:LobbyState_j";
pub(crate) const COSMETIC_LOADOUT: &str = "Default:AthenaCosmeticLoadout_j";
pub(crate) const LOADOUT_VARIANTS: &str = "Default:AthenaCosmeticLoadoutVariants_j";
pub(crate) const CUSTOM_DATA_STORE: &str = "Default:ArbitraryCustomDataStore_j";
pub(crate) const FRONTEND_EMOTE: &str = "Default:FrontendEmote_j";
pub(crate) const BANNER_INFO: &str = "Default:AthenaBannerInfo_j";
pub(crate) const BATTLEPASS_INFO: &str = "Default:BattlePassInfo_j";
pub(crate) const ASSISTED_CHALLENGE: &str = "Default:AssistedChallengeInfo_j";
pub(crate) const SQUAD_REQUEST: &str = "Default:MemberSquadAssignmentRequest_j";
pub(crate) const MAP_MARKER: &str = "Default:FrontEndMapMarker_j";
pub(crate) const PLATFORM_DATA: &str = "Default:PlatformData_j";
pub(crate) const CURRENT_INPUT: &str = "Default:CurrentInputType_s";
pub(crate) const HAS_PRELOADED: &str = "Default:HasPreloadedAthena_b";
pub(crate) const SPECTATE_AVAILABLE: &str = "Default:SpectateAPartyMemberAvailable_b";
pub(crate) const PLAYERS_LEFT: &str = "Default:NumAthenaPlayersLeft_U";
pub(crate) const MATCH_STARTED_AT: &str = "Default:UtcTimeStartedMatchAthena_s";

/// Characters a fresh member wears until an outfit is chosen.
pub const DEFAULT_CHARACTERS: [&str; 8] = [
    "CID_556_Athena_Commando_F_RebirthDefaultA",
    "CID_557_Athena_Commando_F_RebirthDefaultB",
    "CID_558_Athena_Commando_F_RebirthDefaultC",
    "CID_559_Athena_Commando_F_RebirthDefaultD",
    "CID_560_Athena_Commando_M_RebirthDefaultA",
    "CID_561_Athena_Commando_M_RebirthDefaultB",
    "CID_562_Athena_Commando_M_RebirthDefaultC",
    "CID_563_Athena_Commando_M_RebirthDefaultD",
];

/// Swap marker meaning "no target".
pub const INVALID_MEMBER_ID: &str = "INVALID";

/// Timestamp format used for match start times.
pub(crate) fn to_iso(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BannerInfo {
    pub icon: String,
    pub color: String,
    pub season_level: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BattlePassInfo {
    pub has_purchased: bool,
    pub level: i64,
    pub self_boost_xp: i64,
    pub friend_boost_xp: i64,
}

/// A member's outstanding request to move within the squad layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SquadAssignmentRequest {
    #[serde(default = "unset_idx")]
    pub starting_absolute_idx: i64,
    #[serde(default = "unset_idx")]
    pub target_absolute_idx: i64,
    #[serde(default = "invalid_id")]
    pub swap_target_member_id: String,
    #[serde(default)]
    pub version: u64,
}

fn unset_idx() -> i64 {
    -1
}

fn invalid_id() -> String {
    INVALID_MEMBER_ID.to_string()
}

impl Default for SquadAssignmentRequest {
    fn default() -> Self {
        Self {
            starting_absolute_idx: -1,
            target_absolute_idx: -1,
            swap_target_member_id: invalid_id(),
            version: 0,
        }
    }
}

impl SquadAssignmentRequest {
    /// Decode the request from an encoded `MemberSquadAssignmentRequest_j`.
    pub fn from_encoded(raw: &str) -> crate::Result<Self> {
        let mut outer: Map<String, Value> = serde_json::from_str(raw)?;
        let inner = outer
            .remove("MemberSquadAssignmentRequest")
            .unwrap_or_else(|| json!({}));
        Ok(serde_json::from_value(inner)?)
    }

    #[must_use]
    pub fn swap_target(&self) -> Option<&str> {
        (self.swap_target_member_id != INVALID_MEMBER_ID)
            .then_some(self.swap_target_member_id.as_str())
    }
}

/// Fields of `LobbyState` to overwrite.
#[derive(Clone, Debug, Default)]
pub struct LobbyStateUpdate {
    pub in_game_ready_check_status: Option<Value>,
    pub game_readiness: Option<String>,
    pub ready_input_type: Option<String>,
    pub current_input_type: Option<String>,
    pub hidden_matchmaking_delay_max: Option<i64>,
    pub has_pre_loaded_athena: Option<bool>,
}

/// Fields of `AthenaCosmeticLoadout` to overwrite.
#[derive(Clone, Debug, Default)]
pub struct CosmeticLoadoutUpdate {
    pub character: Option<String>,
    pub character_ekey: Option<String>,
    pub backpack: Option<String>,
    pub backpack_ekey: Option<String>,
    pub pickaxe: Option<String>,
    pub pickaxe_ekey: Option<String>,
    pub contrail: Option<String>,
    pub contrail_ekey: Option<String>,
    pub scratchpad: Option<Vec<Value>>,
}

#[derive(Clone, Debug, Default)]
pub struct MatchStateUpdate {
    pub location: Option<String>,
    pub has_preloaded: Option<bool>,
    pub spectate_party_member_available: Option<bool>,
    pub players_left: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
}

/// The member-level schema.
#[derive(Clone, Debug, PartialEq)]
pub struct PartyMemberMeta {
    schema: Schema,
}

impl PartyMemberMeta {
    /// Default schema wearing a random default character.
    #[must_use]
    pub fn new(platform: &str) -> Self {
        let character = DEFAULT_CHARACTERS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(DEFAULT_CHARACTERS[0]);
        Self::with_character(platform, character)
    }

    #[must_use]
    pub fn with_character(platform: &str, character: &str) -> Self {
        let mut schema = Schema::new();
        schema.set(LOCATION, "PreLobby");
        schema.set(
            "Default:CampaignHero_j",
            json!({"CampaignHero": {
                "heroItemInstanceId": "",
                "heroType": assets::expand(assets::HERO, character)
            }}),
        );
        schema.set(
            "Default:CampaignInfo_j",
            json!({"CampaignInfo": {
                "matchmakingLevel": 0,
                "zoneInstanceId": "",
                "homeBaseVersion": 1
            }}),
        );
        schema.set("Default:MatchmakingLevel_U", 0u64);
        schema.set("Default:ZoneInstanceId_s", "");
        schema.set("Default:HomeBaseVersion_U", 1u64);
        schema.set(
            FRONTEND_EMOTE,
            json!({"FrontendEmote": {
                "emoteItemDef": "None",
                "emoteItemDefEncryptionKey": "",
                "emoteSection": -1
            }}),
        );
        schema.set(PLAYERS_LEFT, 0u64);
        schema.set(MATCH_STARTED_AT, "0001-01-01T00:00:00.000Z");
        schema.set(
            LOBBY_STATE,
            json!({"LobbyState": {
                "inGameReadyCheckStatus": null,
                "gameReadiness": "NotReady",
                "readyInputType": "MouseAndKeyboard",
                "currentInputType": "MouseAndKeyboard",
                "hiddenMatchmakingDelayMax": 0,
                "hasPreloadedAthena": false
            }}),
        );
        schema.set(
            MAP_MARKER,
            json!({"FrontEndMapMarker": {
                "markerLocation": {"x": 0, "y": 0},
                "bIsSet": false
            }}),
        );
        schema.set(
            ASSISTED_CHALLENGE,
            json!({"AssistedChallengeInfo": {
                "questItemDef": "None",
                "objectivesCompleted": 0
            }}),
        );
        schema.set(
            SQUAD_REQUEST,
            json!({"MemberSquadAssignmentRequest": SquadAssignmentRequest::default()}),
        );
        schema.set(
            COSMETIC_LOADOUT,
            json!({"AthenaCosmeticLoadout": {
                "characterDef": assets::expand(assets::CHARACTER, character),
                "characterEKey": "",
                "backpackDef": "None",
                "backpackEKey": "",
                "pickaxeDef": assets::DEFAULT_PICKAXE,
                "pickaxeEKey": "",
                "contrailDef": "None",
                "contrailEKey": "",
                "scratchpad": []
            }}),
        );
        schema.set(
            LOADOUT_VARIANTS,
            json!({"AthenaCosmeticLoadoutVariants": {"vL": {}}}),
        );
        schema.set(CUSTOM_DATA_STORE, json!({"ArbitraryCustomDataStore": []}));
        schema.set(
            BANNER_INFO,
            json!({"AthenaBannerInfo": {
                "bannerIconId": "standardbanner15",
                "bannerColorId": "defaultcolor15",
                "seasonLevel": 1
            }}),
        );
        schema.set(
            BATTLEPASS_INFO,
            json!({"BattlePassInfo": {
                "bHasPurchasedPass": false,
                "passLevel": 1,
                "selfBoostXp": 0,
                "friendBoostXp": 0
            }}),
        );
        schema.set(
            PLATFORM_DATA,
            json!({"PlatformData": {
                "platform": {
                    "platformDescription": {
                        "name": platform,
                        "platformType": "DESKTOP",
                        "onlineSubsystem": "None",
                        "sessionType": "",
                        "externalAccountType": "",
                        "crossplayPool": "DESKTOP"
                    }
                },
                "uniqueId": "INVALID",
                "sessionId": ""
            }}),
        );
        schema.set("Default:CrossplayPreference_s", "OptedIn");
        schema.set("Default:VoiceChatEnabled_b", true);
        schema.set("Default:VoiceConnectionId_s", "");
        schema.set(SPECTATE_AVAILABLE, false);
        schema.set("Default:FeatDefinition_s", "None");
        schema.set("Default:SidekickStatus_s", "None");
        schema.set("Default:VoiceChatStatus_s", "Disabled");
        Self { schema }
    }

    /// Overlay raw meta as carried by a lookup or join notification.
    pub fn update_raw(&mut self, raw: &Map<String, Value>) {
        self.schema.update_raw(
            raw.iter()
                .map(|(k, v)| (k.clone(), party_http::meta_value_to_string(v))),
        );
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

    fn loadout(&self) -> Map<String, Value> {
        json_root(&self.schema, COSMETIC_LOADOUT, "AthenaCosmeticLoadout")
    }

    #[must_use]
    pub fn ready(&self) -> String {
        let data = json_root(&self.schema, LOBBY_STATE, "LobbyState");
        str_field(&data, "gameReadiness", "NotReady")
    }

    #[must_use]
    pub fn input(&self) -> &str {
        self.schema.get_str(CURRENT_INPUT)
    }

    #[must_use]
    pub fn assisted_challenge(&self) -> String {
        let data = json_root(&self.schema, ASSISTED_CHALLENGE, "AssistedChallengeInfo");
        str_field(&data, "questItemDef", "None")
    }

    #[must_use]
    pub fn outfit(&self) -> String {
        str_field(&self.loadout(), "characterDef", "None")
    }

    #[must_use]
    pub fn backpack(&self) -> String {
        str_field(&self.loadout(), "backpackDef", "None")
    }

    #[must_use]
    pub fn pickaxe(&self) -> String {
        str_field(&self.loadout(), "pickaxeDef", "None")
    }

    #[must_use]
    pub fn contrail(&self) -> String {
        str_field(&self.loadout(), "contrailDef", "None")
    }

    /// The `vL` map of variant channels per cosmetic slot.
    #[must_use]
    pub fn variants(&self) -> Map<String, Value> {
        let mut data = json_root(&self.schema, LOADOUT_VARIANTS, "AthenaCosmeticLoadoutVariants");
        match data.remove("vL") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    fn slot_variants(&self, slot: &str) -> Vec<Value> {
        self.variants()
            .get(slot)
            .and_then(|s| s.get("i"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn outfit_variants(&self) -> Vec<Value> {
        self.slot_variants("AthenaCharacter")
    }

    #[must_use]
    pub fn backpack_variants(&self) -> Vec<Value> {
        self.slot_variants("AthenaBackpack")
    }

    #[must_use]
    pub fn pickaxe_variants(&self) -> Vec<Value> {
        self.slot_variants("AthenaPickaxe")
    }

    #[must_use]
    pub fn contrail_variants(&self) -> Vec<Value> {
        self.slot_variants("AthenaContrail")
    }

    #[must_use]
    pub fn scratchpad(&self) -> Vec<Value> {
        self.loadout()
            .get("scratchpad")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn custom_data_store(&self) -> Vec<Value> {
        json_root_list(&self.schema, CUSTOM_DATA_STORE, "ArbitraryCustomDataStore")
    }

    #[must_use]
    pub fn emote(&self) -> String {
        let data = json_root(&self.schema, FRONTEND_EMOTE, "FrontendEmote");
        str_field(&data, "emoteItemDef", "None")
    }

    #[must_use]
    pub fn banner(&self) -> BannerInfo {
        let data = json_root(&self.schema, BANNER_INFO, "AthenaBannerInfo");
        BannerInfo {
            icon: str_field(&data, "bannerIconId", ""),
            color: str_field(&data, "bannerColorId", ""),
            season_level: data.get("seasonLevel").and_then(Value::as_i64).unwrap_or(0),
        }
    }

    #[must_use]
    pub fn battlepass_info(&self) -> BattlePassInfo {
        let data = json_root(&self.schema, BATTLEPASS_INFO, "BattlePassInfo");
        let int = |k: &str| data.get(k).and_then(Value::as_i64).unwrap_or(0);
        BattlePassInfo {
            has_purchased: data
                .get("bHasPurchasedPass")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            level: int("passLevel"),
            self_boost_xp: int("selfBoostXp"),
            friend_boost_xp: int("friendBoostXp"),
        }
    }

    #[must_use]
    pub fn platform(&self) -> String {
        let data = json_root(&self.schema, PLATFORM_DATA, "PlatformData");
        data.get("platform")
            .and_then(|p| p.get("platformDescription"))
            .and_then(|d| d.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    #[must_use]
    pub fn location(&self) -> &str {
        self.schema.get_str(LOCATION)
    }

    #[must_use]
    pub fn has_preloaded(&self) -> bool {
        self.schema.get_bool(HAS_PRELOADED)
    }

    #[must_use]
    pub fn spectate_party_member_available(&self) -> bool {
        self.schema.get_bool(SPECTATE_AVAILABLE)
    }

    #[must_use]
    pub fn players_left(&self) -> u64 {
        self.schema.get_uint(PLAYERS_LEFT).unwrap_or(0)
    }

    #[must_use]
    pub fn match_started_at(&self) -> &str {
        self.schema.get_str(MATCH_STARTED_AT)
    }

    #[must_use]
    pub fn member_squad_assignment_request(&self) -> SquadAssignmentRequest {
        let data = json_root(&self.schema, SQUAD_REQUEST, "MemberSquadAssignmentRequest");
        serde_json::from_value(Value::Object(data)).unwrap_or_default()
    }

    #[must_use]
    pub fn frontend_marker_set(&self) -> bool {
        let data = json_root(&self.schema, MAP_MARKER, "FrontEndMapMarker");
        data.get("bIsSet").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Marker coordinates as `(x, y)`. The wire stores them the other way
    /// round.
    #[must_use]
    pub fn frontend_marker_location(&self) -> (f64, f64) {
        let data = json_root(&self.schema, MAP_MARKER, "FrontEndMapMarker");
        match data.get("markerLocation") {
            Some(loc) => (
                loc.get("y").and_then(Value::as_f64).unwrap_or(0.0),
                loc.get("x").and_then(Value::as_f64).unwrap_or(0.0),
            ),
            None => (0.0, 0.0),
        }
    }

    pub fn set_frontend_marker(
        &mut self,
        x: Option<f64>,
        y: Option<f64>,
        is_set: Option<bool>,
    ) -> SchemaDelta {
        let mut data = json_root(&self.schema, MAP_MARKER, "FrontEndMapMarker");
        let mut location = match data.remove("markerLocation") {
            Some(Value::Object(loc)) => loc,
            _ => Map::new(),
        };
        if let Some(x) = x {
            location.insert("y".into(), json!(x));
        }
        if let Some(y) = y {
            location.insert("x".into(), json!(y));
        }
        data.insert("markerLocation".into(), Value::Object(location));
        if let Some(is_set) = is_set {
            data.insert("bIsSet".into(), json!(is_set));
        }
        put_root(&mut self.schema, MAP_MARKER, "FrontEndMapMarker", Value::Object(data))
    }

    pub fn set_member_squad_assignment_request(
        &mut self,
        current: i64,
        target: i64,
        version: u64,
        target_id: Option<&str>,
    ) -> SchemaDelta {
        let request = SquadAssignmentRequest {
            starting_absolute_idx: current,
            target_absolute_idx: target,
            swap_target_member_id: target_id.unwrap_or(INVALID_MEMBER_ID).to_string(),
            version,
        };
        put_root(
            &mut self.schema,
            SQUAD_REQUEST,
            "MemberSquadAssignmentRequest",
            json!(request),
        )
    }

    /// Read-modify-write of the whole `LobbyState` object.
    pub fn set_lobby_state(&mut self, update: LobbyStateUpdate) -> SchemaDelta {
        let mut data = json_root(&self.schema, LOBBY_STATE, "LobbyState");
        if let Some(v) = update.in_game_ready_check_status {
            data.insert("inGameReadyCheckStatus".into(), v);
        }
        if let Some(v) = update.game_readiness {
            data.insert("gameReadiness".into(), json!(v));
        }
        if let Some(v) = update.ready_input_type {
            data.insert("readyInputType".into(), json!(v));
        }
        if let Some(v) = update.current_input_type {
            data.insert("currentInputType".into(), json!(v));
        }
        if let Some(v) = update.hidden_matchmaking_delay_max {
            data.insert("hiddenMatchmakingDelayMax".into(), json!(v));
        }
        if let Some(v) = update.has_pre_loaded_athena {
            data.insert("hasPreloadedAthena".into(), json!(v));
        }
        put_root(&mut self.schema, LOBBY_STATE, "LobbyState", Value::Object(data))
    }

    pub fn set_emote(
        &mut self,
        emote: Option<&str>,
        ekey: Option<&str>,
        section: Option<i64>,
    ) -> SchemaDelta {
        let mut data = json_root(&self.schema, FRONTEND_EMOTE, "FrontendEmote");
        if let Some(v) = emote {
            data.insert("emoteItemDef".into(), json!(or_none(v)));
        }
        if let Some(v) = ekey {
            data.insert("emoteItemDefEncryptionKey".into(), json!(v));
        }
        if let Some(v) = section {
            data.insert("emoteSection".into(), json!(v));
        }
        put_root(&mut self.schema, FRONTEND_EMOTE, "FrontendEmote", Value::Object(data))
    }

    pub fn set_assisted_challenge(
        &mut self,
        quest: Option<&str>,
        completed: Option<i64>,
    ) -> SchemaDelta {
        let mut data = json_root(&self.schema, ASSISTED_CHALLENGE, "AssistedChallengeInfo");
        if let Some(v) = quest {
            data.insert("questItemDef".into(), json!(or_none(v)));
        }
        if let Some(v) = completed {
            data.insert("objectivesCompleted".into(), json!(v));
        }
        put_root(
            &mut self.schema,
            ASSISTED_CHALLENGE,
            "AssistedChallengeInfo",
            Value::Object(data),
        )
    }

    pub fn set_banner(
        &mut self,
        icon: Option<&str>,
        color: Option<&str>,
        season_level: Option<i64>,
    ) -> SchemaDelta {
        let mut data = json_root(&self.schema, BANNER_INFO, "AthenaBannerInfo");
        if let Some(v) = icon {
            data.insert("bannerIconId".into(), json!(v));
        }
        if let Some(v) = color {
            data.insert("bannerColorId".into(), json!(v));
        }
        if let Some(v) = season_level {
            data.insert("seasonLevel".into(), json!(v));
        }
        put_root(&mut self.schema, BANNER_INFO, "AthenaBannerInfo", Value::Object(data))
    }

    pub fn set_battlepass_info(
        &mut self,
        has_purchased: Option<bool>,
        level: Option<i64>,
        self_boost_xp: Option<i64>,
        friend_boost_xp: Option<i64>,
    ) -> SchemaDelta {
        let mut data = json_root(&self.schema, BATTLEPASS_INFO, "BattlePassInfo");
        if let Some(v) = has_purchased {
            data.insert("bHasPurchasedPass".into(), json!(v));
        }
        if let Some(v) = level {
            data.insert("passLevel".into(), json!(v));
        }
        if let Some(v) = self_boost_xp {
            data.insert("selfBoostXp".into(), json!(v));
        }
        if let Some(v) = friend_boost_xp {
            data.insert("friendBoostXp".into(), json!(v));
        }
        put_root(&mut self.schema, BATTLEPASS_INFO, "BattlePassInfo", Value::Object(data))
    }

    /// Backpack and contrail definitions are written as `None` when empty.
    pub fn set_cosmetic_loadout(&mut self, update: CosmeticLoadoutUpdate) -> SchemaDelta {
        let mut data = self.loadout();
        let mut put = |field: &str, value: Option<String>| {
            if let Some(v) = value {
                data.insert(field.to_string(), json!(v));
            }
        };
        put("characterDef", update.character);
        put("characterEKey", update.character_ekey);
        put("backpackDef", update.backpack.as_deref().map(or_none));
        put("backpackEKey", update.backpack_ekey);
        put("pickaxeDef", update.pickaxe);
        put("pickaxeEKey", update.pickaxe_ekey);
        put("contrailDef", update.contrail.as_deref().map(or_none));
        put("contrailEKey", update.contrail_ekey);
        if let Some(pad) = update.scratchpad {
            data.insert("scratchpad".into(), Value::Array(pad));
        }
        put_root(
            &mut self.schema,
            COSMETIC_LOADOUT,
            "AthenaCosmeticLoadout",
            Value::Object(data),
        )
    }

    pub fn set_variants(&mut self, variants: Map<String, Value>) -> SchemaDelta {
        put_root(
            &mut self.schema,
            LOADOUT_VARIANTS,
            "AthenaCosmeticLoadoutVariants",
            json!({"vL": variants}),
        )
    }

    pub fn set_custom_data_store(&mut self, value: Vec<Value>) -> SchemaDelta {
        put_root(
            &mut self.schema,
            CUSTOM_DATA_STORE,
            "ArbitraryCustomDataStore",
            Value::Array(value),
        )
    }

    pub fn set_match_state(&mut self, update: MatchStateUpdate) -> SchemaDelta {
        let mut delta = SchemaDelta::new();
        if let Some(v) = update.location {
            delta.extend(put_value(&mut self.schema, LOCATION, v));
        }
        if let Some(v) = update.has_preloaded {
            delta.extend(put_value(&mut self.schema, HAS_PRELOADED, v));
        }
        if let Some(v) = update.spectate_party_member_available {
            delta.extend(put_value(&mut self.schema, SPECTATE_AVAILABLE, v));
        }
        if let Some(v) = update.players_left {
            delta.extend(put_value(&mut self.schema, PLAYERS_LEFT, v));
        }
        if let Some(v) = update.started_at {
            delta.extend(put_value(&mut self.schema, MATCH_STARTED_AT, to_iso(v)));
        }
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn meta() -> PartyMemberMeta {
        PartyMemberMeta::with_character("WIN", DEFAULT_CHARACTERS[0])
    }

    #[test]
    fn test_default_schema_reads() {
        let m = meta();
        assert_eq!(m.ready(), "NotReady");
        assert_eq!(m.location(), "PreLobby");
        assert_eq!(m.emote(), "None");
        assert_eq!(m.backpack(), "None");
        assert_eq!(m.platform(), "WIN");
        assert_eq!(
            m.outfit(),
            "AthenaCharacterItemDefinition'/Game/Athena/Items/Cosmetics/Characters/CID_556_Athena_Commando_F_RebirthDefaultA.CID_556_Athena_Commando_F_RebirthDefaultA'"
        );
        assert_eq!(m.banner().icon, "standardbanner15");
        assert_eq!(m.battlepass_info().level, 1);
        assert_eq!(m.member_squad_assignment_request(), SquadAssignmentRequest::default());
        assert_eq!(m.frontend_marker_location(), (0.0, 0.0));
        assert!(!m.frontend_marker_set());
        assert_eq!(m.schema().get_str("Default:MatchmakingLevel_U"), "0");
        assert_eq!(m.schema().get_str("Default:VoiceChatEnabled_b"), "true");
    }

    #[test]
    fn test_random_character_is_a_default() {
        let m = PartyMemberMeta::new("WIN");
        let outfit = super::super::short_id(&m.outfit()).unwrap();
        assert!(DEFAULT_CHARACTERS.contains(&outfit.as_str()));
    }

    #[test]
    fn test_lobby_state_keeps_other_fields() {
        let mut m = meta();
        let delta = m.set_lobby_state(LobbyStateUpdate {
            game_readiness: Some("Ready".into()),
            ..Default::default()
        });
        assert_eq!(delta.len(), 1);
        let raw: Value = serde_json::from_str(&delta[LOBBY_STATE]).unwrap();
        assert_eq!(raw["LobbyState"]["gameReadiness"], "Ready");
        assert_eq!(raw["LobbyState"]["readyInputType"], "MouseAndKeyboard");
        assert_eq!(m.ready(), "Ready");
    }

    #[test]
    fn test_marker_axes_are_swapped_on_the_wire() {
        let mut m = meta();
        let delta = m.set_frontend_marker(Some(10.0), Some(-4.5), Some(true));
        let raw: Value = serde_json::from_str(&delta[MAP_MARKER]).unwrap();
        assert_eq!(raw["FrontEndMapMarker"]["markerLocation"]["y"], 10.0);
        assert_eq!(raw["FrontEndMapMarker"]["markerLocation"]["x"], -4.5);
        assert_eq!(m.frontend_marker_location(), (10.0, -4.5));
        assert!(m.frontend_marker_set());
    }

    #[test]
    fn test_squad_request_round_trip() {
        let mut m = meta();
        let delta = m.set_member_squad_assignment_request(2, 5, 3, Some("u9"));
        let parsed = SquadAssignmentRequest::from_encoded(&delta[SQUAD_REQUEST]).unwrap();
        assert_eq!(parsed.starting_absolute_idx, 2);
        assert_eq!(parsed.target_absolute_idx, 5);
        assert_eq!(parsed.version, 3);
        assert_eq!(parsed.swap_target(), Some("u9"));

        m.set_member_squad_assignment_request(5, 6, 4, None);
        assert_eq!(m.member_squad_assignment_request().swap_target(), None);
    }

    #[test]
    fn test_loadout_substitutes_none() {
        let mut m = meta();
        m.set_cosmetic_loadout(CosmeticLoadoutUpdate {
            backpack: Some(String::new()),
            contrail: Some(String::new()),
            pickaxe: Some("P".into()),
            ..Default::default()
        });
        assert_eq!(m.backpack(), "None");
        assert_eq!(m.contrail(), "None");
        assert_eq!(m.pickaxe(), "P");
    }

    #[test]
    fn test_variants_slots() {
        let mut m = meta();
        let mut vl = Map::new();
        vl.insert(
            "AthenaCharacter".into(),
            json!({"i": [{"c": "Mat", "v": "Mat1", "dE": 0}]}),
        );
        m.set_variants(vl);
        assert_eq!(m.outfit_variants().len(), 1);
        assert!(m.backpack_variants().is_empty());
    }

    #[test]
    fn test_match_state() {
        let mut m = meta();
        let started = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let delta = m.set_match_state(MatchStateUpdate {
            location: Some("InGame".into()),
            has_preloaded: Some(true),
            spectate_party_member_available: Some(true),
            players_left: Some(42),
            started_at: Some(started),
        });
        assert_eq!(delta.len(), 5);
        assert_eq!(delta[PLAYERS_LEFT], "42");
        assert_eq!(delta[HAS_PRELOADED], "true");
        assert_eq!(m.match_started_at(), "2024-05-01T12:00:00.000Z");
        assert_eq!(m.players_left(), 42);
    }

    #[test]
    fn test_epoch_timestamp_format() {
        let epoch = Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(to_iso(epoch), "0001-01-01T00:00:00.000Z");
    }
}
