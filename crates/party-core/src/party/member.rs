use crate::meta::{short_id, BannerInfo, BattlePassInfo, PartyMemberMeta, ReadyState};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use party_http::{RawConnection, RawMember};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

const CONN_PLATFORM: &str = "urn:epic:conn:platform_s";
const CONN_TYPE: &str = "urn:epic:conn:type_s";

/// A member's role within the party.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Captain,
    Member,
}

impl Role {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CAPTAIN" => Some(Role::Captain),
            "MEMBER" => Some(Role::Member),
            _ => None,
        }
    }
}

/// The connection a member is present through.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemberConnection {
    pub id: String,
    pub platform: Option<String>,
    pub conn_type: Option<String>,
    pub yield_leadership: bool,
    pub offline_ttl: u32,
    pub disconnected_at: Option<DateTime<Utc>>,
}

impl From<&RawConnection> for MemberConnection {
    fn from(raw: &RawConnection) -> Self {
        let meta_str = |key: &str| raw.meta.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            id: raw.id.clone(),
            platform: meta_str(CONN_PLATFORM),
            conn_type: meta_str(CONN_TYPE),
            yield_leadership: raw.yield_leadership,
            offline_ttl: raw.offline_ttl.unwrap_or(30),
            disconnected_at: raw.disconnected_at,
        }
    }
}

/// A party member as seen by this client.
///
/// Members refer to their party by id only; the owning party state keeps
/// them in its arena.
#[derive(Clone, Debug, PartialEq)]
pub struct PartyMember {
    pub id: String,
    pub party_id: String,
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub role_updated_at: DateTime<Utc>,
    pub revision: u64,
    pub joined_at: Option<DateTime<Utc>>,
    pub connection: MemberConnection,
    pub meta: PartyMemberMeta,
    /// Version of the last squad assignment request handled for this member.
    pub assignment_version: u64,
}

impl PartyMember {
    #[must_use]
    pub fn from_raw(party_id: &str, raw: &RawMember, default_platform: &str) -> Self {
        let connection = raw
            .active_connection()
            .map(MemberConnection::from)
            .unwrap_or_default();
        let platform = connection.platform.as_deref().unwrap_or(default_platform);
        let mut meta = PartyMemberMeta::new(platform);
        meta.update_raw(&raw.meta);
        Self {
            id: raw.account_id.clone(),
            party_id: party_id.to_string(),
            display_name: raw.display_name.clone(),
            role: raw.role.as_deref().and_then(Role::parse),
            role_updated_at: Utc::now(),
            revision: raw.revision,
            joined_at: raw.joined_at,
            connection,
            meta,
            assignment_version: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn leader(&self) -> bool {
        self.role == Some(Role::Captain)
    }

    pub fn update_role(&mut self, role: Option<Role>) {
        self.role = role;
        self.role_updated_at = Utc::now();
    }

    /// Apply a member state notification. The revision only moves forward.
    pub fn apply_state_update(
        &mut self,
        revision: u64,
        updated: &Map<String, Value>,
        removed: &[String],
    ) {
        if revision > self.revision {
            self.revision = revision;
        }
        self.meta.update_raw(updated);
        self.meta.schema_mut().remove(removed);
    }

    /// Connection platform, falling back to the one in member meta.
    #[must_use]
    pub fn platform(&self) -> String {
        self.connection
            .platform
            .clone()
            .unwrap_or_else(|| self.meta.platform())
    }

    #[must_use]
    pub fn will_yield_leadership(&self) -> bool {
        self.connection.yield_leadership
    }

    #[must_use]
    pub fn offline_ttl(&self) -> u32 {
        self.connection.offline_ttl
    }

    #[must_use]
    pub fn is_zombie(&self) -> bool {
        self.connection.disconnected_at.is_some()
    }

    #[must_use]
    pub fn zombie_since(&self) -> Option<DateTime<Utc>> {
        self.connection.disconnected_at
    }

    #[must_use]
    pub fn is_just_chatting(&self) -> bool {
        self.connection.conn_type.as_deref() == Some("embedded")
    }

    #[must_use]
    pub fn ready(&self) -> ReadyState {
        ReadyState::parse(&self.meta.ready())
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready() == ReadyState::Ready
    }

    #[must_use]
    pub fn input(&self) -> String {
        self.meta.input().to_string()
    }

    #[must_use]
    pub fn assisted_challenge(&self) -> Option<String> {
        short_id(&self.meta.assisted_challenge())
    }

    #[must_use]
    pub fn outfit(&self) -> Option<String> {
        short_id(&self.meta.outfit())
    }

    #[must_use]
    pub fn backpack(&self) -> Option<String> {
        let asset = self.meta.backpack();
        if is_pet(&asset) {
            return None;
        }
        short_id(&asset)
    }

    #[must_use]
    pub fn pet(&self) -> Option<String> {
        let asset = self.meta.backpack();
        if !is_pet(&asset) {
            return None;
        }
        short_id(&asset)
    }

    #[must_use]
    pub fn pickaxe(&self) -> Option<String> {
        short_id(&self.meta.pickaxe())
    }

    #[must_use]
    pub fn contrail(&self) -> Option<String> {
        short_id(&self.meta.contrail())
    }

    #[must_use]
    pub fn emote(&self) -> Option<String> {
        let asset = self.meta.emote();
        if is_emoji(&asset) {
            return None;
        }
        short_id(&asset)
    }

    #[must_use]
    pub fn emoji(&self) -> Option<String> {
        let asset = self.meta.emote();
        if !is_emoji(&asset) {
            return None;
        }
        short_id(&asset)
    }

    #[must_use]
    pub fn outfit_variants(&self) -> Vec<Value> {
        self.meta.outfit_variants()
    }

    #[must_use]
    pub fn backpack_variants(&self) -> Vec<Value> {
        self.meta.backpack_variants()
    }

    #[must_use]
    pub fn pickaxe_variants(&self) -> Vec<Value> {
        self.meta.pickaxe_variants()
    }

    #[must_use]
    pub fn contrail_variants(&self) -> Vec<Value> {
        self.meta.contrail_variants()
    }

    /// `(t, v)` pairs stored in the loadout scratchpad.
    #[must_use]
    pub fn enlightenments(&self) -> Vec<(i64, i64)> {
        self.meta
            .scratchpad()
            .iter()
            .filter_map(|entry| {
                let t = entry.get("t")?.as_i64()?;
                let v = entry.get("v")?.as_i64()?;
                Some((t, v))
            })
            .collect()
    }

    /// Corruption level, present only while some slot carries a
    /// `Corruption` variant.
    #[must_use]
    pub fn corruption(&self) -> Option<f64> {
        let store = self.meta.custom_data_store();
        if store.is_empty() {
            return None;
        }
        let corrupted = self.meta.variants().values().any(|slot| {
            slot.get("i")
                .and_then(Value::as_array)
                .is_some_and(|items| items.iter().any(|v| v.get("c") == Some(&json!("Corruption"))))
        });
        if !corrupted {
            return None;
        }
        store.iter().find_map(|stored| match stored {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_f64(),
            _ => None,
        })
    }

    #[must_use]
    pub fn banner(&self) -> BannerInfo {
        self.meta.banner()
    }

    #[must_use]
    pub fn battlepass_info(&self) -> BattlePassInfo {
        self.meta.battlepass_info()
    }

    #[must_use]
    pub fn in_match(&self) -> bool {
        self.meta.location() == "InGame"
    }

    #[must_use]
    pub fn match_started_at(&self) -> Option<DateTime<Utc>> {
        if !self.in_match() {
            return None;
        }
        DateTime::parse_from_rfc3339(self.meta.match_started_at())
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }

    #[must_use]
    pub fn match_players_left(&self) -> u64 {
        self.meta.players_left()
    }

    #[must_use]
    pub fn lobby_map_marker_is_visible(&self) -> bool {
        self.meta.frontend_marker_set()
    }

    #[must_use]
    pub fn lobby_map_marker_coordinates(&self) -> (f64, f64) {
        self.meta.frontend_marker_location()
    }

    /// Values compared across a member state update.
    #[must_use]
    pub fn snapshot(&self) -> MemberSnapshot {
        MemberSnapshot {
            ready: self.ready(),
            input: self.input(),
            assisted_challenge: self.assisted_challenge(),
            outfit: self.outfit(),
            backpack: self.backpack(),
            pet: self.pet(),
            pickaxe: self.pickaxe(),
            contrail: self.contrail(),
            emote: self.emote(),
            emoji: self.emoji(),
            banner: self.banner(),
            battlepass_info: self.battlepass_info(),
            in_match: self.in_match(),
            match_players_left: self.match_players_left(),
            outfit_variants: self.outfit_variants(),
            backpack_variants: self.backpack_variants(),
            pickaxe_variants: self.pickaxe_variants(),
            contrail_variants: self.contrail_variants(),
        }
    }
}

fn is_pet(asset: &str) -> bool {
    asset.to_lowercase().contains("/petcarriers/")
}

fn is_emoji(asset: &str) -> bool {
    asset.to_lowercase().contains("/emoji/")
}

/// Old and new value of a property.
#[derive(Clone, Debug, PartialEq)]
pub struct Change<T> {
    pub before: T,
    pub after: T,
}

/// A derived member property that changed.
#[derive(Clone, Debug, PartialEq)]
pub enum MemberChange {
    Ready(Change<ReadyState>),
    Input(Change<String>),
    AssistedChallenge(Change<Option<String>>),
    Outfit(Change<Option<String>>),
    Backpack(Change<Option<String>>),
    Pet(Change<Option<String>>),
    Pickaxe(Change<Option<String>>),
    Contrail(Change<Option<String>>),
    Emote(Change<Option<String>>),
    Emoji(Change<Option<String>>),
    Banner(Change<BannerInfo>),
    BattlepassInfo(Change<BattlePassInfo>),
    InMatch(Change<bool>),
    MatchPlayersLeft(Change<u64>),
    OutfitVariants(Change<Vec<Value>>),
    BackpackVariants(Change<Vec<Value>>),
    PickaxeVariants(Change<Vec<Value>>),
    ContrailVariants(Change<Vec<Value>>),
}

/// Derived member properties at one point in time.
#[derive(Clone, Debug, PartialEq)]
pub struct MemberSnapshot {
    pub ready: ReadyState,
    pub input: String,
    pub assisted_challenge: Option<String>,
    pub outfit: Option<String>,
    pub backpack: Option<String>,
    pub pet: Option<String>,
    pub pickaxe: Option<String>,
    pub contrail: Option<String>,
    pub emote: Option<String>,
    pub emoji: Option<String>,
    pub banner: BannerInfo,
    pub battlepass_info: BattlePassInfo,
    pub in_match: bool,
    pub match_players_left: u64,
    pub outfit_variants: Vec<Value>,
    pub backpack_variants: Vec<Value>,
    pub pickaxe_variants: Vec<Value>,
    pub contrail_variants: Vec<Value>,
}

macro_rules! diff_fields {
    ($out:ident, $before:ident, $after:ident, $($field:ident => $variant:ident),+ $(,)?) => {
        $(
            if $before.$field != $after.$field {
                $out.push(MemberChange::$variant(Change {
                    before: $before.$field.clone(),
                    after: $after.$field.clone(),
                }));
            }
        )+
    };
}

macro_rules! diff_variants {
    ($out:ident, $before:ident, $after:ident, $($field:ident => $variant:ident),+ $(,)?) => {
        $(
            if !same_variant_values(&$before.$field, &$after.$field) {
                $out.push(MemberChange::$variant(Change {
                    before: $before.$field.clone(),
                    after: $after.$field.clone(),
                }));
            }
        )+
    };
}

impl MemberSnapshot {
    /// Every property that differs between `self` and `after`, in a fixed
    /// order. Variant lists are compared as sets of their values.
    #[must_use]
    pub fn changes(&self, after: &MemberSnapshot) -> Vec<MemberChange> {
        let before = self;
        let mut out = Vec::new();
        diff_fields!(out, before, after,
            ready => Ready,
            input => Input,
            assisted_challenge => AssistedChallenge,
            outfit => Outfit,
            backpack => Backpack,
            pet => Pet,
            pickaxe => Pickaxe,
            contrail => Contrail,
            emote => Emote,
            emoji => Emoji,
            banner => Banner,
            battlepass_info => BattlepassInfo,
            in_match => InMatch,
            match_players_left => MatchPlayersLeft,
        );
        diff_variants!(out, before, after,
            outfit_variants => OutfitVariants,
            backpack_variants => BackpackVariants,
            pickaxe_variants => PickaxeVariants,
            contrail_variants => ContrailVariants,
        );
        out
    }
}

fn variant_value_set(variants: &[Value]) -> HashSet<String> {
    variants
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|v| v.values())
        .map(Value::to_string)
        .collect()
}

/// Wire order and grouping of variant entries carry no meaning.
fn same_variant_values(a: &[Value], b: &[Value]) -> bool {
    variant_value_set(a) == variant_value_set(b)
}

/// Channel name to the format its value is written with.
fn variant_format(channel: &str) -> &'static str {
    match channel {
        "pattern" | "clothing_color" | "material" => "Mat{}",
        "numeric" => "Numeric.{}",
        "jersey_color" => "Color.{}",
        "parts" | "progressive" => "Stage{}",
        "particle" | "emissive" => "Emissive{}",
        _ => "{}",
    }
}

/// Build a variant list from `(channel, value)` pairs such as
/// `("material", "2")`. `overrides` replaces the value format of a channel.
#[must_use]
pub fn create_variants(
    channels: &[(&str, &str)],
    overrides: &IndexMap<String, String>,
) -> Vec<Value> {
    channels
        .iter()
        .map(|(channel, value)| {
            let format = overrides
                .get(*channel)
                .map(String::as_str)
                .unwrap_or_else(|| variant_format(channel));
            let name: String = channel
                .split('_')
                .map(|part| {
                    let mut chars = part.chars();
                    match chars.next() {
                        Some(first) => {
                            first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                        }
                        None => String::new(),
                    }
                })
                .collect();
            json!({
                "c": name,
                "v": format.replace("{}", value),
                "dE": 0,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{CosmeticLoadoutUpdate, DEFAULT_CHARACTERS};

    fn raw(id: &str) -> RawMember {
        serde_json::from_value(json!({
            "account_id": id,
            "display_name": "Bob",
            "role": "MEMBER",
            "revision": 3,
            "meta": {"Default:Location_s": "InGame", "Default:NumAthenaPlayersLeft_U": "42"},
            "connections": [
                {"id": "old", "disconnected_at": "2024-01-01T00:00:00Z",
                 "meta": {"urn:epic:conn:platform_s": "PSN"}},
                {"id": "live", "yield_leadership": true,
                 "meta": {"urn:epic:conn:platform_s": "WIN", "urn:epic:conn:type_s": "embedded"}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_from_raw_picks_live_connection() {
        let m = PartyMember::from_raw("p1", &raw("u2"), "AND");
        assert_eq!(m.connection.id, "live");
        assert_eq!(m.platform(), "WIN");
        assert!(m.will_yield_leadership());
        assert!(m.is_just_chatting());
        assert!(!m.is_zombie());
        assert_eq!(m.offline_ttl(), 30);
        assert_eq!(m.role, Some(Role::Member));
        assert!(m.in_match());
        assert_eq!(m.match_players_left(), 42);
        assert_eq!(m.meta.platform(), "WIN");
    }

    #[test]
    fn test_backpack_and_pet_share_a_slot() {
        let mut m = PartyMember::from_raw("p1", &raw("u2"), "WIN");
        m.meta.set_cosmetic_loadout(CosmeticLoadoutUpdate {
            backpack: Some(crate::meta::assets::expand(crate::meta::assets::PET, "PetCarrier_001")),
            ..Default::default()
        });
        assert_eq!(m.pet().as_deref(), Some("PetCarrier_001"));
        assert_eq!(m.backpack(), None);
    }

    #[test]
    fn test_state_update_revision_only_grows() {
        let mut m = PartyMember::from_raw("p1", &raw("u2"), "WIN");
        let mut updated = Map::new();
        updated.insert("Default:Location_s".into(), json!("PreLobby"));
        m.apply_state_update(1, &updated, &["Default:NumAthenaPlayersLeft_U".to_string()]);
        assert_eq!(m.revision, 3);
        assert!(!m.in_match());
        assert_eq!(m.match_players_left(), 0);
    }

    #[test]
    fn test_snapshot_changes() {
        // Empty meta rolls a random default outfit; pick one it can't be.
        let mut m = PartyMember::from_raw("p1", &raw("u2"), "WIN");
        assert!(!DEFAULT_CHARACTERS.contains(&"CID_028_Athena_Commando_F"));
        let before = m.snapshot();
        m.meta.set_cosmetic_loadout(CosmeticLoadoutUpdate {
            character: Some(crate::meta::assets::expand(
                crate::meta::assets::CHARACTER,
                "CID_028_Athena_Commando_F",
            )),
            ..Default::default()
        });
        let changes = before.changes(&m.snapshot());
        assert_eq!(changes.len(), 1);
        assert!(matches!(
            &changes[0],
            MemberChange::Outfit(Change { after: Some(id), .. }) if id == "CID_028_Athena_Commando_F"
        ));
    }

    #[test]
    fn test_variant_order_is_ignored() {
        let a = vec![json!({"c": "Mat", "v": "Mat1", "dE": 0}), json!({"c": "Parts", "v": "Stage2", "dE": 0})];
        let b = vec![a[1].clone(), a[0].clone()];
        assert!(same_variant_values(&a, &b));
        let c = vec![json!({"c": "Mat", "v": "Mat2", "dE": 0})];
        assert!(!same_variant_values(&a, &c));
    }

    #[test]
    fn test_create_variants() {
        let out = create_variants(&[("material", "3"), ("jersey_color", "red")], &IndexMap::new());
        assert_eq!(out[0], json!({"c": "Material", "v": "Mat3", "dE": 0}));
        assert_eq!(out[1], json!({"c": "JerseyColor", "v": "Color.red", "dE": 0}));
    }

    #[test]
    fn test_corruption_needs_variant() {
        let mut m = PartyMember::from_raw("p1", &raw("u2"), "WIN");
        m.meta.set_custom_data_store(vec![json!("0.5000")]);
        assert_eq!(m.corruption(), None);
        let mut vl = Map::new();
        vl.insert(
            "AthenaCharacter".into(),
            json!({"i": [{"c": "Corruption", "v": "FloatSlider", "dE": 1}]}),
        );
        m.meta.set_variants(vl);
        assert_eq!(m.corruption(), Some(0.5));
    }
}
