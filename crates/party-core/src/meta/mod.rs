//! Typed views over party and member schemas.
//!
//! Every mutator returns exactly the encoded keys it wrote so callers can
//! merge deltas from several mutators into one patch.

mod member;
mod party;

pub use member::{
    BannerInfo, BattlePassInfo, CosmeticLoadoutUpdate, LobbyStateUpdate, MatchStateUpdate,
    PartyMemberMeta, SquadAssignmentRequest, DEFAULT_CHARACTERS,
};
pub use party::{PartyMeta, PlaylistInfo, PrivacyDelta};
pub(crate) use member::SQUAD_REQUEST;
pub(crate) use party::RAW_SQUAD_ASSIGNMENTS;

use crate::schema::Schema;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Encoded keys written by a mutator.
pub type SchemaDelta = IndexMap<String, String>;

/// Lobby readiness of a member.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadyState {
    Ready,
    #[default]
    NotReady,
    SittingOut,
}

impl ReadyState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReadyState::Ready => "Ready",
            ReadyState::NotReady => "NotReady",
            ReadyState::SittingOut => "SittingOut",
        }
    }

    /// Unknown wire values read as not ready.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "Ready" => ReadyState::Ready,
            "SittingOut" => ReadyState::SittingOut,
            _ => ReadyState::NotReady,
        }
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full object paths for short cosmetic ids.
pub mod assets {
    pub const CHARACTER: &str = "AthenaCharacterItemDefinition'/Game/Athena/Items/Cosmetics/Characters/{}.{}'";
    pub const BACKPACK: &str = "AthenaBackpackItemDefinition'/Game/Athena/Items/Cosmetics/Backpacks/{}.{}'";
    pub const PET: &str = "AthenaPetItemDefinition'/Game/Athena/Items/Cosmetics/PetCarriers/{}.{}'";
    pub const PICKAXE: &str = "AthenaPickaxeItemDefinition'/Game/Athena/Items/Cosmetics/Pickaxes/{}.{}'";
    pub const CONTRAIL: &str = "AthenaContrailItemDefinition'/Game/Athena/Items/Cosmetics/Contrails/{}.{}'";
    pub const DANCE: &str = "AthenaDanceItemDefinition'/Game/Athena/Items/Cosmetics/Dances/{}.{}'";
    pub const EMOJI: &str = "AthenaDanceItemDefinition'/Game/Athena/Items/Cosmetics/Dances/Emoji/{}.{}'";
    pub const QUEST: &str = "FortQuestItemDefinition'/Game/Athena/Items/Quests/DailyQuests/Quests/{}.{}'";
    pub const HERO: &str = "FortHeroType'/Game/Athena/Heroes/{}.{}'";
    pub const DEFAULT_PICKAXE: &str = "AthenaPickaxeItemDefinition'/Game/Athena/Items/Cosmetics/Pickaxes/DefaultPickaxe.DefaultPickaxe'";

    /// Expand a bare id such as `CID_028_Athena_Commando_F` into `template`.
    /// Empty strings and anything already containing a `.` pass through.
    #[must_use]
    pub fn expand(template: &str, asset: &str) -> String {
        if asset.is_empty() || asset.contains('.') {
            asset.to_string()
        } else {
            template.replace("{}", asset)
        }
    }
}

static ASSET_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r#".*\.([^'"]*)"#).unwrap());

/// The short id at the end of an object path, or `None` for unset slots.
#[must_use]
pub fn short_id(asset: &str) -> Option<String> {
    let caps = ASSET_ID.captures(asset.trim_matches('\''))?;
    let id = caps.get(1)?.as_str();
    (id != "None").then(|| id.to_string())
}

/// Empty definitions are written as the literal `None`.
#[must_use]
pub(crate) fn or_none(def: &str) -> String {
    if def.is_empty() {
        "None".to_string()
    } else {
        def.to_string()
    }
}

/// Read the object stored under `root` in JSON key `key`. Missing or
/// malformed data reads as an empty object.
pub(crate) fn json_root(schema: &Schema, key: &str, root: &str) -> Map<String, Value> {
    match schema.get_json(key) {
        Ok(Value::Object(mut outer)) => match outer.remove(root) {
            Some(Value::Object(inner)) => inner,
            _ => Map::new(),
        },
        Ok(_) => Map::new(),
        Err(err) => {
            tracing::debug!("[PartyMeta] unreadable {}: {}", key, err);
            Map::new()
        }
    }
}

/// Like [`json_root`] for roots holding a list.
pub(crate) fn json_root_list(schema: &Schema, key: &str, root: &str) -> Vec<Value> {
    match schema.get_json(key) {
        Ok(Value::Object(mut outer)) => match outer.remove(root) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Store `{root: value}` under `key` and return the one-key delta.
pub(crate) fn put_root(schema: &mut Schema, key: &str, root: &str, value: Value) -> SchemaDelta {
    let mut outer = Map::new();
    outer.insert(root.to_string(), value);
    let encoded = schema.set(key, Value::Object(outer));
    let mut delta = SchemaDelta::new();
    delta.insert(key.to_string(), encoded);
    delta
}

pub(crate) fn put_value(
    schema: &mut Schema,
    key: &str,
    value: impl Into<crate::schema::SchemaValue>,
) -> SchemaDelta {
    let encoded = schema.set(key, value);
    let mut delta = SchemaDelta::new();
    delta.insert(key.to_string(), encoded);
    delta
}

pub(crate) fn str_field(map: &Map<String, Value>, field: &str, default: &str) -> String {
    map.get(field)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_from_object_path() {
        assert_eq!(
            short_id("AthenaCharacterItemDefinition'/Game/Athena/Items/Cosmetics/Characters/CID_001.CID_001'"),
            Some("CID_001".to_string())
        );
        assert_eq!(short_id("None"), None);
        assert_eq!(short_id(""), None);
        assert_eq!(short_id("'/Game/Thing.None'"), None);
    }

    #[test]
    fn test_expand_only_bare_ids() {
        assert_eq!(
            assets::expand(assets::PICKAXE, "Pickaxe_ID_011"),
            "AthenaPickaxeItemDefinition'/Game/Athena/Items/Cosmetics/Pickaxes/Pickaxe_ID_011.Pickaxe_ID_011'"
        );
        assert_eq!(assets::expand(assets::PICKAXE, ""), "");
        assert_eq!(assets::expand(assets::PICKAXE, "/Game/X.Y"), "/Game/X.Y");
    }

    #[test]
    fn test_ready_state_wire_names() {
        assert_eq!(ReadyState::SittingOut.as_str(), "SittingOut");
        assert_eq!(ReadyState::parse("Ready"), ReadyState::Ready);
        assert_eq!(ReadyState::parse("whatever"), ReadyState::NotReady);
        assert_eq!(
            serde_json::to_string(&ReadyState::NotReady).unwrap(),
            "\"NotReady\""
        );
    }
}
