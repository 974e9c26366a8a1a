//! Party and member templates.
//!
//! A template holds the configuration a fresh party or local member starts
//! with plus a list of commands replayed onto it. Commands are plain tagged
//! values so they can be stored in config files and deduplicated by kind.

use crate::meta::ReadyState;
use crate::patch::{merge_commands, Command};
use crate::squad::{PositionPriorities, SquadAssignment, SquadPolicy};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use party_http::{Discoverability, Joinability, PartyPrivacy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Arguments of the outfit and backpack setters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CosmeticOptions {
    /// Short id or full object path. `None` keeps the current definition,
    /// an empty string clears the slot.
    pub asset: Option<String>,
    pub key: Option<String>,
    pub variants: Option<Vec<Value>>,
    /// Exactly two values: `[t, v]`.
    pub enlightenment: Option<Vec<i64>>,
    pub corruption: Option<f64>,
}

impl CosmeticOptions {
    #[must_use]
    pub fn asset(asset: impl Into<String>) -> Self {
        Self {
            asset: Some(asset.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_variants(mut self, variants: Vec<Value>) -> Self {
        self.variants = Some(variants);
        self
    }
}

/// Arguments of the pet, pickaxe and contrail setters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetOptions {
    pub asset: Option<String>,
    pub key: Option<String>,
    pub variants: Option<Vec<Value>>,
}

impl AssetOptions {
    #[must_use]
    pub fn asset(asset: impl Into<String>) -> Self {
        Self {
            asset: Some(asset.into()),
            ..Default::default()
        }
    }
}

/// Arguments of the emote and emoji setters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmoteOptions {
    pub asset: String,
    /// Clear the emote again after this long.
    #[serde(default, with = "opt_millis")]
    pub run_for: Option<Duration>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub section: Option<i64>,
}

impl EmoteOptions {
    /// An emote that plays until replaced or cleared.
    #[must_use]
    pub fn emote(asset: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            run_for: None,
            key: None,
            section: None,
        }
    }

    /// An emoji, cleared after two seconds.
    #[must_use]
    pub fn emoji(asset: impl Into<String>) -> Self {
        Self {
            run_for: Some(Duration::from_secs(2)),
            ..Self::emote(asset)
        }
    }

    #[must_use]
    pub fn run_for(mut self, duration: Option<Duration>) -> Self {
        self.run_for = duration;
        self
    }
}

mod opt_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        value
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

/// Arguments of `set_in_match`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InMatchOptions {
    #[serde(default = "default_players_left")]
    pub players_left: u32,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

fn default_players_left() -> u32 {
    100
}

impl Default for InMatchOptions {
    fn default() -> Self {
        Self {
            players_left: default_players_left(),
            started_at: None,
        }
    }
}

/// A replayable party-level mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PartyCommand {
    SetPrivacy {
        privacy: PartyPrivacy,
    },
    SetPlaylist {
        #[serde(default)]
        playlist: Option<String>,
        #[serde(default)]
        tournament: Option<String>,
        #[serde(default)]
        event_window: Option<String>,
        #[serde(default)]
        region: Option<String>,
    },
    SetCustomKey {
        key: String,
    },
    SetFill {
        value: bool,
    },
    SetMaxSize {
        size: u8,
    },
    SetSquadAssignments {
        assignments: IndexMap<String, SquadAssignment>,
    },
}

impl Command for PartyCommand {}

/// A replayable mutation of the local member.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum MemberCommand {
    SetReady {
        state: ReadyState,
    },
    SetOutfit(CosmeticOptions),
    SetBackpack(CosmeticOptions),
    ClearBackpack,
    SetPet(AssetOptions),
    ClearPet,
    SetPickaxe(AssetOptions),
    SetContrail(AssetOptions),
    ClearContrail,
    SetEmote(EmoteOptions),
    SetEmoji(EmoteOptions),
    ClearEmote,
    SetBanner {
        #[serde(default)]
        icon: Option<String>,
        #[serde(default)]
        color: Option<String>,
        #[serde(default)]
        season_level: Option<i64>,
    },
    SetBattlepassInfo {
        #[serde(default)]
        has_purchased: Option<bool>,
        #[serde(default)]
        level: Option<i64>,
        #[serde(default)]
        self_boost_xp: Option<i64>,
        #[serde(default)]
        friend_boost_xp: Option<i64>,
    },
    SetAssistedChallenge {
        #[serde(default)]
        quest: Option<String>,
        #[serde(default)]
        completed: Option<i64>,
    },
    ClearAssistedChallenge,
    SetPosition {
        position: u8,
    },
    SetInMatch(InMatchOptions),
    ClearInMatch,
    SetLobbyMapMarker {
        x: f64,
        y: f64,
    },
    ClearLobbyMapMarker,
}

impl Command for MemberCommand {}

/// Defaults for every party this session creates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyTemplate {
    pub privacy: PartyPrivacy,
    pub joinability: Joinability,
    pub discoverability: Discoverability,
    pub max_size: u8,
    pub invite_ttl: u32,
    pub intention_ttl: u32,
    pub chat_enabled: bool,
    pub join_confirmation: bool,
    pub sub_type: String,
    pub party_type: String,
    /// Honour swap requests from members while leading.
    pub team_change_allowed: bool,
    pub default_squad_assignment: SquadAssignment,
    pub position_priorities: PositionPriorities,
    pub reassign_positions_on_size_change: bool,
    pub commands: Vec<PartyCommand>,
}

impl Default for PartyTemplate {
    fn default() -> Self {
        Self {
            privacy: PartyPrivacy::Public,
            joinability: Joinability::Open,
            discoverability: Discoverability::All,
            max_size: 16,
            invite_ttl: 14400,
            intention_ttl: 60,
            chat_enabled: true,
            join_confirmation: false,
            sub_type: "default".to_string(),
            party_type: "DEFAULT".to_string(),
            team_change_allowed: true,
            default_squad_assignment: SquadAssignment::default(),
            position_priorities: PositionPriorities::default(),
            reassign_positions_on_size_change: true,
            commands: Vec::new(),
        }
    }
}

impl PartyTemplate {
    #[must_use]
    pub fn squad_policy(&self) -> SquadPolicy<'_> {
        SquadPolicy {
            priorities: &self.position_priorities,
            default_assignment: self.default_squad_assignment,
            reassign_on_size_change: self.reassign_positions_on_size_change,
        }
    }

    /// Store `commands` for replay. Privacy commands also move the
    /// template's own privacy and access settings.
    pub fn keep(&mut self, commands: Vec<PartyCommand>) {
        self.commands = merge_commands(&self.commands, commands);
        let privacy = self.commands.iter().find_map(|c| match c {
            PartyCommand::SetPrivacy { privacy } => Some(*privacy),
            _ => None,
        });
        if let Some(privacy) = privacy {
            let (discoverability, joinability) = privacy.access();
            self.privacy = privacy;
            self.discoverability = discoverability;
            self.joinability = joinability;
        }
    }
}

/// Defaults for the local member of every party.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberTemplate {
    pub yield_leadership: bool,
    pub offline_ttl: u32,
    pub commands: Vec<MemberCommand>,
}

impl Default for MemberTemplate {
    fn default() -> Self {
        Self {
            yield_leadership: false,
            offline_ttl: 30,
            commands: Vec::new(),
        }
    }
}

impl MemberTemplate {
    pub fn keep(&mut self, commands: Vec<MemberCommand>) {
        self.commands = merge_commands(&self.commands, commands);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keep_replaces_same_kind() {
        let mut t = MemberTemplate::default();
        t.keep(vec![
            MemberCommand::SetOutfit(CosmeticOptions::asset("CID_001")),
            MemberCommand::SetReady {
                state: ReadyState::Ready,
            },
        ]);
        t.keep(vec![MemberCommand::SetOutfit(CosmeticOptions::asset("CID_002"))]);
        assert_eq!(t.commands.len(), 2);
        assert_eq!(
            t.commands[1],
            MemberCommand::SetOutfit(CosmeticOptions::asset("CID_002"))
        );
    }

    #[test]
    fn test_keep_privacy_updates_access() {
        let mut t = PartyTemplate::default();
        t.keep(vec![PartyCommand::SetPrivacy {
            privacy: PartyPrivacy::Private,
        }]);
        assert_eq!(t.privacy, PartyPrivacy::Private);
        assert_eq!(t.joinability, Joinability::InviteAndFormer);
        assert_eq!(t.discoverability, Discoverability::InvitedOnly);
    }

    #[test]
    fn test_command_wire_shape() {
        let cmd: MemberCommand = serde_json::from_value(json!({
            "command": "set_emoji",
            "asset": "Emoji_GG",
            "run_for": 1500
        }))
        .unwrap();
        assert_eq!(
            cmd,
            MemberCommand::SetEmoji(
                EmoteOptions::emote("Emoji_GG").run_for(Some(Duration::from_millis(1500)))
            )
        );

        let cmd: PartyCommand =
            serde_json::from_value(json!({"command": "set_privacy", "privacy": "FRIENDS"})).unwrap();
        assert_eq!(
            cmd,
            PartyCommand::SetPrivacy {
                privacy: PartyPrivacy::Friends
            }
        );
    }

    #[test]
    fn test_template_defaults_from_partial_json() {
        let t: PartyTemplate = serde_json::from_value(json!({"max_size": 4})).unwrap();
        assert_eq!(t.max_size, 4);
        assert_eq!(t.privacy, PartyPrivacy::Public);
        assert!(t.reassign_positions_on_size_change);

        let err = serde_json::from_value::<PartyTemplate>(json!({
            "position_priorities": [0, 1, 2]
        }));
        assert!(err.is_err());
    }
}
