//! Party privacy presets and the configuration enums they drive.

use serde::{Deserialize, Serialize};

/// Who can find the party.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Discoverability {
    All,
    InvitedOnly,
}

impl Discoverability {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Discoverability::All => "ALL",
            Discoverability::InvitedOnly => "INVITED_ONLY",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ALL" => Some(Discoverability::All),
            "INVITED_ONLY" => Some(Discoverability::InvitedOnly),
            _ => None,
        }
    }
}

/// Who can join the party.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Joinability {
    Open,
    InviteOnly,
    InviteAndFormer,
}

impl Joinability {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Joinability::Open => "OPEN",
            Joinability::InviteOnly => "INVITE_ONLY",
            Joinability::InviteAndFormer => "INVITE_AND_FORMER",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "OPEN" => Some(Joinability::Open),
            "INVITE_ONLY" => Some(Joinability::InviteOnly),
            "INVITE_AND_FORMER" => Some(Joinability::InviteAndFormer),
            _ => None,
        }
    }
}

/// The field values a privacy preset writes to the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrivacySettings {
    pub party_type: &'static str,
    pub invite_restriction: &'static str,
    pub only_leader_friends_can_join: bool,
    pub presence_permission: &'static str,
    pub invite_permission: &'static str,
    pub accepting_members: bool,
}

/// The five privacy presets a party can be in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartyPrivacy {
    Public,
    FriendsAllowFriendsOfFriends,
    Friends,
    PrivateAllowFriendsOfFriends,
    Private,
}

impl PartyPrivacy {
    pub const ALL: [PartyPrivacy; 5] = [
        PartyPrivacy::Public,
        PartyPrivacy::FriendsAllowFriendsOfFriends,
        PartyPrivacy::Friends,
        PartyPrivacy::PrivateAllowFriendsOfFriends,
        PartyPrivacy::Private,
    ];

    #[must_use]
    pub fn settings(self) -> PrivacySettings {
        match self {
            PartyPrivacy::Public => PrivacySettings {
                party_type: "Public",
                invite_restriction: "AnyMember",
                only_leader_friends_can_join: false,
                presence_permission: "Anyone",
                invite_permission: "Anyone",
                accepting_members: true,
            },
            PartyPrivacy::FriendsAllowFriendsOfFriends => PrivacySettings {
                party_type: "FriendsOnly",
                invite_restriction: "AnyMember",
                only_leader_friends_can_join: false,
                presence_permission: "Anyone",
                invite_permission: "AnyMember",
                accepting_members: true,
            },
            PartyPrivacy::Friends => PrivacySettings {
                party_type: "FriendsOnly",
                invite_restriction: "LeaderOnly",
                only_leader_friends_can_join: true,
                presence_permission: "Leader",
                invite_permission: "Leader",
                accepting_members: false,
            },
            PartyPrivacy::PrivateAllowFriendsOfFriends => PrivacySettings {
                party_type: "Private",
                invite_restriction: "AnyMember",
                only_leader_friends_can_join: false,
                presence_permission: "Noone",
                invite_permission: "AnyMember",
                accepting_members: false,
            },
            PartyPrivacy::Private => PrivacySettings {
                party_type: "Private",
                invite_restriction: "LeaderOnly",
                only_leader_friends_can_join: true,
                presence_permission: "Noone",
                invite_permission: "Leader",
                accepting_members: false,
            },
        }
    }

    #[inline]
    #[must_use]
    pub fn is_private(self) -> bool {
        self.settings().party_type == "Private"
    }

    /// Discoverability and joinability a party must use under this preset.
    #[must_use]
    pub fn access(self) -> (Discoverability, Joinability) {
        if self.is_private() {
            (Discoverability::InvitedOnly, Joinability::InviteAndFormer)
        } else {
            (Discoverability::All, Joinability::Open)
        }
    }

    /// Find the preset matching the given wire fields.
    ///
    /// Fields passed as `None` are not compared, so a settings object that
    /// only carries `partyType` matches the first preset of that type.
    #[must_use]
    pub fn from_settings(
        party_type: &str,
        invite_restriction: Option<&str>,
        only_leader_friends_can_join: Option<bool>,
    ) -> Option<Self> {
        Self::ALL.into_iter().find(|p| {
            let s = p.settings();
            s.party_type == party_type
                && invite_restriction.map_or(true, |r| r == s.invite_restriction)
                && only_leader_friends_can_join
                    .map_or(true, |o| o == s.only_leader_friends_can_join)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_forces_invite_access() {
        assert_eq!(
            PartyPrivacy::Private.access(),
            (Discoverability::InvitedOnly, Joinability::InviteAndFormer)
        );
        assert_eq!(
            PartyPrivacy::PrivateAllowFriendsOfFriends.access(),
            (Discoverability::InvitedOnly, Joinability::InviteAndFormer)
        );
        assert_eq!(
            PartyPrivacy::Friends.access(),
            (Discoverability::All, Joinability::Open)
        );
    }

    #[test]
    fn test_from_settings_exact() {
        for p in PartyPrivacy::ALL {
            let s = p.settings();
            assert_eq!(
                PartyPrivacy::from_settings(
                    s.party_type,
                    Some(s.invite_restriction),
                    Some(s.only_leader_friends_can_join)
                ),
                Some(p)
            );
        }
    }

    #[test]
    fn test_from_settings_partial_takes_first() {
        assert_eq!(
            PartyPrivacy::from_settings("FriendsOnly", None, None),
            Some(PartyPrivacy::FriendsAllowFriendsOfFriends)
        );
        assert_eq!(PartyPrivacy::from_settings("Unknown", None, None), None);
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&Joinability::InviteAndFormer).unwrap(),
            "\"INVITE_AND_FORMER\""
        );
        assert_eq!(Discoverability::parse("INVITED_ONLY"), Some(Discoverability::InvitedOnly));
        assert_eq!(Joinability::parse("nope"), None);
    }
}
