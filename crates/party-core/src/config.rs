use crate::error::{PartyError, Result};
use crate::template::{MemberTemplate, PartyTemplate};
use party_http::{ClientConfig, ClientIdentity};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

/// Everything a [`crate::PartySession`] needs to know about the local user
/// and how it behaves in parties.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionConfig {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
    /// Chat address, used as the connection id. Defaults to
    /// `{user_id}@prod.ol.epicgames.com`.
    #[serde(default)]
    pub jid: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "default_build_id")]
    pub build_id: String,
    /// Presence status template. `{party_size}` and `{party_max_size}` are
    /// filled in. `None` disables presence updates.
    #[serde(default = "default_status")]
    pub status: Option<String>,
    /// How long a member join waits for the matching chat room join.
    #[serde(default = "default_member_join_timeout_ms")]
    pub member_join_timeout_ms: u64,
    /// How long a state update for an unknown member waits for its join.
    #[serde(default = "default_member_state_timeout_ms")]
    pub member_state_timeout_ms: u64,
    /// How long a freshly created party waits for the local member join.
    #[serde(default = "default_create_confirm_timeout_ms")]
    pub create_confirm_timeout_ms: u64,
    #[serde(default)]
    pub party: PartyTemplate,
    #[serde(default)]
    pub member: MemberTemplate,
    #[serde(default)]
    pub service: ClientConfig,
}

const DEFAULT_CHAT_DOMAIN: &str = "prod.ol.epicgames.com";

fn default_platform() -> String {
    "WIN".to_string()
}

fn default_build_id() -> String {
    "1:3:".to_string()
}

fn default_status() -> Option<String> {
    Some("Battle Royale Lobby - {party_size} / {party_max_size}".to_string())
}

fn default_member_join_timeout_ms() -> u64 {
    2000
}

fn default_member_state_timeout_ms() -> u64 {
    3000
}

fn default_create_confirm_timeout_ms() -> u64 {
    3000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            display_name: String::new(),
            jid: String::new(),
            platform: default_platform(),
            build_id: default_build_id(),
            status: default_status(),
            member_join_timeout_ms: default_member_join_timeout_ms(),
            member_state_timeout_ms: default_member_state_timeout_ms(),
            create_confirm_timeout_ms: default_create_confirm_timeout_ms(),
            party: PartyTemplate::default(),
            member: MemberTemplate::default(),
            service: ClientConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Load from a JSON file. A missing, empty or unreadable file yields the
    /// defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!("[Session] no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).await.map_err(PartyError::Io)?;

        if content.trim().is_empty() {
            tracing::warn!("Config file is empty, using default config");
            return Ok(Self::default());
        }

        let config: SessionConfig = match serde_json::from_str(&content) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(
                    "Failed to parse config ({}), using default. File may be corrupted.",
                    e
                );
                return Ok(Self::default());
            }
        };

        if config.user_id.is_empty() {
            tracing::warn!("[Session] config has no user_id");
        }

        Ok(config)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    #[must_use]
    pub fn identity(&self) -> ClientIdentity {
        ClientIdentity {
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            jid: if self.jid.is_empty() {
                format!("{}@{}", self.user_id, DEFAULT_CHAT_DOMAIN)
            } else {
                self.jid.clone()
            },
            platform: self.platform.clone(),
            build_id: self.build_id.clone(),
        }
    }

    #[inline]
    #[must_use]
    pub fn member_join_timeout(&self) -> Duration {
        Duration::from_millis(self.member_join_timeout_ms)
    }

    #[inline]
    #[must_use]
    pub fn member_state_timeout(&self) -> Duration {
        Duration::from_millis(self.member_state_timeout_ms)
    }

    #[inline]
    #[must_use]
    pub fn create_confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.create_confirm_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::MemberCommand;
    use party_http::PartyPrivacy;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = SessionConfig::load(dir.path().join("nope.json")).await.unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.member_join_timeout(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_empty_and_corrupt_files_give_defaults() {
        let dir = tempdir().unwrap();
        let empty = dir.path().join("empty.json");
        std::fs::write(&empty, "  \n").unwrap();
        assert_eq!(SessionConfig::load(&empty).await.unwrap(), SessionConfig::default());

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{ not json").unwrap();
        assert_eq!(SessionConfig::load(&corrupt).await.unwrap(), SessionConfig::default());
    }

    #[tokio::test]
    async fn test_partial_file_and_save_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(
            &path,
            r#"{
                "user_id": "u1",
                "display_name": "Alice",
                "status": null,
                "party": {"privacy": "PRIVATE", "max_size": 4},
                "member": {"commands": [{"command": "set_ready", "state": "Ready"}]}
            }"#,
        )
        .unwrap();
        let config = SessionConfig::load(&path).await.unwrap();
        assert_eq!(config.user_id, "u1");
        assert_eq!(config.platform, "WIN");
        assert_eq!(config.status, None);
        assert_eq!(config.party.privacy, PartyPrivacy::Private);
        assert_eq!(config.party.max_size, 4);
        assert!(matches!(
            config.member.commands[0],
            MemberCommand::SetReady { .. }
        ));
        assert_eq!(config.identity().display_name, "Alice");

        let copy = dir.path().join("nested/copy.json");
        config.save(&copy).await.unwrap();
        assert_eq!(SessionConfig::load(&copy).await.unwrap(), config);
    }
}
