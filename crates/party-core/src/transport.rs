//! The chat side of a party: room membership, messages and presence.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Abstraction over the party chat room and presence channel.
///
/// Each client is in at most one room at a time. The two `wait_for_*`
/// methods return `false` when `timeout` passes without the event.
#[async_trait]
pub trait ChatRoom: Send + Sync + 'static {
    async fn join_room(&self, party_id: &str) -> Result<()>;

    async fn leave_room(&self) -> Result<()>;

    async fn send_message(&self, content: &str) -> Result<()>;

    /// Broadcast a presence status object.
    async fn set_presence(&self, status: &Value) -> Result<()>;

    /// Resolve once the local user has entered the current room.
    async fn wait_for_room_enter(&self, timeout: Duration) -> bool;

    /// Resolve once `user_id` has entered the current room.
    async fn wait_for_member_join(&self, user_id: &str, timeout: Duration) -> bool;

    /// Whether `user_id` is an occupant of the current room.
    fn has_occupant(&self, user_id: &str) -> bool;

    async fn ban(&self, user_id: &str, reason: Option<&str>) -> Result<()>;
}
