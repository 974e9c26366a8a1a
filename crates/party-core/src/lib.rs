//! party-core: client-side party state synchronization.
//!
//! Keeps a local view of a remote party consistent with the party service:
//!
//! - **schema**: string-encoded key/value state with change tracking.
//! - **meta**: typed party and member views over a schema.
//! - **patch**: revision-guarded, edit-batched patch submission.
//! - **squad**: deterministic squad slot assignment.
//! - **reconciler**: applies inbound service notifications to the session.
//! - **session**: create, join and leave, serialized through the join lock.

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod lock;
pub mod memory;
pub mod meta;
pub mod notification;
pub mod party;
pub mod patch;
pub mod reconciler;
pub mod schema;
pub mod session;
pub mod squad;
pub mod template;
pub mod transport;

// Top-level re-exports for common usage
pub use crate::config::SessionConfig;
pub use crate::context::PartyContext;
pub use crate::error::{PartyError, Result};
pub use crate::events::{PartyEvent, PartyJoinConfirmation};
pub use crate::lock::{LockEvent, LockEventGuard};
pub use crate::memory::{MemoryChatRoom, MemoryPartyService, ServiceCall};
pub use crate::meta::{PartyMemberMeta, PartyMeta, ReadyState};
pub use crate::notification::{Notification, NotificationKind};
pub use crate::party::{ClientParty, ClientPartyMember, PartyMember, PartyState, Role};
pub use crate::patch::{PatchGate, PatchRequest, Patchable, MAX_PATCH_KEYS};
pub use crate::reconciler::PartyReconciler;
pub use crate::schema::{Schema, SchemaDiff};
pub use crate::session::PartySession;
pub use crate::squad::{SquadAssignment, SQUAD_SLOTS};
pub use crate::template::{MemberCommand, MemberTemplate, PartyCommand, PartyTemplate};
pub use crate::transport::ChatRoom;

pub use party_http;
