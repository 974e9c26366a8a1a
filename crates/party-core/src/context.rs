//! State shared by every party object of one session.

use crate::config::SessionConfig;
use crate::events::PartyEvent;
use crate::lock::LockEvent;
use crate::template::{MemberCommand, MemberTemplate, PartyCommand, PartyTemplate};
use crate::transport::ChatRoom;
use parking_lot::RwLock;
use party_http::{ClientIdentity, PartyService};
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// Services, templates and the join lock, shared between the session, the
/// reconciler and the current party.
pub struct PartyContext {
    config: SessionConfig,
    identity: ClientIdentity,
    service: Arc<dyn PartyService>,
    chat: Arc<dyn ChatRoom>,
    party_template: RwLock<PartyTemplate>,
    member_template: RwLock<MemberTemplate>,
    /// Held while the session creates, joins or leaves a party.
    join_lock: LockEvent,
    events: broadcast::Sender<PartyEvent>,
}

impl std::fmt::Debug for PartyContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartyContext")
            .field("user_id", &self.identity.user_id)
            .field("creating_party", &self.is_creating_party())
            .finish_non_exhaustive()
    }
}

impl PartyContext {
    #[must_use]
    pub fn new(
        config: SessionConfig,
        service: Arc<dyn PartyService>,
        chat: Arc<dyn ChatRoom>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            identity: config.identity(),
            party_template: RwLock::new(config.party.clone()),
            member_template: RwLock::new(config.member.clone()),
            config,
            service,
            chat,
            join_lock: LockEvent::new(),
            events,
        })
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    #[inline]
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }

    #[inline]
    #[must_use]
    pub fn service(&self) -> &Arc<dyn PartyService> {
        &self.service
    }

    #[inline]
    #[must_use]
    pub fn chat(&self) -> &Arc<dyn ChatRoom> {
        &self.chat
    }

    #[must_use]
    pub fn party_template(&self) -> PartyTemplate {
        self.party_template.read().clone()
    }

    #[must_use]
    pub fn member_template(&self) -> MemberTemplate {
        self.member_template.read().clone()
    }

    pub fn keep_party_commands(&self, commands: Vec<PartyCommand>) {
        self.party_template.write().keep(commands);
    }

    pub fn keep_member_commands(&self, commands: Vec<MemberCommand>) {
        self.member_template.write().keep(commands);
    }

    #[inline]
    #[must_use]
    pub fn join_lock(&self) -> &LockEvent {
        &self.join_lock
    }

    /// True while the session is creating, joining or leaving a party.
    #[inline]
    #[must_use]
    pub fn is_creating_party(&self) -> bool {
        self.join_lock.is_locked()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: PartyEvent) {
        tracing::trace!("[PartyEvent] {}", event.name());
        let _ = self.events.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PartyEvent> {
        self.events.subscribe()
    }
}
