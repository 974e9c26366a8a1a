//! The session: which party the local user is in and how it moves between
//! parties.

use crate::config::SessionConfig;
use crate::context::PartyContext;
use crate::error::{PartyError, Result};
use crate::events::PartyEvent;
use crate::party::ClientParty;
use crate::reconciler::PartyReconciler;
use crate::template::PartyCommand;
use crate::transport::ChatRoom;
use parking_lot::RwLock;
use party_http::{
    CreatePartyConfig, CreatePartyRequest, JoinPartyRequest, LeavePartyRequest, PartyService,
    RawParty,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

#[derive(Debug)]
struct SessionInner {
    ctx: Arc<PartyContext>,
    party: RwLock<Option<ClientParty>>,
}

/// Entry point of the crate. Owns the current party and serializes party
/// switches through the join lock.
#[derive(Clone, Debug)]
pub struct PartySession {
    inner: Arc<SessionInner>,
}

impl PartySession {
    #[must_use]
    pub fn new(
        config: SessionConfig,
        service: Arc<dyn PartyService>,
        chat: Arc<dyn ChatRoom>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                ctx: PartyContext::new(config, service, chat),
                party: RwLock::new(None),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn ctx(&self) -> &Arc<PartyContext> {
        &self.inner.ctx
    }

    /// The current party, if any.
    #[must_use]
    pub fn party(&self) -> Option<ClientParty> {
        self.inner.party.read().clone()
    }

    fn set_party(&self, party: Option<ClientParty>) {
        *self.inner.party.write() = party;
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PartyEvent> {
        self.ctx().subscribe()
    }

    #[must_use]
    pub fn is_creating_party(&self) -> bool {
        self.ctx().is_creating_party()
    }

    /// A reconciler feeding inbound notifications into this session.
    #[must_use]
    pub fn reconciler(&self) -> PartyReconciler {
        PartyReconciler::new(self.clone())
    }

    /// Leave whatever party the service still has the user in and start a
    /// fresh one.
    pub async fn initialize(&self) -> Result<ClientParty> {
        let ctx = self.ctx();
        let _guard = ctx.join_lock().acquire().await;
        let parties = ctx.service().party_lookup_user(ctx.user_id()).await?;
        for raw in &parties.current {
            tracing::info!("[Session] leaving party {} left over from a previous login", raw.id);
            self.leave_by_id(&raw.id).await?;
        }
        self.create_party_locked().await
    }

    /// Create a new party and make it current.
    pub async fn create_party(&self) -> Result<ClientParty> {
        let _guard = self.ctx().join_lock().acquire().await;
        self.create_party_locked().await
    }

    /// Join `party_id`, leaving the current party. If joining fails after the
    /// old party was left a new party is created and the join error is
    /// returned.
    pub async fn join_party(&self, party_id: &str) -> Result<ClientParty> {
        let ctx = self.ctx();
        let _guard = ctx.join_lock().acquire().await;

        if self.party().is_some_and(|p| p.id() == party_id) {
            return Err(PartyError::party("You are already a member of this party."));
        }
        let raw = match ctx.service().party_lookup(party_id).await {
            Ok(raw) => raw,
            Err(e) if e.is_party_not_found() => {
                return Err(PartyError::NotFound("Party does not exist.".to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let max_size = raw.config.max_size.unwrap_or(u8::MAX);
        if raw.members.len() >= usize::from(max_size) {
            return Err(PartyError::party("Party is full."));
        }

        let party = ClientParty::new(ctx.clone(), &raw);
        if let Some(current) = self.party() {
            current.leave_internal().await?;
            tracing::info!("[Session] left party {}", current.id());
        }
        self.set_party(Some(party.clone()));

        let mut events = ctx.subscribe();
        let member = ctx.member_template();
        let request = JoinPartyRequest::new(ctx.identity(), member.yield_leadership, member.offline_ttl);
        let joined = async {
            ctx.service()
                .party_join_request(party_id, ctx.user_id(), &request)
                .await?;
            ctx.chat().join_room(party_id).await
        }
        .await;

        if let Err(e) = joined {
            tracing::warn!("[Session] joining {} failed: {}; creating a new party", party_id, e);
            self.create_party_locked().await?;
            return Err(e);
        }

        party.me().apply_template().await;
        let timeout = ctx.config().member_state_timeout();
        if !wait_for_self_join(&mut events, party.id(), ctx.user_id(), timeout).await {
            tracing::warn!("[Session] no join confirmation for {} yet", party_id);
        }
        tracing::info!("[Session] joined party {}", party_id);
        Ok(party)
    }

    /// Leave the current party and start a new one.
    pub async fn leave_party(&self) -> Result<ClientParty> {
        let _guard = self.ctx().join_lock().acquire().await;
        if let Some(current) = self.party() {
            current.leave_internal().await?;
            tracing::info!("[Session] left party {}", current.id());
        }
        self.create_party_locked().await
    }

    /// Leave the current party without joining another one.
    pub async fn shutdown(&self) -> Result<()> {
        let _guard = self.ctx().join_lock().acquire().await;
        let current = self.inner.party.write().take();
        if let Some(current) = current {
            current.leave_internal().await?;
            tracing::info!("[Session] left party {}", current.id());
        }
        Ok(())
    }

    /// Create a party while the caller holds the join lock. Keeps trying
    /// until the service confirms the local member.
    pub(crate) async fn create_party_locked(&self) -> Result<ClientParty> {
        let ctx = self.ctx();
        loop {
            let mut events = ctx.subscribe();
            let raw = self.request_party().await?;
            let party = ClientParty::new(ctx.clone(), &raw);
            self.set_party(Some(party.clone()));
            tracing::info!("[Session] created party {}", party.id());

            let room = party.clone();
            tokio::spawn(async move {
                if let Err(e) = room.ctx().chat().join_room(room.id()).await {
                    tracing::warn!("[Session] joining chat room of {} failed: {}", room.id(), e);
                }
            });
            party.me().apply_template().await;

            let timeout = ctx.config().create_confirm_timeout();
            if wait_for_self_join(&mut events, party.id(), ctx.user_id(), timeout).await {
                self.apply_party_template(&party).await?;
                return Ok(party);
            }

            tracing::warn!(
                "[Session] party {} was not confirmed in {:?}; creating another",
                party.id(),
                timeout
            );
            party.leave_internal().await?;
            self.set_party(None);
        }
    }

    async fn request_party(&self) -> Result<RawParty> {
        let ctx = self.ctx();
        let template = ctx.party_template();
        let member = ctx.member_template();
        let request = CreatePartyRequest::new(
            ctx.identity(),
            CreatePartyConfig {
                join_confirmation: template.join_confirmation,
                joinability: template.joinability,
                max_size: template.max_size,
            },
            template.chat_enabled,
            member.yield_leadership,
            member.offline_ttl,
        );
        match ctx.service().party_create(&request).await {
            Ok(raw) => Ok(raw),
            Err(e) if e.is_user_has_party() => {
                let parties = ctx.service().party_lookup_user(ctx.user_id()).await?;
                let Some(stale) = parties.current.first() else {
                    return Err(e.into());
                };
                tracing::warn!("[Session] still in party {}; leaving it first", stale.id);
                self.leave_by_id(&stale.id).await?;
                Ok(ctx.service().party_create(&request).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn leave_by_id(&self, party_id: &str) -> Result<()> {
        let ctx = self.ctx();
        let request = LeavePartyRequest::new(ctx.identity());
        match ctx
            .service()
            .party_leave(party_id, ctx.user_id(), &request)
            .await
        {
            Err(e) if e.is_party_not_found() => Ok(()),
            other => Ok(other?),
        }
    }

    /// Replay the template's privacy and stored commands onto a party the
    /// local user created.
    async fn apply_party_template(&self, party: &ClientParty) -> Result<()> {
        let template = self.ctx().party_template();
        let mut commands = vec![PartyCommand::SetPrivacy {
            privacy: template.privacy,
        }];
        commands.extend(template.commands);
        party.edit(commands).await
    }
}

/// Wait for the local member's join event for `party_id`.
async fn wait_for_self_join(
    events: &mut broadcast::Receiver<PartyEvent>,
    party_id: &str,
    user_id: &str,
    timeout: Duration,
) -> bool {
    let confirmed = async {
        loop {
            match events.recv().await {
                Ok(PartyEvent::MemberJoined(m)) if m.id == user_id && m.party_id == party_id => {
                    return true
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return false,
            }
        }
    };
    tokio::time::timeout(timeout, confirmed)
        .await
        .unwrap_or(false)
}
