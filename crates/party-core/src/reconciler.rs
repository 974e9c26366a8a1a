//! Applies inbound party notifications to the session's current party.
//!
//! Every handler first resolves the party the notification is about. Events
//! for any other party are dropped: the party may already have been replaced
//! locally. Events that are not about the local user wait for any create or
//! join in flight before touching state.

use crate::context::PartyContext;
use crate::error::Result;
use crate::events::{PartyEvent, PartyJoinConfirmation};
use crate::meta::{SquadAssignmentRequest, SQUAD_REQUEST};
use crate::notification::{Notification, NotificationKind};
use crate::party::{ClientParty, PartyMember};
use crate::session::PartySession;
use indexmap::IndexMap;
use party_http::meta_value_to_string;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// How often a self event polls for the party it belongs to while a create
/// or join is still installing it.
const SELF_PARTY_POLL: Duration = Duration::from_millis(25);

/// Routes decoded notifications to their handlers.
#[derive(Clone, Debug)]
pub struct PartyReconciler {
    session: PartySession,
}

impl PartyReconciler {
    #[must_use]
    pub fn new(session: PartySession) -> Self {
        Self { session }
    }

    fn ctx(&self) -> &Arc<PartyContext> {
        self.session.ctx()
    }

    /// Feed every notification received on `rx` through [`Self::dispatch`].
    /// The task ends when all senders are dropped.
    pub fn spawn(self, mut rx: mpsc::Receiver<Value>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(raw) = rx.recv().await {
                self.dispatch(raw);
            }
            tracing::debug!("[Reconciler] notification stream closed");
        })
    }

    /// Decode `raw` and handle it on its own task. Types this client does not
    /// handle are ignored.
    pub fn dispatch(&self, raw: Value) {
        match Notification::decode(raw) {
            Ok(Some(notification)) => {
                let this = self.clone();
                tokio::spawn(async move {
                    let kind = notification.kind;
                    if let Err(e) = this.handle(notification).await {
                        tracing::error!("[Reconciler] {} handler failed: {}", kind, e);
                    }
                });
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("[Reconciler] undecodable notification: {}", e),
        }
    }

    /// Handle one notification to completion.
    pub async fn handle(&self, notification: Notification) -> Result<()> {
        tracing::debug!(
            "[Reconciler] {} party={:?} account={:?}",
            notification.kind,
            notification.party_id(),
            notification.account_id()
        );
        match notification.kind {
            NotificationKind::MemberJoined => self.on_member_joined(&notification).await,
            NotificationKind::MemberLeft
            | NotificationKind::MemberExpired
            | NotificationKind::MemberKicked
            | NotificationKind::MemberDisconnected => self.on_member_removed(&notification).await,
            NotificationKind::MemberNewCaptain => self.on_new_captain(&notification).await,
            NotificationKind::PartyUpdated => self.on_party_updated(&notification).await,
            NotificationKind::MemberStateUpdated => self.on_member_state_updated(&notification).await,
            NotificationKind::MemberRequireConfirmation => {
                self.on_require_confirmation(&notification).await
            }
            NotificationKind::InviteDeclined => {
                self.on_invite_declined(&notification);
                Ok(())
            }
        }
    }

    fn is_self(&self, notification: &Notification) -> bool {
        notification.account_id() == Some(self.ctx().user_id())
    }

    /// The current party if `notification` is about it.
    async fn resolve_party(&self, notification: &Notification) -> Option<ClientParty> {
        let party_id = notification.party_id()?;
        if !self.is_self(notification) {
            self.ctx().join_lock().wait().await;
            return self.session.party().filter(|p| p.id() == party_id);
        }

        // The party a create or join is installing may not be current yet.
        let deadline = Instant::now() + self.ctx().config().member_join_timeout();
        loop {
            if let Some(party) = self.session.party().filter(|p| p.id() == party_id) {
                return Some(party);
            }
            if !self.ctx().is_creating_party() || Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(SELF_PARTY_POLL).await;
        }
    }

    async fn refresh_assignments(
        &self,
        party: &ClientParty,
        new_positions: Option<&IndexMap<String, u8>>,
    ) {
        if let Err(e) = party
            .refresh_squad_assignments(None, new_positions, false)
            .await
        {
            tracing::error!("[Reconciler] refreshing squad assignments of {} failed: {}", party.id(), e);
        }
    }

    async fn on_member_joined(&self, notification: &Notification) -> Result<()> {
        let Some(party) = self.resolve_party(notification).await else {
            return Ok(());
        };
        let ctx = self.ctx();
        let raw = notification.member()?;
        let platform = &ctx.identity().platform;
        let is_self = raw.account_id == ctx.user_id();

        let added = party.with_state_mut(|s| {
            if s.members.contains(&raw.account_id) {
                return false;
            }
            let member = PartyMember::from_raw(&s.id, &raw, platform);
            s.add_member(member);
            true
        });
        if added && is_self {
            party.me_gate().set_ready(false);
            party.with_state_mut(|s| s.set_me(&raw, platform, false));
            party.me().apply_template().await;
        }

        party.do_on_member_join_patch();

        let yielding = ctx.member_template().yield_leadership;
        let refresh = party.with_state(|s| s.me_is_leader()) && !yielding;
        let timeout = ctx.config().member_join_timeout();
        let chat = ctx.chat();
        let confirm = async {
            if is_self {
                chat.wait_for_room_enter(timeout).await
            } else {
                chat.has_occupant(&raw.account_id)
                    || chat.wait_for_member_join(&raw.account_id, timeout).await
            }
        };
        let confirmed = if refresh {
            let (confirmed, ()) = tokio::join!(confirm, self.refresh_assignments(&party, None));
            confirmed
        } else {
            confirm.await
        };
        if !confirmed {
            tracing::debug!(
                "[Reconciler] {} joined {} without a chat confirmation",
                raw.account_id,
                party.id()
            );
        }

        if let Some(member) = party.get_member(&raw.account_id) {
            ctx.emit(PartyEvent::MemberJoined(member));
        }
        Ok(())
    }

    async fn on_member_removed(&self, notification: &Notification) -> Result<()> {
        let Some(party) = self.resolve_party(notification).await else {
            return Ok(());
        };
        let Some(user_id) = notification.account_id() else {
            return Ok(());
        };
        let Some(member) = party.with_state_mut(|s| s.remove_member(user_id)) else {
            return Ok(());
        };
        let ctx = self.ctx();
        let is_self = member.id == ctx.user_id();
        tracing::debug!("[Reconciler] {} removed from {} ({})", member.id, party.id(), notification.kind);

        if !is_self {
            if party.with_state(|s| s.me_is_leader()) {
                self.refresh_assignments(&party, None).await;
            }
            if let Err(e) = party.update_presence(None).await {
                tracing::warn!("[Reconciler] presence update after member removal failed: {}", e);
            }
        }

        let kind = notification.kind;
        if is_self && matches!(kind, NotificationKind::MemberExpired | NotificationKind::MemberKicked) {
            if kind == NotificationKind::MemberKicked {
                if let Err(e) = ctx.chat().leave_room().await {
                    tracing::warn!("[Reconciler] leaving chat room of {} failed: {}", party.id(), e);
                }
            }
            party.cancel_emote_timer();
            tracing::info!("[Reconciler] removed from party {} ({}); creating a new one", party.id(), kind);
            self.session.create_party().await?;
        }

        ctx.emit(match kind {
            NotificationKind::MemberExpired => PartyEvent::MemberExpired(member),
            NotificationKind::MemberKicked => PartyEvent::MemberKicked(member),
            NotificationKind::MemberDisconnected => PartyEvent::MemberDisconnected(member),
            _ => PartyEvent::MemberLeft(member),
        });
        Ok(())
    }

    async fn on_new_captain(&self, notification: &Notification) -> Result<()> {
        let Some(party) = self.resolve_party(notification).await else {
            return Ok(());
        };
        let Some(captain_id) = notification.account_id() else {
            return Ok(());
        };
        let promoted = party.with_state_mut(|s| {
            if !s.members.contains(captain_id) {
                return None;
            }
            let old = s.leader().cloned();
            s.update_roles(captain_id);
            s.get_member(captain_id).cloned().map(|new| (old, new))
        });
        let Some((old, new)) = promoted else {
            return Ok(());
        };

        if let Err(e) = party.update_presence(None).await {
            tracing::warn!("[Reconciler] presence update after promotion failed: {}", e);
        }
        self.ctx().emit(PartyEvent::MemberPromoted { old, new });
        Ok(())
    }

    async fn on_party_updated(&self, notification: &Notification) -> Result<()> {
        let Some(party) = self.resolve_party(notification).await else {
            return Ok(());
        };
        let update = notification.party_update();
        let before = party.with_state(|s| s.snapshot());
        if party.apply_update(&update) {
            tracing::debug!("[Reconciler] adopted squad assignments of {}", party.id());
        }
        let after = party.with_state(|s| s.snapshot());

        let ctx = self.ctx();
        let party_id = party.id().to_string();
        ctx.emit(PartyEvent::PartyUpdated {
            party_id: party_id.clone(),
        });
        for change in before.changes(&after) {
            ctx.emit(PartyEvent::PartyChanged {
                party_id: party_id.clone(),
                change,
            });
        }
        if let Err(e) = party.update_presence(None).await {
            tracing::warn!("[Reconciler] presence update after party update failed: {}", e);
        }
        Ok(())
    }

    /// Wait for the join event of `user_id`. `false` on timeout.
    async fn wait_for_join(&self, party: &ClientParty, user_id: &str) -> bool {
        let mut events = self.ctx().subscribe();
        if party.with_state(|s| s.members.contains(user_id)) {
            return true;
        }
        let joined = async {
            loop {
                match events.recv().await {
                    Ok(PartyEvent::MemberJoined(m)) if m.id == user_id => return true,
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => return false,
                }
            }
        };
        tokio::time::timeout(self.ctx().config().member_state_timeout(), joined)
            .await
            .unwrap_or(false)
    }

    async fn on_member_state_updated(&self, notification: &Notification) -> Result<()> {
        let Some(party) = self.resolve_party(notification).await else {
            return Ok(());
        };
        let Some(user_id) = notification.account_id() else {
            return Ok(());
        };
        let ctx = self.ctx();

        if !self.wait_for_join(&party, user_id).await {
            if self.is_self(notification) {
                tracing::warn!(
                    "[Reconciler] never saw the local member join {}; recreating the party",
                    party.id()
                );
                self.session.leave_party().await?;
            } else {
                tracing::debug!("[Reconciler] state update for unknown member {}", user_id);
            }
            return Ok(());
        }

        let body = &notification.body;
        let applied = party.with_state_mut(|s| {
            if user_id == s.local_user_id() {
                if let Some(me) = s.me.as_mut() {
                    me.member.revision = me.member.revision.max(body.revision);
                }
            }
            let member = s.members.get_mut(user_id)?;
            let before = member.snapshot();
            member.apply_state_update(
                body.revision,
                &body.member_state_updated,
                &body.member_state_removed,
            );
            Some((before, member.snapshot()))
        });
        let Some((before, after)) = applied else {
            return Ok(());
        };

        self.apply_swap_request(&party, &body.member_state_updated, user_id)
            .await;

        let Some(member) = party.get_member(user_id) else {
            return Ok(());
        };
        ctx.emit(PartyEvent::MemberUpdated(member.clone()));
        for change in before.changes(&after) {
            ctx.emit(PartyEvent::MemberChanged {
                member: member.clone(),
                change,
            });
        }
        Ok(())
    }

    /// Act on a new squad assignment request carried by a state update.
    /// Leaders only honour requests while team changes are allowed.
    async fn apply_swap_request(
        &self,
        party: &ClientParty,
        updated: &Map<String, Value>,
        user_id: &str,
    ) {
        let Some(request) = squad_request(updated) else {
            return;
        };
        let leader = party.with_state(|s| s.me_is_leader());
        if leader && !self.ctx().party_template().team_change_allowed {
            return;
        }
        let is_new = party.with_state_mut(|s| match s.members.get_mut(user_id) {
            Some(m) if m.assignment_version != request.version => {
                m.assignment_version = request.version;
                true
            }
            _ => false,
        });
        if !is_new {
            return;
        }
        let Some(swap_id) = request.swap_target() else {
            return;
        };
        let Ok(target) = u8::try_from(request.target_absolute_idx) else {
            tracing::debug!("[Reconciler] ignoring swap request of {} without a target", user_id);
            return;
        };

        let mut new_positions = IndexMap::new();
        new_positions.insert(user_id.to_string(), target);
        if let Ok(start) = u8::try_from(request.starting_absolute_idx) {
            new_positions.insert(swap_id.to_string(), start);
        }
        if leader {
            self.refresh_assignments(party, Some(&new_positions)).await;
        }
        if let (Some(member), Some(other)) = (party.get_member(user_id), party.get_member(swap_id)) {
            self.ctx().emit(PartyEvent::TeamSwap { member, other });
        }
    }

    async fn on_require_confirmation(&self, notification: &Notification) -> Result<()> {
        let Some(party) = self.resolve_party(notification).await else {
            return Ok(());
        };
        let Some(user_id) = notification.account_id() else {
            return Ok(());
        };
        let ctx = self.ctx();
        ctx.emit(PartyEvent::JoinConfirmation(PartyJoinConfirmation::new(
            ctx.clone(),
            party.id().to_string(),
            user_id.to_string(),
            notification.body.sent,
        )));
        Ok(())
    }

    fn on_invite_declined(&self, notification: &Notification) {
        let (Some(party_id), Some(invitee_id)) =
            (notification.party_id(), notification.body.invitee_id.as_deref())
        else {
            return;
        };
        self.ctx().emit(PartyEvent::InviteDeclined {
            party_id: party_id.to_string(),
            invitee_id: invitee_id.to_string(),
        });
    }
}

/// The squad assignment request in a raw state update, if it carries one.
fn squad_request(updated: &Map<String, Value>) -> Option<SquadAssignmentRequest> {
    let raw = updated.get(SQUAD_REQUEST)?;
    SquadAssignmentRequest::from_encoded(&meta_value_to_string(raw)).ok()
}
