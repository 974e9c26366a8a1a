//! Events published to session subscribers.

use crate::context::PartyContext;
use crate::error::Result;
use crate::party::{MemberChange, PartyChange, PartyMember};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Something that happened to the current party.
#[derive(Clone, Debug)]
pub enum PartyEvent {
    MemberJoined(PartyMember),
    MemberLeft(PartyMember),
    MemberExpired(PartyMember),
    MemberKicked(PartyMember),
    MemberDisconnected(PartyMember),
    /// `old` is `None` when the previous leader already left.
    MemberPromoted {
        old: Option<PartyMember>,
        new: PartyMember,
    },
    PartyUpdated {
        party_id: String,
    },
    PartyChanged {
        party_id: String,
        change: PartyChange,
    },
    MemberUpdated(PartyMember),
    MemberChanged {
        member: PartyMember,
        change: MemberChange,
    },
    /// Two members traded squad positions.
    TeamSwap {
        member: PartyMember,
        other: PartyMember,
    },
    JoinConfirmation(PartyJoinConfirmation),
    InviteDeclined {
        party_id: String,
        invitee_id: String,
    },
}

impl PartyEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PartyEvent::MemberJoined(_) => "party_member_join",
            PartyEvent::MemberLeft(_) => "party_member_leave",
            PartyEvent::MemberExpired(_) => "party_member_expire",
            PartyEvent::MemberKicked(_) => "party_member_kick",
            PartyEvent::MemberDisconnected(_) => "party_member_disconnect",
            PartyEvent::MemberPromoted { .. } => "party_member_promote",
            PartyEvent::PartyUpdated { .. } => "party_update",
            PartyEvent::PartyChanged { .. } => "party_change",
            PartyEvent::MemberUpdated(_) => "party_member_update",
            PartyEvent::MemberChanged { .. } => "party_member_change",
            PartyEvent::TeamSwap { .. } => "party_member_team_swap",
            PartyEvent::JoinConfirmation(_) => "party_member_confirm",
            PartyEvent::InviteDeclined { .. } => "party_invite_decline",
        }
    }
}

/// A user asking to join a party that requires confirmation.
#[derive(Clone)]
pub struct PartyJoinConfirmation {
    ctx: Arc<PartyContext>,
    pub party_id: String,
    pub user_id: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for PartyJoinConfirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartyJoinConfirmation")
            .field("party_id", &self.party_id)
            .field("user_id", &self.user_id)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl PartialEq for PartyJoinConfirmation {
    fn eq(&self, other: &Self) -> bool {
        self.user_id == other.user_id
    }
}

impl PartyJoinConfirmation {
    pub(crate) fn new(
        ctx: Arc<PartyContext>,
        party_id: String,
        user_id: String,
        created_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            ctx,
            party_id,
            user_id,
            created_at,
        }
    }

    /// Let the user in. Does nothing while the session is switching parties
    /// or once the request is gone.
    pub async fn confirm(&self) -> Result<()> {
        if self.ctx.is_creating_party() {
            return Ok(());
        }
        match self
            .ctx
            .service()
            .party_member_confirm(&self.party_id, &self.user_id)
            .await
        {
            Err(e) if e.is_applicant_not_found() => Ok(()),
            other => Ok(other?),
        }
    }

    pub async fn reject(&self) -> Result<()> {
        if self.ctx.is_creating_party() {
            return Ok(());
        }
        match self
            .ctx
            .service()
            .party_member_reject(&self.party_id, &self.user_id)
            .await
        {
            Err(e) if e.is_applicant_not_found() => Ok(()),
            other => Ok(other?),
        }
    }
}
