use crate::error::Result;
use crate::types::{
    CreatePartyRequest, InviteRequest, JoinPartyRequest, LeavePartyRequest, MemberMetaPayload,
    PartyMetaPayload, RawParty, UserParties,
};
use async_trait::async_trait;

/// Abstraction over the party service REST surface.
///
/// Failures carry the service's error code, see [`crate::HttpError::code`].
#[async_trait]
pub trait PartyService: Send + Sync + 'static {
    async fn party_lookup(&self, party_id: &str) -> Result<RawParty>;
    async fn party_lookup_user(&self, user_id: &str) -> Result<UserParties>;
    async fn party_create(&self, request: &CreatePartyRequest) -> Result<RawParty>;
    async fn party_join_request(
        &self,
        party_id: &str,
        user_id: &str,
        request: &JoinPartyRequest,
    ) -> Result<()>;
    async fn party_leave(
        &self,
        party_id: &str,
        user_id: &str,
        request: &LeavePartyRequest,
    ) -> Result<()>;
    async fn party_kick_member(&self, party_id: &str, member_id: &str) -> Result<()>;
    async fn party_promote_member(&self, party_id: &str, member_id: &str) -> Result<()>;
    async fn party_member_confirm(&self, party_id: &str, applicant_id: &str) -> Result<()>;
    async fn party_member_reject(&self, party_id: &str, applicant_id: &str) -> Result<()>;
    async fn party_send_invite(
        &self,
        party_id: &str,
        user_id: &str,
        request: &InviteRequest,
    ) -> Result<()>;
    async fn party_update_meta(&self, party_id: &str, payload: &PartyMetaPayload) -> Result<()>;
    async fn party_update_member_meta(
        &self,
        party_id: &str,
        user_id: &str,
        payload: &MemberMetaPayload,
    ) -> Result<()>;
}
