//! Wire types for the party service.

pub mod party;
pub mod patch;
pub mod privacy;
pub mod request;

pub use party::{meta_value_to_string, RawConnection, RawMember, RawParty, RawPartyConfig, UserParties};
pub use patch::{ConfigPatch, MemberMetaPayload, MetaPatch, PartyMetaPayload};
pub use privacy::{Discoverability, Joinability, PartyPrivacy, PrivacySettings};
pub use request::{
    ClientIdentity, ConnectionInfo, CreatePartyConfig, CreatePartyRequest, InviteRequest,
    JoinInfo, JoinPartyRequest, LeavePartyRequest, CONN_TYPE,
};
