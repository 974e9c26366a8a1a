//! party-http: the REST side of the party protocol.
//!
//! Holds the wire types exchanged with the party service, the typed
//! [`HttpError`] carrying the service's machine-readable error codes, the
//! [`PartyService`] trait the synchronization core talks to, and a `reqwest`
//! backed implementation of it.

pub mod client;
pub mod error;
pub mod traits;
pub mod types;

pub use client::{ClientConfig, HttpPartyService, RetryConfig};
pub use error::{codes, HttpError, Result, ServiceError};
pub use traits::PartyService;
pub use types::{
    meta_value_to_string, ClientIdentity, ConfigPatch, CreatePartyConfig, CreatePartyRequest, Discoverability,
    InviteRequest, JoinPartyRequest, Joinability, LeavePartyRequest, MemberMetaPayload, MetaPatch,
    PartyMetaPayload, PartyPrivacy, RawConnection, RawMember, RawParty, RawPartyConfig,
    UserParties,
};
