//! The party model: plain state plus the handles that mutate it remotely.

mod client;
mod local;
mod member;
mod state;

pub use client::ClientParty;
pub use local::ClientPartyMember;
pub use member::{
    create_variants, Change, MemberChange, MemberConnection, MemberSnapshot, PartyMember, Role,
};
pub use state::{
    LocalMember, MemberArena, PartyChange, PartyConfig, PartySnapshot, PartyState, PartyUpdate,
};
