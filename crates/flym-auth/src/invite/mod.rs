//! Invite links and guest admission.

pub mod service;
pub mod token;

pub use service::{AcceptedInvite, InvitePreview, InviteService};
pub use token::{InviteClaims, InviteCodec, IssuedInvite};
