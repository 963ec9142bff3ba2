//! Rooms, their participants and messages.

pub mod message;
pub mod model;
pub mod participant;

pub use message::{LastMessage, Message};
pub use model::Conversation;
pub use participant::{Participant, ParticipantKind};
