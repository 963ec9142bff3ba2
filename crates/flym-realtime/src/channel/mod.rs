//! Local room and user membership.

pub mod registry;

pub use registry::{JoinOutcome, LeaveOutcome, Removal, RoomRegistry};
