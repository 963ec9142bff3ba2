//! Room access control.

pub mod gate;

pub use gate::AccessGate;
