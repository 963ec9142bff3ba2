//! Connection lifecycle: upgrade authentication, per-socket handles, the
//! connection state machine and the heartbeat.

pub mod authenticator;
pub mod handle;
pub mod heartbeat;
pub mod manager;

pub use authenticator::{AuthenticatedPeer, SocketAuthenticator, UpgradeRejection};
pub use handle::{ConnectionHandle, ConnectionId, OutboundFrame};
pub use heartbeat::HeartbeatMonitor;
pub use manager::ConnectionManager;
