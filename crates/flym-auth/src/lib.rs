//! # flym-auth
//!
//! Token-based authentication for Flym chat.
//!
//! ## Modules
//!
//! - `jwt`: signed session tokens: issue, verify, and unverified decode
//! - `password`: Argon2id password hashing
//! - `revocation`: token-id tombstones with TTL bound to token lifetime
//! - `session`: password login, access/refresh pairs per client type,
//!   refresh rotation, logout
//! - `invite`: invite links and guest admission

pub mod invite;
pub mod jwt;
pub mod password;
pub mod revocation;
pub mod session;

pub use invite::{InviteCodec, InviteService};
pub use jwt::{Claims, JwtDecoder, JwtEncoder, TokenSubject, TokenType};
pub use password::PasswordHasher;
pub use revocation::RevocationStore;
pub use session::{ClientType, LoginService, SessionManager, TokenPair};
