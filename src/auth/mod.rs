//! # Auth Module
//!
//! User registration, credential checks, session and reset-token lifecycle,
//! and the pluggable strategies a router uses to authenticate requests.

pub mod authority;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod session;
pub mod strategy;
pub mod user;

pub use authority::SessionAuthority;
pub use config::{AuthConfig, AuthType};
pub use crypto::{Argon2Hasher, PasswordHasher, PasswordPolicy};
pub use errors::{AuthError, AuthResult};
pub use session::{SessionConfig, SessionRegistry};
pub use strategy::{
    authorize_request, build_strategy, AuthStrategy, BasicAuth, NoAuth, RequestCredentials,
    SessionAuth, SessionDbAuth, SessionExpAuth,
};
pub use user::{InMemoryUserStore, NewUser, User, UserChanges, UserId, UserStore};
