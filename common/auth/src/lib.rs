pub mod claims;
pub mod config;
pub mod error;
pub mod identity;
pub mod jwks;
pub mod roles;
pub mod session;
pub mod verifier;

pub use claims::{unverified_tenant_hint, Claims};
pub use config::JwtConfig;
pub use error::{AuthError, AuthResult};
pub use identity::{Identity, IdentityResolver, SESSION_COOKIE_NAME};
pub use jwks::JwksFetcher;
pub use session::{IssuedSession, PgSessionStore, SessionConfig, SessionRecord};
pub use verifier::{InMemoryKeyStore, JwtVerifier, JwtVerifierBuilder};
