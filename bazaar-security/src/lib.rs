//! # bazaar-security — Who may do what
//!
//! Three concerns live here, all pluggable behind small seams:
//!
//! - **Identity**: the [`IdentityProvider`] trait (login, signup, token
//!   validation) with a local implementation (argon2 password hashes, HS256
//!   tokens) and a Keycloak-backed one (JWKS-validated RS256 tokens).
//! - **Job auth**: narrow tokens carrying `(model_id, job_kind, expiry)`,
//!   presented by running jobs when they report status or append logs. A job
//!   token grants writes on exactly that model's status and logs, nothing
//!   else.
//! - **Permissions**: a pure evaluator over `(user, model, memberships,
//!   grants)` — no I/O, so every rule is unit-testable.

mod error;
mod extractor;
mod identity;
mod job_token;
mod jwt;
mod keycloak;
mod local;
mod permissions;

pub use error::SecurityError;
pub use extractor::{bearer_token, AuthState, JobAuth, API_KEY_PREFIX, JOB_AUTH_HEADER};
pub use identity::{AuthenticatedUser, IdentityProvider, IssuedToken};
pub use job_token::{JobClaims, JobTokenCodec};
pub use jwt::UserTokenCodec;
pub use keycloak::KeycloakIdentityProvider;
pub use local::LocalIdentityProvider;
pub use permissions::{can_read, can_write, evaluate_permission, PermissionInput};
