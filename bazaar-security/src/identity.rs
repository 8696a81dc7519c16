use serde::Serialize;
use uuid::Uuid;

use crate::error::SecurityError;

/// The resolved caller of a request, as seen by handlers and the permission
/// evaluator.
#[derive(Clone, Debug, Serialize)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    /// Models this credential is restricted to. `None` for full credentials
    /// (passwords, SSO tokens, unscoped API keys); `Some` when the caller
    /// authenticated with an API key scoped to specific models.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_scope: Option<Vec<Uuid>>,
}

impl AuthenticatedUser {
    /// Whether this credential may act on the given model at all.
    pub fn in_scope(&self, model_id: Uuid) -> bool {
        match &self.model_scope {
            None => true,
            Some(scope) => scope.contains(&model_id),
        }
    }

    /// Whether this credential may create new resources. Scoped API keys
    /// cannot: a scope cannot name a model that does not exist yet.
    pub fn can_create(&self) -> bool {
        self.model_scope.is_none()
    }
}

/// A token handed back by login or signup.
#[derive(Clone, Debug, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    /// Seconds until expiry.
    pub expires_in: i64,
}

/// Pluggable identity backend: local accounts or federated SSO.
///
/// Implementations resolve bearer tokens to [`AuthenticatedUser`]s backed by
/// a row in the `users` table, so permissions and ownership always refer to
/// local ids regardless of where authentication happened.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange credentials for a token.
    async fn login(&self, username: &str, password: &str) -> Result<IssuedToken, SecurityError>;

    /// Create an account and return its token. Federated providers reject
    /// this; accounts are managed upstream.
    async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<IssuedToken, SecurityError>;

    /// Validate a bearer token and resolve the user it belongs to.
    async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, SecurityError>;
}
