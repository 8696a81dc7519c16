use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use bazaar_data::repositories::UserRepository;
use bazaar_data::User;

use crate::error::SecurityError;
use crate::identity::{AuthenticatedUser, IdentityProvider, IssuedToken};

/// Minimum time between JWKS refresh attempts.
const REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

/// Raw JWK as returned by the realm's certs endpoint. Only RSA components
/// are captured; other key types are skipped.
#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: Option<String>,
    kty: String,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

/// Cached RSA components, reconstructed into a `DecodingKey` on demand
/// (`DecodingKey` is not `Clone`-friendly across refreshes).
#[derive(Debug, Clone)]
struct CachedJwk {
    n: String,
    e: String,
}

struct CacheInner {
    keys: HashMap<String, CachedJwk>,
    last_attempt: Option<Instant>,
}

/// JWKS cache keyed by `kid`. A miss triggers a refresh from the realm,
/// rate-limited by [`REFRESH_COOLDOWN`].
struct JwksCache {
    inner: RwLock<CacheInner>,
    certs_url: String,
    client: reqwest::Client,
    refresh_lock: Mutex<()>,
}

impl JwksCache {
    fn new(certs_url: String, client: reqwest::Client) -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                keys: HashMap::new(),
                last_attempt: None,
            }),
            certs_url,
            client,
            refresh_lock: Mutex::new(()),
        }
    }

    async fn get_key(&self, kid: &str) -> Result<DecodingKey, SecurityError> {
        if let Some(cached) = self.inner.read().await.keys.get(kid).cloned() {
            return DecodingKey::from_rsa_components(&cached.n, &cached.e)
                .map_err(|e| SecurityError::InvalidToken(format!("bad jwks key: {e}")));
        }

        self.refresh(kid).await?;

        let inner = self.inner.read().await;
        let cached = inner
            .keys
            .get(kid)
            .ok_or_else(|| SecurityError::InvalidToken(format!("unknown signing key: {kid}")))?;
        DecodingKey::from_rsa_components(&cached.n, &cached.e)
            .map_err(|e| SecurityError::InvalidToken(format!("bad jwks key: {e}")))
    }

    async fn refresh(&self, wanted_kid: &str) -> Result<(), SecurityError> {
        let _guard = self.refresh_lock.lock().await;

        // Another task may have refreshed while we waited for the lock.
        {
            let inner = self.inner.read().await;
            if inner.keys.contains_key(wanted_kid) {
                return Ok(());
            }
            if let Some(last) = inner.last_attempt {
                if last.elapsed() < REFRESH_COOLDOWN {
                    return Ok(());
                }
            }
        }

        debug!(url = %self.certs_url, "refreshing jwks");
        let response: JwksResponse = self
            .client
            .get(&self.certs_url)
            .send()
            .await
            .map_err(|e| SecurityError::ProviderError(format!("jwks fetch: {e}")))?
            .json()
            .await
            .map_err(|e| SecurityError::ProviderError(format!("jwks parse: {e}")))?;

        let mut inner = self.inner.write().await;
        inner.last_attempt = Some(Instant::now());
        inner.keys.clear();
        for jwk in response.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            let (Some(kid), Some(n), Some(e)) = (jwk.kid, jwk.n, jwk.e) else {
                continue;
            };
            inner.keys.insert(kid, CachedJwk { n, e });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct KeycloakClaims {
    sub: String,
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Identity provider federated to a Keycloak realm.
///
/// Tokens are validated against the realm's JWKS; on first sight of a
/// federated user a local row is created so models, permissions, and API
/// keys can reference a local id.
pub struct KeycloakIdentityProvider {
    users: UserRepository,
    jwks: Arc<JwksCache>,
    client: reqwest::Client,
    token_url: String,
    issuer: String,
    client_id: String,
}

impl KeycloakIdentityProvider {
    pub fn new(
        users: UserRepository,
        server_url: &str,
        realm: &str,
        client_id: &str,
    ) -> Result<Self, SecurityError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SecurityError::ProviderError(e.to_string()))?;
        let base = server_url.trim_end_matches('/');
        let issuer = format!("{base}/realms/{realm}");
        Ok(Self {
            users,
            jwks: Arc::new(JwksCache::new(
                format!("{issuer}/protocol/openid-connect/certs"),
                client.clone(),
            )),
            client,
            token_url: format!("{issuer}/protocol/openid-connect/token"),
            issuer,
            client_id: client_id.to_string(),
        })
    }

    /// Find the local row for a federated user, creating it on first sight.
    async fn sync_user(&self, claims: &KeycloakClaims) -> Result<User, SecurityError> {
        let username = claims
            .preferred_username
            .clone()
            .unwrap_or_else(|| claims.sub.clone());
        let email = claims
            .email
            .clone()
            .unwrap_or_else(|| format!("{username}@keycloak.local"));

        if let Some(user) = self
            .users
            .find_by_email(&email)
            .await
            .map_err(|e| SecurityError::ProviderError(e.to_string()))?
        {
            return Ok(user);
        }

        let user = User {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash: None,
            is_admin: false,
            created_at: Utc::now(),
        };
        self.users
            .create(&user)
            .await
            .map_err(|e| SecurityError::ProviderError(e.to_string()))?;
        debug!(username = %user.username, "federated user synced");
        Ok(user)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for KeycloakIdentityProvider {
    async fn login(&self, username: &str, password: &str) -> Result<IssuedToken, SecurityError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "password"),
                ("client_id", self.client_id.as_str()),
                ("username", username),
                ("password", password),
            ])
            .send()
            .await
            .map_err(|e| SecurityError::ProviderError(format!("token endpoint: {e}")))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(SecurityError::InvalidCredentials);
        }
        if !response.status().is_success() {
            return Err(SecurityError::ProviderError(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SecurityError::ProviderError(format!("token parse: {e}")))?;
        Ok(IssuedToken {
            access_token: token.access_token,
            expires_in: token.expires_in,
        })
    }

    async fn signup(&self, _: &str, _: &str, _: &str) -> Result<IssuedToken, SecurityError> {
        Err(SecurityError::ProviderError(
            "accounts are managed by the identity realm".into(),
        ))
    }

    async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, SecurityError> {
        let header = decode_header(token)
            .map_err(|e| SecurityError::InvalidToken(format!("header: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(SecurityError::InvalidToken(format!(
                "disallowed algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| SecurityError::InvalidToken("header missing kid".into()))?;
        let key = self.jwks.get_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_aud = false;
        let data = decode::<KeycloakClaims>(token, &key, &validation).map_err(|e| {
            let err = match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SecurityError::TokenExpired,
                _ => SecurityError::InvalidToken(e.to_string()),
            };
            warn!(error = %err, "federated token rejected");
            err
        })?;

        let user = self.sync_user(&data.claims).await?;
        Ok(AuthenticatedUser {
            id: user.id,
            username: user.username,
            email: user.email,
            is_admin: user.is_admin,
            model_scope: None,
        })
    }
}
