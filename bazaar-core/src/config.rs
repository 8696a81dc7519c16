//! Environment-driven configuration for the control plane binary.
//!
//! Every recognized variable is read once at startup by [`AppConfig::from_env`].
//! Missing required keys are collected and reported together so an operator
//! fixes the deployment in one pass instead of one variable at a time.

use std::collections::HashMap;
use std::time::Duration;

/// Errors raised while assembling the configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// One or more required variables are absent.
    Missing(Vec<String>),
    /// A variable is present but unparseable.
    Invalid { key: String, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(keys) => {
                write!(f, "missing required environment variables: {}", keys.join(", "))
            }
            ConfigError::Invalid { key, reason } => {
                write!(f, "invalid value for {key}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Which cluster scheduler the control plane talks to.
#[derive(Clone, Debug)]
pub enum OrchestratorBackend {
    /// Nomad-like HTTP API: jobs are rendered to HCL, parsed and submitted.
    Nomad,
    /// Kubernetes-like API: jobs are rendered to manifests and applied.
    Kubernetes {
        /// Namespace all control-plane jobs live in.
        namespace: String,
    },
}

/// Which identity provider backs login and token validation.
#[derive(Clone, Debug)]
pub enum IdentityBackend {
    /// Local accounts with argon2 password hashes and HS256 tokens.
    Local,
    /// Federated SSO through a Keycloak realm.
    Keycloak {
        server_url: String,
        realm: String,
        client_id: String,
    },
}

/// Cloud credentials passed through to rendered jobs, never interpreted here.
#[derive(Clone, Debug, Default)]
pub struct CloudCredentials {
    pub aws_access_key: Option<String>,
    pub aws_secret_key: Option<String>,
    pub azure_account: Option<String>,
    pub azure_key: Option<String>,
    pub gcp_credentials_json: Option<String>,
}

impl CloudCredentials {
    /// Key/value pairs injected into job environments, in a stable order.
    pub fn as_env(&self) -> Vec<(&'static str, String)> {
        let mut env = Vec::new();
        if let Some(v) = &self.aws_access_key {
            env.push(("AWS_ACCESS_KEY_ID", v.clone()));
        }
        if let Some(v) = &self.aws_secret_key {
            env.push(("AWS_SECRET_ACCESS_KEY", v.clone()));
        }
        if let Some(v) = &self.azure_account {
            env.push(("AZURE_STORAGE_ACCOUNT", v.clone()));
        }
        if let Some(v) = &self.azure_key {
            env.push(("AZURE_STORAGE_KEY", v.clone()));
        }
        if let Some(v) = &self.gcp_credentials_json {
            env.push(("GCP_CREDENTIALS_JSON", v.clone()));
        }
        env
    }
}

/// Image selection for rendered jobs.
#[derive(Clone, Debug)]
pub struct ImageConfig {
    pub registry: String,
    pub tag: String,
    /// Orchestrator driver hint, e.g. `docker` or `raw_exec`.
    pub driver: String,
}

/// Fully resolved control-plane configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Endpoint end users reach, baked into deploy routing rules.
    pub public_endpoint: String,
    /// Endpoint jobs use to call back into the control plane.
    pub private_endpoint: String,
    pub license_path: String,
    pub share_dir: String,
    pub database_uri: String,
    pub admin_username: String,
    pub admin_mail: String,
    pub admin_password: String,
    pub orchestrator_backend: OrchestratorBackend,
    pub orchestrator_endpoint: String,
    pub orchestrator_token: Option<String>,
    pub identity_backend: IdentityBackend,
    /// Secret for user JWTs and job-auth tokens issued by the local provider.
    pub jwt_secret: String,
    pub image: ImageConfig,
    pub cloud: CloudCredentials,
    pub genai_key: Option<String>,
    /// Synchronizer tick interval.
    pub sync_interval: Duration,
    pub listen_addr: String,
}

impl AppConfig {
    /// Assemble the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_map(&vars)
    }

    /// Assemble the configuration from an explicit map. Split out so tests
    /// never mutate process-global state.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let mut required = |key: &str| -> String {
            match vars.get(key) {
                Some(v) if !v.is_empty() => v.clone(),
                _ => {
                    missing.push(key.to_string());
                    String::new()
                }
            }
        };

        let public_endpoint = required("PUBLIC_MODEL_BAZAAR_ENDPOINT");
        let private_endpoint = required("PRIVATE_MODEL_BAZAAR_ENDPOINT");
        let license_path = required("LICENSE_PATH");
        let share_dir = required("SHARE_DIR");
        let database_uri = required("DATABASE_URI");
        let admin_username = required("ADMIN_USERNAME");
        let admin_mail = required("ADMIN_MAIL");
        let admin_password = required("ADMIN_PASSWORD");
        let orchestrator_endpoint = required("ORCHESTRATOR_ENDPOINT");
        let jwt_secret = required("JWT_SECRET");

        let backend_name = vars
            .get("ORCHESTRATOR_BACKEND")
            .map(String::as_str)
            .unwrap_or("nomad");
        let orchestrator_backend = match backend_name {
            "nomad" => OrchestratorBackend::Nomad,
            "kubernetes" => OrchestratorBackend::Kubernetes {
                namespace: vars
                    .get("KUBERNETES_NAMESPACE")
                    .cloned()
                    .unwrap_or_else(|| "model-bazaar".to_string()),
            },
            other => {
                return Err(ConfigError::Invalid {
                    key: "ORCHESTRATOR_BACKEND".into(),
                    reason: format!("expected 'nomad' or 'kubernetes', got '{other}'"),
                })
            }
        };

        let identity_name = vars
            .get("IDENTITY_PROVIDER")
            .map(String::as_str)
            .unwrap_or("local");
        let identity_backend = match identity_name {
            "local" => IdentityBackend::Local,
            "keycloak" => IdentityBackend::Keycloak {
                server_url: required("KEYCLOAK_SERVER_URL"),
                realm: required("KEYCLOAK_REALM"),
                client_id: required("KEYCLOAK_CLIENT_ID"),
            },
            other => {
                return Err(ConfigError::Invalid {
                    key: "IDENTITY_PROVIDER".into(),
                    reason: format!("expected 'local' or 'keycloak', got '{other}'"),
                })
            }
        };

        let sync_interval = match vars.get("SYNC_INTERVAL_SECS") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| ConfigError::Invalid {
                    key: "SYNC_INTERVAL_SECS".into(),
                    reason: format!("expected an integer, got '{raw}'"),
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(5),
        };

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        Ok(AppConfig {
            public_endpoint,
            private_endpoint,
            license_path,
            share_dir,
            database_uri,
            admin_username,
            admin_mail,
            admin_password,
            orchestrator_backend,
            orchestrator_endpoint,
            orchestrator_token: vars.get("ORCHESTRATOR_TOKEN").cloned(),
            identity_backend,
            jwt_secret,
            image: ImageConfig {
                registry: vars
                    .get("DOCKER_REGISTRY")
                    .cloned()
                    .unwrap_or_else(|| "docker.io/modelbazaar".to_string()),
                tag: vars
                    .get("IMAGE_TAG")
                    .cloned()
                    .unwrap_or_else(|| "latest".to_string()),
                driver: vars
                    .get("JOB_DRIVER")
                    .cloned()
                    .unwrap_or_else(|| "docker".to_string()),
            },
            cloud: CloudCredentials {
                aws_access_key: vars.get("AWS_ACCESS_KEY_ID").cloned(),
                aws_secret_key: vars.get("AWS_SECRET_ACCESS_KEY").cloned(),
                azure_account: vars.get("AZURE_STORAGE_ACCOUNT").cloned(),
                azure_key: vars.get("AZURE_STORAGE_KEY").cloned(),
                gcp_credentials_json: vars.get("GCP_CREDENTIALS_JSON").cloned(),
            },
            genai_key: vars.get("GENAI_KEY").cloned(),
            sync_interval,
            listen_addr: vars
                .get("LISTEN_ADDR")
                .cloned()
                .unwrap_or_else(|| "0.0.0.0:8000".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_vars() -> HashMap<String, String> {
        [
            ("PUBLIC_MODEL_BAZAAR_ENDPOINT", "https://bazaar.example.com"),
            ("PRIVATE_MODEL_BAZAAR_ENDPOINT", "http://bazaar.internal:8000"),
            ("LICENSE_PATH", "/etc/bazaar/license.json"),
            ("SHARE_DIR", "/share"),
            ("DATABASE_URI", "postgres://bazaar@db/bazaar"),
            ("ADMIN_USERNAME", "admin"),
            ("ADMIN_MAIL", "admin@example.com"),
            ("ADMIN_PASSWORD", "hunter2"),
            ("ORCHESTRATOR_ENDPOINT", "http://nomad:4646"),
            ("JWT_SECRET", "secret"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn minimal_env_parses_with_defaults() {
        let config = AppConfig::from_map(&minimal_vars()).unwrap();
        assert!(matches!(
            config.orchestrator_backend,
            OrchestratorBackend::Nomad
        ));
        assert!(matches!(config.identity_backend, IdentityBackend::Local));
        assert_eq!(config.sync_interval, Duration::from_secs(5));
        assert_eq!(config.listen_addr, "0.0.0.0:8000");
    }

    #[test]
    fn missing_keys_are_reported_together() {
        let mut vars = minimal_vars();
        vars.remove("LICENSE_PATH");
        vars.remove("DATABASE_URI");
        match AppConfig::from_map(&vars) {
            Err(ConfigError::Missing(keys)) => {
                assert!(keys.contains(&"LICENSE_PATH".to_string()));
                assert!(keys.contains(&"DATABASE_URI".to_string()));
            }
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[test]
    fn kubernetes_backend_reads_namespace() {
        let mut vars = minimal_vars();
        vars.insert("ORCHESTRATOR_BACKEND".into(), "kubernetes".into());
        vars.insert("KUBERNETES_NAMESPACE".into(), "ml-platform".into());
        let config = AppConfig::from_map(&vars).unwrap();
        match config.orchestrator_backend {
            OrchestratorBackend::Kubernetes { namespace } => {
                assert_eq!(namespace, "ml-platform")
            }
            other => panic!("expected kubernetes backend, got {other:?}"),
        }
    }

    #[test]
    fn unknown_backend_is_invalid() {
        let mut vars = minimal_vars();
        vars.insert("ORCHESTRATOR_BACKEND".into(), "mesos".into());
        assert!(matches!(
            AppConfig::from_map(&vars),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
