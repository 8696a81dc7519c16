//! # bazaar-license — Platform license verification
//!
//! The control plane only admits work while a valid signed license is on
//! disk. A license file is a JSON envelope:
//!
//! ```json
//! {
//!   "license": {
//!     "licensee": "Acme Corp",
//!     "expiry": "2027-01-01T00:00:00Z",
//!     "cpu_mhz_limit": 40000
//!   },
//!   "signature": "<base64 RSA-PKCS1v15 over SHA-256 of the canonical payload>"
//! }
//! ```
//!
//! The canonical payload is `licensee`, RFC 3339 expiry, and the CPU limit
//! joined by newlines — field order is fixed so serialization quirks can
//! never break a signature.
//!
//! [`LicenseVerifier::verify`] re-reads the file on every call, which lets an
//! operator hot-swap an expiring license without restarting the control
//! plane. It is called at startup (must succeed) and before admitting any
//! train or deploy job.

use base64::Engine;
use chrono::{DateTime, Utc};
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Public half of the platform signing key, baked into the binary.
const PLATFORM_PUBLIC_KEY_PEM: &str = "-----BEGIN PUBLIC KEY-----
MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEAlGDgzq8vOvy5akj8Ot5U
mStfj4ZCzxD2k398W3JvxDNvQzGfMe7bebp6XJKfMG4VNHZLG4azl3y94YcZb8FW
zcvUC4zzHqqDoQ5xKFGLWF5vm2t0iAu4KVSpIi8A4Ewej8tvyDN3M8bhEddQEVUj
62vcTizmxUw6mQanN5DUOriE7TIsGXdRWRvEChhQgvL+cndRqokcKfqI0AAeFhjl
RRd9U18Ig12FMhif4o51K31CGpuJHRyAYR17c8x/QruieagNMvX7/HPYi4cAyVIf
Dr9Wxt6QRFZ3nscGJzvNcV0/OCaHxbVbPt4eOTRaaytZYL8xSoeS06GgVJQZX4aI
2wIDAQAB
-----END PUBLIC KEY-----";

/// The signed portion of a license file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LicensePayload {
    pub licensee: String,
    pub expiry: DateTime<Utc>,
    /// Total CPU MHz the cluster may consume across running allocations.
    pub cpu_mhz_limit: u64,
}

impl LicensePayload {
    /// The canonical byte string the signature covers.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        format!(
            "{}\n{}\n{}",
            self.licensee,
            self.expiry.to_rfc3339(),
            self.cpu_mhz_limit
        )
        .into_bytes()
    }
}

/// On-disk license envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LicenseFile {
    pub license: LicensePayload,
    pub signature: String,
}

/// Why license verification failed.
#[derive(Debug)]
pub enum LicenseError {
    /// The license file could not be read.
    Io(String),
    /// The file is not a well-formed license envelope.
    Malformed(String),
    /// The signature does not verify against the platform key.
    InvalidSignature,
    /// The license expiry has passed.
    Expired { expiry: DateTime<Utc> },
    /// The cluster is already using more CPU than the license allows.
    CpuExceeded { limit_mhz: u64, current_mhz: u64 },
}

impl std::fmt::Display for LicenseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LicenseError::Io(msg) => write!(f, "license file unreadable: {msg}"),
            LicenseError::Malformed(msg) => write!(f, "license file malformed: {msg}"),
            LicenseError::InvalidSignature => write!(f, "license signature invalid"),
            LicenseError::Expired { expiry } => {
                write!(f, "license expired at {}", expiry.to_rfc3339())
            }
            LicenseError::CpuExceeded {
                limit_mhz,
                current_mhz,
            } => write!(
                f,
                "cpu limit exceeded: licensed for {limit_mhz} MHz, cluster using {current_mhz} MHz"
            ),
        }
    }
}

impl std::error::Error for LicenseError {}

/// A license that passed signature, expiry, and CPU checks.
#[derive(Clone, Debug)]
pub struct VerifiedLicense {
    pub licensee: String,
    pub expiry: DateTime<Utc>,
    pub cpu_mhz_limit: u64,
}

/// Verifies the on-disk license against the embedded platform key.
#[derive(Clone)]
pub struct LicenseVerifier {
    path: String,
    public_key: RsaPublicKey,
}

impl LicenseVerifier {
    /// Create a verifier reading the license file at `path`, using the
    /// embedded platform public key.
    pub fn new(path: impl Into<String>) -> Result<Self, LicenseError> {
        let public_key = RsaPublicKey::from_public_key_pem(PLATFORM_PUBLIC_KEY_PEM)
            .map_err(|e| LicenseError::Malformed(format!("embedded public key: {e}")))?;
        Ok(Self {
            path: path.into(),
            public_key,
        })
    }

    /// Create a verifier with an explicit public key. Used by tests and by
    /// deployments that rotate the platform key.
    pub fn with_public_key(path: impl Into<String>, public_key: RsaPublicKey) -> Self {
        Self {
            path: path.into(),
            public_key,
        }
    }

    /// Reload the license file and check signature, expiry, and the CPU
    /// ceiling against the cluster's current usage.
    ///
    /// Each error condition is distinct so admission failures surface as the
    /// right `FailedPrecondition` message.
    pub async fn verify(&self, current_cpu_mhz: u64) -> Result<VerifiedLicense, LicenseError> {
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|e| LicenseError::Io(format!("{}: {e}", self.path)))?;
        let file: LicenseFile =
            serde_json::from_slice(&raw).map_err(|e| LicenseError::Malformed(e.to_string()))?;

        let signature = base64::engine::general_purpose::STANDARD
            .decode(&file.signature)
            .map_err(|e| LicenseError::Malformed(format!("signature: {e}")))?;

        let digest = Sha256::digest(file.license.canonical_bytes());
        self.public_key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &signature)
            .map_err(|_| LicenseError::InvalidSignature)?;

        let now = Utc::now();
        if now > file.license.expiry {
            return Err(LicenseError::Expired {
                expiry: file.license.expiry,
            });
        }

        if file.license.cpu_mhz_limit < current_cpu_mhz {
            return Err(LicenseError::CpuExceeded {
                limit_mhz: file.license.cpu_mhz_limit,
                current_mhz: current_cpu_mhz,
            });
        }

        tracing::debug!(
            licensee = %file.license.licensee,
            cpu_limit_mhz = file.license.cpu_mhz_limit,
            current_cpu_mhz,
            "license verified"
        );
        Ok(VerifiedLicense {
            licensee: file.license.licensee,
            expiry: file.license.expiry,
            cpu_mhz_limit: file.license.cpu_mhz_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rsa::RsaPrivateKey;

    fn keypair() -> (RsaPrivateKey, RsaPublicKey) {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public = RsaPublicKey::from(&private);
        (private, public)
    }

    fn signed_license(private: &RsaPrivateKey, payload: &LicensePayload) -> LicenseFile {
        let digest = Sha256::digest(payload.canonical_bytes());
        let signature = private
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .unwrap();
        LicenseFile {
            license: payload.clone(),
            signature: base64::engine::general_purpose::STANDARD.encode(signature),
        }
    }

    async fn write_license(file: &LicenseFile) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("license.json");
        tokio::fs::write(&path, serde_json::to_vec(file).unwrap())
            .await
            .unwrap();
        (dir, path.to_string_lossy().into_owned())
    }

    fn payload(expiry: DateTime<Utc>, cpu_mhz_limit: u64) -> LicensePayload {
        LicensePayload {
            licensee: "Test Corp".into(),
            expiry,
            cpu_mhz_limit,
        }
    }

    #[tokio::test]
    async fn valid_license_verifies() {
        let (private, public) = keypair();
        let file = signed_license(&private, &payload(Utc::now() + Duration::days(30), 10_000));
        let (_dir, path) = write_license(&file).await;

        let verifier = LicenseVerifier::with_public_key(path, public);
        let verified = verifier.verify(4_000).await.unwrap();
        assert_eq!(verified.cpu_mhz_limit, 10_000);
        assert_eq!(verified.licensee, "Test Corp");
    }

    #[tokio::test]
    async fn tampered_payload_fails_signature() {
        let (private, public) = keypair();
        let mut file = signed_license(&private, &payload(Utc::now() + Duration::days(30), 10_000));
        file.license.cpu_mhz_limit = 1_000_000;
        let (_dir, path) = write_license(&file).await;

        let verifier = LicenseVerifier::with_public_key(path, public);
        assert!(matches!(
            verifier.verify(0).await.unwrap_err(),
            LicenseError::InvalidSignature
        ));
    }

    #[tokio::test]
    async fn expired_license_is_rejected() {
        let (private, public) = keypair();
        let file = signed_license(&private, &payload(Utc::now() - Duration::days(1), 10_000));
        let (_dir, path) = write_license(&file).await;

        let verifier = LicenseVerifier::with_public_key(path, public);
        assert!(matches!(
            verifier.verify(0).await.unwrap_err(),
            LicenseError::Expired { .. }
        ));
    }

    #[tokio::test]
    async fn cpu_over_limit_is_rejected() {
        let (private, public) = keypair();
        let file = signed_license(&private, &payload(Utc::now() + Duration::days(30), 1_000));
        let (_dir, path) = write_license(&file).await;

        let verifier = LicenseVerifier::with_public_key(path, public);
        match verifier.verify(1_500).await.unwrap_err() {
            LicenseError::CpuExceeded {
                limit_mhz,
                current_mhz,
            } => {
                assert_eq!(limit_mhz, 1_000);
                assert_eq!(current_mhz, 1_500);
            }
            other => panic!("expected CpuExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let (_private, public) = keypair();
        let verifier = LicenseVerifier::with_public_key("/nonexistent/license.json", public);
        assert!(matches!(
            verifier.verify(0).await.unwrap_err(),
            LicenseError::Io(_)
        ));
    }

    #[tokio::test]
    async fn hot_swapped_license_is_picked_up() {
        let (private, public) = keypair();
        let expired = signed_license(&private, &payload(Utc::now() - Duration::days(1), 10_000));
        let (_dir, path) = write_license(&expired).await;

        let verifier = LicenseVerifier::with_public_key(path.clone(), public);
        assert!(verifier.verify(0).await.is_err());

        // Swap a fresh license in at the same path; no restart required.
        let fresh = signed_license(&private, &payload(Utc::now() + Duration::days(365), 10_000));
        tokio::fs::write(&path, serde_json::to_vec(&fresh).unwrap())
            .await
            .unwrap();
        assert!(verifier.verify(0).await.is_ok());
    }

    #[test]
    fn embedded_platform_key_parses() {
        assert!(RsaPublicKey::from_public_key_pem(PLATFORM_PUBLIC_KEY_PEM).is_ok());
    }
}
