//! Credential protection boundary.
//!
//! Secrets (datasource passwords, login passwords) never leave the process in plaintext. Callers
//! hand them to a [`CredentialProtector`] immediately before the network call that carries them,
//! and the resulting [`ProtectedSecret`] is the only type the request models accept in a password
//! position.
//!
//! The shipped implementation, [`RsaProtector`], encrypts with the backend's RSA public key using
//! PKCS#1 v1.5 padding and base64-encodes the ciphertext. The padding is randomized, so protecting
//! the same plaintext twice yields two different tokens; nothing is cached.

use base64::{Engine as _, engine::general_purpose};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncryptionError {
    /// The key material could not be parsed as an RSA public key
    #[error("Invalid public key: {0}")]
    InvalidKey(String),

    /// The key file could not be read
    #[error("Failed to read public key from {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refusing to protect an empty secret")]
    EmptySecret,

    /// The primitive failed (e.g. secret longer than the key allows)
    #[error("Encryption failed: {0}")]
    Encrypt(String),
}

/// An opaque, transport-safe token produced by a [`CredentialProtector`].
///
/// Serializes as the bare token string. `Debug` output is redacted so tokens do not end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ProtectedSecret(String);

impl ProtectedSecret {
    /// Wrap a token produced by a protector implementation.
    ///
    /// This is the hook for custom [`CredentialProtector`] implementations; application code should
    /// obtain tokens through `protect` rather than calling this with arbitrary text.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ProtectedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProtectedSecret(<redacted>)")
    }
}

impl Serialize for ProtectedSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Capability that turns a plaintext secret into an opaque token.
///
/// Implementations must not cache: each call is independent.
pub trait CredentialProtector: Send + Sync {
    fn protect(&self, plaintext: &str) -> Result<ProtectedSecret, EncryptionError>;
}

/// RSA public-key protector (PKCS#1 v1.5, base64 output).
#[derive(Debug, Clone)]
pub struct RsaProtector {
    key: RsaPublicKey,
}

impl RsaProtector {
    pub fn new(key: RsaPublicKey) -> Self {
        Self { key }
    }

    /// Parse a PEM public key, accepting both SPKI (`BEGIN PUBLIC KEY`) and PKCS#1
    /// (`BEGIN RSA PUBLIC KEY`) encodings.
    pub fn from_pem(pem: &str) -> Result<Self, EncryptionError> {
        let pem = pem.trim();
        let key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|spki_err| RsaPublicKey::from_pkcs1_pem(pem).map_err(|_| EncryptionError::InvalidKey(spki_err.to_string())))?;
        Ok(Self { key })
    }

    pub fn from_pem_file(path: &Path) -> Result<Self, EncryptionError> {
        let pem = std::fs::read_to_string(path).map_err(|source| EncryptionError::KeyFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_pem(&pem)
    }
}

impl CredentialProtector for RsaProtector {
    fn protect(&self, plaintext: &str) -> Result<ProtectedSecret, EncryptionError> {
        if plaintext.is_empty() {
            return Err(EncryptionError::EmptySecret);
        }

        let mut rng = rand::thread_rng();
        let ciphertext = self
            .key
            .encrypt(&mut rng, Pkcs1v15Encrypt, plaintext.as_bytes())
            .map_err(|e| EncryptionError::Encrypt(e.to_string()))?;

        Ok(ProtectedSecret(general_purpose::STANDARD.encode(ciphertext)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::RsaPrivateKey;
    use rsa::pkcs1::EncodeRsaPublicKey;
    use rsa::pkcs8::{EncodePublicKey, LineEnding};
    use std::sync::Arc;

    fn keypair() -> (RsaPrivateKey, RsaPublicKey) {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let public = private.to_public_key();
        (private, public)
    }

    fn decrypt(private: &RsaPrivateKey, token: &ProtectedSecret) -> String {
        let bytes = general_purpose::STANDARD.decode(token.as_str()).unwrap();
        String::from_utf8(private.decrypt(Pkcs1v15Encrypt, &bytes).unwrap()).unwrap()
    }

    #[test]
    fn test_protect_round_trips_with_private_key() {
        let (private, public) = keypair();
        let pem = public.to_public_key_pem(LineEnding::LF).unwrap();
        let protector = RsaProtector::from_pem(&pem).unwrap();

        let token = protector.protect("s3cr3t").unwrap();
        assert_ne!(token.as_str(), "s3cr3t");
        assert_eq!(decrypt(&private, &token), "s3cr3t");
    }

    #[test]
    fn test_each_call_is_independent() {
        let (private, public) = keypair();
        let protector: Arc<dyn CredentialProtector> = Arc::new(RsaProtector::new(public));

        let first = protector.protect("s3cr3t").unwrap();
        let second = protector.protect("s3cr3t").unwrap();

        assert_ne!(first, second, "randomized padding must give a fresh token per call");
        assert_eq!(decrypt(&private, &first), "s3cr3t");
        assert_eq!(decrypt(&private, &second), "s3cr3t");
    }

    #[test]
    fn test_accepts_pkcs1_pem() {
        let (_, public) = keypair();
        let pem = public.to_pkcs1_pem(LineEnding::LF).unwrap();
        assert!(RsaProtector::from_pem(&pem).is_ok());
    }

    #[test]
    fn test_rejects_malformed_key() {
        let err = RsaProtector::from_pem("-----BEGIN PUBLIC KEY-----\nnot a key\n-----END PUBLIC KEY-----").unwrap_err();
        assert!(matches!(err, EncryptionError::InvalidKey(_)));
    }

    #[test]
    fn test_missing_key_file() {
        let err = RsaProtector::from_pem_file(Path::new("/definitely/not/here.pem")).unwrap_err();
        assert!(matches!(err, EncryptionError::KeyFile { .. }));
    }

    #[test]
    fn test_reads_key_file() {
        let (_, public) = keypair();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("public.pem");
        std::fs::write(&path, public.to_public_key_pem(LineEnding::LF).unwrap()).unwrap();

        assert!(RsaProtector::from_pem_file(&path).is_ok());
    }

    #[test]
    fn test_empty_and_oversized_secrets_fail() {
        let (_, public) = keypair();
        let protector = RsaProtector::new(public);

        assert!(matches!(protector.protect(""), Err(EncryptionError::EmptySecret)));

        // 1024-bit key with PKCS#1 v1.5 padding fits at most 117 bytes
        let long = "x".repeat(200);
        assert!(matches!(protector.protect(&long), Err(EncryptionError::Encrypt(_))));
    }

    #[test]
    fn test_debug_is_redacted() {
        let token = ProtectedSecret::from_token("abc123");
        assert_eq!(format!("{token:?}"), "ProtectedSecret(<redacted>)");
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"abc123\"");
    }
}
