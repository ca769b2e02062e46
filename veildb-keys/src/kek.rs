//! KEK resolution: URI → AEAD primitive.
//!
//! Every code path that needs a key-encryption key goes through a
//! [`KeyProvider`] accepted at construction time; there are no
//! process-wide KMS singletons. A KEK URI of the form
//! `aws-kms://<key-arn>` resolves to an AEAD backed by AWS KMS
//! Encrypt/Decrypt; tests use [`InMemoryKeyProvider`].

use crate::error::{KeyError, Result};
use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use async_trait::async_trait;
use aws_sdk_kms::primitives::Blob;
use parking_lot::Mutex;
use rand_core::{OsRng, RngCore};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// URI scheme for AWS KMS keys.
pub const KMS_URI_PREFIX: &str = "aws-kms://";

/// Encryption-context key under which non-empty associated data is bound
/// into KMS calls (KMS has no raw AAD parameter).
const KMS_AAD_CONTEXT_KEY: &str = "veildb:aad";

/// AEAD primitive standing in for a remote key-encryption key.
///
/// Calls may block on network I/O; cancelling the returned future
/// abandons the call.
#[async_trait]
pub trait KekAead: Send + Sync + Debug {
    /// Encrypt `plaintext` under the KEK, binding `associated_data`.
    async fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt `ciphertext`, which must have been produced with the same
    /// associated data.
    async fn decrypt(&self, ciphertext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>>;
}

/// Resolves KEK URIs into AEAD primitives.
pub trait KeyProvider: Send + Sync + Debug {
    /// Resolve `key_uri` into an AEAD handle.
    fn get_aead(&self, key_uri: &str) -> Result<Arc<dyn KekAead>>;
}

// ============================================================================
// AWS KMS
// ============================================================================

/// [`KeyProvider`] backed by AWS KMS.
#[derive(Clone)]
pub struct KmsKeyProvider {
    client: aws_sdk_kms::Client,
    encryption_context: HashMap<String, String>,
}

impl Debug for KmsKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KmsKeyProvider")
            .field("encryption_context", &self.encryption_context)
            .finish()
    }
}

impl KmsKeyProvider {
    /// Create a provider from shared AWS SDK config.
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self::from_client(aws_sdk_kms::Client::new(sdk_config))
    }

    /// Create from a pre-built client (for testing).
    pub fn from_client(client: aws_sdk_kms::Client) -> Self {
        Self {
            client,
            encryption_context: HashMap::new(),
        }
    }

    /// Attach a static encryption context applied to every KMS call.
    pub fn with_encryption_context(mut self, context: HashMap<String, String>) -> Self {
        self.encryption_context = context;
        self
    }
}

impl KeyProvider for KmsKeyProvider {
    fn get_aead(&self, key_uri: &str) -> Result<Arc<dyn KekAead>> {
        let key_id = key_uri.strip_prefix(KMS_URI_PREFIX).ok_or_else(|| {
            KeyError::kek_unavailable(format!(
                "unsupported KEK URI {key_uri:?}, expected {KMS_URI_PREFIX}<key-arn>"
            ))
        })?;
        Ok(Arc::new(KmsAead {
            client: self.client.clone(),
            key_id: key_id.to_string(),
            encryption_context: self.encryption_context.clone(),
        }))
    }
}

struct KmsAead {
    client: aws_sdk_kms::Client,
    key_id: String,
    encryption_context: HashMap<String, String>,
}

impl Debug for KmsAead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KmsAead").field("key_id", &self.key_id).finish()
    }
}

impl KmsAead {
    fn context_for(&self, associated_data: &[u8]) -> HashMap<String, String> {
        let mut context = self.encryption_context.clone();
        if !associated_data.is_empty() {
            use base64::engine::general_purpose::STANDARD as BASE64;
            use base64::Engine as _;
            context.insert(KMS_AAD_CONTEXT_KEY.to_string(), BASE64.encode(associated_data));
        }
        context
    }
}

#[async_trait]
impl KekAead for KmsAead {
    async fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        let response = self
            .client
            .encrypt()
            .key_id(&self.key_id)
            .plaintext(Blob::new(plaintext))
            .set_encryption_context(Some(self.context_for(associated_data)))
            .send()
            .await
            .map_err(|e| KeyError::wrap_failed(format!("KMS Encrypt failed: {e}")))?;

        response
            .ciphertext_blob()
            .map(|blob| blob.as_ref().to_vec())
            .ok_or_else(|| KeyError::wrap_failed("KMS Encrypt returned no ciphertext"))
    }

    async fn decrypt(&self, ciphertext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        let response = self
            .client
            .decrypt()
            .key_id(&self.key_id)
            .ciphertext_blob(Blob::new(ciphertext))
            .set_encryption_context(Some(self.context_for(associated_data)))
            .send()
            .await
            .map_err(|e| KeyError::unwrap_failed(format!("KMS Decrypt failed: {e}")))?;

        response
            .plaintext()
            .map(|blob| blob.as_ref().to_vec())
            .ok_or_else(|| KeyError::unwrap_failed("KMS Decrypt returned no plaintext"))
    }
}

// ============================================================================
// In-memory fake
// ============================================================================

/// In-memory [`KeyProvider`] for tests.
///
/// Generates one random local AES-256-GCM key per distinct URI, so
/// wrap/unwrap round-trips work without any remote service. Keys live
/// only in process memory.
#[derive(Default)]
pub struct InMemoryKeyProvider {
    keys: Mutex<HashMap<String, [u8; 32]>>,
}

impl InMemoryKeyProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Debug for InMemoryKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKeyProvider")
            .field("key_count", &self.keys.lock().len())
            .finish()
    }
}

impl KeyProvider for InMemoryKeyProvider {
    fn get_aead(&self, key_uri: &str) -> Result<Arc<dyn KekAead>> {
        let mut keys = self.keys.lock();
        let key = match keys.get(key_uri) {
            Some(key) => *key,
            None => {
                let mut key = [0u8; 32];
                OsRng.try_fill_bytes(&mut key).map_err(|e| {
                    KeyError::key_generation_failed(format!("OS RNG failure: {e}"))
                })?;
                keys.insert(key_uri.to_string(), key);
                key
            }
        };
        Ok(Arc::new(LocalAead { key: LocalKey(key) }))
    }
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct LocalKey([u8; 32]);

struct LocalAead {
    key: LocalKey,
}

impl Debug for LocalAead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LocalAead(key: [REDACTED])")
    }
}

const NONCE_LEN: usize = 12;

#[async_trait]
impl KekAead for LocalAead {
    async fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(&self.key.0)
            .map_err(|_| KeyError::wrap_failed("bad local KEK length"))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|e| KeyError::wrap_failed(format!("OS RNG failure: {e}")))?;

        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: associated_data,
                },
            )
            .map_err(|_| KeyError::wrap_failed("local KEK encryption failed"))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    async fn decrypt(&self, ciphertext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < NONCE_LEN {
            return Err(KeyError::unwrap_failed("ciphertext shorter than nonce"));
        }
        let cipher = Aes256Gcm::new_from_slice(&self.key.0)
            .map_err(|_| KeyError::unwrap_failed("bad local KEK length"))?;

        let (nonce, body) = ciphertext.split_at(NONCE_LEN);
        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: body,
                    aad: associated_data,
                },
            )
            .map_err(|_| {
                KeyError::unwrap_failed("wrong KEK, associated data mismatch, or tampered blob")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_roundtrip() {
        let provider = InMemoryKeyProvider::new();
        let aead = provider.get_aead("aws-kms://test").unwrap();

        let ciphertext = aead.encrypt(b"keyset bytes", b"").await.unwrap();
        let plaintext = aead.decrypt(&ciphertext, b"").await.unwrap();
        assert_eq!(plaintext, b"keyset bytes");
    }

    #[tokio::test]
    async fn test_same_uri_same_key() {
        let provider = InMemoryKeyProvider::new();
        let a = provider.get_aead("aws-kms://one").unwrap();
        let b = provider.get_aead("aws-kms://one").unwrap();

        let ciphertext = a.encrypt(b"x", b"").await.unwrap();
        assert_eq!(b.decrypt(&ciphertext, b"").await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_distinct_uris_distinct_keys() {
        let provider = InMemoryKeyProvider::new();
        let a = provider.get_aead("aws-kms://one").unwrap();
        let b = provider.get_aead("aws-kms://two").unwrap();

        let ciphertext = a.encrypt(b"x", b"").await.unwrap();
        assert!(b.decrypt(&ciphertext, b"").await.is_err());
    }

    #[tokio::test]
    async fn test_associated_data_is_bound() {
        let provider = InMemoryKeyProvider::new();
        let aead = provider.get_aead("aws-kms://test").unwrap();

        let ciphertext = aead.encrypt(b"x", b"context-a").await.unwrap();
        assert!(aead.decrypt(&ciphertext, b"context-b").await.is_err());
    }

    #[tokio::test]
    async fn test_tampered_blob_rejected() {
        let provider = InMemoryKeyProvider::new();
        let aead = provider.get_aead("aws-kms://test").unwrap();

        let mut ciphertext = aead.encrypt(b"x", b"").await.unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        assert!(aead.decrypt(&ciphertext, b"").await.is_err());
    }
}
