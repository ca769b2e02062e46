//! Delegated keys: one capability interface over AEAD, deterministic
//! AEAD, and signing keysets.
//!
//! A [`DelegatedKey`] owns a [`Keyset`] plus the KEK handle it wraps
//! itself under. The capability set follows the primary family:
//!
//! | Primary      | encrypt/decrypt | sign/verify | raw materials |
//! |--------------|-----------------|-------------|---------------|
//! | `AesGcmKey`  | randomized      | no          | allowed       |
//! | `AesSivKey`  | deterministic   | no          | allowed       |
//! | `Ed25519Key` | no              | yes         | refused       |
//!
//! Associated data binds each ciphertext to its context (the attribute
//! name, at the layer above); decryption fails when it differs.
//! Primitives are built lazily and memoized: the first call initializes,
//! subsequent calls are lock-free reads. The AES-SIV cipher takes
//! `&mut self` in the underlying crate and is built per call instead.

use crate::error::{KeyError, Result};
use crate::kek::{KekAead, KeyProvider};
use crate::keyset::{KeyFamily, Keyset};
use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use aes_siv::siv::Aes256Siv;
use aes_siv::KeyInit as _;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use once_cell::sync::OnceCell;
use rand_core::{OsRng, RngCore};
use std::fmt::Debug;
use std::sync::Arc;

const GCM_NONCE_LEN: usize = 12;

/// A keyset with lazily constructed primitives and a KEK to wrap under.
pub struct DelegatedKey {
    keyset: Keyset,
    kek_uri: String,
    kek: Arc<dyn KekAead>,
    gcm: OnceCell<Aes256Gcm>,
    signer: OnceCell<SigningKey>,
}

impl Debug for DelegatedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegatedKey")
            .field("algorithm", &self.algorithm())
            .field("kek_uri", &self.kek_uri)
            .finish()
    }
}

impl DelegatedKey {
    /// Wrap an existing keyset, resolving the KEK through `provider`.
    pub fn new(
        keyset: Keyset,
        kek_uri: impl Into<String>,
        provider: &dyn KeyProvider,
    ) -> Result<Self> {
        let kek_uri = kek_uri.into();
        let kek = provider.get_aead(&kek_uri)?;
        Ok(Self {
            keyset,
            kek_uri,
            kek,
            gcm: OnceCell::new(),
            signer: OnceCell::new(),
        })
    }

    /// Generate a fresh data key (randomized primary plus deterministic
    /// entry).
    pub fn generate_data_key(kek_uri: &str, provider: &dyn KeyProvider) -> Result<Self> {
        Self::new(Keyset::generate_data()?, kek_uri, provider)
    }

    /// Generate a fresh data key whose deterministic entry is copied from
    /// `shared`, so deterministic ciphertexts agree across keys.
    pub fn generate_data_key_with_deterministic(
        kek_uri: &str,
        provider: &dyn KeyProvider,
        shared: &DelegatedKey,
    ) -> Result<Self> {
        Self::new(
            Keyset::generate_data_with_deterministic(&shared.keyset)?,
            kek_uri,
            provider,
        )
    }

    /// Generate a fresh deterministic-AEAD key.
    pub fn generate_deterministic_key(kek_uri: &str, provider: &dyn KeyProvider) -> Result<Self> {
        Self::new(Keyset::generate_deterministic()?, kek_uri, provider)
    }

    /// Generate a fresh signing key.
    pub fn generate_signing_key(kek_uri: &str, provider: &dyn KeyProvider) -> Result<Self> {
        Self::new(Keyset::generate_signing()?, kek_uri, provider)
    }

    /// Name of the algorithm family this key delegates to.
    pub fn algorithm(&self) -> &'static str {
        self.keyset.primary().as_str()
    }

    /// Whether the key may be used with raw cryptographic materials.
    pub fn allowed_for_raw_materials(&self) -> bool {
        self.keyset.primary() != KeyFamily::Ed25519
    }

    // ── AEAD ────────────────────────────────────────────────────────────

    /// Encrypt `plaintext`, binding `associated_data`.
    ///
    /// Randomized for an `AesGcmKey` primary, deterministic for an
    /// `AesSivKey` primary.
    pub fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        match self.keyset.primary() {
            KeyFamily::AesGcm => self.gcm_encrypt(plaintext, associated_data),
            KeyFamily::AesSiv => self.encrypt_deterministic(plaintext, associated_data),
            KeyFamily::Ed25519 => Err(KeyError::unsupported_operation(
                "signing keys do not encrypt",
            )),
        }
    }

    /// Decrypt `ciphertext` produced with identical associated data.
    pub fn decrypt(&self, ciphertext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        match self.keyset.primary() {
            KeyFamily::AesGcm => self.gcm_decrypt(ciphertext, associated_data),
            KeyFamily::AesSiv => self.decrypt_deterministic(ciphertext, associated_data),
            KeyFamily::Ed25519 => Err(KeyError::unsupported_operation(
                "signing keys do not decrypt",
            )),
        }
    }

    /// Deterministic encryption via the keyset's `AesSivKey` entry.
    ///
    /// Identical plaintext and associated data yield identical
    /// ciphertext under the same entry.
    pub fn encrypt_deterministic(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        let mut cipher = self.siv_cipher()?;
        cipher
            .encrypt([associated_data], plaintext)
            .map_err(|_| KeyError::encrypt_failed("AES-SIV encryption failed"))
    }

    /// Inverse of [`encrypt_deterministic`](Self::encrypt_deterministic).
    pub fn decrypt_deterministic(
        &self,
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>> {
        let mut cipher = self.siv_cipher()?;
        cipher.decrypt([associated_data], ciphertext).map_err(|_| {
            KeyError::decrypt_failed("associated data mismatch or tampered ciphertext")
        })
    }

    fn gcm_cipher(&self) -> Result<&Aes256Gcm> {
        self.gcm.get_or_try_init(|| {
            let entry = self.keyset.entry(KeyFamily::AesGcm).ok_or_else(|| {
                KeyError::unsupported_operation("keyset has no randomized AEAD entry")
            })?;
            Aes256Gcm::new_from_slice(entry.material.expose())
                .map_err(|_| KeyError::invalid_keyset("AES-GCM entry has wrong key length"))
        })
    }

    fn siv_cipher(&self) -> Result<Aes256Siv> {
        let entry = self.keyset.entry(KeyFamily::AesSiv).ok_or_else(|| {
            KeyError::unsupported_operation("keyset has no deterministic AEAD entry")
        })?;
        Aes256Siv::new_from_slice(entry.material.expose())
            .map_err(|_| KeyError::invalid_keyset("AES-SIV entry has wrong key length"))
    }

    fn gcm_encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        let cipher = self.gcm_cipher()?;

        let mut nonce_bytes = [0u8; GCM_NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|e| KeyError::encrypt_failed(format!("OS RNG failure: {e}")))?;

        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: associated_data,
                },
            )
            .map_err(|_| KeyError::encrypt_failed("AES-GCM encryption failed"))?;

        let mut out = Vec::with_capacity(GCM_NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn gcm_decrypt(&self, ciphertext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < GCM_NONCE_LEN {
            return Err(KeyError::decrypt_failed("ciphertext shorter than nonce"));
        }
        let cipher = self.gcm_cipher()?;
        let (nonce, body) = ciphertext.split_at(GCM_NONCE_LEN);
        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: body,
                    aad: associated_data,
                },
            )
            .map_err(|_| {
                KeyError::decrypt_failed("associated data mismatch or tampered ciphertext")
            })
    }

    // ── Signing ─────────────────────────────────────────────────────────

    fn signing_key(&self) -> Result<&SigningKey> {
        self.signer.get_or_try_init(|| {
            if self.keyset.primary() != KeyFamily::Ed25519 {
                return Err(KeyError::unsupported_operation(format!(
                    "{} keys do not sign",
                    self.algorithm()
                )));
            }
            let entry = self.keyset.primary_entry()?;
            let seed: [u8; 32] = entry
                .material
                .expose()
                .try_into()
                .map_err(|_| KeyError::invalid_keyset("Ed25519 entry has wrong seed length"))?;
            Ok(SigningKey::from_bytes(&seed))
        })
    }

    /// Sign `data` with the keyset's primary signing key.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(self.signing_key()?.sign(data).to_bytes().to_vec())
    }

    /// Exported verification key: self-contained, no secret material.
    pub fn public_key_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.signing_key()?.verifying_key().to_bytes().to_vec())
    }

    // ── Wrapping ────────────────────────────────────────────────────────

    /// Serialize the keyset under the KEK.
    ///
    /// The returned blob is opaque; byte-identical input is required for
    /// later signature verification and unwrapping.
    pub async fn wrap_keyset(&self) -> Result<Vec<u8>> {
        let plaintext = self.keyset.to_bytes()?;
        self.kek.encrypt(&plaintext, b"").await
    }

    /// Recover a delegated key from a wrapped keyset blob.
    pub async fn unwrap_keyset(
        wrapped: &[u8],
        kek_uri: &str,
        provider: &dyn KeyProvider,
    ) -> Result<Self> {
        let kek = provider.get_aead(kek_uri)?;
        let plaintext = kek.decrypt(wrapped, b"").await?;
        let keyset = Keyset::from_bytes(&plaintext)?;
        Self::new(keyset, kek_uri, provider)
    }
}

/// Verify an Ed25519 signature over `data` with an exported public key.
///
/// # Errors
///
/// Returns `KeyError::SignatureInvalid` if the public key is malformed,
/// the signature is malformed, or verification fails.
pub fn verify_signature(public_key: &[u8], signature: &[u8], data: &[u8]) -> Result<()> {
    let key_bytes: [u8; 32] = public_key
        .try_into()
        .map_err(|_| KeyError::signature_invalid("public key must be 32 bytes"))?;
    let verifying_key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|_| KeyError::signature_invalid("malformed public key"))?;
    let signature = Signature::from_slice(signature)
        .map_err(|_| KeyError::signature_invalid("malformed signature"))?;
    verifying_key
        .verify(data, &signature)
        .map_err(|_| KeyError::signature_invalid("signature does not match data"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kek::InMemoryKeyProvider;

    const KEK_URI: &str = "aws-kms://test-kek";

    fn provider() -> InMemoryKeyProvider {
        InMemoryKeyProvider::new()
    }

    #[test]
    fn test_randomized_roundtrip() {
        let provider = provider();
        let key = DelegatedKey::generate_data_key(KEK_URI, &provider).unwrap();

        let ciphertext = key.encrypt(b"plaintext", b"Email").unwrap();
        assert_eq!(key.decrypt(&ciphertext, b"Email").unwrap(), b"plaintext");
    }

    #[test]
    fn test_randomized_is_randomized() {
        let provider = provider();
        let key = DelegatedKey::generate_data_key(KEK_URI, &provider).unwrap();

        let a = key.encrypt(b"plaintext", b"Email").unwrap();
        let b = key.encrypt(b"plaintext", b"Email").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_associated_data_mismatch_fails() {
        let provider = provider();
        let key = DelegatedKey::generate_data_key(KEK_URI, &provider).unwrap();

        let ciphertext = key.encrypt(b"plaintext", b"Email").unwrap();
        let err = key.decrypt(&ciphertext, b"Name").unwrap_err();
        assert!(matches!(err, KeyError::DecryptFailed(_)));
    }

    #[test]
    fn test_deterministic_is_deterministic() {
        let provider = provider();
        let key = DelegatedKey::generate_data_key(KEK_URI, &provider).unwrap();

        let a = key.encrypt_deterministic(b"plaintext", b"Email").unwrap();
        let b = key.encrypt_deterministic(b"plaintext", b"Email").unwrap();
        assert_eq!(a, b);
        assert_eq!(
            key.decrypt_deterministic(&a, b"Email").unwrap(),
            b"plaintext"
        );
    }

    #[test]
    fn test_deterministic_binds_associated_data() {
        let provider = provider();
        let key = DelegatedKey::generate_data_key(KEK_URI, &provider).unwrap();

        let ciphertext = key.encrypt_deterministic(b"plaintext", b"Email").unwrap();
        assert!(key.decrypt_deterministic(&ciphertext, b"Name").is_err());
    }

    #[test]
    fn test_siv_primary_encrypts_deterministically() {
        let provider = provider();
        let key = DelegatedKey::generate_deterministic_key(KEK_URI, &provider).unwrap();

        assert_eq!(key.algorithm(), "AesSivKey");
        let a = key.encrypt(b"p", b"ad").unwrap();
        let b = key.encrypt(b"p", b"ad").unwrap();
        assert_eq!(a, b);
        assert_eq!(key.decrypt(&a, b"ad").unwrap(), b"p");
    }

    #[tokio::test]
    async fn test_wrap_unwrap_functional_equivalence() {
        let provider = provider();
        let key = DelegatedKey::generate_data_key(KEK_URI, &provider).unwrap();

        let wrapped = key.wrap_keyset().await.unwrap();
        let recovered = DelegatedKey::unwrap_keyset(&wrapped, KEK_URI, &provider)
            .await
            .unwrap();

        // Encryption by one decrypts by the other.
        let ciphertext = key.encrypt(b"plaintext", b"attr").unwrap();
        assert_eq!(recovered.decrypt(&ciphertext, b"attr").unwrap(), b"plaintext");

        let deterministic = key.encrypt_deterministic(b"plaintext", b"attr").unwrap();
        assert_eq!(
            recovered.encrypt_deterministic(b"plaintext", b"attr").unwrap(),
            deterministic
        );
    }

    #[tokio::test]
    async fn test_unwrap_with_wrong_kek_fails() {
        let provider = provider();
        let key = DelegatedKey::generate_data_key(KEK_URI, &provider).unwrap();
        let wrapped = key.wrap_keyset().await.unwrap();

        let err = DelegatedKey::unwrap_keyset(&wrapped, "aws-kms://other-kek", &provider)
            .await
            .unwrap_err();
        assert!(matches!(err, KeyError::UnwrapFailed(_)));
    }

    #[test]
    fn test_sign_and_verify() {
        let provider = provider();
        let key = DelegatedKey::generate_signing_key(KEK_URI, &provider).unwrap();
        assert_eq!(key.algorithm(), "Ed25519Key");

        let signature = key.sign(b"wrapped keyset bytes").unwrap();
        let public = key.public_key_bytes().unwrap();
        verify_signature(&public, &signature, b"wrapped keyset bytes").unwrap();
    }

    #[test]
    fn test_verify_rejects_altered_data() {
        let provider = provider();
        let key = DelegatedKey::generate_signing_key(KEK_URI, &provider).unwrap();

        let signature = key.sign(b"data").unwrap();
        let public = key.public_key_bytes().unwrap();
        let err = verify_signature(&public, &signature, b"DATA").unwrap_err();
        assert!(matches!(err, KeyError::SignatureInvalid(_)));
    }

    #[test]
    fn test_verify_rejects_altered_signature() {
        let provider = provider();
        let key = DelegatedKey::generate_signing_key(KEK_URI, &provider).unwrap();

        let mut signature = key.sign(b"data").unwrap();
        signature[0] ^= 0x01;
        let public = key.public_key_bytes().unwrap();
        assert!(verify_signature(&public, &signature, b"data").is_err());
    }

    #[test]
    fn test_capability_matrix() {
        let provider = provider();

        let data_key = DelegatedKey::generate_data_key(KEK_URI, &provider).unwrap();
        assert!(data_key.allowed_for_raw_materials());
        assert!(matches!(
            data_key.sign(b"x").unwrap_err(),
            KeyError::UnsupportedOperation(_)
        ));

        let signing_key = DelegatedKey::generate_signing_key(KEK_URI, &provider).unwrap();
        assert!(!signing_key.allowed_for_raw_materials());
        assert!(matches!(
            signing_key.encrypt(b"x", b"").unwrap_err(),
            KeyError::UnsupportedOperation(_)
        ));
        assert!(matches!(
            signing_key.decrypt(b"x", b"").unwrap_err(),
            KeyError::UnsupportedOperation(_)
        ));
    }
}
