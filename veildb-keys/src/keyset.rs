//! Keysets: bundles of raw key material behind the delegated-key layer.
//!
//! A keyset is a primitive-internal bundle of one or more key entries
//! with a designated primary family. It is opaque to everything above the
//! delegated-key layer: callers only ever see the wrapped (KEK-encrypted)
//! byte form produced by [`DelegatedKey::wrap_keyset`].
//!
//! The serialized form is compact JSON with base64 key material. A data
//! keyset bundles a randomized AEAD entry (the primary) with a
//! deterministic AEAD entry, so a single wrapped record serves both
//! attribute-encryption modes.
//!
//! [`DelegatedKey::wrap_keyset`]: crate::DelegatedKey::wrap_keyset

use crate::error::{KeyError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand_core::{OsRng, RngCore};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-256-GCM key length.
pub const AES_GCM_KEY_LEN: usize = 32;

/// AES-256-SIV key length (two AES-256 keys per RFC 5297).
pub const AES_SIV_KEY_LEN: usize = 64;

/// Ed25519 seed length.
pub const ED25519_SEED_LEN: usize = 32;

/// Primitive family of a keyset entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyFamily {
    /// Randomized AEAD (AES-256-GCM)
    #[serde(rename = "AesGcmKey")]
    AesGcm,
    /// Deterministic AEAD (AES-SIV)
    #[serde(rename = "AesSivKey")]
    AesSiv,
    /// Ed25519 signing
    #[serde(rename = "Ed25519Key")]
    Ed25519,
}

impl KeyFamily {
    /// Stable identifier, also used as the `ContentEncryptionAlgorithm`
    /// value in material descriptions.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyFamily::AesGcm => "AesGcmKey",
            KeyFamily::AesSiv => "AesSivKey",
            KeyFamily::Ed25519 => "Ed25519Key",
        }
    }

    fn material_len(&self) -> usize {
        match self {
            KeyFamily::AesGcm => AES_GCM_KEY_LEN,
            KeyFamily::AesSiv => AES_SIV_KEY_LEN,
            KeyFamily::Ed25519 => ED25519_SEED_LEN,
        }
    }
}

/// Secret bytes, zeroized on drop and redacted in `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    /// Wrap raw secret bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Expose the secret for a cryptographic operation. Do not store,
    /// log, or transmit the returned slice.
    pub(crate) fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretBytes([REDACTED])")
    }
}

impl Serialize for SecretBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for SecretBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = BASE64
            .decode(encoded.as_bytes())
            .map_err(|_| D::Error::custom("invalid base64 key material"))?;
        Ok(SecretBytes(bytes))
    }
}

/// One key entry inside a keyset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeysetEntry {
    /// Primitive family of this entry
    pub family: KeyFamily,
    /// Raw key material
    pub material: SecretBytes,
}

impl KeysetEntry {
    fn generate(family: KeyFamily) -> Result<Self> {
        Ok(Self {
            family,
            material: SecretBytes::new(random_bytes(family.material_len())?),
        })
    }
}

/// A bundle of key entries with a designated primary family.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Keyset {
    primary: KeyFamily,
    entries: Vec<KeysetEntry>,
}

impl Keyset {
    /// Fresh data keyset: randomized AEAD primary plus a deterministic
    /// AEAD entry.
    pub fn generate_data() -> Result<Self> {
        Ok(Self {
            primary: KeyFamily::AesGcm,
            entries: vec![
                KeysetEntry::generate(KeyFamily::AesGcm)?,
                KeysetEntry::generate(KeyFamily::AesSiv)?,
            ],
        })
    }

    /// Fresh data keyset that reuses the deterministic entry of `shared`.
    ///
    /// Items encrypted under keysets built from the same shared entry
    /// produce identical deterministic ciphertexts for identical
    /// plaintext and associated data.
    pub fn generate_data_with_deterministic(shared: &Keyset) -> Result<Self> {
        let deterministic = shared.entry(KeyFamily::AesSiv).ok_or_else(|| {
            KeyError::invalid_keyset("shared keyset has no deterministic entry")
        })?;
        Ok(Self {
            primary: KeyFamily::AesGcm,
            entries: vec![
                KeysetEntry::generate(KeyFamily::AesGcm)?,
                deterministic.clone(),
            ],
        })
    }

    /// Fresh deterministic-AEAD keyset.
    pub fn generate_deterministic() -> Result<Self> {
        Ok(Self {
            primary: KeyFamily::AesSiv,
            entries: vec![KeysetEntry::generate(KeyFamily::AesSiv)?],
        })
    }

    /// Fresh signing keyset.
    pub fn generate_signing() -> Result<Self> {
        Ok(Self {
            primary: KeyFamily::Ed25519,
            entries: vec![KeysetEntry::generate(KeyFamily::Ed25519)?],
        })
    }

    /// Primary family of the keyset.
    pub fn primary(&self) -> KeyFamily {
        self.primary
    }

    /// Entry of the given family, if present.
    pub(crate) fn entry(&self, family: KeyFamily) -> Option<&KeysetEntry> {
        self.entries.iter().find(|entry| entry.family == family)
    }

    /// Entry of the primary family.
    pub(crate) fn primary_entry(&self) -> Result<&KeysetEntry> {
        self.entry(self.primary)
            .ok_or_else(|| KeyError::invalid_keyset("keyset has no entry of its primary family"))
    }

    /// Serialize to the plaintext wire form (before KEK wrapping).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| KeyError::invalid_keyset(format!("keyset serialization failed: {e}")))
    }

    /// Parse the plaintext wire form and validate entry lengths.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let keyset: Keyset = serde_json::from_slice(bytes)
            .map_err(|e| KeyError::invalid_keyset(format!("keyset parse failed: {e}")))?;
        keyset.validate()?;
        Ok(keyset)
    }

    fn validate(&self) -> Result<()> {
        self.primary_entry()?;
        for entry in &self.entries {
            if entry.material.expose().len() != entry.family.material_len() {
                return Err(KeyError::invalid_keyset(format!(
                    "{} entry has wrong key length",
                    entry.family.as_str()
                )));
            }
        }
        Ok(())
    }
}

fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| KeyError::key_generation_failed(format!("OS RNG failure: {e}")))?;
    Ok(bytes)
}
