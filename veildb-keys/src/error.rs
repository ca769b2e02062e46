//! Error types for key management and delegated-key operations

use thiserror::Error;

/// Result type alias using our KeyError
pub type Result<T> = std::result::Result<T, KeyError>;

/// Key-layer error type
///
/// Messages never include key material or plaintext.
#[derive(Error, Debug)]
pub enum KeyError {
    /// KEK client creation or AEAD resolution failed
    #[error("KEK unavailable: {0}")]
    KekUnavailable(String),

    /// Keyset generation failed
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// KEK encryption of a keyset failed
    #[error("Keyset wrap failed: {0}")]
    WrapFailed(String),

    /// KEK decryption of a keyset failed or the blob was tampered with
    #[error("Keyset unwrap failed: {0}")]
    UnwrapFailed(String),

    /// Signing failed
    #[error("Signing failed: {0}")]
    SignFailed(String),

    /// Signature verification failed
    #[error("Signature invalid: {0}")]
    SignatureInvalid(String),

    /// AEAD encryption failed
    #[error("Encrypt failed: {0}")]
    EncryptFailed(String),

    /// AEAD decryption failed, typically associated-data mismatch or
    /// ciphertext tampering
    #[error("Decrypt failed: {0}")]
    DecryptFailed(String),

    /// The keyset bytes could not be parsed or are internally inconsistent
    #[error("Invalid keyset: {0}")]
    InvalidKeyset(String),

    /// The key's capability set does not include the requested operation
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl KeyError {
    /// Create a KEK-unavailable error
    pub fn kek_unavailable(msg: impl Into<String>) -> Self {
        KeyError::KekUnavailable(msg.into())
    }

    /// Create a key-generation error
    pub fn key_generation_failed(msg: impl Into<String>) -> Self {
        KeyError::KeyGenerationFailed(msg.into())
    }

    /// Create a wrap-failed error
    pub fn wrap_failed(msg: impl Into<String>) -> Self {
        KeyError::WrapFailed(msg.into())
    }

    /// Create an unwrap-failed error
    pub fn unwrap_failed(msg: impl Into<String>) -> Self {
        KeyError::UnwrapFailed(msg.into())
    }

    /// Create a sign-failed error
    pub fn sign_failed(msg: impl Into<String>) -> Self {
        KeyError::SignFailed(msg.into())
    }

    /// Create a signature-invalid error
    pub fn signature_invalid(msg: impl Into<String>) -> Self {
        KeyError::SignatureInvalid(msg.into())
    }

    /// Create an encrypt-failed error
    pub fn encrypt_failed(msg: impl Into<String>) -> Self {
        KeyError::EncryptFailed(msg.into())
    }

    /// Create a decrypt-failed error
    pub fn decrypt_failed(msg: impl Into<String>) -> Self {
        KeyError::DecryptFailed(msg.into())
    }

    /// Create an invalid-keyset error
    pub fn invalid_keyset(msg: impl Into<String>) -> Self {
        KeyError::InvalidKeyset(msg.into())
    }

    /// Create an unsupported-operation error
    pub fn unsupported_operation(msg: impl Into<String>) -> Self {
        KeyError::UnsupportedOperation(msg.into())
    }
}
