//! Error types for seedlocker.
//!
//! Every variant is a distinct failure mode of the locker protocol. Messages
//! are intentionally minimal: they signal *what* failed without echoing key
//! material, phrases, or locker contents.

use thiserror::Error;

/// The single error type for all seedlocker operations.
#[derive(Debug, Error)]
pub enum LockerError {
    /// The mnemonic phrase failed word-list or checksum validation.
    #[error("invalid mnemonic phrase")]
    InvalidMnemonic,

    /// The integrity tag did not match. Wrong key, tampered ciphertext, or
    /// an envelope produced under a different IV.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The envelope is too short to hold a tag, or a decoded field has the
    /// wrong length.
    #[error("malformed ciphertext")]
    MalformedCiphertext,

    /// A stored value could not be decoded into a record.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// A locker id was not 64 lowercase hex characters.
    #[error("invalid locker id")]
    InvalidLockerId,

    /// The key-value collaborator failed (network, non-2xx, bad response).
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Stored records contradict each other, e.g. a view reference pointing
    /// at a write record that does not exist.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A mutation or save was attempted through a view credential.
    #[error("locker is read-only")]
    ReadOnly,

    /// HKDF expansion failed.
    #[error("key derivation failed")]
    KeyDerivationFailure,

    /// The system's random number generator failed to produce bytes.
    #[error("randomness source failed")]
    RandomnessFailure,

    /// A configuration value was missing or out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LockerError {
    /// Whether the access protocol swallows this error and continues with
    /// empty content.
    ///
    /// These are the outcomes of probing a locker with the wrong key, or of
    /// reading corrupted remote data. Storage and invariant failures are never
    /// masked.
    pub fn is_masked(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed | Self::MalformedCiphertext | Self::MalformedRecord(_)
        )
    }
}

impl From<reqwest::Error> for LockerError {
    fn from(err: reqwest::Error) -> Self {
        // Strip the URL: it embeds the locker id.
        Self::StorageUnavailable(err.without_url().to_string())
    }
}
