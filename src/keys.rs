//! From seed to credential.
//!
//! Each phrase's seed yields a storage address ([`LockerId`]) and a
//! [`DerivedUserKey`] that wraps the locker's [`ContentKey`]. Neither key
//! type can be cloned or printed, and both wipe their bytes when dropped.
//!
//! ## Derivation structure
//!
//! ```text
//! DerivedUserKey = HKDF-SHA256(ikm = seed, salt = None, info = USER_KEY_INFO)
//! LockerId       = hex(SHA-256(seed))
//! ```
//!
//! The info label is versioned. Keys derived for locker content can never
//! coincide with keys derived from the same seed for any other purpose.

use ring::{digest, hkdf};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cipher::{self, KEY_LEN};
use crate::error::LockerError;
use crate::mnemonic::Seed;
use crate::record::LockerId;

/// Domain-separation label for the content-encryption user key.
pub const USER_KEY_INFO: &[u8] = b"monokey-file-encryption-v1";

// ---------------------------------------------------------------------------
// Derived user key
// ---------------------------------------------------------------------------

/// The symmetric key a credential uses to wrap and unwrap the content key.
///
/// One seed yields exactly one user key. Not `Clone`; zeroised on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedUserKey {
    bytes: [u8; KEY_LEN],
}

impl DerivedUserKey {
    /// `pub(crate)`: raw bytes never leave the crate.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for DerivedUserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedUserKey(..)")
    }
}

// ---------------------------------------------------------------------------
// Content key
// ---------------------------------------------------------------------------

/// The random key that actually encrypts a locker's content.
///
/// Generated once per write credential, never derived from a phrase. It only
/// exists in memory or wrapped under a [`DerivedUserKey`].
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ContentKey {
    bytes: [u8; KEY_LEN],
}

impl ContentKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ContentKey(..)")
    }
}

/// Generate a fresh content key from the system RNG.
pub fn generate_content_key() -> Result<ContentKey, LockerError> {
    let bytes = cipher::generate_random_key()?;
    Ok(ContentKey::from_bytes(bytes))
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Derive the user key for a seed.
///
/// Pure and deterministic: the same seed always yields the same key.
pub fn derive_user_key(seed: &Seed) -> Result<DerivedUserKey, LockerError> {
    // An empty salt is treated by HKDF as a zero-filled salt of the hash
    // output length.
    let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, &[]);
    let prk = salt.extract(seed.as_bytes());

    let info = [USER_KEY_INFO];
    let okm = prk
        .expand(&info, hkdf::HKDF_SHA256)
        .map_err(|_| LockerError::KeyDerivationFailure)?;

    let mut bytes = [0u8; KEY_LEN];
    okm.fill(&mut bytes)
        .map_err(|_| LockerError::KeyDerivationFailure)?;

    Ok(DerivedUserKey { bytes })
}

/// Derive the storage identifier for a seed: lowercase hex of SHA-256.
pub fn derive_locker_id(seed: &Seed) -> LockerId {
    let hash = digest::digest(&digest::SHA256, seed.as_bytes());
    LockerId::from_digest(hash.as_ref())
}
