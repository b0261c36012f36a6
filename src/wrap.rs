//! Content-key wrapping.
//!
//! A locker's content is encrypted once, under its random content key. Each
//! credential that may read it holds its own wrapped copy of that key. A
//! wrap is a plain [`cipher::encrypt`] of the raw key bytes under the
//! credential's user key, with an IV drawn fresh for that wrap alone.

use crate::cipher::{self, Iv, KEY_LEN};
use crate::error::LockerError;
use crate::keys::{ContentKey, DerivedUserKey};

/// A content key encrypted under a user key, with the IV used to do it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKey {
    /// Envelope of the raw content key bytes.
    pub wrapped: Vec<u8>,
    /// IV generated for this wrap.
    pub iv: Iv,
}

/// Wrap `key` under `wrapping_key` with a freshly generated IV.
///
/// Wrapping the same content key for the write and the view credential are
/// two calls, and therefore two independent IVs.
pub fn wrap_key(key: &ContentKey, wrapping_key: &DerivedUserKey) -> Result<WrappedKey, LockerError> {
    let iv = cipher::generate_iv()?;
    let wrapped = cipher::encrypt(wrapping_key.as_bytes(), &iv, key.as_bytes())?;
    Ok(WrappedKey { wrapped, iv })
}

/// Recover a content key wrapped by [`wrap_key`].
///
/// A wrong wrapping key fails with [`LockerError::AuthenticationFailed`]. An
/// authentic envelope that does not hold exactly 32 bytes is
/// [`LockerError::MalformedCiphertext`].
pub fn unwrap_key(
    wrapped: &[u8],
    wrapping_key: &DerivedUserKey,
    iv: &Iv,
) -> Result<ContentKey, LockerError> {
    let mut raw = cipher::decrypt(wrapping_key.as_bytes(), iv, wrapped)?;
    let key = <[u8; KEY_LEN]>::try_from(raw.as_slice())
        .map(ContentKey::from_bytes)
        .map_err(|_| LockerError::MalformedCiphertext);
    zeroize::Zeroize::zeroize(&mut raw);
    key
}
