//! Authenticated symmetric cipher.
//!
//! This module and `keys` are the only places that import `ring` primitives
//! for key material. Everything above them (wrapping, records, the access
//! protocol) encrypts and decrypts exclusively through the functions here.
//!
//! Construction (encrypt-then-MAC):
//! - **Keystream**: block `i` is HKDF-SHA256 with `ikm = key`,
//!   `salt = iv || u32_le(i)`, empty info, 64 bytes of output.
//! - **Combination**: plaintext XOR keystream.
//! - **Tag**: HMAC-SHA256 over the ciphertext, keyed with the same key.
//!
//! # Envelope layout
//! ```text
//! [ ciphertext (len(plaintext)) ][ tag (32 bytes) ]
//! ```
//!
//! The IV travels separately. It must be fresh for every call to
//! [`encrypt`] under the same key; reuse is not detected here.

use ring::rand::{SecureRandom, SystemRandom};
use ring::{hkdf, hmac};
use zeroize::Zeroize;

use crate::error::LockerError;

/// Size of a symmetric key in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Size of an IV in bytes (96 bits).
pub const IV_LEN: usize = 12;

/// Size of the HMAC-SHA256 tag appended to every envelope.
pub const TAG_LEN: usize = 32;

/// Keystream bytes produced per HKDF expansion.
const BLOCK_LEN: usize = 64;

/// An initialisation vector for a single encryption.
pub type Iv = [u8; IV_LEN];

/// Output length marker for a single keystream block.
struct KeystreamBlock;

impl hkdf::KeyType for KeystreamBlock {
    fn len(&self) -> usize {
        BLOCK_LEN
    }
}

fn keystream_block(
    key: &[u8; KEY_LEN],
    iv: &Iv,
    counter: u32,
) -> Result<[u8; BLOCK_LEN], LockerError> {
    let mut salt = [0u8; IV_LEN + 4];
    salt[..IV_LEN].copy_from_slice(iv);
    salt[IV_LEN..].copy_from_slice(&counter.to_le_bytes());

    let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, &salt).extract(key);
    let info: [&[u8]; 0] = [];
    let okm = prk
        .expand(&info, KeystreamBlock)
        .map_err(|_| LockerError::KeyDerivationFailure)?;

    let mut block = [0u8; BLOCK_LEN];
    okm.fill(&mut block)
        .map_err(|_| LockerError::KeyDerivationFailure)?;
    Ok(block)
}

/// XOR `data` in place with the keystream for `(key, iv)`.
fn apply_keystream(key: &[u8; KEY_LEN], iv: &Iv, data: &mut [u8]) -> Result<(), LockerError> {
    for (index, chunk) in data.chunks_mut(BLOCK_LEN).enumerate() {
        let counter = u32::try_from(index).map_err(|_| LockerError::KeyDerivationFailure)?;
        let mut block = keystream_block(key, iv, counter)?;
        for (byte, pad) in chunk.iter_mut().zip(block.iter()) {
            *byte ^= pad;
        }
        block.zeroize();
    }
    Ok(())
}

/// Encrypt `plaintext` under `key` and `iv`.
///
/// Returns the ciphertext with the 32-byte tag appended. A zero-length
/// plaintext yields a tag-only envelope.
pub fn encrypt(key: &[u8; KEY_LEN], iv: &Iv, plaintext: &[u8]) -> Result<Vec<u8>, LockerError> {
    let mut output = Vec::with_capacity(plaintext.len() + TAG_LEN);
    output.extend_from_slice(plaintext);
    apply_keystream(key, iv, &mut output)?;

    let mac_key = hmac::Key::new(hmac::HMAC_SHA256, key);
    let tag = hmac::sign(&mac_key, &output);
    output.extend_from_slice(tag.as_ref());

    Ok(output)
}

/// Decrypt an envelope produced by [`encrypt`].
///
/// The tag is verified in constant time before any keystream is applied. On
/// mismatch the caller receives [`LockerError::AuthenticationFailed`] and no
/// partial plaintext.
pub fn decrypt(key: &[u8; KEY_LEN], iv: &Iv, envelope: &[u8]) -> Result<Vec<u8>, LockerError> {
    if envelope.len() < TAG_LEN {
        return Err(LockerError::MalformedCiphertext);
    }

    let (ciphertext, tag) = envelope.split_at(envelope.len() - TAG_LEN);

    let mac_key = hmac::Key::new(hmac::HMAC_SHA256, key);
    hmac::verify(&mac_key, ciphertext, tag).map_err(|_| LockerError::AuthenticationFailed)?;

    let mut plaintext = ciphertext.to_vec();
    apply_keystream(key, iv, &mut plaintext)?;
    Ok(plaintext)
}

/// Generate a fresh random IV.
///
/// Every encryption and every key wrap draws its own IV from here.
pub fn generate_iv() -> Result<Iv, LockerError> {
    let rng = SystemRandom::new();
    let mut iv = [0u8; IV_LEN];
    rng.fill(&mut iv).map_err(|_| LockerError::RandomnessFailure)?;
    Ok(iv)
}

/// Generate a cryptographically secure random 256-bit key.
pub fn generate_random_key() -> Result<[u8; KEY_LEN], LockerError> {
    let rng = SystemRandom::new();
    let mut key = [0u8; KEY_LEN];
    rng.fill(&mut key).map_err(|_| LockerError::RandomnessFailure)?;
    Ok(key)
}
