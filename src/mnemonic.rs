//! Mnemonic phrases and seeds.
//!
//! The mnemonic standard itself (BIP-39 word list, checksum, PBKDF2 seed
//! stretching) is an external algorithm. The rest of the crate reaches it
//! only through [`MnemonicScheme`], so the access protocol can be exercised
//! with any scheme that validates phrases and turns them into seeds.

use bip39::{Language, Mnemonic};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::LockerError;

/// Length of a BIP-39 seed in bytes.
pub const SEED_LEN: usize = 64;

/// Word count for generated phrases (128 bits of entropy).
pub const GENERATED_WORD_COUNT: usize = 12;

// ---------------------------------------------------------------------------
// Seed
// ---------------------------------------------------------------------------

/// Raw entropy derived from a phrase and optional passphrase.
///
/// Never persisted. Recomputed from the phrase on every session and zeroised
/// as soon as the locker id and user key have been derived from it.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: [u8; SEED_LEN],
}

impl Seed {
    /// Wrap raw seed bytes produced by a mnemonic scheme.
    pub fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        Self { bytes }
    }

    pub(crate) fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Seed(..)")
    }
}

// ---------------------------------------------------------------------------
// Scheme seam
// ---------------------------------------------------------------------------

/// The external mnemonic collaborator.
pub trait MnemonicScheme: Send + Sync {
    /// Whether the phrase passes word-list and checksum validation.
    fn validate(&self, phrase: &str) -> bool;

    /// Stretch a phrase and passphrase into a seed.
    ///
    /// Fails with [`LockerError::InvalidMnemonic`] if the phrase does not
    /// validate.
    fn to_seed(&self, phrase: &str, passphrase: &str) -> Result<Seed, LockerError>;
}

/// Trim, collapse whitespace runs, and lowercase a typed or scanned phrase.
pub fn normalize_phrase(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// BIP-39 over the English word list.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bip39Scheme;

impl Bip39Scheme {
    fn parse(&self, phrase: &str) -> Result<Mnemonic, LockerError> {
        Mnemonic::parse_in(Language::English, normalize_phrase(phrase))
            .map_err(|_| LockerError::InvalidMnemonic)
    }

    /// Generate a fresh 12-word phrase.
    pub fn generate(&self) -> Result<String, LockerError> {
        let mnemonic = Mnemonic::generate_in(Language::English, GENERATED_WORD_COUNT)
            .map_err(|_| LockerError::RandomnessFailure)?;
        Ok(mnemonic.to_string())
    }

    /// Generate an independent pair of phrases for one locker.
    pub fn generate_dual(&self) -> Result<DualMnemonic, LockerError> {
        Ok(DualMnemonic {
            write: self.generate()?,
            view: self.generate()?,
        })
    }
}

impl MnemonicScheme for Bip39Scheme {
    fn validate(&self, phrase: &str) -> bool {
        self.parse(phrase).is_ok()
    }

    fn to_seed(&self, phrase: &str, passphrase: &str) -> Result<Seed, LockerError> {
        let mnemonic = self.parse(phrase)?;
        Ok(Seed::from_bytes(mnemonic.to_seed(passphrase)))
    }
}

/// A write phrase and a view phrase for the same locker.
///
/// The two are generated independently; neither can be computed from the
/// other.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DualMnemonic {
    /// Grants read and modify access.
    pub write: String,
    /// Grants read-only access. Safe to share.
    pub view: String,
}

impl std::fmt::Debug for DualMnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DualMnemonic(..)")
    }
}

// ---------------------------------------------------------------------------
// Word list
// ---------------------------------------------------------------------------

/// Immutable word-list lookup for phrase entry and autocomplete.
///
/// Owned by the caller and passed where needed. The underlying list is
/// sorted, so both lookups are binary searches.
#[derive(Debug, Clone, Copy)]
pub struct WordList {
    words: &'static [&'static str],
}

impl WordList {
    /// The BIP-39 English list (2048 words).
    pub fn english() -> Self {
        Self {
            words: Language::English.word_list(),
        }
    }

    /// Number of words in the list.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns true if the list has no words.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Whether `word` (case-insensitive) is on the list.
    pub fn contains(&self, word: &str) -> bool {
        let word = word.trim().to_lowercase();
        self.words.binary_search(&word.as_str()).is_ok()
    }

    /// Up to `limit` words starting with `prefix`, in list order.
    pub fn suggest(&self, prefix: &str, limit: usize) -> Vec<&'static str> {
        let prefix = prefix.trim().to_lowercase();
        if prefix.is_empty() {
            return Vec::new();
        }

        let start = self.words.partition_point(|w| *w < prefix.as_str());
        self.words[start..]
            .iter()
            .take_while(|w| w.starts_with(prefix.as_str()))
            .take(limit)
            .copied()
            .collect()
    }
}
