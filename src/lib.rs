//! # seedlocker
//!
//! Text lockers protected by a 12-word recovery phrase, with separate write
//! and view credentials over a single stored record.
//!
//! A phrase is stretched into a seed, and the seed into two values: a locker
//! id (where records live in the remote store) and a user key. Content is
//! encrypted under a random content key, and that key is wrapped once under
//! the write credential's user key and once under the view credential's.
//! Holders of the view phrase can read; only holders of the write phrase can
//! save.
//!
//! ```text
//! phrase -> seed -> { locker id, user key }
//!                          |          |
//!                  write:/view: key   wraps content key -> decrypts content
//! ```
//!
//! ## Public API
//!
//! Most callers need only [`Locker`], [`Session`], and a [`KeyValueStore`]
//! ([`MemoryStore`] in-process, [`HttpStore`] against the locker proxy). The
//! cipher, wrapping, and record modules are public for callers that persist
//! or inspect records themselves.

pub mod cipher;
pub mod config;
pub mod error;
pub mod http;
pub mod keys;
pub mod mnemonic;
pub mod record;
pub mod session;
pub mod store;
pub mod wrap;

pub use config::LockerConfig;
pub use error::LockerError;
pub use http::HttpStore;
pub use mnemonic::{Bip39Scheme, DualMnemonic, MnemonicScheme, WordList};
pub use record::LockerId;
pub use session::{AccessMode, Locker, SaveReport, Session, ViewShare};
pub use store::{KeyValueStore, MemoryStore};

/// Generate a fresh write phrase and view phrase for a new locker.
pub fn generate_dual_mnemonic() -> Result<DualMnemonic, LockerError> {
    Bip39Scheme.generate_dual()
}
