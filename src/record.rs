//! Locker identity and persisted record shapes.
//!
//! Two record shapes live in the key-value store:
//!
//! ```text
//! write:<lockerId>  ->  WriteRecord   { contentIv, encryptedContent, keyIv, encryptedContentKey, viewLockerId? }
//! view:<lockerId>   ->  ViewReference { writeRef, keyIv, encryptedContentKey }
//! ```
//!
//! Both serialize as JSON with a `type` discriminator. The discriminator is
//! decoded once into [`StoredRecord`]; nothing downstream inspects raw JSON.
//! Binary fields are standard base64 on the wire and raw bytes in memory.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cipher::Iv;
use crate::error::LockerError;

/// Width of a locker id: hex of a 32-byte SHA-256 digest.
pub const LOCKER_ID_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Locker id
// ---------------------------------------------------------------------------

/// A validated storage identifier: exactly 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LockerId(String);

impl LockerId {
    /// Validate an externally supplied id before it is used as a lookup key.
    pub fn parse(value: &str) -> Result<Self, LockerError> {
        let well_formed = value.len() == LOCKER_ID_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(LockerError::InvalidLockerId);
        }
        Ok(Self(value.to_string()))
    }

    pub(crate) fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    /// The hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for LockerId {
    type Error = LockerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LockerId> for String {
    fn from(id: LockerId) -> Self {
        id.0
    }
}

impl fmt::Display for LockerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Store keys
// ---------------------------------------------------------------------------

/// Which record shape a key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// `write:` prefix, holds a [`WriteRecord`].
    Write,
    /// `view:` prefix, holds a [`ViewReference`].
    View,
}

impl Slot {
    /// The key prefix without the trailing colon.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::View => "view",
        }
    }
}

/// A fully qualified key in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    /// Record shape addressed.
    pub slot: Slot,
    /// Locker the record belongs to.
    pub id: LockerId,
}

impl StoreKey {
    /// `write:<id>`
    pub fn write(id: &LockerId) -> Self {
        Self {
            slot: Slot::Write,
            id: id.clone(),
        }
    }

    /// `view:<id>`
    pub fn view(id: &LockerId) -> Self {
        Self {
            slot: Slot::View,
            id: id.clone(),
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.slot.prefix(), self.id)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// The authoritative record for a locker, stored under the write id.
///
/// `encrypted_content_key` unwraps, under the write user key, to the content
/// key that decrypts `encrypted_content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRecord {
    /// IV for `encrypted_content`.
    #[serde(with = "iv_base64")]
    pub content_iv: Iv,
    /// Content envelope under the content key.
    #[serde(with = "bytes_base64")]
    pub encrypted_content: Vec<u8>,
    /// IV for `encrypted_content_key`.
    #[serde(with = "iv_base64")]
    pub key_iv: Iv,
    /// Content key wrapped under the write user key.
    #[serde(with = "bytes_base64")]
    pub encrypted_content_key: Vec<u8>,
    /// The paired view locker, once one has been issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_locker_id: Option<LockerId>,
}

/// Read-only indirection stored under the view id.
///
/// Holds the same content key as the write record at `write_ref`, wrapped
/// under the view user key. Never holds content itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewReference {
    /// Locker id of the backing write record.
    pub write_ref: LockerId,
    /// IV for `encrypted_content_key`.
    #[serde(with = "iv_base64")]
    pub key_iv: Iv,
    /// Content key wrapped under the view user key.
    #[serde(with = "bytes_base64")]
    pub encrypted_content_key: Vec<u8>,
}

/// Either record shape, as decoded from a stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoredRecord {
    /// A [`WriteRecord`].
    Write(WriteRecord),
    /// A [`ViewReference`].
    View(ViewReference),
}

impl StoredRecord {
    /// The slot this record shape belongs in.
    pub fn slot(&self) -> Slot {
        match self {
            Self::Write(_) => Slot::Write,
            Self::View(_) => Slot::View,
        }
    }

    /// Serialize to the stored string form.
    pub fn encode(&self) -> Result<String, LockerError> {
        serde_json::to_string(self).map_err(|e| LockerError::MalformedRecord(e.to_string()))
    }

    /// Parse a stored string.
    pub fn decode(value: &str) -> Result<Self, LockerError> {
        serde_json::from_str(value).map_err(|e| LockerError::MalformedRecord(e.to_string()))
    }
}

impl WriteRecord {
    /// Decode a value read from a `write:` key.
    ///
    /// A view reference found in a write slot is an invariant violation, not
    /// a masked decode failure.
    pub fn decode(value: &str) -> Result<Self, LockerError> {
        match StoredRecord::decode(value)? {
            StoredRecord::Write(record) => Ok(record),
            StoredRecord::View(_) => Err(LockerError::InvariantViolation(
                "view reference stored under a write key".into(),
            )),
        }
    }

    /// Serialize with the `write` discriminator.
    pub fn encode(&self) -> Result<String, LockerError> {
        StoredRecord::Write(self.clone()).encode()
    }
}

impl ViewReference {
    /// Decode a value read from a `view:` key.
    pub fn decode(value: &str) -> Result<Self, LockerError> {
        match StoredRecord::decode(value)? {
            StoredRecord::View(reference) => Ok(reference),
            StoredRecord::Write(_) => Err(LockerError::InvariantViolation(
                "write record stored under a view key".into(),
            )),
        }
    }

    /// Serialize with the `view` discriminator.
    pub fn encode(&self) -> Result<String, LockerError> {
        StoredRecord::View(self.clone()).encode()
    }
}

// ---------------------------------------------------------------------------
// Base64 field codecs
// ---------------------------------------------------------------------------

mod bytes_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(de::Error::custom)
    }
}

mod iv_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{de, Deserialize, Deserializer, Serializer};

    use crate::cipher::Iv;

    pub fn serialize<S: Serializer>(iv: &Iv, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(iv))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Iv, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = STANDARD.decode(encoded.as_bytes()).map_err(de::Error::custom)?;
        Iv::try_from(bytes.as_slice())
            .map_err(|_| de::Error::invalid_length(bytes.len(), &"a 12-byte iv"))
    }
}
