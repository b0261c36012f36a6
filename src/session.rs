//! The access protocol.
//!
//! A [`Locker`] turns phrases into credentials and opens [`Session`]s over a
//! [`KeyValueStore`]. A session is in one of three modes:
//!
//! - [`AccessMode::New`]: write and view phrases supplied, nothing stored
//!   yet. A content key has been generated.
//! - [`AccessMode::Write`]: content is mutable; `save` re-encrypts under the
//!   locker's content key and overwrites the write record.
//! - [`AccessMode::View`]: content was reached through a view reference and
//!   is read-only.
//!
//! Cipher and record-decoding failures while loading are masked: the session
//! continues with empty content, as for a credential that has never been
//! used. Storage failures and invariant violations are returned as errors.

use tracing::{debug, error, warn};
use zeroize::Zeroize;

use crate::cipher;
use crate::error::LockerError;
use crate::keys::{self, ContentKey, DerivedUserKey};
use crate::mnemonic::{Bip39Scheme, MnemonicScheme};
use crate::record::{LockerId, StoreKey, ViewReference, WriteRecord};
use crate::store::KeyValueStore;
use crate::wrap;

/// Which access a session holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Fresh locker with both credentials; first save creates both records.
    New,
    /// Read and modify.
    Write,
    /// Read only.
    View,
}

/// What happened to the view credential during a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewShare {
    /// The session has no view credential.
    NotRequested,
    /// A view reference already existed and was left untouched.
    AlreadyShared,
    /// A view reference was created by this save.
    Created,
    /// The write record was saved but the view reference could not be
    /// created. The locker is valid but not yet shared.
    Failed(String),
}

/// Outcome of a successful [`Session::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    /// View reference outcome.
    pub view: ViewShare,
}

impl SaveReport {
    /// True when content was saved but sharing did not complete.
    pub fn is_partial(&self) -> bool {
        matches!(self.view, ViewShare::Failed(_))
    }
}

/// State of the view reference, checked before the write record is stored.
enum ViewPlan {
    NotRequested,
    Create,
    /// Points back at this locker and unwraps to the current content key.
    Shared,
    /// Exists but belongs to another locker or holds another key.
    Refused(String),
    /// The probe itself failed.
    Unverified(String),
}

/// A locker id and user key derived from one phrase.
struct Credential {
    locker_id: LockerId,
    user_key: DerivedUserKey,
}

impl Credential {
    fn derive(
        scheme: &dyn MnemonicScheme,
        phrase: &str,
        passphrase: &str,
    ) -> Result<Self, LockerError> {
        let seed = scheme.to_seed(phrase, passphrase)?;
        Ok(Self {
            locker_id: keys::derive_locker_id(&seed),
            user_key: keys::derive_user_key(&seed)?,
        })
    }
}

/// Swallow the failures that mean "wrong key or unreadable data".
fn masked<T>(result: Result<T, LockerError>, stage: &'static str) -> Result<Option<T>, LockerError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_masked() => {
            warn!(stage, error = %err, "locker data unreadable, continuing with empty content");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn decrypt_content(key: &ContentKey, record: &WriteRecord) -> Result<String, LockerError> {
    let bytes = cipher::decrypt(key.as_bytes(), &record.content_iv, &record.encrypted_content)?;
    String::from_utf8(bytes).map_err(|_| LockerError::MalformedCiphertext)
}

// ---------------------------------------------------------------------------
// Locker
// ---------------------------------------------------------------------------

/// Entry point: opens sessions against a store.
pub struct Locker<S, M = Bip39Scheme> {
    store: S,
    scheme: M,
    passphrase: String,
}

impl<S: KeyValueStore> Locker<S, Bip39Scheme> {
    /// A locker over `store` using BIP-39 phrases and no passphrase.
    pub fn new(store: S) -> Self {
        Self::with_scheme(store, Bip39Scheme)
    }
}

impl<S: KeyValueStore, M: MnemonicScheme> Locker<S, M> {
    /// A locker with a custom mnemonic scheme.
    pub fn with_scheme(store: S, scheme: M) -> Self {
        Self {
            store,
            scheme,
            passphrase: String::new(),
        }
    }

    /// Use `passphrase` in addition to every phrase when deriving seeds.
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = passphrase.into();
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn credential(&self, phrase: &str) -> Result<Credential, LockerError> {
        Credential::derive(&self.scheme, phrase, &self.passphrase)
    }

    /// Open a locker from a single phrase of unknown kind.
    ///
    /// The phrase is tried as a write credential first, then as a view
    /// credential. If neither record exists it becomes a fresh write locker.
    pub async fn open(&self, phrase: &str) -> Result<Session<'_, S>, LockerError> {
        let credential = self.credential(phrase)?;

        let write_key = StoreKey::write(&credential.locker_id);
        if let Some(value) = self.store.get(&write_key).await? {
            debug!("phrase resolved to a write record");
            let mut session = Session::for_write(&self.store, credential, None);
            session.absorb_write_record(&value)?;
            return Ok(session);
        }

        let view_key = StoreKey::view(&credential.locker_id);
        if let Some(value) = self.store.get(&view_key).await? {
            debug!("phrase resolved to a view reference");
            return Session::for_view(&self.store, credential, &value).await;
        }

        debug!("no record for phrase, starting an empty write locker");
        Ok(Session::for_write(&self.store, credential, None))
    }

    /// Open a locker with a phrase known to be a write credential.
    ///
    /// A phrase with no stored record yields an empty write locker.
    pub async fn open_write(&self, phrase: &str) -> Result<Session<'_, S>, LockerError> {
        let credential = self.credential(phrase)?;
        let stored = self.store.get(&StoreKey::write(&credential.locker_id)).await?;

        let mut session = Session::for_write(&self.store, credential, None);
        if let Some(value) = stored {
            session.absorb_write_record(&value)?;
        }
        Ok(session)
    }

    /// Open a locker with a phrase known to be a view credential.
    ///
    /// Returns `None` if no view reference is stored for the phrase.
    pub async fn open_view(&self, phrase: &str) -> Result<Option<Session<'_, S>>, LockerError> {
        let credential = self.credential(phrase)?;
        match self.store.get(&StoreKey::view(&credential.locker_id)).await? {
            Some(value) => Session::for_view(&self.store, credential, &value).await.map(Some),
            None => Ok(None),
        }
    }

    /// Open a locker with both its write and view phrases.
    ///
    /// If the write record does not exist yet the session is
    /// [`AccessMode::New`]. Otherwise it is a write session that will issue
    /// the view reference on its next save if one is missing.
    pub async fn open_pair(
        &self,
        write_phrase: &str,
        view_phrase: &str,
    ) -> Result<Session<'_, S>, LockerError> {
        let write = self.credential(write_phrase)?;
        let view = self.credential(view_phrase)?;
        if write.locker_id == view.locker_id {
            // Identical phrases would give view holders write access.
            return Err(LockerError::InvalidMnemonic);
        }

        match self.store.get(&StoreKey::write(&write.locker_id)).await? {
            Some(value) => {
                debug!("write record exists, opening with view credential attached");
                let mut session = Session::for_write(&self.store, write, Some(view));
                session.absorb_write_record(&value)?;
                if session.content_key.is_none() {
                    session.recover_through_view(&value).await?;
                }
                Ok(session)
            }
            None => {
                debug!("new locker pair");
                let mut session = Session::for_write(&self.store, write, Some(view));
                session.mode = AccessMode::New;
                session.content_key = Some(keys::generate_content_key()?);
                Ok(session)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// An open locker. Holds at most one content key in memory.
pub struct Session<'a, S> {
    store: &'a S,
    mode: AccessMode,
    content: String,
    content_key: Option<ContentKey>,
    write: Option<Credential>,
    view: Option<Credential>,
    /// View locker recorded in the loaded write record, kept across saves.
    known_view_id: Option<LockerId>,
    /// Backing write locker of a view session.
    write_ref: Option<LockerId>,
}

impl<S> std::fmt::Debug for Session<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode)
            .field("content_len", &self.content.len())
            .field("has_content_key", &self.content_key.is_some())
            .finish()
    }
}

impl<S> Drop for Session<'_, S> {
    fn drop(&mut self) {
        self.content.zeroize();
    }
}

impl<'a, S: KeyValueStore> Session<'a, S> {
    fn for_write(store: &'a S, write: Credential, view: Option<Credential>) -> Self {
        Self {
            store,
            mode: AccessMode::Write,
            content: String::new(),
            content_key: None,
            write: Some(write),
            view,
            known_view_id: None,
            write_ref: None,
        }
    }

    /// Load content from a stored write record into a write session.
    fn absorb_write_record(&mut self, value: &str) -> Result<(), LockerError> {
        let Some(record) = masked(WriteRecord::decode(value), "decode write record")? else {
            return Ok(());
        };
        self.known_view_id = record.view_locker_id.clone();

        let Some(write) = self.write.as_ref() else {
            return Err(LockerError::InvariantViolation(
                "write session without write credential".into(),
            ));
        };
        let unwrapped = wrap::unwrap_key(&record.encrypted_content_key, &write.user_key, &record.key_iv);
        let Some(content_key) = masked(unwrapped, "unwrap content key")? else {
            return Ok(());
        };

        // An unreadable body keeps the key so existing view references stay valid.
        self.content = masked(decrypt_content(&content_key, &record), "decrypt content")?
            .unwrap_or_default();
        self.content_key = Some(content_key);
        Ok(())
    }

    /// Recover the content key through the paired view reference when the
    /// write-side wrap no longer opens.
    async fn recover_through_view(&mut self, write_value: &str) -> Result<(), LockerError> {
        let (Some(view), Some(write)) = (self.view.as_ref(), self.write.as_ref()) else {
            return Ok(());
        };
        let Some(stored) = self.store.get(&StoreKey::view(&view.locker_id)).await? else {
            return Ok(());
        };
        let Some(reference) = masked(ViewReference::decode(&stored), "decode view reference")? else {
            return Ok(());
        };
        if reference.write_ref != write.locker_id {
            return Ok(());
        }

        let unwrapped = wrap::unwrap_key(
            &reference.encrypted_content_key,
            &view.user_key,
            &reference.key_iv,
        );
        let Some(content_key) = masked(unwrapped, "unwrap content key via view")? else {
            return Ok(());
        };
        debug!("content key recovered through view credential");

        if let Some(record) = masked(WriteRecord::decode(write_value), "decode write record")? {
            self.content = masked(decrypt_content(&content_key, &record), "decrypt content")?
                .unwrap_or_default();
        }
        self.content_key = Some(content_key);
        Ok(())
    }

    async fn for_view(store: &'a S, credential: Credential, value: &str) -> Result<Self, LockerError> {
        let mut session = Self {
            store,
            mode: AccessMode::View,
            content: String::new(),
            content_key: None,
            write: None,
            view: Some(credential),
            known_view_id: None,
            write_ref: None,
        };

        let Some(reference) = masked(ViewReference::decode(value), "decode view reference")? else {
            return Ok(session);
        };

        let write_key = StoreKey::write(&reference.write_ref);
        let Some(stored) = store.get(&write_key).await? else {
            error!("view reference points at a missing write record");
            return Err(LockerError::InvariantViolation(
                "view reference points at a missing write record".into(),
            ));
        };
        session.write_ref = Some(reference.write_ref.clone());

        let Some(view) = session.view.as_ref() else {
            return Ok(session);
        };
        let unwrapped = wrap::unwrap_key(
            &reference.encrypted_content_key,
            &view.user_key,
            &reference.key_iv,
        );
        let Some(content_key) = masked(unwrapped, "unwrap content key")? else {
            return Ok(session);
        };
        let Some(record) = masked(WriteRecord::decode(&stored), "decode write record")? else {
            return Ok(session);
        };

        session.content = masked(decrypt_content(&content_key, &record), "decrypt content")?
            .unwrap_or_default();
        session.content_key = Some(content_key);
        Ok(session)
    }

    /// Current access mode.
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Whether the content can be changed.
    pub fn is_read_only(&self) -> bool {
        self.mode == AccessMode::View
    }

    /// The decrypted content. Empty for a fresh or unreadable locker.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Locker id of the write record, if this session knows it.
    pub fn write_locker_id(&self) -> Option<&LockerId> {
        self.write
            .as_ref()
            .map(|c| &c.locker_id)
            .or(self.write_ref.as_ref())
    }

    /// Locker id of the view reference, if this session knows it.
    pub fn view_locker_id(&self) -> Option<&LockerId> {
        self.view
            .as_ref()
            .map(|c| &c.locker_id)
            .or(self.known_view_id.as_ref())
    }

    /// Replace the content. Fails with [`LockerError::ReadOnly`] in view mode.
    pub fn set_content(&mut self, content: impl Into<String>) -> Result<(), LockerError> {
        if self.is_read_only() {
            return Err(LockerError::ReadOnly);
        }
        self.content = content.into();
        Ok(())
    }

    /// Encrypt and persist the content.
    ///
    /// The view reference is checked first, then the write record is
    /// stored, and only once it is stored is a missing view reference
    /// created, so a view credential never points at nothing. The write
    /// record names the view locker only when its reference points back at
    /// this locker under the current content key. A view reference that
    /// could not be created or verified is reported in the [`SaveReport`],
    /// not as an error.
    pub async fn save(&mut self) -> Result<SaveReport, LockerError> {
        if self.is_read_only() {
            return Err(LockerError::ReadOnly);
        }
        let Some(write) = self.write.as_ref() else {
            return Err(LockerError::InvariantViolation(
                "write session without write credential".into(),
            ));
        };

        if self.content_key.is_none() {
            if self.known_view_id.is_some() {
                warn!("replacing unreadable content key, existing view reference will not open new content");
            }
            debug!("generating content key");
            self.content_key = Some(keys::generate_content_key()?);
        }

        let plan = match self.plan_view_share().await {
            Ok(plan) => plan,
            Err(err) => ViewPlan::Unverified(err.to_string()),
        };
        let view_locker_id = match (&plan, self.view.as_ref()) {
            (ViewPlan::Create | ViewPlan::Shared, Some(view)) => Some(view.locker_id.clone()),
            (ViewPlan::Refused(_), Some(view)) => self
                .known_view_id
                .clone()
                .filter(|id| *id != view.locker_id),
            _ => self.known_view_id.clone(),
        };

        let Some(content_key) = self.content_key.as_ref() else {
            return Err(LockerError::InvariantViolation("content key missing".into()));
        };
        let content_iv = cipher::generate_iv()?;
        let encrypted_content =
            cipher::encrypt(content_key.as_bytes(), &content_iv, self.content.as_bytes())?;
        let wrapped = wrap::wrap_key(content_key, &write.user_key)?;

        let record = WriteRecord {
            content_iv,
            encrypted_content,
            key_iv: wrapped.iv,
            encrypted_content_key: wrapped.wrapped,
            view_locker_id,
        };
        self.store
            .set(&StoreKey::write(&write.locker_id), record.encode()?)
            .await?;
        debug!(previous = ?self.mode, "write record saved");
        self.mode = AccessMode::Write;
        self.known_view_id = record.view_locker_id;

        let view = match plan {
            ViewPlan::NotRequested => ViewShare::NotRequested,
            ViewPlan::Shared => ViewShare::AlreadyShared,
            ViewPlan::Create => match self.create_view_reference().await {
                Ok(()) => ViewShare::Created,
                Err(err) => {
                    warn!(error = %err, "write record saved but view reference was not created");
                    ViewShare::Failed(err.to_string())
                }
            },
            ViewPlan::Refused(reason) | ViewPlan::Unverified(reason) => {
                warn!(%reason, "write record saved but view reference left untouched");
                ViewShare::Failed(reason)
            }
        };
        Ok(SaveReport { view })
    }

    /// Decide what the save should do with the view reference. An existing
    /// reference is never overwritten, only verified.
    async fn plan_view_share(&self) -> Result<ViewPlan, LockerError> {
        let (Some(view), Some(write), Some(content_key)) =
            (self.view.as_ref(), self.write.as_ref(), self.content_key.as_ref())
        else {
            return Ok(ViewPlan::NotRequested);
        };

        let Some(stored) = self.store.get(&StoreKey::view(&view.locker_id)).await? else {
            return Ok(ViewPlan::Create);
        };
        let reference = match ViewReference::decode(&stored) {
            Ok(reference) => reference,
            Err(err) => {
                return Ok(ViewPlan::Refused(format!(
                    "existing view reference unreadable: {err}"
                )))
            }
        };
        if reference.write_ref != write.locker_id {
            return Ok(ViewPlan::Refused(
                "view phrase is already paired with another locker".into(),
            ));
        }

        match wrap::unwrap_key(&reference.encrypted_content_key, &view.user_key, &reference.key_iv) {
            Ok(existing) if existing.as_bytes() == content_key.as_bytes() => Ok(ViewPlan::Shared),
            Ok(_) => Ok(ViewPlan::Refused(
                "view reference holds a different content key".into(),
            )),
            Err(err) if err.is_masked() => Ok(ViewPlan::Refused(format!(
                "existing view reference unreadable: {err}"
            ))),
            Err(err) => Err(err),
        }
    }

    async fn create_view_reference(&self) -> Result<(), LockerError> {
        let (Some(view), Some(write), Some(content_key)) =
            (self.view.as_ref(), self.write.as_ref(), self.content_key.as_ref())
        else {
            return Err(LockerError::InvariantViolation(
                "view reference requested without credentials".into(),
            ));
        };

        let wrapped = wrap::wrap_key(content_key, &view.user_key)?;
        let reference = ViewReference {
            write_ref: write.locker_id.clone(),
            key_iv: wrapped.iv,
            encrypted_content_key: wrapped.wrapped,
        };
        self.store
            .set(&StoreKey::view(&view.locker_id), reference.encode()?)
            .await?;
        debug!("view reference created");
        Ok(())
    }
}
