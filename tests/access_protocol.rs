//! End-to-end behaviour of write and view sessions over a shared store.

use async_trait::async_trait;

use seedlocker::keys::derive_locker_id;
use seedlocker::record::{Slot, StoreKey, ViewReference, WriteRecord};
use seedlocker::{
    AccessMode, Bip39Scheme, KeyValueStore, Locker, LockerError, LockerId, MemoryStore,
    MnemonicScheme, ViewShare,
};

const WRITE: &str = "legal winner thank year wave sausage worth useful legal winner thank yellow";
const VIEW: &str = "letter advice cage absurd amount doctor acoustic avoid letter advice cage above";
const OTHER: &str = "zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo wrong";

fn locker_id(phrase: &str) -> LockerId {
    derive_locker_id(&Bip39Scheme.to_seed(phrase, "").unwrap())
}

/// Wraps a [`MemoryStore`] and fails on demand.
#[derive(Clone, Default)]
struct FaultyStore {
    inner: MemoryStore,
    fail_set_on: Option<Slot>,
    fail_get: bool,
}

#[async_trait]
impl KeyValueStore for FaultyStore {
    async fn get(&self, key: &StoreKey) -> Result<Option<String>, LockerError> {
        if self.fail_get {
            return Err(LockerError::StorageUnavailable("injected get failure".into()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &StoreKey, value: String) -> Result<(), LockerError> {
        if self.fail_set_on == Some(key.slot) {
            return Err(LockerError::StorageUnavailable("injected set failure".into()));
        }
        self.inner.set(key, value).await
    }
}

#[tokio::test]
async fn test_new_locker_shared_with_view_phrase() {
    let store = MemoryStore::new();
    let locker = Locker::new(store.clone());

    // 1. Create with both phrases and save.
    let mut session = locker.open_pair(WRITE, VIEW).await.unwrap();
    assert_eq!(session.mode(), AccessMode::New);
    session.set_content("hello").unwrap();
    let report = session.save().await.unwrap();
    assert_eq!(report.view, ViewShare::Created);
    assert!(!report.is_partial());
    assert_eq!(session.mode(), AccessMode::Write);

    // 2. Reload with only the view phrase.
    let mut viewer = locker.open(VIEW).await.unwrap();
    assert_eq!(viewer.mode(), AccessMode::View);
    assert_eq!(viewer.content(), "hello");

    // 3. Mutation and save are rejected; state is unchanged.
    assert!(matches!(viewer.set_content("defaced"), Err(LockerError::ReadOnly)));
    assert!(matches!(viewer.save().await, Err(LockerError::ReadOnly)));
    assert_eq!(viewer.mode(), AccessMode::View);
    assert_eq!(viewer.content(), "hello");
}

#[tokio::test]
async fn test_unknown_write_phrase_is_empty_write_locker() {
    let locker = Locker::new(MemoryStore::new());

    let session = locker.open_write(WRITE).await.unwrap();
    assert_eq!(session.mode(), AccessMode::Write);
    assert_eq!(session.content(), "");

    let ambiguous = locker.open(WRITE).await.unwrap();
    assert_eq!(ambiguous.mode(), AccessMode::Write);
    assert_eq!(ambiguous.content(), "");

    // Probing writes nothing.
    assert!(locker.store().is_empty().await);
}

#[tokio::test]
async fn test_write_only_locker_persists_across_sessions() {
    let locker = Locker::new(MemoryStore::new());

    let mut session = locker.open(WRITE).await.unwrap();
    session.set_content("first draft").unwrap();
    assert_eq!(session.save().await.unwrap().view, ViewShare::NotRequested);

    let mut again = locker.open(WRITE).await.unwrap();
    assert_eq!(again.mode(), AccessMode::Write);
    assert_eq!(again.content(), "first draft");

    again.set_content("second draft").unwrap();
    again.save().await.unwrap();
    assert_eq!(locker.open_write(WRITE).await.unwrap().content(), "second draft");

    // Only the write record exists.
    assert_eq!(locker.store().len().await, 1);
}

#[tokio::test]
async fn test_corrupted_content_is_masked() {
    let store = MemoryStore::new();
    let locker = Locker::new(store.clone());

    let mut session = locker.open_pair(WRITE, VIEW).await.unwrap();
    session.set_content("precious").unwrap();
    session.save().await.unwrap();

    // Flip one byte of the stored ciphertext.
    let key = StoreKey::write(&locker_id(WRITE));
    let mut record = WriteRecord::decode(&store.get(&key).await.unwrap().unwrap()).unwrap();
    record.encrypted_content[0] ^= 0x01;
    store.set(&key, record.encode().unwrap()).await.unwrap();

    let writer = locker.open_write(WRITE).await.unwrap();
    assert_eq!(writer.mode(), AccessMode::Write);
    assert_eq!(writer.content(), "");

    let viewer = locker.open(VIEW).await.unwrap();
    assert_eq!(viewer.mode(), AccessMode::View);
    assert_eq!(viewer.content(), "");
}

#[tokio::test]
async fn test_garbage_write_record_is_masked() {
    let store = MemoryStore::new();
    store
        .set(&StoreKey::write(&locker_id(WRITE)), "{not json".into())
        .await
        .unwrap();

    let locker = Locker::new(store);
    let session = locker.open(WRITE).await.unwrap();
    assert_eq!(session.mode(), AccessMode::Write);
    assert_eq!(session.content(), "");
}

#[tokio::test]
async fn test_rewrite_after_corruption_recovers_view() {
    let store = MemoryStore::new();
    let locker = Locker::new(store.clone());

    let mut session = locker.open_pair(WRITE, VIEW).await.unwrap();
    session.set_content("v1").unwrap();
    session.save().await.unwrap();

    let key = StoreKey::write(&locker_id(WRITE));
    let mut record = WriteRecord::decode(&store.get(&key).await.unwrap().unwrap()).unwrap();
    record.encrypted_content[0] ^= 0x80;
    store.set(&key, record.encode().unwrap()).await.unwrap();

    // The content key still unwraps, so a rewrite keeps the view working.
    let mut writer = locker.open_write(WRITE).await.unwrap();
    writer.set_content("v2").unwrap();
    writer.save().await.unwrap();

    assert_eq!(locker.open(VIEW).await.unwrap().content(), "v2");
}

#[tokio::test]
async fn test_write_phrase_tried_before_view_phrase() {
    let store = MemoryStore::new();
    let locker = Locker::new(store.clone());

    // OTHER is a view phrase for one locker...
    let mut shared = locker.open_pair(WRITE, OTHER).await.unwrap();
    shared.set_content("shared").unwrap();
    shared.save().await.unwrap();

    // ...and also a write phrase for another.
    let mut own = locker.open_write(OTHER).await.unwrap();
    own.set_content("own").unwrap();
    own.save().await.unwrap();

    let session = locker.open(OTHER).await.unwrap();
    assert_eq!(session.mode(), AccessMode::Write);
    assert_eq!(session.content(), "own");

    let viewer = locker.open_view(OTHER).await.unwrap().unwrap();
    assert_eq!(viewer.content(), "shared");
}

#[tokio::test]
async fn test_open_view_without_reference_is_none() {
    let locker = Locker::new(MemoryStore::new());
    assert!(locker.open_view(VIEW).await.unwrap().is_none());
}

#[tokio::test]
async fn test_view_failure_after_write_is_partial() {
    let store = FaultyStore {
        fail_set_on: Some(Slot::View),
        ..FaultyStore::default()
    };
    let locker = Locker::new(store.clone());

    let mut session = locker.open_pair(WRITE, VIEW).await.unwrap();
    session.set_content("unshared").unwrap();
    let report = session.save().await.unwrap();

    assert!(report.is_partial());
    assert!(matches!(report.view, ViewShare::Failed(_)));
    assert_eq!(session.mode(), AccessMode::Write);

    // The write locker is valid; the view phrase resolves to nothing.
    let direct = Locker::new(store.inner.clone());
    let writer = direct.open_write(WRITE).await.unwrap();
    assert_eq!(writer.content(), "unshared");
    assert!(store
        .inner
        .get(&StoreKey::view(&locker_id(VIEW)))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_view_reference_issued_on_later_save() {
    let mut store = FaultyStore {
        fail_set_on: Some(Slot::View),
        ..FaultyStore::default()
    };
    {
        let locker = Locker::new(store.clone());
        let mut session = locker.open_pair(WRITE, VIEW).await.unwrap();
        session.set_content("eventually shared").unwrap();
        assert!(session.save().await.unwrap().is_partial());
    }

    // The store recovers; reopening with both phrases completes the share.
    store.fail_set_on = None;
    let locker = Locker::new(store);
    let mut session = locker.open_pair(WRITE, VIEW).await.unwrap();
    assert_eq!(session.mode(), AccessMode::Write);
    assert_eq!(session.content(), "eventually shared");
    assert_eq!(session.save().await.unwrap().view, ViewShare::Created);

    let viewer = locker.open(VIEW).await.unwrap();
    assert_eq!(viewer.content(), "eventually shared");

    // A third save leaves the reference alone.
    let mut session = locker.open_pair(WRITE, VIEW).await.unwrap();
    assert_eq!(session.save().await.unwrap().view, ViewShare::AlreadyShared);
}

#[tokio::test]
async fn test_write_failure_never_creates_view() {
    let store = FaultyStore {
        fail_set_on: Some(Slot::Write),
        ..FaultyStore::default()
    };
    let locker = Locker::new(store.clone());

    let mut session = locker.open_pair(WRITE, VIEW).await.unwrap();
    session.set_content("lost").unwrap();
    let result = session.save().await;

    assert!(matches!(result, Err(LockerError::StorageUnavailable(_))));
    assert_eq!(session.mode(), AccessMode::New);
    assert!(store.inner.is_empty().await);
}

#[tokio::test]
async fn test_storage_failure_is_not_masked() {
    let store = FaultyStore {
        fail_get: true,
        ..FaultyStore::default()
    };
    let locker = Locker::new(store);

    for result in [
        locker.open(WRITE).await.map(|_| ()),
        locker.open_write(WRITE).await.map(|_| ()),
        locker.open_view(VIEW).await.map(|_| ()),
        locker.open_pair(WRITE, VIEW).await.map(|_| ()),
    ] {
        assert!(matches!(result, Err(LockerError::StorageUnavailable(_))));
    }
}

#[tokio::test]
async fn test_over_limit_save_is_storage_failure() {
    let locker = Locker::new(MemoryStore::with_max_value_len(256));
    let mut session = locker.open_write(WRITE).await.unwrap();
    session.set_content("x".repeat(1024)).unwrap();

    assert!(matches!(
        session.save().await,
        Err(LockerError::StorageUnavailable(_))
    ));
}

#[tokio::test]
async fn test_dangling_view_reference_is_invariant_violation() {
    let store = MemoryStore::new();
    let locker = Locker::new(store.clone());

    // Issue a real reference, then point it at a locker that was never saved.
    let mut session = locker.open_pair(WRITE, VIEW).await.unwrap();
    session.save().await.unwrap();

    let view_key = StoreKey::view(&locker_id(VIEW));
    let mut reference =
        ViewReference::decode(&store.get(&view_key).await.unwrap().unwrap()).unwrap();
    reference.write_ref = locker_id(OTHER);
    store.set(&view_key, reference.encode().unwrap()).await.unwrap();

    let result = locker.open(VIEW).await;
    assert!(matches!(result, Err(LockerError::InvariantViolation(_))));
}

#[tokio::test]
async fn test_invalid_phrase_rejected() {
    let locker = Locker::new(MemoryStore::new());
    let result = locker.open("correct horse battery staple").await;
    assert!(matches!(result, Err(LockerError::InvalidMnemonic)));

    let result = locker.open_pair(WRITE, "not a phrase").await;
    assert!(matches!(result, Err(LockerError::InvalidMnemonic)));
}

#[tokio::test]
async fn test_passphrase_selects_a_different_locker() {
    let store = MemoryStore::new();

    let plain = Locker::new(store.clone());
    let mut session = plain.open_write(WRITE).await.unwrap();
    session.set_content("no passphrase").unwrap();
    session.save().await.unwrap();

    let salted = Locker::new(store.clone()).with_passphrase("hunter2");
    let session = salted.open(WRITE).await.unwrap();
    assert_eq!(session.content(), "");
    assert_ne!(session.write_locker_id(), Some(&locker_id(WRITE)));
}

#[tokio::test]
async fn test_session_reports_locker_ids() {
    let locker = Locker::new(MemoryStore::new());
    let mut session = locker.open_pair(WRITE, VIEW).await.unwrap();
    session.save().await.unwrap();

    assert_eq!(session.write_locker_id(), Some(&locker_id(WRITE)));
    assert_eq!(session.view_locker_id(), Some(&locker_id(VIEW)));

    // A write-only reopen still knows the paired view locker.
    let writer = locker.open_write(WRITE).await.unwrap();
    assert_eq!(writer.view_locker_id(), Some(&locker_id(VIEW)));

    let viewer = locker.open(VIEW).await.unwrap();
    assert_eq!(viewer.write_locker_id(), Some(&locker_id(WRITE)));
    assert_eq!(viewer.view_locker_id(), Some(&locker_id(VIEW)));
}

#[tokio::test]
async fn test_view_phrase_of_another_locker_is_not_claimed() {
    let store = MemoryStore::new();
    let locker = Locker::new(store.clone());

    // 1. VIEW is shared for the WRITE locker.
    let mut first = locker.open_pair(WRITE, VIEW).await.unwrap();
    first.set_content("locker one").unwrap();
    assert_eq!(first.save().await.unwrap().view, ViewShare::Created);

    // 2. A second locker tries to pair with the same view phrase.
    let mut second = locker.open_pair(OTHER, VIEW).await.unwrap();
    second.set_content("locker two").unwrap();
    let report = second.save().await.unwrap();
    assert!(report.is_partial());
    assert!(matches!(report.view, ViewShare::Failed(_)));

    // 3. The second record does not name VIEW, and VIEW is untouched.
    let value = store.get(&StoreKey::write(&locker_id(OTHER))).await.unwrap().unwrap();
    assert_eq!(WriteRecord::decode(&value).unwrap().view_locker_id, None);

    let value = store.get(&StoreKey::view(&locker_id(VIEW))).await.unwrap().unwrap();
    assert_eq!(ViewReference::decode(&value).unwrap().write_ref, locker_id(WRITE));
    assert_eq!(locker.open(VIEW).await.unwrap().content(), "locker one");

    // 4. The second locker's content saved normally.
    assert_eq!(locker.open(OTHER).await.unwrap().content(), "locker two");
}

#[tokio::test]
async fn test_corrupted_write_wrap_recovered_through_view() {
    let store = MemoryStore::new();
    let locker = Locker::new(store.clone());

    let mut session = locker.open_pair(WRITE, VIEW).await.unwrap();
    session.set_content("v1").unwrap();
    session.save().await.unwrap();

    // Flip one byte of the write-side wrapped key.
    let key = StoreKey::write(&locker_id(WRITE));
    let mut record = WriteRecord::decode(&store.get(&key).await.unwrap().unwrap()).unwrap();
    record.encrypted_content_key[0] ^= 0x01;
    store.set(&key, record.encode().unwrap()).await.unwrap();

    // Both phrases together recover the key and the content.
    let mut session = locker.open_pair(WRITE, VIEW).await.unwrap();
    assert_eq!(session.content(), "v1");
    session.set_content("v2").unwrap();
    assert_eq!(session.save().await.unwrap().view, ViewShare::AlreadyShared);

    assert_eq!(locker.open(VIEW).await.unwrap().content(), "v2");
    assert_eq!(locker.open_write(WRITE).await.unwrap().content(), "v2");
}

#[tokio::test]
async fn test_unreadable_view_reference_reported_on_save() {
    let store = MemoryStore::new();
    let locker = Locker::new(store.clone());

    let mut session = locker.open_pair(WRITE, VIEW).await.unwrap();
    session.set_content("kept").unwrap();
    session.save().await.unwrap();

    // Corrupt the view-side wrapped key; the write side is intact.
    let view_key = StoreKey::view(&locker_id(VIEW));
    let mut reference =
        ViewReference::decode(&store.get(&view_key).await.unwrap().unwrap()).unwrap();
    reference.encrypted_content_key[0] ^= 0x01;
    let corrupted = reference.encode().unwrap();
    store.set(&view_key, corrupted.clone()).await.unwrap();

    let mut session = locker.open_pair(WRITE, VIEW).await.unwrap();
    assert_eq!(session.content(), "kept");
    let report = session.save().await.unwrap();
    assert!(matches!(report.view, ViewShare::Failed(_)));

    // The reference is never overwritten.
    assert_eq!(store.get(&view_key).await.unwrap(), Some(corrupted));
}
