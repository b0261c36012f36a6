//! Minimal example: create a locker, share it, and read it back.
//!
//! Runs against an in-process store. Set `SEEDLOCKER_API_URL` to point the
//! same flow at a running locker proxy instead.
//! Run with: `RUST_LOG=seedlocker=debug cargo run --example share_locker`

use seedlocker::{generate_dual_mnemonic, AccessMode, HttpStore, KeyValueStore, Locker, MemoryStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if std::env::var_os("SEEDLOCKER_API_URL").is_some() {
        run(HttpStore::from_env()?).await
    } else {
        run(MemoryStore::new()).await
    }
}

async fn run<S: KeyValueStore>(store: S) -> Result<(), Box<dyn std::error::Error>> {
    let locker = Locker::new(store);

    // 1. Issue a write phrase and a view phrase
    let dual = generate_dual_mnemonic()?;
    println!("write phrase: {}", dual.write);
    println!("view phrase:  {}", dual.view);

    // 2. Write and share in one save
    let mut session = locker.open_pair(&dual.write, &dual.view).await?;
    session.set_content("wifi password: correct horse battery staple")?;
    let report = session.save().await?;
    println!("saved, view share: {:?}", report.view);

    // 3. Read back with the view phrase only
    let mut viewer = locker.open(&dual.view).await?;
    assert_eq!(viewer.mode(), AccessMode::View);
    println!("viewer sees: {}", viewer.content());

    // 4. The view phrase cannot write
    match viewer.set_content("tampered") {
        Err(e) => println!("viewer write rejected: {e}"),
        Ok(()) => println!("unexpected: viewer could write"),
    }

    Ok(())
}
