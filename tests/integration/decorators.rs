#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;

use doublets::{
    decorators::{replay, ConflictPolicy, LoggedLinks, SynchronizedLinks, UniqueLinks},
    primitives::wal::TransitionKind,
    Link, Links, LinksExt, LogOptions, MemoryLinks, Result, TransitionLog,
};
use tempfile::tempdir;

#[test]
fn nested_chain_enforces_uniqueness_and_logs_the_outcome() -> Result<()> {
    let dir = tempdir()?;
    let log_path = dir.path().join("links.log");
    let log = TransitionLog::open(&log_path, LogOptions::new(8))?;
    let mut chain = LoggedLinks::new(
        UniqueLinks::new(
            MemoryLinks::<u64>::in_memory()?,
            ConflictPolicy::ReturnExisting,
        ),
        log,
    );
    let a = chain.create_point()?;
    let b = chain.create_point()?;
    let ab = chain.create_and_update(a, b)?;
    let dup = chain.create(&[])?;
    assert_eq!(chain.update_link(dup, a, b)?, ab);
    assert!(!chain.exists(dup)?);

    let (_, log) = chain.into_parts();
    let kinds: Vec<TransitionKind> = log.transitions()?.iter().map(|t| t.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            TransitionKind::Create,
            TransitionKind::Update,
            TransitionKind::Create,
            TransitionKind::Update,
            TransitionKind::Create,
            TransitionKind::Update,
            TransitionKind::Create,
            TransitionKind::Delete,
        ]
    );
    Ok(())
}

#[test]
fn log_reopens_and_replays_after_restart() -> Result<()> {
    let dir = tempdir()?;
    let log_path = dir.path().join("links.log");
    let original = {
        let log = TransitionLog::open(&log_path, LogOptions::new(4).sync_on_append(true))?;
        let mut logged = LoggedLinks::new(MemoryLinks::<u32>::in_memory()?, log);
        let a = logged.create_point()?;
        let b = logged.create_point()?;
        let c = logged.create_and_update(a, b)?;
        logged.update_link(c, b, a)?;
        logged.delete_link(a)?;
        let (links, log) = logged.into_parts();
        assert_eq!(log.stats().syncs, log.len());
        links.all(&[])?
    };

    let log = TransitionLog::open(&log_path, LogOptions::new(4))?;
    assert_eq!(log.next_seq(), log.len() + 1);
    let mut restored = MemoryLinks::<u32>::in_memory()?;
    replay(&log, &mut restored)?;
    assert_eq!(restored.all(&[])?, original);
    Ok(())
}

#[test]
fn synchronized_unique_store_dedups_across_threads() -> Result<()> {
    let shared = Arc::new(SynchronizedLinks::new(UniqueLinks::new(
        MemoryLinks::<u64>::in_memory()?,
        ConflictPolicy::ReturnExisting,
    )));
    let root = shared.write(|links| links.create_point())?;
    let mut handles = Vec::new();
    for _ in 0..4 {
        let shared = Arc::clone(&shared);
        handles.push(thread::spawn(move || -> Result<u64> {
            shared.write(|links| links.create_and_update(root, root))
        }));
    }
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.join().expect("writer panicked")?);
    }
    results.dedup();
    assert_eq!(results.len(), 1);
    // The point itself already is (root, root), so every writer got it back.
    assert_eq!(results[0], root);
    assert_eq!(shared.count(&[])?, 1);
    let inner = Arc::try_unwrap(shared)
        .ok()
        .expect("sole owner")
        .into_inner()
        .into_inner();
    assert_eq!(inner.get_link(root), Some(Link::new(root, root, root)));
    Ok(())
}
