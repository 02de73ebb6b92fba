#![allow(missing_docs)]

use std::collections::BTreeSet;

use doublets::{
    storage::{verify, LinksHeader},
    FileMemory, Flow, HeapMemory, Link, LinkAddress, LinkError, Links, LinksExt, LinksOptions,
    MemoryLinks, Result,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tempfile::tempdir;

fn assert_consistent<T: LinkAddress, M: doublets::ResizableMemory>(links: &MemoryLinks<T, M>) {
    let report = verify(links).expect("verify");
    assert!(report.success, "findings: {:?}", report.findings);
}

fn exercise_width<T: LinkAddress>() -> Result<()> {
    let mut links = MemoryLinks::<T, HeapMemory>::open(
        HeapMemory::new(),
        LinksOptions::new().reservation_links::<T>(4),
    )?;
    let any = links.constants().any;
    let a = links.create_point()?;
    let b = links.create_point()?;
    let ab = links.create_and_update(a, b)?;
    let ba = links.create_and_update(b, a)?;

    assert_eq!(links.count(&[])?, T::from_u64(4).expect("fits"));
    assert_eq!(links.count(&[any, a, b])?, T::ONE);
    assert_eq!(links.search(b, a)?, Some(ba));
    assert_eq!(links.usages(a)?, vec![ab, ba]);

    links.delete_link(ab)?;
    assert_eq!(links.free_links(), T::ONE);
    assert_eq!(links.search(a, b)?, None);
    assert_consistent(&links);

    let reused = links.create(&[])?;
    assert_eq!(reused, ab);
    assert_eq!(links.get_link(reused), Some(Link::nothing(reused)));
    assert_consistent(&links);
    Ok(())
}

#[test]
fn every_identifier_width_behaves_alike() -> Result<()> {
    exercise_width::<u8>()?;
    exercise_width::<u16>()?;
    exercise_width::<u32>()?;
    exercise_width::<u64>()?;
    Ok(())
}

#[test]
fn file_store_survives_reopen_with_free_slots() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("links.db");
    let options = LinksOptions::new().reservation_links::<u32>(8);
    let expected = {
        let mut links: MemoryLinks<u32, FileMemory> = MemoryLinks::open_file(&path, options.clone())?;
        for _ in 0..20 {
            links.create_point()?;
        }
        for index in [3, 7, 11] {
            links.delete_link(index)?;
        }
        links.flush()?;
        links.all(&[])?
    };

    let mut links: MemoryLinks<u32, FileMemory> = MemoryLinks::open_file(&path, options)?;
    assert_eq!(links.all(&[])?, expected);
    assert_eq!(links.free_links(), 3);
    assert_consistent(&links);
    assert_eq!(links.create(&[])?, 11);
    Ok(())
}

#[test]
fn header_tracks_allocation_and_free_list() -> Result<()> {
    let mut links = MemoryLinks::<u64>::in_memory()?;
    for _ in 0..5 {
        links.create(&[])?;
    }
    links.delete_link(2)?;
    links.delete_link(4)?;
    let header: LinksHeader<u64> = links.header()?;
    assert_eq!(header.allocated_links, 5);
    assert_eq!(header.free_links, 2);
    assert_eq!(header.first_free_link, 4);
    assert_eq!(header.last_free_link, 2);

    links.delete_link(5)?;
    let header = links.header()?;
    assert_eq!(header.allocated_links, 3);
    assert_eq!(header.free_links, 1);
    assert_eq!(header.first_free_link, 2);
    Ok(())
}

#[test]
fn restriction_shapes_over_trait_object() -> Result<()> {
    let mut store = MemoryLinks::<u32>::in_memory()?;
    let links: &mut dyn Links<u32> = &mut store;
    let any = links.constants().any;
    let a = links.create_point()?;
    let b = links.create_point()?;
    let ab = links.create_and_update(a, b)?;

    assert_eq!(links.count(&[any])?, 3);
    assert_eq!(links.count(&[ab])?, 1);
    assert_eq!(links.count(&[any, any, b])?, 2);
    assert_eq!(links.count(&[ab, a, any])?, 1);
    assert_eq!(links.count(&[ab, b, any])?, 0);
    let err = links.count(&[any, any, any, any]).unwrap_err();
    assert!(matches!(err, LinkError::UnsupportedRestriction { len: 4 }));

    let mut visited = Vec::new();
    let flow = links.each(&[any, any, b], &mut |link| {
        visited.push(link.index);
        Flow::Continue
    })?;
    assert_eq!(flow, Flow::Continue);
    assert_eq!(visited, vec![ab, b]);
    Ok(())
}

#[test]
fn seeded_churn_keeps_structures_consistent() -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(0xD0B1_E7);
    let mut links = MemoryLinks::<u16, HeapMemory>::open(
        HeapMemory::new(),
        LinksOptions::new().reservation_links::<u16>(16),
    )?;
    let mut live = BTreeSet::new();
    for round in 0..2_000 {
        let choice = rng.gen_range(0..10);
        if choice < 4 || live.is_empty() {
            live.insert(links.create(&[])?);
        } else if choice < 8 {
            let pick = *live.iter().nth(rng.gen_range(0..live.len())).expect("live");
            let source = *live.iter().nth(rng.gen_range(0..live.len())).expect("live");
            let target = *live.iter().nth(rng.gen_range(0..live.len())).expect("live");
            links.update_link(pick, source, target)?;
        } else {
            let pick = *live.iter().nth(rng.gen_range(0..live.len())).expect("live");
            links.delete_link(pick)?;
            live.remove(&pick);
        }
        if round % 250 == 0 {
            assert_consistent(&links);
        }
    }
    assert_eq!(u64::from(links.total()), live.len() as u64);
    let found: BTreeSet<u16> = links.all(&[])?.into_iter().map(|link| link.index).collect();
    assert_eq!(found, live);
    assert_consistent(&links);
    Ok(())
}
