use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{SizeBalancedTree, SourcesTree, TargetsTree, TreeKind};
use crate::storage::raw::{Field, RawLink};
use crate::types::Flow;

type Sources = SizeBalancedTree<SourcesTree>;
type Targets = SizeBalancedTree<TargetsTree>;

fn region(slots: usize) -> Vec<u8> {
    vec![0u8; RawLink::<u32>::SIZE_IN_BYTES * (slots + 1)]
}

fn set_value(mem: &mut [u8], index: u32, source: u32, target: u32) {
    RawLink::set(mem, index, Field::Source, source);
    RawLink::set(mem, index, Field::Target, target);
}

/// Walks the tree checking subtree sizes and in-order ordering; returns the
/// nodes in order.
fn check_tree<K: TreeKind>(mem: &[u8], root: u32) -> Vec<u32> {
    fn walk<K: TreeKind>(mem: &[u8], node: u32, out: &mut Vec<u32>) -> u32 {
        if node == 0 {
            return 0;
        }
        let (left, right) = SizeBalancedTree::<K>::children(mem, node);
        let left_size = walk::<K>(mem, left, out);
        out.push(node);
        let right_size = walk::<K>(mem, right, out);
        let size = SizeBalancedTree::<K>::size(mem, node);
        assert_eq!(size, left_size + right_size + 1, "size of node {node}");
        size
    }
    let mut nodes = Vec::new();
    walk::<K>(mem, root, &mut nodes);
    for pair in nodes.windows(2) {
        assert!(
            SizeBalancedTree::<K>::is_left_of(mem, pair[0], pair[1]),
            "{} out of order: {} before {}",
            K::NAME,
            pair[0],
            pair[1]
        );
    }
    nodes
}

#[test]
fn attach_keeps_sorted_and_balanced() {
    let n = 1024u32;
    let mut mem = region(n as usize);
    let mut root = 0u32;
    for index in 1..=n {
        set_value(&mut mem, index, index, 1);
        root = Sources::attach(&mut mem, root, index);
    }
    let nodes = check_tree::<SourcesTree>(&mem, root);
    assert_eq!(nodes, (1..=n).collect::<Vec<_>>());
    // Sequential inserts would degenerate an unbalanced tree to depth n.
    assert!(Sources::depth(&mem, root) <= 2 * 11, "depth too large");
}

#[test]
fn count_usages_counts_duplicates() {
    let mut mem = region(10);
    let mut root = 0u32;
    let values = [(5, 1), (3, 2), (5, 2), (5, 1), (7, 7), (3, 3), (5, 9)];
    for (i, (source, target)) in values.iter().enumerate() {
        let index = i as u32 + 1;
        set_value(&mut mem, index, *source, *target);
        root = Sources::attach(&mut mem, root, index);
    }
    assert_eq!(Sources::count_usages(&mem, root, 5), 4);
    assert_eq!(Sources::count_usages(&mem, root, 3), 2);
    assert_eq!(Sources::count_usages(&mem, root, 4), 0);
    assert_eq!(Sources::count_usages(&mem, root, 8), 0);

    let mut seen = Vec::new();
    let flow = Sources::each_usage(&mem, root, 5, &mut |node| {
        seen.push(node);
        Flow::Continue
    });
    assert_eq!(flow, Flow::Continue);
    // Ordered by target, then index.
    assert_eq!(seen, vec![1, 4, 3, 7]);
}

#[test]
fn search_returns_lowest_matching_index() {
    let mut mem = region(6);
    let mut root = 0u32;
    for (index, (source, target)) in [(2u32, 3u32), (2, 4), (2, 3), (1, 3)].iter().enumerate() {
        let index = index as u32 + 1;
        set_value(&mut mem, index, *source, *target);
        root = Sources::attach(&mut mem, root, index);
    }
    assert_eq!(Sources::search(&mem, root, 2, 3), 1);
    assert_eq!(Sources::search(&mem, root, 2, 4), 2);
    assert_eq!(Sources::search(&mem, root, 3, 2), 0);
}

#[test]
fn each_usage_stops_on_break() {
    let mut mem = region(8);
    let mut root = 0u32;
    for index in 1..=8u32 {
        set_value(&mut mem, index, 1, index);
        root = Targets::attach(&mut mem, root, index);
    }
    let mut root_s = 0u32;
    for index in 1..=8u32 {
        root_s = Sources::attach(&mut mem, root_s, index);
    }
    let mut visited = 0;
    let flow = Sources::each_usage(&mem, root_s, 1, &mut |_| {
        visited += 1;
        if visited == 3 {
            Flow::Break
        } else {
            Flow::Continue
        }
    });
    assert_eq!(flow, Flow::Break);
    assert_eq!(visited, 3);
    assert_eq!(Targets::count_usages(&mem, root, 4), 1);
}

#[test]
fn random_attach_detach_matches_reference() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5EED_D0B1);
    let slots = 512u32;
    let mut mem = region(slots as usize);
    let mut root_s = 0u32;
    let mut root_t = 0u32;
    let mut attached: BTreeMap<u32, (u32, u32)> = BTreeMap::new();

    for _ in 0..4_000 {
        let index = rng.gen_range(1..=slots);
        if let Some((source, target)) = attached.remove(&index) {
            assert_eq!(RawLink::<u32>::get(&mem, index, Field::Source), source);
            root_s = Sources::detach(&mut mem, root_s, index);
            root_t = Targets::detach(&mut mem, root_t, index);
            assert_eq!(Sources::size(&mem, index), 0, "detached node cleared");
            set_value(&mut mem, index, 0, 0);
        } else {
            let source = rng.gen_range(1..=16);
            let target = rng.gen_range(1..=16);
            set_value(&mut mem, index, source, target);
            root_s = Sources::attach(&mut mem, root_s, index);
            root_t = Targets::attach(&mut mem, root_t, index);
            attached.insert(index, (source, target));
        }
    }

    let in_sources = check_tree::<SourcesTree>(&mem, root_s);
    let in_targets = check_tree::<TargetsTree>(&mem, root_t);
    assert_eq!(in_sources.len(), attached.len());
    assert_eq!(in_targets.len(), attached.len());

    for value in 1..=16u32 {
        let sources = attached.values().filter(|(s, _)| *s == value).count() as u32;
        let targets = attached.values().filter(|(_, t)| *t == value).count() as u32;
        assert_eq!(Sources::count_usages(&mem, root_s, value), sources);
        assert_eq!(Targets::count_usages(&mem, root_t, value), targets);
    }
}

#[test]
fn detach_in_shuffled_order_empties_tree() {
    let n = 300u32;
    let mut mem = region(n as usize);
    let mut root = 0u32;
    for index in 1..=n {
        set_value(&mut mem, index, index % 7 + 1, index % 5 + 1);
        root = Targets::attach(&mut mem, root, index);
    }
    let mut order: Vec<u32> = (1..=n).collect();
    order.shuffle(&mut ChaCha8Rng::seed_from_u64(7));
    for (removed, index) in order.iter().enumerate() {
        root = Targets::detach(&mut mem, root, *index);
        if removed % 50 == 0 {
            let remaining = check_tree::<TargetsTree>(&mem, root);
            assert_eq!(remaining.len() as u32, n - removed as u32 - 1);
        }
    }
    assert_eq!(root, 0);
}
