//! Structural integrity checks over a link store region.

use std::collections::HashSet;

use serde::Serialize;

use crate::primitives::memory::ResizableMemory;
use crate::types::{LinkAddress, Result};

use super::header::{header_size, LinksHeader};
use super::links::MemoryLinks;
use super::raw::{Field, RawLink};
use super::tree::{SizeBalancedTree, SourcesTree, TargetsTree, TreeKind};

const MAX_FINDINGS: usize = 32;

/// Indicates the severity level of a verification finding.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifySeverity {
    /// Non-critical issue, such as reserved memory beyond what the header tracks.
    Warning,
    /// Structural damage: the store's invariants do not hold.
    Error,
}

/// A single issue discovered during verification.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyFinding {
    /// The severity level of this finding.
    pub severity: VerifySeverity,
    /// Human-readable description of the issue.
    pub message: String,
}

/// Totals gathered while walking the structures.
#[derive(Clone, Debug, Default, Serialize)]
pub struct VerifyCounts {
    /// `AllocatedLinks` from the header.
    pub allocated_links: u64,
    /// `ReservedLinks` from the header.
    pub reserved_links: u64,
    /// Slots reached by walking the free list.
    pub free_links: u64,
    /// Slots holding a live link.
    pub live_links: u64,
    /// Nodes reached by walking the sources tree.
    pub source_tree_nodes: u64,
    /// Nodes reached by walking the targets tree.
    pub target_tree_nodes: u64,
}

/// Result of [`verify`].
#[derive(Clone, Debug, Serialize)]
pub struct VerifyReport {
    /// Whether no error-level findings were produced.
    pub success: bool,
    /// Issues discovered, capped at a fixed number.
    pub findings: Vec<VerifyFinding>,
    /// Statistics about the structures examined.
    pub counts: VerifyCounts,
}

struct Findings(Vec<VerifyFinding>);

impl Findings {
    fn error(&mut self, message: impl Into<String>) {
        self.push(VerifySeverity::Error, message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.push(VerifySeverity::Warning, message.into());
    }

    fn push(&mut self, severity: VerifySeverity, message: String) {
        if self.0.len() < MAX_FINDINGS {
            self.0.push(VerifyFinding { severity, message });
        }
    }

    fn full(&self) -> bool {
        self.0.len() >= MAX_FINDINGS
    }
}

/// Checks the header, the free list and both index trees of `links`.
///
/// Verification never mutates the store. Errors are returned only when the
/// header cannot be decoded at all; every other problem becomes a finding.
pub fn verify<T, M>(links: &MemoryLinks<T, M>) -> Result<VerifyReport>
where
    T: LinkAddress,
    M: ResizableMemory,
{
    let mem = links.region();
    let header = LinksHeader::<T>::read(mem)?;
    let mut findings = Findings(Vec::new());
    let mut counts = VerifyCounts {
        allocated_links: header.allocated_links.as_u64(),
        reserved_links: header.reserved_links.as_u64(),
        ..VerifyCounts::default()
    };

    if let Err(err) = header.validate() {
        findings.error(format!("header rejected: {err}"));
        return Ok(finish(findings, counts));
    }
    let record = RawLink::<T>::SIZE_IN_BYTES as u64;
    let expected_used = header_size::<T>() as u64 + counts.allocated_links * record;
    if links.memory().used_capacity() != expected_used {
        findings.error(format!(
            "used capacity {} does not match {} allocated links ({} bytes)",
            links.memory().used_capacity(),
            counts.allocated_links,
            expected_used
        ));
    }
    let backed = header_size::<T>() as u64 + counts.reserved_links * record;
    if (mem.len() as u64) < backed {
        findings.error(format!(
            "region holds {} bytes but header reserves {} links",
            mem.len(),
            counts.reserved_links
        ));
        return Ok(finish(findings, counts));
    }
    if mem.len() as u64 >= backed + record && header.reserved_links != T::MAX {
        findings.warning(format!(
            "region has {} bytes beyond the reserved links",
            mem.len() as u64 - backed
        ));
    }

    let free = check_free_list(mem, &header, &mut findings, &mut counts);
    let sources = check_tree::<SourcesTree, T>(mem, &header, header.root_as_source, &mut findings);
    let targets = check_tree::<TargetsTree, T>(mem, &header, header.root_as_target, &mut findings);
    counts.source_tree_nodes = sources.len() as u64;
    counts.target_tree_nodes = targets.len() as u64;

    let mut index = T::ONE;
    while index <= header.allocated_links && !findings.full() {
        let source: T = RawLink::get(mem, index, Field::Source);
        let target: T = RawLink::get(mem, index, Field::Target);
        if free.contains(&index) {
            if sources.contains(&index) || targets.contains(&index) {
                findings.error(format!("free slot {index} is still indexed"));
            }
        } else {
            counts.live_links += 1;
            if (source != T::ZERO) != sources.contains(&index) {
                findings.error(format!(
                    "link {index} with source {source} is indexed wrongly in the sources tree"
                ));
            }
            if (target != T::ZERO) != targets.contains(&index) {
                findings.error(format!(
                    "link {index} with target {target} is indexed wrongly in the targets tree"
                ));
            }
            if RawLink::<T>::get(mem, index, Field::SizeAsSource) == T::ZERO
                && source != T::ZERO
            {
                findings.error(format!("link {index} looks unused but is not on the free list"));
            }
        }
        index = index.increment();
    }

    Ok(finish(findings, counts))
}

fn finish(findings: Findings, counts: VerifyCounts) -> VerifyReport {
    let success = findings
        .0
        .iter()
        .all(|finding| finding.severity != VerifySeverity::Error);
    VerifyReport {
        success,
        findings: findings.0,
        counts,
    }
}

fn check_free_list<T: LinkAddress>(
    mem: &[u8],
    header: &LinksHeader<T>,
    findings: &mut Findings,
    counts: &mut VerifyCounts,
) -> HashSet<T> {
    let mut seen = HashSet::new();
    let first = header.first_free_link;
    if first == T::ZERO {
        return seen;
    }
    let in_range = |link: T| link > T::ZERO && link <= header.allocated_links;
    let mut link = first;
    loop {
        if !seen.insert(link) {
            findings.error(format!("free list revisits slot {link} before closing"));
            break;
        }
        let previous: T = RawLink::get(mem, link, Field::Source);
        let next: T = RawLink::get(mem, link, Field::Target);
        if RawLink::<T>::get(mem, link, Field::SizeAsSource) != T::ZERO
            || RawLink::<T>::get(mem, link, Field::SizeAsTarget) != T::ZERO
        {
            findings.error(format!("free slot {link} carries tree sizes"));
        }
        if !in_range(previous) || !in_range(next) {
            findings.error(format!("free slot {link} points outside the array"));
            break;
        }
        if RawLink::<T>::get(mem, next, Field::Source) != link {
            findings.error(format!("free slot {next} does not link back to {link}"));
        }
        if next == first {
            if link != header.last_free_link {
                findings.error(format!(
                    "free list ends at {link} but header names {}",
                    header.last_free_link
                ));
            }
            break;
        }
        link = next;
    }
    counts.free_links = seen.len() as u64;
    if counts.free_links != header.free_links.as_u64() {
        findings.error(format!(
            "free list holds {} slots but header counts {}",
            counts.free_links, header.free_links
        ));
    }
    seen
}

fn check_tree<K: TreeKind, T: LinkAddress>(
    mem: &[u8],
    header: &LinksHeader<T>,
    root: T,
    findings: &mut Findings,
) -> HashSet<T> {
    let mut nodes = HashSet::new();
    let mut order = Vec::new();
    walk::<K, T>(mem, header, root, &mut nodes, &mut order, findings);
    for pair in order.windows(2) {
        if !SizeBalancedTree::<K>::is_left_of(mem, pair[0], pair[1]) {
            findings.error(format!(
                "{} tree out of order: {} before {}",
                K::NAME,
                pair[0],
                pair[1]
            ));
            break;
        }
    }
    nodes
}

/// Walks the subtree at `node`, checking stored sizes. Returns the actual
/// subtree size.
fn walk<K: TreeKind, T: LinkAddress>(
    mem: &[u8],
    header: &LinksHeader<T>,
    node: T,
    nodes: &mut HashSet<T>,
    order: &mut Vec<T>,
    findings: &mut Findings,
) -> u64 {
    if node == T::ZERO || findings.full() {
        return 0;
    }
    if node > header.allocated_links {
        findings.error(format!("{} tree references slot {node} past the array", K::NAME));
        return 0;
    }
    if !nodes.insert(node) {
        findings.error(format!("{} tree reaches node {node} twice", K::NAME));
        return 0;
    }
    let (left, right) = SizeBalancedTree::<K>::children(mem, node);
    let left_size = walk::<K, T>(mem, header, left, nodes, order, findings);
    order.push(node);
    let right_size = walk::<K, T>(mem, header, right, nodes, order, findings);
    let actual = left_size + right_size + 1;
    let stored = SizeBalancedTree::<K>::size(mem, node).as_u64();
    if stored != actual {
        findings.error(format!(
            "{} tree node {node} stores size {stored}, actual {actual}",
            K::NAME
        ));
    }
    actual
}
