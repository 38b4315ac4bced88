//! Enumeration of overlappings: structure-preserving partial identifications
//! between the elements of two heap configurations.
//!
//! An [`Overlapping`] is an immutable partial bijection between graph
//! elements, extended one pair at a time (parent-pointer sharing, no back
//! mutation). Enumeration proceeds in two phases over candidate pairs drawn
//! in the canonical [`GraphElement`] order: an edge phase identifying
//! selector and hyperedge pairs (with the induced node identifications), and
//! a node phase adding node-only identifications on top of each valid edge
//! overlapping. Candidate pairs are only ever drawn from strictly later
//! positions than the pair added last, so every identification subset is
//! visited exactly once.

mod joint;

pub use joint::JointHeapConfiguration;

use sorted_vec::SortedSet;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use tangle_heap::{GraphElement, HeapConfiguration, NodeId};
use tracing::trace;

/// Verdict on extending an overlapping with one more pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    /// The pair extends the overlapping.
    Compatible,
    /// The pair conflicts with identifications fixed so far; it is re-queued
    /// for extensions built from other pairs.
    NotCompatibleYet,
    /// The pair can never participate: label, kind, or type mismatch. No
    /// superset can repair it.
    Incompatible,
}

struct PairLink {
    pair: (GraphElement, GraphElement),
    parent: Option<Rc<PairLink>>,
}

/// An immutable, incrementally-extended partial identification between the
/// elements of two heap configurations.
///
/// Extension yields a new value sharing its ancestry with the parent; the
/// induced node-to-node correspondence is tracked alongside.
#[derive(Clone)]
pub struct Overlapping {
    link: Option<Rc<PairLink>>,
    len: usize,
    node_map_lr: BTreeMap<NodeId, NodeId>,
    node_map_rl: BTreeMap<NodeId, NodeId>,
    matched_left: SortedSet<GraphElement>,
    matched_right: SortedSet<GraphElement>,
}

impl Default for Overlapping {
    fn default() -> Self {
        Overlapping {
            link: None,
            len: 0,
            node_map_lr: BTreeMap::new(),
            node_map_rl: BTreeMap::new(),
            matched_left: SortedSet::new(),
            matched_right: SortedSet::new(),
        }
    }
}

impl Overlapping {
    pub fn empty() -> Self {
        Overlapping::default()
    }

    /// Number of explicitly identified element pairs.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The identified element pairs, in the order they were added.
    pub fn pairs(&self) -> Vec<(GraphElement, GraphElement)> {
        let mut out = Vec::with_capacity(self.len);
        let mut cursor = self.link.as_ref();
        while let Some(link) = cursor {
            out.push(link.pair);
            cursor = link.parent.as_ref();
        }
        out.reverse();
        out
    }

    /// The induced node correspondence, left to right.
    pub fn node_correspondence(&self) -> &BTreeMap<NodeId, NodeId> {
        &self.node_map_lr
    }

    pub fn node_image(&self, left: NodeId) -> Option<NodeId> {
        self.node_map_lr.get(&left).copied()
    }

    pub fn node_preimage(&self, right: NodeId) -> Option<NodeId> {
        self.node_map_rl.get(&right).copied()
    }

    /// Whether a left edge element is part of the shared part.
    pub fn is_left_matched(&self, element: GraphElement) -> bool {
        self.matched_left.contains(&element)
    }

    pub fn is_right_matched(&self, element: GraphElement) -> bool {
        self.matched_right.contains(&element)
    }

    /// Extend with `pair` and its induced node identifications. The caller
    /// has already established compatibility.
    fn extended(&self, pair: (GraphElement, GraphElement), induced: &[(NodeId, NodeId)]) -> Self {
        let mut next = self.clone();
        next.link = Some(Rc::new(PairLink {
            pair,
            parent: self.link.clone(),
        }));
        next.len += 1;
        if pair.0.is_edge() {
            let _ = next.matched_left.find_or_insert(pair.0);
            let _ = next.matched_right.find_or_insert(pair.1);
        }
        for (left, right) in induced {
            next.node_map_lr.insert(*left, *right);
            next.node_map_rl.insert(*right, *left);
        }
        next
    }
}

impl std::fmt::Debug for Overlapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overlapping")
            .field("pairs", &self.pairs())
            .field("nodes", &self.node_map_lr)
            .finish()
    }
}

/// The node identifications a candidate pair induces: endpoint-wise for
/// selectors, tentacle-wise for hyperedges, and the pair itself for nodes.
fn induced_identifications(
    left: &HeapConfiguration,
    right: &HeapConfiguration,
    pair: (GraphElement, GraphElement),
) -> Option<Vec<(NodeId, NodeId)>> {
    match pair {
        (GraphElement::Selector(u1, l1), GraphElement::Selector(u2, l2)) => {
            if l1 != l2 {
                return None;
            }
            let t1 = left.select_target(u1, l1)?;
            let t2 = right.select_target(u2, l2)?;
            Some(vec![(u1, u2), (t1, t2)])
        }
        (GraphElement::Hyperedge(e1), GraphElement::Hyperedge(e2)) => {
            if left.edge_label(e1) != right.edge_label(e2) {
                return None;
            }
            Some(
                left.attached_nodes(e1)
                    .iter()
                    .copied()
                    .zip(right.attached_nodes(e2).iter().copied())
                    .collect(),
            )
        }
        (GraphElement::Node(n1), GraphElement::Node(n2)) => Some(vec![(n1, n2)]),
        _ => None,
    }
}

/// The three-valued compatibility predicate of the enumerator.
pub fn pair_compatibility(
    left: &HeapConfiguration,
    right: &HeapConfiguration,
    overlapping: &Overlapping,
    pair: (GraphElement, GraphElement),
) -> Compatibility {
    let Some(induced) = induced_identifications(left, right, pair) else {
        return Compatibility::Incompatible;
    };
    for (l, r) in &induced {
        if left.node_type(*l) != right.node_type(*r) {
            return Compatibility::Incompatible;
        }
    }
    if pair.0.is_edge()
        && (overlapping.is_left_matched(pair.0) || overlapping.is_right_matched(pair.1))
    {
        return Compatibility::NotCompatibleYet;
    }
    // the pair's own identifications must agree among themselves and with
    // what is already fixed
    let mut local: BTreeMap<NodeId, NodeId> = BTreeMap::new();
    let mut local_rev: BTreeMap<NodeId, NodeId> = BTreeMap::new();
    for (l, r) in &induced {
        if overlapping.node_image(*l).is_some_and(|m| m != *r)
            || overlapping.node_preimage(*r).is_some_and(|m| m != *l)
            || local.insert(*l, *r).is_some_and(|m| m != *r)
            || local_rev.insert(*r, *l).is_some_and(|m| m != *l)
        {
            return Compatibility::NotCompatibleYet;
        }
    }
    Compatibility::Compatible
}

/// Whether a node carries any incident element outside the shared part.
fn has_unmatched_incidence(
    hc: &HeapConfiguration,
    node: NodeId,
    matched: &SortedSet<GraphElement>,
) -> bool {
    hc.selectors_of(node)
        .iter()
        .any(|(label, _)| !matched.contains(&GraphElement::Selector(node, *label)))
        || hc
            .incoming_selectors(node)
            .iter()
            .any(|(source, label)| !matched.contains(&GraphElement::Selector(*source, *label)))
        || hc
            .attached_hyperedges(node)
            .iter()
            .any(|edge| !matched.contains(&GraphElement::Hyperedge(*edge)))
        || hc.attached_variables(node).next().is_some()
}

/// The separation condition on edge overlappings: every unmatched edge must
/// keep clear of shared nodes that are internal on the other side, so that
/// the joint graph splits into a glue region plus two reducible regions.
pub fn is_edge_overlapping_valid(
    left: &HeapConfiguration,
    right: &HeapConfiguration,
    overlapping: &Overlapping,
) -> bool {
    for (l, r) in overlapping.node_correspondence() {
        if has_unmatched_incidence(left, *l, &overlapping.matched_left) && !right.is_external(*r) {
            return false;
        }
        if has_unmatched_incidence(right, *r, &overlapping.matched_right) && !left.is_external(*l) {
            return false;
        }
    }
    true
}

/// Whether gluing would put two equal-labeled selectors with distinct targets
/// on one merged node. No heap configuration can contain such an overlap of
/// rule applications.
fn induces_selector_conflict(
    left: &HeapConfiguration,
    right: &HeapConfiguration,
    overlapping: &Overlapping,
) -> bool {
    for (l, r) in overlapping.node_correspondence() {
        for (label, left_target) in left.selectors_of(*l) {
            if let Some(right_target) = right.select_target(*r, *label)
                && overlapping.node_image(*left_target) != Some(right_target)
            {
                return true;
            }
        }
    }
    false
}

type WorkItem = (Overlapping, Rc<Vec<usize>>);

/// Breadth-first enumeration over candidate pairs: popping an item yields its
/// overlapping (when the phase-specific filter accepts it) and enqueues every
/// compatible single-pair extension.
struct PhaseQueue {
    queue: VecDeque<WorkItem>,
}

impl PhaseQueue {
    fn seeded(start: Overlapping, candidate_count: usize) -> Self {
        let all: Vec<usize> = (0..candidate_count).collect();
        let mut queue = VecDeque::new();
        queue.push_back((start, Rc::new(all)));
        PhaseQueue { queue }
    }

    /// Pop the next overlapping, pushing its children. `compat` classifies a
    /// candidate against an overlapping.
    fn advance(
        &mut self,
        mut compat: impl FnMut(&Overlapping, usize) -> Compatibility,
        mut extend: impl FnMut(&Overlapping, usize) -> Overlapping,
    ) -> Option<Overlapping> {
        let (overlapping, remaining) = self.queue.pop_front()?;
        let verdicts: Vec<Compatibility> = remaining
            .iter()
            .map(|idx| compat(&overlapping, *idx))
            .collect();
        for (position, idx) in remaining.iter().enumerate() {
            if verdicts[position] != Compatibility::Compatible {
                continue;
            }
            let child = extend(&overlapping, *idx);
            let child_remaining: Vec<usize> = remaining
                .iter()
                .enumerate()
                .filter(|(p, _)| match verdicts[*p] {
                    Compatibility::Incompatible => false,
                    Compatibility::Compatible => *p > position,
                    Compatibility::NotCompatibleYet => true,
                })
                .map(|(_, i)| *i)
                .collect();
            self.queue.push_back((child, Rc::new(child_remaining)));
        }
        Some(overlapping)
    }
}

/// Lazily yields every valid edge overlapping of two configurations,
/// including the empty one.
pub struct EdgeOverlappings<'a> {
    left: &'a HeapConfiguration,
    right: &'a HeapConfiguration,
    candidates: Vec<(GraphElement, GraphElement)>,
    queue: PhaseQueue,
}

impl<'a> EdgeOverlappings<'a> {
    pub fn new(left: &'a HeapConfiguration, right: &'a HeapConfiguration) -> Self {
        let mut candidates = Vec::new();
        for le in left.edge_elements() {
            for re in right.edge_elements() {
                // label and kind mismatches are permanently incompatible and
                // never enter the candidate list
                if induced_identifications(left, right, (le, re)).is_some() {
                    candidates.push((le, re));
                }
            }
        }
        trace!(candidates = candidates.len(), "edge phase candidates");
        let queue = PhaseQueue::seeded(Overlapping::empty(), candidates.len());
        EdgeOverlappings {
            left,
            right,
            candidates,
            queue,
        }
    }
}

impl Iterator for EdgeOverlappings<'_> {
    type Item = Overlapping;

    fn next(&mut self) -> Option<Overlapping> {
        let (left, right) = (self.left, self.right);
        let candidates = &self.candidates;
        loop {
            let overlapping = self.queue.advance(
                |o, idx| pair_compatibility(left, right, o, candidates[idx]),
                |o, idx| {
                    let pair = candidates[idx];
                    let induced = induced_identifications(left, right, pair)
                        .expect("candidate pairs always induce identifications");
                    o.extended(pair, &induced)
                },
            )?;
            // invalid overlappings still extend to valid ones: matching the
            // offending edge later restores the separation condition
            if is_edge_overlapping_valid(left, right, &overlapping) {
                return Some(overlapping);
            }
        }
    }
}

/// Node-phase extensions of one valid edge overlapping.
pub struct NodeOverlappings<'a> {
    left: &'a HeapConfiguration,
    right: &'a HeapConfiguration,
    candidates: Vec<(GraphElement, GraphElement)>,
    queue: PhaseQueue,
}

impl<'a> NodeOverlappings<'a> {
    pub fn new(
        left: &'a HeapConfiguration,
        right: &'a HeapConfiguration,
        base: Overlapping,
    ) -> Self {
        let mut candidates = Vec::new();
        for n1 in left.node_ids() {
            if base.node_image(n1).is_some() {
                continue;
            }
            for n2 in right.node_ids() {
                if base.node_preimage(n2).is_some()
                    || left.node_type(n1) != right.node_type(n2)
                {
                    continue;
                }
                // violation points: a node with unmatched incidences cannot
                // be identified with a node that is internal on the other
                // side (the edge set is fixed in this phase, so this is
                // decided per pair)
                if has_unmatched_incidence(left, n1, &base.matched_left)
                    && !right.is_external(n2)
                {
                    continue;
                }
                if has_unmatched_incidence(right, n2, &base.matched_right)
                    && !left.is_external(n1)
                {
                    continue;
                }
                candidates.push((GraphElement::Node(n1), GraphElement::Node(n2)));
            }
        }
        let queue = PhaseQueue::seeded(base, candidates.len());
        NodeOverlappings {
            left,
            right,
            candidates,
            queue,
        }
    }
}

impl Iterator for NodeOverlappings<'_> {
    type Item = Overlapping;

    fn next(&mut self) -> Option<Overlapping> {
        let (left, right) = (self.left, self.right);
        let candidates = &self.candidates;
        self.queue.advance(
            |o, idx| pair_compatibility(left, right, o, candidates[idx]),
            |o, idx| {
                let pair = candidates[idx];
                let induced = induced_identifications(left, right, pair)
                    .expect("candidate pairs always induce identifications");
                o.extended(pair, &induced)
            },
        )
    }
}

/// The complete enumerator: every `(edge, node)` overlapping of two
/// right-hand sides that identifies at least one node pair and admits a
/// functional gluing.
///
/// The sequence is finite, deterministic, and restartable by constructing a
/// fresh value; a single work queue drives it, so it is not shareable across
/// concurrent consumers.
pub struct Overlappings<'a> {
    left: &'a HeapConfiguration,
    right: &'a HeapConfiguration,
    edges: EdgeOverlappings<'a>,
    nodes: Option<NodeOverlappings<'a>>,
}

pub fn overlappings<'a>(
    left: &'a HeapConfiguration,
    right: &'a HeapConfiguration,
) -> Overlappings<'a> {
    Overlappings {
        left,
        right,
        edges: EdgeOverlappings::new(left, right),
        nodes: None,
    }
}

impl Iterator for Overlappings<'_> {
    type Item = Overlapping;

    fn next(&mut self) -> Option<Overlapping> {
        loop {
            if let Some(nodes) = &mut self.nodes {
                for overlapping in nodes.by_ref() {
                    if overlapping.node_correspondence().is_empty() {
                        continue;
                    }
                    if induces_selector_conflict(self.left, self.right, &overlapping) {
                        continue;
                    }
                    return Some(overlapping);
                }
                self.nodes = None;
            }
            let base = self.edges.next()?;
            self.nodes = Some(NodeOverlappings::new(self.left, self.right, base));
        }
    }
}
