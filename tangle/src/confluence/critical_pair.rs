use super::Joinability;
use crate::grammar::RuleIdentity;
use serde::Serialize;
use tangle_heap::{GraphElement, HeapConfiguration, Nonterminal};

/// A reported overlap of two rule applications that is not strongly
/// joinable.
///
/// Carries everything the reporting consumers need: the participating rules,
/// the overlapping (as its ordered pair list), the joint configuration, the
/// two canonical forms the diverging reductions reach, and the
/// classification. Equality is the rule 4-tuple plus the overlapping.
#[derive(Debug, Clone, Serialize)]
pub struct CriticalPair {
    left_rule: RuleIdentity,
    right_rule: RuleIdentity,
    left_nonterminal: Nonterminal,
    right_nonterminal: Nonterminal,
    overlapping_pairs: Vec<(GraphElement, GraphElement)>,
    joint: HeapConfiguration,
    left_canonical: HeapConfiguration,
    right_canonical: HeapConfiguration,
    joinability: Joinability,
}

impl CriticalPair {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        left_rule: RuleIdentity,
        right_rule: RuleIdentity,
        left_nonterminal: Nonterminal,
        right_nonterminal: Nonterminal,
        overlapping_pairs: Vec<(GraphElement, GraphElement)>,
        joint: HeapConfiguration,
        left_canonical: HeapConfiguration,
        right_canonical: HeapConfiguration,
        joinability: Joinability,
    ) -> Self {
        CriticalPair {
            left_rule,
            right_rule,
            left_nonterminal,
            right_nonterminal,
            overlapping_pairs,
            joint,
            left_canonical,
            right_canonical,
            joinability,
        }
    }

    pub fn left_rule(&self) -> RuleIdentity {
        self.left_rule
    }

    pub fn right_rule(&self) -> RuleIdentity {
        self.right_rule
    }

    pub fn left_nonterminal(&self) -> Nonterminal {
        self.left_nonterminal
    }

    pub fn right_nonterminal(&self) -> Nonterminal {
        self.right_nonterminal
    }

    /// The identified element pairs of the overlapping, in insertion order.
    pub fn overlapping_pairs(&self) -> &[(GraphElement, GraphElement)] {
        &self.overlapping_pairs
    }

    /// The glued configuration both rules apply to.
    pub fn joint(&self) -> &HeapConfiguration {
        &self.joint
    }

    /// The canonical form reached by folding the left rule first.
    pub fn left_canonical(&self) -> &HeapConfiguration {
        &self.left_canonical
    }

    pub fn right_canonical(&self) -> &HeapConfiguration {
        &self.right_canonical
    }

    pub fn joinability(&self) -> Joinability {
        self.joinability
    }
}

impl PartialEq for CriticalPair {
    fn eq(&self, other: &Self) -> bool {
        self.left_rule == other.left_rule
            && self.right_rule == other.right_rule
            && self.left_nonterminal == other.left_nonterminal
            && self.right_nonterminal == other.right_nonterminal
            && self.overlapping_pairs == other.overlapping_pairs
    }
}

impl Eq for CriticalPair {}

impl std::fmt::Display for CriticalPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({} ~ {} at {} shared pairs: {:?})",
            self.left_rule,
            self.right_rule,
            self.overlapping_pairs.len(),
            self.joinability
        )
    }
}
