use tangle_heap::{HeapError, Nonterminal};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TangleError {
    #[error("Error building a heap configuration")]
    Heap(#[from] HeapError),
    #[error("Right-hand side for {nonterminal} has {actual} externals, rank is {expected}")]
    RuleArityMismatch {
        nonterminal: Nonterminal,
        expected: usize,
        actual: usize,
    },
    #[error("No rule with original index {0} exists in this grammar")]
    UnknownRule(usize),
    #[error("Tried to merge nonterminals of distinct ranks {kept} and {merged}")]
    NonterminalRankMismatch { kept: Nonterminal, merged: Nonterminal },
    #[error("Nonterminal joining only applies to confluence-generated nonterminals")]
    MergeRequiresGeneratedNonterminals,
    #[error("A completion algorithm needs at least one heuristic")]
    NoHeuristicsConfigured,
    #[error("A hyperedge fitting a collapsed rule must repeat the merged attachment nodes")]
    CollapsedAttachmentMismatch,
    #[error("Materialized a hyperedge labeled {found} with a rule producing {expected}")]
    MaterializeLabelMismatch {
        expected: Nonterminal,
        found: Nonterminal,
    },
}
