use crate::symbols::{Nonterminal, SelectorLabel, VariableName};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeapError {
    #[error("Referenced a node id that is not part of this configuration")]
    UnknownNode,
    #[error("Referenced a hyperedge id that is not part of this configuration")]
    UnknownEdge,
    #[error("Attached {actual} nodes to a hyperedge labeled {label} of rank {expected}")]
    TentacleCountMismatch {
        label: Nonterminal,
        expected: usize,
        actual: usize,
    },
    #[error("A node already carries a selector labeled {0}")]
    DuplicateSelector(SelectorLabel),
    #[error("A variable named {0} is already attached")]
    DuplicateVariable(VariableName),
    #[error("The node is already part of the external sequence")]
    AlreadyExternal,
    #[error("An external partition referenced position {0}, which does not exist")]
    UnknownExternalPosition(usize),
    #[error("An external partition must cover every external position exactly once")]
    InvalidExternalPartition,
    #[error("An external partition contained an empty block")]
    EmptyPartitionBlock,
    #[error("Tried to merge external nodes of distinct types")]
    MergedExternalTypeMismatch,
    #[error("Nonterminal {0} was already declared with a different rank or tentacle profile")]
    NonterminalProfileConflict(String),
}
