//! Abstraction and confluence analysis for hyperedge-replacement heap
//! grammars.
//!
//! The crate takes heap configurations (see [`tangle_heap`]) and a grammar
//! mapping nonterminals to right-hand sides, and provides:
//!
//! - the embedding matcher locating rule occurrences inside a configuration,
//! - the canonicalization strategy folding occurrences until a fixpoint,
//! - the overlapping enumerator and joint-graph builder underlying critical
//!   pair analysis,
//! - the critical-pair finder classifying every rule overlap by joinability,
//! - the completion search repairing a non-confluent grammar.

pub mod canonicalization;
pub mod completion;
pub mod confluence;
pub mod embedding;
mod error;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod grammar;
pub mod morphism;
pub mod rewrite;

pub use tangle_heap as heap;

pub use canonicalization::{CanonicalizationMode, CanonicalizationStrategy};
pub use completion::{
    CompletionAlgorithm, CompletionHeuristic, CompletionLoss, CompletionResult, CompletionState,
    CompletionStrategy,
};
pub use confluence::{ConfluenceAnalysis, CriticalPair, CriticalPairFinder, Joinability};
pub use embedding::{Embedding, EmbeddingOptions, TypeCompatibility};
pub use error::TangleError;
pub use grammar::validity::GrammarValidity;
pub use grammar::{Grammar, GrammarRule, NamedGrammar, RuleIdentity, RuleStatus};
