//! Critical-pair search: does the order of backward rule applications
//! matter?
//!
//! For every unordered pair of individual (collapsed) abstraction rules and
//! every valid overlapping of their right-hand sides, the finder glues the
//! joint configuration, folds each occurrence first, canonicalizes both
//! reducts, and classifies the divergence. Strongly joinable overlappings
//! witness no ambiguity and are discarded; a grammar is backward confluent
//! iff no critical pair remains.

mod critical_pair;
mod joinability;

pub use critical_pair::CriticalPair;
pub use joinability::Joinability;

use crate::canonicalization::{CanonicalizationMode, CanonicalizationStrategy};
use crate::embedding::EmbeddingOptions;
use crate::error::TangleError;
use crate::grammar::{Grammar, GrammarRule};
use crate::morphism::{JointHeapConfiguration, overlappings};
use crate::rewrite::fold_embedding;
use itertools::Itertools;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use tangle_heap::{HeapConfiguration, isomorphic};
use tracing::{debug, info};

/// The outcome of a confluence analysis.
#[derive(Debug, Clone)]
pub struct ConfluenceAnalysis {
    critical_pairs: Vec<CriticalPair>,
    examined_overlappings: usize,
}

impl ConfluenceAnalysis {
    /// The retained (not strongly joinable) critical pairs.
    pub fn critical_pairs(&self) -> &[CriticalPair] {
        &self.critical_pairs
    }

    pub fn examined_overlappings(&self) -> usize {
        self.examined_overlappings
    }

    /// A grammar is backward confluent iff its critical-pair set is empty.
    pub fn is_confluent(&self) -> bool {
        self.critical_pairs.is_empty()
    }

    /// The collective joinability of the retained pairs.
    pub fn joinability(&self) -> Joinability {
        Joinability::collective(self.critical_pairs.iter().map(|p| p.joinability()))
    }
}

/// Enumerates and classifies the critical pairs of a grammar.
#[derive(Debug, Clone)]
pub struct CriticalPairFinder {
    grammar: Grammar,
    options: EmbeddingOptions,
}

impl CriticalPairFinder {
    /// Seal the grammar (generating collapsed rule variants) and prepare the
    /// finder.
    pub fn new(grammar: &Grammar, options: EmbeddingOptions) -> Self {
        CriticalPairFinder {
            grammar: grammar.with_collapsed_rules(),
            options,
        }
    }

    /// The sealed grammar the finder operates on.
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Run the full critical-pair search.
    pub fn find(&self) -> Result<ConfluenceAnalysis, TangleError> {
        let rules: Vec<(usize, &GrammarRule)> = self.grammar.abstraction_rules().collect();
        let pairs: Vec<(&GrammarRule, &GrammarRule)> = rules
            .iter()
            .combinations_with_replacement(2)
            .map(|pair| (pair[0].1, pair[1].1))
            .collect();

        #[cfg(feature = "rayon")]
        let examined: Vec<(Vec<CriticalPair>, usize)> = pairs
            .par_iter()
            .map(|(left, right)| self.examine_rule_pair(left, right))
            .collect::<Result<_, _>>()?;
        #[cfg(not(feature = "rayon"))]
        let examined: Vec<(Vec<CriticalPair>, usize)> = pairs
            .iter()
            .map(|(left, right)| self.examine_rule_pair(left, right))
            .collect::<Result<_, _>>()?;

        let mut critical_pairs = Vec::new();
        let mut examined_overlappings = 0;
        for (found, overlap_count) in examined {
            critical_pairs.extend(found);
            examined_overlappings += overlap_count;
        }
        info!(
            rules = rules.len(),
            examined_overlappings,
            critical_pairs = critical_pairs.len(),
            "critical pair search finished"
        );
        Ok(ConfluenceAnalysis {
            critical_pairs,
            examined_overlappings,
        })
    }

    /// Classify every valid overlapping of one unordered rule pair.
    fn examine_rule_pair(
        &self,
        left_rule: &GrammarRule,
        right_rule: &GrammarRule,
    ) -> Result<(Vec<CriticalPair>, usize), TangleError> {
        let lenient = CanonicalizationStrategy::new(
            self.grammar.clone(),
            self.options.clone(),
            CanonicalizationMode::Lenient,
        );
        let exhaustive = CanonicalizationStrategy::new(
            self.grammar.clone(),
            self.options.clone(),
            CanonicalizationMode::Exhaustive,
        );

        // the abstraction strategy vetoes matches of blocked shapes, so an
        // overlapping involving one cannot diverge in any reachable state
        if self.grammar.is_abstraction_blocked(left_rule.rhs())
            || self.grammar.is_abstraction_blocked(right_rule.rhs())
        {
            debug!(
                left = %left_rule.identity(),
                right = %right_rule.identity(),
                "rule pair suppressed by blocking configuration"
            );
            return Ok((Vec::new(), 0));
        }

        let mut found = Vec::new();
        let mut examined = 0usize;
        for overlapping in overlappings(left_rule.rhs(), right_rule.rhs()) {
            examined += 1;
            let joint = JointHeapConfiguration::glue(
                left_rule.rhs(),
                right_rule.rhs(),
                &overlapping,
            )?;
            let left_reduct = fold_embedding(joint.heap(), left_rule, &joint.left_embedding())?;
            let right_reduct =
                fold_embedding(joint.heap(), right_rule, &joint.right_embedding())?;

            let left_canonical = single(lenient.canonicalize(&left_reduct)?);
            let right_canonical = single(lenient.canonicalize(&right_reduct)?);
            if isomorphic(&left_canonical, &right_canonical) {
                continue; // strongly joinable, no ambiguity witnessed
            }

            // the deterministic reductions diverge; look for reconvergence
            // along any pair of maximal reduction sequences
            let left_forms = exhaustive.canonicalize(&left_reduct)?;
            let right_forms = exhaustive.canonicalize(&right_reduct)?;
            let weakly = left_forms
                .iter()
                .any(|l| right_forms.iter().any(|r| isomorphic(l, r)));
            let joinability = if weakly {
                Joinability::WeaklyJoinable
            } else {
                Joinability::NotJoinable
            };
            debug!(
                left = %left_rule.identity(),
                right = %right_rule.identity(),
                shared = overlapping.len(),
                ?joinability,
                "retained critical pair"
            );
            found.push(CriticalPair::new(
                left_rule.identity(),
                right_rule.identity(),
                left_rule.nonterminal(),
                right_rule.nonterminal(),
                overlapping.pairs(),
                joint.heap().clone(),
                left_canonical,
                right_canonical,
                joinability,
            ));
        }
        Ok((found, examined))
    }
}

/// Convenience wrapper: is the grammar backward confluent?
pub fn is_confluent(grammar: &Grammar, options: EmbeddingOptions) -> Result<bool, TangleError> {
    Ok(CriticalPairFinder::new(grammar, options)
        .find()?
        .is_confluent())
}

fn single(mut forms: Vec<HeapConfiguration>) -> HeapConfiguration {
    debug_assert_eq!(forms.len(), 1, "lenient canonicalization yields one form");
    forms.swap_remove(0)
}
