mod named;
pub mod validity;

pub use named::NamedGrammar;

use crate::error::TangleError;
use serde::Serialize;
use std::collections::BTreeMap;
use tangle_heap::{
    CollapsedHeapConfiguration, HeapConfiguration, Nonterminal, collapsed_variants,
    isomorphic_modulo_externals,
};
use tracing::debug;

/// Activation status of a grammar rule.
///
/// Abstraction only uses `Active` and `ConfluenceGenerated` rules;
/// concretization uses every rule, so that states abstracted by a rule that
/// was later deactivated can still be materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RuleStatus {
    Active,
    Inactive,
    ConfluenceGenerated,
}

/// Stable identity of a rule: the index of its original rule plus, for
/// collapsed variants, the variant index. Orders originals before their
/// variants and is the basis of rule deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RuleIdentity {
    pub original_idx: usize,
    pub collapsed_idx: Option<usize>,
}

impl RuleIdentity {
    pub fn original(original_idx: usize) -> Self {
        RuleIdentity {
            original_idx,
            collapsed_idx: None,
        }
    }

    pub fn collapsed(original_idx: usize, collapsed_idx: usize) -> Self {
        RuleIdentity {
            original_idx,
            collapsed_idx: Some(collapsed_idx),
        }
    }
}

impl std::fmt::Display for RuleIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.collapsed_idx {
            Some(c) => write!(f, "r{}.{}", self.original_idx, c),
            None => write!(f, "r{}", self.original_idx),
        }
    }
}

/// One production `nonterminal -> rhs` of a hyperedge-replacement grammar.
#[derive(Debug, Clone)]
pub struct GrammarRule {
    nonterminal: Nonterminal,
    rhs: CollapsedHeapConfiguration,
    status: RuleStatus,
    identity: RuleIdentity,
}

impl GrammarRule {
    pub fn nonterminal(&self) -> Nonterminal {
        self.nonterminal
    }

    /// The right-hand side as matched and glued (the collapsed variant for
    /// collapsed rules).
    pub fn rhs(&self) -> &HeapConfiguration {
        self.rhs.rhs()
    }

    pub fn collapsed(&self) -> &CollapsedHeapConfiguration {
        &self.rhs
    }

    pub fn status(&self) -> RuleStatus {
        self.status
    }

    pub fn identity(&self) -> RuleIdentity {
        self.identity
    }

    /// Whether this rule participates in abstraction.
    pub fn is_abstraction_rule(&self) -> bool {
        !matches!(self.status, RuleStatus::Inactive)
    }
}

/// An immutable hyperedge-replacement grammar.
///
/// Stored as a flat rule table plus a nonterminal index (rules never
/// reference each other directly, so recursive grammars cause no ownership
/// cycles). Every edit produces a new `Grammar` value; the completion search
/// relies on freely sharing unedited ancestors.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    rules: Vec<GrammarRule>,
    index: BTreeMap<Nonterminal, Vec<usize>>,
    blocking: Vec<HeapConfiguration>,
    next_original_idx: usize,
}

impl Grammar {
    /// Build a grammar from `(nonterminal, right-hand side)` productions.
    ///
    /// Every right-hand side must expose exactly `rank` externals.
    pub fn from_rules<I>(productions: I) -> Result<Self, TangleError>
    where
        I: IntoIterator<Item = (Nonterminal, HeapConfiguration)>,
    {
        let mut grammar = Grammar::default();
        for (nonterminal, rhs) in productions {
            check_arity(nonterminal, &rhs)?;
            let identity = RuleIdentity::original(grammar.next_original_idx);
            grammar.next_original_idx += 1;
            grammar.rules.push(GrammarRule {
                nonterminal,
                rhs: CollapsedHeapConfiguration::original(rhs),
                status: RuleStatus::Active,
                identity,
            });
        }
        grammar.rebuild_index();
        Ok(grammar)
    }

    /// A copy of this grammar extended with every collapsed variant of every
    /// original rule that does not have its variants yet. Confluence analysis
    /// operates on sealed grammars.
    pub fn with_collapsed_rules(&self) -> Grammar {
        let mut next = self.clone();
        for rule_idx in 0..self.rules.len() {
            let rule = &self.rules[rule_idx];
            if rule.identity.collapsed_idx.is_some() {
                continue;
            }
            let has_variants = self
                .rules
                .iter()
                .any(|r| r.identity.original_idx == rule.identity.original_idx
                    && r.identity.collapsed_idx.is_some());
            if has_variants {
                continue;
            }
            for (variant_idx, collapsed) in
                collapsed_variants(rule.nonterminal, rule.rhs.original_rhs())
                    .into_iter()
                    .enumerate()
            {
                next.rules.push(GrammarRule {
                    nonterminal: rule.nonterminal,
                    rhs: collapsed,
                    status: rule.status,
                    identity: RuleIdentity::collapsed(rule.identity.original_idx, variant_idx),
                });
            }
        }
        next.sort_rules();
        next
    }

    fn sort_rules(&mut self) {
        self.rules.sort_by_key(|r| r.identity);
        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (idx, rule) in self.rules.iter().enumerate() {
            self.index.entry(rule.nonterminal).or_default().push(idx);
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn rules(&self) -> &[GrammarRule] {
        &self.rules
    }

    pub fn rule(&self, idx: usize) -> &GrammarRule {
        &self.rules[idx]
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = Nonterminal> + '_ {
        self.index.keys().copied()
    }

    pub fn rules_for(&self, nonterminal: Nonterminal) -> impl Iterator<Item = &GrammarRule> {
        self.index
            .get(&nonterminal)
            .into_iter()
            .flatten()
            .map(|idx| &self.rules[*idx])
    }

    /// The rules used when abstracting: `Active` plus `ConfluenceGenerated`.
    pub fn abstraction_rules(&self) -> impl Iterator<Item = (usize, &GrammarRule)> {
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_abstraction_rule())
    }

    /// The rules used when materializing: all of them.
    pub fn concretization_rules(&self) -> impl Iterator<Item = (usize, &GrammarRule)> {
        self.rules.iter().enumerate()
    }

    pub fn abstraction_blocking(&self) -> &[HeapConfiguration] {
        &self.blocking
    }

    /// Whether folding `candidate` (a matched subgraph, externals at the
    /// match boundary) is vetoed by the blocking set.
    pub fn is_abstraction_blocked(&self, candidate: &HeapConfiguration) -> bool {
        self.blocking
            .iter()
            .any(|blocked| isomorphic_modulo_externals(candidate, blocked))
    }

    /// A copy with the status of the original rule `original_idx` (and all
    /// its collapsed variants) replaced.
    pub fn with_rule_status(
        &self,
        original_idx: usize,
        status: RuleStatus,
    ) -> Result<Grammar, TangleError> {
        if !self
            .rules
            .iter()
            .any(|r| r.identity.original_idx == original_idx)
        {
            return Err(TangleError::UnknownRule(original_idx));
        }
        let mut next = self.clone();
        for rule in next.rules.iter_mut() {
            if rule.identity.original_idx == original_idx {
                rule.status = status;
            }
        }
        debug!(original_idx, ?status, "changed rule status");
        Ok(next)
    }

    /// A copy extended with fresh rules for `nonterminal`, receiving strictly
    /// increasing original indices. Collapsed variants of the new rules are
    /// generated alongside.
    pub fn with_added_rules<I>(
        &self,
        nonterminal: Nonterminal,
        right_hand_sides: I,
        status: RuleStatus,
    ) -> Result<Grammar, TangleError>
    where
        I: IntoIterator<Item = HeapConfiguration>,
    {
        let mut next = self.clone();
        for rhs in right_hand_sides {
            check_arity(nonterminal, &rhs)?;
            let original_idx = next.next_original_idx;
            next.next_original_idx += 1;
            for (variant_idx, collapsed) in collapsed_variants(nonterminal, &rhs)
                .into_iter()
                .enumerate()
            {
                next.rules.push(GrammarRule {
                    nonterminal,
                    rhs: collapsed,
                    status,
                    identity: RuleIdentity::collapsed(original_idx, variant_idx),
                });
            }
            next.rules.push(GrammarRule {
                nonterminal,
                rhs: CollapsedHeapConfiguration::original(rhs),
                status,
                identity: RuleIdentity::original(original_idx),
            });
        }
        next.sort_rules();
        Ok(next)
    }

    /// A copy with `candidate` added to the abstraction-blocking set.
    pub fn with_blocking_configuration(&self, candidate: HeapConfiguration) -> Grammar {
        let mut next = self.clone();
        next.blocking.push(candidate);
        next
    }

    /// A copy in which `merged` is replaced by `kept` everywhere: rule
    /// ownership, and every hyperedge label inside every right-hand side.
    /// Rules that become isomorphic duplicates are dropped (lowest identity
    /// wins).
    pub fn with_merged_nonterminals(
        &self,
        kept: Nonterminal,
        merged: Nonterminal,
    ) -> Result<Grammar, TangleError> {
        if kept.rank() != merged.rank() {
            return Err(TangleError::NonterminalRankMismatch { kept, merged });
        }
        let mut next = self.clone();
        for rule in next.rules.iter_mut() {
            if rule.nonterminal == merged {
                rule.nonterminal = kept;
            }
            rule.rhs = relabel_collapsed(&rule.rhs, merged, kept)?;
        }
        // drop rules that collapsed into isomorphic duplicates
        let mut keep: Vec<bool> = vec![true; next.rules.len()];
        for i in 0..next.rules.len() {
            if !keep[i] {
                continue;
            }
            for j in (i + 1)..next.rules.len() {
                if keep[j]
                    && next.rules[i].nonterminal == next.rules[j].nonterminal
                    && tangle_heap::isomorphic(next.rules[i].rhs(), next.rules[j].rhs())
                {
                    keep[j] = false;
                }
            }
        }
        let mut kept_rules = Vec::new();
        for (idx, rule) in next.rules.drain(..).enumerate() {
            if keep[idx] {
                kept_rules.push(rule);
            }
        }
        next.rules = kept_rules;
        next.sort_rules();
        Ok(next)
    }
}

fn check_arity(nonterminal: Nonterminal, rhs: &HeapConfiguration) -> Result<(), TangleError> {
    if rhs.external_count() != nonterminal.rank() {
        return Err(TangleError::RuleArityMismatch {
            nonterminal,
            expected: nonterminal.rank(),
            actual: rhs.external_count(),
        });
    }
    Ok(())
}

fn relabel_collapsed(
    rhs: &CollapsedHeapConfiguration,
    from: Nonterminal,
    to: Nonterminal,
) -> Result<CollapsedHeapConfiguration, TangleError> {
    if !rhs
        .original_rhs()
        .edge_ids()
        .any(|e| rhs.original_rhs().edge_label(e) == from)
    {
        return Ok(rhs.clone());
    }
    let original = relabel(rhs.original_rhs(), from, to)?;
    Ok(match rhs.index_map() {
        None => CollapsedHeapConfiguration::original(original),
        Some(map) => {
            // regroup the recorded mapping into a partition and re-collapse
            let blocks = map.iter().max().map(|m| m + 1).unwrap_or(0);
            let mut partition = vec![Vec::new(); blocks];
            for (original_position, block) in map.iter().enumerate() {
                partition[*block].push(original_position);
            }
            CollapsedHeapConfiguration::collapse(original, &partition)?
        }
    })
}

/// Rebuild `hc` with every `from`-labeled hyperedge relabeled to `to`.
pub(crate) fn relabel(
    hc: &HeapConfiguration,
    from: Nonterminal,
    to: Nonterminal,
) -> Result<HeapConfiguration, TangleError> {
    let mut builder = HeapConfiguration::builder();
    for node in hc.node_ids() {
        builder.add_node(hc.node_type(node));
    }
    for node in hc.node_ids() {
        for (label, target) in hc.selectors_of(node) {
            builder.add_selector(node, *label, *target)?;
        }
    }
    for edge in hc.edge_ids() {
        let label = if hc.edge_label(edge) == from {
            to
        } else {
            hc.edge_label(edge)
        };
        builder.add_nonterminal_edge(label, hc.attached_nodes(edge))?;
    }
    for node in hc.externals() {
        builder.set_external(*node)?;
    }
    for (name, node) in hc.variables() {
        builder.add_variable_edge(*name, *node)?;
    }
    Ok(builder.build()?)
}
