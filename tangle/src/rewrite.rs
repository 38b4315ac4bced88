//! Backward and forward rule application: folding a matched right-hand side
//! into a nonterminal hyperedge, and materializing a hyperedge back into a
//! right-hand side. Both produce new configurations; inputs are never
//! mutated.

use crate::embedding::Embedding;
use crate::error::TangleError;
use crate::grammar::GrammarRule;
use std::collections::BTreeSet;
use tangle_heap::{EdgeId, HeapConfiguration, NodeId};

/// Replace the image of `rule`'s right-hand side in `target` by one
/// nonterminal hyperedge attached at the external correspondence.
///
/// Internal images are removed together with every matched edge; for
/// collapsed rules the new edge's tentacles run through the recorded
/// external-index mapping, so the edge always has full rank.
pub fn fold_embedding(
    target: &HeapConfiguration,
    rule: &GrammarRule,
    embedding: &Embedding,
) -> Result<HeapConfiguration, TangleError> {
    let pattern = rule.rhs();
    let removed_nodes: BTreeSet<NodeId> = embedding.internal_images(pattern).into_iter().collect();
    let matched_edges: BTreeSet<EdgeId> = embedding.edge_images().iter().copied().collect();
    let matched_selectors: BTreeSet<(NodeId, tangle_heap::SelectorLabel)> = pattern
        .node_ids()
        .flat_map(|n| {
            pattern
                .selectors_of(n)
                .iter()
                .map(move |(label, _)| (embedding.node_image(n), *label))
        })
        .collect();

    let mut builder = HeapConfiguration::builder();
    let mut map: Vec<Option<NodeId>> = vec![None; target.node_count()];
    for node in target.node_ids() {
        if !removed_nodes.contains(&node) {
            map[node.index()] = Some(builder.add_node(target.node_type(node)));
        }
    }
    let image = |n: NodeId| map[n.index()].ok_or(tangle_heap::HeapError::UnknownNode);

    for node in target.node_ids() {
        if removed_nodes.contains(&node) {
            continue;
        }
        for (label, selector_target) in target.selectors_of(node) {
            if matched_selectors.contains(&(node, *label)) {
                continue;
            }
            builder.add_selector(image(node)?, *label, image(*selector_target)?)?;
        }
    }
    for edge in target.edge_ids() {
        if matched_edges.contains(&edge) {
            continue;
        }
        let tentacles = target
            .attached_nodes(edge)
            .iter()
            .map(|n| image(*n))
            .collect::<Result<Vec<_>, _>>()?;
        builder.add_nonterminal_edge(target.edge_label(edge), &tentacles)?;
    }

    let nonterminal = rule.nonterminal();
    let tentacles = (0..nonterminal.rank())
        .map(|position| {
            let collapsed_position = rule.collapsed().collapsed_external_for(position);
            image(embedding.node_image(pattern.external_at(collapsed_position)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    builder.add_nonterminal_edge(nonterminal, &tentacles)?;

    for node in target.externals() {
        builder.set_external(image(*node)?)?;
    }
    for (name, node) in target.variables() {
        builder.add_variable_edge(*name, image(*node)?)?;
    }
    Ok(builder.build()?)
}

/// Expand the hyperedge `edge` of `target` by `rule`'s right-hand side,
/// gluing the rule's externals onto the edge's attachment tuple.
///
/// For collapsed rules, tentacle positions sharing a collapsed external must
/// attach the same node; anything else is a
/// [`TangleError::CollapsedAttachmentMismatch`].
pub fn materialize_edge(
    target: &HeapConfiguration,
    edge: EdgeId,
    rule: &GrammarRule,
) -> Result<HeapConfiguration, TangleError> {
    let nonterminal = rule.nonterminal();
    if target.edge_label(edge) != nonterminal {
        return Err(TangleError::MaterializeLabelMismatch {
            expected: nonterminal,
            found: target.edge_label(edge),
        });
    }
    let rhs = rule.rhs();

    // collapsed external position -> attachment node of the replaced edge
    let mut attachment: Vec<Option<NodeId>> = vec![None; rhs.external_count()];
    for (position, node) in target.attached_nodes(edge).iter().enumerate() {
        let collapsed_position = rule.collapsed().collapsed_external_for(position);
        match attachment[collapsed_position] {
            Some(existing) if existing != *node => {
                return Err(TangleError::CollapsedAttachmentMismatch);
            }
            _ => attachment[collapsed_position] = Some(*node),
        }
    }

    let mut builder = target.to_builder();
    // rhs node -> node of the expanded configuration
    let mut map: Vec<NodeId> = Vec::with_capacity(rhs.node_count());
    for node in rhs.node_ids() {
        match rhs.external_position(node) {
            Some(position) => {
                map.push(attachment[position].ok_or(TangleError::CollapsedAttachmentMismatch)?)
            }
            None => map.push(builder.add_node(rhs.node_type(node))),
        }
    }
    for node in rhs.node_ids() {
        for (label, selector_target) in rhs.selectors_of(node) {
            builder.add_selector(map[node.index()], *label, map[selector_target.index()])?;
        }
    }
    for inner in rhs.edge_ids() {
        let tentacles: Vec<NodeId> = rhs
            .attached_nodes(inner)
            .iter()
            .map(|n| map[n.index()])
            .collect();
        builder.add_nonterminal_edge(rhs.edge_label(inner), &tentacles)?;
    }
    builder.remove_nonterminal_edge(edge)?;
    Ok(builder.build()?)
}
