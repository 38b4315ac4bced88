use crate::error::HeapError;
use crate::heap::HeapConfiguration;
use crate::symbols::Nonterminal;
use serde::Serialize;

/// A right-hand side together with its collapsed variant, if any.
///
/// `original_to_collapsed` maps each original external position (that is,
/// each tentacle position of the owning nonterminal) to a position in the
/// collapsed external sequence; `None` means the value is itself an
/// original, uncollapsed right-hand side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollapsedHeapConfiguration {
    original: HeapConfiguration,
    collapsed: HeapConfiguration,
    original_to_collapsed: Option<Vec<usize>>,
}

impl CollapsedHeapConfiguration {
    /// Wrap an uncollapsed right-hand side.
    pub fn original(hc: HeapConfiguration) -> Self {
        CollapsedHeapConfiguration {
            collapsed: hc.clone(),
            original: hc,
            original_to_collapsed: None,
        }
    }

    /// Collapse `original` according to a partition of its external
    /// positions (see [`HeapConfigurationBuilder::merge_externals`]).
    ///
    /// [`HeapConfigurationBuilder::merge_externals`]:
    /// crate::heap::HeapConfigurationBuilder::merge_externals
    pub fn collapse(
        original: HeapConfiguration,
        partition: &[Vec<usize>],
    ) -> Result<Self, HeapError> {
        let mut builder = original.to_builder();
        builder.merge_externals(partition)?;
        let collapsed = builder.build()?;
        let mut mapping = vec![0usize; original.external_count()];
        let mut blocks: Vec<&Vec<usize>> = partition.iter().collect();
        blocks.sort_by_key(|block| block.iter().min().copied());
        for (collapsed_position, block) in blocks.iter().enumerate() {
            for original_position in block.iter() {
                mapping[*original_position] = collapsed_position;
            }
        }
        Ok(CollapsedHeapConfiguration {
            original,
            collapsed,
            original_to_collapsed: Some(mapping),
        })
    }

    /// The right-hand side as it is matched and glued: the collapsed value
    /// for collapsed variants, the original otherwise.
    pub fn rhs(&self) -> &HeapConfiguration {
        &self.collapsed
    }

    pub fn original_rhs(&self) -> &HeapConfiguration {
        &self.original
    }

    pub fn is_collapsed(&self) -> bool {
        self.original_to_collapsed.is_some()
    }

    pub fn index_map(&self) -> Option<&[usize]> {
        self.original_to_collapsed.as_deref()
    }

    /// The collapsed external position a tentacle at `original_position`
    /// attaches through.
    pub fn collapsed_external_for(&self, original_position: usize) -> usize {
        match &self.original_to_collapsed {
            Some(map) => map[original_position],
            None => original_position,
        }
    }
}

/// All proper collapsed variants of a rule right-hand side.
///
/// Enumerates every partition of the external positions in which at least one
/// block merges two or more positions, skipping partitions that merge a
/// reduction tentacle of the owning nonterminal or externals of distinct
/// types. Deterministic: partitions are generated in restricted-growth-string
/// order.
pub fn collapsed_variants(
    nonterminal: Nonterminal,
    original: &HeapConfiguration,
) -> Vec<CollapsedHeapConfiguration> {
    let n = original.external_count();
    if n < 2 {
        return Vec::new();
    }
    let mut out = Vec::new();
    for partition in partitions(n) {
        if partition.len() == n {
            continue; // identity partition: the original rule itself
        }
        let mergeable = partition.iter().all(|block| {
            block.len() == 1
                || block.iter().all(|position| {
                    !nonterminal.is_reduction_tentacle(*position)
                        && original.node_type(original.external_at(*position))
                            == original.node_type(original.external_at(block[0]))
                })
        });
        if !mergeable {
            continue;
        }
        match CollapsedHeapConfiguration::collapse(original.clone(), &partition) {
            Ok(collapsed) => out.push(collapsed),
            Err(_) => {
                // merging produced conflicting selectors; no heap can embed
                // this variant, so it contributes no rule
            }
        }
    }
    out
}

/// All partitions of `0..n` as sorted blocks, in restricted-growth order.
fn partitions(n: usize) -> Vec<Vec<Vec<usize>>> {
    let mut out = Vec::new();
    let mut assignment = vec![0usize; n];
    enumerate_partitions(n, 1, &mut assignment, &mut out);
    out
}

fn enumerate_partitions(
    n: usize,
    position: usize,
    assignment: &mut Vec<usize>,
    out: &mut Vec<Vec<Vec<usize>>>,
) {
    if position == n {
        let blocks = assignment.iter().max().copied().unwrap_or(0) + 1;
        let mut partition = vec![Vec::new(); blocks];
        for (index, block) in assignment.iter().enumerate() {
            partition[*block].push(index);
        }
        out.push(partition);
        return;
    }
    let max_used = assignment[..position].iter().max().copied().unwrap_or(0);
    for block in 0..=max_used + 1 {
        assignment[position] = block;
        enumerate_partitions(n, position + 1, assignment, out);
    }
    assignment[position] = 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolTable;

    #[test]
    fn partition_counts_are_bell_numbers() {
        assert_eq!(partitions(1).len(), 1);
        assert_eq!(partitions(2).len(), 2);
        assert_eq!(partitions(3).len(), 5);
        assert_eq!(partitions(4).len(), 15);
    }

    fn two_external_rhs() -> (Nonterminal, HeapConfiguration) {
        let mut table = SymbolTable::new();
        let ty = table.ty("T");
        let next = table.selector("next");
        let nt = table.nonterminal("L", 2).unwrap();
        let mut builder = HeapConfiguration::builder();
        let nodes = builder.add_nodes(ty, 2);
        builder.add_selector(nodes[0], next, nodes[1]).unwrap();
        builder.set_external(nodes[0]).unwrap();
        builder.set_external(nodes[1]).unwrap();
        (nt, builder.build().unwrap())
    }

    #[test]
    fn collapse_maps_original_positions() {
        let (_, rhs) = two_external_rhs();
        let collapsed =
            CollapsedHeapConfiguration::collapse(rhs.clone(), &[vec![0, 1]]).unwrap();
        assert!(collapsed.is_collapsed());
        assert_eq!(collapsed.rhs().external_count(), 1);
        assert_eq!(collapsed.collapsed_external_for(0), 0);
        assert_eq!(collapsed.collapsed_external_for(1), 0);
        assert_eq!(collapsed.original_rhs(), &rhs);
    }

    #[test]
    fn variants_of_a_list_rule() {
        let (nt, rhs) = two_external_rhs();
        let variants = collapsed_variants(nt, &rhs);
        // positions {0,1} merged into a single self-loop external
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].rhs().node_count(), 1);
        assert_eq!(variants[0].rhs().external_count(), 1);
    }

    #[test]
    fn reduction_tentacles_never_merge() {
        let mut table = SymbolTable::new();
        let nt = table
            .nonterminal_with_tentacles("L", 2, &[false, true])
            .unwrap();
        let (_, rhs) = two_external_rhs();
        assert!(collapsed_variants(nt, &rhs).is_empty());
    }
}
