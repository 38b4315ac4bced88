use crate::error::HeapError;
use internment::Intern;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// A node type. Interned: two `Type` values are equal iff their labels are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Type(Intern<String>);

impl Type {
    /// The wildcard type, compatible with every node type under relaxed
    /// matching. Written `_` in rendered configurations.
    pub fn wildcard() -> Self {
        Type(Intern::new("_".to_string()))
    }

    pub fn is_wildcard(&self) -> bool {
        self.0.as_str() == "_"
    }

    pub fn name(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// A field label for selector edges. Interned, identity equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SelectorLabel(Intern<String>);

impl SelectorLabel {
    pub fn name(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for SelectorLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// The name of a program variable attached to a heap node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VariableName(Intern<String>);

impl VariableName {
    /// The distinguished name of the null reference.
    pub fn null() -> Self {
        VariableName(Intern::new("null".to_string()))
    }

    pub fn is_null(&self) -> bool {
        self.0.as_str() == "null"
    }

    pub fn name(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for VariableName {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
struct NonterminalData {
    label: String,
    rank: usize,
    reduction_tentacles: Vec<bool>,
}

/// A grammar nonterminal: an interned label together with a rank and a
/// per-tentacle reduction flag.
///
/// Two nonterminals are equal iff label, rank, and tentacle profile all
/// agree, so a conflicting redeclaration can never alias an existing symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Nonterminal(Intern<NonterminalData>);

impl Nonterminal {
    pub fn label(&self) -> &str {
        &self.0.label
    }

    /// The number of tentacles a hyperedge carrying this label attaches.
    pub fn rank(&self) -> usize {
        self.0.rank
    }

    /// Whether tentacle position `i` is a reduction tentacle. Positions
    /// outside the rank are never reduction tentacles.
    pub fn is_reduction_tentacle(&self, i: usize) -> bool {
        self.0.reduction_tentacles.get(i).copied().unwrap_or(false)
    }
}

impl Display for Nonterminal {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.label(), self.rank())
    }
}

/// A caller-owned symbol factory for one analysis run.
///
/// Symbols are interned values, so equal declarations made through different
/// tables agree; the table's job is catching conflicting nonterminal
/// redeclarations at declaration time instead of deep inside an analysis.
#[derive(Debug, Default)]
pub struct SymbolTable {
    nonterminals: HashMap<String, Nonterminal>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ty(&mut self, name: &str) -> Type {
        Type(Intern::new(name.to_string()))
    }

    pub fn selector(&mut self, name: &str) -> SelectorLabel {
        SelectorLabel(Intern::new(name.to_string()))
    }

    pub fn variable(&mut self, name: &str) -> VariableName {
        VariableName(Intern::new(name.to_string()))
    }

    /// Declare a nonterminal with no reduction tentacles.
    pub fn nonterminal(&mut self, name: &str, rank: usize) -> Result<Nonterminal, HeapError> {
        self.nonterminal_with_tentacles(name, rank, &vec![false; rank])
    }

    /// Declare a nonterminal with an explicit reduction-tentacle profile.
    ///
    /// Redeclaring an identical profile returns the existing symbol; a
    /// conflicting redeclaration is a [`HeapError::NonterminalProfileConflict`].
    pub fn nonterminal_with_tentacles(
        &mut self,
        name: &str,
        rank: usize,
        reduction_tentacles: &[bool],
    ) -> Result<Nonterminal, HeapError> {
        let nt = Nonterminal(Intern::new(NonterminalData {
            label: name.to_string(),
            rank,
            reduction_tentacles: reduction_tentacles.to_vec(),
        }));
        match self.nonterminals.get(name) {
            Some(existing) if *existing != nt => {
                Err(HeapError::NonterminalProfileConflict(name.to_string()))
            }
            _ => {
                self.nonterminals.insert(name.to_string(), nt);
                Ok(nt)
            }
        }
    }

    /// Look up a previously declared nonterminal by label.
    pub fn get_nonterminal(&self, name: &str) -> Option<Nonterminal> {
        self.nonterminals.get(name).copied()
    }

    /// Whether a nonterminal with this label was declared through this table.
    pub fn is_declared(&self, name: &str) -> bool {
        self.nonterminals.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_compare_by_label() {
        let mut table = SymbolTable::new();
        let a = table.selector("next");
        let b = table.selector("next");
        let c = table.selector("prev");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a < c); // lexicographic on the label text
    }

    #[test]
    fn nonterminal_profile_conflict() {
        let mut table = SymbolTable::new();
        let l2 = table.nonterminal("L", 2).unwrap();
        assert_eq!(l2.rank(), 2);
        assert!(!l2.is_reduction_tentacle(0));
        // identical redeclaration is fine
        assert_eq!(table.nonterminal("L", 2).unwrap(), l2);
        // conflicting rank is not
        assert!(table.nonterminal("L", 3).is_err());
        // conflicting tentacle profile is not
        assert!(
            table
                .nonterminal_with_tentacles("L", 2, &[true, false])
                .is_err()
        );
    }

    #[test]
    fn tables_with_equal_declarations_agree() {
        let mut t1 = SymbolTable::new();
        let mut t2 = SymbolTable::new();
        let a = t1.nonterminal("SLL", 2).unwrap();
        let b = t2.nonterminal("SLL", 2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn null_variable() {
        let mut table = SymbolTable::new();
        let null = table.variable("null");
        assert!(null.is_null());
        assert_eq!(null, VariableName::null());
        assert!(!table.variable("x").is_null());
    }
}
