//! Hypergraph heap-configuration model for grammar-based shape analysis.
//!
//! A [`HeapConfiguration`] is a typed hypergraph modeling one program memory
//! state: nodes are memory cells, selector edges are fields, nonterminal
//! hyperedges stand for abstracted substructures, and the ordered external
//! sequence is the interface a rule right-hand side exposes. Values are
//! constructed once through [`HeapConfigurationBuilder`] and immutable
//! afterwards; every transformation in the analysis layer produces a new
//! value.

pub mod collapsed;
pub mod element;
mod error;
pub mod heap;
pub mod iso;
pub mod symbols;

pub use collapsed::{CollapsedHeapConfiguration, collapsed_variants};
pub use element::GraphElement;
pub use error::HeapError;
pub use heap::{EdgeId, HeapConfiguration, HeapConfigurationBuilder, NodeId};
pub use iso::{isomorphic, isomorphic_modulo_externals};
pub use symbols::{Nonterminal, SelectorLabel, SymbolTable, Type, VariableName};
