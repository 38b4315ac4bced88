use super::Grammar;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// A grammar with a name and a version counter.
///
/// Versions only ever move forward: deriving a modified grammar yields a new
/// `NamedGrammar` with the version bumped, leaving the receiver untouched.
/// The completion search uses the `(name, version)` pair to label the states
/// it visits.
#[derive(Debug, Clone)]
pub struct NamedGrammar {
    name: String,
    version: u32,
    grammar: Grammar,
}

impl NamedGrammar {
    pub fn new(name: impl Into<String>, grammar: Grammar) -> Self {
        NamedGrammar {
            name: name.into(),
            version: 0,
            grammar,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Wrap an edited grammar as the next version of this one.
    pub fn modified(&self, grammar: Grammar) -> NamedGrammar {
        NamedGrammar {
            name: self.name.clone(),
            version: self.version + 1,
            grammar,
        }
    }
}

impl Display for NamedGrammar {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}@v{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::grammar::RuleStatus;

    #[test]
    fn versions_advance_and_ancestors_are_untouched() {
        let fix = fixtures::list_fixture();
        let named = NamedGrammar::new("sll", fix.grammar);
        assert_eq!(named.version(), 0);
        let edited = named.modified(
            named
                .grammar()
                .with_rule_status(0, RuleStatus::Inactive)
                .unwrap(),
        );
        assert_eq!(edited.version(), 1);
        assert_eq!(named.version(), 0);
        assert_eq!(named.grammar().rule(0).status(), RuleStatus::Active);
        assert_eq!(format!("{edited}"), "sll@v1");
    }
}
