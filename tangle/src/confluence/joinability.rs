use serde::Serialize;

/// Whether two diverging reductions from an overlap reconverge.
///
/// Totally ordered: `NotJoinable < WeaklyJoinable < StronglyJoinable`. The
/// joinability of a set of pairs is the minimum over its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Joinability {
    NotJoinable,
    WeaklyJoinable,
    StronglyJoinable,
}

impl Joinability {
    /// The collective joinability of a set of pairs: the minimum, or
    /// `StronglyJoinable` for the empty set.
    pub fn collective<I>(joinabilities: I) -> Joinability
    where
        I: IntoIterator<Item = Joinability>,
    {
        joinabilities
            .into_iter()
            .min()
            .unwrap_or(Joinability::StronglyJoinable)
    }
}

#[cfg(test)]
mod tests {
    use super::Joinability::*;

    #[test]
    fn total_order() {
        assert!(NotJoinable < WeaklyJoinable);
        assert!(WeaklyJoinable < StronglyJoinable);
    }

    #[test]
    fn collective_is_the_minimum_in_any_order() {
        use super::Joinability;
        let permutations = [
            vec![StronglyJoinable, WeaklyJoinable, NotJoinable],
            vec![NotJoinable, StronglyJoinable, WeaklyJoinable],
            vec![WeaklyJoinable, NotJoinable, StronglyJoinable],
        ];
        for p in permutations {
            assert_eq!(Joinability::collective(p), NotJoinable);
        }
        assert_eq!(
            Joinability::collective([StronglyJoinable, WeaklyJoinable]),
            WeaklyJoinable
        );
        assert_eq!(Joinability::collective([]), StronglyJoinable);
    }

    #[test]
    fn collective_is_commutative_and_associative() {
        use super::Joinability;
        let values = [NotJoinable, WeaklyJoinable, StronglyJoinable];
        for a in values {
            for b in values {
                assert_eq!(
                    Joinability::collective([a, b]),
                    Joinability::collective([b, a])
                );
                for c in values {
                    assert_eq!(
                        Joinability::collective([Joinability::collective([a, b]), c]),
                        Joinability::collective([a, Joinability::collective([b, c])])
                    );
                }
            }
        }
    }
}
