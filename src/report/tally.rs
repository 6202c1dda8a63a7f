//! PASSED/FAILED/SKIPPED counts, derived on demand from the case list.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::scenario::test_case::{TestCase, Verdict};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
}

impl Tally {
    #[must_use]
    pub fn from_verdicts(verdicts: impl IntoIterator<Item = Verdict>) -> Self {
        let mut tally = Self::default();
        for verdict in verdicts {
            match verdict {
                Verdict::Passed => tally.passed += 1,
                Verdict::Failed => tally.failed += 1,
                Verdict::Skipped => tally.skipped += 1,
            }
            tally.total += 1;
        }
        tally
    }

    #[must_use]
    pub fn from_cases(cases: &[TestCase]) -> Self {
        Self::from_verdicts(cases.iter().map(TestCase::verdict))
    }

    /// Skipped cases do not count against the run.
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn verdict_strategy() -> impl Strategy<Value = Verdict> {
        prop_oneof![
            Just(Verdict::Passed),
            Just(Verdict::Failed),
            Just(Verdict::Skipped),
        ]
    }

    #[test]
    fn empty_run_has_no_failures() {
        let tally = Tally::from_cases(&[]);
        assert_eq!(tally, Tally::default());
        assert!(!tally.has_failures());
    }

    #[test]
    fn unfinished_cases_count_as_skipped() {
        let cases = vec![TestCase::new("a", ""), TestCase::new("b", "")];
        let tally = Tally::from_cases(&cases);
        assert_eq!(tally.skipped, 2);
        assert_eq!(tally.total, 2);
    }

    proptest! {
        #[test]
        fn counts_partition_total(verdicts in proptest::collection::vec(verdict_strategy(), 0..40)) {
            let tally = Tally::from_verdicts(verdicts.iter().copied());
            prop_assert_eq!(tally.passed + tally.failed + tally.skipped, tally.total);
            prop_assert_eq!(tally.total, verdicts.len());
        }

        #[test]
        fn failure_flag_tracks_failed_count(verdicts in proptest::collection::vec(verdict_strategy(), 0..40)) {
            let tally = Tally::from_verdicts(verdicts.iter().copied());
            prop_assert_eq!(tally.has_failures(), verdicts.contains(&Verdict::Failed));
        }
    }
}
