//! Per-run summaries

use loopabs_cbmc::{VerificationOutcome, VerificationStatus};
use loopabs_core::AbstractionResult;
use loopabs_store::MergeReport;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Number of example ids shown per failure category
pub const EXAMPLES_PER_CATEGORY: usize = 5;

/// Counts from the abstraction stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbstractionSummary {
    pub total: usize,
    pub abstracted: usize,
    /// Rejected loops by reason
    pub rejected: BTreeMap<&'static str, usize>,
    /// Loops the rewriter could not attempt
    pub errors: usize,
}

impl AbstractionSummary {
    pub fn record(&mut self, result: &AbstractionResult) {
        self.total += 1;
        match &result.rejection {
            Some(rejection) => *self.rejected.entry(rejection.kind()).or_default() += 1,
            None if result.is_abstracted() => self.abstracted += 1,
            None => *self.rejected.entry("unsupported").or_default() += 1,
        }
    }

    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }
}

impl fmt::Display for AbstractionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Loops abstracted: {} of {}", self.abstracted, self.total)?;
        for (reason, count) in &self.rejected {
            writeln!(f, "  rejected ({reason}): {count}")?;
        }
        if self.errors > 0 {
            writeln!(f, "  errors: {}", self.errors)?;
        }
        Ok(())
    }
}

/// Per-status verification counts with coverage and success rate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub total: usize,
    counts: BTreeMap<VerificationStatus, usize>,
    /// Smallest `EXAMPLES_PER_CATEGORY` ids of each non-verified status
    ids: BTreeMap<VerificationStatus, BTreeSet<String>>,
}

impl BatchReport {
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a VerificationOutcome>) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            report.record(outcome);
        }
        report
    }

    pub fn record(&mut self, outcome: &VerificationOutcome) {
        self.total += 1;
        *self.counts.entry(outcome.status).or_default() += 1;
        if outcome.status == VerificationStatus::Verified {
            return;
        }
        let ids = self.ids.entry(outcome.status).or_default();
        if ids.contains(&outcome.loop_id) {
            return;
        }
        if ids.len() >= EXAMPLES_PER_CATEGORY {
            match ids.last() {
                Some(largest) if outcome.loop_id.as_str() < largest.as_str() => {
                    ids.pop_last();
                }
                _ => return,
            }
        }
        ids.insert(outcome.loop_id.clone());
    }

    pub fn count(&self, status: VerificationStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    /// Loops CBMC gave a verdict on
    pub fn attempted(&self) -> usize {
        self.count(VerificationStatus::Verified) + self.count(VerificationStatus::Refuted)
    }

    /// Fraction of all loops that reached a verdict
    pub fn coverage(&self) -> f64 {
        ratio(self.attempted(), self.total)
    }

    /// Fraction of attempted loops that verified
    pub fn success_rate(&self) -> f64 {
        ratio(self.count(VerificationStatus::Verified), self.attempted())
    }

    /// First few ids (in id order) of a non-verified category
    pub fn examples(&self, status: VerificationStatus) -> Vec<&str> {
        self.ids
            .get(&status)
            .map(|ids| {
                ids.iter()
                    .take(EXAMPLES_PER_CATEGORY)
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total loops processed: {}", self.total)?;
        for status in VerificationStatus::ALL {
            writeln!(f, "  {:<9} {}", status.to_string(), self.count(status))?;
        }
        if self.total > 0 {
            writeln!(f, "Coverage (attempted): {:.2}%", self.coverage() * 100.0)?;
            writeln!(f, "Success rate (of attempted): {:.2}%", self.success_rate() * 100.0)?;
        }
        for status in VerificationStatus::ALL {
            let examples = self.examples(status);
            if !examples.is_empty() {
                writeln!(f, "{status} examples: {}", examples.join(", "))?;
            }
        }
        Ok(())
    }
}

/// What a pipeline run did, stage by stage
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub extracted: Option<usize>,
    pub abstraction: Option<AbstractionSummary>,
    pub verification: Option<BatchReport>,
    pub merge: Option<MergeReport>,
}

impl RunSummary {
    /// False only when the clean stage ran and the corpus is too small
    pub fn threshold_met(&self) -> bool {
        self.merge.as_ref().map_or(true, MergeReport::threshold_met)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(n) = self.extracted {
            writeln!(f, "Loops extracted: {n}")?;
        }
        if let Some(summary) = &self.abstraction {
            write!(f, "{summary}")?;
        }
        if let Some(report) = &self.verification {
            write!(f, "{report}")?;
        }
        if let Some(merge) = &self.merge {
            writeln!(
                f,
                "Dataset: {} loops kept, {} skipped, {} incomplete -> {}",
                merge.kept,
                merge.skipped,
                merge.incomplete,
                merge.dataset_path.display()
            )?;
            if !merge.threshold_met() {
                writeln!(
                    f,
                    "Only {} verified loops (< {})",
                    merge.kept, merge.min_corpus_size
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopabs_core::Rejection;
    use std::path::PathBuf;

    fn outcome(id: &str, status: VerificationStatus) -> VerificationOutcome {
        VerificationOutcome::new(id, status, "")
    }

    #[test]
    fn test_rates() {
        let outcomes = vec![
            outcome("a", VerificationStatus::Verified),
            outcome("b", VerificationStatus::Verified),
            outcome("c", VerificationStatus::Verified),
            outcome("d", VerificationStatus::Refuted),
            outcome("e", VerificationStatus::Skipped),
            outcome("f", VerificationStatus::Skipped),
            outcome("g", VerificationStatus::Timeout),
            outcome("h", VerificationStatus::Error),
        ];
        let report = BatchReport::from_outcomes(&outcomes);
        assert_eq!(report.total, 8);
        assert_eq!(report.attempted(), 4);
        assert!((report.coverage() - 0.5).abs() < 1e-9);
        assert!((report.success_rate() - 0.75).abs() < 1e-9);
        assert_eq!(report.count(VerificationStatus::Skipped), 2);
    }

    #[test]
    fn test_empty_report() {
        let report = BatchReport::default();
        assert_eq!(report.coverage(), 0.0);
        assert_eq!(report.success_rate(), 0.0);
        assert!(report.to_string().contains("Total loops processed: 0"));
    }

    #[test]
    fn test_examples_capped_and_sorted() {
        let outcomes: Vec<_> = ["z", "y", "x", "w", "v", "u", "t"]
            .into_iter()
            .map(|id| outcome(id, VerificationStatus::Error))
            .collect();
        let report = BatchReport::from_outcomes(&outcomes);
        assert_eq!(report.examples(VerificationStatus::Error), vec!["t", "u", "v", "w", "x"]);
        assert!(report.examples(VerificationStatus::Verified).is_empty());
    }

    #[test]
    fn test_example_ids_stay_bounded() {
        let mut report = BatchReport::default();
        for i in (0..1000).rev() {
            report.record(&outcome(&format!("loop-{i:04}"), VerificationStatus::Timeout));
        }
        report.record(&outcome("loop-0002", VerificationStatus::Timeout));
        assert_eq!(report.count(VerificationStatus::Timeout), 1001);
        assert_eq!(report.ids[&VerificationStatus::Timeout].len(), EXAMPLES_PER_CATEGORY);
        assert_eq!(
            report.examples(VerificationStatus::Timeout),
            vec!["loop-0000", "loop-0001", "loop-0002", "loop-0003", "loop-0004"]
        );
    }

    #[test]
    fn test_abstraction_summary() {
        let mut summary = AbstractionSummary::default();
        summary.record(&AbstractionResult {
            loop_id: "a".into(),
            pointer_index_map: Default::default(),
            abstracted_body: Some(String::new()),
            rejection: None,
        });
        summary.record(&AbstractionResult::rejected("b", Rejection::Goto));
        summary.record(&AbstractionResult::rejected("c", Rejection::Goto));
        assert_eq!(summary.abstracted, 1);
        assert_eq!(summary.rejected_total(), 2);
        assert_eq!(summary.rejected["goto"], 2);
    }

    #[test]
    fn test_threshold_only_from_merge() {
        let mut summary = RunSummary::default();
        assert!(summary.threshold_met());
        summary.merge = Some(MergeReport {
            kept: 3,
            skipped: 0,
            incomplete: 0,
            min_corpus_size: 100,
            dataset_path: PathBuf::from("output/dataset.json"),
        });
        assert!(!summary.threshold_met());
        assert!(summary.to_string().contains("Only 3 verified loops"));
    }
}
