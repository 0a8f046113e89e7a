//! Result-count classifier
//!
//! The endpoint never says whether more results exist. The only signal is
//! structural: when a node that was narrowed turns out to have a subtree
//! holding more distinct identifiers than the node itself returned, the
//! count it reported was truncated. This module keeps one verdict per result
//! count and learns the unknown ones by surveying the query tree.

use crate::state::query_tree::QueryTree;
use crate::SieveError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a reported result count says about the completeness of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CountVerdict {
    /// Queries returning this many results returned everything
    Complete,

    /// Queries returning this many results were cut short
    Truncated,

    /// Not learned yet; treated as truncated until proven otherwise
    Unknown,
}

impl CountVerdict {
    /// Returns true if a query with this verdict must be narrowed
    pub fn needs_narrowing(&self) -> bool {
        !matches!(self, Self::Complete)
    }

    /// Returns true once the verdict has been learned or seeded
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Truncated => "truncated",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CountVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-count evidence gathered during one survey
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Evidence {
    Resolved,
    Truncated,
    Matching(u32),
}

/// Counts promoted by a survey
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurveyReport {
    /// Counts whose verdict became `Complete`
    pub completed: Vec<usize>,

    /// Counts whose verdict became `Truncated`
    pub truncated: Vec<usize>,

    /// Whether the survey ran at all
    pub ran: bool,
}

impl SurveyReport {
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.truncated.is_empty()
    }
}

/// Table of verdicts indexed by result count `0..=max_results`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCountClassifier {
    verdicts: Vec<CountVerdict>,
    streaks: Vec<u32>,
    confirmation_threshold: u32,
}

impl ResultCountClassifier {
    /// Creates a classifier with the deterministic seeding
    ///
    /// Counts 0 and 1 are complete, `max_results` is truncated, and
    /// everything in between is unknown.
    pub fn new(max_results: usize, confirmation_threshold: u32) -> Self {
        let mut verdicts = vec![CountVerdict::Unknown; max_results + 1];
        verdicts[0] = CountVerdict::Complete;
        if max_results >= 1 {
            verdicts[1] = CountVerdict::Complete;
        }
        verdicts[max_results] = CountVerdict::Truncated;

        Self {
            streaks: vec![0; max_results + 1],
            verdicts,
            confirmation_threshold,
        }
    }

    /// Seeds a static rule on top of the deterministic seeding
    ///
    /// Counts up to `complete_through` become complete and counts from
    /// `truncated_from` become truncated.
    pub fn with_static_rule(
        mut self,
        complete_through: Option<usize>,
        truncated_from: Option<usize>,
    ) -> Result<Self, SieveError> {
        if let Some(from) = truncated_from {
            self.resolve_from(from, CountVerdict::Truncated)?;
        }
        if let Some(through) = complete_through {
            self.resolve_through(through, CountVerdict::Complete)?;
        }
        Ok(self)
    }

    /// The largest count the endpoint may report
    pub fn max_results(&self) -> usize {
        self.verdicts.len() - 1
    }

    pub fn confirmation_threshold(&self) -> u32 {
        self.confirmation_threshold
    }

    /// Verdict for a count, or `None` when the count exceeds `max_results`
    pub fn verdict(&self, count: usize) -> Option<CountVerdict> {
        self.verdicts.get(count).copied()
    }

    /// Completeness evidence gathered for a count by the last survey
    pub fn streak(&self, count: usize) -> u32 {
        self.streaks.get(count).copied().unwrap_or(0)
    }

    /// All verdicts, indexed by count
    pub fn verdicts(&self) -> &[CountVerdict] {
        &self.verdicts
    }

    /// Returns true once no count is unknown
    pub fn is_settled(&self) -> bool {
        self.verdicts.iter().all(CountVerdict::is_resolved)
    }

    /// Learns verdicts for unknown counts from the query tree
    ///
    /// Every finished, narrowed node whose own count `c` is still unknown is
    /// a sample: a subtree with more identifiers than `c` proves `c`
    /// truncated outright, a subtree with exactly `c` adds one unit of
    /// completeness evidence. A truncated count generalizes upward and a
    /// count whose evidence reaches the confirmation threshold generalizes
    /// downward. Counts are applied from low to high, and a count already
    /// resolved by a lower one is left alone, so a truncation witness always
    /// wins over completeness evidence for higher counts.
    pub fn survey(&mut self, tree: &QueryTree) -> Result<SurveyReport, SieveError> {
        if self.is_settled() {
            return Ok(SurveyReport::default());
        }

        let mut evidence: Vec<Evidence> = self
            .verdicts
            .iter()
            .map(|verdict| {
                if verdict.is_resolved() {
                    Evidence::Resolved
                } else {
                    Evidence::Matching(0)
                }
            })
            .collect();

        for (_, node) in tree.depth_first() {
            if !node.is_done() || !node.is_expanded() {
                continue;
            }
            let Some(count) = node.reported_count() else {
                continue;
            };
            let Some(slot) = evidence.get_mut(count) else {
                continue;
            };
            if let Evidence::Matching(matches) = *slot {
                let found = node.subtree_results().len();
                if found > count {
                    *slot = Evidence::Truncated;
                } else if found == count {
                    *slot = Evidence::Matching(matches + 1);
                }
            }
        }

        let mut report = SurveyReport {
            ran: true,
            ..SurveyReport::default()
        };

        for count in 0..evidence.len() {
            if self.verdicts[count].is_resolved() {
                self.streaks[count] = 0;
                continue;
            }
            match evidence[count] {
                Evidence::Truncated => {
                    report.truncated.extend(self.resolve_from(count, CountVerdict::Truncated)?);
                }
                Evidence::Matching(matches) if matches >= self.confirmation_threshold => {
                    report.completed.extend(self.resolve_through(count, CountVerdict::Complete)?);
                }
                Evidence::Matching(matches) => {
                    self.streaks[count] = matches;
                }
                Evidence::Resolved => {}
            }
        }

        for (count, verdict) in self.verdicts.iter().enumerate() {
            if verdict.is_resolved() {
                self.streaks[count] = 0;
            }
        }

        Ok(report)
    }

    /// Resolves every count `>= from`, returning the counts that changed
    fn resolve_from(&mut self, from: usize, verdict: CountVerdict) -> Result<Vec<usize>, SieveError> {
        let mut changed = Vec::new();
        for count in from..self.verdicts.len() {
            if self.resolve(count, verdict)? {
                changed.push(count);
            }
        }
        Ok(changed)
    }

    /// Resolves every count `<= through`, returning the counts that changed
    fn resolve_through(
        &mut self,
        through: usize,
        verdict: CountVerdict,
    ) -> Result<Vec<usize>, SieveError> {
        let mut changed = Vec::new();
        for count in 0..=through.min(self.max_results()) {
            if self.resolve(count, verdict)? {
                changed.push(count);
            }
        }
        Ok(changed)
    }

    /// Sets one verdict; re-resolving a count to a different verdict is a bug
    fn resolve(&mut self, count: usize, verdict: CountVerdict) -> Result<bool, SieveError> {
        let current = self.verdicts[count];
        if current == verdict {
            return Ok(false);
        }
        if current.is_resolved() {
            return Err(SieveError::invariant(format!(
                "count {} already classified {}, cannot become {}",
                count, current, verdict
            )));
        }
        self.verdicts[count] = verdict;
        Ok(true)
    }

    /// Checks a classifier loaded from a snapshot against the configured page size
    pub fn validate(&self, max_results: usize) -> Result<(), SieveError> {
        if self.verdicts.len() != max_results + 1 || self.streaks.len() != self.verdicts.len() {
            return Err(SieveError::invariant(format!(
                "classifier table covers {} counts, expected {}",
                self.verdicts.len(),
                max_results + 1
            )));
        }
        Ok(())
    }
}
