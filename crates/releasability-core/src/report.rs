//! Check outcomes, verdict aggregation and the human-readable report.

use serde::{Deserialize, Serialize};

use crate::message::{CheckReply, CheckState};

pub const SUCCESS_GLYPH: &str = "\u{2705}";
pub const NOT_RELEVANT_GLYPH: &str = "\u{2713}";
pub const FAILURE_GLYPH: &str = "\u{274c}";

/// Final outcome reported by one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub name: String,
    pub state: CheckState,
    pub message: Option<String>,
}

impl CheckOutcome {
    pub fn new(name: impl Into<String>, state: CheckState, message: Option<String>) -> Self {
        Self {
            name: name.into(),
            state,
            message,
        }
    }

    pub fn passed(&self) -> bool {
        self.state.is_passing()
    }

    /// One report line: glyph, name, and the message unless the check passed.
    pub fn render(&self) -> String {
        let glyph = match self.state {
            CheckState::Passed => SUCCESS_GLYPH,
            CheckState::NotRelevant => NOT_RELEVANT_GLYPH,
            _ => FAILURE_GLYPH,
        };
        match (&self.state, &self.message) {
            (CheckState::Passed, _) | (_, None) => format!("{} {}", glyph, self.name),
            (_, Some(message)) => format!("{} {} - {}", glyph, self.name, message),
        }
    }
}

impl From<CheckReply> for CheckOutcome {
    fn from(reply: CheckReply) -> Self {
        Self {
            name: reply.check_name,
            state: reply.state,
            message: reply.message,
        }
    }
}

/// Outcomes keyed by check name, in first-insertion order.
///
/// Holds at most one entry per name and never an ACK.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckResultSet {
    outcomes: Vec<CheckOutcome>,
}

impl CheckResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the outcome for `outcome.name`.
    ///
    /// A replaced entry keeps its original position. ACK outcomes are
    /// refused; returns whether the set changed.
    pub fn upsert(&mut self, outcome: CheckOutcome) -> bool {
        if outcome.state.is_ack() {
            return false;
        }
        match self.outcomes.iter_mut().find(|o| o.name == outcome.name) {
            Some(existing) => *existing = outcome,
            None => self.outcomes.push(outcome),
        }
        true
    }

    pub fn get(&self, name: &str) -> Option<&CheckOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    /// Number of distinct checks that answered.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter()
    }
}

/// Verdict and rendered report of a completed check run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecksReport {
    pub passed: bool,
    pub report: String,
    pub outcomes: Vec<CheckOutcome>,
}

impl ChecksReport {
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.passed()).count()
    }
}

impl std::fmt::Display for ChecksReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.report)
    }
}

/// Turn collected outcomes into a verdict.
///
/// Passed iff every outcome is PASSED or NOT_RELEVANT. The report lists
/// every check regardless, one line each.
pub fn aggregate(results: CheckResultSet) -> ChecksReport {
    let passed = results.iter().all(CheckOutcome::passed);
    let report = results
        .iter()
        .map(CheckOutcome::render)
        .collect::<Vec<_>>()
        .join("\n");
    ChecksReport {
        passed,
        report,
        outcomes: results.outcomes,
    }
}
