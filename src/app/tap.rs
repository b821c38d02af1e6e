//! Minimal reader for TAP (Test Anything Protocol) result lines in test output.

use crate::app::models::CaseCounts;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct TapSummary {
    pub counts: CaseCounts,
    /// Names of the failing cases, in output order.
    pub failures: Vec<String>,
    /// Case count declared by the top-level `1..N` plan.
    pub planned: Option<usize>,
    /// A `1..0` plan: the file declared it has nothing to run.
    pub skip_all: bool,
    /// At least one result line or plan was seen.
    pub seen: bool,
}

impl TapSummary {
    /// Planned cases that never reported a result.
    pub fn missing(&self) -> usize {
        self.planned.map_or(0, |planned| planned.saturating_sub(self.counts.total()))
    }
}

/// Reads top-level TAP lines only. Indented lines belong to subtests, whose
/// outcome is already summarised by their parent's result line.
pub fn parse(output: &str) -> TapSummary {
    let mut summary = TapSummary::default();

    for line in output.lines() {
        if line.starts_with(char::is_whitespace) {
            continue;
        }
        let line = line.trim_end();

        if let Some(plan) = line.strip_prefix("1..") {
            summary.seen = true;
            let count = plan.split_whitespace().next().and_then(|n| n.parse::<usize>().ok());
            if count == Some(0) {
                summary.skip_all = true;
            }
            summary.planned = count;
            continue;
        }

        let (ok, rest) = if let Some(rest) = line.strip_prefix("not ok") {
            (false, rest)
        } else if let Some(rest) = line.strip_prefix("ok") {
            (true, rest)
        } else {
            continue;
        };
        // "okay" or "nothing" are not result lines
        if !(rest.is_empty() || rest.starts_with(' ')) {
            continue;
        }
        summary.seen = true;

        let (description, directive) = match rest.split_once('#') {
            Some((d, dir)) => (d, dir.trim().to_ascii_uppercase()),
            None => (rest, String::new()),
        };

        if directive.starts_with("SKIP") || directive.starts_with("TODO") {
            summary.counts.skipped += 1;
        } else if ok {
            summary.counts.passed += 1;
        } else {
            summary.counts.failed += 1;
            summary.failures.push(case_name(description));
        }
    }

    summary
}

/// `" 3 - stores memory "` -> `"stores memory"`.
fn case_name(description: &str) -> String {
    let trimmed = description.trim();
    let without_number = trimmed.trim_start_matches(|c: char| c.is_ascii_digit()).trim_start();
    without_number.trim_start_matches('-').trim().to_string()
}
