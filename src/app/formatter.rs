use crate::app::models::{DiscoveredTest, RunReport, TestStatus};
use anyhow::Result;
use serde::Serialize;

pub struct OutputGenerator;

impl OutputGenerator {
    pub fn generate_list(tests: &[DiscoveredTest]) -> String {
        tests
            .iter()
            .map(|t| t.path.display().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn generate_report(report: &RunReport) -> String {
        let mut output = String::new();

        for file in &report.files {
            let label = match file.status {
                TestStatus::Passed => "PASS",
                TestStatus::Failed => "FAIL",
                TestStatus::Skipped => "SKIP",
            };
            output.push_str(&format!(
                "{} {} ({} ms)\n",
                label,
                file.path,
                file.duration.as_millis()
            ));

            if let Some(message) = &file.message {
                output.push_str(&format!("    {}\n", message));
            }
            for line in file.output.lines() {
                output.push_str(&format!("    | {}\n", line));
            }
        }

        if !report.files.is_empty() {
            output.push('\n');
        }
        output.push_str(&Self::generate_summary(report));
        output
    }

    pub fn generate_summary(report: &RunReport) -> String {
        let c = &report.counts;
        format!(
            "Test files: {} failed, {} passed, {} skipped, {} total\n\
             Tests:      {} failed, {} passed, {} skipped, {} total\n\
             Time:       {:.2} s",
            report.files_failed,
            report.files_passed,
            report.files_skipped,
            report.files.len(),
            c.failed,
            c.passed,
            c.skipped,
            c.total(),
            report.duration.as_secs_f64()
        )
    }

    pub fn format_json<T: Serialize>(value: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(value)?)
    }
}
