use crate::app::error::HarnessError;
use crate::app::models::{CaseCounts, DiscoveredTest, FileReport, HarnessConfig, TestStatus};
use crate::app::tap;
use crate::app::transform::Transformer;
use rayon::prelude::*;
use std::env;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::Instant;

/// Exit code a test file uses to declare itself skipped.
pub const SKIP_EXIT_CODE: i32 = 77;
const OUTPUT_EXCERPT_LINES: usize = 40;

/// Builds the command that runs `executable` inside the configured test environment.
pub fn environment_command(config: &HarnessConfig, executable: &Path) -> Command {
    let environment = &config.test_environment;

    let mut cmd = match &environment.program {
        Some(program) => {
            let mut cmd = Command::new(program);
            cmd.args(&environment.args).arg(executable);
            cmd
        }
        None => {
            let mut cmd = Command::new(executable);
            cmd.args(&environment.args);
            cmd
        }
    };

    if environment.clear_env {
        let path = env::var_os("PATH");
        cmd.env_clear();
        if let Some(path) = path {
            cmd.env("PATH", path);
        }
    }

    cmd.envs(&environment.env)
        .env("HARNESS_ROOT_DIR", &config.root_dir)
        .current_dir(&config.root_dir)
        .stdin(Stdio::null());
    cmd
}

/// Runs test files in a worker pool; one report per file, in completion-independent order.
pub struct Executor<'a> {
    config: &'a HarnessConfig,
    transformer: Transformer<'a>,
}

impl<'a> Executor<'a> {
    pub fn new(config: &'a HarnessConfig) -> Result<Self, HarnessError> {
        Ok(Self {
            config,
            transformer: Transformer::new(config)?,
        })
    }

    pub fn transformer(&self) -> &Transformer<'a> {
        &self.transformer
    }

    pub fn run_all(&self, tests: &[DiscoveredTest]) -> Result<Vec<FileReport>, HarnessError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers)
            .thread_name(|i| format!("harness-worker-{}", i))
            .build()
            .map_err(|e| {
                HarnessError::config(format!(
                    "cannot start {} workers: {}",
                    self.config.max_workers, e
                ))
            })?;

        log::info!("running {} test files on {} workers", tests.len(), self.config.max_workers);
        Ok(pool.install(|| tests.par_iter().map(|test| self.run_file(test)).collect()))
    }

    /// A failure here is confined to this file's report.
    pub fn run_file(&self, test: &DiscoveredTest) -> FileReport {
        let started = Instant::now();
        log::debug!(
            "{} (root {}, matched {})",
            test.relative_path,
            test.root.display(),
            test.matched_pattern
        );
        let report = |status, counts, message: Option<String>, output: String| FileReport {
            path: test.relative_path.clone(),
            status,
            counts,
            duration: started.elapsed(),
            message,
            output,
        };
        let one_failure = CaseCounts {
            failed: 1,
            ..CaseCounts::default()
        };

        let executable = match self.transformer.prepare(&test.path) {
            Ok(path) => path,
            Err(err) => {
                return report(
                    TestStatus::Failed,
                    one_failure,
                    Some(err.to_string()),
                    String::new(),
                )
            }
        };

        let worker = rayon::current_thread_index().unwrap_or(0);
        let output = environment_command(self.config, &executable)
            .env("HARNESS_TEST_FILE", &test.path)
            .env("HARNESS_WORKER_ID", worker.to_string())
            .output();

        let output = match output {
            Ok(output) => output,
            Err(err) => {
                let message = format!("could not start {}: {}", executable.display(), err);
                return report(TestStatus::Failed, one_failure, Some(message), String::new());
            }
        };

        let outcome = classify(&output);
        log::debug!("{} -> {:?}", test.relative_path, outcome.status);
        let excerpt = if outcome.status == TestStatus::Failed {
            excerpt(&output)
        } else {
            String::new()
        };
        report(outcome.status, outcome.counts, outcome.message, excerpt)
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Outcome {
    status: TestStatus,
    counts: CaseCounts,
    message: Option<String>,
}

fn classify(output: &Output) -> Outcome {
    let code = output.status.code();
    if code == Some(SKIP_EXIT_CODE) {
        return Outcome {
            status: TestStatus::Skipped,
            counts: CaseCounts {
                skipped: 1,
                ..CaseCounts::default()
            },
            message: None,
        };
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let summary = tap::parse(&stdout);
    let succeeded = output.status.success();
    let exit_message = || match code {
        Some(code) => format!("exited with status {}", code),
        None => "terminated by signal".to_string(),
    };

    let mut counts = CaseCounts::default();
    let mut message = None;
    if summary.seen {
        let missing = summary.missing();
        counts = summary.counts;
        if summary.skip_all && counts.total() == 0 && succeeded {
            counts.skipped = 1;
        }

        let mut reasons = Vec::new();
        if !summary.failures.is_empty() {
            reasons.push(format!("failed: {}", summary.failures.join(", ")));
        }
        if missing > 0 {
            // a plan the output never completes means the file stopped early
            reasons.push(format!(
                "planned {} tests, {} reported",
                counts.total() + missing,
                counts.total()
            ));
            counts.failed += 1;
        }
        if !succeeded && summary.failures.is_empty() {
            if counts.failed == 0 {
                counts.failed += 1;
            }
            reasons.push(exit_message());
        }
        if !reasons.is_empty() {
            message = Some(reasons.join("; "));
        }
    } else if succeeded {
        counts.passed = 1;
    } else {
        counts.failed = 1;
        message = Some(exit_message());
    }

    let status = if counts.failed > 0 {
        TestStatus::Failed
    } else if counts.passed == 0 && counts.skipped > 0 {
        TestStatus::Skipped
    } else {
        TestStatus::Passed
    };

    Outcome { status, counts, message }
}

/// Last lines of stdout followed by stderr.
fn excerpt(output: &Output) -> String {
    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    let lines: Vec<&str> = combined.lines().collect();
    let start = lines.len().saturating_sub(OUTPUT_EXCERPT_LINES);
    lines[start..].join("\n")
}
