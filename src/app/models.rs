use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Represents the final configuration after merging the preset, the file and CLI overrides.
/// Built once per run and shared by reference; never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct HarnessConfig {
    pub root_dir: PathBuf,
    pub preset: Option<String>,
    pub roots: Vec<PathBuf>,
    pub test_match: Vec<String>,
    pub test_path_ignore_patterns: Vec<String>,
    pub transform: Vec<TransformRule>,
    pub module_name_mapper: Vec<AliasRule>,
    pub setup_files: Vec<PathBuf>,
    pub module_file_extensions: Vec<String>,
    pub module_directories: Vec<String>,
    pub pass_with_no_tests: bool,
    pub test_environment: TestEnvironment,
    pub globals: BTreeMap<String, TransformOptions>,
    pub cache_directory: PathBuf,
    pub max_workers: usize,
    pub respect_gitignore: bool,
}

/// Options handed to a transform tool. Used both per rule and as per-tool globals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformOptions {
    /// Compiler-config style file passed to the tool.
    pub config: Option<PathBuf>,
    pub args: Option<Vec<String>>,
}

impl TransformOptions {
    /// Field-by-field overlay: values set on `self` win over `defaults`.
    pub fn or(self, defaults: &TransformOptions) -> TransformOptions {
        TransformOptions {
            config: self.config.or_else(|| defaults.config.clone()),
            args: self.args.or_else(|| defaults.args.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransformRule {
    pub pattern: String,
    pub tool_name: String,
    /// Tool resolved to an executable path at load time.
    pub tool: PathBuf,
    pub options: TransformOptions,
    pub output_extension: String,
}

/// Prefix substitution applied to module specifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AliasRule {
    pub prefix: String,
    pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestEnvironment {
    pub name: String,
    /// Interpreter for test files. `None` executes the file itself.
    pub program: Option<String>,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub clear_env: bool,
}

/// A test file found during discovery. Produced fresh on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredTest {
    pub path: PathBuf,
    pub relative_path: String,
    pub root: PathBuf,
    pub matched_pattern: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaseCounts {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl CaseCounts {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }

    pub fn add(&mut self, other: &CaseCounts) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: String,
    pub status: TestStatus,
    pub counts: CaseCounts,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,
}

/// Aggregated outcome of a run. Created at the end of the run, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub files: Vec<FileReport>,
    pub counts: CaseCounts,
    pub files_passed: usize,
    pub files_failed: usize,
    pub files_skipped: usize,
    pub success: bool,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl RunReport {
    pub fn new(mut files: Vec<FileReport>, duration: Duration) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let mut counts = CaseCounts::default();
        let (mut files_passed, mut files_failed, mut files_skipped) = (0, 0, 0);
        for file in &files {
            counts.add(&file.counts);
            match file.status {
                TestStatus::Passed => files_passed += 1,
                TestStatus::Failed => files_failed += 1,
                TestStatus::Skipped => files_skipped += 1,
            }
        }

        Self {
            files,
            counts,
            files_passed,
            files_failed,
            files_skipped,
            success: files_failed == 0,
            duration,
        }
    }

    /// Report for a run where nothing matched and the policy allows it.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Duration::ZERO)
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(d.as_millis())
    }
}
