use crate::app::error::HarnessError;
use crate::app::models::{HarnessConfig, TransformRule};
use crate::app::rules::slash;
use globset::{Glob, GlobMatcher};
use pathdiff::diff_paths;
use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::{self, Command};
use std::sync::atomic::{AtomicUsize, Ordering};

const DEFAULT_ARGS: &[&str] = &["{input}", "{output}"];

/// Distinguishes staging files written by concurrent transforms in this process.
static STAGING_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Applies the first matching transform rule to a source file, writing the
/// executable form into the cache directory.
pub struct Transformer<'a> {
    config: &'a HarnessConfig,
    rules: Vec<(GlobMatcher, &'a TransformRule)>,
}

impl<'a> Transformer<'a> {
    pub fn new(config: &'a HarnessConfig) -> Result<Self, HarnessError> {
        let mut rules = Vec::with_capacity(config.transform.len());
        for rule in &config.transform {
            let glob = Glob::new(&rule.pattern).map_err(|e| {
                HarnessError::config(format!("invalid transform pattern '{}': {}", rule.pattern, e))
            })?;
            rules.push((glob.compile_matcher(), rule));
        }
        Ok(Self { config, rules })
    }

    pub fn rule_for(&self, path: &Path) -> Option<&'a TransformRule> {
        let relative = diff_paths(path, &self.config.root_dir)?;
        let relative = slash(&relative);
        self.rules
            .iter()
            .find(|(glob, _)| glob.is_match(&relative))
            .map(|(_, rule)| *rule)
    }

    /// Returns the path to execute: the transformed output, or the file itself
    /// when no rule applies.
    pub fn prepare(&self, path: &Path) -> Result<PathBuf, HarnessError> {
        let Some(rule) = self.rule_for(path) else {
            return Ok(path.to_path_buf());
        };

        let output = self.output_path(path, rule);
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(|e| HarnessError::io(parent, e))?;
        }

        // only a complete output is renamed into place
        let staging = staging_path(&output, &rule.output_extension);
        let args = render_args(rule, path, &staging, &self.config.root_dir);
        log::debug!("transform {} with {} {:?}", path.display(), rule.tool_name, args);

        let mut cmd = Command::new(&rule.tool);
        cmd.args(&args).current_dir(&self.config.root_dir);
        if let Some(config) = &rule.options.config {
            cmd.env("HARNESS_TRANSFORM_CONFIG", config);
        }

        let fail = |reason: String| {
            let _ = fs::remove_file(&staging);
            HarnessError::Transform {
                file: path.to_path_buf(),
                tool: rule.tool_name.clone(),
                reason,
            }
        };

        let result = cmd.output().map_err(|e| fail(format!("could not start: {}", e)))?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(fail(format!("{}: {}", result.status, stderr.trim())));
        }
        if !staging.is_file() {
            return Err(fail(format!("no output written to {}", staging.display())));
        }
        if let Err(e) = fs::rename(&staging, &output) {
            let _ = fs::remove_file(&staging);
            return Err(HarnessError::io(&output, e));
        }

        Ok(output)
    }

    /// Mirrors the root-relative path under the cache directory and appends the
    /// output extension, so `a.test.ts` and `a.test.tsx` stay distinct.
    fn output_path(&self, path: &Path, rule: &TransformRule) -> PathBuf {
        let relative =
            diff_paths(path, &self.config.root_dir).unwrap_or_else(|| path.to_path_buf());

        let mut out = self.config.cache_directory.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => out.push(part),
                Component::ParentDir => out.push("__"),
                _ => {}
            }
        }
        let mut name: OsString = out.into_os_string();
        name.push(".");
        name.push(&rule.output_extension);
        PathBuf::from(name)
    }
}

/// `out/a.test.ts.js` -> `out/a.test.ts.<pid>-<n>.tmp.js`; the output extension
/// stays last for tools that pick a format from it.
fn staging_path(output: &Path, extension: &str) -> PathBuf {
    let n = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
    let suffix = format!(".{}", extension);
    let name = output.file_name().map(|f| f.to_string_lossy().into_owned()).unwrap_or_default();
    let stem = name.strip_suffix(&suffix).unwrap_or(&name);
    output.with_file_name(format!("{}.{}-{}.tmp{}", stem, process::id(), n, suffix))
}

/// Substitutes placeholders; an argument naming `{config}` is dropped when no config is set.
fn render_args(rule: &TransformRule, input: &Path, output: &Path, root_dir: &Path) -> Vec<String> {
    let template: Vec<String> = match &rule.options.args {
        Some(args) => args.clone(),
        None => DEFAULT_ARGS.iter().map(|s| s.to_string()).collect(),
    };
    let config = rule.options.config.as_deref().map(|c| c.to_string_lossy().into_owned());

    template
        .into_iter()
        .filter(|arg| config.is_some() || !arg.contains("{config}"))
        .map(|arg| {
            let arg = arg
                .replace("{input}", &input.to_string_lossy())
                .replace("{output}", &output.to_string_lossy())
                .replace("{rootDir}", &root_dir.to_string_lossy());
            match &config {
                Some(c) => arg.replace("{config}", c),
                None => arg,
            }
        })
        .collect()
}
