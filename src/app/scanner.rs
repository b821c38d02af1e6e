use crate::app::models::{DiscoveredTest, HarnessConfig};
use crate::app::rules::{slash, RuleSet};
use anyhow::Result;
use ignore::WalkBuilder;
use pathdiff::diff_paths;
use std::path::{Path, PathBuf};

/// Result of walking the roots: the selected tests and how many files were looked at.
#[derive(Debug, Default)]
pub struct Discovery {
    pub tests: Vec<DiscoveredTest>,
    pub scanned: usize,
}

pub struct Scanner<'a> {
    config: &'a HarnessConfig,
    rules: RuleSet,
}

impl<'a> Scanner<'a> {
    pub fn new(config: &'a HarnessConfig) -> Result<Self> {
        Ok(Self {
            config,
            rules: RuleSet::new(&config.test_path_ignore_patterns, &config.test_match)?,
        })
    }

    /// Walks every root in declared order. A root listed twice is scanned twice.
    pub fn scan(&self) -> Discovery {
        let mut discovery = Discovery::default();

        for root in &self.config.roots {
            if !root.is_dir() {
                log::warn!("root {} does not exist, skipping", root.display());
                continue;
            }

            let mut found = Vec::new();
            let cache_directory = self.config.cache_directory.clone();
            let walker = WalkBuilder::new(root)
                .hidden(false)
                .git_ignore(self.config.respect_gitignore)
                .git_exclude(self.config.respect_gitignore)
                .git_global(self.config.respect_gitignore)
                .ignore(false)
                .parents(self.config.respect_gitignore)
                .require_git(false)
                .filter_entry(move |entry| !is_pruned(entry.path(), &cache_directory))
                .build();

            for result in walker {
                match result {
                    Ok(entry) => {
                        if !entry.file_type().is_some_and(|t| t.is_file()) {
                            continue;
                        }
                        discovery.scanned += 1;
                        if let Some(test) = self.process_entry(root, entry.path()) {
                            found.push(test);
                        }
                    }
                    Err(err) => log::warn!("Error walking entry: {}", err),
                }
            }

            found.sort_by(|a, b| a.path.cmp(&b.path));
            log::debug!("{} tests under {}", found.len(), root.display());
            discovery.tests.extend(found);
        }

        discovery
    }

    fn process_entry(&self, root: &Path, path: &Path) -> Option<DiscoveredTest> {
        let relative = diff_paths(path, &self.config.root_dir)?;
        let pattern = self.rules.selects(path, &relative)?;

        Some(DiscoveredTest {
            path: path.to_path_buf(),
            relative_path: slash(&relative),
            root: root.to_path_buf(),
            matched_pattern: pattern.to_string(),
        })
    }
}

/// Directories never descended into: `.git` and the transform cache.
fn is_pruned(path: &Path, cache_directory: &Path) -> bool {
    path.file_name().is_some_and(|n| n == ".git") || path.starts_with(cache_directory)
}

/// Narrows discovered tests to those whose relative path contains any filter.
pub fn filter_by_paths(tests: Vec<DiscoveredTest>, filters: &[String]) -> Vec<DiscoveredTest> {
    if filters.is_empty() {
        return tests;
    }
    tests
        .into_iter()
        .filter(|t| filters.iter().any(|f| t.relative_path.contains(f.as_str())))
        .collect()
}

pub fn describe_roots(roots: &[PathBuf]) -> String {
    roots
        .iter()
        .map(|r| r.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
