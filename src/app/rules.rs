use anyhow::{Context, Result};
use globset::{Glob, GlobMatcher};
use std::path::Path;

/// Forward-slash rendering of a path, used for every pattern match.
pub fn slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Ignore patterns with any of these characters are globs, the rest path fragments.
pub fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Exclude,
    Include,
}

#[derive(Debug, Clone)]
enum Matcher {
    /// Matched against the path relative to the root dir.
    Glob(GlobMatcher),
    /// Matched as a substring of the absolute path.
    Fragment(String),
}

#[derive(Debug, Clone)]
pub struct PathRule {
    pub pattern: String,
    pub action: Action,
    matcher: Matcher,
}

impl PathRule {
    fn glob(pattern: &str, action: Action) -> Result<Self> {
        let glob = Glob::new(pattern).context(format!("Invalid glob pattern: {}", pattern))?;
        Ok(Self {
            pattern: pattern.to_string(),
            action,
            matcher: Matcher::Glob(glob.compile_matcher()),
        })
    }

    /// Ignore patterns without glob metacharacters are plain path fragments.
    fn ignore(pattern: &str) -> Result<Self> {
        if is_glob_pattern(pattern) {
            Self::glob(pattern, Action::Exclude)
        } else {
            Ok(Self {
                pattern: pattern.to_string(),
                action: Action::Exclude,
                matcher: Matcher::Fragment(pattern.to_string()),
            })
        }
    }

    fn is_match(&self, absolute: &str, relative: &str) -> bool {
        match &self.matcher {
            Matcher::Glob(glob) => glob.is_match(relative),
            Matcher::Fragment(fragment) => absolute.contains(fragment.as_str()),
        }
    }
}

/// Ordered (pattern, action) list. Every exclude precedes every include and the
/// first rule that matches decides; no match means "not a test".
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<PathRule>,
}

impl RuleSet {
    pub fn new(ignore_patterns: &[String], test_match: &[String]) -> Result<Self> {
        let mut rules = Vec::with_capacity(ignore_patterns.len() + test_match.len());
        for pat in ignore_patterns {
            rules.push(PathRule::ignore(pat)?);
        }
        for pat in test_match {
            rules.push(PathRule::glob(pat, Action::Include)?);
        }
        Ok(Self { rules })
    }

    pub fn evaluate(&self, absolute: &Path, relative: &Path) -> Option<&PathRule> {
        let absolute = slash(absolute);
        let relative = slash(relative);
        self.rules.iter().find(|rule| rule.is_match(&absolute, &relative))
    }

    /// The include pattern that selects this file, if no exclude wins first.
    pub fn selects<'a>(&'a self, absolute: &Path, relative: &Path) -> Option<&'a str> {
        self.evaluate(absolute, relative)
            .filter(|rule| rule.action == Action::Include)
            .map(|rule| rule.pattern.as_str())
    }
}
