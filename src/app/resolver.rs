use crate::app::error::HarnessError;
use crate::app::models::{AliasRule, HarnessConfig};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Resolves module specifiers: alias rewrite, then base path, then extension candidates.
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    root_dir: PathBuf,
    aliases: Vec<AliasRule>,
    extensions: Vec<String>,
    module_directories: Vec<String>,
}

impl ModuleResolver {
    pub fn new(
        root_dir: PathBuf,
        aliases: Vec<AliasRule>,
        extensions: Vec<String>,
        module_directories: Vec<String>,
    ) -> Self {
        Self {
            root_dir,
            aliases,
            extensions,
            module_directories,
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(
            config.root_dir.clone(),
            config.module_name_mapper.clone(),
            config.module_file_extensions.clone(),
            config.module_directories.clone(),
        )
    }

    /// Rewrites the specifier with the first matching alias, repeatedly, until none applies.
    ///
    /// Configuration loading rejects alias sets that can cycle, so an acyclic set
    /// settles within one substitution per rule. Running past that bound is an error.
    pub fn apply_aliases(&self, specifier: &str) -> Result<String, HarnessError> {
        let mut current = specifier.to_string();
        for _ in 0..=self.aliases.len() {
            match self.aliases.iter().find(|rule| current.starts_with(&rule.prefix)) {
                Some(rule) => {
                    current = format!("{}{}", rule.replacement, &current[rule.prefix.len()..]);
                }
                None => return Ok(current),
            }
        }
        Err(HarnessError::Resolution {
            specifier: specifier.to_string(),
            tried: format!(
                "alias substitution did not settle after {} rewrites, stopped at '{}'",
                self.aliases.len() + 1,
                current
            ),
        })
    }

    pub fn resolve(&self, specifier: &str, from_dir: &Path) -> Result<PathBuf, HarnessError> {
        let rewritten = self.apply_aliases(specifier)?;
        if rewritten != specifier {
            log::debug!("alias: {} -> {}", specifier, rewritten);
        }

        let mut tried = Vec::new();
        for base in self.bases(&rewritten, from_dir) {
            for candidate in self.candidates(&base) {
                if candidate.is_file() {
                    return Ok(candidate);
                }
                tried.push(candidate.display().to_string());
            }
        }

        Err(HarnessError::Resolution {
            specifier: specifier.to_string(),
            tried: tried.join(", "),
        })
    }

    fn bases(&self, specifier: &str, from_dir: &Path) -> Vec<PathBuf> {
        let path = Path::new(specifier);
        if path.is_absolute() {
            vec![path.to_path_buf()]
        } else if specifier == "."
            || specifier == ".."
            || specifier.starts_with("./")
            || specifier.starts_with("../")
        {
            vec![from_dir.join(path.strip_prefix(".").unwrap_or(path))]
        } else {
            self.module_directories
                .iter()
                .map(|dir| self.root_dir.join(dir).join(path))
                .collect()
        }
    }

    /// Exact path, then `base.<ext>` in declared order, then `base/index.<ext>`.
    fn candidates(&self, base: &Path) -> Vec<PathBuf> {
        let mut out = Vec::with_capacity(1 + self.extensions.len() * 2);
        out.push(base.to_path_buf());
        for ext in &self.extensions {
            out.push(with_appended_extension(base, ext));
        }
        for ext in &self.extensions {
            out.push(base.join(format!("index.{}", ext)));
        }
        out
    }
}

/// `x` -> `x.ext`, keeping any dots already in the file name (`x.config` -> `x.config.ext`).
fn with_appended_extension(base: &Path, ext: &str) -> PathBuf {
    let mut s: OsString = base.as_os_str().to_owned();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}
