use crate::app::error::HarnessError;
use crate::app::models::{
    AliasRule, HarnessConfig, TestEnvironment, TransformOptions, TransformRule,
};
use crate::app::resolver::ModuleResolver;
use crate::app::rules::{is_glob_pattern, slash};
use globset::Glob;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "harness.toml";
pub const ROOT_DIR_TOKEN: &str = "<rootDir>";

const DEFAULT_TEST_MATCH: &[&str] = &["**/__tests__/**/*", "**/*.{spec,test}.*"];
const DEFAULT_IGNORE: &[&str] = &["/node_modules/"];
const DEFAULT_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "json"];
const DEFAULT_MODULE_DIRECTORIES: &[&str] = &["node_modules"];
const DEFAULT_ENVIRONMENT: &str = "exec";
const DEFAULT_CACHE_DIRECTORY: &str = "<rootDir>/.harness-cache";
const DEFAULT_OUTPUT_EXTENSION: &str = "js";

/// Shape shared by `harness.toml` and every preset (bundled or user-defined).
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub preset: Option<String>,
    pub root_dir: Option<String>,
    pub test_environment: Option<String>,
    pub roots: Option<Vec<String>>,
    pub test_match: Option<Vec<String>>,
    pub transform: Option<Vec<TransformEntry>>,
    pub module_name_mapper: Option<Vec<AliasRule>>,
    pub setup_files: Option<Vec<String>>,
    pub test_path_ignore_patterns: Option<Vec<String>>,
    pub module_file_extensions: Option<Vec<String>>,
    pub module_directories: Option<Vec<String>>,
    pub pass_with_no_tests: Option<bool>,
    pub globals: Option<BTreeMap<String, TransformOptions>>,
    pub environments: Option<BTreeMap<String, EnvironmentEntry>>,
    pub cache_directory: Option<String>,
    pub max_workers: Option<usize>,
    pub respect_gitignore: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct TransformEntry {
    pub pattern: String,
    pub tool: String,
    pub output_extension: Option<String>,
    #[serde(default)]
    pub options: TransformOptions,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentEntry {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    pub env: Option<BTreeMap<String, String>>,
    pub clear_env: Option<bool>,
}

#[derive(Deserialize, Debug)]
struct PresetsFile {
    #[serde(flatten)]
    presets: HashMap<String, ConfigFile>,
}

/// Values from the command line that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub pass_with_no_tests: bool,
    pub max_workers: Option<usize>,
}

impl ConfigFile {
    pub fn parse(content: &str) -> Result<Self, HarnessError> {
        toml::from_str(content)
            .map_err(|e| HarnessError::config(format!("invalid {}: {}", CONFIG_FILE_NAME, e)))
    }

    /// Fills every field left unset in `self` from `preset`. Map entries merge per key.
    fn layered_over(self, preset: ConfigFile) -> ConfigFile {
        ConfigFile {
            preset: self.preset,
            root_dir: self.root_dir.or(preset.root_dir),
            test_environment: self.test_environment.or(preset.test_environment),
            roots: self.roots.or(preset.roots),
            test_match: self.test_match.or(preset.test_match),
            transform: self.transform.or(preset.transform),
            module_name_mapper: self.module_name_mapper.or(preset.module_name_mapper),
            setup_files: self.setup_files.or(preset.setup_files),
            test_path_ignore_patterns: self
                .test_path_ignore_patterns
                .or(preset.test_path_ignore_patterns),
            module_file_extensions: self.module_file_extensions.or(preset.module_file_extensions),
            module_directories: self.module_directories.or(preset.module_directories),
            pass_with_no_tests: self.pass_with_no_tests.or(preset.pass_with_no_tests),
            globals: merge_maps(preset.globals, self.globals),
            environments: merge_maps(preset.environments, self.environments),
            cache_directory: self.cache_directory.or(preset.cache_directory),
            max_workers: self.max_workers.or(preset.max_workers),
            respect_gitignore: self.respect_gitignore.or(preset.respect_gitignore),
        }
    }
}

fn merge_maps<V>(
    base: Option<BTreeMap<String, V>>,
    top: Option<BTreeMap<String, V>>,
) -> Option<BTreeMap<String, V>> {
    match (base, top) {
        (Some(mut base), Some(top)) => {
            base.extend(top);
            Some(base)
        }
        (base, top) => top.or(base),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Profiles shipped with the binary, selectable through `preset`.
fn bundled_preset(name: &str) -> Option<ConfigFile> {
    match name {
        "node" => Some(ConfigFile {
            test_environment: Some("node".into()),
            test_match: Some(strings(&[
                "**/__tests__/**/*.{js,mjs,cjs}",
                "**/*.{spec,test}.{js,mjs,cjs}",
            ])),
            module_file_extensions: Some(strings(&["js", "mjs", "cjs", "json", "node"])),
            ..ConfigFile::default()
        }),
        "typescript" => Some(ConfigFile {
            test_environment: Some("node".into()),
            test_match: Some(strings(&[
                "**/__tests__/**/*.{ts,tsx,js}",
                "**/*.{spec,test}.{ts,tsx,js}",
            ])),
            transform: Some(vec![TransformEntry {
                pattern: "**/*.{ts,tsx}".into(),
                tool: "esbuild".into(),
                output_extension: Some("js".into()),
                options: TransformOptions {
                    config: None,
                    args: Some(strings(&[
                        "{input}",
                        "--outfile={output}",
                        "--format=cjs",
                        "--platform=node",
                        "--tsconfig={config}",
                    ])),
                },
            }]),
            module_file_extensions: Some(strings(&["ts", "tsx", "js", "jsx", "json", "node"])),
            ..ConfigFile::default()
        }),
        "shell" => Some(ConfigFile {
            test_environment: Some("shell".into()),
            test_match: Some(strings(&["**/__tests__/**/*.sh", "**/*.test.sh"])),
            module_file_extensions: Some(strings(&["sh"])),
            ..ConfigFile::default()
        }),
        _ => None,
    }
}

fn bundled_environment(name: &str) -> Option<TestEnvironment> {
    let program = match name {
        "exec" => None,
        "node" => Some("node"),
        "shell" => Some("sh"),
        _ => return None,
    };
    Some(TestEnvironment {
        name: name.to_string(),
        program: program.map(str::to_string),
        args: Vec::new(),
        env: BTreeMap::new(),
        clear_env: false,
    })
}

/// Location of user-defined presets: `~/.config/harness/presets.toml`.
pub fn user_presets_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("harness").join("presets.toml"))
}

pub fn load_presets_file(path: &Path) -> Result<HashMap<String, ConfigFile>, HarnessError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let content = fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
    let parsed: PresetsFile = toml::from_str(&content).map_err(|e| {
        HarnessError::config(format!("failed to parse presets file {}: {}", path.display(), e))
    })?;

    Ok(parsed.presets)
}

/// Loads `harness.toml` (explicit path or the current directory) into a validated configuration.
pub fn load(
    config_path: Option<&Path>,
    overrides: &Overrides,
) -> Result<HarnessConfig, HarnessError> {
    let path = match config_path {
        Some(p) => p.to_path_buf(),
        None => env::current_dir()
            .map_err(|e| HarnessError::io(".", e))?
            .join(CONFIG_FILE_NAME),
    };

    if !path.is_file() {
        return Err(HarnessError::config(format!("config file not found: {}", path.display())));
    }

    let content = fs::read_to_string(&path).map_err(|e| HarnessError::io(&path, e))?;
    let file = ConfigFile::parse(&content)?;

    let user_presets = match user_presets_path() {
        Some(p) => load_presets_file(&p)?,
        None => HashMap::new(),
    };

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    log::debug!("loading configuration from {}", path.display());
    resolve_config(file, base_dir, &user_presets, overrides)
}

/// Turns a parsed file into the immutable run configuration: preset, defaults,
/// `<rootDir>` substitution, validation, overrides.
pub fn resolve_config(
    file: ConfigFile,
    base_dir: &Path,
    user_presets: &HashMap<String, ConfigFile>,
    overrides: &Overrides,
) -> Result<HarnessConfig, HarnessError> {
    let file = match file.preset.clone() {
        Some(name) => {
            let preset = user_presets
                .get(&name)
                .cloned()
                .or_else(|| bundled_preset(&name))
                .ok_or_else(|| HarnessError::config(format!("unknown preset '{}'", name)))?;
            if preset.preset.is_some() {
                return Err(HarnessError::config(format!(
                    "preset '{}' may not itself name a preset",
                    name
                )));
            }
            file.layered_over(preset)
        }
        None => file,
    };

    let root_dir = base_dir.join(file.root_dir.as_deref().unwrap_or("."));
    let root_dir = fs::canonicalize(&root_dir).map_err(|e| {
        HarnessError::config(format!("root_dir {} is not accessible: {}", root_dir.display(), e))
    })?;
    let expand = |s: &str| expand_root_dir(s, &root_dir);
    let to_path = |s: &str| absolutize(&expand(s), &root_dir);

    let roots = match &file.roots {
        Some(roots) => roots.iter().map(|r| to_path(r)).collect(),
        None => vec![root_dir.clone()],
    };

    let test_match = file.test_match.clone().unwrap_or_else(|| strings(DEFAULT_TEST_MATCH));
    for pattern in &test_match {
        validate_glob(pattern, "test_match")?;
    }

    let test_path_ignore_patterns: Vec<String> = file
        .test_path_ignore_patterns
        .clone()
        .unwrap_or_else(|| strings(DEFAULT_IGNORE))
        .iter()
        .map(|p| expand(p))
        .collect();
    for pattern in test_path_ignore_patterns.iter().filter(|p| is_glob_pattern(p)) {
        validate_glob(pattern, "test_path_ignore_patterns")?;
    }

    let module_file_extensions: Vec<String> = file
        .module_file_extensions
        .clone()
        .unwrap_or_else(|| strings(DEFAULT_EXTENSIONS))
        .into_iter()
        .map(|ext| ext.trim_start_matches('.').to_string())
        .collect();
    if module_file_extensions.is_empty() || module_file_extensions.iter().any(String::is_empty) {
        return Err(HarnessError::config(
            "module_file_extensions must list at least one non-empty extension",
        ));
    }

    let module_directories = file
        .module_directories
        .clone()
        .unwrap_or_else(|| strings(DEFAULT_MODULE_DIRECTORIES));

    let module_name_mapper: Vec<AliasRule> = file
        .module_name_mapper
        .clone()
        .unwrap_or_default()
        .into_iter()
        .map(|rule| AliasRule {
            replacement: expand(&rule.replacement),
            prefix: rule.prefix,
        })
        .collect();
    if module_name_mapper.iter().any(|r| r.prefix.is_empty()) {
        return Err(HarnessError::config("module_name_mapper prefixes must not be empty"));
    }
    check_alias_cycles(&module_name_mapper)?;

    let globals: BTreeMap<String, TransformOptions> = file
        .globals
        .clone()
        .unwrap_or_default()
        .into_iter()
        .map(|(tool, opts)| (tool, expand_options(opts, &root_dir)))
        .collect();

    let mut transform = Vec::new();
    for entry in file.transform.clone().unwrap_or_default() {
        transform.push(build_transform_rule(entry, &globals, &root_dir)?);
    }

    let test_environment = build_environment(&file)?;

    let max_workers = overrides
        .max_workers
        .or(file.max_workers)
        .unwrap_or_else(default_workers);
    if max_workers == 0 {
        return Err(HarnessError::config("max_workers must be at least 1"));
    }

    let cache_directory =
        to_path(file.cache_directory.as_deref().unwrap_or(DEFAULT_CACHE_DIRECTORY));

    let resolver = ModuleResolver::new(
        root_dir.clone(),
        module_name_mapper.clone(),
        module_file_extensions.clone(),
        module_directories.clone(),
    );
    let mut setup_files = Vec::new();
    for spec in file.setup_files.clone().unwrap_or_default() {
        let resolved = resolver
            .resolve(&expand(&spec), &root_dir)
            .map_err(|e| HarnessError::config(format!("setup_files entry '{}': {}", spec, e)))?;
        setup_files.push(resolved);
    }

    Ok(HarnessConfig {
        preset: file.preset.clone(),
        roots,
        test_match,
        test_path_ignore_patterns,
        transform,
        module_name_mapper,
        setup_files,
        module_file_extensions,
        module_directories,
        pass_with_no_tests: overrides.pass_with_no_tests
            || file.pass_with_no_tests.unwrap_or(false),
        test_environment,
        globals,
        cache_directory,
        max_workers,
        respect_gitignore: file.respect_gitignore.unwrap_or(false),
        root_dir,
    })
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

pub fn expand_root_dir(value: &str, root_dir: &Path) -> String {
    value.replace(ROOT_DIR_TOKEN, &slash(root_dir))
}

fn absolutize(value: &str, root_dir: &Path) -> PathBuf {
    let path = PathBuf::from(value);
    if path.is_absolute() {
        path
    } else {
        root_dir.join(path)
    }
}

fn expand_options(opts: TransformOptions, root_dir: &Path) -> TransformOptions {
    TransformOptions {
        config: opts
            .config
            .map(|c| absolutize(&expand_root_dir(&c.to_string_lossy(), root_dir), root_dir)),
        args: opts.args,
    }
}

fn validate_glob(pattern: &str, option: &str) -> Result<(), HarnessError> {
    Glob::new(pattern)
        .map(|_| ())
        .map_err(|e| {
            HarnessError::config(format!("invalid {} pattern '{}': {}", option, pattern, e))
        })
}

fn build_transform_rule(
    entry: TransformEntry,
    globals: &BTreeMap<String, TransformOptions>,
    root_dir: &Path,
) -> Result<TransformRule, HarnessError> {
    validate_glob(&entry.pattern, "transform")?;

    let tool = find_program(&entry.tool, root_dir).ok_or_else(|| {
        HarnessError::config(format!(
            "transform for '{}' references tool '{}', which was not found",
            entry.pattern, entry.tool
        ))
    })?;

    let options = match globals.get(&entry.tool) {
        Some(defaults) => expand_options(entry.options, root_dir).or(defaults),
        None => expand_options(entry.options, root_dir),
    };
    if let Some(config) = &options.config {
        validate_tool_config(config)?;
    }

    Ok(TransformRule {
        pattern: entry.pattern,
        tool_name: entry.tool,
        tool,
        options,
        output_extension: entry
            .output_extension
            .map(|ext| ext.trim_start_matches('.').to_string())
            .unwrap_or_else(|| DEFAULT_OUTPUT_EXTENSION.to_string()),
    })
}

/// Checks the compiler-style config handed to a transform tool is present and parses.
fn validate_tool_config(path: &Path) -> Result<(), HarnessError> {
    let content = fs::read_to_string(path)
        .map_err(|e| HarnessError::config(format!("transform config {}: {}", path.display(), e)))?;

    let invalid = |e: String| {
        HarnessError::config(format!("transform config {} is invalid: {}", path.display(), e))
    };
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str::<serde_json::Value>(&content)
            .map(|_| ())
            .map_err(|e| invalid(e.to_string())),
        Some("toml") => toml::from_str::<toml::Table>(&content)
            .map(|_| ())
            .map_err(|e| invalid(e.to_string())),
        _ => Ok(()),
    }
}

/// Finds an executable: a path relative to the root dir when the name has a
/// separator, otherwise the first match on `PATH`.
pub fn find_program(name: &str, root_dir: &Path) -> Option<PathBuf> {
    let as_path = Path::new(name);
    if as_path.is_absolute() || name.contains('/') {
        let candidate = absolutize(name, root_dir);
        return candidate.is_file().then_some(candidate);
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn build_environment(file: &ConfigFile) -> Result<TestEnvironment, HarnessError> {
    let name = file.test_environment.as_deref().unwrap_or(DEFAULT_ENVIRONMENT);

    let custom = file.environments.as_ref().and_then(|envs| envs.get(name));
    let environment = match (custom, bundled_environment(name)) {
        (Some(entry), bundled) => {
            let base = bundled.unwrap_or_else(|| TestEnvironment {
                name: name.to_string(),
                program: None,
                args: Vec::new(),
                env: BTreeMap::new(),
                clear_env: false,
            });
            TestEnvironment {
                name: name.to_string(),
                program: entry.program.clone().or(base.program),
                args: entry.args.clone().unwrap_or(base.args),
                env: entry.env.clone().unwrap_or(base.env),
                clear_env: entry.clear_env.unwrap_or(base.clear_env),
            }
        }
        (None, Some(bundled)) => bundled,
        (None, None) => {
            return Err(HarnessError::config(format!("unknown test_environment '{}'", name)));
        }
    };

    Ok(environment)
}

/// Rejects alias sets where following replacements can loop forever.
fn check_alias_cycles(rules: &[AliasRule]) -> Result<(), HarnessError> {
    // i -> j when some specifier rewritten by i can then match j: either i's
    // replacement already starts with j's prefix, or the remainder can complete it
    let leads_to = |i: usize, j: usize| {
        let (replacement, prefix) = (&rules[i].replacement, &rules[j].prefix);
        replacement.starts_with(prefix.as_str()) || prefix.starts_with(replacement.as_str())
    };

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn visit(i: usize, marks: &mut [Mark], leads_to: &dyn Fn(usize, usize) -> bool) -> bool {
        marks[i] = Mark::InProgress;
        for j in 0..marks.len() {
            if !leads_to(i, j) {
                continue;
            }
            let mark = marks[j];
            match mark {
                Mark::InProgress => return true,
                Mark::Unvisited if visit(j, marks, leads_to) => return true,
                _ => {}
            }
        }
        marks[i] = Mark::Done;
        false
    }

    let mut marks = vec![Mark::Unvisited; rules.len()];
    for start in 0..rules.len() {
        if marks[start] == Mark::Unvisited && visit(start, &mut marks, &leads_to) {
            return Err(HarnessError::config(format!(
                "module_name_mapper rule '{}' -> '{}' takes part in a substitution cycle",
                rules[start].prefix, rules[start].replacement
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolve(dir: &TempDir, toml: &str) -> Result<HarnessConfig, HarnessError> {
        let file = ConfigFile::parse(toml)?;
        resolve_config(file, dir.path(), &HashMap::new(), &Overrides::default())
    }

    fn root(dir: &TempDir) -> PathBuf {
        fs::canonicalize(dir.path()).unwrap()
    }

    #[test]
    fn empty_file_gets_defaults() {
        let dir = TempDir::new().unwrap();
        let config = resolve(&dir, "").unwrap();

        assert_eq!(config.roots, vec![root(&dir)]);
        assert_eq!(config.test_match, strings(DEFAULT_TEST_MATCH));
        assert_eq!(config.test_path_ignore_patterns, vec!["/node_modules/".to_string()]);
        assert_eq!(config.test_environment.name, "exec");
        assert!(!config.pass_with_no_tests);
        assert_eq!(config.cache_directory, root(&dir).join(".harness-cache"));
        assert!(config.max_workers >= 1);
    }

    #[test]
    fn root_dir_token_is_substituted() {
        let dir = TempDir::new().unwrap();
        let config = resolve(
            &dir,
            r#"
            roots = ["<rootDir>/src", "tests", "<rootDir>/src"]
            test_path_ignore_patterns = ["/dist/", "<rootDir>/src/oss/tests/"]
            [[module_name_mapper]]
            prefix = "@/"
            replacement = "<rootDir>/src/"
            "#,
        )
        .unwrap();

        let r = root(&dir);
        assert_eq!(config.roots, vec![r.join("src"), r.join("tests"), r.join("src")]);
        assert_eq!(config.test_path_ignore_patterns[1], format!("{}/src/oss/tests/", slash(&r)));
        assert_eq!(config.module_name_mapper[0].replacement, format!("{}/src/", slash(&r)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ConfigFile::parse("testMatch = []").unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }

    #[test]
    fn preset_values_yield_to_explicit_ones() {
        let dir = TempDir::new().unwrap();
        let config = resolve(
            &dir,
            r#"
            preset = "shell"
            module_file_extensions = ["bash", ".sh"]
            "#,
        )
        .unwrap();

        assert_eq!(config.preset.as_deref(), Some("shell"));
        assert_eq!(config.test_environment.program.as_deref(), Some("sh"));
        assert_eq!(config.module_file_extensions, vec!["bash", "sh"]);
        assert!(config.test_match.contains(&"**/*.test.sh".to_string()));
    }

    #[test]
    fn user_presets_shadow_bundled_ones() {
        let dir = TempDir::new().unwrap();
        let presets_path = dir.path().join("presets.toml");
        fs::write(&presets_path, "[shell]\ntest_match = [\"**/*.check.sh\"]\n").unwrap();
        let presets = load_presets_file(&presets_path).unwrap();

        let file = ConfigFile::parse("preset = \"shell\"").unwrap();
        let config = resolve_config(file, dir.path(), &presets, &Overrides::default()).unwrap();
        assert_eq!(config.test_match, vec!["**/*.check.sh"]);
        assert_eq!(config.test_environment.name, "exec");
    }

    #[test]
    fn unknown_preset_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let err = resolve(&dir, "preset = \"nope\"").unwrap_err();
        assert!(err.to_string().contains("unknown preset"));
    }

    #[test]
    fn unresolvable_transform_tool_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let err = resolve(
            &dir,
            r#"
            [[transform]]
            pattern = "**/*.ts"
            tool = "./no-such-tool"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no-such-tool"));
    }

    #[test]
    fn malformed_tool_config_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("strip.sh"), "#!/bin/sh\n").unwrap();
        fs::write(dir.path().join("tsconfig.test.json"), "{ \"compilerOptions\": ").unwrap();

        let err = resolve(
            &dir,
            r#"
            [[transform]]
            pattern = "**/*.ts"
            tool = "./strip.sh"
            [transform.options]
            config = "tsconfig.test.json"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("tsconfig.test.json is invalid"));
    }

    #[test]
    fn globals_supply_tool_options() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("strip.sh"), "#!/bin/sh\n").unwrap();
        fs::write(dir.path().join("tsconfig.test.json"), "{}").unwrap();

        let config = resolve(
            &dir,
            r#"
            [[transform]]
            pattern = "**/*.ts"
            tool = "./strip.sh"

            [globals."./strip.sh"]
            config = "<rootDir>/tsconfig.test.json"
            "#,
        )
        .unwrap();

        let rule = &config.transform[0];
        assert_eq!(rule.options.config, Some(root(&dir).join("tsconfig.test.json")));
        assert_eq!(rule.output_extension, "js");
        assert_eq!(rule.tool, root(&dir).join("./strip.sh"));
    }

    #[test]
    fn alias_cycles_are_rejected() {
        let dir = TempDir::new().unwrap();
        let err = resolve(
            &dir,
            r#"
            [[module_name_mapper]]
            prefix = "a/"
            replacement = "b/x"
            [[module_name_mapper]]
            prefix = "b/"
            replacement = "a/y"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn cycles_through_the_remainder_are_rejected() {
        let dir = TempDir::new().unwrap();
        // "@/b" -> "ab" -> "@/b" -> ...
        let err = resolve(
            &dir,
            r#"
            [[module_name_mapper]]
            prefix = "@/"
            replacement = "a"
            [[module_name_mapper]]
            prefix = "ab"
            replacement = "@/b"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn self_feeding_alias_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = resolve(
            &dir,
            r#"
            [[module_name_mapper]]
            prefix = "lib/"
            replacement = "lib/v2/"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn malformed_ignore_glob_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let err = resolve(&dir, "test_path_ignore_patterns = [\"dist/[\"]").unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
        assert!(err.to_string().contains("test_path_ignore_patterns"));

        let fragments_and_globs = "test_path_ignore_patterns = [\"/dist/\", \"build/**\"]";
        let config = resolve(&dir, fragments_and_globs).unwrap();
        assert_eq!(config.test_path_ignore_patterns.len(), 2);
    }

    #[test]
    fn chained_aliases_without_cycle_are_accepted() {
        let dir = TempDir::new().unwrap();
        let config = resolve(
            &dir,
            r#"
            [[module_name_mapper]]
            prefix = "~/"
            replacement = "@/lib/"
            [[module_name_mapper]]
            prefix = "@/"
            replacement = "./src/"
            "#,
        )
        .unwrap();
        assert_eq!(config.module_name_mapper.len(), 2);
    }

    #[test]
    fn unresolvable_setup_file_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let err = resolve(&dir, "setup_files = [\"./setup/missing\"]").unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }

    #[test]
    fn setup_files_resolve_through_aliases_and_extensions() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/env.sh"), "true\n").unwrap();

        let config = resolve(
            &dir,
            r#"
            module_file_extensions = ["sh"]
            setup_files = ["@/env"]
            [[module_name_mapper]]
            prefix = "@/"
            replacement = "<rootDir>/src/"
            "#,
        )
        .unwrap();
        assert_eq!(config.setup_files, vec![root(&dir).join("src/env.sh")]);
    }

    #[test]
    fn custom_environment_and_unknown_environment() {
        let dir = TempDir::new().unwrap();
        let config = resolve(
            &dir,
            r#"
            test_environment = "bash-strict"
            [environments.bash-strict]
            program = "bash"
            args = ["-eu"]
            env = { CI = "1" }
            clear_env = true
            "#,
        )
        .unwrap();
        assert_eq!(config.test_environment.program.as_deref(), Some("bash"));
        assert_eq!(config.test_environment.args, vec!["-eu"]);
        assert!(config.test_environment.clear_env);

        let err = resolve(&dir, "test_environment = \"browser\"").unwrap_err();
        assert!(err.to_string().contains("unknown test_environment"));
    }

    #[test]
    fn overrides_apply_last() {
        let dir = TempDir::new().unwrap();
        let file = ConfigFile::parse("pass_with_no_tests = false\nmax_workers = 8").unwrap();
        let overrides = Overrides {
            pass_with_no_tests: true,
            max_workers: Some(2),
        };
        let config = resolve_config(file, dir.path(), &HashMap::new(), &overrides).unwrap();
        assert!(config.pass_with_no_tests);
        assert_eq!(config.max_workers, 2);

        let err = resolve(&dir, "max_workers = 0").unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }

    #[test]
    fn invalid_globs_and_empty_extensions_are_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(resolve(&dir, "test_match = [\"src/[oops\"]").is_err());
        assert!(resolve(&dir, "module_file_extensions = []").is_err());
    }
}
