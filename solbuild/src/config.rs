use crate::{
    artifacts::{DiagnosticsPolicy, Settings, DEFAULT_OPTIMIZER_RUNS},
    cache::{fingerprint_path, CacheStrategy},
    compile::Solc,
    error::{BuildError, Result},
    filter::{SourceFilter, DEFAULT_EXCLUDE},
    utils, Project, ProjectBuilder,
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Where to find the sources and where to put the artifact bundle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPathsConfig {
    /// Where to find sources
    pub sources: PathBuf,
    /// The file the artifact bundle is written to
    pub output: PathBuf,
}

impl ProjectPathsConfig {
    pub fn new(sources: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self { sources: sources.into(), output: output.into() }
    }

    pub fn builder() -> ProjectPathsConfigBuilder {
        ProjectPathsConfigBuilder::default()
    }

    /// The fingerprint sidecar of the output file, used by [`CacheStrategy::ContentHash`]
    pub fn fingerprint(&self) -> PathBuf {
        fingerprint_path(&self.output)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ProjectPathsConfigBuilder {
    sources: Option<PathBuf>,
    output: Option<PathBuf>,
}

impl ProjectPathsConfigBuilder {
    pub fn sources(mut self, sources: impl Into<PathBuf>) -> Self {
        self.sources = Some(sources.into());
        self
    }

    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn build(self) -> Result<ProjectPathsConfig> {
        let sources = self.sources.ok_or_else(|| BuildError::config("no source root set"))?;
        let output = self.output.ok_or_else(|| BuildError::config("no output file set"))?;
        Ok(ProjectPathsConfig { sources, output })
    }
}

/// The config to use when invoking solc
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SolcConfig {
    /// How the file was compiled
    pub settings: Settings,
}

impl SolcConfig {
    /// Default settings with the given optimizer run count
    pub fn with_optimizer_runs(runs: usize) -> Self {
        let mut settings = Settings::default();
        settings.optimizer.runs(runs);
        Self { settings }
    }
}

/// Whether and how previous builds are reused
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CacheMode {
    #[default]
    Timestamp,
    ContentHash,
    /// Always compile
    Disabled,
}

impl CacheMode {
    /// The strategy to check the cache with, `None` if caching is disabled
    pub fn strategy(&self) -> Option<CacheStrategy> {
        match self {
            CacheMode::Timestamp => Some(CacheStrategy::Timestamp),
            CacheMode::ContentHash => Some(CacheStrategy::ContentHash),
            CacheMode::Disabled => None,
        }
    }
}

impl FromStr for CacheMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "disabled" | "none" => Ok(CacheMode::Disabled),
            s => s.parse::<CacheStrategy>().map(|strategy| match strategy {
                CacheStrategy::Timestamp => CacheMode::Timestamp,
                CacheStrategy::ContentHash => CacheMode::ContentHash,
            }),
        }
    }
}

/// The build configuration as it is stored on disk
///
/// ```json
/// {
///   "contractSourceRoot": "./source/contracts",
///   "contractOutputPath": "./output/contracts/contracts.json",
///   "exclude": ["legacy_reputation"],
///   "optimizerRuns": 500,
///   "cache": "timestamp"
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    pub contract_source_root: PathBuf,
    pub contract_output_path: PathBuf,
    /// Substrings or globs of source names that are not compiled
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
    #[serde(default = "default_optimizer_runs")]
    pub optimizer_runs: usize,
    #[serde(default)]
    pub cache: CacheMode,
    #[serde(default)]
    pub diagnostics: DiagnosticsPolicy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignored_error_codes: Vec<u64>,
    /// The `solc` binary, [`Solc::default`] if not set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solc: Option<PathBuf>,
}

fn default_exclude() -> Vec<String> {
    vec![DEFAULT_EXCLUDE.to_string()]
}

fn default_optimizer_runs() -> usize {
    DEFAULT_OPTIMIZER_RUNS
}

impl BuildConfig {
    /// A config with default settings for the given paths
    pub fn new(sources: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            contract_source_root: sources.into(),
            contract_output_path: output.into(),
            exclude: default_exclude(),
            optimizer_runs: DEFAULT_OPTIMIZER_RUNS,
            cache: CacheMode::default(),
            diagnostics: DiagnosticsPolicy::default(),
            ignored_error_codes: Vec::new(),
            solc: None,
        }
    }

    /// Reads the config from a json file
    ///
    /// Relative paths are resolved against the directory of the config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read(path).map_err(|err| BuildError::io(err, path))?;
        let config: BuildConfig = serde_json::from_slice(&content)
            .map_err(|err| BuildError::config(format!("{}: {err}", path.display())))?;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let dir = utils::canonicalize(dir)?;
        tracing::debug!("loaded build config from \"{}\"", path.display());
        Ok(config.relative_to(&dir))
    }

    /// Resolves all relative paths against `dir`
    ///
    /// A bare `solc` name is left as is so it is looked up on the `PATH`.
    #[must_use]
    pub fn relative_to(mut self, dir: &Path) -> Self {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        };
        resolve(&mut self.contract_source_root);
        resolve(&mut self.contract_output_path);
        if let Some(solc) = self.solc.as_mut() {
            if solc.components().count() > 1 {
                resolve(solc);
            }
        }
        self
    }

    pub fn paths(&self) -> ProjectPathsConfig {
        ProjectPathsConfig::new(&self.contract_source_root, &self.contract_output_path)
    }

    /// Parses the configured exclusions
    pub fn filter(&self) -> Result<SourceFilter> {
        SourceFilter::with_patterns(&self.exclude)
    }

    /// Returns a [`ProjectBuilder`] configured with everything but the compiler
    pub fn builder(&self) -> Result<ProjectBuilder> {
        let mut builder = Project::builder()
            .paths(self.paths())
            .solc_config(SolcConfig::with_optimizer_runs(self.optimizer_runs))
            .filter(self.filter()?)
            .diagnostics(self.diagnostics);
        for code in &self.ignored_error_codes {
            builder = builder.ignore_error_code(*code);
        }
        builder = match self.cache.strategy() {
            Some(strategy) => builder.cache_strategy(strategy),
            None => builder.ephemeral(),
        };
        if let Some(solc) = &self.solc {
            builder = builder.solc(Solc::new(solc));
        }
        Ok(builder)
    }

    /// Creates the [`Project`] that compiles with `solc`
    pub fn project(&self) -> Result<Project<Solc>> {
        self.builder()?.build()
    }
}
