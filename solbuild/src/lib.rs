#![doc = include_str!("../README.md")]

pub mod artifacts;
pub use artifacts::{CompilerInput, CompilerOutput, DiagnosticsPolicy, Severity};

pub mod artifact_output;
pub use artifact_output::{ArtifactBundle, CompactContract};

pub mod cache;
use cache::{CacheStrategy, SourceFingerprint, SourcesCache};

mod compile;
pub use compile::{Compiler, Solc, SOLC, SOLC_PATH_ENV};

mod config;
pub use config::{
    BuildConfig, CacheMode, ProjectPathsConfig, ProjectPathsConfigBuilder, SolcConfig,
};

pub mod error;
pub mod filter;
pub mod utils;

use error::Result;
use filter::{ExcludePattern, FileFilter, SourceFilter};
use std::{fmt, path::PathBuf};

/// Handles contract compiling
#[derive(Debug)]
pub struct Project<C: Compiler = Solc> {
    /// Where to find sources and where to put the bundle
    pub paths: ProjectPathsConfig,
    /// The compiler that turns the input into the output
    pub compiler: C,
    /// How solc invocation should be configured.
    pub solc_config: SolcConfig,
    /// Which source files are compiled
    pub filter: SourceFilter,
    /// Whether caching is enabled
    pub cached: bool,
    /// How the persisted bundle is checked for staleness
    pub cache_strategy: CacheStrategy,
    /// Which diagnostics abort the build
    pub diagnostics: DiagnosticsPolicy,
    /// Errors/Warnings which match these error codes are dropped
    pub ignored_error_codes: Vec<u64>,
}

impl Project {
    /// Configure the current project
    ///
    /// # Example
    ///
    /// ```rust
    /// use solbuild::{Project, ProjectPathsConfig};
    /// let project = Project::builder()
    ///     .paths(ProjectPathsConfig::new("./source/contracts", "./output/contracts.json"))
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn builder() -> ProjectBuilder {
        ProjectBuilder::default()
    }
}

impl<C: Compiler> Project<C> {
    /// Returns `true` if the persisted bundle can be reused
    ///
    /// Always `false` if caching is disabled.
    pub fn is_cache_valid(&self) -> bool {
        self.cached && self.sources_cache().is_valid()
    }

    /// Returns all source files modified since the bundle was written
    ///
    /// This always uses the timestamps, regardless of the configured [`CacheStrategy`].
    pub fn uncached_files(&self) -> Result<Vec<PathBuf>> {
        SourcesCache::new(&self.paths.sources, &self.paths.output, CacheStrategy::Timestamp)
            .uncached_files()
    }

    /// Returns the input for all eligible files under the source root
    pub fn compiler_input(&self) -> Result<CompilerInput> {
        let settings = self.solc_config.settings.clone();
        CompilerInput::assemble(&self.paths.sources, &self.filter, settings)
    }

    /// Attempts to compile the contracts found at the configured location.
    ///
    /// If caching is enabled and no source changed since the last build, the persisted bundle
    /// is returned without invoking the compiler. Otherwise all eligible sources are compiled,
    /// the diagnostics are checked, and the filtered bundle replaces the output file.
    ///
    /// Nothing is written if the build fails.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use solbuild::BuildConfig;
    /// # fn demo() -> Result<(), Box<dyn std::error::Error>> {
    /// let project = BuildConfig::load("solbuild.json")?.project()?;
    /// let output = project.compile()?;
    /// println!("{output}");
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip_all, name = "project::compile")]
    pub fn compile(&self) -> Result<ProjectCompileOutput> {
        if self.is_cache_valid() {
            match ArtifactBundle::read(&self.paths.output) {
                Ok(bundle) => {
                    tracing::debug!(
                        "no changes detected, reusing \"{}\"",
                        self.paths.output.display()
                    );
                    return Ok(ProjectCompileOutput::Unchanged(bundle))
                }
                Err(err) => tracing::debug!("failed to read cached bundle, recompiling: {}", err),
            }
        }

        // taken before the sources are read, an edit during compilation invalidates the cache
        let fingerprint = if self.cached && self.cache_strategy == CacheStrategy::ContentHash {
            Some(SourceFingerprint::compute(&self.paths.sources)?)
        } else {
            None
        };
        let input = self.compiler_input()?;
        tracing::debug!("compiling {} sources", input.sources.len());
        let mut output = self.compiler.compile(&input)?;
        output.retain_diagnostics(&self.ignored_error_codes);
        output.ensure_compiled(self.diagnostics)?;

        let bundle = ArtifactBundle::from_output(&output);
        // a sidecar describing the previous bundle must not outlive it
        SourceFingerprint::remove(self.paths.fingerprint())?;
        bundle.write(&self.paths.output)?;
        tracing::debug!("wrote {} contracts to \"{}\"", bundle.len(), self.paths.output.display());
        if let Some(fingerprint) = fingerprint {
            if let Err(err) = fingerprint.write(self.paths.fingerprint()) {
                tracing::warn!("failed to write fingerprint, next build recompiles: {}", err);
            }
        }
        Ok(ProjectCompileOutput::Compiled(bundle))
    }

    fn sources_cache(&self) -> SourcesCache<'_> {
        SourcesCache::new(&self.paths.sources, &self.paths.output, self.cache_strategy)
    }
}

pub struct ProjectBuilder<C: Compiler = Solc> {
    paths: Option<ProjectPathsConfig>,
    compiler: C,
    solc_config: Option<SolcConfig>,
    filter: Option<SourceFilter>,
    /// Whether caching is enabled, default is true.
    cached: bool,
    cache_strategy: CacheStrategy,
    diagnostics: DiagnosticsPolicy,
    /// Which error codes to ignore
    pub ignored_error_codes: Vec<u64>,
}

impl ProjectBuilder<Solc> {
    pub fn solc(mut self, solc: impl Into<Solc>) -> Self {
        self.compiler = solc.into();
        self
    }
}

impl<C: Compiler> ProjectBuilder<C> {
    pub fn paths(mut self, paths: ProjectPathsConfig) -> Self {
        self.paths = Some(paths);
        self
    }

    /// Replaces the compiler, for example with a closure
    pub fn compiler<T: Compiler>(self, compiler: T) -> ProjectBuilder<T> {
        let Self {
            paths,
            compiler: _,
            solc_config,
            filter,
            cached,
            cache_strategy,
            diagnostics,
            ignored_error_codes,
        } = self;
        ProjectBuilder {
            paths,
            compiler,
            solc_config,
            filter,
            cached,
            cache_strategy,
            diagnostics,
            ignored_error_codes,
        }
    }

    pub fn solc_config(mut self, solc_config: SolcConfig) -> Self {
        self.solc_config = Some(solc_config);
        self
    }

    /// Replaces the filter, the default excludes `legacy_reputation`
    pub fn filter(mut self, filter: SourceFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Adds an exclusion to the filter
    pub fn exclude(mut self, pattern: ExcludePattern) -> Self {
        self.filter = Some(self.filter.take().unwrap_or_else(default_filter).exclude(pattern));
        self
    }

    /// Adds a custom predicate, matching files are not compiled
    pub fn exclude_with(mut self, filter: impl FileFilter + Send + Sync + 'static) -> Self {
        self.filter = Some(self.filter.take().unwrap_or_else(default_filter).exclude_with(filter));
        self
    }

    pub fn cache_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.cache_strategy = strategy;
        self
    }

    pub fn diagnostics(mut self, policy: DiagnosticsPolicy) -> Self {
        self.diagnostics = policy;
        self
    }

    pub fn ignore_error_code(mut self, code: u64) -> Self {
        self.ignored_error_codes.push(code);
        self
    }

    /// Disables cached builds
    pub fn ephemeral(mut self) -> Self {
        self.cached = false;
        self
    }

    pub fn build(self) -> Result<Project<C>> {
        let Self {
            paths,
            compiler,
            solc_config,
            filter,
            cached,
            cache_strategy,
            diagnostics,
            ignored_error_codes,
        } = self;
        let paths = paths.ok_or_else(|| error::BuildError::config("no project paths set"))?;
        Ok(Project {
            paths,
            compiler,
            solc_config: solc_config.unwrap_or_default(),
            filter: filter.unwrap_or_else(default_filter),
            cached,
            cache_strategy,
            diagnostics,
            ignored_error_codes,
        })
    }
}

impl Default for ProjectBuilder<Solc> {
    fn default() -> Self {
        Self {
            paths: None,
            compiler: Solc::default(),
            solc_config: None,
            filter: None,
            cached: true,
            cache_strategy: CacheStrategy::default(),
            diagnostics: DiagnosticsPolicy::default(),
            ignored_error_codes: Vec::new(),
        }
    }
}

fn default_filter() -> SourceFilter {
    SourceFilter::new().exclude(ExcludePattern::Substring(filter::DEFAULT_EXCLUDE.to_string()))
}

/// The result of [`Project::compile`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectCompileOutput {
    /// Nothing to compile because unchanged sources, this is the persisted bundle
    Unchanged(ArtifactBundle),
    /// The freshly compiled and persisted bundle
    Compiled(ArtifactBundle),
}

impl ProjectCompileOutput {
    pub fn bundle(&self) -> &ArtifactBundle {
        match self {
            ProjectCompileOutput::Unchanged(bundle) | ProjectCompileOutput::Compiled(bundle) => {
                bundle
            }
        }
    }

    pub fn into_bundle(self) -> ArtifactBundle {
        match self {
            ProjectCompileOutput::Unchanged(bundle) | ProjectCompileOutput::Compiled(bundle) => {
                bundle
            }
        }
    }

    /// Whether the compiler was skipped
    pub fn is_unchanged(&self) -> bool {
        matches!(self, ProjectCompileOutput::Unchanged(_))
    }
}

impl fmt::Display for ProjectCompileOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectCompileOutput::Unchanged(_) => f.write_str("Nothing to compile"),
            ProjectCompileOutput::Compiled(bundle) => {
                write!(f, "Compiled {} contracts", bundle.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_paths() {
        assert!(Project::builder().build().is_err());
    }

    #[test]
    fn default_filter_excludes_legacy_modules() {
        let project = Project::builder()
            .paths(ProjectPathsConfig::new("contracts", "out.json"))
            .build()
            .unwrap();
        assert_eq!(
            project.filter.excludes(),
            &[ExcludePattern::Substring("legacy_reputation".to_string())]
        );
        assert!(project.cached);
        assert_eq!(project.cache_strategy, CacheStrategy::Timestamp);
        assert_eq!(project.diagnostics, DiagnosticsPolicy::AbortOnAny);
    }

    #[test]
    fn ephemeral_project_never_has_valid_cache() {
        let project = Project::builder()
            .paths(ProjectPathsConfig::new("contracts", "out.json"))
            .ephemeral()
            .build()
            .unwrap();
        assert!(!project.is_cache_valid());
    }

    #[test]
    fn displays_compile_output() {
        let bundle = ArtifactBundle::default();
        let unchanged = ProjectCompileOutput::Unchanged(bundle.clone());
        assert_eq!(unchanged.to_string(), "Nothing to compile");
        assert_eq!(ProjectCompileOutput::Compiled(bundle).to_string(), "Compiled 0 contracts");
    }
}
