//! Types to decide which source files take part in a compilation

use crate::{error::Result, utils};
use std::{fmt, path::Path, str::FromStr};

/// The exclusion applied when nothing else is configured: quarantined legacy modules
pub const DEFAULT_EXCLUDE: &str = "legacy_reputation";

/// A predicate property that determines whether a file satisfies a certain condition
pub trait FileFilter {
    /// The predicate function that should return if the given `file` should be included.
    fn is_match(&self, file: &Path) -> bool;
}

impl<F> FileFilter for F
where
    F: Fn(&Path) -> bool,
{
    fn is_match(&self, file: &Path) -> bool {
        (self)(file)
    }
}

/// A single configured exclusion, matched against a source name (`/` separated, relative to
/// the source root)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExcludePattern {
    /// Excludes every path that contains the substring
    Substring(String),
    /// Excludes every path matching the glob, see [`glob::Pattern`]
    Glob(glob::Pattern),
}

impl ExcludePattern {
    pub fn is_match(&self, source_name: &str) -> bool {
        match self {
            ExcludePattern::Substring(s) => source_name.contains(s.as_str()),
            ExcludePattern::Glob(pattern) => pattern.matches(source_name),
        }
    }
}

impl FromStr for ExcludePattern {
    type Err = glob::PatternError;

    /// Patterns containing any of `*?[` are treated as globs, everything else as substring
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.contains(['*', '?', '[']) {
            Ok(ExcludePattern::Glob(glob::Pattern::new(s)?))
        } else {
            Ok(ExcludePattern::Substring(s.to_string()))
        }
    }
}

impl fmt::Display for ExcludePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExcludePattern::Substring(s) => f.write_str(s),
            ExcludePattern::Glob(pattern) => f.write_str(pattern.as_str()),
        }
    }
}

/// Decides which files under a source root are compiled
///
/// A file is eligible if it has the `.sol` extension, no [`ExcludePattern`] matches its source
/// name and no custom [`FileFilter`] matches its path. Patterns also prune directories, custom
/// filters only ever see files.
#[derive(Default)]
pub struct SourceFilter {
    excludes: Vec<ExcludePattern>,
    custom: Vec<Box<dyn FileFilter + Send + Sync>>,
}

impl SourceFilter {
    /// A filter that only checks the extension
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses all patterns, see [`ExcludePattern::from_str`]
    pub fn with_patterns<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let excludes = patterns
            .into_iter()
            .map(|p| p.as_ref().parse::<ExcludePattern>())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { excludes, custom: Vec::new() })
    }

    #[must_use]
    pub fn exclude(mut self, pattern: ExcludePattern) -> Self {
        self.excludes.push(pattern);
        self
    }

    /// Adds a custom predicate, files it matches are excluded
    #[must_use]
    pub fn exclude_with(mut self, filter: impl FileFilter + Send + Sync + 'static) -> Self {
        self.custom.push(Box::new(filter));
        self
    }

    pub fn excludes(&self) -> &[ExcludePattern] {
        &self.excludes
    }

    /// Returns `true` if an [`ExcludePattern`] matches the path, regardless of its type
    ///
    /// Used to prune whole directories while walking the source root.
    pub fn is_excluded(&self, path: &Path, root: &Path) -> bool {
        let name = utils::source_name(path, root);
        self.excludes.iter().any(|pattern| pattern.is_match(&name))
    }

    /// Returns `true` if the file should be compiled
    pub fn is_eligible(&self, file: &Path, root: &Path) -> bool {
        utils::is_source_file(file) &&
            !self.is_excluded(file, root) &&
            !self.custom.iter().any(|filter| filter.is_match(file))
    }
}

impl fmt::Debug for SourceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFilter")
            .field("excludes", &self.excludes)
            .field("custom", &self.custom.len())
            .finish()
    }
}
