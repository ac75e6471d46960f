//! Solc standard json input and output types

use crate::{
    error::{BuildIoError, Result},
    filter::SourceFilter,
    utils,
};
use md5::Digest;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

pub mod contract;
pub mod output_selection;

pub use contract::*;
pub use output_selection::OutputSelection;

/// Solidity files are made up of multiple `source units`, a solidity contract is such a `source
/// unit`, therefore a solidity file can contain multiple contracts: (1-N*) relationship.
///
/// This types represents this mapping as `file name -> (contract name -> T)`
pub type FileToContractsMap<T> = BTreeMap<String, BTreeMap<String, T>>;

/// An ordered list of source names and their source
///
/// Source names are relative to the source root and always use `/` separators, so the map
/// iterates in lexicographic order of the relative path on every platform.
pub type Sources = BTreeMap<String, Source>;

/// The language identifier of solidity sources
pub const SOLIDITY: &str = "Solidity";

/// The default number of optimizer runs
pub const DEFAULT_OPTIMIZER_RUNS: usize = 500;

/// Input type `solc` expects
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerInput {
    pub language: String,
    pub settings: Settings,
    pub sources: Sources,
}

impl CompilerInput {
    /// Creates a new solidity [CompilerInput] with default settings and the given sources
    pub fn with_sources(sources: Sources) -> Self {
        Self { language: SOLIDITY.to_string(), settings: Default::default(), sources }
    }

    /// Reads every eligible file under `root` and assembles them into a single input
    ///
    /// Fails if any of the eligible files cannot be read.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use solbuild::{artifacts::Settings, filter::SourceFilter, CompilerInput};
    /// let filter = SourceFilter::with_patterns(["legacy_reputation"]).unwrap();
    /// let input = CompilerInput::assemble("./contracts", &filter, Settings::default()).unwrap();
    /// ```
    #[tracing::instrument(skip_all, name = "compiler-input::assemble")]
    pub fn assemble(
        root: impl AsRef<Path>,
        filter: &SourceFilter,
        settings: Settings,
    ) -> Result<Self> {
        let root = root.as_ref();
        let files = eligible_files(root, filter)?;
        tracing::debug!("assembling {} source files under \"{}\"", files.len(), root.display());
        let sources = Source::read_all_files(root, files)?;
        Ok(Self::with_sources(sources).settings(settings))
    }

    /// Sets the settings for compilation
    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }
}

/// Returns all eligible files under the root, sorted
///
/// Directories matched by an exclusion pattern are not descended into, custom filters are only
/// applied to files.
pub fn eligible_files(root: &Path, filter: &SourceFilter) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !filter.is_excluded(entry.path(), root));
    for entry in walker {
        let entry = entry.map_err(|err| utils::walk_error(err, root))?;
        if entry.file_type().is_file() && filter.is_eligible(entry.path(), root) {
            files.push(entry.into_path());
        } else if entry.file_type().is_file() {
            tracing::trace!("skipping \"{}\"", entry.path().display());
        }
    }
    files.sort();
    Ok(files)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub optimizer: Optimizer,
    /// This field can be used to select desired outputs based
    /// on file and contract names.
    /// If this field is omitted, then the compiler loads and does type
    /// checking, but will not generate any outputs apart from errors.
    #[serde(default)]
    pub output_selection: OutputSelection,
}

impl Default for Settings {
    fn default() -> Self {
        Self { optimizer: Default::default(), output_selection: OutputSelection::deployable() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Optimizer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs: Option<usize>,
}

impl Optimizer {
    pub fn runs(&mut self, runs: usize) {
        self.runs = Some(runs);
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self { enabled: Some(true), runs: Some(DEFAULT_OPTIMIZER_RUNS) }
    }
}

/// Content of a solidity file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub content: String,
}

impl Source {
    /// this is a heuristically measured threshold at which we can generally expect a speedup by
    /// using rayon's `par_iter`, See `Self::read_all_files`
    pub const NUM_READ_PAR: usize = 8;

    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into() }
    }

    /// Reads the file content
    pub fn read(file: impl AsRef<Path>) -> std::result::Result<Self, BuildIoError> {
        let file = file.as_ref();
        Ok(Self { content: fs::read_to_string(file).map_err(|err| BuildIoError::new(err, file))? })
    }

    /// Reads all files and keys them by their source name relative to `root`
    ///
    /// Depending on the number of files they are read in parallel. The first failed read aborts
    /// the whole operation.
    pub fn read_all_files(
        root: &Path,
        files: Vec<PathBuf>,
    ) -> std::result::Result<Sources, BuildIoError> {
        use rayon::prelude::*;

        let read = |file: &PathBuf| {
            Self::read(file).map(|source| (utils::source_name(file, root), source))
        };
        if files.len() < Self::NUM_READ_PAR {
            files.iter().map(read).collect()
        } else {
            files.par_iter().map(read).collect()
        }
    }

    /// Generate a non-cryptographically secure checksum of the file's content
    pub fn content_hash(&self) -> String {
        let mut hasher = md5::Md5::new();
        hasher.update(&self.content);
        let result = hasher.finalize();
        hex::encode(result)
    }
}

impl AsRef<str> for Source {
    fn as_ref(&self) -> &str {
        &self.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::BuildError, filter::DEFAULT_EXCLUDE, utils::tempdir};
    use pretty_assertions::assert_eq;

    fn write(root: &Path, name: &str, content: &str) {
        let file = root.join(name);
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(file, content).unwrap();
    }

    #[test]
    fn can_parse_compiler_input() {
        let input = include_str!("../../test-data/compiler-in.json");
        let input: CompilerInput = serde_json::from_str(input).unwrap();
        assert_eq!(input.language, SOLIDITY);
        assert_eq!(input.settings, Settings::default());
        assert_eq!(input.sources.len(), 2);
    }

    #[test]
    fn serializes_standard_json_input() {
        let mut sources = Sources::new();
        sources.insert("Market.sol".to_string(), Source::new("contract Market {}"));
        let input = CompilerInput::with_sources(sources);
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            serde_json::json!({
                "language": "Solidity",
                "settings": {
                    "optimizer": { "enabled": true, "runs": 500 },
                    "outputSelection": { "*": { "*": ["abi", "evm.bytecode.object"] } }
                },
                "sources": { "Market.sol": { "content": "contract Market {}" } }
            })
        );
    }

    #[test]
    fn assembles_eligible_sources_only() {
        let tmp = tempdir("contracts").unwrap();
        let root = tmp.path();
        write(root, "Universe.sol", "contract Universe {}");
        write(root, "trading/Market.sol", "contract Market {}");
        write(root, "trading/README.md", "# docs");
        write(root, "legacy_reputation/OldToken.sol", "contract OldToken {}");
        write(root, "libraries/legacy_reputation.sol", "library Legacy {}");

        let filter = SourceFilter::with_patterns([DEFAULT_EXCLUDE]).unwrap();
        let input = CompilerInput::assemble(root, &filter, Settings::default()).unwrap();

        let names: Vec<_> = input.sources.keys().cloned().collect();
        assert_eq!(names, vec!["Universe.sol".to_string(), "trading/Market.sol".to_string()]);
        assert_eq!(input.sources["trading/Market.sol"].content, "contract Market {}");
    }

    #[test]
    fn custom_filters_only_match_files() {
        let tmp = tempdir("contracts").unwrap();
        let root = tmp.path();
        write(root, "mocks/Token.sol", "contract Token {}");
        write(root, "mocks/MockToken.sol", "contract MockToken {}");

        // would match the `mocks` directory itself if it was applied while walking
        let filter = SourceFilter::new().exclude_with(|p: &Path| {
            p.ends_with("mocks") || p.file_name().map_or(false, |n| n == "MockToken.sol")
        });
        let input = CompilerInput::assemble(root, &filter, Settings::default()).unwrap();
        assert_eq!(input.sources.keys().collect::<Vec<_>>(), vec!["mocks/Token.sol"]);
    }

    #[test]
    fn assembles_many_sources_in_stable_order() {
        let tmp = tempdir("contracts").unwrap();
        let root = tmp.path();
        let mut expected = Vec::new();
        for i in (0..3 * Source::NUM_READ_PAR).rev() {
            let name = format!("nested/C{i:02}.sol");
            write(root, &name, &format!("contract C{i:02} {{}}"));
            expected.push(name);
        }
        expected.sort();

        let filter = SourceFilter::new();
        let first = CompilerInput::assemble(root, &filter, Settings::default()).unwrap();
        let second = CompilerInput::assemble(root, &filter, Settings::default()).unwrap();
        assert_eq!(first.sources.keys().cloned().collect::<Vec<_>>(), expected);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn unreadable_source_aborts_assembly() {
        let tmp = tempdir("contracts").unwrap();
        let root = tmp.path();
        write(root, "Universe.sol", "contract Universe {}");
        // invalid utf-8 can not be read as source
        fs::write(root.join("Broken.sol"), [0xff, 0xfe, 0xfd]).unwrap();

        let err = CompilerInput::assemble(root, &SourceFilter::new(), Settings::default())
            .unwrap_err();
        match err {
            BuildError::Io(err) => assert!(err.path().ends_with("Broken.sol")),
            err => panic!("unexpected error {err}"),
        }
    }

    #[test]
    fn missing_root_aborts_assembly() {
        let tmp = tempdir("contracts").unwrap();
        let root = tmp.path().join("missing");
        let res = CompilerInput::assemble(root, &SourceFilter::new(), Settings::default());
        assert!(matches!(res, Err(BuildError::Io(_))));
    }

    #[test]
    fn content_hash_changes_with_content() {
        let a = Source::new("contract A {}");
        assert_eq!(a.content_hash(), Source::new("contract A {}").content_hash());
        assert_ne!(a.content_hash(), Source::new("contract B {}").content_hash());
    }
}
