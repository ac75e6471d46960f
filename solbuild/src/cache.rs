//! Support for skipping builds when no source changed
use crate::{
    error::{BuildError, Result},
    utils,
};
use md5::Digest;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
    time::SystemTime,
};

/// format version of the fingerprint sidecar file
const FINGERPRINT_FORMAT_VERSION: &str = "solbuild-fingerprint-1";

/// The suffix appended to the output file name to get the fingerprint sidecar file
pub const FINGERPRINT_FILE_SUFFIX: &str = ".fingerprint.json";

/// How to decide whether the persisted artifact bundle is still valid
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CacheStrategy {
    /// The bundle is valid if no source file was modified after the bundle was written
    #[default]
    Timestamp,
    /// The bundle is valid if the content of all source files is unchanged
    ContentHash,
}

impl FromStr for CacheStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "timestamp" => Ok(CacheStrategy::Timestamp),
            "contentHash" | "content-hash" => Ok(CacheStrategy::ContentHash),
            s => Err(format!("Unknown cache strategy: {s}")),
        }
    }
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStrategy::Timestamp => f.write_str("timestamp"),
            CacheStrategy::ContentHash => f.write_str("contentHash"),
        }
    }
}

/// Decides whether the artifact bundle at `output` can be reused for the sources under `root`
///
/// Only `.sol` files are considered, configured exclusions are not applied. Every I/O problem
/// is treated as a stale cache, this never fails.
#[derive(Clone, Debug)]
pub struct SourcesCache<'a> {
    root: &'a Path,
    output: &'a Path,
    strategy: CacheStrategy,
}

impl<'a> SourcesCache<'a> {
    pub fn new(root: &'a Path, output: &'a Path, strategy: CacheStrategy) -> Self {
        Self { root, output, strategy }
    }

    /// Returns `true` if the persisted bundle is up to date
    #[tracing::instrument(skip_all, name = "sources-cache::is_valid")]
    pub fn is_valid(&self) -> bool {
        match self.strategy {
            CacheStrategy::Timestamp => match self.uncached_files() {
                Ok(files) => {
                    if let Some(file) = files.first() {
                        tracing::debug!(
                            "{} uncached source files, first: \"{}\"",
                            files.len(),
                            file.display()
                        );
                    }
                    files.is_empty()
                }
                Err(err) => {
                    tracing::debug!("cache is invalid: {}", err);
                    false
                }
            },
            CacheStrategy::ContentHash => self.is_fingerprint_unchanged(),
        }
    }

    /// Returns all source files that were modified at or after the time the output was written
    ///
    /// Fails if the output file or the source root can not be inspected.
    pub fn uncached_files(&self) -> Result<Vec<PathBuf>> {
        let compiled_at = utils::last_modified(self.output)
            .map_err(|err| BuildError::io(err, self.output))?;
        self.modified_since(compiled_at)
    }

    fn modified_since(&self, compiled_at: SystemTime) -> Result<Vec<PathBuf>> {
        let files =
            utils::source_files(self.root).map_err(|err| utils::walk_error(err, self.root))?;
        let mut uncached = Vec::new();
        for file in files {
            let modified = utils::last_modified(&file).map_err(|err| BuildError::io(err, &file))?;
            if modified < compiled_at {
                tracing::trace!("cached \"{}\"", file.display());
            } else {
                uncached.push(file);
            }
        }
        Ok(uncached)
    }

    fn is_fingerprint_unchanged(&self) -> bool {
        if !self.output.is_file() {
            tracing::debug!("no artifact bundle at \"{}\"", self.output.display());
            return false
        }
        let stored = match SourceFingerprint::read(fingerprint_path(self.output)) {
            Ok(stored) => stored,
            Err(err) => {
                tracing::debug!("no usable fingerprint: {}", err);
                return false
            }
        };
        match SourceFingerprint::compute(self.root) {
            Ok(current) => current.fingerprint == stored.fingerprint,
            Err(err) => {
                tracing::debug!("failed to fingerprint sources: {}", err);
                false
            }
        }
    }
}

/// Returns the path of the fingerprint sidecar that belongs to the output file
pub fn fingerprint_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(FINGERPRINT_FILE_SUFFIX);
    PathBuf::from(name)
}

/// The content hashes of all source files under a root, persisted next to the bundle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFingerprint {
    #[serde(rename = "_format")]
    pub format: String,
    /// hash over all `files` entries
    pub fingerprint: String,
    /// source name -> content hash
    pub files: BTreeMap<String, String>,
}

impl SourceFingerprint {
    /// Hashes the raw content of every `.sol` file under the root
    ///
    /// The result does not depend on the order in which the files are found. Files are hashed
    /// as bytes, so excluded files that are not valid UTF-8 do not fail the computation.
    pub fn compute(root: &Path) -> Result<Self> {
        let mut files = BTreeMap::new();
        for file in utils::source_files(root).map_err(|err| utils::walk_error(err, root))? {
            let content = fs::read(&file).map_err(|err| BuildError::io(err, &file))?;
            files.insert(utils::source_name(&file, root), hex::encode(md5::Md5::digest(content)));
        }

        let mut hasher = md5::Md5::new();
        for (name, hash) in &files {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
            hasher.update(hash.as_bytes());
            hasher.update([0u8]);
        }
        let fingerprint = hex::encode(hasher.finalize());
        Ok(Self { format: FINGERPRINT_FORMAT_VERSION.to_string(), fingerprint, files })
    }

    #[tracing::instrument(skip_all, name = "source-fingerprint::read")]
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let fingerprint: SourceFingerprint = utils::read_json_file(path)?;
        if fingerprint.format != FINGERPRINT_FORMAT_VERSION {
            return Err(BuildError::config(format!(
                "unsupported fingerprint format \"{}\" at {}",
                fingerprint.format,
                path.display()
            )))
        }
        Ok(fingerprint)
    }

    /// Removes the sidecar at `path`, a missing file is not an error
    pub fn remove(path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        match fs::remove_file(path) {
            Ok(()) => {
                tracing::trace!("removed fingerprint \"{}\"", path.display());
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(BuildError::io(err, path)),
        }
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        tracing::trace!("writing fingerprint to \"{}\"", path.display());
        utils::atomic_write(path, &serde_json::to_vec_pretty(self)?)
    }
}
