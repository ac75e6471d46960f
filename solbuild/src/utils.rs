//! Utility functions

use crate::error::{BuildError, BuildIoError, Result};
use path_slash::PathExt;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::SystemTime,
};
use walkdir::WalkDir;

/// The extension of solidity source files
pub const SOLIDITY_EXTENSION: &str = "sol";

/// Returns `true` if the path has the `.sol` extension
pub fn is_source_file(path: impl AsRef<Path>) -> bool {
    path.as_ref().extension().map(|ext| ext == SOLIDITY_EXTENSION).unwrap_or_default()
}

/// Returns a sorted list of all the solidity files under the root
///
/// Unlike [`crate::filter::SourceFilter`] this applies no exclusions, every `.sol` file is
/// returned. Fails on the first directory entry that cannot be read.
///
/// # Example
///
/// ```no_run
/// use solbuild::utils;
/// let sources = utils::source_files("./contracts").unwrap();
/// ```
pub fn source_files(root: impl AsRef<Path>) -> walkdir::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry?;
        if entry.file_type().is_file() && is_source_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Converts an error of walking `root` into a [`BuildError::Io`]
pub(crate) fn walk_error(err: walkdir::Error, root: &Path) -> BuildError {
    let path = err.path().unwrap_or(root).to_path_buf();
    let io = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop detected"));
    BuildError::io(io, path)
}

/// Returns the source name of `file` relative to `root`, always using `/` as separator
///
/// `/root/contracts/token/Token.sol` with root `/root/contracts` => `token/Token.sol`
///
/// If `file` is not located under `root` the whole path is used.
pub fn source_name(file: &Path, root: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    relative.to_slash_lossy().into_owned()
}

/// Returns the final segment of a source name without the `.sol` extension
///
/// `token/Token.sol` => `Some("Token")`
pub fn contract_name_of(source_name: &str) -> Option<&str> {
    let file_name = source_name.rsplit('/').next()?;
    file_name.strip_suffix(".sol").filter(|name| !name.is_empty())
}

/// Reads the last modification time from the file's metadata
pub fn last_modified(file: impl AsRef<Path>) -> io::Result<SystemTime> {
    fs::metadata(file.as_ref())?.modified()
}

/// Canonicalize the path, platform-agnostic
///
/// On windows this will ensure the path only consists of `/` separators
pub fn canonicalize(path: impl AsRef<Path>) -> std::result::Result<PathBuf, BuildIoError> {
    let path = path.as_ref();
    dunce::canonicalize(path).map_err(|err| BuildIoError::new(err, path))
}

/// Creates the parent directory of the `file` and all its ancestors if it does not exist
pub fn create_parent_dir_all(file: impl AsRef<Path>) -> Result<()> {
    let file = file.as_ref();
    if let Some(parent) = file.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| BuildError::io(err, parent))?;
        }
    }
    Ok(())
}

/// Reads the json file and deserialize it into the provided type
pub fn read_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = fs::read(path).map_err(|err| BuildError::io(err, path))?;
    Ok(serde_json::from_slice(&content)?)
}

/// Serializes the value as json, indented with a single tab per level
pub fn to_vec_tab_pretty<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// Replaces the content of `path` with `content`
///
/// The content is written to a temporary file next to the target which is then renamed over
/// it, so readers either observe the previous file or the complete new one.
pub fn atomic_write(path: impl AsRef<Path>, content: &[u8]) -> Result<()> {
    let path = path.as_ref();
    create_parent_dir_all(path)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|err| BuildError::io(err, dir))?;
    tmp.write_all(content).map_err(|err| BuildError::io(err, tmp.path()))?;
    // temporary files are private, keep the mode of the replaced file instead
    let permissions = match fs::metadata(path) {
        Ok(metadata) => Some(metadata.permissions()),
        Err(_) => default_permissions(),
    };
    if let Some(permissions) = permissions {
        tmp.as_file().set_permissions(permissions).map_err(|err| BuildError::io(err, tmp.path()))?;
    }
    tmp.as_file().sync_all().map_err(|err| BuildError::io(err, tmp.path()))?;
    tmp.persist(path).map_err(|err| BuildError::io(err.error, path))?;
    Ok(())
}

/// Creates a new named tempdir
#[cfg(test)]
pub(crate) fn tempdir(name: &str) -> std::result::Result<tempfile::TempDir, BuildIoError> {
    tempfile::Builder::new().prefix(name).tempdir().map_err(|err| BuildIoError::new(err, name))
}

/// Sets the modification time of the file
#[cfg(test)]
pub(crate) fn set_modified(file: impl AsRef<Path>, time: SystemTime) {
    fs::OpenOptions::new().write(true).open(file).unwrap().set_modified(time).unwrap();
}

/// The mode of a newly written file, `rw-r--r--` like `fs::write` with the usual umask
#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashSet, fs::File};

    #[test]
    fn can_find_solidity_sources() {
        let tmp_dir = tempdir("contracts").unwrap();

        let file_a = tmp_dir.path().join("a.sol");
        let file_b = tmp_dir.path().join("a.txt");
        let nested = tmp_dir.path().join("nested");
        let file_c = nested.join("c.sol");
        let nested_deep = nested.join("deep");
        let file_d = nested_deep.join("d.sol");
        File::create(&file_a).unwrap();
        File::create(&file_b).unwrap();
        fs::create_dir_all(nested_deep).unwrap();
        File::create(&file_c).unwrap();
        File::create(&file_d).unwrap();

        let files: HashSet<_> = source_files(tmp_dir.path()).unwrap().into_iter().collect();
        let expected: HashSet<_> = [file_a, file_c, file_d].into();
        assert_eq!(files, expected);
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp_dir = tempdir("contracts").unwrap();
        assert!(source_files(tmp_dir.path().join("missing")).is_err());
    }

    #[test]
    fn can_create_source_names() {
        let root = Path::new("/project/contracts");
        let file = root.join("token").join("Token.sol");
        assert_eq!(source_name(&file, root), "token/Token.sol");
        assert_eq!(source_name(&root.join("Market.sol"), root), "Market.sol");
    }

    #[test]
    fn can_get_contract_name_of_source() {
        assert_eq!(contract_name_of("token/Token.sol"), Some("Token"));
        assert_eq!(contract_name_of("Market.sol"), Some("Market"));
        assert_eq!(contract_name_of("Market.sol.bak"), None);
        assert_eq!(contract_name_of(".sol"), None);
    }

    #[test]
    fn writes_tab_indented_json() {
        let value = serde_json::json!({ "a": { "b": 1 } });
        let out = String::from_utf8(to_vec_tab_pretty(&value).unwrap()).unwrap();
        assert_eq!(out, "{\n\t\"a\": {\n\t\t\"b\": 1\n\t}\n}");
    }

    #[test]
    fn atomic_write_creates_parent_dirs_and_replaces() {
        let tmp_dir = tempdir("out").unwrap();
        let out = tmp_dir.path().join("deep").join("nested").join("out.json");
        atomic_write(&out, b"first").unwrap();
        assert_eq!(fs::read(&out).unwrap(), b"first");
        atomic_write(&out, b"second").unwrap();
        assert_eq!(fs::read(&out).unwrap(), b"second");
        // no temporary files are left behind
        assert_eq!(fs::read_dir(out.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    #[cfg(unix)]
    fn atomic_write_keeps_readable_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let tmp_dir = tempdir("out").unwrap();
        let mode = |path: &Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;

        let out = tmp_dir.path().join("contracts.json");
        atomic_write(&out, b"first").unwrap();
        assert_eq!(mode(&out), 0o644);

        let restricted = tmp_dir.path().join("restricted.json");
        fs::write(&restricted, b"first").unwrap();
        fs::set_permissions(&restricted, fs::Permissions::from_mode(0o640)).unwrap();
        atomic_write(&restricted, b"second").unwrap();
        assert_eq!(mode(&restricted), 0o640);
        assert_eq!(fs::read(&restricted).unwrap(), b"second");
    }
}
