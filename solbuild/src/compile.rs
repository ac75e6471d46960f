use crate::{
    artifacts::{CompilerInput, CompilerOutput},
    error::{BuildError, Result},
};
use semver::Version;
use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
    str::FromStr,
};

/// The name of the `solc` binary on the system
pub const SOLC: &str = "solc";

/// The environment variable that overrides the `solc` binary
pub const SOLC_PATH_ENV: &str = "SOLC_PATH";

/// Turns a standard json [CompilerInput] into a [CompilerOutput]
///
/// Implemented by [Solc] and by any `Fn(&CompilerInput) -> Result<CompilerOutput>`, which makes it
/// easy to swap the compiler in tests:
///
/// ```
/// use solbuild::{error::Result, Compiler, CompilerInput, CompilerOutput};
/// let compiler = |_: &CompilerInput| -> Result<CompilerOutput> { Ok(CompilerOutput::default()) };
/// let output = compiler.compile(&CompilerInput::with_sources(Default::default())).unwrap();
/// assert!(output.contracts.is_empty());
/// ```
pub trait Compiler {
    fn compile(&self, input: &CompilerInput) -> Result<CompilerOutput>;
}

impl<F> Compiler for F
where
    F: Fn(&CompilerInput) -> Result<CompilerOutput>,
{
    fn compile(&self, input: &CompilerInput) -> Result<CompilerOutput> {
        (self)(input)
    }
}

/// Abstraction over `solc` command line utility
#[derive(Debug, Clone, Eq, PartialEq, PartialOrd, Ord)]
pub struct Solc(pub PathBuf);

impl Default for Solc {
    fn default() -> Self {
        std::env::var(SOLC_PATH_ENV).map(Solc::new).unwrap_or_else(|_| Solc::new(SOLC))
    }
}

impl Solc {
    /// A new instance which points to `solc`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Solc(path.into())
    }

    /// Run `solc --standard-json` and return the `solc`'s output as `CompilerOutput`
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use solbuild::{filter::SourceFilter, CompilerInput, Solc};
    /// let solc = Solc::default();
    /// let filter = SourceFilter::new();
    /// let input = CompilerInput::assemble("./contracts", &filter, Default::default())?;
    /// let output = solc.compile(&input)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn compile(&self, input: &CompilerInput) -> Result<CompilerOutput> {
        let output = self.compile_output(input)?;
        CompilerOutput::from_slice(&output)
    }

    /// Run `solc --standard-json` and return the raw stdout
    #[tracing::instrument(skip_all, name = "solc::compile")]
    pub fn compile_output(&self, input: &CompilerInput) -> Result<Vec<u8>> {
        let content = serde_json::to_vec(input)?;
        tracing::debug!(
            "spawning {} with {} sources",
            self.0.display(),
            input.sources.len()
        );
        let mut child = Command::new(&self.0)
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stderr(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|err| BuildError::io(err, &self.0))?;
        let mut stdin =
            child.stdin.take().ok_or_else(|| BuildError::solc("failed to open solc stdin"))?;
        stdin.write_all(&content).map_err(|err| BuildError::io(err, &self.0))?;
        // close stdin so solc starts compiling
        drop(stdin);

        compile_output(child.wait_with_output().map_err(|err| BuildError::io(err, &self.0))?)
    }

    /// Returns the version from the configured `solc`
    pub fn version(&self) -> Result<Version> {
        version_from_output(
            Command::new(&self.0)
                .arg("--version")
                .stdin(Stdio::piped())
                .stderr(Stdio::piped())
                .stdout(Stdio::piped())
                .output()
                .map_err(|err| BuildError::io(err, &self.0))?,
        )
    }
}

impl Compiler for Solc {
    fn compile(&self, input: &CompilerInput) -> Result<CompilerOutput> {
        Solc::compile(self, input)
    }
}

fn compile_output(output: Output) -> Result<Vec<u8>> {
    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(BuildError::solc(String::from_utf8_lossy(&output.stderr).to_string()))
    }
}

fn version_from_output(output: Output) -> Result<Version> {
    if output.status.success() {
        let version = output
            .stdout
            .lines()
            .map_while(std::result::Result::ok)
            .filter(|l| !l.trim().is_empty())
            .last()
            .ok_or_else(|| BuildError::solc("version not found in solc output"))?;
        parse_version(&version)
    } else {
        Err(BuildError::solc(String::from_utf8_lossy(&output.stderr).to_string()))
    }
}

/// Parses the last line of `solc --version`: `Version: 0.8.17+commit.8df45f5f.Linux.g++`
fn parse_version(line: &str) -> Result<Version> {
    // NOTE: semver doesn't like `+` in g++ in build metadata which is invalid semver
    Ok(Version::from_str(&line.trim().trim_start_matches("Version: ").replace(".g++", ".gcc"))?)
}

impl AsRef<Path> for Solc {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl<T: Into<PathBuf>> From<T> for Solc {
    fn from(solc: T) -> Self {
        Solc(solc.into())
    }
}
