//! Contract and diagnostic types of the standard json output

use crate::{
    artifacts::FileToContractsMap,
    error::{BuildError, Result},
};
use serde::{de::Visitor, Deserialize, Deserializer, Serialize, Serializer};
use std::{collections::BTreeMap, fmt, str::FromStr};
use yansi::Paint;

/// file -> (contract name -> Contract)
pub type Contracts = FileToContractsMap<Contract>;

/// Output type `solc` produces
///
/// Every contract level field is optional since `solc` only emits what was requested in the
/// output selection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompilerOutput {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Error>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sources: BTreeMap<String, SourceFile>,
    #[serde(default)]
    pub contracts: Contracts,
}

impl CompilerOutput {
    /// Parses the raw json emitted by `solc`
    ///
    /// This is strict: a value that does not match the expected schema fails with
    /// [`BuildError::InvalidCompilerOutput`] naming the offending json path.
    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        let de = &mut serde_json::Deserializer::from_slice(raw);
        serde_path_to_error::deserialize(de).map_err(|err| {
            let path = err.path().to_string();
            BuildError::InvalidCompilerOutput { path, source: err.into_inner() }
        })
    }

    /// Whether the output contains a compiler error
    pub fn has_error(&self) -> bool {
        self.errors.iter().any(|err| err.severity.is_error())
    }

    /// Whether the output contains any diagnostic at all
    pub fn has_diagnostics(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Removes all diagnostics whose error code is in `ignored_error_codes`
    pub fn retain_diagnostics(&mut self, ignored_error_codes: &[u64]) {
        self.errors.retain(|err| {
            err.error_code.map(|code| !ignored_error_codes.contains(&code)).unwrap_or(true)
        });
    }

    /// Checks the diagnostics against the policy
    ///
    /// Returns a [`BuildError::Diagnostics`] with the newline joined messages of all
    /// diagnostics, in the order `solc` returned them, if the policy deems them fatal.
    /// Tolerated diagnostics are logged.
    pub fn ensure_compiled(&self, policy: DiagnosticsPolicy) -> Result<()> {
        if !self.has_diagnostics() {
            return Ok(())
        }
        let fatal = match policy {
            DiagnosticsPolicy::AbortOnAny => true,
            DiagnosticsPolicy::AbortOnError => self.has_error(),
        };
        if fatal {
            let messages =
                self.errors.iter().map(Error::message_text).collect::<Vec<_>>().join("\n");
            return Err(BuildError::Diagnostics(messages))
        }
        for err in &self.errors {
            tracing::warn!("{}", err);
        }
        Ok(())
    }
}

/// Determines which diagnostics abort a build
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticsPolicy {
    /// Every diagnostic, including warnings, aborts the build
    #[default]
    AbortOnAny,
    /// Only diagnostics of [`Severity::Error`] abort the build, others are logged
    AbortOnError,
}

impl FromStr for DiagnosticsPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "abortOnAny" | "abort-on-any" | "any" => Ok(DiagnosticsPolicy::AbortOnAny),
            "abortOnError" | "abort-on-error" | "error" => Ok(DiagnosticsPolicy::AbortOnError),
            s => Err(format!("Unknown diagnostics policy: {s}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// The Ethereum Contract ABI. If empty, it is represented as an empty
    /// array. See https://docs.soliditylang.org/en/develop/abi-spec.html
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<serde_json::Value>,
    /// EVM-related outputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm: Option<Evm>,
}

impl Contract {
    /// Returns the creation bytecode object, if it was emitted
    pub fn bytecode_object(&self) -> Option<&str> {
        self.evm.as_ref()?.bytecode.as_ref()?.object.as_deref()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytecode: Option<Bytecode>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bytecode {
    /// The bytecode as a hex string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: u32,
}

/// A diagnostic reported by `solc`
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_location: Option<SourceLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    pub severity: Severity,
    #[serde(default, with = "display_from_str_opt", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u64>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_message: Option<String>,
}

impl Error {
    /// The formatted message or, if `solc` did not provide one, the plain message
    pub fn message_text(&self) -> &str {
        self.formatted_message.as_deref().unwrap_or(&self.message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(msg) = &self.formatted_message {
            match self.severity {
                Severity::Error => {
                    if let Some(code) = self.error_code {
                        write!(f, "{}", Paint::red(format!("error[{code}]: ")))?;
                    }
                    write!(f, "{}", Paint::red(msg))
                }
                Severity::Warning | Severity::Info => {
                    if let Some(code) = self.error_code {
                        write!(f, "{}", Paint::yellow(format!("warning[{code}]: ")))?;
                    }
                    write!(f, "{}", Paint::yellow(msg))
                }
            }
        } else {
            write!(f, "{}", self.severity)?;
            writeln!(f, ": {}", self.message)
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "{}", Paint::red("Error")),
            Severity::Warning => write!(f, "{}", Paint::yellow("Warning")),
            Severity::Info => f.write_str("Info"),
        }
    }
}

impl Severity {
    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            s => Err(format!("Invalid severity: {s}")),
        }
    }
}

impl Serialize for Severity {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Severity::Error => serializer.serialize_str("error"),
            Severity::Warning => serializer.serialize_str("warning"),
            Severity::Info => serializer.serialize_str("info"),
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SeverityVisitor;

        impl<'de> Visitor<'de> for SeverityVisitor {
            type Value = Severity;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(formatter, "severity string")
            }

            fn visit_str<E>(self, value: &str) -> std::result::Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                value.parse().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_str(SeverityVisitor)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub struct SourceLocation {
    pub file: String,
    pub start: i32,
    pub end: i32,
}

/// `solc` emits error codes as strings: `"errorCode": "1878"`
mod display_from_str_opt {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::{fmt, str::FromStr};

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: fmt::Display,
        S: Serializer,
    {
        if let Some(value) = value {
            serializer.collect_str(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: FromStr,
        T::Err: fmt::Display,
    {
        if let Some(s) = Option::<String>::deserialize(deserializer)? {
            s.parse().map_err(de::Error::custom).map(Some)
        } else {
            Ok(None)
        }
    }
}
