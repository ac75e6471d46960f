//! bindings for standard json output selection

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The interface descriptor of a contract
pub const ABI: &str = "abi";

/// The creation bytecode of a contract as hex string
pub const BYTECODE_OBJECT: &str = "evm.bytecode.object";

/// Contract name -> requested outputs, `"*"` selects all contracts
pub type FileOutputSelection = BTreeMap<String, Vec<String>>;

/// Represents the selected output of files and contracts
///
/// The first level key is the file name and the second level key is the contract name. An empty
/// contract name is used for outputs that are not tied to a contract but to the whole source
/// file like the AST. A star as contract name refers to all contracts in the file.
/// Similarly, a star as a file name matches all files.
///
/// ```json
/// {
///   "*": {
///     "*": ["abi", "evm.bytecode.object"]
///   }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputSelection(pub BTreeMap<String, FileOutputSelection>);

impl OutputSelection {
    /// Selects the given outputs for every contract of every file
    pub fn all_contracts<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let contracts =
            BTreeMap::from([("*".to_string(), outputs.into_iter().map(Into::into).collect())]);
        OutputSelection(BTreeMap::from([("*".to_string(), contracts)]))
    }

    /// The outputs required to deploy a contract: its ABI and creation bytecode
    pub fn deployable() -> Self {
        Self::all_contracts([ABI, BYTECODE_OBJECT])
    }
}
