//! The persisted set of deployable contracts

use crate::{
    artifacts::{CompilerOutput, Contract, FileToContractsMap},
    error::Result,
    utils,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The creation bytecode of a deployable contract
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactBytecode {
    /// The bytecode as a hex string
    pub object: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactEvm {
    pub bytecode: CompactBytecode,
}

/// Minimal representation of a contract: the ABI and the non-empty creation bytecode
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactContract {
    pub abi: serde_json::Value,
    pub evm: CompactEvm,
}

impl CompactContract {
    /// Returns the minimal representation of the contract if it is deployable
    ///
    /// Contracts without an ABI or bytecode are skipped, as are interfaces and abstract
    /// contracts, which `solc` emits with an empty bytecode object.
    pub fn deployable(contract: &Contract) -> Option<Self> {
        let abi = contract.abi.as_ref()?;
        let object = contract.bytecode_object()?;
        if object.is_empty() {
            return None
        }
        Some(Self {
            abi: abi.clone(),
            evm: CompactEvm { bytecode: CompactBytecode { object: object.to_string() } },
        })
    }

    /// The bytecode as hex string
    pub fn bytecode(&self) -> &str {
        &self.evm.bytecode.object
    }
}

/// All deployable contracts of a build, `file -> (contract name -> CompactContract)`
///
/// Serialized as
///
/// ```json
/// {
///   "contracts": {
///     "trading/Market.sol": {
///       "Market": { "abi": [], "evm": { "bytecode": { "object": "6080..." } } }
///     }
///   }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub contracts: FileToContractsMap<CompactContract>,
}

impl ArtifactBundle {
    /// Reduces the compiler output to the contracts that can be deployed
    ///
    /// Only a contract named after its file is kept, `trading/Market.sol:Market` is kept while
    /// `trading/Market.sol:MarketHelper` is a helper that is dropped.
    pub fn from_output(output: &CompilerOutput) -> Self {
        let mut bundle = ArtifactBundle::default();
        for (file, contracts) in &output.contracts {
            let Some(name) = utils::contract_name_of(file) else {
                tracing::trace!("skipping contracts of \"{}\"", file);
                continue
            };
            for (contract_name, contract) in contracts {
                if contract_name != name {
                    tracing::trace!("skipping helper {}:{}", file, contract_name);
                    continue
                }
                match CompactContract::deployable(contract) {
                    Some(compact) => {
                        bundle
                            .contracts
                            .entry(file.clone())
                            .or_default()
                            .insert(contract_name.clone(), compact);
                    }
                    None => tracing::trace!("skipping non deployable {}:{}", file, contract_name),
                }
            }
        }
        bundle
    }

    /// Reads the bundle from the json file
    #[tracing::instrument(skip_all, name = "artifact-bundle::read")]
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::trace!("reading artifact bundle at {}", path.display());
        utils::read_json_file(path)
    }

    /// Replaces the file at `path` with the tab indented json of this bundle
    ///
    /// Missing parent directories are created.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = utils::to_vec_tab_pretty(self)?;
        tracing::trace!("writing artifact bundle to \"{}\"", path.display());
        utils::atomic_write(path, &content)
    }

    /// Returns the contract with the given name, if any
    pub fn find(&self, contract: impl AsRef<str>) -> Option<&CompactContract> {
        let contract = contract.as_ref();
        self.contracts.values().find_map(|contracts| contracts.get(contract))
    }

    /// The number of contracts in the bundle
    pub fn len(&self) -> usize {
        self.contracts.values().map(|contracts| contracts.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
