use std::path::Path;

use foundry_compilers::artifacts::output_selection::OutputSelection;
use foundry_compilers::artifacts::{
  CompilerOutput, Contract, Error as SolcDiagnostic, EvmVersion, Settings, SolcInput, SolcLanguage,
};
use semver::Version;
use serde_json::Value;

use crate::error::{DeployError, Result};
use crate::resolver::SourceSet;
use crate::solc;

/// ABI and creation bytecode for exactly one named contract extracted from
/// the compiler output.
#[derive(Debug, Clone)]
pub struct CompiledArtifact {
  pub contract_name: String,
  /// ABI as standard-JSON value; parsed into a typed ABI at encode time.
  pub abi: Value,
  /// Hex-encoded creation code with a `0x` prefix.
  pub bytecode: String,
}

/// Synthesize the logical entry-file name for a contract: alphanumerics
/// lowercased, everything else collapsed to underscores.
pub fn entry_file_name(contract_name: &str) -> String {
  let stem: String = contract_name
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() {
        c.to_ascii_lowercase()
      } else {
        '_'
      }
    })
    .collect();
  if stem.is_empty() {
    "contract.sol".to_string()
  } else {
    format!("{stem}.sol")
  }
}

/// Compile a closed source set with the requested solc release and extract
/// the artifact for `contract_name` from the entry file's output.
///
/// Single-shot standard-JSON invocation with complete output selection;
/// warning diagnostics are discarded, the first error-severity diagnostic
/// aborts with its formatted message.
pub fn compile(
  sources: SourceSet,
  entry_path: &str,
  contract_name: &str,
  solc_version: &Version,
  evm_version: EvmVersion,
) -> Result<CompiledArtifact> {
  let solc = solc::ensure_installed(solc_version)?;

  let settings = Settings {
    evm_version: Some(evm_version),
    output_selection: OutputSelection::complete_output_selection(),
    ..Default::default()
  };

  let mut input = SolcInput::new(SolcLanguage::Solidity, sources.into_sources(), settings);
  input.sanitize(&solc.version);

  tracing::debug!(entry = entry_path, solc = %solc.version, "invoking compiler");
  let output: CompilerOutput = solc
    .compile_as(&input)
    .map_err(|err| DeployError::Compile(format!("solc invocation failed: {err}")))?;

  triage(&output.errors)?;
  extract_artifact(output, entry_path, contract_name)
}

/// Filter diagnostics to error severity; the first error's formatted
/// message becomes the reported failure. Warnings are logged and dropped.
fn triage(diagnostics: &[SolcDiagnostic]) -> Result<()> {
  for diagnostic in diagnostics {
    if !diagnostic.severity.is_error() {
      tracing::debug!(message = %diagnostic.message, "compiler warning discarded");
    }
  }

  match diagnostics.iter().find(|d| d.severity.is_error()) {
    Some(first) => Err(DeployError::Compile(
      first
        .formatted_message
        .clone()
        .unwrap_or_else(|| first.message.clone()),
    )),
    None => Ok(()),
  }
}

fn extract_artifact(
  output: CompilerOutput,
  entry_path: &str,
  contract_name: &str,
) -> Result<CompiledArtifact> {
  let entry = Path::new(entry_path);
  let contracts = output
    .contracts
    .into_iter()
    .find(|(path, _)| path.as_path() == entry)
    .map(|(_, contracts)| contracts)
    .ok_or_else(|| {
      DeployError::Compile(format!("compiler output has no entry for {entry_path:?}"))
    })?;

  let (name, contract) = select_contract(contracts, contract_name, entry_path)?;
  let abi = contract
    .abi
    .as_ref()
    .map(serde_json::to_value)
    .transpose()
    .map_err(|err| DeployError::Compile(format!("failed to serialize ABI: {err}")))?
    .unwrap_or_else(|| Value::Array(Vec::new()));

  let bytecode = contract
    .evm
    .as_ref()
    .and_then(|evm| evm.bytecode.as_ref())
    .and_then(|bytecode| bytecode.object.as_bytes())
    .map(|bytes| format!("0x{}", hex::encode(bytes.as_ref())))
    .ok_or_else(|| {
      DeployError::Compile(format!("contract {name:?} has no creation bytecode"))
    })?;

  Ok(CompiledArtifact {
    contract_name: name,
    abi,
    bytecode,
  })
}

/// Select one contract from the entry file's output. A file defining a
/// single contract is accepted regardless of name; with several contracts
/// the requested name must match one case-insensitively.
fn select_contract(
  contracts: std::collections::BTreeMap<String, Contract>,
  requested: &str,
  entry_path: &str,
) -> Result<(String, Contract)> {
  match contracts.len() {
    0 => Err(DeployError::Compile(format!(
      "entry file {entry_path:?} defines no contracts"
    ))),
    1 => Ok(
      contracts
        .into_iter()
        .next()
        .unwrap_or_else(|| unreachable!("length checked above")),
    ),
    n => contracts
      .into_iter()
      .find(|(name, _)| name.eq_ignore_ascii_case(requested))
      .ok_or_else(|| {
        DeployError::Compile(format!(
          "entry file {entry_path:?} defines {n} contracts and none is named {requested:?}"
        ))
      }),
  }
}
