use serde::Deserialize;
use serde_json::{json, Value};

use crate::deploy::DeploymentRecord;
use crate::error::Result;
use crate::registry::{ContractRecord, ContractStore};
use crate::Pipeline;

/// Structured request arriving over the tool-invocation boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
  pub contract_name: String,
  pub chain_name: String,
  pub source_code: String,
  #[serde(default)]
  pub constructor_args: Vec<ConstructorArg>,
}

/// Constructor argument as the tool schema declares it: a string, or a
/// list of strings for array parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ConstructorArg {
  Value(String),
  List(Vec<String>),
}

/// Run the deployment pipeline for a tool request and append the result
/// to the contract store.
pub async fn run_deploy_tool(
  pipeline: &Pipeline,
  store: &ContractStore,
  request: &DeployRequest,
) -> Result<DeploymentRecord> {
  let record = pipeline.execute(request).await?;
  store.add(ContractRecord {
    name: request.contract_name.clone(),
    address: record.contract_address.clone(),
    chain: record.chain.clone(),
    source_code: request.source_code.clone(),
  });
  Ok(record)
}

/// JSON schema advertised to the chat frontend for the deploy function.
pub fn deploy_contract_schema() -> Value {
  json!({
    "name": "deploy_contract",
    "description": "Deploy a smart contract",
    "parameters": {
      "type": "object",
      "description": "Deploys a smart contract to an EVM compatible chain and returns the deployment record with an explorer url.",
      "properties": {
        "contractName": {
          "type": "string"
        },
        "chainName": {
          "type": "string",
          "description": "Name of the EVM compatible chain we are deploying to. If the user does not suggest a chain, use Base Goerli Testnet."
        },
        "sourceCode": {
          "type": "string",
          "description": "Source code of the smart contract. Use the latest Solidity ^0.8.23 and ensure that the source code will compile. Format as a single-line string, with all line breaks and quotes escaped to be valid stringified JSON."
        },
        "constructorArgs": {
          "type": "array",
          "items": {
            "oneOf": [
              { "type": "string" },
              { "type": "array", "items": { "type": "string" } }
            ]
          },
          "description": "Arguments for the contract's constructor. Each argument can be a string or an array of strings. Can be an empty array if the constructor has no arguments."
        }
      },
      "required": ["contractName", "chainName", "sourceCode", "constructorArgs"]
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_request_deserializes_mixed_constructor_args() {
    let request: DeployRequest = serde_json::from_value(json!({
      "contractName": "Token",
      "chainName": "base-goerli",
      "sourceCode": "contract Token {}",
      "constructorArgs": ["42", ["0x01", "0x02"]]
    }))
    .expect("request should deserialize");

    assert_eq!(request.constructor_args.len(), 2);
    assert!(matches!(request.constructor_args[0], ConstructorArg::Value(_)));
    assert!(matches!(request.constructor_args[1], ConstructorArg::List(_)));
  }

  #[test]
  fn test_constructor_args_default_to_empty() {
    let request: DeployRequest = serde_json::from_value(json!({
      "contractName": "Token",
      "chainName": "sepolia",
      "sourceCode": "contract Token {}"
    }))
    .expect("request should deserialize");

    assert!(request.constructor_args.is_empty());
  }

  #[test]
  fn test_schema_declares_all_required_fields() {
    let schema = deploy_contract_schema();
    let required = schema["parameters"]["required"]
      .as_array()
      .expect("required should be an array");
    assert_eq!(required.len(), 4);
  }
}
