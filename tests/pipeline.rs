use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use deployer::{
  BackendConnector, ChainBackend, ConstructorArg, ContractStore, DeployError, DeployOutcome,
  DeployRequest, DeployerConfig, ModuleFetcher, NetworkDescriptor, Pipeline, Result,
};
use url::Url;

const SIMPLE_CONTRACT: &str =
  "contract C { function f() public pure returns (uint) { return 1; } }";

const TEST_PRIVATE_KEY: &str =
  "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

struct MapFetcher {
  files: HashMap<&'static str, &'static str>,
}

#[async_trait]
impl ModuleFetcher for MapFetcher {
  async fn fetch_module(&self, logical_path: &str) -> Result<String> {
    self
      .files
      .get(logical_path)
      .map(|content| content.to_string())
      .ok_or_else(|| DeployError::ImportFetch {
        path: logical_path.to_string(),
        reason: "module not in mirror".to_string(),
      })
  }
}

struct MockBackend {
  chain_id: u64,
  deployed: Address,
}

#[async_trait]
impl ChainBackend for MockBackend {
  fn sender(&self) -> Address {
    Address::repeat_byte(0x11)
  }

  async fn chain_id(&self) -> Result<u64> {
    Ok(self.chain_id)
  }

  async fn submit(&self, creation_code: Bytes) -> Result<DeployOutcome> {
    assert!(!creation_code.is_empty(), "creation code must not be empty");
    Ok(DeployOutcome {
      address: self.deployed,
      tx_hash: B256::repeat_byte(0x22),
    })
  }
}

struct MockConnector {
  chain_id: u64,
  deployed: Address,
}

#[async_trait]
impl BackendConnector for MockConnector {
  async fn connect(
    &self,
    _endpoint: &Url,
    _descriptor: &NetworkDescriptor,
    private_key: &str,
  ) -> Result<Box<dyn ChainBackend>> {
    assert!(!private_key.is_empty());
    Ok(Box::new(MockBackend {
      chain_id: self.chain_id,
      deployed: self.deployed,
    }))
  }
}

fn pipeline(chain_id: u64, modules: &[(&'static str, &'static str)]) -> Pipeline {
  let config = DeployerConfig::default().with_private_key(TEST_PRIVATE_KEY);
  Pipeline::with_parts(
    config,
    Arc::new(MapFetcher {
      files: modules.iter().copied().collect(),
    }),
    Arc::new(MockConnector {
      chain_id,
      deployed: Address::repeat_byte(0xab),
    }),
  )
}

fn request(chain_name: &str) -> DeployRequest {
  serde_json::from_value(serde_json::json!({
    "contractName": "C",
    "chainName": chain_name,
    "sourceCode": SIMPLE_CONTRACT,
    "constructorArgs": []
  }))
  .expect("request should deserialize")
}

/// The compile stage needs a cached solc release; skip instead of
/// triggering a download from the test suite.
fn solc_missing() -> bool {
  let version = DeployerConfig::default().solc_version;
  if deployer::solc::is_version_installed(&version) {
    return false;
  }
  eprintln!("skipping: solc {version} is not installed");
  true
}

#[tokio::test]
async fn test_end_to_end_deployment_builds_explorer_url() {
  if solc_missing() {
    return;
  }

  let pipeline = pipeline(84531, &[]);
  let record = pipeline
    .execute(&request("Base Goerli Testnet"))
    .await
    .expect("deployment should succeed");

  let deployed = Address::repeat_byte(0xab);
  assert_eq!(record.name, "C");
  assert_eq!(record.chain, "Base Goerli Testnet");
  assert_eq!(record.contract_address, deployed.to_string());
  assert_eq!(
    record.explorer_url,
    format!("https://goerli.basescan.org/address/{deployed}")
  );
}

#[tokio::test]
async fn test_fuzzy_chain_name_resolves_before_deploy() {
  if solc_missing() {
    return;
  }

  let pipeline = pipeline(84531, &[]);
  let record = pipeline
    .execute(&request("base-goerli"))
    .await
    .expect("deployment should succeed");

  assert_eq!(record.chain, "Base Goerli Testnet");
}

#[tokio::test]
async fn test_pipeline_is_idempotent_across_invocations() {
  if solc_missing() {
    return;
  }

  let pipeline = pipeline(84531, &[]);
  let first = pipeline
    .execute(&request("Base Goerli Testnet"))
    .await
    .expect("first deployment should succeed");
  let second = pipeline
    .execute(&request("Base Goerli Testnet"))
    .await
    .expect("second deployment should succeed");

  // Deterministic mock backend: records are equal, nothing leaks between runs.
  assert_eq!(first, second);
}

#[tokio::test]
async fn test_chain_id_mismatch_aborts_before_submission() {
  if solc_missing() {
    return;
  }

  let pipeline = pipeline(1, &[]);
  let err = pipeline
    .execute(&request("Base Goerli Testnet"))
    .await
    .expect_err("deployment should fail");

  assert!(matches!(err, DeployError::ProviderUnavailable(_, _)));
}

#[tokio::test]
async fn test_missing_private_key_is_a_signer_failure() {
  if solc_missing() {
    return;
  }

  let pipeline = Pipeline::with_parts(
    DeployerConfig::default(),
    Arc::new(MapFetcher {
      files: HashMap::new(),
    }),
    Arc::new(MockConnector {
      chain_id: 84531,
      deployed: Address::repeat_byte(0xab),
    }),
  );
  let err = pipeline
    .execute(&request("Base Goerli Testnet"))
    .await
    .expect_err("deployment should fail");

  assert!(matches!(err, DeployError::SignerUnavailable(_, _)));
}

#[tokio::test]
async fn test_missing_import_aborts_without_compiling() {
  // No solc gate: resolution fails before the compile stage.
  let pipeline = pipeline(84531, &[]);
  let mut req = request("Base Goerli Testnet");
  req.source_code = "import \"@pkg/missing.sol\";\ncontract C {}".to_string();

  let err = pipeline
    .execute(&req)
    .await
    .expect_err("deployment should fail");
  assert!(matches!(err, DeployError::ImportFetch { .. }));
}

#[tokio::test]
async fn test_compile_error_surfaces_first_diagnostic() {
  if solc_missing() {
    return;
  }

  let pipeline = pipeline(84531, &[]);
  let mut req = request("Base Goerli Testnet");
  req.source_code = "contract C { function broken() public { undefinedSymbol; } }".to_string();

  let err = pipeline
    .execute(&req)
    .await
    .expect_err("deployment should fail");
  match err {
    DeployError::Compile(message) => assert!(!message.is_empty()),
    other => panic!("unexpected error: {other:?}"),
  }
}

#[tokio::test]
async fn test_run_deploy_tool_appends_to_store() {
  if solc_missing() {
    return;
  }

  let pipeline = pipeline(84531, &[]);
  let store = ContractStore::new();
  let record = deployer::run_deploy_tool(&pipeline, &store, &request("Base Goerli Testnet"))
    .await
    .expect("deployment should succeed");

  assert_eq!(store.len(), 1);
  let stored = store
    .get(&record.contract_address)
    .expect("record should be stored");
  assert_eq!(stored.chain, "Base Goerli Testnet");
  assert_eq!(stored.source_code, SIMPLE_CONTRACT);
}

#[tokio::test]
async fn test_constructor_args_resolve_against_compiled_abi() {
  if solc_missing() {
    return;
  }

  let pipeline = pipeline(84531, &[]);
  let mut req = request("Base Goerli Testnet");
  req.contract_name = "Counter".to_string();
  req.source_code =
    "contract Counter { uint public start; constructor(uint start_) { start = start_; } }"
      .to_string();
  req.constructor_args = vec![ConstructorArg::Value("7".to_string())];

  let record = pipeline
    .execute(&req)
    .await
    .expect("deployment should succeed");
  assert_eq!(record.name, "Counter");
}

#[tokio::test]
async fn test_imported_module_is_compiled_into_the_closure() {
  if solc_missing() {
    return;
  }

  let pipeline = pipeline(
    84531,
    &[(
      "@lib/answer.sol",
      "library Answer { function get() internal pure returns (uint) { return 42; } }",
    )],
  );
  let mut req = request("Base Goerli Testnet");
  req.source_code = "import \"@lib/answer.sol\";\ncontract C { function f() public pure returns (uint) { return Answer.get(); } }".to_string();

  let record = pipeline
    .execute(&req)
    .await
    .expect("deployment should succeed");
  assert_eq!(record.chain, "Base Goerli Testnet");
}
