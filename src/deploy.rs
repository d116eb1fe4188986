use alloy::dyn_abi::{DynSolType, DynSolValue, JsonAbiExt};
use alloy::json_abi::JsonAbi;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::time::timeout;
use url::Url;

use crate::chains::NetworkDescriptor;
use crate::compiler::CompiledArtifact;
use crate::config::DeployerConfig;
use crate::error::{DeployError, Result};
use crate::tool::ConstructorArg;

/// Placeholder substituted in RPC URL templates with the configured
/// registry API key.
const API_KEY_PLACEHOLDER: &str = "${INFURA_API_KEY}";

/// Raw result of a confirmed contract-creation transaction.
#[derive(Debug, Clone)]
pub struct DeployOutcome {
  pub address: Address,
  pub tx_hash: B256,
}

/// Final output artifact of a successful deployment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
  pub name: String,
  /// Canonical name of the resolved network.
  pub chain: String,
  pub contract_address: String,
  pub explorer_url: String,
}

/// One established connection plus signing identity for a target network.
#[async_trait]
pub trait ChainBackend: Send + Sync {
  /// Address the creation transaction will be sent from.
  fn sender(&self) -> Address;

  /// Chain id reported by the connected endpoint.
  async fn chain_id(&self) -> Result<u64>;

  /// Submit a creation transaction and await the deployed address.
  async fn submit(&self, creation_code: Bytes) -> Result<DeployOutcome>;
}

/// Seam for acquiring a [`ChainBackend`]; production uses
/// [`AlloyConnector`], tests substitute a deterministic mock.
#[async_trait]
pub trait BackendConnector: Send + Sync {
  async fn connect(
    &self,
    endpoint: &Url,
    descriptor: &NetworkDescriptor,
    private_key: &str,
  ) -> Result<Box<dyn ChainBackend>>;
}

/// HTTP JSON-RPC backend: wallet-filled alloy provider around a local
/// private-key signer.
pub struct AlloyConnector;

struct AlloyBackend<P> {
  provider: P,
  sender: Address,
  chain_name: String,
}

#[async_trait]
impl BackendConnector for AlloyConnector {
  async fn connect(
    &self,
    endpoint: &Url,
    descriptor: &NetworkDescriptor,
    private_key: &str,
  ) -> Result<Box<dyn ChainBackend>> {
    let signer: PrivateKeySigner = private_key
      .trim()
      .parse()
      .map_err(|err: alloy::signers::local::LocalSignerError| {
        DeployError::SignerUnavailable(descriptor.name.clone(), err.to_string())
      })?;
    let sender = signer.address();
    let wallet = EthereumWallet::from(signer);
    let provider = ProviderBuilder::new()
      .wallet(wallet)
      .on_http(endpoint.clone());

    Ok(Box::new(AlloyBackend {
      provider,
      sender,
      chain_name: descriptor.name.clone(),
    }))
  }
}

#[async_trait]
impl<P> ChainBackend for AlloyBackend<P>
where
  P: Provider<Http<Client>> + Send + Sync,
{
  fn sender(&self) -> Address {
    self.sender
  }

  async fn chain_id(&self) -> Result<u64> {
    self
      .provider
      .get_chain_id()
      .await
      .map_err(|err| DeployError::ProviderUnavailable(self.chain_name.clone(), err.to_string()))
  }

  async fn submit(&self, creation_code: Bytes) -> Result<DeployOutcome> {
    let tx = TransactionRequest::default().with_deploy_code(creation_code);
    let pending = self
      .provider
      .send_transaction(tx)
      .await
      .map_err(|err| DeployError::Submission(err.to_string()))?;
    let receipt = pending
      .get_receipt()
      .await
      .map_err(|err| DeployError::Submission(err.to_string()))?;
    let address = receipt.contract_address.ok_or_else(|| {
      DeployError::Submission("receipt is missing the deployed contract address".to_string())
    })?;

    Ok(DeployOutcome {
      address,
      tx_hash: receipt.transaction_hash,
    })
  }
}

/// Submit the deployment transaction for a compiled artifact and assemble
/// the deployment record.
///
/// Endpoint selection, connectivity and signer validation, constructor
/// argument encoding and confirmation waits all abort with their taxonomy
/// error; nothing is logged-and-continued.
pub async fn deploy(
  name: &str,
  descriptor: &NetworkDescriptor,
  artifact: &CompiledArtifact,
  constructor_args: &[ConstructorArg],
  config: &DeployerConfig,
  connector: &dyn BackendConnector,
) -> Result<DeploymentRecord> {
  let chain_id = descriptor
    .chain_id
    .ok_or_else(|| DeployError::Resolution(descriptor.name.clone()))?;
  let endpoint = select_rpc_endpoint(descriptor, config.infura_api_key.as_deref()).ok_or_else(
    || {
      DeployError::ProviderUnavailable(
        descriptor.name.clone(),
        "no usable RPC endpoint".to_string(),
      )
    },
  )?;
  let private_key = config.private_key.as_deref().ok_or_else(|| {
    DeployError::SignerUnavailable(descriptor.name.clone(), "PRIVATE_KEY is not set".to_string())
  })?;

  let backend = connector.connect(&endpoint, descriptor, private_key).await?;
  let reported = timeout(config.rpc_timeout, backend.chain_id())
    .await
    .map_err(|_| {
      DeployError::ProviderUnavailable(
        descriptor.name.clone(),
        "chain id query timed out".to_string(),
      )
    })??;
  if reported != chain_id {
    return Err(DeployError::ProviderUnavailable(
      descriptor.name.clone(),
      format!("endpoint reports chain id {reported}, expected {chain_id}"),
    ));
  }

  let creation_code = creation_code(artifact, constructor_args)?;
  tracing::info!(
    contract = name,
    chain = %descriptor.name,
    sender = %backend.sender(),
    code_len = creation_code.len(),
    "submitting deployment transaction"
  );

  let outcome = timeout(config.confirm_timeout, backend.submit(creation_code))
    .await
    .map_err(|_| DeployError::Submission("confirmation timed out".to_string()))??;

  let record = DeploymentRecord {
    name: name.to_string(),
    chain: descriptor.name.clone(),
    contract_address: outcome.address.to_string(),
    explorer_url: explorer_link(descriptor, &outcome.address),
  };
  tracing::info!(
    address = %record.contract_address,
    tx = %outcome.tx_hash,
    explorer = %record.explorer_url,
    "deployment confirmed"
  );
  Ok(record)
}

/// Take the first candidate endpoint template and substitute the API-key
/// placeholder (empty string when unset).
pub(crate) fn select_rpc_endpoint(
  descriptor: &NetworkDescriptor,
  api_key: Option<&str>,
) -> Option<Url> {
  descriptor
    .rpc
    .first()
    .map(|template| template.replace(API_KEY_PLACEHOLDER, api_key.unwrap_or("")))
    .and_then(|rendered| Url::parse(&rendered).ok())
}

/// Creation bytecode with ABI-encoded constructor arguments appended.
pub(crate) fn creation_code(
  artifact: &CompiledArtifact,
  constructor_args: &[ConstructorArg],
) -> Result<Bytes> {
  let mut code = hex::decode(artifact.bytecode.trim_start_matches("0x"))
    .map_err(|err| DeployError::Submission(format!("invalid creation bytecode: {err}")))?;
  code.extend(encode_constructor_args(&artifact.abi, constructor_args)?);
  Ok(Bytes::from(code))
}

/// ABI-encode constructor arguments against the artifact's constructor
/// signature, coercing each string value to its parameter type.
pub(crate) fn encode_constructor_args(
  abi: &Value,
  constructor_args: &[ConstructorArg],
) -> Result<Vec<u8>> {
  let abi: JsonAbi = serde_json::from_value(abi.clone())
    .map_err(|err| DeployError::Submission(format!("invalid contract ABI: {err}")))?;

  let Some(constructor) = abi.constructor() else {
    if constructor_args.is_empty() {
      return Ok(Vec::new());
    }
    return Err(DeployError::Submission(
      "constructor arguments supplied but the ABI has no constructor".to_string(),
    ));
  };

  if constructor.inputs.len() != constructor_args.len() {
    return Err(DeployError::Submission(format!(
      "constructor expects {} arguments, got {}",
      constructor.inputs.len(),
      constructor_args.len()
    )));
  }

  let values = constructor
    .inputs
    .iter()
    .zip(constructor_args)
    .map(|(param, arg)| coerce_argument(&param.ty, arg))
    .collect::<Result<Vec<_>>>()?;

  constructor
    .abi_encode_input(&values)
    .map_err(|err| DeployError::Submission(format!("constructor encoding failed: {err}")))
}

fn coerce_argument(ty: &str, arg: &ConstructorArg) -> Result<DynSolValue> {
  let sol_type: DynSolType = ty
    .parse()
    .map_err(|err| DeployError::Submission(format!("unsupported parameter type {ty:?}: {err}")))?;

  match arg {
    ConstructorArg::Value(value) => sol_type.coerce_str(value).map_err(|err| {
      DeployError::Submission(format!("cannot coerce {value:?} to {ty}: {err}"))
    }),
    ConstructorArg::List(items) => {
      let DynSolType::Array(inner) = &sol_type else {
        return Err(DeployError::Submission(format!(
          "list argument supplied for non-array parameter type {ty}"
        )));
      };
      let elements = items
        .iter()
        .map(|item| {
          inner.coerce_str(item).map_err(|err| {
            DeployError::Submission(format!("cannot coerce {item:?} to {inner}: {err}"))
          })
        })
        .collect::<Result<Vec<_>>>()?;
      Ok(DynSolValue::Array(elements))
    }
  }
}

fn explorer_link(descriptor: &NetworkDescriptor, address: &Address) -> String {
  match descriptor.explorers.first() {
    Some(explorer) => format!("{}/address/{address}", explorer.url.trim_end_matches('/')),
    None => address.to_string(),
  }
}
