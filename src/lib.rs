//! Deployment pipeline for single-file Solidity contracts: recursive
//! import resolution against a package mirror, fuzzy network-name
//! resolution, solc invocation with diagnostic triage, and transaction
//! submission with address derivation.

pub mod chains;
pub mod compiler;
pub mod config;
pub mod deploy;
pub mod error;
pub mod registry;
pub mod resolver;
pub mod solc;
pub mod tool;

use std::sync::Arc;

use tokio::time::timeout;

pub use chains::{resolve_network, Explorer, NetworkDescriptor};
pub use compiler::{entry_file_name, CompiledArtifact};
pub use config::DeployerConfig;
pub use deploy::{AlloyConnector, BackendConnector, ChainBackend, DeployOutcome, DeploymentRecord};
pub use error::{DeployError, Result};
pub use registry::{ContractRecord, ContractStore};
pub use resolver::{ImportResolver, MirrorFetcher, ModuleFetcher, SourceSet};
pub use tool::{deploy_contract_schema, run_deploy_tool, ConstructorArg, DeployRequest};

/// One-shot deployment pipeline. Each [`execute`](Pipeline::execute) call
/// runs resolve-network, resolve-imports, compile and deploy sequentially
/// with per-stage timeout budgets; every stage failure aborts the attempt
/// and discards partial state. Cancellation is dropping the future.
pub struct Pipeline {
  config: DeployerConfig,
  fetcher: Arc<dyn ModuleFetcher>,
  connector: Arc<dyn BackendConnector>,
}

impl Pipeline {
  /// Production pipeline: HTTP mirror fetcher plus alloy RPC backend.
  pub fn new(config: DeployerConfig) -> Result<Self> {
    let fetcher = MirrorFetcher::new(config.mirror_base.clone(), config.fetch_timeout)?;
    Ok(Self {
      config,
      fetcher: Arc::new(fetcher),
      connector: Arc::new(AlloyConnector),
    })
  }

  /// Pipeline with explicit fetcher and backend seams, for tests and
  /// embedding.
  pub fn with_parts(
    config: DeployerConfig,
    fetcher: Arc<dyn ModuleFetcher>,
    connector: Arc<dyn BackendConnector>,
  ) -> Self {
    Self {
      config,
      fetcher,
      connector,
    }
  }

  pub fn config(&self) -> &DeployerConfig {
    &self.config
  }

  /// Resolve, compile and deploy one contract, returning its deployment
  /// record. The caller is responsible for appending the record to a
  /// [`ContractStore`].
  pub async fn execute(&self, request: &DeployRequest) -> Result<DeploymentRecord> {
    let descriptor = chains::resolve_network(&request.chain_name)?;
    tracing::info!(
      contract = %request.contract_name,
      requested = %request.chain_name,
      chain = %descriptor.name,
      "starting deployment"
    );

    let entry_path = compiler::entry_file_name(&request.contract_name);
    let resolver = ImportResolver::new(
      self.fetcher.as_ref(),
      self.config.mirror_base.clone(),
      self.config.max_import_fetches,
      self.config.max_import_depth,
    );
    let sources = resolver.resolve(&request.source_code, &entry_path).await?;

    let artifact = {
      let entry = entry_path.clone();
      let contract_name = request.contract_name.clone();
      let solc_version = self.config.solc_version.clone();
      let evm_version = self.config.evm_version;
      let task = tokio::task::spawn_blocking(move || {
        compiler::compile(sources, &entry, &contract_name, &solc_version, evm_version)
      });
      timeout(self.config.compile_timeout, task)
        .await
        .map_err(|_| DeployError::Compile("compiler invocation timed out".to_string()))?
        .map_err(|err| DeployError::Compile(format!("compiler task failed: {err}")))??
    };

    deploy::deploy(
      &request.contract_name,
      descriptor,
      &artifact,
      &request.constructor_args,
      &self.config,
      self.connector.as_ref(),
    )
    .await
  }
}
