use std::env;
use std::time::Duration;

use foundry_compilers::artifacts::EvmVersion;
use semver::Version;
use url::Url;

use crate::solc;

/// Default package mirror serving registry-absolute Solidity modules.
pub const DEFAULT_MIRROR_BASE: &str = "https://unpkg.com/";

const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";
const INFURA_API_KEY_ENV: &str = "INFURA_API_KEY";

/// Process-scoped configuration for the deployment pipeline.
///
/// The two secrets are consumed opaquely: the deployer private key is
/// required before a signer can be constructed, the registry API key is
/// substituted into RPC URL templates and defaults to the empty string.
#[derive(Debug, Clone)]
pub struct DeployerConfig {
  /// Hex-encoded deployer private key, with or without a `0x` prefix.
  pub private_key: Option<String>,
  /// API key substituted for `${INFURA_API_KEY}` in RPC URL templates.
  pub infura_api_key: Option<String>,
  /// Base URL of the package mirror; always ends with a slash.
  pub mirror_base: Url,
  /// Solc release used for every compilation.
  pub solc_version: Version,
  /// EVM target handed to the compiler.
  pub evm_version: EvmVersion,
  /// Budget for a single mirror fetch.
  pub fetch_timeout: Duration,
  /// Budget for one compiler invocation.
  pub compile_timeout: Duration,
  /// Budget for a single RPC round trip.
  pub rpc_timeout: Duration,
  /// Budget for waiting on transaction confirmation.
  pub confirm_timeout: Duration,
  /// Upper bound on distinct modules fetched per resolution.
  pub max_import_fetches: usize,
  /// Upper bound on import-graph recursion depth.
  pub max_import_depth: usize,
}

impl Default for DeployerConfig {
  fn default() -> Self {
    Self {
      private_key: None,
      infura_api_key: None,
      mirror_base: default_mirror_base(),
      solc_version: solc::default_version(),
      evm_version: EvmVersion::Shanghai,
      fetch_timeout: Duration::from_secs(15),
      compile_timeout: Duration::from_secs(120),
      rpc_timeout: Duration::from_secs(15),
      confirm_timeout: Duration::from_secs(180),
      max_import_fetches: 64,
      max_import_depth: 16,
    }
  }
}

impl DeployerConfig {
  /// Build a config from the process environment, reading `PRIVATE_KEY`
  /// and `INFURA_API_KEY`. Absent values degrade at the stage that needs
  /// them instead of failing here.
  pub fn from_env() -> Self {
    Self {
      private_key: env::var(PRIVATE_KEY_ENV).ok().filter(|v| !v.is_empty()),
      infura_api_key: env::var(INFURA_API_KEY_ENV).ok().filter(|v| !v.is_empty()),
      ..Self::default()
    }
  }

  pub fn with_private_key(mut self, key: impl Into<String>) -> Self {
    self.private_key = Some(key.into());
    self
  }

  pub fn with_mirror_base(mut self, base: Url) -> Self {
    self.mirror_base = ensure_trailing_slash(base);
    self
  }
}

fn default_mirror_base() -> Url {
  Url::parse(DEFAULT_MIRROR_BASE).expect("default mirror base is a valid URL")
}

fn ensure_trailing_slash(mut base: Url) -> Url {
  if !base.path().ends_with('/') {
    let path = format!("{}/", base.path());
    base.set_path(&path);
  }
  base
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_mirror_base_ends_with_slash() {
    let config = DeployerConfig::default();
    assert!(config.mirror_base.path().ends_with('/'));
  }

  #[test]
  fn test_with_mirror_base_normalizes_path() {
    let base = Url::parse("https://mirror.example.com/registry").expect("valid URL");
    let config = DeployerConfig::default().with_mirror_base(base);
    assert_eq!(config.mirror_base.as_str(), "https://mirror.example.com/registry/");
  }
}
