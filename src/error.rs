use thiserror::Error;

/// Failure taxonomy for the deployment pipeline.
///
/// Every variant aborts the pipeline at the point of detection; none of
/// these conditions is recoverable locally, so callers wanting resilience
/// retry the whole pipeline invocation.
#[derive(Debug, Error)]
pub enum DeployError {
  /// The supplied network name did not resolve to an entry with a chain id.
  #[error("chain {0:?} not found")]
  Resolution(String),

  /// A remote module referenced by an import statement could not be fetched.
  #[error("failed to fetch import {path:?}: {reason}")]
  ImportFetch { path: String, reason: String },

  /// The compiler reported at least one error-severity diagnostic; the
  /// message is the first diagnostic's formatted text.
  #[error("{0}")]
  Compile(String),

  /// The RPC connection could not be established or reported an
  /// unexpected chain id.
  #[error("provider for chain {0:?} not available: {1}")]
  ProviderUnavailable(String, String),

  /// The deployer signing key is missing or invalid.
  #[error("signer for chain {0:?} not available: {1}")]
  SignerUnavailable(String, String),

  /// Transaction submission or confirmation failed.
  #[error("deployment submission failed: {0}")]
  Submission(String),
}

impl DeployError {
  pub(crate) fn import_fetch(path: impl Into<String>, reason: impl ToString) -> Self {
    Self::ImportFetch {
      path: path.into(),
      reason: reason.to_string(),
    }
  }
}

/// Result alias bound to [`DeployError`].
pub type Result<T> = std::result::Result<T, DeployError>;
