use std::sync::{Mutex, OnceLock};

use foundry_compilers::solc::Solc;
use semver::Version;

use crate::error::{DeployError, Result};

/// Solc release used when the config does not override it.
pub fn default_version() -> Version {
  Version::new(0, 8, 23)
}

/// Parse a solc version string, tolerating a leading `v`.
pub fn parse_version(version: &str) -> Result<Version> {
  let trimmed = version.trim().trim_start_matches('v');
  Version::parse(trimmed)
    .map_err(|err| DeployError::Compile(format!("failed to parse solc version: {err}")))
}

/// Locate the requested solc release in the local SVM cache, installing it
/// on demand. Installs are serialized behind a process-wide mutex so
/// concurrent deployments cannot race the download.
pub(crate) fn ensure_installed(version: &Version) -> Result<Solc> {
  if let Some(solc) = find_installed_version(version)? {
    return Ok(solc);
  }

  let _guard = install_mutex()
    .lock()
    .map_err(|err| DeployError::Compile(format!("solc install mutex poisoned: {err}")))?;

  // Another deployment may have finished the install while we waited.
  if let Some(solc) = find_installed_version(version)? {
    return Ok(solc);
  }

  tracing::info!(%version, "installing solc release");
  Solc::blocking_install(version)
    .map_err(|err| DeployError::Compile(format!("failed to install solc {version}: {err}")))
}

/// Probe the SVM cache without triggering downloads. Suitable for test
/// suites to skip when the toolchain is missing.
pub fn is_version_installed(version: &Version) -> bool {
  matches!(find_installed_version(version), Ok(Some(_)))
}

fn find_installed_version(version: &Version) -> Result<Option<Solc>> {
  Solc::find_svm_installed_version(version)
    .map_err(|err| DeployError::Compile(format!("failed to inspect solc versions: {err}")))
}

fn install_mutex() -> &'static Mutex<()> {
  static INSTALL_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
  INSTALL_MUTEX.get_or_init(|| Mutex::new(()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_version_accepts_v_prefix() {
    let parsed = parse_version("v0.8.23").expect("version should parse");
    assert_eq!(parsed, Version::new(0, 8, 23));
  }

  #[test]
  fn test_parse_version_rejects_garbage() {
    assert!(parse_version("latest").is_err());
  }
}
