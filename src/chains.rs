use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::error::{DeployError, Result};

/// Canonical record describing one deployable EVM network, in the
/// chainlist shape the embedded registry uses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDescriptor {
  pub name: String,
  #[serde(default)]
  pub chain: Option<String>,
  #[serde(default)]
  pub chain_id: Option<u64>,
  /// Candidate RPC endpoint URL templates, in preference order. May embed
  /// the `${INFURA_API_KEY}` placeholder.
  #[serde(default)]
  pub rpc: Vec<String>,
  #[serde(default)]
  pub explorers: Vec<Explorer>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Explorer {
  #[serde(default)]
  pub name: Option<String>,
  pub url: String,
  #[serde(default)]
  pub standard: Option<String>,
}

/// Static network registry, loaded once at process start; never mutated.
static NETWORKS: Lazy<Vec<NetworkDescriptor>> = Lazy::new(|| {
  serde_json::from_str(include_str!("data/chains.json"))
    .expect("embedded chain registry is valid JSON")
});

/// Resolve a free-text network name against the static registry.
///
/// An exact case-insensitive name match wins whenever it carries a chain
/// id, short-circuiting fuzzy matching even when another entry would score
/// higher. Otherwise the best Sørensen–Dice match over normalized names is
/// selected. A descriptor without a chain id is never returned.
pub fn resolve_network(name: &str) -> Result<&'static NetworkDescriptor> {
  resolve_in(name, &NETWORKS)
}

pub(crate) fn resolve_in<'a>(
  name: &str,
  registry: &'a [NetworkDescriptor],
) -> Result<&'a NetworkDescriptor> {
  let wanted = name.to_lowercase();
  if let Some(exact) = registry
    .iter()
    .find(|entry| entry.name.to_lowercase() == wanted)
  {
    if exact.chain_id.is_some() {
      tracing::debug!(chain = %exact.name, "resolved network by exact match");
      return Ok(exact);
    }
  }

  // Fuzzy matching only ever considers descriptors that carry a chain id;
  // an unusable descriptor can never be selected.
  let target = normalize(&wanted);
  let best = registry
    .iter()
    .filter(|entry| entry.chain_id.is_some())
    .map(|entry| (entry, strsim::sorensen_dice(&target, &normalize(&entry.name))))
    .fold(None::<(&NetworkDescriptor, f64)>, |best, candidate| {
      match best {
        // Strictly-greater keeps the first best candidate on ties.
        Some((_, score)) if candidate.1 <= score => best,
        _ => Some(candidate),
      }
    });

  match best {
    Some((entry, score)) => {
      tracing::debug!(chain = %entry.name, score, "resolved network by fuzzy match");
      Ok(entry)
    }
    None => Err(DeployError::Resolution(name.to_string())),
  }
}

fn normalize(name: &str) -> String {
  name
    .chars()
    .filter(|c| !matches!(c, '-' | '_') && !c.is_whitespace())
    .collect::<String>()
    .to_lowercase()
}
