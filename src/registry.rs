use dashmap::DashMap;
use serde::Serialize;

/// One deployed contract tracked for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRecord {
  pub name: String,
  pub address: String,
  pub chain: String,
  pub source_code: String,
}

/// Process-wide in-memory store of deployed contracts, keyed by address.
///
/// Passed by reference into pipeline callers instead of living in ambient
/// global state; the concurrent map serializes writers against readers.
/// No persistence beyond process lifetime.
#[derive(Debug, Default)]
pub struct ContractStore {
  contracts: DashMap<String, ContractRecord>,
}

impl ContractStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add(&self, record: ContractRecord) {
    self.contracts.insert(record.address.clone(), record);
  }

  pub fn remove(&self, address: &str) -> Option<ContractRecord> {
    self.contracts.remove(address).map(|(_, record)| record)
  }

  pub fn get(&self, address: &str) -> Option<ContractRecord> {
    self.contracts.get(address).map(|entry| entry.clone())
  }

  pub fn list(&self) -> Vec<ContractRecord> {
    let mut records: Vec<_> = self
      .contracts
      .iter()
      .map(|entry| entry.value().clone())
      .collect();
    records.sort_by(|a, b| a.address.cmp(&b.address));
    records
  }

  pub fn len(&self) -> usize {
    self.contracts.len()
  }

  pub fn is_empty(&self) -> bool {
    self.contracts.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn record(address: &str) -> ContractRecord {
    ContractRecord {
      name: "Token".to_string(),
      address: address.to_string(),
      chain: "Base Goerli Testnet".to_string(),
      source_code: "contract Token {}".to_string(),
    }
  }

  #[test]
  fn test_add_and_list() {
    let store = ContractStore::new();
    store.add(record("0x02"));
    store.add(record("0x01"));

    let listed = store.list();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].address, "0x01");
  }

  #[test]
  fn test_remove_by_address() {
    let store = ContractStore::new();
    store.add(record("0x01"));

    assert!(store.remove("0x01").is_some());
    assert!(store.remove("0x01").is_none());
    assert!(store.is_empty());
  }

  #[test]
  fn test_re_adding_same_address_replaces_entry() {
    let store = ContractStore::new();
    store.add(record("0x01"));
    let mut updated = record("0x01");
    updated.name = "TokenV2".to_string();
    store.add(updated);

    assert_eq!(store.len(), 1);
    let got = store.get("0x01").expect("record should exist");
    assert_eq!(got.name, "TokenV2");
  }
}
