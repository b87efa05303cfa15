use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use common::DeploymentRecord;
use log::debug;

use crate::error::{DeployError, Result};

/// Deployment records by deployment name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deployments {
    records: BTreeMap<String, DeploymentRecord>,
}

impl Deployments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record saved under `name`
    pub fn get(&self, name: &str) -> Result<&DeploymentRecord> {
        self.records
            .get(name)
            .ok_or_else(|| DeployError::MissingDeployment(name.to_string()))
    }

    pub fn find(&self, name: &str) -> Option<&DeploymentRecord> {
        self.records.get(name)
    }

    /// Save `record` under `name`, replacing any previous record
    pub fn save(&mut self, name: &str, record: DeploymentRecord) {
        self.records.insert(name.to_string(), record);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DeploymentRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Read every `<Name>.json` record in `dir`
    ///
    /// A missing directory is an empty registry.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut deployments = Self::new();
        if !dir.is_dir() {
            return Ok(deployments);
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let name = match path.file_stem().and_then(|s| s.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };

            let record: DeploymentRecord = serde_json::from_str(&fs::read_to_string(&path)?)?;
            debug!("Loaded deployment {} at {:?}", name, record.address);
            deployments.save(&name, record);
        }
        Ok(deployments)
    }

    /// Write one record to `<dir>/<name>.json`
    pub fn write_record<P: AsRef<Path>>(dir: P, name: &str, record: &DeploymentRecord) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        fs::write(
            dir.join(format!("{}.json", name)),
            serde_json::to_string_pretty(record)?,
        )?;
        Ok(())
    }

    /// Make `dir` hold exactly the records of this registry
    ///
    /// Records on disk with no counterpart here are removed; other files
    /// are left alone.
    pub fn write_dir<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        if dir.is_dir() {
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let stale = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map_or(false, |name| !self.records.contains_key(name));
                if stale {
                    debug!("Removing stale deployment record {}", path.display());
                    fs::remove_file(&path)?;
                }
            }
        }

        for (name, record) in &self.records {
            Self::write_record(dir, name, record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ethers::types::{Address, Bytes, H256};
    use tempfile::tempdir;

    fn record(contract_name: &str, address: u64) -> DeploymentRecord {
        DeploymentRecord {
            contract_name: contract_name.to_string(),
            address: Address::from_low_u64_be(address),
            args: vec!["8".to_string(), "200000000000".to_string()],
            encoded_args: Bytes::from(vec![1, 2, 3]),
            transaction_hash: Some(H256::from_low_u64_be(address)),
            block_number: Some(1),
            deployed_at: Utc::now(),
        }
    }

    #[test]
    fn test_missing_deployment() {
        let deployments = Deployments::new();
        assert!(matches!(
            deployments.get("MockV3Aggregator"),
            Err(DeployError::MissingDeployment(name)) if name == "MockV3Aggregator"
        ));
    }

    #[test]
    fn test_save_replaces() {
        let mut deployments = Deployments::new();
        deployments.save("FundMe", record("FundMe", 1));
        deployments.save("FundMe", record("FundMe", 2));

        assert_eq!(deployments.len(), 1);
        assert_eq!(
            deployments.get("FundMe").unwrap().address,
            Address::from_low_u64_be(2)
        );
    }

    #[test]
    fn test_directory_roundtrip() {
        let dir = tempdir().unwrap();
        let network_dir = dir.path().join("localhost");

        let mut deployments = Deployments::new();
        deployments.save("MockV3Aggregator", record("MockV3Aggregator", 1));
        deployments.save("FundMe", record("FundMe", 2));
        deployments.write_dir(&network_dir).unwrap();

        assert!(network_dir.join("FundMe.json").is_file());
        fs::write(network_dir.join(".chainId"), "31337").unwrap();

        let loaded = Deployments::load_dir(&network_dir).unwrap();
        assert_eq!(loaded, deployments);
    }

    #[test]
    fn test_write_dir_removes_stale_records() {
        let dir = tempdir().unwrap();
        let mut deployments = Deployments::new();
        deployments.save("FundMe", record("FundMe", 2));

        Deployments::write_record(dir.path(), "SecondFeed", &record("MockV3Aggregator", 3)).unwrap();
        fs::write(dir.path().join(".chainId"), "31337").unwrap();

        deployments.write_dir(dir.path()).unwrap();
        assert!(dir.path().join("FundMe.json").is_file());
        assert!(!dir.path().join("SecondFeed.json").exists());
        assert!(dir.path().join(".chainId").is_file());
        assert_eq!(Deployments::load_dir(dir.path()).unwrap(), deployments);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let loaded = Deployments::load_dir(dir.path().join("goerli")).unwrap();
        assert!(loaded.is_empty());
    }
}
