use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use common::DeploymentRecord;

use crate::api::EtherscanSettings;
use crate::contracts::Artifact;
use crate::ethereum::etherscan::{
    CodeFormat, EtherscanClient, VerificationRequest, VerificationStatus,
};

/// Publishes deployed contracts' source through Etherscan
pub struct SourceVerifier {
    client: EtherscanClient,
    compiler_version: String,
    optimization_runs: Option<u32>,
    sources_root: PathBuf,
    standard_json_input: Option<PathBuf>,
}

impl SourceVerifier {
    pub fn new(client: EtherscanClient, settings: &EtherscanSettings) -> Self {
        Self {
            client,
            compiler_version: settings.compiler_version.clone(),
            optimization_runs: settings.optimization_runs,
            sources_root: settings.sources_root.clone(),
            standard_json_input: settings.standard_json_input.clone(),
        }
    }

    /// Verifier for `network`, or `None` when no API key is configured
    pub fn from_settings(settings: &EtherscanSettings, network: &str) -> Result<Option<Self>> {
        let api_key = match settings.api_key.as_deref().filter(|key| !key.is_empty()) {
            Some(api_key) => api_key.to_string(),
            None => return Ok(None),
        };

        let mut client = EtherscanClient::new(api_key, network)?;
        if let Some(url) = &settings.api_url {
            client = client.with_base_url(url.clone());
        }
        Ok(Some(Self::new(client, settings)))
    }

    pub fn client(&self) -> &EtherscanClient {
        &self.client
    }

    /// Submission for the deployment of `artifact` described by `record`
    pub fn request(&self, artifact: &Artifact, record: &DeploymentRecord) -> Result<VerificationRequest> {
        let (source, code_format, contract_name) = match &self.standard_json_input {
            Some(path) => (
                fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                CodeFormat::SolidityStandardJsonInput,
                artifact.qualified_name(),
            ),
            None => {
                let source_name = artifact
                    .source_name
                    .clone()
                    .unwrap_or_else(|| format!("contracts/{}.sol", artifact.contract_name));
                let path = self.sources_root.join(source_name);
                (
                    fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                    CodeFormat::SoliditySingleFile,
                    artifact.contract_name.clone(),
                )
            }
        };

        Ok(VerificationRequest {
            address: record.address,
            contract_name,
            source,
            code_format,
            compiler_version: self.compiler_version.clone(),
            optimization_runs: self.optimization_runs,
            constructor_arguments: record.encoded_args.clone(),
        })
    }

    pub async fn verify(&self, artifact: &Artifact, record: &DeploymentRecord) -> Result<VerificationStatus> {
        let request = self.request(artifact, record)?;
        self.client.verify(&request).await
    }
}
