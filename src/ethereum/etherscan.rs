use anyhow::{anyhow, Context, Result};
use ethers::types::{Address, Bytes};
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Etherscan API client for source verification
pub struct EtherscanClient {
    api_key: String,
    network: String,
    base_url: String,
    client: Client,
    poll_interval: Duration,
    max_polls: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct EtherscanResponse<T> {
    status: String,
    message: String,
    result: T,
}

/// How the submitted source is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodeFormat {
    /// One flattened Solidity file
    SoliditySingleFile,
    /// Solidity standard JSON input
    SolidityStandardJsonInput,
}

impl CodeFormat {
    fn as_str(&self) -> &'static str {
        match self {
            CodeFormat::SoliditySingleFile => "solidity-single-file",
            CodeFormat::SolidityStandardJsonInput => "solidity-standard-json-input",
        }
    }
}

/// Everything Etherscan needs to match source against deployed code
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    /// Deployed contract
    pub address: Address,

    /// Contract name, `path/File.sol:Name` for standard JSON input
    pub contract_name: String,

    /// Source file content or standard JSON input
    pub source: String,

    pub code_format: CodeFormat,

    /// Full compiler version, e.g. `v0.8.8+commit.dddeac2f`
    pub compiler_version: String,

    /// Optimizer runs, `None` when the optimizer was disabled
    pub optimization_runs: Option<u32>,

    /// ABI-encoded constructor arguments
    pub constructor_arguments: Bytes,
}

/// Final state of a verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    /// The submission was accepted and matched
    Verified,
    /// Source had been published before
    AlreadyVerified,
}

/// Answer to a submission
#[derive(Debug, Clone, PartialEq, Eq)]
enum Submission {
    Queued(String),
    AlreadyVerified,
}

impl EtherscanClient {
    /// Create a new Etherscan client
    pub fn new(api_key: String, network: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            network: network.to_string(),
            base_url: Self::get_base_url(network),
            client,
            poll_interval: Duration::from_secs(5),
            max_polls: 12,
        })
    }

    /// Get the base URL for the Etherscan API based on the network
    pub fn get_base_url(network: &str) -> String {
        match network {
            "mainnet" => "https://api.etherscan.io/api".to_string(),
            "goerli" => "https://api-goerli.etherscan.io/api".to_string(),
            "sepolia" => "https://api-sepolia.etherscan.io/api".to_string(),
            "arbitrum" => "https://api.arbiscan.io/api".to_string(),
            "optimism" => "https://api-optimistic.etherscan.io/api".to_string(),
            "polygon" => "https://api.polygonscan.com/api".to_string(),
            _ => format!("https://api-{}.etherscan.io/api", network),
        }
    }

    /// Use another Etherscan-compatible endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Change how often and how long the verification status is polled
    pub fn with_polling(mut self, interval: Duration, max_polls: usize) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls.max(1);
        self
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether source code is already published for `address`
    pub async fn is_verified(&self, address: Address) -> Result<bool> {
        let address = format!("{:?}", address);
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("module", "contract"),
                ("action", "getsourcecode"),
                ("address", address.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Etherscan API request failed: {}", response.status()));
        }

        let response: EtherscanResponse<Value> = response
            .json()
            .await
            .context("Failed to parse Etherscan source code response")?;
        source_published(&response)
    }

    /// Submit source code, returning the GUID to poll
    async fn submit(&self, request: &VerificationRequest) -> Result<Submission> {
        let address = format!("{:?}", request.address);
        let constructor_arguments = hex::encode(&request.constructor_arguments);
        let optimization_used = if request.optimization_runs.is_some() { "1" } else { "0" };
        let runs = request.optimization_runs.unwrap_or(200).to_string();

        // Etherscan's parameter name really is misspelled
        let form = [
            ("apikey", self.api_key.as_str()),
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("contractaddress", address.as_str()),
            ("sourceCode", request.source.as_str()),
            ("codeformat", request.code_format.as_str()),
            ("contractname", request.contract_name.as_str()),
            ("compilerversion", request.compiler_version.as_str()),
            ("optimizationUsed", optimization_used),
            ("runs", runs.as_str()),
            ("constructorArguements", constructor_arguments.as_str()),
        ];

        let response = self.client.post(&self.base_url).form(&form).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("Etherscan API request failed: {}", response.status()));
        }

        let response: EtherscanResponse<String> = response
            .json()
            .await
            .context("Failed to parse Etherscan submission response")?;
        submission_outcome(response)
    }

    /// Current state of a submission, `None` while it is still queued
    pub async fn check_status(&self, guid: &str) -> Result<Option<VerificationStatus>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Etherscan API request failed: {}", response.status()));
        }

        let response: EtherscanResponse<String> = response
            .json()
            .await
            .context("Failed to parse Etherscan status response")?;
        status_outcome(&response)
    }

    /// Publish source code and wait for Etherscan to accept it
    pub async fn verify(&self, request: &VerificationRequest) -> Result<VerificationStatus> {
        if self.is_verified(request.address).await? {
            info!("Contract {:?} is already verified", request.address);
            return Ok(VerificationStatus::AlreadyVerified);
        }

        let guid = match self.submit(request).await? {
            Submission::Queued(guid) => guid,
            Submission::AlreadyVerified => return Ok(VerificationStatus::AlreadyVerified),
        };
        info!("Submitted {} for verification, guid {}", request.contract_name, guid);

        for attempt in 1..=self.max_polls {
            tokio::time::sleep(self.poll_interval).await;
            match self.check_status(&guid).await? {
                Some(status) => return Ok(status),
                None => debug!("Verification of {} pending (attempt {})", guid, attempt),
            }
        }

        Err(anyhow!(
            "Verification {} still pending after {} checks",
            guid,
            self.max_polls
        ))
    }
}

fn is_already_verified(text: &str) -> bool {
    text.to_lowercase().contains("already verified")
}

fn submission_outcome(response: EtherscanResponse<String>) -> Result<Submission> {
    if response.status == "1" {
        return Ok(Submission::Queued(response.result));
    }
    if is_already_verified(&response.result) {
        return Ok(Submission::AlreadyVerified);
    }
    Err(anyhow!(
        "Etherscan rejected the submission: {} ({})",
        response.result,
        response.message
    ))
}

fn status_outcome(response: &EtherscanResponse<String>) -> Result<Option<VerificationStatus>> {
    let result = response.result.as_str();
    if result.starts_with("Pending") {
        return Ok(None);
    }
    if is_already_verified(result) {
        return Ok(Some(VerificationStatus::AlreadyVerified));
    }
    if response.status == "1" || result.starts_with("Pass") {
        return Ok(Some(VerificationStatus::Verified));
    }
    Err(anyhow!("Verification failed: {}", result))
}

fn source_published(response: &EtherscanResponse<Value>) -> Result<bool> {
    if response.status != "1" {
        return Err(anyhow!("Etherscan API error: {}", response.message));
    }

    let source = response
        .result
        .get(0)
        .and_then(|entry| entry.get("SourceCode"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    Ok(!source.is_empty())
}
