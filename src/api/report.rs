// Report generation for the deploy runner
//
// Formats what a run left on a network: the named deployments and, when
// FundMe is among them, its funding state.

use crate::api::types::DeploymentReport;
use anyhow::Result;
use ethers::utils::format_ether;
use std::fs;
use std::path::Path;

/// Report formatter for deployment runs
pub struct ReportFormatter;

impl ReportFormatter {
    /// Format a report as JSON
    pub fn to_json(report: &DeploymentReport) -> Result<String> {
        let json = serde_json::to_string_pretty(report)?;
        Ok(json)
    }

    /// Format a report as plain text
    pub fn to_text(report: &DeploymentReport) -> String {
        let mut output = String::new();

        // Header
        output.push_str("FundMe Deployment Report\n");
        output.push_str("========================\n\n");

        output.push_str(&format!("Timestamp: {}\n", report.timestamp));
        output.push_str(&format!("Network: {} (chain {})\n", report.network, report.chain_id));
        output.push_str(&format!("Deployer: {:?}\n\n", report.deployer));

        output.push_str(&format!("Deployments: {}\n", report.deployments.len()));
        output.push_str("------------\n");
        for entry in &report.deployments {
            let record = &entry.record;
            output.push_str(&format!("{} ({})\n", entry.name, record.contract_name));
            output.push_str(&format!("   Address: {:?}\n", record.address));
            if !record.args.is_empty() {
                output.push_str(&format!("   Args: [{}]\n", record.args.join(", ")));
            }
            if let Some(hash) = record.transaction_hash {
                output.push_str(&format!("   Transaction: {:?}\n", hash));
            }
            if let Some(block) = record.block_number {
                output.push_str(&format!("   Block: {}\n", block));
            }
        }

        if let Some(funding) = &report.funding {
            output.push_str("\nFunding\n");
            output.push_str("-------\n");
            output.push_str(&format!("Owner: {:?}\n", funding.owner));
            output.push_str(&format!("Price Feed: {:?}\n", funding.price_feed));
            output.push_str(&format!("Balance: {} ETH\n", format_ether(funding.balance)));
            output.push_str(&format!("Funders: {}\n", funding.funders.len()));
            for (funder, amount) in &funding.amounts {
                output.push_str(&format!("   {:?}: {} ETH\n", funder, format_ether(*amount)));
            }
        }

        output
    }

    /// Save a report to a file
    pub fn save_to_file<P: AsRef<Path>>(
        report: &DeploymentReport,
        path: P,
        format: ReportFormat,
    ) -> Result<()> {
        let content = match format {
            ReportFormat::Json => Self::to_json(report)?,
            ReportFormat::Text => Self::to_text(report),
        };
        fs::write(path, content)?;
        Ok(())
    }
}

/// Report output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Text,
}

impl ReportFormat {
    /// Parse a format name, falling back to text
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "json" => ReportFormat::Json,
            _ => ReportFormat::Text,
        }
    }
}
