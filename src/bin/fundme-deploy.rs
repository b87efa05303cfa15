// FundMe deploy CLI
//
// Runs the deployment scripts against a configured network and reports what
// is deployed there.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use fundme_deploy::api::{self, ConfigManager, DeployConfig, ReportFormat, ReportFormatter};
use fundme_deploy::ethereum::chain::{is_development, NetworkConfigTable};
use std::path::PathBuf;

/// FundMe deploy - deployment scripts for the FundMe contract
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the deployment scripts
    Deploy {
        /// Network to deploy to
        #[clap(short, long)]
        network: Option<String>,

        /// Only run scripts with these tags
        #[clap(short, long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Root directory of the deployment records
        #[clap(short, long)]
        deployments: Option<PathBuf>,

        /// Output format (json, text)
        #[clap(short, long, default_value = "text")]
        format: String,
    },

    /// Show the deployments and FundMe state of a network
    Status {
        /// Network to inspect
        #[clap(short, long)]
        network: Option<String>,

        /// Output format (json, text)
        #[clap(short, long, default_value = "text")]
        format: String,

        /// Output file path
        #[clap(short, long)]
        output: Option<PathBuf>,
    },

    /// List the known networks and their price feeds
    Networks,

    /// Generate a default configuration file
    Config {
        /// Output file path
        #[clap(short, long)]
        output: PathBuf,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<DeployConfig> {
    let mut config = match path {
        Some(path) => ConfigManager::load_from_file(path).context("Failed to load configuration")?,
        None => DeployConfig::default(),
    };
    ConfigManager::apply_env(&mut config);
    Ok(config)
}

fn print_report(report: &api::DeploymentReport, format: ReportFormat) -> Result<()> {
    let report_str = match format {
        ReportFormat::Json => ReportFormatter::to_json(report)?,
        ReportFormat::Text => ReportFormatter::to_text(report),
    };
    println!("{}", report_str);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Deploy {
            network,
            tags,
            deployments,
            format,
        } => {
            let mut config = load_config(cli.config.as_ref())?;
            if let Some(dir) = deployments {
                config.deployments_dir = dir;
            }
            let network = network.unwrap_or_else(|| config.default_network.clone());

            let mut env = api::prepare(&config, &network)
                .await
                .with_context(|| format!("Failed to prepare network {}", network))?;

            let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
            env.run(&tags).await.context("Deployment failed")?;

            let report = api::report(&env).await.context("Failed to read deployments")?;
            print_report(&report, ReportFormat::from_name(&format))
        }
        Commands::Status {
            network,
            format,
            output,
        } => {
            let config = load_config(cli.config.as_ref())?;
            let network = network.unwrap_or_else(|| config.default_network.clone());

            let env = api::prepare(&config, &network)
                .await
                .with_context(|| format!("Failed to prepare network {}", network))?;
            let report = api::report(&env).await.context("Failed to read deployments")?;

            let report_format = ReportFormat::from_name(&format);
            if let Some(output_path) = output {
                ReportFormatter::save_to_file(&report, &output_path, report_format)
                    .context("Failed to save report")?;
                println!("Report saved to {:?}", output_path);
                Ok(())
            } else {
                print_report(&report, report_format)
            }
        }
        Commands::Networks => {
            let config = load_config(cli.config.as_ref())?;
            let table = NetworkConfigTable::new();

            println!("Configured networks");
            println!("-------------------");
            for (name, settings) in &config.networks {
                let feed = if is_development(name) {
                    "mock".to_string()
                } else {
                    match table.price_feed(settings.chain_id) {
                        Ok(feed) => format!("{:?}", feed),
                        Err(_) => "none".to_string(),
                    }
                };
                println!(
                    "{:<12} chain {:<10} confirmations {:<3} price feed {}",
                    name, settings.chain_id, settings.block_confirmations, feed
                );
            }

            println!("\nNetwork table");
            println!("-------------");
            for entry in table.entries() {
                let feed = entry
                    .eth_usd_price_feed
                    .map(|feed| format!("{:?}", feed))
                    .unwrap_or_else(|| "-".to_string());
                println!("{:<10} {:<12} {}", entry.chain_id, entry.name, feed);
            }
            Ok(())
        }
        Commands::Config { output } => {
            // Generate default configuration
            let config = DeployConfig::default();
            ConfigManager::save_to_file(&config, &output)
                .context("Failed to save configuration")?;
            println!("Default configuration saved to {:?}", output);
            println!(
                "Deployments to RPC networks read compiled contracts from ./{} or artifactsDir",
                api::DEFAULT_ARTIFACTS_DIR
            );
            Ok(())
        }
    }
}
