use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use insuite_bridge::config::{BridgeConfig, Network};
use insuite_bridge::models::common::Field;
use insuite_bridge::models::customer::{full_sample, minimal_sample, test_id_from};
use insuite_bridge::models::responses::ApiResult;
use insuite_bridge::services::diagnostics::{probe_all, recommend};
use insuite_bridge::services::insuite_service::InsuiteClient;
use insuite_bridge::services::signer;
use log::error;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "insuite-cli", about = "inSuite customer gateway tooling", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a sample customer record to the gateway
    Submit {
        /// Use the internal network base URL
        #[arg(long)]
        internal: bool,
        /// Only the required fields
        #[arg(long)]
        minimal: bool,
        /// Override the tenant database name
        #[arg(long)]
        db: Option<String>,
        /// Override the customer name
        #[arg(long)]
        name: Option<String>,
        /// Print an equivalent curl command instead of sending
        #[arg(long)]
        curl_only: bool,
    },
    /// Compute a signature offline
    Sign {
        #[arg(long)]
        route: String,
        #[arg(long)]
        secret: String,
        #[arg(long)]
        timestamp: i64,
        /// Exact body text to sign
        #[arg(long)]
        body: String,
        #[arg(long, default_value = signer::METHOD_POST)]
        method: String,
    },
    /// Check TCP reachability of both gateway endpoints
    Diagnose {
        #[arg(long, default_value_t = 5)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match command {
        Command::Sign {
            route,
            secret,
            timestamp,
            body,
            method,
        } => {
            println!("{}", signer::sign(&route, &secret, timestamp, &body, &method)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Diagnose { timeout_secs } => {
            let config = BridgeConfig::from_env()?;
            let probes = probe_all(&config, Duration::from_secs(timeout_secs)).await;

            for probe in &probes {
                match &probe.error {
                    None => println!("[{}] {}:{} reachable", probe.network, probe.host, probe.port),
                    Some(e) => println!(
                        "[{}] {}:{} unreachable ({})",
                        probe.network, probe.host, probe.port, e
                    ),
                }
            }

            match recommend(&probes) {
                Some(Network::External) => println!("External gateway is reachable; use the default flags."),
                Some(Network::Internal) => println!("Only the internal gateway is reachable; use --internal."),
                None => {
                    println!("Neither gateway is reachable. Check VPN access or ask for the caller IP to be allow-listed.");
                    return Ok(ExitCode::FAILURE);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Submit {
            internal,
            minimal,
            db,
            name,
            curl_only,
        } => {
            let mut config = BridgeConfig::from_env()?;
            if let Some(db) = db {
                config.database = db;
            }
            let network = if internal {
                Network::Internal
            } else {
                Network::External
            };

            let timestamp = chrono::Utc::now().timestamp();
            let test_id = test_id_from(timestamp);
            let mut record = if minimal {
                minimal_sample(test_id)
            } else {
                full_sample(test_id)
            };
            if let Some(name) = name {
                record.name = Field::Set(name);
            }
            let records = vec![record];

            println!("Database: {}", config.database);
            println!("Records:\n{}", serde_json::to_string_pretty(&records)?);

            let client = InsuiteClient::new(&config)?;
            if curl_only {
                println!("{}", client.curl_command(&records, network, timestamp)?);
                return Ok(ExitCode::SUCCESS);
            }

            let result = client.create_customers(&records, network).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(match result {
                ApiResult::Success { .. } => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            })
        }
    }
}
