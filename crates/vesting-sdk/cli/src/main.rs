mod command;
mod simulated;

use std::{fs, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Result, anyhow};
use clap::Parser;
use command::{CliContext, CliHelper, Command, execute_command};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use rust_decimal::Decimal;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::hint::HistoryHinter;
use serde::{Deserialize, Serialize};
use simulated::{SimulatedChain, SimulatedScheduleService};
use tracing::info;
use vesting_sdk::{
    ContractCapabilities, NotificationCenter, NotificationEvent, NotificationListener,
    SigningContext, TokenMetadata, VestingSdkBuilder, default_config, parse_address,
    to_base_units,
};

#[derive(Clone, Parser, Debug, Serialize, Deserialize)]
#[command(version, about = "Interactive client for adding vesting schedules", long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Path to the data directory
    #[arg(short, long, default_value = "./.data")]
    data_dir: String,

    #[arg(long, default_value = "vesting.conf")]
    config: PathBuf,

    /// Log filter in the env filter format
    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long, default_value = "1")]
    chain_id: u64,

    #[arg(long, default_value = "0x5FbDB2315678afecb367f032d93F642f64180aa3")]
    contract_address: String,

    #[arg(long, default_value = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48")]
    token_address: String,

    #[arg(long, default_value = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8")]
    account: String,

    #[arg(long, default_value = "VEST")]
    token_symbol: String,

    #[arg(long, default_value = "18")]
    token_decimals: u32,

    /// Fiat price of one token; fiat input is disabled without it
    #[arg(long)]
    token_price: Option<Decimal>,

    /// Whole tokens the contract can still allocate
    #[arg(long, default_value = "1000000")]
    available_tokens: Decimal,

    #[arg(long, default_value = "1500")]
    confirmation_delay_ms: u64,
}

fn expand_path(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(stripped) => dirs::home_dir()
            .map(|home| home.join(stripped))
            .ok_or_else(|| anyhow!("Could not find home directory")),
        None => Ok(PathBuf::from(path)),
    }
}

/// Parse a command string into a Command enum using clap
fn parse_command(input: &str) -> Result<Command> {
    if input.trim() == "exit" || input.trim() == "quit" {
        return Ok(Command::Exit);
    }

    let mut args = vec!["vesting-cli".to_string()];
    match shlex::split(input) {
        Some(split_args) => args.extend(split_args),
        None => return Err(anyhow!("Failed to parse input string: {}", input)),
    }

    match Command::try_parse_from(args) {
        Ok(cmd) => Ok(cmd),
        Err(e) => Err(anyhow!("Command parsing error: {}", e)),
    }
}

struct CliNotificationListener {}

#[async_trait::async_trait]
impl NotificationListener for CliNotificationListener {
    async fn on_notification(&self, event: NotificationEvent) {
        println!("[notification] {event}");
    }
}

async fn run_interactive_mode(args: Args) -> Result<()> {
    let data_dir = expand_path(&args.data_dir)?;
    fs::create_dir_all(&data_dir)?;
    vesting_sdk::init_logging(
        Some(data_dir.to_string_lossy().into()),
        None,
        Some(args.log_level.clone()),
    )?;
    let history_file = data_dir.join("history.txt");

    let rl = &mut Editor::new()?;
    rl.set_helper(Some(CliHelper {
        hinter: HistoryHinter {},
    }));
    if rl.load_history(&history_file).is_err() {
        info!("No history found");
    }

    let mut config = default_config(args.chain_id);
    config.contract_address.clone_from(&args.contract_address);

    let token_address = parse_address(&args.token_address)?;
    let available = to_base_units(args.available_tokens, args.token_decimals)?;
    let chain = Arc::new(SimulatedChain::new(
        TokenMetadata {
            symbol: args.token_symbol.clone(),
            decimals: args.token_decimals,
            price: args.token_price,
        },
        available,
        Duration::from_millis(args.confirmation_delay_ms),
    ));

    let notifications = Arc::new(NotificationCenter::new());
    notifications
        .add_listener(Box::new(CliNotificationListener {}))
        .await;

    let sdk = VestingSdkBuilder::new(config)
        .with_schedule_service(Arc::new(SimulatedScheduleService {
            chain: chain.clone(),
        }))
        .with_token_metadata_service(chain.clone())
        .with_balance_service(chain.clone())
        .with_notification_center(notifications.clone())
        .build()?;

    let contract = sdk.contract(
        vec![token_address],
        ContractCapabilities {
            add_vesting_schedule: true,
        },
    );
    let signing_context = SigningContext {
        account: Some(parse_address(&args.account)?),
        chain_id: args.chain_id,
    };
    let mut ctx = CliContext {
        dialog: sdk.add_schedule_dialog(contract, signing_context),
        chain,
        notifications,
    };

    println!("Vesting CLI Interactive Mode");
    println!("Type 'help' for available commands or 'exit' to quit");
    let cli_prompt = format!("vesting-cli [chain {}]> ", args.chain_id);

    loop {
        let readline = rl.readline(&cli_prompt);
        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                rl.add_history_entry(line.as_str())?;

                match parse_command(trimmed) {
                    Ok(command) => match execute_command(command, &mut ctx).await {
                        Ok(continue_loop) => {
                            if !continue_loop {
                                break;
                            }
                        }
                        Err(e) => {
                            println!("Error: {e}");
                        }
                    },
                    Err(e) => {
                        println!("{e}");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }

    rl.save_history(&history_file)?;

    println!("Goodbye!");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    let config_file = std::fs::canonicalize(&args.config).ok();
    let mut figment = Figment::new().merge(Serialized::defaults(args));
    if let Some(config_file) = &config_file {
        figment = figment.merge(Toml::file(config_file));
    }
    let args: Args = figment.merge(Env::prefixed("VESTING_")).extract()?;

    Box::pin(run_interactive_mode(args)).await
}
