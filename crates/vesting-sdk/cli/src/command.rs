use std::{
    borrow::Cow::{self, Owned},
    sync::Arc,
};

use clap::Parser;
use rustyline::{Completer, Helper, Hinter, Validator, highlight::Highlighter, hint::HistoryHinter};
use serde::Serialize;
use vesting_sdk::{AddScheduleDialog, NotificationCenter, SubmissionOutcome, SubmitResult};

use crate::simulated::{SignerMode, SimulatedChain};

#[derive(Clone, Parser)]
pub enum Command {
    /// Exit the interactive shell
    #[command(hide = true)]
    Exit,

    /// Open the add schedule dialog, resolving the token and available balance
    Open,

    /// Close the dialog
    Close,

    /// Set the beneficiary address
    Beneficiary { address: String },

    /// Set the vesting start, e.g. 2024-01-01T00:00 (UTC)
    Start { datetime: String },

    /// Set the vesting end, e.g. 2025-01-01T00:00 (UTC)
    End { datetime: String },

    /// Type an amount in the current input currency
    Amount { value: String },

    /// Switch the amount input between token and fiat
    Toggle,

    /// Choose how the simulated wallet answers the next signature request
    Signer {
        #[arg(value_enum)]
        mode: SignerMode,

        /// Message carried by a failing provider
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Validate the form and add the schedule
    Submit,

    /// Show the dialog state
    Status,

    /// List notifications and surfaced messages
    Notifications,
}

#[derive(Helper, Completer, Hinter, Validator)]
pub struct CliHelper {
    #[rustyline(Hinter)]
    pub hinter: HistoryHinter,
}

impl Highlighter for CliHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Owned("\x1b[1m".to_owned() + hint + "\x1b[m")
    }
}

#[derive(Serialize)]
struct DialogStatus {
    open: bool,
    beneficiary: String,
    start: String,
    end: String,
    input: String,
    input_symbol: String,
    converted: Option<String>,
    form_amount: Option<String>,
    available: Option<String>,
}

pub(crate) struct CliContext {
    pub dialog: AddScheduleDialog,
    pub chain: Arc<SimulatedChain>,
    pub notifications: Arc<NotificationCenter>,
}

pub(crate) async fn execute_command(
    command: Command,
    ctx: &mut CliContext,
) -> Result<bool, anyhow::Error> {
    let dialog = &mut ctx.dialog;
    match command {
        Command::Exit => Ok(false),
        Command::Open => {
            dialog.open().await?;
            if let Some(available) = dialog.available_amount_display() {
                println!("{available}");
            }
            Ok(true)
        }
        Command::Close => {
            dialog.close();
            Ok(true)
        }
        Command::Beneficiary { address } => {
            dialog.set_beneficiary(address);
            Ok(true)
        }
        Command::Start { datetime } => {
            dialog.set_start(datetime);
            Ok(true)
        }
        Command::End { datetime } => {
            dialog.set_end(datetime);
            Ok(true)
        }
        Command::Amount { value } => {
            dialog.input_amount(value);
            if let Some(hint) = dialog.amount_input().conversion_hint() {
                println!("= {hint}");
            }
            Ok(true)
        }
        Command::Toggle => {
            dialog.toggle_currency();
            println!("Input is now in {}", dialog.amount_input().input_symbol());
            Ok(true)
        }
        Command::Signer { mode, message } => {
            ctx.chain.set_signer_mode(mode, message).await;
            Ok(true)
        }
        Command::Submit => {
            match dialog.submit().await? {
                SubmitResult::Invalid(errors) => {
                    for (field, error) in errors.iter() {
                        println!("{field}: {}", error.message_for(*field));
                    }
                }
                SubmitResult::Completed(report) => match report.outcome {
                    SubmissionOutcome::Succeeded { receipt } => {
                        println!("Schedule added in {}", receipt.transaction_hash);
                    }
                    SubmissionOutcome::UserRejected => println!("Signature declined"),
                    SubmissionOutcome::Failed { message } => println!("Failed: {message}"),
                },
            }
            Ok(true)
        }
        Command::Status => {
            let amount_input = dialog.amount_input();
            let form = dialog.form();
            print_value(&DialogStatus {
                open: dialog.is_open(),
                beneficiary: form.beneficiary.clone(),
                start: form.start.clone(),
                end: form.end.clone(),
                input: amount_input.state().raw_input.clone(),
                input_symbol: amount_input.input_symbol().to_string(),
                converted: amount_input.conversion_hint(),
                form_amount: form.amount().map(|a| a.to_string()),
                available: dialog.available_amount_display(),
            })?;
            Ok(true)
        }
        Command::Notifications => {
            for notification in ctx.notifications.notifications().await {
                print_value(&notification)?;
            }
            for message in ctx.notifications.transient_messages().await {
                print_value(&message)?;
            }
            Ok(true)
        }
    }
}

fn print_value<T: serde::Serialize>(value: &T) -> Result<(), serde_json::Error> {
    let serialized = serde_json::to_string_pretty(value)?;
    println!("{serialized}");
    Ok(())
}
