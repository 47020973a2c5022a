use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    address::Address,
    error::{FieldErrors, ScheduleField},
    format::to_base_units,
};

/// Configuration for the `VestingSdk`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub chain_id: u64,
    /// Vesting contract flavour, used for display only
    pub contract_type: String,
    pub contract_address: String,
    /// Fiat currency token prices are quoted in
    pub fiat_symbol: String,
    /// Fraction digits kept when converting between token and fiat
    pub display_precision: u32,
}

/// A single log statement forwarded to the app logger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub line: String,
    pub level: String,
}

/// Trait for receiving SDK log statements
pub trait Logger: Send + Sync {
    fn log(&self, l: LogEntry);
}

/// Token details as resolved by the token metadata service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub symbol: String,
    pub decimals: u32,
    /// Fiat price of one whole token, if known
    pub price: Option<Decimal>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCapabilities {
    pub add_vesting_schedule: bool,
}

/// The vesting contract a dashboard is looking at
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingContract {
    pub contract_type: String,
    pub chain_id: u64,
    pub address: String,
    pub token_addresses: Vec<Address>,
    pub capabilities: ContractCapabilities,
}

/// Opaque signing context handed through to the schedule service, e.g. the
/// connected wallet account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningContext {
    pub account: Option<Address>,
    pub chain_id: u64,
}

/// A validated, immutable request to add a vesting schedule
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VestingScheduleDraft {
    pub beneficiary: Address,
    pub start_time: i64,
    pub end_time: i64,
    /// Amount in whole tokens
    pub amount: Decimal,
    pub token_address: Address,
}

impl VestingScheduleDraft {
    /// Converts the draft into the on-chain payload using the token's decimals
    pub fn to_schedule(&self, decimals: u32) -> Result<VestingSchedule, FieldErrors> {
        let amount = to_base_units(self.amount, decimals).map_err(|e| {
            let mut errors = FieldErrors::new();
            errors.insert(ScheduleField::Amount, e);
            errors
        })?;
        Ok(VestingSchedule {
            beneficiary: self.beneficiary.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            amount,
            token_address: self.token_address.clone(),
        })
    }
}

/// Vesting schedule as passed to the contract binding
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VestingSchedule {
    pub beneficiary: Address,
    pub start_time: i64,
    pub end_time: i64,
    /// Amount in token base units
    pub amount: u128,
    pub token_address: Address,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    pub block_number: Option<u64>,
}
