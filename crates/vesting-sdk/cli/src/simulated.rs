use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use clap::ValueEnum;
use tokio::sync::Mutex;
use tracing::info;
use vesting_sdk::{
    Address, BalanceService, ProviderError, ProviderErrorCode, ScheduleService, ServiceError,
    SigningContext, TokenMetadata, TokenMetadataService, TransactionHandle, TransactionReceipt,
    USER_REJECTED_CODE, VestingSchedule,
};

/// How the simulated wallet answers signature requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SignerMode {
    Approve,
    Reject,
    Fail,
}

struct SimulatedTransaction {
    hash: String,
    block_number: u64,
    confirmation_delay: Duration,
    chain: Arc<SimulatedChain>,
    amount: u128,
}

#[async_trait::async_trait]
impl TransactionHandle for SimulatedTransaction {
    fn transaction_hash(&self) -> String {
        self.hash.clone()
    }

    async fn wait(&self) -> Result<TransactionReceipt, ProviderError> {
        tokio::time::sleep(self.confirmation_delay).await;
        let mut available = self.chain.available.lock().await;
        *available = available.checked_sub(self.amount).ok_or_else(|| {
            ProviderError::default()
                .with_inner(ProviderError::new("execution reverted: insufficient tokens"))
        })?;
        Ok(TransactionReceipt {
            transaction_hash: self.hash.clone(),
            block_number: Some(self.block_number),
        })
    }
}

/// A single-token chain kept in memory. Confirmed schedules are deducted
/// from the contract's available amount.
pub struct SimulatedChain {
    metadata: TokenMetadata,
    available: Mutex<u128>,
    signer_mode: Mutex<SignerMode>,
    failure_message: Mutex<String>,
    confirmation_delay: Duration,
    block_number: AtomicU64,
}

impl SimulatedChain {
    pub fn new(metadata: TokenMetadata, available: u128, confirmation_delay: Duration) -> Self {
        Self {
            metadata,
            available: Mutex::new(available),
            signer_mode: Mutex::new(SignerMode::Approve),
            failure_message: Mutex::new("Internal JSON-RPC error.".to_string()),
            confirmation_delay,
            block_number: AtomicU64::new(1),
        }
    }

    pub async fn set_signer_mode(&self, mode: SignerMode, message: Option<String>) {
        *self.signer_mode.lock().await = mode;
        if let Some(message) = message {
            *self.failure_message.lock().await = message;
        }
    }

    pub async fn signer_mode(&self) -> SignerMode {
        *self.signer_mode.lock().await
    }
}

/// Schedule service bound to a simulated chain
pub struct SimulatedScheduleService {
    pub chain: Arc<SimulatedChain>,
}

#[async_trait::async_trait]
impl ScheduleService for SimulatedScheduleService {
    async fn add_vesting_schedule(
        &self,
        signing_context: &SigningContext,
        schedule: VestingSchedule,
    ) -> Result<Box<dyn TransactionHandle>, ProviderError> {
        match self.chain.signer_mode().await {
            SignerMode::Reject => Err(ProviderError::new("User denied transaction signature.")
                .with_code(ProviderErrorCode::Numeric(USER_REJECTED_CODE))),
            SignerMode::Fail => {
                let message = self.chain.failure_message.lock().await.clone();
                Err(ProviderError::new("Internal JSON-RPC error.").with_data_message(message))
            }
            SignerMode::Approve => {
                let block_number = self.chain.block_number.fetch_add(1, Ordering::Relaxed);
                let hash = format!("0x{block_number:064x}");
                info!(
                    "Signed schedule for {} from {:?}: {hash}",
                    schedule.beneficiary, signing_context.account
                );
                Ok(Box::new(SimulatedTransaction {
                    hash,
                    block_number,
                    confirmation_delay: self.chain.confirmation_delay,
                    chain: self.chain.clone(),
                    amount: schedule.amount,
                }))
            }
        }
    }
}

#[async_trait::async_trait]
impl TokenMetadataService for SimulatedChain {
    async fn token_metadata(
        &self,
        _chain_id: u64,
        _token_address: &Address,
    ) -> Result<TokenMetadata, ServiceError> {
        Ok(self.metadata.clone())
    }
}

#[async_trait::async_trait]
impl BalanceService for SimulatedChain {
    async fn available_amount(&self, _token_address: &Address) -> Result<u128, ServiceError> {
        Ok(*self.available.lock().await)
    }
}
