use crate::{
    address::Address,
    error::{ProviderError, ServiceError},
    models::{SigningContext, TokenMetadata, TransactionReceipt, VestingSchedule},
};

/// A broadcast transaction whose confirmation can be awaited
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TransactionHandle: Send + Sync {
    fn transaction_hash(&self) -> String;

    /// Resolves once the transaction is confirmed on-chain
    async fn wait(&self) -> Result<TransactionReceipt, ProviderError>;
}

/// Contract binding able to add vesting schedules.
///
/// `add_vesting_schedule` returns once the signer has accepted and the
/// transaction was broadcast. A declined signature is reported as a
/// `ProviderError` carrying one of the rejection codes.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ScheduleService: Send + Sync {
    async fn add_vesting_schedule(
        &self,
        signing_context: &SigningContext,
        schedule: VestingSchedule,
    ) -> Result<Box<dyn TransactionHandle>, ProviderError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TokenMetadataService: Send + Sync {
    async fn token_metadata(
        &self,
        chain_id: u64,
        token_address: &Address,
    ) -> Result<TokenMetadata, ServiceError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait BalanceService: Send + Sync {
    /// Amount of the token the contract can still allocate, in base units
    async fn available_amount(&self, token_address: &Address) -> Result<u128, ServiceError>;
}
