//! In-memory collaborators for exercising the SDK without a chain.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::{Mutex, Notify};

use crate::{
    address::Address,
    error::{ProviderError, ProviderErrorCode, ServiceError, USER_REJECTED_CODE},
    models::{Config, SigningContext, TokenMetadata, TransactionReceipt, VestingSchedule},
    notification::NotificationCenter,
    sdk_builder::VestingSdkBuilder,
    services::{BalanceService, ScheduleService, TokenMetadataService, TransactionHandle},
};

/// What the simulated signer does with the next request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerBehavior {
    Approve,
    Reject,
    /// The provider fails before broadcasting
    Fail(ProviderError),
    /// Broadcast succeeds but the transaction reverts
    Revert(ProviderError),
}

pub fn user_rejection() -> ProviderError {
    ProviderError::new("User rejected the request.")
        .with_code(ProviderErrorCode::Numeric(USER_REJECTED_CODE))
}

struct ScriptedTransaction {
    hash: String,
    block_number: u64,
    revert: Option<ProviderError>,
}

#[async_trait::async_trait]
impl TransactionHandle for ScriptedTransaction {
    fn transaction_hash(&self) -> String {
        self.hash.clone()
    }

    async fn wait(&self) -> Result<TransactionReceipt, ProviderError> {
        match &self.revert {
            Some(e) => Err(e.clone()),
            None => Ok(TransactionReceipt {
                transaction_hash: self.hash.clone(),
                block_number: Some(self.block_number),
            }),
        }
    }
}

/// Schedule service whose signer follows a configurable behavior and which
/// records every schedule it was asked to add.
pub struct ScriptedScheduleService {
    behavior: Mutex<SignerBehavior>,
    gate: Mutex<Option<Arc<Notify>>>,
    nonce: AtomicU64,
    requests: Mutex<Vec<VestingSchedule>>,
}

impl ScriptedScheduleService {
    pub fn new(behavior: SignerBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            gate: Mutex::new(None),
            nonce: AtomicU64::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn set_behavior(&self, behavior: SignerBehavior) {
        *self.behavior.lock().await = behavior;
    }

    /// Makes the next signature request wait until the returned gate is
    /// notified, like a wallet prompt left open.
    pub async fn hold_next_signature(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().await = Some(gate.clone());
        gate
    }

    pub async fn requests(&self) -> Vec<VestingSchedule> {
        self.requests.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl ScheduleService for ScriptedScheduleService {
    async fn add_vesting_schedule(
        &self,
        _signing_context: &SigningContext,
        schedule: VestingSchedule,
    ) -> Result<Box<dyn TransactionHandle>, ProviderError> {
        self.requests.lock().await.push(schedule);
        let gate = self.gate.lock().await.take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let behavior = self.behavior.lock().await.clone();
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        let hash = format!("0x{nonce:064x}");
        match behavior {
            SignerBehavior::Approve => Ok(Box::new(ScriptedTransaction {
                hash,
                block_number: 100 + nonce,
                revert: None,
            })),
            SignerBehavior::Reject => Err(user_rejection()),
            SignerBehavior::Fail(e) => Err(e),
            SignerBehavior::Revert(e) => Ok(Box::new(ScriptedTransaction {
                hash,
                block_number: 100 + nonce,
                revert: Some(e),
            })),
        }
    }
}

/// Token metadata service answering with a fixed value, which can be swapped
pub struct StaticTokenMetadataService {
    metadata: Mutex<Result<TokenMetadata, ServiceError>>,
}

impl StaticTokenMetadataService {
    pub fn new(metadata: TokenMetadata) -> Self {
        Self {
            metadata: Mutex::new(Ok(metadata)),
        }
    }

    pub async fn set(&self, metadata: Result<TokenMetadata, ServiceError>) {
        *self.metadata.lock().await = metadata;
    }
}

#[async_trait::async_trait]
impl TokenMetadataService for StaticTokenMetadataService {
    async fn token_metadata(
        &self,
        _chain_id: u64,
        _token_address: &Address,
    ) -> Result<TokenMetadata, ServiceError> {
        self.metadata.lock().await.clone()
    }
}

pub struct StaticBalanceService {
    available: Mutex<Result<u128, ServiceError>>,
}

impl StaticBalanceService {
    pub fn new(available: Result<u128, ServiceError>) -> Self {
        Self {
            available: Mutex::new(available),
        }
    }

    pub async fn set(&self, available: Result<u128, ServiceError>) {
        *self.available.lock().await = available;
    }
}

#[async_trait::async_trait]
impl BalanceService for StaticBalanceService {
    async fn available_amount(&self, _token_address: &Address) -> Result<u128, ServiceError> {
        self.available.lock().await.clone()
    }
}

/// Services bundled for a test SDK
pub struct TestServices {
    pub schedule: Arc<ScriptedScheduleService>,
    pub metadata: Arc<StaticTokenMetadataService>,
    pub balance: Arc<StaticBalanceService>,
}

impl TestServices {
    pub fn new(metadata: TokenMetadata, available: Result<u128, ServiceError>) -> Self {
        Self {
            schedule: Arc::new(ScriptedScheduleService::new(SignerBehavior::Approve)),
            metadata: Arc::new(StaticTokenMetadataService::new(metadata)),
            balance: Arc::new(StaticBalanceService::new(available)),
        }
    }

    /// Builder wired to these services and the given notification center
    pub fn builder(
        &self,
        config: Config,
        notification_center: Arc<NotificationCenter>,
    ) -> VestingSdkBuilder {
        VestingSdkBuilder::new(config)
            .with_schedule_service(self.schedule.clone())
            .with_token_metadata_service(self.metadata.clone())
            .with_balance_service(self.balance.clone())
            .with_notification_center(notification_center)
    }
}
