use std::sync::Arc;

use crate::{
    Logger,
    address::Address,
    dialog::{AddScheduleDialog, DialogServices},
    error::SdkError,
    logger,
    models::{Config, ContractCapabilities, SigningContext, VestingContract},
    notification::{NotificationCenter, NotificationListener},
    services::{BalanceService, ScheduleService, TokenMetadataService},
};

const DEFAULT_DISPLAY_PRECISION: u32 = 6;

/// Entry point for viewing a vesting contract and adding schedules to it
#[derive(Clone)]
pub struct VestingSdk {
    pub(crate) config: Config,
    pub(crate) schedule_service: Arc<dyn ScheduleService>,
    pub(crate) token_metadata_service: Arc<dyn TokenMetadataService>,
    pub(crate) balance_service: Arc<dyn BalanceService>,
    pub(crate) notification_center: Arc<NotificationCenter>,
}

pub fn default_config(chain_id: u64) -> Config {
    Config {
        chain_id,
        contract_type: "TokenVesting".to_string(),
        contract_address: String::new(),
        fiat_symbol: "USD".to_string(),
        display_precision: DEFAULT_DISPLAY_PRECISION,
    }
}

pub fn init_logging(
    log_dir: Option<String>,
    app_logger: Option<Box<dyn Logger>>,
    log_filter: Option<String>,
) -> Result<(), SdkError> {
    logger::init_logging(log_dir, app_logger, log_filter)
}

impl VestingSdk {
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Describes the configured contract
    pub fn contract(
        &self,
        token_addresses: Vec<Address>,
        capabilities: ContractCapabilities,
    ) -> VestingContract {
        VestingContract {
            contract_type: self.config.contract_type.clone(),
            chain_id: self.config.chain_id,
            address: self.config.contract_address.clone(),
            token_addresses,
            capabilities,
        }
    }

    /// Creates a closed add-schedule dialog for the contract. Each dialog
    /// owns its own form and amount state.
    pub fn add_schedule_dialog(
        &self,
        contract: VestingContract,
        signing_context: SigningContext,
    ) -> AddScheduleDialog {
        AddScheduleDialog::new(
            self.config.clone(),
            contract,
            signing_context,
            DialogServices {
                schedule_service: self.schedule_service.clone(),
                token_metadata_service: self.token_metadata_service.clone(),
                balance_service: self.balance_service.clone(),
                notifier: self.notification_center.clone(),
            },
        )
    }

    pub fn notification_center(&self) -> Arc<NotificationCenter> {
        self.notification_center.clone()
    }

    /// Registers a listener for notification events, returning its id
    pub async fn add_notification_listener(&self, listener: Box<dyn NotificationListener>) -> String {
        self.notification_center.add_listener(listener).await
    }

    pub async fn remove_notification_listener(&self, id: &str) -> bool {
        self.notification_center.remove_listener(id).await
    }
}
