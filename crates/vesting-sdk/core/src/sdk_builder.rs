use std::sync::Arc;

use crate::{
    error::SdkError,
    models::Config,
    notification::NotificationCenter,
    sdk::VestingSdk,
    services::{BalanceService, ScheduleService, TokenMetadataService},
};

/// Builder for creating `VestingSdk` instances with customizable components.
#[derive(Clone)]
pub struct VestingSdkBuilder {
    config: Config,
    schedule_service: Option<Arc<dyn ScheduleService>>,
    token_metadata_service: Option<Arc<dyn TokenMetadataService>>,
    balance_service: Option<Arc<dyn BalanceService>>,
    notification_center: Option<Arc<NotificationCenter>>,
}

impl VestingSdkBuilder {
    /// Creates a new `VestingSdkBuilder` with the provided configuration.
    pub fn new(config: Config) -> Self {
        VestingSdkBuilder {
            config,
            schedule_service: None,
            token_metadata_service: None,
            balance_service: None,
            notification_center: None,
        }
    }

    /// Sets the contract binding used to add schedules.
    #[must_use]
    pub fn with_schedule_service(mut self, schedule_service: Arc<dyn ScheduleService>) -> Self {
        self.schedule_service = Some(schedule_service);
        self
    }

    #[must_use]
    pub fn with_token_metadata_service(
        mut self,
        token_metadata_service: Arc<dyn TokenMetadataService>,
    ) -> Self {
        self.token_metadata_service = Some(token_metadata_service);
        self
    }

    #[must_use]
    pub fn with_balance_service(mut self, balance_service: Arc<dyn BalanceService>) -> Self {
        self.balance_service = Some(balance_service);
        self
    }

    /// Shares an existing notification center instead of creating one.
    #[must_use]
    pub fn with_notification_center(mut self, notification_center: Arc<NotificationCenter>) -> Self {
        self.notification_center = Some(notification_center);
        self
    }

    /// Builds the `VestingSdk` instance with the configured components.
    pub fn build(self) -> Result<VestingSdk, SdkError> {
        if self.config.fiat_symbol.trim().is_empty() {
            return Err(SdkError::InvalidInput(
                "Fiat symbol must not be empty".to_string(),
            ));
        }
        let schedule_service = self
            .schedule_service
            .ok_or_else(|| SdkError::InvalidInput("Schedule service is required".to_string()))?;
        let token_metadata_service = self.token_metadata_service.ok_or_else(|| {
            SdkError::InvalidInput("Token metadata service is required".to_string())
        })?;
        let balance_service = self
            .balance_service
            .ok_or_else(|| SdkError::InvalidInput("Balance service is required".to_string()))?;

        Ok(VestingSdk {
            config: self.config,
            schedule_service,
            token_metadata_service,
            balance_service,
            notification_center: self.notification_center.unwrap_or_default(),
        })
    }
}
