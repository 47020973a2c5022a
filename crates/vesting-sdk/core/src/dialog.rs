use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{info, warn};

use crate::{
    address::Address,
    amount::AmountConversionModel,
    error::{FieldErrors, SdkError},
    format::{FormatOptions, format_amount, from_base_units},
    models::{Config, SigningContext, TokenMetadata, VestingContract},
    notification::{CorrelationId, NotificationSink},
    services::{BalanceService, ScheduleService, TokenMetadataService},
    submission::{SubmissionError, SubmissionReport, SubmissionStatus, SubmissionWorkflow},
    validation::{ScheduleForm, ValidationContext},
};

/// Token the dialog allocates from, resolved when the dialog opens
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedToken {
    pub address: Address,
    pub metadata: TokenMetadata,
    /// Base units the contract can still allocate, `None` when unknown
    pub available_amount: Option<u128>,
}

impl ResolvedToken {
    /// Available amount in whole tokens; unknown when it cannot be represented
    pub fn available_tokens(&self) -> Option<Decimal> {
        self.available_amount
            .and_then(|amount| from_base_units(amount, self.metadata.decimals))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResult {
    /// The form did not pass validation; nothing was sent
    Invalid(FieldErrors),
    Completed(SubmissionReport),
}

pub(crate) struct DialogServices {
    pub schedule_service: Arc<dyn ScheduleService>,
    pub token_metadata_service: Arc<dyn TokenMetadataService>,
    pub balance_service: Arc<dyn BalanceService>,
    pub notifier: Arc<dyn NotificationSink>,
}

/// A submission attempt running on its own task
struct InFlight {
    id: CorrelationId,
    status: watch::Receiver<SubmissionStatus>,
    task: JoinHandle<Result<SubmissionReport, SubmissionError>>,
}

/// The "add a vesting schedule" dialog: a form with a dual-currency amount
/// input, validated and submitted through a fresh workflow per attempt.
pub struct AddScheduleDialog {
    config: Config,
    contract: VestingContract,
    signing_context: SigningContext,
    services: DialogServices,
    form: ScheduleForm,
    amount_input: AmountConversionModel,
    token: Option<ResolvedToken>,
    is_open: bool,
    in_flight: Option<InFlight>,
}

impl AddScheduleDialog {
    pub(crate) fn new(
        config: Config,
        contract: VestingContract,
        signing_context: SigningContext,
        services: DialogServices,
    ) -> Self {
        let form = ScheduleForm::new();
        let amount_input = AmountConversionModel::new(
            ScheduleForm::AMOUNT_FIELD,
            config.fiat_symbol.clone(),
            config.display_precision,
            form.amount_listener(),
        );
        Self {
            config,
            contract,
            signing_context,
            services,
            form,
            amount_input,
            token: None,
            is_open: false,
            in_flight: None,
        }
    }

    pub fn can_add_schedule(&self) -> bool {
        self.contract.capabilities.add_vesting_schedule
    }

    /// Shows the dialog, resolving the token and the contract's available balance
    pub async fn open(&mut self) -> Result<(), SdkError> {
        if !self.can_add_schedule() {
            return Err(SdkError::Unsupported);
        }
        let address = self
            .contract
            .token_addresses
            .first()
            .cloned()
            .ok_or_else(|| SdkError::InvalidInput("Contract has no tokens".to_string()))?;

        let metadata = self
            .services
            .token_metadata_service
            .token_metadata(self.contract.chain_id, &address)
            .await?;
        let available_amount = match self
            .services
            .balance_service
            .available_amount(&address)
            .await
        {
            Ok(amount) => Some(amount),
            Err(e) => {
                warn!("Could not fetch available amount for {address}: {e}");
                None
            }
        };

        self.amount_input.reset(
            metadata.symbol.clone(),
            metadata.price,
            Some(metadata.decimals),
        );
        self.form.reset();
        info!(
            "Opened add schedule dialog for {} ({address}), price: {:?}",
            metadata.symbol, metadata.price
        );
        self.token = Some(ResolvedToken {
            address,
            metadata,
            available_amount,
        });
        self.is_open = true;
        self.in_flight = None;
        Ok(())
    }

    /// Hides the dialog. An attempt still in flight keeps running on its task
    /// and settles its notification; the dialog just stops observing it.
    pub fn close(&mut self) {
        self.is_open = false;
        if let Some(in_flight) = self.in_flight.take()
            && !in_flight.task.is_finished()
        {
            info!("Dialog closed while submission {} is in flight", in_flight.id);
        }
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// True while an observed attempt has not reached a terminal state
    pub fn is_submitting(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|in_flight| !in_flight.task.is_finished())
    }

    /// Status of the observed attempt, if any
    pub fn submission_status(&self) -> Option<SubmissionStatus> {
        self.in_flight
            .as_ref()
            .map(|in_flight| *in_flight.status.borrow())
    }

    pub fn token(&self) -> Option<&ResolvedToken> {
        self.token.as_ref()
    }

    pub fn form(&self) -> &ScheduleForm {
        &self.form
    }

    pub fn amount_input(&self) -> &AmountConversionModel {
        &self.amount_input
    }

    pub fn set_beneficiary(&mut self, value: impl Into<String>) {
        self.form.beneficiary = value.into();
    }

    pub fn set_start(&mut self, value: impl Into<String>) {
        self.form.start = value.into();
    }

    pub fn set_end(&mut self, value: impl Into<String>) {
        self.form.end = value.into();
    }

    pub fn input_amount(&mut self, raw: impl Into<String>) {
        self.amount_input.set_raw_input(raw);
    }

    pub fn toggle_currency(&mut self) {
        self.amount_input.toggle_direction();
    }

    /// Footer text shown when the contract balance is known
    pub fn available_amount_display(&self) -> Option<String> {
        let token = self.token.as_ref()?;
        let available = token.available_tokens()?;
        let formatted = format_amount(
            available,
            FormatOptions {
                commify: true,
                max_fraction_digits: self.config.display_precision,
            },
        );
        Some(format!(
            "Available tokens to allocate: {formatted} {}",
            token.metadata.symbol
        ))
    }

    /// Validates the form and, if valid, runs one submission attempt.
    /// The dialog closes itself when the schedule is confirmed.
    ///
    /// The attempt runs on a spawned task. Dropping the returned future only
    /// stops waiting for it; `is_submitting` keeps reporting it until it
    /// settles or the dialog is closed.
    pub async fn submit(&mut self) -> Result<SubmitResult, SdkError> {
        if !self.is_open {
            return Err(SdkError::InvalidInput("Dialog is not open".to_string()));
        }
        if self.is_submitting() {
            return Err(SdkError::SubmissionInProgress);
        }
        let token = self
            .token
            .clone()
            .ok_or_else(|| SdkError::Generic("Dialog token not resolved".to_string()))?;

        let ctx = ValidationContext {
            token_address: token.address.clone(),
            token_decimals: token.metadata.decimals,
            available_amount: token.available_tokens(),
        };
        let draft = match self.form.validate(&ctx) {
            Ok(draft) => draft,
            Err(errors) => return Ok(SubmitResult::Invalid(errors)),
        };

        let workflow = SubmissionWorkflow::new(
            self.services.schedule_service.clone(),
            self.services.notifier.clone(),
            self.signing_context.clone(),
        );
        let id = workflow.id().clone();
        let status = workflow.subscribe();
        let decimals = token.metadata.decimals;
        let task = tokio::spawn(async move { workflow.submit(&draft, decimals).await });
        let in_flight = self.in_flight.insert(InFlight { id, status, task });

        let joined = (&mut in_flight.task).await;
        self.in_flight = None;
        let result =
            joined.map_err(|e| SdkError::Generic(format!("Submission task failed: {e}")))?;

        match result {
            Ok(report) => {
                if report.outcome.should_close_dialog() {
                    self.close();
                }
                Ok(SubmitResult::Completed(report))
            }
            Err(SubmissionError::InvalidDraft(errors)) => Ok(SubmitResult::Invalid(errors)),
            Err(e) => Err(SdkError::Generic(e.to_string())),
        }
    }
}
