use std::{fmt, sync::Arc};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::{
    error::{FieldErrors, ProviderError, SubmissionFailure},
    models::{SigningContext, TransactionReceipt, VestingScheduleDraft},
    notification::{CorrelationId, NotificationKind, NotificationSink},
    services::ScheduleService,
};

pub(crate) const AWAITING_SIGNATURE_MESSAGE: &str = "Sign transaction to add a schedule";
pub(crate) const AWAITING_CONFIRMATION_MESSAGE: &str = "Adding a schedule...";
pub(crate) const SUCCESS_MESSAGE: &str = "Successfully added a schedule to your vesting contract";
pub(crate) const FAILURE_MESSAGE: &str =
    "Something went wrong adding a schedule to your vesting contract";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubmissionStatus {
    Idle,
    AwaitingSignature,
    AwaitingConfirmation,
    Succeeded,
    Failed,
    UserRejected,
}

impl SubmissionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SubmissionStatus::Succeeded | SubmissionStatus::Failed | SubmissionStatus::UserRejected
        )
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Inputs of the submission state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionEvent {
    Submit,
    SignatureAccepted { transaction_hash: String },
    Confirmed { receipt: TransactionReceipt },
    Failed { error: ProviderError },
}

/// Notification side effects produced by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEffect {
    Open { message: String },
    Update { kind: NotificationKind, message: String },
    Dismiss,
    /// Secondary message not tied to the correlation id
    Show { kind: NotificationKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub status: SubmissionStatus,
    pub effects: Vec<NotificationEffect>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SubmissionError {
    #[error("Invalid transition from {from} on {event}")]
    InvalidTransition {
        from: SubmissionStatus,
        event: String,
    },

    #[error("Invalid draft: {0}")]
    InvalidDraft(FieldErrors),
}

/// Pure transition function of a submission attempt
pub fn transition(
    from: SubmissionStatus,
    event: SubmissionEvent,
) -> Result<Transition, SubmissionError> {
    use SubmissionStatus::{AwaitingConfirmation, AwaitingSignature, Idle};

    let next = match (from, event) {
        (Idle, SubmissionEvent::Submit) => Transition {
            status: AwaitingSignature,
            effects: vec![NotificationEffect::Open {
                message: AWAITING_SIGNATURE_MESSAGE.to_string(),
            }],
        },
        (AwaitingSignature, SubmissionEvent::SignatureAccepted { .. }) => Transition {
            status: AwaitingConfirmation,
            effects: vec![NotificationEffect::Update {
                kind: NotificationKind::Loading,
                message: AWAITING_CONFIRMATION_MESSAGE.to_string(),
            }],
        },
        (AwaitingConfirmation, SubmissionEvent::Confirmed { .. }) => Transition {
            status: SubmissionStatus::Succeeded,
            effects: vec![NotificationEffect::Update {
                kind: NotificationKind::Success,
                message: SUCCESS_MESSAGE.to_string(),
            }],
        },
        (AwaitingSignature | AwaitingConfirmation, SubmissionEvent::Failed { error }) => {
            match error.classify() {
                SubmissionFailure::UserCancellation => Transition {
                    status: SubmissionStatus::UserRejected,
                    effects: vec![NotificationEffect::Dismiss],
                },
                SubmissionFailure::ProviderFailure(error) => Transition {
                    status: SubmissionStatus::Failed,
                    effects: vec![
                        NotificationEffect::Update {
                            kind: NotificationKind::Error,
                            message: FAILURE_MESSAGE.to_string(),
                        },
                        NotificationEffect::Show {
                            kind: NotificationKind::Error,
                            message: failure_detail(&error),
                        },
                    ],
                },
            }
        }
        (from, event) => {
            return Err(SubmissionError::InvalidTransition {
                from,
                event: format!("{event:?}"),
            });
        }
    };
    Ok(next)
}

/// Message extracted from a provider error, never empty
fn failure_detail(error: &ProviderError) -> String {
    error.display_message().unwrap_or_else(|| error.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Succeeded { receipt: TransactionReceipt },
    /// The user declined to sign; nothing was shown
    UserRejected,
    Failed { message: String },
}

impl SubmissionOutcome {
    pub fn status(&self) -> SubmissionStatus {
        match self {
            SubmissionOutcome::Succeeded { .. } => SubmissionStatus::Succeeded,
            SubmissionOutcome::UserRejected => SubmissionStatus::UserRejected,
            SubmissionOutcome::Failed { .. } => SubmissionStatus::Failed,
        }
    }

    /// The originating dialog closes only after a confirmed schedule
    pub fn should_close_dialog(&self) -> bool {
        matches!(self, SubmissionOutcome::Succeeded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReport {
    pub id: CorrelationId,
    pub outcome: SubmissionOutcome,
}

/// Drives a single attempt to add a vesting schedule, from signature request
/// to confirmation. Consumed by `submit`, so an instance can never be reused.
pub struct SubmissionWorkflow {
    id: CorrelationId,
    status: watch::Sender<SubmissionStatus>,
    schedule_service: Arc<dyn ScheduleService>,
    notifier: Arc<dyn NotificationSink>,
    signing_context: SigningContext,
}

impl SubmissionWorkflow {
    pub fn new(
        schedule_service: Arc<dyn ScheduleService>,
        notifier: Arc<dyn NotificationSink>,
        signing_context: SigningContext,
    ) -> Self {
        let (status, _) = watch::channel(SubmissionStatus::Idle);
        Self {
            id: CorrelationId::generate(),
            status,
            schedule_service,
            notifier,
            signing_context,
        }
    }

    pub fn id(&self) -> &CorrelationId {
        &self.id
    }

    pub fn status(&self) -> SubmissionStatus {
        *self.status.borrow()
    }

    /// Observe status changes while the attempt is in flight
    pub fn subscribe(&self) -> watch::Receiver<SubmissionStatus> {
        self.status.subscribe()
    }

    /// Submits the draft and waits for a terminal state.
    ///
    /// Provider failures and cancellations are part of the outcome; an `Err`
    /// is only returned for a draft the token cannot represent.
    pub async fn submit(
        self,
        draft: &VestingScheduleDraft,
        token_decimals: u32,
    ) -> Result<SubmissionReport, SubmissionError> {
        let schedule = draft
            .to_schedule(token_decimals)
            .map_err(SubmissionError::InvalidDraft)?;

        self.apply(SubmissionEvent::Submit).await?;
        info!(
            "Submission {} adding schedule for {} ({} base units)",
            self.id, schedule.beneficiary, schedule.amount
        );

        let signed = self
            .schedule_service
            .add_vesting_schedule(&self.signing_context, schedule)
            .await;
        let handle = match signed {
            Ok(handle) => handle,
            Err(error) => return self.fail(error).await,
        };

        self.apply(SubmissionEvent::SignatureAccepted {
            transaction_hash: handle.transaction_hash(),
        })
        .await?;

        match handle.wait().await {
            Ok(receipt) => {
                self.apply(SubmissionEvent::Confirmed {
                    receipt: receipt.clone(),
                })
                .await?;
                Ok(self.report(SubmissionOutcome::Succeeded { receipt }))
            }
            Err(error) => self.fail(error).await,
        }
    }

    async fn fail(self, error: ProviderError) -> Result<SubmissionReport, SubmissionError> {
        if error.is_user_rejection() {
            info!("Submission {} declined by the user", self.id);
        } else {
            error!("Submission {} failed: {error}", self.id);
        }
        let message = failure_detail(&error);
        self.apply(SubmissionEvent::Failed { error }).await?;
        let outcome = match self.status() {
            SubmissionStatus::UserRejected => SubmissionOutcome::UserRejected,
            _ => SubmissionOutcome::Failed { message },
        };
        Ok(self.report(outcome))
    }

    fn report(self, outcome: SubmissionOutcome) -> SubmissionReport {
        SubmissionReport {
            id: self.id,
            outcome,
        }
    }

    async fn apply(&self, event: SubmissionEvent) -> Result<(), SubmissionError> {
        let from = self.status();
        let Transition { status, effects } = transition(from, event)?;
        debug!("Submission {}: {from} -> {status}", self.id);
        self.status.send_replace(status);

        for effect in effects {
            match effect {
                NotificationEffect::Open { message } => self.notifier.open(&self.id, message).await,
                NotificationEffect::Update { kind, message } => {
                    self.notifier.update(&self.id, kind, message).await;
                }
                NotificationEffect::Dismiss => self.notifier.dismiss(&self.id).await,
                NotificationEffect::Show { kind, message } => {
                    self.notifier.show(kind, message).await;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mockall::{Sequence, predicate::eq};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{
        address::parse_address,
        error::ProviderErrorCode,
        notification::MockNotificationSink,
        services::{MockScheduleService, MockTransactionHandle, TransactionHandle},
    };

    fn draft() -> VestingScheduleDraft {
        VestingScheduleDraft {
            beneficiary: parse_address("0xde0B295669a9FD93d5F28D9Ec85E40f4cb697BAe").unwrap(),
            start_time: 1_704_067_200,
            end_time: 1_735_689_600,
            amount: dec!(250),
            token_address: parse_address("0x8ba1f109551bd432803012645ac136ddd64dba72").unwrap(),
        }
    }

    fn signing_context() -> SigningContext {
        SigningContext {
            account: None,
            chain_id: 1,
        }
    }

    fn receipt() -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: "0xabc".to_string(),
            block_number: Some(42),
        }
    }

    fn confirming_handle(result: Result<TransactionReceipt, ProviderError>) -> MockTransactionHandle {
        let mut handle = MockTransactionHandle::new();
        handle
            .expect_transaction_hash()
            .returning(|| "0xabc".to_string());
        handle.expect_wait().return_once(move || result);
        handle
    }

    #[test]
    fn test_transition_table() {
        let t = transition(SubmissionStatus::Idle, SubmissionEvent::Submit).unwrap();
        assert_eq!(t.status, SubmissionStatus::AwaitingSignature);

        let t = transition(
            SubmissionStatus::AwaitingSignature,
            SubmissionEvent::SignatureAccepted {
                transaction_hash: "0x1".to_string(),
            },
        )
        .unwrap();
        assert_eq!(t.status, SubmissionStatus::AwaitingConfirmation);

        let t = transition(
            SubmissionStatus::AwaitingConfirmation,
            SubmissionEvent::Confirmed { receipt: receipt() },
        )
        .unwrap();
        assert_eq!(t.status, SubmissionStatus::Succeeded);
        assert!(t.status.is_terminal());
    }

    #[test]
    fn test_terminal_states_reject_events() {
        for from in [
            SubmissionStatus::Succeeded,
            SubmissionStatus::Failed,
            SubmissionStatus::UserRejected,
        ] {
            assert!(transition(from, SubmissionEvent::Submit).is_err());
        }
        assert!(
            transition(
                SubmissionStatus::Idle,
                SubmissionEvent::Confirmed { receipt: receipt() }
            )
            .is_err()
        );
    }

    #[test]
    fn test_rejection_at_confirmation_is_silent() {
        let error = ProviderError::new("denied").with_code(ProviderErrorCode::Numeric(4001));
        let t = transition(
            SubmissionStatus::AwaitingConfirmation,
            SubmissionEvent::Failed { error },
        )
        .unwrap();
        assert_eq!(t.status, SubmissionStatus::UserRejected);
        assert_eq!(t.effects, vec![NotificationEffect::Dismiss]);
    }

    #[test]
    fn test_failure_without_message_still_surfaces_text() {
        let t = transition(
            SubmissionStatus::AwaitingSignature,
            SubmissionEvent::Failed {
                error: ProviderError::default(),
            },
        )
        .unwrap();
        let shown: Vec<_> = t
            .effects
            .iter()
            .filter_map(|e| match e {
                NotificationEffect::Show { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(shown, vec!["unknown provider error".to_string()]);
    }

    #[tokio::test]
    async fn test_successful_submission_notifies_in_order() {
        let workflow_receipt = receipt();
        let mut service = MockScheduleService::new();
        service
            .expect_add_vesting_schedule()
            .withf(|_, schedule| schedule.amount == 250_000_000_000_000_000_000)
            .times(1)
            .return_once(move |_, _| {
                Ok(Box::new(confirming_handle(Ok(workflow_receipt))) as Box<dyn TransactionHandle>)
            });

        let mut seq = Sequence::new();
        let mut notifier = MockNotificationSink::new();
        notifier
            .expect_open()
            .withf(|_, message| message == AWAITING_SIGNATURE_MESSAGE)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        notifier
            .expect_update()
            .with(
                mockall::predicate::always(),
                eq(NotificationKind::Loading),
                eq(AWAITING_CONFIRMATION_MESSAGE.to_string()),
            )
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        notifier
            .expect_update()
            .with(
                mockall::predicate::always(),
                eq(NotificationKind::Success),
                eq(SUCCESS_MESSAGE.to_string()),
            )
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        notifier.expect_dismiss().never();
        notifier.expect_show().never();

        let workflow =
            SubmissionWorkflow::new(Arc::new(service), Arc::new(notifier), signing_context());
        let status = workflow.subscribe();
        let report = workflow.submit(&draft(), 18).await.unwrap();

        assert_eq!(report.outcome, SubmissionOutcome::Succeeded { receipt: receipt() });
        assert!(report.outcome.should_close_dialog());
        assert_eq!(*status.borrow(), SubmissionStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_user_rejection_dismisses_notification() {
        let mut service = MockScheduleService::new();
        service.expect_add_vesting_schedule().return_once(|_, _| {
            Err(ProviderError::new("user rejected transaction")
                .with_code(ProviderErrorCode::Text("ACTION_REJECTED".to_string())))
        });

        let mut notifier = MockNotificationSink::new();
        notifier.expect_open().times(1).return_const(());
        notifier.expect_dismiss().times(1).return_const(());
        notifier.expect_update().never();
        notifier.expect_show().never();

        let workflow =
            SubmissionWorkflow::new(Arc::new(service), Arc::new(notifier), signing_context());
        let report = workflow.submit(&draft(), 18).await.unwrap();

        assert_eq!(report.outcome, SubmissionOutcome::UserRejected);
        assert!(!report.outcome.should_close_dialog());
    }

    #[tokio::test]
    async fn test_confirmation_failure_surfaces_message() {
        let mut service = MockScheduleService::new();
        service.expect_add_vesting_schedule().return_once(|_, _| {
            let error = ProviderError::new("transaction failed")
                .with_code(ProviderErrorCode::Text("CALL_EXCEPTION".to_string()))
                .with_inner(ProviderError::new("execution reverted"));
            Ok(Box::new(confirming_handle(Err(error))) as Box<dyn TransactionHandle>)
        });

        let mut notifier = MockNotificationSink::new();
        notifier.expect_open().times(1).return_const(());
        notifier
            .expect_update()
            .with(
                mockall::predicate::always(),
                eq(NotificationKind::Loading),
                mockall::predicate::always(),
            )
            .times(1)
            .return_const(());
        notifier
            .expect_update()
            .with(
                mockall::predicate::always(),
                eq(NotificationKind::Error),
                eq(FAILURE_MESSAGE.to_string()),
            )
            .times(1)
            .return_const(());
        notifier
            .expect_show()
            .with(
                eq(NotificationKind::Error),
                eq("execution reverted".to_string()),
            )
            .times(1)
            .return_const(());
        notifier.expect_dismiss().never();

        let workflow =
            SubmissionWorkflow::new(Arc::new(service), Arc::new(notifier), signing_context());
        let report = workflow.submit(&draft(), 18).await.unwrap();

        assert_eq!(
            report.outcome,
            SubmissionOutcome::Failed {
                message: "execution reverted".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unrepresentable_draft_never_reaches_signer() {
        let mut service = MockScheduleService::new();
        service.expect_add_vesting_schedule().never();
        let mut notifier = MockNotificationSink::new();
        notifier.expect_open().never();

        let mut draft = draft();
        draft.amount = dec!(0.0001);
        let workflow =
            SubmissionWorkflow::new(Arc::new(service), Arc::new(notifier), signing_context());
        let result = workflow.submit(&draft, 2).await;
        assert!(matches!(result, Err(SubmissionError::InvalidDraft(_))));
    }
}
