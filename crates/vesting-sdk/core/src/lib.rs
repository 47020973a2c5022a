mod address;
mod amount;
mod dialog;
mod error;
mod format;
mod logger;
mod models;
mod notification;
mod sdk;
mod sdk_builder;
mod services;
mod submission;
mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use address::{Address, is_address, parse_address};
pub use amount::{
    AmountAction, AmountChangeListener, AmountConversionModel, AmountState, ChangeEventType,
    ChangeTarget, InputChangeEvent, Reduced, parse_raw_amount, reduce,
};
pub use dialog::{AddScheduleDialog, ResolvedToken, SubmitResult};
pub use error::{
    ACTION_REJECTED_CODE, FieldErrors, ProviderError, ProviderErrorCode, ProviderErrorData,
    ScheduleField, SdkError, ServiceError, SubmissionFailure, USER_REJECTED_CODE, ValidationError,
};
pub use format::{
    FormatOptions, format_amount, format_currency, from_base_units, round_amount, to_base_units,
};
pub use models::*;
pub use notification::{
    CorrelationId, Notification, NotificationCenter, NotificationEvent, NotificationKind,
    NotificationListener, NotificationSink, TransientMessage,
};
pub use sdk::{VestingSdk, default_config, init_logging};
pub use sdk_builder::VestingSdkBuilder;
pub use services::{BalanceService, ScheduleService, TokenMetadataService, TransactionHandle};
pub use submission::{
    NotificationEffect, SubmissionError, SubmissionEvent, SubmissionOutcome, SubmissionReport,
    SubmissionStatus, SubmissionWorkflow, Transition, transition,
};
pub use validation::{
    RegisteredAmount, ScheduleForm, ValidationContext, address_validity, balance_sufficiency,
    date_ordering, non_negative_amount, parse_datetime_local,
};
