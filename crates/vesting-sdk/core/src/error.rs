use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for the `VestingSdk`
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SdkError {
    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An external collaborator (token metadata, balance) failed
    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("A submission is already in progress")]
    SubmissionInProgress,

    #[error("Adding vesting schedules is not supported by this contract")]
    Unsupported,

    #[error("Error: {0}")]
    Generic(String),
}

impl From<ServiceError> for SdkError {
    fn from(e: ServiceError) -> Self {
        SdkError::ServiceError(e.to_string())
    }
}

impl From<chrono::ParseError> for SdkError {
    fn from(e: chrono::ParseError) -> Self {
        SdkError::InvalidInput(e.to_string())
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(e: serde_json::Error) -> Self {
        SdkError::Generic(e.to_string())
    }
}

impl From<String> for SdkError {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

impl From<&str> for SdkError {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}

/// Failure reported by the token metadata or balance collaborators
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Token not found: {0}")]
    TokenNotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Generic: {0}")]
    Generic(String),
}

/// Form fields of a vesting schedule that can carry a validation error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScheduleField {
    Beneficiary,
    Start,
    End,
    Amount,
}

impl fmt::Display for ScheduleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleField::Beneficiary => write!(f, "beneficiary"),
            ScheduleField::Start => write!(f, "start"),
            ScheduleField::End => write!(f, "end"),
            ScheduleField::Amount => write!(f, "amount"),
        }
    }
}

/// Field-scoped, recoverable validation failure.
///
/// These never leave the form. `message_for` renders the text shown beneath
/// the offending field.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("field is required")]
    FieldRequired,

    #[error("invalid address")]
    AddressInvalid,

    #[error("vesting cannot end before it has started")]
    DatesInverted,

    #[error("the vesting amount cannot be negative")]
    AmountNegative,

    #[error("vesting contract does not have enough tokens available")]
    AmountExceedsAvailable,

    #[error("amount has more than {decimals} decimal places")]
    AmountTooPrecise { decimals: u32 },

    #[error("amount does not fit the token's base units")]
    AmountTooLarge,
}

impl ValidationError {
    /// The user-visible message for this error on the given field
    pub fn message_for(&self, field: ScheduleField) -> String {
        match (self, field) {
            (ValidationError::FieldRequired, ScheduleField::Beneficiary) => {
                "A valid address is required".to_string()
            }
            (ValidationError::FieldRequired, ScheduleField::Start) => {
                "A vesting start is required".to_string()
            }
            (ValidationError::FieldRequired, ScheduleField::End) => {
                "A vesting end is required".to_string()
            }
            (ValidationError::FieldRequired, ScheduleField::Amount) => {
                "A vesting amount is required".to_string()
            }
            (ValidationError::AddressInvalid, _) => "Invalid address".to_string(),
            (ValidationError::DatesInverted, _) => {
                "Vesting cannot end before it has started".to_string()
            }
            (ValidationError::AmountNegative, _) => {
                "The vesting amount cannot be negative".to_string()
            }
            (ValidationError::AmountExceedsAvailable, _) => {
                "Vesting contract does not have enough tokens available".to_string()
            }
            (ValidationError::AmountTooPrecise { decimals }, _) => {
                format!("The token supports at most {decimals} decimal places")
            }
            (ValidationError::AmountTooLarge, _) => {
                "The amount is too large for this token".to_string()
            }
        }
    }
}

/// All validation errors of a form, at most one per field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors(BTreeMap<ScheduleField, ValidationError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error for a field. The first error recorded for a field wins.
    pub fn insert(&mut self, field: ScheduleField, error: ValidationError) {
        self.0.entry(field).or_insert(error);
    }

    pub fn get(&self, field: ScheduleField) -> Option<&ValidationError> {
        self.0.get(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ScheduleField, &ValidationError)> {
        self.0.iter()
    }

    /// User-visible messages keyed by field
    pub fn messages(&self) -> BTreeMap<ScheduleField, String> {
        self.0
            .iter()
            .map(|(field, error)| (*field, error.message_for(*field)))
            .collect()
    }

    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, error)| format!("{field}: {}", error.message_for(*field)))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl std::error::Error for FieldErrors {}

/// Error code as reported by a signing provider. Injected wallets use numeric
/// EIP-1193 codes while library wrappers use string codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderErrorCode {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorCode::Numeric(code) => write!(f, "{code}"),
            ProviderErrorCode::Text(code) => write!(f, "{code}"),
        }
    }
}

/// EIP-1193 "User Rejected Request"
pub const USER_REJECTED_CODE: i64 = 4001;
/// Library-level code for a declined signature request
pub const ACTION_REJECTED_CODE: &str = "ACTION_REJECTED";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderErrorData {
    #[serde(default)]
    pub message: Option<String>,
}

/// Heterogeneous error surfaced by the signing or confirmation provider.
///
/// Providers disagree on where the human readable text lives, so every known
/// location is kept and `display_message` picks the first non-empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderError {
    #[serde(default)]
    pub code: Option<ProviderErrorCode>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<ProviderErrorData>,
    #[serde(default)]
    pub error: Option<Box<ProviderError>>,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: ProviderErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    #[must_use]
    pub fn with_data_message(mut self, message: impl Into<String>) -> Self {
        self.data = Some(ProviderErrorData {
            message: Some(message.into()),
        });
        self
    }

    #[must_use]
    pub fn with_inner(mut self, inner: ProviderError) -> Self {
        self.error = Some(Box::new(inner));
        self
    }

    /// Parses a raw JSON error payload as returned by a wallet provider
    pub fn from_json(raw: &str) -> Result<Self, SdkError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// True when the signer declined the request on the user's behalf
    pub fn is_user_rejection(&self) -> bool {
        match &self.code {
            Some(ProviderErrorCode::Numeric(code)) => *code == USER_REJECTED_CODE,
            Some(ProviderErrorCode::Text(code)) => code == ACTION_REJECTED_CODE,
            None => false,
        }
    }

    /// Best-effort human readable message: provider data, then the wrapped
    /// error, then the top-level message.
    pub fn display_message(&self) -> Option<String> {
        let candidates = [
            self.data.as_ref().and_then(|d| d.message.as_deref()),
            self.error.as_ref().and_then(|e| e.message.as_deref()),
            self.message.as_deref(),
        ];
        candidates
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|m| !m.is_empty())
            .map(ToString::to_string)
    }

    pub fn classify(self) -> SubmissionFailure {
        if self.is_user_rejection() {
            SubmissionFailure::UserCancellation
        } else {
            SubmissionFailure::ProviderFailure(self)
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, self.display_message()) {
            (Some(code), Some(message)) => write!(f, "{message} (code {code})"),
            (Some(code), None) => write!(f, "provider error code {code}"),
            (None, Some(message)) => write!(f, "{message}"),
            (None, None) => write!(f, "unknown provider error"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Provider errors normalized into the two outcomes the workflow cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionFailure {
    /// The user declined to sign. Not an error.
    UserCancellation,
    ProviderFailure(ProviderError),
}
