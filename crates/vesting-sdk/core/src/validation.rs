use std::sync::Arc;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    address::{Address, is_address, parse_address},
    amount::{AmountChangeListener, InputChangeEvent},
    error::{FieldErrors, ScheduleField, SdkError, ValidationError},
    format::to_base_units,
    models::VestingScheduleDraft,
};

const DATETIME_LOCAL_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Valid account-address syntax for the EVM chain family
pub fn address_validity(beneficiary: &str) -> bool {
    is_address(beneficiary)
}

pub fn date_ordering(start: i64, end: i64) -> bool {
    end > start
}

pub fn non_negative_amount(amount: Decimal) -> bool {
    !amount.is_sign_negative() || amount.is_zero()
}

/// Fails open: an unknown balance never blocks a submission
pub fn balance_sufficiency(amount: Decimal, available_amount: Option<Decimal>) -> bool {
    available_amount.is_none_or(|available| amount <= available)
}

/// Parses the value of a `datetime-local` input into unix seconds, UTC
pub fn parse_datetime_local(value: &str) -> Result<i64, SdkError> {
    let value = value.trim();
    let mut last_error = None;
    for format in DATETIME_LOCAL_FORMATS {
        match NaiveDateTime::parse_from_str(value, format) {
            Ok(parsed) => return Ok(parsed.and_utc().timestamp()),
            Err(e) => last_error = Some(e),
        }
    }
    match last_error {
        Some(e) => Err(e.into()),
        None => Err(SdkError::InvalidInput(format!("invalid date: {value}"))),
    }
}

/// Context supplied from outside the form at submit time
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationContext {
    pub token_address: Address,
    pub token_decimals: u32,
    /// Tokens the contract can still allocate, `None` when unknown
    pub available_amount: Option<Decimal>,
}

/// Form field that receives the amount through change notifications
pub struct RegisteredAmount {
    name: String,
    value: watch::Sender<Option<Decimal>>,
}

impl RegisteredAmount {
    fn new(name: &str) -> Self {
        let (value, _) = watch::channel(None);
        Self {
            name: name.to_string(),
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn get(&self) -> Option<Decimal> {
        *self.value.borrow()
    }

    fn clear(&self) {
        self.value.send_replace(None);
    }
}

impl AmountChangeListener for RegisteredAmount {
    fn on_change(&self, event: InputChangeEvent) {
        if event.target.name != self.name {
            warn!("Ignoring change for unknown field {}", event.target.name);
            return;
        }
        self.value.send_replace(Some(event.target.value));
    }
}

/// Raw values of the add-schedule form, as entered by the user
pub struct ScheduleForm {
    pub beneficiary: String,
    pub start: String,
    pub end: String,
    amount: Arc<RegisteredAmount>,
}

impl Default for ScheduleForm {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleForm {
    pub const AMOUNT_FIELD: &'static str = "amount";

    pub fn new() -> Self {
        Self {
            beneficiary: String::new(),
            start: String::new(),
            end: String::new(),
            amount: Arc::new(RegisteredAmount::new(Self::AMOUNT_FIELD)),
        }
    }

    /// Listener to hand to the amount input so the form learns its value
    pub fn amount_listener(&self) -> Arc<dyn AmountChangeListener> {
        self.amount.clone()
    }

    pub fn amount(&self) -> Option<Decimal> {
        self.amount.get()
    }

    pub fn reset(&mut self) {
        self.beneficiary.clear();
        self.start.clear();
        self.end.clear();
        self.amount.clear();
    }

    /// Runs every check and reports all failing fields at once
    pub fn validate(&self, ctx: &ValidationContext) -> Result<VestingScheduleDraft, FieldErrors> {
        let mut errors = FieldErrors::new();

        let beneficiary = if self.beneficiary.trim().is_empty() {
            errors.insert(ScheduleField::Beneficiary, ValidationError::FieldRequired);
            None
        } else {
            parse_address(&self.beneficiary)
                .inspect_err(|e| errors.insert(ScheduleField::Beneficiary, e.clone()))
                .ok()
        };

        let start = required_time(&self.start, ScheduleField::Start, &mut errors);
        let end = required_time(&self.end, ScheduleField::End, &mut errors);
        if let (Some(start), Some(end)) = (start, end)
            && !date_ordering(start, end)
        {
            errors.insert(ScheduleField::End, ValidationError::DatesInverted);
        }

        let amount = self.amount();
        match amount {
            None => errors.insert(ScheduleField::Amount, ValidationError::FieldRequired),
            Some(amount) => {
                if !non_negative_amount(amount) {
                    errors.insert(ScheduleField::Amount, ValidationError::AmountNegative);
                }
                if !balance_sufficiency(amount, ctx.available_amount) {
                    errors.insert(ScheduleField::Amount, ValidationError::AmountExceedsAvailable);
                }
                if let Err(e) = to_base_units(amount, ctx.token_decimals) {
                    errors.insert(ScheduleField::Amount, e);
                }
            }
        }

        if !errors.is_empty() {
            debug!("Schedule form invalid: {errors}");
            return Err(errors);
        }

        match (beneficiary, start, end, amount) {
            (Some(beneficiary), Some(start_time), Some(end_time), Some(amount)) => {
                Ok(VestingScheduleDraft {
                    beneficiary,
                    start_time,
                    end_time,
                    amount,
                    token_address: ctx.token_address.clone(),
                })
            }
            _ => Err(errors),
        }
    }
}

/// A `datetime-local` input yields an empty value for anything it cannot
/// parse, so unparseable text counts as missing.
fn required_time(value: &str, field: ScheduleField, errors: &mut FieldErrors) -> Option<i64> {
    if value.trim().is_empty() {
        errors.insert(field, ValidationError::FieldRequired);
        return None;
    }
    match parse_datetime_local(value) {
        Ok(time) => Some(time),
        Err(e) => {
            debug!("Unparseable {field} date {value}: {e}");
            errors.insert(field, ValidationError::FieldRequired);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    const BENEFICIARY: &str = "0xde0B295669a9FD93d5F28D9Ec85E40f4cb697BAe";
    const TOKEN: &str = "0x8ba1f109551bd432803012645ac136ddd64dba72";

    fn context(available_amount: Option<Decimal>) -> ValidationContext {
        ValidationContext {
            token_address: parse_address(TOKEN).unwrap(),
            token_decimals: 18,
            available_amount,
        }
    }

    fn filled_form(amount: Decimal) -> ScheduleForm {
        let mut form = ScheduleForm::new();
        form.beneficiary = BENEFICIARY.to_string();
        form.start = "2024-01-01T00:00".to_string();
        form.end = "2025-01-01T00:00".to_string();
        form.amount_listener()
            .on_change(InputChangeEvent::change(ScheduleForm::AMOUNT_FIELD, amount));
        form
    }

    #[test]
    fn test_date_ordering() {
        let start = parse_datetime_local("2024-01-01T00:00").unwrap();
        let same = parse_datetime_local("2024-01-01T00:00").unwrap();
        let next_day = parse_datetime_local("2024-01-02T00:00").unwrap();

        assert_eq!(start, 1_704_067_200);
        assert!(!date_ordering(start, same));
        assert!(date_ordering(start, next_day));
        assert!(!date_ordering(next_day, start));
    }

    #[test]
    fn test_parse_datetime_local_with_seconds() {
        assert_eq!(
            parse_datetime_local("2024-01-01T00:00:30").unwrap(),
            1_704_067_230
        );
        assert!(parse_datetime_local("01/01/2024").is_err());
    }

    #[test]
    fn test_balance_sufficiency() {
        assert!(!balance_sufficiency(dec!(100), Some(dec!(50))));
        assert!(balance_sufficiency(dec!(50), Some(dec!(100))));
        assert!(balance_sufficiency(dec!(100), Some(dec!(100))));
        assert!(balance_sufficiency(dec!(1000000), None));
    }

    #[test]
    fn test_non_negative_amount() {
        assert!(non_negative_amount(dec!(0)));
        assert!(non_negative_amount(dec!(-0)));
        assert!(non_negative_amount(dec!(1)));
        assert!(!non_negative_amount(dec!(-0.01)));
    }

    #[test]
    fn test_valid_form_produces_draft() {
        let form = filled_form(dec!(10));
        let draft = form.validate(&context(Some(dec!(10)))).unwrap();

        assert_eq!(draft.beneficiary.as_str(), BENEFICIARY);
        assert_eq!(draft.start_time, 1_704_067_200);
        assert_eq!(draft.end_time, 1_735_689_600);
        assert_eq!(draft.amount, dec!(10));
        assert_eq!(draft.token_address, parse_address(TOKEN).unwrap());
    }

    #[test]
    fn test_all_violations_reported_together() {
        let mut form = filled_form(dec!(-5));
        form.beneficiary = "not-an-address".to_string();
        form.end = "2023-06-01T00:00".to_string();

        let errors = form.validate(&context(Some(dec!(100)))).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(
            errors.get(ScheduleField::Beneficiary),
            Some(&ValidationError::AddressInvalid)
        );
        assert_eq!(
            errors.get(ScheduleField::End),
            Some(&ValidationError::DatesInverted)
        );
        assert_eq!(
            errors.get(ScheduleField::Amount),
            Some(&ValidationError::AmountNegative)
        );
        assert_eq!(errors.get(ScheduleField::Start), None);
    }

    #[test]
    fn test_empty_form_requires_every_field() {
        let form = ScheduleForm::new();
        let errors = form.validate(&context(None)).unwrap_err();
        assert_eq!(errors.len(), 4);
        for (_, error) in errors.iter() {
            assert_eq!(error, &ValidationError::FieldRequired);
        }
    }

    #[test]
    fn test_amount_exceeding_balance() {
        let form = filled_form(dec!(100));
        let errors = form.validate(&context(Some(dec!(50)))).unwrap_err();
        assert_eq!(
            errors.get(ScheduleField::Amount),
            Some(&ValidationError::AmountExceedsAvailable)
        );

        assert!(form.validate(&context(None)).is_ok());
    }

    #[test]
    fn test_amount_change_for_other_field_is_ignored() {
        let form = ScheduleForm::new();
        form.amount_listener()
            .on_change(InputChangeEvent::change("price", dec!(3)));
        assert_eq!(form.amount(), None);
    }

    #[test]
    fn test_reset_clears_values() {
        let mut form = filled_form(dec!(1));
        form.reset();
        assert!(form.beneficiary.is_empty());
        assert_eq!(form.amount(), None);
    }
}
