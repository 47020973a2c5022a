use std::{fmt, str::FromStr, sync::Arc};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::format::{FormatOptions, format_amount, format_currency, round_amount};

/// Snapshot of a dual-currency amount field.
///
/// When a price is known `fiat_amount == token_amount * token_price` up to the
/// configured rounding precision. `is_fiat_input` selects which of the two the
/// user is currently typing in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountState {
    pub raw_input: String,
    pub token_amount: Decimal,
    pub fiat_amount: Decimal,
    pub is_fiat_input: bool,
    pub token_price: Option<Decimal>,
    pub token_symbol: String,
    /// Decimals of the token, when known
    #[serde(default)]
    pub token_decimals: Option<u32>,
}

impl AmountState {
    pub fn new(token_symbol: impl Into<String>, token_price: Option<Decimal>) -> Self {
        Self {
            raw_input: "0".to_string(),
            token_amount: Decimal::ZERO,
            fiat_amount: Decimal::ZERO,
            is_fiat_input: false,
            token_price: usable_price(token_price),
            token_symbol: token_symbol.into(),
            token_decimals: None,
        }
    }

    pub fn can_convert(&self) -> bool {
        self.token_price.is_some()
    }
}

/// Actions accepted by the amount reducer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountAction {
    SetRawInput(String),
    ToggleDirection,
    Reset {
        token_symbol: String,
        token_price: Option<Decimal>,
        token_decimals: Option<u32>,
    },
}

/// Result of applying an action: the next state and, when the token amount
/// was recomputed, the value to announce to the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduced {
    pub state: AmountState,
    pub recomputed: Option<Decimal>,
}

/// A zero price cannot convert anything, so it counts as no price at all.
fn usable_price(price: Option<Decimal>) -> Option<Decimal> {
    price.filter(|p| p.is_sign_positive() && !p.is_zero())
}

/// Parses user input, coercing anything non-numeric to zero
pub fn parse_raw_amount(raw: &str) -> Decimal {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Decimal::ZERO;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .unwrap_or(Decimal::ZERO)
}

/// Fraction digits a converted token amount is rounded to. A token with fewer
/// decimals than the display precision caps it.
fn token_precision(state: &AmountState, precision: u32) -> u32 {
    state
        .token_decimals
        .map_or(precision, |decimals| decimals.min(precision))
}

/// Recomputes both amounts from the raw input. Returns `None` when the
/// conversion does not fit a `Decimal`.
fn recompute(mut state: AmountState, precision: u32) -> Option<AmountState> {
    let value = parse_raw_amount(&state.raw_input);
    match (state.is_fiat_input, state.token_price) {
        (true, Some(price)) => {
            let token_precision = token_precision(&state, precision);
            state.token_amount = round_amount(value.checked_div(price)?, token_precision);
            state.fiat_amount = round_amount(value, precision);
        }
        (_, price) => {
            state.is_fiat_input = false;
            state.token_amount = round_amount(value, precision);
            state.fiat_amount = match price {
                Some(price) => round_amount(value.checked_mul(price)?, precision),
                None => Decimal::ZERO,
            };
        }
    }
    Some(state)
}

/// Applies a recomputation, keeping `previous` untouched when the input
/// cannot be converted.
fn recomputed_or_rejected(previous: AmountState, next: AmountState, precision: u32) -> Reduced {
    let raw_input = next.raw_input.clone();
    match recompute(next, precision) {
        Some(state) => {
            let recomputed = Some(state.token_amount);
            Reduced { state, recomputed }
        }
        None => {
            warn!("Rejected amount input {raw_input}: conversion overflows");
            Reduced {
                state: previous,
                recomputed: None,
            }
        }
    }
}

/// Pure transition function of the amount field
pub fn reduce(state: AmountState, action: AmountAction, precision: u32) -> Reduced {
    match action {
        AmountAction::SetRawInput(raw) => {
            let next = AmountState {
                raw_input: raw,
                ..state.clone()
            };
            recomputed_or_rejected(state, next, precision)
        }
        AmountAction::ToggleDirection => {
            if !state.can_convert() {
                return Reduced {
                    state,
                    recomputed: None,
                };
            }
            let other = if state.is_fiat_input {
                state.token_amount
            } else {
                state.fiat_amount
            };
            let next = AmountState {
                raw_input: format_amount(
                    other,
                    FormatOptions {
                        commify: false,
                        max_fraction_digits: precision,
                    },
                ),
                is_fiat_input: !state.is_fiat_input,
                ..state.clone()
            };
            recomputed_or_rejected(state, next, precision)
        }
        AmountAction::Reset {
            token_symbol,
            token_price,
            token_decimals,
        } => {
            let token_price = usable_price(token_price);
            let next = AmountState {
                is_fiat_input: state.is_fiat_input && token_price.is_some(),
                token_decimals,
                ..AmountState::new(token_symbol, token_price)
            };
            // Only a change of the token amount is announced
            let recomputed = (state.token_amount != Decimal::ZERO).then_some(Decimal::ZERO);
            Reduced {
                state: next,
                recomputed,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeEventType {
    Change,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeTarget {
    pub value: Decimal,
    pub name: String,
}

/// Payload shaped like a standard input change so that generic form
/// plumbing can consume it. `value` is always in token units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputChangeEvent {
    pub target: ChangeTarget,
    #[serde(rename = "type")]
    pub event_type: ChangeEventType,
}

impl InputChangeEvent {
    pub fn change(name: impl Into<String>, value: Decimal) -> Self {
        Self {
            target: ChangeTarget {
                value,
                name: name.into(),
            },
            event_type: ChangeEventType::Change,
        }
    }
}

impl fmt::Display for InputChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "change {}={}", self.target.name, self.target.value)
    }
}

/// Receives the canonical token amount whenever it is recomputed
pub trait AmountChangeListener: Send + Sync {
    fn on_change(&self, event: InputChangeEvent);
}

/// A token amount field that can be typed in either the token or the fiat
/// currency. The owning form only learns the amount through its listener.
pub struct AmountConversionModel {
    name: String,
    fiat_symbol: String,
    precision: u32,
    state: AmountState,
    listener: Arc<dyn AmountChangeListener>,
}

impl AmountConversionModel {
    pub fn new(
        name: impl Into<String>,
        fiat_symbol: impl Into<String>,
        precision: u32,
        listener: Arc<dyn AmountChangeListener>,
    ) -> Self {
        Self {
            name: name.into(),
            fiat_symbol: fiat_symbol.into(),
            precision,
            state: AmountState::new(String::new(), None),
            listener,
        }
    }

    pub fn state(&self) -> &AmountState {
        &self.state
    }

    pub fn set_raw_input(&mut self, raw: impl Into<String>) {
        self.dispatch(AmountAction::SetRawInput(raw.into()));
    }

    /// Switches the input between token and fiat. Does nothing without a price.
    pub fn toggle_direction(&mut self) {
        self.dispatch(AmountAction::ToggleDirection);
    }

    /// Must be called whenever the underlying token or its price changes
    pub fn reset(
        &mut self,
        token_symbol: impl Into<String>,
        token_price: Option<Decimal>,
        token_decimals: Option<u32>,
    ) {
        self.dispatch(AmountAction::Reset {
            token_symbol: token_symbol.into(),
            token_price,
            token_decimals,
        });
    }

    fn dispatch(&mut self, action: AmountAction) {
        let state = std::mem::replace(&mut self.state, AmountState::new(String::new(), None));
        let Reduced { state, recomputed } = reduce(state, action, self.precision);
        self.state = state;
        if let Some(value) = recomputed {
            debug!(
                "Amount field {} recomputed: {} {}",
                self.name, value, self.state.token_symbol
            );
            self.listener
                .on_change(InputChangeEvent::change(self.name.clone(), value));
        }
    }

    /// Symbol labelling the input box
    pub fn input_symbol(&self) -> &str {
        if self.state.is_fiat_input {
            &self.fiat_symbol
        } else {
            &self.state.token_symbol
        }
    }

    pub fn other_symbol(&self) -> &str {
        if self.state.is_fiat_input {
            &self.state.token_symbol
        } else {
            &self.fiat_symbol
        }
    }

    pub fn other_value(&self) -> Decimal {
        if self.state.is_fiat_input {
            self.state.token_amount
        } else {
            self.state.fiat_amount
        }
    }

    /// Converted value shown beneath the input, hidden without a price
    pub fn conversion_hint(&self) -> Option<String> {
        self.state
            .can_convert()
            .then(|| format_currency(self.other_value(), self.other_symbol()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rust_decimal_macros::dec;

    use super::*;

    const PRECISION: u32 = 6;

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<InputChangeEvent>>,
    }

    impl RecordingListener {
        fn values(&self) -> Vec<Decimal> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.target.value)
                .collect()
        }
    }

    impl AmountChangeListener for RecordingListener {
        fn on_change(&self, event: InputChangeEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn model_with_price(price: Option<Decimal>) -> (AmountConversionModel, Arc<RecordingListener>) {
        let listener = Arc::new(RecordingListener::default());
        let mut model = AmountConversionModel::new("amount", "USD", PRECISION, listener.clone());
        model.reset("TKN", price, None);
        (model, listener)
    }

    #[test]
    fn test_token_input_computes_fiat() {
        let (mut model, listener) = model_with_price(Some(dec!(2)));
        model.set_raw_input("100");

        let state = model.state();
        assert_eq!(state.token_amount, dec!(100));
        assert_eq!(state.fiat_amount, dec!(200));
        assert!(!state.is_fiat_input);
        assert_eq!(listener.values(), vec![dec!(100)]);
    }

    #[test]
    fn test_toggle_reseeds_with_other_currency() {
        let (mut model, listener) = model_with_price(Some(dec!(2)));
        model.set_raw_input("100");
        model.toggle_direction();

        let state = model.state();
        assert!(state.is_fiat_input);
        assert_eq!(state.raw_input, "200");
        assert_eq!(state.token_amount, dec!(100));
        assert_eq!(state.fiat_amount, dec!(200));
        assert_eq!(model.input_symbol(), "USD");
        assert_eq!(model.conversion_hint().as_deref(), Some("100 TKN"));
        // Listener only ever sees token units
        assert_eq!(listener.values(), vec![dec!(100), dec!(100)]);
    }

    #[test]
    fn test_fiat_input_computes_token() {
        let (mut model, listener) = model_with_price(Some(dec!(4)));
        model.toggle_direction();
        model.set_raw_input("10");

        assert_eq!(model.state().token_amount, dec!(2.5));
        assert_eq!(model.state().fiat_amount, dec!(10));
        assert_eq!(listener.values().last(), Some(&dec!(2.5)));
    }

    #[test]
    fn test_double_toggle_restores_value() {
        for price in [dec!(0.3), dec!(3), dec!(7), dec!(1234.5678), dec!(0.25)] {
            let (mut model, _) = model_with_price(Some(price));
            model.set_raw_input("42.5");
            model.toggle_direction();
            model.toggle_direction();

            let state = model.state();
            assert!(!state.is_fiat_input);
            let restored = parse_raw_amount(&state.raw_input);
            let tolerance = dec!(0.001);
            assert!(
                (restored - dec!(42.5)).abs() <= tolerance,
                "price {price}: got {restored}"
            );
        }
    }

    #[test]
    fn test_fiat_matches_token_times_price() {
        for (raw, price) in [("0", dec!(5)), ("1.5", dec!(0)), ("12.25", dec!(1.1)), ("3", dec!(100))] {
            let (mut model, _) = model_with_price(Some(price));
            model.set_raw_input(raw);
            let state = model.state();
            let expected = round_amount(state.token_amount * price, PRECISION);
            assert_eq!(state.fiat_amount, expected, "raw {raw} price {price}");
        }
    }

    #[test]
    fn test_toggle_without_price_is_noop() {
        let (mut model, listener) = model_with_price(None);
        model.set_raw_input("5");
        model.toggle_direction();

        assert!(!model.state().is_fiat_input);
        assert_eq!(model.state().raw_input, "5");
        assert_eq!(model.conversion_hint(), None);
        assert_eq!(listener.values(), vec![dec!(5)]);
    }

    #[test]
    fn test_zero_price_counts_as_absent() {
        let (mut model, _) = model_with_price(Some(Decimal::ZERO));
        assert!(!model.state().can_convert());
        model.toggle_direction();
        assert!(!model.state().is_fiat_input);
    }

    #[test]
    fn test_non_numeric_input_is_zero() {
        let (mut model, listener) = model_with_price(Some(dec!(2)));
        model.set_raw_input("abc");

        assert_eq!(model.state().raw_input, "abc");
        assert_eq!(model.state().token_amount, Decimal::ZERO);
        assert_eq!(model.state().fiat_amount, Decimal::ZERO);
        assert_eq!(listener.values(), vec![Decimal::ZERO]);
        assert_eq!(parse_raw_amount("1e3"), dec!(1000));
        assert_eq!(parse_raw_amount(""), Decimal::ZERO);
    }

    #[test]
    fn test_reset_zeroes_amounts() {
        let (mut model, listener) = model_with_price(Some(dec!(2)));
        model.toggle_direction();
        model.set_raw_input("50");

        model.reset("OTHER", Some(dec!(3)), None);
        let state = model.state();
        assert_eq!(state.raw_input, "0");
        assert_eq!(state.token_amount, Decimal::ZERO);
        assert_eq!(state.fiat_amount, Decimal::ZERO);
        assert!(state.is_fiat_input);
        assert_eq!(state.token_symbol, "OTHER");
        assert_eq!(listener.values().last(), Some(&Decimal::ZERO));

        model.set_raw_input("50");
        model.reset("OTHER", None, None);
        assert!(!model.state().is_fiat_input);
        assert_eq!(model.state().token_amount, Decimal::ZERO);
    }

    #[test]
    fn test_reset_at_zero_is_silent() {
        let listener = Arc::new(RecordingListener::default());
        let mut model = AmountConversionModel::new("amount", "USD", PRECISION, listener.clone());
        model.reset("TKN", Some(dec!(1)), None);
        assert!(listener.values().is_empty());
    }

    #[test]
    fn test_change_event_shape() {
        let event = InputChangeEvent::change("amount", dec!(1.5));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"target": {"value": "1.5", "name": "amount"}, "type": "change"})
        );
    }

    #[test]
    fn test_overflowing_conversion_is_rejected() {
        let (mut model, listener) = model_with_price(Some(dec!(0.0000000001)));
        model.toggle_direction();
        model.set_raw_input("1");
        let before = model.state().clone();
        assert_eq!(before.token_amount, dec!(10000000000));

        model.set_raw_input("10000000000000000000");
        assert_eq!(model.state(), &before);
        assert_eq!(listener.values().last(), Some(&dec!(10000000000)));
    }

    #[test]
    fn test_token_input_overflowing_fiat_is_rejected() {
        let (mut model, listener) = model_with_price(Some(dec!(10000000000)));
        model.set_raw_input("10000000000000000000");
        assert_eq!(model.state().raw_input, "0");
        assert_eq!(model.state().token_amount, Decimal::ZERO);
        assert!(listener.values().is_empty());
    }

    #[test]
    fn test_fiat_conversion_respects_token_decimals() {
        let listener = Arc::new(RecordingListener::default());
        let mut model = AmountConversionModel::new("amount", "USD", PRECISION, listener.clone());
        model.reset("TKN", Some(dec!(3)), Some(2));
        model.toggle_direction();
        model.set_raw_input("10");

        assert_eq!(model.state().token_amount, dec!(3.33));
        assert_eq!(model.state().fiat_amount, dec!(10));
        assert_eq!(listener.values().last(), Some(&dec!(3.33)));

        // Decimals above the display precision keep the display precision
        model.reset("TKN", Some(dec!(3)), Some(18));
        assert!(model.state().is_fiat_input);
        model.set_raw_input("10");
        assert_eq!(model.state().token_amount, dec!(3.333333));
    }
}
