//! pt-BR currency formatting and the masked price input.
//!
//! The price field accepts digit keystrokes only and treats the
//! trailing two digits as cents: typing `1234` yields the value
//! `12.34`, rendered as `12,34`.

/// Digits beyond this are dropped; enough for any real price and keeps
/// the cents value inside `i64`.
const MAX_PRICE_DIGITS: usize = 15;

/// Masked currency input state. Holds the raw digit string entered so
/// far; the numeric value is always `digits / 100`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceInput {
    digits: String,
}

impl PriceInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the input from a stored price, as when editing an
    /// existing record.
    pub fn from_value(value: f64) -> Self {
        let cents = (value * 100.0).round().max(0.0) as i64;
        Self {
            digits: cents.to_string(),
        }
    }

    /// Replaces the field content with `raw`, keeping only digits.
    pub fn set_text(&mut self, raw: &str) {
        self.digits = raw
            .chars()
            .filter(char::is_ascii_digit)
            .take(MAX_PRICE_DIGITS)
            .collect();
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    /// The entered price, or `None` while the field is empty.
    pub fn value(&self) -> Option<f64> {
        if self.digits.is_empty() {
            return None;
        }
        self.digits.parse::<i64>().ok().map(|cents| cents as f64 / 100.0)
    }

    /// The string rendered back into the field after every keystroke.
    pub fn display(&self) -> String {
        self.value().map(format_brl).unwrap_or_default()
    }
}

/// Formats a price the pt-BR way with exactly two fraction digits:
/// `1234.56` becomes `1.234,56`.
pub fn format_brl(value: f64) -> String {
    let cents = (value * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    format!("{sign}{grouped},{frac:02}")
}

/// The locale currency string used on product cards and in share
/// messages.
pub fn format_brl_currency(value: f64) -> String {
    format!("R$ {}", format_brl(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keystrokes_become_cents() {
        let mut price = PriceInput::new();
        price.set_text("1234");
        assert_eq!(price.value(), Some(12.34));
        assert_eq!(price.display(), "12,34");
    }

    #[test]
    fn non_digits_are_stripped() {
        let mut price = PriceInput::new();
        price.set_text("R$ 1.2a3,4");
        assert_eq!(price.value(), Some(12.34));
    }

    #[test]
    fn empty_field_has_no_value() {
        let mut price = PriceInput::new();
        assert_eq!(price.value(), None);
        assert_eq!(price.display(), "");

        price.set_text("abc");
        assert_eq!(price.value(), None);
    }

    #[test]
    fn seeding_from_a_stored_price_round_trips() {
        let price = PriceInput::from_value(59.9);
        assert_eq!(price.value(), Some(59.9));
        assert_eq!(price.display(), "59,90");
    }

    #[test]
    fn grouping_uses_dots_for_thousands() {
        assert_eq!(format_brl(1234.56), "1.234,56");
        assert_eq!(format_brl(1234567.8), "1.234.567,80");
        assert_eq!(format_brl(0.0), "0,00");
    }

    #[test]
    fn currency_form_prefixes_the_symbol() {
        assert_eq!(format_brl_currency(25.0), "R$ 25,00");
    }
}
