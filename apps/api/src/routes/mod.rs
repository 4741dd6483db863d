//! HTTP routes + handlers, one file per area.
//!
//! Request and response bodies use the pharmacy's wire names
//! (`nama_item`, `stok_tersedia`, `jumlah`, ...). Money leaves the server in
//! major units and arrives as decimal text or a JSON number, parsed exactly.

pub mod auth;
pub mod health;
pub mod inventory;
pub mod transactions;

use apotek_core::{Money, ValidationError};
use serde::Deserialize;
use serde_json::Number;

/// A decimal amount as sent by clients: `100`, `12.5` or `"12.50"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DecimalInput {
    Number(Number),
    Text(String),
}

impl DecimalInput {
    /// Parses into [`Money`], reporting errors against `field`.
    pub fn to_money(&self, field: &str) -> Result<Money, ValidationError> {
        let text = match self {
            DecimalInput::Number(n) => n.to_string(),
            DecimalInput::Text(s) => s.clone(),
        };
        Money::from_decimal_str(&text).map_err(|err| match err {
            ValidationError::InvalidFormat { reason, .. } => ValidationError::InvalidFormat {
                field: field.to_string(),
                reason,
            },
            other => other,
        })
    }
}

/// Unwraps a required request field.
pub(crate) fn required<T>(value: Option<T>, field: &str) -> Result<T, ValidationError> {
    value.ok_or_else(|| ValidationError::Required {
        field: field.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_input_forms() {
        let parse = |raw: &str| -> Result<Money, ValidationError> {
            serde_json::from_str::<DecimalInput>(raw)
                .unwrap()
                .to_money("harga")
        };

        assert_eq!(parse("100").unwrap(), Money::from_cents(10_000));
        assert_eq!(parse("12.5").unwrap(), Money::from_cents(1_250));
        assert_eq!(parse("\"12.50\"").unwrap(), Money::from_cents(1_250));

        let err = parse("\"1.999\"").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFormat { ref field, .. } if field == "harga"));
    }
}
