//! Payment requests and the on-chain transfer payload.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{PaymentError, Result};

/// Entry function used for every payment.
pub const TRANSFER_FUNCTION: &str = "0x1::aptos_account::transfer";

/// What the fiat side of the payment buys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentCategory {
    Bank,
    Airtime,
}

impl PaymentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bank => "bank",
            Self::Airtime => "airtime",
        }
    }
}

impl std::fmt::Display for PaymentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentCategory {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bank" => Ok(Self::Bank),
            "airtime" => Ok(Self::Airtime),
            other => Err(PaymentError::InvalidRequest(format!(
                "unknown payment type '{}'",
                other
            ))),
        }
    }
}

/// Fiat-side details forwarded verbatim to the backend.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    /// Fiat amount.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

/// A payment to execute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub category: PaymentCategory,
    pub details: PaymentDetails,
}

impl PaymentRequest {
    pub fn bank(
        amount: Decimal,
        bank_name: impl Into<String>,
        account_number: impl Into<String>,
        account_name: impl Into<String>,
    ) -> Self {
        Self {
            category: PaymentCategory::Bank,
            details: PaymentDetails {
                amount,
                bank_name: Some(bank_name.into()),
                account_number: Some(account_number.into()),
                account_name: Some(account_name.into()),
                ..PaymentDetails::default()
            },
        }
    }

    pub fn airtime(
        amount: Decimal,
        phone_number: impl Into<String>,
        network: impl Into<String>,
    ) -> Self {
        Self {
            category: PaymentCategory::Airtime,
            details: PaymentDetails {
                amount,
                phone_number: Some(phone_number.into()),
                network: Some(network.into()),
                ..PaymentDetails::default()
            },
        }
    }

    /// Check the amount and the fields the category needs.
    pub fn validate(&self) -> Result<()> {
        if self.details.amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidRequest(
                "amount must be greater than zero".into(),
            ));
        }

        let d = &self.details;
        let required: Vec<(&str, &Option<String>)> = match self.category {
            PaymentCategory::Bank => vec![
                ("bank name", &d.bank_name),
                ("account number", &d.account_number),
                ("account name", &d.account_name),
            ],
            PaymentCategory::Airtime => {
                vec![("phone number", &d.phone_number), ("network", &d.network)]
            }
        };

        for (name, value) in required {
            if value.as_deref().map(str::trim).unwrap_or_default().is_empty() {
                return Err(PaymentError::InvalidRequest(format!(
                    "{} is required for {} payments",
                    name, self.category
                )));
            }
        }
        Ok(())
    }
}

/// Aptos `entry_function_payload` JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPayload {
    #[serde(rename = "type")]
    pub payload_type: String,
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<serde_json::Value>,
}

impl TransferPayload {
    /// Transfer `units` octas to `recipient`.
    pub fn transfer(recipient: &str, units: u64) -> Self {
        Self {
            payload_type: "entry_function_payload".to_string(),
            function: TRANSFER_FUNCTION.to_string(),
            type_arguments: Vec::new(),
            arguments: vec![
                serde_json::Value::String(recipient.to_string()),
                serde_json::Value::String(units.to_string()),
            ],
        }
    }

    pub fn recipient(&self) -> Option<&str> {
        self.arguments.first().and_then(|v| v.as_str())
    }

    pub fn amount(&self) -> Option<u64> {
        self.arguments
            .get(1)
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_bank_request_validation() {
        assert!(PaymentRequest::bank(dec!(1000), "GTBank", "0123456789", "Ada Obi")
            .validate()
            .is_ok());

        let mut request = PaymentRequest::bank(dec!(1000), "GTBank", "0123456789", "Ada Obi");
        request.details.account_name = Some("  ".into());
        let err = request.validate().unwrap_err();
        assert!(err.to_string().contains("account name"));
    }

    #[test]
    fn test_airtime_request_validation() {
        assert!(PaymentRequest::airtime(dec!(500), "08031234567", "MTN")
            .validate()
            .is_ok());

        let mut request = PaymentRequest::airtime(dec!(500), "08031234567", "MTN");
        request.details.network = None;
        assert!(matches!(
            request.validate(),
            Err(PaymentError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_amount_must_be_positive() {
        let request = PaymentRequest::airtime(Decimal::ZERO, "08031234567", "MTN");
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_details_serialize_for_backend() {
        let request = PaymentRequest::airtime(dec!(1000), "08031234567", "MTN");
        let json = serde_json::to_value(&request.details).unwrap();
        assert_eq!(json["amount"], 1000.0);
        assert_eq!(json["phoneNumber"], "08031234567");
        assert!(json.get("bankName").is_none());
    }

    #[test]
    fn test_transfer_payload_shape() {
        let payload = TransferPayload::transfer("0xtreasury", 28_571_428);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "entry_function_payload");
        assert_eq!(json["function"], "0x1::aptos_account::transfer");
        assert_eq!(json["arguments"][1], "28571428");
        assert_eq!(payload.amount(), Some(28_571_428));
        assert_eq!(payload.recipient(), Some("0xtreasury"));
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("Bank".parse::<PaymentCategory>().unwrap(), PaymentCategory::Bank);
        assert!("crypto".parse::<PaymentCategory>().is_err());
    }
}
