use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use common_money::{parse_amount, positive_minor_units, MoneyError};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use validator::ValidateEmail;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethodKind {
    Pse,
    Nequi,
    Daviplata,
    Cash,
    Card,
}

impl PaymentMethodKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PSE" => Some(PaymentMethodKind::Pse),
            "NEQUI" => Some(PaymentMethodKind::Nequi),
            "DAVIPLATA" => Some(PaymentMethodKind::Daviplata),
            "CASH" => Some(PaymentMethodKind::Cash),
            "CARD" => Some(PaymentMethodKind::Card),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodKind::Pse => "PSE",
            PaymentMethodKind::Nequi => "NEQUI",
            PaymentMethodKind::Daviplata => "DAVIPLATA",
            PaymentMethodKind::Cash => "CASH",
            PaymentMethodKind::Card => "CARD",
        }
    }
}

/// Amount as the buyer's front end sent it: a JSON number or a decimal string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(serde_json::Number),
    Text(String),
}

impl RawAmount {
    /// Exact decimal reading of the value. Numbers go through their shortest
    /// textual form so `100.005` stays `100.005` rather than the nearest f64.
    /// Oversized digit counts and exponents are rejected before any arithmetic.
    pub fn to_decimal(&self) -> Result<BigDecimal, MoneyError> {
        match self {
            RawAmount::Number(n) => parse_amount(&n.to_string()),
            RawAmount::Text(s) => parse_amount(s),
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, RawAmount::Text(s) if s.trim().is_empty())
    }
}

/// Checkout request as submitted by the buyer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub amount: Option<RawAmount>,
    pub currency: Option<String>,
    pub customer_email: Option<String>,
    pub payment_method: Option<String>,
    pub phone: Option<String>,
    pub product_name: Option<String>,
    pub reference: Option<String>,
    pub user_type: Option<u8>,
    pub user_legal_id: Option<String>,
    pub user_legal_id_type: Option<String>,
}

/// Payment-method block of the gateway payload. Each variant carries exactly
/// the fields the gateway needs for that method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    Pse {
        user_type: u8,
        user_legal_id: String,
        user_legal_id_type: String,
    },
    Nequi {
        phone_number: String,
    },
    Daviplata,
    Cash,
    Card,
}

impl PaymentMethod {
    pub fn kind(&self) -> PaymentMethodKind {
        match self {
            PaymentMethod::Pse { .. } => PaymentMethodKind::Pse,
            PaymentMethod::Nequi { .. } => PaymentMethodKind::Nequi,
            PaymentMethod::Daviplata => PaymentMethodKind::Daviplata,
            PaymentMethod::Cash => PaymentMethodKind::Cash,
            PaymentMethod::Card => PaymentMethodKind::Card,
        }
    }
}

/// A request that passed validation; every field the gateway requires is present.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedTransaction {
    pub amount_in_cents: i64,
    pub currency: Option<String>,
    pub customer_email: String,
    pub payment_method: PaymentMethod,
    pub product_name: Option<String>,
    pub reference: Option<String>,
}

const DEFAULT_LEGAL_ID_TYPE: &str = "CC";

impl TransactionRequest {
    pub fn validate(self) -> Result<ValidatedTransaction, ValidationError> {
        let amount = self.amount.filter(|raw| !raw.is_blank());
        let customer_email = non_blank(self.customer_email);
        let method = non_blank(self.payment_method);

        let decimal = match &amount {
            Some(raw) => Some(
                raw.to_decimal()
                    .map_err(|_| ValidationError::InvalidAmount(describe(raw)))?,
            ),
            None => None,
        };
        // zero is treated like an absent amount
        let decimal = decimal.filter(|d| *d != BigDecimal::from(0));

        let mut missing = Vec::new();
        if decimal.is_none() {
            missing.push("amount");
        }
        if customer_email.is_none() {
            missing.push("customerEmail");
        }
        if method.is_none() {
            missing.push("paymentMethod");
        }
        let (Some(decimal), Some(customer_email), Some(method)) = (decimal, customer_email, method)
        else {
            return Err(ValidationError::MissingRequiredFields(missing));
        };

        let amount_in_cents = positive_minor_units(&decimal).map_err(|err| match err {
            MoneyError::Overflow(value) => ValidationError::InvalidAmount(value),
            _ => ValidationError::InvalidAmount(decimal.to_string()),
        })?;

        if !customer_email.validate_email() {
            return Err(ValidationError::InvalidEmail);
        }

        let kind = PaymentMethodKind::parse(&method)
            .ok_or_else(|| ValidationError::UnsupportedPaymentMethod(method.clone()))?;
        let payment_method = match kind {
            PaymentMethodKind::Nequi => PaymentMethod::Nequi {
                phone_number: non_blank(self.phone).ok_or(ValidationError::MissingPhone)?,
            },
            PaymentMethodKind::Pse => PaymentMethod::Pse {
                user_type: self.user_type.unwrap_or(0),
                user_legal_id: non_blank(self.user_legal_id).ok_or(ValidationError::MissingLegalId)?,
                user_legal_id_type: non_blank(self.user_legal_id_type)
                    .map(|t| t.to_ascii_uppercase())
                    .unwrap_or_else(|| DEFAULT_LEGAL_ID_TYPE.to_string()),
            },
            PaymentMethodKind::Daviplata => PaymentMethod::Daviplata,
            PaymentMethodKind::Cash => PaymentMethod::Cash,
            PaymentMethodKind::Card => PaymentMethod::Card,
        };

        Ok(ValidatedTransaction {
            amount_in_cents,
            currency: non_blank(self.currency).map(|c| c.to_ascii_uppercase()),
            customer_email,
            payment_method,
            product_name: non_blank(self.product_name),
            reference: non_blank(self.reference),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionMetadata {
    #[serde(rename = "productName")]
    pub product_name: String,
}

/// Body of `POST /transactions` on the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayTransactionPayload {
    pub amount_in_cents: i64,
    pub currency: String,
    pub customer_email: String,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceptance_token: Option<String>,
    pub redirect_url: String,
    pub payment_method: PaymentMethod,
    pub metadata: TransactionMetadata,
}

/// `PREFIX_<unix millis>`; only used when the caller supplied no reference.
pub fn generate_reference(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}", prefix, now.timestamp_millis())
}

/// Status string reported by the gateway. Values outside the documented set
/// are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    Pending,
    Approved,
    Declined,
    Voided,
    Error,
    Other(String),
}

impl TransactionStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => TransactionStatus::Pending,
            "APPROVED" => TransactionStatus::Approved,
            "DECLINED" => TransactionStatus::Declined,
            "VOIDED" => TransactionStatus::Voided,
            "ERROR" => TransactionStatus::Error,
            _ => TransactionStatus::Other(value.trim().to_string()),
        }
    }

    /// APPROVED, DECLINED, VOIDED and ERROR never change again on the gateway.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Approved
                | TransactionStatus::Declined
                | TransactionStatus::Voided
                | TransactionStatus::Error
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Approved => "APPROVED",
            TransactionStatus::Declined => "DECLINED",
            TransactionStatus::Voided => "VOIDED",
            TransactionStatus::Error => "ERROR",
            TransactionStatus::Other(raw) => raw,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TransactionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Normalized record handed to the status store once a webhook is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChangeEvent {
    pub transaction_id: String,
    pub reference: String,
    pub status: TransactionStatus,
    pub received_at: DateTime<Utc>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

const DESCRIBE_LIMIT: usize = 32;

fn describe(raw: &RawAmount) -> String {
    let text = match raw {
        RawAmount::Number(n) => n.to_string(),
        RawAmount::Text(s) => s.trim().to_string(),
    };
    if text.chars().count() <= DESCRIBE_LIMIT {
        return text;
    }
    let head: String = text.chars().take(DESCRIBE_LIMIT).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> TransactionRequest {
        serde_json::from_value(value).expect("request json")
    }

    #[test]
    fn card_request_validates() {
        let validated = request(json!({
            "amount": 50000,
            "customerEmail": "a@b.com",
            "paymentMethod": "CARD"
        }))
        .validate()
        .unwrap();
        assert_eq!(validated.amount_in_cents, 5_000_000);
        assert_eq!(validated.payment_method, PaymentMethod::Card);
        assert_eq!(validated.currency, None);
        assert_eq!(validated.reference, None);
    }

    #[test]
    fn midpoint_amount_rounds_half_up() {
        for (amount, cents) in [(json!(100.005), 10_001), (json!("100.005"), 10_001), (json!(149.9), 14_990)] {
            let validated = request(json!({
                "amount": amount,
                "customerEmail": "a@b.com",
                "paymentMethod": "CASH"
            }))
            .validate()
            .unwrap();
            assert_eq!(validated.amount_in_cents, cents);
        }
    }

    #[test]
    fn missing_fields_are_listed() {
        let err = request(json!({ "amount": 0, "customerEmail": " " })).validate().unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingRequiredFields(vec!["amount", "customerEmail", "paymentMethod"])
        );
    }

    #[test]
    fn bad_amounts_are_invalid() {
        for amount in [json!(-10), json!("abc"), json!("0.001")] {
            let err = request(json!({
                "amount": amount,
                "customerEmail": "a@b.com",
                "paymentMethod": "CARD"
            }))
            .validate()
            .unwrap_err();
            assert!(matches!(err, ValidationError::InvalidAmount(_)), "{err:?}");
        }
    }

    #[test]
    fn oversized_amounts_are_rejected_quickly() {
        let started = std::time::Instant::now();
        for amount in [json!("1e20000000"), json!("-1e20000000"), json!("1E-20000000"), json!(1e300)] {
            let err = request(json!({
                "amount": amount,
                "customerEmail": "a@b.com",
                "paymentMethod": "CARD"
            }))
            .validate()
            .unwrap_err();
            assert!(matches!(err, ValidationError::InvalidAmount(_)), "{err:?}");
        }
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }

    #[test]
    fn long_amount_text_is_truncated_in_the_error() {
        let long = "1".repeat(5000);
        let err = request(json!({ "amount": long, "customerEmail": "a@b.com", "paymentMethod": "CARD" }))
            .validate()
            .unwrap_err();
        match err {
            ValidationError::InvalidAmount(shown) => assert!(shown.len() < 40, "{shown}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn invalid_email_and_method() {
        let err = request(json!({ "amount": 10, "customerEmail": "nope", "paymentMethod": "CARD" }))
            .validate()
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidEmail);

        let err = request(json!({ "amount": 10, "customerEmail": "a@b.com", "paymentMethod": "BITCOIN" }))
            .validate()
            .unwrap_err();
        assert_eq!(err, ValidationError::UnsupportedPaymentMethod("BITCOIN".into()));
    }

    #[test]
    fn nequi_requires_phone_and_keeps_it_exactly() {
        let err = request(json!({ "amount": 10, "customerEmail": "a@b.com", "paymentMethod": "NEQUI" }))
            .validate()
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingPhone);

        let validated = request(json!({
            "amount": 10,
            "customerEmail": "a@b.com",
            "paymentMethod": "nequi",
            "phone": "3991111111"
        }))
        .validate()
        .unwrap();
        assert_eq!(
            validated.payment_method,
            PaymentMethod::Nequi { phone_number: "3991111111".into() }
        );
    }

    #[test]
    fn pse_requires_legal_id_and_defaults_the_rest() {
        let err = request(json!({ "amount": 10, "customerEmail": "a@b.com", "paymentMethod": "PSE" }))
            .validate()
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingLegalId);

        let validated = request(json!({
            "amount": 10,
            "customerEmail": "a@b.com",
            "paymentMethod": "PSE",
            "userLegalId": "1099888777"
        }))
        .validate()
        .unwrap();
        assert_eq!(
            validated.payment_method,
            PaymentMethod::Pse {
                user_type: 0,
                user_legal_id: "1099888777".into(),
                user_legal_id_type: "CC".into()
            }
        );
    }

    #[test]
    fn payment_method_wire_shape() {
        assert_eq!(serde_json::to_value(PaymentMethod::Card).unwrap(), json!({ "type": "CARD" }));
        assert_eq!(
            serde_json::to_value(PaymentMethod::Nequi { phone_number: "3001234567".into() }).unwrap(),
            json!({ "type": "NEQUI", "phone_number": "3001234567" })
        );
        assert_eq!(
            serde_json::to_value(PaymentMethod::Pse {
                user_type: 1,
                user_legal_id: "900123".into(),
                user_legal_id_type: "NIT".into()
            })
            .unwrap(),
            json!({ "type": "PSE", "user_type": 1, "user_legal_id": "900123", "user_legal_id_type": "NIT" })
        );
    }

    #[test]
    fn generated_reference_uses_prefix_and_millis() {
        let now = DateTime::parse_from_rfc3339("2024-01-02T03:04:05.678Z").unwrap().with_timezone(&Utc);
        assert_eq!(generate_reference("NODA", now), "NODA_1704164645678");
    }

    #[test]
    fn status_parsing_preserves_unknown_values() {
        assert_eq!(TransactionStatus::parse("approved"), TransactionStatus::Approved);
        assert_eq!(TransactionStatus::parse("REFUNDED"), TransactionStatus::Other("REFUNDED".into()));
        assert_eq!(serde_json::to_value(TransactionStatus::Declined).unwrap(), json!("DECLINED"));
    }

    #[test]
    fn only_settled_statuses_are_final() {
        assert!(TransactionStatus::Approved.is_final());
        assert!(TransactionStatus::Voided.is_final());
        assert!(!TransactionStatus::Pending.is_final());
        assert!(!TransactionStatus::Other("REFUNDED".into()).is_final());
    }
}
