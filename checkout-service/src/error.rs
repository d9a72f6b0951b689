use common_http_errors::ApiError;
use thiserror::Error;
use uuid::Uuid;

use crate::gateway::GatewayError;
use crate::store::StoreError;

/// Caller input that cannot become a gateway transaction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingRequiredFields(Vec<&'static str>),
    #[error("amount '{0}' is not a positive decimal")]
    InvalidAmount(String),
    #[error("customerEmail is not a valid email address")]
    InvalidEmail,
    #[error("unsupported paymentMethod '{0}'")]
    UnsupportedPaymentMethod(String),
    #[error("phone is required for NEQUI payments")]
    MissingPhone,
    #[error("userLegalId is required for PSE payments")]
    MissingLegalId,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingRequiredFields(_) => "missing_required_fields",
            ValidationError::InvalidAmount(_) => "invalid_amount",
            ValidationError::InvalidEmail => "invalid_email",
            ValidationError::UnsupportedPaymentMethod(_) => "unsupported_payment_method",
            ValidationError::MissingPhone => "missing_phone",
            ValidationError::MissingLegalId => "missing_legal_id",
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Names the missing variable, never its value.
    #[error("{0} is not configured")]
    Configuration(&'static str),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl CheckoutError {
    pub fn into_api_error(self, trace_id: Uuid) -> ApiError {
        let trace_id = Some(trace_id);
        match self {
            CheckoutError::Validation(err) => ApiError::BadRequest {
                code: err.code(),
                trace_id,
                message: Some(err.to_string()),
            },
            CheckoutError::Configuration(_) => ApiError::Internal {
                code: "configuration_error",
                trace_id,
                message: Some(self.to_string()),
            },
            CheckoutError::Gateway(err) => ApiError::Internal {
                code: err.code(),
                trace_id,
                message: Some(err.to_string()),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook signature does not match the payload")]
    SignatureMismatch,
    #[error("webhook signature header is missing")]
    SignatureMissing,
    #[error("webhook signatures are required but no secret is configured")]
    MissingSecret,
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),
    #[error("status store failure: {0}")]
    Storage(#[from] StoreError),
}

impl WebhookError {
    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::SignatureMismatch => "signature_mismatch",
            WebhookError::SignatureMissing => "signature_missing",
            WebhookError::MissingSecret => "configuration_error",
            WebhookError::MalformedPayload(_) => "malformed_payload",
            WebhookError::Storage(_) => "internal_error",
        }
    }

    pub fn into_api_error(self, trace_id: Uuid) -> ApiError {
        let trace_id = Some(trace_id);
        let code = self.code();
        match self {
            WebhookError::SignatureMismatch
            | WebhookError::SignatureMissing
            | WebhookError::MalformedPayload(_) => ApiError::BadRequest {
                code,
                trace_id,
                message: Some(self.to_string()),
            },
            // storage details stay in the logs
            WebhookError::MissingSecret | WebhookError::Storage(_) => ApiError::Internal {
                code,
                trace_id,
                message: None,
            },
        }
    }
}
