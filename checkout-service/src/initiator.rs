use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::CheckoutConfig;
use crate::error::CheckoutError;
use crate::gateway::{GatewayResponse, PaymentGateway};
use crate::model::{
    generate_reference, GatewayTransactionPayload, TransactionMetadata, TransactionRequest,
};

/// Result of a transaction submission: the gateway's reply plus the reference used.
#[derive(Debug, Clone, PartialEq)]
pub struct InitiatedTransaction {
    pub reference: String,
    /// True when the caller gave no reference and one was generated.
    pub reference_generated: bool,
    pub response: GatewayResponse,
}

/// A validated request whose credentials have been resolved, ready to send.
#[derive(Debug, Clone)]
pub struct PreparedTransaction {
    pub payload: GatewayTransactionPayload,
    pub reference_generated: bool,
    needs_acceptance_token: bool,
}

pub struct TransactionInitiator {
    config: Arc<CheckoutConfig>,
    gateway: Arc<dyn PaymentGateway>,
}

impl TransactionInitiator {
    pub fn new(config: Arc<CheckoutConfig>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { config, gateway }
    }

    /// Validate the request and check credentials. Never touches the network.
    pub fn prepare(&self, request: TransactionRequest) -> Result<PreparedTransaction, CheckoutError> {
        let validated = request.validate()?;

        if self.config.private_key.is_none() {
            return Err(CheckoutError::Configuration("WOMPI_PRIVATE_KEY"));
        }
        let needs_acceptance_token = self.config.require_acceptance_token;
        if needs_acceptance_token && self.config.public_key.is_none() {
            return Err(CheckoutError::Configuration("WOMPI_PUBLIC_KEY"));
        }

        let (reference, reference_generated) = match validated.reference {
            Some(reference) => (reference, false),
            None => (generate_reference(&self.config.reference_prefix, Utc::now()), true),
        };

        let payload = GatewayTransactionPayload {
            amount_in_cents: validated.amount_in_cents,
            currency: validated
                .currency
                .unwrap_or_else(|| self.config.default_currency.clone()),
            customer_email: validated.customer_email,
            reference,
            acceptance_token: None,
            redirect_url: self.config.redirect_url.clone(),
            payment_method: validated.payment_method,
            metadata: TransactionMetadata {
                product_name: validated
                    .product_name
                    .unwrap_or_else(|| self.config.default_product_name.clone()),
            },
        };
        Ok(PreparedTransaction {
            payload,
            reference_generated,
            needs_acceptance_token,
        })
    }

    /// Validate, optionally fetch the acceptance token, then submit exactly one transaction.
    pub async fn create_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<InitiatedTransaction, CheckoutError> {
        let mut prepared = self.prepare(request)?;
        let private_key = self
            .config
            .private_key
            .as_ref()
            .ok_or(CheckoutError::Configuration("WOMPI_PRIVATE_KEY"))?;

        if prepared.needs_acceptance_token {
            let public_key = self
                .config
                .public_key
                .as_deref()
                .ok_or(CheckoutError::Configuration("WOMPI_PUBLIC_KEY"))?;
            let token = self.gateway.acceptance_token(public_key).await?;
            prepared.payload.acceptance_token = Some(token);
        }

        let payload = prepared.payload;
        if prepared.reference_generated {
            warn!(
                reference = %payload.reference,
                "No reference supplied; a generated reference is not idempotent across retries"
            );
        }
        let response = self.gateway.create_transaction(private_key.expose(), &payload).await?;
        info!(
            reference = %payload.reference,
            payment_method = payload.payment_method.kind().as_str(),
            amount_in_cents = payload.amount_in_cents,
            upstream_status = response.status,
            "Gateway transaction submitted"
        );
        Ok(InitiatedTransaction {
            reference: payload.reference,
            reference_generated: prepared.reference_generated,
            response,
        })
    }
}
