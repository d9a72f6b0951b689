use anyhow::{Context, Result};
use common_crypto::SigningSecret;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, warn};

pub const SANDBOX_BASE_URL: &str = "https://sandbox.wompi.co/v1";
pub const PRODUCTION_BASE_URL: &str = "https://production.wompi.co/v1";

const DEFAULT_REDIRECT_URL: &str = "https://nodos.vercel.app/pago-exitoso.html";
const DEFAULT_REFERENCE_PREFIX: &str = "NODA";
const DEFAULT_PRODUCT_NAME: &str = "Producto Nodos";
const DEFAULT_CURRENCY: &str = "COP";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayEnvironment {
    Sandbox,
    Production,
}

impl GatewayEnvironment {
    /// Only an explicit `production` selects production; anything else,
    /// including unset or misspelled values, stays on sandbox.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "production" => GatewayEnvironment::Production,
            _ => GatewayEnvironment::Sandbox,
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            GatewayEnvironment::Sandbox => SANDBOX_BASE_URL,
            GatewayEnvironment::Production => PRODUCTION_BASE_URL,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayEnvironment::Sandbox => "sandbox",
            GatewayEnvironment::Production => "production",
        }
    }
}

/// What to do with a webhook delivery that carries no signature header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsignedWebhookPolicy {
    Accept,
    Reject,
}

/// API credential whose value never reaches logs or `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***redacted***)")
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub environment: GatewayEnvironment,
    pub base_url_override: Option<String>,
    pub private_key: Option<ApiKey>,
    pub public_key: Option<String>,
    pub require_acceptance_token: bool,
    pub webhook_secret: Option<SigningSecret>,
    pub unsigned_webhooks: UnsignedWebhookPolicy,
    pub redirect_url: String,
    pub reference_prefix: String,
    pub default_product_name: String,
    pub default_currency: String,
    pub gateway_timeout: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl CheckoutConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).and_then(|value| normalize_optional(&value));

        let environment = GatewayEnvironment::parse(get("WOMPI_ENV").as_deref());
        let base_url_override = get("WOMPI_BASE_URL");
        let private_key = get("WOMPI_PRIVATE_KEY").map(ApiKey::new);
        let public_key = get("WOMPI_PUBLIC_KEY");
        let require_acceptance_token = get("WOMPI_ACCEPTANCE_TOKEN")
            .map(|value| parse_bool(&value))
            .unwrap_or(true);
        let webhook_secret = get("WOMPI_WEBHOOK_SECRET").map(SigningSecret::new);
        let unsigned_webhooks = match get("WEBHOOK_REQUIRE_SIGNATURE").map(|v| parse_bool(&v)) {
            Some(true) => UnsignedWebhookPolicy::Reject,
            _ => UnsignedWebhookPolicy::Accept,
        };
        let redirect_url =
            get("PAYMENT_RETURN_URL").unwrap_or_else(|| DEFAULT_REDIRECT_URL.to_string());
        let reference_prefix =
            get("PAYMENT_REFERENCE_PREFIX").unwrap_or_else(|| DEFAULT_REFERENCE_PREFIX.to_string());
        let default_product_name = get("PAYMENT_DEFAULT_PRODUCT_NAME")
            .unwrap_or_else(|| DEFAULT_PRODUCT_NAME.to_string());
        let default_currency = get("PAYMENT_DEFAULT_CURRENCY")
            .map(|value| value.to_ascii_uppercase())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        let timeout_secs = get("GATEWAY_TIMEOUT_SECONDS")
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            environment,
            base_url_override,
            private_key,
            public_key,
            require_acceptance_token,
            webhook_secret,
            unsigned_webhooks,
            redirect_url,
            reference_prefix,
            default_product_name,
            default_currency,
            gateway_timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    /// Gateway API root without a trailing slash.
    pub fn gateway_base_url(&self) -> String {
        self.base_url_override
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
            .trim_end_matches('/')
            .to_string()
    }

    /// Log the effective settings once at start-up. Secret values are never printed.
    pub fn log_summary(&self) {
        info!(
            environment = self.environment.as_str(),
            base_url = %self.gateway_base_url(),
            acceptance_token = self.require_acceptance_token,
            private_key_configured = self.private_key.is_some(),
            public_key_configured = self.public_key.is_some(),
            timeout_secs = self.gateway_timeout.as_secs(),
            "Checkout gateway configuration loaded"
        );
        if self.private_key.is_none() {
            warn!("WOMPI_PRIVATE_KEY is not set; transaction creation will fail with configuration_error");
        }
        if self.require_acceptance_token && self.public_key.is_none() {
            warn!("WOMPI_PUBLIC_KEY is not set; acceptance token lookup will fail with configuration_error");
        }
        match (&self.webhook_secret, self.unsigned_webhooks) {
            (None, UnsignedWebhookPolicy::Accept) => warn!(
                "WOMPI_WEBHOOK_SECRET is not set; webhook events are processed WITHOUT signature verification"
            ),
            (None, UnsignedWebhookPolicy::Reject) => warn!(
                "WEBHOOK_REQUIRE_SIGNATURE is on but WOMPI_WEBHOOK_SECRET is not set; every webhook will be refused"
            ),
            (Some(_), UnsignedWebhookPolicy::Accept) => info!(
                "Webhook signatures are verified when present; unsigned events are accepted as unverified"
            ),
            (Some(_), UnsignedWebhookPolicy::Reject) => info!("Webhook signatures are required"),
        }
    }
}

/// Listener and storage settings used only by the binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub allowed_origins: Vec<String>,
    pub database_url: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8090".to_string())
            .parse()
            .context("PORT must be a valid port number")?;
        let addr = SocketAddr::new(host.parse().context("HOST must be an IP address")?, port);
        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|value| parse_list(&value))
            .filter(|list| !list.is_empty())
            .unwrap_or_else(default_origins);
        let database_url = env::var("DATABASE_URL")
            .ok()
            .and_then(|value| normalize_optional(&value));
        Ok(Self {
            addr,
            allowed_origins,
            database_url,
        })
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(|c| c == ',' || c == ';' || c == ' ')
        .filter_map(normalize_optional)
        .collect()
}

fn default_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
