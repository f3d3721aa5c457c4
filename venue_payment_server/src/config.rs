use std::{env, time::Duration};

use log::*;
use venue_payment_engine::ledger_api::{DEFAULT_LEASE, DEFAULT_REFUND_TIMEOUT};
use vpg_common::{parse_boolean_flag, FeePercent, Secret, DEFAULT_PLATFORM_FEE};

use crate::errors::ServerError;

const DEFAULT_VPG_HOST: &str = "127.0.0.1";
const DEFAULT_VPG_PORT: u16 = 8460;
const DEFAULT_PROCESSOR_API_URL: &str = "https://api.stripe.com";
/// Stripe recommends rejecting signatures older than five minutes.
pub const DEFAULT_WEBHOOK_TOLERANCE: Duration = Duration::from_secs(300);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub webhooks: WebhookConfig,
    /// Bearer key for the operator routes under `/api`.
    pub operator_api_key: Secret<String>,
    pub processor: ProcessorConfig,
    /// Upper bound on the whole refund operation, from the processor call to the status update.
    pub refund_timeout: Duration,
    /// How long a webhook delivery holds its claim on an event while the handlers run.
    pub webhook_lease: Duration,
    /// The platform fee used until an operator stores a platform setting.
    pub default_fee: FeePercent,
}

#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub signing_secret: Secret<String>,
    /// If false, signatures are not checked at all. Development only.
    pub signature_checks: bool,
    /// Maximum age of the timestamp in a webhook signature.
    pub tolerance: Duration,
}

#[derive(Clone, Debug)]
pub struct ProcessorConfig {
    pub api_url: String,
    pub api_key: Secret<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_VPG_HOST.to_string(),
            port: DEFAULT_VPG_PORT,
            database_url: String::default(),
            webhooks: WebhookConfig::default(),
            operator_api_key: Secret::default(),
            processor: ProcessorConfig::default(),
            refund_timeout: DEFAULT_REFUND_TIMEOUT,
            webhook_lease: DEFAULT_LEASE,
            default_fee: DEFAULT_PLATFORM_FEE,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self { signing_secret: Secret::default(), signature_checks: true, tolerance: DEFAULT_WEBHOOK_TOLERANCE }
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self { api_url: DEFAULT_PROCESSOR_API_URL.to_string(), api_key: Secret::default() }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("VPG_HOST").ok().unwrap_or_else(|| DEFAULT_VPG_HOST.into());
        let port = env::var("VPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for VPG_PORT. {e} Using the default, {DEFAULT_VPG_PORT}, instead."
                    );
                    DEFAULT_VPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_VPG_PORT);
        let database_url = env::var("VPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ VPG_DATABASE_URL is not set. Please set it to the URL for the ledger database.");
            String::default()
        });
        let operator_api_key = Secret::new(env::var("VPG_OPERATOR_API_KEY").ok().unwrap_or_else(|| {
            warn!("🪛️ VPG_OPERATOR_API_KEY is not set. All operator routes will be refused.");
            String::default()
        }));
        let refund_timeout = duration_from_env("VPG_REFUND_TIMEOUT_SECS", DEFAULT_REFUND_TIMEOUT);
        let webhook_lease = duration_from_env("VPG_WEBHOOK_LEASE_SECS", DEFAULT_LEASE);
        let default_fee = env::var("VPG_DEFAULT_FEE_PERCENT")
            .ok()
            .and_then(|s| {
                s.parse::<FeePercent>()
                    .map_err(|e| {
                        warn!("🪛️ Invalid value for VPG_DEFAULT_FEE_PERCENT. {e}. Using {DEFAULT_PLATFORM_FEE}%.")
                    })
                    .ok()
            })
            .unwrap_or(DEFAULT_PLATFORM_FEE);
        Self {
            host,
            port,
            database_url,
            webhooks: WebhookConfig::from_env_or_default(),
            operator_api_key,
            processor: ProcessorConfig::from_env_or_default(),
            refund_timeout,
            webhook_lease,
            default_fee,
        }
    }

    /// Refuses configurations that would accept unauthenticated webhooks without saying so.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.webhooks.signature_checks && self.webhooks.signing_secret.is_empty() {
            return Err(ServerError::ConfigurationError(
                "Webhook signature checks are enabled but VPG_WEBHOOK_SIGNING_SECRET is not set. Set the secret, or \
                 set VPG_WEBHOOK_SIGNATURE_CHECKS=false for local development."
                    .to_string(),
            ));
        }
        if !self.webhooks.signature_checks {
            warn!(
                "🚨️🚨️🚨️ Webhook signature checks are DISABLED. Anyone can post events to this server. Never run a \
                 deployed instance like this. 🚨️🚨️🚨️"
            );
        }
        Ok(())
    }
}

impl WebhookConfig {
    pub fn from_env_or_default() -> Self {
        let signing_secret = Secret::new(env::var("VPG_WEBHOOK_SIGNING_SECRET").ok().unwrap_or_default());
        let signature_checks = parse_boolean_flag(env::var("VPG_WEBHOOK_SIGNATURE_CHECKS").ok(), true);
        let tolerance = duration_from_env("VPG_WEBHOOK_TOLERANCE_SECS", DEFAULT_WEBHOOK_TOLERANCE);
        Self { signing_secret, signature_checks, tolerance }
    }
}

impl ProcessorConfig {
    pub fn from_env_or_default() -> Self {
        let api_url = env::var("VPG_PROCESSOR_API_URL").ok().unwrap_or_else(|| {
            info!("🪛️ VPG_PROCESSOR_API_URL is not set. Using {DEFAULT_PROCESSOR_API_URL}");
            DEFAULT_PROCESSOR_API_URL.to_string()
        });
        let api_key = Secret::new(env::var("VPG_PROCESSOR_API_KEY").ok().unwrap_or_else(|| {
            warn!("🪛️ VPG_PROCESSOR_API_KEY is not set. Refunds will be rejected by the payment processor.");
            String::default()
        }));
        Self { api_url, api_key }
    }
}

fn duration_from_env(name: &str, default: Duration) -> Duration {
    env::var(name)
        .map_err(|_| info!("🪛️ {name} is not set. Using the default value of {}s.", default.as_secs()))
        .and_then(|s| {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| warn!("🪛️ Invalid configuration value for {name}. {e}"))
        })
        .ok()
        .unwrap_or(default)
}
