use std::env;

use apg_common::{parse_boolean_flag, Money, Secret};
use arena_payment_engine::objects::DepositLimits;
use chrono::Duration;
use log::*;

const DEFAULT_APG_HOST: &str = "127.0.0.1";
const DEFAULT_APG_PORT: u16 = 8370;
const DEFAULT_LIVE_MATCH_DURATION: Duration = Duration::hours(2);
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_SIGNATURE_HEADER: &str = "x-gateway-signature";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Bounds on a single gateway deposit.
    pub deposit_limits: DepositLimits,
    /// How long a match stays `Live` before the sweep completes it, absent a results upload.
    pub live_match_duration: Duration,
    /// The lifecycle sweep period.
    pub sweep_interval_secs: u64,
    /// Payment gateway configuration.
    pub gateway: GatewayConfig,
}

#[derive(Clone, Debug, Default)]
pub struct GatewayConfig {
    /// Base URL of the gateway's hosted checkout page, e.g. "https://pay.example.com".
    pub checkout_url: String,
    pub hmac_secret: Secret<String>,
    /// If false, the webhook signature check is skipped entirely. **DANGER**
    pub hmac_checks: bool,
    /// The request header the gateway puts its signature in.
    pub signature_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_APG_HOST.to_string(),
            port: DEFAULT_APG_PORT,
            database_url: String::default(),
            deposit_limits: DepositLimits::default(),
            live_match_duration: DEFAULT_LIVE_MATCH_DURATION,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            gateway: GatewayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("APG_HOST").ok().unwrap_or_else(|| DEFAULT_APG_HOST.into());
        let port = env::var("APG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for APG_PORT. {e} Using the default, {DEFAULT_APG_PORT}, instead."
                    );
                    DEFAULT_APG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_APG_PORT);
        let database_url = env::var("APG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ APG_DATABASE_URL is not set. Please set it to the URL for the wallet database.");
            String::default()
        });
        let deposit_limits = configure_deposit_limits();
        let live_match_duration = env::var("APG_LIVE_MATCH_DURATION_HOURS")
            .map_err(|_| {
                info!(
                    "🪛️ APG_LIVE_MATCH_DURATION_HOURS is not set. Using the default value of {} hrs.",
                    DEFAULT_LIVE_MATCH_DURATION.num_hours()
                )
            })
            .and_then(|s| {
                s.parse::<i64>()
                    .map(Duration::hours)
                    .map_err(|e| warn!("🪛️ Invalid configuration value for APG_LIVE_MATCH_DURATION_HOURS. {e}"))
            })
            .ok()
            .unwrap_or(DEFAULT_LIVE_MATCH_DURATION);
        let sweep_interval_secs = env::var("APG_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for APG_SWEEP_INTERVAL_SECS. {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);
        let gateway = GatewayConfig::from_env_or_defaults();
        Self { host, port, database_url, deposit_limits, live_match_duration, sweep_interval_secs, gateway }
    }
}

impl GatewayConfig {
    pub fn from_env_or_defaults() -> Self {
        let checkout_url = env::var("APG_GATEWAY_CHECKOUT_URL").ok().unwrap_or_else(|| {
            error!(
                "🪛️ APG_GATEWAY_CHECKOUT_URL is not set. Please set it to the gateway's hosted checkout base URL."
            );
            String::default()
        });
        let hmac_secret = env::var("APG_GATEWAY_HMAC_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ APG_GATEWAY_HMAC_SECRET is not set. Please set it to the webhook signing key.");
            String::default()
        });
        let hmac_secret = Secret::new(hmac_secret);
        let hmac_checks = parse_boolean_flag(env::var("APG_GATEWAY_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!(
                "🚨️ Webhook signature checks are DISABLED. Anyone who can reach this server can credit wallets. Do \
                 not run production like this."
            );
        }
        let signature_header =
            env::var("APG_GATEWAY_SIGNATURE_HEADER").ok().unwrap_or_else(|| DEFAULT_SIGNATURE_HEADER.into());
        Self { checkout_url, hmac_secret, hmac_checks, signature_header }
    }
}

fn configure_deposit_limits() -> DepositLimits {
    let defaults = DepositLimits::default();
    let min = env::var("APG_DEPOSIT_MIN")
        .ok()
        .and_then(|s| {
            s.parse::<i64>().map_err(|e| warn!("🪛️ Invalid configuration value for APG_DEPOSIT_MIN. {e}")).ok()
        })
        .map(Money::from_rupees)
        .unwrap_or(defaults.min);
    let max = env::var("APG_DEPOSIT_MAX")
        .ok()
        .and_then(|s| {
            s.parse::<i64>().map_err(|e| warn!("🪛️ Invalid configuration value for APG_DEPOSIT_MAX. {e}")).ok()
        })
        .map(Money::from_rupees)
        .unwrap_or(defaults.max);
    if min > max {
        warn!("🪛️ APG_DEPOSIT_MIN exceeds APG_DEPOSIT_MAX; falling back to the defaults.");
        return defaults;
    }
    DepositLimits { min, max }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that handlers need at request time. Generally we try to keep this as small
/// as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub deposit_limits: DepositLimits,
    pub live_match_duration: Duration,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { deposit_limits: config.deposit_limits, live_match_duration: config.live_match_duration }
    }
}
