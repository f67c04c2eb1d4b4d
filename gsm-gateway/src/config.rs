use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use eyre::{Result, WrapErr};
use url::Url;

/// Collection endpoint the agent reports to unless overridden.
pub const DEFAULT_ENDPOINT: &str =
    "https://eusbnxszzdtwgiblibhz.supabase.co/functions/v1/gsm-gateway";

/// Publishable routing key the hosting platform expects alongside the
/// per-location API key. Not a secret.
pub const DEFAULT_PLATFORM_KEY: &str =
    "sb_publishable_AQl3vN5nJxGn0qRkzW2T7g_8hYc4MdK";

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// The per-location API key from the dashboard. Required on the first
    /// run; persisted to the credentials file afterwards.
    #[arg(long = "api-key", env = "GSM_GATEWAY_API_KEY")]
    pub api_key: Option<String>,

    #[arg(
        long = "endpoint",
        default_value = DEFAULT_ENDPOINT,
        help = "Collection endpoint URL"
    )]
    pub endpoint: String,

    #[arg(
        long = "platform-key",
        env = "GSM_GATEWAY_PLATFORM_KEY",
        default_value = DEFAULT_PLATFORM_KEY,
        help = "Platform routing key sent with every request"
    )]
    pub platform_key: String,

    #[arg(
        long = "credentials-file",
        default_value = "gsm-gateway.json",
        help = "Where the API key is persisted between runs"
    )]
    pub credentials_file: PathBuf,

    #[arg(
        long = "sync-interval",
        default_value = "30",
        help = "Seconds between sync rounds"
    )]
    pub sync_interval: u64,

    #[arg(
        long = "baud-rate",
        default_value = "115200",
        help = "Baud rate used for every modem port"
    )]
    pub baud_rate: u32,

    #[arg(
        long = "serial-timeout",
        default_value = "3",
        help = "Per-read serial timeout in seconds"
    )]
    pub serial_timeout: u64,

    #[arg(
        long = "settle-delay-ms",
        default_value = "1000",
        help = "Wait between writing an AT command and reading its response"
    )]
    pub settle_delay_ms: u64,

    #[arg(
        long = "open-retry-delay-ms",
        default_value = "500",
        help = "Wait before the single retry of a transiently failed port open"
    )]
    pub open_retry_delay_ms: u64,

    #[arg(
        long = "request-timeout",
        default_value = "15",
        help = "HTTP request timeout in seconds"
    )]
    pub request_timeout: u64,
}

/// Immutable runtime configuration, constructed once at startup and passed
/// by reference into every component that needs it.
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: Url,
    pub platform_key: String,
    pub credentials_path: PathBuf,
    pub sync_interval: Duration,
    pub baud_rate: u32,
    pub serial_timeout: Duration,
    pub settle_delay: Duration,
    pub open_retry_delay: Duration,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let endpoint = Url::parse(&cli.endpoint)
            .wrap_err_with(|| format!("invalid endpoint URL '{}'", cli.endpoint))?;

        Ok(Self {
            endpoint,
            platform_key: cli.platform_key.clone(),
            credentials_path: cli.credentials_file.clone(),
            sync_interval: Duration::from_secs(cli.sync_interval),
            baud_rate: cli.baud_rate,
            serial_timeout: Duration::from_secs(cli.serial_timeout),
            settle_delay: Duration::from_millis(cli.settle_delay_ms),
            open_retry_delay: Duration::from_millis(cli.open_retry_delay_ms),
            request_timeout: Duration::from_secs(cli.request_timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_the_serial_protocol() {
        let cli = Cli::try_parse_from(["gsm-gateway"]).unwrap();
        let config = Config::from_cli(&cli).unwrap();

        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.serial_timeout, Duration::from_secs(3));
        assert_eq!(config.settle_delay, Duration::from_secs(1));
        assert_eq!(config.sync_interval, Duration::from_secs(30));
        assert_eq!(config.endpoint.as_str(), DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_rejects_unparsable_endpoint() {
        let cli =
            Cli::try_parse_from(["gsm-gateway", "--endpoint", "not a url"]).unwrap();
        assert!(Config::from_cli(&cli).is_err());
    }
}
