use clap::Parser;
use color_eyre::eyre::{Result, bail};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, prelude::*};

use gsm_gateway::backend::sync::SyncClient;
use gsm_gateway::config::{Cli, Config};
use gsm_gateway::credentials::{Credentials, CredentialsStore};
use gsm_gateway::service;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_cli(&cli)?;

    let store = CredentialsStore::new(&config.credentials_path);
    let credentials = match &cli.api_key {
        Some(api_key) => {
            let credentials = Credentials {
                api_key: api_key.clone(),
            };
            store.save(&credentials)?;
            info!(
                path = %config.credentials_path.display(),
                "API key persisted to credentials file"
            );
            credentials
        }
        None => match store.load()? {
            Some(credentials) => credentials,
            None => bail!(
                "no API key configured; pass --api-key (or set GSM_GATEWAY_API_KEY) \
                 once and it will be persisted"
            ),
        },
    };

    info!(
        api_key = %credentials.masked(),
        endpoint = %config.endpoint,
        interval_secs = config.sync_interval.as_secs(),
        "gsm-gateway starting"
    );

    let client = SyncClient::new(&config, &credentials)?;
    match client.validate() {
        Ok(true) => info!("API key accepted by backend"),
        Ok(false) => bail!(
            "backend rejected the configured API key; create a fresh key in the \
             dashboard and rerun with --api-key"
        ),
        Err(err) => warn!(error = %err, "could not validate API key, starting anyway"),
    }

    let running = service::install_shutdown_handler()?;
    service::run(&config, &client, &running)
}
