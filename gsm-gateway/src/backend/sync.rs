use eyre::{Result, WrapErr};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::config::Config;
use crate::credentials::Credentials;
use crate::modem::Modem;

/// Header carrying the per-location API key the endpoint authenticates.
const API_KEY_HEADER: &str = "x-api-key";
/// Routing key the hosting platform expects on every function invocation.
const PLATFORM_KEY_HEADER: &str = "apikey";

#[derive(Debug, Error)]
pub enum SyncError {
    /// The endpoint answered, but not with an acceptance.
    #[error("backend rejected the batch: {status}: {body}")]
    Rejected { status: StatusCode, body: String },
    /// The request never produced an HTTP status: no route, refused, or
    /// timed out.
    #[error("backend unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct SyncRequest<'a> {
    modems: &'a [Modem],
}

/// Delivers one round's modem records to the collection endpoint as a single
/// authenticated batch. Delivery is best-effort, at most once per round: a
/// failed batch is dropped, never queued or retried.
pub struct SyncClient {
    client: Client,
    endpoint: Url,
    api_key: String,
    platform_key: String,
}

impl SyncClient {
    pub fn new(config: &Config, credentials: &Credentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent("gsm-gateway")
            .build()
            .wrap_err("failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: credentials.api_key.clone(),
            platform_key: config.platform_key.clone(),
        })
    }

    /// Sends the full batch as one unit. An empty batch is skipped without a
    /// request: collection failure for every port is not a sync error.
    pub fn sync(&self, modems: &[Modem]) -> Result<(), SyncError> {
        if modems.is_empty() {
            debug!("empty batch, skipping sync");
            return Ok(());
        }

        let response = self.post(&SyncRequest { modems })?;
        match response.status() {
            StatusCode::OK => {
                info!(modem_count = modems.len(), "batch accepted by backend");
                Ok(())
            }
            status => {
                let body = response.text().unwrap_or_default();
                Err(SyncError::Rejected { status, body })
            }
        }
    }

    /// No-op remote call probing whether the stored API key is accepted.
    /// Only an explicit authentication rejection marks the key invalid;
    /// any other answer proves nothing about the key.
    pub fn validate(&self) -> Result<bool, SyncError> {
        let response = self.post(&SyncRequest { modems: &[] })?;
        Ok(!matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ))
    }

    fn post(&self, request: &SyncRequest<'_>) -> Result<Response, reqwest::Error> {
        self.client
            .post(self.endpoint.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .header(PLATFORM_KEY_HEADER, &self.platform_key)
            .json(request)
            .send()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modem::{Chip, ChipStatus, ModemStatus};

    #[test]
    fn test_sync_request_wire_shape() {
        let modem = Modem {
            port_name: "/dev/ttyUSB0".to_string(),
            imei: Some("359876543210987".to_string()),
            operator: None,
            signal_strength: Some(23),
            status: ModemStatus::Online,
            chips: vec![Chip {
                phone_number: "+5511999998888".to_string(),
                iccid: None,
                operator: None,
                status: ChipStatus::Active,
            }],
        };
        let batch = [modem];

        let value = serde_json::to_value(SyncRequest { modems: &batch }).unwrap();

        let modem = &value["modems"][0];
        assert_eq!(modem["port_name"], "/dev/ttyUSB0");
        assert_eq!(modem["imei"], "359876543210987");
        assert_eq!(modem["signal_strength"], 23);
        assert_eq!(modem["status"], "online");
        assert!(modem.get("operator").is_none());

        let chip = &modem["chips"][0];
        assert_eq!(chip["phone_number"], "+5511999998888");
        assert_eq!(chip["status"], "active");
        assert!(chip.get("iccid").is_none());
    }
}
