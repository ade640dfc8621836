//! HTTP surface bridge
//!
//! Talks to a browser automation sidecar:
//!
//! - `POST {base}/execute` with the action as JSON, any 2xx is success
//! - `GET {base}/observe` returning an `Observation` as JSON
//!
//! Connection failures map to `SurfaceError::Unavailable` so a missing
//! sidecar is distinguishable from a page that rejected an action.

use async_trait::async_trait;
use reqwest::Client;
use sdk::{Action, Observation, SurfaceDriver, SurfaceError};
use std::time::Duration;
use tracing::debug;

/// Upper bound for a single HTTP round trip; the step loop applies its own
/// per-call timeouts on top.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone)]
pub struct HttpSurfaceDriver {
    base_url: String,
    client: Client,
}

impl HttpSurfaceDriver {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn transport_error(&self, operation: &str, err: reqwest::Error) -> SurfaceError {
        if err.is_connect() {
            SurfaceError::Unavailable(format!("cannot reach surface at {}: {}", self.base_url, err))
        } else if err.is_timeout() {
            SurfaceError::Timeout(operation.to_string())
        } else if operation == "observe" {
            SurfaceError::Observation(err.to_string())
        } else {
            SurfaceError::Action(err.to_string())
        }
    }
}

#[async_trait]
impl SurfaceDriver for HttpSurfaceDriver {
    async fn execute(&self, action: &Action) -> Result<(), SurfaceError> {
        debug!("Surface execute: {}", action);

        let response = self
            .client
            .post(format!("{}/execute", self.base_url))
            .json(action)
            .send()
            .await
            .map_err(|e| self.transport_error("execute", e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 503 {
            return Err(SurfaceError::Unavailable(body));
        }
        Err(SurfaceError::Action(format!("{} ({}): {}", action.kind, status, body.trim())))
    }

    async fn observe(&self) -> Result<Observation, SurfaceError> {
        let response = self
            .client
            .get(format!("{}/observe", self.base_url))
            .send()
            .await
            .map_err(|e| self.transport_error("observe", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 503 {
                return Err(SurfaceError::Unavailable(body));
            }
            return Err(SurfaceError::Observation(format!("{}: {}", status, body.trim())));
        }

        response
            .json::<Observation>()
            .await
            .map_err(|e| SurfaceError::Observation(format!("invalid observation: {}", e)))
    }
}
