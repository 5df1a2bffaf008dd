use std::time::Duration;

use async_trait::async_trait;
use log::trace;

use crate::{SyncError, SyncRequest, SyncResponse};

/// One request/response exchange with the session endpoint.
#[async_trait]
pub trait SyncTransport: Send + Sync + 'static {
    async fn exchange(&self, session_token: &str, request: &SyncRequest) -> Result<SyncResponse, SyncError>;
}

/// POSTs the request as JSON with the session token as a bearer credential.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client, endpoint: endpoint.into() })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn exchange(&self, session_token: &str, request: &SyncRequest) -> Result<SyncResponse, SyncError> {
        trace!(endpoint = self.endpoint.as_str(), changes = request.changes.len(); "sync request");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(session_token)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}
