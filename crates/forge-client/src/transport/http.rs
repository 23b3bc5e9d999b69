//! HTTP transport for the remote pipeline API.

use std::sync::Arc;

use async_trait::async_trait;
use forge_core::{TaskId, TaskType, UserId, WalletAddress};
use forge_protocol::endpoint::{self, Endpoint};
use forge_protocol::{
    CodeRequest, DeployResponse, GenerateRequest, GenerateResponse, ProjectSummary,
    RegisterWalletRequest, RegisterWalletResponse, StatusReport, TaskAccepted,
};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::Transport;
use crate::config::ForgeConfig;
use crate::error::{ClientError, TransportError};
use crate::storage::{self, KeyValueStore};

/// Maps a reqwest failure onto the transport error vocabulary.
fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::timeout(err)
    } else if err.is_decode() {
        TransportError::decode(err)
    } else if let Some(status) = err.status() {
        TransportError::from_status(status.as_u16(), status.canonical_reason(), "")
    } else {
        TransportError::network(err)
    }
}

/// Talks to the pipeline API over HTTP.
///
/// The bearer token is read from storage on every request, so clearing it
/// (as the fallback switch does) takes effect immediately.
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    store: Arc<dyn KeyValueStore>,
}

impl HttpTransport {
    pub fn new(config: &ForgeConfig, store: Arc<dyn KeyValueStore>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        let base_url = Url::parse(&config.api_url)
            .map_err(|e| ClientError::Config(format!("invalid api_url {:?}: {e}", config.api_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "invalid api_url {:?}: not a base URL",
                config.api_url
            )));
        }
        Ok(Self {
            client,
            base_url,
            store,
        })
    }

    /// Resolves `endpoint` against the base URL, percent-encoding every segment.
    fn url(&self, endpoint: &Endpoint) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(&endpoint.segments);
        }
        if !endpoint.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(endpoint.query.iter().map(|(key, value)| (*key, value.as_str())));
        }
        url
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, TransportError> {
        let request = match storage::auth_token(self.store.as_ref()) {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "Response received");

        if status.is_success() {
            return response.json::<T>().await.map_err(map_reqwest_error);
        }

        let body = response.text().await.unwrap_or_default();
        Err(TransportError::from_status(
            status.as_u16(),
            status.canonical_reason(),
            &body,
        ))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn register_wallet(&self, wallet: &WalletAddress) -> Result<UserId, TransportError> {
        let body = RegisterWalletRequest {
            wallet_address: wallet.as_str().to_string(),
        };
        let response: RegisterWalletResponse = self
            .send(self.client.post(self.url(&endpoint::register_wallet())).json(&body))
            .await?;
        Ok(UserId::new(response.user_id))
    }

    async fn list_projects(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<ProjectSummary>, TransportError> {
        let endpoint = endpoint::list_projects(user_id.as_str(), limit);
        self.send(self.client.get(self.url(&endpoint))).await
    }

    async fn start_generate(&self, description: &str) -> Result<GenerateResponse, TransportError> {
        let body = GenerateRequest {
            description: description.to_string(),
        };
        let path = endpoint::start_task(TaskType::Generate);
        self.send(self.client.post(self.url(&path)).json(&body)).await
    }

    async fn start_audit(&self, code: &str) -> Result<TaskId, TransportError> {
        let body = CodeRequest {
            code: code.to_string(),
        };
        let path = endpoint::start_task(TaskType::Audit);
        let accepted: TaskAccepted = self.send(self.client.post(self.url(&path)).json(&body)).await?;
        Ok(accepted.task_id)
    }

    async fn start_build(&self, code: &str) -> Result<TaskId, TransportError> {
        let body = CodeRequest {
            code: code.to_string(),
        };
        let path = endpoint::start_task(TaskType::Build);
        let accepted: TaskAccepted = self.send(self.client.post(self.url(&path)).json(&body)).await?;
        Ok(accepted.task_id)
    }

    async fn start_deploy(&self, code: &str) -> Result<String, TransportError> {
        let body = CodeRequest {
            code: code.to_string(),
        };
        let path = endpoint::start_task(TaskType::Deploy);
        let deployed: DeployResponse = self.send(self.client.post(self.url(&path)).json(&body)).await?;
        Ok(deployed.contract_address)
    }

    async fn get_status(
        &self,
        task_type: TaskType,
        task_id: &TaskId,
    ) -> Result<StatusReport, TransportError> {
        let endpoint = endpoint::task_status(task_type, task_id);
        self.send(self.client.get(self.url(&endpoint))).await
    }
}
