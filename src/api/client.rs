use super::error::ApiError;
use super::logging::{debug_payload_enabled, emit_debug_payload};
use crate::config::Config;
use crate::types::{
    AddRepositoryResponse, DeleteStoreRequest, DeleteStoreResponse, FilenameResponse,
    GenerateRequest, InstallInfo, RepositoryRequest, StatusResponse, SyncResponse,
    TokenCountRequest, TokenCountResponse,
};
use anyhow::{bail, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::pin::Pin;
#[cfg(test)]
use std::sync::Arc;
use std::time::Duration;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ApiError>> + Send>>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60 * 60);
const INSTALL_INFO_TIMEOUT: Duration = Duration::from_secs(20);
const FILENAME_TIMEOUT: Duration = Duration::from_secs(15);

#[cfg(test)]
pub trait MockStreamProducer: Send + Sync {
    fn create_mock_stream(&self, request: &GenerateRequest) -> Result<ByteStream>;
}

/// HTTP access to the chat service and the repository manager.
#[derive(Clone)]
pub struct MachtianiClient {
    http: reqwest::Client,
    machtiani_url: String,
    repo_manager_url: String,
    gateway_header: Option<(String, String)>,
    #[cfg(test)]
    mock_stream_producer: Option<Arc<dyn MockStreamProducer>>,
}

impl MachtianiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            machtiani_url: config.machtiani_url.trim_end_matches('/').to_string(),
            repo_manager_url: config.repo_manager_url.trim_end_matches('/').to_string(),
            gateway_header: config
                .gateway_header()
                .map(|(key, value)| (key.to_string(), value.to_string())),
            #[cfg(test)]
            mock_stream_producer: None,
        })
    }

    #[cfg(test)]
    pub fn new_mock(mock_producer: Arc<dyn MockStreamProducer>) -> Self {
        Self {
            http: reqwest::Client::new(),
            machtiani_url: "http://localhost:5071".to_string(),
            repo_manager_url: "http://localhost:5070".to_string(),
            gateway_header: None,
            mock_stream_producer: Some(mock_producer),
        }
    }

    pub fn machtiani_url(&self) -> &str {
        &self.machtiani_url
    }

    /// Opens the streamed generation response. The body is a sequence of
    /// concatenated JSON objects, see [`crate::api::ChunkDecoder`].
    pub async fn generate_response(&self, request: &GenerateRequest) -> Result<ByteStream> {
        #[cfg(test)]
        {
            if let Some(producer) = &self.mock_stream_producer {
                return producer.create_mock_stream(request);
            }
        }

        let url = join_url(&self.machtiani_url, "generate-response/");
        let builder = self.post_json(&url, request)?;
        let response = self.send(builder, &url).await?;

        let stream = response
            .bytes_stream()
            .map(move |item| item.map_err(|error| ApiError::from_reqwest(error, &url)));
        Ok(Box::pin(stream))
    }

    /// Asks the service for a short chat filename derived from `context`.
    pub async fn generate_filename(&self, context: &str, config: &Config) -> Result<String> {
        let url = join_url(&self.machtiani_url, "generate-filename");
        let mut query = vec![("context", context)];
        for (name, value) in [
            ("llm_model_api_key", config.model_api_key.as_str()),
            ("llm_model_base_url", config.model_base_url.as_str()),
            ("llm_model_base_url_other", config.model_base_url_other.as_str()),
            ("llm_model_api_key_other", config.model_api_key_other.as_str()),
        ] {
            if !value.is_empty() {
                query.push((name, value));
            }
        }

        let builder = self
            .request(Method::GET, &url)
            .query(&query)
            .timeout(FILENAME_TIMEOUT);
        let response: FilenameResponse = self.send_json(builder, &url).await?;
        let filename = response.filename.trim().to_string();
        if filename.is_empty() {
            bail!("generate-filename endpoint returned an empty filename");
        }
        Ok(filename)
    }

    pub async fn install_info(&self) -> Result<InstallInfo> {
        let url = join_url(&self.machtiani_url, "get-head-oid");
        let builder = self
            .request(Method::GET, &url)
            .timeout(INSTALL_INFO_TIMEOUT);
        Ok(self.send_json(builder, &url).await?)
    }

    pub async fn check_status(&self, codehost_url: &str) -> Result<StatusResponse> {
        let url = join_url(&self.repo_manager_url, "status");
        let builder = self
            .request(Method::GET, &url)
            .query(&[("codehost_url", codehost_url)]);
        Ok(self.send_json(builder, &url).await?)
    }

    pub async fn add_repository(&self, request: &RepositoryRequest) -> Result<AddRepositoryResponse> {
        let url = join_url(&self.repo_manager_url, "add-repository/");
        let builder = self.post_json(&url, request)?;
        Ok(self.send_json(builder, &url).await?)
    }

    /// Syncs an already indexed repository. A body that is not the expected
    /// JSON is returned verbatim as the message.
    pub async fn fetch_and_checkout(&self, request: &RepositoryRequest) -> Result<SyncResponse> {
        let url = join_url(&self.repo_manager_url, "fetch-and-checkout/");
        let builder = self.post_json(&url, request)?;
        let response = self.send(builder, &url).await?;
        let body = response
            .text()
            .await
            .map_err(|error| ApiError::from_reqwest(error, &url))?;

        match serde_json::from_str::<SyncResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(error) => {
                tracing::warn!(%error, "unexpected sync response body");
                Ok(SyncResponse {
                    message: body,
                    ..Default::default()
                })
            }
        }
    }

    pub async fn delete_store(&self, request: &DeleteStoreRequest) -> Result<DeleteStoreResponse> {
        let url = join_url(&self.repo_manager_url, "delete-store/");
        let builder = self.post_json(&url, request)?;
        Ok(self.send_json(builder, &url).await?)
    }

    pub async fn token_count(&self, request: &TokenCountRequest) -> Result<TokenCountResponse> {
        let url = join_url(&self.repo_manager_url, "add-repository/token-count");
        let builder = self.post_json(&url, request)?;
        Ok(self.send_json(builder, &url).await?)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut builder = self
            .http
            .request(method, url)
            .header("content-type", "application/json");
        if let Some((key, value)) = &self.gateway_header {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder
    }

    fn post_json<T: Serialize>(&self, url: &str, body: &T) -> Result<RequestBuilder> {
        if debug_payload_enabled() {
            emit_debug_payload(url, &serde_json::to_value(body)?);
        }
        Ok(self.request(Method::POST, url).json(body))
    }

    async fn send(&self, builder: RequestBuilder, url: &str) -> Result<reqwest::Response, ApiError> {
        let response = builder
            .send()
            .await
            .map_err(|error| ApiError::from_reqwest(error, url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(url, %status, body = %body, "request rejected");
            return Err(ApiError::Status {
                url: url.to_string(),
                status,
                body,
            });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        url: &str,
    ) -> Result<T, ApiError> {
        let response = self.send(builder, url).await?;
        let body = response
            .bytes()
            .await
            .map_err(|error| ApiError::from_reqwest(error, url))?;
        Ok(serde_json::from_slice(&body)?)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url_normalizes_slashes() {
        assert_eq!(
            join_url("http://localhost:5071/", "/generate-response/"),
            "http://localhost:5071/generate-response/"
        );
        assert_eq!(
            join_url("http://gw.example.com/machtiani", "status"),
            "http://gw.example.com/machtiani/status"
        );
    }

    #[test]
    fn test_new_trims_base_urls_and_keeps_gateway_header() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::load_from(None, dir.path()).unwrap();
        config.machtiani_url = "http://localhost:5071/".to_string();
        config.api_gateway_host_value = Some("secret".to_string());

        let client = MachtianiClient::new(&config).expect("client should build");
        assert_eq!(client.machtiani_url(), "http://localhost:5071");
        assert_eq!(
            client.gateway_header,
            Some(("X-RapidAPI-Key".to_string(), "secret".to_string()))
        );
    }
}
